use anyhow::{Context, Result};
use clap::Parser;
use sof_logger::config::{Args, ConvertConfig};
use sof_logger::session::{self, Outcome};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// How long a cancelled session may take to notice the cancellation. A live
// transport read can block forever, in which case we exit without it.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> Result<()> {
    env_logger::init();

    let config = ConvertConfig::try_from(Args::parse())?;
    log::debug!("config: {:?}", config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    let root_token = CancellationToken::new();
    let session_token = root_token.child_token();

    let result = runtime.block_on(async move {
        // Spawn a task to listen for ctrl+c and cancel the root token
        let signal_token = root_token.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                log::error!("failed to listen for ctrl+c: {}", err);
                return;
            }
            log::info!("Received shutdown signal. Stopping conversion...");
            signal_token.cancel();
        });

        let mut conversion =
            tokio::task::spawn_blocking(move || session::convert(&config, &session_token));

        let finished = tokio::select! {
            res = &mut conversion => Some(res),
            _ = root_token.cancelled() => None,
        };

        match finished {
            Some(res) => res.context("conversion task failed").and_then(|r| r),
            None => match tokio::time::timeout(SHUTDOWN_GRACE, conversion).await {
                Ok(res) => res.context("conversion task failed").and_then(|r| r),
                Err(_) => {
                    log::warn!("transport read still blocked, exiting anyway");
                    Ok(Outcome::Cancelled)
                }
            },
        }
    });

    // Do not wait on a blocking read that will never return.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result? {
        Outcome::EndOfInput => log::info!("end of input"),
        Outcome::Cancelled => log::info!("conversion cancelled"),
    }
    Ok(())
}
