use crate::config::ConvertConfig;
use anyhow::{Context, Result};
use sof_ldcparser::{
    resolve, table_header, Acquired, FwVersion, LineFormatter, MetadataStore, ParseError,
    RecordSource,
};
use std::io::{Read, Seek, Write};
use tokio_util::sync::CancellationToken;

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The input was exhausted.
    EndOfInput,
    /// The run was interrupted from outside.
    Cancelled,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub records: u64,
    pub skipped_words: u64,
    pub trace_points: u64,
}

/// Drives one conversion run.
///
/// Owns the output sink and the timestamp of the previously printed record.
pub struct Session<W> {
    out: W,
    formatter: LineFormatter,
    prev_timestamp: u64,
    stats: SessionStats,
}

impl<W: Write> Session<W> {
    pub fn new(out: W, formatter: LineFormatter) -> Self {
        Self {
            out,
            formatter,
            prev_timestamp: 0,
            stats: SessionStats::default(),
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Verify the store, then convert records until the input ends, the run
    /// is cancelled, or a record fails to decode.
    ///
    /// Any decode failure ends the run: past a corrupt entry the stream cannot
    /// be trusted to line up with the store again.
    pub fn run<R, S>(
        &mut self,
        store: &mut MetadataStore<R>,
        reference: Option<&FwVersion>,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> Result<Outcome>
    where
        R: Read + Seek,
        S: RecordSource + ?Sized,
    {
        store
            .verify(reference)
            .context("ldc file verification failed")?;
        log::info!(
            "fw version {} abi {}",
            store.header().version,
            store.header().version.abi_version
        );

        writeln!(self.out, "{}", table_header()).context("failed to write output")?;
        self.out.flush().context("failed to write output")?;

        let range = store.header().address_range();
        loop {
            if cancel.is_cancelled() {
                return Ok(Outcome::Cancelled);
            }

            let record = match source.next_record(range) {
                Ok(Acquired::Record {
                    record,
                    skipped_words,
                }) => {
                    self.stats.skipped_words += skipped_words;
                    record
                }
                Ok(Acquired::TracePoint(msg)) => {
                    write!(self.out, "Trace point {}", msg).context("failed to write output")?;
                    self.out.flush().context("failed to write output")?;
                    self.stats.trace_points += 1;
                    continue;
                }
                Err(ParseError::EndOfStream) => return Ok(Outcome::EndOfInput),
                Err(ParseError::Cancelled) => return Ok(Outcome::Cancelled),
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("failed to read trace record #{}", self.stats.records + 1)
                    })
                }
            };

            let resolved = resolve(store, source, &record).with_context(|| {
                format!(
                    "failed to resolve trace record #{} (address 0x{:08x})",
                    self.stats.records + 1,
                    record.log_entry_address
                )
            })?;

            let line = self.formatter.format_line(
                &record,
                &resolved.entry,
                &resolved.params,
                self.prev_timestamp,
            );
            writeln!(self.out, "{}", line).context("failed to write output")?;
            self.out.flush().context("failed to write output")?;

            self.prev_timestamp = record.timestamp;
            self.stats.records += 1;
        }
    }
}

/// Open everything `config` names and run a session to completion.
pub fn convert(config: &ConvertConfig, cancel: &CancellationToken) -> Result<Outcome> {
    let mut store = config.open_store()?;
    let reference = config.load_reference_version()?;
    let mut source = config.open_source(cancel)?;
    let out = config.open_output()?;

    let mut session = Session::new(out, config.formatter());
    let result = session.run(&mut store, reference.as_ref(), source.as_mut(), cancel);

    let stats = session.stats();
    log::info!(
        "converted {} records ({} words skipped, {} trace points)",
        stats.records,
        stats.skipped_words,
        stats.trace_points
    );
    result
}
