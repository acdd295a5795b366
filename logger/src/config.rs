use anyhow::{Context, Result};
use clap::Parser;
use sof_ldcparser::types::DEFAULT_ID_BITS;
use sof_ldcparser::{FileReplay, FwVersion, LineFormatter, LiveCapture, MetadataStore, RecordSource};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Trace buffer exposed by the audio DSP driver.
pub const DEFAULT_TRACE_PATH: &str = "/sys/kernel/debug/sof/trace";

/// Default DSP trace clock, in ticks per microsecond.
pub const DEFAULT_CLOCK_MHZ: f64 = 19.2;

#[derive(Parser, Debug)]
#[command(name = "sof-logger")]
#[command(about = "Convert firmware dictionary trace logs into readable text")]
pub struct Args {
    /// Metadata (ldc) file built alongside the firmware image
    #[arg(long, short = 'l', value_name = "PATH")]
    pub ldc: PathBuf,

    /// Captured trace buffer to replay
    #[arg(long, short = 'i', value_name = "PATH", default_value = DEFAULT_TRACE_PATH)]
    pub input: PathBuf,

    /// Read records live from a serial device instead of replaying a file
    #[arg(long, short = 's', value_name = "DEVICE", conflicts_with = "input")]
    pub serial: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Trace clock rate in MHz (ticks per microsecond)
    #[arg(long, short = 'c', default_value_t = DEFAULT_CLOCK_MHZ)]
    pub clock: f64,

    /// Firmware version descriptor the ldc file must match
    #[arg(long, short = 'v', value_name = "PATH")]
    pub version_file: Option<PathBuf>,

    /// Highlight critical messages
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub colors: bool,

    /// Width of the trace id fields, in bits
    #[arg(long, default_value_t = DEFAULT_ID_BITS, value_parser = clap::value_parser!(u32).range(1..=32))]
    pub id_bits: u32,
}

/// Where trace records come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Transport {
    File(PathBuf),
    Serial(PathBuf),
}

/// Options for a single conversion run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertConfig {
    pub ldc_path: PathBuf,
    pub transport: Transport,
    pub output: Option<PathBuf>,
    pub version_file: Option<PathBuf>,
    pub clock: f64,
    pub colors: bool,
    pub id_bits: u32,
}

impl TryFrom<Args> for ConvertConfig {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self> {
        anyhow::ensure!(
            args.clock.is_finite() && args.clock > 0.0,
            "clock rate must be a positive number of MHz, got {}",
            args.clock
        );

        let transport = match args.serial {
            Some(dev) => Transport::Serial(dev),
            None => Transport::File(args.input),
        };

        Ok(ConvertConfig {
            ldc_path: args.ldc,
            transport,
            output: args.output,
            version_file: args.version_file,
            clock: args.clock,
            colors: args.colors,
            id_bits: args.id_bits,
        })
    }
}

impl ConvertConfig {
    pub fn formatter(&self) -> LineFormatter {
        LineFormatter {
            clock: self.clock,
            colors: self.colors,
            id_mask: sof_ldcparser::format::id_mask(self.id_bits),
        }
    }

    pub fn open_store(&self) -> Result<MetadataStore<BufReader<File>>> {
        let file = File::open(&self.ldc_path)
            .with_context(|| format!("failed to open ldc file {}", self.ldc_path.display()))?;
        MetadataStore::open(BufReader::new(file))
            .with_context(|| format!("failed to read ldc file {}", self.ldc_path.display()))
    }

    // reads the optional reference version descriptor
    pub fn load_reference_version(&self) -> Result<Option<FwVersion>> {
        let Some(path) = &self.version_file else {
            return Ok(None);
        };
        let mut file = File::open(path)
            .with_context(|| format!("failed to open version file {}", path.display()))?;
        let version = sof_ldcparser::read_fw_version(&mut file)
            .with_context(|| format!("failed to read version file {}", path.display()))?;
        Ok(Some(version))
    }

    // opens the configured transport; live capture polls `cancel` while resyncing
    pub fn open_source(&self, cancel: &CancellationToken) -> Result<Box<dyn RecordSource + Send>> {
        match &self.transport {
            Transport::File(path) => {
                let file = File::open(path)
                    .with_context(|| format!("failed to open input file {}", path.display()))?;
                Ok(Box::new(FileReplay::new(file)))
            }
            Transport::Serial(path) => {
                let dev = File::open(path)
                    .with_context(|| format!("failed to open serial device {}", path.display()))?;
                let token = cancel.clone();
                Ok(Box::new(
                    LiveCapture::new(dev).with_cancellation(move || token.is_cancelled()),
                ))
            }
        }
    }

    pub fn open_output(&self) -> Result<Box<dyn Write + Send>> {
        match &self.output {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("failed to create output file {}", path.display()))?;
                Ok(Box::new(file))
            }
            None => Ok(Box::new(io::stdout())),
        }
    }
}
