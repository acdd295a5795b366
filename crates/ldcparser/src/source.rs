//! Trace record acquisition.
//!
//! Two transports produce the same sequence of records: [`FileReplay`] reads a
//! captured trace buffer, [`LiveCapture`] reads a streaming channel (usually a
//! serial port) that may interleave plain text with binary records.

use std::io::{self, BufReader, Read, Seek};

use crate::reader::{self, read_exact_at, read_full};
use crate::types::*;

/// Number of bytes the firmware writes per side-channel message:
/// 8 characters and a newline.
pub const TRACE_POINT_LEN: usize = 9;

const WORD: usize = 4;

/// One step of acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    /// A record whose address lies inside the metadata region.
    Record {
        record: TraceRecord,
        /// Number of 32-bit words skipped because they did not start a record.
        skipped_words: u64,
    },
    /// A side-channel message found while locking onto the next record.
    TracePoint(String),
}

/// A source of trace records and their trailing parameter words.
pub trait RecordSource {
    /// Read the next record whose address lies in `range`, or the next
    /// side-channel message in front of it.
    ///
    /// Returns `ParseError::EndOfStream` when the input is exhausted.
    fn next_record(&mut self, range: AddressRange) -> Result<Acquired, ParseError>;

    /// Read the `count` parameter words following the last record.
    fn read_params(&mut self, count: u32) -> Result<Params, ParseError>;
}

/// Replays a captured trace buffer.
///
/// Records whose address is out of range are noise: the next attempt starts
/// one word after the previous one, so a record that begins at any word
/// boundary is found.
pub struct FileReplay<R> {
    reader: BufReader<R>,
}

impl<R: Read + Seek> FileReplay<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }
}

impl<R: Read + Seek> RecordSource for FileReplay<R> {
    fn next_record(&mut self, range: AddressRange) -> Result<Acquired, ParseError> {
        let mut skipped_words = 0;
        loop {
            let mut buf = [0u8; TraceRecord::SIZE];
            let n = read_full(&mut self.reader, &mut buf)?;
            if n < TraceRecord::SIZE {
                if n > 0 {
                    log::debug!("ignoring {} trailing bytes of a partial record", n);
                }
                return Err(ParseError::EndOfStream);
            }

            let record = reader::decode_record(&buf);
            if range.contains(record.log_entry_address) {
                return Ok(Acquired::Record {
                    record,
                    skipped_words,
                });
            }

            log::trace!(
                "address 0x{:08x} out of range, advancing one word",
                record.log_entry_address
            );
            self.reader
                .seek_relative(-((TraceRecord::SIZE - WORD) as i64))?;
            skipped_words += 1;
        }
    }

    fn read_params(&mut self, count: u32) -> Result<Params, ParseError> {
        let count = count.min(MAX_PARAMS) as usize;
        let offset = self.reader.stream_position()?;
        let mut buf = [0u8; MAX_PARAMS as usize * WORD];
        read_exact_at(&mut self.reader, &mut buf[..count * WORD], "entry params", offset)?;

        let mut words = [0u32; MAX_PARAMS as usize];
        reader::decode_words(&buf, &mut words[..count]);
        Ok(Params::from_slice(&words[..count]))
    }
}

/// State of the live capture window between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Empty,
    /// A trace point was taken off the front; the tail needs refilling.
    Shifted,
}

/// Reads records from a live transport.
///
/// The transport may deliver a spurious byte when the connection opens and
/// may interleave text messages with records. Resynchronizing around the text
/// is heuristic: an out-of-range address is taken to mean the window starts
/// with a text message, which is not always true.
///
/// Each message is handed out as soon as it is found, before the next
/// transport read.
pub struct LiveCapture<R> {
    reader: R,
    window: [u8; TraceRecord::SIZE],
    state: Window,
    cancelled: Option<Box<dyn Fn() -> bool + Send>>,
}

fn read_once<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            other => return other,
        }
    }
}

impl<R: Read> LiveCapture<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            window: [0u8; TraceRecord::SIZE],
            state: Window::Empty,
            cancelled: None,
        }
    }

    /// Poll `cancelled` between resynchronization steps.
    pub fn with_cancellation(mut self, cancelled: impl Fn() -> bool + Send + 'static) -> Self {
        self.cancelled = Some(Box::new(cancelled));
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.as_ref().is_some_and(|f| f())
    }

    /// Fill the window one word at a time, discarding short word reads.
    fn read_window(&mut self) -> Result<(), ParseError> {
        let mut len = 0;
        while len < TraceRecord::SIZE {
            let n = read_once(&mut self.reader, &mut self.window[len..len + WORD])?;
            if n == 0 {
                return Err(ParseError::EndOfStream);
            }
            if n < WORD {
                log::debug!("discarding {} spurious byte(s) from transport", n);
                continue;
            }
            len += WORD;
        }
        Ok(())
    }

    fn refill(&mut self) -> Result<(), ParseError> {
        let tail = &mut self.window[TraceRecord::SIZE - TRACE_POINT_LEN..];
        let n = read_full(&mut self.reader, tail)?;
        if n < TRACE_POINT_LEN {
            return Err(ParseError::EndOfStream);
        }
        Ok(())
    }
}

impl<R: Read> RecordSource for LiveCapture<R> {
    fn next_record(&mut self, range: AddressRange) -> Result<Acquired, ParseError> {
        match self.state {
            Window::Empty => self.read_window()?,
            Window::Shifted => {
                if self.is_cancelled() {
                    return Err(ParseError::Cancelled);
                }
                self.refill()?;
            }
        }
        self.state = Window::Empty;

        let record = reader::decode_record(&self.window);
        if range.contains(record.log_entry_address) {
            return Ok(Acquired::Record {
                record,
                skipped_words: 0,
            });
        }

        let msg = c_string(&self.window[..TRACE_POINT_LEN]);
        log::debug!("trace point {:?}", msg);
        self.window.copy_within(TRACE_POINT_LEN.., 0);
        self.state = Window::Shifted;
        Ok(Acquired::TracePoint(msg))
    }

    fn read_params(&mut self, count: u32) -> Result<Params, ParseError> {
        let size = count.min(MAX_PARAMS) as usize * WORD;
        let mut buf = [0u8; MAX_PARAMS as usize * WORD];

        let mut filled = 0;
        while filled < size {
            let n = read_once(&mut self.reader, &mut buf[filled..size])?;
            if n == 0 {
                // A live transport has no stream offset to report.
                return Err(ParseError::ShortRead {
                    stage: "entry params",
                    offset: 0,
                    source: io::ErrorKind::UnexpectedEof.into(),
                });
            }
            if n != size - filled {
                log::warn!("partial read of {} bytes of {}", n, size - filled);
            }
            filled += n;
        }

        let mut words = [0u32; MAX_PARAMS as usize];
        let count = size / WORD;
        reader::decode_words(&buf, &mut words[..count]);
        Ok(Params::from_slice(&words[..count]))
    }
}
