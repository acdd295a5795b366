//! Decoder for firmware trace logs in the dictionary ("ldc") format.
//!
//! The firmware does not emit text. Each log call writes a fixed-size trace
//! record that refers, by address, to an entry in a metadata store built
//! alongside the firmware image. The entry holds the format text, the source
//! location and the number of parameter words that trail the record.
//!
//! # Trace record
//!
//! | Offset | Size | Field             |
//! |--------|------|-------------------|
//! | 0      | 4    | Core ID           |
//! | 4      | 4    | ID 0              |
//! | 8      | 4    | ID 1              |
//! | 12     | 8    | Timestamp (ticks) |
//! | 20     | 4    | Entry address     |
//! | 24     | 4×N  | Parameters        |
//!
//! # Metadata store
//!
//! The store starts with the `"Logs"` signature, the base address, data
//! length and data offset of the entry region, and the firmware version
//! descriptor. Each entry is a header of seven `u32` fields (level, component
//! class, has-ids flag, parameter count, line, file name length, text length)
//! followed by the file name and the format text.
//!
//! All integers are little-endian.
//!
//! # Usage
//!
//! ```no_run
//! use sof_ldcparser::{
//!     resolve, Acquired, FileReplay, LineFormatter, MetadataStore, ParseError, RecordSource,
//! };
//!
//! let ldc = std::fs::File::open("sof.ldc").unwrap();
//! let trace = std::fs::File::open("trace.bin").unwrap();
//!
//! let mut store = MetadataStore::open(ldc).unwrap();
//! store.verify(None).unwrap();
//! let range = store.header().address_range();
//! let mut source = FileReplay::new(trace);
//! let formatter = LineFormatter::new(19.2);
//!
//! let mut prev = 0;
//! loop {
//!     let record = match source.next_record(range) {
//!         Ok(Acquired::Record { record, .. }) => record,
//!         Ok(Acquired::TracePoint(msg)) => {
//!             print!("Trace point {}", msg);
//!             continue;
//!         }
//!         Err(ParseError::EndOfStream) => break,
//!         Err(e) => panic!("{}", e),
//!     };
//!     let r = resolve(&mut store, &mut source, &record).unwrap();
//!     println!("{}", formatter.format_line(&record, &r.entry, &r.params, prev));
//!     prev = record.timestamp;
//! }
//! ```

pub mod format;
pub mod types;
mod reader;
mod resolver;
mod source;
mod store;

pub use format::{delta_usecs, fill_params, table_header, to_usecs, LineFormatter};
pub use reader::read_fw_version;
pub use resolver::{entry_offset, resolve, Resolved};
pub use source::{Acquired, FileReplay, LiveCapture, RecordSource, TRACE_POINT_LEN};
pub use store::MetadataStore;
pub use types::{
    AbiVersion, AddressRange, EntryHeader, FwVersion, LdcEntry, LdcHeader, ParseError, Params,
    TraceRecord, CONVERTER_ABI_VERSION,
};
