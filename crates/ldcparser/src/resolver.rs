use std::io::{Read, Seek};

use crate::source::RecordSource;
use crate::store::MetadataStore;
use crate::types::*;

/// A record's metadata entry together with its parameter values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub entry: LdcEntry,
    pub params: Params,
}

/// Store offset of the entry describing `record`.
pub fn entry_offset(record: &TraceRecord, header: &LdcHeader) -> u64 {
    let rel = record.log_entry_address.wrapping_sub(header.base_address);
    rel as u64 + header.data_offset as u64
}

/// Resolve a record against the store and read its parameters from `source`.
///
/// The record must already be known to lie inside the store's address range.
pub fn resolve<R, S>(
    store: &mut MetadataStore<R>,
    source: &mut S,
    record: &TraceRecord,
) -> Result<Resolved, ParseError>
where
    R: Read + Seek,
    S: RecordSource + ?Sized,
{
    let offset = entry_offset(record, store.header());
    let entry = store.read_entry(offset)?;

    if entry.header.params_num > MAX_PARAMS {
        return Err(ParseError::Structural {
            field: "params count",
            value: entry.header.params_num,
            max: MAX_PARAMS,
            offset,
        });
    }

    let params = source.read_params(entry.header.params_num)?;
    Ok(Resolved { entry, params })
}
