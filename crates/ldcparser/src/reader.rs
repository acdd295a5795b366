use std::io::{self, Read};

use crate::types::{AbiVersion, EntryHeader, FwVersion, LdcHeader, ParseError, TraceRecord};

/// Read until `buf` is full or the reader hits end of input.
///
/// Returns the number of bytes read; anything less than `buf.len()` means EOF.
pub(crate) fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Fill `buf` completely, mapping a short read onto `ParseError::ShortRead`.
pub(crate) fn read_exact_at(
    reader: &mut impl Read,
    buf: &mut [u8],
    stage: &'static str,
    offset: u64,
) -> Result<(), ParseError> {
    reader
        .read_exact(buf)
        .map_err(|source| ParseError::ShortRead {
            stage,
            offset,
            source,
        })
}

fn u16_at(buf: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes(buf[pos..pos + 2].try_into().unwrap())
}

fn u32_at(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap())
}

fn u64_at(buf: &[u8], pos: usize) -> u64 {
    u64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap())
}

/// Read the metadata store header from the start of the store.
pub(crate) fn read_ldc_header(reader: &mut impl Read) -> Result<LdcHeader, ParseError> {
    let mut buf = [0u8; LdcHeader::SIZE];
    read_exact_at(reader, &mut buf, "ldc header", 0)?;

    let mut signature = [0u8; 4];
    signature.copy_from_slice(&buf[0..4]);
    let mut version = [0u8; FwVersion::SIZE];
    version.copy_from_slice(&buf[16..]);

    Ok(LdcHeader {
        signature,
        base_address: u32_at(&buf, 4),
        data_length: u32_at(&buf, 8),
        data_offset: u32_at(&buf, 12),
        version: decode_fw_version(version),
    })
}

/// Read a standalone firmware version descriptor.
pub fn read_fw_version(reader: &mut impl Read) -> Result<FwVersion, ParseError> {
    let mut buf = [0u8; FwVersion::SIZE];
    read_exact_at(reader, &mut buf, "version descriptor", 0)?;
    Ok(decode_fw_version(buf))
}

// Layout: hdr_size u32, major/minor/micro/build u16, date[12], time[10],
// tag[6], abi_version u32, reserved[4] u32.
pub(crate) fn decode_fw_version(raw: [u8; FwVersion::SIZE]) -> FwVersion {
    let tag = &raw[34..40];
    let tag_end = tag.iter().position(|&b| b == 0).unwrap_or(tag.len());
    FwVersion {
        major: u16_at(&raw, 4),
        minor: u16_at(&raw, 6),
        micro: u16_at(&raw, 8),
        build: u16_at(&raw, 10),
        tag: String::from_utf8_lossy(&tag[..tag_end]).into_owned(),
        abi_version: AbiVersion(u32_at(&raw, 40)),
        raw,
    }
}

pub(crate) fn decode_entry_header(buf: &[u8; EntryHeader::SIZE]) -> EntryHeader {
    EntryHeader {
        level: u32_at(buf, 0),
        component_class: u32_at(buf, 4),
        has_ids: u32_at(buf, 8),
        params_num: u32_at(buf, 12),
        line_idx: u32_at(buf, 16),
        file_name_len: u32_at(buf, 20),
        text_len: u32_at(buf, 24),
    }
}

pub(crate) fn decode_record(buf: &[u8; TraceRecord::SIZE]) -> TraceRecord {
    TraceRecord {
        core_id: u32_at(buf, 0),
        id_0: u32_at(buf, 4),
        id_1: u32_at(buf, 8),
        timestamp: u64_at(buf, 12),
        log_entry_address: u32_at(buf, TraceRecord::ADDRESS_OFFSET),
    }
}

/// Decode a little-endian word array.
pub(crate) fn decode_words(buf: &[u8], out: &mut [u32]) {
    for (i, w) in out.iter_mut().enumerate() {
        *w = u32_at(buf, i * 4);
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::types::{EntryHeader, FwVersion, TraceRecord};

    pub fn fw_version_bytes(abi: u32, tag: &[u8]) -> Vec<u8> {
        let mut b = Vec::with_capacity(FwVersion::SIZE);
        b.extend_from_slice(&(FwVersion::SIZE as u32).to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes()); // major
        b.extend_from_slice(&2u16.to_le_bytes()); // minor
        b.extend_from_slice(&3u16.to_le_bytes()); // micro
        b.extend_from_slice(&42u16.to_le_bytes()); // build
        b.extend_from_slice(b"Oct 17 2026\0"); // date
        b.extend_from_slice(b"12:00:00\0\0"); // time
        let mut t = [0u8; 6];
        t[..tag.len()].copy_from_slice(tag);
        b.extend_from_slice(&t);
        b.extend_from_slice(&abi.to_le_bytes());
        b.extend_from_slice(&[0u8; 16]); // reserved
        assert_eq!(b.len(), FwVersion::SIZE);
        b
    }

    pub fn ldc_header_bytes(sig: &[u8; 4], base: u32, len: u32, offset: u32, abi: u32) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(sig);
        b.extend_from_slice(&base.to_le_bytes());
        b.extend_from_slice(&len.to_le_bytes());
        b.extend_from_slice(&offset.to_le_bytes());
        b.extend_from_slice(&fw_version_bytes(abi, b"v1.2"));
        b
    }

    pub fn entry_bytes(header: EntryHeader, file_name: &[u8], text: &[u8]) -> Vec<u8> {
        let mut b = Vec::new();
        for v in [
            header.level,
            header.component_class,
            header.has_ids,
            header.params_num,
            header.line_idx,
            header.file_name_len,
            header.text_len,
        ] {
            b.extend_from_slice(&v.to_le_bytes());
        }
        b.extend_from_slice(file_name);
        b.extend_from_slice(text);
        b
    }

    pub fn record_bytes(r: &TraceRecord) -> Vec<u8> {
        let mut b = Vec::with_capacity(TraceRecord::SIZE);
        b.extend_from_slice(&r.core_id.to_le_bytes());
        b.extend_from_slice(&r.id_0.to_le_bytes());
        b.extend_from_slice(&r.id_1.to_le_bytes());
        b.extend_from_slice(&r.timestamp.to_le_bytes());
        b.extend_from_slice(&r.log_entry_address.to_le_bytes());
        b
    }
}
