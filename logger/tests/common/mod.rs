#![allow(dead_code)]

use sof_ldcparser::{AbiVersion, FwVersion, LdcHeader, TraceRecord};

pub const BASE: u32 = 0xbe00_0000;

pub struct EntrySpec {
    pub level: u32,
    pub class: u32,
    pub has_ids: bool,
    pub params_num: u32,
    pub line: u32,
    pub file: &'static str,
    pub text: &'static str,
}

impl EntrySpec {
    pub fn plain(text: &'static str) -> Self {
        EntrySpec {
            level: 3,
            class: 2,
            has_ids: false,
            params_num: 0,
            line: 100,
            file: "ipc.c",
            text,
        }
    }

    pub fn with_params(text: &'static str, params_num: u32) -> Self {
        EntrySpec {
            params_num,
            ..EntrySpec::plain(text)
        }
    }

    fn encode(&self) -> Vec<u8> {
        self.encode_with_lengths(self.file.len() as u32 + 1, self.text.len() as u32 + 1)
    }

    fn encode_with_lengths(&self, file_name_len: u32, text_len: u32) -> Vec<u8> {
        let mut b = Vec::new();
        for v in [
            self.level,
            self.class,
            self.has_ids as u32,
            self.params_num,
            self.line,
            file_name_len,
            text_len,
        ] {
            b.extend_from_slice(&v.to_le_bytes());
        }
        b.extend_from_slice(self.file.as_bytes());
        b.push(0);
        b.extend_from_slice(self.text.as_bytes());
        b.push(0);
        b
    }
}

pub fn fw_version(abi: AbiVersion, tag: &[u8]) -> Vec<u8> {
    let mut b = Vec::with_capacity(FwVersion::SIZE);
    b.extend_from_slice(&(FwVersion::SIZE as u32).to_le_bytes());
    for v in [1u16, 9, 0, 7] {
        b.extend_from_slice(&v.to_le_bytes());
    }
    b.extend_from_slice(&[0u8; 12]); // date
    b.extend_from_slice(&[0u8; 10]); // time
    let mut t = [0u8; 6];
    t[..tag.len()].copy_from_slice(tag);
    b.extend_from_slice(&t);
    b.extend_from_slice(&abi.0.to_le_bytes());
    b.extend_from_slice(&[0u8; 16]);
    b
}

/// A metadata store; returns the bytes and the firmware address of each entry.
pub struct Ldc {
    pub bytes: Vec<u8>,
    pub addresses: Vec<u32>,
}

pub fn build_ldc(entries: &[EntrySpec], abi: AbiVersion) -> Ldc {
    let mut body = Vec::new();
    let mut addresses = Vec::new();
    for e in entries {
        addresses.push(BASE + body.len() as u32);
        body.extend_from_slice(&e.encode());
    }
    Ldc {
        bytes: assemble(&body, abi),
        addresses,
    }
}

/// Like `build_ldc` but the last entry declares `text_len` instead of its real length.
pub fn build_ldc_with_bad_text_len(entries: &[EntrySpec], text_len: u32, abi: AbiVersion) -> Ldc {
    let mut body = Vec::new();
    let mut addresses = Vec::new();
    for (i, e) in entries.iter().enumerate() {
        addresses.push(BASE + body.len() as u32);
        if i + 1 == entries.len() {
            body.extend_from_slice(&e.encode_with_lengths(e.file.len() as u32 + 1, text_len));
        } else {
            body.extend_from_slice(&e.encode());
        }
    }
    Ldc {
        bytes: assemble(&body, abi),
        addresses,
    }
}

fn assemble(body: &[u8], abi: AbiVersion) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(b"Logs");
    b.extend_from_slice(&BASE.to_le_bytes());
    b.extend_from_slice(&(body.len() as u32).to_le_bytes());
    b.extend_from_slice(&(LdcHeader::SIZE as u32).to_le_bytes());
    b.extend_from_slice(&fw_version(abi, b"test"));
    b.extend_from_slice(body);
    b
}

pub fn record(timestamp: u64, address: u32) -> TraceRecord {
    TraceRecord {
        core_id: 0,
        id_0: 0,
        id_1: 0,
        timestamp,
        log_entry_address: address,
    }
}

pub fn record_bytes(r: &TraceRecord, params: &[u32]) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&r.core_id.to_le_bytes());
    b.extend_from_slice(&r.id_0.to_le_bytes());
    b.extend_from_slice(&r.id_1.to_le_bytes());
    b.extend_from_slice(&r.timestamp.to_le_bytes());
    b.extend_from_slice(&r.log_entry_address.to_le_bytes());
    for p in params {
        b.extend_from_slice(&p.to_le_bytes());
    }
    b
}
