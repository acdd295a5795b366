mod common;

use assert_fs::prelude::*;
use assert_matches::assert_matches;
use common::*;
use sof_ldcparser::{AbiVersion, ParseError};
use sof_logger::config::{ConvertConfig, Transport};
use sof_logger::session::{convert, Outcome};
use tokio_util::sync::CancellationToken;

struct Fixture {
    dir: assert_fs::TempDir,
    config: ConvertConfig,
}

impl Fixture {
    fn new(ldc: &Ldc, trace: &[u8]) -> Self {
        let dir = assert_fs::TempDir::new().unwrap();
        let ldc_file = dir.child("fw.ldc");
        ldc_file.write_binary(&ldc.bytes).unwrap();
        let trace_file = dir.child("trace.bin");
        trace_file.write_binary(trace).unwrap();

        let config = ConvertConfig {
            ldc_path: ldc_file.path().to_path_buf(),
            transport: Transport::File(trace_file.path().to_path_buf()),
            output: Some(dir.child("out.txt").path().to_path_buf()),
            version_file: None,
            clock: 25.0,
            colors: false,
            id_bits: 12,
        };
        Fixture { dir, config }
    }

    fn with_version_file(mut self, bytes: &[u8]) -> Self {
        let file = self.dir.child("version.bin");
        file.write_binary(bytes).unwrap();
        self.config.version_file = Some(file.path().to_path_buf());
        self
    }

    fn output(&self) -> String {
        std::fs::read_to_string(self.config.output.as_ref().unwrap()).unwrap()
    }
}

#[test]
fn end_to_end_two_records() {
    let ldc = build_ldc(
        &[
            EntrySpec::plain("pipe created"),
            EntrySpec::plain("pipe 100% started"),
        ],
        AbiVersion::new(3, 0, 0),
    );
    let mut trace = record_bytes(&record(100, ldc.addresses[0]), &[]);
    trace.extend_from_slice(&record_bytes(&record(200, ldc.addresses[1]), &[]));

    let fx = Fixture::new(&ldc, &trace);
    let outcome = convert(&fx.config, &CancellationToken::new()).unwrap();
    assert_eq!(outcome, Outcome::EndOfInput);

    let out = fx.output();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].ends_with("\tpipe created"));
    assert!(lines[2].ends_with("\tpipe 100% started"));
    assert!(lines[1].contains("ipc.c:100 "));
}

#[test]
fn ids_are_masked() {
    let ldc = build_ldc(
        &[EntrySpec {
            has_ids: true,
            ..EntrySpec::plain("with ids")
        }],
        AbiVersion::new(3, 0, 0),
    );
    let mut r = record(0, ldc.addresses[0]);
    r.id_0 = 0xf003;
    r.id_1 = 0x1004;
    let fx = Fixture::new(&ldc, &record_bytes(&r, &[]));

    convert(&fx.config, &CancellationToken::new()).unwrap();
    assert!(fx.output().contains(" 3.4     "));
}

#[test]
fn matching_version_file_passes() {
    let ldc = build_ldc(&[EntrySpec::plain("ok")], AbiVersion::new(3, 0, 0));
    let trace = record_bytes(&record(1, ldc.addresses[0]), &[]);
    let fx = Fixture::new(&ldc, &trace)
        .with_version_file(&fw_version(AbiVersion::new(3, 0, 0), b"test"));

    assert_eq!(
        convert(&fx.config, &CancellationToken::new()).unwrap(),
        Outcome::EndOfInput
    );
}

#[test]
fn mismatched_version_file_fails() {
    let ldc = build_ldc(&[EntrySpec::plain("ok")], AbiVersion::new(3, 0, 0));
    let trace = record_bytes(&record(1, ldc.addresses[0]), &[]);
    let fx = Fixture::new(&ldc, &trace)
        .with_version_file(&fw_version(AbiVersion::new(3, 0, 0), b"other"));

    let err = convert(&fx.config, &CancellationToken::new()).unwrap_err();
    assert_matches!(
        err.downcast_ref::<ParseError>(),
        Some(ParseError::FwVersionMismatch)
    );
    assert!(fx.output().is_empty());
}

#[test]
fn truncated_version_file_fails() {
    let ldc = build_ldc(&[EntrySpec::plain("ok")], AbiVersion::new(3, 0, 0));
    let trace = record_bytes(&record(1, ldc.addresses[0]), &[]);
    let fx = Fixture::new(&ldc, &trace).with_version_file(&[0u8; 10]);

    let err = convert(&fx.config, &CancellationToken::new()).unwrap_err();
    assert_matches!(
        err.downcast_ref::<ParseError>(),
        Some(ParseError::ShortRead {
            stage: "version descriptor",
            ..
        })
    );
}

#[test]
fn missing_ldc_file() {
    let ldc = build_ldc(&[], AbiVersion::new(3, 0, 0));
    let mut fx = Fixture::new(&ldc, &[]);
    fx.config.ldc_path = fx.config.ldc_path.with_file_name("missing.ldc");

    let err = convert(&fx.config, &CancellationToken::new()).unwrap_err();
    assert!(err.to_string().contains("failed to open ldc file"));
}

#[test]
fn bad_signature() {
    let mut ldc = build_ldc(&[EntrySpec::plain("x")], AbiVersion::new(3, 0, 0));
    ldc.bytes[0..4].copy_from_slice(b"Nope");
    let trace = record_bytes(&record(1, ldc.addresses[0]), &[]);
    let fx = Fixture::new(&ldc, &trace);

    let err = convert(&fx.config, &CancellationToken::new()).unwrap_err();
    assert_matches!(
        err.downcast_ref::<ParseError>(),
        Some(ParseError::InvalidSignature(_))
    );
}
