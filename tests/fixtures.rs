//! Fixture suites: every case under tests/fixtures must pass, and the runner
//! must report the failures it is meant to catch.

use fieldbus_codec::fixture::{load, parse, run_suite, FixtureError};
use std::io::Write;
use std::path::PathBuf;

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn run_source(source: &str) -> Vec<Result<(), FixtureError>> {
    let suites = parse(source).expect("fixture source parses");
    suites.iter().flat_map(run_suite).map(|case| case.result).collect()
}

#[test]
fn test_all_fixture_suites_pass() {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(fixture_dir())
        .expect("fixture directory")
        .map(|entry| entry.expect("dir entry").path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "suite"))
        .collect();
    paths.sort();
    assert!(paths.len() >= 2, "expected modbus and s7 suites, found {:?}", paths);

    let mut total = 0;
    let mut failures = Vec::new();
    for path in &paths {
        let suites = load(path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
        for suite in &suites {
            for case in run_suite(suite) {
                total += 1;
                if let Err(e) = case.result {
                    failures.push(format!("{} / {}: {}", case.suite, case.case, e));
                }
            }
        }
    }
    assert!(total > 30, "only {} fixture cases ran", total);
    assert!(failures.is_empty(), "failing fixture cases:\n{}", failures.join("\n"));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::Builder::new().suffix(".suite").tempfile().expect("temp file");
    write!(
        file,
        r#"suite "tmp" {{
             case "port" {{ root: ModbusConstants; raw: "01F6"; }}
           }}"#
    )
    .expect("write");
    let suites = load(file.path()).expect("load");
    assert_eq!(suites.len(), 1);
    assert_eq!(suites[0].name, "tmp");
    let results = run_suite(&suites[0]);
    assert!(results[0].result.is_ok(), "{:?}", results[0].result);
}

#[test]
fn test_tree_mismatch_is_reported_with_path() {
    let results = run_source(
        r#"suite "s" {
             case "wrong quantity" {
               root: ModbusPDU;
               args: [false];
               raw: "03 0000 0002";
               expect: ModbusPDU { ModbusPDUReadHoldingRegistersRequest { quantity: 3; } }
             }
             case "missing field" {
               root: ModbusPDU;
               args: [false];
               raw: "03 0000 0002";
               expect: ModbusPDU { ModbusPDUReadHoldingRegistersRequest { quantity: 2; startingAddress: 0; } }
             }
           }"#,
    );
    match &results[0] {
        Err(FixtureError::TreeMismatch { path, .. }) => {
            assert_eq!(path, "ModbusPDU/ModbusPDUReadHoldingRegistersRequest/quantity")
        }
        other => panic!("unexpected result {:?}", other),
    }
    // fields must be listed in wire order
    match &results[1] {
        Err(FixtureError::TreeMismatch { path, detail, .. }) => {
            assert_eq!(path, "ModbusPDU/ModbusPDUReadHoldingRegistersRequest/startingAddress");
            assert_eq!(detail, "missing");
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_error_expectations() {
    let results = run_source(
        r#"suite "s" {
             case "expected failure happens" { root: ModbusConstants; raw: "01F5"; error: ConstantMismatch; }
             case "wrong kind" { root: ModbusConstants; raw: "01"; error: ConstantMismatch; }
             case "no failure" { root: ModbusConstants; raw: "01F6"; error: ConstantMismatch; }
           }"#,
    );
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(FixtureError::WrongError { .. })));
    assert!(matches!(results[2], Err(FixtureError::UnexpectedSuccess { .. })));
}

#[test]
fn test_trailing_bytes_and_reserialization_are_checked() {
    let results = run_source(
        r#"suite "s" {
             case "trailing byte" { root: ModbusConstants; raw: "01F6 00"; }
             case "reserved rewritten" { root: TPKTPacket; raw: "03 55 0007 02 F0 80"; }
             case "unknown root" { root: Nope; raw: "00"; }
           }"#,
    );
    assert!(matches!(results[0], Err(FixtureError::Incomplete { consumed: 16, total: 24, .. })));
    match &results[1] {
        Err(FixtureError::BytesMismatch { expected, actual, .. }) => {
            assert_eq!(expected, "0355000702f080");
            assert_eq!(actual, "0300000702f080");
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(matches!(results[2], Err(FixtureError::UnknownRoot { .. })));
}

#[test]
fn test_syntax_errors() {
    assert!(matches!(parse("suite {"), Err(FixtureError::Syntax(_))));
    assert!(matches!(
        parse(r#"suite "s" { case "c" { root: ModbusPDU; raw: "0"; } }"#),
        Err(FixtureError::InvalidHex { .. })
    ));
}
