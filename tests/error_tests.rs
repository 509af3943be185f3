//! Error path testing
//!
//! Source resolution failures must surface before anything is written, and
//! a failure part way through an export must not leave a manifest behind.

mod common;

use chrono::DateTime;
use common::{init_repository, TestUI};
use stackviz_export::error::{Error, Stage};
use stackviz_export::export::{export, ExportOptions};
use stackviz_export::manifest::MANIFEST_FILE;
use stackviz_export::provider::{resolve, Providers, StdinProvider};
use stackviz_export::subunit_stream::write_stream;
use stackviz_export::test_result::TestResult;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn sample_stream() -> Vec<u8> {
    let start = DateTime::from_timestamp(1_400_000_000, 0).unwrap();
    let end = DateTime::from_timestamp(1_400_000_001, 0).unwrap();
    let mut buffer = Vec::new();
    write_stream(
        &[TestResult::success("pkg.mod.Case.test_ok").with_timestamps(start, end)],
        &mut buffer,
    )
    .unwrap();
    buffer
}

/// A run of packets whose CRC no longer matches their content.
fn corrupt_stream(packets: usize) -> Vec<u8> {
    let mut packet = Vec::new();
    write_stream(&[TestResult::success("pkg.mod.Case.test_bad")], &mut packet).unwrap();
    let last = packet.len() - 1;
    packet[last] ^= 0xFF;
    packet.repeat(packets)
}

#[test]
fn test_missing_stream_file() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("missing.subunit");

    let result = resolve::<PathBuf, _>(&[], &[&missing], None);
    match result {
        Err(Error::SourceNotFound(path)) => assert_eq!(path, missing),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("resolution should fail"),
    }
}

#[test]
fn test_missing_repository_directory() {
    let temp = TempDir::new().unwrap();
    let result = resolve::<_, PathBuf>(&[temp.path().join("nope")], &[], None);
    let err = result.err().unwrap();
    assert!(err.is_source_resolution());
    assert!(matches!(err, Error::SourceNotFound(_)));
}

#[test]
fn test_repository_without_runs() {
    let temp = TempDir::new().unwrap();
    init_repository(temp.path(), 0, &sample_stream());

    let err = resolve::<_, PathBuf>(&[temp.path()], &[], None).err().unwrap();
    assert!(matches!(err, Error::NoTestRuns(_)));
    assert!(err.to_string().starts_with("No test runs in repository"));
}

#[test]
fn test_unsupported_repository_format() {
    let temp = TempDir::new().unwrap();
    let repo = init_repository(temp.path(), 1, &sample_stream());
    fs::write(repo.join("format"), "2\n").unwrap();

    let err = resolve::<_, PathBuf>(&[temp.path()], &[], None).err().unwrap();
    assert!(matches!(err, Error::InvalidFormat(_)));
}

#[test]
fn test_failed_stream_leaves_no_manifest() {
    let temp = TempDir::new().unwrap();
    let stream = temp.path().join("a.subunit");
    fs::write(&stream, sample_stream()).unwrap();
    let project = temp.path().join("project");
    let repo = init_repository(&project, 2, &sample_stream());

    let providers = resolve(&[&project], &[&stream], None).unwrap();
    // The run vanishes after the provider has counted it.
    fs::remove_file(repo.join("1")).unwrap();

    let out = temp.path().join("out");
    let options = ExportOptions {
        output_dir: out.clone(),
        ..Default::default()
    };
    let mut ui = TestUI::new();
    let err = export(&options, &providers, &mut ui).unwrap_err();

    match &err {
        Error::Export {
            provider,
            index,
            stage,
            ..
        } => {
            assert_eq!(provider, "repo_project");
            assert_eq!(*index, 1);
            assert_eq!(*stage, Stage::Convert);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(err
        .to_string()
        .starts_with("Export of repo_project stream 1 failed during convert"));

    // Earlier streams were written, but nothing references them.
    assert!(out.join("a.subunit-0-raw.json").is_file());
    assert!(out.join("repo_project-0-raw.json").is_file());
    assert!(!out.join(MANIFEST_FILE).exists());
}

#[test]
fn test_output_path_is_a_file() {
    let temp = TempDir::new().unwrap();
    let stream = temp.path().join("a.subunit");
    fs::write(&stream, sample_stream()).unwrap();
    let blocker = temp.path().join("out");
    fs::write(&blocker, "not a directory").unwrap();

    let providers = resolve::<PathBuf, _>(&[], &[&stream], None).unwrap();
    let options = ExportOptions {
        output_dir: blocker.clone(),
        ..Default::default()
    };
    let mut ui = TestUI::new();
    let err = export(&options, &providers, &mut ui).unwrap_err();

    assert!(matches!(err, Error::Write { .. }));
    assert!(ui.output.is_empty());
}

#[test]
fn test_unparseable_stream_aborts_export() {
    let temp = TempDir::new().unwrap();
    let mut providers = Providers::new();
    providers.insert(
        StdinProvider::NAME.to_string(),
        Box::new(StdinProvider::from_reader(&corrupt_stream(300)[..]).unwrap()),
    );

    let out = temp.path().join("out");
    let options = ExportOptions {
        output_dir: out.clone(),
        ..Default::default()
    };
    let mut ui = TestUI::new();
    let err = export(&options, &providers, &mut ui).unwrap_err();

    match &err {
        Error::Export {
            provider,
            index,
            stage,
            source,
        } => {
            assert_eq!(provider, "stdin");
            assert_eq!(*index, 0);
            assert_eq!(*stage, Stage::Convert);
            assert!(matches!(**source, Error::Conversion(_)));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!out.join("stdin-0-raw.json").exists());
    assert!(!out.join(MANIFEST_FILE).exists());
}
