//! CLI test cases.
//!
//! Plain text and DOCX inputs need no external tools. PDF and image tests
//! need Poppler and Tesseract installed, so they are ignored by default.

use std::{fs, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    Command::cargo_bin("cv-extract").unwrap()
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_extract_text_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cv.txt");
    fs::write(&path, "Senior Devel0per\n\n\n\nHanoi").unwrap();

    cmd()
        .arg("extract")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status":"ok""#))
        .stdout(predicate::str::contains("Senior Developer"));
}

#[test]
fn test_extract_writes_cache_dir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cv.txt");
    let cache_dir = dir.path().join("cache");
    fs::write(&path, "Kỹ sư phần mềm").unwrap();

    for _ in 0..2 {
        cmd()
            .arg("extract")
            .arg(&path)
            .arg("--cache-dir")
            .arg(&cache_dir)
            .assert()
            .success()
            .stdout(predicate::str::contains("Kỹ sư phần mềm"));
    }

    let names = fs::read_dir(&cache_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with("-text-extraction.txt"));
}

#[test]
fn test_extract_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jd.txt");
    let out = dir.path().join("out.jsonl");
    fs::write(&path, "Position: Backend Developer").unwrap();

    cmd()
        .arg("extract")
        .arg(&path)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let written = fs::read_to_string(&out).unwrap();
    assert_eq!(written.lines().count(), 1);
    assert!(written.contains("Backend Developer"));
}

#[test]
fn test_parse_contact_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cv.txt");
    fs::write(&path, "Email: a@b.com\nsome text\nPhone: 0912345678\n").unwrap();

    cmd()
        .arg("parse")
        .arg("--kind")
        .arg("cv")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("a@b.com"))
        .stdout(predicate::str::contains("0912345678"))
        .stdout(predicate::str::contains("cv_sections"));
}

#[test]
fn test_parse_job_title() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jd.txt");
    fs::write(&path, "ACME Corp\nPosition: Backend Developer\n").unwrap();

    cmd()
        .arg("parse")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""job_title":"Backend Developer""#));
}

#[test]
fn test_unsupported_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blob.bin");
    fs::write(&path, [0u8, 1, 2, 3]).unwrap();

    cmd()
        .arg("extract")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""status":"failed""#))
        .stdout(predicate::str::contains("blob.bin"));

    cmd()
        .arg("extract")
        .arg(&path)
        .arg("--allowed-failure-rate")
        .arg("1.0")
        .assert()
        .success();
}

#[test]
fn test_schema() {
    for schema_type in ["ExtractOutput", "ParseOutput", "CorrectionTable"] {
        cmd()
            .arg("schema")
            .arg(schema_type)
            .assert()
            .success()
            .stdout(predicate::str::contains("$schema"));
    }
}

#[test]
#[ignore = "Requires pdftotext"]
fn test_extract_pdf_text_layer() {
    cmd()
        .arg("extract")
        .arg("tests/fixtures/two_pages.pdf")
        .arg("--min-meaningful-length")
        .arg("5")
        .assert()
        .success()
        .stdout(predicate::str::contains("Page one"))
        .stdout(predicate::str::contains("Page two"));
}
