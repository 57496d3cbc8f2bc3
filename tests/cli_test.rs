//! Smoke tests for the mboxidx binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const ARCHIVE: &[u8] = b"From alice@example.com Fri Feb 24 15:13:20 +0000 2023\n\
From: Alice <alice@example.com>\n\
Subject: hello\n\
Date: Mon, 27 Feb 2023 07:30:00 +0000\n\n\
first body\n\
From bob@example.com Fri Feb 24 16:00:00 +0000 2023\n\
From: Bob <bob@example.com>\n\
Subject: world\n\n\
second body\n";

fn write_archive() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(ARCHIVE).unwrap();
    file.flush().unwrap();
    file
}

fn mboxidx() -> Command {
    Command::new(env!("CARGO_BIN_EXE_mboxidx"))
}

#[test]
fn test_parse_and_print() {
    let archive = write_archive();

    mboxidx()
        .arg(archive.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Subject: hello"))
        .stdout(predicate::str::contains("Subject: world"))
        .stderr(predicate::str::contains("2 messages"));
}

#[test]
fn test_missing_file_fails() {
    mboxidx()
        .arg("/no/such/archive.mbox")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_save_then_load_index() {
    let archive = write_archive();
    let dir = TempDir::new().unwrap();
    let idx = dir.path().join("archive.idx");

    mboxidx()
        .arg(archive.path())
        .arg("--save-index")
        .arg(&idx)
        .assert()
        .success()
        .stderr(predicate::str::contains("Index written"));

    let contents = std::fs::read_to_string(&idx).unwrap();
    assert_eq!(contents.lines().count(), 2);

    mboxidx()
        .arg(archive.path())
        .arg("--load-index")
        .arg(&idx)
        .assert()
        .success()
        .stdout(predicate::str::contains("Subject: hello"))
        .stderr(predicate::str::contains("2 messages"));
}

#[test]
fn test_sender_filter() {
    let archive = write_archive();

    mboxidx()
        .arg(archive.path())
        .arg("--sender")
        .arg("bob@")
        .assert()
        .success()
        .stdout(predicate::str::contains("Subject: world"))
        .stdout(predicate::str::contains("Subject: hello").not())
        .stderr(predicate::str::contains("1 messages match"));
}

#[test]
fn test_bad_sort_key() {
    let archive = write_archive();

    mboxidx()
        .arg(archive.path())
        .arg("--sort")
        .arg("sideways")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown sort key"));
}

#[test]
fn test_stats_tally() {
    let archive = write_archive();

    mboxidx()
        .arg(archive.path())
        .arg("--stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("messages by sender"))
        .stdout(predicate::str::contains("alice@example.com"));
}
