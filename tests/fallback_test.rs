use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const FALLBACK_WARNING: &str = "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage.";

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let mut cmd = Command::new(cargo_bin!("scheduled-orders"));
    cmd.env_remove("RUST_LOG")
        .arg("--db-path")
        .arg("some_db")
        .args(["list", "--user", "user-1"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("[]"))
        .stderr(predicate::str::contains(FALLBACK_WARNING));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_no_fallback_warning() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut cmd = Command::new(cargo_bin!("scheduled-orders"));
    cmd.env_remove("RUST_LOG")
        .arg("--db-path")
        .arg(&db_path)
        .args(["list", "--user", "user-1"]);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains(FALLBACK_WARNING).not());
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_schedule_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    Command::new(cargo_bin!("scheduled-orders"))
        .arg("--db-path")
        .arg(&db_path)
        .args(["--addresses", "tests/fixtures/addresses.csv"])
        .args(["schedule", "--user", "user-1", "--address", "home"])
        .args(["--in-minutes", "45"])
        .arg("tests/fixtures/cart.csv")
        .assert()
        .success();

    Command::new(cargo_bin!("scheduled-orders"))
        .arg("--db-path")
        .arg(&db_path)
        .args(["list", "--user", "user-1", "--status", "pending"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"user_id\": \"user-1\""));
}
