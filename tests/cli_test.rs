use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn cli() -> Command {
    let mut cmd = Command::new(cargo_bin!("scheduled-orders"));
    cmd.env_remove("RUST_LOG")
        .arg("--catalog")
        .arg("tests/fixtures/catalog.csv")
        .arg("--addresses")
        .arg("tests/fixtures/addresses.csv");
    cmd
}

#[test]
fn test_cli_bill() {
    let mut cmd = Command::new(cargo_bin!("scheduled-orders"));
    cmd.arg("bill").arg("tests/fixtures/cart.csv");

    // 250 clears the 199 threshold: no delivery fee, 5% tax.
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"subtotal\": \"250\""))
        .stdout(predicate::str::contains("\"delivery_fee\": \"0\""))
        .stdout(predicate::str::contains("\"total_amount\": \"262.50\""));
}

#[test]
fn test_cli_schedule_pending_order() {
    let mut cmd = cli();
    cmd.args(["schedule", "--user", "user-1", "--address", "home"])
        .args(["--in-minutes", "45", "--payment", "DIGITAL"])
        .arg("tests/fixtures/cart.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"pending\""))
        .stdout(predicate::str::contains("\"payment_type\": \"DIGITAL\""))
        .stdout(predicate::str::contains("\"reminder_sent\": false"));
}

#[test]
fn test_cli_schedule_rejects_short_lead_time() {
    let mut cmd = cli();
    cmd.args(["schedule", "--user", "user-1", "--address", "home"])
        .args(["--in-minutes", "10"])
        .arg("tests/fixtures/cart.csv");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("at least 30 minutes"));
}

#[test]
fn test_cli_schedule_rejects_unknown_address() {
    let mut cmd = cli();
    cmd.args(["schedule", "--user", "user-2", "--address", "home"])
        .args(["--in-minutes", "45"])
        .arg("tests/fixtures/cart.csv");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Address home not found"));
}

#[test]
fn test_cli_tick_on_empty_store() {
    let mut cmd = cli();
    cmd.arg("tick");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"skipped\": false"))
        .stdout(predicate::str::contains("\"due\": 0"))
        .stdout(predicate::str::contains("\"orders_placed\": []"));
}

#[test]
fn test_cli_cancel_unknown_order() {
    let mut cmd = cli();
    cmd.args(["cancel", "--user", "user-1", "6f1c2b1e-4f8e-4a8b-9a67-0c8e8f0f6a11"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
