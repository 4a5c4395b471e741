#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

const HEADER: &str =
    "type,ref,customer,tenor,otr,admin_fee,interest,asset_name,asset_type,source,reason";

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: onboard and reserve 200000 on tenor 3
    let mut commands1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(commands1, "{HEADER}").unwrap();
    writeln!(commands1, "create,a,3171234567890001,3,200000,0,0,Kulkas,WHITE_GOODS,WEB,").unwrap();

    let mut cmd1 = Command::new(cargo_bin!("lendcore"));
    cmd1.arg("tests/fixtures/customers.csv")
        .arg(commands1.path())
        .arg("--db-path")
        .arg(&db_path);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("1,3,500000,200000,300000"));

    // 2. Second run on the same DB: customers already exist, reserve 100000 more
    let mut commands2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(commands2, "{HEADER}").unwrap();
    writeln!(commands2, "create,b,3171234567890001,3,100000,0,0,Kompor,WHITE_GOODS,WEB,").unwrap();

    let mut cmd2 = Command::new(cargo_bin!("lendcore"));
    cmd2.arg("tests/fixtures/customers.csv")
        .arg(commands2.path())
        .arg("--db-path")
        .arg(&db_path);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    let stderr2 = String::from_utf8_lossy(&output2.stderr);

    // The recovered reservation plus the new one
    assert!(stdout2.contains("1,3,500000,300000,200000"));
    assert!(stderr2.contains("already exists"));
    // Still exactly two customers with four tenors each
    assert_eq!(stdout2.lines().count(), 9);
}
