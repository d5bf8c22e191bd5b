use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn workspace(name: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("config.xml");
    fs::copy(fixture(name), &config).expect("copy fixture");
    (dir, config)
}

fn fwcfg() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("fwcfg"))
}

fn backups(dir: &Path) -> usize {
    fs::read_dir(dir)
        .expect("read_dir")
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
        .count()
}

#[test]
fn add_vlan_writes_vlan_and_assignment() {
    let (dir, config) = workspace("fixtures/pfsense-base.xml");

    fwcfg()
        .arg("--config")
        .arg(&config)
        .arg("--no-reload")
        .args(["add-vlan", "--parent", "igb1", "--vlan-id", "20", "--ip", "10.0.20.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vlan parent=igb1 tag=20"))
        .stdout(predicate::str::contains("status=added"))
        .stdout(predicate::str::contains("- assignment: vlan20"))
        .stdout(predicate::str::contains("reload=skipped"));

    let written = fs::read_to_string(&config).expect("read");
    assert!(written.contains("\t\t\t<tag>20</tag>\n"));
    assert!(written.contains("\t\t<vlan20>\n\t\t\t<if>vlan20</if>\n"));
    assert!(written.contains("<subnet>255.255.255.0</subnet>"));
    assert_eq!(backups(dir.path()), 1);
}

#[test]
fn add_vlan_twice_is_a_no_op() {
    let (dir, config) = workspace("fixtures/pfsense-base.xml");
    let args = ["add-vlan", "--parent", "igb1", "--vlan-id", "30"];

    fwcfg()
        .arg("--config")
        .arg(&config)
        .arg("--no-reload")
        .args(args)
        .assert()
        .success();
    let first = fs::read(&config).expect("read");

    fwcfg()
        .arg("--config")
        .arg(&config)
        .arg("--no-reload")
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains("status=already_present"))
        .stdout(predicate::str::contains("reload=not_needed"));

    assert_eq!(fs::read(&config).expect("read"), first);
    assert_eq!(backups(dir.path()), 2);
}

#[test]
fn dry_run_leaves_config_and_takes_no_snapshot() {
    let (dir, config) = workspace("fixtures/opnsense-base.xml");
    let original = fs::read(&config).expect("read");

    fwcfg()
        .arg("--config")
        .arg(&config)
        .arg("--dry-run")
        .args(["add-vlan", "--parent", "vtnet0", "--vlan-id", "40"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dry_run"))
        .stdout(predicate::str::contains("<tag>40</tag>"));

    assert_eq!(fs::read(&config).expect("read"), original);
    assert_eq!(backups(dir.path()), 0);
}

#[test]
fn json_output_reports_platform_and_device() {
    let (_dir, config) = workspace("fixtures/opnsense-base.xml");

    fwcfg()
        .arg("--config")
        .arg(&config)
        .args(["--no-reload", "--format", "json"])
        .args(["add-vlan", "--parent", "vtnet0", "--vlan-id", "40"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""platform": "opnsense""#))
        .stdout(predicate::str::contains(r#""device": "vlan40""#))
        .stdout(predicate::str::contains(r#""status": "added""#));
}

#[test]
fn backup_dir_receives_snapshot() {
    let (dir, config) = workspace("fixtures/pfsense-base.xml");
    let backups_dir = dir.path().join("backups");
    fs::create_dir(&backups_dir).expect("mkdir");

    fwcfg()
        .arg("--config")
        .arg(&config)
        .arg("--backup-dir")
        .arg(&backups_dir)
        .arg("--no-reload")
        .args(["add-vlan", "--parent", "igb1", "--vlan-id", "50"])
        .assert()
        .success()
        .stdout(predicate::str::contains("snapshot="));

    assert_eq!(backups(&backups_dir), 1);
    assert_eq!(backups(dir.path()), 0);
}

#[test]
fn invalid_ip_fails_without_touching_config() {
    let (dir, config) = workspace("fixtures/pfsense-base.xml");
    let original = fs::read(&config).expect("read");

    fwcfg()
        .arg("--config")
        .arg(&config)
        .args(["add-vlan", "--parent", "igb1", "--vlan-id", "20", "--ip", "10.0.20"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid input"));

    assert_eq!(fs::read(&config).expect("read"), original);
    assert_eq!(backups(dir.path()), 0);
}

#[test]
fn out_of_range_tag_is_rejected() {
    let (_dir, config) = workspace("fixtures/pfsense-base.xml");

    fwcfg()
        .arg("--config")
        .arg(&config)
        .args(["add-vlan", "--parent", "igb1", "--vlan-id", "4095"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid input"));
}

#[test]
fn missing_vlans_section_is_reported() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("config.xml");
    fs::write(&config, "<pfsense><interfaces/></pfsense>").expect("write");

    fwcfg()
        .arg("--config")
        .arg(&config)
        .arg("--no-reload")
        .args(["add-vlan", "--parent", "igb1", "--vlan-id", "20"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no <vlans> section"));

    assert_eq!(
        fs::read_to_string(&config).expect("read"),
        "<pfsense><interfaces/></pfsense>"
    );
}

#[test]
fn reload_failure_is_reported_after_write() {
    let (dir, config) = workspace("fixtures/pfsense-base.xml");
    let settings = dir.path().join("fwcfg.toml");
    fs::write(&settings, "[reload]\nfull = \"false\"\n").expect("write settings");

    fwcfg()
        .arg("--config")
        .arg(&config)
        .arg("--settings")
        .arg(&settings)
        .args(["add-vlan", "--parent", "igb1", "--vlan-id", "20"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reload command false exited"));

    let written = fs::read_to_string(&config).expect("read");
    assert!(written.contains("<tag>20</tag>"));
    assert_eq!(backups(dir.path()), 1);
}

#[test]
fn settings_supply_config_path_and_reload_program() {
    let (dir, config) = workspace("fixtures/pfsense-base.xml");
    let settings = dir.path().join("fwcfg.toml");
    fs::write(
        &settings,
        format!(
            "config = {:?}\n\n[reload]\nfull = \"true\"\n",
            config.display().to_string()
        ),
    )
    .expect("write settings");

    fwcfg()
        .arg("--settings")
        .arg(&settings)
        .args(["add-vlan", "--parent", "igb1", "--vlan-id", "60"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reload=completed"));

    assert!(fs::read_to_string(&config)
        .expect("read")
        .contains("<tag>60</tag>"));
}

#[test]
fn missing_required_argument_exits_one() {
    fwcfg()
        .args(["add-vlan", "--parent", "igb1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--vlan-id"));
}
