use std::fs;

use snapsync::{parse_object_id, sha256_file, Settings};
use snapsync_core::VerifyMode;
use tempfile::tempdir;

#[test]
fn parse_object_id_accepts_decimal_and_hex() {
    assert_eq!(parse_object_id("160").expect("decimal"), 160);
    assert_eq!(parse_object_id("0xa0").expect("hex"), 0xA0);
    assert_eq!(parse_object_id(" 0XFF ").expect("upper hex"), 0xFF);
    assert!(parse_object_id("0xzz").is_err());
    assert!(parse_object_id("-1").is_err());
}

/// The hash matches the well-known digest of "abc".
#[test]
fn sha256_file_hashes_contents() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("abc.bin");
    fs::write(&path, b"abc").expect("write");

    assert_eq!(
        sha256_file(&path).expect("hash"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert!(sha256_file(&dir.path().join("missing.bin")).is_err());
}

#[test]
fn settings_overrides_win_over_config_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("snapsync.json");
    fs::write(&path, r#"{"matching":{"min_size":32},"verify":"never"}"#).expect("write config");

    let from_file = Settings::load(Some(&path), None, None).expect("load");
    assert_eq!(from_file.config.matching.min_size, 32);
    assert_eq!(from_file.config.verify, VerifyMode::Never);

    let overridden = Settings::load(Some(&path), Some(VerifyMode::Always), Some(8)).expect("load");
    assert_eq!(overridden.config.matching.min_size, 8);
    assert_eq!(overridden.config.verify, VerifyMode::Always);
}

#[test]
fn settings_reject_unknown_config_extension() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("snapsync.toml");
    fs::write(&path, "min_size = 1").expect("write config");

    let err = Settings::load(Some(&path), None, None).expect_err("toml is not supported");
    assert!(err.to_string().contains("Unsupported config extension"));
}
