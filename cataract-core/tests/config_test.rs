//! Configuration loading and serialization tests

use cataract_core::config::ScanConfig;
use cataract_core::{CircleSelection, ScanError};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_default_config_is_valid() {
    assert!(ScanConfig::default().validate().is_ok());
}

#[test]
fn test_config_json_roundtrip() {
    let mut config = ScanConfig::default();
    config.circles.selection = CircleSelection::MostCentral;
    config.region.cascade_path = Some(PathBuf::from("/srv/cascades/eye.xml"));

    let json = serde_json::to_string(&config).unwrap();
    let parsed = ScanConfig::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_config_toml_roundtrip() {
    let config = ScanConfig::default();
    let text = toml::to_string(&config).unwrap();
    let parsed = ScanConfig::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scan.toml");
    std::fs::write(
        &path,
        r#"
model_path = "/var/lib/cataract"

[preprocess]
canonical_size = [640, 640]
search_radius = 384.0

[circles]
selection = "largest"
"#,
    )
    .unwrap();

    let config = ScanConfig::from_file(&path).unwrap();
    assert_eq!(config.preprocess.canonical_size, (640, 640));
    assert_eq!(config.preprocess.search_radius, 384.0);
    assert_eq!(config.circles.selection, CircleSelection::Largest);
    assert_eq!(config.model_path, PathBuf::from("/var/lib/cataract"));
    assert_eq!(config.preprocess.blur_kernel, 5);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_from_missing_file() {
    match ScanConfig::from_file("/no/such/scan.toml") {
        Err(ScanError::Io(_)) => {}
        other => panic!("Expected Io error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_config_unknown_selection_rejected() {
    let result = ScanConfig::from_str("[circles]\nselection = \"brightest\"\n");
    assert!(matches!(result, Err(ScanError::Config(_))));
}
