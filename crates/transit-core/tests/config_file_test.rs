use std::io::Write;
use transit_core::{ConfigError, ConfigManager, TransitConfig};

#[test]
fn test_round_trip_default_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    ConfigManager::create_default_config(&path).unwrap();
    assert!(path.exists());

    let manager = ConfigManager::from_file(&path).unwrap();
    assert_eq!(manager.config_path(), Some(path.as_path()));
    assert_eq!(manager.config().stream.channel_capacity, 64);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[layer]
rag_top_k = 9

[routing]
place_specs_path = "/srv/places.json"
"#
    )
    .unwrap();

    let manager = ConfigManager::from_file(file.path()).unwrap();
    let config = manager.config();
    assert_eq!(config.layer.rag_top_k, 9);
    assert_eq!(config.layer.rag_threshold, 0.5);
    assert_eq!(
        config.routing.place_specs_path.as_deref(),
        Some(std::path::Path::new("/srv/places.json"))
    );
}

#[test]
fn test_invalid_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[token]\ndefault_profile = \"turbo\"").unwrap();

    match ConfigManager::from_file(file.path()) {
        Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("turbo")),
        other => panic!("expected validation error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_file() {
    let result = ConfigManager::from_file(std::path::Path::new("/nonexistent/transit.toml"));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_timeouts_as_durations() {
    let config = TransitConfig::default();
    assert_eq!(config.timeouts.request_deadline().as_secs(), 90);
    assert_eq!(config.timeouts.context_fetch().as_millis(), 3000);
    assert_eq!(config.layer.template_cache_ttl().as_secs(), 300);
}
