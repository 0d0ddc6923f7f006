use crate::config::{Config, DeviceConfig};
use std::collections::HashMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

fn create_test_config(dir: &TempDir, contents: &str) -> PathBuf {
    let config_path = dir.path().join(".adbhostconfig");
    fs::write(&config_path, contents).unwrap();
    config_path
}

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_empty_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_test_config(&temp_dir, "");

    let config = Config::load_from_path(&config_path);
    assert_eq!(config, Config::default());
    assert_eq!(config.endpoint().to_string(), "127.0.0.1:5037");
    assert_eq!(config.adb_path(), "adb");
}

#[test]
fn test_missing_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::load_from_path(&temp_dir.path().join("nope"));
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_loading() {
    let temp_dir = TempDir::new().unwrap();
    let config_contents = r#"
[server]
host = "10.0.0.5"
port = 5038
adb_path = "/opt/platform-tools/adb"

[timeouts]
connect_ms = 2000
read_ms = 0

[tracker]
reconnect_delay_ms = 250
restart_after_attempts = 3
long_format = true

[alias]
ls = "shell ls -la"

[device.abc123]
name = "Test Phone"
"#;
    let config_path = create_test_config(&temp_dir, config_contents);
    let config = Config::load_from_path(&config_path);

    assert_eq!(config.endpoint().to_string(), "10.0.0.5:5038");
    assert_eq!(config.adb_path(), "/opt/platform-tools/adb");

    let timeouts = config.timeouts();
    assert_eq!(timeouts.connect, Duration::from_millis(2000));
    assert_eq!(timeouts.read, None);
    assert_eq!(timeouts.write, Some(Duration::from_millis(5000)));

    let tracker = config.tracker_settings();
    assert_eq!(tracker.reconnect_delay, Duration::from_millis(250));
    assert_eq!(tracker.restart_after_attempts, 3);
    assert!(tracker.long_format);

    assert_eq!(config.resolve_alias("ls"), "shell ls -la");
    assert_eq!(config.get_device_name("abc123"), Some("Test Phone".to_string()));
}

#[test]
fn test_default_tracker_settings() {
    let settings = Config::default().tracker_settings();
    assert_eq!(settings.reconnect_delay, Duration::from_secs(1));
    assert_eq!(settings.restart_after_attempts, 10);
    assert!(!settings.long_format);
}

#[test]
fn test_invalid_toml_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_test_config(&temp_dir, "this is not valid toml");

    let config = Config::load_from_path(&config_path);
    assert!(config.alias.is_empty());
    assert!(config.devices.is_empty());
}

#[test]
fn test_wrongly_typed_value_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_test_config(
        &temp_dir,
        r#"
[server]
port = "not a number"
"#,
    );

    let config = Config::load_from_path(&config_path);
    assert_eq!(config.server.port, 5037);
}

#[test]
fn test_tilde_expansion_in_adb_path() {
    let mut config = Config::default();
    config.server.adb_path = "~/Android/Sdk/platform-tools/adb".to_string();
    let expanded = config.adb_path();
    assert!(!expanded.starts_with('~'));
    assert!(expanded.ends_with("/Android/Sdk/platform-tools/adb"));
}

#[test]
fn test_env_overrides() {
    let mut config = Config::default();
    config.apply_env_overrides(env(&[
        ("ADB_SERVER_HOST", "192.168.1.20"),
        ("ADB_SERVER_PORT", "6000"),
        ("ADB_PATH", "/usr/local/bin/adb"),
    ]));
    assert_eq!(config.endpoint().to_string(), "192.168.1.20:6000");
    assert_eq!(config.server.adb_path, "/usr/local/bin/adb");
}

#[test]
fn test_android_port_variable_and_precedence() {
    let mut config = Config::default();
    config.apply_env_overrides(env(&[("ANDROID_ADB_SERVER_PORT", "5040")]));
    assert_eq!(config.server.port, 5040);

    let mut config = Config::default();
    config.apply_env_overrides(env(&[
        ("ADB_SERVER_PORT", "5041"),
        ("ANDROID_ADB_SERVER_PORT", "5040"),
    ]));
    assert_eq!(config.server.port, 5041);
}

#[test]
fn test_invalid_env_port_is_ignored() {
    let mut config = Config::default();
    config.apply_env_overrides(env(&[("ADB_SERVER_PORT", "banana"), ("ADB_SERVER_HOST", "")]));
    assert_eq!(config.server.port, 5037);
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn test_alias_resolution() {
    let mut config = Config::default();
    config
        .alias
        .insert("ll".to_string(), "ls -l /sdcard".to_string());

    assert_eq!(config.resolve_alias("ll"), "ls -l /sdcard");
    assert_eq!(config.resolve_alias("unknown"), "unknown");
}

#[test]
fn test_device_name_lookup() {
    let mut config = Config::default();
    config.devices.insert(
        "ABC123".to_string(),
        DeviceConfig {
            name: Some("Test Device".to_string()),
        },
    );
    config.devices.insert(
        "phone1".to_string(),
        DeviceConfig {
            name: Some("First Phone".to_string()),
        },
    );
    config.devices.insert(
        "phone2".to_string(),
        DeviceConfig {
            name: Some("Second Phone".to_string()),
        },
    );
    config
        .devices
        .insert("nameless".to_string(), DeviceConfig { name: None });

    assert_eq!(config.get_device_name("abc123"), Some("Test Device".to_string()));
    assert_eq!(config.get_device_name("ABC"), Some("Test Device".to_string()));
    assert_eq!(config.get_device_name("phone1"), Some("First Phone".to_string()));
    // Ambiguous prefix
    assert_eq!(config.get_device_name("phone"), None);
    assert_eq!(config.get_device_name("nameless"), None);
    assert_eq!(config.get_device_name("unknown"), None);
}
