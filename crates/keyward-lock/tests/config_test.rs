// Configuration loading tests

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use keyward_lock::{LeasedLock, LockClient, LockConfig};
use keyward_store::MemoryStore;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = write_config(
        r#"
namespace = "orders"
lease_ms = 5000
watchdog_lease_ms = 9000
renew_ratio = 3

[retry]
initial_backoff_ms = 20
max_backoff_ms = 400
multiplier = 1.5
jitter = false
"#,
    );

    let config = LockConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.namespace, "orders");
    assert_eq!(config.lease(), Duration::from_secs(5));
    // Unset keys keep their defaults
    assert_eq!(config.renew_timeout_ms, 1_000);

    let watchdog = config.watchdog_settings().unwrap();
    assert_eq!(watchdog.lease, Duration::from_secs(9));
    assert_eq!(watchdog.interval, Duration::from_secs(3));

    let retry = config.retry_policy();
    assert_eq!(retry.initial_backoff, Duration::from_millis(20));
    assert_eq!(retry.max_backoff, Duration::from_millis(400));
    assert!(!retry.jitter);

    assert_eq!(config.key("invoice-42").unwrap().as_str(), "orders::invoice-42");
}

#[test]
fn test_load_without_file_uses_defaults() {
    let config = LockConfig::load(None).unwrap();
    assert_eq!(config.namespace, "public");
    assert_eq!(config.lease(), Duration::from_secs(30));
}

#[test]
fn test_load_rejects_invalid_values() {
    let file = write_config("renew_ratio = 1\n");
    let err = LockConfig::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("renew ratio"));
}

#[test]
fn test_load_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(LockConfig::load(Some(&path)).is_err());
}

#[tokio::test]
async fn test_components_from_config() {
    let config = LockConfig {
        watchdog_lease_ms: 6_000,
        ..Default::default()
    };
    let store = Arc::new(MemoryStore::new());

    let lock = LeasedLock::from_config(store, &config).unwrap();
    assert_eq!(lock.settings().interval, Duration::from_secs(2));

    let client = LockClient::from_config(Arc::new(lock), &config).unwrap();
    let key = config.key("job").unwrap();
    let token = client.acquire(&key, config.lease(), None).await.unwrap();
    client.release(&key, &token).await.unwrap();
}
