//! Cache client factory tests

mod common;

use common::{cache_config, CountingConnector, CountingStore};
use parking_lot::Mutex;
use persistence_core::cache::{CacheClient, CacheEvent, CacheError};
use persistence_core::config::{CacheBackendKind, CacheInstanceConfig};
use persistence_core::PersistenceError;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[test]
fn enabled_cache_without_host_is_a_configuration_error() {
    for backend in [CacheBackendKind::Redis, CacheBackendKind::Memory] {
        let config = CacheInstanceConfig {
            enabled: true,
            backend,
            host: "  ".to_string(),
            ..CacheInstanceConfig::named("cms")
        };
        let error = CacheClient::new(config).unwrap_err();
        assert_eq!(error.to_string(), "Missing redis host for cache 'cms'.");
    }
}

#[tokio::test]
async fn disabled_cache_never_opens_a_connection() {
    let store = CountingStore::new();
    let connector = CountingConnector::new(Arc::clone(&store));
    let client = CacheClient::with_connector(cache_config("app", false), connector.clone()).unwrap();

    client.connect().await.unwrap();
    client.disconnect().await.unwrap();

    assert!(!client.is_connected());
    assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn connect_is_reused_and_reports_ready_once() {
    let store = CountingStore::new();
    let connector = CountingConnector::new(Arc::clone(&store));
    let client = CacheClient::with_connector(cache_config("app", true), connector.clone()).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    client.on_event(move |event| sink.lock().push(event.name()));

    client.connect().await.unwrap();
    client.connect().await.unwrap();
    assert!(client.is_connected());
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

    client.disconnect().await.unwrap();
    assert_eq!(*events.lock(), vec!["ready", "end"]);
}

#[tokio::test]
async fn refused_connection_surfaces_error_event_and_fails() {
    let store = CountingStore::new();
    let connector = CountingConnector::new(store);
    connector.refuse.store(true, Ordering::SeqCst);
    let client = CacheClient::with_connector(cache_config("global", true), connector).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    client.on_event(move |event| sink.lock().push(event.clone()));

    let error = client.connect().await.unwrap_err();
    assert!(matches!(error, PersistenceError::Cache(CacheError::ConnectionError(_))));
    assert!(!client.is_connected());
    assert!(matches!(events.lock().as_slice(), [CacheEvent::Error(_)]));
}

#[tokio::test]
async fn memory_backend_is_selected_from_configuration() {
    let client = CacheClient::new(cache_config("app", true)).unwrap();
    client.connect().await.unwrap();
    assert_eq!(client.store().unwrap().backend_name(), "memory");
    client.disconnect().await.unwrap();
    assert!(client.store().is_none());
}
