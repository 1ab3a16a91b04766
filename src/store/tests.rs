use std::time::Duration;

use super::*;
use crate::testing::mock_redis::{MockRedisServer, SilentServer};
use crate::types::Framerate;

#[tokio::test]
async fn test_load_configuration_defaults() {
    let store = MemoryStore::new();
    let cfg = load_configuration(&store).await.unwrap();

    assert!(cfg.enabled);
    assert_eq!(cfg.name.as_str(), "Checkin Cast");
    assert_eq!(cfg.framerate, Framerate::Fps30);
}

#[tokio::test]
async fn test_load_configuration_stored_values() {
    let store = MemoryStore::with_entries([
        (keys::ENABLED, "false"),
        (keys::NAME, "Room A"),
        (keys::FRAMERATE, "60"),
    ]);
    let cfg = load_configuration(&store).await.unwrap();

    assert!(!cfg.enabled);
    assert_eq!(cfg.name.as_str(), "Room A");
    assert_eq!(cfg.framerate, Framerate::Fps60);
}

#[tokio::test]
async fn test_load_configuration_rejects_bad_framerate() {
    let store = MemoryStore::with_entries([(keys::FRAMERATE, "45")]);
    let err = load_configuration(&store).await.unwrap_err();

    match err {
        SupervisorError::ConfigValidation { field, .. } => assert_eq!(field, keys::FRAMERATE),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_load_configuration_rejects_bad_name_and_flag() {
    let store = MemoryStore::with_entries([(keys::NAME, "x; rm -rf /")]);
    let err = load_configuration(&store).await.unwrap_err();
    assert!(err.is_config_error());
    assert!(err.to_string().contains(keys::NAME));

    let store = MemoryStore::with_entries([(keys::ENABLED, "maybe")]);
    assert!(load_configuration(&store).await.unwrap_err().is_config_error());
}

#[tokio::test]
async fn test_save_then_load() {
    let store = MemoryStore::new();
    let cfg = Configuration::enabled(DeviceName::new("Lobby").unwrap(), Framerate::Fps24);

    save_configuration(&store, &cfg).await.unwrap();

    assert_eq!(store.value(keys::ENABLED).as_deref(), Some("true"));
    assert_eq!(load_configuration(&store).await.unwrap(), cfg);
}

#[tokio::test]
async fn test_memory_subscription_filters_channel() {
    let store = MemoryStore::new();
    let mut sub = store.subscribe("airplay_cmd").await.unwrap();

    store.broadcast("other", "stop");
    store.broadcast("airplay_cmd", "restart");

    let msg = tokio::time::timeout(Duration::from_secs(1), sub.next_message())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.as_deref(), Some("restart"));
}

#[tokio::test]
async fn test_memory_publish_reaches_watchers() {
    let store = MemoryStore::new();
    let mut watch = store.watch_published();

    let receivers = store.publish("airplay_state", "{}").await.unwrap();
    assert_eq!(receivers, 1);
    assert_eq!(
        watch.recv().await.unwrap(),
        ("airplay_state".to_string(), "{}".to_string())
    );
}

#[test]
fn test_redis_address_parsing() {
    let addr: RedisAddress = "redis://cache.local:6380/2".parse().unwrap();
    assert_eq!(addr.host, "cache.local");
    assert_eq!(addr.port, 6380);
    assert_eq!(addr.db, 2);

    let addr: RedisAddress = "10.0.0.5:7000".parse().unwrap();
    assert_eq!((addr.host.as_str(), addr.port, addr.db), ("10.0.0.5", 7000, 0));

    let addr: RedisAddress = "redis://".parse().unwrap();
    assert_eq!(addr, RedisAddress::default());
    assert_eq!(addr.to_string(), "redis://127.0.0.1:6379/0");

    assert!("redis://host:port".parse::<RedisAddress>().is_err());
    assert!("redis://host:6379/zero".parse::<RedisAddress>().is_err());
}

#[tokio::test]
async fn test_redis_store_roundtrip() {
    let server = MockRedisServer::start().await.unwrap();
    server.insert(keys::NAME, "Room B").await;

    let store = RedisStore::new(server.address());
    assert_eq!(store.get(keys::NAME).await.unwrap().as_deref(), Some("Room B"));
    assert_eq!(store.get(keys::ENABLED).await.unwrap(), None);

    store.set(keys::STATE, "idle").await.unwrap();
    assert_eq!(server.value(keys::STATE).await.as_deref(), Some("idle"));

    store.delete(keys::STATE).await.unwrap();
    assert_eq!(server.value(keys::STATE).await, None);

    let cfg = load_configuration(&store).await.unwrap();
    assert_eq!(cfg.name.as_str(), "Room B");
}

#[tokio::test]
async fn test_redis_store_reconnects_after_drop() {
    let server = MockRedisServer::start().await.unwrap();
    let store = RedisStore::new(server.address());

    store.set(keys::NAME, "Room C").await.unwrap();
    server.disconnect_all();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // First call after the hangup fails and discards the connection
    let first = store.get(keys::NAME).await;
    let value = match first {
        Ok(value) => value,
        Err(_) => store.get(keys::NAME).await.unwrap(),
    };
    assert_eq!(value.as_deref(), Some("Room C"));
}

#[tokio::test]
async fn test_redis_store_unreachable() {
    let mut server = MockRedisServer::start().await.unwrap();
    let address = server.address();
    server.stop().await;
    drop(server);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let store = RedisStore::new(address);
    assert!(store.get(keys::NAME).await.is_err());
}

#[tokio::test]
async fn test_redis_publish_and_subscribe() {
    let server = MockRedisServer::start().await.unwrap();
    let source = RedisCommandSource::new(server.address());
    let mut sub = source.subscribe("airplay_cmd").await.unwrap();

    let store = RedisStore::new(server.address());
    store.publish("other", "ignored").await.unwrap();
    let receivers = store.publish("airplay_cmd", "restart").await.unwrap();
    assert_eq!(receivers, 1);

    let msg = tokio::time::timeout(Duration::from_secs(1), sub.next_message())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.as_deref(), Some("restart"));
}

#[tokio::test]
async fn test_redis_subscription_reports_disconnect() {
    let server = MockRedisServer::start().await.unwrap();
    let source = RedisCommandSource::new(server.address());
    let mut sub = source.subscribe("airplay_cmd").await.unwrap();

    server.disconnect_all();

    let result = tokio::time::timeout(Duration::from_secs(1), sub.next_message())
        .await
        .unwrap();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_redis_store_gives_up_on_silent_server() {
    let server = SilentServer::start().await.unwrap();
    let store = RedisStore::new(server.address()).with_timeout(Duration::from_millis(100));

    let started = std::time::Instant::now();
    let err = store.get(keys::NAME).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Store { .. }), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(1));

    // The stalled connection is discarded, so later calls fail just as fast
    assert!(store.publish("airplay_state", "{}").await.is_err());
    assert!(store.set(keys::STATE, "idle").await.is_err());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_redis_subscribe_gives_up_on_silent_server() {
    let server = SilentServer::start().await.unwrap();
    let source = RedisCommandSource::new(server.address()).with_timeout(Duration::from_millis(100));

    let result = tokio::time::timeout(Duration::from_secs(1), source.subscribe("airplay_cmd"))
        .await
        .unwrap();
    assert!(matches!(
        result,
        Err(SupervisorError::CommandChannelDisconnect { .. })
    ));
}

#[test]
fn test_local_settings_parse() {
    let settings = LocalSettings::parse(
        "[main]\nfoo = bar\n\n[airplay]\nairplay_name = Lobby TV \n\n[viewer]\naudio_output = headphones\n",
    )
    .unwrap();

    assert_eq!(settings.airplay_name.as_deref(), Some("Lobby TV"));
    assert_eq!(settings.audio_output.as_deref(), Some("headphones"));

    let empty = LocalSettings::parse("[airplay]\nairplay_name =\n").unwrap();
    assert_eq!(empty, LocalSettings::default());
}

#[tokio::test]
async fn test_local_settings_missing_or_broken_file() {
    let dir = tempfile::TempDir::new().unwrap();
    assert_eq!(LocalSettings::load(&dir.path().join("screenly.conf")).await, None);

    let broken = dir.path().join("broken.conf");
    std::fs::write(&broken, "[airplay\nairplay_name = x\n").unwrap();
    assert_eq!(LocalSettings::load(&broken).await, None);

    let good = dir.path().join("good.conf");
    std::fs::write(&good, "[airplay]\nairplay_name = Hall\n").unwrap();
    let loaded = LocalSettings::load(&good).await.unwrap();
    assert_eq!(loaded.airplay_name.as_deref(), Some("Hall"));
}

#[tokio::test]
async fn test_local_name_is_a_fallback() {
    let local = LocalSettings {
        airplay_name: Some("From File".to_string()),
        audio_output: None,
    };

    let cfg = load_configuration_with(&MemoryStore::new(), Some(&local))
        .await
        .unwrap();
    assert_eq!(cfg.name.as_str(), "From File");

    let store = MemoryStore::with_entries([(keys::NAME, "From Store")]);
    let cfg = load_configuration_with(&store, Some(&local)).await.unwrap();
    assert_eq!(cfg.name.as_str(), "From Store");

    let bad = LocalSettings {
        airplay_name: Some("x; reboot".to_string()),
        audio_output: None,
    };
    let err = load_configuration_with(&MemoryStore::new(), Some(&bad))
        .await
        .unwrap_err();
    assert!(err.is_config_error());
}
