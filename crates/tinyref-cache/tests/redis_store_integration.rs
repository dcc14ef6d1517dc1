use std::collections::HashMap;
use std::time::Duration;

use tinyref_cache::{RedisStore, RedisStoreConfig};
use tinyref_core::{base62, GroupKey, StorageBackend};
use tinyref_test_infra::RedisServer;

struct Fixture {
    _redis: RedisServer,
    conn: redis::aio::MultiplexedConnection,
}

impl Fixture {
    async fn start() -> Self {
        let redis = RedisServer::new().await.expect("start redis");
        let url = redis.url().await.expect("redis url");
        let client = redis::Client::open(url).expect("redis client");
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .expect("redis connection");
        Self {
            _redis: redis,
            conn,
        }
    }

    fn store(&self, config: RedisStoreConfig) -> RedisStore {
        RedisStore::with_config(self.conn.clone(), config)
    }
}

fn group() -> GroupKey {
    GroupKey::from("test")
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn cache_tier_never_creates() {
    let fixture = Fixture::start().await;
    let store = fixture.store(RedisStoreConfig::default());

    let resolved = store
        .get_ids(&strings(&["uncached"]), &group(), true)
        .await
        .unwrap();
    assert_eq!(resolved["uncached"], None);
}

#[tokio::test]
async fn authoritative_store_allocates_and_round_trips() {
    let fixture = Fixture::start().await;
    let store = fixture.store(RedisStoreConfig::builder().authoritative(true).build());

    let resolved = store
        .get_ids(&strings(&["http://google.com"]), &group(), true)
        .await
        .unwrap();
    let id = resolved["http://google.com"].clone().expect("created");

    let back = store.get_string(&id).await.unwrap();
    assert_eq!(back.as_deref(), Some("http://google.com"));

    let again = store
        .get_ids(&strings(&["http://google.com"]), &group(), true)
        .await
        .unwrap();
    assert_eq!(again["http://google.com"], Some(id));
}

#[tokio::test]
async fn authoritative_batch_gets_contiguous_ids() {
    let fixture = Fixture::start().await;
    let store = fixture.store(RedisStoreConfig::builder().authoritative(true).build());

    let batch = strings(&["one", "two", "three"]);
    let resolved = store.get_ids(&batch, &group(), true).await.unwrap();

    let mut numbers: Vec<u64> = batch
        .iter()
        .map(|s| {
            let id = resolved[s].clone().expect("created");
            base62::decode(id.as_str())
                .unwrap()
                .to_u64_digits()
                .first()
                .copied()
                .unwrap_or(0)
        })
        .collect();
    numbers.sort_unstable();

    assert_eq!(numbers[1], numbers[0] + 1);
    assert_eq!(numbers[2], numbers[0] + 2);
}

#[tokio::test]
async fn backfill_is_readable_in_both_directions() {
    let fixture = Fixture::start().await;
    let store = fixture.store(RedisStoreConfig::default());

    let id = base62::encode_u64(42);
    let mut forward = HashMap::new();
    forward.insert("potato".to_string(), id.clone());
    store.cache_id_results(&forward, &group()).await.unwrap();

    let by_string = store
        .get_ids(&strings(&["potato"]), &group(), false)
        .await
        .unwrap();
    assert_eq!(by_string["potato"], Some(id.clone()));

    let by_id = store.get_string(&id).await.unwrap();
    assert_eq!(by_id.as_deref(), Some("potato"));
}

#[tokio::test]
async fn reverse_backfill_populates_reverse_direction_only() {
    let fixture = Fixture::start().await;
    let store = fixture.store(RedisStoreConfig::default());

    let id = base62::encode_u64(7);
    let mut reverse = HashMap::new();
    reverse.insert(id.clone(), "carrot".to_string());
    store.cache_string_results(&reverse).await.unwrap();

    let by_id = store.get_string(&id).await.unwrap();
    assert_eq!(by_id.as_deref(), Some("carrot"));

    let by_string = store
        .get_ids(&strings(&["carrot"]), &group(), false)
        .await
        .unwrap();
    assert_eq!(by_string["carrot"], None);
}

#[tokio::test]
async fn entries_honor_the_configured_ttl() {
    let fixture = Fixture::start().await;
    let store = fixture.store(
        RedisStoreConfig::builder()
            .ttl(Duration::from_secs(1))
            .build(),
    );

    let id = base62::encode_u64(99);
    let mut forward = HashMap::new();
    forward.insert("ephemeral".to_string(), id.clone());
    store.cache_id_results(&forward, &group()).await.unwrap();

    let warm = store.get_string(&id).await.unwrap();
    assert_eq!(warm.as_deref(), Some("ephemeral"));

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let expired = store.get_string(&id).await.unwrap();
    assert_eq!(expired, None);
}

#[tokio::test]
async fn group_keys_partition_the_forward_direction() {
    let fixture = Fixture::start().await;
    let store = fixture.store(RedisStoreConfig::default());

    let id = base62::encode_u64(5);
    let mut forward = HashMap::new();
    forward.insert("shared".to_string(), id.clone());
    store
        .cache_id_results(&forward, &GroupKey::from("alpha"))
        .await
        .unwrap();

    let same_group = store
        .get_ids(&strings(&["shared"]), &GroupKey::from("alpha"), false)
        .await
        .unwrap();
    assert_eq!(same_group["shared"], Some(id));

    let other_group = store
        .get_ids(&strings(&["shared"]), &GroupKey::from("beta"), false)
        .await
        .unwrap();
    assert_eq!(other_group["shared"], None);
}
