use std::sync::Arc;
use std::time::Duration;

use sqlx::mysql::MySqlPoolOptions;
use tinyref_cache::{LruStore, RedisStore, RedisStoreConfig};
use tinyref_core::{GroupKey, Minifier, MinifierError, StorageBackend};
use tinyref_storage::{MySqlStore, RetryPolicy};
use tinyref_test_infra::{MySqlServer, RedisServer};

struct Fixture {
    _mysql: MySqlServer,
    _redis: RedisServer,
    lru: Arc<LruStore>,
    redis_store: Arc<RedisStore>,
    mysql_store: Arc<MySqlStore>,
}

impl Fixture {
    async fn start() -> Self {
        let mysql = MySqlServer::with_defaults().await.expect("start mysql");
        let url = mysql.database_url().await.expect("mysql url");
        let pool = connect_with_retry(&url).await;

        sqlx::query(include_str!("../ddl/mysql/minified_strings.sql"))
            .execute(&pool)
            .await
            .expect("create minified_strings");
        sqlx::query(include_str!("../ddl/mysql/minifier_meta.sql"))
            .execute(&pool)
            .await
            .expect("create minifier_meta");

        let redis = RedisServer::new().await.expect("start redis");
        let redis_url = redis.url().await.expect("redis url");
        let client = redis::Client::open(redis_url).expect("redis client");
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .expect("redis connection");

        let retry = RetryPolicy::builder()
            .max_attempts(5)
            .delay(Duration::from_millis(100))
            .build();

        Self {
            _mysql: mysql,
            _redis: redis,
            lru: Arc::new(LruStore::with_capacity(128)),
            redis_store: Arc::new(RedisStore::with_config(
                conn,
                RedisStoreConfig::default(),
            )),
            mysql_store: Arc::new(MySqlStore::with_policy(pool, retry)),
        }
    }

    fn minifier(&self) -> Minifier {
        Minifier::new(vec![
            Arc::clone(&self.lru) as Arc<dyn StorageBackend>,
            Arc::clone(&self.redis_store) as Arc<dyn StorageBackend>,
            Arc::clone(&self.mysql_store) as Arc<dyn StorageBackend>,
        ])
    }
}

async fn connect_with_retry(url: &str) -> sqlx::MySqlPool {
    let mut last_error = None;

    for _ in 0..20 {
        match MySqlPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
        {
            Ok(pool) => return pool,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect mysql: {last_error:?}");
}

fn group() -> GroupKey {
    GroupKey::from("test")
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn resolution_falls_through_to_the_durable_tier() {
    let fixture = Fixture::start().await;
    let minifier = fixture.minifier();

    let id = minifier
        .get_id("https://www.youtube.com/", &group(), true)
        .await
        .unwrap()
        .expect("created");

    // The durable tier holds the mapping even though the request entered
    // through the caches.
    let stored = fixture.mysql_store.get_string(&id).await.unwrap();
    assert_eq!(stored.as_deref(), Some("https://www.youtube.com/"));
}

#[tokio::test]
async fn caches_are_backfilled_after_a_miss() {
    let fixture = Fixture::start().await;
    let minifier = fixture.minifier();

    let id = minifier
        .get_id("http://google.com", &group(), true)
        .await
        .unwrap()
        .expect("created");

    // Both cache tiers can now answer directly.
    let from_lru = fixture
        .lru
        .get_id("http://google.com", &group(), false)
        .await
        .unwrap();
    assert_eq!(from_lru, Some(id.clone()));

    let from_redis = fixture
        .redis_store
        .get_id("http://google.com", &group(), false)
        .await
        .unwrap();
    assert_eq!(from_redis, Some(id));
}

#[tokio::test]
async fn warm_chain_survives_losing_the_front_cache() {
    let fixture = Fixture::start().await;
    let minifier = fixture.minifier();

    let id = minifier
        .get_id("durable", &group(), true)
        .await
        .unwrap()
        .expect("created");

    // A fresh in-process cache simulates a restart. Redis still answers.
    let cold = Minifier::new(vec![
        Arc::new(LruStore::with_capacity(128)) as Arc<dyn StorageBackend>,
        Arc::clone(&fixture.redis_store) as Arc<dyn StorageBackend>,
        Arc::clone(&fixture.mysql_store) as Arc<dyn StorageBackend>,
    ]);

    let resolved = cold
        .get_id("durable", &group(), false)
        .await
        .unwrap();
    assert_eq!(resolved, Some(id));
}

#[tokio::test]
async fn batch_resolution_is_stable_across_repeats() {
    let fixture = Fixture::start().await;
    let minifier = fixture.minifier();

    let batch = strings(&["one", "two", "three", "two"]);
    let first = minifier.resolve_ids(&batch, &group(), true).await.unwrap();
    let second = minifier.resolve_ids(&batch, &group(), true).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[tokio::test]
async fn reverse_lookup_backfills_the_caches() {
    let fixture = Fixture::start().await;
    let minifier = fixture.minifier();

    let id = fixture
        .mysql_store
        .get_id("direct_insert", &group(), true)
        .await
        .unwrap()
        .expect("created");

    let resolved = minifier.get_string(&id).await.unwrap();
    assert_eq!(resolved, "direct_insert");

    let from_lru = fixture.lru.get_string(&id).await.unwrap();
    assert_eq!(from_lru.as_deref(), Some("direct_insert"));

    let from_redis = fixture.redis_store.get_string(&id).await.unwrap();
    assert_eq!(from_redis.as_deref(), Some("direct_insert"));
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let fixture = Fixture::start().await;
    let minifier = fixture.minifier();

    let absent = tinyref_core::base62::encode_u64(123_456);
    let err = minifier.get_string(&absent).await.unwrap_err();
    assert!(matches!(err, MinifierError::NotFound(_)));
}
