use crate::retry::{map_sqlx_error, with_retry, RetryPolicy};
use async_trait::async_trait;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};
use std::collections::HashMap;
use tinyref_core::backend::Result;
use tinyref_core::{base62, BackendError, GroupKey, MinifiedId, StorageBackend};
use tracing::{debug, trace, warn};

/// MySQL implementation of the durable tier, the source of truth for id
/// allocation.
///
/// Allocation is a two-step protocol: an atomic increment-and-fetch on a
/// singleton counter row yields a globally unique integer, then the
/// mapping row is inserted under that id. Distinct strings can never
/// collide (the counter guarantees distinct ids); identical strings
/// submitted concurrently race on the unique `(original_string,
/// group_key)` index, and the loser resolves to the winner's id instead
/// of erroring. An id abandoned by a lost race is never reused.
///
/// All operations go through the retry wrapper in [`crate::retry`], so a
/// primary failover in progress is absorbed rather than surfaced.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
    retry: RetryPolicy,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

impl MySqlStore {
    /// Creates a store from an existing connection pool with the default
    /// retry schedule.
    pub fn new(pool: MySqlPool) -> Self {
        Self::with_policy(pool, RetryPolicy::default())
    }

    /// Creates a store with an explicit retry schedule.
    pub fn with_policy(pool: MySqlPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Creates a store by opening a new connection pool.
    pub async fn connect(database_url: &str) -> std::result::Result<Self, BackendError> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Atomically increments the singleton counter row and returns the
    /// newly allocated id.
    ///
    /// `LAST_INSERT_ID(expr)` pins the fetched value to this connection,
    /// so concurrent allocators cannot observe each other's counter
    /// value. The counter starts at 1; ids are zero-indexed.
    async fn next_id(&self) -> std::result::Result<u64, BackendError> {
        let pool = &self.pool;
        let value = with_retry(&self.retry, "allocate id", move || async move {
            let mut conn = pool.acquire().await?;
            sqlx::query(
                r#"
                INSERT INTO minifier_meta (name, value)
                VALUES ('next_id', LAST_INSERT_ID(1))
                ON DUPLICATE KEY UPDATE value = LAST_INSERT_ID(value + 1)
                "#,
            )
            .execute(&mut *conn)
            .await?;

            let row = sqlx::query("SELECT LAST_INSERT_ID()")
                .fetch_one(&mut *conn)
                .await?;
            row.try_get::<u64, _>(0)
        })
        .await?;

        Ok(value - 1)
    }

    /// Batched lookup of existing mappings for `strings` under `group`.
    async fn select_ids(
        &self,
        strings: &[String],
        group: &GroupKey,
    ) -> std::result::Result<HashMap<String, u64>, BackendError> {
        let pool = &self.pool;
        let rows = with_retry(&self.retry, "lookup ids", move || async move {
            let mut query = QueryBuilder::<MySql>::new(
                "SELECT id, original_string FROM minified_strings WHERE group_key = ",
            );
            query.push_bind(group.as_str());
            query.push(" AND original_string IN (");
            let mut values = query.separated(", ");
            for s in strings {
                values.push_bind(s.as_str());
            }
            query.push(")");
            query.build().fetch_all(pool).await
        })
        .await?;

        let mut found = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: u64 = row.try_get("id").map_err(map_sqlx_error)?;
            let s: String = row.try_get("original_string").map_err(map_sqlx_error)?;
            found.insert(s, id);
        }
        Ok(found)
    }

    /// Inserts a freshly allocated mapping, resolving duplicate-string
    /// races to the winner's id.
    async fn insert_mapping(
        &self,
        id: u64,
        string: &str,
        group: &GroupKey,
    ) -> std::result::Result<u64, BackendError> {
        let pool = &self.pool;
        with_retry(&self.retry, "insert mapping", move || async move {
            let result = sqlx::query(
                r#"
                INSERT INTO minified_strings (id, original_string, group_key)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(string)
            .bind(group.as_str())
            .execute(pool)
            .await;

            match result {
                Ok(_) => Ok(id),
                Err(err) if is_unique_violation(&err) => {
                    // A concurrent writer created this string first. The
                    // id allocated here is abandoned, never reused.
                    let row = sqlx::query(
                        r#"
                        SELECT id FROM minified_strings
                        WHERE group_key = ? AND original_string = ?
                        "#,
                    )
                    .bind(group.as_str())
                    .bind(string)
                    .fetch_one(pool)
                    .await?;
                    row.try_get::<u64, _>("id")
                }
                Err(err) => Err(err),
            }
        })
        .await
    }
}

#[async_trait]
impl StorageBackend for MySqlStore {
    async fn get_ids(
        &self,
        strings: &[String],
        group: &GroupKey,
        create_missing: bool,
    ) -> Result<HashMap<String, Option<MinifiedId>>> {
        if strings.is_empty() {
            return Ok(HashMap::new());
        }

        trace!(count = strings.len(), group = %group, "looking up ids in mysql");
        let found = self.select_ids(strings, group).await?;

        let mut out: HashMap<String, Option<MinifiedId>> = strings
            .iter()
            .map(|s| (s.clone(), found.get(s).map(|&n| base62::encode_u64(n))))
            .collect();

        if !create_missing {
            return Ok(out);
        }

        let missing: Vec<String> = out
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(s, _)| s.clone())
            .collect();

        for s in missing {
            let allocated = self.next_id().await?;
            let winner = self.insert_mapping(allocated, &s, group).await?;
            if winner != allocated {
                debug!(string = %s, "lost duplicate-string race, using winner's id");
            }
            out.insert(s, Some(base62::encode_u64(winner)));
        }

        Ok(out)
    }

    async fn get_strings(
        &self,
        ids: &[MinifiedId],
    ) -> Result<HashMap<MinifiedId, Option<String>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        trace!(count = ids.len(), "looking up strings in mysql");

        let mut out: HashMap<MinifiedId, Option<String>> = HashMap::with_capacity(ids.len());
        let mut numeric: HashMap<u64, MinifiedId> = HashMap::with_capacity(ids.len());
        for id in ids {
            let digits = base62::decode(id.as_str())?.to_u64_digits();
            if digits.len() <= 1 {
                numeric.insert(digits.first().copied().unwrap_or(0), id.clone());
            } else {
                // An id beyond u64 cannot have been allocated here.
                warn!(id = %id, "id exceeds allocator range, reporting absent");
                out.insert(id.clone(), None);
            }
        }

        if numeric.is_empty() {
            return Ok(out);
        }

        let pool = &self.pool;
        let keys: Vec<u64> = numeric.keys().copied().collect();
        let keys = &keys;
        let rows = with_retry(&self.retry, "lookup strings", move || async move {
            let mut query =
                QueryBuilder::<MySql>::new("SELECT id, original_string FROM minified_strings WHERE id IN (");
            let mut values = query.separated(", ");
            for n in keys {
                values.push_bind(n);
            }
            query.push(")");
            query.build().fetch_all(pool).await
        })
        .await?;

        let mut found: HashMap<u64, String> = HashMap::with_capacity(rows.len());
        for row in rows {
            let n: u64 = row.try_get("id").map_err(map_sqlx_error)?;
            let s: String = row.try_get("original_string").map_err(map_sqlx_error)?;
            found.insert(n, s);
        }

        for (n, id) in numeric {
            out.insert(id, found.get(&n).cloned());
        }
        Ok(out)
    }

    async fn cache_id_results(
        &self,
        _results: &HashMap<String, MinifiedId>,
        _group: &GroupKey,
    ) -> Result<()> {
        Err(BackendError::Unsupported(
            "mysql store is a source of truth, not a cache".to_string(),
        ))
    }

    async fn cache_string_results(&self, _results: &HashMap<MinifiedId, String>) -> Result<()> {
        Err(BackendError::Unsupported(
            "mysql store is a source of truth, not a cache".to_string(),
        ))
    }
}
