//! Query-result and enrichment caching.
//!
//! Two TTL classes: query results expire in hours (live listing order
//! churns), website contact data in days (contact info is stable). A memory
//! tier shadows a durable SQLite tier write-through, so a hot key never
//! diverges from what is on disk. Expiry is checked on every read — an
//! expired entry is absent even if no sweep has run yet. The cache owns its
//! own serialized copies of every value, so readers never alias live Leads.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Row;

use crate::enrich::ContactDetails;
use leadscout_core::Lead;

const NS_QUERY: &str = "query";
const NS_CONTACT: &str = "contact";

/// Stable signature of one normalized query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Derive the cache key for a (business_type, location, max_results) query.
///
/// A pure function of the normalized parameters (trimmed and case-folded),
/// so "Coffee Shop" and "coffee shop" collide.
#[must_use]
pub fn query_signature(business_type: &str, location: &str, max_results: usize) -> CacheKey {
    let normalized = format!(
        "{}|{}|{max_results}",
        business_type.trim().to_lowercase(),
        location.trim().to_lowercase(),
    );
    CacheKey(hex_sha256(&normalized))
}

fn contact_key(website_url: &str) -> String {
    hex_sha256(&website_url.trim().to_lowercase())
}

fn hex_sha256(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

/// Which expiry policy an entry lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    /// Live scrape results; short-lived.
    QueryResults,
    /// Companion-website contact data; long-lived.
    WebsiteContacts,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
struct Entry {
    payload: String,
    created_at: DateTime<Utc>,
    ttl_secs: i64,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at).num_seconds() >= self.ttl_secs
    }
}

/// Durable cache tier: one SQLite table of serialized entries.
pub struct SqliteStore {
    pool: sqlx::SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the store at `path` and ensure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Store`] if the database cannot be opened or the
    /// schema cannot be created.
    pub async fn open(path: &Path) -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = SqliteStore { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// In-memory store for tests and ephemeral runs. A single connection:
    /// every SQLite `:memory:` connection is its own database.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Store`] on pool or schema failure.
    pub async fn open_in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = SqliteStore { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), CacheError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cache_entries ( \
                 namespace TEXT NOT NULL, \
                 cache_key TEXT NOT NULL, \
                 payload TEXT NOT NULL, \
                 created_at INTEGER NOT NULL, \
                 ttl_secs INTEGER NOT NULL, \
                 PRIMARY KEY (namespace, cache_key) \
             )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Entry>, CacheError> {
        let row = sqlx::query(
            "SELECT payload, created_at, ttl_secs FROM cache_entries \
             WHERE namespace = ?1 AND cache_key = ?2",
        )
        .bind(namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Entry {
            payload: row.get::<String, _>("payload"),
            created_at: DateTime::from_timestamp(row.get::<i64, _>("created_at"), 0)
                .unwrap_or_else(Utc::now),
            ttl_secs: row.get::<i64, _>("ttl_secs"),
        }))
    }

    async fn put(&self, namespace: &str, key: &str, entry: &Entry) -> Result<(), CacheError> {
        sqlx::query(
            "INSERT INTO cache_entries (namespace, cache_key, payload, created_at, ttl_secs) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT (namespace, cache_key) DO UPDATE SET \
                 payload = excluded.payload, \
                 created_at = excluded.created_at, \
                 ttl_secs = excluded.ttl_secs",
        )
        .bind(namespace)
        .bind(key)
        .bind(&entry.payload)
        .bind(entry.created_at.timestamp())
        .bind(entry.ttl_secs)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete every expired entry; returns how many were removed.
    ///
    /// Reads already treat expired entries as absent, so this is purely a
    /// space reclamation sweep.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Store`] if the delete fails.
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query(
            "DELETE FROM cache_entries WHERE created_at + ttl_secs <= ?1",
        )
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Read-through/write-through cache over a memory tier and an optional
/// durable tier.
pub struct ResultCache {
    memory: Mutex<HashMap<(&'static str, String), Entry>>,
    store: Option<SqliteStore>,
    query_ttl_secs: i64,
    contact_ttl_secs: i64,
}

impl ResultCache {
    #[must_use]
    pub fn new(store: Option<SqliteStore>, query_ttl_secs: u64, contact_ttl_secs: u64) -> Self {
        ResultCache {
            memory: Mutex::new(HashMap::new()),
            store,
            query_ttl_secs: i64::try_from(query_ttl_secs).unwrap_or(i64::MAX),
            contact_ttl_secs: i64::try_from(contact_ttl_secs).unwrap_or(i64::MAX),
        }
    }

    fn ttl_secs(&self, class: TtlClass) -> i64 {
        match class {
            TtlClass::QueryResults => self.query_ttl_secs,
            TtlClass::WebsiteContacts => self.contact_ttl_secs,
        }
    }

    /// Cached leads for `key`, or `None` on miss/expiry.
    pub async fn get_leads(&self, key: &CacheKey) -> Option<Vec<Lead>> {
        let payload = self.get_entry(NS_QUERY, key.as_str(), Utc::now()).await?;
        match serde_json::from_str(&payload) {
            Ok(leads) => Some(leads),
            Err(err) => {
                tracing::warn!(error = %err, "discarding undecodable cached lead list");
                None
            }
        }
    }

    /// Store `leads` under `key` with the query-results TTL.
    pub async fn put_leads(&self, key: &CacheKey, leads: &[Lead]) {
        match serde_json::to_string(leads) {
            Ok(payload) => {
                self.put_entry(
                    NS_QUERY,
                    key.as_str(),
                    payload,
                    TtlClass::QueryResults,
                    Utc::now(),
                )
                .await;
            }
            Err(err) => tracing::warn!(error = %err, "failed to serialize leads for cache"),
        }
    }

    /// Cached enrichment for a website URL, or `None` on miss/expiry.
    pub async fn get_contacts(&self, website_url: &str) -> Option<ContactDetails> {
        let key = contact_key(website_url);
        let payload = self.get_entry(NS_CONTACT, &key, Utc::now()).await?;
        serde_json::from_str(&payload).ok()
    }

    /// Store enrichment output for a website URL with the long TTL.
    pub async fn put_contacts(&self, website_url: &str, details: &ContactDetails) {
        let key = contact_key(website_url);
        match serde_json::to_string(details) {
            Ok(payload) => {
                self.put_entry(
                    NS_CONTACT,
                    &key,
                    payload,
                    TtlClass::WebsiteContacts,
                    Utc::now(),
                )
                .await;
            }
            Err(err) => tracing::warn!(error = %err, "failed to serialize contacts for cache"),
        }
    }

    /// Read one entry, honoring TTL at `now`. Durable hits repopulate the
    /// memory tier; durable errors degrade to a miss.
    async fn get_entry(&self, namespace: &'static str, key: &str, now: DateTime<Utc>) -> Option<String> {
        {
            let mut memory = self.memory.lock().expect("cache lock");
            if let Some(entry) = memory.get(&(namespace, key.to_string())) {
                if entry.is_expired(now) {
                    memory.remove(&(namespace, key.to_string()));
                } else {
                    return Some(entry.payload.clone());
                }
            }
        }

        let store = self.store.as_ref()?;
        match store.get(namespace, key).await {
            Ok(Some(entry)) if !entry.is_expired(now) => {
                let payload = entry.payload.clone();
                self.memory
                    .lock()
                    .expect("cache lock")
                    .insert((namespace, key.to_string()), entry);
                Some(payload)
            }
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(error = %err, "durable cache read failed — treating as miss");
                None
            }
        }
    }

    /// Write one entry through both tiers. Last write wins on races.
    async fn put_entry(
        &self,
        namespace: &'static str,
        key: &str,
        payload: String,
        class: TtlClass,
        now: DateTime<Utc>,
    ) {
        let entry = Entry {
            payload,
            created_at: now,
            ttl_secs: self.ttl_secs(class),
        };

        if let Some(store) = &self.store {
            if let Err(err) = store.put(namespace, key, &entry).await {
                tracing::warn!(error = %err, "durable cache write failed");
            }
        }

        self.memory
            .lock()
            .expect("cache lock")
            .insert((namespace, key.to_string()), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use leadscout_core::LeadSource;

    fn lead(name: &str) -> Lead {
        let mut lead = Lead {
            name: name.to_string(),
            website: format!("https://{}.example", name.to_lowercase().replace(' ', "")),
            ..Lead::default()
        };
        lead.recompute_quality();
        lead
    }

    #[test]
    fn signature_is_stable_and_case_folded() {
        let a = query_signature("Coffee Shop", "Austin, TX", 20);
        let b = query_signature("  coffee shop ", "austin, tx", 20);
        assert_eq!(a, b, "trim + case-fold must collide");
        assert_eq!(a.as_str().len(), 64, "SHA-256 hex is 64 chars");
    }

    #[test]
    fn signature_differs_across_parameters() {
        let base = query_signature("coffee shop", "austin, tx", 20);
        assert_ne!(base, query_signature("coffee shop", "dallas, tx", 20));
        assert_ne!(base, query_signature("tea house", "austin, tx", 20));
        assert_ne!(base, query_signature("coffee shop", "austin, tx", 30));
    }

    #[tokio::test]
    async fn memory_round_trip_returns_equal_leads() {
        let cache = ResultCache::new(None, 3600, 86400);
        let key = query_signature("coffee shop", "austin, tx", 10);
        let leads = vec![lead("Brew One"), lead("Brew Two")];

        cache.put_leads(&key, &leads).await;
        let back = cache.get_leads(&key).await.expect("hit");
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].name, "Brew One");
        assert_eq!(back[0].quality_score, leads[0].quality_score);
    }

    #[tokio::test]
    async fn expired_entry_is_absent_on_read() {
        let cache = ResultCache::new(None, 3600, 86400);
        cache
            .put_entry(NS_QUERY, "k", "[]".to_string(), TtlClass::QueryResults, Utc::now())
            .await;

        let now = Utc::now();
        assert!(cache.get_entry(NS_QUERY, "k", now).await.is_some());

        // Simulated clock: one second past the TTL.
        let later = now + ChronoDuration::seconds(3601);
        assert!(
            cache.get_entry(NS_QUERY, "k", later).await.is_none(),
            "expired entries behave as absent even before any sweep"
        );
    }

    #[tokio::test]
    async fn contact_ttl_class_outlives_query_ttl_class() {
        let cache = ResultCache::new(None, 10, 1000);
        cache
            .put_entry(NS_QUERY, "q", "[]".to_string(), TtlClass::QueryResults, Utc::now())
            .await;
        cache
            .put_entry(NS_CONTACT, "c", "{}".to_string(), TtlClass::WebsiteContacts, Utc::now())
            .await;

        let later = Utc::now() + ChronoDuration::seconds(500);
        assert!(cache.get_entry(NS_QUERY, "q", later).await.is_none());
        assert!(cache.get_entry(NS_CONTACT, "c", later).await.is_some());
    }

    #[tokio::test]
    async fn durable_tier_round_trips_and_repopulates_memory() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let cache = ResultCache::new(Some(store), 3600, 86400);
        let key = query_signature("coffee shop", "austin, tx", 5);
        let leads = vec![lead("Durable Drip")];

        cache.put_leads(&key, &leads).await;

        // Wipe the memory tier to force a durable read-through.
        cache.memory.lock().unwrap().clear();
        let back = cache.get_leads(&key).await.expect("durable hit");
        assert_eq!(back[0].name, "Durable Drip");

        // The read-through must have repopulated the memory tier.
        assert!(!cache.memory.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn racing_puts_leave_one_winner() {
        let cache = std::sync::Arc::new(ResultCache::new(None, 3600, 86400));
        let key = query_signature("race", "austin, tx", 5);

        let a = {
            let cache = std::sync::Arc::clone(&cache);
            let key = key.clone();
            tokio::spawn(async move { cache.put_leads(&key, &[lead("Writer A")]).await })
        };
        let b = {
            let cache = std::sync::Arc::clone(&cache);
            let key = key.clone();
            tokio::spawn(async move { cache.put_leads(&key, &[lead("Writer B")]).await })
        };
        a.await.unwrap();
        b.await.unwrap();

        let back = cache.get_leads(&key).await.expect("hit");
        assert_eq!(back.len(), 1);
        assert!(back[0].name == "Writer A" || back[0].name == "Writer B");
    }

    #[tokio::test]
    async fn contacts_round_trip_by_url() {
        let cache = ResultCache::new(None, 3600, 86400);
        let details = ContactDetails {
            email: "info@joespizza.com".to_string(),
            ..ContactDetails::default()
        };

        cache.put_contacts("https://JoesPizza.com", &details).await;
        let back = cache
            .get_contacts("https://joespizza.com")
            .await
            .expect("url keys are case-folded");
        assert_eq!(back, details);
    }

    #[tokio::test]
    async fn purge_expired_removes_only_dead_rows() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let live = Entry {
            payload: "[]".to_string(),
            created_at: Utc::now(),
            ttl_secs: 3600,
        };
        let dead = Entry {
            payload: "[]".to_string(),
            created_at: Utc::now() - ChronoDuration::seconds(7200),
            ttl_secs: 3600,
        };
        store.put(NS_QUERY, "live", &live).await.unwrap();
        store.put(NS_QUERY, "dead", &dead).await.unwrap();

        let purged = store.purge_expired().await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.get(NS_QUERY, "live").await.unwrap().is_some());
        assert!(store.get(NS_QUERY, "dead").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn preserves_lead_source_through_serialization() {
        let cache = ResultCache::new(None, 3600, 86400);
        let key = query_signature("api", "austin, tx", 5);
        let mut fallback = lead("Api Lead");
        fallback.source = LeadSource::ApiFallback;

        cache.put_leads(&key, &[fallback]).await;
        let back = cache.get_leads(&key).await.unwrap();
        assert_eq!(back[0].source, LeadSource::ApiFallback);
    }
}
