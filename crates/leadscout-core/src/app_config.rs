use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    /// Path of the SQLite file backing the durable cache tier.
    pub cache_path: PathBuf,
    /// TTL for cached query results. Short: live listing order churns.
    pub query_cache_ttl_secs: u64,
    /// TTL for cached website contact data. Long: contact info is stable.
    pub contact_cache_ttl_secs: u64,
    pub max_concurrent_listings: usize,
    pub max_concurrent_fetches: usize,
    pub context_pool_size: usize,
    /// Hard timeout for any single browser interaction, in milliseconds.
    pub browser_timeout_ms: u64,
    pub fetch_timeout_secs: u64,
    pub fetch_connect_timeout_secs: u64,
    pub user_agent: String,
    /// Byte cap on enrichment body reads; precision traded for latency.
    pub enrich_body_cap_bytes: usize,
    pub requests_per_minute: u32,
    pub rate_base_delay_ms: u64,
    pub rate_max_delay_ms: u64,
    pub places_api_key: Option<String>,
    pub proxy_endpoints: Vec<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("cache_path", &self.cache_path)
            .field("query_cache_ttl_secs", &self.query_cache_ttl_secs)
            .field("contact_cache_ttl_secs", &self.contact_cache_ttl_secs)
            .field("max_concurrent_listings", &self.max_concurrent_listings)
            .field("max_concurrent_fetches", &self.max_concurrent_fetches)
            .field("context_pool_size", &self.context_pool_size)
            .field("browser_timeout_ms", &self.browser_timeout_ms)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field(
                "fetch_connect_timeout_secs",
                &self.fetch_connect_timeout_secs,
            )
            .field("user_agent", &self.user_agent)
            .field("enrich_body_cap_bytes", &self.enrich_body_cap_bytes)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("rate_base_delay_ms", &self.rate_base_delay_ms)
            .field("rate_max_delay_ms", &self.rate_max_delay_ms)
            .field(
                "places_api_key",
                &self.places_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("proxy_endpoints", &self.proxy_endpoints.len())
            .finish()
    }
}
