use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a set env var holds a value that does not parse.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the
/// process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for
/// testing or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if a set env var holds a value that does not parse.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual
/// environment so it can be tested with a pure `HashMap` lookup — no
/// `set_var`/`remove_var` needed. Every knob has a default; only malformed
/// values are errors.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let env = parse_environment(&or_default("LEADSCOUT_ENV", "development"))?;
    let log_level = or_default("LEADSCOUT_LOG_LEVEL", "info");
    let cache_path = PathBuf::from(or_default("LEADSCOUT_CACHE_PATH", "./leadscout_cache.db"));

    // Query results expire in hours; website contact data in days.
    let query_cache_ttl_secs = parse_u64("LEADSCOUT_QUERY_CACHE_TTL_SECS", "21600")?;
    let contact_cache_ttl_secs = parse_u64("LEADSCOUT_CONTACT_CACHE_TTL_SECS", "604800")?;

    let max_concurrent_listings = parse_usize("LEADSCOUT_MAX_CONCURRENT_LISTINGS", "15")?;
    let max_concurrent_fetches = parse_usize("LEADSCOUT_MAX_CONCURRENT_FETCHES", "10")?;
    let context_pool_size = parse_usize("LEADSCOUT_CONTEXT_POOL_SIZE", "8")?;

    let browser_timeout_ms = parse_u64("LEADSCOUT_BROWSER_TIMEOUT_MS", "8000")?;
    let fetch_timeout_secs = parse_u64("LEADSCOUT_FETCH_TIMEOUT_SECS", "10")?;
    let fetch_connect_timeout_secs = parse_u64("LEADSCOUT_FETCH_CONNECT_TIMEOUT_SECS", "5")?;

    let user_agent = or_default("LEADSCOUT_USER_AGENT", "leadscout/0.1 (lead-discovery)");
    let enrich_body_cap_bytes = parse_usize("LEADSCOUT_ENRICH_BODY_CAP_BYTES", "15000")?;

    let requests_per_minute = parse_u32("LEADSCOUT_REQUESTS_PER_MINUTE", "60")?;
    let rate_base_delay_ms = parse_u64("LEADSCOUT_RATE_BASE_DELAY_MS", "500")?;
    let rate_max_delay_ms = parse_u64("LEADSCOUT_RATE_MAX_DELAY_MS", "5000")?;

    let places_api_key = lookup("LEADSCOUT_PLACES_API_KEY").ok();
    let proxy_endpoints = lookup("LEADSCOUT_PROXY_ENDPOINTS")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(AppConfig {
        env,
        log_level,
        cache_path,
        query_cache_ttl_secs,
        contact_cache_ttl_secs,
        max_concurrent_listings,
        max_concurrent_fetches,
        context_pool_size,
        browser_timeout_ms,
        fetch_timeout_secs,
        fetch_connect_timeout_secs,
        user_agent,
        enrich_body_cap_bytes,
        requests_per_minute,
        rate_base_delay_ms,
        rate_max_delay_ms,
        places_api_key,
        proxy_endpoints,
    })
}

fn parse_environment(raw: &str) -> Result<Environment, ConfigError> {
    match raw {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "LEADSCOUT_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
