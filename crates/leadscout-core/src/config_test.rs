use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn parse_environment_development() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
}

#[test]
fn parse_environment_test() {
    assert_eq!(parse_environment("test").unwrap(), Environment::Test);
}

#[test]
fn parse_environment_production() {
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("staging").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "LEADSCOUT_ENV"));
}

#[test]
fn build_app_config_uses_defaults_on_empty_env() {
    let map: HashMap<&str, &str> = HashMap::new();
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();

    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.query_cache_ttl_secs, 21600);
    assert_eq!(cfg.contact_cache_ttl_secs, 604_800);
    assert_eq!(cfg.max_concurrent_listings, 15);
    assert_eq!(cfg.max_concurrent_fetches, 10);
    assert_eq!(cfg.context_pool_size, 8);
    assert_eq!(cfg.browser_timeout_ms, 8000);
    assert_eq!(cfg.enrich_body_cap_bytes, 15000);
    assert_eq!(cfg.requests_per_minute, 60);
    assert!(cfg.places_api_key.is_none());
    assert!(cfg.proxy_endpoints.is_empty());
}

#[test]
fn build_app_config_applies_overrides() {
    let mut map = HashMap::new();
    map.insert("LEADSCOUT_ENV", "production");
    map.insert("LEADSCOUT_QUERY_CACHE_TTL_SECS", "3600");
    map.insert("LEADSCOUT_MAX_CONCURRENT_LISTINGS", "4");
    map.insert("LEADSCOUT_USER_AGENT", "custom-agent/2.0");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();

    assert_eq!(cfg.env, Environment::Production);
    assert_eq!(cfg.query_cache_ttl_secs, 3600);
    assert_eq!(cfg.max_concurrent_listings, 4);
    assert_eq!(cfg.user_agent, "custom-agent/2.0");
}

#[test]
fn build_app_config_rejects_malformed_ttl() {
    let mut map = HashMap::new();
    map.insert("LEADSCOUT_QUERY_CACHE_TTL_SECS", "not-a-number");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "LEADSCOUT_QUERY_CACHE_TTL_SECS"),
        "expected InvalidEnvVar(LEADSCOUT_QUERY_CACHE_TTL_SECS), got: {result:?}"
    );
}

#[test]
fn build_app_config_rejects_malformed_concurrency() {
    let mut map = HashMap::new();
    map.insert("LEADSCOUT_MAX_CONCURRENT_LISTINGS", "-3");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "LEADSCOUT_MAX_CONCURRENT_LISTINGS"),
        "expected InvalidEnvVar(LEADSCOUT_MAX_CONCURRENT_LISTINGS), got: {result:?}"
    );
}

#[test]
fn build_app_config_parses_proxy_list() {
    let mut map = HashMap::new();
    map.insert(
        "LEADSCOUT_PROXY_ENDPOINTS",
        "http://proxy-a:8080, http://proxy-b:8080,,",
    );
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(
        cfg.proxy_endpoints,
        vec!["http://proxy-a:8080", "http://proxy-b:8080"]
    );
}

#[test]
fn debug_output_redacts_places_api_key() {
    let mut map = HashMap::new();
    map.insert("LEADSCOUT_PLACES_API_KEY", "super-secret-key");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    let debug = format!("{cfg:?}");
    assert!(!debug.contains("super-secret-key"));
    assert!(debug.contains("[redacted]"));
}
