//! Companion-website enrichment: recover an email address and social-profile
//! URLs from a business's own site without a full crawl.
//!
//! Everything here fails soft. A timeout, a non-2xx status, or a malformed
//! URL yields an all-empty [`ContactDetails`], never an error: a lead with no
//! email is worth more than an aborted batch. Only a bounded prefix of each
//! response body is read; recall is traded for latency.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::extract::host_of;
use crate::rate_limit::AdaptiveRateLimiter;
use leadscout_core::Lead;

/// Browser-like user agents rotated across enrichment fetches.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Contact channels mined from a companion website. Empty string = not found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub email: String,
    pub instagram: String,
    pub facebook: String,
    pub tiktok: String,
    pub twitter: String,
}

impl ContactDetails {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_empty()
            && self.instagram.is_empty()
            && self.facebook.is_empty()
            && self.tiktok.is_empty()
            && self.twitter.is_empty()
    }

    fn has_gaps(&self) -> bool {
        self.email.is_empty()
            || self.instagram.is_empty()
            || self.facebook.is_empty()
            || self.tiktok.is_empty()
            || self.twitter.is_empty()
    }

    /// Fill this record's still-empty fields from `other`. Populated fields
    /// are never overwritten: earlier sources are more authoritative.
    pub fn backfill_from(&mut self, other: ContactDetails) {
        if self.email.is_empty() {
            self.email = other.email;
        }
        if self.instagram.is_empty() {
            self.instagram = other.instagram;
        }
        if self.facebook.is_empty() {
            self.facebook = other.facebook;
        }
        if self.tiktok.is_empty() {
            self.tiktok = other.tiktok;
        }
        if self.twitter.is_empty() {
            self.twitter = other.twitter;
        }
    }

    /// Merge into a Lead, leaving any already-populated Lead field alone.
    pub fn merge_into(&self, lead: &mut Lead) {
        if lead.email.is_empty() {
            lead.email.clone_from(&self.email);
        }
        if lead.instagram.is_empty() {
            lead.instagram.clone_from(&self.instagram);
        }
        if lead.facebook.is_empty() {
            lead.facebook.clone_from(&self.facebook);
        }
        if lead.tiktok.is_empty() {
            lead.tiktok.clone_from(&self.tiktok);
        }
        if lead.twitter.is_empty() {
            lead.twitter.clone_from(&self.twitter);
        }
    }
}

/// Compiled extraction patterns. Per platform, an ordered list tried in
/// sequence; the first match wins.
struct ContactPatterns {
    email: Regex,
    instagram: Vec<Regex>,
    facebook: Vec<Regex>,
    tiktok: Vec<Regex>,
    twitter: Vec<Regex>,
    contact_href: Regex,
}

impl ContactPatterns {
    fn new() -> Self {
        let compile = |pattern: &str| Regex::new(pattern).expect("valid regex");
        ContactPatterns {
            email: compile(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
            instagram: vec![
                compile(r"(?i)https?://(?:www\.)?instagram\.com/[A-Za-z0-9_.]+"),
                compile(r"(?i)\binstagram\.com/[A-Za-z0-9_.]+"),
            ],
            facebook: vec![
                compile(r"(?i)https?://(?:www\.)?facebook\.com/[A-Za-z0-9_.]+"),
                compile(r"(?i)\bfacebook\.com/[A-Za-z0-9_.]+"),
            ],
            tiktok: vec![
                compile(r"(?i)https?://(?:www\.)?tiktok\.com/@[A-Za-z0-9_.]+"),
                compile(r"(?i)\btiktok\.com/@[A-Za-z0-9_.]+"),
            ],
            twitter: vec![compile(
                r"(?i)https?://(?:www\.)?(?:twitter\.com|x\.com)/[A-Za-z0-9_]+",
            )],
            contact_href: compile(
                r#"(?i)href=["']([^"']*(?:contact|about|connect)[^"']*)["']"#,
            ),
        }
    }
}

/// Scrapes a companion website for contact channels.
pub struct ContactEnricher {
    http: reqwest::Client,
    limiter: Arc<AdaptiveRateLimiter>,
    fetch_permits: Arc<Semaphore>,
    body_cap: usize,
    probe_contact_page: bool,
    ua_cursor: AtomicUsize,
    patterns: ContactPatterns,
}

impl ContactEnricher {
    /// Build an enricher with configured timeouts and an optional rotating
    /// proxy list.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest` error if the HTTP client cannot be
    /// constructed (e.g., an invalid proxy endpoint).
    pub fn new(
        timeout_secs: u64,
        connect_timeout_secs: u64,
        max_concurrent_fetches: usize,
        body_cap: usize,
        limiter: Arc<AdaptiveRateLimiter>,
        proxy_endpoints: &[String],
    ) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(3));

        if !proxy_endpoints.is_empty() {
            let endpoints: Vec<String> = proxy_endpoints.to_vec();
            let cursor = AtomicUsize::new(0);
            builder = builder.proxy(reqwest::Proxy::custom(move |_| {
                let idx = cursor.fetch_add(1, Ordering::Relaxed) % endpoints.len();
                Some(endpoints[idx].clone())
            }));
        }

        Ok(ContactEnricher {
            http: builder.build()?,
            limiter,
            fetch_permits: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
            body_cap,
            probe_contact_page: true,
            ua_cursor: AtomicUsize::new(0),
            patterns: ContactPatterns::new(),
        })
    }

    /// Disable the secondary contact-page probe (one fetch per site only).
    #[must_use]
    pub fn without_contact_probe(mut self) -> Self {
        self.probe_contact_page = false;
        self
    }

    /// Mine `url` for an email address and social links.
    ///
    /// Never fails: any fetch problem yields an all-empty result. If the main
    /// page leaves gaps, at most one linked contact/about page is probed, and
    /// its findings only backfill fields the main page left empty.
    pub async fn enrich(&self, url: &str) -> ContactDetails {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            tracing::debug!(url, "skipping enrichment for non-http url");
            return ContactDetails::default();
        }

        let Ok(_permit) = self.fetch_permits.acquire().await else {
            return ContactDetails::default();
        };

        self.limiter.acquire().await;
        let Some(html) = self.fetch_prefix(url).await else {
            return ContactDetails::default();
        };

        let mut details = self.extract_from_html(&html);

        if self.probe_contact_page && details.has_gaps() {
            if let Some(contact_url) = self.find_contact_page(&html, url) {
                self.limiter.acquire().await;
                if let Some(contact_html) = self.fetch_prefix(&contact_url).await {
                    details.backfill_from(self.extract_from_html(&contact_html));
                }
            }
        }

        details
    }

    /// GET `url` and read at most `body_cap` bytes of the response body.
    async fn fetch_prefix(&self, url: &str) -> Option<String> {
        let ua = USER_AGENTS[self.ua_cursor.fetch_add(1, Ordering::Relaxed) % USER_AGENTS.len()];
        let response = match self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, ua)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(url, error = %err, "enrichment fetch failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(url, status = %response.status(), "enrichment fetch non-2xx");
            return None;
        }

        let mut body: Vec<u8> = Vec::with_capacity(self.body_cap.min(16 * 1024));
        let mut response = response;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let remaining = self.body_cap.saturating_sub(body.len());
                    if remaining == 0 {
                        break;
                    }
                    body.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
                    if body.len() >= self.body_cap {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    // Keep whatever prefix arrived; a partial page still
                    // often contains the header/footer contact links.
                    tracing::debug!(url, error = %err, "body read interrupted");
                    break;
                }
            }
        }

        Some(String::from_utf8_lossy(&body).into_owned())
    }

    fn extract_from_html(&self, html: &str) -> ContactDetails {
        ContactDetails {
            email: self
                .patterns
                .email
                .find(html)
                .map(|m| m.as_str().to_ascii_lowercase())
                .unwrap_or_default(),
            instagram: first_match(&self.patterns.instagram, html),
            facebook: first_match(&self.patterns.facebook, html),
            tiktok: first_match(&self.patterns.tiktok, html),
            twitter: canonicalize_twitter(&first_match(&self.patterns.twitter, html)),
        }
    }

    /// Find a same-site contact/about/connect link in `html`, resolved
    /// against `base_url`. Off-site hrefs are ignored.
    fn find_contact_page(&self, html: &str, base_url: &str) -> Option<String> {
        let href = self.patterns.contact_href.captures(html)?.get(1)?.as_str();

        if href.starts_with("http://") || href.starts_with("https://") {
            if host_of(href) == host_of(base_url) {
                return Some(href.to_string());
            }
            return None;
        }
        if href.starts_with('/') {
            let scheme_split = base_url.find("://")?;
            let scheme = &base_url[..scheme_split];
            let remainder = &base_url[(scheme_split + 3)..];
            let host_end = remainder.find('/').unwrap_or(remainder.len());
            let host = &remainder[..host_end];
            return Some(format!("{scheme}://{host}{href}"));
        }

        None
    }
}

fn first_match(patterns: &[Regex], html: &str) -> String {
    for pattern in patterns {
        if let Some(m) = pattern.find(html) {
            let raw = m.as_str();
            if raw.starts_with("http://") || raw.starts_with("https://") {
                return raw.to_string();
            }
            // Bare-domain variant: normalize to a canonical https URL.
            return format!("https://{raw}");
        }
    }
    String::new()
}

/// Rewrite a `twitter.com` profile URL to its `x.com` host form, preserving
/// the path. Non-twitter URLs pass through unchanged.
fn canonicalize_twitter(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    let lowered = url.to_ascii_lowercase();
    if let Some(pos) = lowered.find("twitter.com") {
        let path = &url[pos + "twitter.com".len()..];
        return format!("https://x.com{path}");
    }
    url.to_string()
}
