//! Integration tests for `ContactEnricher`.
//!
//! Uses `wiremock` to stand up a local HTTP server per test so no real
//! network traffic is made. Covers the extraction happy path, the fail-soft
//! contract (non-2xx, timeout), the bounded body read, and the secondary
//! contact-page probe.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use leadscout_scraper::{AdaptiveRateLimiter, ContactEnricher};

fn test_limiter() -> Arc<AdaptiveRateLimiter> {
    // Zero base delay so tests only pay the jitter.
    Arc::new(AdaptiveRateLimiter::new(
        10_000,
        Duration::ZERO,
        Duration::ZERO,
    ))
}

fn test_enricher() -> ContactEnricher {
    ContactEnricher::new(2, 2, 4, 15_000, test_limiter(), &[])
        .expect("failed to build test ContactEnricher")
}

#[tokio::test]
async fn extracts_email_and_socials_from_main_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                <p>Email us at Info@JoesPizza.com</p>
                <a href="https://www.instagram.com/joespizza">Instagram</a>
                <a href="https://twitter.com/JoesPizza">Twitter</a>
            </body></html>"#,
        ))
        .mount(&server)
        .await;

    let details = test_enricher().enrich(&server.uri()).await;

    assert_eq!(details.email, "info@joespizza.com");
    assert_eq!(details.instagram, "https://www.instagram.com/joespizza");
    assert_eq!(
        details.twitter, "https://x.com/JoesPizza",
        "twitter.com hosts are canonicalized to x.com"
    );
    assert_eq!(details.facebook, "");
    assert_eq!(details.tiktok, "");
}

#[tokio::test]
async fn http_500_yields_all_empty_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let details = test_enricher().enrich(&server.uri()).await;
    assert!(details.is_empty());
}

#[tokio::test]
async fn timeout_yields_all_empty_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("info@slow.example")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    // Client timeout is 2s; the 5s response must degrade to empty.
    let details = test_enricher().enrich(&server.uri()).await;
    assert!(details.is_empty());
}

#[tokio::test]
async fn malformed_url_yields_all_empty() {
    let details = test_enricher().enrich("not-a-url").await;
    assert!(details.is_empty());
}

#[tokio::test]
async fn body_read_is_capped_so_late_content_is_missed() {
    let server = MockServer::start().await;
    // 20 KB of padding, then the email — past the 15 KB cap.
    let mut body = "x".repeat(20_000);
    body.push_str(" info@toolate.example ");
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let details = test_enricher().enrich(&server.uri()).await;
    assert_eq!(
        details.email, "",
        "content beyond the byte cap is deliberately not read"
    );
}

#[tokio::test]
async fn content_within_the_cap_is_read() {
    let server = MockServer::start().await;
    let mut body = "x".repeat(5_000);
    body.push_str(" info@intime.example ");
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let details = test_enricher().enrich(&server.uri()).await;
    assert_eq!(details.email, "info@intime.example");
}

#[tokio::test]
async fn contact_page_probe_backfills_empty_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><a href="/contact">Contact us</a></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/contact"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r"<p>write to hello@probed.example</p>"),
        )
        .mount(&server)
        .await;

    let details = test_enricher().enrich(&server.uri()).await;
    assert_eq!(details.email, "hello@probed.example");
}

#[tokio::test]
async fn contact_page_never_overwrites_main_page_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                <p>main@primary.example</p>
                <a href="/about">About</a>
            </body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<p>other@secondary.example</p>
               <a href="https://instagram.com/fromabout">ig</a>"#,
        ))
        .mount(&server)
        .await;

    let details = test_enricher().enrich(&server.uri()).await;
    assert_eq!(
        details.email, "main@primary.example",
        "main-page email is authoritative"
    );
    assert_eq!(
        details.instagram, "https://instagram.com/fromabout",
        "still-empty fields are backfilled from the contact page"
    );
}

#[tokio::test]
async fn probe_is_skipped_when_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="/contact">Contact</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/contact"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("probe@should-not-run.example"),
        )
        .expect(0)
        .mount(&server)
        .await;

    let enricher = ContactEnricher::new(2, 2, 4, 15_000, test_limiter(), &[])
        .unwrap()
        .without_contact_probe();
    let details = enricher.enrich(&server.uri()).await;
    assert!(details.is_empty());
}

#[tokio::test]
async fn offsite_contact_links_are_not_probed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="https://elsewhere.example/contact">Contact</a>"#,
        ))
        .mount(&server)
        .await;

    // The only link is off-site; enrichment must not follow it and must
    // come back empty without erroring.
    let details = test_enricher().enrich(&server.uri()).await;
    assert!(details.is_empty());
}
