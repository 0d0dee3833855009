//! Per-listing processing: one discovered listing handle in, at most one
//! finalized [`Lead`] out.
//!
//! Field failures are independent — a dead phone selector never blanks the
//! website — and any failure at the listing boundary degrades to `None`
//! rather than aborting the batch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::browser::{BrowserElement, BrowserPage, DriverError};
use crate::cache::ResultCache;
use crate::enrich::ContactEnricher;
use crate::extract::{leading_f64, ExtractError, Extraction, FieldExtractor};
use crate::rate_limit::retry_with_backoff;
use crate::selectors::FieldKind;
use leadscout_core::{Lead, LeadSource};

/// Attempts to open a listing's detail view (the first try plus one retry).
const DETAIL_OPEN_RETRIES: u32 = 1;
const DETAIL_OPEN_BACKOFF: Duration = Duration::from_millis(300);

/// Turns one listing element into a finalized Lead.
pub struct ListingProcessor {
    extractor: Arc<FieldExtractor>,
    enricher: Arc<ContactEnricher>,
    cache: Arc<ResultCache>,
}

impl ListingProcessor {
    #[must_use]
    pub fn new(
        extractor: Arc<FieldExtractor>,
        enricher: Arc<ContactEnricher>,
        cache: Arc<ResultCache>,
    ) -> Self {
        ListingProcessor {
            extractor,
            enricher,
            cache,
        }
    }

    /// Process one listing. `None` means the listing contributed nothing —
    /// either it has no extractable name (not an error) or it failed outright
    /// (logged with its index, batch continues).
    pub async fn process(
        &self,
        page: &dyn BrowserPage,
        listing: &dyn BrowserElement,
        index: usize,
    ) -> Option<Lead> {
        let started = Instant::now();
        match self.process_inner(page, listing).await {
            Ok(Some(mut lead)) => {
                lead.processing_time = started.elapsed().as_secs_f64();
                lead.recompute_quality();
                Some(lead)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(index, error = %err, "listing processing failed — skipping");
                None
            }
        }
    }

    async fn process_inner(
        &self,
        page: &dyn BrowserPage,
        listing: &dyn BrowserElement,
    ) -> Result<Option<Lead>, ExtractError> {
        // Name from the summary card first.
        let mut name = self.extract_soft(listing, FieldKind::Name).await.value;

        let detail_open = self.open_detail(listing).await;

        // Some listings only render their name in the detail pane.
        if name.is_empty() && detail_open.is_ok() {
            name = self.extract_soft(page, FieldKind::Name).await.value;
        }
        if name.is_empty() {
            // Nothing to anchor a Lead on; not counted as an error.
            return Ok(None);
        }

        let mut lead = Lead {
            name,
            source: LeadSource::Scraped,
            ..Lead::default()
        };

        if let Err(err) = detail_open {
            // A partial Lead is valid output: keep the name, leave the rest
            // at the empty sentinel.
            tracing::debug!(name = %lead.name, error = %err, "detail view did not open");
            return Ok(Some(lead));
        }

        // Detail fields extract concurrently; each failure is independent.
        let (website, phone, address, rating, review_count) = tokio::join!(
            self.extract_soft(page, FieldKind::Website),
            self.extract_soft(page, FieldKind::Phone),
            self.extract_soft(page, FieldKind::Address),
            self.extract_soft(page, FieldKind::Rating),
            self.extract_soft(page, FieldKind::ReviewCount),
        );

        lead.website = website.value;
        lead.phone = phone.value;
        lead.address = address.value;
        lead.rating = leading_f64(&rating.value)
            .filter(|r| (0.0..=5.0).contains(r))
            .unwrap_or(0.0);
        lead.review_count = parse_review_count(&review_count.value);

        if !lead.website.is_empty() {
            let contacts = match self.cache.get_contacts(&lead.website).await {
                Some(cached) => cached,
                None => {
                    let fresh = self.enricher.enrich(&lead.website).await;
                    self.cache.put_contacts(&lead.website, &fresh).await;
                    fresh
                }
            };
            contacts.merge_into(&mut lead);
        }

        Ok(Some(lead))
    }

    /// Extract a field, absorbing a dead context into the empty sentinel.
    async fn extract_soft(
        &self,
        scope: &dyn crate::browser::Queryable,
        field: FieldKind,
    ) -> Extraction {
        match self.extractor.extract(scope, field).await {
            Ok(extraction) => extraction,
            Err(ExtractError::ContextInvalid { reason }) => {
                tracing::debug!(field = %field, reason, "context died — abandoning field");
                Extraction::default()
            }
        }
    }

    /// Scroll the listing into view and click it, with bounded retries.
    async fn open_detail(&self, listing: &dyn BrowserElement) -> Result<(), DriverError> {
        retry_with_backoff(
            DETAIL_OPEN_RETRIES,
            DETAIL_OPEN_BACKOFF,
            |err: &DriverError| {
                matches!(
                    err,
                    DriverError::Timeout { .. } | DriverError::Operation { .. }
                )
            },
            || async {
                listing.scroll_into_view().await?;
                listing.click().await
            },
        )
        .await
    }
}

/// First run of digits in a review-count string ("(212)" -> 212).
fn parse_review_count(value: &str) -> u32 {
    let digits: String = value
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}
