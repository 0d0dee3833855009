//! End-to-end coordination for one scrape request.
//!
//! The orchestrator validates the query, consults the cache, acquires the
//! listing collection through the browser capability, fans listings out to
//! [`ListingProcessor`] under a concurrency cap, deduplicates and ranks the
//! results, and writes them back through the cache. When scraping fails or
//! comes back thin, a configured fallback provider supplies the leads
//! instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tokio::sync::Semaphore;

use crate::browser::{BrowserPage, ContextPool, DriverError};
use crate::cache::{query_signature, ResultCache};
use crate::dedupe::suppress_near_duplicates;
use crate::error::ScrapeError;
use crate::listing::ListingProcessor;
use crate::selectors::{FieldKind, SelectorCatalog};
use leadscout_core::{Lead, ScrapeSummary};

const SEARCH_BASE_URL: &str = "https://www.google.com/maps/search/";

/// One scrape request, as received from the caller.
#[derive(Debug, Clone)]
pub struct ScrapeQuery {
    pub business_type: String,
    pub location: String,
    pub max_results: usize,
}

/// The finished result: ranked leads plus aggregate counts.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub leads: Vec<Lead>,
    pub summary: ScrapeSummary,
    pub from_cache: bool,
}

/// Drives the full pipeline for one query.
pub struct ScrapeOrchestrator {
    pool: Option<Arc<ContextPool>>,
    catalog: Arc<SelectorCatalog>,
    processor: Arc<ListingProcessor>,
    cache: Arc<ResultCache>,
    places: Option<crate::places::PlacesClient>,
    max_concurrent_listings: usize,
    browser_timeout: Duration,
}

impl ScrapeOrchestrator {
    #[must_use]
    pub fn new(
        pool: Option<Arc<ContextPool>>,
        catalog: Arc<SelectorCatalog>,
        processor: Arc<ListingProcessor>,
        cache: Arc<ResultCache>,
        places: Option<crate::places::PlacesClient>,
        max_concurrent_listings: usize,
        browser_timeout: Duration,
    ) -> Self {
        ScrapeOrchestrator {
            pool,
            catalog,
            processor,
            cache,
            places,
            max_concurrent_listings: max_concurrent_listings.max(1),
            browser_timeout,
        }
    }

    /// Run one scrape end to end.
    ///
    /// Zero leads is a valid outcome, distinct from an error. Per-listing and
    /// per-field failures never surface here.
    ///
    /// # Errors
    ///
    /// - [`ScrapeError::InvalidQuery`] — empty business type or location,
    ///   raised before any browser or network activity.
    /// - [`ScrapeError::InfrastructureUnavailable`] — neither the browser
    ///   driver nor a fallback provider could serve the request at all.
    pub async fn run(&self, query: &ScrapeQuery) -> Result<ScrapeOutcome, ScrapeError> {
        let started = Instant::now();
        let query = normalize_query(query)?;
        let key = query_signature(&query.business_type, &query.location, query.max_results);

        if let Some(leads) = self.cache.get_leads(&key).await {
            tracing::info!(
                business_type = %query.business_type,
                location = %query.location,
                count = leads.len(),
                "cache hit"
            );
            let summary = ScrapeSummary::from_leads(&leads, started.elapsed().as_secs_f64());
            return Ok(ScrapeOutcome {
                leads,
                summary,
                from_cache: true,
            });
        }

        if self.pool.is_none() && self.places.is_none() {
            return Err(ScrapeError::InfrastructureUnavailable {
                reason: "no browser driver bound and no fallback provider configured".to_string(),
            });
        }

        let mut leads: Vec<Lead> = Vec::new();
        let mut scrape_ran = false;

        if let Some(pool) = &self.pool {
            match self.scrape_listings(pool, &query).await {
                Ok(found) => {
                    scrape_ran = true;
                    leads = found;
                }
                Err(ScrapeError::ListingAcquisitionFailed) => {
                    // "Nothing found" is a legitimate terminal state.
                    scrape_ran = true;
                    tracing::warn!(
                        business_type = %query.business_type,
                        location = %query.location,
                        "no listing-collection locator matched"
                    );
                }
                Err(err) => {
                    if self.places.is_none() {
                        return Err(err);
                    }
                    tracing::warn!(error = %err, "scrape failed — trying fallback provider");
                }
            }
        }

        // Thin scrape results hand over to the structured-data fallback.
        let thin = leads.len() * 2 < query.max_results;
        if thin {
            if let Some(places) = &self.places {
                match places
                    .search(&query.business_type, &query.location, query.max_results)
                    .await
                {
                    Ok(api_leads) if !api_leads.is_empty() => {
                        tracing::info!(count = api_leads.len(), "using fallback provider results");
                        leads = api_leads;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        if !scrape_ran {
                            return Err(ScrapeError::InfrastructureUnavailable {
                                reason: format!("fallback provider failed: {err}"),
                            });
                        }
                        tracing::warn!(error = %err, "fallback provider failed");
                    }
                }
            }
        }

        let mut leads = suppress_near_duplicates(leads);
        // Stable sort: equal scores keep discovery order.
        leads.sort_by(|a, b| b.quality_score.cmp(&a.quality_score));
        leads.truncate(query.max_results);

        if !leads.is_empty() {
            self.cache.put_leads(&key, &leads).await;
        }

        let summary = ScrapeSummary::from_leads(&leads, started.elapsed().as_secs_f64());
        tracing::info!(
            business_type = %query.business_type,
            location = %query.location,
            total = summary.total,
            with_website = summary.with_website,
            with_email = summary.with_email,
            elapsed_secs = summary.elapsed_secs,
            "scrape complete"
        );
        Ok(ScrapeOutcome {
            leads,
            summary,
            from_cache: false,
        })
    }

    /// Acquire the listing collection and process each listing concurrently.
    async fn scrape_listings(
        &self,
        pool: &ContextPool,
        query: &ScrapeQuery,
    ) -> Result<Vec<Lead>, ScrapeError> {
        let infra = |err: &DriverError| ScrapeError::InfrastructureUnavailable {
            reason: err.to_string(),
        };

        let guard = pool.checkout().await.map_err(|err| infra(&err))?;
        let page = guard.context().open_page().await.map_err(|err| infra(&err))?;

        let url = search_url(query);
        page.navigate(&url).await.map_err(|err| match err {
            DriverError::Unavailable { .. } => infra(&err),
            _ => ScrapeError::ListingAcquisitionFailed,
        })?;

        let locators = self
            .catalog
            .candidates(FieldKind::BusinessListing)
            .map_err(|_| ScrapeError::ListingAcquisitionFailed)?;

        // Give the collection a bounded chance to render; the per-locator
        // query below is what actually decides.
        if let Err(err) = page.wait_for_any(&locators, self.browser_timeout).await {
            tracing::debug!(error = %err, "listing collection did not appear within timeout");
        }

        let mut listings = Vec::new();
        for locator in &locators {
            let attempt_started = Instant::now();
            match page.query_all(locator).await {
                Ok(found) if !found.is_empty() => {
                    self.catalog.record_outcome(
                        FieldKind::BusinessListing,
                        locator,
                        true,
                        attempt_started.elapsed(),
                    );
                    listings = found;
                    break;
                }
                Ok(_) => {
                    self.catalog.record_outcome(
                        FieldKind::BusinessListing,
                        locator,
                        false,
                        attempt_started.elapsed(),
                    );
                }
                Err(DriverError::Unavailable { reason }) => {
                    return Err(ScrapeError::InfrastructureUnavailable { reason });
                }
                Err(err) => {
                    self.catalog.record_outcome(
                        FieldKind::BusinessListing,
                        locator,
                        false,
                        attempt_started.elapsed(),
                    );
                    tracing::debug!(locator = %locator, error = %err, "collection locator failed");
                }
            }
        }

        if listings.is_empty() {
            return Err(ScrapeError::ListingAcquisitionFailed);
        }
        listings.truncate(query.max_results);

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_listings));
        let page_ref: &dyn BrowserPage = page.as_ref();

        let tasks = listings.into_iter().enumerate().map(|(index, listing)| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                self.processor.process(page_ref, listing.as_ref(), index).await
            }
        });

        let results = futures::future::join_all(tasks).await;
        Ok(results.into_iter().flatten().collect())
    }
}

/// Trim inputs; an empty business type or location is rejected before any
/// browser or network activity.
fn normalize_query(query: &ScrapeQuery) -> Result<ScrapeQuery, ScrapeError> {
    let business_type = query.business_type.trim();
    let location = query.location.trim();

    if business_type.is_empty() {
        return Err(ScrapeError::InvalidQuery {
            reason: "business_type is empty".to_string(),
        });
    }
    if location.is_empty() {
        return Err(ScrapeError::InvalidQuery {
            reason: "location is empty".to_string(),
        });
    }

    Ok(ScrapeQuery {
        business_type: business_type.to_string(),
        location: location.to_string(),
        max_results: query.max_results,
    })
}

fn search_url(query: &ScrapeQuery) -> String {
    let term = format!("{} {}", query.business_type, query.location);
    format!(
        "{SEARCH_BASE_URL}{}",
        utf8_percent_encode(&term, NON_ALPHANUMERIC)
    )
}
