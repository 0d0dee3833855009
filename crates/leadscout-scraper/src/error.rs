use thiserror::Error;

/// Top-level failures a scrape request can surface to its caller.
///
/// Per-field and per-listing problems never appear here: they are absorbed at
/// the smallest possible scope and represented as absent data. Finding zero
/// leads is a valid outcome, not an error. The only fatal class is the
/// browser/network infrastructure being unusable outright.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Empty or malformed input; surfaced immediately, never retried.
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// No listing-collection locator matched anything. The orchestrator
    /// converts this into an empty result set for the caller.
    #[error("listing acquisition failed: no listing-collection locator matched")]
    ListingAcquisitionFailed,

    /// The browser driver (or every configured fallback) cannot serve the
    /// request at all. The one class that aborts a run.
    #[error("infrastructure unavailable: {reason}")]
    InfrastructureUnavailable { reason: String },
}
