pub mod browser;
pub mod cache;
pub mod dedupe;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod listing;
pub mod orchestrator;
pub mod places;
pub mod rate_limit;
pub mod selectors;

pub use browser::{
    BrowserContext, BrowserDriver, BrowserElement, BrowserPage, ContextPool, DriverError, Locator,
    Queryable,
};
pub use cache::{query_signature, CacheKey, ResultCache, SqliteStore, TtlClass};
pub use dedupe::suppress_near_duplicates;
pub use enrich::{ContactDetails, ContactEnricher};
pub use error::ScrapeError;
pub use extract::{ExtractError, Extraction, FieldExtractor};
pub use listing::ListingProcessor;
pub use orchestrator::{ScrapeOrchestrator, ScrapeOutcome, ScrapeQuery};
pub use places::PlacesClient;
pub use rate_limit::AdaptiveRateLimiter;
pub use selectors::{FieldKind, SelectorCatalog, SelectorError};
