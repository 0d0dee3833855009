//! Locator catalog with success-weighted reordering.
//!
//! The listing site's markup is unstable and unversioned, so every semantic
//! field carries an ordered list of candidate locators rather than a single
//! selector. Each attempt outcome feeds back into a per-strategy weight and
//! the candidate order follows the weights, so a selector that stops matching
//! after a markup change sinks below its alternates within a few listings.
//!
//! Weights live for the process only. A restart goes back to the declared
//! order, which bounds staleness if the site reorders its own DOM.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::browser::Locator;

/// Weight decay applied on every recorded outcome before the success
/// increment: `w = w * DECAY + (succeeded ? 1.0 : 0.0)`.
const WEIGHT_DECAY: f64 = 0.8;

/// Semantic fields the catalog knows how to locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// One search-result entry in the listing collection.
    BusinessListing,
    Name,
    Website,
    Phone,
    Address,
    Rating,
    ReviewCount,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldKind::BusinessListing => "business_listing",
            FieldKind::Name => "name",
            FieldKind::Website => "website",
            FieldKind::Phone => "phone",
            FieldKind::Address => "address",
            FieldKind::Rating => "rating",
            FieldKind::ReviewCount => "review_count",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    #[error("no locator strategies registered for field kind {0}")]
    UnknownFieldKind(FieldKind),
}

#[derive(Debug, Clone)]
struct WeightedStrategy {
    locator: Locator,
    weight: f64,
    /// Position in the declared list; the deterministic tie-break.
    declared_order: usize,
}

/// Ordered locator strategies for one field, plus their running weights.
#[derive(Debug, Clone, Default)]
struct SelectorProfile {
    strategies: Vec<WeightedStrategy>,
}

impl SelectorProfile {
    fn from_locators(locators: Vec<Locator>) -> Self {
        SelectorProfile {
            strategies: locators
                .into_iter()
                .enumerate()
                .map(|(declared_order, locator)| WeightedStrategy {
                    locator,
                    weight: 0.0,
                    declared_order,
                })
                .collect(),
        }
    }

    fn ordered(&self) -> Vec<Locator> {
        let mut strategies: Vec<&WeightedStrategy> = self.strategies.iter().collect();
        strategies.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.declared_order.cmp(&b.declared_order))
        });
        strategies.iter().map(|s| s.locator.clone()).collect()
    }
}

/// Per-field locator lists shared across all concurrent listing tasks.
///
/// The catalog is an injectable configuration artifact: adapting to a markup
/// change means constructing a catalog with different locators, not touching
/// extraction logic. [`SelectorCatalog::default`] carries the locators known
/// to work against the current listing-site markup.
pub struct SelectorCatalog {
    profiles: Mutex<HashMap<FieldKind, SelectorProfile>>,
}

impl SelectorCatalog {
    #[must_use]
    pub fn empty() -> Self {
        SelectorCatalog {
            profiles: Mutex::new(HashMap::new()),
        }
    }

    /// Register (or replace) the ordered locator list for `field`.
    /// Replacing resets that field's weights.
    pub fn register(&self, field: FieldKind, locators: Vec<Locator>) {
        let mut profiles = self.profiles.lock().expect("catalog lock");
        profiles.insert(field, SelectorProfile::from_locators(locators));
    }

    /// Candidate locators for `field`, highest success weight first, ties in
    /// declared order.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::UnknownFieldKind`] when `field` was never
    /// registered. A registered field never yields an empty list.
    pub fn candidates(&self, field: FieldKind) -> Result<Vec<Locator>, SelectorError> {
        let profiles = self.profiles.lock().expect("catalog lock");
        profiles
            .get(&field)
            .filter(|p| !p.strategies.is_empty())
            .map(SelectorProfile::ordered)
            .ok_or(SelectorError::UnknownFieldKind(field))
    }

    /// Record one extraction attempt against `locator`. Side effect only;
    /// outcomes for locators the catalog does not know are ignored.
    pub fn record_outcome(
        &self,
        field: FieldKind,
        locator: &Locator,
        succeeded: bool,
        latency: Duration,
    ) {
        let mut profiles = self.profiles.lock().expect("catalog lock");
        let Some(profile) = profiles.get_mut(&field) else {
            return;
        };
        let Some(strategy) = profile
            .strategies
            .iter_mut()
            .find(|s| &s.locator == locator)
        else {
            return;
        };
        strategy.weight = strategy.weight * WEIGHT_DECAY + f64::from(u8::from(succeeded));
        tracing::debug!(
            field = %field,
            locator = %locator,
            succeeded,
            latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            weight = strategy.weight,
            "selector outcome recorded"
        );
    }
}

impl Default for SelectorCatalog {
    /// Locator lists matching the listing site's current markup, ordered by
    /// observed reliability.
    fn default() -> Self {
        let catalog = SelectorCatalog::empty();
        catalog.register(
            FieldKind::BusinessListing,
            vec![
                Locator::new("[role=\"article\"]"),
                Locator::new("[data-result-index]"),
                Locator::new("div[jsaction*=\"mouseover\"]"),
                Locator::new(".hfpxzc"),
            ],
        );
        catalog.register(
            FieldKind::Name,
            vec![
                Locator::new(".qBF1Pd"),
                Locator::new(".NrDZNb"),
                Locator::new(".fontHeadlineSmall"),
            ],
        );
        catalog.register(
            FieldKind::Website,
            vec![
                Locator::new("a[data-item-id*=\"authority\"]"),
                Locator::new("[data-value=\"Website\"] a"),
                Locator::new("a[href*=\"http\"]:not([href*=\"google\"]):not([href*=\"maps\"])"),
            ],
        );
        catalog.register(
            FieldKind::Phone,
            vec![
                Locator::new("button[data-item-id*=\"phone\"]"),
                Locator::new("[data-value*=\"phone\"] span"),
                Locator::new(".z5jxId"),
            ],
        );
        catalog.register(
            FieldKind::Address,
            vec![
                Locator::new("button[data-item-id=\"address\"]"),
                Locator::new("[data-value=\"Address\"] div"),
                Locator::new(".rogA2c"),
            ],
        );
        catalog.register(
            FieldKind::Rating,
            vec![
                Locator::new("[data-value=\"Rating\"] span"),
                Locator::new(".MW4etd"),
                Locator::new("span[aria-label*=\"stars\"]"),
            ],
        );
        catalog.register(
            FieldKind::ReviewCount,
            vec![
                Locator::new("[data-value=\"Reviews\"] span"),
                Locator::new(".UY7F9"),
                Locator::new("button[aria-label*=\"reviews\"]"),
            ],
        );
        catalog
    }
}
