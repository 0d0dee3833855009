//! Field extraction against unstable markup.
//!
//! [`FieldExtractor`] tries a field's catalog candidates in priority order
//! until one yields a plausible value. "Not found" is a value (the empty
//! string), not an error: the only error this module raises is a dead page or
//! element handle, and even that is absorbed one level up.

use std::sync::Arc;
use std::time::Instant;

use crate::browser::{DriverError, Locator, Queryable};
use crate::selectors::{FieldKind, SelectorCatalog};

/// Strings the listing site renders as UI chrome. A "name" matching one of
/// these is a mis-targeted selector, not a business.
const NAME_DENYLIST: &[&str] = &[
    "results",
    "search",
    "loading",
    "sponsored",
    "directions",
    "website",
    "menu",
    "more places",
    "back to top",
];

/// One resolved field value and the locator that produced it (`None` when
/// every candidate came up empty).
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub value: String,
    pub locator: Option<Locator>,
}

impl Extraction {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The underlying page/element handle died mid-extraction (the page
    /// navigated away, the detail pane re-rendered).
    #[error("extraction context is no longer valid: {reason}")]
    ContextInvalid { reason: String },
}

/// Resolves one semantic field from a page or element scope.
pub struct FieldExtractor {
    catalog: Arc<SelectorCatalog>,
}

impl FieldExtractor {
    #[must_use]
    pub fn new(catalog: Arc<SelectorCatalog>) -> Self {
        FieldExtractor { catalog }
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<SelectorCatalog> {
        &self.catalog
    }

    /// Try `field`'s candidate locators against `scope` until one returns a
    /// plausible value. Exhaustion is `Ok` with an empty [`Extraction`].
    ///
    /// Every attempt, hit or miss, is reported back to the catalog so the
    /// candidate order tracks what currently works.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::ContextInvalid`] only when the underlying
    /// handle is no longer valid. Timeouts and per-candidate failures are
    /// soft: the next candidate is tried.
    pub async fn extract(
        &self,
        scope: &dyn Queryable,
        field: FieldKind,
    ) -> Result<Extraction, ExtractError> {
        let candidates = match self.catalog.candidates(field) {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::warn!(field = %field, error = %err, "no locators for field");
                return Ok(Extraction::default());
            }
        };

        for locator in candidates {
            let started = Instant::now();
            match self.try_candidate(scope, field, &locator).await {
                Ok(Some(value)) => {
                    self.catalog
                        .record_outcome(field, &locator, true, started.elapsed());
                    return Ok(Extraction {
                        value,
                        locator: Some(locator),
                    });
                }
                Ok(None) => {
                    self.catalog
                        .record_outcome(field, &locator, false, started.elapsed());
                }
                Err(DriverError::ContextInvalid { reason }) => {
                    self.catalog
                        .record_outcome(field, &locator, false, started.elapsed());
                    return Err(ExtractError::ContextInvalid { reason });
                }
                Err(err) => {
                    // Timeout or one-off driver hiccup: this candidate loses,
                    // the next one still gets its shot.
                    self.catalog
                        .record_outcome(field, &locator, false, started.elapsed());
                    tracing::debug!(field = %field, locator = %locator, error = %err, "candidate failed");
                }
            }
        }

        Ok(Extraction::default())
    }

    async fn try_candidate(
        &self,
        scope: &dyn Queryable,
        field: FieldKind,
        locator: &Locator,
    ) -> Result<Option<String>, DriverError> {
        let Some(element) = scope.query_one(locator).await? else {
            return Ok(None);
        };

        let raw = match field {
            FieldKind::Website => element.attribute("href").await?.unwrap_or_default(),
            _ => element.inner_text().await?,
        };
        let value = raw.trim();

        if is_plausible(field, value) {
            Ok(Some(value.to_string()))
        } else {
            Ok(None)
        }
    }
}

/// Field-specific sanity filter applied before a candidate value is accepted.
fn is_plausible(field: FieldKind, value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    match field {
        FieldKind::Name => {
            value.chars().count() >= 3
                && !NAME_DENYLIST
                    .iter()
                    .any(|deny| value.eq_ignore_ascii_case(deny))
        }
        FieldKind::Phone => value.len() > 5,
        // A "website" pointing back at the listing site is a self-referential
        // link, not the business's own site.
        FieldKind::Website => !host_of(value).contains("google"),
        FieldKind::Rating => leading_f64(value).is_some_and(|r| (0.0..=5.0).contains(&r)),
        FieldKind::ReviewCount => value.chars().any(|c| c.is_ascii_digit()),
        FieldKind::Address | FieldKind::BusinessListing => true,
    }
}

/// Host portion of a URL, without scheme, port, or path. Empty for
/// scheme-relative garbage.
pub(crate) fn host_of(url: &str) -> String {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    rest.split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .split(':')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// First whitespace-delimited token parsed as f64 ("4.5 stars" -> 4.5).
pub(crate) fn leading_f64(value: &str) -> Option<f64> {
    value
        .split_whitespace()
        .next()?
        .replace(',', ".")
        .parse::<f64>()
        .ok()
}
