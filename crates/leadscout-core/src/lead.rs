//! Lead records and the quality heuristic used to rank them.
//!
//! A [`Lead`] is assembled incrementally from unreliable sources, so every
//! contact field uses the empty string as its "not found" sentinel. Partial
//! records are first-class: a name-only Lead is valid output and is simply
//! demoted by its quality score.

use serde::{Deserialize, Serialize};

/// Where a Lead's data came from. Affects cache invalidation and ranking
/// tie-breaks downstream, never the score itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Scraped,
    ApiFallback,
}

impl Default for LeadSource {
    fn default() -> Self {
        LeadSource::Scraped
    }
}

impl std::fmt::Display for LeadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeadSource::Scraped => write!(f, "scraped"),
            LeadSource::ApiFallback => write!(f, "api_fallback"),
        }
    }
}

/// One discovered business. Empty string means "not found" for every
/// optional text field; `rating == 0.0` and `review_count == 0` mean absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lead {
    pub name: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub facebook: String,
    #[serde(default)]
    pub tiktok: String,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    /// Provider-assigned place ID when sourced from the API fallback.
    #[serde(default)]
    pub place_id: String,
    #[serde(default)]
    pub source: LeadSource,
    #[serde(default)]
    pub quality_score: u8,
    /// Wall time spent producing this Lead, in seconds. Diagnostic only.
    #[serde(default)]
    pub processing_time: f64,
}

impl Lead {
    /// Fixed ranking weights: name +2, website +3, phone +2, email +3,
    /// address +1, rating +1, reviews +1, any social +1, capped at 10.
    ///
    /// Deterministic and monotonic: populating a previously-empty field can
    /// never lower the score, and the result does not depend on the order in
    /// which fields were filled.
    pub fn recompute_quality(&mut self) {
        let mut score: u8 = 0;
        if !self.name.is_empty() {
            score += 2;
        }
        if !self.website.is_empty() {
            score += 3;
        }
        if !self.phone.is_empty() {
            score += 2;
        }
        if !self.email.is_empty() {
            score += 3;
        }
        if !self.address.is_empty() {
            score += 1;
        }
        if self.rating > 0.0 {
            score += 1;
        }
        if self.review_count > 0 {
            score += 1;
        }
        if self.has_social() {
            score += 1;
        }
        self.quality_score = score.min(10);
    }

    /// True if any social profile field is populated.
    #[must_use]
    pub fn has_social(&self) -> bool {
        !self.instagram.is_empty()
            || !self.facebook.is_empty()
            || !self.tiktok.is_empty()
            || !self.twitter.is_empty()
    }

    /// Social links as a (platform, url) mapping, in fixed platform order.
    /// Empty values are included so consumers see the full platform set.
    #[must_use]
    pub fn socials(&self) -> [(&'static str, &str); 4] {
        [
            ("instagram", self.instagram.as_str()),
            ("facebook", self.facebook.as_str()),
            ("tiktok", self.tiktok.as_str()),
            ("twitter", self.twitter.as_str()),
        ]
    }
}

/// Aggregate counts over a finished scrape, for reporting and export headers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeSummary {
    pub total: usize,
    pub with_website: usize,
    pub with_email: usize,
    pub with_phone: usize,
    /// quality_score >= 7
    pub high_quality: usize,
    /// quality_score in 4..=6
    pub medium_quality: usize,
    /// quality_score < 4
    pub low_quality: usize,
    pub scraped: usize,
    pub api_fallback: usize,
    pub elapsed_secs: f64,
}

impl ScrapeSummary {
    #[must_use]
    pub fn from_leads(leads: &[Lead], elapsed_secs: f64) -> Self {
        let mut summary = ScrapeSummary {
            total: leads.len(),
            elapsed_secs,
            ..ScrapeSummary::default()
        };
        for lead in leads {
            if !lead.website.is_empty() {
                summary.with_website += 1;
            }
            if !lead.email.is_empty() {
                summary.with_email += 1;
            }
            if !lead.phone.is_empty() {
                summary.with_phone += 1;
            }
            match lead.quality_score {
                7..=10 => summary.high_quality += 1,
                4..=6 => summary.medium_quality += 1,
                _ => summary.low_quality += 1,
            }
            match lead.source {
                LeadSource::Scraped => summary.scraped += 1,
                LeadSource::ApiFallback => summary.api_fallback += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
#[path = "lead_test.rs"]
mod tests;
