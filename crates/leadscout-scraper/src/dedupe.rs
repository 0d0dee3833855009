//! Near-duplicate suppression over business names.
//!
//! The listing site frequently shows the same business twice under slightly
//! different names ("Haywire" / "Haywire Restaurant"). Two leads collide when
//! their normalized names are equal, or when the shorter name's words are
//! (almost) all contained in the longer one — the containment fraction must
//! exceed [`SIMILARITY_THRESHOLD`], which a true substring relation always
//! clears. On collision the first-seen lead is kept.

use leadscout_core::Lead;

/// Minimum fraction of the shorter name's words that must appear in the
/// longer name for a collision.
const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Lowercase, trim, and collapse internal whitespace.
fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fraction of the shorter name's words present in the longer name.
/// 1.0 when one normalized name is a word-wise substring of the other.
fn containment(a: &str, b: &str) -> f64 {
    let words_a: Vec<&str> = a.split(' ').collect();
    let words_b: Vec<&str> = b.split(' ').collect();
    let (short, long) = if words_a.len() <= words_b.len() {
        (&words_a, &words_b)
    } else {
        (&words_b, &words_a)
    };
    if short.is_empty() {
        return 0.0;
    }
    let hits = short.iter().filter(|w| long.contains(w)).count();
    #[allow(clippy::cast_precision_loss)]
    {
        hits as f64 / short.len() as f64
    }
}

fn collides(a: &str, b: &str) -> bool {
    a == b || containment(a, b) > SIMILARITY_THRESHOLD
}

/// Drop leads whose names near-duplicate an earlier lead's name. Stable:
/// survivors keep their original order, and the pass is idempotent.
#[must_use]
pub fn suppress_near_duplicates(leads: Vec<Lead>) -> Vec<Lead> {
    let mut kept: Vec<Lead> = Vec::with_capacity(leads.len());
    let mut seen: Vec<String> = Vec::with_capacity(leads.len());

    for lead in leads {
        let normalized = normalize_name(&lead.name);
        if seen.iter().any(|earlier| collides(earlier, &normalized)) {
            tracing::debug!(name = %lead.name, "suppressed near-duplicate lead");
            continue;
        }
        seen.push(normalized);
        kept.push(lead);
    }
    kept
}
