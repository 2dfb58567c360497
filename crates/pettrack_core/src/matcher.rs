//! crates/pettrack_core/src/matcher.rs
//!
//! Fuzzy matching of parsed feeding descriptions against the user's food
//! catalog. Pure string work: no I/O, no provider calls.

use std::collections::HashSet;

use crate::domain::{Food, ParsedUtterance};

/// Outcome of matching one parsed utterance against the catalog.
#[derive(Debug, Clone)]
pub enum MatchVerdict {
    /// Nothing in the catalog came close, or there was nothing to search with.
    None,
    /// A single dominant candidate with a high score.
    Exact { food: Food, score: f64 },
    /// A single dominant candidate below the exact threshold.
    Fuzzy { food: Food, score: f64 },
    /// Several plausible candidates, best first, at most three.
    Multiple(Vec<Food>),
}

/// Lowercases and strips everything outside ASCII `a-z0-9`.
pub fn normalise(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn bigrams(s: &str) -> HashSet<[u8; 2]> {
    // Normalised strings are pure ASCII, so byte windows are character pairs.
    s.as_bytes().windows(2).map(|w| [w[0], w[1]]).collect()
}

/// Similarity of two terms in [0, 1]: 1.0 for an exact normalised match,
/// 0.8 for containment either way, otherwise the Sorensen-Dice coefficient
/// over character bigrams. Strings shorter than two characters score 0.
pub fn fuzzy_score(a: &str, b: &str) -> f64 {
    let na = normalise(a);
    let nb = normalise(b);
    if na == nb {
        return 1.0;
    }
    if nb.contains(&na) || na.contains(&nb) {
        return 0.8;
    }
    let ga = bigrams(&na);
    let gb = bigrams(&nb);
    if ga.is_empty() || gb.is_empty() {
        return 0.0;
    }
    let overlap = ga.intersection(&gb).count();
    (2.0 * overlap as f64) / ((ga.len() + gb.len()) as f64)
}

/// Scores every catalog food against the parsed brand/variant guesses and
/// decides between a confident single match, a shortlist, or no match.
pub fn match_food(parsed: &ParsedUtterance, foods: &[Food]) -> MatchVerdict {
    if foods.is_empty() {
        return MatchVerdict::None;
    }

    let needles: Vec<&str> = [parsed.brand_guess.as_deref(), parsed.variant_guess.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();
    if needles.is_empty() {
        return MatchVerdict::None;
    }

    let mut scored: Vec<(&Food, f64)> = Vec::new();
    for food in foods {
        let search_terms = [
            Some(food.canonical_name.as_str()),
            food.brand.as_deref(),
            food.variant.as_deref(),
        ]
        .into_iter()
        .flatten()
        .chain(food.aliases.iter().map(String::as_str))
        .filter(|s| !s.is_empty());

        let mut best = 0.0f64;
        for term in search_terms {
            for needle in &needles {
                let score = fuzzy_score(needle, term);
                if score > best {
                    best = score;
                }
            }
        }
        if best > 0.3 {
            scored.push((food, best));
        }
    }

    if scored.is_empty() {
        return MatchVerdict::None;
    }
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (top_food, top_score) = scored[0];
    let runner_up = scored.get(1).map(|(_, s)| *s).unwrap_or(0.0);
    if scored.len() == 1 || (top_score >= 0.7 && top_score - runner_up > 0.2) {
        let food = top_food.clone();
        return if top_score >= 0.8 {
            MatchVerdict::Exact {
                food,
                score: top_score,
            }
        } else {
            MatchVerdict::Fuzzy {
                food,
                score: top_score,
            }
        };
    }

    MatchVerdict::Multiple(
        scored
            .into_iter()
            .take(3)
            .map(|(food, _)| food.clone())
            .collect(),
    )
}
