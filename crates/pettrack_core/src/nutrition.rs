//! crates/pettrack_core/src/nutrition.rs
//!
//! Energy math and food-profile scoring: resting/maintenance requirements,
//! weight resolution for logged quantities, per-entry calories, profile
//! completeness, and the daily summary fold.

use crate::domain::{ActivityLevel, DailySummary, Food, LogEntry};

/// Units that describe countable pieces rather than measures of weight.
const DISCRETE_UNITS: [&str; 4] = ["item", "piece", "treat", "stick"];

/// Resting energy requirement in kcal/day: `70 * kg^0.75`.
pub fn resting_energy_requirement(weight_kg: f64) -> f64 {
    70.0 * weight_kg.powf(0.75)
}

/// Maintenance energy requirement: RER scaled by the activity multiplier.
pub fn maintenance_energy_requirement(weight_kg: f64, activity: ActivityLevel) -> f64 {
    resting_energy_requirement(weight_kg) * activity.multiplier()
}

/// Grams represented by `quantity` of `unit`. Weight units convert directly;
/// anything else needs the food's serving weight, and without one the weight
/// stays unresolved rather than guessed.
pub fn resolve_weight_g(quantity: f64, unit: &str, food: &Food) -> Option<f64> {
    match unit {
        "g" => Some(quantity),
        "kg" => Some(quantity * 1000.0),
        _ => food.serving_weight_g.map(|serving| quantity * serving),
    }
}

/// Calories in `weight_g` grams of a food with the given density.
pub fn entry_kcal(weight_g: f64, kcal_per_100g: f64) -> f64 {
    (weight_g / 100.0) * kcal_per_100g
}

/// Calories for a logged quantity, preferring the per-item figure for
/// countable units and falling back to weight times density. `None` when
/// neither path has enough data.
pub fn entry_kcal_for_food(quantity: f64, unit: &str, food: &Food) -> Option<f64> {
    if let Some(per_item) = food.kcal_per_item {
        if DISCRETE_UNITS.contains(&unit) {
            return Some(per_item * quantity);
        }
    }
    let weight = resolve_weight_g(quantity, unit, food)?;
    food.kcal_per_100g.map(|density| entry_kcal(weight, density))
}

/// Weighted share of the nutrition profile that is filled in, rounded to two
/// decimals. Weights: variant 0.15, serving weight 0.30, kcal/100g 0.25,
/// protein 0.10, fat 0.10, fibre 0.05, moisture 0.05.
pub fn completeness(food: &Food) -> f64 {
    let mut score: f64 = 0.0;
    if food.variant.as_deref().is_some_and(|v| !v.is_empty()) {
        score += 0.15;
    }
    if food.serving_weight_g.is_some() {
        score += 0.30;
    }
    if food.kcal_per_100g.is_some() {
        score += 0.25;
    }
    if food.protein_pct.is_some() {
        score += 0.10;
    }
    if food.fat_pct.is_some() {
        score += 0.10;
    }
    if food.fibre_pct.is_some() {
        score += 0.05;
    }
    if food.moisture_pct.is_some() {
        score += 0.05;
    }
    (score * 100.0).round() / 100.0
}

/// Folds one day's entries against a calorie budget. Entries without a known
/// calorie value contribute nothing to the total; they remain visible in the
/// entry list as pending.
pub fn daily_summary(entries: Vec<LogEntry>, budget_kcal: f64) -> DailySummary {
    let total_kcal: f64 = entries.iter().filter_map(|e| e.kcal).sum();
    let percentage = if budget_kcal > 0.0 {
        (total_kcal / budget_kcal) * 100.0
    } else {
        0.0
    };
    DailySummary {
        total_kcal,
        budget_kcal,
        remaining_kcal: budget_kcal - total_kcal,
        entries_today: entries,
        percentage,
    }
}
