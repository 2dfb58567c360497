//! services/api/src/web/clarify_task.rs
//!
//! Resolves one pending clarification: writes the answer into the food
//! profile and replays the calorie math for any entries the new figure
//! unlocks.

use pettrack_core::domain::{Clarification, Food, FoodPatch};
use pettrack_core::nutrition;
use pettrack_core::ports::{DatabaseService, PortError, PortResult};
use tracing::info;
use uuid::Uuid;

/// Everything resolving one clarification produced.
#[derive(Debug)]
pub struct ClarifyOutcome {
    pub resolved: bool,
    pub remaining: Vec<Clarification>,
}

/// Applies the user's answer to one clarification question.
///
/// The value is validated before anything is written, so a malformed answer
/// leaves the clarification open for another attempt. A food that vanished
/// since the question was asked still gets the question closed out.
pub async fn resolve_clarification(
    db: &dyn DatabaseService,
    user_id: Uuid,
    clarification_id: Uuid,
    value: &str,
) -> PortResult<ClarifyOutcome> {
    let clarification = db
        .get_clarification_by_id(user_id, clarification_id)
        .await?;
    if clarification.resolved {
        return Err(PortError::Invalid(
            "Clarification already resolved".to_string(),
        ));
    }

    let target = match clarification.food_id {
        Some(food_id) => match db.get_food_by_id(user_id, food_id).await {
            Ok(food) => Some((food, patch_for_field(&clarification.field, value)?)),
            Err(PortError::NotFound(_)) => None,
            Err(e) => return Err(e),
        },
        None => None,
    };

    db.mark_clarification_resolved(clarification.id, value)
        .await?;
    info!(
        "Resolved clarification {} ({} = '{}').",
        clarification.id, clarification.field, value
    );

    if let Some((food, patch)) = target {
        let food = db.update_food(food.id, &patch).await?;
        let score = nutrition::completeness(&food);
        db.set_food_completeness(food.id, score).await?;

        // A new density or serving weight can make previously stuck entries
        // computable, so replay the math for everything logged against it.
        if matches!(
            clarification.field.as_str(),
            "kcal_per_100g" | "serving_weight_g"
        ) {
            recompute_entries(db, &food).await?;
        }
    }

    let remaining = db.get_unresolved_clarifications(user_id).await?;

    Ok(ClarifyOutcome {
        resolved: true,
        remaining,
    })
}

/// Re-derives weight and calories for every entry logged against the food.
async fn recompute_entries(db: &dyn DatabaseService, food: &Food) -> PortResult<()> {
    let entries = db.get_entries_for_food(food.id).await?;
    for entry in entries {
        let weight_g = entry
            .weight_g
            .or_else(|| match (entry.quantity, entry.unit.as_deref()) {
                (Some(quantity), Some(unit)) if !unit.is_empty() => {
                    nutrition::resolve_weight_g(quantity, unit, food)
                }
                _ => None,
            });
        let kcal = match (weight_g, food.kcal_per_100g) {
            (Some(weight), Some(density)) => Some(nutrition::entry_kcal(weight, density)),
            _ => None,
        };
        if weight_g.is_some() || kcal.is_some() {
            db.update_entry_resolution(entry.id, weight_g, kcal).await?;
        }
    }
    Ok(())
}

/// Maps a clarification's target field to a food patch, coercing numeric
/// fields and rejecting answers that do not parse.
fn patch_for_field(field: &str, value: &str) -> PortResult<FoodPatch> {
    let mut patch = FoodPatch::default();
    match field {
        "canonical_name" => patch.canonical_name = Some(value.to_string()),
        "brand" => patch.brand = Some(value.to_string()),
        "variant" => patch.variant = Some(value.to_string()),
        "serving_unit" => patch.serving_unit = Some(value.to_string()),
        "serving_weight_g" => patch.serving_weight_g = Some(parse_numeric(field, value)?),
        "kcal_per_100g" => patch.kcal_per_100g = Some(parse_numeric(field, value)?),
        "protein_pct" => patch.protein_pct = Some(parse_numeric(field, value)?),
        "fat_pct" => patch.fat_pct = Some(parse_numeric(field, value)?),
        "fibre_pct" => patch.fibre_pct = Some(parse_numeric(field, value)?),
        "moisture_pct" => patch.moisture_pct = Some(parse_numeric(field, value)?),
        other => {
            return Err(PortError::Unexpected(format!(
                "Clarification targets unknown food field: {}",
                other
            )))
        }
    }
    Ok(patch)
}

fn parse_numeric(field: &str, value: &str) -> PortResult<f64> {
    value.trim().parse().map_err(|_| {
        PortError::Invalid(format!("Expected a number for {}, got '{}'", field, value))
    })
}
