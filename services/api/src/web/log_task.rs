//! services/api/src/web/log_task.rs
//!
//! The single-turn logging pipeline: parse one natural-language feeding
//! description, resolve it against the user's food catalog, persist the log
//! entry, and raise whatever clarification questions the food still needs.

use crate::web::parse::{lookup_nutrition, parse_utterance};
use crate::web::state::AppState;
use chrono::Utc;
use pettrack_core::clarify::generate_clarifications;
use pettrack_core::domain::{
    Clarification, DailySummary, Food, FoodPatch, FoodSource, LogEntry, NewClarification, NewFood,
    NewLogEntry, ParsedUtterance, Pet, ProviderCredentials, MAX_ALIASES,
};
use pettrack_core::matcher::{self, MatchVerdict};
use pettrack_core::nutrition;
use pettrack_core::ports::{DatabaseService, PortResult};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Everything one logging turn produced.
#[derive(Debug)]
pub struct LogOutcome {
    pub entry: LogEntry,
    pub clarifications: Vec<Clarification>,
    pub daily_summary: DailySummary,
}

/// Runs the full pipeline for one feeding description.
///
/// An unknown pet fails the request outright. Once parsing succeeds the turn
/// always produces a log entry, even when the food had to be registered as a
/// bare stub on the way.
pub async fn log_meal(
    app_state: Arc<AppState>,
    user_id: Uuid,
    pet_id: Uuid,
    raw_input: &str,
) -> PortResult<LogOutcome> {
    let db = app_state.db.as_ref();

    let pet = db.get_pet(user_id, pet_id).await?;
    let foods = db.get_foods_for_user(user_id).await?;
    let credentials = app_state.resolve_credentials().await?;

    let parsed = parse_utterance(
        app_state.completions.as_ref(),
        &credentials,
        raw_input,
        &foods,
    )
    .await?;
    info!(
        "Parsed '{}' as {} {} (confidence {:.2}).",
        raw_input, parsed.quantity, parsed.unit, parsed.confidence
    );

    let (food, shortlist) = match matcher::match_food(&parsed, &foods) {
        MatchVerdict::Exact { food, score } | MatchVerdict::Fuzzy { food, score } => {
            info!(
                "Matched '{}' to '{}' (score {:.2}).",
                raw_input, food.canonical_name, score
            );
            (learn_alias(db, food, raw_input).await?, None)
        }
        MatchVerdict::Multiple(candidates) => {
            // Log against the best candidate now; a disambiguation question
            // goes out alongside the entry.
            let tentative = candidates[0].clone();
            (tentative, Some(candidates))
        }
        MatchVerdict::None => {
            let food =
                register_stub_food(&app_state, &credentials, user_id, raw_input, &parsed).await?;
            (food, None)
        }
    };

    let weight_g = nutrition::resolve_weight_g(parsed.quantity, &parsed.unit, &food);
    let kcal = match (weight_g, food.kcal_per_100g) {
        (Some(weight), Some(density)) => Some(nutrition::entry_kcal(weight, density)),
        _ => None,
    };

    let entry = db
        .create_log_entry(
            user_id,
            NewLogEntry {
                pet_id,
                food_id: Some(food.id),
                raw_input: raw_input.to_string(),
                quantity: Some(parsed.quantity),
                unit: Some(parsed.unit.clone()),
                weight_g,
                kcal,
                meal_type: parsed.meal_type.clone(),
            },
        )
        .await?;

    let mut clarifications = Vec::new();
    for question in generate_clarifications(&food, shortlist.as_deref()) {
        let clarification = db
            .create_clarification(
                user_id,
                NewClarification {
                    log_entry_id: Some(entry.id),
                    food_id: Some(food.id),
                    field: question.field,
                    question: question.question,
                    priority: question.priority,
                },
            )
            .await?;
        clarifications.push(clarification);
    }

    let daily_summary = daily_summary_for(db, user_id, &pet).await?;

    Ok(LogOutcome {
        entry,
        clarifications,
        daily_summary,
    })
}

/// Builds the running totals for the pet's current UTC day.
pub async fn daily_summary_for(
    db: &dyn DatabaseService,
    user_id: Uuid,
    pet: &Pet,
) -> PortResult<DailySummary> {
    let today = Utc::now().date_naive();
    let entries = db.get_entries_for_day(user_id, pet.id, today).await?;
    Ok(nutrition::daily_summary(entries, pet.budget_kcal()))
}

/// Remembers the raw input as an alias on a matched food, so the same
/// shorthand resolves without the model next time.
async fn learn_alias(db: &dyn DatabaseService, mut food: Food, raw_input: &str) -> PortResult<Food> {
    let alias = raw_input.to_lowercase().trim().to_string();
    if !food.has_alias(&alias) && alias != food.canonical_name.to_lowercase() {
        if food.aliases.len() >= MAX_ALIASES {
            warn!(
                "Food {} is at the alias cap; not learning '{}'.",
                food.id, alias
            );
        } else {
            food.aliases.push(alias);
            db.set_food_aliases(food.id, &food.aliases).await?;
        }
    }
    Ok(food)
}

/// Registers a stub food for an unrecognized input, then tries to enrich it
/// with a best-effort nutrition lookup. Lookup failures never surface; the
/// stub stays bare and clarification questions cover the gaps.
async fn register_stub_food(
    app_state: &AppState,
    credentials: &ProviderCredentials,
    user_id: Uuid,
    raw_input: &str,
    parsed: &ParsedUtterance,
) -> PortResult<Food> {
    let db = app_state.db.as_ref();

    let name_parts: Vec<&str> = [parsed.brand_guess.as_deref(), parsed.variant_guess.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect();
    let canonical_name = if name_parts.is_empty() {
        raw_input.to_string()
    } else {
        name_parts.join(" ")
    };

    let mut food = db
        .create_food(
            user_id,
            NewFood {
                canonical_name,
                brand: parsed.brand_guess.clone(),
                variant: parsed.variant_guess.clone(),
                aliases: vec![raw_input.to_lowercase()],
                serving_unit: Some(parsed.unit.clone()),
                source: FoodSource::Auto,
                ..Default::default()
            },
        )
        .await?;
    info!(
        "No catalog match for '{}', registered '{}' as a new food.",
        raw_input, food.canonical_name
    );

    if food.kcal_per_100g.is_none() {
        if let Some(facts) = lookup_nutrition(
            app_state.completions.as_ref(),
            credentials,
            &food.canonical_name,
            food.brand.as_deref(),
            food.variant.as_deref(),
        )
        .await
        {
            let patch = FoodPatch {
                kcal_per_100g: facts.kcal_per_100g,
                protein_pct: facts.protein_pct,
                fat_pct: facts.fat_pct,
                fibre_pct: facts.fibre_pct,
                moisture_pct: facts.moisture_pct,
                source: Some(FoodSource::LlmLookup),
                ..Default::default()
            };
            food = db.update_food(food.id, &patch).await?;
            let score = nutrition::completeness(&food);
            db.set_food_completeness(food.id, score).await?;
            food.completeness_score = score;
            info!("Adopted nutrition lookup for food {}.", food.id);
        }
    }

    Ok(food)
}
