//! Coverage for clarification resolution: answers landing in the food
//! profile, calorie replays for stuck entries, and the failure modes that
//! leave a question open.

mod common;

use api_lib::web::clarify_task::resolve_clarification;
use chrono::Utc;
use common::*;
use pettrack_core::domain::{Clarification, Food, FoodSource, LogEntry, NewClarification, NewLogEntry};
use pettrack_core::ports::{DatabaseService, PortError};
use std::sync::Arc;
use uuid::Uuid;

/// A food with nothing but a name, the shape a stub registration leaves behind.
fn bare_food(user_id: Uuid) -> Food {
    let now = Utc::now();
    Food {
        id: Uuid::new_v4(),
        user_id,
        canonical_name: "Mystery Kibble".to_string(),
        brand: None,
        variant: None,
        aliases: Vec::new(),
        serving_unit: None,
        serving_weight_g: None,
        kcal_per_100g: None,
        kcal_per_item: None,
        protein_pct: None,
        fat_pct: None,
        fibre_pct: None,
        moisture_pct: None,
        ash_pct: None,
        source: FoodSource::Auto,
        completeness_score: 0.0,
        created_at: now,
        updated_at: now,
    }
}

async fn seed_unpriced_entry(
    store: &MemoryStore,
    user_id: Uuid,
    food_id: Uuid,
    quantity: f64,
    unit: &str,
    weight_g: Option<f64>,
) -> LogEntry {
    store
        .create_log_entry(
            user_id,
            NewLogEntry {
                pet_id: Uuid::new_v4(),
                food_id: Some(food_id),
                raw_input: format!("{quantity} {unit} of mystery kibble"),
                quantity: Some(quantity),
                unit: Some(unit.to_string()),
                weight_g,
                kcal: None,
                meal_type: None,
            },
        )
        .await
        .unwrap()
}

async fn seed_question(
    store: &MemoryStore,
    user_id: Uuid,
    food_id: Option<Uuid>,
    field: &str,
    priority: i32,
) -> Clarification {
    store
        .create_clarification(
            user_id,
            NewClarification {
                log_entry_id: None,
                food_id,
                field: field.to_string(),
                question: format!("Pending question about {field}"),
                priority,
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn a_density_answer_updates_the_food_and_replays_entries() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    let food = bare_food(user);
    store.add_food(food.clone());
    let entry = seed_unpriced_entry(&store, user, food.id, 50.0, "g", Some(50.0)).await;
    let question = seed_question(&store, user, Some(food.id), "kcal_per_100g", 2).await;

    let outcome = resolve_clarification(store.as_ref(), user, question.id, "400")
        .await
        .unwrap();
    assert!(outcome.resolved);
    assert!(outcome.remaining.is_empty());

    let updated = store.food(food.id);
    assert_eq!(updated.kcal_per_100g, Some(400.0));
    assert!((updated.completeness_score - 0.25).abs() < 1e-9);

    // The stored weight stays; only the calories were missing.
    let replayed = store.entry(entry.id);
    assert_eq!(replayed.weight_g, Some(50.0));
    assert!((replayed.kcal.unwrap() - 200.0).abs() < 1e-9);

    let stored = store.clarifications.lock().unwrap()[0].clone();
    assert!(stored.resolved);
    assert_eq!(stored.resolved_value.as_deref(), Some("400"));
}

#[tokio::test]
async fn a_serving_weight_answer_unlocks_quantity_only_entries() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    let mut food = bare_food(user);
    food.serving_unit = Some("scoop".to_string());
    food.kcal_per_100g = Some(380.0);
    store.add_food(food.clone());
    let entry = seed_unpriced_entry(&store, user, food.id, 2.0, "scoop", None).await;
    let question = seed_question(&store, user, Some(food.id), "serving_weight_g", 1).await;

    resolve_clarification(store.as_ref(), user, question.id, "50")
        .await
        .unwrap();

    let updated = store.food(food.id);
    assert_eq!(updated.serving_weight_g, Some(50.0));
    assert!((updated.completeness_score - 0.55).abs() < 1e-9);

    let replayed = store.entry(entry.id);
    assert_eq!(replayed.weight_g, Some(100.0));
    assert!((replayed.kcal.unwrap() - 380.0).abs() < 1e-9);
}

#[tokio::test]
async fn a_text_answer_never_touches_entry_math() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    let mut food = bare_food(user);
    food.brand = Some("Acana".to_string());
    store.add_food(food.clone());
    let entry = seed_unpriced_entry(&store, user, food.id, 1.0, "scoop", None).await;
    let question = seed_question(&store, user, Some(food.id), "variant", 0).await;

    resolve_clarification(store.as_ref(), user, question.id, "Adult")
        .await
        .unwrap();

    let updated = store.food(food.id);
    assert_eq!(updated.variant.as_deref(), Some("Adult"));
    assert!((updated.completeness_score - 0.15).abs() < 1e-9);

    let untouched = store.entry(entry.id);
    assert_eq!(untouched.weight_g, None);
    assert_eq!(untouched.kcal, None);
}

#[tokio::test]
async fn answering_twice_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    let food = bare_food(user);
    store.add_food(food.clone());
    let question = seed_question(&store, user, Some(food.id), "variant", 0).await;

    resolve_clarification(store.as_ref(), user, question.id, "Adult")
        .await
        .unwrap();
    let err = resolve_clarification(store.as_ref(), user, question.id, "Puppy")
        .await
        .unwrap_err();

    assert!(matches!(err, PortError::Invalid(_)));
    assert_eq!(store.food(food.id).variant.as_deref(), Some("Adult"));
}

#[tokio::test]
async fn an_unknown_question_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let err = resolve_clarification(store.as_ref(), Uuid::new_v4(), Uuid::new_v4(), "400")
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));
}

#[tokio::test]
async fn another_users_question_is_invisible() {
    let store = Arc::new(MemoryStore::new());
    let owner = Uuid::new_v4();
    let question = seed_question(&store, owner, None, "variant", 0).await;

    let err = resolve_clarification(store.as_ref(), Uuid::new_v4(), question.id, "Adult")
        .await
        .unwrap_err();

    assert!(matches!(err, PortError::NotFound(_)));
    assert!(!store.clarifications.lock().unwrap()[0].resolved);
}

#[tokio::test]
async fn a_malformed_number_leaves_the_question_open() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    let food = bare_food(user);
    store.add_food(food.clone());
    let question = seed_question(&store, user, Some(food.id), "serving_weight_g", 1).await;

    let err = resolve_clarification(store.as_ref(), user, question.id, "about fifty")
        .await
        .unwrap_err();

    assert!(matches!(err, PortError::Invalid(_)));
    // Nothing was written: the question can be answered again.
    assert!(!store.clarifications.lock().unwrap()[0].resolved);
    assert_eq!(store.food(food.id).serving_weight_g, None);

    let outcome = resolve_clarification(store.as_ref(), user, question.id, "50")
        .await
        .unwrap();
    assert!(outcome.resolved);
    assert_eq!(store.food(food.id).serving_weight_g, Some(50.0));
}

#[tokio::test]
async fn a_vanished_food_still_closes_the_question() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    let question = seed_question(&store, user, Some(Uuid::new_v4()), "kcal_per_100g", 2).await;

    let outcome = resolve_clarification(store.as_ref(), user, question.id, "400")
        .await
        .unwrap();

    assert!(outcome.resolved);
    assert!(store.clarifications.lock().unwrap()[0].resolved);
}

#[tokio::test]
async fn remaining_questions_come_back_in_priority_order() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    let food = bare_food(user);
    store.add_food(food.clone());

    // Inserted out of order on purpose.
    let density = seed_question(&store, user, Some(food.id), "kcal_per_100g", 2).await;
    let identity = seed_question(&store, user, Some(food.id), "variant", 0).await;
    let serving = seed_question(&store, user, Some(food.id), "serving_weight_g", 1).await;

    let outcome = resolve_clarification(store.as_ref(), user, identity.id, "Adult")
        .await
        .unwrap();

    let remaining_ids: Vec<Uuid> = outcome.remaining.iter().map(|c| c.id).collect();
    assert_eq!(remaining_ids, vec![serving.id, density.id]);
}
