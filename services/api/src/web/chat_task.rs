//! services/api/src/web/chat_task.rs
//!
//! The conversational logging engine. Each turn sends the session transcript
//! plus a freshly rendered context prompt to the completion provider, decodes
//! the strict JSON reply, and executes the requested actions server-side. The
//! model proposes; this module is the only thing that writes.

use crate::web::log_task::daily_summary_for;
use crate::web::parse::{strip_markdown_fences, JSON_RETRY_NUDGE, MAX_JSON_RETRIES};
use crate::web::state::AppState;
use chrono::Utc;
use pettrack_core::actions::{
    ActionSummary, ActionSummaryKind, ChatAction, LlmReply, NEW_FOOD_PLACEHOLDER,
};
use pettrack_core::domain::{
    ChatRole, ChatSession, ChatTurn, DailySummary, Food, FoodPatch, FoodSource, LogEntry,
    NewChatMessage, NewFood, NewLogEntry, Pet, ProviderCredentials, SessionStatus, MAX_ALIASES,
};
use pettrack_core::nutrition;
use pettrack_core::ports::{CompletionOptions, CompletionService, DatabaseService, PortError, PortResult};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// How long a session stays reusable, measured from creation rather than from
/// the last message. A stale session is closed and silently replaced.
pub const SESSION_TIMEOUT_SECS: i64 = 600;

/// The context prompt rendered fresh for every turn. Placeholders are filled
/// by [`build_system_prompt`]; the literal braces in the response-format
/// section are why this goes through `replace` instead of `format!`.
const CHAT_SYSTEM_TEMPLATE: &str = r#"You are a pet food logging assistant for {pet}.
{weight_line}
Daily calorie budget: {budget_kcal} kcal. Consumed today: {consumed_kcal} kcal. Remaining: {remaining_kcal} kcal.

KNOWN FOOD LIBRARY:
{food_library}

YOUR JOB:
- Parse what the user fed their pet from natural language
- Match against known foods (fuzzy match by name/alias/brand)
- If you find a match: log it using log_food with the food's id
- If no match: create a new food entry using create_food, then log it
- If information is missing to properly log (e.g. you don't know the brand, size, variant): ASK the user — don't guess
- If a food has no kcal data: ask the user or try to determine from common knowledge for well-known commercial products
- For treats sold individually (dentasticks, greenies): use kcal_per_item, not kcal_per_100g
- Users may mention multiple items in one message — handle each one
- When updating food nutrition info, use update_food

IMPORTANT RULES:
- Be conversational and brief. One or two sentences max.
- When you have enough info to log, DO IT — don't ask for confirmation
- Never invent or guess calorie values. If you genuinely know the nutritional data of a well-known commercial product (e.g., Pedigree Dentastix), you can use that. Otherwise, ask.
- For ambiguous inputs like "a treat" or "some food", ask what specifically
- If the user gives a shorthand/nickname, try to match it to known foods first

RESPONSE FORMAT — you MUST return valid JSON (no markdown fences):
{
  "message": "Your conversational reply to the user",
  "actions": [
    // Zero or more actions. Types:
    // { "action": "log_food", "food_id": "...", "quantity": 1, "unit": "item" }
    // { "action": "create_food", "canonical_name": "...", "brand": "...", "aliases": ["..."], "kcal_per_100g": 350, ... }
    // { "action": "update_food", "food_id": "...", "fields": { "kcal_per_100g": 350, ... } }
    // { "action": "add_alias", "food_id": "...", "alias": "nood" }
    // { "action": "ask_user" }  // signals you need more info — keeps session active
  ]
}

If you need to create a food AND log it in the same turn, use create_food first (it will return a food_id), then log_food with food_id "NEW" — the system will substitute the real ID.
When you need to ask the user something, include ask_user in actions so the session stays open."#;

/// Everything one conversational turn produced.
#[derive(Debug)]
pub struct ChatOutcome {
    pub session_id: Uuid,
    pub user_message: String,
    pub assistant_message: String,
    pub action_summaries: Vec<ActionSummary>,
    pub entries_logged: Vec<LogEntry>,
    pub daily_summary: DailySummary,
    pub session_status: SessionStatus,
}

/// Runs one conversational turn end to end.
///
/// The user message is persisted before the provider is called, so a
/// malformed reply loses nothing: the session stays active and the client can
/// simply send again. Actions execute in the order the model listed them,
/// and a turn with no `ask_user` among them completes the session.
pub async fn chat_turn(
    app_state: Arc<AppState>,
    user_id: Uuid,
    pet_id: Uuid,
    message: &str,
    session_id: Option<Uuid>,
) -> PortResult<ChatOutcome> {
    let db = app_state.db.as_ref();

    let credentials = app_state.resolve_credentials().await?;
    let pet = db.get_pet(user_id, pet_id).await?;
    let session = resolve_session(db, user_id, pet_id, session_id).await?;

    // History is loaded before the new message is stored; the new message is
    // appended to the provider turns by hand below.
    let history = db.get_messages_for_session(session.id).await?;
    db.append_message(NewChatMessage {
        session_id: session.id,
        role: ChatRole::User,
        content: message.to_string(),
        tool_calls: None,
        tool_results: None,
    })
    .await?;

    let foods = db.get_foods_for_user(user_id).await?;
    let before = daily_summary_for(db, user_id, &pet).await?;
    let system_prompt = build_system_prompt(&pet, &foods, before.total_kcal, before.budget_kcal);

    let mut turns: Vec<ChatTurn> = Vec::with_capacity(history.len() + 1);
    for prior in &history {
        turns.push(ChatTurn {
            role: prior.role,
            content: prior.content.clone(),
        });
    }
    turns.push(ChatTurn::user(message));

    let reply = request_reply(
        app_state.completions.as_ref(),
        &credentials,
        &system_prompt,
        turns,
    )
    .await?;

    let mut action_summaries: Vec<ActionSummary> = Vec::new();
    let mut entries_logged: Vec<LogEntry> = Vec::new();
    let mut keep_active = false;
    let mut current_foods = foods;

    for action in &reply.actions {
        let result = execute_action(db, user_id, pet_id, action, &current_foods).await?;
        if let Some(summary) = result.summary {
            action_summaries.push(summary);
        }
        if let Some(entry) = result.entry {
            entries_logged.push(entry);
        }
        if result.keep_active {
            keep_active = true;
        }
        if result.foods_changed {
            // Later actions in the same turn may reference what this one made.
            current_foods = db.get_foods_for_user(user_id).await?;
        }
    }
    info!(
        "Chat turn on session {} ran {} actions and logged {} entries.",
        session.id,
        reply.actions.len(),
        entries_logged.len()
    );

    let tool_calls = if reply.actions.is_empty() {
        None
    } else {
        Some(encode_json(&reply.actions)?)
    };
    let tool_results = if action_summaries.is_empty() {
        None
    } else {
        Some(encode_json(&action_summaries)?)
    };
    db.append_message(NewChatMessage {
        session_id: session.id,
        role: ChatRole::Assistant,
        content: reply.message.clone(),
        tool_calls,
        tool_results,
    })
    .await?;

    let session_status = if keep_active {
        SessionStatus::Active
    } else {
        db.complete_session(session.id).await?;
        SessionStatus::Completed
    };

    let daily_summary = daily_summary_for(db, user_id, &pet).await?;

    Ok(ChatOutcome {
        session_id: session.id,
        user_message: message.to_string(),
        assistant_message: reply.message,
        action_summaries,
        entries_logged,
        daily_summary,
        session_status,
    })
}

/// Reuses the caller's session when it is still active and under the timeout;
/// anything else closes out and a fresh session is opened.
async fn resolve_session(
    db: &dyn DatabaseService,
    user_id: Uuid,
    pet_id: Uuid,
    session_id: Option<Uuid>,
) -> PortResult<ChatSession> {
    if let Some(id) = session_id {
        if let Some(existing) = db.get_active_session(user_id, id).await? {
            let age = Utc::now().signed_duration_since(existing.created_at);
            if age.num_seconds() < SESSION_TIMEOUT_SECS {
                return Ok(existing);
            }
            db.complete_session(existing.id).await?;
        }
    }
    db.open_session(user_id, pet_id).await
}

/// Calls the provider and decodes the strict JSON envelope, retrying once
/// with a corrective nudge when the reply does not parse. The failed reply
/// goes back into the transcript sent to the provider, not into the stored
/// session history.
async fn request_reply(
    completions: &dyn CompletionService,
    credentials: &ProviderCredentials,
    system_prompt: &str,
    mut turns: Vec<ChatTurn>,
) -> PortResult<LlmReply> {
    let mut options = CompletionOptions::new(credentials.model.clone());
    options.temperature = 0.3;
    options.max_tokens = 1500;

    let mut attempt = 0;
    loop {
        let raw = completions
            .complete(&credentials.api_key, system_prompt, &turns, &options)
            .await?;

        match serde_json::from_str::<LlmReply>(strip_markdown_fences(&raw)) {
            Ok(reply) => return Ok(reply),
            Err(e) if attempt >= MAX_JSON_RETRIES => {
                return Err(PortError::Provider(format!(
                    "Assistant produced malformed JSON after {} attempts: {}",
                    attempt + 1,
                    e
                )));
            }
            Err(e) => {
                warn!("Assistant reply was not valid JSON, sending nudge: {}", e);
                attempt += 1;
                turns.push(ChatTurn::assistant(raw));
                turns.push(ChatTurn::user(JSON_RETRY_NUDGE));
            }
        }
    }
}

//=========================================================================================
// Action Execution
//=========================================================================================

/// What executing a single action changed.
#[derive(Debug, Default)]
struct ActionResult {
    summary: Option<ActionSummary>,
    entry: Option<LogEntry>,
    keep_active: bool,
    foods_changed: bool,
}

/// Executes one action. Actions referencing foods the user does not own (or
/// ids that are plain garbage) are skipped rather than failing the turn; the
/// model is an untrusted caller.
async fn execute_action(
    db: &dyn DatabaseService,
    user_id: Uuid,
    pet_id: Uuid,
    action: &ChatAction,
    current_foods: &[Food],
) -> PortResult<ActionResult> {
    match action {
        ChatAction::LogFood {
            food_id,
            quantity,
            unit,
            meal_type,
        } => {
            log_food(
                db,
                user_id,
                pet_id,
                food_id,
                *quantity,
                unit,
                meal_type.as_deref(),
                current_foods,
            )
            .await
        }

        ChatAction::CreateFood {
            canonical_name,
            brand,
            variant,
            aliases,
            serving_unit,
            serving_weight_g,
            kcal_per_100g,
            kcal_per_item,
            protein_pct,
            fat_pct,
            fibre_pct,
            moisture_pct,
        } => {
            let food = db
                .create_food(
                    user_id,
                    NewFood {
                        canonical_name: canonical_name.clone(),
                        brand: brand.clone(),
                        variant: variant.clone(),
                        aliases: aliases.clone(),
                        serving_unit: serving_unit.clone(),
                        serving_weight_g: *serving_weight_g,
                        kcal_per_100g: *kcal_per_100g,
                        kcal_per_item: *kcal_per_item,
                        protein_pct: *protein_pct,
                        fat_pct: *fat_pct,
                        fibre_pct: *fibre_pct,
                        moisture_pct: *moisture_pct,
                        source: FoodSource::Chat,
                    },
                )
                .await?;
            let score = nutrition::completeness(&food);
            db.set_food_completeness(food.id, score).await?;
            info!("Chat created food '{}' ({}).", food.canonical_name, food.id);

            Ok(ActionResult {
                summary: Some(ActionSummary {
                    kind: ActionSummaryKind::CreatedFood,
                    description: canonical_name.clone(),
                    kcal: None,
                }),
                foods_changed: true,
                ..Default::default()
            })
        }

        ChatAction::UpdateFood { food_id, fields } => {
            update_food(db, user_id, food_id, fields).await
        }

        ChatAction::AddAlias { food_id, alias } => {
            add_alias(db, user_id, food_id, alias).await
        }

        ChatAction::AskUser => Ok(ActionResult {
            keep_active: true,
            ..Default::default()
        }),

        ChatAction::Unknown => Ok(ActionResult::default()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn log_food(
    db: &dyn DatabaseService,
    user_id: Uuid,
    pet_id: Uuid,
    food_id: &str,
    quantity: f64,
    unit: &str,
    meal_type: Option<&str>,
    current_foods: &[Food],
) -> PortResult<ActionResult> {
    // "NEW" points at the food a create_food earlier in this turn just made.
    let resolved_id = if food_id == NEW_FOOD_PLACEHOLDER {
        match db.get_newest_food(user_id).await? {
            Some(newest) => newest.id,
            None => return Ok(ActionResult::default()),
        }
    } else {
        match Uuid::parse_str(food_id) {
            Ok(id) => id,
            Err(_) => return Ok(ActionResult::default()),
        }
    };

    let food = match current_foods.iter().find(|f| f.id == resolved_id) {
        Some(found) => found.clone(),
        None => match db.get_food_by_id(user_id, resolved_id).await {
            Ok(found) => found,
            Err(PortError::NotFound(_)) => return Ok(ActionResult::default()),
            Err(e) => return Err(e),
        },
    };

    let kcal = nutrition::entry_kcal_for_food(quantity, unit, &food);
    let weight_g = nutrition::resolve_weight_g(quantity, unit, &food);
    let description = format!("{} {} of {}", quantity, unit, food.canonical_name);

    let entry = db
        .create_log_entry(
            user_id,
            NewLogEntry {
                pet_id,
                food_id: Some(food.id),
                raw_input: description.clone(),
                quantity: Some(quantity),
                unit: Some(unit.to_string()),
                weight_g,
                kcal,
                meal_type: meal_type.map(str::to_string),
            },
        )
        .await?;

    Ok(ActionResult {
        summary: Some(ActionSummary {
            kind: ActionSummaryKind::Logged,
            description,
            kcal,
        }),
        entry: Some(entry),
        ..Default::default()
    })
}

async fn update_food(
    db: &dyn DatabaseService,
    user_id: Uuid,
    food_id: &str,
    fields: &FoodPatch,
) -> PortResult<ActionResult> {
    let food_id = match Uuid::parse_str(food_id) {
        Ok(id) => id,
        Err(_) => return Ok(ActionResult::default()),
    };
    // The ownership check happens up front; the patch itself is keyed by id.
    let food = match db.get_food_by_id(user_id, food_id).await {
        Ok(found) => found,
        Err(PortError::NotFound(_)) => return Ok(ActionResult::default()),
        Err(e) => return Err(e),
    };

    if !fields.is_empty() {
        let updated = db.update_food(food.id, fields).await?;
        let score = nutrition::completeness(&updated);
        db.set_food_completeness(updated.id, score).await?;

        // New density, per-item or serving figures can make previously
        // uncomputable entries computable.
        if fields.affects_entry_kcal() {
            backfill_entries(db, &updated).await?;
        }
    }

    Ok(ActionResult {
        summary: Some(ActionSummary {
            kind: ActionSummaryKind::UpdatedFood,
            description: format!("Updated {}", fields.changed_fields().join(", ")),
            kcal: None,
        }),
        foods_changed: true,
        ..Default::default()
    })
}

async fn add_alias(
    db: &dyn DatabaseService,
    user_id: Uuid,
    food_id: &str,
    alias: &str,
) -> PortResult<ActionResult> {
    let food_id = match Uuid::parse_str(food_id) {
        Ok(id) => id,
        Err(_) => return Ok(ActionResult::default()),
    };
    let mut food = match db.get_food_by_id(user_id, food_id).await {
        Ok(found) => found,
        Err(PortError::NotFound(_)) => return Ok(ActionResult::default()),
        Err(e) => return Err(e),
    };

    let normalized = alias.to_lowercase().trim().to_string();
    if !normalized.is_empty() && !food.has_alias(&normalized) {
        if food.aliases.len() >= MAX_ALIASES {
            warn!(
                "Food {} is at the alias cap; not adding '{}'.",
                food.id, normalized
            );
        } else {
            food.aliases.push(normalized);
            db.set_food_aliases(food.id, &food.aliases).await?;
        }
    }

    Ok(ActionResult {
        summary: Some(ActionSummary {
            kind: ActionSummaryKind::AddedAlias,
            description: format!("\"{}\" → {}", alias, food.canonical_name),
            kcal: None,
        }),
        foods_changed: true,
        ..Default::default()
    })
}

/// Fills in calories for entries logged before the food had usable numbers.
async fn backfill_entries(db: &dyn DatabaseService, food: &Food) -> PortResult<()> {
    let entries = db.get_entries_missing_kcal(food.id).await?;
    for entry in entries {
        match (entry.quantity, entry.unit.as_deref()) {
            (Some(quantity), Some(unit)) if !unit.is_empty() => {
                if let Some(kcal) = nutrition::entry_kcal_for_food(quantity, unit, food) {
                    db.set_entry_kcal(entry.id, kcal).await?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

//=========================================================================================
// Prompt Rendering
//=========================================================================================

fn build_system_prompt(pet: &Pet, foods: &[Food], consumed_kcal: f64, budget_kcal: f64) -> String {
    let pet_label = match pet.breed.as_deref().filter(|b| !b.is_empty()) {
        Some(breed) => format!("{} ({})", pet.name, breed),
        None => pet.name.clone(),
    };
    let weight_line = match pet.weight_kg {
        Some(weight) if weight > 0.0 => format!("Weight: {} kg.", weight),
        _ => String::new(),
    };
    let food_library = if foods.is_empty() {
        "  (empty — no foods registered yet)".to_string()
    } else {
        foods
            .iter()
            .map(food_library_line)
            .collect::<Vec<_>>()
            .join("\n")
    };

    CHAT_SYSTEM_TEMPLATE
        .replace("{pet}", &pet_label)
        .replace("{weight_line}", &weight_line)
        .replace("{budget_kcal}", &rounded(budget_kcal))
        .replace("{consumed_kcal}", &rounded(consumed_kcal))
        .replace("{remaining_kcal}", &rounded(budget_kcal - consumed_kcal))
        .replace("{food_library}", &food_library)
}

/// One food library line: the id and name always, everything else only when
/// the food actually has it.
fn food_library_line(food: &Food) -> String {
    let mut parts = vec![
        format!("id={}", food.id),
        format!("name=\"{}\"", food.canonical_name),
    ];
    if let Some(brand) = food.brand.as_deref().filter(|b| !b.is_empty()) {
        parts.push(format!("brand=\"{}\"", brand));
    }
    if let Some(variant) = food.variant.as_deref().filter(|v| !v.is_empty()) {
        parts.push(format!("variant=\"{}\"", variant));
    }
    if !food.aliases.is_empty() {
        let quoted: Vec<String> = food.aliases.iter().map(|a| format!("\"{}\"", a)).collect();
        parts.push(format!("aliases=[{}]", quoted.join(", ")));
    }
    if let Some(unit) = food.serving_unit.as_deref().filter(|u| !u.is_empty()) {
        parts.push(format!("serving_unit=\"{}\"", unit));
    }
    if let Some(weight) = food.serving_weight_g {
        parts.push(format!("serving_weight_g={}", weight));
    }
    if let Some(density) = food.kcal_per_100g {
        parts.push(format!("kcal_per_100g={}", density));
    }
    if let Some(per_item) = food.kcal_per_item {
        parts.push(format!("kcal_per_item={}", per_item));
    }
    format!("  - {}", parts.join(", "))
}

fn rounded(value: f64) -> String {
    format!("{}", value.round() as i64)
}

fn encode_json<T: serde::Serialize>(value: &T) -> PortResult<String> {
    serde_json::to_string(value).map_err(|e| PortError::Unexpected(e.to_string()))
}
