//! Shared fixtures for the integration suites: an in-memory store that holds
//! the same contracts as the Postgres adapter, and a completion stub fed from
//! a script of canned replies.
#![allow(dead_code)]

use api_lib::config::Config;
use api_lib::web::state::AppState;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use pettrack_core::domain::{
    ActivityLevel, ChatMessage, ChatSession, ChatTurn, Clarification, Food, FoodPatch, FoodSource,
    LogEntry, NewChatMessage, NewClarification, NewFood, NewLogEntry, Pet, SessionStatus,
    StoredApiKey,
};
use pettrack_core::ports::{
    CompletionOptions, CompletionService, DatabaseService, PortError, PortResult,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

//=========================================================================================
// In-Memory Database
//=========================================================================================

/// Vec-backed store mirroring the Postgres adapter's observable behavior:
/// ordering, not-found mapping, COALESCE patch semantics, and the
/// close-then-create session invariant.
pub struct MemoryStore {
    pub pets: Mutex<Vec<Pet>>,
    pub foods: Mutex<Vec<Food>>,
    pub entries: Mutex<Vec<LogEntry>>,
    pub clarifications: Mutex<Vec<Clarification>>,
    pub sessions: Mutex<Vec<ChatSession>>,
    pub messages: Mutex<Vec<ChatMessage>>,
    pub api_key: Mutex<Option<StoredApiKey>>,
    epoch: DateTime<Utc>,
    ticks: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            pets: Mutex::new(Vec::new()),
            foods: Mutex::new(Vec::new()),
            entries: Mutex::new(Vec::new()),
            clarifications: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            api_key: Mutex::new(None),
            epoch: Utc::now(),
            ticks: AtomicI64::new(0),
        }
    }

    /// Strictly increasing timestamps that also sort after anything a fixture
    /// stamped with `Utc::now()`, so "newest food" always means the newest
    /// store-created row.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.epoch + Duration::seconds(1) + Duration::milliseconds(tick)
    }

    pub fn add_pet(&self, pet: Pet) {
        self.pets.lock().unwrap().push(pet);
    }

    pub fn add_food(&self, food: Food) {
        self.foods.lock().unwrap().push(food);
    }

    pub fn food(&self, food_id: Uuid) -> Food {
        self.foods
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.id == food_id)
            .cloned()
            .unwrap()
    }

    pub fn entry(&self, entry_id: Uuid) -> LogEntry {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == entry_id)
            .cloned()
            .unwrap()
    }

    pub fn session(&self, session_id: Uuid) -> ChatSession {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .unwrap()
    }

    pub fn messages_for(&self, session_id: Uuid) -> Vec<ChatMessage> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Ages a session so the next turn sees it as expired.
    pub fn age_session(&self, session_id: Uuid, seconds: i64) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.iter_mut().find(|s| s.id == session_id) {
            session.created_at -= Duration::seconds(seconds);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseService for MemoryStore {
    // The suites drive the task functions directly with a user id; cookie
    // validation stays with the real adapter.
    async fn validate_auth_session(&self, _session_id: &str) -> PortResult<Uuid> {
        Err(PortError::Unauthorized)
    }

    async fn get_active_api_key(&self) -> PortResult<Option<StoredApiKey>> {
        Ok(self.api_key.lock().unwrap().clone())
    }

    async fn get_pet(&self, user_id: Uuid, pet_id: Uuid) -> PortResult<Pet> {
        self.pets
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == pet_id && p.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Pet {} not found", pet_id)))
    }

    async fn get_foods_for_user(&self, user_id: Uuid) -> PortResult<Vec<Food>> {
        let mut foods: Vec<Food> = self
            .foods
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        foods.sort_by_key(|f| f.created_at);
        Ok(foods)
    }

    async fn get_food_by_id(&self, user_id: Uuid, food_id: Uuid) -> PortResult<Food> {
        self.foods
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.id == food_id && f.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Food {} not found", food_id)))
    }

    async fn get_newest_food(&self, user_id: Uuid) -> PortResult<Option<Food>> {
        Ok(self
            .foods
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.user_id == user_id)
            .max_by_key(|f| f.created_at)
            .cloned())
    }

    async fn create_food(&self, user_id: Uuid, new_food: NewFood) -> PortResult<Food> {
        let now = self.next_timestamp();
        let food = Food {
            id: Uuid::new_v4(),
            user_id,
            canonical_name: new_food.canonical_name,
            brand: new_food.brand,
            variant: new_food.variant,
            aliases: new_food.aliases,
            serving_unit: new_food.serving_unit,
            serving_weight_g: new_food.serving_weight_g,
            kcal_per_100g: new_food.kcal_per_100g,
            kcal_per_item: new_food.kcal_per_item,
            protein_pct: new_food.protein_pct,
            fat_pct: new_food.fat_pct,
            fibre_pct: new_food.fibre_pct,
            moisture_pct: new_food.moisture_pct,
            ash_pct: None,
            source: new_food.source,
            completeness_score: 0.0,
            created_at: now,
            updated_at: now,
        };
        self.foods.lock().unwrap().push(food.clone());
        Ok(food)
    }

    async fn update_food(&self, food_id: Uuid, patch: &FoodPatch) -> PortResult<Food> {
        let mut foods = self.foods.lock().unwrap();
        let food = foods
            .iter_mut()
            .find(|f| f.id == food_id)
            .ok_or_else(|| PortError::NotFound(format!("Food {} not found", food_id)))?;

        if let Some(v) = &patch.canonical_name {
            food.canonical_name = v.clone();
        }
        if let Some(v) = &patch.brand {
            food.brand = Some(v.clone());
        }
        if let Some(v) = &patch.variant {
            food.variant = Some(v.clone());
        }
        if let Some(v) = &patch.serving_unit {
            food.serving_unit = Some(v.clone());
        }
        if let Some(v) = patch.serving_weight_g {
            food.serving_weight_g = Some(v);
        }
        if let Some(v) = patch.kcal_per_100g {
            food.kcal_per_100g = Some(v);
        }
        if let Some(v) = patch.kcal_per_item {
            food.kcal_per_item = Some(v);
        }
        if let Some(v) = patch.protein_pct {
            food.protein_pct = Some(v);
        }
        if let Some(v) = patch.fat_pct {
            food.fat_pct = Some(v);
        }
        if let Some(v) = patch.fibre_pct {
            food.fibre_pct = Some(v);
        }
        if let Some(v) = patch.moisture_pct {
            food.moisture_pct = Some(v);
        }
        if let Some(v) = patch.source {
            food.source = v;
        }
        food.updated_at = Utc::now();
        Ok(food.clone())
    }

    async fn set_food_aliases(&self, food_id: Uuid, aliases: &[String]) -> PortResult<()> {
        let mut foods = self.foods.lock().unwrap();
        if let Some(food) = foods.iter_mut().find(|f| f.id == food_id) {
            food.aliases = aliases.to_vec();
            food.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_food_completeness(&self, food_id: Uuid, score: f64) -> PortResult<()> {
        let mut foods = self.foods.lock().unwrap();
        if let Some(food) = foods.iter_mut().find(|f| f.id == food_id) {
            food.completeness_score = score;
            food.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn create_log_entry(&self, user_id: Uuid, entry: NewLogEntry) -> PortResult<LogEntry> {
        let row = LogEntry {
            id: Uuid::new_v4(),
            user_id,
            pet_id: entry.pet_id,
            food_id: entry.food_id,
            raw_input: entry.raw_input,
            quantity: entry.quantity,
            unit: entry.unit,
            weight_g: entry.weight_g,
            kcal: entry.kcal,
            meal_type: entry.meal_type,
            logged_at: self.next_timestamp(),
        };
        self.entries.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn get_entries_for_day(
        &self,
        user_id: Uuid,
        pet_id: Uuid,
        day: NaiveDate,
    ) -> PortResult<Vec<LogEntry>> {
        let mut entries: Vec<LogEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.user_id == user_id && e.pet_id == pet_id && e.logged_at.date_naive() == day
            })
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.logged_at);
        Ok(entries)
    }

    async fn get_entries_for_food(&self, food_id: Uuid) -> PortResult<Vec<LogEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.food_id == Some(food_id))
            .cloned()
            .collect())
    }

    async fn get_entries_missing_kcal(&self, food_id: Uuid) -> PortResult<Vec<LogEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.food_id == Some(food_id) && e.kcal.is_none())
            .cloned()
            .collect())
    }

    async fn update_entry_resolution(
        &self,
        entry_id: Uuid,
        weight_g: Option<f64>,
        kcal: Option<f64>,
    ) -> PortResult<()> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == entry_id) {
            // Same shape as the SQL: COALESCE for weight, kcal written as given.
            entry.weight_g = weight_g.or(entry.weight_g);
            entry.kcal = kcal;
        }
        Ok(())
    }

    async fn set_entry_kcal(&self, entry_id: Uuid, kcal: f64) -> PortResult<()> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == entry_id) {
            entry.kcal = Some(kcal);
        }
        Ok(())
    }

    async fn create_clarification(
        &self,
        user_id: Uuid,
        new: NewClarification,
    ) -> PortResult<Clarification> {
        let row = Clarification {
            id: Uuid::new_v4(),
            user_id,
            log_entry_id: new.log_entry_id,
            food_id: new.food_id,
            field: new.field,
            question: new.question,
            priority: new.priority,
            resolved: false,
            resolved_value: None,
            created_at: self.next_timestamp(),
        };
        self.clarifications.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn get_clarification_by_id(
        &self,
        user_id: Uuid,
        clarification_id: Uuid,
    ) -> PortResult<Clarification> {
        self.clarifications
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == clarification_id && c.user_id == user_id)
            .cloned()
            .ok_or_else(|| {
                PortError::NotFound(format!("Clarification {} not found", clarification_id))
            })
    }

    async fn mark_clarification_resolved(
        &self,
        clarification_id: Uuid,
        value: &str,
    ) -> PortResult<()> {
        let mut clarifications = self.clarifications.lock().unwrap();
        if let Some(c) = clarifications.iter_mut().find(|c| c.id == clarification_id) {
            c.resolved = true;
            c.resolved_value = Some(value.to_string());
        }
        Ok(())
    }

    async fn get_unresolved_clarifications(&self, user_id: Uuid) -> PortResult<Vec<Clarification>> {
        let mut open: Vec<Clarification> = self
            .clarifications
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == user_id && !c.resolved)
            .cloned()
            .collect();
        open.sort_by_key(|c| c.priority);
        Ok(open)
    }

    async fn get_active_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> PortResult<Option<ChatSession>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| {
                s.id == session_id && s.user_id == user_id && s.status == SessionStatus::Active
            })
            .cloned())
    }

    async fn open_session(&self, user_id: Uuid, pet_id: Uuid) -> PortResult<ChatSession> {
        let now = self.next_timestamp();
        let mut sessions = self.sessions.lock().unwrap();
        for session in sessions.iter_mut() {
            if session.user_id == user_id
                && session.pet_id == pet_id
                && session.status == SessionStatus::Active
            {
                session.status = SessionStatus::Completed;
                session.completed_at = Some(now);
            }
        }
        let session = ChatSession {
            id: Uuid::new_v4(),
            user_id,
            pet_id,
            status: SessionStatus::Active,
            created_at: now,
            completed_at: None,
        };
        sessions.push(session.clone());
        Ok(session)
    }

    async fn complete_session(&self, session_id: Uuid) -> PortResult<()> {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.iter_mut().find(|s| s.id == session_id) {
            session.status = SessionStatus::Completed;
            session.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn get_messages_for_session(&self, session_id: Uuid) -> PortResult<Vec<ChatMessage>> {
        let mut messages: Vec<ChatMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn append_message(&self, message: NewChatMessage) -> PortResult<ChatMessage> {
        let row = ChatMessage {
            id: Uuid::new_v4(),
            session_id: message.session_id,
            role: message.role,
            content: message.content,
            tool_calls: message.tool_calls,
            tool_results: message.tool_results,
            created_at: self.next_timestamp(),
        };
        self.messages.lock().unwrap().push(row.clone());
        Ok(row)
    }
}

//=========================================================================================
// Scripted Completion Provider
//=========================================================================================

/// One recorded `complete()` call, for asserting on prompts and retries.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub history: Vec<ChatTurn>,
    pub options: CompletionOptions,
}

/// Completion stub that pops replies from a script, in order, and records
/// every call it sees.
pub struct ScriptedCompletions {
    replies: Mutex<VecDeque<PortResult<String>>>,
    pub calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedCompletions {
    pub fn new() -> Self {
        ScriptedCompletions {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, reply: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(reply.to_string()));
    }

    pub fn push_error(&self, error: PortError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for ScriptedCompletions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletions {
    async fn complete(
        &self,
        _api_key: &str,
        system_prompt: &str,
        history: &[ChatTurn],
        options: &CompletionOptions,
    ) -> PortResult<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
            options: options.clone(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PortError::Provider("No scripted reply left".to_string())))
    }
}

//=========================================================================================
// Fixtures
//=========================================================================================

pub fn test_state(
    db: Arc<MemoryStore>,
    completions: Arc<ScriptedCompletions>,
) -> Arc<AppState> {
    state_with_env_key(db, completions, Some("env-test-key".to_string()))
}

/// Like [`test_state`] but with no key anywhere, for exercising the
/// configuration failure path.
pub fn test_state_without_key(
    db: Arc<MemoryStore>,
    completions: Arc<ScriptedCompletions>,
) -> Arc<AppState> {
    state_with_env_key(db, completions, None)
}

fn state_with_env_key(
    db: Arc<MemoryStore>,
    completions: Arc<ScriptedCompletions>,
    openrouter_api_key: Option<String>,
) -> Arc<AppState> {
    let config = Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::DEBUG,
        openrouter_api_key,
        openrouter_base_url: "http://localhost:0/api/v1".to_string(),
        default_model: "test-model".to_string(),
    };
    Arc::new(AppState {
        db,
        completions,
        config: Arc::new(config),
    })
}

/// A pet with a fixed 1000 kcal daily budget.
pub fn sample_pet(user_id: Uuid) -> Pet {
    let now = Utc::now();
    Pet {
        id: Uuid::new_v4(),
        user_id,
        name: "Nora".to_string(),
        breed: Some("Beagle".to_string()),
        weight_kg: Some(12.0),
        birth_date: None,
        neutered: true,
        activity_level: ActivityLevel::Normal,
        target_kcal_override: Some(1000.0),
        calculated_mer: None,
        created_at: now,
        updated_at: now,
    }
}

/// A fully profiled kibble: 50 g scoops at 380 kcal per 100 g.
pub fn acana(user_id: Uuid) -> Food {
    let now = Utc::now();
    Food {
        id: Uuid::new_v4(),
        user_id,
        canonical_name: "Acana Adult".to_string(),
        brand: Some("Acana".to_string()),
        variant: Some("Adult".to_string()),
        aliases: Vec::new(),
        serving_unit: Some("scoop".to_string()),
        serving_weight_g: Some(50.0),
        kcal_per_100g: Some(380.0),
        kcal_per_item: None,
        protein_pct: Some(29.0),
        fat_pct: Some(17.0),
        fibre_pct: None,
        moisture_pct: None,
        ash_pct: None,
        source: FoodSource::Manual,
        completeness_score: 0.0,
        created_at: now,
        updated_at: now,
    }
}

/// A treat sold by the piece, calories known only per item.
pub fn dentastix(user_id: Uuid) -> Food {
    let now = Utc::now();
    Food {
        id: Uuid::new_v4(),
        user_id,
        canonical_name: "Pedigree Dentastix".to_string(),
        brand: Some("Pedigree".to_string()),
        variant: None,
        aliases: vec!["dentastix".to_string()],
        serving_unit: Some("item".to_string()),
        serving_weight_g: None,
        kcal_per_100g: None,
        kcal_per_item: Some(77.0),
        protein_pct: None,
        fat_pct: None,
        fibre_pct: None,
        moisture_pct: None,
        ash_pct: None,
        source: FoodSource::Manual,
        completeness_score: 0.0,
        created_at: now,
        updated_at: now,
    }
}

/// The parser's wire reply for "2 scoops of acana".
pub fn parsed_two_scoops_json() -> &'static str {
    r#"{"brand_guess":"Acana","variant_guess":"Adult","quantity":2,"unit":"scoop","weight_g":null,"meal_type":null,"confidence":0.95}"#
}
