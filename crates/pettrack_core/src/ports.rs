//! crates/pettrack_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{
    ChatMessage, ChatSession, ChatTurn, Clarification, Food, FoodPatch, LogEntry,
    NewChatMessage, NewClarification, NewFood, NewLogEntry, Pet, StoredApiKey,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network),
/// while keeping the failure classes distinguishable at the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    Invalid(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Completion provider error: {0}")]
    Provider(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Relational store behind the pipelines. Every operation that reads or
/// writes user data takes the owning user id explicitly.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth ---
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    // --- Provider credentials ---
    async fn get_active_api_key(&self) -> PortResult<Option<StoredApiKey>>;

    // --- Pets ---
    async fn get_pet(&self, user_id: Uuid, pet_id: Uuid) -> PortResult<Pet>;

    // --- Foods ---
    async fn get_foods_for_user(&self, user_id: Uuid) -> PortResult<Vec<Food>>;

    async fn get_food_by_id(&self, user_id: Uuid, food_id: Uuid) -> PortResult<Food>;

    /// Most recently created food for the user, if any.
    async fn get_newest_food(&self, user_id: Uuid) -> PortResult<Option<Food>>;

    async fn create_food(&self, user_id: Uuid, new_food: NewFood) -> PortResult<Food>;

    /// Applies the set fields of the patch, bumps `updated_at`, and returns
    /// the updated row. Unset fields are left as they were.
    async fn update_food(&self, food_id: Uuid, patch: &FoodPatch) -> PortResult<Food>;

    async fn set_food_aliases(&self, food_id: Uuid, aliases: &[String]) -> PortResult<()>;

    async fn set_food_completeness(&self, food_id: Uuid, score: f64) -> PortResult<()>;

    // --- Log entries ---
    async fn create_log_entry(&self, user_id: Uuid, entry: NewLogEntry) -> PortResult<LogEntry>;

    /// Entries for one pet on one UTC calendar day, oldest first.
    async fn get_entries_for_day(
        &self,
        user_id: Uuid,
        pet_id: Uuid,
        day: NaiveDate,
    ) -> PortResult<Vec<LogEntry>>;

    async fn get_entries_for_food(&self, food_id: Uuid) -> PortResult<Vec<LogEntry>>;

    async fn get_entries_missing_kcal(&self, food_id: Uuid) -> PortResult<Vec<LogEntry>>;

    /// Backfills derived figures: an absent weight leaves the stored value
    /// in place, the calorie value is written as given.
    async fn update_entry_resolution(
        &self,
        entry_id: Uuid,
        weight_g: Option<f64>,
        kcal: Option<f64>,
    ) -> PortResult<()>;

    async fn set_entry_kcal(&self, entry_id: Uuid, kcal: f64) -> PortResult<()>;

    // --- Clarifications ---
    async fn create_clarification(
        &self,
        user_id: Uuid,
        new: NewClarification,
    ) -> PortResult<Clarification>;

    async fn get_clarification_by_id(
        &self,
        user_id: Uuid,
        clarification_id: Uuid,
    ) -> PortResult<Clarification>;

    async fn mark_clarification_resolved(
        &self,
        clarification_id: Uuid,
        value: &str,
    ) -> PortResult<()>;

    /// All unresolved clarifications for the user, lowest priority value first.
    async fn get_unresolved_clarifications(&self, user_id: Uuid) -> PortResult<Vec<Clarification>>;

    // --- Chat sessions ---
    async fn get_active_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> PortResult<Option<ChatSession>>;

    /// Closes every other active session for the (user, pet) pair and creates
    /// a fresh active one, atomically.
    async fn open_session(&self, user_id: Uuid, pet_id: Uuid) -> PortResult<ChatSession>;

    async fn complete_session(&self, session_id: Uuid) -> PortResult<()>;

    /// Transcript of a session, oldest message first.
    async fn get_messages_for_session(&self, session_id: Uuid) -> PortResult<Vec<ChatMessage>>;

    async fn append_message(&self, message: NewChatMessage) -> PortResult<ChatMessage>;
}

/// Text-completion provider. Credentials travel with the call because the
/// active key is admin-managed data that can change between requests.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        api_key: &str,
        system_prompt: &str,
        history: &[ChatTurn],
        options: &CompletionOptions,
    ) -> PortResult<String>;
}

/// Per-call completion parameters.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionOptions {
    /// Provider defaults: conservative temperature, short replies.
    pub fn new(model: impl Into<String>) -> Self {
        CompletionOptions {
            model: model.into(),
            temperature: 0.1,
            max_tokens: 500,
        }
    }
}
