//! crates/pettrack_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP representation;
//! the serde derives that do appear exist because some of these types are
//! decoded straight from model output or admin-supplied JSON.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Upper bound on stored aliases per food. Auto-learning and chat-added
/// aliases stop appending once a food reaches this many.
pub const MAX_ALIASES: usize = 16;

//=========================================================================================
// Enumerations stored as text columns
//=========================================================================================

/// Activity band used for the maintenance-energy multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Low,
    Normal,
    Moderate,
    High,
    VeryHigh,
}

impl ActivityLevel {
    pub fn multiplier(&self) -> f64 {
        match self {
            ActivityLevel::Low => 1.2,
            ActivityLevel::Normal => 1.4,
            ActivityLevel::Moderate => 1.6,
            ActivityLevel::High => 1.8,
            ActivityLevel::VeryHigh => 2.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Low => "low",
            ActivityLevel::Normal => "normal",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::High => "high",
            ActivityLevel::VeryHigh => "very_high",
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(ActivityLevel::Low),
            "normal" => Ok(ActivityLevel::Normal),
            "moderate" => Ok(ActivityLevel::Moderate),
            "high" => Ok(ActivityLevel::High),
            "very_high" => Ok(ActivityLevel::VeryHigh),
            other => Err(format!("unknown activity level: {other}")),
        }
    }
}

// How a food row came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FoodSource {
    #[default]
    Manual,
    Auto,
    LlmLookup,
    Chat,
}

impl FoodSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FoodSource::Manual => "manual",
            FoodSource::Auto => "auto",
            FoodSource::LlmLookup => "llm_lookup",
            FoodSource::Chat => "chat",
        }
    }
}

impl FromStr for FoodSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(FoodSource::Manual),
            "auto" => Ok(FoodSource::Auto),
            "llm_lookup" => Ok(FoodSource::LlmLookup),
            "chat" => Ok(FoodSource::Chat),
            other => Err(format!("unknown food source: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(format!("unknown chat role: {other}")),
        }
    }
}

//=========================================================================================
// Core entities
//=========================================================================================

/// A pet whose feeding is tracked. The calorie budget is the owner's manual
/// override when present, otherwise the stored maintenance requirement.
#[derive(Debug, Clone)]
pub struct Pet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub breed: Option<String>,
    pub weight_kg: Option<f64>,
    pub birth_date: Option<NaiveDate>,
    pub neutered: bool,
    pub activity_level: ActivityLevel,
    pub target_kcal_override: Option<f64>,
    pub calculated_mer: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pet {
    pub fn budget_kcal(&self) -> f64 {
        self.target_kcal_override
            .or(self.calculated_mer)
            .unwrap_or(0.0)
    }
}

/// A food in the user's personal catalog. Nutrition fields are nullable
/// because foods are often registered before the packet is ever read;
/// `completeness_score` tracks how much of the profile is filled in.
#[derive(Debug, Clone)]
pub struct Food {
    pub id: Uuid,
    pub user_id: Uuid,
    pub canonical_name: String,
    pub brand: Option<String>,
    pub variant: Option<String>,
    pub aliases: Vec<String>,
    pub serving_unit: Option<String>,
    pub serving_weight_g: Option<f64>,
    pub kcal_per_100g: Option<f64>,
    pub kcal_per_item: Option<f64>,
    pub protein_pct: Option<f64>,
    pub fat_pct: Option<f64>,
    pub fibre_pct: Option<f64>,
    pub moisture_pct: Option<f64>,
    pub ash_pct: Option<f64>,
    pub source: FoodSource,
    pub completeness_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Food {
    pub fn has_alias(&self, candidate: &str) -> bool {
        self.aliases.iter().any(|a| a.eq_ignore_ascii_case(candidate))
    }
}

// One logged feeding event. weight_g and kcal stay null until they can be
// derived; a null kcal means "not yet known", never zero.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pet_id: Uuid,
    pub food_id: Option<Uuid>,
    pub raw_input: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub weight_g: Option<f64>,
    pub kcal: Option<f64>,
    pub meal_type: Option<String>,
    pub logged_at: DateTime<Utc>,
}

/// A pending question about a food profile, produced by the clarification
/// generator. `field` names the food column the answer will be written to.
#[derive(Debug, Clone)]
pub struct Clarification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub log_entry_id: Option<Uuid>,
    pub food_id: Option<Uuid>,
    pub field: String,
    pub question: String,
    pub priority: i32,
    pub resolved: bool,
    pub resolved_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

// A short-lived conversational session. Expiry is measured from created_at.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pet_id: Uuid,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// One transcript row. tool_calls/tool_results hold the serialized action
// list and execution summaries for assistant messages.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub tool_calls: Option<String>,
    pub tool_results: Option<String>,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Model-boundary shapes
//=========================================================================================

/// Structured breakdown of one natural-language feeding description, as
/// returned by the input parser.
#[derive(Debug, Clone, Deserialize)]
pub struct ParsedUtterance {
    #[serde(default)]
    pub brand_guess: Option<String>,
    #[serde(default)]
    pub variant_guess: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub weight_g: Option<f64>,
    #[serde(default)]
    pub meal_type: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

fn default_quantity() -> f64 {
    1.0
}

/// Guaranteed-analysis figures returned by the best-effort nutrition lookup.
/// Only adopted when the provider marks itself confident.
#[derive(Debug, Clone, Deserialize)]
pub struct NutritionFacts {
    #[serde(default)]
    pub kcal_per_100g: Option<f64>,
    #[serde(default)]
    pub protein_pct: Option<f64>,
    #[serde(default)]
    pub fat_pct: Option<f64>,
    #[serde(default)]
    pub fibre_pct: Option<f64>,
    #[serde(default)]
    pub moisture_pct: Option<f64>,
    #[serde(default)]
    pub confident: bool,
}

/// Partial update of a food profile. Absent fields are left unchanged;
/// `source` is only ever set internally and never decoded from model output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoodPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_weight_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kcal_per_100g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kcal_per_item: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fibre_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moisture_pct: Option<f64>,
    #[serde(skip)]
    pub source: Option<FoodSource>,
}

impl FoodPatch {
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty() && self.source.is_none()
    }

    /// Names of the profile fields this patch sets, in declaration order.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.canonical_name.is_some() {
            fields.push("canonical_name");
        }
        if self.brand.is_some() {
            fields.push("brand");
        }
        if self.variant.is_some() {
            fields.push("variant");
        }
        if self.serving_unit.is_some() {
            fields.push("serving_unit");
        }
        if self.serving_weight_g.is_some() {
            fields.push("serving_weight_g");
        }
        if self.kcal_per_100g.is_some() {
            fields.push("kcal_per_100g");
        }
        if self.kcal_per_item.is_some() {
            fields.push("kcal_per_item");
        }
        if self.protein_pct.is_some() {
            fields.push("protein_pct");
        }
        if self.fat_pct.is_some() {
            fields.push("fat_pct");
        }
        if self.fibre_pct.is_some() {
            fields.push("fibre_pct");
        }
        if self.moisture_pct.is_some() {
            fields.push("moisture_pct");
        }
        fields
    }

    // True when the patch touches a field that feeds the calorie math for
    // existing log entries.
    pub fn affects_entry_kcal(&self) -> bool {
        self.kcal_per_100g.is_some()
            || self.kcal_per_item.is_some()
            || self.serving_weight_g.is_some()
    }
}

//=========================================================================================
// Port input/output shapes
//=========================================================================================

/// Everything the day's feeding adds up to. Entries whose calories are not
/// yet known contribute nothing to the total; they are pending, not zero.
#[derive(Debug, Clone)]
pub struct DailySummary {
    pub total_kcal: f64,
    pub budget_kcal: f64,
    pub remaining_kcal: f64,
    pub entries_today: Vec<LogEntry>,
    pub percentage: f64,
}

// One message in a completion request; the system prompt travels separately.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        ChatTurn {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatTurn {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

// Admin-managed provider key as stored; model may be unset.
#[derive(Debug, Clone)]
pub struct StoredApiKey {
    pub key_value: String,
    pub model: Option<String>,
}

/// Fully resolved credentials for one completion call.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewFood {
    pub canonical_name: String,
    pub brand: Option<String>,
    pub variant: Option<String>,
    pub aliases: Vec<String>,
    pub serving_unit: Option<String>,
    pub serving_weight_g: Option<f64>,
    pub kcal_per_100g: Option<f64>,
    pub kcal_per_item: Option<f64>,
    pub protein_pct: Option<f64>,
    pub fat_pct: Option<f64>,
    pub fibre_pct: Option<f64>,
    pub moisture_pct: Option<f64>,
    pub source: FoodSource,
}

#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub pet_id: Uuid,
    pub food_id: Option<Uuid>,
    pub raw_input: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub weight_g: Option<f64>,
    pub kcal: Option<f64>,
    pub meal_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewClarification {
    pub log_entry_id: Option<Uuid>,
    pub food_id: Option<Uuid>,
    pub field: String,
    pub question: String,
    pub priority: i32,
}

#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub session_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub tool_calls: Option<String>,
    pub tool_results: Option<String>,
}
