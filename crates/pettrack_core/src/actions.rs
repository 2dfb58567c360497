//! crates/pettrack_core/src/actions.rs
//!
//! The closed set of actions the conversational model may request, plus the
//! reply envelope it must answer with and the summaries reported back after
//! execution. Unknown action kinds decode to `Unknown` and execute as no-ops
//! instead of failing the turn.

use serde::{Deserialize, Serialize};

use crate::domain::FoodPatch;

/// Placeholder food id the model uses to reference a food created earlier in
/// the same turn; resolved to the user's newest food at execution time.
pub const NEW_FOOD_PLACEHOLDER: &str = "NEW";

/// One requested action. `food_id` fields stay strings because the model may
/// send the `"NEW"` placeholder or garbage; resolution happens at execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChatAction {
    LogFood {
        food_id: String,
        #[serde(default = "default_quantity")]
        quantity: f64,
        unit: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meal_type: Option<String>,
    },
    CreateFood {
        canonical_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        brand: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variant: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        aliases: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        serving_unit: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        serving_weight_g: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kcal_per_100g: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kcal_per_item: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        protein_pct: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fat_pct: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fibre_pct: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        moisture_pct: Option<f64>,
    },
    UpdateFood {
        food_id: String,
        #[serde(default)]
        fields: FoodPatch,
    },
    AddAlias {
        food_id: String,
        alias: String,
    },
    AskUser,
    #[serde(other)]
    Unknown,
}

fn default_quantity() -> f64 {
    1.0
}

/// The strict JSON envelope the conversational model must return.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmReply {
    pub message: String,
    #[serde(default)]
    pub actions: Vec<ChatAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSummaryKind {
    Logged,
    CreatedFood,
    UpdatedFood,
    AddedAlias,
}

/// What one executed action amounted to, as shown to the user and stored in
/// the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSummary {
    #[serde(rename = "type")]
    pub kind: ActionSummaryKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kcal: Option<f64>,
}
