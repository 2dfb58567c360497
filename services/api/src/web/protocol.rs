//! services/api/src/web/protocol.rs
//!
//! Defines the REST request and response payloads exchanged with clients,
//! along with their conversions from the domain types.

use chrono::{DateTime, Utc};
use pettrack_core::actions::{ActionSummary, ActionSummaryKind};
use pettrack_core::domain::{Clarification, DailySummary, LogEntry};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Request Payloads
//=========================================================================================

/// One natural-language feeding description to run through the logging pipeline.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LogRequest {
    pub raw_input: String,
    pub pet_id: Uuid,
}

/// The user's answer to one pending clarification question.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ClarifyRequest {
    pub clarification_id: Uuid,
    pub value: String,
}

/// One conversational turn. `session_id` is absent on the first turn.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub pet_id: Uuid,
    pub message: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

//=========================================================================================
// Response Payloads
//=========================================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct LogEntryBody {
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

impl From<LogEntry> for LogEntryBody {
    fn from(entry: LogEntry) -> Self {
        LogEntryBody {
            id: entry.id,
            user_id: entry.user_id,
            pet_id: entry.pet_id,
            food_id: entry.food_id,
            raw_input: entry.raw_input,
            quantity: entry.quantity,
            unit: entry.unit,
            weight_g: entry.weight_g,
            kcal: entry.kcal,
            meal_type: entry.meal_type,
            logged_at: entry.logged_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClarificationBody {
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

impl From<Clarification> for ClarificationBody {
    fn from(clarification: Clarification) -> Self {
        ClarificationBody {
            id: clarification.id,
            user_id: clarification.user_id,
            log_entry_id: clarification.log_entry_id,
            food_id: clarification.food_id,
            field: clarification.field,
            question: clarification.question,
            priority: clarification.priority,
            resolved: clarification.resolved,
            resolved_value: clarification.resolved_value,
            created_at: clarification.created_at,
        }
    }
}

/// The day's running totals against the pet's calorie budget.
#[derive(Debug, Serialize, ToSchema)]
pub struct DailySummaryBody {
    pub total_kcal: f64,
    pub budget_kcal: f64,
    pub remaining_kcal: f64,
    pub entries_today: Vec<LogEntryBody>,
    pub percentage: f64,
}

impl From<DailySummary> for DailySummaryBody {
    fn from(summary: DailySummary) -> Self {
        DailySummaryBody {
            total_kcal: summary.total_kcal,
            budget_kcal: summary.budget_kcal,
            remaining_kcal: summary.remaining_kcal,
            entries_today: summary
                .entries_today
                .into_iter()
                .map(LogEntryBody::from)
                .collect(),
            percentage: summary.percentage,
        }
    }
}

/// The response payload for a logged feeding event.
#[derive(Debug, Serialize, ToSchema)]
pub struct LogResponse {
    pub entry: LogEntryBody,
    pub clarifications: Vec<ClarificationBody>,
    pub daily_summary: DailySummaryBody,
}

/// The response payload after resolving a clarification.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClarifyResponse {
    pub resolved: bool,
    pub remaining: Vec<ClarificationBody>,
}

/// What one executed chat action amounted to.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionSummaryBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kcal: Option<f64>,
}

impl From<ActionSummary> for ActionSummaryBody {
    fn from(summary: ActionSummary) -> Self {
        let kind = match summary.kind {
            ActionSummaryKind::Logged => "logged",
            ActionSummaryKind::CreatedFood => "created_food",
            ActionSummaryKind::UpdatedFood => "updated_food",
            ActionSummaryKind::AddedAlias => "added_alias",
        };
        ActionSummaryBody {
            kind: kind.to_string(),
            description: summary.description,
            kcal: summary.kcal,
        }
    }
}

/// One message of the turn being returned: the user's input and the
/// assistant's reply with whatever its actions amounted to.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatMessageBody {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<ActionSummaryBody>>,
}

/// The response payload for one conversational turn.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub messages: Vec<ChatMessageBody>,
    pub entries_logged: Vec<LogEntryBody>,
    pub daily_summary: DailySummaryBody,
    pub session_status: String,
}

/// The response payload for the health check.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}
