//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::protocol::{
    ActionSummaryBody, ChatMessageBody, ChatRequest, ChatResponse, ClarificationBody,
    ClarifyRequest, ClarifyResponse, DailySummaryBody, HealthResponse, LogEntryBody, LogRequest,
    LogResponse,
};
use crate::web::state::AppState;
use crate::web::{chat_task, clarify_task, log_task};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{NaiveDate, Utc};
use pettrack_core::nutrition;
use pettrack_core::ports::PortError;
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        log_meal_handler,
        resolve_clarification_handler,
        chat_turn_handler,
        daily_summary_handler,
    ),
    components(
        schemas(
            LogRequest,
            ClarifyRequest,
            ChatRequest,
            LogResponse,
            ClarifyResponse,
            ChatResponse,
            LogEntryBody,
            ClarificationBody,
            DailySummaryBody,
            ActionSummaryBody,
            ChatMessageBody,
            HealthResponse,
        )
    ),
    tags(
        (name = "PetTrack API", description = "API endpoints for natural-language pet feeding logs.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness check.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
    })
}

/// Log one feeding from a natural-language description.
///
/// Parses the input, matches it against the caller's food catalog (creating a
/// stub food when nothing matches), persists the entry and returns it together
/// with any open clarification questions and the day's running totals.
#[utoipa::path(
    post,
    path = "/api/log",
    request_body = LogRequest,
    responses(
        (status = 200, description = "Feeding logged", body = LogResponse),
        (status = 404, description = "Pet not found"),
        (status = 502, description = "Completion provider failed"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn log_meal_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<LogRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match log_task::log_meal(app_state, user_id, payload.pet_id, &payload.raw_input).await {
        Ok(outcome) => {
            let response = LogResponse {
                entry: outcome.entry.into(),
                clarifications: outcome
                    .clarifications
                    .into_iter()
                    .map(ClarificationBody::from)
                    .collect(),
                daily_summary: outcome.daily_summary.into(),
            };
            Ok(Json(response))
        }
        Err(e) => Err(error_response("log a feeding", e)),
    }
}

/// Answer one pending clarification question.
///
/// Writes the answer through to the food profile and replays the entry math
/// where the new figure makes stuck entries computable.
#[utoipa::path(
    post,
    path = "/api/clarify",
    request_body = ClarifyRequest,
    responses(
        (status = 200, description = "Clarification resolved", body = ClarifyResponse),
        (status = 400, description = "Already resolved, or the value does not fit the field"),
        (status = 404, description = "Clarification not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn resolve_clarification_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<ClarifyRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let result = clarify_task::resolve_clarification(
        app_state.db.as_ref(),
        user_id,
        payload.clarification_id,
        &payload.value,
    )
    .await;

    match result {
        Ok(outcome) => {
            let response = ClarifyResponse {
                resolved: outcome.resolved,
                remaining: outcome
                    .remaining
                    .into_iter()
                    .map(ClarificationBody::from)
                    .collect(),
            };
            Ok(Json(response))
        }
        Err(e) => Err(error_response("resolve a clarification", e)),
    }
}

/// Run one conversational logging turn.
///
/// Continues the active session when `session_id` is given and still fresh;
/// otherwise a new session is opened. The reply carries the new message pair,
/// everything the turn logged and the day's running totals.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Turn executed", body = ChatResponse),
        (status = 400, description = "Missing message"),
        (status = 404, description = "Pet not found"),
        (status = 502, description = "Completion provider failed"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn chat_turn_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "pet_id and message are required".to_string(),
        ));
    }

    match chat_task::chat_turn(app_state, user_id, payload.pet_id, message, payload.session_id)
        .await
    {
        Ok(outcome) => {
            let actions: Vec<ActionSummaryBody> = outcome
                .action_summaries
                .into_iter()
                .map(ActionSummaryBody::from)
                .collect();
            let messages = vec![
                ChatMessageBody {
                    role: "user".to_string(),
                    content: outcome.user_message,
                    actions: None,
                },
                ChatMessageBody {
                    role: "assistant".to_string(),
                    content: outcome.assistant_message,
                    actions: if actions.is_empty() {
                        None
                    } else {
                        Some(actions)
                    },
                },
            ];
            let response = ChatResponse {
                session_id: outcome.session_id,
                messages,
                entries_logged: outcome
                    .entries_logged
                    .into_iter()
                    .map(LogEntryBody::from)
                    .collect(),
                daily_summary: outcome.daily_summary.into(),
                session_status: outcome.session_status.as_str().to_string(),
            };
            Ok(Json(response))
        }
        Err(e) => Err(error_response("run a chat turn", e)),
    }
}

/// Optional day to summarize; defaults to today (UTC).
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    pub date: Option<NaiveDate>,
}

/// The day's intake against the pet's calorie budget.
#[utoipa::path(
    get,
    path = "/api/summary/{pet_id}",
    params(
        ("pet_id" = Uuid, Path, description = "The pet to summarize."),
        SummaryQuery,
    ),
    responses(
        (status = 200, description = "Daily summary", body = DailySummaryBody),
        (status = 404, description = "Pet not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn daily_summary_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(pet_id): Path<Uuid>,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let result = async {
        let pet = app_state.db.get_pet(user_id, pet_id).await?;
        let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
        let entries = app_state.db.get_entries_for_day(user_id, pet_id, date).await?;
        Ok::<_, PortError>(nutrition::daily_summary(entries, pet.budget_kcal()))
    }
    .await;

    match result {
        Ok(summary) => Ok(Json(DailySummaryBody::from(summary))),
        Err(e) => Err(error_response("build the daily summary", e)),
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a port error onto the HTTP status it should surface as. The error
/// text goes to the client as-is; anything sensitive stays in the log line.
fn error_response(context: &str, e: PortError) -> (StatusCode, String) {
    error!("Failed to {}: {:?}", context, e);
    let status = match &e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Invalid(_) => StatusCode::BAD_REQUEST,
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::Provider(_) => StatusCode::BAD_GATEWAY,
        PortError::Configuration(_) | PortError::Unexpected(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}
