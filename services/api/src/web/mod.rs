pub mod chat_task;
pub mod clarify_task;
pub mod log_task;
pub mod middleware;
pub mod parse;
pub mod protocol;
pub mod rest;
pub mod state;

// Re-export the handlers the binary wires into the router.
pub use middleware::require_auth;
pub use rest::{
    chat_turn_handler, daily_summary_handler, health_handler, log_meal_handler,
    resolve_clarification_handler, ApiDoc,
};
