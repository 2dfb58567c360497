pub mod actions;
pub mod clarify;
pub mod domain;
pub mod matcher;
pub mod nutrition;
pub mod ports;

pub use actions::{ActionSummary, ActionSummaryKind, ChatAction, LlmReply, NEW_FOOD_PLACEHOLDER};
pub use domain::{
    ActivityLevel, ChatMessage, ChatRole, ChatSession, ChatTurn, Clarification, DailySummary,
    Food, FoodPatch, FoodSource, LogEntry, NewChatMessage, NewClarification, NewFood, NewLogEntry,
    NutritionFacts, ParsedUtterance, Pet, ProviderCredentials, SessionStatus, StoredApiKey,
    MAX_ALIASES,
};
pub use matcher::MatchVerdict;
pub use ports::{CompletionOptions, CompletionService, DatabaseService, PortError, PortResult};
