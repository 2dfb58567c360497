pub mod completions;
pub mod db;

pub use completions::OpenRouterCompletions;
pub use db::DbAdapter;
