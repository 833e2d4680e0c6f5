//! Request/response assistant features around the live session:
//! text chat with an offline fallback, and structured suggestions.

pub mod genai;
pub mod knowledge;
pub mod service;
pub mod transcript;

pub use genai::{GenAiClient, Turn};
pub use knowledge::LocalKnowledgeBase;
pub use service::{CropSuggestion, Expense, GovScheme, SuggestionService, TextChatService};
pub use transcript::{ChatMessage, Role, Transcript};
