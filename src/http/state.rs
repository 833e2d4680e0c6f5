use crate::chat::{SuggestionService, TextChatService, Transcript};
use crate::session::{LiveControl, LiveSessionController};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The live session controller (one session at a time)
    pub live: Arc<Mutex<LiveSessionController>>,

    /// Reads the state and calls off a pending start without the lock
    pub control: LiveControl,

    pub chat: Arc<TextChatService>,

    /// Text conversation shown alongside the live session
    pub transcript: Arc<RwLock<Transcript>>,

    pub suggestions: Arc<SuggestionService>,
}

impl AppState {
    pub fn new(
        live: Arc<Mutex<LiveSessionController>>,
        control: LiveControl,
        chat: TextChatService,
        suggestions: SuggestionService,
    ) -> Self {
        Self {
            live,
            control,
            chat: Arc::new(chat),
            transcript: Arc::new(RwLock::new(Transcript::new())),
            suggestions: Arc::new(suggestions),
        }
    }
}
