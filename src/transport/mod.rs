pub mod client;
pub mod messages;

pub use client::{GeminiLiveConnector, LiveSetup, OutboundFrame, TransportConnector, TransportHandle};
pub use messages::{ClientMessage, MediaChunk, ServerMessage, TransportEvent};
