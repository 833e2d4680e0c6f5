//! Live session management
//!
//! This module provides the `LiveSessionController` that manages:
//! - Microphone (and optional camera) acquisition
//! - Outbound audio blocks and periodic camera frames
//! - Gapless sequencing of the assistant's audio, with barge-in handling
//! - Deterministic teardown on stop, remote close or transport error

mod config;
mod control;
mod controller;
mod state;
mod stats;

pub use config::{LiveSessionConfig, DEFAULT_SYSTEM_INSTRUCTION};
pub use control::LiveControl;
pub use controller::{spawn_event_loop, LiveSessionController, SessionEvent};
pub use state::{SessionId, SessionState};
pub use stats::SessionStats;
