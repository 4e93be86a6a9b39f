//! Structured logging for the peer handshake
//!
//! Thin helpers over the `tracing` framework so that every handshake emits
//! the same fields for the same events, wherever they are logged from.
//!
//! # Log Levels
//!
//! - **TRACE**: per-message channel activity (in the channel module)
//! - **INFO**: handshake steps, state transitions, terminal outcome
//! - **WARN**: protocol violations and rejected parameters

use tracing::{info, warn};

/// Log a handshake state transition
pub fn log_state_transition(from: &str, to: &str) {
    info!(state_from = from, state_to = to, "handshake state transition");
}

/// Log an outgoing handshake message
pub fn log_message_sent(name: &str) {
    info!(message = name, "sent handshake message");
}

/// Log an incoming handshake message
pub fn log_message_received(name: &str) {
    info!(message = name, "received handshake message");
}

/// Log a message that arrived in a state that does not expect one
pub fn log_unexpected_message(state: &str) {
    warn!(state = state, "message in unexpected handshake state");
}

/// Log the terminal handshake outcome
pub fn log_handshake_finished(result: &str) {
    info!(result = result, "handshake finished");
}
