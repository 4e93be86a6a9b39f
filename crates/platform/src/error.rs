//! Error types for Strix
//!
//! The protocol crates funnel their transport-level failures through
//! [`StrixError`]. Handshake- and session-level outcomes have their own
//! types next to the code that produces them; this type covers what a
//! message channel can report: transport I/O, framing limits and message
//! protection.

use std::fmt;

/// Result type for Strix operations
pub type StrixResult<T> = Result<T, StrixError>;

/// Unified error type for the Strix protocol crates
#[derive(Debug)]
pub enum StrixError {
    /// Transport failure or disconnect
    Io(std::io::Error),

    /// A wire frame fell outside the channel's size limits
    FrameSize {
        /// Size found on the wire
        size: usize,
        /// Largest size the channel accepts
        max: usize,
    },

    /// The channel is paused and refuses to read
    ChannelPaused,

    /// Message protection failed (AEAD seal or open)
    Crypto(String),
}

impl fmt::Display for StrixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrixError::Io(e) => write!(f, "transport error: {}", e),
            StrixError::FrameSize { size, max } => {
                write!(f, "frame size {} outside the allowed range (max {})", size, max)
            }
            StrixError::ChannelPaused => write!(f, "channel is paused"),
            StrixError::Crypto(msg) => write!(f, "message protection failed: {}", msg),
        }
    }
}

impl std::error::Error for StrixError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StrixError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StrixError {
    fn from(err: std::io::Error) -> Self {
        StrixError::Io(err)
    }
}
