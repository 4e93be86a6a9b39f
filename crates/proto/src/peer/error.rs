//! Error types for peer authentication operations
//!
//! This module defines a unified error type for the handshake building
//! blocks: wire codec, crypto primitives and SRP math.

use std::fmt;

/// Result type for peer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Peer protocol errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid handshake message format
    InvalidMessage(String),

    /// Buffer too short for operation
    BufferTooShort {
        /// Required length
        required: usize,
        /// Available length
        available: usize,
    },

    /// Unsupported encryption suite identifier
    UnsupportedEncryption(u32),

    /// Invalid key length
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Invalid IV length
    InvalidIvLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// AEAD encryption failed
    EncryptFailed,

    /// AEAD decryption failed (tag mismatch or corrupted data)
    DecryptFailed,

    /// Cryptographic random number generator unavailable
    RngFailed,

    /// Key exchange failed
    KeyExchangeFailed(String),

    /// Invalid SRP group parameters or ephemeral values
    InvalidSrpParameters(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidMessage(msg) => write!(f, "Invalid handshake message: {}", msg),
            Error::BufferTooShort {
                required,
                available,
            } => {
                write!(
                    f,
                    "Buffer too short: need {} bytes, have {}",
                    required, available
                )
            }
            Error::UnsupportedEncryption(value) => {
                write!(f, "Unsupported encryption suite: {}", value)
            }
            Error::InvalidKeyLength { expected, actual } => {
                write!(f, "Invalid key length: expected {}, got {}", expected, actual)
            }
            Error::InvalidIvLength { expected, actual } => {
                write!(f, "Invalid IV length: expected {}, got {}", expected, actual)
            }
            Error::EncryptFailed => write!(f, "Encryption failed"),
            Error::DecryptFailed => write!(f, "Decryption failed"),
            Error::RngFailed => write!(f, "Random number generator unavailable"),
            Error::KeyExchangeFailed(msg) => write!(f, "Key exchange failed: {}", msg),
            Error::InvalidSrpParameters(msg) => write!(f, "Invalid SRP parameters: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidMessage("truncated field".to_string());
        assert_eq!(err.to_string(), "Invalid handshake message: truncated field");

        let err = Error::UnsupportedEncryption(42);
        assert_eq!(err.to_string(), "Unsupported encryption suite: 42");

        let err = Error::BufferTooShort {
            required: 12,
            available: 4,
        };
        assert!(err.to_string().contains("12"));
        assert!(err.to_string().contains("4"));
    }

    #[test]
    fn test_error_clone() {
        let err1 = Error::DecryptFailed;
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
