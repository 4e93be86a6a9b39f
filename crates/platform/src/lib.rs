//! # Strix Platform
//!
//! Core platform types for the Strix remote access ecosystem.
//!
//! This crate provides the unified error type (`StrixError`, `StrixResult`)
//! that the protocol crates report their transport-level failures through.
//!
//! # Examples
//!
//! ```
//! use strix_platform::{StrixError, StrixResult};
//!
//! fn check_frame(size: usize) -> StrixResult<()> {
//!     const MAX: usize = 8 * 1024 * 1024;
//!     if size == 0 || size > MAX {
//!         return Err(StrixError::FrameSize { size, max: MAX });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_frame(512).is_ok());
//! assert!(check_frame(0).is_err());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod error;

pub use error::{StrixError, StrixResult};

/// Platform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
