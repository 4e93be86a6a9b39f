//! Relay session.
//!
//! When two peers cannot reach each other directly, a relay splices their
//! connections together and shuttles bytes both ways. This module implements
//! that shuttle: it owns the two connections for the lifetime of the
//! session, attributes transferred bytes and duration, and tears both sides
//! down as soon as either fails.
//!
//! Authentication of the two connections happens before they are handed to
//! the session; the relay itself never inspects the bytes it forwards.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strix_proto::relay::{Session, SessionDelegate};
//!
//! struct Logger;
//!
//! impl SessionDelegate for Logger {
//!     fn on_session_finished(&self) {
//!         println!("session finished");
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8070").await?;
//! let (first, _) = listener.accept().await?;
//! let (second, _) = listener.accept().await?;
//!
//! let mut session = Session::new((first, second));
//! session.start(Arc::new(Logger));
//! # Ok(())
//! # }
//! ```

pub mod session;

pub use session::{Session, SessionDelegate, READ_BUFFER_SIZE};
