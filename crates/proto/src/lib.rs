//! Protocol implementations for the Strix remote access ecosystem.
//!
//! This crate provides the peer-to-peer infrastructure of the Strix suite:
//!
//! - **Peer** - client-side authenticated key exchange that upgrades a
//!   message channel to an AEAD-encrypted session
//! - **Relay** - bidirectional byte shuttle splicing two authenticated
//!   connections
//!
//! # Features
//!
//! - `peer` (default) - peer authentication support
//! - `relay` (default) - relay session support
//!
//! # Example
//!
//! ```rust,no_run
//! use strix_proto::peer::{ClientAuthenticator, Identify, MessageChannel};
//! use strix_proto::peer::messages::SESSION_TYPE_DESKTOP_MANAGE;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = tokio::net::TcpStream::connect("peer.example.com:8050").await?;
//! let channel = MessageChannel::new(stream);
//!
//! let mut authenticator = ClientAuthenticator::new();
//! authenticator.set_identify(Identify::Srp);
//! authenticator.set_username("alice");
//! authenticator.set_password("correct horse battery staple");
//! authenticator.set_session_type(SESSION_TYPE_DESKTOP_MANAGE);
//!
//! let result = authenticator.authenticate(channel).await;
//! println!("handshake finished: {}", result);
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! - All cryptographic operations use vetted libraries (`ring`, RustCrypto)
//! - Secure memory handling with `zeroize`
//! - No unsafe code

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

#[cfg(feature = "peer")]
pub mod peer;

#[cfg(feature = "relay")]
pub mod relay;
