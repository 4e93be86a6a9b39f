//! Peer authentication protocol.
//!
//! This module implements the client side of the handshake that two Strix
//! peers run before any session traffic flows. The handshake authenticates
//! the peers and negotiates the AEAD cipher protecting everything that
//! follows.
//!
//! # Architecture
//!
//! The implementation is layered:
//!
//! 1. **Message Channel** ([`channel`]) - length-delimited framing with
//!    pluggable encryption
//! 2. **Wire Messages** ([`messages`]) - handshake payload codec
//! 3. **Crypto Primitives** ([`crypto`]) - AEAD, BLAKE2s-256, X25519, RNG
//! 4. **SRP Math** ([`srp`]) - SRP-6a client computations
//! 5. **Authenticator** ([`authenticator`]) - the state machine tying it
//!    all together
//!
//! # Handshake overview
//!
//! The client advertises its encryption suites and identify mode in
//! ClientHello. With a configured peer public key, an X25519 agreement
//! already yields a session key at this point and the rest of the handshake
//! runs encrypted. In SRP mode the client then proves knowledge of the
//! password without ever sending it, rotating the channel to the
//! SRP-derived key. The handshake ends with the session-type negotiation.
//!
//! # Security Considerations
//!
//! - **Group whitelist**: only the RFC 5054 4096/6144/8192-bit SRP groups
//!   are accepted
//! - **Key hygiene**: passwords, session keys and shared secrets are
//!   zeroized on drop
//! - **IV discipline**: every key rebind pairs the key with fresh IVs and a
//!   fresh AEAD nonce sequence
//! - **No unsafe code**
//!
//! # Example
//!
//! ```rust,no_run
//! use strix_proto::peer::{ClientAuthenticator, ErrorCode, Identify, MessageChannel};
//! use strix_proto::peer::messages::SESSION_TYPE_DESKTOP_VIEW;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = tokio::net::TcpStream::connect("peer.example.com:8050").await?;
//!
//! let mut authenticator = ClientAuthenticator::new();
//! authenticator.set_identify(Identify::Anonymous);
//! authenticator.set_peer_public_key(&[0x42; 32]);
//! authenticator.set_session_type(SESSION_TYPE_DESKTOP_VIEW);
//!
//! match authenticator.authenticate(MessageChannel::new(stream)).await {
//!     ErrorCode::Success => {
//!         let channel = authenticator.take_channel().unwrap();
//!         // session traffic over `channel`
//!     }
//!     code => eprintln!("handshake failed: {}", code),
//! }
//! # Ok(())
//! # }
//! ```

pub mod authenticator;
pub mod channel;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod messages;
pub mod srp;

// Re-export main types
pub use authenticator::{ClientAuthenticator, ErrorCode, State};
pub use channel::{MessageChannel, MAX_MESSAGE_SIZE};
pub use crypto::{EncryptionSuite, MessageDecryptor, MessageEncryptor};
pub use error::{Error, Result};
pub use messages::{Identify, Version};
