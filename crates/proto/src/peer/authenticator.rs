//! Client-side peer authenticator.
//!
//! Drives the multi-step handshake that upgrades a connected message channel
//! to an authenticated, AEAD-encrypted session. The handshake combines an
//! optional X25519 key-agreement preamble (when the peer's public key is
//! known in advance) with an SRP-6a password-authenticated key exchange, and
//! finishes by negotiating the session type.
//!
//! # Handshake States
//!
//! ```text
//! SendClientHello
//!   ↓ (ClientHello written)
//! ReadServerHello
//!   ├─ anonymous ──────────────────────────────┐
//!   ↓ (SRP)                                    │
//! SendIdentify                                 │
//!   ↓ (Identify written)                       │
//! ReadServerKeyExchange                        │
//!   ↓ (group validated, key derived)           │
//! SendClientKeyExchange                        │
//!   ↓ (written; AEAD rebound to new key)       │
//! ReadSessionChallenge  ◄──────────────────────┘
//!   ↓ (session type accepted)
//! SendSessionResponse
//!   ↓ (written)
//! Finished
//! ```
//!
//! Each state is visited at most once; a message arriving in any state not
//! expecting one is a fatal protocol error.
//!
//! # Example
//!
//! ```rust,no_run
//! use strix_proto::peer::{ClientAuthenticator, ErrorCode, Identify, MessageChannel};
//! use strix_proto::peer::messages::SESSION_TYPE_DESKTOP_MANAGE;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = tokio::net::TcpStream::connect("peer.example.com:8050").await?;
//!
//! let mut authenticator = ClientAuthenticator::new();
//! authenticator.set_identify(Identify::Srp);
//! authenticator.set_username("alice");
//! authenticator.set_password("correct horse battery staple");
//! authenticator.set_session_type(SESSION_TYPE_DESKTOP_MANAGE);
//!
//! if authenticator.authenticate(MessageChannel::new(stream)).await == ErrorCode::Success {
//!     println!("peer version {}", authenticator.peer_version());
//!     let encrypted_channel = authenticator.take_channel().unwrap();
//!     // use the channel for session traffic
//! }
//! # Ok(())
//! # }
//! ```

use crate::peer::channel::MessageChannel;
use crate::peer::crypto::{
    self, EncryptionSuite, KeyPair, MessageDecryptor, MessageEncryptor, IV_SIZE,
};
use crate::peer::error::Error;
use crate::peer::logging;
use crate::peer::messages::{
    ClientHello, Identify, ServerHello, SessionChallenge, SessionResponse, SrpClientKeyExchange,
    SrpIdentify, SrpServerKeyExchange, Version,
};
use crate::peer::srp;
use num_bigint::BigUint;
use std::fmt;
use strix_platform::StrixError;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};
use zeroize::Zeroizing;

/// SRP private ephemeral size in bytes (1024 bits).
const SRP_PRIVATE_KEY_SIZE: usize = 128;

/// Handshake state.
///
/// States advance monotonically along the diagram in the module docs; no
/// state is ever re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// ClientHello is being written.
    SendClientHello,
    /// Waiting for ServerHello.
    ReadServerHello,
    /// Identify is being written (SRP mode only).
    SendIdentify,
    /// Waiting for the SRP server key exchange.
    ReadServerKeyExchange,
    /// Client key exchange is being written.
    SendClientKeyExchange,
    /// Waiting for the session challenge.
    ReadSessionChallenge,
    /// Session response is being written.
    SendSessionResponse,
    /// Terminal state; the result has been reported.
    Finished,
}

impl State {
    /// Check if `next` is a valid successor of this state.
    pub fn can_transition_to(self, next: State) -> bool {
        use State::*;

        matches!(
            (self, next),
            (SendClientHello, ReadServerHello)
                | (ReadServerHello, SendIdentify)
                | (ReadServerHello, ReadSessionChallenge)
                | (SendIdentify, ReadServerKeyExchange)
                | (ReadServerKeyExchange, SendClientKeyExchange)
                | (SendClientKeyExchange, ReadSessionChallenge)
                | (ReadSessionChallenge, SendSessionResponse)
                | (SendSessionResponse, Finished)
        )
    }

    /// Returns the state name.
    pub fn name(self) -> &'static str {
        match self {
            State::SendClientHello => "SendClientHello",
            State::ReadServerHello => "ReadServerHello",
            State::SendIdentify => "SendIdentify",
            State::ReadServerKeyExchange => "ReadServerKeyExchange",
            State::SendClientKeyExchange => "SendClientKeyExchange",
            State::ReadSessionChallenge => "ReadSessionChallenge",
            State::SendSessionResponse => "SendSessionResponse",
            State::Finished => "Finished",
        }
    }
}

/// Terminal handshake result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Handshake completed; the channel is encrypted and ready.
    Success,
    /// The transport failed or disconnected mid-handshake.
    NetworkError,
    /// The peer violated the protocol (bad message, bad parameters).
    ProtocolError,
    /// The transport reported an access-denied disconnect.
    AccessDenied,
    /// The server does not offer the requested session type.
    SessionDenied,
    /// Local failure: misconfiguration or a crypto primitive gave out.
    UnknownError,
}

impl ErrorCode {
    /// Returns the stable string name of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Success => "SUCCESS",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::ProtocolError => "PROTOCOL_ERROR",
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::SessionDenied => "SESSION_DENIED",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Maps a channel failure to the terminal code reported to the caller.
fn classify_channel_error(error: &StrixError) -> ErrorCode {
    match error {
        StrixError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            ErrorCode::AccessDenied
        }
        StrixError::Io(_) => ErrorCode::NetworkError,
        _ => ErrorCode::ProtocolError,
    }
}

/// Client-side handshake driver.
///
/// Configure with the setters, then call [`authenticate`](Self::authenticate)
/// once. The authenticator owns the channel for the duration of the
/// handshake; reclaim it with [`take_channel`](Self::take_channel) after a
/// successful run.
pub struct ClientAuthenticator<T> {
    identify: Identify,
    peer_public_key: Vec<u8>,
    username: String,
    password: Zeroizing<String>,
    session_type: u32,

    state: State,
    encryption: Option<EncryptionSuite>,
    session_key: Zeroizing<Vec<u8>>,
    encrypt_iv: Vec<u8>,
    decrypt_iv: Vec<u8>,
    srp_a_pub: Option<BigUint>,
    peer_version: Version,

    channel: Option<MessageChannel<T>>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> ClientAuthenticator<T> {
    /// Creates an authenticator with SRP identification and no session type.
    pub fn new() -> Self {
        Self {
            identify: Identify::Srp,
            peer_public_key: Vec::new(),
            username: String::new(),
            password: Zeroizing::new(String::new()),
            session_type: 0,
            state: State::SendClientHello,
            encryption: None,
            session_key: Zeroizing::new(Vec::new()),
            encrypt_iv: Vec::new(),
            decrypt_iv: Vec::new(),
            srp_a_pub: None,
            peer_version: Version::default(),
            channel: None,
        }
    }

    /// Sets the peer's long-term X25519 public key.
    ///
    /// Mandatory in anonymous mode; in SRP mode it adds a key-agreement
    /// preamble that encrypts the rest of the handshake.
    pub fn set_peer_public_key(&mut self, public_key: &[u8]) {
        self.peer_public_key = public_key.to_vec();
    }

    /// Sets the identify mode.
    pub fn set_identify(&mut self, identify: Identify) {
        self.identify = identify;
    }

    /// Sets the username for SRP identification.
    pub fn set_username(&mut self, username: &str) {
        self.username = username.to_string();
    }

    /// Returns the configured username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Sets the password for SRP identification. Never sent on the wire;
    /// zeroized when the authenticator is dropped.
    pub fn set_password(&mut self, password: &str) {
        self.password = Zeroizing::new(password.to_string());
    }

    /// Returns the configured password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Sets the requested session type.
    pub fn set_session_type(&mut self, session_type: u32) {
        self.session_type = session_type;
    }

    /// Returns the current handshake state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns the peer version reported in the session challenge.
    pub fn peer_version(&self) -> Version {
        self.peer_version
    }

    /// Reclaims the channel after the handshake, with the negotiated
    /// encryptor and decryptor installed.
    pub fn take_channel(&mut self) -> Option<MessageChannel<T>> {
        self.channel.take()
    }

    /// Runs the handshake on a connected channel.
    ///
    /// Takes ownership of the channel and reports exactly one terminal
    /// [`ErrorCode`]. The channel is paused afterwards either way; on
    /// [`ErrorCode::Success`] it carries the negotiated AEAD pair and can be
    /// reclaimed with [`take_channel`](Self::take_channel).
    pub async fn authenticate(&mut self, mut channel: MessageChannel<T>) -> ErrorCode {
        channel.resume();
        self.channel = Some(channel);

        let result = match self.run().await {
            Ok(()) => ErrorCode::Success,
            Err(code) => code,
        };

        if let Some(channel) = self.channel.as_mut() {
            channel.pause();
        }

        logging::log_handshake_finished(result.as_str());
        result
    }

    async fn run(&mut self) -> Result<(), ErrorCode> {
        if self.state != State::SendClientHello {
            warn!(state = self.state.name(), "authenticator cannot be reused");
            return Err(ErrorCode::ProtocolError);
        }

        let client_hello = self.build_client_hello()?;
        self.send(&client_hello.to_bytes(), "ClientHello").await?;
        self.on_message_written()?;

        while self.state != State::Finished {
            let buffer = self.recv().await?;
            if let Some((name, reply)) = self.on_message_received(&buffer)? {
                self.send(&reply, name).await?;
                self.on_message_written()?;
            }
        }

        Ok(())
    }

    // Dispatches an incoming message against the current (read) state and
    // returns the reply to write, if the protocol calls for one.
    fn on_message_received(
        &mut self,
        buffer: &[u8],
    ) -> Result<Option<(&'static str, Vec<u8>)>, ErrorCode> {
        match self.state {
            State::ReadServerHello => {
                self.read_server_hello(buffer)?;
                if self.identify == Identify::Anonymous {
                    self.transition(State::ReadSessionChallenge)?;
                    Ok(None)
                } else {
                    self.transition(State::SendIdentify)?;
                    let identify = SrpIdentify {
                        username: self.username.clone(),
                    };
                    Ok(Some(("Identify", identify.to_bytes())))
                }
            }
            State::ReadServerKeyExchange => {
                self.read_server_key_exchange(buffer)?;
                self.transition(State::SendClientKeyExchange)?;
                let key_exchange = self.build_client_key_exchange()?;
                Ok(Some(("ClientKeyExchange", key_exchange.to_bytes())))
            }
            State::ReadSessionChallenge => {
                self.read_session_challenge(buffer)?;
                self.transition(State::SendSessionResponse)?;
                let response = SessionResponse {
                    session_type: self.session_type,
                };
                Ok(Some(("SessionResponse", response.to_bytes())))
            }
            _ => {
                logging::log_unexpected_message(self.state.name());
                Err(ErrorCode::ProtocolError)
            }
        }
    }

    // Advances the state machine after a message was fully written.
    fn on_message_written(&mut self) -> Result<(), ErrorCode> {
        match self.state {
            State::SendClientHello => self.transition(State::ReadServerHello),
            State::SendIdentify => self.transition(State::ReadServerKeyExchange),
            State::SendClientKeyExchange => {
                self.transition(State::ReadSessionChallenge)?;
                self.on_session_key_changed()
            }
            State::SendSessionResponse => self.transition(State::Finished),
            _ => {
                logging::log_unexpected_message(self.state.name());
                Err(ErrorCode::ProtocolError)
            }
        }
    }

    fn transition(&mut self, next: State) -> Result<(), ErrorCode> {
        if !self.state.can_transition_to(next) {
            warn!(
                state_from = self.state.name(),
                state_to = next.name(),
                "invalid handshake state transition"
            );
            return Err(ErrorCode::ProtocolError);
        }
        logging::log_state_transition(self.state.name(), next.name());
        self.state = next;
        Ok(())
    }

    // Rebinds the channel ciphers to the current session key and IVs. Every
    // rebind starts a fresh AEAD nonce sequence, paired with IVs that were
    // generated for this key alone.
    fn on_session_key_changed(&mut self) -> Result<(), ErrorCode> {
        info!("session key changed");

        let suite = self.encryption.ok_or(ErrorCode::UnknownError)?;

        let encryptor = MessageEncryptor::new(suite, &self.session_key, &self.encrypt_iv)
            .map_err(|_| ErrorCode::UnknownError)?;
        let decryptor = MessageDecryptor::new(suite, &self.session_key, &self.decrypt_iv)
            .map_err(|_| ErrorCode::UnknownError)?;

        let channel = self.channel.as_mut().ok_or(ErrorCode::UnknownError)?;
        channel.set_encryptor(encryptor);
        channel.set_decryptor(decryptor);
        Ok(())
    }

    fn build_client_hello(&mut self) -> Result<ClientHello, ErrorCode> {
        // Anonymous connections without a public key have no one to
        // authenticate against.
        if self.identify == Identify::Anonymous && self.peer_public_key.is_empty() {
            warn!("anonymous mode requires a peer public key");
            return Err(ErrorCode::UnknownError);
        }

        let mut client_hello = ClientHello {
            encryption: crypto::supported_suites(),
            identify: self.identify,
            public_key: Vec::new(),
            iv: Vec::new(),
        };

        if !self.peer_public_key.is_empty() {
            self.encrypt_iv = crypto::random_bytes(IV_SIZE).map_err(|_| ErrorCode::UnknownError)?;

            let key_pair = KeyPair::generate().map_err(|_| ErrorCode::UnknownError)?;
            let public_key = key_pair.public_key().to_vec();

            let shared_secret = key_pair
                .session_key(&self.peer_public_key)
                .map_err(|_| ErrorCode::UnknownError)?;
            if shared_secret.is_empty() {
                return Err(ErrorCode::UnknownError);
            }

            self.session_key = Zeroizing::new(crypto::blake2s256(&[&shared_secret]).to_vec());

            client_hello.public_key = public_key;
            client_hello.iv = self.encrypt_iv.clone();
        }

        Ok(client_hello)
    }

    fn read_server_hello(&mut self, buffer: &[u8]) -> Result<(), ErrorCode> {
        logging::log_message_received("ServerHello");

        let server_hello = ServerHello::from_bytes(buffer).map_err(|e| {
            warn!(error = %e, "malformed ServerHello");
            ErrorCode::ProtocolError
        })?;

        let suite = match EncryptionSuite::from_u32(server_hello.encryption) {
            Some(suite) => suite,
            None => {
                let error = Error::UnsupportedEncryption(server_hello.encryption);
                warn!(error = %error, "rejected ServerHello");
                return Err(ErrorCode::ProtocolError);
            }
        };
        info!(encryption = suite.name(), "server selected encryption");
        self.encryption = Some(suite);

        if !server_hello.iv.is_empty() && server_hello.iv.len() != IV_SIZE {
            warn!(size = server_hello.iv.len(), "bad server IV size");
            return Err(ErrorCode::ProtocolError);
        }
        self.decrypt_iv = server_hello.iv;

        // Either both sides completed the key-agreement preamble or neither
        // did; a one-sided preamble is a protocol violation.
        if self.session_key.is_empty() != self.decrypt_iv.is_empty() {
            warn!("server IV does not match key-agreement state");
            return Err(ErrorCode::ProtocolError);
        }

        if !self.session_key.is_empty() {
            self.on_session_key_changed()?;
        }

        Ok(())
    }

    fn read_server_key_exchange(&mut self, buffer: &[u8]) -> Result<(), ErrorCode> {
        logging::log_message_received("ServerKeyExchange");

        let key_exchange = SrpServerKeyExchange::from_bytes(buffer).map_err(|e| {
            warn!(error = %e, "malformed ServerKeyExchange");
            ErrorCode::ProtocolError
        })?;

        if key_exchange.salt.len() < 64 || key_exchange.b.len() < 128 {
            warn!(
                salt_size = key_exchange.salt.len(),
                b_size = key_exchange.b.len(),
                "SRP parameters below minimum size"
            );
            return Err(ErrorCode::ProtocolError);
        }

        if !srp::verify_ng(&key_exchange.number, &key_exchange.generator) {
            warn!(
                modulus_size = key_exchange.number.len(),
                "SRP group is not whitelisted"
            );
            return Err(ErrorCode::ProtocolError);
        }

        // The SRP-derived key always becomes the channel key, so the server
        // must supply an IV for it here.
        if key_exchange.iv.len() != IV_SIZE {
            warn!(size = key_exchange.iv.len(), "bad server IV size");
            return Err(ErrorCode::ProtocolError);
        }

        let n = BigUint::from_bytes_be(&key_exchange.number);
        let g = BigUint::from_bytes_be(&key_exchange.generator);
        let b_pub = BigUint::from_bytes_be(&key_exchange.b);
        self.decrypt_iv = key_exchange.iv;

        let a_bytes = crypto::random_bytes(SRP_PRIVATE_KEY_SIZE)
            .map_err(|_| ErrorCode::UnknownError)?;
        let a = BigUint::from_bytes_be(&a_bytes);
        let a_pub = srp::calc_a_pub(&a, &n, &g);
        self.encrypt_iv = crypto::random_bytes(IV_SIZE).map_err(|_| ErrorCode::UnknownError)?;

        if !srp::verify_b_mod_n(&b_pub, &n) {
            warn!("invalid B or N");
            return Err(ErrorCode::ProtocolError);
        }

        let u = srp::calc_u(&a_pub, &b_pub, &n);
        let x = srp::calc_x(&key_exchange.salt, &self.username, &self.password);
        let key = srp::calc_client_key(&n, &b_pub, &g, &x, &a, &u).map_err(|e| {
            warn!(error = %e, "empty session key derived");
            ErrorCode::UnknownError
        })?;

        // The rotated key absorbs the preamble key when there is one.
        let key_bytes = Zeroizing::new(key.to_bytes_be());
        let digest = if self.session_key.is_empty() {
            crypto::blake2s256(&[&key_bytes])
        } else {
            crypto::blake2s256(&[&self.session_key, &key_bytes])
        };
        self.session_key = Zeroizing::new(digest.to_vec());
        self.srp_a_pub = Some(a_pub);

        Ok(())
    }

    fn build_client_key_exchange(&mut self) -> Result<SrpClientKeyExchange, ErrorCode> {
        let a_pub = self.srp_a_pub.take().ok_or(ErrorCode::UnknownError)?;
        Ok(SrpClientKeyExchange {
            a: a_pub.to_bytes_be(),
            iv: self.encrypt_iv.clone(),
        })
    }

    fn read_session_challenge(&mut self, buffer: &[u8]) -> Result<(), ErrorCode> {
        logging::log_message_received("SessionChallenge");

        let challenge = SessionChallenge::from_bytes(buffer).map_err(|e| {
            warn!(error = %e, "malformed SessionChallenge");
            ErrorCode::ProtocolError
        })?;

        if challenge.session_types & self.session_type == 0 {
            warn!(
                offered = challenge.session_types,
                requested = self.session_type,
                "requested session type not offered"
            );
            return Err(ErrorCode::SessionDenied);
        }

        self.peer_version = challenge.version;
        info!(version = %self.peer_version, "peer version");
        Ok(())
    }

    async fn send(&mut self, message: &[u8], name: &'static str) -> Result<(), ErrorCode> {
        logging::log_message_sent(name);
        let channel = self.channel.as_mut().ok_or(ErrorCode::UnknownError)?;
        channel.send(message).await.map_err(|e| {
            info!(error = %e, "channel error");
            classify_channel_error(&e)
        })
    }

    async fn recv(&mut self) -> Result<Vec<u8>, ErrorCode> {
        let channel = self.channel.as_mut().ok_or(ErrorCode::UnknownError)?;
        channel.recv().await.map_err(|e| {
            info!(error = %e, "channel error");
            classify_channel_error(&e)
        })
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Default for ClientAuthenticator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ClientAuthenticator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material or the password
        f.debug_struct("ClientAuthenticator")
            .field("identify", &self.identify)
            .field("username", &self.username)
            .field("session_type", &self.session_type)
            .field("state", &self.state)
            .field("encryption", &self.encryption)
            .finish_non_exhaustive()
    }
}
