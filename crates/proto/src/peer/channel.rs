//! Length-delimited message channel.
//!
//! The handshake and everything after it speak in discrete messages, not in
//! a byte stream. [`MessageChannel`] frames each message with a big-endian
//! `u32` length prefix and runs it through the installed encryptor or
//! decryptor, if any.
//!
//! The channel is handed to the authenticator already connected; after a
//! successful handshake the caller takes it back with the negotiated AEAD
//! pair installed and keeps using it for session traffic.
//!
//! # Example
//!
//! ```rust
//! use strix_proto::peer::MessageChannel;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (client, server) = tokio::io::duplex(4096);
//! let mut a = MessageChannel::new(client);
//! let mut b = MessageChannel::new(server);
//!
//! a.send(b"ping").await?;
//! assert_eq!(b.recv().await?, b"ping");
//! # Ok(())
//! # }
//! ```

use crate::peer::crypto::{MessageDecryptor, MessageEncryptor};
use strix_platform::{StrixError, StrixResult};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Maximum size of a single message on the wire.
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024 * 1024;

/// Bidirectional message channel with pluggable encryption.
///
/// Generic over the byte stream: `TcpStream` in production, an in-memory
/// duplex in tests.
pub struct MessageChannel<T> {
    stream: T,
    encryptor: Option<MessageEncryptor>,
    decryptor: Option<MessageDecryptor>,
    paused: bool,
}

impl<T: AsyncRead + AsyncWrite + Unpin> MessageChannel<T> {
    /// Wraps a connected stream.
    pub fn new(stream: T) -> Self {
        Self {
            stream,
            encryptor: None,
            decryptor: None,
            paused: false,
        }
    }

    /// Installs the outbound cipher; takes effect from the next `send`.
    pub fn set_encryptor(&mut self, encryptor: MessageEncryptor) {
        self.encryptor = Some(encryptor);
    }

    /// Installs the inbound cipher; takes effect from the next `recv`.
    pub fn set_decryptor(&mut self, decryptor: MessageDecryptor) {
        self.decryptor = Some(decryptor);
    }

    /// Stops the channel from reading. Data already in flight stays
    /// buffered in the transport until `resume`.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Allows reading again after a `pause`.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Returns whether the channel is paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns [`StrixError::FrameSize`] for empty or oversized messages,
    /// [`StrixError::Crypto`] if encryption fails, or [`StrixError::Io`]
    /// on transport failure.
    pub async fn send(&mut self, message: &[u8]) -> StrixResult<()> {
        let payload = match self.encryptor.as_mut() {
            Some(encryptor) => encryptor
                .encrypt(message)
                .map_err(|e| StrixError::Crypto(e.to_string()))?,
            None => message.to_vec(),
        };

        if payload.is_empty() || payload.len() > MAX_MESSAGE_SIZE {
            return Err(StrixError::FrameSize {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        self.stream
            .write_all(&(payload.len() as u32).to_be_bytes())
            .await?;
        self.stream.write_all(&payload).await?;
        self.stream.flush().await?;

        trace!(size = payload.len(), "message sent");
        Ok(())
    }

    /// Receives one message.
    ///
    /// # Errors
    ///
    /// Returns [`StrixError::ChannelPaused`] while paused,
    /// [`StrixError::FrameSize`] for a malformed frame,
    /// [`StrixError::Crypto`] if decryption fails, or [`StrixError::Io`]
    /// on transport failure and disconnect.
    pub async fn recv(&mut self) -> StrixResult<Vec<u8>> {
        if self.paused {
            return Err(StrixError::ChannelPaused);
        }

        let mut length_bytes = [0u8; 4];
        self.stream.read_exact(&mut length_bytes).await?;

        let length = u32::from_be_bytes(length_bytes) as usize;
        if length == 0 || length > MAX_MESSAGE_SIZE {
            return Err(StrixError::FrameSize {
                size: length,
                max: MAX_MESSAGE_SIZE,
            });
        }

        let mut payload = vec![0u8; length];
        self.stream.read_exact(&mut payload).await?;
        trace!(size = length, "message received");

        match self.decryptor.as_mut() {
            Some(decryptor) => decryptor
                .decrypt(&payload)
                .map_err(|e| StrixError::Crypto(e.to_string())),
            None => Ok(payload),
        }
    }

    /// Unwraps the channel, returning the underlying stream.
    ///
    /// Installed ciphers are discarded; this is for callers that want the
    /// raw transport back, e.g. to hand it to a relay.
    pub fn into_inner(self) -> T {
        self.stream
    }
}

impl<T> std::fmt::Debug for MessageChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageChannel")
            .field("encryptor", &self.encryptor.is_some())
            .field("decryptor", &self.decryptor.is_some())
            .field("paused", &self.paused)
            .finish()
    }
}
