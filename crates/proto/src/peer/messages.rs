//! Handshake wire messages.
//!
//! The handshake exchanges length-delimited messages over the channel; this
//! module defines their payload layout. Each message is a fixed sequence of
//! fields: integers are big-endian `u32`, byte strings and text carry a
//! `u32` length prefix. The framing itself (one length-delimited message per
//! handshake step) is provided by [`MessageChannel`](crate::peer::MessageChannel).
//!
//! # Handshake sequence
//!
//! ```text
//! Client                                Server
//!   │  ClientHello ───────────────────►  │
//!   │  ◄─────────────────── ServerHello  │
//!   │  SrpIdentify ───────────────────►  │   (SRP mode only)
//!   │  ◄────────────── SrpServerKeyExchange
//!   │  SrpClientKeyExchange ──────────►  │
//!   │  ◄─────────────── SessionChallenge │
//!   │  SessionResponse ───────────────►  │
//! ```
//!
//! Parsing is strict: every field must be present and a message must consume
//! its buffer exactly, otherwise [`Error::InvalidMessage`] is returned and
//! the handshake aborts with a protocol error.

use crate::peer::{Error, Result};
use std::fmt;

/// Desktop management session (full control).
pub const SESSION_TYPE_DESKTOP_MANAGE: u32 = 1;
/// Desktop view-only session.
pub const SESSION_TYPE_DESKTOP_VIEW: u32 = 2;
/// File transfer session.
pub const SESSION_TYPE_FILE_TRANSFER: u32 = 4;

/// How the client proves itself to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Identify {
    /// Password authentication via SRP-6a.
    Srp = 0,
    /// No username/password exchange; the peer is identified by its
    /// configured public key.
    Anonymous = 1,
}

impl Identify {
    /// Converts a wire byte to an identify mode.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Identify::Srp),
            1 => Some(Identify::Anonymous),
            _ => None,
        }
    }
}

/// Peer software version reported in [`SessionChallenge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Patch level.
    pub patch: u32,
}

impl Version {
    /// Creates a version triple.
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// Field readers. `Cursor`-free by design: each message is a handful of
// fields, and explicit offsets keep the error reporting exact.

fn read_u32(buffer: &[u8], offset: &mut usize) -> Result<u32> {
    if buffer.len() < *offset + 4 {
        return Err(Error::BufferTooShort {
            required: *offset + 4,
            available: buffer.len(),
        });
    }
    let value = u32::from_be_bytes([
        buffer[*offset],
        buffer[*offset + 1],
        buffer[*offset + 2],
        buffer[*offset + 3],
    ]);
    *offset += 4;
    Ok(value)
}

fn read_u8(buffer: &[u8], offset: &mut usize) -> Result<u8> {
    if buffer.len() < *offset + 1 {
        return Err(Error::BufferTooShort {
            required: *offset + 1,
            available: buffer.len(),
        });
    }
    let value = buffer[*offset];
    *offset += 1;
    Ok(value)
}

fn read_bytes(buffer: &[u8], offset: &mut usize) -> Result<Vec<u8>> {
    let len = read_u32(buffer, offset)? as usize;
    if buffer.len() < *offset + len {
        return Err(Error::BufferTooShort {
            required: *offset + len,
            available: buffer.len(),
        });
    }
    let bytes = buffer[*offset..*offset + len].to_vec();
    *offset += len;
    Ok(bytes)
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn expect_consumed(buffer: &[u8], offset: usize, name: &str) -> Result<()> {
    if offset != buffer.len() {
        return Err(Error::InvalidMessage(format!(
            "{} has {} trailing bytes",
            name,
            buffer.len() - offset
        )));
    }
    Ok(())
}

/// First message of the handshake, sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    /// Bitmask of encryption suites the client supports.
    pub encryption: u32,
    /// Requested identify mode.
    pub identify: Identify,
    /// Ephemeral X25519 public key; empty when no peer public key is
    /// configured.
    pub public_key: Vec<u8>,
    /// Client-to-server IV for the key-agreement preamble; empty when no
    /// peer public key is configured.
    pub iv: Vec<u8>,
}

impl ClientHello {
    /// Serializes the message.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(13 + self.public_key.len() + self.iv.len());
        out.extend_from_slice(&self.encryption.to_be_bytes());
        out.push(self.identify as u8);
        put_bytes(&mut out, &self.public_key);
        put_bytes(&mut out, &self.iv);
        out
    }

    /// Parses the message.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let encryption = read_u32(buffer, &mut offset)?;
        let identify = Identify::from_u8(read_u8(buffer, &mut offset)?)
            .ok_or_else(|| Error::InvalidMessage("unknown identify mode".to_string()))?;
        let public_key = read_bytes(buffer, &mut offset)?;
        let iv = read_bytes(buffer, &mut offset)?;
        expect_consumed(buffer, offset, "ClientHello")?;
        Ok(Self {
            encryption,
            identify,
            public_key,
            iv,
        })
    }
}

/// Server's reply to [`ClientHello`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    /// The single encryption suite selected by the server.
    pub encryption: u32,
    /// Server-to-client IV for the key-agreement preamble; empty when the
    /// client did not send a public key.
    pub iv: Vec<u8>,
}

impl ServerHello {
    /// Serializes the message.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.iv.len());
        out.extend_from_slice(&self.encryption.to_be_bytes());
        put_bytes(&mut out, &self.iv);
        out
    }

    /// Parses the message.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let encryption = read_u32(buffer, &mut offset)?;
        let iv = read_bytes(buffer, &mut offset)?;
        expect_consumed(buffer, offset, "ServerHello")?;
        Ok(Self { encryption, iv })
    }
}

/// Username announcement, sent by the client in SRP mode.
///
/// The password never crosses the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpIdentify {
    /// UTF-8 username.
    pub username: String,
}

impl SrpIdentify {
    /// Serializes the message.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.username.len());
        put_bytes(&mut out, self.username.as_bytes());
        out
    }

    /// Parses the message.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let raw = read_bytes(buffer, &mut offset)?;
        expect_consumed(buffer, offset, "SrpIdentify")?;
        let username = String::from_utf8(raw)
            .map_err(|_| Error::InvalidMessage("username is not valid UTF-8".to_string()))?;
        Ok(Self { username })
    }
}

/// SRP group parameters and server ephemeral, sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpServerKeyExchange {
    /// Group modulus `N`, big-endian.
    pub number: Vec<u8>,
    /// Group generator `g`, big-endian.
    pub generator: Vec<u8>,
    /// User salt `s`.
    pub salt: Vec<u8>,
    /// Server public ephemeral `B`, big-endian.
    pub b: Vec<u8>,
    /// Server-to-client IV for the SRP-derived key.
    pub iv: Vec<u8>,
}

impl SrpServerKeyExchange {
    /// Serializes the message.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            20 + self.number.len()
                + self.generator.len()
                + self.salt.len()
                + self.b.len()
                + self.iv.len(),
        );
        put_bytes(&mut out, &self.number);
        put_bytes(&mut out, &self.generator);
        put_bytes(&mut out, &self.salt);
        put_bytes(&mut out, &self.b);
        put_bytes(&mut out, &self.iv);
        out
    }

    /// Parses the message.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let number = read_bytes(buffer, &mut offset)?;
        let generator = read_bytes(buffer, &mut offset)?;
        let salt = read_bytes(buffer, &mut offset)?;
        let b = read_bytes(buffer, &mut offset)?;
        let iv = read_bytes(buffer, &mut offset)?;
        expect_consumed(buffer, offset, "SrpServerKeyExchange")?;
        Ok(Self {
            number,
            generator,
            salt,
            b,
            iv,
        })
    }
}

/// Client public ephemeral, sent in reply to [`SrpServerKeyExchange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpClientKeyExchange {
    /// Client public ephemeral `A`, big-endian.
    pub a: Vec<u8>,
    /// Client-to-server IV for the SRP-derived key.
    pub iv: Vec<u8>,
}

impl SrpClientKeyExchange {
    /// Serializes the message.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.a.len() + self.iv.len());
        put_bytes(&mut out, &self.a);
        put_bytes(&mut out, &self.iv);
        out
    }

    /// Parses the message.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let a = read_bytes(buffer, &mut offset)?;
        let iv = read_bytes(buffer, &mut offset)?;
        expect_consumed(buffer, offset, "SrpClientKeyExchange")?;
        Ok(Self { a, iv })
    }
}

/// Session types offered by the server, plus its version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionChallenge {
    /// Bitmask of session types the server is willing to serve.
    pub session_types: u32,
    /// Server software version.
    pub version: Version,
}

impl SessionChallenge {
    /// Serializes the message.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        out.extend_from_slice(&self.session_types.to_be_bytes());
        out.extend_from_slice(&self.version.major.to_be_bytes());
        out.extend_from_slice(&self.version.minor.to_be_bytes());
        out.extend_from_slice(&self.version.patch.to_be_bytes());
        out
    }

    /// Parses the message.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let session_types = read_u32(buffer, &mut offset)?;
        let major = read_u32(buffer, &mut offset)?;
        let minor = read_u32(buffer, &mut offset)?;
        let patch = read_u32(buffer, &mut offset)?;
        expect_consumed(buffer, offset, "SessionChallenge")?;
        Ok(Self {
            session_types,
            version: Version::new(major, minor, patch),
        })
    }
}

/// The session type the client settles on, ending the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionResponse {
    /// Selected session type.
    pub session_type: u32,
}

impl SessionResponse {
    /// Serializes the message.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.session_type.to_be_bytes().to_vec()
    }

    /// Parses the message.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let session_type = read_u32(buffer, &mut offset)?;
        expect_consumed(buffer, offset, "SessionResponse")?;
        Ok(Self { session_type })
    }
}
