//! Cryptographic primitives for the peer handshake.
//!
//! This module implements:
//! - AEAD message encryption (AES-256-GCM, ChaCha20-Poly1305)
//! - BLAKE2s-256 hashing for key derivation
//! - X25519 key agreement
//! - Cryptographic random byte generation
//!
//! # Security
//!
//! - All keys are 256-bit; all IVs are 96-bit
//! - Shared secrets and session keys are zeroized on drop
//! - The AEAD nonce is derived from the negotiated IV and incremented per
//!   message; rebinding a cipher to a new key restarts the sequence with a
//!   fresh IV, so a (key, nonce) pair is never reused
//!
//! # Example
//!
//! ```rust
//! use strix_proto::peer::crypto::{EncryptionSuite, MessageEncryptor, MessageDecryptor};
//!
//! let key = [0x42u8; 32];
//! let iv = [0x01u8; 12];
//!
//! let mut encryptor =
//!     MessageEncryptor::new(EncryptionSuite::ChaCha20Poly1305, &key, &iv).unwrap();
//! let mut decryptor =
//!     MessageDecryptor::new(EncryptionSuite::ChaCha20Poly1305, &key, &iv).unwrap();
//!
//! let ciphertext = encryptor.encrypt(b"attack at dawn").unwrap();
//! let plaintext = decryptor.decrypt(&ciphertext).unwrap();
//! assert_eq!(plaintext, b"attack at dawn");
//! ```

use crate::peer::{Error, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce as AesGcmNonce,
};
use blake2::{Blake2s256, Digest};
use chacha20poly1305::ChaCha20Poly1305;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::agreement::{agree_ephemeral, EphemeralPrivateKey, UnparsedPublicKey, X25519};
use ring::rand::SystemRandom;
use zeroize::Zeroizing;

/// Session key size in bytes (BLAKE2s-256 output).
pub const SESSION_KEY_SIZE: usize = 32;

/// AEAD IV/nonce size in bytes.
pub const IV_SIZE: usize = 12;

/// AEAD authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// X25519 public key size in bytes.
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// Encryption suite for the authenticated session.
///
/// The client advertises a bitmask of supported suites in ClientHello; the
/// server picks exactly one and echoes it in ServerHello.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EncryptionSuite {
    /// AES-256 in Galois/Counter Mode.
    Aes256Gcm = 1,
    /// ChaCha20 with Poly1305 authenticator.
    ChaCha20Poly1305 = 2,
}

impl EncryptionSuite {
    /// Converts a wire value to a suite.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(EncryptionSuite::Aes256Gcm),
            2 => Some(EncryptionSuite::ChaCha20Poly1305),
            _ => None,
        }
    }

    /// Returns the suite's bit in the advertisement mask.
    pub fn mask(self) -> u32 {
        self as u32
    }

    /// Returns the suite name.
    pub fn name(self) -> &'static str {
        match self {
            EncryptionSuite::Aes256Gcm => "AES256-GCM",
            EncryptionSuite::ChaCha20Poly1305 => "ChaCha20-Poly1305",
        }
    }

    /// Get key length in bytes
    pub fn key_len(self) -> usize {
        SESSION_KEY_SIZE
    }

    /// Get IV/nonce length in bytes
    pub fn iv_len(self) -> usize {
        IV_SIZE
    }

    /// Get authentication tag length in bytes
    pub fn tag_len(self) -> usize {
        TAG_SIZE
    }
}

/// Returns true when the CPU has AES instructions.
///
/// AES-256-GCM is only advertised on hardware where it is actually fast;
/// everything else negotiates ChaCha20-Poly1305.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn has_aes_hardware() -> bool {
    is_x86_feature_detected!("aes")
}

/// Returns true when the CPU has AES instructions.
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub fn has_aes_hardware() -> bool {
    false
}

/// Returns the encryption suite mask this host advertises.
///
/// ChaCha20-Poly1305 is always included; AES-256-GCM only with hardware
/// support.
pub fn supported_suites() -> u32 {
    let mut mask = EncryptionSuite::ChaCha20Poly1305.mask();
    if has_aes_hardware() {
        mask |= EncryptionSuite::Aes256Gcm.mask();
    }
    mask
}

// One enum instead of a trait object: the suite set is closed and both
// ciphers come from the same aead trait family.
enum AeadCipher {
    Aes256Gcm(Box<Aes256Gcm>),
    ChaCha20Poly1305(Box<ChaCha20Poly1305>),
}

impl AeadCipher {
    fn new(suite: EncryptionSuite, key: &[u8]) -> Result<Self> {
        if key.len() != suite.key_len() {
            return Err(Error::InvalidKeyLength {
                expected: suite.key_len(),
                actual: key.len(),
            });
        }

        match suite {
            EncryptionSuite::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| Error::EncryptFailed)?;
                Ok(AeadCipher::Aes256Gcm(Box::new(cipher)))
            }
            EncryptionSuite::ChaCha20Poly1305 => {
                let cipher =
                    ChaCha20Poly1305::new_from_slice(key).map_err(|_| Error::EncryptFailed)?;
                Ok(AeadCipher::ChaCha20Poly1305(Box::new(cipher)))
            }
        }
    }

    fn encrypt(&self, nonce: &[u8; IV_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
        match self {
            AeadCipher::Aes256Gcm(cipher) => cipher
                .encrypt(AesGcmNonce::from_slice(nonce), plaintext)
                .map_err(|_| Error::EncryptFailed),
            AeadCipher::ChaCha20Poly1305(cipher) => cipher
                .encrypt(chacha20poly1305::Nonce::from_slice(nonce), plaintext)
                .map_err(|_| Error::EncryptFailed),
        }
    }

    fn decrypt(&self, nonce: &[u8; IV_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
        match self {
            AeadCipher::Aes256Gcm(cipher) => cipher
                .decrypt(AesGcmNonce::from_slice(nonce), ciphertext)
                .map_err(|_| Error::DecryptFailed),
            AeadCipher::ChaCha20Poly1305(cipher) => cipher
                .decrypt(chacha20poly1305::Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| Error::DecryptFailed),
        }
    }
}

// The nonce counts messages, starting from the negotiated IV. Little-endian
// increment with carry; wraps after 2^96 messages, far beyond any session.
fn increment_nonce(nonce: &mut [u8; IV_SIZE]) {
    for byte in nonce.iter_mut() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

/// Stateful AEAD encryptor bound to one (suite, key, IV) triple.
pub struct MessageEncryptor {
    cipher: AeadCipher,
    nonce: [u8; IV_SIZE],
}

impl MessageEncryptor {
    /// Creates an encryptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKeyLength`] or [`Error::InvalidIvLength`] if
    /// the material has the wrong size.
    pub fn new(suite: EncryptionSuite, key: &[u8], iv: &[u8]) -> Result<Self> {
        if iv.len() != suite.iv_len() {
            return Err(Error::InvalidIvLength {
                expected: suite.iv_len(),
                actual: iv.len(),
            });
        }

        let mut nonce = [0u8; IV_SIZE];
        nonce.copy_from_slice(iv);

        Ok(Self {
            cipher: AeadCipher::new(suite, key)?,
            nonce,
        })
    }

    /// Encrypts one message, returning ciphertext with the tag appended.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = self.cipher.encrypt(&self.nonce, plaintext)?;
        increment_nonce(&mut self.nonce);
        Ok(ciphertext)
    }
}

/// Stateful AEAD decryptor bound to one (suite, key, IV) triple.
pub struct MessageDecryptor {
    cipher: AeadCipher,
    nonce: [u8; IV_SIZE],
}

impl MessageDecryptor {
    /// Creates a decryptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKeyLength`] or [`Error::InvalidIvLength`] if
    /// the material has the wrong size.
    pub fn new(suite: EncryptionSuite, key: &[u8], iv: &[u8]) -> Result<Self> {
        if iv.len() != suite.iv_len() {
            return Err(Error::InvalidIvLength {
                expected: suite.iv_len(),
                actual: iv.len(),
            });
        }

        let mut nonce = [0u8; IV_SIZE];
        nonce.copy_from_slice(iv);

        Ok(Self {
            cipher: AeadCipher::new(suite, key)?,
            nonce,
        })
    }

    /// Decrypts one message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecryptFailed`] on tag mismatch or truncated input.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(Error::DecryptFailed);
        }
        let plaintext = self.cipher.decrypt(&self.nonce, ciphertext)?;
        increment_nonce(&mut self.nonce);
        Ok(plaintext)
    }
}

/// Computes BLAKE2s-256 over the concatenation of `parts`.
pub fn blake2s256(parts: &[&[u8]]) -> [u8; SESSION_KEY_SIZE] {
    let mut hasher = Blake2s256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Ephemeral X25519 key pair for the key-agreement preamble.
///
/// Generated fresh for every handshake; the private key is consumed by
/// [`KeyPair::session_key`] and can never be reused.
pub struct KeyPair {
    private_key: EphemeralPrivateKey,
    public_key: [u8; X25519_PUBLIC_KEY_SIZE],
}

impl KeyPair {
    /// Generates a new X25519 key pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyExchangeFailed`] if the system RNG fails.
    pub fn generate() -> Result<Self> {
        let rng = SystemRandom::new();
        let private_key = EphemeralPrivateKey::generate(&X25519, &rng)
            .map_err(|_| Error::KeyExchangeFailed("failed to generate X25519 key".to_string()))?;

        let public_key = private_key.compute_public_key().map_err(|_| {
            Error::KeyExchangeFailed("failed to compute X25519 public key".to_string())
        })?;

        let mut public_key_bytes = [0u8; X25519_PUBLIC_KEY_SIZE];
        public_key_bytes.copy_from_slice(public_key.as_ref());

        Ok(Self {
            private_key,
            public_key: public_key_bytes,
        })
    }

    /// Returns the public key.
    pub fn public_key(&self) -> &[u8; X25519_PUBLIC_KEY_SIZE] {
        &self.public_key
    }

    /// Computes the shared secret with the peer's public key, consuming the
    /// private key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyExchangeFailed`] if the peer key is malformed or
    /// the agreement produces a weak result.
    pub fn session_key(self, peer_public: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if peer_public.len() != X25519_PUBLIC_KEY_SIZE {
            return Err(Error::KeyExchangeFailed(format!(
                "peer public key must be {} bytes, got {}",
                X25519_PUBLIC_KEY_SIZE,
                peer_public.len()
            )));
        }

        let peer_public_key = UnparsedPublicKey::new(&X25519, peer_public);

        agree_ephemeral(self.private_key, &peer_public_key, |key_material| {
            Zeroizing::new(key_material.to_vec())
        })
        .map_err(|_| Error::KeyExchangeFailed("X25519 key agreement failed".to_string()))
    }
}

/// Returns `count` bytes from the operating system CSPRNG.
///
/// # Errors
///
/// Returns [`Error::RngFailed`] if the OS RNG is unavailable.
pub fn random_bytes(count: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; count];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|_| Error::RngFailed)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suite_from_u32() {
        assert_eq!(EncryptionSuite::from_u32(1), Some(EncryptionSuite::Aes256Gcm));
        assert_eq!(
            EncryptionSuite::from_u32(2),
            Some(EncryptionSuite::ChaCha20Poly1305)
        );
        assert_eq!(EncryptionSuite::from_u32(0), None);
        assert_eq!(EncryptionSuite::from_u32(3), None);
    }

    #[test]
    fn test_supported_suites_always_offers_chacha20() {
        assert_ne!(supported_suites() & EncryptionSuite::ChaCha20Poly1305.mask(), 0);
    }

    #[test]
    fn test_suite_parameters() {
        for suite in [EncryptionSuite::Aes256Gcm, EncryptionSuite::ChaCha20Poly1305] {
            assert_eq!(suite.key_len(), 32);
            assert_eq!(suite.iv_len(), 12);
            assert_eq!(suite.tag_len(), 16);
        }
    }

    #[test]
    fn test_encrypt_decrypt_chacha20() {
        let key = [0x42u8; 32];
        let iv = [0x01u8; 12];

        let mut encryptor =
            MessageEncryptor::new(EncryptionSuite::ChaCha20Poly1305, &key, &iv).unwrap();
        let mut decryptor =
            MessageDecryptor::new(EncryptionSuite::ChaCha20Poly1305, &key, &iv).unwrap();

        let ciphertext = encryptor.encrypt(b"test message").unwrap();
        assert_eq!(ciphertext.len(), b"test message".len() + TAG_SIZE);
        assert_eq!(decryptor.decrypt(&ciphertext).unwrap(), b"test message");
    }

    #[test]
    fn test_encrypt_decrypt_aes256() {
        let key = [0x42u8; 32];
        let iv = [0x01u8; 12];

        let mut encryptor = MessageEncryptor::new(EncryptionSuite::Aes256Gcm, &key, &iv).unwrap();
        let mut decryptor = MessageDecryptor::new(EncryptionSuite::Aes256Gcm, &key, &iv).unwrap();

        let ciphertext = encryptor.encrypt(b"aes test").unwrap();
        assert_eq!(decryptor.decrypt(&ciphertext).unwrap(), b"aes test");
    }

    #[test]
    fn test_nonce_sequence_must_match() {
        let key = [0x42u8; 32];
        let iv = [0x01u8; 12];

        let mut encryptor =
            MessageEncryptor::new(EncryptionSuite::ChaCha20Poly1305, &key, &iv).unwrap();
        let mut decryptor =
            MessageDecryptor::new(EncryptionSuite::ChaCha20Poly1305, &key, &iv).unwrap();

        // Decrypting out of order must fail: the second ciphertext was
        // sealed under the incremented nonce.
        let _first = encryptor.encrypt(b"one").unwrap();
        let second = encryptor.encrypt(b"two").unwrap();
        assert_eq!(decryptor.decrypt(&second), Err(Error::DecryptFailed));
    }

    #[test]
    fn test_decrypt_corrupted() {
        let key = [0x42u8; 32];
        let iv = [0x01u8; 12];

        let mut encryptor = MessageEncryptor::new(EncryptionSuite::Aes256Gcm, &key, &iv).unwrap();
        let mut decryptor = MessageDecryptor::new(EncryptionSuite::Aes256Gcm, &key, &iv).unwrap();

        let mut ciphertext = encryptor.encrypt(b"payload").unwrap();
        ciphertext[0] ^= 0xff;
        assert_eq!(decryptor.decrypt(&ciphertext), Err(Error::DecryptFailed));
    }

    #[test]
    fn test_decrypt_short_input() {
        let key = [0x42u8; 32];
        let iv = [0x01u8; 12];
        let mut decryptor =
            MessageDecryptor::new(EncryptionSuite::ChaCha20Poly1305, &key, &iv).unwrap();
        assert_eq!(decryptor.decrypt(&[0u8; 8]), Err(Error::DecryptFailed));
    }

    #[test]
    fn test_invalid_key_length() {
        let result = MessageEncryptor::new(EncryptionSuite::Aes256Gcm, &[0u8; 16], &[0u8; 12]);
        assert!(matches!(
            result,
            Err(Error::InvalidKeyLength {
                expected: 32,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_invalid_iv_length() {
        let result =
            MessageEncryptor::new(EncryptionSuite::ChaCha20Poly1305, &[0u8; 32], &[0u8; 16]);
        assert!(matches!(
            result,
            Err(Error::InvalidIvLength {
                expected: 12,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_increment_nonce_carry() {
        let mut nonce = [0xffu8, 0xff, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        increment_nonce(&mut nonce);
        assert_eq!(&nonce[..3], &[0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_blake2s256_output_size() {
        let digest = blake2s256(&[b"abc"]);
        assert_eq!(digest.len(), SESSION_KEY_SIZE);
    }

    #[test]
    fn test_blake2s256_concatenation() {
        // Hashing in parts equals hashing the concatenation.
        assert_eq!(blake2s256(&[b"ab", b"cd"]), blake2s256(&[b"abcd"]));
        assert_ne!(blake2s256(&[b"ab"]), blake2s256(&[b"cd"]));
    }

    #[test]
    fn test_x25519_key_agreement() {
        let client = KeyPair::generate().unwrap();
        let server = KeyPair::generate().unwrap();

        let client_public = *client.public_key();
        let server_public = *server.public_key();

        let client_secret = client.session_key(&server_public).unwrap();
        let server_secret = server.session_key(&client_public).unwrap();

        assert_eq!(client_secret.as_slice(), server_secret.as_slice());
        assert_eq!(client_secret.len(), 32);
    }

    #[test]
    fn test_x25519_rejects_short_peer_key() {
        let pair = KeyPair::generate().unwrap();
        assert!(pair.session_key(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_random_bytes() {
        let a = random_bytes(IV_SIZE).unwrap();
        let b = random_bytes(IV_SIZE).unwrap();
        assert_eq!(a.len(), IV_SIZE);
        assert_ne!(a, b);
    }
}
