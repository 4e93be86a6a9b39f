//! SRP-6a client-side math (RFC 2945, RFC 5054).
//!
//! This module implements the client half of the Secure Remote Password
//! protocol used by the handshake:
//!
//! - whitelisted group parameters (RFC 5054 4096/6144/8192-bit groups)
//! - `A = g^a mod N` and the client session key
//!   `S = (B - k*g^x)^(a + u*x) mod N`
//! - the scrambling parameter `u` and the private key derivate `x`
//!
//! The hash `H` is BLAKE2s-256, matching the peer's key-derivation hash, and
//! `A`/`B` are zero-padded to the modulus width before hashing.
//!
//! # Security
//!
//! - Groups smaller than 4096 bits are rejected outright; so is any `(N, g)`
//!   pair that is not byte-identical to a whitelisted group
//! - `B ≡ 0 (mod N)` is rejected to stop a malicious server from forcing a
//!   predictable session key
//!
//! # Example
//!
//! ```rust
//! use num_bigint::BigUint;
//! use strix_proto::peer::srp::{self, groups};
//!
//! let n = BigUint::from_bytes_be(&groups::MODULUS_4096);
//! let g = BigUint::from_bytes_be(groups::GENERATOR_4096);
//!
//! let a = BigUint::from_bytes_be(&[0x42; 128]);
//! let a_pub = srp::calc_a_pub(&a, &n, &g);
//! assert!(a_pub.bits() > 0);
//! ```

use crate::peer::crypto::blake2s256;
use crate::peer::{Error, Result};
use num_bigint::BigUint;

/// Whitelisted SRP group parameters.
///
/// These are the RFC 5054 groups of at least 4096 bits, stored big-endian at
/// full modulus width, exactly as the server sends them on the wire, so the
/// whitelist check is plain byte equality.
pub mod groups {
    use once_cell::sync::Lazy;

    /// 4096-bit group modulus (RFC 5054 Appendix A).
    pub static MODULUS_4096: Lazy<Vec<u8>> = Lazy::new(|| {
        hex::decode(
            "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
             020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
             4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
             EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
             98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
             9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
             E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
             3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D04507A33\
             A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7\
             ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6BF12FFA06D98A0864\
             D87602733EC86A64521F2B18177B200CBBE117577A615D6C770988C0BAD946E2\
             08E24FA074E5AB3143DB5BFCE0FD108E4B82D120A92108011A723C12A787E6D7\
             88719A10BDBA5B2699C327186AF4E23C1A946834B6150BDA2583E9CA2AD44CE8\
             DBBBC2DB04DE8EF92E8EFC141FBECAA6287C59474E6BC05D99B2964FA090C3A2\
             233BA186515BE7ED1F612970CEE2D7AFB81BDD762170481CD0069127D5B05AA9\
             93B4EA988D8FDDC186FFB7DC90A6C08F4DF435C934063199FFFFFFFFFFFFFFFF",
        )
        .expect("Invalid hex")
    });

    /// 4096-bit group generator.
    pub const GENERATOR_4096: &[u8] = &[5];

    /// 6144-bit group modulus (RFC 5054 Appendix A).
    pub static MODULUS_6144: Lazy<Vec<u8>> = Lazy::new(|| {
        hex::decode(
            "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
             020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
             4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
             EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
             98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
             9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
             E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
             3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D04507A33\
             A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7\
             ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6BF12FFA06D98A0864\
             D87602733EC86A64521F2B18177B200CBBE117577A615D6C770988C0BAD946E2\
             08E24FA074E5AB3143DB5BFCE0FD108E4B82D120A92108011A723C12A787E6D7\
             88719A10BDBA5B2699C327186AF4E23C1A946834B6150BDA2583E9CA2AD44CE8\
             DBBBC2DB04DE8EF92E8EFC141FBECAA6287C59474E6BC05D99B2964FA090C3A2\
             233BA186515BE7ED1F612970CEE2D7AFB81BDD762170481CD0069127D5B05AA9\
             93B4EA988D8FDDC186FFB7DC90A6C08F4DF435C93402849236C3FAB4D27C7026\
             C1D4DCB2602646DEC9751E763DBA37BDF8FF9406AD9E530EE5DB382F413001AE\
             B06A53ED9027D831179727B0865A8918DA3EDBEBCF9B14ED44CE6CBACED4BB1B\
             DB7F1447E6CC254B332051512BD7AF426FB8F401378CD2BF5983CA01C64B92EC\
             F032EA15D1721D03F482D7CE6E74FEF6D55E702F46980C82B5A84031900B1C9E\
             59E7C97FBEC7E8F323A97A7E36CC88BE0F1D45B7FF585AC54BD407B22B4154AA\
             CC8F6D7EBF48E1D814CC5ED20F8037E0A79715EEF29BE32806A1D58BB7C5DA76\
             F550AA3D8A1FBFF0EB19CCB1A313D55CDA56C9EC2EF29632387FE8D76E3C0468\
             043E8F663F4860EE12BF2D5B0B7474D6E694F91E6DCC4024FFFFFFFFFFFFFFFF",
        )
        .expect("Invalid hex")
    });

    /// 6144-bit group generator.
    pub const GENERATOR_6144: &[u8] = &[5];

    /// 8192-bit group modulus (RFC 5054 Appendix A).
    pub static MODULUS_8192: Lazy<Vec<u8>> = Lazy::new(|| {
        hex::decode(
            "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
             020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
             4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
             EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
             98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
             9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
             E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
             3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D04507A33\
             A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7\
             ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6BF12FFA06D98A0864\
             D87602733EC86A64521F2B18177B200CBBE117577A615D6C770988C0BAD946E2\
             08E24FA074E5AB3143DB5BFCE0FD108E4B82D120A92108011A723C12A787E6D7\
             88719A10BDBA5B2699C327186AF4E23C1A946834B6150BDA2583E9CA2AD44CE8\
             DBBBC2DB04DE8EF92E8EFC141FBECAA6287C59474E6BC05D99B2964FA090C3A2\
             233BA186515BE7ED1F612970CEE2D7AFB81BDD762170481CD0069127D5B05AA9\
             93B4EA988D8FDDC186FFB7DC90A6C08F4DF435C93402849236C3FAB4D27C7026\
             C1D4DCB2602646DEC9751E763DBA37BDF8FF9406AD9E530EE5DB382F413001AE\
             B06A53ED9027D831179727B0865A8918DA3EDBEBCF9B14ED44CE6CBACED4BB1B\
             DB7F1447E6CC254B332051512BD7AF426FB8F401378CD2BF5983CA01C64B92EC\
             F032EA15D1721D03F482D7CE6E74FEF6D55E702F46980C82B5A84031900B1C9E\
             59E7C97FBEC7E8F323A97A7E36CC88BE0F1D45B7FF585AC54BD407B22B4154AA\
             CC8F6D7EBF48E1D814CC5ED20F8037E0A79715EEF29BE32806A1D58BB7C5DA76\
             F550AA3D8A1FBFF0EB19CCB1A313D55CDA56C9EC2EF29632387FE8D76E3C0468\
             043E8F663F4860EE12BF2D5B0B7474D6E694F91E6DBE115974A3926F12FEE5E4\
             38777CB6A932DF8CD8BEC4D073B931BA3BC832B68D9DD300741FA7BF8AFC47ED\
             2576F6936BA424663AAB639C5AE4F5683423B4742BF1C978238F16CBE39D652D\
             E3FDB8BEFC848AD922222E04A4037C0713EB57A81A23F0C73473FC646CEA306B\
             4BCBC8862F8385DDFA9D4B7FA2C087E879683303ED5BDD3A062B3CF5B3A278A6\
             6D2A13F83F44F82DDF310EE074AB6A364597E899A0255DC164F31CC50846851D\
             F9AB48195DED7EA1B1D510BD7EE74D73FAF36BC31ECFA268359046F4EB879F92\
             4009438B481C6CD7889A002ED5EE382BC9190DA6FC026E479558E4475677E9AA\
             9E3050E2765694DFC81F56E880B96E7160C980DD98EDD3DFFFFFFFFFFFFFFFFF",
        )
        .expect("Invalid hex")
    });

    /// 8192-bit group generator.
    pub const GENERATOR_8192: &[u8] = &[19];
}

/// Checks that `(N, g)` is one of the whitelisted group pairs.
///
/// The modulus length selects the candidate group (512 bytes → 4096-bit,
/// 768 → 6144-bit, 1024 → 8192-bit); both `N` and `g` must then match the
/// group byte-for-byte. Groups below 4096 bits are never accepted.
pub fn verify_ng(n: &[u8], g: &[u8]) -> bool {
    match n.len() {
        512 => n == groups::MODULUS_4096.as_slice() && g == groups::GENERATOR_4096,
        768 => n == groups::MODULUS_6144.as_slice() && g == groups::GENERATOR_6144,
        1024 => n == groups::MODULUS_8192.as_slice() && g == groups::GENERATOR_8192,
        _ => false,
    }
}

// Zero-pads a big-endian representation on the left to `length` bytes.
fn pad(value: &BigUint, length: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    if bytes.len() >= length {
        return bytes;
    }
    let mut padded = vec![0u8; length - bytes.len()];
    padded.extend_from_slice(&bytes);
    padded
}

fn modulus_width(n: &BigUint) -> usize {
    ((n.bits() as usize) + 7) / 8
}

/// Computes the client public ephemeral `A = g^a mod N`.
pub fn calc_a_pub(a: &BigUint, n: &BigUint, g: &BigUint) -> BigUint {
    g.modpow(a, n)
}

/// Computes the scrambling parameter `u = H(PAD(A) | PAD(B)) mod N`.
pub fn calc_u(a_pub: &BigUint, b_pub: &BigUint, n: &BigUint) -> BigUint {
    let width = modulus_width(n);
    let digest = blake2s256(&[&pad(a_pub, width), &pad(b_pub, width)]);
    BigUint::from_bytes_be(&digest) % n
}

/// Computes the private key derivate `x = H(s | H(I ":" p))`.
///
/// `I` and `p` are the UTF-8 username and password.
pub fn calc_x(salt: &[u8], username: &str, password: &str) -> BigUint {
    let inner = blake2s256(&[username.as_bytes(), b":", password.as_bytes()]);
    let digest = blake2s256(&[salt, &inner]);
    BigUint::from_bytes_be(&digest)
}

/// Computes the SRP-6a multiplier `k = H(N | PAD(g)) mod N`.
pub fn calc_k(n: &BigUint, g: &BigUint) -> BigUint {
    let width = modulus_width(n);
    let digest = blake2s256(&[&pad(n, width), &pad(g, width)]);
    BigUint::from_bytes_be(&digest) % n
}

/// Computes the client session key `S = (B - k*g^x)^(a + u*x) mod N`.
///
/// # Errors
///
/// Returns [`Error::InvalidSrpParameters`] when `B - k*g^x` vanishes, which
/// would collapse the key to zero.
pub fn calc_client_key(
    n: &BigUint,
    b_pub: &BigUint,
    g: &BigUint,
    x: &BigUint,
    a: &BigUint,
    u: &BigUint,
) -> Result<BigUint> {
    let k = calc_k(n, g);
    let kgx = (&k * g.modpow(x, n)) % n;

    // B - k*g^x, kept nonnegative by adding N before the subtraction.
    let base = ((b_pub % n) + n - kgx) % n;
    if base == BigUint::from(0u32) {
        return Err(Error::InvalidSrpParameters(
            "B - k*g^x is zero".to_string(),
        ));
    }

    let exponent = a + &(u * x);
    Ok(base.modpow(&exponent, n))
}

/// Returns true iff `B mod N != 0`.
pub fn verify_b_mod_n(b_pub: &BigUint, n: &BigUint) -> bool {
    (b_pub % n) != BigUint::from(0u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_sizes() {
        assert_eq!(groups::MODULUS_4096.len(), 512);
        assert_eq!(groups::MODULUS_6144.len(), 768);
        assert_eq!(groups::MODULUS_8192.len(), 1024);
    }

    #[test]
    fn test_verify_ng_accepts_whitelisted_groups() {
        assert!(verify_ng(&groups::MODULUS_4096, groups::GENERATOR_4096));
        assert!(verify_ng(&groups::MODULUS_6144, groups::GENERATOR_6144));
        assert!(verify_ng(&groups::MODULUS_8192, groups::GENERATOR_8192));
    }

    #[test]
    fn test_verify_ng_rejects_wrong_generator() {
        assert!(!verify_ng(&groups::MODULUS_4096, &[2]));
        assert!(!verify_ng(&groups::MODULUS_8192, groups::GENERATOR_4096));
    }

    #[test]
    fn test_verify_ng_rejects_small_groups() {
        // 2048-bit modulus, below the floor.
        assert!(!verify_ng(&vec![0xffu8; 256], &[2]));
        assert!(!verify_ng(&[], &[2]));
    }

    #[test]
    fn test_verify_ng_rejects_mutated_modulus() {
        let mut n = groups::MODULUS_4096.clone();
        n[100] ^= 0x01;
        assert!(!verify_ng(&n, groups::GENERATOR_4096));
    }

    #[test]
    fn test_pad_widths() {
        let value = BigUint::from(0x0102u32);
        assert_eq!(pad(&value, 4), vec![0, 0, 1, 2]);
        assert_eq!(pad(&value, 2), vec![1, 2]);
        assert_eq!(pad(&value, 1), vec![1, 2]); // never truncates
    }

    #[test]
    fn test_calc_u_depends_on_both_ephemerals() {
        let n = BigUint::from_bytes_be(&groups::MODULUS_4096);
        let a_pub = BigUint::from(1234u32);
        let b_pub = BigUint::from(5678u32);

        let u1 = calc_u(&a_pub, &b_pub, &n);
        let u2 = calc_u(&b_pub, &a_pub, &n);
        assert_ne!(u1, u2);
        assert_ne!(u1, BigUint::from(0u32));
    }

    #[test]
    fn test_calc_x_deterministic() {
        let salt = [0x11u8; 64];
        let x1 = calc_x(&salt, "alice", "password");
        let x2 = calc_x(&salt, "alice", "password");
        assert_eq!(x1, x2);

        assert_ne!(x1, calc_x(&salt, "alice", "Password"));
        assert_ne!(x1, calc_x(&[0x22u8; 64], "alice", "password"));
    }

    #[test]
    fn test_verify_b_mod_n() {
        let n = BigUint::from_bytes_be(&groups::MODULUS_4096);
        assert!(verify_b_mod_n(&BigUint::from(42u32), &n));
        assert!(!verify_b_mod_n(&BigUint::from(0u32), &n));
        assert!(!verify_b_mod_n(&n, &n));
        assert!(!verify_b_mod_n(&(&n * 2u32), &n));
    }

    // Full SRP-6a agreement: the client key computed here must equal the
    // server key S = (A * v^u)^b mod N.
    #[test]
    fn test_client_and_server_agree() {
        let n = BigUint::from_bytes_be(&groups::MODULUS_4096);
        let g = BigUint::from_bytes_be(groups::GENERATOR_4096);

        let salt = [0x5au8; 64];
        let x = calc_x(&salt, "alice", "correct horse");
        let v = g.modpow(&x, &n);

        let a = BigUint::from_bytes_be(&[0x17; 128]);
        let b = BigUint::from_bytes_be(&[0x29; 128]);

        let a_pub = calc_a_pub(&a, &n, &g);
        let k = calc_k(&n, &g);
        let b_pub = (&k * &v + g.modpow(&b, &n)) % &n;

        let u = calc_u(&a_pub, &b_pub, &n);

        let client_key = calc_client_key(&n, &b_pub, &g, &x, &a, &u).unwrap();
        let server_key = (&a_pub * v.modpow(&u, &n)).modpow(&b, &n);

        assert_eq!(client_key, server_key);
    }

    #[test]
    fn test_client_key_rejects_degenerate_b() {
        let n = BigUint::from_bytes_be(&groups::MODULUS_4096);
        let g = BigUint::from_bytes_be(groups::GENERATOR_4096);

        let x = BigUint::from(7u32);
        let a = BigUint::from(11u32);
        let u = BigUint::from(13u32);

        // B chosen so that B - k*g^x == 0 (mod N).
        let k = calc_k(&n, &g);
        let b_pub = (&k * g.modpow(&x, &n)) % &n;

        assert!(calc_client_key(&n, &b_pub, &g, &x, &a, &u).is_err());
    }
}
