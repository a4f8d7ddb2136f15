//! PBKDF2-HMAC-SHA1 key derivation, one call per cipher suite.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher_suite::CipherSuite;

/// Eight zero bytes: the fixed salt this core uses unless a caller overrides
/// it. This weakens offline-guessing resistance but is part of OpenToken's
/// historical wire behavior and must not be "fixed" silently.
const DEFAULT_SALT: [u8; 8] = [0u8; 8];

const PBKDF2_ITERATIONS: u32 = 1000;

/// A password supplied as either UTF-8 text or raw bytes, with `None`/absent
/// treated as empty.
#[derive(Debug, Clone, Default)]
pub enum Password {
    /// No password; derives to an empty byte string.
    #[default]
    None,
    /// UTF-8 text, converted to bytes before PBKDF2.
    Text(String),
    /// Raw bytes, used as-is.
    Bytes(Vec<u8>),
}

impl Password {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Self::None => b"",
            Self::Text(s) => s.as_bytes(),
            Self::Bytes(b) => b,
        }
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Password {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&[u8]> for Password {
    fn from(b: &[u8]) -> Self {
        Self::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for Password {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

/// A derived symmetric key. Zeroized on drop so key material doesn't linger
/// in freed memory.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct DerivedKey(pub(crate) Vec<u8>);

impl DerivedKey {
    /// Takes the inner bytes, leaving an empty (still-zeroized-on-drop) key
    /// behind. `ZeroizeOnDrop` forbids moving `self.0` out directly, so this
    /// swaps it out through `&mut self` instead of destructuring `self`.
    fn into_bytes(mut self) -> Vec<u8> {
        core::mem::take(&mut self.0)
    }
}

/// Derives the symmetric key for `suite` from `password` via PBKDF2-HMAC-SHA1
/// with 1000 iterations, using `salt` (or the fixed all-zero default salt when
/// `None`).
///
/// Suite `None` always derives to an empty key: there is no encryption to key.
#[must_use]
pub fn derive(password: &Password, suite: CipherSuite, salt: Option<&[u8]>) -> Vec<u8> {
    derive_key(password, suite, salt).into_bytes()
}

pub(crate) fn derive_key(password: &Password, suite: CipherSuite, salt: Option<&[u8]>) -> DerivedKey {
    let key_len = suite.key_len();
    if key_len == 0 {
        return DerivedKey(Vec::new());
    }
    let salt = salt.unwrap_or(&DEFAULT_SALT);
    let mut key = vec![0u8; key_len];
    pbkdf2::pbkdf2_hmac::<sha1::Sha1>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    DerivedKey(key)
}

/// Derives the cipher-ready key for `suite`: the raw PBKDF2 output for suites
/// 0–2, or the 21-to-24-byte expanded form for suite 3. This is the key
/// `frame::encode`/`frame::decode` actually consume for both HMAC and CBC;
/// the unexpanded 21-byte form is only what [`derive`] reports publicly, to
/// match this format's documented derived-key length.
pub(crate) fn derive_cipher_key(password: &Password, suite: CipherSuite, salt: Option<&[u8]>) -> DerivedKey {
    let raw = derive_key(password, suite, salt);
    if suite == CipherSuite::Des3 {
        let raw21: &[u8; 21] = raw.0.as_slice().try_into().expect("Des3 derived key is 21 bytes");
        DerivedKey(expand_des3_key(raw21).to_vec())
    } else {
        raw
    }
}

/// Expands a 21-byte (168-bit) 3DES key derived per suite 3 into the 24-byte,
/// 3-key form the cipher implementation actually consumes.
///
/// The derived key carries three 56-bit subkeys back to back with no parity
/// bits ("no parity adjustment"). A standard DES key schedule ignores the low
/// bit of every byte anyway, so each 7-byte subkey is spread across 8 bytes by
/// shifting its bits one position to the left, leaving that low bit zero
/// rather than computing real odd parity.
#[must_use]
pub(crate) fn expand_des3_key(raw: &[u8; 21]) -> [u8; 24] {
    let mut expanded = [0u8; 24];
    for (chunk7, chunk8) in raw.chunks_exact(7).zip(expanded.chunks_exact_mut(8)) {
        expand_des_subkey(chunk7.try_into().expect("chunks_exact(7)"), chunk8.try_into().expect("chunks_exact_mut(8)"));
    }
    expanded
}

fn expand_des_subkey(key7: [u8; 7], key8: &mut [u8; 8]) {
    key8[0] = key7[0] >> 1;
    key8[1] = ((key7[0] & 0x01) << 6) | (key7[1] >> 2);
    key8[2] = ((key7[1] & 0x03) << 5) | (key7[2] >> 3);
    key8[3] = ((key7[2] & 0x07) << 4) | (key7[3] >> 4);
    key8[4] = ((key7[3] & 0x0F) << 3) | (key7[4] >> 5);
    key8[5] = ((key7[4] & 0x1F) << 2) | (key7[5] >> 6);
    key8[6] = ((key7[5] & 0x3F) << 1) | (key7[6] >> 7);
    key8[7] = key7[6] & 0x7F;
    for byte in key8.iter_mut() {
        *byte <<= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_match_suite_key_size() {
        let empty = Password::default();
        assert_eq!(derive(&empty, CipherSuite::Aes256, None).len(), 32);
        assert_eq!(derive(&empty, CipherSuite::Aes128, None).len(), 16);
        assert_eq!(derive(&empty, CipherSuite::Des3, None).len(), 21);
        assert!(derive(&empty, CipherSuite::None, None).is_empty());
    }

    #[test]
    fn is_deterministic_for_fixed_salt() {
        let pw = Password::from("testPassword");
        let a = derive(&pw, CipherSuite::Aes128, None);
        let b = derive(&pw, CipherSuite::Aes128, None);
        assert_eq!(a, b);
    }

    #[test]
    fn text_and_equivalent_bytes_derive_identically() {
        let text = Password::from("hunter2");
        let bytes = Password::from(b"hunter2".to_vec());
        assert_eq!(
            derive(&text, CipherSuite::Aes128, None),
            derive(&bytes, CipherSuite::Aes128, None)
        );
    }

    #[test]
    fn custom_salt_changes_output() {
        let pw = Password::from("testPassword");
        let default_salt = derive(&pw, CipherSuite::Aes128, None);
        let custom_salt = derive(&pw, CipherSuite::Aes128, Some(b"saltsalt"));
        assert_ne!(default_salt, custom_salt);
    }

    #[test]
    fn des3_key_expansion_is_deterministic_and_clears_low_bits() {
        let raw: [u8; 21] = std::array::from_fn(|i| i as u8 * 7 + 3);
        let expanded_a = expand_des3_key(&raw);
        let expanded_b = expand_des3_key(&raw);
        assert_eq!(expanded_a, expanded_b);
        for byte in expanded_a {
            assert_eq!(byte & 0x01, 0, "low bit must be left unset, not parity-adjusted");
        }
    }

    #[test]
    fn derive_cipher_key_expands_only_for_des3() {
        let pw = Password::from("testPassword");
        assert_eq!(
            derive_cipher_key(&pw, CipherSuite::Aes128, None).0,
            derive_key(&pw, CipherSuite::Aes128, None).0
        );
        let des3_cipher_key = derive_cipher_key(&pw, CipherSuite::Des3, None);
        assert_eq!(des3_cipher_key.0.len(), 24);
        assert_eq!(derive_key(&pw, CipherSuite::Des3, None).0.len(), 21);
    }

    #[test]
    fn des3_key_expansion_differs_per_subkey() {
        let raw: [u8; 21] = std::array::from_fn(|i| i as u8 + 1);
        let expanded = expand_des3_key(&raw);
        assert_ne!(&expanded[0..8], &expanded[8..16]);
        assert_ne!(&expanded[8..16], &expanded[16..24]);
    }
}
