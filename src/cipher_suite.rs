use crate::error::OpenTokenError;

/// Closed enumeration of the OpenToken cipher suites, indexed by the 1-byte id
/// that travels inside the wire frame.
///
/// Suite 0 is the legacy null suite: no key, no encryption, and the HMAC
/// degrades to a plain SHA-1 digest. New producers should never emit it; it
/// exists only so decoders can tolerate historical tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    /// Legacy null suite: unauthenticated-by-key, unencrypted.
    None,
    /// AES-256-CBC with a 16-byte IV.
    Aes256,
    /// AES-128-CBC with a 16-byte IV.
    Aes128,
    /// 3-key 3DES-CBC with an 8-byte IV.
    Des3,
}

impl CipherSuite {
    /// Recovers a suite from its wire id.
    ///
    /// # Errors
    /// [`OpenTokenError::BadArgument`] if `id` is outside `0..=3`.
    pub fn from_id(id: u8) -> Result<Self, OpenTokenError> {
        match id {
            0 => Ok(Self::None),
            1 => Ok(Self::Aes256),
            2 => Ok(Self::Aes128),
            3 => Ok(Self::Des3),
            other => Err(OpenTokenError::BadArgument(format!(
                "Invalid CipherSuite id: {other}."
            ))),
        }
    }

    /// The wire id for this suite.
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Aes256 => 1,
            Self::Aes128 => 2,
            Self::Des3 => 3,
        }
    }

    /// Derived-key length in bytes (0 for the null suite).
    #[must_use]
    pub(crate) fn key_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::Aes256 => 32,
            Self::Aes128 => 16,
            Self::Des3 => 21,
        }
    }

    /// IV length in bytes (0 for the null suite).
    #[must_use]
    pub(crate) fn iv_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::Aes256 | Self::Aes128 => 16,
            Self::Des3 => 8,
        }
    }

    /// Cipher block size in bytes, used to validate PKCS#5/7-padded
    /// ciphertext length before CBC decryption. Meaningless (and unused) for
    /// the null suite.
    #[must_use]
    pub(crate) fn block_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::Aes256 | Self::Aes128 => 16,
            Self::Des3 => 8,
        }
    }

    /// Whether this suite performs CBC encryption at all.
    #[must_use]
    pub(crate) fn is_encrypted(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl Default for CipherSuite {
    /// Suite id 2, AES-128-CBC, is the default producers should use.
    fn default() -> Self {
        Self::Aes128
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_ids() {
        for id in 0..=3u8 {
            let suite = CipherSuite::from_id(id).unwrap();
            assert_eq!(suite.id(), id);
        }
    }

    #[test]
    fn rejects_unknown_ids() {
        for id in [4u8, 5, 255] {
            assert!(CipherSuite::from_id(id).is_err());
        }
    }

    #[test]
    fn key_and_iv_lengths_match_table() {
        assert_eq!(CipherSuite::None.key_len(), 0);
        assert_eq!(CipherSuite::None.iv_len(), 0);
        assert_eq!(CipherSuite::Aes256.key_len(), 32);
        assert_eq!(CipherSuite::Aes256.iv_len(), 16);
        assert_eq!(CipherSuite::Aes128.key_len(), 16);
        assert_eq!(CipherSuite::Aes128.iv_len(), 16);
        assert_eq!(CipherSuite::Des3.key_len(), 21);
        assert_eq!(CipherSuite::Des3.iv_len(), 8);
    }
}
