use thiserror::Error;

/// The four error categories an OpenToken operation can fail with.
///
/// `BadArgument` and `Malformed` are distinguished from `BadCredentials` and
/// `BadClaim` by *when* the problem could have been caught: the first two are
/// visible without a shared secret (bad caller input, or bytes that don't even
/// parse as a frame); the latter two require the password (or clock) to
/// discover.
#[derive(Debug, Error)]
pub enum OpenTokenError {
    /// Caller misuse: an unknown cipher suite id, a missing `subject` claim, a
    /// payload too large to frame, or a malformed password argument.
    #[error("{0}")]
    BadArgument(String),

    /// The token's bytes do not conform to the OpenToken framing rules: bad
    /// header literal, unsupported version, cipher suite mismatch, truncated
    /// frame, invalid Base64, or a corrupt zlib stream.
    #[error("{0}")]
    Malformed(String),

    /// The token is well-formed but authentication or decryption failed under
    /// the supplied password. Covers both CBC unpad failure and HMAC
    /// mismatch; the two conditions carry distinct messages but are reported
    /// under the same category so calling code cannot distinguish which check
    /// failed from the error type alone.
    #[error("{0}")]
    BadCredentials(String),

    /// The token decoded and authenticated but failed a temporal or semantic
    /// claim check: `not-before`/`not-on-or-after` ordering, premature use,
    /// expiry, or renewal-limit.
    #[error("{0}")]
    BadClaim(String),
}
