//! The public facade: [`OpenTokenCodec`] ties TextCodec, KeyDeriver,
//! FrameCodec, and ClaimValidator together into `create`/`parse`.

use base64::Engine;
#[cfg(feature = "default-rng")]
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use crate::cipher_suite::CipherSuite;
use crate::claims::{self, ClaimPolicy, Clock, SystemClock};
use crate::error::OpenTokenError;
use crate::frame;
use crate::key_deriver::{self, Password};
use crate::payload::Payload;
use crate::text_codec;

/// A configured OpenToken producer/consumer for one (password, cipher suite)
/// pair.
///
/// Construct with [`OpenTokenCodec::new`] and tune the temporal policy with
/// the `with_*` builders before calling [`OpenTokenCodec::create`] or
/// [`OpenTokenCodec::parse`].
#[derive(Clone)]
pub struct OpenTokenCodec<C: Clock = SystemClock> {
    password: Password,
    suite: CipherSuite,
    policy: ClaimPolicy,
    clock: C,
}

impl OpenTokenCodec<SystemClock> {
    /// Builds a codec for `password` using the default cipher suite
    /// (AES-128-CBC, id 2), 120s tolerance, 300s lifetime, and 43200s
    /// renewal, reading "now" from the system clock.
    #[must_use]
    pub fn new(password: impl Into<Password>) -> Self {
        Self {
            password: password.into(),
            suite: CipherSuite::default(),
            policy: ClaimPolicy::default(),
            clock: SystemClock,
        }
    }
}

impl<C: Clock> OpenTokenCodec<C> {
    /// Overrides the cipher suite (default: [`CipherSuite::Aes128`]).
    #[must_use]
    pub fn with_cipher_suite(mut self, suite: CipherSuite) -> Self {
        self.suite = suite;
        self
    }

    /// Overrides the `not-before` tolerance, in seconds. Out-of-range values
    /// (beyond `chrono::Duration`'s representable span) saturate instead of
    /// panicking.
    #[must_use]
    pub fn with_tolerance(mut self, seconds: i64) -> Self {
        self.policy.tolerance = saturating_duration(seconds);
        self
    }

    /// Overrides the token lifetime used to compute `not-on-or-after` at
    /// creation time, in seconds. Out-of-range values saturate instead of
    /// panicking.
    #[must_use]
    pub fn with_lifetime(mut self, seconds: i64) -> Self {
        self.policy.lifetime = saturating_duration(seconds);
        self
    }

    /// Overrides the renewal window used to compute `renew-until` at
    /// creation time, in seconds. Out-of-range values saturate instead of
    /// panicking.
    #[must_use]
    pub fn with_renewal(mut self, seconds: i64) -> Self {
        self.policy.renewal = saturating_duration(seconds);
        self
    }

    /// Replaces the clock used for "now" when stamping and validating
    /// temporal claims. Intended for tests; see [`crate::FixedClock`].
    #[must_use]
    pub fn with_clock<C2: Clock>(self, clock: C2) -> OpenTokenCodec<C2> {
        OpenTokenCodec {
            password: self.password,
            suite: self.suite,
            policy: self.policy,
            clock,
        }
    }

    /// Creates an OpenToken from `pairs`, appending the temporal claims and
    /// encoding with a fresh, securely random IV.
    ///
    /// # Errors
    /// [`OpenTokenError::BadArgument`] if `pairs` does not contain `subject`.
    #[cfg(feature = "default-rng")]
    pub fn create(&self, pairs: impl IntoIterator<Item = (String, String)>) -> Result<String, OpenTokenError> {
        self.create_with_rng(pairs, &mut OsRng)
    }

    /// As [`OpenTokenCodec::create`], but with an explicit randomness
    /// source for IV generation — the capability-injection seam tests use to
    /// pin the IV.
    ///
    /// # Errors
    /// [`OpenTokenError::BadArgument`] if `pairs` does not contain `subject`,
    /// or if the compressed, encrypted payload exceeds the frame's maximum
    /// length.
    pub fn create_with_rng(
        &self,
        pairs: impl IntoIterator<Item = (String, String)>,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Result<String, OpenTokenError> {
        let payload = Payload::new(pairs);
        let stamped = claims::stamp(payload, &self.policy, self.clock.now())?;

        let key = key_deriver::derive_cipher_key(&self.password, self.suite, None);
        let cleartext = stamped.to_line_form();
        let frame_bytes = frame::encode(self.suite, &key.0, &cleartext, rng)?;

        let b64 = base64_engine().encode(&frame_bytes);
        Ok(text_codec::to_otk(&b64))
    }

    /// Parses and validates an OpenToken, returning its ordered claims.
    ///
    /// # Errors
    /// [`OpenTokenError::Malformed`] if `otk` does not decode to a
    /// well-formed frame; [`OpenTokenError::BadCredentials`] if decryption or
    /// HMAC verification fails; [`OpenTokenError::BadArgument`] or
    /// [`OpenTokenError::BadClaim`] if the decoded claims fail validation.
    pub fn parse(&self, otk: &str) -> Result<Payload, OpenTokenError> {
        let b64 = text_codec::from_otk(otk);
        let frame_bytes = base64_engine()
            .decode(b64)
            .map_err(|e| OpenTokenError::Malformed(format!("Invalid Base64: {e}")))?;

        let key = key_deriver::derive_cipher_key(&self.password, self.suite, None);
        let cleartext = frame::decode(self.suite, &key.0, &frame_bytes)?;
        let payload = Payload::from_line_form(&cleartext)?;

        claims::validate(payload, &self.policy, self.clock.now())
    }
}

fn base64_engine() -> impl base64::Engine {
    base64::engine::general_purpose::URL_SAFE
}

/// `chrono::Duration::seconds` panics outside its representable range;
/// builder methods take a caller-supplied `i64` directly, so clamp instead.
fn saturating_duration(seconds: i64) -> chrono::Duration {
    chrono::Duration::try_seconds(seconds).unwrap_or(if seconds < 0 {
        chrono::Duration::MIN
    } else {
        chrono::Duration::MAX
    })
}
