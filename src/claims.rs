//! Temporal claim validation layered above the frame codec, and the `Clock`
//! capability that lets tests pin "now" instead of racing the system clock.

use chrono::{DateTime, Duration, Utc};

use crate::error::OpenTokenError;
use crate::payload::Payload;

const SUBJECT: &str = "subject";
const NOT_BEFORE: &str = "not-before";
const NOT_ON_OR_AFTER: &str = "not-on-or-after";
const RENEW_UNTIL: &str = "renew-until";

/// A source of "now", injected so tests can pin a fixed instant instead of
/// racing the system clock.
pub trait Clock {
    /// The instant this clock considers "now".
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always returns a fixed instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The durations an [`crate::OpenTokenCodec`] uses when stamping and checking
/// the temporal claims.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClaimPolicy {
    pub tolerance: Duration,
    pub lifetime: Duration,
    pub renewal: Duration,
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self {
            tolerance: Duration::seconds(120),
            lifetime: Duration::seconds(300),
            renewal: Duration::seconds(43_200),
        }
    }
}

/// Requires `subject`, then appends `not-before`, `not-on-or-after`, and
/// `renew-until` as RFC 3339 timestamps computed from `now`, in that order.
pub(crate) fn stamp(payload: Payload, policy: &ClaimPolicy, now: DateTime<Utc>) -> Result<Payload, OpenTokenError> {
    require_subject(&payload)?;
    let not_before = now;
    let not_on_or_after = now + policy.lifetime;
    let renew_until = now + policy.renewal;

    let mut stamped = payload;
    stamped.push(NOT_BEFORE, not_before.to_rfc3339());
    stamped.push(NOT_ON_OR_AFTER, not_on_or_after.to_rfc3339());
    stamped.push(RENEW_UNTIL, renew_until.to_rfc3339());
    Ok(stamped)
}

/// Validates the temporal claims of a decoded payload against `now` and
/// `policy.tolerance`. Returns the payload unchanged on success.
pub(crate) fn validate(payload: Payload, policy: &ClaimPolicy, now: DateTime<Utc>) -> Result<Payload, OpenTokenError> {
    require_subject(&payload)?;

    let not_before_raw = require_claim(&payload, NOT_BEFORE)?;
    let not_on_or_after_raw = require_claim(&payload, NOT_ON_OR_AFTER)?;
    let renew_until_raw = require_claim(&payload, RENEW_UNTIL)?;

    let not_before = parse_timestamp(NOT_BEFORE, not_before_raw)?;
    let not_on_or_after = parse_timestamp(NOT_ON_OR_AFTER, not_on_or_after_raw)?;
    let renew_until = parse_timestamp(RENEW_UNTIL, renew_until_raw)?;

    if not_before > not_on_or_after {
        return Err(OpenTokenError::BadClaim(
            "Logical error in 'not-before' and 'not-on-or-after'.".to_owned(),
        ));
    }

    let tolerance_bound = now + policy.tolerance;
    if not_before > now && not_before > tolerance_bound {
        return Err(OpenTokenError::BadClaim(format!(
            "Must not use this token before {not_before_raw}."
        )));
    }

    if now > not_on_or_after {
        return Err(OpenTokenError::BadClaim(format!(
            "This token has expired as of {not_on_or_after_raw}."
        )));
    }

    if now > renew_until {
        return Err(OpenTokenError::BadClaim(format!(
            "This token is past its renewal limit, {renew_until_raw}."
        )));
    }

    Ok(payload)
}

fn require_subject(payload: &Payload) -> Result<(), OpenTokenError> {
    if payload.get(SUBJECT).is_none() {
        return Err(OpenTokenError::BadArgument(
            "OpenToken missing 'subject'.".to_owned(),
        ));
    }
    Ok(())
}

fn require_claim<'a>(payload: &'a Payload, key: &str) -> Result<&'a str, OpenTokenError> {
    payload
        .get(key)
        .ok_or_else(|| OpenTokenError::BadArgument(format!("OpenToken missing '{key}'.")))
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, OpenTokenError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| OpenTokenError::BadClaim(format!("Invalid '{field}' timestamp {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn payload_with_subject() -> Payload {
        Payload::new([(SUBJECT.to_owned(), "alice".to_owned())])
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn stamp_appends_three_timestamps_in_order() {
        let policy = ClaimPolicy::default();
        let stamped = stamp(payload_with_subject(), &policy, now()).unwrap();
        let keys: Vec<_> = stamped.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["subject", "not-before", "not-on-or-after", "renew-until"]);
    }

    #[test]
    fn stamp_rejects_missing_subject() {
        let policy = ClaimPolicy::default();
        let err = stamp(Payload::default(), &policy, now()).unwrap_err();
        assert!(matches!(err, OpenTokenError::BadArgument(msg) if msg == "OpenToken missing 'subject'."));
    }

    #[test]
    fn validate_accepts_freshly_stamped_payload() {
        let policy = ClaimPolicy::default();
        let stamped = stamp(payload_with_subject(), &policy, now()).unwrap();
        let validated = validate(stamped, &policy, now()).unwrap();
        assert_eq!(validated.get(SUBJECT), Some("alice"));
    }

    #[test]
    fn validate_rejects_negative_lifetime() {
        let policy = ClaimPolicy {
            lifetime: Duration::seconds(-100),
            ..ClaimPolicy::default()
        };
        let stamped = stamp(payload_with_subject(), &policy, now()).unwrap();
        let err = validate(stamped, &policy, now()).unwrap_err();
        assert!(matches!(
            err,
            OpenTokenError::BadClaim(msg) if msg == "Logical error in 'not-before' and 'not-on-or-after'."
        ));
    }

    #[test]
    fn validate_rejects_expired_token() {
        let policy = ClaimPolicy {
            lifetime: Duration::seconds(0),
            ..ClaimPolicy::default()
        };
        let stamped = stamp(payload_with_subject(), &policy, now()).unwrap();
        let err = validate(stamped, &policy, now() + Duration::seconds(1)).unwrap_err();
        assert!(matches!(err, OpenTokenError::BadClaim(msg) if msg.starts_with("This token has expired as of")));
    }

    #[test]
    fn validate_rejects_past_renewal_limit() {
        let policy = ClaimPolicy {
            renewal: Duration::seconds(0),
            ..ClaimPolicy::default()
        };
        let stamped = stamp(payload_with_subject(), &policy, now()).unwrap();
        let err = validate(stamped, &policy, now() + Duration::seconds(1)).unwrap_err();
        assert!(matches!(
            err,
            OpenTokenError::BadClaim(msg) if msg.starts_with("This token is past its renewal limit,")
        ));
    }

    #[test]
    fn validate_rejects_not_before_beyond_tolerance() {
        let policy = ClaimPolicy {
            tolerance: Duration::seconds(10),
            ..ClaimPolicy::default()
        };
        let future = now() + Duration::seconds(3600);
        let stamped = stamp(payload_with_subject(), &policy, future).unwrap();
        let err = validate(stamped, &policy, now()).unwrap_err();
        assert!(matches!(err, OpenTokenError::BadClaim(msg) if msg.starts_with("Must not use this token before")));
    }

    #[test]
    fn validate_accepts_not_before_within_tolerance() {
        let policy = ClaimPolicy {
            tolerance: Duration::seconds(120),
            ..ClaimPolicy::default()
        };
        let soon = now() + Duration::seconds(60);
        let stamped = stamp(payload_with_subject(), &policy, soon).unwrap();
        assert!(validate(stamped, &policy, now()).is_ok());
    }

    #[test]
    fn validate_accepts_not_before_in_the_past() {
        let policy = ClaimPolicy {
            lifetime: Duration::seconds(20_000),
            ..ClaimPolicy::default()
        };
        let past = now() - Duration::seconds(10_000);
        let stamped = stamp(payload_with_subject(), &policy, past).unwrap();
        assert!(validate(stamped, &policy, now()).is_ok());
    }
}
