//! Stripe webhook signature verification.
//!
//! Implements Stripe's scheme:
//! <https://docs.stripe.com/webhooks#verify-manually>
//!
//! The `Stripe-Signature` header looks like `t=1700000000,v1=abc...,v1=def...`.
//! The signed payload is `"{t}.{raw body}"`, HMAC-SHA256 with the endpoint
//! secret, hex encoded. Any `v1` entry may match (secret rotation sends two).

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use super::types::Event;

/// Largest accepted distance between the signed timestamp and now, in seconds.
pub const TOLERANCE_SECS: i64 = 300;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Errors from webhook verification.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing signature header")]
    MissingHeader,
    #[error("Malformed signature header: {0}")]
    MalformedHeader(&'static str),
    #[error("Timestamp outside the tolerance window")]
    TimestampOutOfTolerance,
    #[error("No signature matched")]
    SignatureMismatch,
    #[error("Invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Verifies webhook deliveries for one endpoint secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl WebhookVerifier {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verify the signature header against the raw body and parse the event.
    ///
    /// # Errors
    ///
    /// Returns error if the header is malformed, the timestamp is outside
    /// [`TOLERANCE_SECS`], no signature matches, or the body is not an event.
    pub fn construct_event(&self, payload: &[u8], header: &str) -> Result<Event, WebhookError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())?;
        Ok(serde_json::from_slice(payload)?)
    }

    /// Verify the signature as of `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// See [`Self::construct_event`].
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), WebhookError> {
        let (timestamp, signatures) = parse_header(header)?;

        if now.abs_diff(timestamp) > TOLERANCE_SECS.unsigned_abs() {
            return Err(WebhookError::TimestampOutOfTolerance);
        }

        let expected = self.sign(timestamp, payload)?;

        if !signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate))
        {
            return Err(WebhookError::SignatureMismatch);
        }

        debug!("Stripe signature verified");
        Ok(())
    }

    fn sign(&self, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::MalformedHeader("unusable signing secret"))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Split the header into its timestamp and `v1` signatures.
fn parse_header(header: &str) -> Result<(i64, Vec<&str>), WebhookError> {
    if header.trim().is_empty() {
        return Err(WebhookError::MissingHeader);
    }

    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| WebhookError::MalformedHeader("invalid timestamp"))?,
                );
            }
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader("missing timestamp"))?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader("missing v1 signature"));
    }

    Ok((timestamp, signatures))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const PAYLOAD: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{}}}"#;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SecretString::from(SECRET))
    }

    fn signature(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature() {
        let now = 1_767_225_600;
        let header = format!("t={now},v1={}", signature(PAYLOAD, SECRET, now));
        assert!(verifier().verify_at(PAYLOAD, &header, now).is_ok());
    }

    #[test]
    fn test_any_v1_may_match() {
        let now = 1_767_225_600;
        let header = format!(
            "t={now},v1={},v1={},v0=legacy",
            signature(PAYLOAD, "whsec_rotated_out", now),
            signature(PAYLOAD, SECRET, now)
        );
        assert!(verifier().verify_at(PAYLOAD, &header, now).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = 1_767_225_600;
        let header = format!("t={now},v1={}", signature(PAYLOAD, "wrong_secret", now));
        assert!(matches!(
            verifier().verify_at(PAYLOAD, &header, now),
            Err(WebhookError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_modified_payload_rejected() {
        let now = 1_767_225_600;
        let header = format!("t={now},v1={}", signature(PAYLOAD, SECRET, now));
        let result = verifier().verify_at(b"{\"hacked\":true}", &header, now);
        assert!(matches!(result, Err(WebhookError::SignatureMismatch)));
    }

    #[test]
    fn test_old_timestamp_rejected() {
        let signed_at = 1_767_225_600;
        let header = format!("t={signed_at},v1={}", signature(PAYLOAD, SECRET, signed_at));

        assert!(
            verifier()
                .verify_at(PAYLOAD, &header, signed_at + TOLERANCE_SECS)
                .is_ok()
        );
        assert!(matches!(
            verifier().verify_at(PAYLOAD, &header, signed_at + TOLERANCE_SECS + 1),
            Err(WebhookError::TimestampOutOfTolerance)
        ));
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        let now = 1_767_225_600;
        for timestamp in [i64::MIN, i64::MAX, -1] {
            let header = format!("t={timestamp},v1=00");
            assert!(matches!(
                verifier().verify_at(PAYLOAD, &header, now),
                Err(WebhookError::TimestampOutOfTolerance)
            ));
        }
    }

    #[test]
    fn test_malformed_headers() {
        let v = verifier();
        assert!(matches!(
            v.verify_at(PAYLOAD, "", 0),
            Err(WebhookError::MissingHeader)
        ));
        assert!(matches!(
            v.verify_at(PAYLOAD, "v1=somesignature", 0),
            Err(WebhookError::MalformedHeader(_))
        ));
        assert!(matches!(
            v.verify_at(PAYLOAD, "t=1234567890", 0),
            Err(WebhookError::MalformedHeader(_))
        ));
        assert!(matches!(
            v.verify_at(PAYLOAD, "t=soon,v1=abc", 0),
            Err(WebhookError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_construct_event_parses_type() {
        let now = chrono::Utc::now().timestamp();
        let header = format!("t={now},v1={}", signature(PAYLOAD, SECRET, now));

        let event = verifier().construct_event(PAYLOAD, &header).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");
        assert_eq!(event.id, "evt_1");
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }
}
