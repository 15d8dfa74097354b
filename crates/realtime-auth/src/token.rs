//! JWT expiry extraction.
//!
//! The session never verifies token signatures; it only reads the `exp`
//! claim out of the payload segment to schedule proactive refresh. The
//! server remains the authority on token validity.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::error::AuthError;
use crate::Result;

/// Decode the `exp` claim (Unix epoch seconds) of a JWT into a [`SystemTime`].
pub fn jwt_expiry(token: &str) -> Result<SystemTime> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or(AuthError::MalformedToken)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|_| AuthError::TokenPayload)?;
    let exp = claims
        .get("exp")
        .and_then(serde_json::Value::as_f64)
        .ok_or(AuthError::MissingExpiry)?;
    // A claim outside the Duration range (negative, non-finite, or
    // absurdly large) is treated the same as a missing one.
    let offset = Duration::try_from_secs_f64(exp).map_err(|_| AuthError::MissingExpiry)?;
    Ok(UNIX_EPOCH + offset)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn token_with_payload(payload: serde_json::Value) -> String {
        format!(
            "eyJhbGciOiJIUzI1NiJ9.{}.c2ln",
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }

    #[test]
    fn test_expiry_decodes() {
        let token = token_with_payload(json!({"sub": "doc", "exp": 1_700_000_000}));
        let expiry = jwt_expiry(&token).unwrap();
        assert_eq!(expiry, UNIX_EPOCH + Duration::from_secs(1_700_000_000));
    }

    #[test]
    fn test_not_a_jwt() {
        assert!(matches!(
            jwt_expiry("not-a-token"),
            Err(AuthError::MalformedToken)
        ));
    }

    #[test]
    fn test_payload_not_json() {
        let token = format!("h.{}.s", URL_SAFE_NO_PAD.encode("garbage"));
        assert!(matches!(jwt_expiry(&token), Err(AuthError::TokenPayload)));
    }

    #[test]
    fn test_missing_exp_claim() {
        let token = token_with_payload(json!({"sub": "doc"}));
        assert!(matches!(jwt_expiry(&token), Err(AuthError::MissingExpiry)));
    }

    #[test]
    fn test_out_of_range_exp_claim() {
        for exp in [json!(-1), json!(1e300)] {
            let token = token_with_payload(json!({"sub": "doc", "exp": exp}));
            assert!(matches!(jwt_expiry(&token), Err(AuthError::MissingExpiry)));
        }
    }
}
