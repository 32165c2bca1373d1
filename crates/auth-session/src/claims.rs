//! Access token claims.
//!
//! The payload segment is decoded WITHOUT verifying the signature. The
//! resulting user is a display cache; authorization decisions belong to the
//! server.

use crate::types::{null_as_empty, string_or_number, User};
use crate::{AuthError, AuthResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct AccessClaims {
    #[serde(deserialize_with = "string_or_number")]
    user_id: String,
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    first_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    last_name: String,
}

/// Decode the user embedded in a compact JWS access token.
pub fn decode_unverified_claims(token: &str) -> AuthResult<User> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
        _ => {
            return Err(AuthError::MalformedResponse(
                "access token is not a three-segment JWS".to_string(),
            ))
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::MalformedResponse(format!("access token payload: {}", e)))?;

    let claims: AccessClaims = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedResponse(format!("access token claims: {}", e)))?;

    Ok(User {
        id: claims.user_id,
        username: claims.username,
        email: claims.email,
        first_name: claims.first_name,
        last_name: claims.last_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE;
    use serde_json::json;

    fn token_with_payload(payload: &serde_json::Value) -> String {
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }

    #[test]
    fn test_decode_full_claims() {
        let token = token_with_payload(&json!({
            "user_id": 42,
            "username": "alice",
            "email": "alice@example.com",
            "first_name": "Alice",
            "last_name": "Liddell",
            "exp": 1_900_000_000
        }));

        let user = decode_unverified_claims(&token).unwrap();
        assert_eq!(user.id, "42");
        assert_eq!(user.username, "alice");
        assert_eq!(user.last_name, "Liddell");
    }

    #[test]
    fn test_optional_names_default_to_empty() {
        let token = token_with_payload(&json!({
            "user_id": "u-1",
            "username": "bob",
            "email": "bob@example.com"
        }));

        let user = decode_unverified_claims(&token).unwrap();
        assert_eq!(user.id, "u-1");
        assert_eq!(user.first_name, "");
        assert_eq!(user.last_name, "");
    }

    #[test]
    fn test_padded_payload_is_tolerated() {
        let payload = json!({"user_id": 1, "username": "a", "email": "a@b.c"}).to_string();
        let token = format!("h.{}.s", URL_SAFE.encode(payload));
        assert_eq!(decode_unverified_claims(&token).unwrap().id, "1");
    }

    #[test]
    fn test_rejects_non_jws() {
        for token in ["", "opaque-token", "a.b", "a..c", "a.b.c.d"] {
            assert!(
                matches!(
                    decode_unverified_claims(token),
                    Err(AuthError::MalformedResponse(_))
                ),
                "{token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_missing_user_id() {
        let token = token_with_payload(&json!({"username": "alice"}));
        assert!(matches!(
            decode_unverified_claims(&token),
            Err(AuthError::MalformedResponse(_))
        ));
    }
}
