//! HS256 JSON Web Tokens.
//!
//! Token format: `base64url(header).base64url(claims).base64url(signature)`,
//! unpadded, where the signature is HMAC-SHA256 over the first two segments.
//! Only `alg: HS256` is accepted; `none` and asymmetric algorithms are
//! rejected before the signature is checked.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

/// Which audience a token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Customer,
    Staff,
}

/// Registered and private claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id (hex ObjectId or string id).
    pub sub: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Not-before, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Errors produced while signing or verifying a token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Not three dot-separated base64url segments of valid JSON.
    #[error("malformed token")]
    Malformed,

    /// The header names an algorithm other than HS256.
    #[error("unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The signature does not match the secret.
    #[error("invalid token signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    /// The signing key was rejected by the MAC implementation.
    #[error("invalid signing key")]
    InvalidKey,
}

/// Sign `claims` with `secret`. Tokens are issued by the account service;
/// this side only needs it to mint fixtures.
#[cfg(test)]
pub(crate) fn sign(claims: &Claims, secret: &[u8]) -> String {
    let header = Header {
        alg: ALGORITHM.to_owned(),
        typ: Some("JWT".to_owned()),
    };
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap()),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap()),
    );
    let mut mac = new_mac(secret).unwrap();
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature))
}

/// Verify `token` against `secret` and return its claims.
///
/// `now` is the current time in seconds since the epoch. A token is expired
/// once `now >= exp`.
///
/// # Errors
///
/// Returns a [`TokenError`] describing the first check that failed.
pub fn verify(token: &str, secret: &[u8], now: i64) -> Result<Claims, TokenError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let header: Header = decode_json(header_b64)?;
    if header.alg != ALGORITHM {
        return Err(TokenError::UnsupportedAlgorithm(header.alg));
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| TokenError::Malformed)?;
    let mut mac = new_mac(secret)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    let claims: Claims = decode_json(claims_b64)?;
    if now >= claims.exp {
        return Err(TokenError::Expired);
    }
    if claims.nbf.is_some_and(|nbf| nbf > now) {
        return Err(TokenError::NotYetValid);
    }
    Ok(claims)
}

fn decode_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

fn new_mac(secret: &[u8]) -> Result<HmacSha256, TokenError> {
    <HmacSha256 as Mac>::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const NOW: i64 = 1_700_000_000;

    fn claims() -> Claims {
        Claims {
            sub: "64b7f0c2a1b2c3d4e5f60718".into(),
            token_type: TokenType::Customer,
            iat: NOW - 60,
            exp: NOW + 3600,
            nbf: None,
        }
    }

    #[test]
    fn signed_token_verifies() {
        let token = sign(&claims(), SECRET);
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(verify(&token, SECRET, NOW).unwrap(), claims());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign(&claims(), SECRET);
        let err = verify(&token, b"another-secret-another-secret-xx", NOW).unwrap_err();
        assert_eq!(err, TokenError::BadSignature);
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let token = sign(&claims(), SECRET);
        let mut forged = claims();
        forged.sub = "someone-else".into();
        let forged_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let parts: Vec<&str> = token.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], forged_b64, parts[2]);
        assert_eq!(verify(&tampered, SECRET, NOW).unwrap_err(), TokenError::BadSignature);
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let token = sign(&claims(), SECRET);
        let exp = claims().exp;
        assert!(verify(&token, SECRET, exp - 1).is_ok());
        assert_eq!(verify(&token, SECRET, exp).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn not_before_in_future_is_rejected() {
        let mut c = claims();
        c.nbf = Some(NOW + 10);
        let token = sign(&c, SECRET);
        assert_eq!(verify(&token, SECRET, NOW).unwrap_err(), TokenError::NotYetValid);
    }

    #[test]
    fn alg_none_is_rejected() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims()).unwrap());
        let token = format!("{header}.{body}.");
        assert_eq!(
            verify(&token, SECRET, NOW).unwrap_err(),
            TokenError::UnsupportedAlgorithm("none".into())
        );
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert_eq!(verify(token, SECRET, NOW).unwrap_err(), TokenError::Malformed, "{token}");
        }
    }

    #[test]
    fn token_type_serialises_as_claim_type() {
        let json = serde_json::to_value(claims()).unwrap();
        assert_eq!(json["type"], "customer");
        assert!(json.get("nbf").is_none());
    }
}
