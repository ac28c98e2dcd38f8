//! JWT access token issuance and verification (HS256).

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{info, warn};
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{Role, TokenClaims};

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Signs and verifies access tokens with a process-wide shared secret.
///
/// Rotating the secret invalidates every outstanding token.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a token for `subject` carrying `role`, expiring `ttl` from now.
    pub fn issue(&self, subject: Uuid, role: Role, ttl: Duration) -> Result<String, AuthError> {
        let claims = TokenClaims {
            sub: subject.to_string(),
            exp: (Utc::now() + ttl).timestamp(),
            role,
        };
        encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify signature, algorithm and expiry, returning the claims.
    ///
    /// Malformed tokens, bad signatures, expired tokens and tokens missing
    /// `sub`, `exp` or `role` all fail with [`AuthError::InvalidToken`].
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

/// Resolve the JWT secret: configured value → persisted file → freshly generated.
///
/// In production the secret must be configured. Elsewhere a random secret is
/// generated once and persisted under the platform data directory.
pub fn resolve_jwt_secret(configured: Option<&str>, production: bool) -> Result<String, AuthError> {
    if let Some(secret) = configured
        && !secret.is_empty()
    {
        return Ok(secret.to_string());
    }
    if production {
        return Err(AuthError::Validation(
            "JWT_SECRET_KEY must be set in production".into(),
        ));
    }

    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(error = %e, "could not create JWT secret directory");
    }
    match std::fs::write(&secret_path, &secret) {
        Ok(()) => info!(path = %secret_path.display(), "generated new JWT secret"),
        Err(e) => warn!(error = %e, "generated JWT secret could not be persisted"),
    }
    Ok(secret)
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ituhouse")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"test-secret")
    }

    #[test]
    fn round_trip_keeps_subject_and_role() {
        let id = Uuid::new_v4();
        let token = codec().issue(id, Role::Admin, Duration::minutes(5)).unwrap();
        let claims = codec().verify(&token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = codec()
            .issue(Uuid::new_v4(), Role::User, Duration::seconds(-5))
            .unwrap();
        assert!(matches!(
            codec().verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = codec()
            .issue(Uuid::new_v4(), Role::User, Duration::minutes(5))
            .unwrap();
        let other = TokenCodec::new(b"another-secret");
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let forged = codec()
            .issue(Uuid::new_v4(), Role::SuperAdmin, Duration::minutes(5))
            .unwrap();
        let token = codec()
            .issue(Uuid::new_v4(), Role::User, Duration::minutes(5))
            .unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = forged.split('.').nth(1).unwrap();
        assert!(codec().verify(&parts.join(".")).is_err());
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(codec().verify("not.a.jwt").is_err());
        assert!(codec().verify("").is_err());
    }

    #[test]
    fn missing_role_claim_is_rejected() {
        #[derive(serde::Serialize)]
        struct Partial {
            sub: String,
            exp: i64,
        }
        let claims = Partial {
            sub: Uuid::new_v4().to_string(),
            exp: (Utc::now() + Duration::minutes(5)).timestamp(),
        };
        let token = encode(
            &Header::new(ALGORITHM),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(codec().verify(&token).is_err());
    }

    #[test]
    fn configured_secret_wins() {
        assert_eq!(resolve_jwt_secret(Some("s3cret"), true).unwrap(), "s3cret");
    }

    #[test]
    fn production_requires_configured_secret() {
        assert!(matches!(
            resolve_jwt_secret(None, true),
            Err(AuthError::Validation(_))
        ));
        assert!(resolve_jwt_secret(Some(""), true).is_err());
    }

    #[test]
    fn other_algorithm_is_rejected() {
        let claims = TokenClaims {
            sub: Uuid::new_v4().to_string(),
            exp: (Utc::now() + Duration::minutes(5)).timestamp(),
            role: Role::User,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(codec().verify(&token).is_err());
    }
}
