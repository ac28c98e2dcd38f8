//! Email verification codes gating registration.
//!
//! Per email: `no-code` → `code-issued` on request, → `code-used` when a
//! registration consumes it. Codes are never deleted.

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, rng};

use super::AuthError;
use crate::models::auth::VerificationCode;

/// Digits in a verification code.
pub const CODE_LENGTH: usize = 6;

/// Absolute lifetime of a freshly issued code, in minutes.
pub const CODE_TTL_MINUTES: i64 = 15;

/// Absolute lifetime of a freshly issued code.
pub fn code_ttl() -> Duration {
    Duration::minutes(CODE_TTL_MINUTES)
}

/// Generate a code of [`CODE_LENGTH`] independently uniform digits.
///
/// `rand::rng()` is a CSPRNG seeded from the operating system.
pub fn generate_code() -> String {
    let mut rng = rng();
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Lower-case and trim an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shallow shape check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let invalid = || AuthError::Validation("email: not a valid email address".into());
    if email.len() > 255 || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(invalid());
    }
    Ok(())
}

/// A submitted code must be exactly [`CODE_LENGTH`] ASCII digits.
pub fn validate_code_format(code: &str) -> Result<(), AuthError> {
    if code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AuthError::Validation(format!(
            "verification_code: must be {CODE_LENGTH} digits"
        )))
    }
}

impl VerificationCode {
    /// Whether this record may satisfy a registration for `email`/`code` at `now`.
    ///
    /// A code expires at its `expires_at` instant: `now == expires_at` rejects.
    pub fn is_redeemable(&self, email: &str, code: &str, now: DateTime<Utc>) -> bool {
        !self.used && now < self.expires_at && self.email == email && self.code == code
    }
}
