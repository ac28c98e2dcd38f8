//! First-boot seeding.

use tracing::info;

use crate::auth::password::hash_password;
use crate::auth::verification::normalize_email;
use crate::auth::{AuthError, AuthStore};
use crate::models::auth::{NewUser, Role};

/// Credentials and defaults for the initial super admin.
#[derive(Clone)]
pub struct SuperadminSeed {
    pub email: String,
    pub username: String,
    pub password: String,
    pub locale: String,
    pub theme: String,
}

impl std::fmt::Debug for SuperadminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuperadminSeed")
            .field("email", &self.email)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Make sure a super admin exists. Returns whether one was created.
pub async fn ensure_superadmin(
    store: &dyn AuthStore,
    seed: &SuperadminSeed,
    bcrypt_cost: u32,
) -> Result<bool, AuthError> {
    let email = normalize_email(&seed.email);
    if seed.username.trim().is_empty() || email.is_empty() || seed.password.is_empty() {
        return Err(AuthError::Validation(
            "super admin email, username and password are required".into(),
        ));
    }

    let user = NewUser {
        username: seed.username.trim().to_string(),
        email,
        password_hash: hash_password(&seed.password, bcrypt_cost)?,
        role: Role::SuperAdmin,
        preferred_locale: seed.locale.clone(),
        preferred_theme: seed.theme.clone(),
        email_verified: true,
    };
    let created = store.ensure_superadmin(user).await?;
    if created {
        info!(username = %seed.username, "seeded super admin");
    }
    Ok(created)
}
