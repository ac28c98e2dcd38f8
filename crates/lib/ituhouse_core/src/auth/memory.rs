//! In-process [`AuthStore`] for tests and local experiments.
//!
//! One mutex guards all state, so every trait method is trivially atomic.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::store::AuthStore;
use super::{AuthError, roles};
use crate::models::auth::{NewUser, Role, User, VerificationCode};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    codes: Vec<VerificationCode>,
    next_code_id: i64,
}

impl Inner {
    fn insert_user(&mut self, user: NewUser) -> Result<User, AuthError> {
        if self
            .users
            .iter()
            .any(|u| u.email.to_lowercase() == user.email.to_lowercase())
        {
            return Err(AuthError::EmailTaken);
        }
        if self.users.iter().any(|u| u.username == user.username) {
            return Err(AuthError::UsernameTaken);
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            preferred_locale: user.preferred_locale,
            preferred_theme: user.preferred_theme,
            email_verified: user.email_verified,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.users.push(created.clone());
        Ok(created)
    }
}

/// Mutex-guarded store holding users and codes in memory.
#[derive(Default)]
pub struct MemoryAuthStore {
    inner: Mutex<Inner>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AuthError> {
        self.inner
            .lock()
            .map_err(|_| AuthError::Internal("memory store lock poisoned".into()))
    }

    /// Flip a user's `is_active` flag. Returns `false` if the user is unknown.
    pub fn set_active(&self, user_id: Uuid, active: bool) -> Result<bool, AuthError> {
        let mut inner = self.lock()?;
        match inner.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) => {
                user.is_active = active;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Snapshot of every stored code, oldest first.
    pub fn codes(&self) -> Result<Vec<VerificationCode>, AuthError> {
        Ok(self.lock()?.codes.clone())
    }

    /// Insert a code with explicit timestamps, bypassing the request flow.
    pub fn insert_code_at(
        &self,
        email: &str,
        code: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationCode, AuthError> {
        let mut inner = self.lock()?;
        inner.next_code_id += 1;
        let record = VerificationCode {
            id: inner.next_code_id,
            email: email.to_string(),
            code: code.to_string(),
            expires_at,
            used: false,
            created_at,
        };
        inner.codes.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn ping(&self) -> Result<(), AuthError> {
        self.lock().map(|_| ())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.lock()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>, AuthError> {
        let inner = self.lock()?;
        let lowered = identifier.to_lowercase();
        let by_email = inner
            .users
            .iter()
            .find(|u| u.email.to_lowercase() == lowered);
        let found = by_email.or_else(|| inner.users.iter().find(|u| u.username == identifier));
        Ok(found.cloned())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
        let lowered = email.to_lowercase();
        Ok(self
            .lock()?
            .users
            .iter()
            .any(|u| u.email.to_lowercase() == lowered))
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError> {
        Ok(self.lock()?.users.iter().any(|u| u.username == username))
    }

    async fn insert_code(
        &self,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationCode, AuthError> {
        self.insert_code_at(email, code, Utc::now(), expires_at)
    }

    async fn find_redeemable_code(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCode>, AuthError> {
        let inner = self.lock()?;
        let newest = inner
            .codes
            .iter()
            .filter(|c| c.is_redeemable(email, code, now))
            .max_by_key(|c| (c.created_at, c.id));
        Ok(newest.cloned())
    }

    async fn register_with_code(&self, code_id: i64, user: NewUser) -> Result<User, AuthError> {
        let now = Utc::now();
        let mut inner = self.lock()?;
        let idx = inner
            .codes
            .iter()
            .position(|c| c.id == code_id && !c.used && c.expires_at > now)
            .ok_or(AuthError::InvalidOrExpiredCode)?;
        let created = inner.insert_user(user)?;
        inner.codes[idx].used = true;
        Ok(created)
    }

    async fn update_role(&self, user_id: Uuid, role: Role) -> Result<User, AuthError> {
        let mut inner = self.lock()?;
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
        roles::check_role_change(user.role, role)?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn ensure_superadmin(&self, seed: NewUser) -> Result<bool, AuthError> {
        let mut inner = self.lock()?;
        if inner.users.iter().any(|u| u.role == Role::SuperAdmin) {
            return Ok(false);
        }
        inner.insert_user(seed)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "$2b$04$placeholder".into(),
            role: Role::User,
            preferred_locale: "zh-CN".into(),
            preferred_theme: "system".into(),
            email_verified: true,
        }
    }

    #[tokio::test]
    async fn register_consumes_code_once() {
        let store = MemoryAuthStore::new();
        let code = store
            .insert_code("a@b.com", "123456", Utc::now() + Duration::minutes(15))
            .await
            .unwrap();

        let user = store
            .register_with_code(code.id, new_user("alice", "a@b.com"))
            .await
            .unwrap();
        assert_eq!(user.role, Role::User);
        assert!(store.codes().unwrap()[0].used);

        let again = store
            .register_with_code(code.id, new_user("alice2", "a2@b.com"))
            .await;
        assert!(matches!(again, Err(AuthError::InvalidOrExpiredCode)));
    }

    #[tokio::test]
    async fn failed_insert_leaves_code_unused() {
        let store = MemoryAuthStore::new();
        let expires = Utc::now() + Duration::minutes(15);
        let first = store.insert_code("a@b.com", "111111", expires).await.unwrap();
        store
            .register_with_code(first.id, new_user("alice", "a@b.com"))
            .await
            .unwrap();

        let second = store.insert_code("c@d.com", "222222", expires).await.unwrap();
        let dup = store
            .register_with_code(second.id, new_user("alice", "c@d.com"))
            .await;
        assert!(matches!(dup, Err(AuthError::UsernameTaken)));
        assert!(!store.codes().unwrap()[1].used);
        assert!(!store.email_exists("c@d.com").await.unwrap());
    }

    #[tokio::test]
    async fn code_expiring_before_claim_is_not_consumed() {
        let store = MemoryAuthStore::new();
        let now = Utc::now();
        let code = store
            .insert_code_at("a@b.com", "123456", now - Duration::minutes(15), now - Duration::seconds(1))
            .unwrap();
        let result = store
            .register_with_code(code.id, new_user("alice", "a@b.com"))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidOrExpiredCode)));
        assert!(!store.codes().unwrap()[0].used);
        assert!(!store.username_exists("alice").await.unwrap());
    }

    #[tokio::test]
    async fn newest_redeemable_code_wins() {
        let store = MemoryAuthStore::new();
        let now = Utc::now();
        let expires = now + Duration::minutes(15);
        store
            .insert_code_at("a@b.com", "123456", now - Duration::minutes(2), expires)
            .unwrap();
        let newer = store
            .insert_code_at("a@b.com", "123456", now - Duration::minutes(1), expires)
            .unwrap();

        let found = store
            .find_redeemable_code("a@b.com", "123456", now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, newer.id);
    }

    #[tokio::test]
    async fn expired_code_is_not_found() {
        let store = MemoryAuthStore::new();
        let now = Utc::now();
        store
            .insert_code_at("a@b.com", "123456", now - Duration::minutes(16), now)
            .unwrap();
        let found = store
            .find_redeemable_code("a@b.com", "123456", now)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn identifier_matches_email_case_insensitively_and_username_exactly() {
        let store = MemoryAuthStore::new();
        let code = store
            .insert_code("a@b.com", "123456", Utc::now() + Duration::minutes(15))
            .await
            .unwrap();
        store
            .register_with_code(code.id, new_user("Alice", "a@b.com"))
            .await
            .unwrap();

        assert!(store.find_user_by_identifier("A@B.COM").await.unwrap().is_some());
        assert!(store.find_user_by_identifier("Alice").await.unwrap().is_some());
        assert!(store.find_user_by_identifier("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn superadmin_seed_is_idempotent_and_undemotable() {
        let store = MemoryAuthStore::new();
        let mut seed = new_user("root", "root@b.com");
        seed.role = Role::SuperAdmin;
        assert!(store.ensure_superadmin(seed.clone()).await.unwrap());
        assert!(!store.ensure_superadmin(seed).await.unwrap());

        let root = store
            .find_user_by_identifier("root")
            .await
            .unwrap()
            .unwrap();
        let demote = store.update_role(root.id, Role::Admin).await;
        assert!(matches!(demote, Err(AuthError::SuperadminDemotion)));
        let unchanged = store.find_user_by_id(root.id).await.unwrap().unwrap();
        assert_eq!(unchanged.role, Role::SuperAdmin);
    }

    #[tokio::test]
    async fn update_role_on_unknown_user_is_not_found() {
        let store = MemoryAuthStore::new();
        let result = store.update_role(Uuid::new_v4(), Role::Admin).await;
        assert!(matches!(result, Err(AuthError::NotFound(_))));
    }
}
