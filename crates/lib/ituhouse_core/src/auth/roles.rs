//! Role gate.
//!
//! Four flat roles plus one hard-coded bypass: `SuperAdmin` passes every
//! check regardless of the allowed set.

use super::AuthError;
use crate::models::auth::Role;

/// Pass if `role` is in `allowed` or is `SuperAdmin`.
pub fn authorize(role: Role, allowed: &[Role]) -> Result<(), AuthError> {
    if role == Role::SuperAdmin || allowed.contains(&role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Reject any change that would take `SuperAdmin` away from a super admin.
///
/// Stores call this inside the role-update transaction, after locking the row.
pub fn check_role_change(current: Role, requested: Role) -> Result<(), AuthError> {
    if current == Role::SuperAdmin && requested != Role::SuperAdmin {
        return Err(AuthError::SuperadminDemotion);
    }
    Ok(())
}
