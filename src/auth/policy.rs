//! Authorization predicates shared by handlers.

use crate::auth::claims::{Claims, Role};

/// Admins may modify any task; users only the tasks they own.
pub fn can_modify(claims: &Claims, owner_id: i64) -> bool {
    claims.is_admin() || claims.user_id == owner_id
}

/// Self-registration as admin is only possible when explicitly enabled.
pub fn can_register_as(role: Role, allow_admin_registration: bool) -> bool {
    match role {
        Role::User => true,
        Role::Admin => allow_admin_registration,
    }
}
