//! Access policy: `(actor, resource) -> allow | deny`.
//!
//! Handlers describe what they are about to expose as a [`Resource`] and ask
//! [`require`]; nothing else inspects roles directly.

use crate::errors::AppError;
use crate::models::user::Role;

/// The authenticated caller as the policy sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    /// A calculation saved by a signed-in user.
    AuthenticatedCalculation { owner_id: Option<i64> },
    /// An anonymous calculation identified by its contact email.
    DetailedCalculation { email: &'a str },
    /// Partial calculator progress.
    SessionCalculation,
    /// Cross-user listings and status changes.
    AdminArea,
}

pub fn allows(actor: &Actor, resource: Resource<'_>) -> bool {
    if actor.is_admin() {
        return true;
    }
    match resource {
        Resource::AuthenticatedCalculation { owner_id } => owner_id == Some(actor.user_id),
        Resource::DetailedCalculation { email } => email.eq_ignore_ascii_case(&actor.email),
        Resource::SessionCalculation | Resource::AdminArea => false,
    }
}

pub fn require(actor: &Actor, resource: Resource<'_>) -> Result<(), AppError> {
    if allows(actor, resource) {
        Ok(())
    } else {
        Err(AppError::Forbidden(denial_message(resource).to_string()))
    }
}

fn denial_message(resource: Resource<'_>) -> &'static str {
    match resource {
        Resource::AdminArea => "Admin access required",
        _ => "You do not have permission to view this calculation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor {
            user_id: 7,
            email: "owner@example.com".into(),
            role,
        }
    }

    #[test]
    fn test_owner_sees_own_authenticated_calculation() {
        let user = actor(Role::User);
        assert!(allows(&user, Resource::AuthenticatedCalculation { owner_id: Some(7) }));
        assert!(!allows(&user, Resource::AuthenticatedCalculation { owner_id: Some(8) }));
        assert!(!allows(&user, Resource::AuthenticatedCalculation { owner_id: None }));
    }

    #[test]
    fn test_detailed_calculation_matches_email() {
        let user = actor(Role::User);
        assert!(allows(&user, Resource::DetailedCalculation { email: "Owner@Example.com" }));
        assert!(!allows(&user, Resource::DetailedCalculation { email: "other@example.com" }));
    }

    #[test]
    fn test_sessions_and_admin_area_are_admin_only() {
        for role in [Role::User, Role::Agent] {
            let a = actor(role);
            assert!(!allows(&a, Resource::SessionCalculation));
            assert!(!allows(&a, Resource::AdminArea));
        }
        let admin = actor(Role::Admin);
        assert!(allows(&admin, Resource::SessionCalculation));
        assert!(allows(&admin, Resource::AdminArea));
        assert!(allows(&admin, Resource::AuthenticatedCalculation { owner_id: Some(99) }));
    }

    #[test]
    fn test_require_maps_denial_to_forbidden() {
        let err = require(&actor(Role::Agent), Resource::AdminArea).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
