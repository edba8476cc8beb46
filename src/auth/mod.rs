//! Authentication and role-scoped authorization.
//!
//! Tokens are signed JWTs tracked in an in-process registry: a token is
//! usable only while the registry holds it. Logout removes it, permanently.
//!
//! # Roles
//!
//! - `Diner` - default for self-registered users
//! - `Franchisee` - scoped to one franchise via `objectId`
//! - `Admin` - platform-wide

pub mod authority;
pub mod password;
pub mod token;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{FranchiseId, StoreError, UserId};

pub use authority::{Session, SessionAuthority};
pub use token::TokenAuthority;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Malformed, badly signed, unknown or revoked token.
    #[error("invalid token")]
    InvalidToken,

    #[error("unauthorized")]
    Unauthorized,

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, AuthError>;

// ─── Roles ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Diner,
    Franchisee,
    Admin,
}

/// A role, optionally bound to the resource it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleGrant {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<FranchiseId>,
}

impl RoleGrant {
    pub fn global(role: Role) -> Self {
        Self {
            role,
            object_id: None,
        }
    }

    pub fn franchisee(franchise_id: FranchiseId) -> Self {
        Self {
            role: Role::Franchisee,
            object_id: Some(franchise_id),
        }
    }
}

// ─── Principal / capabilities ────────────────────────────────────

/// Identity derived from a valid, non-revoked token.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub roles: Vec<RoleGrant>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|g| g.role == Role::Admin)
    }

    pub fn is_franchisee_of(&self, franchise_id: FranchiseId) -> bool {
        self.roles
            .iter()
            .any(|g| g.role == Role::Franchisee && g.object_id == Some(franchise_id))
    }
}

/// What a request needs from its principal.
#[derive(Debug, Clone)]
pub enum Capability {
    /// Any valid token.
    Authenticated,
    /// Platform admin.
    Admin,
    /// The user themselves, or an admin.
    SelfOrAdmin(UserId),
    /// Admin, a franchisee bound to the franchise, or one of its listed admins.
    ManageFranchise {
        franchise_id: FranchiseId,
        admin_emails: Vec<String>,
    },
}

impl Capability {
    pub fn permits(&self, p: &Principal) -> bool {
        match self {
            Self::Authenticated => true,
            Self::Admin => p.is_admin(),
            Self::SelfOrAdmin(user_id) => p.user_id == *user_id || p.is_admin(),
            Self::ManageFranchise {
                franchise_id,
                admin_emails,
            } => {
                p.is_admin()
                    || p.is_franchisee_of(*franchise_id)
                    || admin_emails.iter().any(|e| e.eq_ignore_ascii_case(&p.email))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(roles: Vec<RoleGrant>) -> Principal {
        Principal {
            user_id: 7,
            name: "pizza diner".into(),
            email: "d@jwt.com".into(),
            roles,
        }
    }

    fn manage(franchise_id: FranchiseId, admin_emails: &[&str]) -> Capability {
        Capability::ManageFranchise {
            franchise_id,
            admin_emails: admin_emails.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn role_grants_serialize_like_the_api() {
        let json = serde_json::to_string(&RoleGrant::global(Role::Diner)).unwrap();
        assert_eq!(json, r#"{"role":"diner"}"#);

        let json = serde_json::to_string(&RoleGrant::franchisee(3)).unwrap();
        assert_eq!(json, r#"{"role":"franchisee","objectId":3}"#);

        let back: RoleGrant = serde_json::from_str(r#"{"role":"admin"}"#).unwrap();
        assert_eq!(back, RoleGrant::global(Role::Admin));
    }

    #[test]
    fn scoped_capability_requires_matching_franchise() {
        let diner = principal(vec![RoleGrant::global(Role::Diner)]);
        let owner = principal(vec![RoleGrant::franchisee(1)]);
        let other = principal(vec![RoleGrant::franchisee(2)]);
        let admin = principal(vec![RoleGrant::global(Role::Admin)]);

        let cap = manage(1, &[]);
        assert!(!cap.permits(&diner));
        assert!(cap.permits(&owner));
        assert!(!cap.permits(&other));
        assert!(cap.permits(&admin));
    }

    #[test]
    fn listed_admin_email_satisfies_scoped_capability() {
        let diner = principal(vec![RoleGrant::global(Role::Diner)]);
        assert!(manage(9, &["D@JWT.com"]).permits(&diner));
        assert!(!manage(9, &["x@jwt.com"]).permits(&diner));
    }

    #[test]
    fn global_and_self_capabilities() {
        let diner = principal(vec![RoleGrant::global(Role::Diner)]);
        let admin = principal(vec![RoleGrant::global(Role::Admin)]);

        assert!(Capability::Authenticated.permits(&diner));
        assert!(!Capability::Admin.permits(&diner));
        assert!(Capability::Admin.permits(&admin));
        assert!(Capability::SelfOrAdmin(7).permits(&diner));
        assert!(!Capability::SelfOrAdmin(8).permits(&diner));
        assert!(Capability::SelfOrAdmin(8).permits(&admin));
    }
}
