use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{AuthError, Capability, Principal, Result, TokenAuthority};
use crate::metrics::{AuthOutcome, CounterSet};
use crate::store::{NewUser, User, UserRepository};

/// A logged-in user together with their bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Login, registration, logout and per-request authorization.
///
/// Auth outcomes and registrations are fed back into the shared counters.
pub struct SessionAuthority {
    users: Arc<dyn UserRepository>,
    tokens: TokenAuthority,
    counters: Arc<CounterSet>,
}

impl SessionAuthority {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: TokenAuthority,
        counters: Arc<CounterSet>,
    ) -> Self {
        Self {
            users,
            tokens,
            counters,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let found = self.users.find_by_credentials(email, password).await;

        let user = match found {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.counters.increment_auth(AuthOutcome::Failure);
                debug!(%email, "login rejected");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                self.counters.increment_auth(AuthOutcome::Failure);
                warn!(error = %e, %email, "login lookup failed");
                return Err(e.into());
            }
        };

        let token = self.tokens.issue(&user)?;
        self.counters.increment_auth(AuthOutcome::Success);
        info!(user_id = user.id, "user logged in");
        Ok(Session { user, token })
    }

    /// New users without explicit roles become diners.
    pub async fn register(&self, new_user: NewUser) -> Result<Session> {
        let user = self.users.create(new_user).await?;
        self.counters.add_users(1);

        let token = self.tokens.issue(&user)?;
        info!(user_id = user.id, "user registered");
        Ok(Session { user, token })
    }

    pub fn logout(&self, token: &str) -> Result<()> {
        self.tokens.revoke(token)?;
        debug!("token revoked");
        Ok(())
    }

    /// `InvalidToken` for bad, unknown or revoked tokens; `Unauthorized`
    /// when the principal lacks `required`.
    pub fn authorize(&self, token: &str, required: &Capability) -> Result<Principal> {
        let principal = self.tokens.verify(token)?;
        if required.permits(&principal) {
            Ok(principal)
        } else {
            debug!(user_id = principal.user_id, ?required, "capability denied");
            Err(AuthError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, RoleGrant};
    use crate::store::{MemoryStore, PizzaRepository};

    struct Fixture {
        store: Arc<MemoryStore>,
        counters: Arc<CounterSet>,
        authority: SessionAuthority,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let counters = Arc::new(CounterSet::new());
        let authority = SessionAuthority::new(
            store.clone(),
            TokenAuthority::new(b"test-secret", None),
            counters.clone(),
        );
        Fixture {
            store,
            counters,
            authority,
        }
    }

    fn diner(email: &str) -> NewUser {
        NewUser {
            name: "pizza diner".into(),
            email: email.into(),
            password: "a".into(),
            roles: vec![],
        }
    }

    fn is_jwt_shaped(token: &str) -> bool {
        let parts: Vec<&str> = token.split('.').collect();
        parts.len() == 3
            && parts
                .iter()
                .all(|p| p.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'))
    }

    #[tokio::test]
    async fn register_counts_user_and_defaults_to_diner() {
        let f = fixture();
        let session = f.authority.register(diner("reg@test.com")).await.unwrap();

        assert_eq!(session.user.roles, vec![RoleGrant::global(Role::Diner)]);
        assert!(is_jwt_shaped(&session.token));
        assert_eq!(f.counters.snapshot().auth.users_registered, 1);
    }

    #[tokio::test]
    async fn login_success_and_failure_are_counted() {
        let f = fixture();
        f.authority.register(diner("reg@test.com")).await.unwrap();

        let session = f.authority.login("reg@test.com", "a").await.unwrap();
        assert!(is_jwt_shaped(&session.token));
        assert_eq!(f.counters.snapshot().auth.successful, 1);

        let err = f.authority.login("reg@test.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        let snap = f.counters.snapshot();
        assert_eq!(snap.auth.successful, 1);
        assert_eq!(snap.auth.failed, 1);
    }

    #[tokio::test]
    async fn logout_invalidates_token_for_good() {
        let f = fixture();
        f.authority.register(diner("reg@test.com")).await.unwrap();
        let session = f.authority.login("reg@test.com", "a").await.unwrap();

        assert!(f.authority.authorize(&session.token, &Capability::Authenticated).is_ok());
        f.authority.logout(&session.token).unwrap();

        for _ in 0..3 {
            let err = f
                .authority
                .authorize(&session.token, &Capability::Authenticated)
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidToken));
        }
        assert!(matches!(f.authority.logout(&session.token), Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn logging_out_one_session_leaves_others_alive() {
        let f = fixture();
        f.authority.register(diner("reg@test.com")).await.unwrap();
        let first = f.authority.login("reg@test.com", "a").await.unwrap();
        let second = f.authority.login("reg@test.com", "a").await.unwrap();

        f.authority.logout(&first.token).unwrap();
        assert!(f.authority.authorize(&second.token, &Capability::Authenticated).is_ok());
    }

    #[tokio::test]
    async fn diner_is_unauthorized_for_admin_capability() {
        let f = fixture();
        let session = f.authority.register(diner("reg@test.com")).await.unwrap();

        let err = f.authority.authorize(&session.token, &Capability::Admin).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn franchisee_role_is_picked_up_on_next_login() {
        let f = fixture();
        f.authority.register(diner("owner@test.com")).await.unwrap();
        let franchise = f
            .store
            .create_franchise("pizzaPocket".into(), vec!["owner@test.com".into()])
            .await
            .unwrap();

        let session = f.authority.login("owner@test.com", "a").await.unwrap();
        let scoped = Capability::ManageFranchise {
            franchise_id: franchise.id,
            admin_emails: vec![],
        };
        let other = Capability::ManageFranchise {
            franchise_id: franchise.id + 1,
            admin_emails: vec![],
        };

        assert!(f.authority.authorize(&session.token, &scoped).is_ok());
        assert!(matches!(
            f.authority.authorize(&session.token, &other),
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn duplicate_registration_is_not_counted() {
        let f = fixture();
        f.authority.register(diner("reg@test.com")).await.unwrap();
        assert!(f.authority.register(diner("reg@test.com")).await.is_err());
        assert_eq!(f.counters.snapshot().auth.users_registered, 1);
    }
}
