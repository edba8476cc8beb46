//! JWT issuance, verification and revocation.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AuthError, Principal, Result, RoleGrant};
use crate::store::User;

/// Signed token body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub name: String,
    pub email: String,
    pub roles: Vec<RoleGrant>,
    pub iat: i64,
    /// Registry key.
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Signs tokens and owns the live-token registry.
///
/// The registry maps the `jti` of every usable token to its `exp`. Logout
/// removes the entry, and with a TTL configured expired entries are swept
/// on each issue, so it only holds tokens that can still authorize.
/// Reads and writes go through one `RwLock`, so a revoke is visible to
/// every authorize that starts after it.
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Option<Duration>,
    registry: RwLock<HashMap<String, Option<i64>>>,
}

impl TokenAuthority {
    /// `ttl = None` keeps tokens valid until logout.
    pub fn new(secret: &[u8], ttl: Option<Duration>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();
        validation.validate_exp = ttl.is_some();
        if ttl.is_some() {
            validation.required_spec_claims.insert("exp".to_owned());
        }

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
            registry: RwLock::new(HashMap::new()),
        }
    }

    /// Sign a token for `user` and register it as issued.
    pub fn issue(&self, user: &User) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            roles: user.roles.clone(),
            iat: now,
            jti: uuid::Uuid::new_v4().to_string(),
            exp: self.ttl.map(|ttl| now + ttl.as_secs() as i64),
        };
        self.register(&claims)
    }

    fn register(&self, claims: &Claims) -> Result<String> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        let mut registry = self.registry.write();
        if self.ttl.is_some() {
            let now = Utc::now().timestamp();
            let before = registry.len();
            registry.retain(|_, exp| exp.map_or(true, |exp| exp > now));
            let swept = before - registry.len();
            if swept > 0 {
                debug!(swept, "expired tokens dropped from registry");
            }
        }
        registry.insert(claims.jti.clone(), claims.exp);
        Ok(token)
    }

    /// Signature, expiry (when configured) and registry check.
    pub fn verify(&self, token: &str) -> Result<Principal> {
        let claims = self.decode(token)?;

        if !self.registry.read().contains_key(&claims.jti) {
            debug!(jti = %claims.jti, "revoked or unknown token presented");
            return Err(AuthError::InvalidToken);
        }

        let user_id = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;
        Ok(Principal {
            user_id,
            name: claims.name,
            email: claims.email,
            roles: claims.roles,
        })
    }

    /// Drops a live token from the registry. A token that is not live
    /// (including one already revoked) is `InvalidToken`.
    pub fn revoke(&self, token: &str) -> Result<()> {
        let claims = self.decode(token)?;
        match self.registry.write().remove(&claims.jti) {
            Some(_) => Ok(()),
            None => Err(AuthError::InvalidToken),
        }
    }

    #[cfg(test)]
    fn live_tokens(&self) -> usize {
        self.registry.read().len()
    }

    fn decode(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                AuthError::InvalidToken
            })
    }
}
