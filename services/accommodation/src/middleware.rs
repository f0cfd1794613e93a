//! Authentication middleware for JWT token validation
//!
//! Tokens are issued by the portal's auth service; this service only
//! verifies them with the RS256 public key and reads the caller's roles.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::ApiError;
use crate::service::DeskActor;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// User roles
    pub roles: Vec<String>,
    /// User permissions
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

/// Authenticated user information
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn has_any_role(&self, roles: &[String]) -> bool {
        self.roles.iter().any(|r| roles.contains(r))
    }
}

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Failed to read public key file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid RSA public key: {0}")]
    Decode(#[from] jsonwebtoken::errors::Error),
}

/// Verifies RS256 access tokens
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Build from PEM text
    pub fn from_pem(pem: &[u8]) -> Result<Self, KeyError> {
        let decoding_key = DecodingKey::from_rsa_pem(pem)?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    /// Build from the configured key, which is either PEM text or a path
    ///
    /// Relative paths are tried against the working directory first, then
    /// the crate root.
    pub fn from_config(config: &AuthConfig) -> Result<Self, KeyError> {
        let key = config.public_key.trim();
        if key.starts_with("-----BEGIN") {
            return Self::from_pem(key.as_bytes());
        }

        let pem = std::fs::read_to_string(key)
            .or_else(|_| std::fs::read_to_string(Path::new(env!("CARGO_MANIFEST_DIR")).join(key)))
            .map_err(|source| KeyError::Read {
                path: PathBuf::from(key),
                source,
            })?;
        Self::from_pem(pem.trim().as_bytes())
    }

    /// Decode and validate an access token
    pub fn verify(&self, token: &str) -> Result<AuthUser, ApiError> {
        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!("Failed to validate token: {}", e);
                ApiError::Unauthorized
            })?;

        if token_data.claims.token_type != TokenType::Access {
            warn!(user_id = %token_data.claims.sub, "Refresh token presented as access token");
            return Err(ApiError::Unauthorized);
        }

        Ok(AuthUser {
            id: token_data.claims.sub,
            roles: token_data.claims.roles,
        })
    }
}

/// Authentication middleware
pub async fn auth_middleware(
    State(verifier): State<Arc<JwtVerifier>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(ApiError::Unauthorized)?;
    let user = verifier.verify(bearer.token())?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Role requirements for the protected operations
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    admin_roles: Vec<String>,
    desk_roles: Vec<String>,
}

impl AccessPolicy {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            admin_roles: config.admin_roles.clone(),
            desk_roles: config.desk_roles.clone(),
        }
    }

    pub fn is_admin(&self, user: &AuthUser) -> bool {
        user.has_any_role(&self.admin_roles)
    }

    pub fn require_admin(&self, user: &AuthUser) -> Result<(), ApiError> {
        if self.is_admin(user) {
            Ok(())
        } else {
            warn!(user_id = %user.id, "Administrator role required");
            Err(ApiError::Forbidden)
        }
    }

    /// Desk staff are the desk roles plus every administrator
    pub fn require_desk(&self, user: &AuthUser) -> Result<DeskActor, ApiError> {
        if self.is_admin(user) {
            Ok(DeskActor::Admin)
        } else if user.has_any_role(&self.desk_roles) {
            Ok(DeskActor::Volunteer)
        } else {
            warn!(user_id = %user.id, "Desk role required");
            Err(ApiError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(roles: &[&str]) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_access_policy_roles() {
        let policy = AccessPolicy::new(&AuthConfig::default());

        assert!(policy.require_admin(&user(&["admin"])).is_ok());
        assert!(policy.require_admin(&user(&["volunteer"])).is_err());

        assert_eq!(
            policy.require_desk(&user(&["user", "admin"])).unwrap(),
            DeskActor::Admin
        );
        assert_eq!(
            policy.require_desk(&user(&["volunteer"])).unwrap(),
            DeskActor::Volunteer
        );
        assert!(matches!(
            policy.require_desk(&user(&["user"])),
            Err(ApiError::Forbidden)
        ));
    }

    #[test]
    fn test_verifier_rejects_garbage_key_and_token() {
        assert!(JwtVerifier::from_pem(b"not a key").is_err());

        let missing = AuthConfig {
            public_key: "no/such/key.pem".to_string(),
            ..AuthConfig::default()
        };
        assert!(matches!(
            JwtVerifier::from_config(&missing),
            Err(KeyError::Read { .. })
        ));

        let verifier = JwtVerifier::from_config(&AuthConfig {
            public_key: "tests/fixtures/jwt_public.pem".to_string(),
            ..AuthConfig::default()
        })
        .unwrap();
        assert!(matches!(
            verifier.verify("not.a.token"),
            Err(ApiError::Unauthorized)
        ));
    }
}
