//! JWT caller identity
//!
//! RPC callers present an HS256 token whose `sub` claim is their user id.
//! Only the presence of a verified identity is checked; there are no roles.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rpc::CallerIdentity;
use crate::types::{HearthError, Result};

const MIN_SECRET_LEN: usize = 32;
const DEV_SECRET: &str = "hearth-dev-secret-do-not-deploy-0123456789";

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Caller's user id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies caller tokens with a shared secret
#[derive(Clone)]
pub struct JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_seconds: u64,
}

impl JwtValidator {
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(HearthError::Config(format!(
                "JWT_SECRET must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self::from_secret(&secret, expiry_seconds))
    }

    /// Fixed well-known secret for dev mode
    pub fn new_dev() -> Self {
        Self::from_secret(DEV_SECRET, 3600)
    }

    fn from_secret(secret: &str, expiry_seconds: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        }
    }

    /// Issue a token for a user
    pub fn generate_token(&self, user_id: &str) -> Result<String> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat,
            exp: iat.saturating_add(self.expiry_seconds as i64),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(
            |err| {
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => "token expired",
                    ErrorKind::InvalidSignature => "invalid signature",
                    ErrorKind::InvalidToken => "malformed token",
                    _ => "token validation failed",
                };
                HearthError::Auth(reason.into())
            },
        )?;

        if data.claims.sub.is_empty() {
            return Err(HearthError::Auth("token has no subject".into()));
        }
        Ok(data.claims)
    }

    /// Identity behind an Authorization header, if it carries a valid token
    pub fn resolve_caller(&self, auth_header: Option<&str>) -> Option<CallerIdentity> {
        let token = extract_token_from_header(auth_header)?;
        match self.verify_token(token) {
            Ok(claims) => Some(CallerIdentity { uid: claims.sub }),
            Err(e) => {
                debug!("Rejected caller token: {}", e);
                None
            }
        }
    }
}

/// Token from `Bearer <token>` or a bare token
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;
    let token = match header.strip_prefix("Bearer ") {
        Some(rest) => rest.trim(),
        None if !header.trim().contains(' ') => header.trim(),
        None => return None,
    };
    (!token.is_empty()).then_some(token)
}
