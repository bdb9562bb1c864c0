//! Access token handling.
//!
//! Tokens are HS256 JWTs issued by the identity provider. The claims carry the user id (`sub`), the user's role and
//! the expiry. A token is read from the `Authorization: Bearer` header, or from the `token` cookie. Requests without a
//! valid token are refused with a 401 before any handler runs.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use order_payment_engine::{db_types::Role, Principal};
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

pub const TOKEN_COOKIE: &str = "token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    #[serde(default)]
    pub role: Role,
    pub exp: i64,
}

impl JwtClaims {
    pub fn new<S: Into<String>>(sub: S, role: Role, valid_for: Duration) -> Self {
        Self { sub: sub.into(), role, exp: (Utc::now() + valid_for).timestamp() }
    }

    pub fn principal(&self) -> Principal {
        Principal::new(self.sub.clone(), self.role)
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract_claims(req))
    }
}

fn extract_claims(req: &HttpRequest) -> Result<JwtClaims, ServerError> {
    let validator = req.app_data::<web::Data<TokenValidator>>().ok_or_else(|| {
        error!("💻️ No token validator has been registered. All authenticated requests will be refused.");
        AuthError::NotConfigured
    })?;
    let token = bearer_token(req).or_else(|| req.cookie(TOKEN_COOKIE).map(|c| c.value().to_string()));
    let token = token.ok_or(AuthError::MissingToken)?;
    let claims = validator.validate(&token)?;
    trace!("💻️ Request authenticated for {} ({})", claims.sub, claims.role);
    Ok(claims)
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        Self { key, validation }
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("💻️ Access token rejected. {e}");
            AuthError::InvalidToken(e.to_string())
        })?;
        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("The token has no subject".into()));
        }
        Ok(data.claims)
    }
}

/// Signs access tokens with the server's secret. Tokens are normally issued by the identity provider; this is used by
/// tooling and tests.
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn issue_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key).map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}
