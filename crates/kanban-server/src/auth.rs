//! JWT admission gate.
//!
//! Tokens are HS256 JWTs issued by the REST layer with the claims
//! `{id, name, email, is_admin, exp}`. The gate verifies the signature and
//! expiry, then checks project membership through a [`MembershipDirectory`].

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use kanban_core::{ProjectId, UserId};
use kanban_hub::{AdmissionError, AdmissionGate, MembershipDirectory, check_membership};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lifetime of tokens minted by [`Claims::new`].
const TOKEN_TTL_DAYS: i64 = 7;

/// Claims carried by a session token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Administrator flag.
    pub is_admin: bool,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl Claims {
    /// Claims expiring seven days from now.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        is_admin: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            is_admin,
            exp: (Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        }
    }
}

/// Token from the `token` query parameter, else an `Authorization: Bearer`
/// header.
pub fn extract_token(query: Option<&str>, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = query.map(str::trim).filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

/// Sign `claims` with `secret`.
pub fn issue_token(secret: &str, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// [`AdmissionGate`] backed by HS256 tokens and a membership directory.
pub struct JwtAdmission {
    key: DecodingKey,
    validation: Validation,
    directory: Arc<dyn MembershipDirectory>,
}

impl JwtAdmission {
    /// Gate verifying tokens signed with `secret`.
    pub fn new(secret: &str, directory: Arc<dyn MembershipDirectory>) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            directory,
        }
    }

    /// Decode and verify a token without checking membership.
    pub fn verify(&self, token: &str) -> Result<Claims, AdmissionError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AdmissionError::Expired,
                _ => AdmissionError::InvalidToken(e.to_string()),
            },
        )?;
        if data.claims.id.is_empty() {
            return Err(AdmissionError::InvalidToken("empty user id".into()));
        }
        Ok(data.claims)
    }
}

impl std::fmt::Debug for JwtAdmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAdmission")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AdmissionGate for JwtAdmission {
    async fn admit(
        &self,
        token: &str,
        room: Option<&ProjectId>,
    ) -> Result<UserId, AdmissionError> {
        if token.is_empty() {
            return Err(AdmissionError::MissingToken);
        }
        let claims = self.verify(token)?;
        let user = UserId::from(claims.id);
        check_membership(self.directory.as_ref(), &user, room).await?;
        debug!(user_id = %user, project_id = ?room, "admitted");
        Ok(user)
    }
}
