//! Access tokens and authorization guards.
//!
//! A participant's identity lives only in a signed token issued at create/join
//! time. Every realtime connection and authenticated HTTP call is bound to the
//! claims in that token, never to identity fields sent by the client.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PollError, PollResult};
use crate::state::AppState;
use crate::store::PollStore;
use crate::types::{ParticipantId, PollId};

/// Signed identity payload carried by every access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Participant ID
    pub sub: ParticipantId,
    #[serde(rename = "pollID")]
    pub poll_id: PollId,
    pub name: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Signing and verification keys for access tokens (HS256)
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenKeys {
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetime,
        }
    }

    /// Issue a token binding `participant_id` to `poll_id`.
    /// Tokens live exactly as long as a poll does.
    pub fn issue(&self, participant_id: &str, poll_id: &str, name: &str) -> PollResult<String> {
        let now = Utc::now().timestamp();
        let lifetime = i64::try_from(self.lifetime.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: participant_id.to_string(),
            poll_id: poll_id.to_string(),
            name: name.to_string(),
            iat: now,
            exp: now.saturating_add(lifetime),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> PollResult<String> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| PollError::Internal(format!("failed to sign token: {}", e)))
    }

    /// Verify signature and expiry. Works offline; the store is never consulted.
    pub fn verify(&self, token: &str) -> PollResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

/// Identity bound to one connection or request, taken from verified claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: ParticipantId,
    pub poll_id: PollId,
    pub name: String,
}

impl From<Claims> for Session {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            poll_id: claims.poll_id,
            name: claims.name,
        }
    }
}

/// Find the access token in a request.
///
/// Checked in order: `?token=` query value, `Authorization: Bearer`, then a bare
/// `token` header (for test clients that cannot set the other two).
pub fn extract_token(query_token: Option<&str>, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = query_token.map(str::trim).filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get("token")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Verify a possibly-missing token and bind a session to it.
pub fn authenticate(keys: &TokenKeys, token: Option<&str>) -> PollResult<Session> {
    let token = token.ok_or_else(|| PollError::Unauthorized("No token provided".to_string()))?;
    keys.verify(token).map(Session::from)
}

/// Guard for privileged operations: the caller must be the poll's admin.
///
/// A missing poll is reported as Unauthorized too, so a non-admin cannot learn
/// which polls exist.
pub async fn require_admin(store: &dyn PollStore, session: &Session) -> PollResult<()> {
    let denied = || PollError::Unauthorized("Admin privileges required".to_string());

    let poll = store.get(&session.poll_id).await.map_err(|e| {
        tracing::debug!(poll_id = %session.poll_id, error = %e, "Admin check could not load poll");
        denied()
    })?;

    if poll.admin_id != session.user_id {
        tracing::debug!(
            poll_id = %session.poll_id,
            user_id = %session.user_id,
            "Admin check failed"
        );
        return Err(denied());
    }

    Ok(())
}

/// Extractor for HTTP routes that require a valid access token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub session: Session,
    pub token: String,
}

impl FromRequestParts<Arc<AppState>> for AuthSession {
    type Rejection = PollError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(None, &parts.headers);
        let session = authenticate(&state.keys, token.as_deref())?;
        Ok(Self {
            session,
            token: token.unwrap_or_default(),
        })
    }
}
