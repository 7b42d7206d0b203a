//! HTTP API endpoints for creating, joining and rejoining polls.
//!
//! These only hand out access tokens and the current poll snapshot. Everything
//! after that happens over the WebSocket.

use axum::{extract::State, routing::get, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::AuthSession;
use crate::error::PollResult;
use crate::state::{AppState, PollAccess};
use crate::validation;
use crate::ws;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    pub topic: String,
    pub votes_per_voter: u32,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinPollRequest {
    #[serde(rename = "pollID")]
    pub poll_id: String,
    pub name: String,
}

/// Create a poll and become its admin.
///
/// POST /polls
pub async fn create_poll(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePollRequest>,
) -> PollResult<Json<PollAccess>> {
    let topic = validation::topic(&req.topic)?;
    let votes_per_voter = validation::votes_per_voter(req.votes_per_voter)?;
    let name = validation::name(&req.name)?;

    let access = state.create_poll(topic, votes_per_voter, name).await?;
    Ok(Json(access))
}

/// Join an existing poll as a new participant.
///
/// POST /polls/join
pub async fn join_poll(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JoinPollRequest>,
) -> PollResult<Json<PollAccess>> {
    let poll_id = validation::poll_id(&req.poll_id)?;
    let name = validation::name(&req.name)?;

    let access = state.join_poll(&poll_id, name).await?;
    Ok(Json(access))
}

/// Re-enter a poll with a previously issued token (`Authorization: Bearer`).
///
/// POST /polls/rejoin
pub async fn rejoin_poll(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> PollResult<Json<PollAccess>> {
    let poll = state.rejoin_poll(&auth.session).await?;
    Ok(Json(PollAccess {
        poll,
        access_token: auth.token,
    }))
}

pub async fn health() -> &'static str {
    "ok"
}

/// Full application router: HTTP endpoints plus the WebSocket route.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/polls", post(create_poll))
        .route("/polls/join", post(join_poll))
        .route("/polls/rejoin", post(rejoin_poll))
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
