use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use tracing::error;

use memewall_types::api::{CastVoteRequest, VoteResponse};

use crate::auth::AppStateInner;
use crate::error::ApiError;
use crate::middleware::extract_claims;

/// Cast, switch or retract a vote. Anonymous callers are rejected before any
/// write happens.
pub async fn cast_vote(
    State(state): State<Arc<AppStateInner>>,
    Path(meme_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CastVoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = extract_claims(&headers).map_err(|_| ApiError::Unauthorized)?;

    let db = state.clone();
    let user_id = claims.sub.to_string();

    let outcome = tokio::task::spawn_blocking(move || {
        db.db.cast_vote(&meme_id, &user_id, req.vote_type)
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); ApiError::Internal(anyhow::anyhow!(e)) })??
    .ok_or_else(|| ApiError::NotFound("meme".into()))?;

    Ok(Json(VoteResponse {
        upvotes: outcome.upvotes,
        downvotes: outcome.downvotes,
        net_votes: outcome.net_votes,
        total_votes: outcome.total_votes,
        user_vote: outcome.user_vote,
    }))
}
