use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, warn};

use memewall_types::api::{AdjacentResponse, FeedPage, FeedQuery};
use memewall_types::models::{SortOrder, TypeFilter};

use crate::auth::AppStateInner;

/// One page of the feed. Store failures degrade to an empty page so the grid
/// keeps rendering; they are logged, not surfaced.
pub async fn list_memes(
    State(state): State<Arc<AppStateInner>>,
    Query(query): Query<FeedQuery>,
) -> impl IntoResponse {
    let db = state.clone();
    let page = tokio::task::spawn_blocking(move || {
        db.db.list_page(query.page, query.sort, query.type_filter)
    })
    .await;

    let page = match page {
        Ok(Ok(rows)) => FeedPage {
            memes: rows.memes.into_iter().map(|m| m.into_meme()).collect(),
            total: rows.total,
            has_more: rows.has_more,
        },
        Ok(Err(e)) => {
            warn!("Feed query failed: {:#}", e);
            FeedPage { memes: Vec::new(), total: 0, has_more: false }
        }
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            FeedPage { memes: Vec::new(), total: 0, has_more: false }
        }
    };

    Json(page)
}

pub async fn get_meme(
    State(state): State<Arc<AppStateInner>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.get_meme(&id))
        .await
        .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(row.into_meme()))
}

/// Detail-page routing: look a meme up by its chunk and position.
pub async fn get_by_chunk_position(
    State(state): State<Arc<AppStateInner>>,
    Path((chunk, position)): Path<(String, i64)>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.get_by_chunk_position(&chunk, position))
        .await
        .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(row.into_meme()))
}

/// Neighbours of a meme in the active sort order, for swipe/keyboard
/// navigation. Never fails: any error collapses to "no further items".
pub async fn get_adjacent(
    State(state): State<Arc<AppStateInner>>,
    Path(id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> impl IntoResponse {
    let (prev, next) = adjacent_or_none(&state, id, query.sort, query.type_filter).await;
    Json(AdjacentResponse { prev, next })
}

async fn adjacent_or_none(
    state: &Arc<AppStateInner>,
    id: String,
    sort: SortOrder,
    filter: TypeFilter,
) -> (Option<memewall_types::models::Meme>, Option<memewall_types::models::Meme>) {
    let db = state.clone();
    match tokio::task::spawn_blocking(move || db.db.get_adjacent(&id, sort, filter)).await {
        Ok(Ok((prev, next))) => (prev.map(|m| m.into_meme()), next.map(|m| m.into_meme())),
        Ok(Err(e)) => {
            warn!("Adjacency query failed: {:#}", e);
            (None, None)
        }
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            (None, None)
        }
    }
}
