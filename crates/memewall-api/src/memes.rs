use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::{error, info};

use memewall_db::feed::NewMeme;
use memewall_types::api::{CreateMemeRequest, CreateMemeResponse};

use crate::auth::AppStateInner;
use crate::error::ApiError;
use crate::middleware::extract_claims;

/// Extensions accepted for upload. The blob itself goes to the object store
/// out of band; this endpoint records the metadata and slots the meme into
/// the feed.
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "mp4", "webm", "ogg"];

pub async fn create_meme(
    State(state): State<Arc<AppStateInner>>,
    headers: HeaderMap,
    Json(req): Json<CreateMemeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = extract_claims(&headers).map_err(|_| ApiError::Unauthorized)?;

    let extension = req
        .file_url
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "unsupported file extension '{extension}'"
        )));
    }

    let new = NewMeme {
        title: req.title,
        file_url: req.file_url,
        thumbnail_url: req.thumbnail_url,
        media: req.media,
        author_id: Some(claims.sub.to_string()),
    };

    let db = state.clone();
    let created = tokio::task::spawn_blocking(move || db.db.create_meme(&new))
        .await
        .map_err(|e| { error!("spawn_blocking join error: {}", e); ApiError::Internal(anyhow::anyhow!(e)) })??;

    info!(
        "Meme {} created in chunk {} at position {}",
        created.id, created.chunk_id, created.position
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateMemeResponse {
            id: created.id,
            chunk_id: created.chunk_id,
            position: created.position,
        }),
    ))
}

/// Delete a meme. Admins and the owner may delete anything; a regular user
/// only their own uploads.
pub async fn delete_meme(
    State(state): State<Arc<AppStateInner>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let claims = extract_claims(&headers).map_err(|_| ApiError::Unauthorized)?;

    let existing = {
        let db = state.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || db.db.get_meme(&id))
            .await
            .map_err(|e| { error!("spawn_blocking join error: {}", e); ApiError::Internal(anyhow::anyhow!(e)) })??
            .ok_or_else(|| ApiError::NotFound("meme".into()))?
    };

    let is_author = existing.author_id.as_deref() == Some(claims.sub.to_string().as_str());
    if !claims.role.is_admin() && !is_author {
        return Err(ApiError::Forbidden("not allowed to delete this meme".into()));
    }

    let db = state.clone();
    let deleted = tokio::task::spawn_blocking(move || db.db.delete_meme(&id))
        .await
        .map_err(|e| { error!("spawn_blocking join error: {}", e); ApiError::Internal(anyhow::anyhow!(e)) })??;

    if !deleted {
        return Err(ApiError::NotFound("meme".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}
