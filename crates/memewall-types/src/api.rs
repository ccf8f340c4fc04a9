use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{MediaInfo, Meme, SortOrder, TypeFilter, UserRole, VoteKind};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the handlers. Canonical
/// definition lives here in memewall-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    #[serde(default)]
    pub role: UserRole,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub role: UserRole,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub token: String,
}

// -- Feed --

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(rename = "type", default)]
    pub type_filter: TypeFilter,
}

fn default_page() -> u32 {
    1
}

#[derive(Debug, Serialize)]
pub struct FeedPage {
    pub memes: Vec<Meme>,
    pub total: i64,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct AdjacentResponse {
    pub prev: Option<Meme>,
    pub next: Option<Meme>,
}

// -- Memes --

/// Upload metadata for a new meme. The media file itself lives in the blob
/// store; the client sends back the URLs it got from the upload.
#[derive(Debug, Deserialize)]
pub struct CreateMemeRequest {
    pub title: Option<String>,
    pub file_url: String,
    pub thumbnail_url: Option<String>,
    #[serde(flatten)]
    pub media: Option<MediaInfo>,
}

#[derive(Debug, Serialize)]
pub struct CreateMemeResponse {
    pub id: String,
    pub chunk_id: String,
    pub position: i64,
}

// -- Votes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CastVoteRequest {
    pub vote_type: VoteKind,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub upvotes: i64,
    pub downvotes: i64,
    pub net_votes: i64,
    pub total_votes: i64,
    /// The caller's vote after the transition; `None` means toggled off.
    pub user_vote: Option<VoteKind>,
}

// -- Admin migrations --

#[derive(Debug, Serialize)]
pub struct MigrationReport {
    pub migration: String,
    pub rows_affected: usize,
}
