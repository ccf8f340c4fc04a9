//! Database row types — these map directly to SQLite rows.
//! Distinct from the memewall-types API models to keep the DB layer
//! independent; `MemeRow::into_meme` does the conversion.

use memewall_types::models::{FileType, MediaInfo, Meme};
use tracing::warn;

pub struct MemeRow {
    pub id: String,
    pub title: Option<String>,
    pub file_url: String,
    pub thumbnail_url: Option<String>,
    pub file_type: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration: Option<f64>,
    pub poster_url: Option<String>,
    pub author_id: Option<String>,
    pub chunk_id: Option<String>,
    pub position: Option<i64>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub net_votes: Option<i64>,
    pub total_votes: Option<i64>,
    pub created_at: String,
}

pub struct ChunkRow {
    pub id: String,
    pub item_count: i64,
    pub is_full: bool,
    pub start_timestamp: String,
    pub end_timestamp: Option<String>,
}

pub struct VoteRow {
    pub id: String,
    pub meme_id: String,
    pub user_id: String,
    pub vote_type: String,
    pub created_at: String,
}

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub created_at: String,
}

/// Column list matching `meme_from_row`, shared by every meme SELECT.
pub(crate) const MEME_COLUMNS: &str = "id, title, file_url, thumbnail_url, file_type, \
     width, height, duration, poster_url, author_id, chunk_id, position, \
     upvotes, downvotes, net_votes, total_votes, created_at";

pub(crate) fn meme_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemeRow> {
    Ok(MemeRow {
        id: row.get(0)?,
        title: row.get(1)?,
        file_url: row.get(2)?,
        thumbnail_url: row.get(3)?,
        file_type: row.get(4)?,
        width: row.get(5)?,
        height: row.get(6)?,
        duration: row.get(7)?,
        poster_url: row.get(8)?,
        author_id: row.get(9)?,
        chunk_id: row.get(10)?,
        position: row.get(11)?,
        upvotes: row.get(12)?,
        downvotes: row.get(13)?,
        net_votes: row.get(14)?,
        total_votes: row.get(15)?,
        created_at: row.get(16)?,
    })
}

pub(crate) fn chunk_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRow> {
    Ok(ChunkRow {
        id: row.get(0)?,
        item_count: row.get(1)?,
        is_full: row.get(2)?,
        start_timestamp: row.get(3)?,
        end_timestamp: row.get(4)?,
    })
}

impl MemeRow {
    /// Assemble the typed media variant. Rows that predate the type backfill
    /// (or lack dimensions) surface no media info rather than a guess.
    fn media(&self) -> Option<MediaInfo> {
        let file_type = FileType::parse(self.file_type.as_deref()?)?;
        let width = self.width? as u32;
        let height = self.height? as u32;
        match file_type {
            FileType::Image => Some(MediaInfo::Image { width, height }),
            FileType::Video => Some(MediaInfo::Video {
                width,
                height,
                duration: self.duration?,
                poster_url: self.poster_url.clone()?,
            }),
        }
    }

    pub fn into_meme(self) -> Meme {
        let media = self.media();
        let created_at = self
            .created_at
            .parse::<chrono::DateTime<chrono::Utc>>()
            .or_else(|_| {
                // SQLite defaults store "YYYY-MM-DD HH:MM:SS" without a
                // timezone. Parse as naive UTC and convert.
                chrono::NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%d %H:%M:%S")
                    .map(|ndt| ndt.and_utc())
            })
            .unwrap_or_else(|e| {
                warn!("Corrupt created_at '{}' on meme '{}': {}", self.created_at, self.id, e);
                chrono::DateTime::default()
            });

        Meme {
            id: self.id,
            title: self.title,
            file_url: self.file_url,
            thumbnail_url: self.thumbnail_url,
            author_id: self.author_id,
            chunk_id: self.chunk_id,
            position: self.position,
            upvotes: self.upvotes,
            downvotes: self.downvotes,
            net_votes: self.net_votes,
            total_votes: self.total_votes,
            media,
            created_at,
        }
    }
}
