use serde::{Deserialize, Serialize};

/// Extensions the feed treats as video. Everything else is an image.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Video,
}

impl FileType {
    /// Infer the media type from a file URL's extension. Used both at upload
    /// time and by the type backfill/repair migrations.
    pub fn from_url(url: &str) -> FileType {
        let extension = url
            .rsplit('.')
            .next()
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            FileType::Video
        } else {
            FileType::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<FileType> {
        match s {
            "image" => Some(FileType::Image),
            "video" => Some(FileType::Video),
            _ => None,
        }
    }
}

/// Type-specific media fields, keyed by the `file_type` tag. Image and video
/// memes share dimensions; only videos carry a duration and a poster frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "file_type", rename_all = "lowercase")]
pub enum MediaInfo {
    Image {
        width: u32,
        height: u32,
    },
    Video {
        width: u32,
        height: u32,
        duration: f64,
        poster_url: String,
    },
}

impl MediaInfo {
    pub fn file_type(&self) -> FileType {
        match self {
            MediaInfo::Image { .. } => FileType::Image,
            MediaInfo::Video { .. } => FileType::Video,
        }
    }
}

/// One uploaded meme as exposed to API consumers.
///
/// `chunk_id`/`position` are `None` only for legacy rows that predate the
/// chunk migration; `net_votes`/`total_votes` only appear after the
/// vote-field backfill has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meme {
    pub id: String,
    pub title: Option<String>,
    pub file_url: String,
    pub thumbnail_url: Option<String>,
    pub author_id: Option<String>,
    pub chunk_id: Option<String>,
    pub position: Option<i64>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub net_votes: Option<i64>,
    pub total_votes: Option<i64>,
    #[serde(flatten)]
    pub media: Option<MediaInfo>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    New,
    Top,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilter {
    #[default]
    All,
    Image,
    Video,
}

impl TypeFilter {
    /// The equality predicate value, or `None` for `all`.
    pub fn as_file_type(&self) -> Option<FileType> {
        match self {
            TypeFilter::All => None,
            TypeFilter::Image => Some(FileType::Image),
            TypeFilter::Video => Some(FileType::Video),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Upvote,
    Downvote,
}

impl VoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteKind::Upvote => "upvote",
            VoteKind::Downvote => "downvote",
        }
    }

    pub fn parse(s: &str) -> Option<VoteKind> {
        match s {
            "upvote" => Some(VoteKind::Upvote),
            "downvote" => Some(VoteKind::Downvote),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
    Owner,
}

impl UserRole {
    /// Admins and the owner may delete any meme and trigger migrations.
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Owner)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
            UserRole::Owner => "owner",
        }
    }

    pub fn parse(s: &str) -> Option<UserRole> {
        match s {
            "user" => Some(UserRole::User),
            "admin" => Some(UserRole::Admin),
            "owner" => Some(UserRole::Owner),
            _ => None,
        }
    }
}
