//! Database row types. These map directly to SQLite rows and may carry
//! fields that must never leave the server (see `UserRow`). API-facing shapes
//! live in tubehub-types.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use rusqlite::Row;
use uuid::Uuid;

use tubehub_types::models::{Comment, EntityKind, Playlist, Tweet, UserProfile, Video};

use crate::guard::Owned;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Current UTC time in the stored text format. Microsecond precision keeps
/// rows written in quick succession ordered.
pub(crate) fn now() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// UUID stored as TEXT.
pub(crate) struct DbUuid(pub Uuid);

impl FromSql for DbUuid {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map(DbUuid)
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Timestamp stored as `YYYY-MM-DD HH:MM:SS[.ffffff]` UTC text.
pub(crate) struct DbTime(pub DateTime<Utc>);

impl FromSql for DbTime {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .map(|ndt| DbTime(ndt.and_utc()))
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

pub(crate) fn uuid_at(row: &Row<'_>, column: &str) -> rusqlite::Result<Uuid> {
    Ok(row.get::<_, DbUuid>(column)?.0)
}

pub(crate) fn time_at(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    Ok(row.get::<_, DbTime>(column)?.0)
}

pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub avatar_url: String,
    pub cover_image_url: String,
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub(crate) const COLUMNS: &'static str = "id, username, email, full_name, password_hash, avatar_url, \
         cover_image_url, refresh_token_hash, created_at, updated_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_at(row, "id")?,
            username: row.get("username")?,
            email: row.get("email")?,
            full_name: row.get("full_name")?,
            password_hash: row.get("password_hash")?,
            avatar_url: row.get("avatar_url")?,
            cover_image_url: row.get("cover_image_url")?,
            refresh_token_hash: row.get("refresh_token_hash")?,
            created_at: time_at(row, "created_at")?,
            updated_at: time_at(row, "updated_at")?,
        })
    }

    /// The credential-free view of this user.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar_url: self.avatar_url.clone(),
            cover_image_url: self.cover_image_url.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    pub password_hash: &'a str,
    pub avatar_url: &'a str,
    pub cover_image_url: &'a str,
}

#[derive(Debug, Clone)]
pub struct VideoRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub media_url: String,
    pub thumbnail_url: String,
    pub duration_seconds: f64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoRow {
    pub(crate) const COLUMNS: &'static str = "id, owner_id, title, description, media_url, \
         thumbnail_url, duration_seconds, is_published, created_at, updated_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_at(row, "id")?,
            owner_id: uuid_at(row, "owner_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            media_url: row.get("media_url")?,
            thumbnail_url: row.get("thumbnail_url")?,
            duration_seconds: row.get("duration_seconds")?,
            is_published: row.get("is_published")?,
            created_at: time_at(row, "created_at")?,
            updated_at: time_at(row, "updated_at")?,
        })
    }
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Video {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            media_url: row.media_url,
            thumbnail_url: row.thumbnail_url,
            duration_seconds: row.duration_seconds,
            is_published: row.is_published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct NewVideo<'a> {
    pub owner_id: Uuid,
    pub title: &'a str,
    pub description: &'a str,
    pub media_url: &'a str,
    pub thumbnail_url: &'a str,
    pub duration_seconds: f64,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Default)]
pub struct VideoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TweetRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TweetRow {
    pub(crate) const COLUMNS: &'static str = "id, owner_id, content, created_at, updated_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_at(row, "id")?,
            owner_id: uuid_at(row, "owner_id")?,
            content: row.get("content")?,
            created_at: time_at(row, "created_at")?,
            updated_at: time_at(row, "updated_at")?,
        })
    }
}

impl From<TweetRow> for Tweet {
    fn from(row: TweetRow) -> Self {
        Tweet {
            id: row.id,
            owner_id: row.owner_id,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: Uuid,
    pub video_id: Uuid,
    pub owner_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentRow {
    pub(crate) const COLUMNS: &'static str = "id, video_id, owner_id, content, created_at, updated_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_at(row, "id")?,
            video_id: uuid_at(row, "video_id")?,
            owner_id: uuid_at(row, "owner_id")?,
            content: row.get("content")?,
            created_at: time_at(row, "created_at")?,
            updated_at: time_at(row, "updated_at")?,
        })
    }
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            video_id: row.video_id,
            owner_id: row.owner_id,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaylistRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    /// In position order; may contain duplicates.
    pub video_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PlaylistRow> for Playlist {
    fn from(row: PlaylistRow) -> Self {
        Playlist {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            description: row.description,
            video_ids: row.video_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Default)]
pub struct PlaylistPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Owned for VideoRow {
    fn kind(&self) -> EntityKind {
        EntityKind::Video
    }
    fn id(&self) -> Uuid {
        self.id
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

impl Owned for TweetRow {
    fn kind(&self) -> EntityKind {
        EntityKind::Tweet
    }
    fn id(&self) -> Uuid {
        self.id
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

impl Owned for CommentRow {
    fn kind(&self) -> EntityKind {
        EntityKind::Comment
    }
    fn id(&self) -> Uuid {
        self.id
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

impl Owned for PlaylistRow {
    fn kind(&self) -> EntityKind {
        EntityKind::Playlist
    }
    fn id(&self) -> Uuid {
        self.id
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}
