//! Read models produced by the aggregation views in `tubehub-db`.
//!
//! Every user-bearing view carries only public user fields; credentials never
//! appear here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::LikeKind;

/// The public face of a user when nested inside another read model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelProfile {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar_url: String,
    pub cover_image_url: String,
    pub subscriber_count: i64,
    pub subscribed_to_count: i64,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar_url: String,
    pub cover_image_url: String,
    pub video_count: i64,
    pub view_count: i64,
    pub like_count: i64,
    pub subscriber_count: i64,
    pub total_duration_seconds: f64,
}

/// One row of a subscriber or subscription list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar_url: String,
    pub subscriber_count: i64,
    /// Whether the requesting actor subscribes to this channel.
    pub is_subscribed: bool,
    pub subscribed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCard {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub media_url: String,
    pub thumbnail_url: String,
    pub duration_seconds: f64,
    pub view_count: i64,
    pub like_count: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub owner: OwnerSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoDetail {
    #[serde(flatten)]
    pub video: VideoCard,
    pub is_liked: bool,
    pub owner_subscriber_count: i64,
    pub is_subscribed_to_owner: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: Uuid,
    pub video_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub like_count: i64,
    pub is_liked: bool,
    pub owner: OwnerSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetView {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub like_count: i64,
    pub is_liked: bool,
    pub owner: OwnerSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchHistoryEntry {
    pub last_watched_at: DateTime<Utc>,
    pub video: VideoCard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikedVideo {
    pub liked_at: DateTime<Utc>,
    pub video: VideoCard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikedSubject {
    pub like_id: Uuid,
    pub subject_kind: LikeKind,
    pub subject_id: Uuid,
    pub liked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub video_count: i64,
    pub total_duration_seconds: f64,
    /// Thumbnail of the first video in the playlist, if any.
    pub cover_thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner: OwnerSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub position: i64,
    pub added_at: DateTime<Utc>,
    pub video: VideoCard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistDetail {
    #[serde(flatten)]
    pub playlist: PlaylistSummary,
    pub videos: Vec<PlaylistEntry>,
}
