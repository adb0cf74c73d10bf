//! Decoding of view output rows into read models, by output name.

use rusqlite::Row;
use rusqlite::types::Type;

use tubehub_types::models::LikeKind;
use tubehub_types::views::{
    ChannelProfile, ChannelStats, ChannelSummary, CommentView, LikedSubject, LikedVideo,
    OwnerSummary, PlaylistEntry, PlaylistSummary, TweetView, VideoCard, VideoDetail,
    WatchHistoryEntry,
};

use crate::models::{time_at, uuid_at};

pub trait FromViewRow: Sized {
    fn from_view_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Reads the `owner_*` outputs every owner-bearing view projects.
pub(crate) fn owner(row: &Row<'_>) -> rusqlite::Result<OwnerSummary> {
    Ok(OwnerSummary {
        id: uuid_at(row, "owner_id")?,
        username: row.get("owner_username")?,
        full_name: row.get("owner_full_name")?,
        avatar_url: row.get("owner_avatar_url")?,
    })
}

impl FromViewRow for VideoCard {
    fn from_view_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(VideoCard {
            id: uuid_at(row, "id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            media_url: row.get("media_url")?,
            thumbnail_url: row.get("thumbnail_url")?,
            duration_seconds: row.get("duration_seconds")?,
            view_count: row.get("view_count")?,
            like_count: row.get("like_count")?,
            is_published: row.get("is_published")?,
            created_at: time_at(row, "created_at")?,
            owner: owner(row)?,
        })
    }
}

impl FromViewRow for VideoDetail {
    fn from_view_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(VideoDetail {
            video: VideoCard::from_view_row(row)?,
            is_liked: row.get("is_liked")?,
            owner_subscriber_count: row.get("owner_subscriber_count")?,
            is_subscribed_to_owner: row.get("is_subscribed_to_owner")?,
        })
    }
}

impl FromViewRow for WatchHistoryEntry {
    fn from_view_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(WatchHistoryEntry {
            last_watched_at: time_at(row, "last_watched_at")?,
            video: VideoCard::from_view_row(row)?,
        })
    }
}

impl FromViewRow for LikedVideo {
    fn from_view_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(LikedVideo {
            liked_at: time_at(row, "liked_at")?,
            video: VideoCard::from_view_row(row)?,
        })
    }
}

impl FromViewRow for PlaylistEntry {
    fn from_view_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PlaylistEntry {
            position: row.get("position")?,
            added_at: time_at(row, "added_at")?,
            video: VideoCard::from_view_row(row)?,
        })
    }
}

impl FromViewRow for ChannelProfile {
    fn from_view_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ChannelProfile {
            id: uuid_at(row, "id")?,
            username: row.get("username")?,
            full_name: row.get("full_name")?,
            avatar_url: row.get("avatar_url")?,
            cover_image_url: row.get("cover_image_url")?,
            subscriber_count: row.get("subscriber_count")?,
            subscribed_to_count: row.get("subscribed_to_count")?,
            is_subscribed: row.get("is_subscribed")?,
        })
    }
}

impl FromViewRow for ChannelStats {
    fn from_view_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ChannelStats {
            id: uuid_at(row, "id")?,
            username: row.get("username")?,
            full_name: row.get("full_name")?,
            avatar_url: row.get("avatar_url")?,
            cover_image_url: row.get("cover_image_url")?,
            video_count: row.get("video_count")?,
            view_count: row.get("view_count")?,
            like_count: row.get("like_count")?,
            subscriber_count: row.get("subscriber_count")?,
            total_duration_seconds: row.get("total_duration_seconds")?,
        })
    }
}

impl FromViewRow for ChannelSummary {
    fn from_view_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ChannelSummary {
            id: uuid_at(row, "id")?,
            username: row.get("username")?,
            full_name: row.get("full_name")?,
            avatar_url: row.get("avatar_url")?,
            subscriber_count: row.get("subscriber_count")?,
            is_subscribed: row.get("is_subscribed")?,
            subscribed_at: time_at(row, "subscribed_at")?,
        })
    }
}

impl FromViewRow for CommentView {
    fn from_view_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CommentView {
            id: uuid_at(row, "id")?,
            video_id: uuid_at(row, "video_id")?,
            content: row.get("content")?,
            created_at: time_at(row, "created_at")?,
            updated_at: time_at(row, "updated_at")?,
            like_count: row.get("like_count")?,
            is_liked: row.get("is_liked")?,
            owner: owner(row)?,
        })
    }
}

impl FromViewRow for TweetView {
    fn from_view_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(TweetView {
            id: uuid_at(row, "id")?,
            content: row.get("content")?,
            created_at: time_at(row, "created_at")?,
            updated_at: time_at(row, "updated_at")?,
            like_count: row.get("like_count")?,
            is_liked: row.get("is_liked")?,
            owner: owner(row)?,
        })
    }
}

impl FromViewRow for LikedSubject {
    fn from_view_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind: String = row.get("subject_kind")?;
        let subject_kind = kind.parse::<LikeKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, Type::Text, e.into())
        })?;
        Ok(LikedSubject {
            like_id: uuid_at(row, "id")?,
            subject_kind,
            subject_id: uuid_at(row, "subject_id")?,
            liked_at: time_at(row, "liked_at")?,
        })
    }
}

impl FromViewRow for PlaylistSummary {
    fn from_view_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PlaylistSummary {
            id: uuid_at(row, "id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            video_count: row.get("video_count")?,
            total_duration_seconds: row.get("total_duration_seconds")?,
            cover_thumbnail_url: row.get("cover_thumbnail_url")?,
            created_at: time_at(row, "created_at")?,
            updated_at: time_at(row, "updated_at")?,
            owner: owner(row)?,
        })
    }
}
