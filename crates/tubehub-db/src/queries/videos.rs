use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use tubehub_types::models::EntityKind;

use crate::Database;
use crate::error::{StoreError, StoreResult};
use crate::guard::{ensure_exists, ensure_owner};
use crate::models::{NewVideo, VideoPatch, VideoRow, now};

impl Database {
    pub fn create_video(&self, new: NewVideo<'_>) -> StoreResult<VideoRow> {
        let id = Uuid::new_v4();
        let ts = now();
        let sql = format!(
            "INSERT INTO videos (id, owner_id, title, description, media_url, thumbnail_url,
                                 duration_seconds, is_published, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)
             RETURNING {}",
            VideoRow::COLUMNS
        );

        self.with_conn_mut(|conn| {
            ensure_exists(conn, EntityKind::User, new.owner_id)?;
            let row = conn.query_row(
                &sql,
                rusqlite::params![
                    id.to_string(),
                    new.owner_id.to_string(),
                    new.title.trim(),
                    new.description.trim(),
                    new.media_url,
                    new.thumbnail_url,
                    new.duration_seconds,
                    ts,
                ],
                VideoRow::from_row,
            )?;
            Ok(row)
        })
    }

    pub fn get_video(&self, id: Uuid) -> StoreResult<Option<VideoRow>> {
        let sql = format!("SELECT {} FROM videos WHERE id = ?1", VideoRow::COLUMNS);
        self.with_conn(|conn| {
            let row = conn
                .query_row(&sql, [id.to_string()], VideoRow::from_row)
                .optional()?;
            Ok(row)
        })
    }

    /// Owner-only patch of the editable video fields, applied as one statement.
    pub fn update_video(&self, id: Uuid, patch: &VideoPatch, actor: Uuid) -> StoreResult<VideoRow> {
        let sql = format!(
            "UPDATE videos
             SET title = COALESCE(?2, title),
                 description = COALESCE(?3, description),
                 thumbnail_url = COALESCE(?4, thumbnail_url),
                 updated_at = ?5
             WHERE id = ?1
             RETURNING {}",
            VideoRow::COLUMNS
        );

        self.with_conn_mut(|conn| {
            ensure_owner(conn, EntityKind::Video, id, actor)?;
            let row = conn.query_row(
                &sql,
                rusqlite::params![
                    id.to_string(),
                    patch.title.as_deref().map(str::trim),
                    patch.description.as_deref().map(str::trim),
                    patch.thumbnail_url,
                    now(),
                ],
                VideoRow::from_row,
            )?;
            Ok(row)
        })
    }

    pub fn toggle_publish(&self, id: Uuid, actor: Uuid) -> StoreResult<VideoRow> {
        let sql = format!(
            "UPDATE videos SET is_published = NOT is_published, updated_at = ?2
             WHERE id = ?1
             RETURNING {}",
            VideoRow::COLUMNS
        );

        self.with_conn_mut(|conn| {
            ensure_owner(conn, EntityKind::Video, id, actor)?;
            let row = conn.query_row(&sql, rusqlite::params![id.to_string(), now()], VideoRow::from_row)?;
            Ok(row)
        })
    }

    /// Deletes a video together with everything that hangs off it: its
    /// comments, views and playlist entries (by foreign-key cascade) and the
    /// likes on the video and on its comments.
    pub fn delete_video(&self, id: Uuid, actor: Uuid) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            ensure_owner(conn, EntityKind::Video, id, actor)?;
            let id = id.to_string();
            conn.execute(
                "DELETE FROM likes
                 WHERE subject_kind = 'comment'
                   AND subject_id IN (SELECT id FROM comments WHERE video_id = ?1)",
                [&id],
            )?;
            conn.execute(
                "DELETE FROM likes WHERE subject_kind = 'video' AND subject_id = ?1",
                [&id],
            )?;
            conn.execute("DELETE FROM videos WHERE id = ?1", [&id])?;
            Ok(())
        })
    }

    /// Appends a view of `video` by `viewer`. View counts and watch history
    /// are both derived from these rows.
    pub fn record_view(&self, video: Uuid, viewer: Uuid) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            ensure_exists(conn, EntityKind::Video, video)?;
            insert_view(conn, video, viewer)
        })
    }

    pub fn view_count(&self, video: Uuid) -> StoreResult<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM video_views WHERE video_id = ?1",
                [video.to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

pub(crate) fn insert_view(conn: &Connection, video: Uuid, viewer: Uuid) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO video_views (id, video_id, viewer_id, viewed_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            Uuid::new_v4().to_string(),
            video.to_string(),
            viewer.to_string(),
            now(),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_user, seed_video, test_db};

    #[test]
    fn owner_can_patch_and_non_owner_cannot() {
        let db = test_db();
        let owner = seed_user(&db, "owner");
        let stranger = seed_user(&db, "stranger");
        let video = seed_video(&db, owner, "before", true);

        let patch = VideoPatch {
            title: Some("after".into()),
            ..Default::default()
        };

        let err = db.update_video(video, &patch, stranger).err().unwrap();
        assert!(matches!(err, StoreError::NotOwner { .. }));
        assert_eq!(db.get_video(video).unwrap().unwrap().title, "before");

        let updated = db.update_video(video, &patch, owner).unwrap();
        assert_eq!(updated.title, "after");
        assert_eq!(updated.description, "description of before");
    }

    #[test]
    fn toggle_publish_flips_visibility() {
        let db = test_db();
        let owner = seed_user(&db, "owner");
        let video = seed_video(&db, owner, "clip", true);

        assert!(!db.toggle_publish(video, owner).unwrap().is_published);
        assert!(db.toggle_publish(video, owner).unwrap().is_published);
    }

    #[test]
    fn view_count_only_grows() {
        let db = test_db();
        let owner = seed_user(&db, "owner");
        let viewer = seed_user(&db, "viewer");
        let video = seed_video(&db, owner, "clip", true);

        let mut last = db.view_count(video).unwrap();
        for _ in 0..3 {
            db.record_view(video, viewer).unwrap();
            let next = db.view_count(video).unwrap();
            assert!(next > last);
            last = next;
        }
        assert_eq!(last, 3);
    }

    #[test]
    fn delete_cascades_to_dependents() {
        let db = test_db();
        let owner = seed_user(&db, "owner");
        let fan = seed_user(&db, "fan");
        let video = seed_video(&db, owner, "clip", true);
        let comment = db.create_comment(video, fan, "nice").unwrap();
        db.toggle(crate::relations::Relation::like_comment(comment.id), owner).unwrap();
        db.toggle(crate::relations::Relation::like_video(video), fan).unwrap();
        db.record_view(video, fan).unwrap();

        let err = db.delete_video(video, fan).err().unwrap();
        assert!(matches!(err, StoreError::NotOwner { .. }));

        db.delete_video(video, owner).unwrap();
        assert!(db.get_video(video).unwrap().is_none());
        assert!(db.get_comment(comment.id).unwrap().is_none());

        let leftovers: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT (SELECT COUNT(*) FROM likes) + (SELECT COUNT(*) FROM video_views)",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(leftovers, 0);
    }
}
