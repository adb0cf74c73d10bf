use rusqlite::OptionalExtension;
use uuid::Uuid;

use tubehub_types::models::EntityKind;

use crate::Database;
use crate::error::StoreResult;
use crate::guard::{ensure_owner, ensure_visible};
use crate::models::{CommentRow, now};

impl Database {
    /// Adds a comment to a video the author can see; `NotFound` if the video
    /// is gone or hidden from them.
    pub fn create_comment(&self, video: Uuid, owner: Uuid, content: &str) -> StoreResult<CommentRow> {
        let sql = format!(
            "INSERT INTO comments (id, video_id, owner_id, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             RETURNING {}",
            CommentRow::COLUMNS
        );

        self.with_conn_mut(|conn| {
            ensure_visible(conn, EntityKind::Video, video, owner)?;
            let row = conn.query_row(
                &sql,
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    video.to_string(),
                    owner.to_string(),
                    content.trim(),
                    now(),
                ],
                CommentRow::from_row,
            )?;
            Ok(row)
        })
    }

    pub fn get_comment(&self, id: Uuid) -> StoreResult<Option<CommentRow>> {
        let sql = format!("SELECT {} FROM comments WHERE id = ?1", CommentRow::COLUMNS);
        self.with_conn(|conn| {
            let row = conn
                .query_row(&sql, [id.to_string()], CommentRow::from_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn update_comment(&self, id: Uuid, content: &str, actor: Uuid) -> StoreResult<CommentRow> {
        let sql = format!(
            "UPDATE comments SET content = ?2, updated_at = ?3 WHERE id = ?1 RETURNING {}",
            CommentRow::COLUMNS
        );

        self.with_conn_mut(|conn| {
            ensure_owner(conn, EntityKind::Comment, id, actor)?;
            let row = conn.query_row(
                &sql,
                rusqlite::params![id.to_string(), content.trim(), now()],
                CommentRow::from_row,
            )?;
            Ok(row)
        })
    }

    /// Deletes a comment and the likes attached to it.
    pub fn delete_comment(&self, id: Uuid, actor: Uuid) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            ensure_owner(conn, EntityKind::Comment, id, actor)?;
            let id = id.to_string();
            conn.execute(
                "DELETE FROM likes WHERE subject_kind = 'comment' AND subject_id = ?1",
                [&id],
            )?;
            conn.execute("DELETE FROM comments WHERE id = ?1", [&id])?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::test_support::{seed_user, seed_video, test_db};

    #[test]
    fn commenting_on_a_missing_video_is_not_found() {
        let db = test_db();
        let user = seed_user(&db, "commenter");
        let err = db.create_comment(Uuid::new_v4(), user, "hi").err().unwrap();
        assert!(matches!(err, StoreError::NotFound { kind: EntityKind::Video, .. }));
    }

    #[test]
    fn only_the_owner_comments_on_an_unpublished_video() {
        let db = test_db();
        let owner = seed_user(&db, "owner");
        let other = seed_user(&db, "other");
        let video = seed_video(&db, owner, "draft", false);

        let err = db.create_comment(video, other, "early").err().unwrap();
        assert!(matches!(err, StoreError::NotFound { kind: EntityKind::Video, .. }));
        db.create_comment(video, owner, "note to self").unwrap();
    }

    #[test]
    fn owner_edits_and_deletes() {
        let db = test_db();
        let owner = seed_user(&db, "owner");
        let commenter = seed_user(&db, "commenter");
        let video = seed_video(&db, owner, "clip", true);
        let comment = db.create_comment(video, commenter, "first!").unwrap();

        // The video owner does not own comments on it.
        assert!(matches!(
            db.update_comment(comment.id, "edited", owner),
            Err(StoreError::NotOwner { .. })
        ));

        let edited = db.update_comment(comment.id, " edited ", commenter).unwrap();
        assert_eq!(edited.content, "edited");

        db.delete_comment(comment.id, commenter).unwrap();
        assert!(db.get_comment(comment.id).unwrap().is_none());
    }
}
