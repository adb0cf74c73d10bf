//! Ownership and visibility checks applied before writes.

use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use tubehub_types::models::EntityKind;

use crate::error::{StoreError, StoreResult};
use crate::models::DbUuid;

pub trait Owned {
    fn kind(&self) -> EntityKind;
    fn id(&self) -> Uuid;
    fn owner_id(&self) -> Uuid;
}

/// Fails with `NotOwner` unless `actor` owns `entity`.
pub fn require_owner<E: Owned + ?Sized>(entity: &E, actor: Uuid) -> StoreResult<()> {
    if entity.owner_id() == actor {
        Ok(())
    } else {
        Err(StoreError::NotOwner {
            kind: entity.kind(),
            id: entity.id(),
            actor,
        })
    }
}

/// Just enough of a record to decide ownership.
pub(crate) struct Ownership {
    kind: EntityKind,
    id: Uuid,
    owner_id: Uuid,
}

impl Owned for Ownership {
    fn kind(&self) -> EntityKind {
        self.kind
    }
    fn id(&self) -> Uuid {
        self.id
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

pub(crate) fn table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::User => "users",
        EntityKind::Video => "videos",
        EntityKind::Tweet => "tweets",
        EntityKind::Comment => "comments",
        EntityKind::Playlist => "playlists",
    }
}

/// Loads the owner of `id`, distinguishing a missing record (`NotFound`) from
/// one owned by someone else (`NotOwner`). A user owns their own record.
pub(crate) fn ensure_owner(
    conn: &Connection,
    kind: EntityKind,
    id: Uuid,
    actor: Uuid,
) -> StoreResult<()> {
    let owner_column = match kind {
        EntityKind::User => "id",
        _ => "owner_id",
    };
    let sql = format!("SELECT {owner_column} FROM {} WHERE id = ?1", table(kind));

    let owner_id = conn
        .query_row(&sql, [id.to_string()], |row| row.get::<_, DbUuid>(0))
        .optional()?
        .ok_or_else(|| StoreError::not_found(kind, id))?
        .0;

    require_owner(&Ownership { kind, id, owner_id }, actor)
}

/// `NotFound` unless a row with `id` exists in the table of `kind`.
pub(crate) fn ensure_exists(conn: &Connection, kind: EntityKind, id: Uuid) -> StoreResult<()> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table(kind));
    let exists: bool = conn.query_row(&sql, [id.to_string()], |row| row.get(0))?;
    if exists {
        Ok(())
    } else {
        Err(StoreError::not_found(kind, id))
    }
}

/// `NotFound` unless `actor` can see the subject: a video must be published
/// or owned by `actor`, and a comment must sit on such a video. Hidden
/// subjects look exactly like missing ones.
pub(crate) fn ensure_visible(conn: &Connection, kind: EntityKind, id: Uuid, actor: Uuid) -> StoreResult<()> {
    let sql = match kind {
        EntityKind::Video => {
            "SELECT EXISTS(SELECT 1 FROM videos
             WHERE id = ?1 AND (is_published = 1 OR owner_id = ?2))"
        }
        EntityKind::Comment => {
            "SELECT EXISTS(SELECT 1 FROM comments c JOIN videos v ON v.id = c.video_id
             WHERE c.id = ?1 AND (v.is_published = 1 OR v.owner_id = ?2))"
        }
        _ => return ensure_exists(conn, kind, id),
    };
    let visible: bool = conn.query_row(sql, [id.to_string(), actor.to_string()], |row| row.get(0))?;
    if visible {
        Ok(())
    } else {
        Err(StoreError::not_found(kind, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_user, seed_video, test_db};

    #[test]
    fn distinguishes_missing_from_foreign() {
        let db = test_db();
        let owner = seed_user(&db, "owner");
        let other = seed_user(&db, "other");
        let video = seed_video(&db, owner, "clip", true);

        db.with_conn(|conn| {
            assert!(ensure_owner(conn, EntityKind::Video, video, owner).is_ok());
            assert!(matches!(
                ensure_owner(conn, EntityKind::Video, video, other),
                Err(StoreError::NotOwner { .. })
            ));
            assert!(matches!(
                ensure_owner(conn, EntityKind::Video, Uuid::new_v4(), owner),
                Err(StoreError::NotFound { .. })
            ));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn hidden_videos_and_their_comments_look_missing() {
        let db = test_db();
        let owner = seed_user(&db, "owner");
        let other = seed_user(&db, "other");
        let video = seed_video(&db, owner, "clip", true);
        let comment = db.create_comment(video, other, "first").unwrap().id;
        db.toggle_publish(video, owner).unwrap();

        db.with_conn(|conn| {
            ensure_visible(conn, EntityKind::Video, video, owner)?;
            ensure_visible(conn, EntityKind::Comment, comment, owner)?;
            assert!(matches!(
                ensure_visible(conn, EntityKind::Video, video, other),
                Err(StoreError::NotFound { kind: EntityKind::Video, .. })
            ));
            assert!(matches!(
                ensure_visible(conn, EntityKind::Comment, comment, other),
                Err(StoreError::NotFound { kind: EntityKind::Comment, .. })
            ));
            ensure_visible(conn, EntityKind::User, owner, other)
        })
        .unwrap();
    }

    #[test]
    fn users_own_themselves() {
        let db = test_db();
        let user = seed_user(&db, "self");
        db.with_conn(|conn| ensure_owner(conn, EntityKind::User, user, user)).unwrap();
    }
}
