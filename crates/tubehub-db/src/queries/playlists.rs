use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use tubehub_types::models::EntityKind;

use crate::Database;
use crate::error::{StoreError, StoreResult};
use crate::guard::{ensure_exists, ensure_owner, ensure_visible};
use crate::models::{DbUuid, PlaylistPatch, PlaylistRow, now, time_at, uuid_at};

impl Database {
    pub fn create_playlist(&self, owner: Uuid, name: &str, description: &str) -> StoreResult<PlaylistRow> {
        let id = Uuid::new_v4();
        self.with_conn_mut(|conn| {
            ensure_exists(conn, EntityKind::User, owner)?;
            conn.execute(
                "INSERT INTO playlists (id, owner_id, name, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![id.to_string(), owner.to_string(), name.trim(), description.trim(), now()],
            )?;
            load_playlist(conn, id)
        })
    }

    pub fn get_playlist(&self, id: Uuid) -> StoreResult<Option<PlaylistRow>> {
        self.with_conn(|conn| match load_playlist(conn, id) {
            Ok(row) => Ok(Some(row)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        })
    }

    pub fn update_playlist(&self, id: Uuid, patch: &PlaylistPatch, actor: Uuid) -> StoreResult<PlaylistRow> {
        self.with_conn_mut(|conn| {
            ensure_owner(conn, EntityKind::Playlist, id, actor)?;
            conn.execute(
                "UPDATE playlists
                 SET name = COALESCE(?2, name),
                     description = COALESCE(?3, description),
                     updated_at = ?4
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    patch.name.as_deref().map(str::trim),
                    patch.description.as_deref().map(str::trim),
                    now(),
                ],
            )?;
            load_playlist(conn, id)
        })
    }

    /// Entries go with the playlist by foreign-key cascade.
    pub fn delete_playlist(&self, id: Uuid, actor: Uuid) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            ensure_owner(conn, EntityKind::Playlist, id, actor)?;
            conn.execute("DELETE FROM playlists WHERE id = ?1", [id.to_string()])?;
            Ok(())
        })
    }

    /// Appends `video` at the end of the playlist. Repeated adds append again.
    pub fn add_playlist_video(&self, playlist: Uuid, video: Uuid, actor: Uuid) -> StoreResult<PlaylistRow> {
        self.with_conn_mut(|conn| {
            ensure_owner(conn, EntityKind::Playlist, playlist, actor)?;
            ensure_visible(conn, EntityKind::Video, video, actor)?;
            let ts = now();
            conn.execute(
                "INSERT INTO playlist_videos (id, playlist_id, position, video_id, added_at)
                 SELECT ?1, ?2, COALESCE(MAX(position), -1) + 1, ?3, ?4
                 FROM playlist_videos WHERE playlist_id = ?2",
                rusqlite::params![Uuid::new_v4().to_string(), playlist.to_string(), video.to_string(), ts],
            )?;
            touch(conn, playlist, &ts)?;
            load_playlist(conn, playlist)
        })
    }

    /// Removes every occurrence of `video` from the playlist. Removing a
    /// video that is not in the playlist is not an error.
    pub fn remove_playlist_video(&self, playlist: Uuid, video: Uuid, actor: Uuid) -> StoreResult<PlaylistRow> {
        self.with_conn_mut(|conn| {
            ensure_owner(conn, EntityKind::Playlist, playlist, actor)?;
            let removed = conn.execute(
                "DELETE FROM playlist_videos WHERE playlist_id = ?1 AND video_id = ?2",
                [playlist.to_string(), video.to_string()],
            )?;
            if removed > 0 {
                touch(conn, playlist, &now())?;
            }
            load_playlist(conn, playlist)
        })
    }
}

fn touch(conn: &Connection, playlist: Uuid, ts: &str) -> StoreResult<()> {
    conn.execute(
        "UPDATE playlists SET updated_at = ?2 WHERE id = ?1",
        rusqlite::params![playlist.to_string(), ts],
    )?;
    Ok(())
}

fn load_playlist(conn: &Connection, id: Uuid) -> StoreResult<PlaylistRow> {
    let id_text = id.to_string();
    let mut row = conn
        .query_row(
            "SELECT id, owner_id, name, description, created_at, updated_at FROM playlists WHERE id = ?1",
            [&id_text],
            |row| {
                Ok(PlaylistRow {
                    id: uuid_at(row, "id")?,
                    owner_id: uuid_at(row, "owner_id")?,
                    name: row.get("name")?,
                    description: row.get("description")?,
                    video_ids: Vec::new(),
                    created_at: time_at(row, "created_at")?,
                    updated_at: time_at(row, "updated_at")?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| StoreError::not_found(EntityKind::Playlist, id))?;

    let mut stmt = conn.prepare(
        "SELECT video_id FROM playlist_videos WHERE playlist_id = ?1 ORDER BY position ASC",
    )?;
    row.video_ids = stmt
        .query_map([&id_text], |r| r.get::<_, DbUuid>(0).map(|u| u.0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_user, seed_video, test_db};

    #[test]
    fn entries_keep_order_and_allow_duplicates() {
        let db = test_db();
        let owner = seed_user(&db, "curator");
        let a = seed_video(&db, owner, "a", true);
        let b = seed_video(&db, owner, "b", true);
        let list = db.create_playlist(owner, " mix ", " stuff ").unwrap();
        assert_eq!(list.name, "mix");

        db.add_playlist_video(list.id, a, owner).unwrap();
        db.add_playlist_video(list.id, b, owner).unwrap();
        let list = db.add_playlist_video(list.id, a, owner).unwrap();
        assert_eq!(list.video_ids, vec![a, b, a]);

        let list = db.remove_playlist_video(list.id, a, owner).unwrap();
        assert_eq!(list.video_ids, vec![b]);
    }

    #[test]
    fn only_the_owner_mutates_entries() {
        let db = test_db();
        let owner = seed_user(&db, "curator");
        let other = seed_user(&db, "other");
        let video = seed_video(&db, owner, "a", true);
        let list = db.create_playlist(owner, "mine", "hands off").unwrap();

        assert!(matches!(
            db.add_playlist_video(list.id, video, other),
            Err(StoreError::NotOwner { .. })
        ));
        assert!(matches!(
            db.add_playlist_video(list.id, Uuid::new_v4(), owner),
            Err(StoreError::NotFound { kind: EntityKind::Video, .. })
        ));
        assert!(matches!(
            db.delete_playlist(list.id, other),
            Err(StoreError::NotOwner { .. })
        ));

        let draft = seed_video(&db, owner, "draft", false);
        let theirs = db.create_playlist(other, "theirs", "borrowed").unwrap();
        assert!(matches!(
            db.add_playlist_video(theirs.id, draft, other),
            Err(StoreError::NotFound { kind: EntityKind::Video, .. })
        ));
        db.add_playlist_video(list.id, draft, owner).unwrap();

        db.delete_playlist(list.id, owner).unwrap();
        assert!(db.get_playlist(list.id).unwrap().is_none());
    }

    #[test]
    fn deleting_a_video_drops_it_from_playlists() {
        let db = test_db();
        let owner = seed_user(&db, "curator");
        let video = seed_video(&db, owner, "gone soon", true);
        let list = db.create_playlist(owner, "mix", "stuff").unwrap();
        db.add_playlist_video(list.id, video, owner).unwrap();

        db.delete_video(video, owner).unwrap();
        assert!(db.get_playlist(list.id).unwrap().unwrap().video_ids.is_empty());
    }
}
