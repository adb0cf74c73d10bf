use rusqlite::OptionalExtension;
use uuid::Uuid;

use tubehub_types::models::EntityKind;

use crate::Database;
use crate::error::StoreResult;
use crate::guard::{ensure_exists, ensure_owner};
use crate::models::{TweetRow, now};

impl Database {
    pub fn create_tweet(&self, owner: Uuid, content: &str) -> StoreResult<TweetRow> {
        let sql = format!(
            "INSERT INTO tweets (id, owner_id, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             RETURNING {}",
            TweetRow::COLUMNS
        );

        self.with_conn_mut(|conn| {
            ensure_exists(conn, EntityKind::User, owner)?;
            let row = conn.query_row(
                &sql,
                rusqlite::params![Uuid::new_v4().to_string(), owner.to_string(), content.trim(), now()],
                TweetRow::from_row,
            )?;
            Ok(row)
        })
    }

    pub fn get_tweet(&self, id: Uuid) -> StoreResult<Option<TweetRow>> {
        let sql = format!("SELECT {} FROM tweets WHERE id = ?1", TweetRow::COLUMNS);
        self.with_conn(|conn| {
            let row = conn
                .query_row(&sql, [id.to_string()], TweetRow::from_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn update_tweet(&self, id: Uuid, content: &str, actor: Uuid) -> StoreResult<TweetRow> {
        let sql = format!(
            "UPDATE tweets SET content = ?2, updated_at = ?3 WHERE id = ?1 RETURNING {}",
            TweetRow::COLUMNS
        );

        self.with_conn_mut(|conn| {
            ensure_owner(conn, EntityKind::Tweet, id, actor)?;
            let row = conn.query_row(
                &sql,
                rusqlite::params![id.to_string(), content.trim(), now()],
                TweetRow::from_row,
            )?;
            Ok(row)
        })
    }

    /// Deletes a tweet and the likes attached to it.
    pub fn delete_tweet(&self, id: Uuid, actor: Uuid) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            ensure_owner(conn, EntityKind::Tweet, id, actor)?;
            let id = id.to_string();
            conn.execute(
                "DELETE FROM likes WHERE subject_kind = 'tweet' AND subject_id = ?1",
                [&id],
            )?;
            conn.execute("DELETE FROM tweets WHERE id = ?1", [&id])?;
            Ok(())
        })
    }
}
