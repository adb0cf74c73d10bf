use rusqlite::{Connection, OptionalExtension, ToSql};
use uuid::Uuid;

use tubehub_types::models::EntityKind;

use crate::Database;
use crate::error::{StoreError, StoreResult, map_unique};
use crate::models::{NewUser, UserRow, now};

impl Database {
    /// Inserts a user. Username and email are stored lowercased; uniqueness
    /// is enforced by the table, surfacing as `DuplicateKey`.
    pub fn create_user(&self, new: NewUser<'_>) -> StoreResult<UserRow> {
        let id = Uuid::new_v4();
        let username = new.username.trim().to_lowercase();
        let email = new.email.trim().to_lowercase();
        let ts = now();

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, full_name, password_hash, avatar_url,
                                    cover_image_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                rusqlite::params![
                    id.to_string(),
                    username,
                    email,
                    new.full_name.trim(),
                    new.password_hash,
                    new.avatar_url,
                    new.cover_image_url,
                    ts,
                ],
            )
            .map_err(map_unique)?;

            query_user(conn, "id = ?1", &[&id.to_string()])?
                .ok_or_else(|| StoreError::not_found(EntityKind::User, id))
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &[&id.to_string()]))
    }

    /// Looks a user up by username or email, whichever is given.
    pub fn find_user_for_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> StoreResult<Option<UserRow>> {
        let username = username.map(|u| u.trim().to_lowercase());
        let email = email.map(|e| e.trim().to_lowercase());

        self.with_conn(|conn| {
            query_user(
                conn,
                "username = ?1 OR email = ?2",
                &[&username, &email],
            )
        })
    }

    pub fn user_exists(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                [id.to_string()],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Stores (or clears, with `None`) the digest of the user's current
    /// refresh token.
    pub fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> StoreResult<()> {
        self.update_user(id, "refresh_token_hash = ?2", &[&hash]).map(|_| ())
    }

    /// Replaces the stored refresh digest `current` with `next` in one
    /// statement. Returns `false` and changes nothing when `current` is no
    /// longer the stored digest, so each refresh token rotates at most once.
    pub fn rotate_refresh_token_hash(&self, id: Uuid, current: &str, next: &str) -> StoreResult<bool> {
        let ts = now();
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET refresh_token_hash = ?3, updated_at = ?4
                 WHERE id = ?1 AND refresh_token_hash = ?2",
                rusqlite::params![id.to_string(), current, next, ts],
            )?;
            Ok(changed == 1)
        })
    }

    /// Replaces the password hash and revokes the refresh token.
    pub fn set_password_hash(&self, id: Uuid, hash: &str) -> StoreResult<()> {
        self.update_user(id, "password_hash = ?2, refresh_token_hash = NULL", &[&hash])
            .map(|_| ())
    }

    pub fn update_account(
        &self,
        id: Uuid,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> StoreResult<UserRow> {
        let full_name = full_name.map(str::trim);
        let email = email.map(|e| e.trim().to_lowercase());
        self.update_user(
            id,
            "full_name = COALESCE(?2, full_name), email = COALESCE(?3, email)",
            &[&full_name, &email],
        )
    }

    pub fn set_avatar_url(&self, id: Uuid, url: &str) -> StoreResult<UserRow> {
        self.update_user(id, "avatar_url = ?2", &[&url])
    }

    pub fn set_cover_image_url(&self, id: Uuid, url: &str) -> StoreResult<UserRow> {
        self.update_user(id, "cover_image_url = ?2", &[&url])
    }

    /// Applies `assignments` to one user in a single statement. `?1` is bound
    /// to the id; `params` bind from `?2` on.
    fn update_user(
        &self,
        id: Uuid,
        assignments: &str,
        params: &[&dyn ToSql],
    ) -> StoreResult<UserRow> {
        let sql = format!(
            "UPDATE users SET {assignments}, updated_at = ?{ts} WHERE id = ?1 RETURNING {}",
            UserRow::COLUMNS,
            ts = params.len() + 2,
        );
        let id_text = id.to_string();
        let ts = now();

        let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(params.len() + 2);
        bound.push(&id_text);
        bound.extend_from_slice(params);
        bound.push(&ts);

        self.with_conn_mut(|conn| {
            conn.query_row(&sql, bound.as_slice(), UserRow::from_row)
                .optional()
                .map_err(map_unique)?
                .ok_or_else(|| StoreError::not_found(EntityKind::User, id))
        })
    }
}

fn query_user(
    conn: &Connection,
    condition: &str,
    params: &[&dyn ToSql],
) -> StoreResult<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {condition}", UserRow::COLUMNS);
    let row = conn.query_row(&sql, params, UserRow::from_row).optional()?;
    Ok(row)
}
