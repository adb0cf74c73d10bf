use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Ordered schema migrations. Each entry runs once; the applied version is
/// recorded in `schema_version`.
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (1, "initial schema", V1_INITIAL),
    (2, "engagement indexes", V2_INDEXES),
];

const V1_INITIAL: &str = "
    CREATE TABLE users (
        id                  TEXT PRIMARY KEY,
        username            TEXT NOT NULL UNIQUE,
        email               TEXT NOT NULL UNIQUE,
        full_name           TEXT NOT NULL,
        password_hash       TEXT NOT NULL,
        avatar_url          TEXT NOT NULL,
        cover_image_url     TEXT NOT NULL DEFAULT '',
        refresh_token_hash  TEXT,
        created_at          TEXT NOT NULL,
        updated_at          TEXT NOT NULL
    );

    CREATE TABLE videos (
        id                  TEXT PRIMARY KEY,
        owner_id            TEXT NOT NULL REFERENCES users(id),
        title               TEXT NOT NULL,
        description         TEXT NOT NULL,
        media_url           TEXT NOT NULL,
        thumbnail_url       TEXT NOT NULL,
        duration_seconds    REAL NOT NULL DEFAULT 0,
        is_published        INTEGER NOT NULL DEFAULT 1,
        created_at          TEXT NOT NULL,
        updated_at          TEXT NOT NULL
    );

    CREATE TABLE video_views (
        id          TEXT PRIMARY KEY,
        video_id    TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
        viewer_id   TEXT NOT NULL REFERENCES users(id),
        viewed_at   TEXT NOT NULL
    );

    CREATE TABLE tweets (
        id          TEXT PRIMARY KEY,
        owner_id    TEXT NOT NULL REFERENCES users(id),
        content     TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    );

    CREATE TABLE comments (
        id          TEXT PRIMARY KEY,
        video_id    TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
        owner_id    TEXT NOT NULL REFERENCES users(id),
        content     TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    );

    CREATE TABLE playlists (
        id          TEXT PRIMARY KEY,
        owner_id    TEXT NOT NULL REFERENCES users(id),
        name        TEXT NOT NULL,
        description TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    );

    CREATE TABLE playlist_videos (
        id          TEXT PRIMARY KEY,
        playlist_id TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
        position    INTEGER NOT NULL,
        video_id    TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
        added_at    TEXT NOT NULL,
        UNIQUE(playlist_id, position)
    );

    -- subject_id is polymorphic over videos/comments/tweets, so it carries no
    -- foreign key; deletes of a subject remove its likes explicitly.
    CREATE TABLE likes (
        id            TEXT PRIMARY KEY,
        subject_kind  TEXT NOT NULL CHECK (subject_kind IN ('video', 'comment', 'tweet')),
        subject_id    TEXT NOT NULL,
        liked_by      TEXT NOT NULL REFERENCES users(id),
        created_at    TEXT NOT NULL,
        UNIQUE(subject_kind, subject_id, liked_by)
    );

    CREATE TABLE subscriptions (
        id             TEXT PRIMARY KEY,
        channel_id     TEXT NOT NULL REFERENCES users(id),
        subscriber_id  TEXT NOT NULL REFERENCES users(id),
        created_at     TEXT NOT NULL,
        UNIQUE(channel_id, subscriber_id),
        CHECK (channel_id <> subscriber_id)
    );
";

const V2_INDEXES: &str = "
    CREATE INDEX idx_videos_owner ON videos(owner_id, created_at);
    CREATE INDEX idx_video_views_video ON video_views(video_id);
    CREATE INDEX idx_video_views_viewer ON video_views(viewer_id, viewed_at);
    CREATE INDEX idx_tweets_owner ON tweets(owner_id, created_at);
    CREATE INDEX idx_comments_video ON comments(video_id, created_at);
    CREATE INDEX idx_playlists_owner ON playlists(owner_id);
    CREATE INDEX idx_playlist_videos_video ON playlist_videos(video_id);
    CREATE INDEX idx_likes_subject ON likes(subject_kind, subject_id);
    CREATE INDEX idx_likes_user ON likes(liked_by, subject_kind);
    CREATE INDEX idx_subscriptions_subscriber ON subscriptions(subscriber_id);
";

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let current: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    for (version, name, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        info!("Running migration v{} ({})", version, name);
        conn.execute_batch(&format!(
            "BEGIN;\n{sql}\nINSERT INTO schema_version (version) VALUES ({version});\nCOMMIT;"
        ))?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i64);
    }
}
