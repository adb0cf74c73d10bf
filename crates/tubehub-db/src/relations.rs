//! Toggle-style relations: likes and subscriptions.
//!
//! A toggle never reads before it writes. It inserts the composite key and,
//! if the UNIQUE constraint rejects it, deletes the existing row instead. Both
//! happen inside one immediate transaction, so concurrent toggles of the same
//! key serialize and strictly alternate.

use rusqlite::Connection;
use uuid::Uuid;

use tubehub_types::models::{EntityKind, LikeKind, ToggleState};

use crate::Database;
use crate::error::{StoreError, StoreResult, unique_violation};
use crate::guard::ensure_visible;
use crate::models::now;

/// Where a relation lives and how its composite key maps onto columns.
struct RelationTable {
    table: &'static str,
    /// Discriminator column, for tables shared by several subject kinds.
    kind_column: Option<&'static str>,
    subject_column: &'static str,
    actor_column: &'static str,
}

const LIKES: RelationTable = RelationTable {
    table: "likes",
    kind_column: Some("subject_kind"),
    subject_column: "subject_id",
    actor_column: "liked_by",
};

const SUBSCRIPTIONS: RelationTable = RelationTable {
    table: "subscriptions",
    kind_column: None,
    subject_column: "channel_id",
    actor_column: "subscriber_id",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Like { kind: LikeKind, subject: Uuid },
    Subscription { channel: Uuid },
}

impl Relation {
    pub fn like(kind: LikeKind, subject: Uuid) -> Self {
        Self::Like { kind, subject }
    }

    pub fn like_video(video: Uuid) -> Self {
        Self::like(LikeKind::Video, video)
    }

    pub fn like_comment(comment: Uuid) -> Self {
        Self::like(LikeKind::Comment, comment)
    }

    pub fn like_tweet(tweet: Uuid) -> Self {
        Self::like(LikeKind::Tweet, tweet)
    }

    pub fn subscription(channel: Uuid) -> Self {
        Self::Subscription { channel }
    }

    fn table(&self) -> &'static RelationTable {
        match self {
            Self::Like { .. } => &LIKES,
            Self::Subscription { .. } => &SUBSCRIPTIONS,
        }
    }

    fn kind_value(&self) -> Option<&'static str> {
        match self {
            Self::Like { kind, .. } => Some(kind.as_str()),
            Self::Subscription { .. } => None,
        }
    }

    fn subject(&self) -> (EntityKind, Uuid) {
        match *self {
            Self::Like { kind, subject } => (kind.entity(), subject),
            Self::Subscription { channel } => (EntityKind::User, channel),
        }
    }

    /// WHERE clause and bound values matching this relation's key for `actor`.
    fn key(&self, actor: Uuid) -> (String, Vec<String>) {
        let table = self.table();
        let (_, subject) = self.subject();
        let mut clause = format!("{} = ?1 AND {} = ?2", table.subject_column, table.actor_column);
        let mut values = vec![subject.to_string(), actor.to_string()];
        if let (Some(column), Some(kind)) = (table.kind_column, self.kind_value()) {
            clause.push_str(&format!(" AND {column} = ?3"));
            values.push(kind.to_string());
        }
        (clause, values)
    }
}

impl Database {
    /// Flips the relation between `actor` and the relation's subject. A video
    /// or comment the actor cannot see is reported as missing.
    pub fn toggle(&self, relation: Relation, actor: Uuid) -> StoreResult<ToggleState> {
        let (subject_kind, subject) = relation.subject();
        if matches!(relation, Relation::Subscription { .. }) && subject == actor {
            return Err(StoreError::SelfReference);
        }

        self.with_conn_mut(|conn| {
            ensure_visible(conn, subject_kind, subject, actor)?;

            match insert(conn, &relation, actor) {
                Ok(()) => Ok(ToggleState::Added),
                Err(e) if unique_violation(&e).is_some() => {
                    delete(conn, &relation, actor)?;
                    Ok(ToggleState::Removed)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Whether `actor` currently holds the relation.
    pub fn is_related(&self, relation: Relation, actor: Uuid) -> StoreResult<bool> {
        let table = relation.table();
        let (clause, values) = relation.key(actor);
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {clause})", table.table);
        self.with_conn(|conn| {
            let exists = conn.query_row(&sql, rusqlite::params_from_iter(values), |row| row.get(0))?;
            Ok(exists)
        })
    }
}

fn insert(conn: &Connection, relation: &Relation, actor: Uuid) -> rusqlite::Result<()> {
    let table = relation.table();
    let (_, subject) = relation.subject();
    let id = Uuid::new_v4().to_string();
    let created_at = now();

    match (table.kind_column, relation.kind_value()) {
        (Some(kind_column), Some(kind)) => conn.execute(
            &format!(
                "INSERT INTO {} (id, {kind_column}, {}, {}, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                table.table, table.subject_column, table.actor_column
            ),
            rusqlite::params![id, kind, subject.to_string(), actor.to_string(), created_at],
        ),
        _ => conn.execute(
            &format!(
                "INSERT INTO {} (id, {}, {}, created_at) VALUES (?1, ?2, ?3, ?4)",
                table.table, table.subject_column, table.actor_column
            ),
            rusqlite::params![id, subject.to_string(), actor.to_string(), created_at],
        ),
    }?;
    Ok(())
}

fn delete(conn: &Connection, relation: &Relation, actor: Uuid) -> rusqlite::Result<()> {
    let (clause, values) = relation.key(actor);
    conn.execute(
        &format!("DELETE FROM {} WHERE {clause}", relation.table().table),
        rusqlite::params_from_iter(values),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;

    use super::*;
    use crate::test_support::{seed_user, seed_video, test_db};

    fn like_rows(db: &Database, video: Uuid) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM likes WHERE subject_kind = 'video' AND subject_id = ?1",
                [video.to_string()],
                |row| row.get(0),
            )?)
        })
        .unwrap()
    }

    #[test]
    fn toggling_twice_restores_the_original_state() {
        let db = test_db();
        let owner = seed_user(&db, "owner");
        let fan = seed_user(&db, "fan");
        let video = seed_video(&db, owner, "clip", true);
        let like = Relation::like_video(video);

        assert_eq!(db.toggle(like, fan).unwrap(), ToggleState::Added);
        assert!(db.is_related(like, fan).unwrap());
        assert_eq!(db.toggle(like, fan).unwrap(), ToggleState::Removed);
        assert!(!db.is_related(like, fan).unwrap());
        assert_eq!(like_rows(&db, video), 0);
    }

    #[test]
    fn likes_of_different_kinds_do_not_collide() {
        let db = test_db();
        let owner = seed_user(&db, "owner");
        let video = seed_video(&db, owner, "clip", true);
        let comment = db.create_comment(video, owner, "pinned").unwrap();

        assert_eq!(db.toggle(Relation::like_video(video), owner).unwrap(), ToggleState::Added);
        assert_eq!(
            db.toggle(Relation::like_comment(comment.id), owner).unwrap(),
            ToggleState::Added
        );
        assert!(!db.is_related(Relation::like_tweet(video), owner).unwrap());
    }

    #[test]
    fn missing_subjects_and_self_subscription_are_rejected() {
        let db = test_db();
        let user = seed_user(&db, "lonely");

        assert!(matches!(
            db.toggle(Relation::like_tweet(Uuid::new_v4()), user),
            Err(StoreError::NotFound { kind: EntityKind::Tweet, .. })
        ));
        assert!(matches!(
            db.toggle(Relation::subscription(Uuid::new_v4()), user),
            Err(StoreError::NotFound { kind: EntityKind::User, .. })
        ));
        assert!(matches!(
            db.toggle(Relation::subscription(user), user),
            Err(StoreError::SelfReference)
        ));
    }

    #[test]
    fn hidden_videos_and_their_comments_cannot_be_liked() {
        let db = test_db();
        let owner = seed_user(&db, "owner");
        let other = seed_user(&db, "other");
        let video = seed_video(&db, owner, "clip", true);
        let comment = db.create_comment(video, owner, "pinned").unwrap();
        db.toggle_publish(video, owner).unwrap();

        assert!(matches!(
            db.toggle(Relation::like_video(video), other),
            Err(StoreError::NotFound { kind: EntityKind::Video, .. })
        ));
        assert!(matches!(
            db.toggle(Relation::like_comment(comment.id), other),
            Err(StoreError::NotFound { kind: EntityKind::Comment, .. })
        ));
        assert_eq!(like_rows(&db, video), 0);

        assert_eq!(db.toggle(Relation::like_video(video), owner).unwrap(), ToggleState::Added);
    }

    #[test]
    fn concurrent_toggles_on_one_database_alternate() {
        for threads in [8usize, 7] {
            let db = test_db();
            let owner = seed_user(&db, "owner");
            let fan = seed_user(&db, "fan");
            let video = seed_video(&db, owner, "clip", true);
            let like = Relation::like_video(video);

            let shared = &db;
            let outcomes: Vec<ToggleState> = std::thread::scope(|s| {
                let handles: Vec<_> = (0..threads)
                    .map(|_| s.spawn(move || shared.toggle(like, fan).unwrap()))
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let added = outcomes.iter().filter(|s| **s == ToggleState::Added).count();
            assert_eq!(added, threads.div_ceil(2));
            assert_eq!(outcomes.len() - added, threads / 2);
            assert_eq!(like_rows(&db, video), (threads % 2) as i64);
        }
    }

    #[test]
    fn concurrent_toggles_across_connections_alternate() {
        let path = env::temp_dir().join(format!("tubehub-toggle-{}.db", Uuid::new_v4()));
        let first = Database::open(&path).unwrap();
        let second = Database::open(&path).unwrap();

        let owner = seed_user(&first, "owner");
        let fan = seed_user(&first, "fan");
        let video = seed_video(&first, owner, "clip", true);
        let like = Relation::like_video(video);

        let connections = [&first, &second];
        let outcomes: Vec<ToggleState> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..10)
                .map(|i| {
                    let db = connections[i % 2];
                    s.spawn(move || db.toggle(like, fan).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let added = outcomes.iter().filter(|s| **s == ToggleState::Added).count();
        assert_eq!(added, 5);
        assert!(!second.is_related(like, fan).unwrap());

        drop(first);
        drop(second);
        for suffix in ["", "-wal", "-shm"] {
            let _ = fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[test]
    fn subscription_toggle_round_trips() {
        let db = test_db();
        let channel = seed_user(&db, "channel");
        let viewer = seed_user(&db, "viewer");
        let sub = Relation::subscription(channel);

        assert_eq!(db.toggle(sub, viewer).unwrap(), ToggleState::Added);
        assert!(db.is_related(sub, viewer).unwrap());
        assert_eq!(db.toggle(sub, viewer).unwrap(), ToggleState::Removed);
        assert!(!db.is_related(sub, viewer).unwrap());
    }
}
