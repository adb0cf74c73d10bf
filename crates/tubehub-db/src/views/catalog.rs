//! The concrete read models, each built from the pipeline stages in
//! `pipeline` and exposed as a `Database` method.

use rusqlite::types::Value;
use uuid::Uuid;

use tubehub_types::api::{SortDirection, VideoSort};
use tubehub_types::models::{EntityKind, LikeKind};
use tubehub_types::page::{Page, PageRequest};
use tubehub_types::views::{
    ChannelProfile, ChannelStats, ChannelSummary, CommentView, LikedSubject, LikedVideo,
    PlaylistDetail, PlaylistEntry, PlaylistSummary, TweetView, VideoCard, VideoDetail,
    WatchHistoryEntry,
};

use super::pipeline::{
    BASE, Col, Collection, Derive, Direction, Output, Predicate, RelCol, Related, Source, View,
};
use super::{query_one, query_rows};
use crate::Database;
use crate::error::{StoreError, StoreResult};
use crate::guard::ensure_visible;
use crate::queries::videos::insert_view;

fn id(value: Uuid) -> Value {
    Value::Text(value.to_string())
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

/// Filters for the public video feed.
#[derive(Debug, Clone, Default)]
pub struct VideoFeed {
    /// Case-insensitive title substring.
    pub query: Option<String>,
    pub owner: Option<Uuid>,
    pub sort: VideoSort,
    pub direction: SortDirection,
}

// -- Shared stages --

fn owner_outputs(alias: &'static str) -> [Output; 4] {
    [
        Output::col("owner_id", Col::of(alias, "id")),
        Output::col("owner_username", Col::of(alias, "username")),
        Output::col("owner_full_name", Col::of(alias, "full_name")),
        Output::col("owner_avatar_url", Col::of(alias, "avatar_url")),
    ]
}

fn subscribers_of(channel: Col) -> Related {
    Related::direct(Collection::Subscriptions, "channel_id", channel)
}

fn likes_on(kind: LikeKind, subject: Col) -> Related {
    Related::direct(Collection::Likes, "subject_id", subject).filter("subject_kind", text(kind.as_str()))
}

/// A video is visible when published or when the viewer owns it.
fn visible_to(video: &'static str, actor: Uuid) -> Predicate {
    Predicate::Any(vec![
        Predicate::eq(Col::of(video, "is_published"), true),
        Predicate::eq(Col::of(video, "owner_id"), id(actor)),
    ])
}

/// Joins the owner of the video at `video` and projects a `VideoCard`.
fn video_card(view: View, video: &'static str) -> View {
    let at = |column| Col::of(video, column);
    view.join("owner", Collection::Users, at("owner_id"))
        .derive(
            "view_count",
            Derive::Count(Related::direct(Collection::VideoViews, "video_id", at("id"))),
        )
        .derive("like_count", Derive::Count(likes_on(LikeKind::Video, at("id"))))
        .project([
            Output::col("id", at("id")),
            Output::col("title", at("title")),
            Output::col("description", at("description")),
            Output::col("media_url", at("media_url")),
            Output::col("thumbnail_url", at("thumbnail_url")),
            Output::col("duration_seconds", at("duration_seconds")),
            Output::derived("view_count"),
            Output::derived("like_count"),
            Output::col("is_published", at("is_published")),
            Output::col("created_at", at("created_at")),
        ])
        .project(owner_outputs("owner"))
}

/// Projects a `ChannelSummary` for the user joined as `channel`.
fn channel_summary(view: View, actor: Uuid) -> View {
    view.derive("subscriber_count", Derive::Count(subscribers_of(Col::of("channel", "id"))))
        .derive(
            "is_subscribed",
            Derive::Exists(subscribers_of(Col::of("channel", "id")).filter("subscriber_id", id(actor))),
        )
        .project([
            Output::col("id", Col::of("channel", "id")),
            Output::col("username", Col::of("channel", "username")),
            Output::col("full_name", Col::of("channel", "full_name")),
            Output::col("avatar_url", Col::of("channel", "avatar_url")),
            Output::derived("subscriber_count"),
            Output::derived("is_subscribed"),
            Output::col("subscribed_at", Col::base("created_at")),
        ])
        .sort(Source::Col(Col::base("created_at")), Direction::Desc)
}

fn playlist_summary(view: View) -> View {
    let entries = || Related::direct(Collection::PlaylistVideos, "playlist_id", Col::base("id"));
    let entry_videos =
        || Related::via(Collection::Videos, "id", Collection::PlaylistVideos, "playlist_id", "video_id", Col::base("id"));

    view.join("owner", Collection::Users, Col::base("owner_id"))
        .derive("video_count", Derive::Count(entries()))
        .derive("total_duration_seconds", Derive::Sum(entry_videos(), "duration_seconds"))
        .derive(
            "cover_thumbnail_url",
            Derive::First {
                from: entry_videos(),
                column: RelCol::Row("thumbnail_url"),
                order: RelCol::Hop("position"),
                direction: Direction::Asc,
            },
        )
        .project([
            Output::col("id", Col::base("id")),
            Output::col("name", Col::base("name")),
            Output::col("description", Col::base("description")),
            Output::derived("video_count"),
            Output::derived("total_duration_seconds"),
            Output::derived("cover_thumbnail_url"),
            Output::col("created_at", Col::base("created_at")),
            Output::col("updated_at", Col::base("updated_at")),
        ])
        .project(owner_outputs("owner"))
}

// -- Views --

fn channel_profile_view(username: &str, actor: Uuid) -> View {
    View::new("channel_profile", Collection::Users)
        .matching(Predicate::eq(Col::base("username"), text(&username.trim().to_lowercase())))
        .derive("subscriber_count", Derive::Count(subscribers_of(Col::base("id"))))
        .derive(
            "subscribed_to_count",
            Derive::Count(Related::direct(Collection::Subscriptions, "subscriber_id", Col::base("id"))),
        )
        .derive(
            "is_subscribed",
            Derive::Exists(subscribers_of(Col::base("id")).filter("subscriber_id", id(actor))),
        )
        .project([
            Output::col("id", Col::base("id")),
            Output::col("username", Col::base("username")),
            Output::col("full_name", Col::base("full_name")),
            Output::col("avatar_url", Col::base("avatar_url")),
            Output::col("cover_image_url", Col::base("cover_image_url")),
            Output::derived("subscriber_count"),
            Output::derived("subscribed_to_count"),
            Output::derived("is_subscribed"),
        ])
}

fn channel_stats_view(channel: Uuid) -> View {
    let owned = |collection| {
        Related::via(collection, "video_id", Collection::Videos, "owner_id", "id", Col::base("id"))
    };

    View::new("channel_stats", Collection::Users)
        .matching(Predicate::eq(Col::base("id"), id(channel)))
        .derive(
            "video_count",
            Derive::Count(Related::direct(Collection::Videos, "owner_id", Col::base("id"))),
        )
        .derive("view_count", Derive::Count(owned(Collection::VideoViews)))
        .derive(
            "like_count",
            Derive::Count(
                Related::via(Collection::Likes, "subject_id", Collection::Videos, "owner_id", "id", Col::base("id"))
                    .filter("subject_kind", text(LikeKind::Video.as_str())),
            ),
        )
        .derive("subscriber_count", Derive::Count(subscribers_of(Col::base("id"))))
        .derive(
            "total_duration_seconds",
            Derive::Sum(
                Related::direct(Collection::Videos, "owner_id", Col::base("id")),
                "duration_seconds",
            ),
        )
        .project([
            Output::col("id", Col::base("id")),
            Output::col("username", Col::base("username")),
            Output::col("full_name", Col::base("full_name")),
            Output::col("avatar_url", Col::base("avatar_url")),
            Output::col("cover_image_url", Col::base("cover_image_url")),
            Output::derived("video_count"),
            Output::derived("view_count"),
            Output::derived("like_count"),
            Output::derived("subscriber_count"),
            Output::derived("total_duration_seconds"),
        ])
}

fn channel_subscribers_view(channel: Uuid, actor: Uuid) -> View {
    let view = View::new("channel_subscribers", Collection::Subscriptions)
        .matching(Predicate::eq(Col::base("channel_id"), id(channel)))
        .join("channel", Collection::Users, Col::base("subscriber_id"));
    channel_summary(view, actor)
}

fn subscribed_channels_view(subscriber: Uuid, actor: Uuid) -> View {
    let view = View::new("subscribed_channels", Collection::Subscriptions)
        .matching(Predicate::eq(Col::base("subscriber_id"), id(subscriber)))
        .join("channel", Collection::Users, Col::base("channel_id"));
    channel_summary(view, actor)
}

fn video_feed_view(feed: &VideoFeed) -> View {
    let mut view = View::new("video_feed", Collection::Videos)
        .matching(Predicate::eq(Col::base("is_published"), true));
    if let Some(query) = feed.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        view = view.matching(Predicate::contains(Col::base("title"), query));
    }
    if let Some(owner) = feed.owner {
        view = view.matching(Predicate::eq(Col::base("owner_id"), id(owner)));
    }

    let key = match feed.sort {
        VideoSort::CreatedAt => Source::Col(Col::base("created_at")),
        VideoSort::Views => Source::Derived("view_count"),
        VideoSort::Duration => Source::Col(Col::base("duration_seconds")),
        VideoSort::Title => Source::Col(Col::base("title")),
    };
    let direction = match feed.direction {
        SortDirection::Asc => Direction::Asc,
        SortDirection::Desc => Direction::Desc,
    };
    video_card(view, BASE).sort(key, direction)
}

fn video_detail_view(video: Uuid, actor: Uuid) -> View {
    let view = View::new("video_detail", Collection::Videos)
        .matching(Predicate::eq(Col::base("id"), id(video)))
        .matching(visible_to(BASE, actor));

    video_card(view, BASE)
        .derive(
            "is_liked",
            Derive::Exists(likes_on(LikeKind::Video, Col::base("id")).filter("liked_by", id(actor))),
        )
        .derive("owner_subscriber_count", Derive::Count(subscribers_of(Col::base("owner_id"))))
        .derive(
            "is_subscribed_to_owner",
            Derive::Exists(subscribers_of(Col::base("owner_id")).filter("subscriber_id", id(actor))),
        )
        .project([
            Output::derived("is_liked"),
            Output::derived("owner_subscriber_count"),
            Output::derived("is_subscribed_to_owner"),
        ])
}

fn channel_videos_view(channel: Uuid) -> View {
    let view = View::new("channel_videos", Collection::Videos)
        .matching(Predicate::eq(Col::base("owner_id"), id(channel)));
    video_card(view, BASE).sort(Source::Col(Col::base("created_at")), Direction::Desc)
}

fn video_comments_view(video: Uuid, actor: Uuid) -> View {
    View::new("video_comments", Collection::Comments)
        .matching(Predicate::eq(Col::base("video_id"), id(video)))
        .join("owner", Collection::Users, Col::base("owner_id"))
        .derive("like_count", Derive::Count(likes_on(LikeKind::Comment, Col::base("id"))))
        .derive(
            "is_liked",
            Derive::Exists(likes_on(LikeKind::Comment, Col::base("id")).filter("liked_by", id(actor))),
        )
        .project([
            Output::col("id", Col::base("id")),
            Output::col("video_id", Col::base("video_id")),
            Output::col("content", Col::base("content")),
            Output::col("created_at", Col::base("created_at")),
            Output::col("updated_at", Col::base("updated_at")),
            Output::derived("like_count"),
            Output::derived("is_liked"),
        ])
        .project(owner_outputs("owner"))
        .sort(Source::Col(Col::base("created_at")), Direction::Desc)
}

fn user_tweets_view(user: Uuid, actor: Uuid) -> View {
    View::new("user_tweets", Collection::Tweets)
        .matching(Predicate::eq(Col::base("owner_id"), id(user)))
        .join("owner", Collection::Users, Col::base("owner_id"))
        .derive("like_count", Derive::Count(likes_on(LikeKind::Tweet, Col::base("id"))))
        .derive(
            "is_liked",
            Derive::Exists(likes_on(LikeKind::Tweet, Col::base("id")).filter("liked_by", id(actor))),
        )
        .project([
            Output::col("id", Col::base("id")),
            Output::col("content", Col::base("content")),
            Output::col("created_at", Col::base("created_at")),
            Output::col("updated_at", Col::base("updated_at")),
            Output::derived("like_count"),
            Output::derived("is_liked"),
        ])
        .project(owner_outputs("owner"))
        .sort(Source::Col(Col::base("created_at")), Direction::Desc)
}

fn watch_history_view(actor: Uuid) -> View {
    let views_by_actor =
        || Related::direct(Collection::VideoViews, "video_id", Col::base("id")).filter("viewer_id", id(actor));

    let view = View::new("watch_history", Collection::Videos)
        .matching(Predicate::Exists(views_by_actor()))
        .matching(visible_to(BASE, actor))
        .derive(
            "last_watched_at",
            Derive::First {
                from: views_by_actor(),
                column: RelCol::Row("viewed_at"),
                order: RelCol::Row("viewed_at"),
                direction: Direction::Desc,
            },
        )
        .project([Output::derived("last_watched_at")]);
    video_card(view, BASE).sort(Source::Derived("last_watched_at"), Direction::Desc)
}

fn liked_videos_view(actor: Uuid) -> View {
    let likes_by_actor = || likes_on(LikeKind::Video, Col::base("id")).filter("liked_by", id(actor));

    let view = View::new("liked_videos", Collection::Videos)
        .matching(Predicate::Exists(likes_by_actor()))
        .matching(visible_to(BASE, actor))
        .derive(
            "liked_at",
            Derive::First {
                from: likes_by_actor(),
                column: RelCol::Row("created_at"),
                order: RelCol::Row("created_at"),
                direction: Direction::Desc,
            },
        )
        .project([Output::derived("liked_at")]);
    video_card(view, BASE).sort(Source::Derived("liked_at"), Direction::Desc)
}

fn liked_subjects_view(actor: Uuid, kind: LikeKind) -> View {
    View::new("liked_subjects", Collection::Likes)
        .matching(Predicate::eq(Col::base("liked_by"), id(actor)))
        .matching(Predicate::eq(Col::base("subject_kind"), text(kind.as_str())))
        .project([
            Output::col("id", Col::base("id")),
            Output::col("subject_kind", Col::base("subject_kind")),
            Output::col("subject_id", Col::base("subject_id")),
            Output::col("liked_at", Col::base("created_at")),
        ])
        .sort(Source::Col(Col::base("created_at")), Direction::Desc)
}

fn user_playlists_view(user: Uuid) -> View {
    let view = View::new("user_playlists", Collection::Playlists)
        .matching(Predicate::eq(Col::base("owner_id"), id(user)));
    playlist_summary(view).sort(Source::Col(Col::base("created_at")), Direction::Desc)
}

fn playlist_view(playlist: Uuid) -> View {
    let view = View::new("playlist", Collection::Playlists)
        .matching(Predicate::eq(Col::base("id"), id(playlist)));
    playlist_summary(view)
}

fn playlist_entries_view(playlist: Uuid) -> View {
    let view = View::new("playlist_entries", Collection::PlaylistVideos)
        .matching(Predicate::eq(Col::base("playlist_id"), id(playlist)))
        .join("video", Collection::Videos, Col::base("video_id"))
        .project([
            Output::col("position", Col::base("position")),
            Output::col("added_at", Col::base("added_at")),
        ]);
    video_card(view, "video").sort(Source::Col(Col::base("position")), Direction::Asc)
}

impl Database {
    pub fn channel_profile(&self, username: &str, actor: Uuid) -> StoreResult<Option<ChannelProfile>> {
        self.fetch_one(&channel_profile_view(username, actor))
    }

    pub fn channel_stats(&self, channel: Uuid) -> StoreResult<Option<ChannelStats>> {
        self.fetch_one(&channel_stats_view(channel))
    }

    /// Users subscribed to `channel`, most recent subscription first.
    pub fn channel_subscribers(
        &self,
        channel: Uuid,
        actor: Uuid,
        request: PageRequest,
    ) -> StoreResult<Page<ChannelSummary>> {
        self.paginate(&channel_subscribers_view(channel, actor), request)
    }

    /// Channels `subscriber` follows, most recent subscription first.
    pub fn subscribed_channels(
        &self,
        subscriber: Uuid,
        actor: Uuid,
        request: PageRequest,
    ) -> StoreResult<Page<ChannelSummary>> {
        self.paginate(&subscribed_channels_view(subscriber, actor), request)
    }

    /// Published videos only.
    pub fn video_feed(&self, feed: &VideoFeed, request: PageRequest) -> StoreResult<Page<VideoCard>> {
        self.paginate(&video_feed_view(feed), request)
    }

    /// `None` when the video is missing or unpublished and not the actor's.
    pub fn video_detail(&self, video: Uuid, actor: Uuid) -> StoreResult<Option<VideoDetail>> {
        self.fetch_one(&video_detail_view(video, actor))
    }

    /// Counts a view by `actor` and returns the detail that includes it, in
    /// one transaction. `None`, with nothing recorded, when the video is
    /// missing or hidden from the actor.
    pub fn view_video(&self, video: Uuid, actor: Uuid) -> StoreResult<Option<VideoDetail>> {
        let detail = video_detail_view(video, actor).compile(Some((1, 0)))?;
        self.with_conn_mut(|conn| {
            match ensure_visible(conn, EntityKind::Video, video, actor) {
                Ok(()) => {}
                Err(StoreError::NotFound { .. }) => return Ok(None),
                Err(e) => return Err(e),
            }
            insert_view(conn, video, actor)?;
            query_one(conn, &detail)
        })
    }

    /// Every video of a channel, unpublished included, newest first.
    pub fn channel_videos(&self, channel: Uuid, request: PageRequest) -> StoreResult<Page<VideoCard>> {
        self.paginate(&channel_videos_view(channel), request)
    }

    pub fn video_comments(
        &self,
        video: Uuid,
        actor: Uuid,
        request: PageRequest,
    ) -> StoreResult<Page<CommentView>> {
        self.paginate(&video_comments_view(video, actor), request)
    }

    pub fn user_tweets(&self, user: Uuid, actor: Uuid, request: PageRequest) -> StoreResult<Page<TweetView>> {
        self.paginate(&user_tweets_view(user, actor), request)
    }

    /// Distinct videos the actor has viewed, most recently watched first.
    pub fn watch_history(&self, actor: Uuid, request: PageRequest) -> StoreResult<Page<WatchHistoryEntry>> {
        self.paginate(&watch_history_view(actor), request)
    }

    pub fn liked_videos(&self, actor: Uuid, request: PageRequest) -> StoreResult<Page<LikedVideo>> {
        self.paginate(&liked_videos_view(actor), request)
    }

    pub fn liked_subjects(
        &self,
        actor: Uuid,
        kind: LikeKind,
        request: PageRequest,
    ) -> StoreResult<Page<LikedSubject>> {
        self.paginate(&liked_subjects_view(actor, kind), request)
    }

    pub fn user_playlists(&self, user: Uuid, request: PageRequest) -> StoreResult<Page<PlaylistSummary>> {
        self.paginate(&user_playlists_view(user), request)
    }

    pub fn playlist_entries(&self, playlist: Uuid) -> StoreResult<Vec<PlaylistEntry>> {
        self.fetch_all(&playlist_entries_view(playlist))
    }

    /// Summary and entries read under one lock.
    pub fn playlist_detail(&self, playlist: Uuid) -> StoreResult<Option<PlaylistDetail>> {
        let summary = playlist_view(playlist).compile(None)?;
        let entries = playlist_entries_view(playlist).compile(None)?;
        self.with_conn(|conn| {
            let Some(summary) = query_one::<PlaylistSummary>(conn, &summary)? else {
                return Ok(None);
            };
            let videos = query_rows(conn, &entries)?;
            Ok(Some(PlaylistDetail {
                playlist: summary,
                videos,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::Relation;
    use crate::test_support::{seed_user, seed_video, test_db};

    fn all() -> PageRequest {
        PageRequest::new(1, 100)
    }

    #[test]
    fn like_scenario() {
        let db = test_db();
        let owner = seed_user(&db, "owner");
        let fan = seed_user(&db, "fan");
        let video = seed_video(&db, owner, "clip", true);

        db.toggle(Relation::like_video(video), fan).unwrap();
        let seen_by_fan = db.video_detail(video, fan).unwrap().unwrap();
        assert_eq!(seen_by_fan.video.like_count, 1);
        assert!(seen_by_fan.is_liked);
        assert!(!db.video_detail(video, owner).unwrap().unwrap().is_liked);

        let liked = db.liked_videos(fan, all()).unwrap();
        assert_eq!(liked.total_items, 1);
        assert_eq!(liked.items[0].video.id, video);

        let subjects = db.liked_subjects(fan, LikeKind::Video, all()).unwrap();
        assert_eq!(subjects.items[0].subject_id, video);
        assert!(db.liked_subjects(fan, LikeKind::Tweet, all()).unwrap().items.is_empty());

        db.toggle(Relation::like_video(video), fan).unwrap();
        let after = db.video_detail(video, fan).unwrap().unwrap();
        assert_eq!(after.video.like_count, 0);
        assert!(!after.is_liked);
        assert_eq!(db.liked_videos(fan, all()).unwrap().total_items, 0);
    }

    #[test]
    fn subscription_scenario() {
        let db = test_db();
        let creator = seed_user(&db, "creator");
        let viewer = seed_user(&db, "viewer");

        db.toggle(Relation::subscription(creator), viewer).unwrap();

        let profile = db.channel_profile("CREATOR", viewer).unwrap().unwrap();
        assert_eq!(profile.subscriber_count, 1);
        assert!(profile.is_subscribed);
        assert!(!db.channel_profile("creator", creator).unwrap().unwrap().is_subscribed);

        let viewer_profile = db.channel_profile("viewer", viewer).unwrap().unwrap();
        assert_eq!(viewer_profile.subscribed_to_count, 1);
        assert_eq!(viewer_profile.subscriber_count, 0);

        let subscribers = db.channel_subscribers(creator, creator, all()).unwrap();
        assert_eq!(subscribers.items.len(), 1);
        assert_eq!(subscribers.items[0].id, viewer);
        assert!(!subscribers.items[0].is_subscribed);

        let following = db.subscribed_channels(viewer, viewer, all()).unwrap();
        assert_eq!(following.items[0].id, creator);
        assert_eq!(following.items[0].subscriber_count, 1);
        assert!(following.items[0].is_subscribed);

        db.toggle(Relation::subscription(creator), viewer).unwrap();
        assert_eq!(db.channel_profile("creator", viewer).unwrap().unwrap().subscriber_count, 0);
        assert!(db.channel_subscribers(creator, creator, all()).unwrap().items.is_empty());
    }

    #[test]
    fn channel_stats_match_underlying_rows() {
        let db = test_db();
        let creator = seed_user(&db, "creator");
        let fans: Vec<Uuid> = (0..5).map(|i| seed_user(&db, &format!("fan{i}"))).collect();
        let first = seed_video(&db, creator, "first", true);
        let second = seed_video(&db, creator, "second", false);

        for (i, fan) in fans.iter().enumerate() {
            // Odd toggle counts leave a like in place, even ones do not.
            for _ in 0..=i {
                db.toggle(Relation::like_video(first), *fan).unwrap();
            }
            db.toggle(Relation::subscription(creator), *fan).unwrap();
            db.record_view(first, *fan).unwrap();
            db.record_view(second, *fan).unwrap();
        }

        let stats = db.channel_stats(creator).unwrap().unwrap();
        let like_rows: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM likes", [], |row| row.get(0))?)
            })
            .unwrap();

        assert_eq!(stats.video_count, 2);
        assert_eq!(stats.view_count, 10);
        assert_eq!(stats.like_count, like_rows);
        assert_eq!(stats.like_count, 3);
        assert_eq!(stats.subscriber_count, 5);
        assert_eq!(stats.total_duration_seconds, 120.0);

        let card = db.video_detail(first, creator).unwrap().unwrap();
        assert_eq!(card.video.view_count, db.view_count(first).unwrap());
        assert_eq!(card.owner_subscriber_count, stats.subscriber_count);
    }

    #[test]
    fn pagination_boundaries() {
        let db = test_db();
        let creator = seed_user(&db, "creator");
        for i in 0..21 {
            seed_video(&db, creator, &format!("video {i:02}"), true);
        }

        let request = |page| PageRequest::new(page, 10);
        let first = db.channel_videos(creator, request(1)).unwrap();
        assert_eq!((first.items.len(), first.total_items, first.total_pages), (10, 21, 3));

        let last = db.channel_videos(creator, request(3)).unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(db.channel_videos(creator, request(4)).unwrap().items.is_empty());

        let mut seen: Vec<Uuid> = Vec::new();
        for page in 1..=3 {
            seen.extend(db.channel_videos(creator, request(page)).unwrap().items.iter().map(|v| v.id));
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 21);
    }

    #[test]
    fn feed_hides_unpublished_and_filters_by_title() {
        let db = test_db();
        let creator = seed_user(&db, "creator");
        let other = seed_user(&db, "other");
        seed_video(&db, creator, "Rust Tips", true);
        seed_video(&db, creator, "rusty bikes", true);
        let hidden = seed_video(&db, creator, "rust secrets", false);
        seed_video(&db, other, "cooking", true);

        let feed = VideoFeed {
            query: Some("RUST".into()),
            sort: VideoSort::Title,
            ..Default::default()
        };
        let page = db.video_feed(&feed, all()).unwrap();
        let titles: Vec<&str> = page.items.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["Rust Tips", "rusty bikes"]);

        let by_owner = VideoFeed {
            owner: Some(other),
            ..Default::default()
        };
        assert_eq!(db.video_feed(&by_owner, all()).unwrap().total_items, 1);

        assert!(db.video_detail(hidden, other).unwrap().is_none());
        assert!(db.video_detail(hidden, creator).unwrap().is_some());
        assert_eq!(db.channel_videos(creator, all()).unwrap().total_items, 3);
    }

    #[test]
    fn title_search_folds_non_ascii_case() {
        let db = test_db();
        let creator = seed_user(&db, "creator");
        seed_video(&db, creator, "École de Rust", true);
        seed_video(&db, creator, "ÅNGSTRÖM units", true);

        let matches = |query: &str| {
            let feed = VideoFeed {
                query: Some(query.into()),
                ..Default::default()
            };
            db.video_feed(&feed, all()).unwrap().total_items
        };
        for query in ["École", "école", "ÉCOLE", "rust", "de r"] {
            assert_eq!(matches(query), 1, "{query}");
        }
        assert_eq!(matches("ångström"), 1);
        assert_eq!(matches("ecole"), 0);
    }

    #[test]
    fn feed_sorts_by_views() {
        let db = test_db();
        let creator = seed_user(&db, "creator");
        let viewer = seed_user(&db, "viewer");
        let quiet = seed_video(&db, creator, "quiet", true);
        let popular = seed_video(&db, creator, "popular", true);
        for _ in 0..3 {
            db.record_view(popular, viewer).unwrap();
        }
        db.record_view(quiet, viewer).unwrap();

        let feed = VideoFeed {
            sort: VideoSort::Views,
            direction: SortDirection::Desc,
            ..Default::default()
        };
        let ids: Vec<Uuid> = db.video_feed(&feed, all()).unwrap().items.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![popular, quiet]);
    }

    #[test]
    fn viewing_counts_only_visible_videos() {
        let db = test_db();
        let creator = seed_user(&db, "creator");
        let viewer = seed_user(&db, "viewer");
        let public = seed_video(&db, creator, "public", true);
        let draft = seed_video(&db, creator, "draft", false);

        let first = db.view_video(public, viewer).unwrap().unwrap();
        assert_eq!(first.video.view_count, 1);
        let second = db.view_video(public, viewer).unwrap().unwrap();
        assert_eq!(second.video.view_count, 2);

        assert!(db.view_video(draft, viewer).unwrap().is_none());
        assert!(db.view_video(Uuid::new_v4(), viewer).unwrap().is_none());
        assert_eq!(db.view_count(draft).unwrap(), 0);

        let own = db.view_video(draft, creator).unwrap().unwrap();
        assert_eq!(own.video.view_count, 1);
        let history: Vec<Uuid> = db.watch_history(viewer, all()).unwrap().items.iter().map(|e| e.video.id).collect();
        assert_eq!(history, vec![public]);
    }

    #[test]
    fn watch_history_lists_each_video_once_most_recent_first() {
        let db = test_db();
        let creator = seed_user(&db, "creator");
        let viewer = seed_user(&db, "viewer");
        let a = seed_video(&db, creator, "a", true);
        let b = seed_video(&db, creator, "b", true);

        db.record_view(a, viewer).unwrap();
        db.record_view(b, viewer).unwrap();
        db.record_view(a, viewer).unwrap();

        let history = db.watch_history(viewer, all()).unwrap();
        let ids: Vec<Uuid> = history.items.iter().map(|e| e.video.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(history.items[0].video.owner.id, creator);
        assert!(db.watch_history(creator, all()).unwrap().items.is_empty());
    }

    #[test]
    fn comment_and_tweet_feeds_carry_like_state() {
        let db = test_db();
        let creator = seed_user(&db, "creator");
        let fan = seed_user(&db, "fan");
        let video = seed_video(&db, creator, "clip", true);
        let comment = db.create_comment(video, fan, "great").unwrap();
        let tweet = db.create_tweet(creator, "new video out").unwrap();

        db.toggle(Relation::like_comment(comment.id), creator).unwrap();
        db.toggle(Relation::like_tweet(tweet.id), fan).unwrap();

        let comments = db.video_comments(video, creator, all()).unwrap();
        assert_eq!(comments.items[0].like_count, 1);
        assert!(comments.items[0].is_liked);
        assert_eq!(comments.items[0].owner.username, "fan");

        let tweets = db.user_tweets(creator, creator, all()).unwrap();
        assert_eq!(tweets.items[0].like_count, 1);
        assert!(!tweets.items[0].is_liked);
    }

    /// Pins `created_at` so ordering does not depend on the clock.
    fn stamp(db: &Database, table: &str, row: Uuid, at: &str) {
        db.with_conn_mut(|conn| {
            conn.execute(
                &format!("UPDATE {table} SET created_at = ?1 WHERE id = ?2"),
                rusqlite::params![at, row.to_string()],
            )?;
            Ok(())
        })
        .unwrap();
    }

    /// Newest first; rows created at the same instant fall back to id order.
    fn newest_first(rows: &[(Uuid, &str)]) -> Vec<Uuid> {
        let mut rows = rows.to_vec();
        rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));
        rows.into_iter().map(|(id, _)| id).collect()
    }

    #[test]
    fn tweet_feed_lists_newest_first_and_breaks_ties_by_id() {
        let db = test_db();
        let author = seed_user(&db, "author");
        let times = [
            "2024-01-01 10:00:00.000000",
            "2024-01-03 10:00:00.000000",
            "2024-01-02 10:00:00.000000",
            "2024-01-02 10:00:00.000000",
        ];
        let rows: Vec<(Uuid, &str)> = times
            .iter()
            .enumerate()
            .map(|(i, at)| {
                let tweet = db.create_tweet(author, &format!("tweet {i}")).unwrap();
                stamp(&db, "tweets", tweet.id, at);
                (tweet.id, *at)
            })
            .collect();

        let listed: Vec<Uuid> = db.user_tweets(author, author, all()).unwrap().items.iter().map(|t| t.id).collect();
        assert_eq!(listed, newest_first(&rows));
        assert_eq!(listed[0], rows[1].0);
        assert_eq!(listed[3], rows[0].0);

        let paged: Vec<Uuid> = (1..=4)
            .flat_map(|page| db.user_tweets(author, author, PageRequest::new(page, 1)).unwrap().items)
            .map(|t| t.id)
            .collect();
        assert_eq!(paged, listed);
    }

    #[test]
    fn comment_feed_lists_newest_first_and_breaks_ties_by_id() {
        let db = test_db();
        let creator = seed_user(&db, "creator");
        let fan = seed_user(&db, "fan");
        let video = seed_video(&db, creator, "clip", true);
        let times = [
            "2024-02-01 08:00:00.000000",
            "2024-02-01 09:00:00.000000",
            "2024-02-01 09:00:00.000000",
        ];
        let rows: Vec<(Uuid, &str)> = times
            .iter()
            .enumerate()
            .map(|(i, at)| {
                let comment = db.create_comment(video, fan, &format!("comment {i}")).unwrap();
                stamp(&db, "comments", comment.id, at);
                (comment.id, *at)
            })
            .collect();

        let listed: Vec<Uuid> = db.video_comments(video, fan, all()).unwrap().items.iter().map(|c| c.id).collect();
        assert_eq!(listed, newest_first(&rows));
        assert_eq!(listed[2], rows[0].0);
    }

    #[test]
    fn playlists_summarize_their_entries() {
        let db = test_db();
        let curator = seed_user(&db, "curator");
        let a = seed_video(&db, curator, "a", true);
        let b = seed_video(&db, curator, "b", true);
        let list = db.create_playlist(curator, "mix", "stuff").unwrap();
        let empty = db.create_playlist(curator, "empty", "nothing yet").unwrap();

        db.add_playlist_video(list.id, b, curator).unwrap();
        db.add_playlist_video(list.id, a, curator).unwrap();
        db.add_playlist_video(list.id, b, curator).unwrap();

        let detail = db.playlist_detail(list.id).unwrap().unwrap();
        assert_eq!(detail.playlist.video_count, 3);
        assert_eq!(detail.playlist.total_duration_seconds, 180.0);
        assert_eq!(detail.playlist.cover_thumbnail_url.as_deref(), Some("/media/b.png"));
        let order: Vec<Uuid> = detail.videos.iter().map(|e| e.video.id).collect();
        assert_eq!(order, vec![b, a, b]);

        let lists = db.user_playlists(curator, all()).unwrap();
        assert_eq!(lists.total_items, 2);
        let empty_summary = lists.items.iter().find(|p| p.id == empty.id).unwrap();
        assert_eq!(empty_summary.video_count, 0);
        assert_eq!(empty_summary.total_duration_seconds, 0.0);
        assert!(empty_summary.cover_thumbnail_url.is_none());

        assert!(db.playlist_detail(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn read_models_never_carry_credentials() {
        let db = test_db();
        let creator = seed_user(&db, "creator");
        let fan = seed_user(&db, "fan");
        let video = seed_video(&db, creator, "clip", true);
        db.create_comment(video, fan, "hi").unwrap();
        db.toggle(Relation::subscription(creator), fan).unwrap();
        db.set_refresh_token_hash(creator, Some("secret-digest")).unwrap();

        let payloads = [
            serde_json::to_string(&db.channel_profile("creator", fan).unwrap()).unwrap(),
            serde_json::to_string(&db.channel_subscribers(creator, fan, all()).unwrap()).unwrap(),
            serde_json::to_string(&db.video_detail(video, fan).unwrap()).unwrap(),
            serde_json::to_string(&db.video_comments(video, fan, all()).unwrap()).unwrap(),
        ];
        for json in payloads {
            assert!(!json.contains("password"), "{json}");
            assert!(!json.contains("not-a-real-hash"), "{json}");
            assert!(!json.contains("secret-digest"), "{json}");
        }
    }
}
