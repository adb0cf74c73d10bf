use uuid::Uuid;

use crate::Database;
use crate::models::{NewUser, NewVideo};

pub(crate) fn test_db() -> Database {
    Database::open_in_memory().expect("in-memory database")
}

pub(crate) fn new_user<'a>(username: &'a str, email: &'a str) -> NewUser<'a> {
    NewUser {
        username,
        email,
        full_name: username,
        password_hash: "not-a-real-hash",
        avatar_url: "/media/avatar.png",
        cover_image_url: "",
    }
}

pub(crate) fn seed_user(db: &Database, name: &str) -> Uuid {
    let email = format!("{name}@example.com");
    db.create_user(new_user(name, &email)).expect("seed user").id
}

/// Creates a 60 second video; unpublished videos are flipped after insert.
pub(crate) fn seed_video(db: &Database, owner: Uuid, title: &str, published: bool) -> Uuid {
    let description = format!("description of {title}");
    let media_url = format!("/media/{title}.mp4");
    let thumbnail_url = format!("/media/{title}.png");
    let video = db
        .create_video(NewVideo {
            owner_id: owner,
            title,
            description: &description,
            media_url: &media_url,
            thumbnail_url: &thumbnail_url,
            duration_seconds: 60.0,
        })
        .expect("seed video");

    if !published {
        db.toggle_publish(video.id, owner).expect("unpublish seed video");
    }
    video.id
}
