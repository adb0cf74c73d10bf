//! Entity store operations, one module per entity. Every mutation runs in a
//! single immediate transaction via `Database::with_conn_mut`.

mod comments;
mod playlists;
mod tweets;
mod users;
pub(crate) mod videos;
