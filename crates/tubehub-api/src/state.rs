use std::sync::Arc;

use tracing::error;

use tubehub_db::{Database, StoreResult};

use crate::error::{ApiError, ApiResult};
use crate::media::{MediaStore, StagingArea};
use crate::tokens::TokenKeys;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenKeys,
    pub media: Arc<dyn MediaStore>,
    pub staging: StagingArea,
}

/// Runs store work on the blocking pool; rusqlite calls never run on the
/// async workers.
pub async fn with_db<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
