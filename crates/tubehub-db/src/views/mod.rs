//! Read models. Views compile to one SQL statement each; pagination runs
//! the count and the page query under a single connection lock.

mod catalog;
pub mod pipeline;
pub mod rows;

use rusqlite::{Connection, OptionalExtension, params_from_iter};
use tracing::debug;

use tubehub_types::page::{Page, PageRequest};

pub use catalog::VideoFeed;
use pipeline::{CompiledQuery, View};
use rows::FromViewRow;

use crate::Database;
use crate::error::StoreResult;

pub(crate) fn query_rows<T: FromViewRow>(conn: &Connection, query: &CompiledQuery) -> StoreResult<Vec<T>> {
    let mut stmt = conn.prepare_cached(&query.sql)?;
    let rows = stmt
        .query_map(params_from_iter(query.params.iter()), T::from_view_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn query_one<T: FromViewRow>(conn: &Connection, query: &CompiledQuery) -> StoreResult<Option<T>> {
    let mut stmt = conn.prepare_cached(&query.sql)?;
    let row = stmt
        .query_row(params_from_iter(query.params.iter()), T::from_view_row)
        .optional()?;
    Ok(row)
}

impl Database {
    /// First row of `view`, if any.
    pub fn fetch_one<T: FromViewRow>(&self, view: &View) -> StoreResult<Option<T>> {
        let query = view.compile(Some((1, 0)))?;
        self.with_conn(|conn| query_one(conn, &query))
    }

    pub fn fetch_all<T: FromViewRow>(&self, view: &View) -> StoreResult<Vec<T>> {
        let query = view.compile(None)?;
        self.with_conn(|conn| query_rows(conn, &query))
    }

    /// One page of `view`. A page past the end is empty, not an error.
    pub fn paginate<T: FromViewRow>(&self, view: &View, request: PageRequest) -> StoreResult<Page<T>> {
        let count = view.compile_count()?;
        let rows = view.compile(Some((request.limit(), request.offset())))?;
        debug!(view = view.name(), page = request.page(), limit = request.limit(), "paginating view");

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(&count.sql, params_from_iter(count.params.iter()), |row| {
                row.get(0)
            })?;
            let items = query_rows(conn, &rows)?;
            Ok(Page::new(items, request, total.max(0) as u64))
        })
    }
}
