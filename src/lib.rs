//! # Taxis
//!
//! *τάξις — Ancient Greek for "arrangement" or "order".*
//!
//! Taxis is a storage-agnostic implementation of Relay cursor pagination.
//! Given an ordered, unmaterialized set of records and the four Relay
//! arguments (`first`, `after`, `last`, `before`) it returns one page of
//! edges with stable cursors and the `pageInfo` flags clients expect.
//!
//! ## What's inside
//!
//! ### Keyset cursors
//! A cursor encodes the sort key values of its node plus the primary key,
//! never its position. Inserting or deleting records elsewhere in the set
//! leaves issued cursors valid, and ties on non-unique sort columns are
//! broken by the primary key so every node has exactly one place in the
//! order. Multi-column sorts and null sort values are supported.
//!
//! ### Pluggable accessors
//! Backends implement the [`Accessor`] trait over a handle type that is
//! treated as an immutable value: every transform returns a new handle, so
//! the same base handle drives both the windowed fetch and `totalCount`.
//!
//! - [`MemoryAccessor`] over a shared slice of nodes
//! - `SqliteAccessor` and `PostgresAccessor` over a [`SqlQuery`] (sqlx)
//!
//! ### N+1 probing
//! `hasNextPage` and `hasPreviousPage` come from fetching one extra node,
//! not from a second count query.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use taxis::{PaginateOptions, PaginationArgs, Paginator, SqlQuery, adapters::sqlite::SqliteAccessor};
//!
//! let paginator = Paginator::new(SqliteAccessor::<Cat>::from_pool(pool));
//! let options = PaginateOptions::new().order_by(vec!["name", "last_name"]);
//!
//! let page = paginator
//!     .paginate(&SqlQuery::table("cats"), &PaginationArgs::new().with_first(10), &options)
//!     .await?;
//!
//! let next = PaginationArgs::new()
//!     .with_first(10)
//!     .with_after(page.page_info.end_cursor.clone().unwrap());
//! ```
//!
//! ## Feature flags
//!
//! | Flag       | Default | Description                   |
//! |------------|---------|-------------------------------|
//! | `sqlite`   | ✓       | SQLite accessor via sqlx      |
//! | `postgres` |         | PostgreSQL accessor via sqlx  |
//! | `full`     |         | Both SQL accessors            |
//!

pub mod adapters;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod node;
pub mod paginate;
pub mod query;

use metrics::histogram;
use tracing::debug;

use std::sync::Arc;
use std::time::Instant;

pub use crate::adapters::{
    Accessor, CursorStrategy, Dialect, MemoryAccessor, MemoryNodes, SqlQuery,
};
pub use crate::connection::{Connection, Edge, PageInfo};
pub use crate::cursor::{Cursor, CursorData, OffsetCursor};
pub use crate::error::Error;
pub use crate::node::{Node, field_of};
pub use crate::paginate::Window;
pub use crate::query::{
    ColumnSpec, Direction, DirectionSpec, OrderArgs, PaginateOptions, PaginationArgs,
};

/// The Paginator runs the pagination pipeline against one accessor.
/// It is cheap to clone and can be shared between tasks.
pub struct Paginator<A> {
    inner: Arc<A>,
}

impl<A> Clone for Paginator<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Accessor> Paginator<A> {
    pub fn new(accessor: A) -> Self {
        Self {
            inner: Arc::new(accessor),
        }
    }

    pub fn from_arc(accessor: Arc<A>) -> Self {
        Self { inner: accessor }
    }

    pub fn accessor(&self) -> &A {
        &self.inner
    }

    /// Returns the page of `nodes` selected by `args`.
    ///
    /// `nodes` is left untouched. Fails with [`Error::InvalidArgument`] for
    /// negative counts or inconsistent ordering options, with
    /// [`Error::InvalidCursor`] for cursors that do not decode against the
    /// configured order, and with [`Error::NotSupported`] for backward
    /// arguments on an offset accessor.
    pub async fn paginate(
        &self,
        nodes: &A::Handle,
        args: &PaginationArgs,
        options: &PaginateOptions<A::Node>,
    ) -> Result<Connection<A::Node>, Error> {
        let start = Instant::now();
        let accessor = self.inner.as_ref();

        args.counts()?;
        let order = options.resolve()?;

        let ordered = accessor.order_nodes_by(nodes, &order)?;
        let bounded = paginate::apply_cursors_to_nodes(accessor, &ordered, args, &order)?;
        let window = paginate::nodes_to_return(accessor, &bounded, args, &order).await?;

        let total_count = if options.skip_total_count {
            None
        } else {
            Some(accessor.get_nodes_length(&bounded).await?)
        };

        let mut edges = accessor.convert_nodes_to_edges(window.nodes, args, &order)?;
        if let Some(modify) = &options.modify_edge_fn {
            edges = edges.into_iter().map(|edge| modify(edge)).collect();
        }

        let page_info = PageInfo {
            has_previous_page: window.has_previous_page,
            has_next_page: window.has_next_page,
            start_cursor: edges.first().map(|edge| edge.cursor.clone()),
            end_cursor: edges.last().map(|edge| edge.cursor.clone()),
        };

        debug!(
            accessor = accessor.kind(),
            edges = edges.len(),
            has_next_page = page_info.has_next_page,
            has_previous_page = page_info.has_previous_page,
            "paginated"
        );
        histogram!("taxis.paginate.duration_ms",
            "accessor" => accessor.kind()
        )
        .record(start.elapsed().as_millis() as f64);

        Ok(Connection {
            page_info,
            total_count,
            edges,
        })
    }
}
