pub mod memory;
pub mod sql;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;

use crate::{
    connection::Edge,
    cursor::{Cursor, CursorData, OffsetCursor},
    error::Error,
    node::Node,
    query::{OrderArgs, PaginationArgs},
};

pub use memory::{MemoryAccessor, MemoryNodes};
pub use sql::{Dialect, SqlQuery};

/// How an accessor positions cursors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorStrategy {
    /// Cursors carry the sort key values. Stable under mutation.
    #[default]
    Keyset,
    /// Cursors carry an absolute position. Not stable under mutation and
    /// forward-only: `last` and `before` fail with [`Error::NotSupported`].
    Offset,
}

/// -----------------------------
/// Accessor contract
/// -----------------------------
///
/// A `Handle` is an unmaterialized, ordered candidate set. Handles are
/// values: every transform returns a new handle and leaves its input
/// untouched, so one base handle can serve both the windowed fetch and the
/// total count. Only `get_nodes_length`, `has_length_greater_than` and
/// `fetch_nodes` perform I/O.
#[async_trait]
pub trait Accessor: Send + Sync {
    type Handle: Clone + Send + Sync;
    type Node: Node + Send;

    /// Label used in metrics.
    fn kind(&self) -> &'static str;

    fn cursor_strategy(&self) -> CursorStrategy {
        CursorStrategy::Keyset
    }

    /// Orders by the declared columns, then by the primary key.
    fn order_nodes_by(&self, nodes: &Self::Handle, order: &OrderArgs)
    -> Result<Self::Handle, Error>;

    /// Used for `after`: keeps the nodes strictly after `cursor`.
    /// e.g. [A, B, C, D] with the cursor of B gives [C, D]
    fn remove_nodes_before_and_including(
        &self,
        nodes: &Self::Handle,
        cursor: &Cursor,
        order: &OrderArgs,
    ) -> Result<Self::Handle, Error>;

    /// Used for `before`: keeps the nodes strictly before `cursor`.
    /// e.g. [A, B, C, D] with the cursor of C gives [A, B]
    fn remove_nodes_after_and_including(
        &self,
        nodes: &Self::Handle,
        cursor: &Cursor,
        order: &OrderArgs,
    ) -> Result<Self::Handle, Error>;

    /// Used for `first`: keeps the first `keep` nodes.
    /// e.g. [A, B, C, D] with 3 gives [A, B, C]
    fn remove_nodes_from_end(&self, nodes: &Self::Handle, keep: u64)
    -> Result<Self::Handle, Error>;

    /// Used for `last`: keeps the last `keep` nodes, still in `order`.
    /// e.g. [A, B, C, D] with 3 gives [B, C, D]
    fn remove_nodes_from_beginning(
        &self,
        nodes: &Self::Handle,
        keep: u64,
        order: &OrderArgs,
    ) -> Result<Self::Handle, Error>;

    async fn get_nodes_length(&self, nodes: &Self::Handle) -> Result<u64, Error>;

    async fn has_length_greater_than(
        &self,
        nodes: &Self::Handle,
        amount: u64,
    ) -> Result<bool, Error> {
        let probe = self.remove_nodes_from_end(nodes, amount.saturating_add(1))?;
        Ok(self.get_nodes_length(&probe).await? > amount)
    }

    async fn fetch_nodes(&self, nodes: &Self::Handle) -> Result<Vec<Self::Node>, Error>;

    fn convert_nodes_to_edges(
        &self,
        nodes: Vec<Self::Node>,
        args: &PaginationArgs,
        order: &OrderArgs,
    ) -> Result<Vec<Edge<Self::Node>>, Error> {
        match self.cursor_strategy() {
            CursorStrategy::Keyset => Ok(keyset_edges(nodes, order)),
            CursorStrategy::Offset => offset_edges(nodes, args, order),
        }
    }
}

/// Stamps each node with a value-based cursor.
pub fn keyset_edges<N: Node>(nodes: Vec<N>, order: &OrderArgs) -> Vec<Edge<N>> {
    nodes
        .into_iter()
        .map(|node| {
            let data = CursorData::new(
                node.field(&order.primary_key),
                order.columns.iter().map(|column| node.field(column)).collect(),
            );
            Edge::new(data.encode(), node)
        })
        .collect()
}

/// Stamps each node with its absolute position, counted from the `after` cursor.
pub fn offset_edges<N: Node>(
    nodes: Vec<N>,
    args: &PaginationArgs,
    order: &OrderArgs,
) -> Result<Vec<Edge<N>>, Error> {
    let offset = match &args.after {
        Some(after) => after.decode_offset()?.offset,
        None => 0,
    };
    Ok(nodes
        .into_iter()
        .enumerate()
        .map(|(idx, node)| {
            let cursor =
                OffsetCursor::new(node.field(&order.primary_key), offset + idx as u64 + 1);
            Edge::new(cursor.encode(), node)
        })
        .collect())
}

pub(crate) fn backward_not_supported() -> Error {
    Error::NotSupported("`last` and `before` are not supported with offset cursors".to_string())
}
