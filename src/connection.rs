//! Relay connection types.
//!
//! These serialize to the shape GraphQL clients expect:
//! `{ pageInfo { hasPreviousPage hasNextPage startCursor endCursor } totalCount edges { cursor node } }`.

use serde::Serialize;

use crate::cursor::Cursor;

/// A node paired with its cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge<N> {
    pub cursor: Cursor,
    pub node: N,
}

impl<N> Edge<N> {
    pub fn new(cursor: Cursor, node: N) -> Self {
        Self { cursor, node }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_previous_page: bool,
    pub has_next_page: bool,
    pub start_cursor: Option<Cursor>,
    pub end_cursor: Option<Cursor>,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<N> {
    pub page_info: PageInfo,
    /// Size of the cursor-bounded set, ignoring `first`/`last`. `None` when skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    pub edges: Vec<Edge<N>>,
}

impl<N> Connection<N> {
    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.edges.iter().map(|edge| &edge.node)
    }

    pub fn cursors(&self) -> impl Iterator<Item = &Cursor> {
        self.edges.iter().map(|edge| &edge.cursor)
    }

    pub fn into_nodes(self) -> Vec<N> {
        self.edges.into_iter().map(|edge| edge.node).collect()
    }
}
