use std::{cmp::Ordering, marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    adapters::{Accessor, CursorStrategy, backward_not_supported},
    cursor::Cursor,
    error::Error,
    node::{Node, compare_values},
    query::{Direction, KeyPart, OrderArgs},
};

/// In-memory candidate set: a shared node slice plus the ordered positions
/// that are still in the window. Transforms copy the position list only.
#[derive(Debug)]
pub struct MemoryNodes<N> {
    source: Arc<[N]>,
    positions: Arc<[usize]>,
}

impl<N> Clone for MemoryNodes<N> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            positions: Arc::clone(&self.positions),
        }
    }
}

impl<N> MemoryNodes<N> {
    pub fn new(nodes: Vec<N>) -> Self {
        let positions = (0..nodes.len()).collect();
        Self {
            source: nodes.into(),
            positions,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &N> {
        self.positions.iter().map(|&i| &self.source[i])
    }

    fn with_positions(&self, positions: Vec<usize>) -> Self {
        Self {
            source: Arc::clone(&self.source),
            positions: positions.into(),
        }
    }
}

impl<N> From<Vec<N>> for MemoryNodes<N> {
    fn from(nodes: Vec<N>) -> Self {
        Self::new(nodes)
    }
}

/// Accessor over [`MemoryNodes`]. Uses the collation of
/// [`compare_values`](crate::node::compare_values): nulls sort first in
/// ascending order.
pub struct MemoryAccessor<N> {
    strategy: CursorStrategy,
    _marker: PhantomData<fn() -> N>,
}

impl<N> Default for MemoryAccessor<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> MemoryAccessor<N> {
    pub fn new() -> Self {
        Self {
            strategy: CursorStrategy::Keyset,
            _marker: PhantomData,
        }
    }

    /// Offset cursors: forward-only and unstable under mutation.
    pub fn offset() -> Self {
        Self {
            strategy: CursorStrategy::Offset,
            _marker: PhantomData,
        }
    }
}

fn directed(ordering: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Asc => ordering,
        Direction::Desc => ordering.reverse(),
    }
}

/// Position of `node` relative to the cursor key, in sort order.
fn compare_to_key<N: Node>(node: &N, key: &[KeyPart<'_>]) -> Ordering {
    for part in key {
        let ordering = directed(
            compare_values(&node.field(part.column), part.value),
            part.direction,
        );
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

impl<N: Node> MemoryAccessor<N> {
    fn retain_relative(
        &self,
        nodes: &MemoryNodes<N>,
        cursor: &Cursor,
        order: &OrderArgs,
        keep: Ordering,
    ) -> Result<MemoryNodes<N>, Error> {
        let data = cursor.decode_data()?;
        let key = order.keyset(&data)?;
        let positions = nodes
            .positions
            .iter()
            .copied()
            .filter(|&i| compare_to_key(&nodes.source[i], &key) == keep)
            .collect();
        Ok(nodes.with_positions(positions))
    }
}

#[async_trait]
impl<N> Accessor for MemoryAccessor<N>
where
    N: Node + Clone + Send + Sync + 'static,
{
    type Handle = MemoryNodes<N>;
    type Node = N;

    fn kind(&self) -> &'static str {
        "memory"
    }

    fn cursor_strategy(&self) -> CursorStrategy {
        self.strategy
    }

    fn order_nodes_by(
        &self,
        nodes: &MemoryNodes<N>,
        order: &OrderArgs,
    ) -> Result<MemoryNodes<N>, Error> {
        let columns = order.sort_columns();
        let mut keyed: Vec<(Vec<Value>, usize)> = nodes
            .positions
            .iter()
            .map(|&i| {
                let node = &nodes.source[i];
                let key = columns.iter().map(|(column, _)| node.field(column)).collect();
                (key, i)
            })
            .collect();

        keyed.sort_by(|(a, _), (b, _)| {
            a.iter()
                .zip(b)
                .zip(&columns)
                .map(|((a, b), (_, direction))| directed(compare_values(a, b), *direction))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        Ok(nodes.with_positions(keyed.into_iter().map(|(_, i)| i).collect()))
    }

    fn remove_nodes_before_and_including(
        &self,
        nodes: &MemoryNodes<N>,
        cursor: &Cursor,
        order: &OrderArgs,
    ) -> Result<MemoryNodes<N>, Error> {
        match self.strategy {
            CursorStrategy::Keyset => self.retain_relative(nodes, cursor, order, Ordering::Greater),
            CursorStrategy::Offset => {
                let offset = cursor.decode_offset()?.offset;
                let skip = usize::try_from(offset).unwrap_or(usize::MAX);
                Ok(nodes.with_positions(nodes.positions.iter().copied().skip(skip).collect()))
            }
        }
    }

    fn remove_nodes_after_and_including(
        &self,
        nodes: &MemoryNodes<N>,
        cursor: &Cursor,
        order: &OrderArgs,
    ) -> Result<MemoryNodes<N>, Error> {
        match self.strategy {
            CursorStrategy::Keyset => self.retain_relative(nodes, cursor, order, Ordering::Less),
            CursorStrategy::Offset => Err(backward_not_supported()),
        }
    }

    fn remove_nodes_from_end(
        &self,
        nodes: &MemoryNodes<N>,
        keep: u64,
    ) -> Result<MemoryNodes<N>, Error> {
        let keep = usize::try_from(keep).unwrap_or(usize::MAX);
        Ok(nodes.with_positions(nodes.positions.iter().copied().take(keep).collect()))
    }

    fn remove_nodes_from_beginning(
        &self,
        nodes: &MemoryNodes<N>,
        keep: u64,
        _order: &OrderArgs,
    ) -> Result<MemoryNodes<N>, Error> {
        if self.strategy == CursorStrategy::Offset {
            return Err(backward_not_supported());
        }
        let keep = usize::try_from(keep).unwrap_or(usize::MAX);
        let skip = nodes.len().saturating_sub(keep);
        Ok(nodes.with_positions(nodes.positions[skip..].to_vec()))
    }

    async fn get_nodes_length(&self, nodes: &MemoryNodes<N>) -> Result<u64, Error> {
        Ok(nodes.len() as u64)
    }

    async fn fetch_nodes(&self, nodes: &MemoryNodes<N>) -> Result<Vec<N>, Error> {
        Ok(nodes.iter().cloned().collect())
    }
}
