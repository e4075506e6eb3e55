//! Windowing steps of the pagination pipeline.
//!
//! Both steps only compose accessor transforms until the final fetch, so
//! the handles they receive are never modified.

use tracing::debug;

use crate::{
    adapters::Accessor,
    error::Error,
    query::{OrderArgs, PaginationArgs},
};

/// The nodes of one page plus its boundary flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Window<N> {
    pub nodes: Vec<N>,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

/// Cuts an ordered handle down to the nodes strictly between `after` and
/// `before`. `after` is applied first.
pub fn apply_cursors_to_nodes<A>(
    accessor: &A,
    nodes: &A::Handle,
    args: &PaginationArgs,
    order: &OrderArgs,
) -> Result<A::Handle, Error>
where
    A: Accessor + ?Sized,
{
    let mut bounded = nodes.clone();
    if let Some(after) = &args.after {
        bounded = accessor.remove_nodes_before_and_including(&bounded, after, order)?;
    }
    if let Some(before) = &args.before {
        bounded = accessor.remove_nodes_after_and_including(&bounded, before, order)?;
    }
    Ok(bounded)
}

/// Applies `first`/`last` to a cursor-bounded handle and fetches the page.
///
/// A single bound is probed by fetching one extra node. With both bounds
/// the window is trimmed at the end by `first`, then at the start by
/// `last`, with a length probe before each cut. A flag that is not probed
/// keeps its seed: `has_next_page` is true when `before` was given and
/// `has_previous_page` when `after` was given.
pub async fn nodes_to_return<A>(
    accessor: &A,
    bounded: &A::Handle,
    args: &PaginationArgs,
    order: &OrderArgs,
) -> Result<Window<A::Node>, Error>
where
    A: Accessor + ?Sized,
{
    let (first, last) = args.counts()?;
    let mut has_next_page = args.before.is_some();
    let mut has_previous_page = args.after.is_some();

    let nodes = match (first, last) {
        (Some(first), None) => {
            let probe = accessor.remove_nodes_from_end(bounded, first.saturating_add(1))?;
            let mut nodes = accessor.fetch_nodes(&probe).await?;
            if nodes.len() as u64 > first {
                has_next_page = true;
                nodes.truncate(first as usize);
            }
            nodes
        }
        (None, Some(last)) => {
            let probe =
                accessor.remove_nodes_from_beginning(bounded, last.saturating_add(1), order)?;
            let mut nodes = accessor.fetch_nodes(&probe).await?;
            let surplus = (nodes.len() as u64).saturating_sub(last) as usize;
            if surplus > 0 {
                has_previous_page = true;
                nodes.drain(..surplus);
            }
            nodes
        }
        (Some(first), Some(last)) => {
            debug!(first, last, "both `first` and `last` given, trimming end then start");
            has_next_page |= accessor.has_length_greater_than(bounded, first).await?;
            let window = accessor.remove_nodes_from_end(bounded, first)?;
            has_previous_page |= accessor.has_length_greater_than(&window, last).await?;
            let window = accessor.remove_nodes_from_beginning(&window, last, order)?;
            accessor.fetch_nodes(&window).await?
        }
        (None, None) => accessor.fetch_nodes(bounded).await?,
    };

    Ok(Window {
        nodes,
        has_previous_page,
        has_next_page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::{MemoryAccessor, MemoryNodes},
        cursor::CursorData,
        query::PaginateOptions,
    };
    use serde_json::{Value, json};

    fn setup() -> (MemoryAccessor<Value>, MemoryNodes<Value>, OrderArgs) {
        let accessor = MemoryAccessor::new();
        let order = PaginateOptions::<Value>::new().resolve().unwrap();
        let nodes = MemoryNodes::new((1..=6).map(|id| json!({"id": id})).collect());
        let ordered = accessor.order_nodes_by(&nodes, &order).unwrap();
        (accessor, ordered, order)
    }

    fn ids(window: &Window<Value>) -> Vec<i64> {
        window.nodes.iter().map(|n| n["id"].as_i64().unwrap()).collect()
    }

    fn cursor_of(id: i64) -> crate::cursor::Cursor {
        CursorData::new(json!(id), vec![json!(id)]).encode()
    }

    #[test]
    fn test_cursors_cut_both_sides() {
        let (accessor, nodes, order) = setup();
        let args = PaginationArgs::new()
            .with_after(cursor_of(2))
            .with_before(cursor_of(5));
        let bounded = apply_cursors_to_nodes(&accessor, &nodes, &args, &order).unwrap();
        let bounded: Vec<i64> = bounded.iter().map(|n| n["id"].as_i64().unwrap()).collect();
        assert_eq!(bounded, vec![3, 4]);
        assert_eq!(nodes.len(), 6);
    }

    #[tokio::test]
    async fn test_first_probes_one_extra() {
        let (accessor, nodes, order) = setup();

        let args = PaginationArgs::new().with_first(2);
        let window = nodes_to_return(&accessor, &nodes, &args, &order).await.unwrap();
        assert_eq!(ids(&window), vec![1, 2]);
        assert!(window.has_next_page);
        assert!(!window.has_previous_page);

        let args = PaginationArgs::new().with_first(6);
        let window = nodes_to_return(&accessor, &nodes, &args, &order).await.unwrap();
        assert_eq!(window.nodes.len(), 6);
        assert!(!window.has_next_page);
    }

    #[tokio::test]
    async fn test_last_probes_one_extra() {
        let (accessor, nodes, order) = setup();

        let args = PaginationArgs::new().with_last(2);
        let window = nodes_to_return(&accessor, &nodes, &args, &order).await.unwrap();
        assert_eq!(ids(&window), vec![5, 6]);
        assert!(window.has_previous_page);
        assert!(!window.has_next_page);

        let args = PaginationArgs::new().with_last(10);
        let window = nodes_to_return(&accessor, &nodes, &args, &order).await.unwrap();
        assert_eq!(window.nodes.len(), 6);
        assert!(!window.has_previous_page);
    }

    #[tokio::test]
    async fn test_first_and_last_trim_end_then_start() {
        let (accessor, nodes, order) = setup();
        let args = PaginationArgs::new().with_first(4).with_last(2);
        let window = nodes_to_return(&accessor, &nodes, &args, &order).await.unwrap();
        assert_eq!(ids(&window), vec![3, 4]);
        assert!(window.has_next_page);
        assert!(window.has_previous_page);
    }

    #[tokio::test]
    async fn test_flags_are_seeded_from_cursors() {
        let (accessor, nodes, order) = setup();
        let args = PaginationArgs::new()
            .with_after(cursor_of(4))
            .with_first(5);
        let bounded = apply_cursors_to_nodes(&accessor, &nodes, &args, &order).unwrap();
        let window = nodes_to_return(&accessor, &bounded, &args, &order).await.unwrap();
        assert_eq!(ids(&window), vec![5, 6]);
        assert!(window.has_previous_page);
        assert!(!window.has_next_page);

        let args = PaginationArgs::new().with_before(cursor_of(3));
        let bounded = apply_cursors_to_nodes(&accessor, &nodes, &args, &order).unwrap();
        let window = nodes_to_return(&accessor, &bounded, &args, &order).await.unwrap();
        assert_eq!(ids(&window), vec![1, 2]);
        assert!(window.has_next_page);
    }

    #[tokio::test]
    async fn test_zero_counts_yield_empty_pages() {
        let (accessor, nodes, order) = setup();
        let window = nodes_to_return(&accessor, &nodes, &PaginationArgs::new().with_first(0), &order)
            .await
            .unwrap();
        assert!(window.nodes.is_empty());
        assert!(window.has_next_page);

        let window = nodes_to_return(&accessor, &nodes, &PaginationArgs::new().with_last(0), &order)
            .await
            .unwrap();
        assert!(window.nodes.is_empty());
        assert!(window.has_previous_page);
    }
}
