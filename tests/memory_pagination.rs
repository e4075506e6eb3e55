use serde::Serialize;
use serde_json::{Value, json};
use taxis::{
    Connection, Cursor, CursorData, Direction, Error, MemoryAccessor, MemoryNodes, Node,
    OffsetCursor, PaginateOptions, PaginationArgs, Paginator, field_of,
};

fn setup() -> (Paginator<MemoryAccessor<Value>>, MemoryNodes<Value>) {
    let nodes = MemoryNodes::new(vec![
        json!({"id": 3, "name": "Garfield", "lastName": "Abbot"}),
        json!({"id": 1, "name": "Garfield", "lastName": "Arbuckle"}),
        json!({"id": 4, "name": "Felix", "lastName": "Cat"}),
        json!({"id": 2, "name": "Felix", "lastName": "Cat"}),
        json!({"id": 5, "name": "Tom", "lastName": "Cat"}),
    ]);
    (Paginator::new(MemoryAccessor::new()), nodes)
}

fn four_cats() -> MemoryNodes<Value> {
    MemoryNodes::new((1..=4).map(|id| json!({"id": id})).collect())
}

fn ids<N: Node>(page: &Connection<N>) -> Vec<i64> {
    page.nodes()
        .map(|n| n.field("id").as_i64().unwrap())
        .collect()
}

fn cursor_of(page: &Connection<Value>, id: i64) -> Cursor {
    page.edges
        .iter()
        .find(|edge| edge.node["id"] == json!(id))
        .map(|edge| edge.cursor.clone())
        .unwrap()
}

async fn walk_forward(
    paginator: &Paginator<MemoryAccessor<Value>>,
    nodes: &MemoryNodes<Value>,
    options: &PaginateOptions<Value>,
    size: i64,
) -> Vec<i64> {
    let mut seen = Vec::new();
    let mut args = PaginationArgs::new().with_first(size);
    loop {
        let page = paginator.paginate(nodes, &args, options).await.unwrap();
        seen.extend(ids(&page));
        if !page.page_info.has_next_page {
            return seen;
        }
        args = PaginationArgs::new()
            .with_first(size)
            .with_after(page.page_info.end_cursor.unwrap());
    }
}

async fn walk_backward(
    paginator: &Paginator<MemoryAccessor<Value>>,
    nodes: &MemoryNodes<Value>,
    options: &PaginateOptions<Value>,
    size: i64,
) -> Vec<i64> {
    let mut seen = Vec::new();
    let mut args = PaginationArgs::new().with_last(size);
    loop {
        let page = paginator.paginate(nodes, &args, options).await.unwrap();
        let mut chunk = ids(&page);
        chunk.extend(seen);
        seen = chunk;
        if !page.page_info.has_previous_page {
            return seen;
        }
        args = PaginationArgs::new()
            .with_last(size)
            .with_before(page.page_info.start_cursor.unwrap());
    }
}

#[tokio::test]
async fn test_forward_pages() {
    let paginator = Paginator::new(MemoryAccessor::new());
    let nodes = four_cats();
    let options = PaginateOptions::new();

    let page = paginator
        .paginate(&nodes, &PaginationArgs::new().with_first(2), &options)
        .await
        .unwrap();
    assert_eq!(ids(&page), vec![1, 2]);
    assert!(page.page_info.has_next_page);
    assert!(!page.page_info.has_previous_page);
    assert_eq!(page.total_count, Some(4));

    let args = PaginationArgs::new()
        .with_first(2)
        .with_after(cursor_of(&page, 2));
    let page = paginator.paginate(&nodes, &args, &options).await.unwrap();
    assert_eq!(ids(&page), vec![3, 4]);
    assert!(!page.page_info.has_next_page);
    assert!(page.page_info.has_previous_page);
    assert_eq!(page.total_count, Some(2));
}

#[tokio::test]
async fn test_backward_pages() {
    let paginator = Paginator::new(MemoryAccessor::new());
    let nodes = four_cats();
    let options = PaginateOptions::new();

    let page = paginator
        .paginate(&nodes, &PaginationArgs::new().with_last(2), &options)
        .await
        .unwrap();
    assert_eq!(ids(&page), vec![3, 4]);
    assert!(page.page_info.has_previous_page);
    assert!(!page.page_info.has_next_page);

    let args = PaginationArgs::new()
        .with_last(2)
        .with_before(cursor_of(&page, 3));
    let page = paginator.paginate(&nodes, &args, &options).await.unwrap();
    assert_eq!(ids(&page), vec![1, 2]);
    assert!(!page.page_info.has_previous_page);
    assert!(page.page_info.has_next_page);
}

#[tokio::test]
async fn test_page_sizes_cover_the_set() {
    let paginator = Paginator::new(MemoryAccessor::new());
    let nodes = four_cats();
    let options = PaginateOptions::new();

    for k in 1..4 {
        let page = paginator
            .paginate(&nodes, &PaginationArgs::new().with_first(k), &options)
            .await
            .unwrap();
        assert_eq!(page.edges.len(), k as usize);
        assert!(page.page_info.has_next_page);
    }

    let page = paginator
        .paginate(&nodes, &PaginationArgs::new().with_first(4), &options)
        .await
        .unwrap();
    assert_eq!(page.edges.len(), 4);
    assert!(!page.page_info.has_next_page);
}

#[tokio::test]
async fn test_composite_sort_breaks_ties_in_column_order() {
    let (paginator, nodes) = setup();
    let options = PaginateOptions::new().order_by(vec!["name", "lastName"]);

    let page = paginator
        .paginate(&nodes, &PaginationArgs::new().with_first(2), &options)
        .await
        .unwrap();
    assert_eq!(ids(&page), vec![2, 4]);

    let end = page.page_info.end_cursor.clone().unwrap();
    assert_eq!(
        end.decode_data().unwrap(),
        CursorData::new(json!(4), vec![json!("Felix"), json!("Cat")])
    );

    let args = PaginationArgs::new().with_first(2).with_after(end);
    let page = paginator.paginate(&nodes, &args, &options).await.unwrap();
    assert_eq!(ids(&page), vec![3, 1]);
    assert!(page.page_info.has_next_page);

    assert_eq!(walk_forward(&paginator, &nodes, &options, 2).await, vec![2, 4, 3, 1, 5]);
}

#[tokio::test]
async fn test_mixed_directions_walk_both_ways() {
    let (paginator, nodes) = setup();
    let options = PaginateOptions::new()
        .order_by(vec!["name", "lastName"])
        .order_direction(vec![Direction::Desc, Direction::Asc]);

    // the primary key follows the first column's direction
    let expected = vec![5, 3, 1, 4, 2];
    for size in 1..=5 {
        assert_eq!(walk_forward(&paginator, &nodes, &options, size).await, expected);
        assert_eq!(walk_backward(&paginator, &nodes, &options, size).await, expected);
    }
}

#[tokio::test]
async fn test_null_boundary_is_crossed_without_gaps() {
    let paginator = Paginator::new(MemoryAccessor::new());
    let nodes = MemoryNodes::new(vec![
        json!({"id": 1, "name": "Tom"}),
        json!({"id": 2, "name": null}),
        json!({"id": 3, "name": "Felix"}),
        json!({"id": 4}),
        json!({"id": 5, "name": "Felix"}),
        json!({"id": 6, "name": null}),
    ]);

    let asc = PaginateOptions::new().order_by("name");
    let desc = PaginateOptions::new()
        .order_by("name")
        .order_direction(Direction::Desc);

    for size in 1..=6 {
        assert_eq!(
            walk_forward(&paginator, &nodes, &asc, size).await,
            vec![2, 4, 6, 3, 5, 1]
        );
        assert_eq!(
            walk_backward(&paginator, &nodes, &asc, size).await,
            vec![2, 4, 6, 3, 5, 1]
        );
        assert_eq!(
            walk_forward(&paginator, &nodes, &desc, size).await,
            vec![1, 5, 3, 6, 4, 2]
        );
        assert_eq!(
            walk_backward(&paginator, &nodes, &desc, size).await,
            vec![1, 5, 3, 6, 4, 2]
        );
    }
}

#[tokio::test]
async fn test_repeated_calls_are_identical() {
    let (paginator, nodes) = setup();
    let options = PaginateOptions::new().order_by("name");
    let args = PaginationArgs::new().with_first(3);

    let a = paginator.paginate(&nodes, &args, &options).await.unwrap();
    let b = paginator.paginate(&nodes, &args, &options).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_cursors_survive_insertions() {
    let paginator = Paginator::new(MemoryAccessor::new());
    let options = PaginateOptions::new().order_by("name");
    let mut records = vec![
        json!({"id": 1, "name": "Felix"}),
        json!({"id": 2, "name": "Garfield"}),
        json!({"id": 3, "name": "Sylvester"}),
        json!({"id": 4, "name": "Tom"}),
    ];

    let page = paginator
        .paginate(
            &MemoryNodes::new(records.clone()),
            &PaginationArgs::new().with_first(2),
            &options,
        )
        .await
        .unwrap();
    let end = page.page_info.end_cursor.clone().unwrap();

    records.push(json!({"id": 5, "name": "Azrael"}));
    records.push(json!({"id": 6, "name": "Scratchy"}));
    let grown = MemoryNodes::new(records);

    let args = PaginationArgs::new().with_first(2).with_after(end.clone());
    let next = paginator.paginate(&grown, &args, &options).await.unwrap();
    assert_eq!(ids(&next), vec![6, 3]);

    // the same node gets the same cursor in the grown set
    let all = paginator
        .paginate(&grown, &PaginationArgs::new(), &options)
        .await
        .unwrap();
    assert_eq!(cursor_of(&all, 2), end);
}

#[tokio::test]
async fn test_offset_cursors() {
    let paginator = Paginator::new(MemoryAccessor::offset());
    let nodes = four_cats();
    let options = PaginateOptions::new();

    let page = paginator
        .paginate(&nodes, &PaginationArgs::new().with_first(2), &options)
        .await
        .unwrap();
    assert_eq!(ids(&page), vec![1, 2]);
    let end = page.page_info.end_cursor.clone().unwrap();
    assert_eq!(end.decode_offset().unwrap(), OffsetCursor::new(json!(2), 2));

    let args = PaginationArgs::new().with_first(2).with_after(end);
    let page = paginator.paginate(&nodes, &args, &options).await.unwrap();
    assert_eq!(ids(&page), vec![3, 4]);
    assert_eq!(
        page.page_info.end_cursor.unwrap().decode_offset().unwrap().offset,
        4
    );

    let err = paginator
        .paginate(&nodes, &PaginationArgs::new().with_last(2), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));

    let args = PaginationArgs::new().with_before(OffsetCursor::new(json!(3), 3).encode());
    let err = paginator.paginate(&nodes, &args, &options).await.unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
}

#[tokio::test]
async fn test_invalid_arguments() {
    let (paginator, nodes) = setup();
    let options = PaginateOptions::new().order_by("name");

    let err = paginator
        .paginate(&nodes, &PaginationArgs::new().with_first(-1), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let err = paginator
        .paginate(&nodes, &PaginationArgs::new().with_after("not a cursor"), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCursor(_)));

    // a cursor issued for a different sort
    let foreign = CursorData::new(json!(1), vec![json!("Felix"), json!("Cat")]).encode();
    let err = paginator
        .paginate(&nodes, &PaginationArgs::new().with_before(foreign), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCursor(_)));

    let mismatched = PaginateOptions::new()
        .order_by(vec!["name", "lastName"])
        .order_direction(vec![Direction::Asc]);
    let err = paginator
        .paginate(&nodes, &PaginationArgs::new(), &mismatched)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn test_options_from_json_and_hooks() {
    let (paginator, nodes) = setup();
    let options: PaginateOptions<Value> = serde_json::from_value(json!({
        "orderColumn": "name",
        "ascOrDesc": "desc",
        "skipTotalCount": true
    }))
    .unwrap();
    let options = options.modify_edge_fn(|mut edge| {
        edge.node["cursor"] = json!(edge.cursor.as_str());
        edge
    });

    let page = paginator
        .paginate(&nodes, &PaginationArgs::new().with_first(1), &options)
        .await
        .unwrap();
    assert_eq!(page.total_count, None);
    assert_eq!(ids(&page), vec![5]);
    assert_eq!(
        page.edges[0].node["cursor"],
        json!(page.edges[0].cursor.as_str())
    );
}

#[tokio::test]
async fn test_concurrent_calls_share_the_handle() {
    let (paginator, nodes) = setup();
    let options = PaginateOptions::new().order_by("name");
    let forward = paginator.clone();
    let backward = paginator.clone();

    let first_args = PaginationArgs::new().with_first(2);
    let last_args = PaginationArgs::new().with_last(2);
    let (a, b) = tokio::join!(
        forward.paginate(&nodes, &first_args, &options),
        backward.paginate(&nodes, &last_args, &options),
    );

    assert_eq!(ids(&a.unwrap()), vec![2, 4]);
    assert_eq!(ids(&b.unwrap()), vec![3, 5]);
    assert_eq!(nodes.len(), 5);
}

#[derive(Debug, Clone, Serialize)]
struct Cat {
    id: u32,
    name: String,
    lives: u8,
}

impl Node for Cat {
    fn field(&self, column: &str) -> Value {
        field_of(self, column)
    }
}

#[tokio::test]
async fn test_typed_nodes() {
    let paginator = Paginator::new(MemoryAccessor::new());
    let nodes = MemoryNodes::new(vec![
        Cat { id: 1, name: "Felix".into(), lives: 9 },
        Cat { id: 2, name: "Tom".into(), lives: 3 },
        Cat { id: 3, name: "Garfield".into(), lives: 9 },
    ]);
    let options = PaginateOptions::new()
        .order_by("lives")
        .order_direction(Direction::Desc);

    let page = paginator
        .paginate(&nodes, &PaginationArgs::new().with_first(2), &options)
        .await
        .unwrap();
    assert_eq!(ids(&page), vec![3, 1]);

    let args = PaginationArgs::new()
        .with_first(2)
        .with_after(page.page_info.end_cursor.unwrap());
    let page = paginator.paginate(&nodes, &args, &options).await.unwrap();
    assert_eq!(ids(&page), vec![2]);
    assert!(!page.page_info.has_next_page);
}
