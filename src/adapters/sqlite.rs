use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    Arguments, FromRow,
    sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow},
};

use crate::{
    adapters::{
        Accessor, CursorStrategy,
        sql::{self, Dialect, SqlQuery},
    },
    cursor::Cursor,
    error::Error,
    node::Node,
    query::OrderArgs,
};

/// SQLite accessor. Handles are [`SqlQuery`] values; rows are decoded into
/// `N` through [`sqlx::FromRow`].
///
/// ```ignore
/// let accessor = SqliteAccessor::<Cat>::new_memory().await?;
/// let page = Paginator::new(accessor)
///     .paginate(&SqlQuery::table("cats"), &args, &options)
///     .await?;
/// ```
pub struct SqliteAccessor<N> {
    pool: SqlitePool,
    strategy: CursorStrategy,
    _marker: PhantomData<fn() -> N>,
}

impl<N> SqliteAccessor<N> {
    /// Create a new SQLite accessor with a file-based database
    pub async fn new_file(path: &str) -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{}", path))
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(Self::from_pool(pool))
    }

    /// Create a new SQLite accessor with an in-memory database
    pub async fn new_memory() -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(Self::from_pool(pool))
    }

    /// Create from an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            strategy: CursorStrategy::Keyset,
            _marker: PhantomData,
        }
    }

    pub fn with_strategy(mut self, strategy: CursorStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Collects the binds of a rendered query, in placeholder order.
fn arguments<'q>(values: Vec<Value>) -> Result<SqliteArguments<'q>, Error> {
    let mut args = SqliteArguments::default();
    for value in values {
        let added = match value {
            Value::Null => args.add(None::<String>),
            Value::Bool(b) => args.add(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => args.add(i),
                None => args.add(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => args.add(s),
            // composite values are compared as their JSON text
            other => args.add(other.to_string()),
        };
        added.map_err(|e| Error::Storage(e.to_string()))?;
    }
    Ok(args)
}

#[async_trait]
impl<N> Accessor for SqliteAccessor<N>
where
    N: for<'r> FromRow<'r, SqliteRow> + Node + Send + Unpin + 'static,
{
    type Handle = SqlQuery;
    type Node = N;

    fn kind(&self) -> &'static str {
        "sqlite"
    }

    fn cursor_strategy(&self) -> CursorStrategy {
        self.strategy
    }

    fn order_nodes_by(&self, nodes: &SqlQuery, order: &OrderArgs) -> Result<SqlQuery, Error> {
        Ok(nodes.ordered_by(order))
    }

    fn remove_nodes_before_and_including(
        &self,
        nodes: &SqlQuery,
        cursor: &Cursor,
        order: &OrderArgs,
    ) -> Result<SqlQuery, Error> {
        sql::remove_before_and_including(nodes, cursor, order, self.strategy)
    }

    fn remove_nodes_after_and_including(
        &self,
        nodes: &SqlQuery,
        cursor: &Cursor,
        order: &OrderArgs,
    ) -> Result<SqlQuery, Error> {
        sql::remove_after_and_including(nodes, cursor, order, self.strategy)
    }

    fn remove_nodes_from_end(&self, nodes: &SqlQuery, keep: u64) -> Result<SqlQuery, Error> {
        Ok(nodes.take_first(keep))
    }

    fn remove_nodes_from_beginning(
        &self,
        nodes: &SqlQuery,
        keep: u64,
        order: &OrderArgs,
    ) -> Result<SqlQuery, Error> {
        sql::remove_from_beginning(nodes, keep, order, self.strategy)
    }

    async fn get_nodes_length(&self, nodes: &SqlQuery) -> Result<u64, Error> {
        let (sql, binds) = nodes.count_sql(Dialect::Sqlite);
        let count = sqlx::query_scalar_with::<_, i64, _>(&sql, arguments(binds)?)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(count.max(0) as u64)
    }

    async fn fetch_nodes(&self, nodes: &SqlQuery) -> Result<Vec<N>, Error> {
        let (sql, binds) = nodes.to_sql(Dialect::Sqlite);
        sqlx::query_as_with::<_, N, _>(&sql, arguments(binds)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Storage(e.to_string()))
    }
}
