use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    Arguments, FromRow, PgPool,
    postgres::{PgArguments, PgRow},
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

/// PostgreSQL accessor. Handles are [`SqlQuery`] values rendered with `$n`
/// placeholders.
///
/// Cursor values are bound as JSON scalars: integers as `BIGINT`, other
/// numbers as `DOUBLE PRECISION`, strings as `TEXT`. Sort and key columns
/// must compare against those types; a `UUID` key column needs a
/// `formatColumnFn` that casts it (e.g. `"id"::text`).
pub struct PostgresAccessor<N> {
    pool: PgPool,
    strategy: CursorStrategy,
    _marker: PhantomData<fn() -> N>,
}

impl<N> PostgresAccessor<N> {
    pub fn new(pool: PgPool) -> Self {
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

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Collects the binds of a rendered query, in placeholder order.
fn arguments(values: Vec<Value>) -> Result<PgArguments, Error> {
    let mut args = PgArguments::default();
    for value in values {
        let added = match value {
            Value::Null => args.add(None::<String>),
            Value::Bool(b) => args.add(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => args.add(i),
                None => args.add(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => args.add(s),
            // arrays and objects compare as JSONB
            other => args.add(other),
        };
        added.map_err(|e| Error::Storage(e.to_string()))?;
    }
    Ok(args)
}

#[async_trait]
impl<N> Accessor for PostgresAccessor<N>
where
    N: for<'r> FromRow<'r, PgRow> + Node + Send + Unpin + 'static,
{
    type Handle = SqlQuery;
    type Node = N;

    fn kind(&self) -> &'static str {
        "postgres"
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
        let (sql, binds) = nodes.count_sql(Dialect::Postgres);
        let count = sqlx::query_scalar_with::<_, i64, _>(&sql, arguments(binds)?)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(count.max(0) as u64)
    }

    async fn fetch_nodes(&self, nodes: &SqlQuery) -> Result<Vec<N>, Error> {
        let (sql, binds) = nodes.to_sql(Dialect::Postgres);
        sqlx::query_as_with::<_, N, _>(&sql, arguments(binds)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Storage(e.to_string()))
    }
}
