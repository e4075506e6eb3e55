//! Dialect-neutral SELECT builder shared by the SQL accessors.
//!
//! A [`SqlQuery`] is a plain value: every transform clones and returns a new
//! query, so a base query can be reused for the windowed fetch and for the
//! total count. Placeholders are written as `?` and renumbered to `$n` when
//! rendering for Postgres.

use serde_json::Value;

use crate::{
    adapters::{CursorStrategy, backward_not_supported},
    cursor::Cursor,
    error::Error,
    query::{Direction, KeyPart, OrderArgs},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

/// A piece of SQL with its bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub binds: Vec<Value>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>, binds: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            binds,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Source {
    Table(String),
    Raw(Fragment, String),
    Subquery(Box<SqlQuery>, String),
}

#[derive(Debug, Clone, PartialEq)]
struct OrderTerm {
    expr: String,
    direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    source: Source,
    columns: String,
    wheres: Vec<Fragment>,
    group_by: Vec<String>,
    havings: Vec<Fragment>,
    order: Vec<OrderTerm>,
    limit: Option<u64>,
    offset: Option<u64>,
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Largest `LIMIT`/`OFFSET` the backends accept.
const MAX_BOUND: u64 = i64::MAX as u64;

impl SqlQuery {
    fn from_source(source: Source) -> Self {
        Self {
            source,
            columns: "*".to_string(),
            wheres: Vec::new(),
            group_by: Vec::new(),
            havings: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// `SELECT * FROM <table>`. The name is used verbatim.
    pub fn table(name: impl Into<String>) -> Self {
        Self::from_source(Source::Table(name.into()))
    }

    /// Select from an arbitrary SQL statement, aliased as `nodes`.
    pub fn from_sql(sql: impl Into<String>, binds: Vec<Value>) -> Self {
        Self::from_source(Source::Raw(Fragment::new(sql, binds), "nodes".to_string()))
    }

    fn wrap(inner: SqlQuery, alias: &str) -> Self {
        Self::from_source(Source::Subquery(Box::new(inner), alias.to_string()))
    }

    /// Replaces the select list.
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    /// Adds a `WHERE` condition, joined with `AND`.
    pub fn filter(mut self, sql: impl Into<String>, binds: Vec<Value>) -> Self {
        self.wheres.push(Fragment::new(sql, binds));
        self
    }

    pub fn group_by(mut self, columns: impl Into<String>) -> Self {
        self.group_by.push(columns.into());
        self
    }

    /// Adds a `HAVING` condition, joined with `AND`.
    pub fn having(mut self, sql: impl Into<String>, binds: Vec<Value>) -> Self {
        self.havings.push(Fragment::new(sql, binds));
        self
    }

    pub(crate) fn ordered_by(&self, order: &OrderArgs) -> Self {
        let mut query = self.clone();
        query.order = order
            .sort_columns()
            .into_iter()
            .map(|(column, direction)| OrderTerm {
                expr: order
                    .format_column(column, false)
                    .unwrap_or_else(|| quote_ident(column)),
                direction,
            })
            .collect();
        query
    }

    fn restricted(&self, predicate: Fragment, aggregate: bool) -> Self {
        let mut query = self.clone();
        if aggregate {
            query.havings.push(predicate);
        } else {
            query.wheres.push(predicate);
        }
        query
    }

    /// Keeps rows strictly after (`after == true`) or strictly before the cursor.
    pub(crate) fn bounded_by(
        &self,
        cursor: &Cursor,
        order: &OrderArgs,
        after: bool,
    ) -> Result<Self, Error> {
        let data = cursor.decode_data()?;
        let key = order.keyset(&data)?;
        let predicate = keyset_predicate(&key, order, after);
        let aggregate = key.iter().any(|part| order.is_aggregate(part.column));
        Ok(self.restricted(predicate, aggregate))
    }

    pub(crate) fn take_first(&self, keep: u64) -> Self {
        let mut query = self.clone();
        query.limit = Some(query.limit.map_or(keep, |limit| limit.min(keep)));
        query
    }

    pub(crate) fn skip(&self, count: u64) -> Self {
        let mut query = self.clone();
        query.offset = Some(query.offset.unwrap_or(0).saturating_add(count));
        query.limit = query.limit.map(|limit| limit.saturating_sub(count));
        query
    }

    /// Last `keep` rows: fetch from the reversed order, then restore it.
    pub(crate) fn take_last(&self, keep: u64, order: &OrderArgs) -> Self {
        let inverted = order.inverted();
        let reversed = if self.limit.is_none() && self.offset.is_none() {
            self.ordered_by(&inverted).take_first(keep)
        } else {
            Self::wrap(self.clone(), "windowed")
                .ordered_by(&inverted)
                .take_first(keep)
        };
        // the outer sort must use the same expressions as the inner one
        Self::wrap(reversed, "last_subquery").ordered_by(order)
    }

    /// Renders the query and its binds.
    pub fn to_sql(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut binds = Vec::new();
        let sql = self.render(dialect, &mut binds);
        (finish(sql, dialect), binds)
    }

    /// Renders `SELECT COUNT(*)` over this query.
    pub fn count_sql(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut inner = self.clone();
        if inner.limit.is_none() && inner.offset.is_none() {
            inner.order.clear();
        }
        let mut binds = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM ({}) AS counted",
            inner.render(dialect, &mut binds)
        );
        (finish(sql, dialect), binds)
    }

    fn render(&self, dialect: Dialect, binds: &mut Vec<Value>) -> String {
        let mut sql = format!("SELECT {} FROM ", self.columns);
        match &self.source {
            Source::Table(name) => sql.push_str(name),
            Source::Raw(fragment, alias) => {
                sql.push_str(&format!("({}) AS {}", fragment.sql, alias));
                binds.extend(fragment.binds.iter().cloned());
            }
            Source::Subquery(inner, alias) => {
                let inner = inner.render(dialect, binds);
                sql.push_str(&format!("({}) AS {}", inner, alias));
            }
        }

        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&join_fragments(&self.wheres, binds));
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.havings.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&join_fragments(&self.havings, binds));
        }
        if !self.order.is_empty() {
            let terms: Vec<String> = self
                .order
                .iter()
                .map(|term| {
                    // nulls sort as the smallest value on every backend
                    let nulls = match term.direction {
                        Direction::Asc => "NULLS FIRST",
                        Direction::Desc => "NULLS LAST",
                    };
                    format!("{} {} {}", term.expr, term.direction.as_sql(), nulls)
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        // both backends take signed 64-bit bounds
        match (self.limit, self.offset, dialect) {
            (Some(limit), _, _) => sql.push_str(&format!(" LIMIT {}", limit.min(MAX_BOUND))),
            (None, Some(_), Dialect::Sqlite) => sql.push_str(" LIMIT -1"),
            _ => {}
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset.min(MAX_BOUND)));
        }
        sql
    }
}

fn join_fragments(fragments: &[Fragment], binds: &mut Vec<Value>) -> String {
    let mut parts = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        parts.push(format!("({})", fragment.sql));
        binds.extend(fragment.binds.iter().cloned());
    }
    parts.join(" AND ")
}

fn finish(sql: String, dialect: Dialect) -> String {
    match dialect {
        Dialect::Sqlite => sql,
        Dialect::Postgres => number_placeholders(&sql),
    }
}

/// Rewrites `?` placeholders to `$1, $2, ...`, leaving quoted text alone.
fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut n = 0;
    for c in sql.chars() {
        match (quote, c) {
            (None, '\'' | '"') => {
                quote = Some(c);
                out.push(c);
            }
            (Some(q), c) if c == q => {
                quote = None;
                out.push(c);
            }
            (None, '?') => {
                n += 1;
                out.push_str(&format!("${}", n));
            }
            _ => out.push(c),
        }
    }
    out
}

fn equals(expr: &str, value: &Value, binds: &mut Vec<Value>) -> String {
    if value.is_null() {
        format!("{} IS NULL", expr)
    } else {
        binds.push(value.clone());
        format!("{} = ?", expr)
    }
}

/// Condition for `expr` coming strictly later than `value` when sorted in
/// `direction` with nulls smallest. `None` when nothing can follow.
fn follows(expr: &str, value: &Value, direction: Direction, binds: &mut Vec<Value>) -> Option<String> {
    match (direction, value.is_null()) {
        (Direction::Asc, true) => Some(format!("{} IS NOT NULL", expr)),
        (Direction::Asc, false) => {
            binds.push(value.clone());
            Some(format!("{} > ?", expr))
        }
        (Direction::Desc, true) => None,
        (Direction::Desc, false) => {
            binds.push(value.clone());
            Some(format!("({} < ? OR {} IS NULL)", expr, expr))
        }
    }
}

/// Lexicographic "strictly after" (or "strictly before") over the whole key:
/// `(c1 > v1) OR (c1 = v1 AND c2 > v2) OR ... OR (c1 = v1 AND ... AND pk > k)`.
pub(crate) fn keyset_predicate(key: &[KeyPart<'_>], order: &OrderArgs, after: bool) -> Fragment {
    let expr = |column: &str| {
        order
            .format_column(column, true)
            .unwrap_or_else(|| quote_ident(column))
    };

    let mut branches = Vec::with_capacity(key.len());
    let mut binds = Vec::new();
    for (i, part) in key.iter().enumerate() {
        let mut branch_binds = Vec::new();
        let mut conditions: Vec<String> = key[..i]
            .iter()
            .map(|prev| equals(&expr(prev.column), prev.value, &mut branch_binds))
            .collect();
        let direction = if after {
            part.direction
        } else {
            part.direction.invert()
        };
        let Some(condition) = follows(&expr(part.column), part.value, direction, &mut branch_binds)
        else {
            continue;
        };
        conditions.push(condition);
        branches.push(format!("({})", conditions.join(" AND ")));
        binds.extend(branch_binds);
    }

    if branches.is_empty() {
        return Fragment::new("1 = 0", Vec::new());
    }
    Fragment::new(branches.join(" OR "), binds)
}

/// Cursor bound for `after`, dispatched on the cursor strategy.
pub(crate) fn remove_before_and_including(
    query: &SqlQuery,
    cursor: &Cursor,
    order: &OrderArgs,
    strategy: CursorStrategy,
) -> Result<SqlQuery, Error> {
    match strategy {
        CursorStrategy::Keyset => query.bounded_by(cursor, order, true),
        CursorStrategy::Offset => Ok(query.skip(cursor.decode_offset()?.offset)),
    }
}

/// Cursor bound for `before`, dispatched on the cursor strategy.
pub(crate) fn remove_after_and_including(
    query: &SqlQuery,
    cursor: &Cursor,
    order: &OrderArgs,
    strategy: CursorStrategy,
) -> Result<SqlQuery, Error> {
    match strategy {
        CursorStrategy::Keyset => query.bounded_by(cursor, order, false),
        CursorStrategy::Offset => Err(backward_not_supported()),
    }
}

pub(crate) fn remove_from_beginning(
    query: &SqlQuery,
    keep: u64,
    order: &OrderArgs,
    strategy: CursorStrategy,
) -> Result<SqlQuery, Error> {
    match strategy {
        CursorStrategy::Keyset => Ok(query.take_last(keep, order)),
        CursorStrategy::Offset => Err(backward_not_supported()),
    }
}
