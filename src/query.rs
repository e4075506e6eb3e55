use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{
    connection::Edge,
    cursor::{Cursor, CursorData},
    error::Error,
};

pub type AggregateFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;
pub type FormatColumnFn = Arc<dyn Fn(&str, bool) -> String + Send + Sync>;
pub type ModifyEdgeFn<N> = Arc<dyn Fn(Edge<N>) -> Edge<N> + Send + Sync>;

pub const DEFAULT_PRIMARY_KEY: &str = "id";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    #[serde(alias = "ASC", alias = "Asc")]
    Asc,
    #[serde(alias = "DESC", alias = "Desc")]
    Desc,
}

impl Direction {
    pub fn invert(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(Error::InvalidArgument(format!(
                "order direction must be `asc` or `desc`, got `{}`",
                other
            ))),
        }
    }
}

/// One column name or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    One(String),
    Many(Vec<String>),
}

impl ColumnSpec {
    fn into_vec(self) -> Vec<String> {
        match self {
            ColumnSpec::One(column) => vec![column],
            ColumnSpec::Many(columns) => columns,
        }
    }
}

impl From<&str> for ColumnSpec {
    fn from(value: &str) -> Self {
        ColumnSpec::One(value.to_string())
    }
}

impl From<String> for ColumnSpec {
    fn from(value: String) -> Self {
        ColumnSpec::One(value)
    }
}

impl<S: Into<String>> From<Vec<S>> for ColumnSpec {
    fn from(value: Vec<S>) -> Self {
        ColumnSpec::Many(value.into_iter().map(Into::into).collect())
    }
}

/// One direction broadcast to every column, or one direction per column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DirectionSpec {
    One(Direction),
    Many(Vec<Direction>),
}

impl From<Direction> for DirectionSpec {
    fn from(value: Direction) -> Self {
        DirectionSpec::One(value)
    }
}

impl From<Vec<Direction>> for DirectionSpec {
    fn from(value: Vec<Direction>) -> Self {
        DirectionSpec::Many(value)
    }
}

/// The Relay window arguments.
///
/// `first` and `last` are signed so that negative client input can be
/// rejected with [`Error::InvalidArgument`] instead of failing to parse.
/// Passing both `first` and `last` is allowed: the window is cut by the
/// cursors, then `first` trims the end, then `last` trims the start. Relay
/// clients should not rely on that combination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginationArgs {
    pub before: Option<Cursor>,
    pub after: Option<Cursor>,
    pub first: Option<i64>,
    pub last: Option<i64>,
}

impl PaginationArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_first(mut self, first: i64) -> Self {
        self.first = Some(first);
        self
    }

    pub fn with_last(mut self, last: i64) -> Self {
        self.last = Some(last);
        self
    }

    pub fn with_after(mut self, cursor: impl Into<Cursor>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn with_before(mut self, cursor: impl Into<Cursor>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    /// Validated `(first, last)`.
    pub fn counts(&self) -> Result<(Option<u64>, Option<u64>), Error> {
        Ok((
            non_negative("first", self.first)?,
            non_negative("last", self.last)?,
        ))
    }
}

fn non_negative(name: &str, value: Option<i64>) -> Result<Option<u64>, Error> {
    match value {
        Some(v) if v < 0 => Err(Error::InvalidArgument(format!(
            "`{}` argument can not be less than 0",
            name
        ))),
        Some(v) => Ok(Some(v as u64)),
        None => Ok(None),
    }
}

/// Pagination configuration.
///
/// The data fields deserialize from camelCase JSON. `orderColumn` and
/// `ascOrDesc` are the legacy spellings of `orderBy` and `orderDirection`;
/// [`PaginateOptions::resolve`] folds them into one [`OrderArgs`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginateOptions<N> {
    pub order_by: Option<ColumnSpec>,
    pub order_direction: Option<DirectionSpec>,
    pub order_column: Option<ColumnSpec>,
    pub asc_or_desc: Option<DirectionSpec>,
    pub primary_key: Option<String>,
    pub skip_total_count: bool,
    #[serde(skip, default)]
    pub is_aggregate_fn: Option<AggregateFn>,
    #[serde(skip, default)]
    pub format_column_fn: Option<FormatColumnFn>,
    #[serde(skip, default)]
    pub modify_edge_fn: Option<ModifyEdgeFn<N>>,
}

impl<N> Default for PaginateOptions<N> {
    fn default() -> Self {
        Self {
            order_by: None,
            order_direction: None,
            order_column: None,
            asc_or_desc: None,
            primary_key: None,
            skip_total_count: false,
            is_aggregate_fn: None,
            format_column_fn: None,
            modify_edge_fn: None,
        }
    }
}

impl<N> Clone for PaginateOptions<N> {
    fn clone(&self) -> Self {
        Self {
            order_by: self.order_by.clone(),
            order_direction: self.order_direction.clone(),
            order_column: self.order_column.clone(),
            asc_or_desc: self.asc_or_desc.clone(),
            primary_key: self.primary_key.clone(),
            skip_total_count: self.skip_total_count,
            is_aggregate_fn: self.is_aggregate_fn.clone(),
            format_column_fn: self.format_column_fn.clone(),
            modify_edge_fn: self.modify_edge_fn.clone(),
        }
    }
}

impl<N> fmt::Debug for PaginateOptions<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginateOptions")
            .field("order_by", &self.order_by)
            .field("order_direction", &self.order_direction)
            .field("order_column", &self.order_column)
            .field("asc_or_desc", &self.asc_or_desc)
            .field("primary_key", &self.primary_key)
            .field("skip_total_count", &self.skip_total_count)
            .field("is_aggregate_fn", &self.is_aggregate_fn.is_some())
            .field("format_column_fn", &self.format_column_fn.is_some())
            .field("modify_edge_fn", &self.modify_edge_fn.is_some())
            .finish()
    }
}

impl<N> PaginateOptions<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by(mut self, columns: impl Into<ColumnSpec>) -> Self {
        self.order_by = Some(columns.into());
        self
    }

    pub fn order_direction(mut self, directions: impl Into<DirectionSpec>) -> Self {
        self.order_direction = Some(directions.into());
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    pub fn skip_total_count(mut self, skip: bool) -> Self {
        self.skip_total_count = skip;
        self
    }

    /// Columns for which this returns true are filtered in `HAVING` rather than `WHERE`.
    pub fn is_aggregate_fn(mut self, f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.is_aggregate_fn = Some(Arc::new(f));
        self
    }

    /// Rewrites a logical column into a backend expression. The flag is true
    /// when the column is used inside a comparison predicate and false inside
    /// `ORDER BY`.
    pub fn format_column_fn(
        mut self,
        f: impl Fn(&str, bool) -> String + Send + Sync + 'static,
    ) -> Self {
        self.format_column_fn = Some(Arc::new(f));
        self
    }

    /// Applied to every edge before the page is returned.
    pub fn modify_edge_fn(mut self, f: impl Fn(Edge<N>) -> Edge<N> + Send + Sync + 'static) -> Self {
        self.modify_edge_fn = Some(Arc::new(f));
        self
    }

    /// Folds legacy option names and defaults into the canonical ordering.
    pub fn resolve(&self) -> Result<OrderArgs, Error> {
        let columns = match (&self.order_by, &self.order_column) {
            (Some(order_by), Some(_)) => {
                warn!("both `orderBy` and `orderColumn` are set, `orderColumn` is ignored");
                Some(order_by)
            }
            (Some(order_by), None) => Some(order_by),
            (None, Some(order_column)) => {
                warn!("`orderColumn` is deprecated, use `orderBy`");
                Some(order_column)
            }
            (None, None) => None,
        };
        let directions = match (&self.order_direction, &self.asc_or_desc) {
            (Some(direction), Some(_)) => {
                warn!("both `orderDirection` and `ascOrDesc` are set, `ascOrDesc` is ignored");
                Some(direction)
            }
            (Some(direction), None) => Some(direction),
            (None, Some(asc_or_desc)) => {
                warn!("`ascOrDesc` is deprecated, use `orderDirection`");
                Some(asc_or_desc)
            }
            (None, None) => None,
        };

        let primary_key = self
            .primary_key
            .clone()
            .unwrap_or_else(|| DEFAULT_PRIMARY_KEY.to_string());
        let columns = columns
            .cloned()
            .map(ColumnSpec::into_vec)
            .unwrap_or_else(|| vec![primary_key.clone()]);
        if columns.is_empty() {
            return Err(Error::InvalidArgument(
                "`orderBy` must name at least one column".to_string(),
            ));
        }

        let directions = match directions {
            None => vec![Direction::Asc; columns.len()],
            Some(DirectionSpec::One(direction)) => vec![*direction; columns.len()],
            Some(DirectionSpec::Many(directions)) if directions.len() == columns.len() => {
                directions.clone()
            }
            Some(DirectionSpec::Many(directions)) => {
                return Err(Error::InvalidArgument(format!(
                    "`orderDirection` has {} entries but `orderBy` has {} columns",
                    directions.len(),
                    columns.len()
                )));
            }
        };

        if let Some(format) = &self.format_column_fn {
            for column in &columns {
                if format(column, true) == *column {
                    warn!(
                        column = %column,
                        "`formatColumnFn` maps the order column to itself, cursor comparisons may target the wrong expression"
                    );
                }
            }
        }

        Ok(OrderArgs {
            columns,
            directions,
            primary_key,
            is_aggregate_fn: self.is_aggregate_fn.clone(),
            format_column_fn: self.format_column_fn.clone(),
        })
    }
}

/// One position of the total sort key, bound to the cursor's value for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPart<'a> {
    pub column: &'a str,
    pub direction: Direction,
    pub value: &'a Value,
}

/// Resolved ordering handed to accessor operations.
#[derive(Clone)]
pub struct OrderArgs {
    pub columns: Vec<String>,
    pub directions: Vec<Direction>,
    pub primary_key: String,
    is_aggregate_fn: Option<AggregateFn>,
    format_column_fn: Option<FormatColumnFn>,
}

impl fmt::Debug for OrderArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderArgs")
            .field("columns", &self.columns)
            .field("directions", &self.directions)
            .field("primary_key", &self.primary_key)
            .finish_non_exhaustive()
    }
}

impl OrderArgs {
    pub fn new(
        columns: Vec<String>,
        directions: Vec<Direction>,
        primary_key: impl Into<String>,
    ) -> Result<Self, Error> {
        if columns.is_empty() || columns.len() != directions.len() {
            return Err(Error::InvalidArgument(format!(
                "{} order columns with {} directions",
                columns.len(),
                directions.len()
            )));
        }
        Ok(Self {
            columns,
            directions,
            primary_key: primary_key.into(),
            is_aggregate_fn: None,
            format_column_fn: None,
        })
    }

    /// Direction of the primary key tie-break: that of the first column.
    pub fn tie_break_direction(&self) -> Direction {
        self.directions.first().copied().unwrap_or_default()
    }

    /// Whether the primary key must be appended to make the order total.
    pub fn needs_tie_break(&self) -> bool {
        !self.columns.iter().any(|c| *c == self.primary_key)
    }

    /// Every `(column, direction)` of the total order, tie-break included.
    pub fn sort_columns(&self) -> Vec<(&str, Direction)> {
        let mut out: Vec<(&str, Direction)> = self
            .columns
            .iter()
            .map(String::as_str)
            .zip(self.directions.iter().copied())
            .collect();
        if self.needs_tie_break() {
            out.push((self.primary_key.as_str(), self.tie_break_direction()));
        }
        out
    }

    /// Same columns, every direction flipped.
    pub fn inverted(&self) -> Self {
        let mut inverted = self.clone();
        inverted.directions = self.directions.iter().map(|d| d.invert()).collect();
        inverted
    }

    /// Pairs the total order with the values carried by a cursor.
    pub fn keyset<'a>(&'a self, data: &'a CursorData) -> Result<Vec<KeyPart<'a>>, Error> {
        if data.sort_values.len() != self.columns.len() {
            return Err(Error::InvalidCursor(format!(
                "cursor carries {} sort values but the order has {} columns",
                data.sort_values.len(),
                self.columns.len()
            )));
        }
        let mut parts: Vec<KeyPart<'a>> = self
            .columns
            .iter()
            .zip(&self.directions)
            .zip(&data.sort_values)
            .map(|((column, direction), value)| KeyPart {
                column,
                direction: *direction,
                value,
            })
            .collect();
        if self.needs_tie_break() {
            parts.push(KeyPart {
                column: &self.primary_key,
                direction: self.tie_break_direction(),
                value: &data.primary_key,
            });
        }
        Ok(parts)
    }

    pub fn is_aggregate(&self, column: &str) -> bool {
        self.is_aggregate_fn.as_ref().is_some_and(|f| f(column))
    }

    /// The caller's rewrite of `column`, if a `formatColumnFn` is configured.
    pub fn format_column(&self, column: &str, is_raw: bool) -> Option<String> {
        self.format_column_fn.as_ref().map(|f| f(column, is_raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    type Options = PaginateOptions<Value>;

    #[test]
    fn test_defaults_to_primary_key_ascending() {
        let order = Options::new().resolve().unwrap();
        assert_eq!(order.columns, vec!["id".to_string()]);
        assert_eq!(order.directions, vec![Direction::Asc]);
        assert!(!order.needs_tie_break());
        assert_eq!(order.sort_columns(), vec![("id", Direction::Asc)]);

        let order = Options::new().primary_key("uuid").resolve().unwrap();
        assert_eq!(order.columns, vec!["uuid".to_string()]);
    }

    #[test]
    fn test_scalar_direction_is_broadcast() {
        let order = Options::new()
            .order_by(vec!["name", "last_name"])
            .order_direction(Direction::Desc)
            .resolve()
            .unwrap();
        assert_eq!(order.directions, vec![Direction::Desc, Direction::Desc]);
        assert_eq!(
            order.sort_columns(),
            vec![
                ("name", Direction::Desc),
                ("last_name", Direction::Desc),
                ("id", Direction::Desc)
            ]
        );
    }

    #[test]
    fn test_mismatched_arity_is_rejected() {
        let result = Options::new()
            .order_by(vec!["name", "last_name"])
            .order_direction(vec![Direction::Asc])
            .resolve();
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let result = Options::new()
            .order_by("name")
            .order_direction(vec![Direction::Asc, Direction::Desc])
            .resolve();
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let result = Options::new().order_by(Vec::<String>::new()).resolve();
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_legacy_option_names() {
        let options: Options =
            serde_json::from_value(json!({"orderColumn": "name", "ascOrDesc": "desc"})).unwrap();
        let order = options.resolve().unwrap();
        assert_eq!(order.columns, vec!["name".to_string()]);
        assert_eq!(order.directions, vec![Direction::Desc]);

        // the canonical name wins when both are present
        let options: Options = serde_json::from_value(json!({
            "orderBy": ["age", "name"],
            "orderColumn": "name",
            "orderDirection": ["DESC", "asc"],
            "primaryKey": "cat_id",
            "skipTotalCount": true
        }))
        .unwrap();
        let order = options.resolve().unwrap();
        assert_eq!(order.columns, vec!["age".to_string(), "name".to_string()]);
        assert_eq!(order.directions, vec![Direction::Desc, Direction::Asc]);
        assert_eq!(order.primary_key, "cat_id");
        assert!(options.skip_total_count);
    }

    #[test]
    fn test_keyset_appends_primary_key() {
        let order = Options::new()
            .order_by("name")
            .order_direction(Direction::Desc)
            .resolve()
            .unwrap();
        let data = CursorData::new(json!(4), vec![json!("Tom")]);
        let parts = order.keyset(&data).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].column, "id");
        assert_eq!(parts[1].direction, Direction::Desc);
        assert_eq!(parts[1].value, &json!(4));

        let wrong = CursorData::new(json!(4), vec![json!("Tom"), json!("x")]);
        assert!(matches!(order.keyset(&wrong), Err(Error::InvalidCursor(_))));
    }

    #[test]
    fn test_negative_counts_are_rejected() {
        let args = PaginationArgs::new().with_first(-1);
        assert!(matches!(args.counts(), Err(Error::InvalidArgument(_))));
        let args = PaginationArgs::new().with_last(-3);
        assert!(matches!(args.counts(), Err(Error::InvalidArgument(_))));
        let args = PaginationArgs::new().with_first(0).with_last(2);
        assert_eq!(args.counts().unwrap(), (Some(0), Some(2)));
    }

    #[test]
    fn test_args_deserialize_from_graphql_variables() {
        let args: PaginationArgs =
            serde_json::from_value(json!({"first": 2, "after": "MV8qXzE="})).unwrap();
        assert_eq!(args.first, Some(2));
        assert_eq!(args.after, Some(Cursor::new("MV8qXzE=")));
        assert_eq!(args.before, None);
    }

    #[test]
    fn test_format_column_is_exposed() {
        let order = Options::new()
            .order_by("total")
            .format_column_fn(|column, _| format!("sum(\"{}\")", column))
            .is_aggregate_fn(|column| column == "total")
            .resolve()
            .unwrap();
        assert_eq!(order.format_column("total", true), Some("sum(\"total\")".to_string()));
        assert!(order.is_aggregate("total"));
        assert!(!order.is_aggregate("id"));
    }

    #[test]
    fn test_both_direction_spellings_prefer_canonical() {
        let options: Options = serde_json::from_value(json!({
            "orderBy": "name",
            "orderDirection": "asc",
            "ascOrDesc": "desc"
        }))
        .unwrap();
        let order = options.resolve().unwrap();
        assert_eq!(order.directions, vec![Direction::Asc]);
    }

    #[test]
    fn test_identity_format_column_still_resolves() {
        let order = Options::new()
            .order_by(vec!["name", "age"])
            .format_column_fn(|column, _| column.to_string())
            .resolve()
            .unwrap();
        assert_eq!(order.columns, vec!["name".to_string(), "age".to_string()]);
        assert_eq!(order.format_column("name", true), Some("name".to_string()));
        assert_eq!(
            order.sort_columns(),
            vec![
                ("name", Direction::Asc),
                ("age", Direction::Asc),
                ("id", Direction::Asc)
            ]
        );
    }
}
