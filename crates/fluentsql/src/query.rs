//! The mutable query IR and its fluent accumulator surface.
//!
//! A [`Query`] accumulates clauses as the caller chains operations; nothing
//! is rendered until a grammar compiles it. Operations only append to the
//! IR's collections, with two exceptions: `select`/`columns` overwrite the
//! selected columns, and `from` sets the target table.
//!
//! The IR also owns the ordered binding lists. Values are bound the moment a
//! clause is added, segregated by phase (wheres/having/order/union) so the
//! UPDATE reorder and union merging never have to re-parse clauses.

use crate::clause::{
    Aggregate, Component, Connector, DatePart, HavingClause, Join, JoinKind, Lock, Order, Paren,
    SetValue, SortDir, WhereClause, is_operator,
};

/// Default page size for [`Query::for_page`].
pub const DEFAULT_PER_PAGE: i64 = 15;

/// One ordered column -> value mapping for INSERT/UPDATE.
pub type SetRow = Vec<(String, SetValue)>;

/// Binding values segregated by emission phase.
///
/// [`Bindings::flatten`] concatenates the phases in SQL emission order,
/// which is what a compiled statement hands to a prepared statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    pub wheres: Vec<String>,
    pub having: Vec<String>,
    pub order: Vec<String>,
    pub union: Vec<String>,
}

impl Bindings {
    /// Concatenate all phases in emission order.
    pub fn flatten(&self) -> Vec<String> {
        let mut out =
            Vec::with_capacity(self.wheres.len() + self.having.len() + self.order.len() + self.union.len());
        out.extend(self.wheres.iter().cloned());
        out.extend(self.having.iter().cloned());
        out.extend(self.order.iter().cloned());
        out.extend(self.union.iter().cloned());
        out
    }
}

/// A union attached to a query; the attached sub-query is frozen at attach
/// time (its bindings were merged into the parent's union phase).
#[derive(Debug, Clone)]
pub struct Union {
    pub query: Query,
    pub all: bool,
}

/// The accumulated description of one query before compilation.
///
/// Single-owner and not thread-safe by contract: one `Query` represents one
/// in-flight statement.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// The table which the query is targeting.
    pub table: String,
    /// The columns that should be returned; empty compiles as `*`.
    pub columns: Vec<String>,
    /// Whether the query returns distinct results.
    pub distinct: bool,
    /// Aggregate record; mutually exclusive with `columns` at compile time.
    pub aggregate: Option<Aggregate>,
    pub joins: Vec<Join>,
    pub wheres: Vec<WhereClause>,
    pub groups: Vec<String>,
    pub havings: Vec<HavingClause>,
    pub orders: Vec<Order>,
    /// Maximum number of records to return; 0 = unset.
    pub limit: u64,
    /// Number of records to skip; 0 = unset.
    pub offset: u64,
    pub unions: Vec<Union>,
    pub union_orders: Vec<Order>,
    pub union_limit: u64,
    pub union_offset: u64,
    pub lock: Option<Lock>,
    /// Pending rows for INSERT/UPDATE.
    pub values: Vec<SetRow>,
    /// The current query value bindings.
    pub bindings: Bindings,
    /// Route the next select to the write host.
    pub use_write: bool,
}

impl Query {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty every field; the canonical component order is static and the
    /// last compiled statement lives on the builder, so nothing survives
    /// here.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether a SELECT component has anything to emit.
    pub fn has_component(&self, component: Component) -> bool {
        match component {
            Component::Aggregate => self.aggregate.is_some(),
            // An aggregate displaces the column list entirely.
            Component::Columns => self.aggregate.is_none(),
            Component::From => !self.table.is_empty(),
            Component::Joins => !self.joins.is_empty(),
            Component::Wheres => !self.wheres.is_empty(),
            Component::Groups => !self.groups.is_empty(),
            Component::Havings => !self.havings.is_empty(),
            Component::Orders => !self.orders.is_empty(),
            Component::Limit => self.limit > 0,
            Component::Offset => self.offset > 0,
            Component::Unions => !self.unions.is_empty(),
            Component::Lock => self.lock.is_some(),
        }
    }

    // ==================== Target & projection ====================

    /// Set the table which the query is targeting.
    pub fn from(&mut self, table: &str) -> &mut Self {
        self.table = table.to_string();
        self
    }

    /// Set the columns to be selected, replacing any previous selection.
    /// An empty list compiles as `*`.
    pub fn select(&mut self, columns: &[&str]) -> &mut Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Alias for [`Query::select`].
    pub fn columns(&mut self, columns: &[&str]) -> &mut Self {
        self.select(columns)
    }

    /// Force the query to only return distinct results.
    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    /// Route the next select to the write host.
    pub fn use_write_db(&mut self) -> &mut Self {
        self.use_write = true;
        self
    }

    // ==================== Basic wheres ====================

    fn push_basic(
        &mut self,
        column: &str,
        operator: &str,
        value: &str,
        connector: Connector,
        paren: Paren,
    ) -> &mut Self {
        let (mut operator, mut value) = (operator.to_string(), value.to_string());
        // Two-argument shorthand: a missing value means the operator slot
        // holds the value and the comparison is equality.
        if value.is_empty() {
            value = std::mem::replace(&mut operator, "=".to_string());
        }
        if !is_operator(&operator) {
            operator = "=".to_string();
        }
        self.bindings.wheres.push(value.clone());
        self.wheres.push(WhereClause::Basic {
            column: column.to_string(),
            operator,
            value,
            connector,
            paren,
        });
        self
    }

    /// Add a basic `column op ?` clause. An empty `value` reinterprets
    /// `operator` as the value and compares with `=`; unknown operators are
    /// silently coerced to `=`.
    pub fn where_(&mut self, column: &str, operator: &str, value: &str) -> &mut Self {
        self.push_basic(column, operator, value, Connector::And, Paren::None)
    }

    /// `or`-connected variant of [`Query::where_`].
    pub fn or_where(&mut self, column: &str, operator: &str, value: &str) -> &mut Self {
        self.push_basic(column, operator, value, Connector::Or, Paren::None)
    }

    /// Basic where carrying a paren token (`"("`, `")"` or `""`) to mark a
    /// predicate group in the flat clause list.
    pub fn where_paren(
        &mut self,
        column: &str,
        operator: &str,
        value: &str,
        paren: &str,
    ) -> &mut Self {
        self.push_basic(column, operator, value, Connector::And, Paren::from_token(paren))
    }

    /// `or`-connected variant of [`Query::where_paren`].
    pub fn or_where_paren(
        &mut self,
        column: &str,
        operator: &str,
        value: &str,
        paren: &str,
    ) -> &mut Self {
        self.push_basic(column, operator, value, Connector::Or, Paren::from_token(paren))
    }

    /// Equality shorthand: `column = ?`.
    pub fn where_eq(&mut self, column: &str, value: &str) -> &mut Self {
        self.push_basic(column, "=", value, Connector::And, Paren::None)
    }

    /// `or`-connected equality shorthand.
    pub fn or_where_eq(&mut self, column: &str, value: &str) -> &mut Self {
        self.push_basic(column, "=", value, Connector::Or, Paren::None)
    }

    // ==================== Between / In ====================

    fn push_between(
        &mut self,
        column: &str,
        low: &str,
        high: &str,
        negated: bool,
        connector: Connector,
    ) -> &mut Self {
        self.bindings.wheres.push(low.to_string());
        self.bindings.wheres.push(high.to_string());
        self.wheres.push(WhereClause::Between {
            column: column.to_string(),
            low: low.to_string(),
            high: high.to_string(),
            negated,
            connector,
        });
        self
    }

    /// `column between ? and ?`
    pub fn where_between(&mut self, column: &str, low: &str, high: &str) -> &mut Self {
        self.push_between(column, low, high, false, Connector::And)
    }

    /// `column not between ? and ?`
    pub fn where_not_between(&mut self, column: &str, low: &str, high: &str) -> &mut Self {
        self.push_between(column, low, high, true, Connector::And)
    }

    pub fn or_where_between(&mut self, column: &str, low: &str, high: &str) -> &mut Self {
        self.push_between(column, low, high, false, Connector::Or)
    }

    pub fn or_where_not_between(&mut self, column: &str, low: &str, high: &str) -> &mut Self {
        self.push_between(column, low, high, true, Connector::Or)
    }

    fn push_in(
        &mut self,
        column: &str,
        values: &[&str],
        negated: bool,
        connector: Connector,
    ) -> &mut Self {
        let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        self.bindings.wheres.extend(values.iter().cloned());
        self.wheres.push(WhereClause::In {
            column: column.to_string(),
            values,
            negated,
            connector,
        });
        self
    }

    /// `column in (?, ?, ...)`
    pub fn where_in(&mut self, column: &str, values: &[&str]) -> &mut Self {
        self.push_in(column, values, false, Connector::And)
    }

    /// `column not in (?, ?, ...)`
    pub fn where_not_in(&mut self, column: &str, values: &[&str]) -> &mut Self {
        self.push_in(column, values, true, Connector::And)
    }

    pub fn or_where_in(&mut self, column: &str, values: &[&str]) -> &mut Self {
        self.push_in(column, values, false, Connector::Or)
    }

    pub fn or_where_not_in(&mut self, column: &str, values: &[&str]) -> &mut Self {
        self.push_in(column, values, true, Connector::Or)
    }

    // ==================== Temporal wheres ====================

    fn push_date(
        &mut self,
        part: DatePart,
        column: &str,
        operator: &str,
        value: &str,
        connector: Connector,
    ) -> &mut Self {
        let (mut operator, mut value) = (operator.to_string(), value.to_string());
        if value.is_empty() {
            value = std::mem::replace(&mut operator, "=".to_string());
        }
        if !is_operator(&operator) {
            operator = "=".to_string();
        }
        self.bindings.wheres.push(value.clone());
        self.wheres.push(WhereClause::Date {
            part,
            column: column.to_string(),
            operator,
            value,
            connector,
        });
        self
    }

    /// `date(column) op ?` (dialect-lowered).
    pub fn where_date(&mut self, column: &str, operator: &str, value: &str) -> &mut Self {
        self.push_date(DatePart::Date, column, operator, value, Connector::And)
    }

    pub fn or_where_date(&mut self, column: &str, operator: &str, value: &str) -> &mut Self {
        self.push_date(DatePart::Date, column, operator, value, Connector::Or)
    }

    /// `year(column) op ?` (dialect-lowered).
    pub fn where_year(&mut self, column: &str, operator: &str, value: &str) -> &mut Self {
        self.push_date(DatePart::Year, column, operator, value, Connector::And)
    }

    pub fn or_where_year(&mut self, column: &str, operator: &str, value: &str) -> &mut Self {
        self.push_date(DatePart::Year, column, operator, value, Connector::Or)
    }

    /// `month(column) op ?` (dialect-lowered).
    pub fn where_month(&mut self, column: &str, operator: &str, value: &str) -> &mut Self {
        self.push_date(DatePart::Month, column, operator, value, Connector::And)
    }

    pub fn or_where_month(&mut self, column: &str, operator: &str, value: &str) -> &mut Self {
        self.push_date(DatePart::Month, column, operator, value, Connector::Or)
    }

    /// `day(column) op ?` (dialect-lowered).
    pub fn where_day(&mut self, column: &str, operator: &str, value: &str) -> &mut Self {
        self.push_date(DatePart::Day, column, operator, value, Connector::And)
    }

    pub fn or_where_day(&mut self, column: &str, operator: &str, value: &str) -> &mut Self {
        self.push_date(DatePart::Day, column, operator, value, Connector::Or)
    }

    /// `time(column) op ?` (dialect-lowered).
    pub fn where_time(&mut self, column: &str, operator: &str, value: &str) -> &mut Self {
        self.push_date(DatePart::Time, column, operator, value, Connector::And)
    }

    pub fn or_where_time(&mut self, column: &str, operator: &str, value: &str) -> &mut Self {
        self.push_date(DatePart::Time, column, operator, value, Connector::Or)
    }

    // ==================== Column & raw wheres ====================

    fn push_where_column(
        &mut self,
        first: &str,
        operator: &str,
        second: &str,
        connector: Connector,
    ) -> &mut Self {
        let (mut operator, mut second) = (operator.to_string(), second.to_string());
        if second.is_empty() {
            second = std::mem::replace(&mut operator, "=".to_string());
        }
        if !is_operator(&operator) {
            operator = "=".to_string();
        }
        self.wheres.push(WhereClause::Column {
            first: first.to_string(),
            operator,
            second,
            connector,
        });
        self
    }

    /// `first = second` — compares two columns, no binding.
    pub fn where_column(&mut self, first: &str, second: &str) -> &mut Self {
        self.push_where_column(first, second, "", Connector::And)
    }

    /// Column comparison with an explicit operator.
    pub fn where_column_op(&mut self, first: &str, operator: &str, second: &str) -> &mut Self {
        self.push_where_column(first, operator, second, Connector::And)
    }

    pub fn or_where_column(&mut self, first: &str, second: &str) -> &mut Self {
        self.push_where_column(first, second, "", Connector::Or)
    }

    pub fn or_where_column_op(&mut self, first: &str, operator: &str, second: &str) -> &mut Self {
        self.push_where_column(first, operator, second, Connector::Or)
    }

    fn push_where_raw(&mut self, sql: &str, values: &[&str], connector: Connector) -> &mut Self {
        self.bindings
            .wheres
            .extend(values.iter().map(|v| v.to_string()));
        self.wheres.push(WhereClause::Raw {
            sql: sql.to_string(),
            connector,
        });
        self
    }

    /// Raw where fragment emitted verbatim; each value binds in order. The
    /// fragment itself must use the connection dialect's placeholder syntax.
    pub fn where_raw(&mut self, sql: &str, values: &[&str]) -> &mut Self {
        self.push_where_raw(sql, values, Connector::And)
    }

    pub fn or_where_raw(&mut self, sql: &str, values: &[&str]) -> &mut Self {
        self.push_where_raw(sql, values, Connector::Or)
    }

    // ==================== Joins ====================

    fn push_join(
        &mut self,
        kind: JoinKind,
        table: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> &mut Self {
        let (mut operator, mut second) = (operator.to_string(), second.to_string());
        if second.is_empty() {
            second = std::mem::replace(&mut operator, "=".to_string());
        }
        if !is_operator(&operator) {
            operator = "=".to_string();
        }
        self.joins.push(Join {
            kind,
            table: table.to_string(),
            first: first.to_string(),
            operator,
            second,
        });
        self
    }

    /// Inner join on `first = second`.
    pub fn join(&mut self, table: &str, first: &str, second: &str) -> &mut Self {
        self.push_join(JoinKind::Inner, table, first, second, "")
    }

    /// Inner join with an explicit operator.
    pub fn join_on(&mut self, table: &str, first: &str, operator: &str, second: &str) -> &mut Self {
        self.push_join(JoinKind::Inner, table, first, operator, second)
    }

    /// Left join on `first = second`.
    pub fn left_join(&mut self, table: &str, first: &str, second: &str) -> &mut Self {
        self.push_join(JoinKind::Left, table, first, second, "")
    }

    pub fn left_join_on(
        &mut self,
        table: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> &mut Self {
        self.push_join(JoinKind::Left, table, first, operator, second)
    }

    /// Right join on `first = second`.
    pub fn right_join(&mut self, table: &str, first: &str, second: &str) -> &mut Self {
        self.push_join(JoinKind::Right, table, first, second, "")
    }

    pub fn right_join_on(
        &mut self,
        table: &str,
        first: &str,
        operator: &str,
        second: &str,
    ) -> &mut Self {
        self.push_join(JoinKind::Right, table, first, operator, second)
    }

    // ==================== Groups & havings ====================

    /// Add a GROUP BY column.
    pub fn group_by(&mut self, column: &str) -> &mut Self {
        self.groups.push(column.to_string());
        self
    }

    fn push_having(
        &mut self,
        column: &str,
        operator: &str,
        value: &str,
        connector: Connector,
    ) -> &mut Self {
        let (mut operator, mut value) = (operator.to_string(), value.to_string());
        if value.is_empty() {
            value = std::mem::replace(&mut operator, "=".to_string());
        }
        self.bindings.having.push(value.clone());
        self.havings.push(HavingClause::Basic {
            column: column.to_string(),
            operator,
            value,
            connector,
        });
        self
    }

    /// Add a `having` clause; same two-argument shorthand as `where_`.
    pub fn having(&mut self, column: &str, operator: &str, value: &str) -> &mut Self {
        self.push_having(column, operator, value, Connector::And)
    }

    pub fn or_having(&mut self, column: &str, operator: &str, value: &str) -> &mut Self {
        self.push_having(column, operator, value, Connector::Or)
    }

    fn push_having_raw(&mut self, sql: &str, values: &[&str], connector: Connector) -> &mut Self {
        self.bindings
            .having
            .extend(values.iter().map(|v| v.to_string()));
        self.havings.push(HavingClause::Raw {
            sql: sql.to_string(),
            connector,
        });
        self
    }

    /// Raw having fragment emitted verbatim; each value binds in order. The
    /// fragment itself must use the connection dialect's placeholder syntax.
    pub fn having_raw(&mut self, sql: &str, values: &[&str]) -> &mut Self {
        self.push_having_raw(sql, values, Connector::And)
    }

    pub fn or_having_raw(&mut self, sql: &str, values: &[&str]) -> &mut Self {
        self.push_having_raw(sql, values, Connector::Or)
    }

    // ==================== Ordering ====================

    fn push_order(&mut self, column: &str, direction: SortDir) -> &mut Self {
        let order = Order {
            column: column.to_string(),
            direction,
        };
        // Orderings attached after a union scope the combined result.
        if self.unions.is_empty() {
            self.orders.push(order);
        } else {
            self.union_orders.push(order);
        }
        self
    }

    /// Add an ascending `order by` clause.
    pub fn order_by(&mut self, column: &str) -> &mut Self {
        self.push_order(column, SortDir::Asc)
    }

    /// Add a descending `order by` clause.
    pub fn order_by_desc(&mut self, column: &str) -> &mut Self {
        self.push_order(column, SortDir::Desc)
    }

    /// Add an `order by` clause with a textual direction, lower-cased;
    /// anything that is not `desc` sorts ascending.
    pub fn order_by_dir(&mut self, column: &str, direction: &str) -> &mut Self {
        self.push_order(column, SortDir::parse(direction))
    }

    /// Newest first on `created_at`.
    pub fn latest(&mut self) -> &mut Self {
        self.order_by_desc("created_at")
    }

    /// Newest first on a caller-chosen timestamp column.
    pub fn latest_by(&mut self, column: &str) -> &mut Self {
        self.order_by_desc(column)
    }

    /// Oldest first on `created_at`.
    pub fn oldest(&mut self) -> &mut Self {
        self.order_by("created_at")
    }

    /// Oldest first on a caller-chosen timestamp column.
    pub fn oldest_by(&mut self, column: &str) -> &mut Self {
        self.order_by(column)
    }

    // ==================== Limit / offset ====================

    /// Set the maximum number of records to return. No-op when `n <= 0`;
    /// scopes the union result once a union is attached.
    pub fn limit(&mut self, n: i64) -> &mut Self {
        if n <= 0 {
            return self;
        }
        if self.unions.is_empty() {
            self.limit = n as u64;
        } else {
            self.union_limit = n as u64;
        }
        self
    }

    /// Alias for [`Query::limit`].
    pub fn take(&mut self, n: i64) -> &mut Self {
        self.limit(n)
    }

    /// Set the number of records to skip, clamped to zero; scopes the union
    /// result once a union is attached.
    pub fn offset(&mut self, n: i64) -> &mut Self {
        let n = n.max(0) as u64;
        if self.unions.is_empty() {
            self.offset = n;
        } else {
            self.union_offset = n;
        }
        self
    }

    /// Alias for [`Query::offset`].
    pub fn skip(&mut self, n: i64) -> &mut Self {
        self.offset(n)
    }

    /// Set limit and offset for a page, using the default page size.
    pub fn for_page(&mut self, page: i64) -> &mut Self {
        self.for_page_with(page, DEFAULT_PER_PAGE)
    }

    /// Set limit and offset for a page of `per_page` records.
    pub fn for_page_with(&mut self, page: i64, per_page: i64) -> &mut Self {
        self.skip((page - 1) * per_page).take(per_page)
    }

    // ==================== Unions & locks ====================

    fn push_union(&mut self, query: Query, all: bool) -> &mut Self {
        self.bindings.union.extend(query.bindings.flatten());
        self.unions.push(Union { query, all });
        self
    }

    /// Attach `union (select ...)`; the sub-query's bindings are merged now,
    /// so it must be fully built when attached.
    pub fn union(&mut self, query: Query) -> &mut Self {
        self.push_union(query, false)
    }

    /// Attach `union all (select ...)`.
    pub fn union_all(&mut self, query: Query) -> &mut Self {
        self.push_union(query, true)
    }

    /// Lock the selected rows: `true` for an exclusive lock, `false` for a
    /// shared one. Syntax is dialect-specific; SQLite emits nothing.
    pub fn lock(&mut self, exclusive: bool) -> &mut Self {
        self.lock = Some(if exclusive { Lock::Exclusive } else { Lock::Shared });
        self
    }

    // ==================== Write preparation ====================

    /// Queue one row of SET values for an UPDATE and reorder the bindings so
    /// the SET values precede every previously-bound where value.
    pub(crate) fn prepare_update(&mut self, row: SetRow) {
        let mut reordered: Vec<String> = row
            .iter()
            .filter_map(|(_, value)| match value {
                SetValue::Bound(v) => Some(v.clone()),
                SetValue::Expr(_) => None,
            })
            .collect();
        reordered.extend(std::mem::take(&mut self.bindings.wheres));
        self.bindings.wheres = reordered;
        self.values.push(row);
    }

    /// Queue rows for an INSERT.
    pub(crate) fn prepare_insert(&mut self, rows: Vec<SetRow>) {
        self.values = rows;
    }
}
