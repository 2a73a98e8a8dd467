//! The driver-bound fluent facade and its terminal operations.
//!
//! A [`Builder`] binds one [`Query`] to one [`Driver`]. It derefs to the
//! IR, so the whole accumulator surface is available directly; terminal
//! operations compile the IR, reset it, and dispatch the retained statement
//! to the driver. Resetting before execution is what makes consecutive
//! terminals on the same builder independent — a second terminal without
//! the implicit reset would leak clauses from the previous cycle.
//!
//! Builders are single-owner and not thread-safe: one builder is one
//! in-flight statement.

use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::clause::{Aggregate, AggregateFn, SetValue};
use crate::driver::{Driver, Row};
use crate::error::BuilderResult;
use crate::grammar::Statement;
use crate::query::Query;

/// The statement kinds a builder can compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Exists,
}

/// A fluent query builder bound to a driver.
pub struct Builder<'c, D: Driver> {
    driver: &'c D,
    query: Query,
    /// Last compiled statement; survives reset so the driver can execute it
    /// (or a caller can inspect it) after the IR is cleared.
    statement: Statement,
    /// When set, terminal operations capture their compiled statement here
    /// instead of dispatching to the driver.
    pretend_log: Option<Vec<Statement>>,
}

impl<'c, D: Driver> Builder<'c, D> {
    /// Create a builder with an empty IR.
    pub fn new(driver: &'c D) -> Self {
        Self {
            driver,
            query: Query::new(),
            statement: Statement::default(),
            pretend_log: None,
        }
    }

    /// The accumulated IR.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// The last compiled statement.
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Compile the IR for a statement kind, materializing SQL and bindings
    /// on the builder without clearing the IR.
    pub fn compile(&mut self, kind: StatementKind) -> BuilderResult<&Statement> {
        let grammar = self.driver.grammar();
        let statement = match kind {
            StatementKind::Select => grammar.compile_select(&self.query),
            StatementKind::Insert => grammar.compile_insert(&self.query),
            StatementKind::Update => grammar.compile_update(&self.query),
            StatementKind::Delete => grammar.compile_delete(&self.query),
            StatementKind::Exists => grammar.compile_exists(&self.query),
        }?;
        debug!(sql = %statement.sql, bindings = ?statement.bindings, "compiled statement");
        self.statement = statement;
        Ok(&self.statement)
    }

    /// Empty the IR; the last compiled statement is retained.
    pub fn reset(&mut self) {
        self.query.reset();
    }

    /// One compile-execute cycle: compile `kind`, reset the IR, then either
    /// capture the statement (dry run) or hand it to `run`.
    fn cycle<T, F>(&mut self, kind: StatementKind, dry: T, run: F) -> BuilderResult<T>
    where
        F: FnOnce(&'c D, &Statement, bool) -> BuilderResult<T>,
    {
        self.compile(kind)?;
        let use_write = self.query.use_write;
        self.query.reset();
        if let Some(log) = &mut self.pretend_log {
            log.push(self.statement.clone());
            return Ok(dry);
        }
        run(self.driver, &self.statement, use_write)
    }

    /// Run the closure with driver dispatch suppressed and return the
    /// statements its terminal operations compiled. Builder state is
    /// restored afterwards.
    pub fn pretend<F>(&mut self, f: F) -> Vec<Statement>
    where
        F: FnOnce(&mut Self),
    {
        self.pretend_log = Some(Vec::new());
        f(self);
        self.query.reset();
        self.pretend_log.take().unwrap_or_default()
    }

    // ==================== Reads ====================

    /// Execute the query as a select. A non-empty `columns` replaces the
    /// current selection.
    pub fn get(&mut self, columns: &[&str]) -> BuilderResult<Vec<Row>> {
        if !columns.is_empty() {
            self.query.select(columns);
        }
        self.cycle(StatementKind::Select, Vec::new(), |driver, statement, use_write| {
            driver.run_select(statement, use_write)
        })
    }

    /// Execute the query limited to one record and return it.
    pub fn first(&mut self, columns: &[&str]) -> BuilderResult<Option<Row>> {
        self.query.take(1);
        Ok(self.get(columns)?.into_iter().next())
    }

    /// Fetch a single record by id.
    pub fn find(&mut self, id: i64, columns: &[&str]) -> BuilderResult<Option<Row>> {
        self.query.where_eq("id", &id.to_string());
        self.first(columns)
    }

    /// Fetch a single column's value from the first result.
    pub fn value(&mut self, column: &str) -> BuilderResult<Option<String>> {
        Ok(self
            .first(&[column])?
            .and_then(|row| row.get(column).cloned()))
    }

    /// Run the query as an exists statement and honor the returned boolean.
    pub fn exists(&mut self) -> BuilderResult<bool> {
        let rows = self.cycle(StatementKind::Exists, Vec::new(), |driver, statement, use_write| {
            driver.run_select(statement, use_write)
        })?;
        Ok(rows
            .first()
            .and_then(|row| row.get("exists"))
            .is_some_and(|value| truthy(value)))
    }

    // ==================== Aggregates ====================

    fn aggregate(&mut self, function: AggregateFn, column: &str) -> BuilderResult<Option<String>> {
        self.query.aggregate = Some(Aggregate {
            function,
            column: column.to_string(),
        });
        let rows = self.cycle(StatementKind::Select, Vec::new(), |driver, statement, use_write| {
            driver.run_select(statement, use_write)
        })?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.get("aggregate").cloned()))
    }

    /// `count(*)`.
    pub fn count(&mut self) -> BuilderResult<Option<String>> {
        self.aggregate(AggregateFn::Count, "*")
    }

    /// `count(column)`.
    pub fn count_col(&mut self, column: &str) -> BuilderResult<Option<String>> {
        self.aggregate(AggregateFn::Count, column)
    }

    /// `max(column)`.
    pub fn max(&mut self, column: &str) -> BuilderResult<Option<String>> {
        self.aggregate(AggregateFn::Max, column)
    }

    /// `min(column)`.
    pub fn min(&mut self, column: &str) -> BuilderResult<Option<String>> {
        self.aggregate(AggregateFn::Min, column)
    }

    /// `sum(column)`.
    pub fn sum(&mut self, column: &str) -> BuilderResult<Option<String>> {
        self.aggregate(AggregateFn::Sum, column)
    }

    /// `avg(column)`.
    pub fn avg(&mut self, column: &str) -> BuilderResult<Option<String>> {
        self.aggregate(AggregateFn::Avg, column)
    }

    /// Alias for [`Builder::avg`].
    pub fn average(&mut self, column: &str) -> BuilderResult<Option<String>> {
        self.avg(column)
    }

    // ==================== Writes ====================

    /// Insert one or more rows; every row is read in the first row's column
    /// order. Returns the affected-row count.
    pub fn insert(&mut self, rows: &[&[(&str, &str)]]) -> BuilderResult<i64> {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(column, value)| {
                        ((*column).to_string(), SetValue::Bound((*value).to_string()))
                    })
                    .collect()
            })
            .collect();
        self.query.prepare_insert(rows);
        self.cycle(StatementKind::Insert, 0, |driver, statement, _| {
            driver.run_affecting(statement)
        })
    }

    /// Update the matched records; SET values are bound ahead of the
    /// already-accumulated where values. Returns the affected-row count.
    pub fn update(&mut self, values: &[(&str, &str)]) -> BuilderResult<i64> {
        let row = values
            .iter()
            .map(|(column, value)| ((*column).to_string(), SetValue::Bound((*value).to_string())))
            .collect();
        self.query.prepare_update(row);
        self.cycle(StatementKind::Update, 0, |driver, statement, _| {
            driver.run_affecting(statement)
        })
    }

    /// Delete the matched records. Returns the affected-row count.
    pub fn delete(&mut self) -> BuilderResult<i64> {
        self.cycle(StatementKind::Delete, 0, |driver, statement, _| {
            driver.run_affecting(statement)
        })
    }

    /// Increment a column by one.
    pub fn increment(&mut self, column: &str) -> BuilderResult<bool> {
        self.increment_by(column, "1")
    }

    /// Increment a column by a literal amount; the SET value is a raw
    /// `column + amount` expression, not a binding.
    pub fn increment_by(&mut self, column: &str, amount: &str) -> BuilderResult<bool> {
        self.query.prepare_update(vec![(
            column.to_string(),
            SetValue::Expr(format!("{column} + {amount}")),
        )]);
        let affected = self.cycle(StatementKind::Update, 0, |driver, statement, _| {
            driver.run_affecting(statement)
        })?;
        Ok(affected > 0)
    }
}

impl<D: Driver> Deref for Builder<'_, D> {
    type Target = Query;

    fn deref(&self) -> &Query {
        &self.query
    }
}

impl<D: Driver> DerefMut for Builder<'_, D> {
    fn deref_mut(&mut self) -> &mut Query {
        &mut self.query
    }
}

/// Database booleans come back stringified; accept the spellings the
/// supported drivers produce.
fn truthy(value: &str) -> bool {
    matches!(value, "1" | "t" | "true" | "T" | "TRUE" | "True")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::error::BuilderError;
    use crate::grammar::Grammar;

    /// Driver that refuses every dispatch; compile-only tests.
    struct NullDriver {
        grammar: Grammar,
    }

    impl NullDriver {
        fn new() -> Self {
            Self {
                grammar: Grammar::new(Dialect::MySql),
            }
        }
    }

    impl Driver for NullDriver {
        fn grammar(&self) -> &Grammar {
            &self.grammar
        }

        fn run_select(&self, statement: &Statement, _use_write: bool) -> BuilderResult<Vec<Row>> {
            Err(BuilderError::driver(
                statement.sql.clone(),
                statement.bindings.clone(),
                "dispatched",
            ))
        }

        fn run_affecting(&self, statement: &Statement) -> BuilderResult<i64> {
            Err(BuilderError::driver(
                statement.sql.clone(),
                statement.bindings.clone(),
                "dispatched",
            ))
        }
    }

    #[test]
    fn compile_retains_the_statement_without_clearing_the_ir() {
        let driver = NullDriver::new();
        let mut builder = driver.table("users");
        builder.where_eq("id", "1");
        builder.compile(StatementKind::Select).unwrap();
        assert_eq!(builder.statement().sql, "select * from users where id = ?");
        assert_eq!(builder.query().wheres.len(), 1);
    }

    #[test]
    fn pretend_captures_instead_of_dispatching() {
        let driver = NullDriver::new();
        let mut builder = driver.table("users");
        let captured = builder.pretend(|b| {
            b.where_eq("id", "1");
            let rows = b.get(&[]).unwrap();
            assert!(rows.is_empty());
            b.from("users").where_eq("id", "2");
            assert_eq!(b.delete().unwrap(), 0);
        });
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].sql, "select * from users where id = ?");
        assert_eq!(captured[0].bindings, vec!["1"]);
        assert_eq!(captured[1].sql, "delete from users where id = ?");
        assert_eq!(captured[1].bindings, vec!["2"]);
    }

    #[test]
    fn pretend_restores_dispatch() {
        let driver = NullDriver::new();
        let mut builder = driver.table("users");
        builder.pretend(|b| {
            let _ = b.get(&[]);
        });
        builder.from("users");
        assert!(builder.get(&[]).unwrap_err().is_driver());
    }

    #[test]
    fn driver_error_carries_sql_and_bindings() {
        let driver = NullDriver::new();
        let mut builder = driver.table("users");
        builder.where_eq("id", "9");
        let err = builder.get(&[]).unwrap_err();
        match err {
            BuilderError::Driver { sql, bindings, .. } => {
                assert_eq!(sql, "select * from users where id = ?");
                assert_eq!(bindings, vec!["9"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn terminal_resets_the_ir_for_the_next_cycle() {
        let driver = NullDriver::new();
        let mut builder = driver.table("users");
        builder.pretend(|b| {
            b.where_eq("id", "1");
            let _ = b.get(&[]);
        });
        assert!(builder.query().table.is_empty());
        assert!(builder.query().wheres.is_empty());
        // Same chain from a reset builder compiles to the same SQL.
        let captured = builder.pretend(|b| {
            b.from("users").where_eq("id", "1");
            let _ = b.get(&[]);
        });
        assert_eq!(captured[0].sql, "select * from users where id = ?");
    }
}
