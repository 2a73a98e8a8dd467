//! Driver capability contract.
//!
//! The core never talks to a database: a [`Driver`] implementation owns the
//! connection (and any read/write split) and executes the compiled
//! statements the builder hands it. Implementations live outside this
//! crate; [`DbConfig::grammar`](crate::config::DbConfig::grammar) gives
//! them the right grammar for their connection.

use std::collections::HashMap;

use crate::builder::Builder;
use crate::error::BuilderResult;
use crate::grammar::{Grammar, Statement};

/// One materialized result row: column name to stringified value.
pub type Row = HashMap<String, String>;

/// A database connection capable of executing compiled statements.
pub trait Driver {
    /// The grammar for this connection (dialect + table prefix).
    fn grammar(&self) -> &Grammar;

    /// Execute a compiled select and materialize its rows.
    ///
    /// `use_write` asks a read/write-split driver to run against the write
    /// host; drivers without a split ignore it.
    fn run_select(&self, statement: &Statement, use_write: bool) -> BuilderResult<Vec<Row>>;

    /// Execute a compiled insert/update/delete and return the number of
    /// affected rows.
    fn run_affecting(&self, statement: &Statement) -> BuilderResult<i64>;

    /// Start a fresh builder targeting `table` on this driver.
    fn table(&self, table: &str) -> Builder<'_, Self>
    where
        Self: Sized,
    {
        let mut builder = Builder::new(self);
        builder.from(table);
        builder
    }
}
