//! # fluentsql
//!
//! A fluent, dialect-aware SQL query builder.
//!
//! Queries are described declaratively — a target table, columns,
//! predicates, joins, groupings, orderings, limits — and compiled to a
//! dialect-correct SQL string plus an ordered list of bound parameter
//! values for a prepared statement.
//!
//! - **One IR, one grammar**: clauses accumulate in a typed [`Query`];
//!   [`Grammar`] lowers it to SQL for MySQL, Postgres, SQLite or Oracle
//! - **Binding discipline**: parameter values always match placeholder
//!   order, including the UPDATE set-before-where reorder
//! - **Thin driver contract**: execution lives behind the [`Driver`]
//!   trait; the core compiles, resets, and hands over `(sql, bindings)`
//! - **Dry runs**: [`Builder::pretend`] captures compiled statements
//!   without touching a database

pub mod builder;
pub mod clause;
pub mod config;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod grammar;
pub mod query;

pub use builder::{Builder, StatementKind};
pub use clause::{
    Aggregate, AggregateFn, Component, Connector, DatePart, HavingClause, Join, JoinKind, Lock,
    Order, Paren, SetValue, SortDir, WhereClause,
};
pub use config::{DatabaseConfig, DbConfig};
pub use dialect::Dialect;
pub use driver::{Driver, Row};
pub use error::{BuilderError, BuilderResult};
pub use grammar::{Grammar, Statement};
pub use query::{Bindings, Query, SetRow, Union};
