//! Dialect policies.
//!
//! The grammar is a single implementation parameterized by a [`Dialect`]:
//! the dialect decides placeholder syntax, how temporal predicates lower,
//! and what a lock hint looks like. Only SQLite deviates structurally (its
//! temporal predicates become `strftime` comparisons).

use crate::clause::{DatePart, Lock};
use crate::error::{BuilderError, BuilderResult};

/// A concrete SQL variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
    Oracle,
}

impl Dialect {
    /// Resolve a configured driver name. Accepts the spellings the
    /// configuration file uses (`sqlite3`, `pgsql`) alongside the plain
    /// family names.
    pub fn from_driver(name: &str) -> BuilderResult<Self> {
        match name {
            "mysql" => Ok(Dialect::MySql),
            "postgres" | "pgsql" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "oracle" | "oci8" => Ok(Dialect::Oracle),
            other => Err(BuilderError::config(format!(
                "unsupported driver: {other}"
            ))),
        }
    }

    /// The parameter placeholder for the `n`-th binding (1-based).
    ///
    /// MySQL and SQLite use anonymous `?`; Postgres and Oracle number their
    /// placeholders (`$n` / `:n`).
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${n}"),
            Dialect::Oracle => format!(":{n}"),
        }
    }

    /// Lower a temporal predicate to SQL.
    ///
    /// The base form is `part(column) op <ph>`; SQLite has no extraction
    /// functions and compares `strftime` output against the casted binding.
    pub fn date_predicate(
        self,
        part: DatePart,
        column: &str,
        operator: &str,
        placeholder: &str,
    ) -> String {
        match self {
            Dialect::Sqlite => format!(
                "strftime('{}', {column}) {operator} cast({placeholder} as text)",
                part.strftime_format()
            ),
            _ => format!("{}({column}) {operator} {placeholder}", part.function()),
        }
    }

    /// The trailing lock clause, empty when the dialect has none.
    pub fn lock_clause(self, lock: Lock) -> &'static str {
        match (self, lock) {
            (Dialect::Sqlite, _) => "",
            (Dialect::MySql, Lock::Shared) => " lock in share mode",
            (Dialect::Postgres, Lock::Shared) => " for share",
            (Dialect::Oracle, Lock::Shared) => " for update",
            (_, Lock::Exclusive) => " for update",
        }
    }
}
