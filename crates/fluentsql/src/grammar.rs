//! Compilation from the query IR to dialect-correct SQL.
//!
//! [`Grammar`] is a pure function from a [`Query`] to a [`Statement`]: it
//! never mutates the IR and never talks to a database. SELECT statements are
//! assembled by walking the canonical component order and emitting a
//! fragment for every component present in the IR; INSERT, UPDATE, DELETE
//! and EXISTS have their own shapes and are assembled explicitly.
//!
//! Placeholders are generated from a counter that lives for exactly one
//! compile, shared with union sub-selects so numbered dialects (`$n`, `:n`)
//! emit a gapless `1..n` sequence. Every placeholder drawn corresponds to
//! one binding value in the statement's binding list, in emission order.

use crate::clause::{
    Component, HavingClause, Order, Paren, SELECT_COMPONENTS, SetValue, WhereClause,
};
use crate::dialect::Dialect;
use crate::error::{BuilderError, BuilderResult};
use crate::query::Query;

/// A compiled statement: SQL text plus its ordered parameter values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub bindings: Vec<String>,
}

/// Placeholder counter for one compile.
struct Placeholders {
    dialect: Dialect,
    count: usize,
}

impl Placeholders {
    fn new(dialect: Dialect) -> Self {
        Self { dialect, count: 0 }
    }

    /// Return the next placeholder; drawing one asserts that one binding
    /// value is emitted at this position.
    fn next(&mut self) -> String {
        self.count += 1;
        self.dialect.placeholder(self.count)
    }
}

/// A dialect-aware SQL grammar with an optional table prefix.
#[derive(Debug, Clone)]
pub struct Grammar {
    dialect: Dialect,
    prefix: String,
}

impl Grammar {
    /// Create a grammar for a dialect with no table prefix.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            prefix: String::new(),
        }
    }

    /// Create a grammar with a table prefix applied to table names and the
    /// leading segment of qualified identifiers.
    pub fn with_prefix(dialect: Dialect, prefix: &str) -> Self {
        Self {
            dialect,
            prefix: prefix.to_string(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn table_prefix(&self) -> &str {
        &self.prefix
    }

    // ==================== Statement entry points ====================

    /// Compile a SELECT statement.
    pub fn compile_select(&self, query: &Query) -> BuilderResult<Statement> {
        let mut ph = Placeholders::new(self.dialect);
        let sql = self.select_sql(query, &mut ph)?;
        Ok(Statement {
            sql,
            bindings: query.bindings.flatten(),
        })
    }

    /// Compile `select exists(<select>) as "exists"`.
    pub fn compile_exists(&self, query: &Query) -> BuilderResult<Statement> {
        let mut ph = Placeholders::new(self.dialect);
        let inner = self.select_sql(query, &mut ph)?;
        Ok(Statement {
            sql: format!("select exists({inner}) as \"exists\""),
            bindings: query.bindings.flatten(),
        })
    }

    /// Compile a multi-row INSERT. The first row fixes the column order;
    /// every row is read in that order.
    pub fn compile_insert(&self, query: &Query) -> BuilderResult<Statement> {
        self.require_table(query)?;
        let Some(first) = query.values.first() else {
            return Err(BuilderError::compile("insert has no rows"));
        };

        let mut ph = Placeholders::new(self.dialect);
        let columns: Vec<&str> = first.iter().map(|(column, _)| column.as_str()).collect();
        let mut bindings = Vec::new();
        let mut rows = Vec::with_capacity(query.values.len());
        for row in &query.values {
            let mut cells = Vec::with_capacity(columns.len());
            for column in &columns {
                match row.iter().find(|(c, _)| c == column).map(|(_, v)| v) {
                    Some(SetValue::Bound(value)) => {
                        bindings.push(value.clone());
                        cells.push(ph.next());
                    }
                    Some(SetValue::Expr(expr)) => cells.push(expr.clone()),
                    // A row missing a column binds an empty value so the
                    // placeholder grid stays rectangular.
                    None => {
                        bindings.push(String::new());
                        cells.push(ph.next());
                    }
                }
            }
            rows.push(format!("({})", cells.join(", ")));
        }

        let columns_sql = columns
            .iter()
            .map(|c| self.wrap(c))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Statement {
            sql: format!(
                "insert into {}({}) values {}",
                self.wrap_table(&query.table),
                columns_sql,
                rows.join(", ")
            ),
            bindings,
        })
    }

    /// Compile an UPDATE. SET placeholders are drawn before WHERE
    /// placeholders, matching the binding reorder done when the update row
    /// was queued.
    pub fn compile_update(&self, query: &Query) -> BuilderResult<Statement> {
        self.require_table(query)?;
        let Some(row) = query.values.first() else {
            return Err(BuilderError::compile("update has no values"));
        };

        let mut ph = Placeholders::new(self.dialect);
        let sets = row
            .iter()
            .map(|(column, value)| match value {
                SetValue::Bound(_) => format!("{} = {}", self.wrap(column), ph.next()),
                SetValue::Expr(expr) => format!("{} = {expr}", self.wrap(column)),
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!("update {}", self.wrap_table(&query.table));
        self.append_joins(query, &mut sql);
        sql.push_str(" set ");
        sql.push_str(&sets);
        if !query.wheres.is_empty() {
            self.append_wheres(query, &mut sql, &mut ph);
        }
        Ok(Statement {
            sql,
            bindings: query.bindings.wheres.clone(),
        })
    }

    /// Compile a DELETE.
    pub fn compile_delete(&self, query: &Query) -> BuilderResult<Statement> {
        self.require_table(query)?;
        let mut ph = Placeholders::new(self.dialect);
        let mut sql = format!("delete from {}", self.wrap_table(&query.table));
        if !query.wheres.is_empty() {
            self.append_wheres(query, &mut sql, &mut ph);
        }
        Ok(Statement {
            sql,
            bindings: query.bindings.wheres.clone(),
        })
    }

    // ==================== SELECT assembly ====================

    fn require_table(&self, query: &Query) -> BuilderResult<()> {
        if query.table.is_empty() {
            return Err(BuilderError::compile("no table set"));
        }
        Ok(())
    }

    fn select_sql(&self, query: &Query, ph: &mut Placeholders) -> BuilderResult<String> {
        self.require_table(query)?;
        let mut sql = String::with_capacity(1024);
        for component in SELECT_COMPONENTS {
            if query.has_component(component) {
                self.append_component(query, component, &mut sql, ph)?;
            }
        }
        Ok(sql)
    }

    fn append_component(
        &self,
        query: &Query,
        component: Component,
        sql: &mut String,
        ph: &mut Placeholders,
    ) -> BuilderResult<()> {
        match component {
            Component::Aggregate => self.append_aggregate(query, sql),
            Component::Columns => self.append_columns(query, sql),
            Component::From => {
                sql.push_str(" from ");
                sql.push_str(&self.wrap_table(&query.table));
            }
            Component::Joins => self.append_joins(query, sql),
            Component::Wheres => self.append_wheres(query, sql, ph),
            Component::Groups => {
                sql.push_str(" group by ");
                let groups = query
                    .groups
                    .iter()
                    .map(|g| self.wrap(g))
                    .collect::<Vec<_>>()
                    .join(", ");
                sql.push_str(&groups);
            }
            Component::Havings => self.append_havings(query, sql, ph),
            Component::Orders => self.append_orders(&query.orders, sql),
            Component::Limit => sql.push_str(&format!(" limit {}", query.limit)),
            Component::Offset => sql.push_str(&format!(" offset {}", query.offset)),
            Component::Unions => self.append_unions(query, sql, ph)?,
            Component::Lock => {
                if let Some(lock) = query.lock {
                    sql.push_str(self.dialect.lock_clause(lock));
                }
            }
        }
        Ok(())
    }

    fn append_aggregate(&self, query: &Query, sql: &mut String) {
        let Some(aggregate) = &query.aggregate else {
            return;
        };
        let column = if query.distinct && aggregate.column != "*" {
            format!("distinct {}", self.wrap(&aggregate.column))
        } else {
            self.wrap(&aggregate.column)
        };
        sql.push_str(&format!(
            "select {}({column}) as aggregate",
            aggregate.function.as_str()
        ));
    }

    fn append_columns(&self, query: &Query, sql: &mut String) {
        let columns = if query.columns.is_empty() {
            "*".to_string()
        } else {
            query
                .columns
                .iter()
                .map(|c| self.wrap(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        if query.distinct {
            sql.push_str(&format!("select distinct {columns}"));
        } else {
            sql.push_str(&format!("select {columns}"));
        }
    }

    fn append_joins(&self, query: &Query, sql: &mut String) {
        for join in &query.joins {
            sql.push_str(&format!(
                " {} join {} on {} {} {}",
                join.kind.as_str(),
                self.wrap_table(&join.table),
                self.wrap(&join.first),
                join.operator,
                self.wrap(&join.second)
            ));
        }
    }

    fn append_wheres(&self, query: &Query, sql: &mut String, ph: &mut Placeholders) {
        sql.push_str(" where ");
        for (i, clause) in query.wheres.iter().enumerate() {
            // The first clause never emits its connector.
            if i > 0 {
                sql.push(' ');
                sql.push_str(clause.connector().as_str());
                sql.push(' ');
            }
            sql.push_str(&self.where_sql(clause, ph));
        }
    }

    fn where_sql(&self, clause: &WhereClause, ph: &mut Placeholders) -> String {
        match clause {
            WhereClause::Basic {
                column,
                operator,
                paren,
                ..
            } => {
                let core = format!("{} {} {}", self.wrap(column), operator, ph.next());
                match paren {
                    Paren::Open => format!("({core}"),
                    Paren::Close => format!("{core})"),
                    Paren::None => core,
                }
            }
            WhereClause::Between {
                column, negated, ..
            } => format!(
                "{} {}between {} and {}",
                self.wrap(column),
                if *negated { "not " } else { "" },
                ph.next(),
                ph.next()
            ),
            WhereClause::In {
                column,
                values,
                negated,
                ..
            } => {
                let placeholders = values.iter().map(|_| ph.next()).collect::<Vec<_>>();
                format!(
                    "{} {}in ({})",
                    self.wrap(column),
                    if *negated { "not " } else { "" },
                    placeholders.join(", ")
                )
            }
            WhereClause::Date {
                part,
                column,
                operator,
                ..
            } => self
                .dialect
                .date_predicate(*part, &self.wrap(column), operator, &ph.next()),
            WhereClause::Column {
                first,
                operator,
                second,
                ..
            } => format!("{} {} {}", self.wrap(first), operator, self.wrap(second)),
            WhereClause::Raw { sql, .. } => sql.clone(),
        }
    }

    fn append_havings(&self, query: &Query, sql: &mut String, ph: &mut Placeholders) {
        sql.push_str(" having ");
        for (i, having) in query.havings.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(having.connector().as_str());
                sql.push(' ');
            }
            match having {
                HavingClause::Basic {
                    column, operator, ..
                } => {
                    sql.push_str(&format!("{} {} {}", self.wrap(column), operator, ph.next()));
                }
                HavingClause::Raw { sql: raw, .. } => sql.push_str(raw),
            }
        }
    }

    fn append_orders(&self, orders: &[Order], sql: &mut String) {
        sql.push_str(" order by ");
        let items = orders
            .iter()
            .map(|o| format!("{} {}", self.wrap(&o.column), o.direction.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&items);
    }

    fn append_unions(
        &self,
        query: &Query,
        sql: &mut String,
        ph: &mut Placeholders,
    ) -> BuilderResult<()> {
        for union in &query.unions {
            sql.push_str(if union.all { " union all " } else { " union " });
            sql.push_str(&self.select_sql(&union.query, ph)?);
        }
        if !query.union_orders.is_empty() {
            self.append_orders(&query.union_orders, sql);
        }
        if query.union_limit > 0 {
            sql.push_str(&format!(" limit {}", query.union_limit));
        }
        if query.union_offset > 0 {
            sql.push_str(&format!(" offset {}", query.union_offset));
        }
        Ok(())
    }

    // ==================== Identifier wrapping ====================

    /// Rewrite a user-supplied identifier.
    ///
    /// An aliased value (`expr as alias`, case-insensitive) is split once
    /// and re-emitted with the prefix on the left side; a qualified value
    /// (`table.column`) gets the prefix on the table segment; anything else
    /// passes through untouched. The base grammar does not quote.
    pub fn wrap(&self, value: &str) -> String {
        let lowered = value.to_ascii_lowercase();
        if let Some(pos) = lowered.find(" as ") {
            let (left, right) = (&value[..pos], &value[pos + 4..]);
            return format!("{}{left} as {right}", self.prefix);
        }
        if let Some((left, right)) = value.split_once('.') {
            return format!("{}{left}.{right}", self.prefix);
        }
        value.to_string()
    }

    /// Prefix a table name.
    pub fn wrap_table(&self, table: &str) -> String {
        format!("{}{table}", self.prefix)
    }
}
