//! Terminal-operation lifecycle against a canned-result driver: row
//! materialization, the reset discipline between cycles, the dry-run hook,
//! and the placeholder/binding invariants that must hold for any chain.

use std::cell::RefCell;

use fluentsql::{BuilderResult, Dialect, Driver, Grammar, Row, Statement};

/// Driver that records dispatches and replays queued results in order.
struct RecordingDriver {
    grammar: Grammar,
    captured: RefCell<Vec<(Statement, bool)>>,
    results: RefCell<Vec<Vec<Row>>>,
    affected: i64,
}

impl RecordingDriver {
    fn new(dialect: Dialect) -> Self {
        Self {
            grammar: Grammar::new(dialect),
            captured: RefCell::new(Vec::new()),
            results: RefCell::new(Vec::new()),
            affected: 1,
        }
    }

    fn queue(&self, rows: Vec<Row>) {
        self.results.borrow_mut().push(rows);
    }

    fn last(&self) -> (Statement, bool) {
        self.captured
            .borrow()
            .last()
            .cloned()
            .expect("no statement dispatched")
    }
}

impl Driver for RecordingDriver {
    fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    fn run_select(&self, statement: &Statement, use_write: bool) -> BuilderResult<Vec<Row>> {
        self.captured
            .borrow_mut()
            .push((statement.clone(), use_write));
        let mut results = self.results.borrow_mut();
        if results.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(results.remove(0))
        }
    }

    fn run_affecting(&self, statement: &Statement) -> BuilderResult<i64> {
        self.captured.borrow_mut().push((statement.clone(), false));
        Ok(self.affected)
    }
}

fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn placeholder_positions(sql: &str, bindings: usize) -> Vec<usize> {
    (1..=bindings)
        .filter_map(|n| sql.find(&format!("${n}")))
        .collect()
}

#[test]
fn get_materializes_rows() {
    let driver = RecordingDriver::new(Dialect::MySql);
    driver.queue(vec![row(&[("id", "1"), ("name", "Go")])]);

    let mut b = driver.table("users");
    b.where_("id", ">", "0");
    let rows = b.get(&[]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Go");
}

#[test]
fn find_wheres_id_and_takes_one() {
    let driver = RecordingDriver::new(Dialect::MySql);
    driver.queue(vec![row(&[("id", "7"), ("name", "Go")])]);

    let mut b = driver.table("users");
    let found = b.find(7, &[]).unwrap().unwrap();
    assert_eq!(found["id"], "7");

    let (stmt, _) = driver.last();
    assert_eq!(stmt.sql, "select * from users where id = ? limit 1");
    assert_eq!(stmt.bindings, vec!["7"]);
}

#[test]
fn value_projects_a_single_column() {
    let driver = RecordingDriver::new(Dialect::MySql);
    driver.queue(vec![row(&[("name", "Go")])]);

    let mut b = driver.table("users");
    let value = b.value("name").unwrap();
    assert_eq!(value.as_deref(), Some("Go"));

    let (stmt, _) = driver.last();
    assert_eq!(stmt.sql, "select name from users limit 1");
}

#[test]
fn count_returns_the_aggregate_scalar() {
    let driver = RecordingDriver::new(Dialect::MySql);
    driver.queue(vec![row(&[("aggregate", "42")])]);

    let mut b = driver.table("users");
    let count = b.count().unwrap();
    assert_eq!(count.as_deref(), Some("42"));

    let (stmt, _) = driver.last();
    assert_eq!(stmt.sql, "select count(*) as aggregate from users");
}

#[test]
fn max_names_its_column() {
    let driver = RecordingDriver::new(Dialect::MySql);
    driver.queue(vec![row(&[("aggregate", "99")])]);

    let mut b = driver.table("users");
    let max = b.max("id").unwrap();
    assert_eq!(max.as_deref(), Some("99"));

    let (stmt, _) = driver.last();
    assert_eq!(stmt.sql, "select max(id) as aggregate from users");
}

#[test]
fn exists_honors_the_returned_boolean() {
    let driver = RecordingDriver::new(Dialect::MySql);
    driver.queue(vec![row(&[("exists", "1")])]);
    driver.queue(vec![row(&[("exists", "0")])]);
    driver.queue(vec![]);

    let mut b = driver.table("users");
    assert!(b.exists().unwrap());
    b.from("users");
    assert!(!b.exists().unwrap());
    b.from("users");
    assert!(!b.exists().unwrap());
}

#[test]
fn use_write_db_reaches_the_driver() {
    let driver = RecordingDriver::new(Dialect::MySql);
    let mut b = driver.table("users");
    b.use_write_db();
    b.get(&[]).unwrap();
    let (_, use_write) = driver.last();
    assert!(use_write);

    b.from("users");
    b.get(&[]).unwrap();
    let (_, use_write) = driver.last();
    assert!(!use_write);
}

#[test]
fn consecutive_terminals_start_from_a_clean_ir() {
    let driver = RecordingDriver::new(Dialect::MySql);
    let mut b = driver.table("users");
    b.where_eq("id", "1");
    b.get(&[]).unwrap();

    // The previous cycle's table and clauses are gone; compiling without a
    // new target is a programmer error, not a stale-statement rerun.
    let err = b.delete().unwrap_err();
    assert!(err.is_compile());

    b.from("users");
    b.delete().unwrap();
    let (stmt, _) = driver.last();
    assert_eq!(stmt.sql, "delete from users");
    assert!(stmt.bindings.is_empty());
}

#[test]
fn reset_then_identical_chain_compiles_identically() {
    let driver = RecordingDriver::new(Dialect::MySql);
    let mut b = driver.table("users");
    b.where_("id", ">", "1").order_by("id");
    b.get(&[]).unwrap();
    let (first, _) = driver.last();

    b.reset();
    b.from("users");
    b.where_("id", ">", "1").order_by("id");
    b.get(&[]).unwrap();
    let (second, _) = driver.last();

    assert_eq!(first, second);
}

#[test]
fn increment_compiles_a_raw_expression() {
    let driver = RecordingDriver::new(Dialect::MySql);
    let mut b = driver.table("users");
    b.where_eq("id", "3");
    assert!(b.increment("age").unwrap());

    let (stmt, _) = driver.last();
    assert_eq!(stmt.sql, "update users set age = age + 1 where id = ?");
    assert_eq!(stmt.bindings, vec!["3"]);
}

#[test]
fn increment_by_uses_the_given_amount() {
    let driver = RecordingDriver::new(Dialect::MySql);
    let mut b = driver.table("users");
    b.where_eq("id", "3");
    b.increment_by("age", "5").unwrap();

    let (stmt, _) = driver.last();
    assert_eq!(stmt.sql, "update users set age = age + 5 where id = ?");
}

#[test]
fn pretend_captures_without_dispatching() {
    let driver = RecordingDriver::new(Dialect::MySql);
    let mut b = driver.table("users");
    let captured = b.pretend(|b| {
        b.where_eq("id", "1");
        let _ = b.get(&[]);
        b.from("users");
        let _ = b.insert(&[&[("name", "A")]]);
    });

    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0].sql, "select * from users where id = ?");
    assert_eq!(captured[1].sql, "insert into users(name) values (?)");
    assert!(driver.captured.borrow().is_empty());
}

#[test]
fn placeholder_count_always_matches_bindings() {
    let driver = RecordingDriver::new(Dialect::MySql);
    let mut b = driver.table("users");
    b.where_paren("age", ">=", "22", "(")
        .where_eq("gender", "Male")
        .where_paren("house", ">=", "1", ")")
        .where_between("created_at", "a", "b")
        .where_in("role", &["x", "y", "z"])
        .where_raw("lower(name) = ?", &["go"])
        .where_column("users.id", "users.id")
        .group_by("role")
        .having("age", ">", "1");
    b.get(&[]).unwrap();

    let (stmt, _) = driver.last();
    assert_eq!(stmt.sql.matches('?').count(), stmt.bindings.len());
}

#[test]
fn numbered_placeholders_are_gapless_and_ordered() {
    let driver = RecordingDriver::new(Dialect::Postgres);
    let mut b = driver.table("users");
    b.where_("id", ">", "2")
        .where_between("created_at", "a", "b")
        .where_in("role", &["x", "y"])
        .having("age", ">", "1");
    b.group_by("age");
    b.get(&[]).unwrap();

    let (stmt, _) = driver.last();
    let positions = placeholder_positions(&stmt.sql, stmt.bindings.len());
    // Every index up to the binding count appears, in left-to-right order.
    assert_eq!(positions.len(), stmt.bindings.len());
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(!stmt.sql.contains(&format!("${}", stmt.bindings.len() + 1)));
}
