//! Scripted in-memory session
//!
//! Stands in for a live connection in tests and dry runs. It answers from
//! three sources, in order:
//!
//! 1. Scripted responses keyed by exact (trimmed) SQL text
//! 2. `EXPLAIN (FORMAT JSON) <sql>` for statements given a plan cost
//! 3. A tiny integer-table store:
//!    `CREATE TABLE t`, `DROP TABLE t`, `INSERT INTO t VALUES (n)`,
//!    `SELECT v FROM t`, `DELETE FROM t`, plus `BEGIN`/`COMMIT`/`ROLLBACK`
//!    and `SAVEPOINT`/`RELEASE SAVEPOINT`/`ROLLBACK TO SAVEPOINT`
//!
//! Like PostgreSQL, a failed statement inside a transaction aborts it: every
//! later statement fails until `ROLLBACK` or `ROLLBACK TO SAVEPOINT`.
//!
//! Sessions handed out by a [`MemoryConnector`] share one committed table
//! store per database, so autocommitted and committed changes stay visible
//! to later sessions until the database is restored.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;

use super::errors::{SessionError, SessionResult};
use super::{Connector, Session};
use crate::value::{Row, Value};

const EXPLAIN_PREFIX: &str = "EXPLAIN (FORMAT JSON) ";

/// A scripted answer for one SQL text
#[derive(Debug, Clone)]
pub enum MockResponse {
    Rows(Vec<Row>),
    Error(String),
    Timeout,
}

type Tables = BTreeMap<String, Vec<i64>>;

/// In-memory [`Session`] with scripted answers and transactional tables
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    responses: HashMap<String, MockResponse>,
    plan_costs: HashMap<String, f64>,
    tables: Tables,
    snapshot: Option<Tables>,
    savepoints: Vec<(String, Tables)>,
    aborted: bool,
    executed: Vec<String>,
    store: Option<Arc<Mutex<Tables>>>,
}

impl MemorySession {
    /// Creates an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `sql` with `rows`
    pub fn with_rows(mut self, sql: &str, rows: Vec<Row>) -> Self {
        self.responses
            .insert(sql.trim().to_string(), MockResponse::Rows(rows));
        self
    }

    /// Fails `sql` with an execution error
    pub fn with_error(mut self, sql: &str, message: &str) -> Self {
        self.responses.insert(
            sql.trim().to_string(),
            MockResponse::Error(message.to_string()),
        );
        self
    }

    /// Fails `sql` with a timeout
    pub fn with_timeout(mut self, sql: &str) -> Self {
        self.responses
            .insert(sql.trim().to_string(), MockResponse::Timeout);
        self
    }

    /// Makes `EXPLAIN (FORMAT JSON) <sql>` report `cost` as the root total cost
    pub fn with_plan_cost(mut self, sql: &str, cost: f64) -> Self {
        self.plan_costs.insert(sql.trim().to_string(), cost);
        self
    }

    /// Creates a committed table with the given values
    pub fn with_table(mut self, name: &str, values: &[i64]) -> Self {
        self.tables.insert(name.to_ascii_lowercase(), values.to_vec());
        self
    }

    /// Every SQL text received, in order
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// Returns true if a transaction is open
    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Returns true if `name` exists in the visible state
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_ascii_lowercase())
    }

    /// Values of table `name` in the visible state
    pub fn table(&self, name: &str) -> Option<&[i64]> {
        self.tables
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_slice())
    }

    fn run(&mut self, sql: &str) -> SessionResult<Vec<Row>> {
        let upper = sql.to_ascii_uppercase();
        let is_control = matches!(upper.as_str(), "BEGIN" | "ROLLBACK" | "COMMIT")
            || upper.starts_with("ROLLBACK TO ");

        if self.aborted && !is_control {
            return Err(SessionError::Execution(
                "current transaction is aborted, commands ignored until end of transaction block"
                    .to_string(),
            ));
        }

        if let Some(response) = self.responses.get(sql) {
            return match response.clone() {
                MockResponse::Rows(rows) => Ok(rows),
                MockResponse::Error(message) => Err(SessionError::Execution(message)),
                MockResponse::Timeout => Err(SessionError::Timeout(
                    "canceling statement due to statement timeout".to_string(),
                )),
            };
        }

        match upper.as_str() {
            "BEGIN" => {
                if self.snapshot.is_none() {
                    self.snapshot = Some(self.tables.clone());
                }
                return Ok(Vec::new());
            }
            "ROLLBACK" => {
                if let Some(snapshot) = self.snapshot.take() {
                    self.tables = snapshot;
                }
                self.savepoints.clear();
                self.aborted = false;
                return Ok(Vec::new());
            }
            "COMMIT" => {
                if self.aborted {
                    // PostgreSQL turns COMMIT of a failed transaction into a rollback
                    if let Some(snapshot) = self.snapshot.take() {
                        self.tables = snapshot;
                    }
                    self.aborted = false;
                }
                self.snapshot = None;
                self.savepoints.clear();
                return Ok(Vec::new());
            }
            _ => {}
        }

        if let Some(result) = self.run_savepoint_command(&upper) {
            return result;
        }

        if upper.starts_with(EXPLAIN_PREFIX) {
            let target = sql[EXPLAIN_PREFIX.len()..].trim();
            return match self.plan_costs.get(target) {
                Some(cost) => Ok(vec![vec![Value::Nested(json!([
                    { "Plan": { "Node Type": "Result", "Startup Cost": 0.0, "Total Cost": cost } }
                ]))]]),
                None => Err(SessionError::Execution(format!("no plan for: {}", target))),
            };
        }

        self.run_table_command(sql)
    }

    /// Handles savepoint commands; `None` when `upper` is not one
    fn run_savepoint_command(&mut self, upper: &str) -> Option<SessionResult<Vec<Row>>> {
        let words: Vec<&str> = upper.split_whitespace().collect();
        let (command, name) = match words.as_slice() {
            ["SAVEPOINT", name] => ("SAVEPOINT", *name),
            ["RELEASE", "SAVEPOINT", name] | ["RELEASE", name] => ("RELEASE", *name),
            ["ROLLBACK", "TO", "SAVEPOINT", name] | ["ROLLBACK", "TO", name] => ("ROLLBACK TO", *name),
            _ => return None,
        };

        if self.snapshot.is_none() {
            return Some(Err(SessionError::Execution(format!(
                "{} can only be used in transaction blocks",
                command
            ))));
        }

        let position = self.savepoints.iter().rposition(|(saved, _)| saved == name);
        let result = match (command, position) {
            ("SAVEPOINT", _) => {
                self.savepoints.push((name.to_string(), self.tables.clone()));
                Ok(Vec::new())
            }
            ("RELEASE", Some(position)) => {
                self.savepoints.truncate(position);
                Ok(Vec::new())
            }
            ("ROLLBACK TO", Some(position)) => {
                // The savepoint survives a rollback to it
                self.savepoints.truncate(position + 1);
                self.tables = self.savepoints[position].1.clone();
                self.aborted = false;
                Ok(Vec::new())
            }
            _ => Err(SessionError::Execution(format!(
                "savepoint \"{}\" does not exist",
                name.to_ascii_lowercase()
            ))),
        };
        Some(result)
    }

    fn run_table_command(&mut self, sql: &str) -> SessionResult<Vec<Row>> {
        let tokens: Vec<String> = sql
            .split_whitespace()
            .map(|t| t.to_ascii_lowercase())
            .collect();
        let words: Vec<&str> = tokens.iter().map(|t| t.as_str()).collect();

        match words.as_slice() {
            ["create", "table", name] => {
                if self.tables.contains_key(*name) {
                    return Err(SessionError::Execution(format!(
                        "relation \"{}\" already exists",
                        name
                    )));
                }
                self.tables.insert(name.to_string(), Vec::new());
                Ok(Vec::new())
            }
            ["drop", "table", name] => {
                self.tables
                    .remove(*name)
                    .map(|_| Vec::new())
                    .ok_or_else(|| missing_relation(name))
            }
            ["insert", "into", name, "values", value] => {
                let n: i64 = value
                    .trim_start_matches('(')
                    .trim_end_matches(')')
                    .parse()
                    .map_err(|_| {
                        SessionError::Execution(format!("invalid input syntax: {}", value))
                    })?;
                let table = self.tables.get_mut(*name).ok_or_else(|| missing_relation(name))?;
                table.push(n);
                Ok(Vec::new())
            }
            ["select", "v", "from", name] => {
                let table = self.tables.get(*name).ok_or_else(|| missing_relation(name))?;
                Ok(table.iter().map(|v| vec![Value::Int(*v)]).collect())
            }
            ["delete", "from", name] => {
                let table = self.tables.get_mut(*name).ok_or_else(|| missing_relation(name))?;
                table.clear();
                Ok(Vec::new())
            }
            _ => Err(SessionError::Execution(format!(
                "syntax error in statement: {}",
                sql
            ))),
        }
    }
}

fn missing_relation(name: &str) -> SessionError {
    SessionError::Execution(format!("relation \"{}\" does not exist", name))
}

impl Session for MemorySession {
    fn execute(&mut self, sql: &str) -> SessionResult<Vec<Row>> {
        let sql = sql.trim();
        self.executed.push(sql.to_string());

        // Outside a transaction block every statement sees and writes the
        // committed state
        if self.snapshot.is_none() {
            if let Some(store) = &self.store {
                self.tables = lock(store).clone();
            }
        }

        let result = self.run(sql);
        if result.is_err() && self.snapshot.is_some() {
            self.aborted = true;
        }

        if self.snapshot.is_none() {
            if let Some(store) = &self.store {
                *lock(store) = self.tables.clone();
            }
        }
        result
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Hands out sessions over one scripted [`MemorySession`]
///
/// Each database starts from the template's tables. Committed changes
/// persist across sessions of the same database until `restore` puts the
/// template's tables back. Clones share the same databases and history.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    template: MemorySession,
    unreachable: Vec<String>,
    state: Arc<Mutex<ConnectorState>>,
}

#[derive(Debug, Default)]
struct ConnectorState {
    databases: BTreeMap<String, Arc<Mutex<Tables>>>,
    connected: Vec<String>,
    restored: Vec<String>,
    copies: Vec<String>,
    dropped: Vec<String>,
}

impl MemoryConnector {
    pub fn new(template: MemorySession) -> Self {
        Self {
            template,
            ..Self::default()
        }
    }

    /// Makes `connect` and `create_copy` fail for `database`
    pub fn with_unreachable(mut self, database: &str) -> Self {
        self.unreachable.push(database.to_string());
        self
    }

    /// Databases connected to, in order
    pub fn connected(&self) -> Vec<String> {
        lock(&self.state).connected.clone()
    }

    /// Databases restored, in order
    pub fn restored(&self) -> Vec<String> {
        lock(&self.state).restored.clone()
    }

    /// Copies created, in order
    pub fn copies(&self) -> Vec<String> {
        lock(&self.state).copies.clone()
    }

    /// Copies dropped, in order
    pub fn dropped(&self) -> Vec<String> {
        lock(&self.state).dropped.clone()
    }

    fn check_reachable(&self, database: &str) -> SessionResult<()> {
        if self.unreachable.iter().any(|db| db == database) {
            return Err(SessionError::Connection(format!(
                "database \"{}\" does not exist",
                database
            )));
        }
        Ok(())
    }

    fn pristine(&self) -> Arc<Mutex<Tables>> {
        Arc::new(Mutex::new(self.template.tables.clone()))
    }
}

impl Connector for MemoryConnector {
    type Session = MemorySession;

    fn connect(&mut self, database: &str) -> SessionResult<MemorySession> {
        self.check_reachable(database)?;

        let mut state = lock(&self.state);
        state.connected.push(database.to_string());
        let store = state
            .databases
            .entry(database.to_string())
            .or_insert_with(|| self.pristine())
            .clone();
        drop(state);

        let mut session = self.template.clone();
        session.tables = lock(&store).clone();
        session.store = Some(store);
        Ok(session)
    }

    fn restore(&mut self, database: &str, target: &str) -> SessionResult<()> {
        self.check_reachable(database)?;

        let mut state = lock(&self.state);
        state.restored.push(target.to_string());
        let store = state.databases.entry(target.to_string()).or_default().clone();
        drop(state);

        *lock(&store) = self.template.tables.clone();
        Ok(())
    }

    fn create_copy(&mut self, database: &str, copy: &str) -> SessionResult<()> {
        self.check_reachable(database)?;

        let pristine = self.pristine();
        let mut state = lock(&self.state);
        state.databases.insert(copy.to_string(), pristine);
        state.copies.push(copy.to_string());
        Ok(())
    }

    fn drop_copy(&mut self, copy: &str) -> SessionResult<()> {
        let mut state = lock(&self.state);
        state.databases.remove(copy);
        state.dropped.push(copy.to_string());
        Ok(())
    }
}
