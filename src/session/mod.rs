//! Sessions and statement-list execution
//!
//! A [`Session`] is the caller-supplied connection handle: it runs one SQL
//! text at a time and returns the rows it produced. [`execute_statements`]
//! runs a whole statement list on one session and reports an
//! [`ExecutionOutcome`] with error and timeout flags instead of an error.
//!
//! # Execution rules
//!
//! 1. Statements run in order on the same session
//! 2. The first failure stops the list
//! 3. The outcome rows are those of the last statement executed

mod errors;
mod memory;

pub use errors::{SessionError, SessionResult};
pub use memory::{MemoryConnector, MemorySession, MockResponse};

use crate::observability::{preview, Logger};
use crate::value::Row;

/// Characters of SQL text kept in log fields
const SQL_PREVIEW_CHARS: usize = 200;

/// A live connection that executes SQL text
pub trait Session {
    /// Executes one SQL text and returns its result rows.
    ///
    /// Statements that produce no result set return an empty vector.
    fn execute(&mut self, sql: &str) -> SessionResult<Vec<Row>>;
}

impl<S: Session + ?Sized> Session for &mut S {
    fn execute(&mut self, sql: &str) -> SessionResult<Vec<Row>> {
        (**self).execute(sql)
    }
}

impl<S: Session + ?Sized> Session for Box<S> {
    fn execute(&mut self, sql: &str) -> SessionResult<Vec<Row>> {
        (**self).execute(sql)
    }
}

/// Opens sessions by database name and manages database copies
///
/// Implementations are cloned once per grading worker; each clone opens its
/// own sessions.
pub trait Connector {
    type Session: Session;

    /// Opens a new session on `database`
    fn connect(&mut self, database: &str) -> SessionResult<Self::Session>;

    /// Returns `target` to the pristine state of `database` once an
    /// instance is graded. `target` is `database` itself or one of its copies.
    fn restore(&mut self, database: &str, target: &str) -> SessionResult<()>;

    /// Creates `copy` in the pristine state of `database`, replacing any
    /// existing database of that name
    fn create_copy(&mut self, database: &str, copy: &str) -> SessionResult<()>;

    /// Drops a copy made by [`Connector::create_copy`]
    fn drop_copy(&mut self, copy: &str) -> SessionResult<()>;
}

/// Result of running a statement list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutcome {
    /// Rows of the last statement executed
    pub rows: Vec<Row>,
    /// A statement failed
    pub error_occurred: bool,
    /// A statement exceeded its time budget
    pub timed_out: bool,
}

impl ExecutionOutcome {
    /// Returns true when neither flag is set
    pub fn is_usable(&self) -> bool {
        !self.error_occurred && !self.timed_out
    }
}

/// Runs `statements` in order on `session`, stopping at the first failure.
pub fn execute_statements<S, Q>(session: &mut S, database: &str, statements: &[Q]) -> ExecutionOutcome
where
    S: Session + ?Sized,
    Q: AsRef<str>,
{
    let mut outcome = ExecutionOutcome::default();
    let total = statements.len().to_string();

    for (i, sql) in statements.iter().enumerate() {
        let sql = sql.as_ref();
        let position = (i + 1).to_string();
        Logger::trace(
            "STATEMENT_EXECUTE",
            &[
                ("database", database),
                ("position", &position),
                ("sql", &preview(sql, SQL_PREVIEW_CHARS)),
                ("total", &total),
            ],
        );

        match session.execute(sql) {
            Ok(rows) => {
                Logger::trace(
                    "STATEMENT_OK",
                    &[
                        ("database", database),
                        ("position", &position),
                        ("rows", &rows.len().to_string()),
                    ],
                );
                outcome.rows = rows;
            }
            Err(e) => {
                Logger::warn(
                    "STATEMENT_FAILED",
                    &[
                        ("category", e.category()),
                        ("database", database),
                        ("error", &e.to_string()),
                        ("position", &position),
                        ("sql", &preview(sql, SQL_PREVIEW_CHARS)),
                    ],
                );
                if e.is_timeout() {
                    outcome.timed_out = true;
                } else {
                    outcome.error_occurred = true;
                }
                break;
            }
        }
    }

    outcome
}
