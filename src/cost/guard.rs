//! Rollback-only transaction guard
//!
//! `BEGIN` on creation, `ROLLBACK` on drop. Every exit path, including early
//! returns and panics unwinding through the measurement, discards the
//! transaction's effects.
//!
//! [`TransactionGuard::step`] wraps one unit of work in a savepoint, so a
//! failing statement is undone on its own and leaves the transaction usable
//! for the statements after it.

use crate::observability::Logger;
use crate::session::{Session, SessionError, SessionResult};

const STEP_SAVEPOINT: &str = "cost_step";

/// An open transaction that is always rolled back
pub struct TransactionGuard<'s, S: Session + ?Sized> {
    session: &'s mut S,
    database: &'s str,
}

impl<'s, S: Session + ?Sized> TransactionGuard<'s, S> {
    /// Issues `BEGIN` on `session`
    pub fn begin(session: &'s mut S, database: &'s str) -> SessionResult<Self> {
        session.execute("BEGIN")?;
        Logger::trace("TRANSACTION_BEGIN", &[("database", database)]);
        Ok(Self { session, database })
    }

    /// The session, inside the open transaction
    pub fn session(&mut self) -> &mut S {
        &mut *self.session
    }

    /// Runs `work` inside a savepoint.
    ///
    /// Success releases the savepoint; failure rolls back to it, undoing
    /// only what `work` did.
    pub fn step<T, E>(&mut self, work: impl FnOnce(&mut S) -> Result<T, E>) -> Result<T, E>
    where
        E: From<SessionError>,
    {
        self.session
            .execute(&format!("SAVEPOINT {}", STEP_SAVEPOINT))?;

        match work(&mut *self.session) {
            Ok(value) => {
                self.session
                    .execute(&format!("RELEASE SAVEPOINT {}", STEP_SAVEPOINT))?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self
                    .session
                    .execute(&format!("ROLLBACK TO SAVEPOINT {}", STEP_SAVEPOINT))
                {
                    Logger::error(
                        "SAVEPOINT_ROLLBACK_FAILED",
                        &[("database", self.database), ("error", &rollback.to_string())],
                    );
                }
                Err(e)
            }
        }
    }
}

impl<S: Session + ?Sized> Drop for TransactionGuard<'_, S> {
    fn drop(&mut self) {
        match self.session.execute("ROLLBACK") {
            Ok(_) => Logger::trace("TRANSACTION_ROLLBACK", &[("database", self.database)]),
            Err(e) => Logger::error(
                "TRANSACTION_ROLLBACK_FAILED",
                &[("database", self.database), ("error", &e.to_string())],
            ),
        }
    }
}
