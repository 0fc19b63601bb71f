//! Live database backends
//!
//! Grading code only sees the [`Session`](crate::session::Session) trait;
//! this module provides the PostgreSQL implementation and the
//! per-instance database reset used by the evaluation driver.

mod postgres;

pub use self::postgres::{PgConnector, PgSession, PgSettings};
