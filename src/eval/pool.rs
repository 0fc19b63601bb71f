//! Per-worker database copies
//!
//! Parallel grading never touches the source databases. Before the run, each
//! database named by the dataset gets one copy per worker, named
//! `<database>_process_<n>`. A worker checks a copy out for one instance and
//! the [`CopyLease`] hands it back when dropped. Copies are dropped once the
//! run is over.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::observability::Logger;
use crate::session::Connector;

/// Name of the `n`th copy of `database`
pub fn copy_name(database: &str, n: usize) -> String {
    format!("{}_process_{}", database, n)
}

/// Copies available for checkout, by source database
pub struct CopyPool {
    available: Mutex<BTreeMap<String, Vec<String>>>,
    returned: Condvar,
    created: Vec<String>,
}

impl CopyPool {
    /// Creates `per_database` copies of each of `databases`.
    ///
    /// A database whose copies cannot all be created keeps the ones that
    /// were; one with none is left out of the pool.
    pub fn provision<C: Connector + ?Sized>(
        connector: &mut C,
        databases: &BTreeSet<String>,
        per_database: usize,
        run_id: &str,
    ) -> Self {
        let mut available = BTreeMap::new();
        let mut created = Vec::new();

        for database in databases {
            let mut copies = Vec::new();
            for n in 1..=per_database {
                let copy = copy_name(database, n);
                match connector.create_copy(database, &copy) {
                    Ok(()) => {
                        Logger::info(
                            "DATABASE_COPY_CREATED",
                            &[("copy", &copy), ("database", database), ("run_id", run_id)],
                        );
                        created.push(copy.clone());
                        copies.push(copy);
                    }
                    Err(e) => Logger::error(
                        "DATABASE_COPY_FAILED",
                        &[
                            ("copy", &copy),
                            ("database", database),
                            ("error", &e.to_string()),
                            ("run_id", run_id),
                        ],
                    ),
                }
            }
            if !copies.is_empty() {
                // Checkout pops from the back; hand out copy 1 first
                copies.reverse();
                available.insert(database.clone(), copies);
            }
        }

        Self {
            available: Mutex::new(available),
            returned: Condvar::new(),
            created,
        }
    }

    /// Takes a copy of `database`, waiting while all of them are in use.
    ///
    /// Returns `None` when the pool holds no copies of `database`.
    pub fn checkout(&self, database: &str) -> Option<CopyLease<'_>> {
        let mut available = self.lock();
        loop {
            let copy = available.get_mut(database)?.pop();
            match copy {
                Some(copy) => {
                    return Some(CopyLease {
                        pool: self,
                        database: database.to_string(),
                        copy,
                    })
                }
                None => {
                    available = self
                        .returned
                        .wait(available)
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                }
            }
        }
    }

    /// Every copy created, in creation order
    pub fn created(&self) -> &[String] {
        &self.created
    }

    /// Drops every copy created by [`CopyPool::provision`]
    pub fn teardown<C: Connector + ?Sized>(self, connector: &mut C, run_id: &str) {
        for copy in &self.created {
            match connector.drop_copy(copy) {
                Ok(()) => Logger::info("DATABASE_COPY_DROPPED", &[("copy", copy), ("run_id", run_id)]),
                Err(e) => Logger::error(
                    "DATABASE_COPY_DROP_FAILED",
                    &[("copy", copy), ("error", &e.to_string()), ("run_id", run_id)],
                ),
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<String>>> {
        self.available
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A checked-out copy, returned to the pool on drop
pub struct CopyLease<'p> {
    pool: &'p CopyPool,
    database: String,
    copy: String,
}

impl CopyLease<'_> {
    /// Name of the copy
    pub fn name(&self) -> &str {
        &self.copy
    }
}

impl Drop for CopyLease<'_> {
    fn drop(&mut self) {
        let mut available = self.pool.lock();
        if let Some(copies) = available.get_mut(&self.database) {
            copies.push(std::mem::take(&mut self.copy));
        }
        drop(available);
        self.pool.returned.notify_one();
    }
}
