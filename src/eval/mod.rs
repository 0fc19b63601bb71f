//! Dataset evaluation driver
//!
//! Grades every instance of a JSONL dataset against a live backend and
//! summarizes the run:
//!
//! ```ignore
//! let instances = load_jsonl(path)?;
//! let run = evaluate(&connector, &instances, 4);
//! write_report(&report_path(path), &run.summary, &run.results)?;
//! ```
//!
//! With one worker, instances are graded in order on their own databases.
//! With more, each worker grades on checked-out copies (see [`CopyPool`])
//! and results are put back in dataset order.
//!
//! Every log event of a run carries the same `run_id`.

mod checks;
mod dataset;
mod errors;
mod pool;
mod report;
mod runner;

pub use checks::{Check, CheckContext, TestCase};
pub use dataset::{load_jsonl, parse_jsonl, Instance, InstanceId, StatementField};
pub use errors::{EvalError, EvalResult};
pub use report::{
    render_report, report_path, sibling_path, status_path, write_report, write_status, Summary,
};
pub use pool::{copy_name, CopyLease, CopyPool};
pub use runner::{grade_instance, grade_on_copy, InstanceResult, InstanceStatus};

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use chrono::Local;
use uuid::Uuid;

use crate::observability::{Logger, Timer};
use crate::session::Connector;

/// Results of one evaluation run
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub run_id: String,
    /// One result per instance, in dataset order
    pub results: Vec<InstanceResult>,
    pub summary: Summary,
}

/// Timestamp format of run summaries
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Grades `instances` with `workers` parallel workers (at least one)
pub fn evaluate<C>(connector: &C, instances: &[Instance], workers: usize) -> Evaluation
where
    C: Connector + Clone + Send,
{
    let run_id = Uuid::new_v4().to_string();
    let workers = workers.max(1);
    let timer = Timer::new();
    Logger::info(
        "EVALUATION_START",
        &[
            ("instances", &instances.len().to_string()),
            ("run_id", &run_id),
            ("workers", &workers.to_string()),
        ],
    );

    let results = if workers == 1 {
        let mut connector = connector.clone();
        instances
            .iter()
            .map(|instance| grade_instance(&mut connector, instance, &run_id))
            .collect()
    } else {
        grade_parallel(connector, instances, workers, &run_id)
    };

    let summary = Summary::from_results(&results, Local::now().format(TIMESTAMP_FORMAT).to_string());
    Logger::info(
        "EVALUATION_COMPLETE",
        &[
            ("accuracy", &format!("{:.2}", summary.accuracy)),
            ("duration_ms", &timer.elapsed_ms()),
            ("run_id", &run_id),
            ("total_errors", &summary.total_errors.to_string()),
        ],
    );

    Evaluation {
        run_id,
        results,
        summary,
    }
}

fn grade_parallel<C>(
    connector: &C,
    instances: &[Instance],
    workers: usize,
    run_id: &str,
) -> Vec<InstanceResult>
where
    C: Connector + Clone + Send,
{
    let databases: BTreeSet<String> = instances
        .iter()
        .filter(|instance| instance.missing_fields().is_empty())
        .map(|instance| instance.database().to_string())
        .collect();

    let mut admin = connector.clone();
    let pool = CopyPool::provision(&mut admin, &databases, workers, run_id);
    let next = AtomicUsize::new(0);

    let mut graded: Vec<(usize, InstanceResult)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let mut connector = connector.clone();
                let (pool, next) = (&pool, &next);
                scope.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(instance) = instances.get(index) else {
                            break;
                        };
                        done.push((index, grade_pooled(&mut connector, pool, instance, run_id)));
                    }
                    done
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Logger::error("WORKER_PANICKED", &[("run_id", run_id)]);
                    Vec::new()
                })
            })
            .collect()
    });
    graded.sort_by_key(|(index, _)| *index);

    pool.teardown(&mut admin, run_id);
    graded.into_iter().map(|(_, result)| result).collect()
}

fn grade_pooled<C: Connector>(
    connector: &mut C,
    pool: &CopyPool,
    instance: &Instance,
    run_id: &str,
) -> InstanceResult {
    if !instance.missing_fields().is_empty() {
        return grade_instance(connector, instance, run_id);
    }

    let database = instance.database();
    match pool.checkout(database) {
        Some(lease) => grade_on_copy(connector, instance, lease.name(), run_id),
        None => {
            let message = format!("No available copies of database \"{}\"", database);
            Logger::error(
                "INSTANCE_NOT_GRADED",
                &[
                    ("instance_id", &instance.instance_id.to_string()),
                    ("reason", &message),
                    ("run_id", run_id),
                ],
            );
            InstanceResult::not_graded(instance, message)
        }
    }
}
