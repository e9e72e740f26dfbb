//! Ensemble dispatch.
//!
//! Runs one worker function over every job of an ensemble on a caller-owned
//! [`ThreadPool`] and gathers the results in job order.
//!
//! The job list is split into three consecutive sections:
//!
//! 1. **Serial front**: the first `front_serial` jobs run one at a time on the calling
//!    thread. The first failure is returned straight away and no further job starts.
//!    Useful while developing a worker, since errors surface before anything is fanned out.
//! 2. **Parallel front**: the next `front_parallel` jobs are submitted to the pool
//!    together and the whole batch is awaited before anything else is submitted. A
//!    failure is returned as soon as the batch has finished (the lowest failing index
//!    if several failed) and the bulk never starts.
//! 3. **Bulk**: every remaining job is submitted to the pool at once.
//!    Jobs in this section are never cancelled. Once all of them have finished,
//!    any failures are reported together, ordered by job index.
//!
//! Results always line up with the input: `results[i]` was produced from `jobs[i]`,
//! regardless of which section ran the job or the order in which jobs completed.
//!
//! The dispatcher borrows the pool and never builds or drops one, so a single pool
//! can serve several ensembles. Shutting it down is up to the caller.

use rayon::prelude::*;
use rayon::ThreadPool;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Number of jobs to run outside the bulk parallel section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Leading jobs run synchronously on the calling thread
    pub front_serial: usize,
    /// Jobs after the serial front that are run on the pool one at a time
    pub front_parallel: usize,
}

impl DispatchOptions {
    pub fn new(front_serial: usize, front_parallel: usize) -> Self {
        Self {
            front_serial,
            front_parallel,
        }
    }

    /// Split `n_jobs` into section sizes.
    ///
    /// Front sizes larger than the job list are clamped, serial section first.
    pub fn partition(&self, n_jobs: usize) -> Partition {
        let serial = self.front_serial.min(n_jobs);
        let parallel = self.front_parallel.min(n_jobs - serial);
        Partition {
            serial,
            parallel,
            bulk: n_jobs - serial - parallel,
        }
    }
}

/// Section sizes for a given job list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub serial: usize,
    pub parallel: usize,
    pub bulk: usize,
}

/// The section of the job list a job was run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Serial,
    Parallel,
    Bulk,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Serial => "serial",
            Section::Parallel => "parallel",
            Section::Bulk => "bulk",
        };
        write!(f, "{}", name)
    }
}

/// A failed dispatch.
///
/// Every variant identifies the failing job(s) by their index in the submitted job list.
#[derive(Error, Debug)]
pub enum DispatchError<E> {
    #[error("job {index} failed ({section} section): {source}")]
    Failed {
        index: usize,
        section: Section,
        source: E,
    },
    #[error("job {index} panicked ({section} section): {message}")]
    Panicked {
        index: usize,
        section: Section,
        message: String,
    },
    #[error("{failed} of {total} jobs failed, the first was job {first}")]
    Multiple {
        failed: usize,
        first: usize,
        total: usize,
        failures: Vec<DispatchError<E>>,
    },
}

impl<E> DispatchError<E> {
    /// Index of the failing job (the lowest one if several failed)
    pub fn index(&self) -> usize {
        match self {
            DispatchError::Failed { index, .. } => *index,
            DispatchError::Panicked { index, .. } => *index,
            DispatchError::Multiple { first, .. } => *first,
        }
    }

    /// Indices of every failing job in ascending order
    pub fn failed_indices(&self) -> Vec<usize> {
        match self {
            DispatchError::Multiple { failures, .. } => {
                failures.iter().map(DispatchError::index).collect()
            }
            _ => vec![self.index()],
        }
    }

    /// Flatten into the individual job failures
    pub fn into_failures(self) -> Vec<DispatchError<E>> {
        match self {
            DispatchError::Multiple { failures, .. } => failures,
            other => vec![other],
        }
    }

    fn from_failures(mut failures: Vec<DispatchError<E>>, total: usize) -> Self {
        if failures.len() == 1 {
            return failures.remove(0);
        }
        DispatchError::Multiple {
            failed: failures.len(),
            first: failures[0].index(),
            total,
            failures,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn run_job<J, R, E, F>(
    worker: &F,
    job: &J,
    index: usize,
    section: Section,
) -> Result<R, DispatchError<E>>
where
    F: Fn(&J) -> Result<R, E>,
{
    let started = Instant::now();
    debug!(index, %section, "starting job");

    let outcome = catch_unwind(AssertUnwindSafe(|| worker(job)));
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(result)) => {
            debug!(index, %section, elapsed_ms, "job finished");
            Ok(result)
        }
        Ok(Err(source)) => Err(DispatchError::Failed {
            index,
            section,
            source,
        }),
        Err(payload) => Err(DispatchError::Panicked {
            index,
            section,
            message: panic_message(payload),
        }),
    }
}

/// Run a contiguous slice of the job list on `pool` and wait for all of it.
///
/// Outcomes are in job order, `first` is the index of `jobs[0]` in the full list.
fn run_section<J, R, E, F>(
    jobs: &[J],
    first: usize,
    section: Section,
    worker: &F,
    pool: &ThreadPool,
) -> Vec<Result<R, DispatchError<E>>>
where
    J: Sync,
    R: Send,
    E: Send,
    F: Fn(&J) -> Result<R, E> + Sync,
{
    pool.install(|| {
        jobs.par_iter()
            .enumerate()
            .map(|(offset, job)| run_job(worker, job, first + offset, section))
            .collect()
    })
}

/// Run `worker` over every job and return the results in job order.
///
/// The worker must not rely on state shared between invocations.
/// Jobs in the parallel front and the bulk may run concurrently on any thread of `pool`.
///
/// # Errors
///
/// * A failing (or panicking) job in the serial front is returned as soon as it
///   happens; later jobs are not run.
/// * A failing job in the parallel front is returned once the front batch has
///   finished; the bulk is not run.
/// * Failing bulk jobs are collected once the whole bulk section has finished.
///   A single failure is returned as is, several are wrapped in
///   [`DispatchError::Multiple`].
///
/// # Example
///
/// ```
/// use ensmip_core::dispatch::{dispatch, DispatchOptions};
///
/// let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
/// let jobs = vec![1, 2, 3, 4, 5];
/// let squares = dispatch(
///     &jobs,
///     |x: &i32| Ok::<_, std::io::Error>(x * x),
///     &pool,
///     DispatchOptions::new(1, 1),
/// )
/// .unwrap();
/// assert_eq!(squares, vec![1, 4, 9, 16, 25]);
/// ```
pub fn dispatch<J, R, E, F>(
    jobs: &[J],
    worker: F,
    pool: &ThreadPool,
    options: DispatchOptions,
) -> Result<Vec<R>, DispatchError<E>>
where
    J: Sync,
    R: Send,
    E: Send + fmt::Display,
    F: Fn(&J) -> Result<R, E> + Sync,
{
    if jobs.is_empty() {
        return Ok(vec![]);
    }

    let partition = options.partition(jobs.len());
    info!(
        total = jobs.len(),
        serial = partition.serial,
        parallel = partition.parallel,
        bulk = partition.bulk,
        workers = pool.current_num_threads(),
        "dispatching ensemble"
    );

    let mut results = Vec::with_capacity(jobs.len());

    for (index, job) in jobs.iter().enumerate().take(partition.serial) {
        results.push(run_job(&worker, job, index, Section::Serial)?);
    }

    let bulk_start = partition.serial + partition.parallel;
    if partition.parallel > 0 {
        let front = run_section(
            &jobs[partition.serial..bulk_start],
            partition.serial,
            Section::Parallel,
            &worker,
            pool,
        );
        for outcome in front {
            results.push(outcome?);
        }
    }

    if partition.bulk == 0 {
        return Ok(results);
    }

    let outcomes = run_section(&jobs[bulk_start..], bulk_start, Section::Bulk, &worker, pool);

    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(result) => results.push(result),
            Err(err) => {
                warn!(index = err.index(), error = %err, "job failed");
                failures.push(err);
            }
        }
    }

    if failures.is_empty() {
        info!(total = jobs.len(), "ensemble finished");
        Ok(results)
    } else {
        Err(DispatchError::from_failures(failures, jobs.len()))
    }
}
