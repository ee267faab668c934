//! Thread pool for independent jobs (self-play episodes, arena games).
//!
//! Jobs are striped across scoped worker threads: worker `w` runs jobs
//! `w, w + n, w + 2n, ...`. Results travel over a bounded channel. A worker
//! announces completion with a `Done` message; results of a worker that
//! panics or disappears without `Done` are discarded rather than waited on.

use anyhow::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::thread;
use tracing::{debug, warn};

enum Message<T> {
    Item { worker: usize, job: usize, item: T },
    Failed { worker: usize, job: usize, error: Error },
    Done(usize),
}

/// Results of one pool run.
#[derive(Debug)]
pub struct PoolOutcome<T> {
    /// Committed results in job order.
    pub items: Vec<(usize, T)>,
    /// Workers that ended without reporting completion.
    pub lost_workers: Vec<usize>,
    /// Results received from lost workers and dropped.
    pub discarded: usize,
    /// True when the run stopped early on the cancel flag.
    pub cancelled: bool,
}

/// Derive an independent seed for job `index` from a base seed (splitmix64).
///
/// Seeds depend only on the base and the index, never on which worker runs
/// the job, so parallel runs reproduce sequential ones.
pub fn job_seed(base: u64, index: u64) -> u64 {
    let mut z = base.wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Worker count after accounting for device-bound evaluators, which must
/// stay on a single thread.
pub fn effective_workers(requested: usize, device_bound: bool) -> usize {
    if device_bound {
        1
    } else {
        requested.max(1)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `jobs` jobs and collect their results.
    ///
    /// `on_item` is called on the collecting thread as each result arrives.
    /// The first job error stops the remaining workers and is returned.
    pub fn run<T, F, P>(
        &self,
        jobs: usize,
        cancel: &AtomicBool,
        job: F,
        mut on_item: P,
    ) -> Result<PoolOutcome<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync,
        P: FnMut(&T),
    {
        let workers = self.workers.min(jobs.max(1));
        let abort = AtomicBool::new(false);
        let (tx, rx) = sync_channel::<Message<T>>(workers * 2);

        let mut pending: Vec<Vec<(usize, T)>> = (0..workers).map(|_| Vec::new()).collect();
        let mut finished = vec![false; workers];
        let mut committed = Vec::with_capacity(jobs);
        let mut first_error: Option<Error> = None;

        let panicked = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let tx: SyncSender<Message<T>> = tx.clone();
                    let job = &job;
                    let abort = &abort;
                    scope.spawn(move || {
                        for index in (worker..jobs).step_by(workers) {
                            if cancel.load(Ordering::Relaxed) || abort.load(Ordering::Relaxed) {
                                break;
                            }
                            let message = match job(index) {
                                Ok(item) => Message::Item {
                                    worker,
                                    job: index,
                                    item,
                                },
                                Err(error) => Message::Failed {
                                    worker,
                                    job: index,
                                    error,
                                },
                            };
                            let failed = matches!(message, Message::Failed { .. });
                            if tx.send(message).is_err() || failed {
                                break;
                            }
                        }
                        let _ = tx.send(Message::Done(worker));
                    })
                })
                .collect();
            drop(tx);

            // The channel closes once every worker has exited.
            for message in rx.iter() {
                match message {
                    Message::Item { worker, job, item } => {
                        on_item(&item);
                        pending[worker].push((job, item));
                    }
                    Message::Failed { worker, job, error } => {
                        warn!(worker, job, error = %error, "Job failed, stopping pool");
                        abort.store(true, Ordering::Relaxed);
                        if first_error.is_none() {
                            first_error = Some(error);
                        }
                    }
                    Message::Done(worker) => {
                        finished[worker] = true;
                        committed.append(&mut pending[worker]);
                        debug!(worker, "Worker finished");
                    }
                }
            }

            handles
                .into_iter()
                .enumerate()
                .filter_map(|(worker, handle)| handle.join().is_err().then_some(worker))
                .collect::<Vec<_>>()
        });

        if let Some(error) = first_error {
            return Err(error);
        }

        let mut lost_workers = Vec::new();
        let mut discarded = 0;
        for worker in 0..workers {
            if !finished[worker] || panicked.contains(&worker) {
                discarded += pending[worker].len();
                lost_workers.push(worker);
            }
        }
        if !lost_workers.is_empty() {
            warn!(
                lost_workers = ?lost_workers,
                discarded, "Discarded results of lost workers"
            );
        }

        committed.sort_by_key(|(job, _)| *job);
        Ok(PoolOutcome {
            items: committed,
            lost_workers,
            discarded,
            cancelled: cancel.load(Ordering::Relaxed),
        })
    }
}

/// Progress bar for a batch of jobs, only when stderr is a terminal.
pub fn progress_bar(len: u64, unit: &str) -> Option<ProgressBar> {
    if !std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        return None;
    }
    let pb = ProgressBar::new(len);
    let template = format!("{{spinner:.green}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit} ({{eta}})");
    match ProgressStyle::default_bar().template(&template) {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => debug!(error = %e, "Progress template rejected, using default style"),
    }
    Some(pb)
}
