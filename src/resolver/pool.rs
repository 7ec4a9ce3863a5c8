//! Fixed-size pool of extraction worker threads.
//!
//! Tag parsing and image resampling are blocking and CPU-bound, so they
//! run on dedicated OS threads instead of the async runtime. The pool
//! size is fixed at startup; submissions beyond capacity queue in the
//! channel until a worker frees up.

use crossbeam_channel::{Receiver, Sender};
use std::panic::AssertUnwindSafe;
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the worker threads; dropping it drains and stops them.
pub struct WorkerPool {
    tx: Sender<Job>,
}

impl WorkerPool {
    /// Spawn `workers` threads (at least one).
    pub fn new(workers: usize) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        for n in 0..workers.max(1) {
            let rx: Receiver<Job> = rx.clone();
            std::thread::Builder::new()
                .name(format!("resolve-{n}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        // A panicking job must not shrink the pool
                        if std::panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!(target: "resolver", worker = n, "extraction job panicked");
                        }
                    }
                    debug!(target: "resolver", worker = n, "worker stopped");
                })?;
        }
        Ok(Self { tx })
    }

    /// Queue a unit of work.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        // Fails only once every worker is gone, i.e. during shutdown
        let _ = self.tx.send(Box::new(job));
    }
}
