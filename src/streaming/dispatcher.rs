//! Main-thread dispatch of worker continuations
//!
//! Generation workers never touch tile sets directly. They enqueue a
//! continuation here, and the owning thread runs queued continuations in
//! FIFO order when it calls [`MainThreadDispatcher::run_pending`].

use std::thread::{self, ThreadId};

use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Cloneable producer side of a [`MainThreadDispatcher`], safe to move into workers
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl DispatchHandle {
    /// Queue a job for the owning thread
    ///
    /// Returns `false` if the dispatcher has been dropped.
    pub fn enqueue<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Box::new(job)).is_ok()
    }
}

/// FIFO queue of jobs that must run on a single owning thread
pub struct MainThreadDispatcher {
    tx: mpsc::UnboundedSender<Job>,
    rx: mpsc::UnboundedReceiver<Job>,
    owner: ThreadId,
}

impl MainThreadDispatcher {
    /// Create a dispatcher owned by the calling thread
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            owner: thread::current().id(),
        }
    }

    /// Producer handle for worker threads
    pub fn handle(&self) -> DispatchHandle {
        DispatchHandle { tx: self.tx.clone() }
    }

    /// Queue a job from any thread
    pub fn enqueue<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Cannot fail: this dispatcher holds the receiver
        let _ = self.tx.send(Box::new(job));
    }

    /// Run every queued job on the calling (owning) thread
    ///
    /// Returns the number of jobs run.
    pub fn run_pending(&mut self) -> usize {
        self.assert_owner();

        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Block until at least one job arrives, then run it and anything else queued
    ///
    /// Must not be called from inside an async runtime.
    pub fn block_on_next(&mut self) -> usize {
        self.assert_owner();

        match self.rx.blocking_recv() {
            Some(job) => {
                job();
                1 + self.run_pending()
            }
            None => 0,
        }
    }

    /// Thread allowed to run jobs
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    #[inline]
    fn assert_owner(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "dispatcher jobs must run on the owning thread"
        );
    }
}

impl Default for MainThreadDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
