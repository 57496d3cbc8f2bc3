//! Fixed-size worker pool.
//!
//! Long-lived threads drain a FIFO of boxed jobs. Queue delivery does the
//! wakeup signalling (a blocked `recv` is the wait, a `send` the signal);
//! the pending/active counters live under their own lock so a caller in
//! [`WorkerPool::wait`] never serializes against an enqueue. Jobs own their
//! payloads outright — a message buffer is reachable from exactly one place
//! at any instant: the framing loop, the queue, or the worker running the
//! callback.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct PoolState {
    /// Jobs enqueued but not yet drawn by a worker.
    pending: usize,
    /// Jobs currently executing.
    active: usize,
    /// Workers that have started their loop.
    alive: usize,
}

struct PoolShared {
    state: Mutex<PoolState>,
    no_work: Condvar,
    alive_cv: Condvar,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to a pool of worker threads. Clones share the same pool; dropping
/// every handle disconnects the queue and the workers run down on their own.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    tx: Sender<Job>,
}

impl Clone for WorkerPool {
    fn clone(&self) -> Self {
        WorkerPool {
            shared: Arc::clone(&self.shared),
            tx: self.tx.clone(),
        }
    }
}

fn worker_loop(shared: Arc<PoolShared>, rx: Receiver<Job>) {
    {
        let mut state = shared.state.lock().unwrap();
        state.alive += 1;
        shared.alive_cv.notify_all();
    }

    while let Ok(job) = rx.recv() {
        {
            let mut state = shared.state.lock().unwrap();
            state.pending -= 1;
            state.active += 1;
        }

        job();

        let mut state = shared.state.lock().unwrap();
        state.active -= 1;
        if state.active == 0 && state.pending == 0 {
            shared.no_work.notify_all();
        }
    }
}

impl WorkerPool {
    /// Spawn `count` workers. Does not return until every worker has entered
    /// its loop.
    pub fn new(count: usize) -> Self {
        let count = count.max(1);
        let (tx, rx) = unbounded::<Job>();
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState::default()),
            no_work: Condvar::new(),
            alive_cv: Condvar::new(),
            handles: Mutex::new(Vec::with_capacity(count)),
        });

        {
            let mut handles = shared.handles.lock().unwrap();
            for _ in 0..count {
                let shared = Arc::clone(&shared);
                let rx = rx.clone();
                handles.push(thread::spawn(move || worker_loop(shared, rx)));
            }
        }

        let mut state = shared.state.lock().unwrap();
        while state.alive != count {
            state = shared.alive_cv.wait(state).unwrap();
        }
        drop(state);

        WorkerPool { shared, tx }
    }

    /// Queue a job. Never blocks.
    pub fn enqueue<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.state.lock().unwrap().pending += 1;
        if self.tx.send(Box::new(job)).is_err() {
            // Workers already ran down; the job is dropped.
            self.shared.state.lock().unwrap().pending -= 1;
        }
    }

    /// Block until the queue is empty and no worker is executing a callback.
    pub fn wait(&self) {
        let mut state = self.shared.state.lock().unwrap();
        while state.pending > 0 || state.active > 0 {
            state = self.shared.no_work.wait(state).unwrap();
        }
    }

    /// Wait for quiescence, then shut the workers down and join them.
    ///
    /// The caller must be the last live handle; clones captured by jobs are
    /// gone once `wait` returns.
    pub fn release(self) {
        self.wait();
        let WorkerPool { shared, tx } = self;
        drop(tx);
        let handles: Vec<JoinHandle<()>> = shared.handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }
}
