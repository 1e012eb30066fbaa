//! A bounded thread pool with typed task batches.
//!
//! Work is submitted to named batches and joined per batch. A thread joining
//! a batch does not simply block: while tasks of that batch are still queued
//! it pops and executes them itself, so tasks may recursively create and join
//! child batches without deadlocking even on a single-worker pool.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Identifier of a task batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(u64);

struct State {
    queue: VecDeque<(BatchId, Task)>,
    // queued plus running tasks per open batch
    pending: HashMap<BatchId, usize>,
    next_batch: u64,
    shutdown: bool,
}

struct Inner {
    state: Mutex<State>,
    work: Condvar,
    done: Condvar,
}

/// A pool of worker threads executing batched tasks.
pub struct ThreadPool {
    inner: Arc<Inner>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Create a pool sized to the available parallelism.
    pub fn new() -> ThreadPool {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        ThreadPool::with_workers(workers)
    }

    /// Create a pool with an explicit worker count.
    ///
    /// # Panics
    /// Panics if `workers` is zero.
    pub fn with_workers(workers: usize) -> ThreadPool {
        assert!(workers > 0, "a pool needs at least one worker");
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                pending: HashMap::new(),
                next_batch: 0,
                shutdown: false,
            }),
            work: Condvar::new(),
            done: Condvar::new(),
        });
        let handles = (0..workers)
            .map(|_| {
                let inner = Arc::clone(&inner);
                std::thread::spawn(move || worker_loop(&inner))
            })
            .collect();
        ThreadPool {
            inner,
            workers: handles,
        }
    }

    /// Open a new, empty batch.
    pub fn create_batch(&self) -> BatchId {
        let mut state = self.inner.state.lock().unwrap();
        let id = BatchId(state.next_batch);
        state.next_batch += 1;
        state.pending.insert(id, 0);
        id
    }

    /// Queue a task on a batch.
    pub fn submit_to_batch<F>(&self, batch: BatchId, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.state.lock().unwrap();
        *state.pending.entry(batch).or_insert(0) += 1;
        state.queue.push_back((batch, Box::new(task)));
        self.inner.work.notify_one();
        // a thread joining this batch may be able to help
        self.inner.done.notify_all();
    }

    /// Wait until every task of the batch has completed, executing queued
    /// tasks of the batch on the calling thread whenever some are available.
    pub fn join(&self, batch: BatchId) {
        let mut state = self.inner.state.lock().unwrap();
        loop {
            match state.pending.get(&batch) {
                None | Some(0) => return,
                Some(_) => {}
            }
            if let Some(pos) = state.queue.iter().position(|(b, _)| *b == batch) {
                let (_, task) = state.queue.remove(pos).unwrap();
                drop(state);
                task();
                finish_task(&self.inner, batch);
                state = self.inner.state.lock().unwrap();
            } else {
                state = self.inner.done.wait(state).unwrap();
            }
        }
    }

    /// Discard the bookkeeping of a batch. Call after [`join`].
    ///
    /// [`join`]: ./struct.ThreadPool.html#method.join
    pub fn close_batch(&self, batch: BatchId) {
        self.inner.state.lock().unwrap().pending.remove(&batch);
    }
}

impl Default for ThreadPool {
    fn default() -> ThreadPool {
        ThreadPool::new()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.inner.state.lock().unwrap().shutdown = true;
        self.inner.work.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(inner: &Inner) {
    loop {
        let (batch, task) = {
            let mut state = inner.state.lock().unwrap();
            loop {
                if let Some(entry) = state.queue.pop_front() {
                    break entry;
                }
                if state.shutdown {
                    return;
                }
                state = inner.work.wait(state).unwrap();
            }
        };
        task();
        finish_task(inner, batch);
    }
}

fn finish_task(inner: &Inner, batch: BatchId) {
    let mut state = inner.state.lock().unwrap();
    if let Some(count) = state.pending.get_mut(&batch) {
        *count -= 1;
        if *count == 0 {
            inner.done.notify_all();
        }
    }
}
