//! Reentrancy Protection Module
//!
//! Event handlers never run on the stack of the mutation that triggered
//! them. A protector takes each dispatch as a task and runs it later, so a
//! handler that writes to the hoard cannot re-enter an emission in progress.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use tokio::runtime::Handle;
use tokio::sync::mpsc as async_mpsc;
use tracing::{debug, error, warn};

/// A deferred unit of work, typically one handler invocation.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

// == Protector Trait ==
pub trait ReentrancyProtector: Send + Sync {
    /// Schedules `task` to run outside the caller's stack.
    fn protect(&self, task: Task);
}

/// Runs a task, logging instead of unwinding if it panics.
fn run_guarded(task: Task) {
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        error!("Hoard event handler panicked");
    }
}

// == Immediate Protector ==
/// Runs every task synchronously. Offers no protection; meant for tests
/// that want handlers to fire before the mutating call returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateProtector;

impl ReentrancyProtector for ImmediateProtector {
    fn protect(&self, task: Task) {
        task();
    }
}

// == Deferred Queue ==
/// FIFO task queue pumped explicitly by its owner.
///
/// Suits hosts with their own event loop: post from anywhere, then call
/// [`DeferredQueue::run_pending`] once per turn.
#[derive(Default)]
pub struct DeferredQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs queued tasks until the queue is empty, including tasks queued
    /// by the tasks being run. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // The guard drops with this statement so tasks can post more.
            let next = self.lock().pop_front();
            let Some(task) = next else {
                return ran;
            };
            run_guarded(task);
            ran += 1;
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

impl ReentrancyProtector for DeferredQueue {
    fn protect(&self, task: Task) {
        self.lock().push_back(task);
    }
}

// == Dispatch Thread ==
/// Runs tasks in order on a dedicated background thread.
///
/// The thread exits once the protector is dropped and the queue drains.
#[derive(Debug)]
pub struct DispatchThread {
    sender: mpsc::Sender<Task>,
}

impl DispatchThread {
    pub fn spawn() -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Task>();

        thread::Builder::new()
            .name("hoard-events".to_string())
            .spawn(move || {
                debug!("Hoard event dispatch thread started");
                for task in receiver {
                    run_guarded(task);
                }
                debug!("Hoard event dispatch thread stopped");
            })?;

        Ok(Self { sender })
    }
}

impl ReentrancyProtector for DispatchThread {
    fn protect(&self, task: Task) {
        if self.sender.send(task).is_err() {
            warn!("Hoard event dispatch thread is gone; dropping event");
        }
    }
}

// == Tokio Protector ==
/// Runs tasks in order on a task of the given tokio runtime.
#[derive(Debug)]
pub struct TokioProtector {
    sender: async_mpsc::UnboundedSender<Task>,
}

impl TokioProtector {
    pub fn spawn(handle: &Handle) -> Self {
        let (sender, mut receiver) = async_mpsc::unbounded_channel::<Task>();

        handle.spawn(async move {
            while let Some(task) = receiver.recv().await {
                run_guarded(task);
            }
        });

        Self { sender }
    }
}

impl ReentrancyProtector for TokioProtector {
    fn protect(&self, task: Task) {
        if self.sender.send(task).is_err() {
            warn!("Hoard event dispatch task is gone; dropping event");
        }
    }
}
