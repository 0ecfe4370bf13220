/// Task runner — cancellable background jobs with a polled message channel.
///
/// Both long-running operations (the scan+classify job and the action job)
/// share this machinery: the job runs on its own named worker thread and
/// streams [`TaskMessage`]s through a bounded crossbeam channel; the owner
/// polls the [`TaskHandle`] at a short fixed interval (~100 ms) and never
/// blocks on the worker. Cancellation is cooperative — the job checks the
/// flag between units of work; in-flight filesystem or database calls run
/// to completion.
///
/// Exactly one `Result` message is emitted per task, always last. It is the
/// terminal sentinel: once drained, no further messages arrive.
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::errors::ErrorKind;

/// Maximum number of messages that may queue up in the channel.
///
/// The owner drains the channel every ~100 ms. A job emits at most a
/// handful of messages per directory, so this gives minutes of headroom;
/// if the owner stops polling the worker stalls on `send` rather than
/// consuming unbounded heap.
pub const MESSAGE_CHANNEL_CAPACITY: usize = 1_024;

/// One message from a background job to its owner.
#[derive(Debug)]
pub enum TaskMessage<T> {
    /// Human-readable status line, ordered with the work it describes.
    Progress(String),
    /// A failure that was reported and skipped (or, for
    /// [`ErrorKind::ProviderUnavailable`], one that aborted classification).
    Error { kind: ErrorKind, message: String },
    /// Terminal message carrying the job's output. Emitted exactly once,
    /// always last — even when the job was cancelled early.
    Result(T),
}

/// Job-side view of a running task: message sink plus cancellation flag.
pub struct TaskContext<T> {
    tx: Sender<TaskMessage<T>>,
    cancel_flag: Arc<AtomicBool>,
}

impl<T> TaskContext<T> {
    /// Send a progress line. Errors are ignored — a vanished receiver just
    /// means nobody is listening any more.
    pub fn progress(&self, message: impl Into<String>) {
        let _ = self.tx.send(TaskMessage::Progress(message.into()));
    }

    /// Report a non-fatal (or classification-fatal) failure.
    pub fn error(&self, kind: ErrorKind, message: impl Into<String>) {
        let _ = self.tx.send(TaskMessage::Error {
            kind,
            message: message.into(),
        });
    }

    /// Check whether cancellation has been requested. Jobs call this once
    /// per unit of work (one directory, one action item).
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Request cancellation from the job-owning side. Only meaningful for
    /// detached contexts, where there is no [`TaskHandle`] to cancel
    /// through.
    pub fn request_cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Build a context with no worker thread attached, returning the
    /// receiving end alongside it. Used to run a job synchronously on the
    /// current thread (and throughout the test suites). The channel is
    /// unbounded so a synchronous job can never stall on its own messages.
    pub fn detached() -> (Self, Receiver<TaskMessage<T>>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Self {
                tx,
                cancel_flag: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }
}

/// Handle to a running or completed task. Allows cancellation and
/// non-blocking polling for messages.
pub struct TaskHandle<T> {
    rx: Receiver<TaskMessage<T>>,
    cancel_flag: Arc<AtomicBool>,
    _thread: Option<thread::JoinHandle<()>>,
}

impl<T> TaskHandle<T> {
    /// Request the job to stop at its next per-item boundary.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Drain whatever messages are currently available, without blocking.
    pub fn poll(&self) -> Vec<TaskMessage<T>> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Whether the worker thread has exited. A `true` here with an empty
    /// [`poll`](Self::poll) means no further messages will ever arrive.
    pub fn is_finished(&self) -> bool {
        self._thread.as_ref().map_or(true, |t| t.is_finished())
    }
}

/// Start a job on a background worker thread.
///
/// The job's return value becomes the terminal [`TaskMessage::Result`];
/// the runner sends it, not the job, so exactly one terminal message is
/// guaranteed on every path out of the job.
pub fn spawn<T, F>(name: &str, job: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&TaskContext<T>) -> T + Send + 'static,
{
    spawn_with_capacity(name, MESSAGE_CHANNEL_CAPACITY, job)
}

/// [`spawn`] with an explicit channel capacity.
///
/// Capacity 0 gives a rendezvous channel where every message send blocks
/// until the owner receives it — useful when the owner must stay in
/// lockstep with the worker.
pub fn spawn_with_capacity<T, F>(name: &str, capacity: usize, job: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&TaskContext<T>) -> T + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let ctx = TaskContext {
        tx: tx.clone(),
        cancel_flag: cancel_flag.clone(),
    };

    let thread = thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            let result = job(&ctx);
            let _ = tx.send(TaskMessage::Result(result));
        })
        .expect("failed to spawn worker thread");

    TaskHandle {
        rx,
        cancel_flag,
        _thread: Some(thread),
    }
}
