//! Fan-out / fan-in pipeline behind [`Shortener::delete_batch_async`].
//!
//! A producer turns `(owner, code)` pairs into tasks on a channel shared by
//! a fixed pool of workers. Each worker converts tasks into
//! [`DeleteEntry`] values on its own output channel, and one forwarder per
//! worker merges those into a single channel. The caller drains it and
//! issues exactly one [`Repository::delete_batch`].
//!
//! All stages watch a shared done signal, closed when the orchestrating
//! call returns (or is dropped), so no stage stays parked on a send that
//! nobody will read.
//!
//! [`Shortener::delete_batch_async`]: crate::Shortener::delete_batch_async

use burrow_core::{DeleteEntry, Repository, ShortCode};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};
use typed_builder::TypedBuilder;

/// Number of worker stages in the default pipeline.
pub const WORKERS: usize = 10;

/// Channels between stages hold at most one item, so every stage hands
/// work over instead of queueing it.
const STAGE_CAPACITY: usize = 1;

#[derive(Debug)]
struct DeleteTask {
    owner: String,
    code: ShortCode,
}

type TaskQueue = Arc<Mutex<mpsc::Receiver<DeleteTask>>>;

/// Owning side of the done signal. Dropping it closes the signal.
#[derive(Debug)]
struct DoneSignal {
    tx: watch::Sender<()>,
}

impl DoneSignal {
    fn new() -> Self {
        let (tx, _) = watch::channel(());
        Self { tx }
    }

    fn subscribe(&self) -> Done {
        Done {
            rx: self.tx.subscribe(),
        }
    }

    fn close(self) {}
}

#[derive(Debug, Clone)]
struct Done {
    rx: watch::Receiver<()>,
}

impl Done {
    /// Resolves once the signal is closed. Nothing is ever sent on it, so
    /// this only returns when the [`DoneSignal`] is gone.
    async fn closed(&mut self) {
        while self.rx.changed().await.is_ok() {}
    }
}

/// Configuration of the deletion pipeline.
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct DeletionPipeline {
    /// Size of the worker pool; at least one.
    #[builder(default = WORKERS, setter(transform = |workers: usize| workers.max(1)))]
    workers: usize,
}

impl Default for DeletionPipeline {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DeletionPipeline {
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs the stages for `codes` and returns the merged delete entries.
    ///
    /// Entries come back in no particular order, one per input code.
    pub async fn collect(&self, owner: &str, codes: Vec<ShortCode>) -> Vec<DeleteEntry> {
        let done = DoneSignal::new();

        let tasks = produce(done.subscribe(), owner.to_owned(), codes);
        let queue: TaskQueue = Arc::new(Mutex::new(tasks));
        let outputs = (0..self.workers)
            .map(|_| transform(done.subscribe(), Arc::clone(&queue)))
            .collect();
        let mut merged = merge(done.subscribe(), outputs);

        let mut entries = Vec::new();
        while let Some(entry) = merged.recv().await {
            entries.push(entry);
        }

        done.close();
        entries
    }

    /// Collects delete entries and hands them to `repository` in one call.
    ///
    /// A failing `delete_batch` is logged and dropped.
    pub async fn run<R>(&self, repository: &R, owner: &str, codes: Vec<ShortCode>)
    where
        R: Repository + ?Sized,
    {
        let requested = codes.len();
        let entries = self.collect(owner, codes).await;
        if entries.is_empty() {
            debug!(owner, "no codes to delete");
            return;
        }

        let count = entries.len();
        if count != requested {
            warn!(owner, requested, count, "deletion pipeline lost entries");
        }

        match repository.delete_batch(entries).await {
            Ok(()) => debug!(
                owner,
                count,
                backend = repository.backend_name(),
                "soft delete batch applied"
            ),
            Err(err) => error!(
                owner,
                count,
                backend = repository.backend_name(),
                error = %err,
                "soft delete batch failed"
            ),
        }
    }
}

fn produce(mut done: Done, owner: String, codes: Vec<ShortCode>) -> mpsc::Receiver<DeleteTask> {
    let (tx, rx) = mpsc::channel(STAGE_CAPACITY);

    tokio::spawn(async move {
        for code in codes {
            let task = DeleteTask {
                owner: owner.clone(),
                code,
            };
            tokio::select! {
                biased;
                _ = done.closed() => return,
                sent = tx.send(task) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    });

    rx
}

async fn next_task(queue: &TaskQueue) -> Option<DeleteTask> {
    queue.lock().await.recv().await
}

fn transform(mut done: Done, queue: TaskQueue) -> mpsc::Receiver<DeleteEntry> {
    let (tx, rx) = mpsc::channel(STAGE_CAPACITY);

    tokio::spawn(async move {
        loop {
            let task = tokio::select! {
                biased;
                _ = done.closed() => return,
                task = next_task(&queue) => task,
            };
            let Some(task) = task else {
                return;
            };

            let entry = DeleteEntry::new(task.code, task.owner);
            tokio::select! {
                biased;
                _ = done.closed() => return,
                sent = tx.send(entry) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    });

    rx
}

fn merge(done: Done, outputs: Vec<mpsc::Receiver<DeleteEntry>>) -> mpsc::Receiver<DeleteEntry> {
    let (tx, rx) = mpsc::channel(STAGE_CAPACITY);
    let mut forwarders = JoinSet::new();

    for mut output in outputs {
        let tx = tx.clone();
        let mut done = done.clone();
        forwarders.spawn(async move {
            while let Some(entry) = output.recv().await {
                tokio::select! {
                    biased;
                    _ = done.closed() => return,
                    sent = tx.send(entry) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
        });
    }

    // the merged channel stays open until every forwarder has finished
    tokio::spawn(async move {
        while let Some(joined) = forwarders.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "delete forwarder stopped abnormally");
            }
        }
        drop(tx);
    });

    rx
}
