//! Asynchronous document processing with a bounded worker pool.
//!
//! [`AsyncDocumentProcessor`] owns a pool of worker tasks consuming from a
//! shared queue. Each document is chunked and its chunks are processed
//! concurrently under a per-document concurrency limit; chunk failures are
//! isolated and counted rather than failing the document. Waiters are woken
//! through a [`Notify`] whenever any task reaches a terminal state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tessera_chunk::{ChunkMetadata, OptimizedChunker};

use super::chunk_processor::{ChunkProcessor, TextStatsProcessor};
use super::task::{ChunkOutcome, DocumentResult, ProcessingTask, TaskStatus};

/// Worker pool and batching configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Number of concurrent document workers.
    pub max_workers: usize,
    /// Documents larger than this many bytes are routed to the queue by
    /// [`AsyncDocumentProcessor::ingest`]; the rest are chunked inline.
    pub large_doc_threshold: usize,
    /// Upper bound on concurrent chunk processing within one document. The
    /// effective limit is the smaller of this and the chunk count.
    pub chunk_concurrency: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            large_doc_threshold: 50_000,
            chunk_concurrency: 4,
        }
    }
}

impl ProcessorConfig {
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_large_doc_threshold(mut self, threshold: usize) -> Self {
        self.large_doc_threshold = threshold;
        self
    }

    pub fn with_chunk_concurrency(mut self, concurrency: usize) -> Self {
        self.chunk_concurrency = concurrency;
        self
    }
}

/// Counts of tasks by state plus current queue depth.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingStats {
    pub total_tasks: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub queue_depth: usize,
    pub workers: usize,
    pub large_doc_threshold: usize,
    /// Mean wall-clock processing time of completed tasks, in milliseconds.
    pub avg_processing_time_ms: f64,
}

/// How [`AsyncDocumentProcessor::ingest`] handled a document.
#[derive(Debug)]
pub enum IngestOutcome {
    /// The document was small enough to chunk synchronously.
    Inline(Vec<String>, ChunkMetadata),
    /// The document was queued; poll or wait on this task id.
    Queued(String),
}

type TaskMap = Arc<Mutex<HashMap<String, ProcessingTask>>>;

/// Callback invoked with a task snapshot when the task reaches a terminal
/// state. Runs on a worker, so it must not block.
pub type TaskCallback = Box<dyn Fn(&ProcessingTask) + Send + Sync>;

type CallbackMap = Arc<Mutex<HashMap<String, TaskCallback>>>;

/// Shared state each worker needs to process documents.
struct WorkerContext {
    chunker: Arc<OptimizedChunker>,
    chunk_processor: Arc<dyn ChunkProcessor>,
    tasks: TaskMap,
    callbacks: CallbackMap,
    completion: Arc<Notify>,
    chunk_concurrency: usize,
}

/// Queue-backed document processor with progress tracking and cancellation.
pub struct AsyncDocumentProcessor {
    config: ProcessorConfig,
    chunker: Arc<OptimizedChunker>,
    chunk_processor: Arc<dyn ChunkProcessor>,
    tasks: TaskMap,
    callbacks: CallbackMap,
    completion: Arc<Notify>,
    /// `None` once shut down; submissions are rejected from then on.
    task_tx: Option<flume::Sender<String>>,
    task_rx: flume::Receiver<String>,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl AsyncDocumentProcessor {
    /// Create a processor with the default per-chunk text statistics.
    pub fn new(config: ProcessorConfig) -> Self {
        Self::with_chunk_processor(config, Arc::new(TextStatsProcessor))
    }

    /// Create a processor that applies `chunk_processor` to every chunk.
    pub fn with_chunk_processor(
        config: ProcessorConfig,
        chunk_processor: Arc<dyn ChunkProcessor>,
    ) -> Self {
        let (task_tx, task_rx) = flume::unbounded();
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            chunker: Arc::new(OptimizedChunker::new()),
            chunk_processor,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            callbacks: Arc::new(Mutex::new(HashMap::new())),
            completion: Arc::new(Notify::new()),
            task_tx: Some(task_tx),
            task_rx,
            shutdown_tx,
            workers: Vec::new(),
        }
    }

    /// Spawn the worker pool. Submissions made before `start` are queued and
    /// picked up as soon as workers come online.
    pub fn start(&mut self) {
        if !self.workers.is_empty() {
            return;
        }
        info!(workers = self.config.max_workers, "starting document workers");
        for worker_id in 0..self.config.max_workers {
            let context = WorkerContext {
                chunker: Arc::clone(&self.chunker),
                chunk_processor: Arc::clone(&self.chunk_processor),
                tasks: Arc::clone(&self.tasks),
                callbacks: Arc::clone(&self.callbacks),
                completion: Arc::clone(&self.completion),
                chunk_concurrency: self.config.chunk_concurrency,
            };
            let receiver = self.task_rx.clone();
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            self.workers.push(tokio::spawn(async move {
                debug!(worker_id, "worker started");
                loop {
                    tokio::select! {
                        received = receiver.recv_async() => match received {
                            Ok(task_id) => context.process_document(&task_id).await,
                            Err(_) => break,
                        },
                        _ = shutdown_rx.changed() => break,
                    }
                }
                debug!(worker_id, "worker stopped");
            }));
        }
    }

    /// Queue a document for processing and return its task id.
    pub fn submit_document(
        &self,
        content: String,
        filename: Option<String>,
        metadata: Value,
    ) -> Result<String> {
        self.submit_inner(content, filename, metadata, None)
    }

    /// Queue a document and register a callback fired with a task snapshot
    /// when the task reaches a terminal state. The registration lives until
    /// [`Self::cleanup_completed_tasks`] removes the task.
    pub fn submit_document_with_callback(
        &self,
        content: String,
        filename: Option<String>,
        metadata: Value,
        callback: TaskCallback,
    ) -> Result<String> {
        self.submit_inner(content, filename, metadata, Some(callback))
    }

    fn submit_inner(
        &self,
        content: String,
        filename: Option<String>,
        metadata: Value,
        callback: Option<TaskCallback>,
    ) -> Result<String> {
        let Some(task_tx) = self.task_tx.as_ref() else {
            anyhow::bail!("processor is shut down");
        };
        let task_id = Uuid::new_v4().to_string();
        let task = ProcessingTask::new(task_id.clone(), content, filename, metadata);

        self.lock_tasks().insert(task_id.clone(), task);
        if let Some(callback) = callback {
            self.lock_callbacks().insert(task_id.clone(), callback);
        }
        if task_tx.send(task_id.clone()).is_err() {
            self.lock_tasks().remove(&task_id);
            self.lock_callbacks().remove(&task_id);
            anyhow::bail!("processing queue is closed");
        }

        debug!(%task_id, "submitted document for processing");
        Ok(task_id)
    }

    /// Chunk small documents inline; queue large ones.
    pub fn ingest(
        &self,
        content: String,
        filename: Option<String>,
        metadata: Value,
    ) -> Result<IngestOutcome> {
        if self.should_process_async(&content) {
            let task_id = self.submit_document(content, filename, metadata)?;
            Ok(IngestOutcome::Queued(task_id))
        } else {
            let (chunks, chunk_metadata) = self.chunker.chunk(&content, filename.as_deref(), None);
            Ok(IngestOutcome::Inline(chunks, chunk_metadata))
        }
    }

    /// Whether a document of this size should go through the queue. Only
    /// documents strictly larger than the threshold qualify.
    pub fn should_process_async(&self, content: &str) -> bool {
        content.len() > self.config.large_doc_threshold
    }

    /// Wait until the task reaches a terminal state, returning a snapshot of
    /// it. Returns `None` if the task id is unknown or the timeout elapses;
    /// a timeout never cancels the task, which keeps running and can still
    /// be observed through [`Self::task_status`].
    pub async fn wait_for_task(
        &self,
        task_id: &str,
        timeout: Option<Duration>,
    ) -> Option<ProcessingTask> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            // Arm the notification before inspecting state so a completion
            // between the check and the await is not missed.
            let notified = self.completion.notified();
            {
                let tasks = self.lock_tasks();
                match tasks.get(task_id) {
                    None => return None,
                    Some(task) if task.status.is_terminal() => return Some(task.clone()),
                    Some(_) => {}
                }
            }
            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        debug!(%task_id, "timed out waiting; task continues in background");
                        return None;
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Cancel a task that has not started. Returns `false` if the task is
    /// unknown or already picked up by a worker.
    pub fn cancel_task(&self, task_id: &str) -> bool {
        let mut tasks = self.lock_tasks();
        match tasks.get_mut(task_id) {
            Some(task) if task.status == TaskStatus::Pending => {
                task.status = TaskStatus::Cancelled;
                task.completed_at = Some(Instant::now());
                let snapshot = task.clone();
                drop(tasks);
                fire_callback(&self.callbacks, &snapshot);
                self.completion.notify_waiters();
                info!(%task_id, "cancelled pending task");
                true
            }
            _ => false,
        }
    }

    /// Snapshot of a task's current state.
    pub fn task_status(&self, task_id: &str) -> Option<ProcessingTask> {
        self.lock_tasks().get(task_id).cloned()
    }

    /// Counts of tasks by state and current queue depth.
    pub fn processing_stats(&self) -> ProcessingStats {
        let tasks = self.lock_tasks();
        let mut stats = ProcessingStats {
            total_tasks: tasks.len(),
            queue_depth: self.task_rx.len(),
            workers: self.workers.len(),
            large_doc_threshold: self.config.large_doc_threshold,
            ..ProcessingStats::default()
        };
        let mut completed_time = Duration::ZERO;
        for task in tasks.values() {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Processing => stats.processing += 1,
                TaskStatus::Completed => {
                    stats.completed += 1;
                    if let Some(result) = &task.result {
                        completed_time += result.processing_time;
                    }
                }
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        if stats.completed > 0 {
            stats.avg_processing_time_ms =
                completed_time.as_millis() as f64 / stats.completed as f64;
        }
        stats
    }

    /// Drop terminal tasks older than `max_age`, along with any callback
    /// registration they carried, returning how many were removed.
    pub fn cleanup_completed_tasks(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut tasks = self.lock_tasks();
        let expired_ids: Vec<String> = tasks
            .iter()
            .filter(|(_, task)| matches!(task.terminal_age(now), Some(age) if age > max_age))
            .map(|(id, _)| id.clone())
            .collect();
        for task_id in &expired_ids {
            tasks.remove(task_id);
        }
        drop(tasks);

        if !expired_ids.is_empty() {
            let mut callbacks = self.lock_callbacks();
            for task_id in &expired_ids {
                callbacks.remove(task_id);
            }
            debug!(removed = expired_ids.len(), "cleaned up finished tasks");
        }
        expired_ids.len()
    }

    /// Stop accepting work and stop the worker pool, waiting up to `timeout`
    /// for in-flight documents to finish their current step. Submissions
    /// after shutdown return an error.
    pub async fn shutdown(&mut self, timeout: Duration) {
        info!("shutting down document processor");
        // Dropping the sender closes the channel, so intake stops and idle
        // workers see the queue end even before the shutdown signal lands.
        self.task_tx = None;
        let _ = self.shutdown_tx.send(true);
        let workers = std::mem::take(&mut self.workers);
        if tokio::time::timeout(timeout, join_all(workers)).await.is_err() {
            warn!("workers did not stop within the shutdown timeout");
        }
    }

    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<String, ProcessingTask>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_callbacks(&self) -> MutexGuard<'_, HashMap<String, TaskCallback>> {
        self.callbacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Invoke the registered callback for this task, if any.
fn fire_callback(callbacks: &CallbackMap, task: &ProcessingTask) {
    let callbacks = callbacks
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(callback) = callbacks.get(&task.task_id) {
        callback(task);
    }
}

impl WorkerContext {
    async fn process_document(&self, task_id: &str) {
        // Claim the task; anything not pending (cancelled, duplicate id)
        // is skipped.
        let (content, filename, metadata) = {
            let mut tasks = self.lock_tasks();
            match tasks.get_mut(task_id) {
                Some(task) if task.status == TaskStatus::Pending => {
                    task.status = TaskStatus::Processing;
                    task.started_at = Some(Instant::now());
                    task.progress = 10.0;
                    (task.content.clone(), task.filename.clone(), task.metadata.clone())
                }
                Some(task) => {
                    debug!(%task_id, status = %task.status, "skipping task");
                    return;
                }
                None => {
                    warn!(%task_id, "task vanished before processing");
                    return;
                }
            }
        };

        let started = Instant::now();
        let snapshot = match self.run_pipeline(task_id, &content, filename.as_deref(), &metadata).await {
            Ok(mut result) => {
                result.processing_time = started.elapsed();
                let mut tasks = self.lock_tasks();
                tasks.get_mut(task_id).map(|task| {
                    debug!(
                        %task_id,
                        chunks = result.total_chunks,
                        failed = result.failed_chunks,
                        elapsed_ms = result.processing_time.as_millis() as u64,
                        "document processed"
                    );
                    task.status = TaskStatus::Completed;
                    task.progress = 100.0;
                    task.completed_at = Some(Instant::now());
                    task.result = Some(result);
                    task.clone()
                })
            }
            Err(err) => {
                error!(%task_id, error = %err, "document processing failed");
                let mut tasks = self.lock_tasks();
                tasks.get_mut(task_id).map(|task| {
                    task.status = TaskStatus::Failed;
                    task.completed_at = Some(Instant::now());
                    task.error = Some(format!("{err:#}"));
                    task.clone()
                })
            }
        };
        if let Some(snapshot) = snapshot {
            fire_callback(&self.callbacks, &snapshot);
        }
        self.completion.notify_waiters();
    }

    async fn run_pipeline(
        &self,
        task_id: &str,
        content: &str,
        filename: Option<&str>,
        metadata: &Value,
    ) -> Result<DocumentResult> {
        let (chunks, chunk_metadata) = self.chunker.chunk(content, filename, None);
        self.set_progress(task_id, 30.0);

        let total_chunks = chunks.len();
        let mut outcomes: Vec<ChunkOutcome> = Vec::with_capacity(total_chunks);
        let mut failed_chunks = 0usize;

        if total_chunks > 0 {
            let permits = self.chunk_concurrency.min(total_chunks).max(1);
            let semaphore = Arc::new(Semaphore::new(permits));
            let mut join_set = JoinSet::new();

            for (chunk_index, chunk) in chunks.into_iter().enumerate() {
                let semaphore = Arc::clone(&semaphore);
                let processor = Arc::clone(&self.chunk_processor);
                let metadata = metadata.clone();
                join_set.spawn(async move {
                    // Holds its permit for the duration of the chunk.
                    let _permit = semaphore.acquire_owned().await;
                    (
                        chunk_index,
                        processor.process_chunk(chunk_index, &chunk, &metadata).await,
                    )
                });
            }

            let mut finished = 0usize;
            while let Some(joined) = join_set.join_next().await {
                finished += 1;
                match joined {
                    Ok((_, Ok(outcome))) => outcomes.push(outcome),
                    Ok((chunk_index, Err(err))) => {
                        warn!(%task_id, chunk_index, error = %err, "chunk processing failed");
                        failed_chunks += 1;
                    }
                    Err(join_err) => {
                        warn!(%task_id, error = %join_err, "chunk task aborted");
                        failed_chunks += 1;
                    }
                }
                let fraction = finished as f64 / total_chunks as f64;
                self.set_progress(task_id, 30.0 + fraction * 60.0);
            }
        }

        // Concurrent completion order is arbitrary; restore document order.
        outcomes.sort_by_key(|outcome| outcome.chunk_index);
        let successful_chunks = outcomes.len();

        Ok(DocumentResult {
            chunks: outcomes,
            chunk_metadata,
            total_chunks,
            successful_chunks,
            failed_chunks,
            processing_time: Duration::ZERO,
        })
    }

    fn set_progress(&self, task_id: &str, progress: f64) {
        let mut tasks = self.lock_tasks();
        if let Some(task) = tasks.get_mut(task_id) {
            task.progress = progress;
        }
    }

    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<String, ProcessingTask>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
