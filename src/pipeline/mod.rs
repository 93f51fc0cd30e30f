//! Transcription pipeline
//!
//! A FIFO queue of finished call recordings and a pool of worker tasks
//! that transcribe each one and forward the text downstream. Delivery is
//! at-most-once and best-effort: a failed job is logged and dropped, and
//! jobs still queued at shutdown are discarded.

mod whisper;

pub use whisper::WhisperCppEngine;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::TranscriptionError;

/// Where a recording came from, forwarded downstream alongside the text.
#[derive(Debug, Clone)]
pub struct JobMetadata {
    pub source_type: String,
    pub remote: String,
}

/// A finalized recording queued for offline transcription.
///
/// Owns only the file path; the originating call session is never
/// referenced after hand-off.
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    pub id: Uuid,
    pub recording: PathBuf,
    pub enqueued_at: DateTime<Utc>,
    pub metadata: JobMetadata,
}

impl TranscriptionJob {
    pub fn new(recording: PathBuf, metadata: JobMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            recording,
            enqueued_at: Utc::now(),
            metadata,
        }
    }
}

/// External speech-to-text engine.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    async fn transcribe(&self, recording: &Path) -> Result<String, TranscriptionError>;
}

/// Downstream idea-processing collaborator. Retries, if any, are its concern.
#[async_trait]
pub trait IdeaSink: Send + Sync {
    async fn submit(&self, text: &str, metadata: &JobMetadata) -> anyhow::Result<()>;
}

/// Dev stand-in for the downstream collaborator: logs transcripts instead
/// of forwarding them anywhere.
pub struct LogIdeaSink;

#[async_trait]
impl IdeaSink for LogIdeaSink {
    async fn submit(&self, text: &str, metadata: &JobMetadata) -> anyhow::Result<()> {
        info!(
            source = %metadata.source_type,
            remote = %metadata.remote,
            "transcript: {text}"
        );
        Ok(())
    }
}

/// Queue plus worker pool. Producers enqueue without blocking; workers pull
/// jobs until the queue is closed.
pub struct TranscriptionPipeline {
    tx: Mutex<Option<mpsc::Sender<TranscriptionJob>>>,
    shutting_down: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TranscriptionPipeline {
    /// Spawn `worker_count` workers sharing a queue of `queue_capacity` jobs.
    pub fn start(
        engine: Arc<dyn TranscriptionEngine>,
        sink: Arc<dyn IdeaSink>,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<TranscriptionJob>(queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let shutting_down = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count.max(1));
        for worker in 0..worker_count.max(1) {
            let rx = Arc::clone(&rx);
            let engine = Arc::clone(&engine);
            let sink = Arc::clone(&sink);
            let shutting_down = Arc::clone(&shutting_down);

            workers.push(tokio::spawn(async move {
                debug!(worker, "transcription worker started");
                loop {
                    // Hold the receiver guard only while waiting, never
                    // while transcribing, so siblings can pull in parallel.
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else { break };

                    if shutting_down.load(Ordering::SeqCst) {
                        debug!(job = %job.id, "discarding queued job during shutdown");
                        continue;
                    }

                    if let Err(e) = Self::process(engine.as_ref(), sink.as_ref(), &job).await {
                        // Job-local failure; siblings and later jobs continue.
                        warn!(job = %job.id, recording = %job.recording.display(), error = %e, "transcription job dropped");
                    }
                }
                debug!(worker, "transcription worker stopped");
            }));
        }

        Self {
            tx: Mutex::new(Some(tx)),
            shutting_down,
            workers: Mutex::new(workers),
        }
    }

    /// Hand a job to the queue without blocking the caller.
    ///
    /// Called from the synchronous disconnect path; a full or closed queue
    /// drops the job with a warning rather than stalling call cleanup.
    pub fn enqueue(&self, job: TranscriptionJob) {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => {
                if let Err(e) = tx.try_send(job) {
                    warn!(error = %e, "transcription queue rejected job");
                }
            }
            None => warn!("transcription pipeline already stopped, job dropped"),
        }
    }

    async fn process(
        engine: &dyn TranscriptionEngine,
        sink: &dyn IdeaSink,
        job: &TranscriptionJob,
    ) -> anyhow::Result<()> {
        info!(job = %job.id, recording = %job.recording.display(), "transcribing recording");
        let text = engine.transcribe(&job.recording).await?;

        if text.trim().is_empty() {
            info!(job = %job.id, "no speech detected in recording");
            return Ok(());
        }

        info!(job = %job.id, chars = text.len(), "forwarding transcript downstream");
        sink.submit(&text, &job.metadata).await?;
        Ok(())
    }

    /// Stop the pool: no new jobs are accepted, queued jobs are discarded,
    /// and each worker finishes its in-flight job. Waits at most
    /// `join_timeout` per worker.
    pub async fn shutdown(&self, join_timeout: Duration) {
        self.shutting_down.store(true, Ordering::SeqCst);

        // Closing the channel ends recv() once the queue drains.
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let workers = {
            let mut guard = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };

        for (i, worker) in workers.into_iter().enumerate() {
            match tokio::time::timeout(join_timeout, worker).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(worker = i, error = %e, "transcription worker panicked"),
                Err(_) => warn!(worker = i, "transcription worker did not stop in time"),
            }
        }

        info!("transcription pipeline stopped");
    }
}
