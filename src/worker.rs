//! Off-thread execution of image work.
//!
//! Decoding and the per-pixel stages are CPU-bound and can take a noticeable
//! time on multi-megapixel photos. [`PipelineWorker`] keeps that work off the
//! caller's thread: every job is handed to a dedicated rayon pool together
//! with its own inputs (shared immutable bytes, `Copy` parameters), and the
//! result comes back over a oneshot channel the caller awaits.
//!
//! ```text
//! caller task ──job + owned inputs──▶ rayon pool ──result──▶ oneshot ──▶ .await
//! ```
//!
//! Nothing mutable is shared between the caller and the pool, so jobs for
//! different stencils can run side by side.

use crate::imaging::{
    BackendError, Dimensions, ImageBackend, RustBackend, ThumbnailParams, TransformParams,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to build worker pool: {0}")]
    PoolBuild(String),
    #[error("Worker dropped the job before replying")]
    Disconnected,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Handle to the image worker pool. Cheap to clone.
#[derive(Clone)]
pub struct PipelineWorker {
    pool: Arc<rayon::ThreadPool>,
    backend: Arc<dyn ImageBackend>,
}

impl PipelineWorker {
    /// Build a pool of `threads` workers (at least one) around `backend`.
    pub fn new(backend: Arc<dyn ImageBackend>, threads: usize) -> Result<Self, WorkerError> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("stencil-worker-{i}"))
            .panic_handler(|_| error!("Image job panicked; caller sees a disconnected worker"))
            .build()
            .map_err(|e| WorkerError::PoolBuild(e.to_string()))?;
        debug!(threads, "Pipeline worker pool ready");
        Ok(Self {
            pool: Arc::new(pool),
            backend,
        })
    }

    /// Worker backed by [`RustBackend`].
    pub fn with_rust_backend(threads: usize) -> Result<Self, WorkerError> {
        Self::new(Arc::new(RustBackend::new()), threads)
    }

    /// Run `job` on the pool and await its result.
    pub async fn run<T, F>(&self, job: F) -> Result<T, WorkerError>
    where
        F: FnOnce(&dyn ImageBackend) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let backend = Arc::clone(&self.backend);
        self.pool.spawn(move || {
            // The receiver may be gone if the caller stopped waiting.
            let _ = tx.send(job(backend.as_ref()));
        });
        rx.await.map_err(|_| WorkerError::Disconnected)
    }

    pub async fn identify(&self, source: Arc<[u8]>) -> Result<Dimensions, WorkerError> {
        Ok(self.run(move |backend| backend.identify(&source)).await??)
    }

    pub async fn transform(
        &self,
        source: Arc<[u8]>,
        params: TransformParams,
    ) -> Result<Vec<u8>, WorkerError> {
        Ok(self
            .run(move |backend| backend.transform(&source, &params))
            .await??)
    }

    pub async fn thumbnail(
        &self,
        source: Arc<[u8]>,
        params: ThumbnailParams,
    ) -> Result<Vec<u8>, WorkerError> {
        Ok(self
            .run(move |backend| backend.thumbnail(&source, &params))
            .await??)
    }
}
