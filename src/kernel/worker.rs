// src/kernel/worker.rs
//! In-process worker kernel.
//!
//! Requests and responses cross the boundary as JSON text, exactly as they
//! would over a real worker channel, so anything that cannot be serialized
//! fails here instead of in production. The backend runs on the tokio
//! blocking pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{DrawError, Result};

use super::{Kernel, KernelRequest, KernelResponse};

/// Synchronous kernel implementation hosted by a [`WorkerKernel`].
pub trait KernelBackend: Send + Sync + 'static {
    /// Answer `method` with a JSON response, or an error message.
    fn handle(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, String>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkerStats {
    pub calls: u64,
    pub failures: u64,
    pub busy: Duration,
    pub last_method: Option<String>,
}

pub struct WorkerKernel<B: KernelBackend> {
    backend: Arc<B>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl<B: KernelBackend> WorkerKernel<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            stats: Arc::new(Mutex::new(WorkerStats::default())),
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.lock().clone()
    }
}

#[async_trait]
impl<B: KernelBackend> Kernel for WorkerKernel<B> {
    async fn call(&self, request: KernelRequest) -> Result<KernelResponse> {
        let wire = serde_json::to_string(&request)?;
        let backend = Arc::clone(&self.backend);
        let stats = Arc::clone(&self.stats);
        log::debug!("kernel call {}", request.method_name);

        let answer = tokio::task::spawn_blocking(move || -> Result<String> {
            let started = Instant::now();
            let request: KernelRequest = serde_json::from_str(&wire)?;
            let outcome = backend.handle(&request.method_name, request.payload);

            let mut s = stats.lock();
            s.calls += 1;
            s.busy += started.elapsed();
            s.last_method = Some(request.method_name);
            match outcome {
                Ok(value) => Ok(serde_json::to_string(&value)?),
                Err(message) => {
                    s.failures += 1;
                    Err(DrawError::Custom(message))
                }
            }
        })
        .await
        .map_err(|e| DrawError::Worker(e.to_string()))??;

        Ok(serde_json::from_str(&answer)?)
    }
}
