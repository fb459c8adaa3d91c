//! Batch delivery to the ingestion endpoint
//!
//! Records are posted as JSON arrays to `{base}/v1/traces/ingest` with
//! bearer auth and the dogfood header (so the platform does not re-trace
//! its own ingestion handler). Server errors (>=500) retry with backoff;
//! 3xx/4xx responses are logged once and dropped, since retrying a rejected
//! request cannot fix it.
//!
//! The default dispatch path is fire-and-forget: `enqueue` pushes onto a
//! bounded queue drained by one background worker task, so the caller's
//! instrumented code path never blocks on network I/O. Failures of queued
//! batches are observable via logs and the failure callbacks, not via the
//! caller's control flow. Adapters configured to raise use `send_now`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::ExporterConfig;
use crate::record::TraceLog;
use crate::retry::RetryHandler;

/// Header marking the exporter's own traffic for the receiving service.
pub const DOGFOOD_HEADER: &str = "x-keywordsai-dogfood";
pub const DOGFOOD_VALUE: &str = "1";

/// Fixed per-request socket timeout; a timeout counts as one failed attempt.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("delivery failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server error: HTTP {status}")]
    Server { status: u16 },
    #[error("no API key configured")]
    MissingApiKey,
}

/// Terminal state of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Accepted,
    /// Endpoint answered 3xx/4xx; the batch was dropped without retry.
    Rejected(u16),
}

type SuccessCallback = Box<dyn Fn(usize) + Send + Sync>;
type FailureCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Delivery outcome callbacks with explicit register/unregister lifecycle.
///
/// Owned by the client; nothing is process-global, so concurrent sessions
/// and test runs cannot leak callbacks into each other. Callbacks run under
/// the registry lock and must not register or unregister from within.
#[derive(Default)]
pub struct CallbackRegistry {
    next_id: AtomicU64,
    on_success: Mutex<HashMap<u64, SuccessCallback>>,
    on_failure: Mutex<HashMap<u64, FailureCallback>>,
}

impl CallbackRegistry {
    /// Register a callback invoked with the record count of each accepted
    /// batch. Returns a handle for [`CallbackRegistry::unregister`].
    pub fn on_success(&self, callback: impl Fn(usize) + Send + Sync + 'static) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.on_success.lock().insert(id, Box::new(callback));
        id
    }

    /// Register a callback invoked with a description of each failed or
    /// rejected delivery.
    pub fn on_failure(&self, callback: impl Fn(&str) + Send + Sync + 'static) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.on_failure.lock().insert(id, Box::new(callback));
        id
    }

    pub fn unregister(&self, id: u64) -> bool {
        self.on_success.lock().remove(&id).is_some() || self.on_failure.lock().remove(&id).is_some()
    }

    fn notify_success(&self, records: usize) {
        for callback in self.on_success.lock().values() {
            callback(records);
        }
    }

    fn notify_failure(&self, reason: &str) {
        for callback in self.on_failure.lock().values() {
            callback(reason);
        }
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("on_success", &self.on_success.lock().len())
            .field("on_failure", &self.on_failure.lock().len())
            .finish()
    }
}

/// Shared delivery core used by both the worker and the synchronous path.
#[derive(Debug)]
struct Transport {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    retry: RetryHandler,
    callbacks: CallbackRegistry,
}

impl Transport {
    async fn post_once(&self, api_key: &str, batch: &[TraceLog]) -> Result<Delivery, IngestError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header(DOGFOOD_HEADER, DOGFOOD_VALUE)
            .json(batch)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(IngestError::Server {
                status: status.as_u16(),
            });
        }
        if status.as_u16() >= 300 {
            tracing::warn!(
                status = status.as_u16(),
                records = batch.len(),
                "Ingest endpoint rejected batch; not retrying"
            );
            return Ok(Delivery::Rejected(status.as_u16()));
        }
        Ok(Delivery::Accepted)
    }

    async fn deliver(&self, batch: &[TraceLog]) -> Result<Delivery, IngestError> {
        let api_key = self.api_key.as_deref().ok_or(IngestError::MissingApiKey)?;
        let result = self
            .retry
            .execute(|| self.post_once(api_key, batch), "trace ingest")
            .await;
        match &result {
            Ok(Delivery::Accepted) => self.callbacks.notify_success(batch.len()),
            Ok(Delivery::Rejected(status)) => {
                self.callbacks.notify_failure(&format!("HTTP {status}"))
            }
            Err(e) => self.callbacks.notify_failure(&e.to_string()),
        }
        result
    }
}

enum WorkerMessage {
    Batch(Vec<TraceLog>),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Client for the platform's log ingestion endpoint.
///
/// Construct inside a tokio runtime; `new` spawns the queue worker.
#[derive(Debug)]
pub struct IngestClient {
    transport: Arc<Transport>,
    tx: mpsc::Sender<WorkerMessage>,
    worker: Mutex<Option<JoinHandle<()>>>,
    missing_key_warned: AtomicBool,
}

impl IngestClient {
    pub fn new(config: &ExporterConfig) -> Arc<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        let transport = Arc::new(Transport {
            http,
            endpoint: config.ingest_endpoint(),
            api_key: config.api_key.clone(),
            retry: RetryHandler::new(config.max_retries),
            callbacks: CallbackRegistry::default(),
        });

        let (tx, rx) = mpsc::channel(config.max_queue.max(1));
        let worker = tokio::spawn(run_worker(Arc::clone(&transport), rx));

        Arc::new(Self {
            transport,
            tx,
            worker: Mutex::new(Some(worker)),
            missing_key_warned: AtomicBool::new(false),
        })
    }

    /// Whether the client is configured to reach the network at all.
    pub fn is_enabled(&self) -> bool {
        self.transport.api_key.is_some()
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.transport.callbacks
    }

    /// Queue a batch for background delivery without blocking the caller.
    ///
    /// With no API key configured this degrades to a no-op with a warning:
    /// telemetry goes dark but the host application keeps working.
    pub fn enqueue(&self, batch: Vec<TraceLog>) {
        if batch.is_empty() {
            return;
        }
        if !self.is_enabled() {
            if !self.missing_key_warned.swap(true, Ordering::Relaxed) {
                tracing::warn!("No API key configured; trace export is disabled");
            }
            return;
        }
        match self.tx.try_send(WorkerMessage::Batch(batch)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(WorkerMessage::Batch(batch))) => {
                tracing::warn!(dropped = batch.len(), "Export queue full; dropping batch");
            }
            Err(mpsc::error::TrySendError::Closed(WorkerMessage::Batch(batch))) => {
                tracing::warn!(dropped = batch.len(), "Export worker stopped; dropping batch");
            }
            Err(_) => {}
        }
    }

    /// Deliver a batch synchronously, propagating the final error.
    ///
    /// Used by adapters configured to raise on export failure.
    pub async fn send_now(&self, batch: &[TraceLog]) -> Result<Delivery, IngestError> {
        self.transport.deliver(batch).await
    }

    /// Wait until everything queued so far has been attempted.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(WorkerMessage::Flush(ack)).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Drain the queue and stop the worker.
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(WorkerMessage::Shutdown(ack)).await.is_ok() {
            let _ = done.await;
        }
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn run_worker(transport: Arc<Transport>, mut rx: mpsc::Receiver<WorkerMessage>) {
    while let Some(message) = rx.recv().await {
        match message {
            WorkerMessage::Batch(batch) => {
                if let Err(e) = transport.deliver(&batch).await {
                    // Fire-and-forget: exhausted retries surface here only.
                    tracing::warn!(error = %e, records = batch.len(), "Dropping batch after failed delivery");
                }
            }
            WorkerMessage::Flush(ack) => {
                let _ = ack.send(());
            }
            WorkerMessage::Shutdown(ack) => {
                let _ = ack.send(());
                break;
            }
        }
    }
}
