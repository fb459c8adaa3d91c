//! # keywordsai-tracing
//!
//! Client SDK and telemetry exporters for the Keywords AI / Respan logging
//! platform.
//!
//! Heterogeneous span and event representations (OpenTelemetry spans,
//! intercepted OpenAI-compatible HTTP calls, agent-framework hook callbacks)
//! normalize into one wire-ready log record shape and ship in batches to the
//! platform's ingestion endpoint, with bounded retry, de-duplication of
//! double-fired spans, and fire-and-forget dispatch that never blocks the
//! instrumented code path.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keywordsai_tracing::{ExporterConfig, OpenAITelemetryMiddleware};
//! use reqwest_middleware::ClientBuilder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Reads KEYWORDSAI_API_KEY / KEYWORDSAI_BASE_URL (or the RESPAN_*
//! // variants) from the environment.
//! let config = ExporterConfig::from_env();
//!
//! let middleware = OpenAITelemetryMiddleware::new(config);
//! let client = ClientBuilder::new(reqwest::Client::new())
//!     .with(middleware)
//!     .build();
//!
//! // Attribute subsequent calls (optional)
//! keywordsai_tracing::context::set_customer_identifier("customer-123");
//! keywordsai_tracing::context::set_session_identifier("session-456");
//!
//! // OpenAI-compatible calls through `client` are now logged automatically.
//! # Ok(())
//! # }
//! ```
//!
//! Missing configuration degrades gracefully: without an API key the
//! wrapped operations still run, and export is skipped with a warning.

pub mod attrs;
pub mod builder;
pub mod client;
pub mod config;
pub mod context;
pub mod dedup;
pub mod exporter;
pub mod hooks;
pub mod ids;
pub mod middleware;
pub mod pricing;
pub mod record;
pub mod retry;
pub mod time;
pub mod usage;
pub mod value;

// Re-export main types
pub use attrs::{KeywordsAttributes, SpanAttributesBuilder};
pub use builder::{BuildError, LogBuilder, SpanSource};
pub use client::{CallbackRegistry, Delivery, IngestClient, IngestError};
pub use config::ExporterConfig;
pub use context::{TraceContext, GLOBAL_CONTEXT};
pub use dedup::SpanDedupeCache;
pub use exporter::TraceExporter;
pub use hooks::HookAdapter;
pub use ids::format_id;
pub use middleware::OpenAITelemetryMiddleware;
pub use record::{LogType, TraceLog};
pub use retry::RetryHandler;
pub use time::{format_timestamp, latency_seconds};
pub use usage::{compute_total_request_tokens, extract_token_usage};
pub use value::{normalize, PayloadValue};
