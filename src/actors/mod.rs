//! Actor-based ingestion system
//!
//! Each stage of the pipeline runs as an independent async task
//! communicating via bounded Tokio channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!                ┌──────────────────┐
//!                │  BrokerGateway   │  raw_vitals / config subscriptions
//!                └───┬──────────┬───┘
//!        sticky hash │          │ config → DetectorState.switch
//!         ┌──────────┼──────────────────┐
//!         │          │                  │
//! ┌───────▼──────┐ ┌─▼────────────┐ ┌───▼──────────┐
//! │ IngestWorker │ │ IngestWorker │ │ IngestWorker │ …  (bounded mpsc each)
//! └───────┬──────┘ └─┬────────────┘ └───┬──────────┘
//!         │ classify / learn / persist  │
//!         └──────────┼──────────────────┘
//!                    │ Outbound (bounded mpsc)
//!            ┌───────▼────────┐
//!            │ BrokerGateway  │  vitals / alerts / config publishes
//!            └────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! 1. **Per-user FIFO**: a user's samples always hash to the same worker
//!    channel and each worker finishes one sample before taking the next.
//! 2. **Backpressure, no drops**: the gateway blocks on a full work channel;
//!    only outbound publishes are fire-and-forget.
//! 3. **Isolation**: one bad sample is logged and skipped, never fatal to a
//!    worker.

pub mod ingest;
