//! Storage backends for vitals and alert persistence
//!
//! This module provides a trait-based abstraction over the time-series
//! store.
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` allows swapping implementations
//! - **Async**: all operations are async for compatibility with the Tokio
//!   pipeline
//! - **Best-effort writes**: callers on the ingestion path log and drop
//!   storage errors instead of stalling
//!
//! ## Backends
//!
//! - **TimescaleDB** (production): Postgres with a hypertable on `vitals`
//! - **In-Memory** (tests / no-DB mode): vectors plus Rust-side bucketing

pub mod backend;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;

pub use backend::{StorageBackend, TrendPoint};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use postgres::TimescaleBackend;
