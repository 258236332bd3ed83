//! Record store for the clip pipeline.
//!
//! This crate provides:
//! - Repository traits for the Work Claimer, Clip Materializer and Review Lock Manager
//! - A Postgres implementation using `FOR UPDATE SKIP LOCKED` claims
//! - An in-process implementation with the same semantics
//! - Store operation metrics

pub mod config;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod postgres;
pub mod traits;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use traits::{
    ClipFilter, ClipPage, ClipStore, DecisionFilter, Pagination, RecordStore, ReviewAssignment,
    ReviewStore, VideoStore, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
