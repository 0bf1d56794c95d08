//! Postgres persistence for the hazard pipeline.
//!
//! The schema enforces the record-level rules the pipeline relies on:
//! one post per url, `verified` only alongside `tested`, one comment per
//! `(post, external_id)`, and incidents that outlive their evidence.

pub mod error;
mod rows;
mod store;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use error::{Result, StoreError};
pub use store::PgStore;
