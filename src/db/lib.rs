//! Abstraction over pluggable LSM key/value storage engines.
//!
//! This crate defines the minimal [`KvEngine`] interface the metadata store
//! needs from any underlying engine (point get/set/delete, prefix-bounded
//! iteration, atomic batches, manual compaction, consistent snapshot,
//! shutdown) and two concrete bindings:
//!
//! - [`engine_a`], built on `rocksdb`: the reference engine, with native
//!   per-key TTL and optimistic-transaction batches. Feature `engine-a`.
//! - [`engine_b`], built on `fjall`: the current engine, a pure-Rust
//!   embedded LSM whose write-ahead log survives host crashes without a
//!   manifest rebuild, at the cost of no native per-key TTL. Feature
//!   `engine-b`.
//!
//! [`migration`] converts a previously persisted Engine-A directory into
//! Engine-B in place; it operates purely on raw key/value pairs and has no
//! knowledge of the entity schema layered on top by `metakv_store`.

#[macro_use]
extern crate tracing;

pub mod adapter;
pub(crate) mod bounds;
pub mod error;
pub mod migration;

#[cfg(feature = "engine-a")]
pub mod engine_a;
#[cfg(feature = "engine-b")]
pub mod engine_b;

pub use adapter::{Batch, Durability, KvEngine, PrefixIterator};
pub use error::Error;
