//! Utility crate for the metakv metadata store.
//!
//! Holds everything that is shared by the engine adapter and the entity
//! store but that isn't itself storage logic: the closed error taxonomy, the
//! textual key schema, on-disk configuration, variant-typed JSON helpers and
//! the cooperative shutdown/cancellation primitives used by background
//! workers.

#[macro_use]
extern crate tracing;

pub mod background;
pub mod config;
pub mod error;
pub mod key_schema;
pub mod time;
pub mod types;

pub use error::{Error, ResultExt};
