//! The full metadata store contract: buckets, objects, versions, tags,
//! multipart uploads, and bucket statistics, implemented
//! over `metakv_db`'s engine adapter trait. Every operation is an inherent
//! method on [`Store`] split across one module per entity family; see
//! `store.rs` for why this crate defines no separate dispatch trait.

#[macro_use]
extern crate tracing;

pub mod buckets;
pub mod concurrency;
pub mod multipart;
pub mod objects;
pub mod rawkv;
pub mod records;
pub mod search;
pub mod store;
pub mod tags;
pub mod versions;
pub mod workers;

#[cfg(test)]
mod test_support;

pub use objects::ListObjectsResult;
pub use rawkv::RawKv;
pub use records::{
	BucketMetadata, MultipartUploadMetadata, ObjectLockConfig, ObjectMetadata, ObjectVersion, PartMetadata, VersioningConfig,
};
pub use search::{SearchFilter, SearchResult};
pub use store::Store;
