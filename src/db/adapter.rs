//! The minimal interface the metadata store needs from any underlying LSM
//! engine.

use std::path::Path;

use crate::error::Error;

/// Durability hint for a write. Almost all store writes use `Deferred`
/// (WAL append, no fsync); migration's final commit and, optionally,
/// ordinary writes when `StoreConfig::metadata_fsync` is set, use `Synced`
/// (fsync before returning).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Durability {
	Deferred,
	Synced,
}

/// A single all-or-nothing group of set/delete operations. Obtained from
/// [`KvEngine::new_batch`] and consumed by [`Batch::commit`].
pub trait Batch {
	fn set(&mut self, key: &[u8], value: &[u8]);
	fn delete(&mut self, key: &[u8]);

	/// Applies every staged operation atomically. `self` is consumed:
	/// calling `commit` twice, or using the batch after a failed commit, is
	/// a programmer error the type system rules out.
	fn commit(self: Box<Self>, durability: Durability) -> Result<(), Error>;
}

/// A cursor bounded to `[lower_bound, lower_bound++)` (the lexicographic
/// successor of `lower_bound`, per `metakv_util::key_schema::prefix_upper_bound`),
/// or unbounded above if `lower_bound` has no successor.
pub trait PrefixIterator {
	/// Repositions the cursor at the first key `>= key` within the bound.
	fn seek_ge(&mut self, key: &[u8]) -> Result<(), Error>;
	/// Repositions the cursor at the first key within the bound.
	fn first(&mut self) -> Result<(), Error>;
	/// Advances the cursor by one entry.
	fn next(&mut self) -> Result<(), Error>;
	/// `false` once the cursor has moved past the end of the bound.
	fn valid(&self) -> bool;
	/// Panics if `!self.valid()`.
	fn key(&self) -> &[u8];
	/// Panics if `!self.valid()`.
	fn value(&self) -> &[u8];
}

/// The engine adapter contract. Implemented by [`crate::engine_a`] (rocksdb)
/// and [`crate::engine_b`] (fjall); the entity store in `metakv_store` is
/// written purely against this trait and never imports an engine crate
/// directly.
pub trait KvEngine: Send + Sync {
	fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;

	fn set(&self, key: &[u8], value: &[u8], durability: Durability) -> Result<(), Error>;

	/// Sets a key that the engine itself should expire after `ttl_secs`
	/// seconds, if [`KvEngine::supports_ttl`] is `true`. Callers on engines
	/// that don't support native TTL must still call this (it degrades to a
	/// plain `set`) and rely on the background TTL reaper instead.
	fn set_with_ttl(
		&self,
		key: &[u8],
		value: &[u8],
		durability: Durability,
		ttl_secs: u64,
	) -> Result<(), Error> {
		let _ = ttl_secs;
		self.set(key, value, durability)
	}

	fn delete(&self, key: &[u8]) -> Result<(), Error>;

	fn new_batch(&self) -> Box<dyn Batch + '_>;

	/// `lower_bound` both seeds the scan's start and (via
	/// `metakv_util::key_schema::prefix_upper_bound`) its implicit upper
	/// bound, i.e. `[lower_bound, lower_bound++)`. Positioned before its
	/// first entry; call `first()` or `seek_ge()` before reading.
	fn new_prefix_iterator(&self, lower_bound: &[u8]) -> Result<Box<dyn PrefixIterator + '_>, Error>;

	/// Consistent on-disk snapshot, written to `path` (which must not
	/// already exist).
	fn checkpoint(&self, path: &Path) -> Result<(), Error>;

	/// Manual major compaction of `[lo, hi)`; `None` bounds mean
	/// unbounded on that side.
	fn compact(&self, lo: Option<&[u8]>, hi: Option<&[u8]>) -> Result<(), Error>;

	/// Flushes and releases all engine-owned file handles. Idempotent.
	fn close(&self) -> Result<(), Error>;

	/// `true` if [`KvEngine::set_with_ttl`] actually expires the key without
	/// help; `false` means the multipart TTL reaper worker must run instead.
	fn supports_ttl(&self) -> bool;

	/// `true` if this engine benefits from the periodic value-log GC
	/// worker; `false` if it reclaims space on its own.
	fn needs_value_log_gc(&self) -> bool;

	/// Asks the engine to reclaim value-log space if at least
	/// `discard_ratio` of some file is reclaimable. Returns whether any
	/// work was actually done. No-op (returns `Ok(false)`) on engines that
	/// report `needs_value_log_gc() == false`.
	fn gc_value_log(&self, discard_ratio: f64) -> Result<bool, Error> {
		let _ = discard_ratio;
		Ok(false)
	}
}

/// Iterates every key/value pair the engine owns, in whatever order the
/// engine's default full scan visits them. Used only by [`crate::migration`],
/// which must stay ignorant of the entity key schema.
pub trait FullScan: KvEngine {
	fn scan_all(&self) -> Result<Box<dyn PrefixIterator + '_>, Error> {
		self.new_prefix_iterator(&[])
	}
}

impl<T: KvEngine + ?Sized> FullScan for T {}
