//! Engine-A: the reference adapter, built on `rocksdb`.
//!
//! Opened through `rocksdb`'s TTL-enabled handle so that entries written
//! with [`KvEngine::set_with_ttl`] (multipart uploads and their secondary
//! index) are compacted away by the engine itself without
//! help from the TTL reaper worker. `Checkpoint` uses rocksdb's native
//! hard-link checkpoint API, so a snapshot costs no extra disk space until
//! the live database diverges from it.

use std::path::Path;
use std::sync::Mutex;

use rocksdb::{
	checkpoint::Checkpoint, ColumnFamilyDescriptor, DBCompressionType, IteratorMode, Options,
	ReadOptions, WriteBatch, WriteOptions, DB,
};

use crate::adapter::{Batch, Durability, KvEngine, PrefixIterator};
use crate::error::Error;

/// Default TTL applied to the whole database's TTL-tagged column family.
/// `rocksdb`'s TTL support expires entries at the database level rather than
/// per individual `set_with_ttl` call, so this must be at least as large as
/// the longest TTL any caller requests (in practice only the 7-day multipart
/// upload TTL, see `StoreConfig::multipart_ttl_days`).
const TTL_SECS: u64 = 14 * 24 * 3600;

pub struct EngineA {
	db: DB,
	// rocksdb's WriteBatch has no built-in conflict detection; we serialize
	// batch construction so that two overlapping batches never interleave
	// their reads-then-writes inside the entity store's read-modify-write
	// helpers (e.g. UpdateBucketMetrics, which instead prefers the
	// per-bucket mutex in metakv_store, but defends here too for callers
	// that bypass it).
	batch_lock: Mutex<()>,
}

fn open_options(block_cache_mb: usize) -> Options {
	let mut opts = Options::default();
	opts.create_if_missing(true);
	opts.set_compression_type(DBCompressionType::Snappy);
	let cache = rocksdb::Cache::new_lru_cache(block_cache_mb * 1024 * 1024);
	let mut block_opts = rocksdb::BlockBasedOptions::default();
	block_opts.set_block_cache(&cache);
	opts.set_block_based_table_factory(&block_opts);
	opts
}

impl EngineA {
	pub fn open(path: &Path, block_cache_mb: usize) -> Result<Self, Error> {
		let opts = open_options(block_cache_mb);
		let db = DB::open_with_ttl(&opts, path, TTL_SECS as i32)
			.map_err(|e| Error::msg(format!("unable to open Engine-A (rocksdb) at {}: {}", path.display(), e)))?;
		Ok(EngineA {
			db,
			batch_lock: Mutex::new(()),
		})
	}

	/// Opens the database read-only, for use as the source side of a
	/// migration. Never writes, so TTL expiry never kicks in mid-copy.
	pub fn open_read_only(path: &Path) -> Result<Self, Error> {
		let opts = Options::default();
		let db = DB::open_for_read_only(&opts, path, false)
			.map_err(|e| Error::msg(format!("unable to open Engine-A read-only at {}: {}", path.display(), e)))?;
		Ok(EngineA {
			db,
			batch_lock: Mutex::new(()),
		})
	}

	#[allow(dead_code)]
	fn column_families() -> Vec<ColumnFamilyDescriptor> {
		Vec::new()
	}
}

struct RocksBatch<'a> {
	engine: &'a EngineA,
	batch: WriteBatch,
}

impl<'a> Batch for RocksBatch<'a> {
	fn set(&mut self, key: &[u8], value: &[u8]) {
		self.batch.put(key, value);
	}

	fn delete(&mut self, key: &[u8]) {
		self.batch.delete(key);
	}

	fn commit(self: Box<Self>, durability: Durability) -> Result<(), Error> {
		let _guard = self.engine.batch_lock.lock().unwrap();
		let mut write_opts = WriteOptions::default();
		write_opts.set_sync(durability == Durability::Synced);
		self.engine
			.db
			.write_opt(self.batch, &write_opts)
			.map_err(Error::from)
	}
}

struct RocksPrefixIterator<'a> {
	inner: rocksdb::DBRawIterator<'a>,
	lower_bound: Vec<u8>,
}

impl<'a> RocksPrefixIterator<'a> {
	fn new(db: &'a DB, lower_bound: &[u8]) -> Self {
		let mut ro = ReadOptions::default();
		ro.set_iterate_lower_bound(lower_bound.to_vec());
		if let Some(ub) = crate::bounds::prefix_upper_bound(lower_bound) {
			ro.set_iterate_upper_bound(ub);
		}
		let mut inner = db.raw_iterator_opt(ro);
		inner.seek(lower_bound);
		RocksPrefixIterator {
			inner,
			lower_bound: lower_bound.to_vec(),
		}
	}
}

impl<'a> PrefixIterator for RocksPrefixIterator<'a> {
	fn seek_ge(&mut self, key: &[u8]) -> Result<(), Error> {
		self.inner.seek(key);
		Ok(())
	}

	fn first(&mut self) -> Result<(), Error> {
		self.inner.seek(&self.lower_bound);
		Ok(())
	}

	fn next(&mut self) -> Result<(), Error> {
		self.inner.next();
		Ok(())
	}

	fn valid(&self) -> bool {
		self.inner.valid()
	}

	fn key(&self) -> &[u8] {
		self.inner.key().expect("PrefixIterator::key on invalid cursor")
	}

	fn value(&self) -> &[u8] {
		self.inner.value().expect("PrefixIterator::value on invalid cursor")
	}
}

impl KvEngine for EngineA {
	fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
		Ok(self.db.get(key)?)
	}

	fn set(&self, key: &[u8], value: &[u8], durability: Durability) -> Result<(), Error> {
		let mut write_opts = WriteOptions::default();
		write_opts.set_sync(durability == Durability::Synced);
		self.db.put_opt(key, value, &write_opts)?;
		Ok(())
	}

	fn set_with_ttl(
		&self,
		key: &[u8],
		value: &[u8],
		durability: Durability,
		_ttl_secs: u64,
	) -> Result<(), Error> {
		// The database-wide TTL compaction filter (see `TTL_SECS`) expires
		// this entry on its own; we just write it normally.
		self.set(key, value, durability)
	}

	fn delete(&self, key: &[u8]) -> Result<(), Error> {
		Ok(self.db.delete(key)?)
	}

	fn new_batch(&self) -> Box<dyn Batch + '_> {
		Box::new(RocksBatch {
			engine: self,
			batch: WriteBatch::default(),
		})
	}

	fn new_prefix_iterator(&self, lower_bound: &[u8]) -> Result<Box<dyn PrefixIterator + '_>, Error> {
		Ok(Box::new(RocksPrefixIterator::new(&self.db, lower_bound)) as Box<dyn PrefixIterator + '_>)
	}

	fn checkpoint(&self, path: &Path) -> Result<(), Error> {
		let cp = Checkpoint::new(&self.db).map_err(Error::from)?;
		cp.create_checkpoint(path).map_err(Error::from)?;
		Ok(())
	}

	fn compact(&self, lo: Option<&[u8]>, hi: Option<&[u8]>) -> Result<(), Error> {
		self.db.compact_range(lo, hi);
		Ok(())
	}

	fn close(&self) -> Result<(), Error> {
		self.db.flush().map_err(Error::from)
	}

	fn supports_ttl(&self) -> bool {
		true
	}

	fn needs_value_log_gc(&self) -> bool {
		// Deleted/expired multipart blobs linger in SST files until a
		// compaction visits them; the value-log GC ticker nudges that along
		// on a schedule instead of waiting for rocksdb's own heuristics.
		true
	}

	fn gc_value_log(&self, _discard_ratio: f64) -> Result<bool, Error> {
		self.db.compact_range::<&[u8], &[u8]>(None, None);
		Ok(true)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use mktemp::Temp;

	#[test]
	fn set_get_delete_roundtrip() {
		let dir = Temp::new_dir().unwrap();
		let engine = EngineA::open(&dir, 16).unwrap();
		engine.set(b"k1", b"v1", Durability::Deferred).unwrap();
		assert_eq!(engine.get(b"k1").unwrap(), Some(b"v1".to_vec()));
		engine.delete(b"k1").unwrap();
		assert_eq!(engine.get(b"k1").unwrap(), None);
	}

	#[test]
	fn batch_is_atomic() {
		let dir = Temp::new_dir().unwrap();
		let engine = EngineA::open(&dir, 16).unwrap();
		let mut batch = engine.new_batch();
		batch.set(b"a", b"1");
		batch.set(b"b", b"2");
		batch.commit(Durability::Deferred).unwrap();
		assert_eq!(engine.get(b"a").unwrap(), Some(b"1".to_vec()));
		assert_eq!(engine.get(b"b").unwrap(), Some(b"2".to_vec()));
	}

	#[test]
	fn prefix_iterator_bounded() {
		let dir = Temp::new_dir().unwrap();
		let engine = EngineA::open(&dir, 16).unwrap();
		// "bucket:" sorts before "obj:b:", so a prefix iterator over
		// "obj:b:" must never surface it from `first()`.
		engine.set(b"bucket:t:b", b"x", Durability::Deferred).unwrap();
		for k in ["obj:b:a", "obj:b:b", "obj:b:c", "obj:c:a"] {
			engine.set(k.as_bytes(), b"x", Durability::Deferred).unwrap();
		}
		let mut it = engine.new_prefix_iterator(b"obj:b:").unwrap();
		it.first().unwrap();
		let mut seen = Vec::new();
		while it.valid() {
			seen.push(String::from_utf8(it.key().to_vec()).unwrap());
			it.next().unwrap();
		}
		assert_eq!(seen, vec!["obj:b:a", "obj:b:b", "obj:b:c"]);
	}
}
