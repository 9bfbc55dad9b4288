//! Raw-KV facade: a narrower get/put/delete/batch/scan/gc view of the same
//! engine handle, reserved by convention to the `metrics:*` key prefix so the
//! metrics-history subsystem can store its own keys without any
//! cross-knowledge of the entity schema layered on top by the rest of this
//! crate. The two namespaces never collide because every entity key starts
//! with one of a closed set of prefixes and `metrics:` is not among them.

use metakv_db::{Durability, KvEngine};
use metakv_util::Error;

pub struct RawKv<'a> {
	engine: &'a dyn KvEngine,
}

impl<'a> RawKv<'a> {
	pub(crate) fn new(engine: &'a dyn KvEngine) -> Self {
		RawKv { engine }
	}

	/// `NotFound` uniformly (the facade has no entity-specific error
	/// vocabulary of its own).
	pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, Error> {
		self.engine
			.get(key)?
			.ok_or_else(|| Error::NotFound(String::from_utf8_lossy(key).into_owned()))
	}

	pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Error> {
		self.engine.set(key, value, Durability::Deferred).map_err(Error::from)
	}

	pub fn delete(&self, key: &[u8]) -> Result<(), Error> {
		self.engine.delete(key).map_err(Error::from)
	}

	/// Applies every `(key, value)` in `sets` and every key in `deletes`
	/// atomically.
	pub fn batch(&self, sets: &[(Vec<u8>, Vec<u8>)], deletes: &[Vec<u8>]) -> Result<(), Error> {
		let mut batch = self.engine.new_batch();
		for (k, v) in sets {
			batch.set(k, v);
		}
		for k in deletes {
			batch.delete(k);
		}
		batch.commit(Durability::Deferred).map_err(Error::from)
	}

	/// Invokes `f` with owned copies of `(key, value)` for every entry in
	/// `[prefix, prefix++)` starting at `start_key` (or the start of the
	/// prefix if empty); stops early the moment `f` returns `false`.
	pub fn scan(&self, prefix: &[u8], start_key: &[u8], mut f: impl FnMut(&[u8], &[u8]) -> bool) -> Result<(), Error> {
		let mut it = self.engine.new_prefix_iterator(prefix)?;
		if start_key.is_empty() {
			it.first()?;
		} else {
			it.seek_ge(start_key)?;
		}
		while it.valid() {
			if !f(it.key(), it.value()) {
				break;
			}
			it.next()?;
		}
		Ok(())
	}

	/// Requests engine-level space reclamation. No-op (`Ok(false)`) on
	/// engines that compact automatically.
	pub fn gc(&self) -> Result<bool, Error> {
		self.engine.gc_value_log(0.5).map_err(Error::from)
	}
}
