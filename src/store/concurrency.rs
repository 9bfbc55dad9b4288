//! Shared mutable state the entity store needs beyond what the engine's
//! batch atomicity already gives it: a process-wide mutex serializing bucket
//! creation, and a lazily materialized per-bucket mutex map serializing
//! metric read-modify-writes. Modeled the way
//! `garage_model` keeps a single outer mutex around a per-entity registry
//! (e.g. its background variable map) rather than one lock per call site.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Held across the full `bucket:` prefix uniqueness scan and the subsequent
/// write in `CreateBucket`, so two concurrent creations of the same name
/// never both observe "absent" and both proceed to write.
#[derive(Default)]
pub struct CreationLock(Mutex<()>);

impl CreationLock {
	pub fn new() -> Self {
		CreationLock(Mutex::new(()))
	}

	pub fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
		self.0.lock().unwrap_or_else(|e| e.into_inner())
	}
}

/// `bucketKey -> Mutex<()>`, entries created on first use and never evicted
/// (their footprint is O(buckets)). Writers to the same
/// bucket never race; writers to different buckets never contend on this
/// map itself, only briefly while fetching/inserting their own entry.
#[derive(Default)]
pub struct BucketLocks {
	map: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BucketLocks {
	pub fn new() -> Self {
		BucketLocks {
			map: Mutex::new(HashMap::new()),
		}
	}

	/// Returns the (possibly freshly created) mutex for `bucket_key`. Callers
	/// lock it themselves around their read-modify-write; the returned `Arc`
	/// keeps it alive even if another thread is racing to insert the same
	/// entry.
	pub fn get(&self, bucket_key: &str) -> Arc<Mutex<()>> {
		let mut guard = self.map.lock().unwrap_or_else(|e| e.into_inner());
		guard
			.entry(bucket_key.to_string())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::sync::atomic::{AtomicI64, Ordering};
	use std::thread;

	#[test]
	fn concurrent_updates_to_same_bucket_are_serialized() {
		let locks = Arc::new(BucketLocks::new());
		let counter = Arc::new(AtomicI64::new(0));
		let mut handles = Vec::new();
		for _ in 0..32 {
			let locks = locks.clone();
			let counter = counter.clone();
			handles.push(thread::spawn(move || {
				let m = locks.get("bucket:t:b");
				let _g = m.lock().unwrap();
				let v = counter.load(Ordering::SeqCst);
				thread::yield_now();
				counter.store(v + 1, Ordering::SeqCst);
			}));
		}
		for h in handles {
			h.join().unwrap();
		}
		assert_eq!(counter.load(Ordering::SeqCst), 32);
	}

	#[test]
	fn different_buckets_get_different_mutexes() {
		let locks = BucketLocks::new();
		let a = locks.get("bucket:t:a");
		let b = locks.get("bucket:t:b");
		assert!(!Arc::ptr_eq(&a, &b));
		let a2 = locks.get("bucket:t:a");
		assert!(Arc::ptr_eq(&a, &a2));
	}
}
