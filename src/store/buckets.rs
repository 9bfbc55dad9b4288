//! Bucket operations.

use metakv_db::Durability;
use metakv_util::background::CancellationToken;
use metakv_util::key_schema::{self, bucket_key, bucket_prefix_for_tenant, BUCKET_PREFIX};
use metakv_util::{time, Error};

use crate::records::{decode, encode, BucketMetadata};
use crate::store::Store;

impl Store {
	/// Rejects with `BucketAlreadyExists` if either the `(tenantID, name)`
	/// key already exists, or a full scan of the `bucket:` prefix finds any
	/// record with the same `name` under a different tenant (global
	/// uniqueness). Both checks and the write happen inside the
	/// creation mutex's critical section.
	pub fn create_bucket(&self, mut m: BucketMetadata, token: &CancellationToken) -> Result<(), Error> {
		Store::check_cancel(token)?;
		let _guard = self.creation_lock.lock();

		let key = bucket_key(&m.tenant_id, &m.name);
		if self.engine.get(key.as_bytes())?.is_some() {
			return Err(Error::BucketAlreadyExists(m.name));
		}
		if self.find_bucket_by_name(&m.name)?.is_some() {
			return Err(Error::BucketAlreadyExists(m.name));
		}

		let now = time::now();
		if time::is_zero(m.created_at) {
			m.created_at = now;
		}
		m.updated_at = now;

		self.engine.set(key.as_bytes(), &encode(&m)?, Durability::Deferred)?;
		Ok(())
	}

	pub fn get_bucket(&self, tenant_id: &str, name: &str) -> Result<BucketMetadata, Error> {
		let key = bucket_key(tenant_id, name);
		let bytes = self
			.engine
			.get(key.as_bytes())?
			.ok_or_else(|| Error::BucketNotFound(name.to_string()))?;
		decode(&bytes)
	}

	pub fn bucket_exists(&self, tenant_id: &str, name: &str) -> Result<bool, Error> {
		let key = bucket_key(tenant_id, name);
		Ok(self.engine.get(key.as_bytes())?.is_some())
	}

	/// Full `bucket:` scan for the record whose `name` matches, regardless
	/// of tenant. Used both by callers that only know the bucket name and
	/// internally by `create_bucket`'s uniqueness check.
	pub fn get_bucket_by_name(&self, name: &str) -> Result<BucketMetadata, Error> {
		self.find_bucket_by_name(name)?
			.ok_or_else(|| Error::BucketNotFound(name.to_string()))
	}

	fn find_bucket_by_name(&self, name: &str) -> Result<Option<BucketMetadata>, Error> {
		let mut it = self.engine.new_prefix_iterator(BUCKET_PREFIX.as_bytes())?;
		it.first()?;
		while it.valid() {
			let m: BucketMetadata = decode(it.value())?;
			if m.name == name {
				return Ok(Some(m));
			}
			it.next()?;
		}
		Ok(None)
	}

	/// Verifies existence, refreshes `updated_at`, writes. Never used for
	/// counter deltas; see [`Store::update_bucket_metrics`].
	pub fn update_bucket(&self, mut m: BucketMetadata, token: &CancellationToken) -> Result<(), Error> {
		Store::check_cancel(token)?;
		let key = bucket_key(&m.tenant_id, &m.name);
		if self.engine.get(key.as_bytes())?.is_none() {
			return Err(Error::BucketNotFound(m.name));
		}
		m.updated_at = time::now();
		self.engine.set(key.as_bytes(), &encode(&m)?, Durability::Deferred)?;
		Ok(())
	}

	/// Deletes the bucket record only. Objects belonging to the bucket are
	/// out of scope for this operation; cascading, if any, is the caller's
	/// responsibility.
	pub fn delete_bucket(&self, tenant_id: &str, name: &str, token: &CancellationToken) -> Result<(), Error> {
		Store::check_cancel(token)?;
		let key = bucket_key(tenant_id, name);
		if self.engine.get(key.as_bytes())?.is_none() {
			return Err(Error::BucketNotFound(name.to_string()));
		}
		self.engine.delete(key.as_bytes())?;
		Ok(())
	}

	/// If `tenant_id` is empty, scans the full `bucket:` prefix (global
	/// admin view); otherwise scans `bucket:<tenantID>:`.
	pub fn list_buckets(&self, tenant_id: &str) -> Result<Vec<BucketMetadata>, Error> {
		let prefix = if tenant_id.is_empty() {
			BUCKET_PREFIX.to_string()
		} else {
			bucket_prefix_for_tenant(tenant_id)
		};
		let mut it = self.engine.new_prefix_iterator(prefix.as_bytes())?;
		it.first()?;
		let mut out = Vec::new();
		while it.valid() {
			out.push(decode(it.value())?);
			it.next()?;
		}
		Ok(out)
	}

	/// Acquires the per-bucket mutex, reads, applies `(delta_count,
	/// delta_size)`, clamps both to zero on underflow, writes. The hot path
	/// on every object write.
	pub fn update_bucket_metrics(
		&self,
		tenant_id: &str,
		name: &str,
		delta_count: i64,
		delta_size: i64,
	) -> Result<(), Error> {
		let key = bucket_key(tenant_id, name);
		let lock = self.bucket_locks.get(&key);
		let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

		let mut m = self.get_bucket(tenant_id, name)?;
		m.object_count = (m.object_count + delta_count).max(0);
		m.total_size = (m.total_size + delta_size).max(0);
		self.engine.set(key.as_bytes(), &encode(&m)?, Durability::Deferred)?;
		Ok(())
	}

	/// Returns the cached `(objectCount, totalSize)` without rescanning.
	pub fn get_bucket_stats(&self, tenant_id: &str, name: &str) -> Result<(i64, i64), Error> {
		let m = self.get_bucket(tenant_id, name)?;
		Ok((m.object_count, m.total_size))
	}

	/// Scans `obj:<fullBucketPath>:`, summing every non-tombstone record
	/// (empty etag + zero size is treated as a delete marker and excluded),
	/// then rewrites the bucket record under the per-bucket mutex.
	/// `full_bucket_path` is the same string objects/versions use as their
	/// `bucket` field, which may differ from `name` if it embeds a tenant
	/// path.
	pub fn recalculate_bucket_stats(
		&self,
		tenant_id: &str,
		name: &str,
		full_bucket_path: &str,
	) -> Result<(i64, i64), Error> {
		let prefix = key_schema::object_prefix(full_bucket_path);
		let mut it = self.engine.new_prefix_iterator(prefix.as_bytes())?;
		it.first()?;

		let mut count = 0i64;
		let mut size = 0i64;
		while it.valid() {
			let o: crate::records::ObjectMetadata = decode(it.value())?;
			if !o.is_delete_marker() {
				count += 1;
				size += o.size;
			}
			it.next()?;
		}

		let key = bucket_key(tenant_id, name);
		let lock = self.bucket_locks.get(&key);
		let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

		let mut m = self.get_bucket(tenant_id, name)?;
		m.object_count = count;
		m.total_size = size;
		self.engine.set(key.as_bytes(), &encode(&m)?, Durability::Deferred)?;
		Ok((count, size))
	}
}

#[cfg(all(test, feature = "engine-b"))]
mod test {
	use super::*;
	use crate::test_support::test_store;

	#[test]
	fn create_then_get_bucket() {
		let store = test_store();
		let tok = CancellationToken::never();
		let m = BucketMetadata::new("t1", "b1");
		store.create_bucket(m, &tok).unwrap();

		let got = store.get_bucket("t1", "b1").unwrap();
		assert_eq!(got.name, "b1");
		assert!(got.created_at <= got.updated_at);
	}

	#[test]
	fn global_name_uniqueness_across_tenants() {
		let store = test_store();
		let tok = CancellationToken::never();
		store.create_bucket(BucketMetadata::new("t1", "b1"), &tok).unwrap();
		let err = store.create_bucket(BucketMetadata::new("t2", "b1"), &tok).unwrap_err();
		assert!(matches!(err, Error::BucketAlreadyExists(_)));

		let all = store.list_buckets("").unwrap();
		assert_eq!(all.len(), 1);
		assert_eq!(all[0].tenant_id, "t1");
	}

	#[test]
	fn update_bucket_metrics_clamps_to_zero() {
		let store = test_store();
		let tok = CancellationToken::never();
		store.create_bucket(BucketMetadata::new("t1", "b1"), &tok).unwrap();

		store.update_bucket_metrics("t1", "b1", 2, 300).unwrap();
		assert_eq!(store.get_bucket_stats("t1", "b1").unwrap(), (2, 300));

		store.update_bucket_metrics("t1", "b1", -5, -1000).unwrap();
		assert_eq!(store.get_bucket_stats("t1", "b1").unwrap(), (0, 0));
	}

	#[test]
	fn delete_bucket_missing_is_not_found() {
		let store = test_store();
		let tok = CancellationToken::never();
		let err = store.delete_bucket("t1", "nope", &tok).unwrap_err();
		assert!(matches!(err, Error::BucketNotFound(_)));
	}
}
