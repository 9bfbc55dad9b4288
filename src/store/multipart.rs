//! Multipart upload and part operations.

use metakv_db::Durability;
use metakv_util::background::CancellationToken;
use metakv_util::key_schema::{self, multipart_idx_key, multipart_idx_prefix, multipart_key, part_key, part_prefix};
use metakv_util::{time, Error};

use crate::records::{decode, encode, MultipartUploadMetadata, ObjectMetadata, PartMetadata};
use crate::store::Store;

impl Store {
	/// Sets `initiated` to now if zero; writes the upload record and its
	/// secondary `multipart_idx:<bucket>:<uploadID>` entry in one batch. On
	/// engines with native per-key TTL both are stamped with
	/// `multipart_ttl_days`; engines without native TTL rely entirely on the
	/// background reaper.
	pub fn create_multipart_upload(&self, mut u: MultipartUploadMetadata, token: &CancellationToken) -> Result<(), Error> {
		Store::check_cancel(token)?;
		if time::is_zero(u.initiated) {
			u.initiated = time::now();
		}

		let ttl_secs = (self.config.multipart_ttl_days.max(0) as u64) * 24 * 3600;
		let ukey = multipart_key(&u.upload_id);
		let ikey = multipart_idx_key(&u.bucket, &u.upload_id);
		let payload = encode(&u)?;

		if self.engine.supports_ttl() {
			self.engine.set_with_ttl(ukey.as_bytes(), &payload, Durability::Deferred, ttl_secs)?;
			self.engine.set_with_ttl(ikey.as_bytes(), &[], Durability::Deferred, ttl_secs)?;
		} else {
			let mut batch = self.engine.new_batch();
			batch.set(ukey.as_bytes(), &payload);
			batch.set(ikey.as_bytes(), &[]);
			batch.commit(Durability::Deferred)?;
		}
		Ok(())
	}

	pub fn get_multipart_upload(&self, upload_id: &str) -> Result<MultipartUploadMetadata, Error> {
		let key = multipart_key(upload_id);
		let bytes = self
			.engine
			.get(key.as_bytes())?
			.ok_or_else(|| Error::UploadNotFound(upload_id.to_string()))?;
		decode(&bytes)
	}

	/// Scans `multipart_idx:<bucket>:` to recover upload IDs, fetches each
	/// upload record, applies the optional prefix on the upload's object
	/// key, caps at `max_uploads` (default 1000), sorted by `initiated`
	/// descending.
	pub fn list_multipart_uploads(&self, bucket: &str, prefix: &str, max_uploads: i64) -> Result<Vec<MultipartUploadMetadata>, Error> {
		let max_uploads = if max_uploads <= 0 {
			self.config.default_list_max_keys
		} else {
			max_uploads as usize
		};

		let idx_prefix = multipart_idx_prefix(bucket);
		let mut it = self.engine.new_prefix_iterator(idx_prefix.as_bytes())?;
		it.first()?;

		let mut out = Vec::new();
		while it.valid() {
			if let Some(upload_id) = key_schema::split_multipart_idx_key(std::str::from_utf8(it.key()).unwrap_or(""), bucket) {
				match self.get_multipart_upload(upload_id) {
					Ok(u) => {
						if prefix.is_empty() || u.key.starts_with(prefix) {
							out.push(u);
						}
					}
					Err(e) if e.is_precondition() => {
						// Index entry outlived the upload record (e.g. a
						// concurrent abort); skip it.
					}
					Err(e) => return Err(e),
				}
			}
			it.next()?;
		}

		out.sort_by(|a, b| b.initiated.cmp(&a.initiated));
		out.truncate(max_uploads);
		Ok(out)
	}

	/// Reads the upload record to learn its bucket, then in one batch
	/// deletes every `part:<uploadID>:` record, the secondary index entry,
	/// and the upload record itself.
	pub fn abort_multipart_upload(&self, upload_id: &str) -> Result<(), Error> {
		let u = self.get_multipart_upload(upload_id)?;
		let mut batch = self.engine.new_batch();
		self.stage_multipart_cleanup(&mut *batch, &u);
		batch.commit(Durability::Deferred)?;
		Ok(())
	}

	/// Same cleanup as `abort_multipart_upload`, plus writing the final
	/// `obj:` record (with freshened timestamps) in the same batch.
	pub fn complete_multipart_upload(&self, upload_id: &str, mut final_obj: ObjectMetadata, token: &CancellationToken) -> Result<(), Error> {
		Store::check_cancel(token)?;
		let u = self.get_multipart_upload(upload_id)?;

		let now = time::now();
		if time::is_zero(final_obj.created_at) {
			final_obj.created_at = now;
		}
		final_obj.updated_at = now;
		final_obj.last_modified = now;
		if final_obj.bucket.is_empty() {
			final_obj.bucket = u.bucket.clone();
		}
		if final_obj.key.is_empty() {
			final_obj.key = u.key.clone();
		}

		let mut batch = self.engine.new_batch();
		self.stage_multipart_cleanup(&mut *batch, &u);
		let okey = key_schema::object_key(&final_obj.bucket, &final_obj.key);
		batch.set(okey.as_bytes(), &encode(&final_obj)?);
		batch.commit(Durability::Deferred)?;
		Ok(())
	}

	fn stage_multipart_cleanup(&self, batch: &mut dyn metakv_db::Batch, u: &MultipartUploadMetadata) {
		let part_prefix = part_prefix(&u.upload_id);
		if let Ok(mut it) = self.engine.new_prefix_iterator(part_prefix.as_bytes()) {
			if it.first().is_ok() {
				while it.valid() {
					batch.delete(it.key());
					if it.next().is_err() {
						break;
					}
				}
			}
		}
		batch.delete(multipart_idx_key(&u.bucket, &u.upload_id).as_bytes());
		batch.delete(multipart_key(&u.upload_id).as_bytes());
	}

	/// Verifies the parent upload exists (`ErrUploadNotFound` otherwise),
	/// sets `last_modified` if zero, writes one record; the part number is
	/// zero-padded in the key so lexicographic iteration visits parts in
	/// numeric order.
	pub fn put_part(&self, mut p: PartMetadata, token: &CancellationToken) -> Result<(), Error> {
		Store::check_cancel(token)?;
		if self.engine.get(multipart_key(&p.upload_id).as_bytes())?.is_none() {
			return Err(Error::UploadNotFound(p.upload_id.clone()));
		}
		if time::is_zero(p.last_modified) {
			p.last_modified = time::now();
		}
		let key = part_key(&p.upload_id, p.part_number);
		self.engine.set(key.as_bytes(), &encode(&p)?, Durability::Deferred)?;
		Ok(())
	}

	pub fn get_part(&self, upload_id: &str, part_number: u32) -> Result<PartMetadata, Error> {
		let key = part_key(upload_id, part_number);
		let bytes = self
			.engine
			.get(key.as_bytes())?
			.ok_or_else(|| Error::PartNotFound(format!("{}#{}", upload_id, part_number)))?;
		decode(&bytes)
	}

	/// Bounded scan sorted by `part_number` ascending (guaranteed by the
	/// zero-padded key encoding).
	pub fn list_parts(&self, upload_id: &str) -> Result<Vec<PartMetadata>, Error> {
		let prefix = part_prefix(upload_id);
		let mut it = self.engine.new_prefix_iterator(prefix.as_bytes())?;
		it.first()?;
		let mut out = Vec::new();
		while it.valid() {
			out.push(decode::<PartMetadata>(it.value())?);
			it.next()?;
		}
		Ok(out)
	}

	/// Global scan of the whole `multipart_idx:` prefix (every bucket),
	/// used only by the TTL reaper to recover candidate upload IDs without a
	/// bucket to scope to.
	pub(crate) fn list_all_upload_ids_for_reaper(&self) -> Result<Vec<String>, Error> {
		let mut it = self.engine.new_prefix_iterator(key_schema::MULTIPART_IDX_PREFIX.as_bytes())?;
		it.first()?;
		let mut out = Vec::new();
		while it.valid() {
			let k = std::str::from_utf8(it.key()).unwrap_or("");
			if let Some((_bucket, upload_id)) = key_schema::split_multipart_idx_key_any_bucket(k) {
				out.push(upload_id.to_string());
			}
			it.next()?;
		}
		Ok(out)
	}
}

#[cfg(all(test, feature = "engine-b"))]
mod test {
	use super::*;
	use crate::test_support::test_store;

	#[test]
	fn list_all_upload_ids_for_reaper_finds_every_bucket() {
		let store = test_store();
		let tok = CancellationToken::never();
		store
			.create_multipart_upload(MultipartUploadMetadata::new("u1", "b1", "big"), &tok)
			.unwrap();
		store
			.create_multipart_upload(MultipartUploadMetadata::new("u2", "b2", "other"), &tok)
			.unwrap();

		let mut ids = store.list_all_upload_ids_for_reaper().unwrap();
		ids.sort();
		assert_eq!(ids, vec!["u1", "u2"]);
	}

	#[test]
	fn put_part_rejects_missing_upload() {
		let store = test_store();
		let tok = CancellationToken::never();
		let err = store.put_part(PartMetadata::new("nope", 1), &tok).unwrap_err();
		assert!(matches!(err, Error::UploadNotFound(_)));
	}

	#[test]
	fn parts_list_in_numeric_order() {
		let store = test_store();
		let tok = CancellationToken::never();
		store
			.create_multipart_upload(MultipartUploadMetadata::new("u1", "b1", "big"), &tok)
			.unwrap();
		store.put_part(PartMetadata::new("u1", 3), &tok).unwrap();
		store.put_part(PartMetadata::new("u1", 1), &tok).unwrap();

		let parts = store.list_parts("u1").unwrap();
		assert_eq!(parts.iter().map(|p| p.part_number).collect::<Vec<_>>(), vec![1, 3]);
	}

	#[test]
	fn abort_clears_parts_and_upload() {
		let store = test_store();
		let tok = CancellationToken::never();
		store
			.create_multipart_upload(MultipartUploadMetadata::new("u1", "b1", "big"), &tok)
			.unwrap();
		store.put_part(PartMetadata::new("u1", 1), &tok).unwrap();

		store.abort_multipart_upload("u1").unwrap();

		assert!(store.list_parts("u1").unwrap().is_empty());
		assert!(matches!(store.get_multipart_upload("u1").unwrap_err(), Error::UploadNotFound(_)));
	}

	#[test]
	fn complete_writes_final_object_and_clears_upload() {
		let store = test_store();
		let tok = CancellationToken::never();
		store
			.create_multipart_upload(MultipartUploadMetadata::new("u1", "b1", "big"), &tok)
			.unwrap();
		store.put_part(PartMetadata::new("u1", 1), &tok).unwrap();

		let mut obj = ObjectMetadata::new("b1", "big");
		obj.size = 42;
		store.complete_multipart_upload("u1", obj, &tok).unwrap();

		assert!(store.list_parts("u1").unwrap().is_empty());
		let got = store.get_object("b1", "big", None).unwrap();
		assert_eq!(got.size, 42);
	}
}
