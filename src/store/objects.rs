//! Object operations.

use metakv_db::Durability;
use metakv_util::background::CancellationToken;
use metakv_util::key_schema::{self, object_key, object_prefix, version_key};
use metakv_util::{time, Error};

use crate::records::{decode, encode, ObjectMetadata};
use crate::store::Store;

const DELETE_RETRY_BACKOFFS_MS: &[u64] = &[1, 2, 4, 8, 16];

pub struct ListObjectsResult {
	pub objects: Vec<ObjectMetadata>,
	pub next_marker: Option<String>,
}

impl Store {
	/// Rejects empty bucket or key with `InvalidKey`. Sets `created_at` (if
	/// zero), `updated_at`, and `last_modified` to now; writes the object
	/// record plus one tag-index entry per `(tagKey, tagValue)` pair in a
	/// single batch.
	pub fn put_object(&self, mut o: ObjectMetadata, token: &CancellationToken) -> Result<(), Error> {
		Store::check_cancel(token)?;
		if o.bucket.is_empty() || o.key.is_empty() {
			return Err(Error::InvalidKey(format!("{}/{}", o.bucket, o.key)));
		}

		let now = time::now();
		if time::is_zero(o.created_at) {
			o.created_at = now;
		}
		o.updated_at = now;
		o.last_modified = now;

		let key = object_key(&o.bucket, &o.key);
		let mut batch = self.engine.new_batch();
		batch.set(key.as_bytes(), &encode(&o)?);
		for (tk, tv) in &o.tags {
			let idx = key_schema::tag_idx_key(&o.bucket, tk, tv, &o.key);
			batch.set(idx.as_bytes(), &[]);
		}
		batch.commit(Durability::Deferred)?;
		Ok(())
	}

	/// Point get of the latest record, or of a specific historical version
	/// if `version_id` is `Some`. Decoded records have their `bucket`/`key`
	/// fields backfilled if the stored record omitted them.
	pub fn get_object(&self, bucket: &str, key: &str, version_id: Option<&str>) -> Result<ObjectMetadata, Error> {
		let (storage_key, not_found_label) = match version_id {
			Some(v) => (version_key(bucket, key, v), format!("{}/{}@{}", bucket, key, v)),
			None => (object_key(bucket, key), format!("{}/{}", bucket, key)),
		};
		let bytes = self
			.engine
			.get(storage_key.as_bytes())?
			.ok_or_else(|| Error::ObjectNotFound(not_found_label))?;

		let mut o: ObjectMetadata = match version_id {
			Some(_) => {
				let v: crate::records::ObjectVersion = decode(&bytes)?;
				object_metadata_from_version(bucket, key, v)
			}
			None => decode(&bytes)?,
		};
		if o.bucket.is_empty() {
			o.bucket = bucket.to_string();
		}
		if o.key.is_empty() {
			o.key = key.to_string();
		}
		Ok(o)
	}

	pub fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, Error> {
		Ok(self.engine.get(object_key(bucket, key).as_bytes())?.is_some())
	}

	/// Reads the record to recover its tag map, then in one batch deletes
	/// the object record plus all of its tag-index entries. Retries up to 5
	/// times with 1/2/4/8/16ms backoff on a transient batch conflict before
	/// surfacing the error.
	pub fn delete_object(&self, bucket: &str, key: &str, version_id: Option<&str>, token: &CancellationToken) -> Result<(), Error> {
		Store::check_cancel(token)?;

		if version_id.is_some() {
			return self.delete_object_version(bucket, key, version_id.unwrap());
		}

		let storage_key = object_key(bucket, key);
		let mut attempt = 0usize;
		loop {
			let existing = self.engine.get(storage_key.as_bytes())?;
			let tags = match &existing {
				Some(bytes) => decode::<ObjectMetadata>(bytes)?.tags,
				None => return Err(Error::ObjectNotFound(format!("{}/{}", bucket, key))),
			};

			let mut batch = self.engine.new_batch();
			batch.delete(storage_key.as_bytes());
			for (tk, tv) in &tags {
				let idx = key_schema::tag_idx_key(bucket, tk, tv, key);
				batch.delete(idx.as_bytes());
			}

			match batch.commit(Durability::Deferred) {
				Ok(()) => return Ok(()),
				Err(e) if attempt < DELETE_RETRY_BACKOFFS_MS.len() => {
					warn!("delete_object batch conflict on {}/{}, retrying: {}", bucket, key, e);
					std::thread::sleep(std::time::Duration::from_millis(DELETE_RETRY_BACKOFFS_MS[attempt]));
					attempt += 1;
				}
				Err(e) => return Err(Error::from(e)),
			}
		}
	}

	/// Lexicographic scan of `obj:<bucket>:<prefix>`, resuming strictly
	/// after `marker` (exclusive), capped at `max_keys` (default 1000 when
	/// the caller passes `<= 0`).
	pub fn list_objects(&self, bucket: &str, prefix: &str, marker: &str, max_keys: i64) -> Result<ListObjectsResult, Error> {
		let max_keys = if max_keys <= 0 {
			self.config.default_list_max_keys
		} else {
			max_keys as usize
		};

		let lower_bound = if prefix.is_empty() {
			object_prefix(bucket)
		} else {
			object_key(bucket, prefix)
		};

		let mut it = self.engine.new_prefix_iterator(lower_bound.as_bytes())?;
		if marker.is_empty() {
			it.first()?;
		} else {
			it.seek_ge(object_key(bucket, marker).as_bytes())?;
			// Exclusive marker: if the cursor landed exactly on the marker
			// key, skip past it; otherwise it's already positioned on the
			// first key strictly after the marker.
			if it.valid()
				&& key_schema::split_object_key(std::str::from_utf8(it.key()).unwrap_or(""), bucket) == Some(marker)
			{
				it.next()?;
			}
		}

		let mut objects = Vec::new();
		let mut next_marker = None;
		while it.valid() {
			if objects.len() == max_keys {
				let k = std::str::from_utf8(it.key()).unwrap_or("");
				next_marker = key_schema::split_object_key(k, bucket).map(|s| s.to_string());
				break;
			}
			let mut o: ObjectMetadata = decode(it.value())?;
			if o.bucket.is_empty() {
				o.bucket = bucket.to_string();
			}
			objects.push(o);
			it.next()?;
		}

		Ok(ListObjectsResult { objects, next_marker })
	}
}

pub(crate) fn object_metadata_from_version(bucket: &str, key: &str, v: crate::records::ObjectVersion) -> ObjectMetadata {
	let mut o = ObjectMetadata::new(bucket, key);
	o.size = v.size;
	o.etag = v.etag;
	o.storage_class = v.storage_class;
	o.last_modified = v.last_modified;
	o.updated_at = v.last_modified;
	o.created_at = v.last_modified;
	o
}

#[cfg(all(test, feature = "engine-b"))]
mod test {
	use super::*;
	use crate::test_support::test_store;

	#[test]
	fn rejects_empty_bucket_or_key() {
		let store = test_store();
		let tok = CancellationToken::never();
		let err = store.put_object(ObjectMetadata::new("", "k"), &tok).unwrap_err();
		assert!(matches!(err, Error::InvalidKey(_)));
		let err = store.put_object(ObjectMetadata::new("b", ""), &tok).unwrap_err();
		assert!(matches!(err, Error::InvalidKey(_)));
	}

	#[test]
	fn put_then_get_round_trips() {
		let store = test_store();
		let tok = CancellationToken::never();
		let mut o = ObjectMetadata::new("b1", "k1");
		o.size = 100;
		o.etag = "abc".into();
		store.put_object(o.clone(), &tok).unwrap();

		let got = store.get_object("b1", "k1", None).unwrap();
		assert_eq!(got.size, 100);
		assert_eq!(got.etag, "abc");
	}

	#[test]
	fn list_objects_respects_exclusive_marker_and_max_keys() {
		let store = test_store();
		let tok = CancellationToken::never();
		for k in ["a", "b", "c", "d"] {
			store.put_object(ObjectMetadata::new("b1", k), &tok).unwrap();
		}

		let page = store.list_objects("b1", "", "", 2).unwrap();
		assert_eq!(page.objects.iter().map(|o| o.key.clone()).collect::<Vec<_>>(), vec!["a", "b"]);
		assert_eq!(page.next_marker.as_deref(), Some("c"));

		let page2 = store.list_objects("b1", "", "b", 0).unwrap();
		assert_eq!(page2.objects.iter().map(|o| o.key.clone()).collect::<Vec<_>>(), vec!["c", "d"]);
	}

	#[test]
	fn delete_object_removes_tag_index() {
		let store = test_store();
		let tok = CancellationToken::never();
		let mut o = ObjectMetadata::new("b1", "k1");
		o.tags.insert("env".into(), "prod".into());
		store.put_object(o, &tok).unwrap();

		store.delete_object("b1", "k1", None, &tok).unwrap();
		assert!(!store.object_exists("b1", "k1").unwrap());

		let idx_key = key_schema::tag_idx_key("b1", "env", "prod", "k1");
		assert!(store.engine.get(idx_key.as_bytes()).unwrap().is_none());
	}

	#[test]
	fn delete_missing_object_is_not_found() {
		let store = test_store();
		let tok = CancellationToken::never();
		let err = store.delete_object("b1", "nope", None, &tok).unwrap_err();
		assert!(matches!(err, Error::ObjectNotFound(_)));
	}
}
