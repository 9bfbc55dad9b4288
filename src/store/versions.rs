//! Versioning operations.

use std::collections::BTreeSet;

use metakv_db::Durability;
use metakv_util::key_schema::{self, object_key, object_prefix, version_bucket_prefix, version_key, version_prefix};
use metakv_util::Error;

use crate::records::{decode, encode, ObjectMetadata, ObjectVersion};
use crate::store::Store;

impl Store {
	/// If `version.is_latest`, every pre-existing `isLatest=true` version
	/// for the same `(bucket, key)` is flipped to `false` in the same batch
	/// (latest-version uniqueness). Always writes the new
	/// version record; if `is_latest`, also writes `obj`'s main record.
	pub fn put_object_version(&self, obj: &ObjectMetadata, mut version: ObjectVersion) -> Result<(), Error> {
		let mut batch = self.engine.new_batch();

		if version.is_latest {
			let prefix = version_prefix(&obj.bucket, &obj.key);
			let mut it = self.engine.new_prefix_iterator(prefix.as_bytes())?;
			it.first()?;
			while it.valid() {
				let mut existing: ObjectVersion = decode(it.value())?;
				if existing.is_latest && existing.version_id != version.version_id {
					existing.is_latest = false;
					batch.set(it.key(), &encode(&existing)?);
				}
				it.next()?;
			}
		}

		if version.bucket.is_empty() {
			version.bucket = obj.bucket.clone();
		}
		if version.key.is_empty() {
			version.key = obj.key.clone();
		}

		let vkey = version_key(&obj.bucket, &obj.key, &version.version_id);
		batch.set(vkey.as_bytes(), &encode(&version)?);

		if version.is_latest {
			let okey = object_key(&obj.bucket, &obj.key);
			batch.set(okey.as_bytes(), &encode(obj)?);
		}

		batch.commit(Durability::Deferred)?;
		Ok(())
	}

	/// All versions of `(bucket, key)`, sorted by `last_modified`
	/// descending.
	pub fn get_object_versions(&self, bucket: &str, key: &str) -> Result<Vec<ObjectVersion>, Error> {
		let prefix = version_prefix(bucket, key);
		let mut it = self.engine.new_prefix_iterator(prefix.as_bytes())?;
		it.first()?;
		let mut out = Vec::new();
		while it.valid() {
			out.push(decode::<ObjectVersion>(it.value())?);
			it.next()?;
		}
		out.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
		Ok(out)
	}

	/// Two passes inside one logical view:
	/// 1. Scan `version:<bucket>:`, prefix-filtered, until `max_keys`.
	/// 2. If budget remains, scan `obj:<bucket>:` and synthesize a
	///    pseudo-version (empty `versionID`, `isLatest=true`) for any key
	///    that had no version records, so non-versioned objects still show
	///    up in a versioning-aware listing.
	/// The union is sorted by key ascending, then `last_modified` descending.
	pub fn list_all_object_versions(&self, bucket: &str, prefix: &str, max_keys: i64) -> Result<Vec<ObjectVersion>, Error> {
		let max_keys = if max_keys <= 0 {
			self.config.default_list_max_keys
		} else {
			max_keys as usize
		};

		let mut out = Vec::new();
		let mut keys_with_versions: BTreeSet<String> = BTreeSet::new();

		let vprefix = version_bucket_prefix(bucket);
		let mut it = self.engine.new_prefix_iterator(vprefix.as_bytes())?;
		it.first()?;
		while it.valid() && out.len() < max_keys {
			if let Some((object_key, _version_id)) = key_schema::split_version_key(
				std::str::from_utf8(it.key()).unwrap_or(""),
				bucket,
			) {
				keys_with_versions.insert(object_key.to_string());
				if prefix.is_empty() || object_key.starts_with(prefix) {
					out.push(decode::<ObjectVersion>(it.value())?);
				}
			}
			it.next()?;
		}

		if out.len() < max_keys {
			let oprefix = if prefix.is_empty() {
				object_prefix(bucket)
			} else {
				object_key(bucket, prefix)
			};
			let mut oit = self.engine.new_prefix_iterator(oprefix.as_bytes())?;
			oit.first()?;
			while oit.valid() && out.len() < max_keys {
				let o: ObjectMetadata = decode(oit.value())?;
				if !keys_with_versions.contains(&o.key) {
					out.push(ObjectVersion::synthetic_latest(&o));
				}
				oit.next()?;
			}
		}

		out.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| b.last_modified.cmp(&a.last_modified)));
		Ok(out)
	}

	pub fn delete_object_version(&self, bucket: &str, key: &str, version_id: &str) -> Result<(), Error> {
		let vkey = version_key(bucket, key, version_id);
		if self.engine.get(vkey.as_bytes())?.is_none() {
			return Err(Error::VersionNotFound(format!("{}/{}@{}", bucket, key, version_id)));
		}
		self.engine.delete(vkey.as_bytes())?;
		Ok(())
	}
}

#[cfg(all(test, feature = "engine-b"))]
mod test {
	use super::*;
	use crate::test_support::test_store;

	#[test]
	fn latest_flag_moves_to_newest_version() {
		let store = test_store();
		let obj = ObjectMetadata::new("b1", "k1");

		let mut v1 = ObjectVersion::new("b1", "k1", "v1");
		v1.is_latest = true;
		store.put_object_version(&obj, v1).unwrap();

		let mut v2 = ObjectVersion::new("b1", "k1", "v2");
		v2.is_latest = true;
		store.put_object_version(&obj, v2).unwrap();

		let versions = store.get_object_versions("b1", "k1").unwrap();
		assert_eq!(versions.len(), 2);
		let latest: Vec<_> = versions.iter().filter(|v| v.is_latest).collect();
		assert_eq!(latest.len(), 1);
		assert_eq!(latest[0].version_id, "v2");
	}

	#[test]
	fn non_versioned_objects_show_up_as_synthetic_latest() {
		let store = test_store();
		let tok = metakv_util::background::CancellationToken::never();
		store.put_object(ObjectMetadata::new("b1", "plain"), &tok).unwrap();

		let all = store.list_all_object_versions("b1", "", 0).unwrap();
		assert_eq!(all.len(), 1);
		assert_eq!(all[0].key, "plain");
		assert!(all[0].is_latest);
		assert_eq!(all[0].version_id, "");
	}

	#[test]
	fn delete_missing_version_is_not_found() {
		let store = test_store();
		let err = store.delete_object_version("b1", "k1", "nope").unwrap_err();
		assert!(matches!(err, Error::VersionNotFound(_)));
	}
}
