//! Tag operations.

use std::collections::BTreeMap;

use metakv_db::Durability;
use metakv_util::key_schema::{self, object_key, tag_idx_prefix};
use metakv_util::{time, Error};

use crate::records::{decode, encode, ObjectMetadata};
use crate::store::Store;

impl Store {
	/// Reads the object, in one batch deletes every current tag-index
	/// entry, writes the replacement tag map into the object record with a
	/// refreshed `updated_at`, and adds the new tag-index entries.
	pub fn put_object_tags(&self, bucket: &str, key: &str, tags: BTreeMap<String, String>) -> Result<(), Error> {
		let okey = object_key(bucket, key);
		let bytes = self
			.engine
			.get(okey.as_bytes())?
			.ok_or_else(|| Error::ObjectNotFound(format!("{}/{}", bucket, key)))?;
		let mut o: ObjectMetadata = decode(&bytes)?;

		let mut batch = self.engine.new_batch();
		for (tk, tv) in &o.tags {
			let idx = key_schema::tag_idx_key(bucket, tk, tv, key);
			batch.delete(idx.as_bytes());
		}

		o.tags = tags;
		o.updated_at = time::now();
		batch.set(okey.as_bytes(), &encode(&o)?);

		for (tk, tv) in &o.tags {
			let idx = key_schema::tag_idx_key(bucket, tk, tv, key);
			batch.set(idx.as_bytes(), &[]);
		}

		batch.commit(Durability::Deferred)?;
		Ok(())
	}

	pub fn delete_object_tags(&self, bucket: &str, key: &str) -> Result<(), Error> {
		self.put_object_tags(bucket, key, BTreeMap::new())
	}

	/// Never returns `None`: an empty map on a tagless object.
	pub fn get_object_tags(&self, bucket: &str, key: &str) -> Result<BTreeMap<String, String>, Error> {
		Ok(self.get_object(bucket, key, None)?.tags)
	}

	/// Requires at least one `(tagKey, tagValue)` pair. Picks any one pair
	/// to drive a prefix scan of `tag_idx:<bucket>:<tagKey>:<tagValue>:`,
	/// collects candidate object keys, fetches each and filters by the full
	/// conjunction of required tags (AND semantics).
	pub fn list_objects_by_tags(&self, bucket: &str, tags: &BTreeMap<String, String>) -> Result<Vec<ObjectMetadata>, Error> {
		let (drive_key, drive_value) = tags
			.iter()
			.next()
			.ok_or_else(|| Error::Message("list_objects_by_tags requires at least one tag".into()))?;

		let prefix = tag_idx_prefix(bucket, drive_key, drive_value);
		let mut it = self.engine.new_prefix_iterator(prefix.as_bytes())?;
		it.first()?;

		let mut candidates = Vec::new();
		while it.valid() {
			if let Some(object_key) = key_schema::split_tag_idx_key(std::str::from_utf8(it.key()).unwrap_or(""), bucket, drive_key, drive_value) {
				candidates.push(object_key.to_string());
			}
			it.next()?;
		}

		let mut out = Vec::new();
		for key in candidates {
			match self.get_object(bucket, &key, None) {
				Ok(o) => {
					if tags.iter().all(|(k, v)| o.tags.get(k) == Some(v)) {
						out.push(o);
					}
				}
				Err(e) if e.is_precondition() => {
					// Raced with a delete between the index scan and the
					// fetch; treat as not matching rather than erroring.
				}
				Err(e) => return Err(e),
			}
		}
		Ok(out)
	}
}

#[cfg(all(test, feature = "engine-b"))]
mod test {
	use super::*;
	use crate::test_support::test_store;
	use metakv_util::background::CancellationToken;

	fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
		pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}

	#[test]
	fn list_objects_by_tags_requires_full_conjunction() {
		let store = test_store();
		let tok = CancellationToken::never();

		let mut o1 = ObjectMetadata::new("b", "k");
		o1.size = 100;
		o1.tags = tags(&[("env", "prod"), ("team", "x")]);
		store.put_object(o1, &tok).unwrap();

		let mut o2 = ObjectMetadata::new("b", "k2");
		o2.size = 200;
		o2.tags = tags(&[("env", "prod")]);
		store.put_object(o2, &tok).unwrap();

		let result = store.list_objects_by_tags("b", &tags(&[("env", "prod"), ("team", "x")])).unwrap();
		assert_eq!(result.len(), 1);
		assert_eq!(result[0].key, "k");
	}

	#[test]
	fn put_object_tags_replaces_and_reindexes() {
		let store = test_store();
		let tok = CancellationToken::never();
		let mut o = ObjectMetadata::new("b", "k");
		o.tags = tags(&[("a", "1")]);
		store.put_object(o, &tok).unwrap();

		store.put_object_tags("b", "k", tags(&[("b", "2")])).unwrap();

		assert_eq!(store.get_object_tags("b", "k").unwrap(), tags(&[("b", "2")]));
		let old_idx = key_schema::tag_idx_key("b", "a", "1", "k");
		assert!(store.engine.get(old_idx.as_bytes()).unwrap().is_none());
	}
}
