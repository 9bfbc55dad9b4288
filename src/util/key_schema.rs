//! Pure functions that compose and decompose the textual key schema.
//!
//! All keys are US-ASCII, colon-separated, and chosen so that every list
//! operation in the entity store (list-objects, list-versions, list-parts,
//! list-multipart, search-by-tag) is a single bounded prefix scan. `<bucket>`
//! may itself contain an embedded `<tenantID>/<name>` path; this module never
//! interprets that internal structure, it only composes/splits on the
//! outermost colons.

/// Width parts are zero-padded to so lexicographic order matches numeric
/// order for any part number up to `99_999`.
pub const PART_NUMBER_WIDTH: usize = 5;

pub fn bucket_key(tenant_id: &str, name: &str) -> String {
	format!("bucket:{}:{}", tenant_id, name)
}

pub const BUCKET_PREFIX: &str = "bucket:";

pub fn bucket_prefix_for_tenant(tenant_id: &str) -> String {
	format!("bucket:{}:", tenant_id)
}

/// Recovers `(tenant_id, name)` from a `bucket:<tenantID>:<name>` key.
pub fn split_bucket_key(key: &str) -> Option<(&str, &str)> {
	let rest = key.strip_prefix(BUCKET_PREFIX)?;
	rest.split_once(':')
}

pub fn object_key(bucket: &str, object: &str) -> String {
	format!("obj:{}:{}", bucket, object)
}

pub fn object_prefix(bucket: &str) -> String {
	format!("obj:{}:", bucket)
}

/// Recovers the trailing object key from an `obj:<bucket>:<objectKey>` key,
/// given the `bucket` the caller already knows.
pub fn split_object_key<'k>(key: &'k str, bucket: &str) -> Option<&'k str> {
	key.strip_prefix(&object_prefix(bucket))
}

pub fn version_key(bucket: &str, object: &str, version_id: &str) -> String {
	format!("version:{}:{}:{}", bucket, object, version_id)
}

pub fn version_prefix(bucket: &str, object: &str) -> String {
	format!("version:{}:{}:", bucket, object)
}

pub fn version_bucket_prefix(bucket: &str) -> String {
	format!("version:{}:", bucket)
}

/// Recovers `(objectKey, versionID)` from a `version:<bucket>:<objectKey>:<versionID>` key,
/// given the `bucket` the caller already knows. The object key may itself
/// contain colons, so the version id is always the final segment.
pub fn split_version_key<'k>(key: &'k str, bucket: &str) -> Option<(&'k str, &'k str)> {
	let rest = key.strip_prefix(&version_bucket_prefix(bucket))?;
	rest.rsplit_once(':')
}

pub fn multipart_key(upload_id: &str) -> String {
	format!("multipart:{}", upload_id)
}

pub const MULTIPART_PREFIX: &str = "multipart:";

pub fn multipart_idx_key(bucket: &str, upload_id: &str) -> String {
	format!("multipart_idx:{}:{}", bucket, upload_id)
}

/// Unscoped prefix over every bucket's multipart index entries, used by the
/// TTL reaper which has no single bucket to scope its scan to.
pub const MULTIPART_IDX_PREFIX: &str = "multipart_idx:";

pub fn multipart_idx_prefix(bucket: &str) -> String {
	format!("multipart_idx:{}:", bucket)
}

pub fn split_multipart_idx_key<'k>(key: &'k str, bucket: &str) -> Option<&'k str> {
	key.strip_prefix(&multipart_idx_prefix(bucket))
}

/// Recovers `(bucket, uploadID)` from a `multipart_idx:<bucket>:<uploadID>`
/// key without already knowing the bucket, for scans over
/// [`MULTIPART_IDX_PREFIX`] across every bucket.
pub fn split_multipart_idx_key_any_bucket(key: &str) -> Option<(&str, &str)> {
	let rest = key.strip_prefix(MULTIPART_IDX_PREFIX)?;
	rest.split_once(':')
}

pub fn part_key(upload_id: &str, part_number: u32) -> String {
	format!(
		"part:{}:{:0width$}",
		upload_id,
		part_number,
		width = PART_NUMBER_WIDTH
	)
}

pub fn part_prefix(upload_id: &str) -> String {
	format!("part:{}:", upload_id)
}

/// Recovers the numeric part number from a `part:<uploadID>:<partNumber>` key.
pub fn split_part_key(key: &str, upload_id: &str) -> Option<u32> {
	let rest = key.strip_prefix(&part_prefix(upload_id))?;
	rest.parse().ok()
}

pub fn tag_idx_key(bucket: &str, tag_key: &str, tag_value: &str, object_key: &str) -> String {
	format!("tag_idx:{}:{}:{}:{}", bucket, tag_key, tag_value, object_key)
}

pub fn tag_idx_prefix(bucket: &str, tag_key: &str, tag_value: &str) -> String {
	format!("tag_idx:{}:{}:{}:", bucket, tag_key, tag_value)
}

/// Recovers the trailing object key from a
/// `tag_idx:<bucket>:<tagKey>:<tagValue>:<objectKey>` key.
pub fn split_tag_idx_key<'k>(
	key: &'k str,
	bucket: &str,
	tag_key: &str,
	tag_value: &str,
) -> Option<&'k str> {
	key.strip_prefix(&tag_idx_prefix(bucket, tag_key, tag_value))
}

/// Reserved prefix for the metrics-history subsystem's raw-KV keys. Never
/// produced or consumed by the entity store.
pub const METRICS_PREFIX: &str = "metrics:";

/// Lexicographic successor of a prefix, i.e. the exclusive upper bound of
/// the `[prefix, upper_bound)` range that a prefix scan must stay within.
/// `None` if the prefix is empty or consists entirely of `0xff` bytes (an
/// unbounded scan is required in that degenerate case).
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
	let mut upper = prefix.to_vec();
	while let Some(&last) = upper.last() {
		if last == 0xff {
			upper.pop();
		} else {
			*upper.last_mut().unwrap() += 1;
			return Some(upper);
		}
	}
	None
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn bucket_key_roundtrip() {
		let k = bucket_key("tenant-1", "my-bucket");
		assert_eq!(k, "bucket:tenant-1:my-bucket");
		assert_eq!(split_bucket_key(&k), Some(("tenant-1", "my-bucket")));
	}

	#[test]
	fn object_key_roundtrip() {
		let bucket = "t1/b1";
		let k = object_key(bucket, "path/to/key.txt");
		assert_eq!(split_object_key(&k, bucket), Some("path/to/key.txt"));
	}

	#[test]
	fn version_key_roundtrip_with_colon_in_object_key() {
		let bucket = "t1/b1";
		let k = version_key(bucket, "weird:key", "v1");
		assert_eq!(split_version_key(&k, bucket), Some(("weird:key", "v1")));
	}

	#[test]
	fn part_key_zero_padded_sorts_numerically() {
		let mut keys = vec![part_key("u", 10), part_key("u", 2), part_key("u", 1)];
		keys.sort();
		assert_eq!(keys, vec![part_key("u", 1), part_key("u", 2), part_key("u", 10)]);
		assert_eq!(split_part_key(&keys[2], "u"), Some(10));
	}

	#[test]
	fn prefix_upper_bound_increments_last_byte() {
		assert_eq!(prefix_upper_bound(b"obj:b:"), Some(b"obj:b;".to_vec()));
	}

	#[test]
	fn prefix_upper_bound_none_for_all_0xff() {
		assert_eq!(prefix_upper_bound(&[0xff, 0xff]), None);
	}
}
