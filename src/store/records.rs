//! Self-describing, field-tagged records for every entity the store owns.
//! Field sets are additive: unknown JSON fields are captured in
//! `extra` rather than rejected, and absent optional fields default to their
//! type's zero value, so a record written by an older or newer binary always
//! round-trips without silently dropping data.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use metakv_util::types::{ExtraFields, OneOrMany};

/// Scalar-or-list action/resource fields on a policy or ACL statement.
pub type PolicyValue = OneOrMany<String>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyStatement {
	#[serde(default)]
	pub effect: String,
	#[serde(default)]
	pub action: PolicyValue,
	#[serde(default)]
	pub resource: PolicyValue,
	#[serde(flatten)]
	pub extra: ExtraFields,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketPolicy {
	#[serde(default)]
	pub statement: Vec<PolicyStatement>,
	#[serde(flatten)]
	pub extra: ExtraFields,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VersioningConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default)]
	pub mfa_delete: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectLockConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default)]
	pub default_retention_days: Option<u32>,
	#[serde(default)]
	pub default_mode: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleRule {
	#[serde(default)]
	pub id: String,
	#[serde(default)]
	pub enabled: bool,
	#[serde(default)]
	pub prefix: String,
	#[serde(default)]
	pub expiration_days: Option<u32>,
	#[serde(flatten)]
	pub extra: ExtraFields,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorsRule {
	#[serde(default)]
	pub allowed_origins: Vec<String>,
	#[serde(default)]
	pub allowed_methods: Vec<String>,
	#[serde(default)]
	pub allowed_headers: Vec<String>,
	#[serde(default)]
	pub max_age_seconds: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EncryptionConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default)]
	pub algorithm: Option<String>,
	#[serde(default)]
	pub kms_key_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicAccessBlockConfig {
	#[serde(default)]
	pub block_public_acls: bool,
	#[serde(default)]
	pub block_public_policy: bool,
	#[serde(default)]
	pub ignore_public_acls: bool,
	#[serde(default)]
	pub restrict_public_buckets: bool,
}

fn zero_time() -> DateTime<Utc> {
	DateTime::<Utc>::default()
}

/// `bucket:<tenantID>:<name>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BucketMetadata {
	pub tenant_id: String,
	pub name: String,
	#[serde(default)]
	pub owner: String,
	#[serde(default)]
	pub region: String,
	#[serde(default)]
	pub public: bool,
	#[serde(default = "zero_time")]
	pub created_at: DateTime<Utc>,
	#[serde(default = "zero_time")]
	pub updated_at: DateTime<Utc>,
	#[serde(default)]
	pub versioning: VersioningConfig,
	#[serde(default)]
	pub object_lock: ObjectLockConfig,
	#[serde(default)]
	pub policy: Option<BucketPolicy>,
	#[serde(default)]
	pub lifecycle_rules: Vec<LifecycleRule>,
	#[serde(default)]
	pub cors: Vec<CorsRule>,
	#[serde(default)]
	pub encryption: EncryptionConfig,
	#[serde(default)]
	pub public_access_block: PublicAccessBlockConfig,
	#[serde(default)]
	pub tags: BTreeMap<String, String>,
	/// Cached aggregate object count, maintained by `UpdateBucketMetrics` and
	/// rebuilt from scratch by `RecalculateBucketStats`.
	#[serde(default)]
	pub object_count: i64,
	/// Cached aggregate byte total, same lifecycle as `object_count`.
	#[serde(default)]
	pub total_size: i64,
	#[serde(flatten)]
	pub extra: ExtraFields,
}

impl BucketMetadata {
	pub fn new(tenant_id: impl Into<String>, name: impl Into<String>) -> Self {
		BucketMetadata {
			tenant_id: tenant_id.into(),
			name: name.into(),
			owner: String::new(),
			region: String::new(),
			public: false,
			created_at: zero_time(),
			updated_at: zero_time(),
			versioning: VersioningConfig::default(),
			object_lock: ObjectLockConfig::default(),
			policy: None,
			lifecycle_rules: Vec::new(),
			cors: Vec::new(),
			encryption: EncryptionConfig::default(),
			public_access_block: PublicAccessBlockConfig::default(),
			tags: BTreeMap::new(),
			object_count: 0,
			total_size: 0,
			extra: ExtraFields::new(),
		}
	}
}

/// SSE (server-side encryption) details stamped on an object, if any.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SseInfo {
	#[serde(default)]
	pub algorithm: Option<String>,
	#[serde(default)]
	pub kms_key_id: Option<String>,
}

/// Object retention ("WORM") settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Retention {
	#[serde(default)]
	pub mode: Option<String>,
	#[serde(default)]
	pub retain_until: Option<DateTime<Utc>>,
}

/// `obj:<bucket>:<objectKey>` for the latest record, or
/// `version:<bucket>:<objectKey>:<versionID>` for a historical one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
	#[serde(default)]
	pub bucket: String,
	#[serde(default)]
	pub key: String,
	/// Empty if this record is absent/never written; `RecalculateBucketStats`
	/// treats empty etag + zero size as a delete marker.
	#[serde(default)]
	pub size: i64,
	#[serde(default)]
	pub etag: String,
	#[serde(default)]
	pub content_type: String,
	#[serde(default)]
	pub storage_class: String,
	#[serde(default)]
	pub custom_metadata: BTreeMap<String, String>,
	#[serde(default)]
	pub tags: BTreeMap<String, String>,
	#[serde(default)]
	pub retention: Retention,
	#[serde(default)]
	pub legal_hold: bool,
	#[serde(default)]
	pub acl: String,
	#[serde(default)]
	pub sse: SseInfo,
	#[serde(default = "zero_time")]
	pub created_at: DateTime<Utc>,
	#[serde(default = "zero_time")]
	pub updated_at: DateTime<Utc>,
	#[serde(default = "zero_time")]
	pub last_modified: DateTime<Utc>,
	#[serde(flatten)]
	pub extra: ExtraFields,
}

impl ObjectMetadata {
	pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
		ObjectMetadata {
			bucket: bucket.into(),
			key: key.into(),
			size: 0,
			etag: String::new(),
			content_type: String::new(),
			storage_class: String::new(),
			custom_metadata: BTreeMap::new(),
			tags: BTreeMap::new(),
			retention: Retention::default(),
			legal_hold: false,
			acl: String::new(),
			sse: SseInfo::default(),
			created_at: zero_time(),
			updated_at: zero_time(),
			last_modified: zero_time(),
			extra: ExtraFields::new(),
		}
	}

	/// Delete markers are non-versioned-aware tombstones: empty etag and zero
	/// size.
	pub fn is_delete_marker(&self) -> bool {
		self.etag.is_empty() && self.size == 0
	}
}

/// `version:<bucket>:<objectKey>:<versionID>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectVersion {
	#[serde(default)]
	pub bucket: String,
	#[serde(default)]
	pub key: String,
	pub version_id: String,
	#[serde(default)]
	pub is_latest: bool,
	#[serde(default)]
	pub size: i64,
	#[serde(default)]
	pub etag: String,
	#[serde(default = "zero_time")]
	pub last_modified: DateTime<Utc>,
	#[serde(default)]
	pub storage_class: String,
	#[serde(default)]
	pub owner: String,
	#[serde(flatten)]
	pub extra: ExtraFields,
}

impl ObjectVersion {
	pub fn new(bucket: impl Into<String>, key: impl Into<String>, version_id: impl Into<String>) -> Self {
		ObjectVersion {
			bucket: bucket.into(),
			key: key.into(),
			version_id: version_id.into(),
			is_latest: false,
			size: 0,
			etag: String::new(),
			last_modified: zero_time(),
			storage_class: String::new(),
			owner: String::new(),
			extra: ExtraFields::new(),
		}
	}

	/// Synthesized by `ListAllObjectVersions` for an object that has no
	/// version records of its own, so a versioning-aware listing still
	/// surfaces non-versioned objects.
	pub fn synthetic_latest(obj: &ObjectMetadata) -> Self {
		ObjectVersion {
			bucket: obj.bucket.clone(),
			key: obj.key.clone(),
			version_id: String::new(),
			is_latest: true,
			size: obj.size,
			etag: obj.etag.clone(),
			last_modified: obj.last_modified,
			storage_class: obj.storage_class.clone(),
			owner: String::new(),
			extra: ExtraFields::new(),
		}
	}
}

/// `multipart:<uploadID>`, with a secondary `multipart_idx:<bucket>:<uploadID>`
/// index entry carrying no payload of its own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultipartUploadMetadata {
	pub upload_id: String,
	pub bucket: String,
	pub key: String,
	#[serde(default)]
	pub content_type: String,
	#[serde(default)]
	pub owner: String,
	#[serde(default)]
	pub custom_metadata: BTreeMap<String, String>,
	#[serde(default = "zero_time")]
	pub initiated: DateTime<Utc>,
	#[serde(flatten)]
	pub extra: ExtraFields,
}

impl MultipartUploadMetadata {
	pub fn new(upload_id: impl Into<String>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
		MultipartUploadMetadata {
			upload_id: upload_id.into(),
			bucket: bucket.into(),
			key: key.into(),
			content_type: String::new(),
			owner: String::new(),
			custom_metadata: BTreeMap::new(),
			initiated: zero_time(),
			extra: ExtraFields::new(),
		}
	}
}

/// `part:<uploadID>:<partNumberZeroPadded5>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartMetadata {
	pub upload_id: String,
	pub part_number: u32,
	#[serde(default)]
	pub size: i64,
	#[serde(default)]
	pub etag: String,
	#[serde(default = "zero_time")]
	pub last_modified: DateTime<Utc>,
	#[serde(flatten)]
	pub extra: ExtraFields,
}

impl PartMetadata {
	pub fn new(upload_id: impl Into<String>, part_number: u32) -> Self {
		PartMetadata {
			upload_id: upload_id.into(),
			part_number,
			size: 0,
			etag: String::new(),
			last_modified: zero_time(),
			extra: ExtraFields::new(),
		}
	}
}

pub(crate) fn encode<T: Serialize>(v: &T) -> Result<Vec<u8>, metakv_util::Error> {
	Ok(serde_json::to_vec(v)?)
}

pub(crate) fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, metakv_util::Error> {
	Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn object_metadata_delete_marker() {
		let mut o = ObjectMetadata::new("b", "k");
		assert!(o.is_delete_marker());
		o.size = 1;
		assert!(!o.is_delete_marker());
	}

	#[test]
	fn unknown_fields_round_trip_via_extra() {
		let json = r#"{"tenant_id":"t","name":"b","future_field":42}"#;
		let b: BucketMetadata = decode(json.as_bytes()).unwrap();
		assert_eq!(b.extra.get("future_field").unwrap(), 42);
		let re: Vec<u8> = encode(&b).unwrap();
		let s = String::from_utf8(re).unwrap();
		assert!(s.contains("future_field"));
	}

	#[test]
	fn policy_action_accepts_scalar_or_list() {
		let one: PolicyValue = serde_json::from_str(r#""s3:GetObject""#).unwrap();
		assert_eq!(one.len(), 1);
		let many: PolicyValue = serde_json::from_str(r#"["s3:GetObject","s3:PutObject"]"#).unwrap();
		assert_eq!(many.len(), 2);
	}
}
