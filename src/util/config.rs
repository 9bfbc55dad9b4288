//! On-disk configuration for the metadata store.
//!
//! Loading a config file, merging it with CLI/environment overrides, and
//! serving it over an admin API are the surrounding binary's responsibility.
//! This module only defines the struct the store itself needs to open an
//! engine and tune its background workers,
//! the same way `garage_util::config::Config` is a flat, `serde`-derived,
//! `#[serde(default)]`-heavy struct that the `garage` binary parses from
//! TOML before constructing `Garage`.

use std::path::PathBuf;

use bytesize::ByteSize;
use serde::{Deserialize, Serialize};

fn default_engine() -> String {
	"engine_b".into()
}

fn default_ttl_reaper_interval_secs() -> u64 {
	3600
}

fn default_value_log_gc_interval_secs() -> u64 {
	300
}

fn default_value_log_gc_discard_ratio() -> f64 {
	0.5
}

fn default_multipart_ttl_days() -> i64 {
	7
}

fn default_search_scan_cap() -> usize {
	100_000
}

fn default_list_max_keys() -> usize {
	1000
}

fn default_block_cache_mb() -> usize {
	256
}

/// Configuration consumed by `metakv` when opening a store.
///
/// Every field has a documented default so that a config file only needs to
/// override what it actually cares about (`#[serde(default = ...)]`
/// throughout, mirroring `garage_util::config::Config`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
	/// Directory holding `metadata/` (the live engine directory) and, during
	/// migration, `metadata_new/` and the post-migration backup directory.
	pub metadata_dir: PathBuf,

	/// Which engine binding to open: `"engine_a"` (rocksdb-backed, native
	/// per-key TTL and optimistic transactions) or `"engine_b"` (fjall-backed,
	/// no native TTL, crash-safe WAL). Defaults to Engine-B, the current
	/// engine; Engine-A is kept around for reading directories that have not
	/// yet been migrated.
	#[serde(default = "default_engine")]
	pub engine: String,

	/// If true, ordinary writes request the `Synced` durability hint instead
	/// of `Deferred`. Almost always left false; migration's final batch is
	/// synced regardless of this setting.
	#[serde(default)]
	pub metadata_fsync: bool,

	/// Block cache size for engines that have one (both Engine-A and
	/// Engine-B do).
	#[serde(default = "default_block_cache_mb")]
	pub block_cache_mb: usize,

	/// How long an abandoned multipart upload is kept before the TTL reaper
	/// (or the engine's native TTL, on Engine-A) removes it.
	#[serde(default = "default_multipart_ttl_days")]
	pub multipart_ttl_days: i64,

	/// Wake interval of the multipart TTL reaper, only spawned on engines
	/// without native per-key TTL.
	#[serde(default = "default_ttl_reaper_interval_secs")]
	pub ttl_reaper_interval_secs: u64,

	/// Wake interval of the value-log GC ticker, only spawned on engines
	/// that report `needs_value_log_gc() == true`.
	#[serde(default = "default_value_log_gc_interval_secs")]
	pub value_log_gc_interval_secs: u64,

	/// Minimum fraction of a value-log file that must be reclaimable before
	/// the GC ticker asks the engine to rewrite it.
	#[serde(default = "default_value_log_gc_discard_ratio")]
	pub value_log_gc_discard_ratio: f64,

	/// Hard cap on `SearchObjects`'s linear scan before it stops and returns
	/// a `nextMarker`, regardless of how many matches were found.
	#[serde(default = "default_search_scan_cap")]
	pub search_scan_cap: usize,

	/// Default `maxKeys`/`maxUploads` used whenever a caller passes `<= 0`.
	#[serde(default = "default_list_max_keys")]
	pub default_list_max_keys: usize,
}

impl Default for StoreConfig {
	fn default() -> Self {
		StoreConfig {
			metadata_dir: PathBuf::from("./meta"),
			engine: default_engine(),
			metadata_fsync: false,
			block_cache_mb: default_block_cache_mb(),
			multipart_ttl_days: default_multipart_ttl_days(),
			ttl_reaper_interval_secs: default_ttl_reaper_interval_secs(),
			value_log_gc_interval_secs: default_value_log_gc_interval_secs(),
			value_log_gc_discard_ratio: default_value_log_gc_discard_ratio(),
			search_scan_cap: default_search_scan_cap(),
			default_list_max_keys: default_list_max_keys(),
		}
	}
}

impl StoreConfig {
	/// Parses a `StoreConfig` from a TOML string, the way
	/// `garage_util::config::read_config` parses `garage.toml`.
	pub fn from_toml(data: &str) -> Result<Self, crate::Error> {
		let cfg: StoreConfig =
			toml::from_str(data).map_err(|e| crate::Error::Message(format!("invalid store config: {}", e)))?;
		info!(
			"Loaded store config: engine={}, metadata_dir={}, block_cache={}",
			cfg.engine,
			cfg.metadata_dir.display(),
			ByteSize::mb(cfg.block_cache_mb as u64),
		);
		Ok(cfg)
	}

	/// The live engine directory, `<metadata_dir>/metadata`.
	pub fn live_dir(&self) -> PathBuf {
		self.metadata_dir.join("metadata")
	}

	/// The transient migration target directory, `<metadata_dir>/metadata_new`.
	pub fn migration_staging_dir(&self) -> PathBuf {
		self.metadata_dir.join("metadata_new")
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn defaults_fill_in_missing_fields() {
		let cfg = StoreConfig::from_toml(r#"metadata_dir = "/var/lib/metakv""#).unwrap();
		assert_eq!(cfg.engine, "engine_b");
		assert_eq!(cfg.multipart_ttl_days, 7);
		assert_eq!(cfg.search_scan_cap, 100_000);
	}

	#[test]
	fn overrides_are_respected() {
		let cfg = StoreConfig::from_toml(
			r#"
			metadata_dir = "/data"
			engine = "engine_a"
			metadata_fsync = true
			"#,
		)
		.unwrap();
		assert_eq!(cfg.engine, "engine_a");
		assert!(cfg.metadata_fsync);
	}
}
