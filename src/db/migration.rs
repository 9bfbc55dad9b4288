//! One-shot, idempotent conversion of a previously persisted Engine-A
//! directory into Engine-B, run once at startup before the store is opened.
//! Operates purely on raw key/value pairs: this module has
//! no knowledge of `metakv_store`'s entity schema, which is exactly what
//! lets it live in the engine-adapter crate instead of the entity store.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::adapter::{Durability, FullScan, KvEngine, PrefixIterator};
use crate::error::Error;

/// Name of the file rocksdb (Engine-A) always maintains at the root of an
/// open database directory. Its presence is how we detect "there is an
/// Engine-A directory here that hasn't been migrated yet".
const ENGINE_A_MARKER_FILE: &str = "CURRENT";

const COPY_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
	/// No Engine-A marker file was found; nothing to do.
	NoOp,
	/// The migration ran and the swap completed.
	Migrated { keys_copied: u64 },
}

fn live_dir(data_dir: &Path) -> PathBuf {
	data_dir.join("metadata")
}

fn staging_dir(data_dir: &Path) -> PathBuf {
	data_dir.join("metadata_new")
}

fn backup_dir(data_dir: &Path, now_unix_secs: u64) -> PathBuf {
	data_dir.join(format!("metadata_badger_backup_{}", now_unix_secs))
}

fn unix_now() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("system clock before unix epoch")
		.as_secs()
}

/// Runs the migration if (and only if) `<data_dir>/metadata` looks like an
/// unmigrated Engine-A directory. Safe to call on every startup: subsequent
/// calls after a completed migration find no marker file and return
/// `Ok(MigrationOutcome::NoOp)` immediately.
#[cfg(all(feature = "engine-a", feature = "engine-b"))]
pub fn run_migration(data_dir: &Path, block_cache_mb: usize) -> Result<MigrationOutcome, Error> {
	let live = live_dir(data_dir);

	if !live.join(ENGINE_A_MARKER_FILE).exists() {
		return Ok(MigrationOutcome::NoOp);
	}

	let staging = staging_dir(data_dir);
	if staging.exists() {
		info!("Removing stale migration staging directory from a previous failed attempt: {}", staging.display());
		std::fs::remove_dir_all(&staging)?;
	}

	info!("Starting metadata migration: Engine-A -> Engine-B at {}", live.display());

	let source = crate::engine_a::EngineA::open_read_only(&live)?;
	let target = crate::engine_b::EngineB::open(&staging, block_cache_mb)?;

	let keys_copied = copy_all(&source, &target)?;

	source.close()?;
	target.close()?;

	swap_directories(data_dir, &live, &staging)?;

	info!("Metadata migration complete: {} keys copied", keys_copied);
	Ok(MigrationOutcome::Migrated { keys_copied })
}

#[cfg(all(feature = "engine-a", feature = "engine-b"))]
fn copy_all(source: &crate::engine_a::EngineA, target: &crate::engine_b::EngineB) -> Result<u64, Error> {
	let mut it = source.scan_all()?;
	it.first()?;

	let mut total = 0u64;
	let mut batch = target.new_batch();
	let mut pending = 0usize;

	while it.valid() {
		batch.set(it.key(), it.value());
		pending += 1;
		total += 1;

		if pending == COPY_BATCH_SIZE {
			batch.commit(Durability::Deferred)?;
			info!("Migration progress: {} keys copied", total);
			batch = target.new_batch();
			pending = 0;
		}

		it.next()?;
	}

	// Final partial batch is committed synced: this is the write after
	// which the copy is considered durable and the swap is safe to perform.
	batch.commit(Durability::Synced)?;

	Ok(total)
}

fn swap_directories(data_dir: &Path, live: &Path, staging: &Path) -> Result<(), Error> {
	let mut backup = backup_dir(data_dir, unix_now());
	if backup.exists() {
		backup = data_dir.join(format!("{}_2", backup.file_name().unwrap().to_string_lossy()));
	}

	std::fs::rename(live, &backup)?;

	if let Err(e) = std::fs::rename(staging, live) {
		// Best-effort restore so the next startup retries the migration
		// instead of finding neither a live directory nor the marker file.
		let _ = std::fs::rename(&backup, live);
		return Err(Error::msg(format!(
			"migration swap failed while renaming staging directory into place, original restored: {}",
			e
		)));
	}

	Ok(())
}

#[cfg(all(test, feature = "engine-a", feature = "engine-b"))]
mod test {
	use super::*;
	use mktemp::Temp;

	#[test]
	fn noop_when_no_marker_file() {
		let dir = Temp::new_dir().unwrap();
		let outcome = run_migration(&dir, 16).unwrap();
		assert_eq!(outcome, MigrationOutcome::NoOp);
	}

	#[test]
	fn migrates_and_is_idempotent() {
		let dir = Temp::new_dir().unwrap();
		let live = live_dir(&dir);
		{
			let engine = crate::engine_a::EngineA::open(&live, 16).unwrap();
			for i in 0..10_000u32 {
				engine
					.set(format!("k{:05}", i).as_bytes(), b"v", Durability::Deferred)
					.unwrap();
			}
			engine.close().unwrap();
		}

		let outcome = run_migration(&dir, 16).unwrap();
		assert!(matches!(outcome, MigrationOutcome::Migrated { keys_copied: 10_000 }));

		{
			let engine = crate::engine_b::EngineB::open(&live, 16).unwrap();
			assert_eq!(engine.get(b"k00000").unwrap(), Some(b"v".to_vec()));
			assert_eq!(engine.get(b"k09999").unwrap(), Some(b"v".to_vec()));
		}

		// Second run finds no marker file (it's now an Engine-B directory)
		// and is a no-op.
		let outcome2 = run_migration(&dir, 16).unwrap();
		assert_eq!(outcome2, MigrationOutcome::NoOp);

		let backups: Vec<_> = std::fs::read_dir(&dir)
			.unwrap()
			.filter_map(|e| e.ok())
			.filter(|e| e.file_name().to_string_lossy().starts_with("metadata_badger_backup_"))
			.collect();
		assert_eq!(backups.len(), 1);
	}
}
