//! Integration suite exercising the assembled `metakv` crate end to end:
//! opening a store, the bucket/object contract, and the migration path, the
//! way `garage`'s own `tests/lib.rs` drives a whole running instance rather
//! than one crate in isolation.

use metakv::{open, BucketMetadata, CancellationToken, ObjectMetadata, StoreConfig};
use mktemp::Temp;

fn config_in(dir: std::path::PathBuf, engine: &str) -> StoreConfig {
	StoreConfig { metadata_dir: dir, engine: engine.to_string(), ..StoreConfig::default() }
}

#[cfg(feature = "engine-b")]
#[test]
fn open_then_bucket_and_object_roundtrip_on_engine_b() {
	let dir = Temp::new_dir().unwrap();
	let instance = open(config_in(dir.to_path_buf(), "engine_b")).unwrap();
	let tok = CancellationToken::never();

	instance.store.create_bucket(BucketMetadata::new("t1", "b1"), &tok).unwrap();
	instance.store.put_object(ObjectMetadata::new("b1", "hello.txt"), &tok).unwrap();

	let got = instance.store.get_object("b1", "hello.txt", None).unwrap();
	assert_eq!(got.key, "hello.txt");

	let listed = instance.store.list_objects("b1", "", "", 100).unwrap();
	assert_eq!(listed.objects.len(), 1);

	instance.close().unwrap();
}

#[cfg(feature = "engine-b")]
#[test]
fn metrics_are_recorded_through_the_facade() {
	let dir = Temp::new_dir().unwrap();
	let instance = open(config_in(dir.to_path_buf(), "engine_b")).unwrap();

	metakv::record_metric(&instance.store, "object_count", Some("b1"), 7.0).unwrap();

	let mut seen = 0;
	instance
		.store
		.raw_kv()
		.scan(b"metrics:snap:", b"", |_k, _v| {
			seen += 1;
			true
		})
		.unwrap();
	assert_eq!(seen, 1);

	instance.close().unwrap();
}

#[cfg(all(feature = "engine-a", feature = "engine-b"))]
#[test]
fn opening_an_engine_a_directory_migrates_it_to_engine_b_first() {
	let dir = Temp::new_dir().unwrap();
	let live = dir.to_path_buf().join("metadata");

	{
		use metakv_db::KvEngine;
		let engine = metakv_db::engine_a::EngineA::open(&live, 16).unwrap();
		engine.set(b"bucket:t1:b1", br#"{"tenant_id":"t1","name":"b1"}"#, metakv_db::Durability::Deferred).unwrap();
		engine.close().unwrap();
	}

	let instance = open(config_in(dir.to_path_buf(), "engine_b")).unwrap();
	let got = instance.store.get_bucket("t1", "b1").unwrap();
	assert_eq!(got.name, "b1");

	let backups: Vec<_> = std::fs::read_dir(dir.to_path_buf())
		.unwrap()
		.filter_map(|e| e.ok())
		.filter(|e| e.file_name().to_string_lossy().starts_with("metadata_badger_backup_"))
		.collect();
	assert_eq!(backups.len(), 1);

	instance.close().unwrap();
}
