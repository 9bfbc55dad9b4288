//! Test-only helper for constructing a `Store` over a scratch directory,
//! mirroring `metakv_store`'s own test support: `Store::open` spawns `tokio`
//! background workers, so a runtime must be entered even though every call
//! this crate's tests make into the store is synchronous.

#![cfg(test)]

use std::sync::Arc;

use metakv_store::Store;
use metakv_util::config::StoreConfig;
use mktemp::Temp;

pub fn test_store() -> Arc<Store> {
	let dir = Temp::new_dir().unwrap();
	let path = dir.to_path_buf();
	std::mem::forget(dir);

	let rt: &'static tokio::runtime::Runtime = Box::leak(Box::new(tokio::runtime::Runtime::new().unwrap()));
	std::mem::forget(rt.enter());

	let config = StoreConfig { metadata_dir: path, engine: "engine_b".to_string(), ..StoreConfig::default() };
	Store::open(config).unwrap()
}
