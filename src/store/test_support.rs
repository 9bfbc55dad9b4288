//! Test-only helper for constructing a `Store` over a scratch directory.
//! `Store::open` spawns `tokio` background workers, so tests need an active
//! runtime context even though every store operation itself is synchronous;
//! we leak a current-thread runtime and its `enter()` guard for the
//! lifetime of the test process rather than thread it through every test.

#![cfg(test)]

use std::sync::Arc;

use metakv_util::config::StoreConfig;
use mktemp::Temp;

use crate::store::Store;

pub fn test_store() -> Arc<Store> {
	let dir = Temp::new_dir().unwrap();
	let path = dir.to_path_buf();
	std::mem::forget(dir);

	let rt: &'static tokio::runtime::Runtime =
		Box::leak(Box::new(tokio::runtime::Runtime::new().unwrap()));
	std::mem::forget(rt.enter());

	let config = StoreConfig {
		metadata_dir: path,
		engine: "engine_b".to_string(),
		..StoreConfig::default()
	};
	Store::open(config).unwrap()
}
