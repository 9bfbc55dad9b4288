//! Cooperative cancellation and shutdown primitives.
//!
//! Background workers (§4.5) are independent tasks that communicate with the
//! store only through a shared shutdown signal; they hold no locks across
//! sleeps and absorb missed ticks rather than bursting to catch up. Public
//! operations (§4.3) accept a `CancellationToken` that is checked once,
//! before any durable engine call is issued, and then ignored for the rest
//! of that call. Grounded on the cooperative-task style
//! `garage_util::background` uses to register and stop its worker tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::Error;

/// A cheap, cloneable flag a caller can set to request early abort of an
/// in-flight `MetadataStore` operation. Checked once per operation, before
/// any durable mutation; once a batch commit has begun, cancellation is
/// ignored.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
	pub fn new() -> Self {
		Self(Arc::new(AtomicBool::new(false)))
	}

	/// A token that never cancels, for callers that don't need the feature.
	pub fn never() -> Self {
		Self::new()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}

	/// Returns `Err(Error::Cancelled)` if the token has been cancelled.
	/// Every `MetadataStore` operation calls this exactly once, before
	/// issuing its first engine call.
	pub fn check(&self) -> Result<(), Error> {
		if self.is_cancelled() {
			Err(Error::Cancelled)
		} else {
			Ok(())
		}
	}
}

/// The shutdown signal shared by every background worker and the store
/// itself. `Store::close` fires this before closing the engine handle, and
/// each worker's `tokio::select!` loop observes it mid-wait rather than only
/// between ticks.
#[derive(Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

pub struct ShutdownHandle(watch::Sender<bool>);

pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
	let (tx, rx) = watch::channel(false);
	(ShutdownHandle(tx), ShutdownSignal(rx))
}

impl ShutdownHandle {
	/// Idempotent: firing twice is harmless, `watch` just keeps the latest
	/// value.
	pub fn fire(&self) {
		info!("Shutdown signalled, background workers will stop at their next wait point");
		let _ = self.0.send(true);
	}
}

impl ShutdownSignal {
	pub fn is_shutting_down(&self) -> bool {
		*self.0.borrow()
	}

	/// Resolves once shutdown has been signalled. Intended to sit inside a
	/// worker's `tokio::select!` alongside its tick timer.
	pub async fn wait(&mut self) {
		if *self.0.borrow() {
			return;
		}
		let _ = self.0.changed().await;
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn cancellation_token_checks() {
		let tok = CancellationToken::new();
		assert!(tok.check().is_ok());
		tok.cancel();
		assert!(tok.check().is_err());
	}

	#[tokio::test]
	async fn shutdown_signal_observed_after_fire() {
		let (handle, mut signal) = shutdown_channel();
		assert!(!signal.is_shutting_down());
		handle.fire();
		signal.wait().await;
		assert!(signal.is_shutting_down());
	}
}
