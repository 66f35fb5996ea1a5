//! Reasoned shutdown coordination.
//!
//! A [`Controller`] is cloned into every task that has to stop together.
//! The first trigger wins: its reason is stored and every observer sees it.

use std::{
	future::Future,
	sync::{Arc, Mutex},
};

use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct Controller<T> {
	inner: Arc<ControllerInner<T>>,
}

struct ControllerInner<T> {
	token: CancellationToken,
	reason: Mutex<Option<T>>,
}

impl<T: Clone> Controller<T> {
	pub fn new() -> Self {
		Controller {
			inner: Arc::new(ControllerInner {
				token: CancellationToken::new(),
				reason: Mutex::new(None),
			}),
		}
	}

	/// Triggers the shutdown with the given reason. Subsequent triggers are ignored,
	/// the first reason is kept.
	pub fn trigger_shutdown(&self, reason: T) {
		let mut guard = self
			.inner
			.reason
			.lock()
			.expect("shutdown reason lock is never poisoned");
		if guard.is_none() {
			*guard = Some(reason);
			self.inner.token.cancel();
		}
	}

	pub fn is_triggered(&self) -> bool {
		self.inner.token.is_cancelled()
	}

	/// Completes once the shutdown has been triggered, yielding the reason.
	pub async fn triggered_shutdown(&self) -> T {
		self.inner.token.cancelled().await;
		self.inner
			.reason
			.lock()
			.expect("shutdown reason lock is never poisoned")
			.clone()
			.expect("reason is stored before the token is cancelled")
	}

	/// Wraps a future, cancelling it upon a shutdown trigger.
	///
	/// Yields `Ok(value)` if the wrapped future completes first, or `Err(reason)`
	/// if the shutdown wins the race.
	pub fn with_cancel<F: Future>(&self, future: F) -> impl Future<Output = Result<F::Output, T>> {
		let controller = self.clone();
		async move {
			tokio::select! {
				output = future => Ok(output),
				reason = controller.triggered_shutdown() => Err(reason),
			}
		}
	}

	/// Triggers the shutdown with the given reason upon receiving a user termination
	/// signal: Ctrl-C (SIGINT) or SIGTERM on Unix systems, Ctrl-C elsewhere.
	pub fn on_user_signal(&self, reason: T) -> impl Future<Output = ()> {
		let controller = self.clone();
		async move {
			user_signal().await;
			controller.trigger_shutdown(reason);
		}
	}
}

impl<T: Clone> Default for Controller<T> {
	fn default() -> Self {
		Self::new()
	}
}

async fn user_signal() {
	let ctrl_c = tokio::signal::ctrl_c();
	#[cfg(unix)]
	{
		let terminate = async {
			let mut signal =
				tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
			signal.recv().await;
			std::io::Result::Ok(())
		};

		tokio::select! {
			_ = ctrl_c => {},
			_ = terminate => {},
		}
	}

	#[cfg(not(unix))]
	{
		_ = ctrl_c.await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[tokio::test]
	async fn trigger_releases_observers() {
		let shutdown = Controller::<&str>::new();

		let observer = tokio::spawn({
			let shutdown = shutdown.clone();
			async move { shutdown.triggered_shutdown().await }
		});

		shutdown.trigger_shutdown("done");
		assert_eq!(observer.await.unwrap(), "done");
		assert!(shutdown.is_triggered());
	}

	#[tokio::test]
	async fn first_reason_wins() {
		let shutdown = Controller::<&str>::new();
		shutdown.trigger_shutdown("first");
		shutdown.trigger_shutdown("second");
		assert_eq!(shutdown.triggered_shutdown().await, "first");
	}

	#[tokio::test]
	async fn with_cancel_returns_value_when_not_triggered() {
		let shutdown = Controller::<&str>::new();
		let result = shutdown.with_cancel(async { 42 }).await;
		assert_eq!(result, Ok(42));
	}

	#[tokio::test]
	async fn with_cancel_interrupts_pending_future() {
		let shutdown = Controller::<&str>::new();
		let wrapped = shutdown.with_cancel(tokio::time::sleep(Duration::from_secs(3600)));

		shutdown.trigger_shutdown("stop");
		assert_eq!(wrapped.await.err(), Some("stop"));
	}
}
