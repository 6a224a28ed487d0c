/// Host-provided busy indicator (a wait cursor, a spinner, a status line).
///
/// `started`/`finished` calls are always balanced; see [`ActivityScope`].
pub trait ActivityListener: Send + Sync {
	fn started(&self, label: &str);
	fn finished(&self, label: &str);
}

/// No-op listener for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullActivity;

impl ActivityListener for NullActivity {
	fn started(&self, _label: &str) {}
	fn finished(&self, _label: &str) {}
}

/// Scoped busy-indicator acquisition around a blocking network call.
///
/// `finished` is driven by `Drop`, so the indicator is released on every
/// exit path, including early returns on failure.
pub struct ActivityScope<'a> {
	listener: &'a dyn ActivityListener,
	label: &'a str,
}

impl<'a> ActivityScope<'a> {
	pub fn begin(listener: &'a dyn ActivityListener, label: &'a str) -> Self {
		listener.started(label);
		Self { listener, label }
	}
}

impl Drop for ActivityScope<'_> {
	fn drop(&mut self) {
		self.listener.finished(self.label);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[derive(Default)]
	struct Counting {
		started: AtomicUsize,
		finished: AtomicUsize,
	}

	impl ActivityListener for Counting {
		fn started(&self, _label: &str) {
			self.started.fetch_add(1, Ordering::SeqCst);
		}
		fn finished(&self, _label: &str) {
			self.finished.fetch_add(1, Ordering::SeqCst);
		}
	}

	#[test]
	fn scope_is_balanced() {
		let listener = Counting::default();
		{
			let _scope = ActivityScope::begin(&listener, "fetch");
			assert_eq!(listener.started.load(Ordering::SeqCst), 1);
			assert_eq!(listener.finished.load(Ordering::SeqCst), 0);
		}
		assert_eq!(listener.finished.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn scope_releases_on_early_return() {
		let listener = Counting::default();
		let failing = |listener: &Counting| -> Result<(), ()> {
			let _scope = ActivityScope::begin(listener, "fetch");
			Err(())
		};
		assert!(failing(&listener).is_err());
		assert_eq!(listener.started.load(Ordering::SeqCst), 1);
		assert_eq!(listener.finished.load(Ordering::SeqCst), 1);
	}
}
