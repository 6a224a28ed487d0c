use tracing::error;

/// Host-provided modal error surface.
///
/// The browsing core never propagates transport failures to its callers.
/// Every failed external call is converted into exactly one `report` and a
/// degraded (empty or partial) result, so implementations should expect to
/// be the only failure signal the user sees.
pub trait ProblemReporter: Send + Sync {
	fn report(&self, title: &str, message: &str);
}

/// Fallback reporter for headless use: emits a tracing error event instead
/// of raising a dialog.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ProblemReporter for LogReporter {
	fn report(&self, title: &str, message: &str) {
		error!("{title}: {message}");
	}
}
