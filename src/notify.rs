//! Record change notifications

use tracing::info;

use crate::record::HttpRecord;

/// Fire-and-forget observer of record transitions
///
/// Shown once after a record is inserted and once after its final update.
/// The signature is infallible on purpose: a notifier may drop work on the
/// floor, but it can never block or fail the capture path.
pub trait Notifier: Send + Sync {
    /// Present the given snapshot, best-effort
    fn show(&self, record: &HttpRecord);
}

/// Notifier that logs each shown snapshot
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    /// Create a log notifier
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for LogNotifier {
    fn show(&self, record: &HttpRecord) {
        info!(
            id = record.id,
            method = %record.method,
            path = %record.path,
            status = ?record.status(),
            "captured call"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_notifier_show() {
        let notifier = LogNotifier::new();
        let record = HttpRecord {
            method: "GET".to_string(),
            path: "/health".to_string(),
            ..HttpRecord::default()
        };

        // Best-effort contract: showing never fails, whatever the state.
        notifier.show(&record);
        notifier.show(&record.with_error("refused"));
    }
}
