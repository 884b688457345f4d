//! # Activity Logging
//!
//! Audit records for state changes. Services record activity only after
//! their transaction commits, so a rolled-back operation leaves no trace.

use std::sync::Mutex;

use tracing::info;

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    /// What happened, e.g. `order_created`.
    pub action: &'static str,
    /// Entity kind, e.g. `order`.
    pub subject: &'static str,
    pub subject_id: i64,
    pub description: String,
}

impl Activity {
    pub fn new(
        action: &'static str,
        subject: &'static str,
        subject_id: i64,
        description: impl Into<String>,
    ) -> Self {
        Activity {
            action,
            subject,
            subject_id,
            description: description.into(),
        }
    }
}

pub trait ActivityLogger: Send + Sync {
    fn record(&self, activity: Activity);
}

/// Emits activity as `tracing` events under the `souq::activity` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingActivityLogger;

impl ActivityLogger for TracingActivityLogger {
    fn record(&self, activity: Activity) {
        info!(
            target: "souq::activity",
            action = activity.action,
            subject = activity.subject,
            subject_id = activity.subject_id,
            "{}",
            activity.description
        );
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct RecordingActivityLogger {
    records: Mutex<Vec<Activity>>,
}

impl RecordingActivityLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Activity> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn actions(&self) -> Vec<&'static str> {
        self.records().iter().map(|a| a.action).collect()
    }
}

impl ActivityLogger for RecordingActivityLogger {
    fn record(&self, activity: Activity) {
        if let Ok(mut records) = self.records.lock() {
            records.push(activity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_logger() {
        let logger = RecordingActivityLogger::new();
        logger.record(Activity::new("order_created", "order", 1, "APPS-2026-000001"));
        logger.record(Activity::new("order_cancelled", "order", 1, "customer request"));

        assert_eq!(logger.actions(), vec!["order_created", "order_cancelled"]);
        assert_eq!(logger.records()[0].subject_id, 1);
    }
}
