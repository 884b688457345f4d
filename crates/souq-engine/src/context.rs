//! Shared handles every service is built from.

use std::sync::Arc;

use souq_db::Database;

use crate::activity::{Activity, ActivityLogger, TracingActivityLogger};
use crate::settings::{SettingsProvider, StaticSettings};

/// Database plus injected collaborators. Cheap to clone.
#[derive(Clone)]
pub struct EngineContext {
    pub db: Database,
    pub settings: Arc<dyn SettingsProvider>,
    pub activity: Arc<dyn ActivityLogger>,
}

impl EngineContext {
    pub fn new(
        db: Database,
        settings: Arc<dyn SettingsProvider>,
        activity: Arc<dyn ActivityLogger>,
    ) -> Self {
        EngineContext {
            db,
            settings,
            activity,
        }
    }

    /// Default settings and tracing-backed activity.
    pub fn with_defaults(db: Database) -> Self {
        Self::new(
            db,
            Arc::new(StaticSettings::default()),
            Arc::new(TracingActivityLogger),
        )
    }

    pub(crate) fn record(&self, activity: Activity) {
        self.activity.record(activity);
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("db", &self.db)
            .field("tax_bps", &self.settings.tax_rate().bps())
            .finish_non_exhaustive()
    }
}
