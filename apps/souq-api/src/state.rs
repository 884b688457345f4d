use souq_db::Database;
use souq_engine::Engine;

/// Shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Engine,
    pub db: Database,
}

impl AppState {
    pub fn new(engine: Engine, db: Database) -> Self {
        AppState { engine, db }
    }
}
