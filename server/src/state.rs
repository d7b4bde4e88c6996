use std::time::Duration;

use crate::db::DbPool;
use crate::session::SessionRegistry;

/// Timing knobs shared by every session actor, derived from the
/// [session] config section.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Interval between counter ticks.
    pub tick_interval: Duration,
    /// How long an actor with no subscribers stays resident before it
    /// deactivates.
    pub idle_timeout: Duration,
}

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Live session actors by identifier
    pub sessions: SessionRegistry,
    /// Session actor timing settings
    pub settings: SessionSettings,
}
