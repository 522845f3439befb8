//! # Application State
//!
//! Shared by every handler through axum's `State` extractor.
//!
//! ## Thread Safety
//! `Database` wraps a `SqlitePool` and every engine only holds repository
//! handles around it, so cloning the state per request is cheap and no
//! handler needs a lock.

use pastificio_commerce::{BackOffice, BackOfficeConfig};
use pastificio_db::Database;

#[derive(Debug, Clone)]
pub struct AppState {
    db: Database,
    office: BackOffice,
    recent_limit: u32,
}

impl AppState {
    pub fn new(db: Database, config: &BackOfficeConfig) -> Self {
        let office = BackOffice::new(&db, &config.sales);
        AppState {
            db,
            office,
            recent_limit: config.sales.recent_limit,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn office(&self) -> &BackOffice {
        &self.office
    }

    /// Default size of list responses when the client sends no `limit`.
    pub fn recent_limit(&self) -> u32 {
        self.recent_limit
    }
}
