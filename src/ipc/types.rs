use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;
use tracing::error;

use crate::model::AppData;
use crate::report::ReportGenerator;
use crate::store;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub user_id: String,
    /// In-memory copy of every collection; the single source for reads.
    pub data: AppData,
    pub generator: Option<Box<dyn ReportGenerator>>,
}

impl AppState {
    pub fn new(user_id: String, generator: Option<Box<dyn ReportGenerator>>) -> Self {
        Self {
            workspace: None,
            db: None,
            user_id,
            data: AppData::default(),
            generator,
        }
    }

    /// Swaps in `next` after writing it to the store.
    ///
    /// A failed write is logged and reported as `false`; the new state is
    /// kept either way and nothing is retried.
    pub fn commit(&mut self, next: AppData) -> bool {
        let persisted = match self.db.as_ref() {
            Some(conn) => match store::save(conn, &self.user_id, &next) {
                Ok(()) => true,
                Err(e) => {
                    error!(error = %format!("{e:#}"), "store write failed, keeping in-memory state");
                    false
                }
            },
            None => false,
        };
        self.data = next;
        persisted
    }
}
