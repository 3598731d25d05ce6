use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::model::Document;
use crate::session::WritingSession;

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
    /// In-memory copy of the persisted document; replaced only after a save succeeds.
    pub doc: Document,
    pub session: Option<WritingSession>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            workspace: None,
            db: None,
            doc: Document::default(),
            session: None,
        }
    }
}
