use crate::model::Document;
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "reportwriter.sqlite3";
/// Row holding the whole application document.
pub const DOCUMENT_KEY: &str = "reportGeneratorData";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents(
            key TEXT PRIMARY KEY,
            json TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    Ok(conn)
}

/// Loads the stored document, or `None` for a fresh workspace.
///
/// Fields that fail to parse load as empty lists and are logged. A row that
/// is not a JSON object at all loads as an empty document.
pub fn load_document(conn: &Connection) -> anyhow::Result<Option<Document>> {
    let text: Option<String> = conn
        .query_row(
            "SELECT json FROM documents WHERE key = ?",
            [DOCUMENT_KEY],
            |r| r.get(0),
        )
        .optional()
        .context("failed to read stored document")?;
    let Some(text) = text else {
        return Ok(None);
    };

    let (doc, degraded) = match Document::from_json_lenient(&text) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("stored document is unreadable; starting empty: {e:#}");
            return Ok(Some(Document::default()));
        }
    };
    for field in degraded {
        tracing::warn!(field, "stored field failed to parse; loading it as empty");
    }
    Ok(Some(doc))
}

pub fn save_document(conn: &Connection, doc: &Document) -> anyhow::Result<()> {
    let json = serde_json::to_string(doc).context("failed to serialize document")?;
    save_raw_document(conn, &json)?;
    tracing::debug!(bytes = json.len(), "document saved");
    Ok(())
}

/// Stores raw text under the document key, bypassing serialization.
/// Used when restoring a bundle whose document must load leniently.
pub fn save_raw_document(conn: &Connection, json: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO documents(key, json, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET json = excluded.json, updated_at = excluded.updated_at",
        (DOCUMENT_KEY, json, chrono::Utc::now().to_rfc3339()),
    )
    .context("failed to write document")?;
    Ok(())
}
