//! Exporting a session to a standalone JSON file and importing it back.

use chrono::Utc;
use goose_desktop_models::SessionDetails;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

use crate::error::ImportFormatError;

pub const SESSION_FILE_VERSION: &str = "1.0";
pub const SESSION_FILE_EXTENSION: &str = "goose-session.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFile {
    pub version: String,
    /// Export time, milliseconds since the epoch
    pub timestamp: i64,
    pub session: SessionDetails,
}

impl SessionFile {
    pub fn new(session: SessionDetails) -> Self {
        Self {
            version: SESSION_FILE_VERSION.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            session,
        }
    }
}

pub fn suggested_file_name(session: &SessionDetails) -> String {
    format!("{}.{}", session.session_id, SESSION_FILE_EXTENSION)
}

pub fn export_session_to_file(
    session: &SessionDetails,
    path: &Path,
) -> Result<(), ImportFormatError> {
    let file = SessionFile::new(session.clone());
    let content = serde_json::to_string_pretty(&file)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    info!(
        "Exported session {} ({} messages) to {}",
        session.session_id,
        session.messages.len(),
        path.display()
    );
    Ok(())
}

pub fn import_session_from_file(path: &Path) -> Result<SessionDetails, ImportFormatError> {
    let content = std::fs::read_to_string(path)?;
    let file = parse_session_file(&content).inspect_err(|e| {
        warn!("Rejected session file {}: {}", path.display(), e);
    })?;
    info!(
        "Imported session {} exported at {}",
        file.session.session_id, file.timestamp
    );
    Ok(file.session)
}

/// Check the envelope shape before decoding the session itself. Any file
/// that does not decode is an `InvalidFormat` error.
pub fn parse_session_file(content: &str) -> Result<SessionFile, ImportFormatError> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| ImportFormatError::invalid(format!("not a JSON document: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| ImportFormatError::invalid("expected a JSON object"))?;

    match object.get("version") {
        Some(Value::String(version)) if version != SESSION_FILE_VERSION => {
            warn!("Session file version '{}' differs from {}", version, SESSION_FILE_VERSION);
        }
        Some(Value::String(_)) => {}
        _ => return Err(ImportFormatError::invalid("missing 'version'")),
    }

    let session = object
        .get("session")
        .and_then(Value::as_object)
        .ok_or_else(|| ImportFormatError::invalid("missing 'session'"))?;
    if !matches!(session.get("session_id"), Some(Value::String(id)) if !id.is_empty()) {
        return Err(ImportFormatError::invalid("missing 'session.session_id'"));
    }

    serde_json::from_value(value)
        .map_err(|e| ImportFormatError::invalid(format!("bad session data: {}", e)))
}
