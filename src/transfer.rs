// History export and import documents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::config::EXPORT_VERSION;
use crate::error::ImportError;
use crate::models::{ExportDocument, HistoryLog};

pub fn export_history(history: &HistoryLog, at: DateTime<Utc>) -> ExportDocument {
    ExportDocument {
        workout_history: history.clone(),
        export_date: at,
        version: EXPORT_VERSION.to_string(),
    }
}

/// Pretty-printed JSON with two-space indentation.
pub fn to_json(document: &ExportDocument) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(document)
}

/// `fitness-data-YYYY-MM-DD.json`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("fitness-data-{}.json", date.format("%Y-%m-%d"))
}

/// Extract the history from an export document.
///
/// Only `workoutHistory` is required; `exportDate` and `version` are not checked.
pub fn parse_import(raw: &str) -> Result<HistoryLog, ImportError> {
    let document: Value = serde_json::from_str(raw)?;
    let history = match document.get("workoutHistory") {
        None | Some(Value::Null) => return Err(ImportError::MissingHistory),
        Some(history) => history,
    };
    Ok(HistoryLog::deserialize(history)?)
}
