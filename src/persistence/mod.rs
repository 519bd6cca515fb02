//! Best-effort notification persistence and JSON import/export.
//!
//! Only persistent notifications are saved. Storage failures are logged and
//! otherwise ignored; losing a saved toast is never an error for the caller.

mod storage;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::notification::{NotificationId, NotificationSnapshot, NotificationType};

pub use storage::{FileStorage, MemoryStorage, Storage};

/// Key under which the record list is stored
pub const STORAGE_KEY: &str = "ara-toast.notifications";

/// Records older than this are never restored
pub const FRESHNESS_WINDOW_HOURS: i64 = 24;

/// One saved notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub persistent: bool,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default = "default_restore")]
    pub restore_on_load: bool,
}

fn default_restore() -> bool {
    true
}

impl PersistedRecord {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp)
    }

    /// Within the freshness window and not opted out
    pub fn should_restore(&self, now: DateTime<Utc>) -> bool {
        if !self.restore_on_load {
            return false;
        }
        match self.created_at() {
            Some(created) => now - created < ChronoDuration::hours(FRESHNESS_WINDOW_HOURS),
            None => false,
        }
    }
}

/// Exported form of a notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub icon: Option<String>,
    pub persistent: bool,
    pub timestamp: i64,
}

impl From<&NotificationSnapshot> for ExportRecord {
    fn from(snapshot: &NotificationSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            kind: snapshot.kind,
            title: snapshot.title.clone(),
            message: snapshot.message.clone(),
            icon: snapshot.icon.clone(),
            persistent: snapshot.persistent,
            timestamp: snapshot.timestamp.timestamp_millis(),
        }
    }
}

/// Entry accepted by import. Everything but the type is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub id: Option<NotificationId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub persistent: Option<bool>,
    #[serde(default)]
    pub duration: Option<i64>,
}

/// Load saved records, dropping anything unreadable.
///
/// Returns an empty list on any storage or parse failure.
pub fn load_records(storage: &dyn Storage) -> Vec<PersistedRecord> {
    let raw = match storage.get(STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read persisted notifications");
            return Vec::new();
        }
    };

    let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(error = %e, "Persisted notifications are corrupt, ignoring");
            return Vec::new();
        }
    };

    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<PersistedRecord>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed persisted record");
                None
            }
        })
        .collect()
}

/// Replace the saved record list
pub fn save_records(storage: &dyn Storage, records: &[PersistedRecord]) -> Result<()> {
    if records.is_empty() {
        return storage.remove(STORAGE_KEY);
    }
    let raw = serde_json::to_string(records)?;
    storage.set(STORAGE_KEY, &raw)
}

/// Parse import input, skipping entries that are not valid records
pub fn parse_import_values(values: Vec<serde_json::Value>) -> Vec<ImportRecord> {
    let total = values.len();
    let records: Vec<ImportRecord> = values
        .into_iter()
        .filter_map(|value| serde_json::from_value::<ImportRecord>(value).ok())
        .collect();
    if records.len() < total {
        tracing::warn!(
            skipped = total - records.len(),
            "Skipped malformed import entries"
        );
    }
    records
}

/// Parse import text: a JSON array of records, or a single record object
pub fn parse_import_text(text: &str) -> Result<Vec<ImportRecord>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let values = match value {
        serde_json::Value::Array(values) => values,
        other => vec![other],
    };
    Ok(parse_import_values(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, age_hours: i64, restore: bool) -> PersistedRecord {
        PersistedRecord {
            id: NotificationId::from(id),
            kind: NotificationType::Info,
            title: "t".into(),
            message: "m".into(),
            icon: None,
            persistent: true,
            timestamp: (Utc::now() - ChronoDuration::hours(age_hours)).timestamp_millis(),
            restore_on_load: restore,
        }
    }

    #[test]
    fn test_freshness_window() {
        let now = Utc::now();
        assert!(record("fresh", 1, true).should_restore(now));
        assert!(!record("stale", 25, true).should_restore(now));
        assert!(!record("opted-out", 1, false).should_restore(now));
    }

    #[test]
    fn test_save_and_load() {
        let storage = MemoryStorage::new();
        let records = vec![record("a", 0, true), record("b", 2, false)];
        save_records(&storage, &records).unwrap();

        let loaded = load_records(&storage);
        assert_eq!(loaded, records);

        save_records(&storage, &[]).unwrap();
        assert!(storage.get(STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_load_skips_malformed_records() {
        let storage = MemoryStorage::new();
        let raw = json!([
            {"id": "ok", "type": "success", "timestamp": 1},
            {"id": "bad", "type": "info"},
            "garbage"
        ]);
        storage.set(STORAGE_KEY, &raw.to_string()).unwrap();

        let loaded = load_records(&storage);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, NotificationId::from("ok"));
        assert!(loaded[0].restore_on_load);
    }

    #[test]
    fn test_corrupt_storage_loads_nothing() {
        let storage = MemoryStorage::new();
        storage.set(STORAGE_KEY, "{not json").unwrap();
        assert!(load_records(&storage).is_empty());
    }

    #[test]
    fn test_parse_import() {
        let records = parse_import_text(
            r#"[{"type":"warning","title":"Disk"},{"title":"no type"},42,{"type":"odd"}]"#,
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, NotificationType::Warning);
        assert_eq!(records[1].kind, NotificationType::Custom);

        let single = parse_import_text(r#"{"type":"info","message":"hi"}"#).unwrap();
        assert_eq!(single.len(), 1);

        assert!(parse_import_text("nope").is_err());
    }
}
