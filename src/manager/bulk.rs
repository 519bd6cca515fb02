//! Persistence, restoration and JSON import/export.

use crate::error::Result;
use crate::metrics::ToastMetrics;
use crate::notification::{NotificationId, NotificationOptions};
use crate::persistence::{
    load_records, parse_import_text, parse_import_values, save_records, ExportRecord,
    ImportRecord, PersistedRecord,
};

use super::{Admission, ToastManager};

impl ToastManager {
    /// Write every persistent notification to storage.
    ///
    /// Best effort: failures are logged and counted, never returned.
    pub(super) fn persist(&self) {
        if !self.config.enable_persistence {
            return;
        }
        let Some(ref storage) = self.storage else {
            return;
        };

        let mut records: Vec<PersistedRecord> = self
            .order
            .iter()
            .filter_map(|id| self.notifications.get(id))
            .filter(|active| active.persistent && active.removing.is_none())
            .map(|active| PersistedRecord {
                id: active.id.clone(),
                kind: active.kind,
                title: active.title.clone(),
                message: active.message.clone(),
                icon: active.icon.clone(),
                persistent: active.persistent,
                timestamp: active.created_at.timestamp_millis(),
                restore_on_load: active.restore_on_load,
            })
            .collect();

        // Waiting entries keep their slot in storage until they are shown
        for entry in self.queue.iter() {
            let options = &entry.options;
            let Some(ref id) = options.id else {
                continue;
            };
            if options.persistent != Some(true) || records.iter().any(|r| &r.id == id) {
                continue;
            }
            records.push(PersistedRecord {
                id: id.clone(),
                kind: entry.kind,
                title: options.title.clone().unwrap_or_default(),
                message: options.message.clone().unwrap_or_default(),
                icon: options.icon.clone(),
                persistent: true,
                timestamp: entry.created_at.unwrap_or(entry.enqueued_at).timestamp_millis(),
                restore_on_load: options.restore_on_load.unwrap_or(true),
            });
        }

        let now = self.clock.now();
        for record in &self.unrestored {
            if record.should_restore(now) && !records.iter().any(|r| r.id == record.id) {
                records.push(record.clone());
            }
        }

        if let Err(e) = save_records(storage.as_ref(), &records) {
            ToastMetrics::record_persistence_failure();
            tracing::warn!(error = %e, records = records.len(), "Failed to persist notifications");
        }
    }

    /// Bring back fresh persisted notifications with their original timestamps
    pub(super) fn restore(&mut self) {
        let Some(storage) = self.storage.clone() else {
            return;
        };
        let now = self.clock.now();
        let records = load_records(storage.as_ref());
        let total = records.len();
        let mut restored = 0;

        for record in records {
            if !record.should_restore(now) || self.notifications.contains_key(&record.id) {
                continue;
            }
            let created_at = record.created_at();
            let options = NotificationOptions {
                id: Some(record.id.clone()),
                title: Some(record.title.clone()).filter(|t| !t.is_empty()),
                message: Some(record.message.clone()),
                icon: record.icon.clone(),
                persistent: Some(record.persistent),
                restore_on_load: Some(record.restore_on_load),
                // Each stored record comes back as its own notification
                group: Some(false),
                ..Default::default()
            };
            match self.admit(record.kind, options, created_at) {
                Ok(Admission::Dropped) => {
                    tracing::debug!(notification_id = %record.id, "No room to restore, keeping record stored");
                    self.unrestored.push(record);
                }
                Ok(_) => restored += 1,
                Err(e) => tracing::warn!(error = %e, "Failed to restore notification"),
            }
        }

        tracing::info!(
            restored = restored,
            unrestored = self.unrestored.len(),
            stored = total,
            "Restored persisted notifications"
        );
        // Rewrite so stale records do not linger
        self.persist();
    }

    /// Export active notifications as a JSON array.
    ///
    /// Transient (non-persistent) notifications are only included on request.
    pub fn export_json(&self, include_transient: bool) -> Result<String> {
        let records: Vec<ExportRecord> = self
            .order
            .iter()
            .filter_map(|id| self.notifications.get(id))
            .filter(|active| include_transient || active.persistent)
            .map(|active| {
                let mut record = ExportRecord::from(&active.snapshot());
                // Raw title; the merge counter is display only
                record.title = active.title.clone();
                record
            })
            .collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Import a JSON array (or a single object) of notifications.
    ///
    /// Malformed entries are skipped. Returns the ids now showing an imported
    /// entry; queued or dropped entries are not listed.
    pub fn import_json(&mut self, text: &str) -> Result<Vec<NotificationId>> {
        let records = parse_import_text(text)?;
        Ok(self.import_records(records))
    }

    pub fn import_values(&mut self, values: Vec<serde_json::Value>) -> Vec<NotificationId> {
        let records = parse_import_values(values);
        self.import_records(records)
    }

    fn import_records(&mut self, records: Vec<ImportRecord>) -> Vec<NotificationId> {
        let total = records.len();
        let ids: Vec<NotificationId> = records
            .into_iter()
            .filter_map(|record| {
                let kind = record.kind;
                let options = NotificationOptions {
                    id: record.id,
                    title: record.title,
                    message: record.message,
                    icon: record.icon,
                    persistent: record.persistent,
                    duration_ms: record.duration,
                    ..Default::default()
                };
                match self.notify(kind, options) {
                    Ok(admission) => admission.into_id(),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to import notification");
                        None
                    }
                }
            })
            .collect();
        tracing::debug!(imported = ids.len(), total = total, "Imported notifications");
        ids
    }
}
