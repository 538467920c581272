use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::HistoryError;
use crate::models::{Tier, WarningRecord};

/// Persisted notification state for one warning id.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub notified: bool,
    pub student: String,
    pub subject: String,
    pub group: String,
    pub program: String,
    pub percentage: String,
    pub tier: Option<String>,
    pub last_update: Option<NaiveDateTime>,
}

impl NotificationRecord {
    pub fn for_warning(
        warning: &WarningRecord,
        notified: bool,
        last_update: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            notified,
            student: warning.student.clone(),
            subject: warning.subject.clone(),
            group: warning.group.clone(),
            program: warning.program.to_string(),
            percentage: warning.percentage_label(),
            tier: Some(warning.tier.label().to_string()),
            last_update,
        }
    }
}

pub type History = HashMap<String, NotificationRecord>;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn load_all(&self) -> Result<History, HistoryError>;

    async fn get(&self, warning_id: &str) -> Result<Option<NotificationRecord>, HistoryError>;

    async fn set_many(
        &self,
        updates: &BTreeMap<String, NotificationRecord>,
    ) -> Result<(), HistoryError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedWarning {
    pub id: String,
    pub warning: WarningRecord,
    pub notified: bool,
    pub last_update: Option<NaiveDateTime>,
}

pub fn attach_status(warnings: Vec<WarningRecord>, history: &History) -> Vec<TrackedWarning> {
    warnings
        .into_iter()
        .map(|warning| {
            let id = warning.warning_id();
            let stored = history.get(&id);
            TrackedWarning {
                notified: stored.map(|record| record.notified).unwrap_or(false),
                last_update: stored.and_then(|record| record.last_update),
                id,
                warning,
            }
        })
        .collect()
}

/// Records warnings as sent (or not sent) in one store write. Warnings whose
/// stored status already matches are skipped. Marking sent stamps `now`,
/// unmarking clears the time. Returns the records that were written.
pub async fn mark_many<S>(
    store: &S,
    warnings: &[WarningRecord],
    notified: bool,
    now: NaiveDateTime,
) -> Result<BTreeMap<String, NotificationRecord>, HistoryError>
where
    S: HistoryStore + ?Sized,
{
    let mut updates = BTreeMap::new();
    for warning in warnings {
        let id = warning.warning_id();
        if updates.contains_key(&id) {
            continue;
        }
        let stored = store.get(&id).await?;
        if stored.map(|record| record.notified).unwrap_or(false) == notified {
            tracing::debug!(%id, notified, "notification status unchanged");
            continue;
        }
        let record = NotificationRecord::for_warning(warning, notified, notified.then_some(now));
        updates.insert(id, record);
    }

    if !updates.is_empty() {
        store.set_many(&updates).await?;
        tracing::info!(records = updates.len(), notified, "notification statuses updated");
    }
    Ok(updates)
}

/// Multi-value filter: OR inside a dimension, AND across dimensions.
/// An empty dimension admits everything.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub programs: Vec<String>,
    pub groups: Vec<String>,
    pub subjects: Vec<String>,
    pub students: Vec<String>,
}

impl HistoryFilter {
    pub fn admits(&self, program: &str, group: &str, subject: &str, student: &str) -> bool {
        fn within(values: &[String], value: &str) -> bool {
            values.is_empty() || values.iter().any(|v| v == value)
        }

        within(&self.programs, program)
            && within(&self.groups, group)
            && within(&self.subjects, subject)
            && within(&self.students, student)
    }

    pub fn admits_warning(&self, warning: &WarningRecord) -> bool {
        self.admits(
            warning.program.as_str(),
            &warning.group,
            &warning.subject,
            &warning.student,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentEntry {
    pub id: String,
    pub record: NotificationRecord,
}

/// Sent notifications, newest first. Entries stored without a tier get it
/// back from the id suffix.
pub fn sent_history(history: &History, filter: &HistoryFilter) -> Vec<SentEntry> {
    let mut entries: Vec<SentEntry> = history
        .iter()
        .filter(|(_, record)| record.notified)
        .filter(|(_, record)| {
            filter.admits(&record.program, &record.group, &record.subject, &record.student)
        })
        .map(|(id, record)| {
            let mut record = record.clone();
            let missing_tier = record
                .tier
                .as_deref()
                .map_or(true, |tier| tier.is_empty() || tier == Tier::None.label());
            if missing_tier {
                record.tier = id.rsplit_once('_').map(|(_, tier)| tier.to_string());
            }
            SentEntry {
                id: id.clone(),
                record,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.record
            .last_update
            .cmp(&a.record.last_update)
            .then_with(|| a.id.cmp(&b.id))
    });
    entries
}
