use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::HistoryError;
use crate::history::{History, HistoryStore, NotificationRecord};

/// Records committed per transaction.
pub const HISTORY_BATCH_SIZE: usize = 400;

const SELECT_NOTIFICATIONS: &str = "SELECT warning_id, notified, student, subject, student_group, \
     program, percentage, tier, last_update \
     FROM attendance.notifications";

pub async fn connect(database_url: &str) -> Result<PgPool, HistoryError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &PgPool) -> Result<(), HistoryError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> Result<(String, NotificationRecord), sqlx::Error> {
    let id: String = row.try_get("warning_id")?;
    let record = NotificationRecord {
        notified: row.try_get("notified")?,
        student: row.try_get("student")?,
        subject: row.try_get("subject")?,
        group: row.try_get("student_group")?,
        program: row.try_get("program")?,
        percentage: row.try_get("percentage")?,
        tier: row.try_get("tier")?,
        last_update: row.try_get("last_update")?,
    };
    Ok((id, record))
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn load_all(&self) -> Result<History, HistoryError> {
        let rows = sqlx::query(SELECT_NOTIFICATIONS)
            .fetch_all(&self.pool)
            .await?;

        let mut history = History::with_capacity(rows.len());
        for row in &rows {
            let (id, record) = record_from_row(row)?;
            history.insert(id, record);
        }
        Ok(history)
    }

    async fn get(&self, warning_id: &str) -> Result<Option<NotificationRecord>, HistoryError> {
        let query = format!("{SELECT_NOTIFICATIONS} WHERE warning_id = $1");
        let row = sqlx::query(&query)
            .bind(warning_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(record_from_row(&row)?.1)),
            None => Ok(None),
        }
    }

    async fn set_many(
        &self,
        updates: &BTreeMap<String, NotificationRecord>,
    ) -> Result<(), HistoryError> {
        let updates: Vec<(&String, &NotificationRecord)> = updates.iter().collect();

        for batch in updates.chunks(HISTORY_BATCH_SIZE) {
            let mut tx = self.pool.begin().await?;
            for (id, record) in batch {
                sqlx::query(
                    r#"
                    INSERT INTO attendance.notifications
                    (id, warning_id, notified, student, subject, student_group, program,
                     percentage, tier, last_update)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                    ON CONFLICT (warning_id) DO UPDATE
                    SET notified = EXCLUDED.notified,
                        student = EXCLUDED.student,
                        subject = EXCLUDED.subject,
                        student_group = EXCLUDED.student_group,
                        program = EXCLUDED.program,
                        percentage = EXCLUDED.percentage,
                        tier = EXCLUDED.tier,
                        last_update = EXCLUDED.last_update
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(id.as_str())
                .bind(record.notified)
                .bind(&record.student)
                .bind(&record.subject)
                .bind(&record.group)
                .bind(&record.program)
                .bind(&record.percentage)
                .bind(&record.tier)
                .bind(record.last_update)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            tracing::info!(records = batch.len(), "committed notification batch");
        }

        Ok(())
    }
}
