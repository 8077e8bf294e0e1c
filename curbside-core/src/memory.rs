//! In-process schedule store.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::model::{NewSchedule, ScheduleRecord};
use crate::ports::{PortError, ScheduleStore};

/// Schedule cache that lives for the lifetime of the process.
#[derive(Default)]
pub struct MemoryScheduleStore {
    rows: Mutex<Vec<ScheduleRecord>>,
}

impl MemoryScheduleStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, duplicates included.
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    /// Whether nothing has been stored yet.
    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn find(
        &self,
        address: &str,
        zip_code: Option<&str>,
    ) -> Result<Option<ScheduleRecord>, PortError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|row| row.address == address && row.zip_code.as_deref() == zip_code)
            .cloned())
    }

    async fn insert(&self, schedule: NewSchedule) -> Result<ScheduleRecord, PortError> {
        let mut rows = self.rows.lock().await;
        let id = i64::try_from(rows.len())
            .map_err(|err| PortError::Storage(err.to_string()))?
            .saturating_add(1);
        let record = ScheduleRecord {
            id,
            address: schedule.address,
            city: schedule.city,
            state: schedule.state,
            zip_code: schedule.zip_code,
            schedule: schedule.schedule,
            created_at: Utc::now(),
        };
        rows.push(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{CollectionEvent, Schedule};

    fn new_schedule(address: &str, zip: Option<&str>) -> NewSchedule {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date");
        NewSchedule {
            address: address.to_owned(),
            city: Some("San Jose".to_owned()),
            state: Some("CA".to_owned()),
            zip_code: zip.map(str::to_owned),
            schedule: Schedule::Events(vec![CollectionEvent {
                date,
                kind: "Garbage, Recycling".to_owned(),
            }]),
        }
    }

    #[tokio::test]
    async fn round_trip_requires_byte_identical_address() {
        let store = MemoryScheduleStore::new();
        let inserted = store
            .insert(new_schedule("200 E Santa Clara St", Some("95113")))
            .await
            .expect("insert");

        let found = store
            .find("200 E Santa Clara St", Some("95113"))
            .await
            .expect("find")
            .expect("hit");
        assert_eq!(found.schedule, inserted.schedule);

        let miss = store
            .find("200 E. Santa Clara Street", Some("95113"))
            .await
            .expect("find");
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn missing_zip_only_matches_missing_zip() {
        let store = MemoryScheduleStore::new();
        store
            .insert(new_schedule("1 Main St", None))
            .await
            .expect("insert");
        assert!(store.find("1 Main St", None).await.expect("find").is_some());
        assert!(store.find("1 Main St", Some("95113")).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn insert_never_deduplicates() {
        let store = MemoryScheduleStore::new();
        let first = store
            .insert(new_schedule("1 Main St", Some("95113")))
            .await
            .expect("insert");
        store
            .insert(new_schedule("1 Main St", Some("95113")))
            .await
            .expect("insert");
        assert_eq!(store.len().await, 2);
        let found = store.find("1 Main St", Some("95113")).await.expect("find");
        assert_eq!(found.map(|row| row.id), Some(first.id));
    }
}
