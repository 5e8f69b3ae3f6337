use crate::domain::models::{SlotStatus, TimeSlot};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait TimeSlotRepository: Send + Sync {
    /// Slots recalculation must plan around: fixed slots plus any slot whose
    /// status marks work already done or underway.
    fn list_committed(&self, user_id: &str) -> Result<Vec<TimeSlot>, InfraError>;
    /// Slots overlapping `[start, end)`, ordered by start time.
    fn list_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, InfraError>;
    fn find(&self, slot_id: &str) -> Result<Option<TimeSlot>, InfraError>;
    /// Clears reschedulable output from `from` onward; returns how many slots
    /// were removed.
    fn delete_future_scheduled(&self, user_id: &str, from: DateTime<Utc>)
        -> Result<usize, InfraError>;
    fn create_many(&self, slots: &[TimeSlot]) -> Result<(), InfraError>;
    fn set_status(&self, slot_id: &str, status: SlotStatus) -> Result<bool, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteTimeSlotRepository {
    db_path: PathBuf,
}

const SLOT_COLUMNS: &str = "id, user_id, task_id, start_time, end_time, status, is_fixed";

struct SlotRow {
    id: String,
    user_id: String,
    task_id: Option<String>,
    start_time: String,
    end_time: String,
    status: String,
    is_fixed: bool,
}

impl SqliteTimeSlotRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

fn read_slot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SlotRow> {
    Ok(SlotRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        task_id: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        status: row.get(5)?,
        is_fixed: row.get(6)?,
    })
}

fn decode_slot(row: SlotRow) -> Result<TimeSlot, InfraError> {
    Ok(TimeSlot {
        start_time: parse_datetime(&row.start_time, "time_slots.start_time")?,
        end_time: parse_datetime(&row.end_time, "time_slots.end_time")?,
        status: SlotStatus::parse(&row.status).map_err(InfraError::invalid)?,
        id: row.id,
        user_id: row.user_id,
        task_id: row.task_id,
        is_fixed: row.is_fixed,
    })
}

fn parse_datetime(raw: &str, column: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| InfraError::InvalidInput(format!("invalid {column} '{raw}': {error}")))
}

impl TimeSlotRepository for SqliteTimeSlotRepository {
    fn list_committed(&self, user_id: &str) -> Result<Vec<TimeSlot>, InfraError> {
        let connection = self.connect()?;
        let sql = format!(
            "SELECT {SLOT_COLUMNS} FROM time_slots
             WHERE user_id = ?1 AND (is_fixed = 1 OR status IN ('completed', 'in_progress'))
             ORDER BY start_time, id"
        );
        let mut statement = connection.prepare(&sql)?;
        let rows = statement
            .query_map(params![user_id], read_slot_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode_slot).collect()
    }

    fn list_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, InfraError> {
        let connection = self.connect()?;
        let sql = format!(
            "SELECT {SLOT_COLUMNS} FROM time_slots
             WHERE user_id = ?1 AND start_time < ?3 AND end_time > ?2
             ORDER BY start_time, id"
        );
        let mut statement = connection.prepare(&sql)?;
        let rows = statement
            .query_map(
                params![user_id, start.to_rfc3339(), end.to_rfc3339()],
                read_slot_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode_slot).collect()
    }

    fn find(&self, slot_id: &str) -> Result<Option<TimeSlot>, InfraError> {
        let connection = self.connect()?;
        let sql = format!("SELECT {SLOT_COLUMNS} FROM time_slots WHERE id = ?1");
        let row = connection
            .query_row(&sql, params![slot_id], read_slot_row)
            .optional()?;
        row.map(decode_slot).transpose()
    }

    fn delete_future_scheduled(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
    ) -> Result<usize, InfraError> {
        let connection = self.connect()?;
        let removed = connection.execute(
            "DELETE FROM time_slots
             WHERE user_id = ?1 AND status = 'scheduled' AND is_fixed = 0 AND start_time >= ?2",
            params![user_id, from.to_rfc3339()],
        )?;
        Ok(removed)
    }

    fn create_many(&self, slots: &[TimeSlot]) -> Result<(), InfraError> {
        let connection = self.connect()?;
        for slot in slots {
            connection.execute(
                "INSERT INTO time_slots (id, user_id, task_id, start_time, end_time, status, is_fixed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    slot.id,
                    slot.user_id,
                    slot.task_id,
                    slot.start_time.to_rfc3339(),
                    slot.end_time.to_rfc3339(),
                    slot.status.as_str(),
                    slot.is_fixed,
                ],
            )?;
        }
        Ok(())
    }

    fn set_status(&self, slot_id: &str, status: SlotStatus) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "UPDATE time_slots SET status = ?2 WHERE id = ?1",
            params![slot_id, status.as_str()],
        )?;
        Ok(changed > 0)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTimeSlotRepository {
    slots: Mutex<HashMap<String, TimeSlot>>,
}

impl InMemoryTimeSlotRepository {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, TimeSlot>>, InfraError> {
        self.slots
            .lock()
            .map_err(|error| InfraError::InvalidInput(format!("slot lock poisoned: {error}")))
    }

    fn sorted(mut slots: Vec<TimeSlot>) -> Vec<TimeSlot> {
        slots.sort_by(|left, right| {
            left.start_time
                .cmp(&right.start_time)
                .then_with(|| left.id.cmp(&right.id))
        });
        slots
    }
}

impl TimeSlotRepository for InMemoryTimeSlotRepository {
    fn list_committed(&self, user_id: &str) -> Result<Vec<TimeSlot>, InfraError> {
        let slots = self
            .lock()?
            .values()
            .filter(|slot| slot.user_id == user_id && (slot.is_fixed || slot.status.is_committed()))
            .cloned()
            .collect();
        Ok(Self::sorted(slots))
    }

    fn list_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, InfraError> {
        let slots = self
            .lock()?
            .values()
            .filter(|slot| {
                slot.user_id == user_id && slot.start_time < end && slot.end_time > start
            })
            .cloned()
            .collect();
        Ok(Self::sorted(slots))
    }

    fn find(&self, slot_id: &str) -> Result<Option<TimeSlot>, InfraError> {
        Ok(self.lock()?.get(slot_id).cloned())
    }

    fn delete_future_scheduled(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
    ) -> Result<usize, InfraError> {
        let mut slots = self.lock()?;
        let before = slots.len();
        slots.retain(|_, slot| {
            !(slot.user_id == user_id
                && slot.status == SlotStatus::Scheduled
                && !slot.is_fixed
                && slot.start_time >= from)
        });
        Ok(before - slots.len())
    }

    fn create_many(&self, slots: &[TimeSlot]) -> Result<(), InfraError> {
        let mut stored = self.lock()?;
        for slot in slots {
            stored.insert(slot.id.clone(), slot.clone());
        }
        Ok(())
    }

    fn set_status(&self, slot_id: &str, status: SlotStatus) -> Result<bool, InfraError> {
        let mut slots = self.lock()?;
        let Some(slot) = slots.get_mut(slot_id) else {
            return Ok(false);
        };
        slot.status = status;
        Ok(true)
    }
}
