use crate::domain::models::{SchedulingMode, UserPreference, WorkingHours};
use crate::infrastructure::error::InfraError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait PreferenceStore: Send + Sync {
    fn get(&self, user_id: &str) -> Result<Option<UserPreference>, InfraError>;
    fn upsert(&self, preference: &UserPreference) -> Result<(), InfraError>;

    /// Returns the stored preference, creating the default record on first
    /// access.
    fn get_or_create_default(&self, user_id: &str) -> Result<UserPreference, InfraError> {
        if let Some(preference) = self.get(user_id)? {
            return Ok(preference);
        }
        let preference = UserPreference::default_for(user_id);
        self.upsert(&preference)?;
        Ok(preference)
    }
}

#[derive(Debug, Clone)]
pub struct SqlitePreferenceStore {
    db_path: PathBuf,
}

impl SqlitePreferenceStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn get(&self, user_id: &str) -> Result<Option<UserPreference>, InfraError> {
        let connection = self.connect()?;
        let row: Option<(String, String, i64, i64, String, String)> = connection
            .query_row(
                "SELECT work_start, work_end, break_duration, buffer_time, scheduling_mode, work_days
                 FROM user_preferences WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((work_start, work_end, break_duration, buffer_time, mode_raw, work_days_raw)) =
            row
        else {
            return Ok(None);
        };

        Ok(Some(UserPreference {
            user_id: user_id.to_string(),
            working_hours: WorkingHours {
                start: work_start,
                end: work_end,
            },
            break_duration,
            buffer_time,
            scheduling_mode: SchedulingMode::parse(&mode_raw).map_err(InfraError::invalid)?,
            work_days: serde_json::from_str(&work_days_raw)?,
        }))
    }

    fn upsert(&self, preference: &UserPreference) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO user_preferences
               (user_id, work_start, work_end, break_duration, buffer_time, scheduling_mode, work_days)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id) DO UPDATE SET
               work_start = excluded.work_start,
               work_end = excluded.work_end,
               break_duration = excluded.break_duration,
               buffer_time = excluded.buffer_time,
               scheduling_mode = excluded.scheduling_mode,
               work_days = excluded.work_days",
            params![
                preference.user_id,
                preference.working_hours.start,
                preference.working_hours.end,
                preference.break_duration,
                preference.buffer_time,
                preference.scheduling_mode.as_str(),
                serde_json::to_string(&preference.work_days)?,
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    preferences: Mutex<HashMap<String, UserPreference>>,
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn get(&self, user_id: &str) -> Result<Option<UserPreference>, InfraError> {
        let preferences = self.preferences.lock().map_err(|error| {
            InfraError::InvalidInput(format!("preference lock poisoned: {error}"))
        })?;
        Ok(preferences.get(user_id).cloned())
    }

    fn upsert(&self, preference: &UserPreference) -> Result<(), InfraError> {
        let mut preferences = self.preferences.lock().map_err(|error| {
            InfraError::InvalidInput(format!("preference lock poisoned: {error}"))
        })?;
        preferences.insert(preference.user_id.clone(), preference.clone());
        Ok(())
    }
}
