use crate::domain::models::{RoutineBlock, RoutineCategory};
use crate::infrastructure::error::InfraError;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait RoutineRepository: Send + Sync {
    fn list_all(&self, user_id: &str) -> Result<Vec<RoutineBlock>, InfraError>;
    fn find(&self, routine_id: &str) -> Result<Option<RoutineBlock>, InfraError>;
    fn create(&self, routine: &RoutineBlock) -> Result<(), InfraError>;
    fn update(&self, routine: &RoutineBlock) -> Result<(), InfraError>;
    fn delete(&self, routine_id: &str) -> Result<bool, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteRoutineRepository {
    db_path: PathBuf,
}

const ROUTINE_COLUMNS: &str =
    "id, user_id, title, start_time, end_time, days_of_week, is_recurring, specific_date, category";

struct RoutineRow {
    id: String,
    user_id: String,
    title: String,
    start_time: String,
    end_time: String,
    days_of_week: String,
    is_recurring: bool,
    specific_date: Option<String>,
    category: String,
}

impl SqliteRoutineRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

fn read_routine_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RoutineRow> {
    Ok(RoutineRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        days_of_week: row.get(5)?,
        is_recurring: row.get(6)?,
        specific_date: row.get(7)?,
        category: row.get(8)?,
    })
}

fn decode_routine(row: RoutineRow) -> Result<RoutineBlock, InfraError> {
    let specific_date = row
        .specific_date
        .as_deref()
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|error| {
                InfraError::InvalidInput(format!(
                    "invalid routine_blocks.specific_date '{raw}': {error}"
                ))
            })
        })
        .transpose()?;

    Ok(RoutineBlock {
        days_of_week: serde_json::from_str(&row.days_of_week)?,
        category: RoutineCategory::parse(&row.category).map_err(InfraError::invalid)?,
        specific_date,
        id: row.id,
        user_id: row.user_id,
        title: row.title,
        start_time: row.start_time,
        end_time: row.end_time,
        is_recurring: row.is_recurring,
    })
}

impl RoutineRepository for SqliteRoutineRepository {
    fn list_all(&self, user_id: &str) -> Result<Vec<RoutineBlock>, InfraError> {
        let connection = self.connect()?;
        let sql = format!(
            "SELECT {ROUTINE_COLUMNS} FROM routine_blocks WHERE user_id = ?1 ORDER BY start_time, id"
        );
        let mut statement = connection.prepare(&sql)?;
        let rows = statement
            .query_map(params![user_id], read_routine_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode_routine).collect()
    }

    fn find(&self, routine_id: &str) -> Result<Option<RoutineBlock>, InfraError> {
        let connection = self.connect()?;
        let sql = format!("SELECT {ROUTINE_COLUMNS} FROM routine_blocks WHERE id = ?1");
        let row = connection
            .query_row(&sql, params![routine_id], read_routine_row)
            .optional()?;
        row.map(decode_routine).transpose()
    }

    fn create(&self, routine: &RoutineBlock) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO routine_blocks
               (id, user_id, title, start_time, end_time, days_of_week, is_recurring, specific_date, category)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                routine.id,
                routine.user_id,
                routine.title,
                routine.start_time,
                routine.end_time,
                serde_json::to_string(&routine.days_of_week)?,
                routine.is_recurring,
                routine.specific_date.map(|date| date.to_string()),
                routine.category.as_str(),
            ],
        )?;
        Ok(())
    }

    fn update(&self, routine: &RoutineBlock) -> Result<(), InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "UPDATE routine_blocks SET
               title = ?2, start_time = ?3, end_time = ?4, days_of_week = ?5,
               is_recurring = ?6, specific_date = ?7, category = ?8
             WHERE id = ?1",
            params![
                routine.id,
                routine.title,
                routine.start_time,
                routine.end_time,
                serde_json::to_string(&routine.days_of_week)?,
                routine.is_recurring,
                routine.specific_date.map(|date| date.to_string()),
                routine.category.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(InfraError::InvalidInput(format!(
                "routine not found: {}",
                routine.id
            )));
        }
        Ok(())
    }

    fn delete(&self, routine_id: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let removed =
            connection.execute("DELETE FROM routine_blocks WHERE id = ?1", params![routine_id])?;
        Ok(removed > 0)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRoutineRepository {
    routines: Mutex<HashMap<String, RoutineBlock>>,
}

impl InMemoryRoutineRepository {
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, RoutineBlock>>, InfraError> {
        self.routines
            .lock()
            .map_err(|error| InfraError::InvalidInput(format!("routine lock poisoned: {error}")))
    }
}

impl RoutineRepository for InMemoryRoutineRepository {
    fn list_all(&self, user_id: &str) -> Result<Vec<RoutineBlock>, InfraError> {
        let mut routines = self
            .lock()?
            .values()
            .filter(|routine| routine.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();
        routines.sort_by(|left, right| {
            left.start_time
                .cmp(&right.start_time)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(routines)
    }

    fn find(&self, routine_id: &str) -> Result<Option<RoutineBlock>, InfraError> {
        Ok(self.lock()?.get(routine_id).cloned())
    }

    fn create(&self, routine: &RoutineBlock) -> Result<(), InfraError> {
        self.lock()?.insert(routine.id.clone(), routine.clone());
        Ok(())
    }

    fn update(&self, routine: &RoutineBlock) -> Result<(), InfraError> {
        let mut routines = self.lock()?;
        if !routines.contains_key(&routine.id) {
            return Err(InfraError::InvalidInput(format!(
                "routine not found: {}",
                routine.id
            )));
        }
        routines.insert(routine.id.clone(), routine.clone());
        Ok(())
    }

    fn delete(&self, routine_id: &str) -> Result<bool, InfraError> {
        Ok(self.lock()?.remove(routine_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::initialize_database;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DB: AtomicUsize = AtomicUsize::new(0);

    struct TempDb {
        dir: PathBuf,
        path: PathBuf,
    }

    impl TempDb {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DB.fetch_add(1, Ordering::Relaxed);
            let dir = std::env::temp_dir().join(format!(
                "dayplan-routine-repo-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&dir).expect("create temp dir");
            let path = dir.join("dayplan.sqlite");
            initialize_database(&path).expect("initialize database");
            Self { dir, path }
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    fn sample_routine(id: &str) -> RoutineBlock {
        RoutineBlock {
            id: id.to_string(),
            user_id: "usr-1".to_string(),
            title: "Lunch".to_string(),
            start_time: "12:00".to_string(),
            end_time: "13:00".to_string(),
            days_of_week: vec![1, 2, 3, 4, 5],
            is_recurring: true,
            specific_date: None,
            category: RoutineCategory::Personal,
        }
    }

    #[test]
    fn create_and_find_roundtrip() {
        let db = TempDb::new();
        let repository = SqliteRoutineRepository::new(&db.path);
        let mut routine = sample_routine("rtn-1");
        routine.is_recurring = false;
        routine.specific_date = NaiveDate::from_ymd_opt(2026, 3, 4);
        repository.create(&routine).expect("create routine");

        let found = repository.find("rtn-1").expect("find routine");
        assert_eq!(found, Some(routine));
    }

    #[test]
    fn list_all_is_ordered_and_scoped() {
        let db = TempDb::new();
        let repository = SqliteRoutineRepository::new(&db.path);
        let mut early = sample_routine("rtn-early");
        early.start_time = "08:00".to_string();
        early.end_time = "09:00".to_string();
        let mut other = sample_routine("rtn-other");
        other.user_id = "usr-2".to_string();
        repository.create(&sample_routine("rtn-lunch")).expect("create lunch");
        repository.create(&early).expect("create early");
        repository.create(&other).expect("create other user");

        let routines = repository.list_all("usr-1").expect("list routines");
        assert_eq!(routines.len(), 2);
        assert_eq!(routines[0].id, "rtn-early");
        assert_eq!(routines[1].id, "rtn-lunch");
    }

    #[test]
    fn update_and_delete_flow() {
        let db = TempDb::new();
        let repository = SqliteRoutineRepository::new(&db.path);
        let mut routine = sample_routine("rtn-1");
        repository.create(&routine).expect("create routine");

        routine.title = "Long lunch".to_string();
        routine.end_time = "13:30".to_string();
        routine.category = RoutineCategory::Other;
        repository.update(&routine).expect("update routine");
        let found = repository.find("rtn-1").expect("find").expect("exists");
        assert_eq!(found.title, "Long lunch");
        assert_eq!(found.category, RoutineCategory::Other);

        assert!(repository.delete("rtn-1").expect("delete"));
        assert!(!repository.delete("rtn-1").expect("second delete"));
        assert!(repository.update(&routine).is_err());
    }

    #[test]
    fn in_memory_repository_supports_the_same_flow() {
        let repository = InMemoryRoutineRepository::default();
        let routine = sample_routine("rtn-1");
        repository.create(&routine).expect("create");
        assert_eq!(repository.find("rtn-1").expect("find"), Some(routine.clone()));
        assert_eq!(repository.list_all("usr-1").expect("list").len(), 1);
        assert!(repository.delete("rtn-1").expect("delete"));
        assert!(repository.find("rtn-1").expect("find").is_none());
    }
}
