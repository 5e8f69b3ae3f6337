use crate::domain::models::{Priority, Task, TaskStatus};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait TaskRepository: Send + Sync {
    /// Tasks that still need scheduling, ordered by deadline.
    fn list_pending(&self, user_id: &str) -> Result<Vec<Task>, InfraError>;
    fn list_all(&self, user_id: &str) -> Result<Vec<Task>, InfraError>;
    fn find(&self, task_id: &str) -> Result<Option<Task>, InfraError>;
    fn create(&self, task: &Task) -> Result<(), InfraError>;
    fn update(&self, task: &Task) -> Result<(), InfraError>;
    fn delete(&self, task_id: &str) -> Result<bool, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteTaskRepository {
    db_path: PathBuf,
}

struct TaskRow {
    id: String,
    user_id: String,
    title: String,
    description: Option<String>,
    deadline: String,
    priority: String,
    min_work_session: i64,
    tags: String,
    status: String,
    created_at: String,
}

const TASK_COLUMNS: &str =
    "id, user_id, title, description, deadline, priority, min_work_session, tags, status, created_at";

impl SqliteTaskRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }

    fn query_tasks(
        &self,
        connection: &Connection,
        sql: &str,
        user_id: &str,
    ) -> Result<Vec<Task>, InfraError> {
        let mut statement = connection.prepare(sql)?;
        let rows = statement
            .query_map(params![user_id], read_task_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|row| decode_task(connection, row))
            .collect()
    }
}

fn read_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        deadline: row.get(4)?,
        priority: row.get(5)?,
        min_work_session: row.get(6)?,
        tags: row.get(7)?,
        status: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn decode_task(connection: &Connection, row: TaskRow) -> Result<Task, InfraError> {
    let mut statement = connection
        .prepare("SELECT depends_on FROM task_dependencies WHERE task_id = ?1 ORDER BY position")?;
    let dependencies = statement
        .query_map(params![row.id], |dep_row| dep_row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Task {
        deadline: parse_datetime(&row.deadline, "tasks.deadline")?,
        created_at: parse_datetime(&row.created_at, "tasks.created_at")?,
        priority: Priority::parse(&row.priority).map_err(InfraError::invalid)?,
        status: TaskStatus::parse(&row.status).map_err(InfraError::invalid)?,
        tags: serde_json::from_str(&row.tags)?,
        id: row.id,
        user_id: row.user_id,
        title: row.title,
        description: row.description,
        min_work_session: row.min_work_session,
        dependencies,
    })
}

fn parse_datetime(raw: &str, column: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| InfraError::InvalidInput(format!("invalid {column} '{raw}': {error}")))
}

fn write_dependencies(connection: &Connection, task: &Task) -> Result<(), InfraError> {
    connection.execute(
        "DELETE FROM task_dependencies WHERE task_id = ?1",
        params![task.id],
    )?;
    for (position, depends_on) in task.dependencies.iter().enumerate() {
        connection.execute(
            "INSERT INTO task_dependencies (task_id, depends_on, position) VALUES (?1, ?2, ?3)",
            params![task.id, depends_on, position as i64],
        )?;
    }
    Ok(())
}

impl TaskRepository for SqliteTaskRepository {
    fn list_pending(&self, user_id: &str) -> Result<Vec<Task>, InfraError> {
        let connection = self.connect()?;
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE user_id = ?1 AND status != 'completed'
             ORDER BY deadline, id"
        );
        self.query_tasks(&connection, &sql, user_id)
    }

    fn list_all(&self, user_id: &str) -> Result<Vec<Task>, InfraError> {
        let connection = self.connect()?;
        let sql =
            format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 ORDER BY deadline, id");
        self.query_tasks(&connection, &sql, user_id)
    }

    fn find(&self, task_id: &str) -> Result<Option<Task>, InfraError> {
        let connection = self.connect()?;
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        let row = connection
            .query_row(&sql, params![task_id], read_task_row)
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(decode_task(&connection, row)?))
    }

    fn create(&self, task: &Task) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO tasks
               (id, user_id, title, description, deadline, priority, min_work_session, tags, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.id,
                task.user_id,
                task.title,
                task.description,
                task.deadline.to_rfc3339(),
                task.priority.as_str(),
                task.min_work_session,
                serde_json::to_string(&task.tags)?,
                task.status.as_str(),
                task.created_at.to_rfc3339(),
            ],
        )?;
        write_dependencies(&connection, task)
    }

    fn update(&self, task: &Task) -> Result<(), InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "UPDATE tasks SET
               title = ?2, description = ?3, deadline = ?4, priority = ?5,
               min_work_session = ?6, tags = ?7, status = ?8
             WHERE id = ?1",
            params![
                task.id,
                task.title,
                task.description,
                task.deadline.to_rfc3339(),
                task.priority.as_str(),
                task.min_work_session,
                serde_json::to_string(&task.tags)?,
                task.status.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(InfraError::InvalidInput(format!(
                "task not found: {}",
                task.id
            )));
        }
        write_dependencies(&connection, task)
    }

    fn delete(&self, task_id: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let removed = connection.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
        // Drop both directions so other tasks stop depending on a gone task.
        connection.execute(
            "DELETE FROM task_dependencies WHERE task_id = ?1 OR depends_on = ?1",
            params![task_id],
        )?;
        Ok(removed > 0)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: Mutex<HashMap<String, Task>>,
}

impl InMemoryTaskRepository {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Task>>, InfraError> {
        self.tasks
            .lock()
            .map_err(|error| InfraError::InvalidInput(format!("task lock poisoned: {error}")))
    }
}

impl TaskRepository for InMemoryTaskRepository {
    fn list_pending(&self, user_id: &str) -> Result<Vec<Task>, InfraError> {
        let mut tasks = self
            .lock()?
            .values()
            .filter(|task| task.user_id == user_id && task.is_pending())
            .cloned()
            .collect::<Vec<_>>();
        tasks.sort_by(|left, right| left.deadline.cmp(&right.deadline).then_with(|| left.id.cmp(&right.id)));
        Ok(tasks)
    }

    fn list_all(&self, user_id: &str) -> Result<Vec<Task>, InfraError> {
        let mut tasks = self
            .lock()?
            .values()
            .filter(|task| task.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();
        tasks.sort_by(|left, right| left.deadline.cmp(&right.deadline).then_with(|| left.id.cmp(&right.id)));
        Ok(tasks)
    }

    fn find(&self, task_id: &str) -> Result<Option<Task>, InfraError> {
        Ok(self.lock()?.get(task_id).cloned())
    }

    fn create(&self, task: &Task) -> Result<(), InfraError> {
        self.lock()?.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn update(&self, task: &Task) -> Result<(), InfraError> {
        let mut tasks = self.lock()?;
        if !tasks.contains_key(&task.id) {
            return Err(InfraError::InvalidInput(format!(
                "task not found: {}",
                task.id
            )));
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn delete(&self, task_id: &str) -> Result<bool, InfraError> {
        let mut tasks = self.lock()?;
        let removed = tasks.remove(task_id).is_some();
        for task in tasks.values_mut() {
            task.dependencies.retain(|dep| dep != task_id);
        }
        Ok(removed)
    }
}
