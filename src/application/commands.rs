use crate::application::bootstrap::bootstrap_workspace;
use crate::application::scheduler::{RecalculationOutcome, ScheduleService};
use crate::domain::models::{
    Priority, RoutineBlock, RoutineCategory, SchedulingMode, SlotStatus, Task, TaskStatus,
    TimeSlot, UserPreference,
};
use crate::engine::allocator::Conflict;
use crate::infrastructure::config::preference_template;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::preference_store::{PreferenceStore, SqlitePreferenceStore};
use crate::infrastructure::routine_repository::{RoutineRepository, SqliteRoutineRepository};
use crate::infrastructure::task_repository::{SqliteTaskRepository, TaskRepository};
use crate::infrastructure::time_slot_repository::{SqliteTimeSlotRepository, TimeSlotRepository};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const DEFAULT_SCHEDULE_WINDOW_DAYS: i64 = 7;
const DEFAULT_MIN_WORK_SESSION: i64 = 30;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

type SqliteScheduleService = ScheduleService<
    SqliteTaskRepository,
    SqliteRoutineRepository,
    SqliteTimeSlotRepository,
    SqlitePreferenceStore,
>;

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    task_repository: Arc<SqliteTaskRepository>,
    routine_repository: Arc<SqliteRoutineRepository>,
    slot_repository: Arc<SqliteTimeSlotRepository>,
    preference_store: Arc<SqlitePreferenceStore>,
    scheduler: SqliteScheduleService,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let task_repository = Arc::new(SqliteTaskRepository::new(&bootstrap.database_path));
        let routine_repository = Arc::new(SqliteRoutineRepository::new(&bootstrap.database_path));
        let slot_repository = Arc::new(SqliteTimeSlotRepository::new(&bootstrap.database_path));
        let preference_store = Arc::new(SqlitePreferenceStore::new(&bootstrap.database_path));
        let scheduler = ScheduleService::new(
            Arc::clone(&task_repository),
            Arc::clone(&routine_repository),
            Arc::clone(&slot_repository),
            Arc::clone(&preference_store),
        );

        Ok(Self {
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
            task_repository,
            routine_repository,
            slot_repository,
            preference_store,
            scheduler,
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskInput {
    pub title: String,
    pub description: Option<String>,
    /// RFC3339 date-time or YYYY-MM-DD.
    pub deadline: String,
    pub priority: Option<String>,
    pub min_work_session: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub dependencies: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    /// An empty string clears the description.
    pub description: Option<String>,
    pub deadline: Option<String>,
    pub priority: Option<String>,
    pub min_work_session: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub status: Option<String>,
    pub dependencies: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutineInput {
    pub title: String,
    /// "HH:MM" time of day.
    pub start_time: String,
    /// "HH:MM" time of day.
    pub end_time: String,
    pub days_of_week: Option<Vec<u8>>,
    pub is_recurring: Option<bool>,
    /// YYYY-MM-DD, required for one-off blocks.
    pub specific_date: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutinePatch {
    pub title: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub days_of_week: Option<Vec<u8>>,
    pub is_recurring: Option<bool>,
    /// An empty string clears the date.
    pub specific_date: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencePatch {
    pub work_start: Option<String>,
    pub work_end: Option<String>,
    pub break_duration: Option<i64>,
    pub buffer_time: Option<i64>,
    pub scheduling_mode: Option<String>,
    pub work_days: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecalculateResponse {
    pub scheduled: usize,
    pub conflicts: Vec<Conflict>,
}

pub fn create_task_impl(
    state: &AppState,
    user_id: String,
    input: TaskInput,
) -> Result<Task, InfraError> {
    let user_id = required_id(&user_id, "user_id")?;
    let title = input.title.trim();
    if title.is_empty() {
        return Err(InfraError::InvalidInput(
            "title must not be empty".to_string(),
        ));
    }

    let task = Task {
        id: next_id("tsk"),
        user_id: user_id.clone(),
        title: title.to_string(),
        description: normalize_optional_text(input.description),
        deadline: parse_datetime_input(&input.deadline, "deadline")?,
        priority: match input.priority.as_deref() {
            Some(raw) => Priority::parse(raw).map_err(InfraError::invalid)?,
            None => Priority::Medium,
        },
        min_work_session: input.min_work_session.unwrap_or(DEFAULT_MIN_WORK_SESSION),
        tags: input.tags.unwrap_or_default(),
        status: TaskStatus::NotStarted,
        dependencies: normalize_id_list(input.dependencies),
        created_at: Utc::now(),
    };
    task.validate().map_err(InfraError::invalid)?;
    state.task_repository.create(&task)?;

    state.log_info("create_task", &format!("created task_id={}", task.id));
    run_recalculation(state, "create_task", &user_id)?;
    Ok(task)
}

pub fn list_tasks_impl(state: &AppState, user_id: String) -> Result<Vec<Task>, InfraError> {
    let user_id = required_id(&user_id, "user_id")?;
    state.task_repository.list_all(&user_id)
}

pub fn get_task_impl(
    state: &AppState,
    user_id: String,
    task_id: String,
) -> Result<Task, InfraError> {
    let user_id = required_id(&user_id, "user_id")?;
    let task_id = required_id(&task_id, "task_id")?;
    state
        .task_repository
        .find(&task_id)?
        .filter(|task| task.user_id == user_id)
        .ok_or_else(|| InfraError::InvalidInput(format!("task not found: {task_id}")))
}

pub fn update_task_impl(
    state: &AppState,
    user_id: String,
    task_id: String,
    patch: TaskPatch,
) -> Result<Task, InfraError> {
    let user_id = required_id(&user_id, "user_id")?;
    let task_id = required_id(&task_id, "task_id")?;
    // Another user's record reads as absent.
    let mut task = state
        .task_repository
        .find(&task_id)?
        .filter(|task| task.user_id == user_id)
        .ok_or_else(|| InfraError::InvalidInput(format!("task not found: {task_id}")))?;

    if let Some(title) = patch.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(InfraError::InvalidInput(
                "title must not be empty".to_string(),
            ));
        }
        task.title = title.to_string();
    }
    if let Some(description) = patch.description {
        task.description = normalize_optional_text(Some(description));
    }
    if let Some(deadline) = patch.deadline {
        task.deadline = parse_datetime_input(&deadline, "deadline")?;
    }
    if let Some(priority) = patch.priority {
        task.priority = Priority::parse(&priority).map_err(InfraError::invalid)?;
    }
    if let Some(min_work_session) = patch.min_work_session {
        task.min_work_session = min_work_session;
    }
    if let Some(tags) = patch.tags {
        task.tags = tags;
    }
    if let Some(status) = patch.status {
        task.status = TaskStatus::parse(&status).map_err(InfraError::invalid)?;
    }
    if let Some(dependencies) = patch.dependencies {
        task.dependencies = normalize_id_list(Some(dependencies));
    }

    task.validate().map_err(InfraError::invalid)?;
    state.task_repository.update(&task)?;

    state.log_info("update_task", &format!("updated task_id={task_id}"));
    run_recalculation(state, "update_task", &task.user_id)?;
    Ok(task)
}

pub fn delete_task_impl(
    state: &AppState,
    user_id: String,
    task_id: String,
) -> Result<bool, InfraError> {
    let user_id = required_id(&user_id, "user_id")?;
    let task_id = required_id(&task_id, "task_id")?;
    let owned = state
        .task_repository
        .find(&task_id)?
        .is_some_and(|task| task.user_id == user_id);
    if !owned || !state.task_repository.delete(&task_id)? {
        return Ok(false);
    }

    state.log_info("delete_task", &format!("deleted task_id={task_id}"));
    run_recalculation(state, "delete_task", &user_id)?;
    Ok(true)
}

pub fn create_routine_impl(
    state: &AppState,
    user_id: String,
    input: RoutineInput,
) -> Result<RoutineBlock, InfraError> {
    let user_id = required_id(&user_id, "user_id")?;
    let routine = RoutineBlock {
        id: next_id("rtn"),
        user_id: user_id.clone(),
        title: input.title.trim().to_string(),
        start_time: input.start_time.trim().to_string(),
        end_time: input.end_time.trim().to_string(),
        days_of_week: input.days_of_week.unwrap_or_default(),
        is_recurring: input.is_recurring.unwrap_or(true),
        specific_date: input
            .specific_date
            .as_deref()
            .map(|raw| parse_date_input(raw, "specific_date"))
            .transpose()?,
        category: match input.category.as_deref() {
            Some(raw) => RoutineCategory::parse(raw).map_err(InfraError::invalid)?,
            None => RoutineCategory::Other,
        },
    };
    routine.validate().map_err(InfraError::invalid)?;
    state.routine_repository.create(&routine)?;

    state.log_info("create_routine", &format!("created routine_id={}", routine.id));
    run_recalculation(state, "create_routine", &user_id)?;
    Ok(routine)
}

pub fn list_routines_impl(
    state: &AppState,
    user_id: String,
) -> Result<Vec<RoutineBlock>, InfraError> {
    let user_id = required_id(&user_id, "user_id")?;
    state.routine_repository.list_all(&user_id)
}

pub fn update_routine_impl(
    state: &AppState,
    user_id: String,
    routine_id: String,
    patch: RoutinePatch,
) -> Result<RoutineBlock, InfraError> {
    let user_id = required_id(&user_id, "user_id")?;
    let routine_id = required_id(&routine_id, "routine_id")?;
    let mut routine = state
        .routine_repository
        .find(&routine_id)?
        .filter(|routine| routine.user_id == user_id)
        .ok_or_else(|| InfraError::InvalidInput(format!("routine not found: {routine_id}")))?;

    if let Some(title) = patch.title {
        routine.title = title.trim().to_string();
    }
    if let Some(start_time) = patch.start_time {
        routine.start_time = start_time.trim().to_string();
    }
    if let Some(end_time) = patch.end_time {
        routine.end_time = end_time.trim().to_string();
    }
    if let Some(days_of_week) = patch.days_of_week {
        routine.days_of_week = days_of_week;
    }
    if let Some(is_recurring) = patch.is_recurring {
        routine.is_recurring = is_recurring;
    }
    if let Some(specific_date) = patch.specific_date {
        let trimmed = specific_date.trim();
        routine.specific_date = if trimmed.is_empty() {
            None
        } else {
            Some(parse_date_input(trimmed, "specific_date")?)
        };
    }
    if let Some(category) = patch.category {
        routine.category = RoutineCategory::parse(&category).map_err(InfraError::invalid)?;
    }

    routine.validate().map_err(InfraError::invalid)?;
    state.routine_repository.update(&routine)?;

    state.log_info("update_routine", &format!("updated routine_id={routine_id}"));
    run_recalculation(state, "update_routine", &routine.user_id)?;
    Ok(routine)
}

pub fn delete_routine_impl(
    state: &AppState,
    user_id: String,
    routine_id: String,
) -> Result<bool, InfraError> {
    let user_id = required_id(&user_id, "user_id")?;
    let routine_id = required_id(&routine_id, "routine_id")?;
    let owned = state
        .routine_repository
        .find(&routine_id)?
        .is_some_and(|routine| routine.user_id == user_id);
    if !owned || !state.routine_repository.delete(&routine_id)? {
        return Ok(false);
    }

    state.log_info("delete_routine", &format!("deleted routine_id={routine_id}"));
    run_recalculation(state, "delete_routine", &user_id)?;
    Ok(true)
}

pub fn get_preferences_impl(
    state: &AppState,
    user_id: String,
) -> Result<UserPreference, InfraError> {
    let user_id = required_id(&user_id, "user_id")?;
    if let Some(preference) = state.preference_store.get(&user_id)? {
        return Ok(preference);
    }
    // First access: seed from scheduling.json.
    let preference = preference_template(state.config_dir(), &user_id)?;
    state.preference_store.upsert(&preference)?;
    state.log_info(
        "get_preferences",
        &format!("created default preferences for user_id={user_id}"),
    );
    Ok(preference)
}

pub fn update_preferences_impl(
    state: &AppState,
    user_id: String,
    patch: PreferencePatch,
) -> Result<UserPreference, InfraError> {
    let user_id = required_id(&user_id, "user_id")?;
    let mut preference = get_preferences_impl(state, user_id.clone())?;
    let previous_mode = preference.scheduling_mode;

    if let Some(work_start) = patch.work_start {
        preference.working_hours.start = work_start.trim().to_string();
    }
    if let Some(work_end) = patch.work_end {
        preference.working_hours.end = work_end.trim().to_string();
    }
    if let Some(break_duration) = patch.break_duration {
        preference.break_duration = break_duration;
    }
    if let Some(buffer_time) = patch.buffer_time {
        preference.buffer_time = buffer_time;
    }
    if let Some(scheduling_mode) = patch.scheduling_mode {
        preference.scheduling_mode =
            SchedulingMode::parse(&scheduling_mode).map_err(InfraError::invalid)?;
    }
    if let Some(work_days) = patch.work_days {
        preference.work_days = work_days;
    }

    preference.validate().map_err(InfraError::invalid)?;
    state.preference_store.upsert(&preference)?;
    state.log_info(
        "update_preferences",
        &format!("updated preferences for user_id={user_id}"),
    );

    // Only a mode switch invalidates the existing plan; window or break
    // changes take effect on the next recalculation.
    if preference.scheduling_mode != previous_mode {
        run_recalculation(state, "update_preferences", &user_id)?;
    }
    Ok(preference)
}

pub fn get_schedule_impl(
    state: &AppState,
    user_id: String,
    start: Option<String>,
    end: Option<String>,
) -> Result<Vec<TimeSlot>, InfraError> {
    let user_id = required_id(&user_id, "user_id")?;
    let default_start = {
        let today = Utc::now().date_naive();
        Utc.from_utc_datetime(&today.and_hms_opt(0, 0, 0).expect("valid midnight"))
    };
    let start = match start {
        Some(raw) => parse_datetime_input(&raw, "start")?,
        None => default_start,
    };
    let end = match end {
        Some(raw) => parse_datetime_input(&raw, "end")?,
        None => start + Duration::days(DEFAULT_SCHEDULE_WINDOW_DAYS),
    };
    if end <= start {
        return Err(InfraError::InvalidInput(
            "end must be greater than start".to_string(),
        ));
    }

    state.slot_repository.list_range(&user_id, start, end)
}

/// Marks a slot's work as done. Does not touch the rest of the plan; the
/// completed slot simply becomes committed time for future recalculations.
pub fn complete_slot_impl(
    state: &AppState,
    user_id: String,
    slot_id: String,
) -> Result<TimeSlot, InfraError> {
    let user_id = required_id(&user_id, "user_id")?;
    let slot_id = required_id(&slot_id, "slot_id")?;
    let mut slot = state
        .slot_repository
        .find(&slot_id)?
        .filter(|slot| slot.user_id == user_id)
        .ok_or_else(|| InfraError::InvalidInput(format!("slot not found: {slot_id}")))?;

    state
        .slot_repository
        .set_status(&slot_id, SlotStatus::Completed)?;
    slot.status = SlotStatus::Completed;

    state.log_info("complete_slot", &format!("completed slot_id={slot_id}"));
    Ok(slot)
}

pub fn recalculate_schedule_impl(
    state: &AppState,
    user_id: String,
) -> Result<RecalculateResponse, InfraError> {
    let user_id = required_id(&user_id, "user_id")?;
    let outcome = run_recalculation(state, "recalculate_schedule", &user_id)?;
    Ok(RecalculateResponse {
        scheduled: outcome.scheduled,
        conflicts: outcome.conflicts,
    })
}

fn run_recalculation(
    state: &AppState,
    command: &str,
    user_id: &str,
) -> Result<RecalculationOutcome, InfraError> {
    let outcome = state.scheduler.recalculate(user_id)?;
    state.log_info(
        command,
        &format!(
            "recalculated schedule for user_id={user_id}: scheduled={} conflicts={}",
            outcome.scheduled,
            outcome.conflicts.len()
        ),
    );
    Ok(outcome)
}

fn required_id(value: &str, field_name: &str) -> Result<String, InfraError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InfraError::InvalidInput(format!(
            "{field_name} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_optional_text(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn normalize_id_list(values: Option<Vec<String>>) -> Vec<String> {
    let mut normalized = Vec::new();
    for value in values.unwrap_or_default() {
        let trimmed = value.trim();
        if !trimmed.is_empty() && !normalized.iter().any(|existing| existing == trimmed) {
            normalized.push(trimmed.to_string());
        }
    }
    normalized
}

fn parse_datetime_input(value: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("valid midnight")));
    }
    Err(InfraError::InvalidInput(format!(
        "{field_name} must be RFC3339 or YYYY-MM-DD"
    )))
}

fn parse_date_input(value: &str, field_name: &str) -> Result<NaiveDate, InfraError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|error| {
        InfraError::InvalidInput(format!("{field_name} must be YYYY-MM-DD: {error}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::AtomicUsize;

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "dayplan-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        fn app_state(&self) -> AppState {
            AppState::new(self.path.clone()).expect("initialize app state")
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn task_input(deadline: &str) -> TaskInput {
        TaskInput {
            title: "Write report".to_string(),
            description: Some("quarterly numbers".to_string()),
            deadline: deadline.to_string(),
            priority: Some("high".to_string()),
            min_work_session: Some(45),
            tags: Some(vec!["writing".to_string()]),
            dependencies: None,
        }
    }

    fn wide_schedule(state: &AppState) -> Vec<TimeSlot> {
        get_schedule_impl(
            state,
            "usr-1".to_string(),
            Some("2020-01-01".to_string()),
            Some("2031-01-01".to_string()),
        )
        .expect("get schedule")
    }

    #[test]
    fn create_task_rejects_empty_title() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let mut input = task_input("2030-06-03T23:59:00Z");
        input.title = "   ".to_string();
        assert!(create_task_impl(&state, "usr-1".to_string(), input).is_err());
    }

    #[test]
    fn create_task_rejects_invalid_deadline() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = create_task_impl(&state, "usr-1".to_string(), task_input("next tuesday"));
        assert!(result.is_err());
    }

    #[test]
    fn create_task_persists_and_schedules_a_slot() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let created = create_task_impl(&state, "usr-1".to_string(), task_input("2030-06-03T23:59:00Z"))
            .expect("create task");
        assert_eq!(created.priority, Priority::High);
        assert_eq!(created.min_work_session, 45);

        let listed = list_tasks_impl(&state, "usr-1".to_string()).expect("list tasks");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);

        let slots = wide_schedule(&state);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].task_id.as_deref(), Some(created.id.as_str()));
        assert_eq!(
            (slots[0].end_time - slots[0].start_time).num_minutes(),
            45
        );
    }

    #[test]
    fn completing_a_task_clears_its_scheduled_slots() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let created = create_task_impl(&state, "usr-1".to_string(), task_input("2030-06-03T23:59:00Z"))
            .expect("create task");
        assert_eq!(wide_schedule(&state).len(), 1);

        let patch = TaskPatch {
            status: Some("completed".to_string()),
            ..TaskPatch::default()
        };
        let updated = update_task_impl(&state, "usr-1".to_string(), created.id.clone(), patch)
            .expect("update task");
        assert_eq!(updated.status, TaskStatus::Completed);
        assert!(wide_schedule(&state).is_empty());
    }

    #[test]
    fn delete_task_removes_its_slots() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let created = create_task_impl(&state, "usr-1".to_string(), task_input("2030-06-03T23:59:00Z"))
            .expect("create task");

        let deleted = delete_task_impl(&state, "usr-1".to_string(), created.id.clone())
            .expect("delete task");
        assert!(deleted);
        assert!(!delete_task_impl(&state, "usr-1".to_string(), created.id).expect("second delete"));
        assert!(wide_schedule(&state).is_empty());
    }

    #[test]
    fn routine_crud_flow() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let created = create_routine_impl(
            &state,
            "usr-1".to_string(),
            RoutineInput {
                title: "Lunch".to_string(),
                start_time: "12:00".to_string(),
                end_time: "13:00".to_string(),
                days_of_week: Some(vec![1, 2, 3, 4, 5]),
                is_recurring: None,
                specific_date: None,
                category: Some("personal".to_string()),
            },
        )
        .expect("create routine");
        assert!(created.is_recurring);
        assert_eq!(created.category, RoutineCategory::Personal);

        let patch = RoutinePatch {
            end_time: Some("13:30".to_string()),
            ..RoutinePatch::default()
        };
        let updated = update_routine_impl(&state, "usr-1".to_string(), created.id.clone(), patch)
            .expect("update routine");
        assert_eq!(updated.end_time, "13:30");

        let listed = list_routines_impl(&state, "usr-1".to_string()).expect("list routines");
        assert_eq!(listed.len(), 1);

        assert!(delete_routine_impl(&state, "usr-1".to_string(), created.id).expect("delete"));
        assert!(list_routines_impl(&state, "usr-1".to_string())
            .expect("list routines")
            .is_empty());
    }

    #[test]
    fn create_routine_rejects_reversed_times() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = create_routine_impl(
            &state,
            "usr-1".to_string(),
            RoutineInput {
                title: "Backwards".to_string(),
                start_time: "14:00".to_string(),
                end_time: "13:00".to_string(),
                days_of_week: Some(vec![1]),
                is_recurring: Some(true),
                specific_date: None,
                category: None,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn preferences_default_then_update() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let defaults = get_preferences_impl(&state, "usr-1".to_string()).expect("get preferences");
        assert_eq!(defaults, UserPreference::default_for("usr-1"));

        let patch = PreferencePatch {
            work_start: Some("08:00".to_string()),
            buffer_time: Some(20),
            ..PreferencePatch::default()
        };
        let updated = update_preferences_impl(&state, "usr-1".to_string(), patch)
            .expect("update preferences");
        assert_eq!(updated.working_hours.start, "08:00");
        assert_eq!(updated.buffer_time, 20);

        let reread = get_preferences_impl(&state, "usr-1".to_string()).expect("reread");
        assert_eq!(reread, updated);
    }

    #[test]
    fn switching_scheduling_mode_rebuilds_the_plan() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        create_task_impl(&state, "usr-1".to_string(), task_input("2030-06-03T23:59:00Z"))
            .expect("create task");

        let patch = PreferencePatch {
            scheduling_mode: Some("fast".to_string()),
            ..PreferencePatch::default()
        };
        let updated = update_preferences_impl(&state, "usr-1".to_string(), patch)
            .expect("update preferences");
        assert_eq!(updated.scheduling_mode, SchedulingMode::Fast);
        // The plan is rebuilt, not duplicated.
        assert_eq!(wide_schedule(&state).len(), 1);
    }

    #[test]
    fn complete_slot_marks_it_and_leaves_the_plan_alone() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        create_task_impl(&state, "usr-1".to_string(), task_input("2030-06-03T23:59:00Z"))
            .expect("create task");
        let slot_id = wide_schedule(&state)[0].id.clone();

        let completed = complete_slot_impl(&state, "usr-1".to_string(), slot_id.clone())
            .expect("complete slot");
        assert_eq!(completed.status, SlotStatus::Completed);

        let slots = wide_schedule(&state);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].id, slot_id);
    }

    #[test]
    fn id_lookups_are_scoped_to_the_owner() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let task = create_task_impl(&state, "usr-1".to_string(), task_input("2030-06-03T23:59:00Z"))
            .expect("create task");
        let routine = create_routine_impl(
            &state,
            "usr-1".to_string(),
            RoutineInput {
                title: "Lunch".to_string(),
                start_time: "12:00".to_string(),
                end_time: "13:00".to_string(),
                days_of_week: Some(vec![1, 2, 3, 4, 5]),
                is_recurring: None,
                specific_date: None,
                category: None,
            },
        )
        .expect("create routine");
        let slot_id = wide_schedule(&state)[0].id.clone();

        // Another user's id resolves nothing, read or write.
        assert!(get_task_impl(&state, "usr-2".to_string(), task.id.clone()).is_err());
        let hijack = TaskPatch {
            title: Some("Hijacked".to_string()),
            ..TaskPatch::default()
        };
        assert!(update_task_impl(&state, "usr-2".to_string(), task.id.clone(), hijack).is_err());
        assert!(!delete_task_impl(&state, "usr-2".to_string(), task.id.clone())
            .expect("foreign delete"));
        assert!(update_routine_impl(
            &state,
            "usr-2".to_string(),
            routine.id.clone(),
            RoutinePatch::default(),
        )
        .is_err());
        assert!(!delete_routine_impl(&state, "usr-2".to_string(), routine.id.clone())
            .expect("foreign routine delete"));
        assert!(complete_slot_impl(&state, "usr-2".to_string(), slot_id).is_err());

        // The owner still sees everything intact.
        let found = get_task_impl(&state, "usr-1".to_string(), task.id).expect("owner get");
        assert_eq!(found.title, "Write report");
        assert_eq!(list_routines_impl(&state, "usr-1".to_string()).expect("list").len(), 1);
    }

    #[test]
    fn complete_slot_rejects_unknown_id() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assert!(complete_slot_impl(&state, "usr-1".to_string(), "slt-ghost".to_string()).is_err());
    }

    #[test]
    fn recalculate_reports_conflicts_for_impossible_deadlines() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        create_task_impl(&state, "usr-1".to_string(), task_input("2020-01-01T00:00:00Z"))
            .expect("create task");

        let response = recalculate_schedule_impl(&state, "usr-1".to_string())
            .expect("recalculate schedule");
        assert_eq!(response.scheduled, 0);
        assert_eq!(response.conflicts.len(), 1);
        assert!(response.conflicts[0].message.contains("before its deadline"));
    }

    #[test]
    fn get_schedule_rejects_reversed_range() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = get_schedule_impl(
            &state,
            "usr-1".to_string(),
            Some("2030-06-05".to_string()),
            Some("2030-06-01".to_string()),
        );
        assert!(result.is_err());
    }
}
