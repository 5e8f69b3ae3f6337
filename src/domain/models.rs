use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort rank: high before medium before low.
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unsupported priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "not_started" | "not-started" => Ok(Self::NotStarted),
            "in_progress" | "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unsupported task status: {other}")),
        }
    }
}

/// A unit of work the engine places into free time before its deadline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    pub priority: Priority,
    /// Minimum work-session length in minutes.
    pub min_work_session: i64,
    pub tags: Vec<String>,
    pub status: TaskStatus,
    /// Tasks that must be scheduled before this one, in declaration order.
    pub dependencies: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.user_id, "task.user_id")?;
        validate_non_empty(&self.title, "task.title")?;
        if self.min_work_session < 1 {
            return Err("task.min_work_session must be >= 1 minute".to_string());
        }
        if self.dependencies.iter().any(|dep| dep == &self.id) {
            return Err("task.dependencies must not include the task itself".to_string());
        }
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status != TaskStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutineCategory {
    Work,
    Class,
    Personal,
    Other,
}

impl RoutineCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Class => "class",
            Self::Personal => "personal",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "work" => Ok(Self::Work),
            "class" => Ok(Self::Class),
            "personal" => Ok(Self::Personal),
            "other" => Ok(Self::Other),
            unknown => Err(format!("unsupported routine category: {unknown}")),
        }
    }
}

/// A standing commitment that is never available for task placement.
///
/// Either recurring on a weekday set (0=Sunday..6=Saturday) or a one-off on
/// `specific_date`; a one-off ignores weekday matching entirely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutineBlock {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// "HH:MM" time of day.
    pub start_time: String,
    /// "HH:MM" time of day.
    pub end_time: String,
    pub days_of_week: Vec<u8>,
    pub is_recurring: bool,
    pub specific_date: Option<NaiveDate>,
    pub category: RoutineCategory,
}

impl RoutineBlock {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "routine.id")?;
        validate_non_empty(&self.user_id, "routine.user_id")?;
        validate_non_empty(&self.title, "routine.title")?;
        validate_hhmm(&self.start_time, "routine.start_time")?;
        validate_hhmm(&self.end_time, "routine.end_time")?;
        let start = time_to_minutes(&self.start_time).ok_or("routine.start_time must be HH:MM")?;
        let end = time_to_minutes(&self.end_time).ok_or("routine.end_time must be HH:MM")?;
        if end <= start {
            return Err("routine.end_time must be after routine.start_time".to_string());
        }
        if self.days_of_week.iter().any(|day| *day > 6) {
            return Err(
                "routine.days_of_week entries must be 0 (Sunday) to 6 (Saturday)".to_string(),
            );
        }
        if !self.is_recurring && self.specific_date.is_none() {
            return Err("one-off routines require routine.specific_date".to_string());
        }
        Ok(())
    }

    /// Whether this block occupies time on the given calendar day.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        if self.is_recurring {
            self.days_of_week.contains(&weekday_number(date))
        } else {
            self.specific_date == Some(date)
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Scheduled,
    InProgress,
    Completed,
    Rescheduled,
}

impl SlotStatus {
    /// Committed slots are immutable inputs to availability computation.
    pub fn is_committed(self) -> bool {
        matches!(self, Self::Completed | Self::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Rescheduled => "rescheduled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(Self::Scheduled),
            "in_progress" | "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "rescheduled" => Ok(Self::Rescheduled),
            other => Err(format!("unsupported slot status: {other}")),
        }
    }
}

/// A concrete placement on the calendar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub id: String,
    pub user_id: String,
    /// Absent for externally fixed events; the engine only creates task-linked
    /// slots.
    pub task_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SlotStatus,
    /// Fixed slots are never cleared by recalculation.
    pub is_fixed: bool,
}

impl TimeSlot {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "slot.id")?;
        validate_non_empty(&self.user_id, "slot.user_id")?;
        if self.end_time <= self.start_time {
            return Err("slot.end_time must be after slot.start_time".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    Fast,
    Spread,
}

impl SchedulingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Spread => "spread",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "spread" => Ok(Self::Spread),
            other => Err(format!("unsupported scheduling mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkingHours {
    /// "HH:MM" time of day.
    pub start: String,
    /// "HH:MM" time of day.
    pub end: String,
}

/// Per-user scheduling preferences. Exactly one record exists per user;
/// created lazily with defaults on first access.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPreference {
    pub user_id: String,
    pub working_hours: WorkingHours,
    /// Minimum viable free-range length in minutes; shorter remainders are
    /// discarded during availability computation.
    pub break_duration: i64,
    /// Minutes reserved between sessions. Persisted but not yet consumed by
    /// the allocator.
    pub buffer_time: i64,
    pub scheduling_mode: SchedulingMode,
    /// Work weekdays, 0=Sunday..6=Saturday.
    pub work_days: Vec<u8>,
}

impl UserPreference {
    pub fn default_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            working_hours: WorkingHours {
                start: "09:00".to_string(),
                end: "17:00".to_string(),
            },
            break_duration: 15,
            buffer_time: 10,
            scheduling_mode: SchedulingMode::Spread,
            work_days: vec![1, 2, 3, 4, 5],
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.user_id, "preference.user_id")?;
        validate_hhmm(&self.working_hours.start, "preference.working_hours.start")?;
        validate_hhmm(&self.working_hours.end, "preference.working_hours.end")?;
        let start = time_to_minutes(&self.working_hours.start)
            .ok_or("preference.working_hours.start must be HH:MM")?;
        let end = time_to_minutes(&self.working_hours.end)
            .ok_or("preference.working_hours.end must be HH:MM")?;
        if end <= start {
            return Err("preference.working_hours.end must be after start".to_string());
        }
        if self.break_duration < 0 {
            return Err("preference.break_duration must be >= 0".to_string());
        }
        if self.buffer_time < 0 {
            return Err("preference.buffer_time must be >= 0".to_string());
        }
        if self.work_days.iter().any(|day| *day > 6) {
            return Err(
                "preference.work_days entries must be 0 (Sunday) to 6 (Saturday)".to_string(),
            );
        }
        Ok(())
    }

    pub fn is_work_day(&self, date: NaiveDate) -> bool {
        self.work_days.contains(&weekday_number(date))
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

pub fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    if time_to_minutes(value).is_none() {
        return Err(format!("{field_name} must be HH:MM"));
    }
    Ok(())
}

/// Converts an "HH:MM" time of day to minutes since midnight.
pub fn time_to_minutes(value: &str) -> Option<i64> {
    let parsed = NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()?;
    Some(i64::from(parsed.hour()) * 60 + i64::from(parsed.minute()))
}

/// Weekday number for a date, 0=Sunday..6=Saturday.
pub fn weekday_number(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}
