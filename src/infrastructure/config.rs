use crate::domain::models::{SchedulingMode, UserPreference};
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const SCHEDULING_JSON: &str = "scheduling.json";

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigBundle {
    pub app: serde_json::Value,
    pub scheduling: serde_json::Value,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "DayPlan",
                "defaultUserId": "default"
            }),
        ),
        (
            SCHEDULING_JSON,
            serde_json::json!({
                "schema": 1,
                "workingHours": {
                    "start": "09:00",
                    "end": "17:00"
                },
                "breakDurationMinutes": 15,
                "bufferTimeMinutes": 10,
                "schedulingMode": "spread",
                "workDays": [1, 2, 3, 4, 5]
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidInput(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidInput(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, InfraError> {
    Ok(ConfigBundle {
        app: read_config(&config_dir.join(APP_JSON))?,
        scheduling: read_config(&config_dir.join(SCHEDULING_JSON))?,
    })
}

pub fn read_default_user_id(config_dir: &Path) -> Result<String, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let user_id = app
        .get("defaultUserId")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("default");
    Ok(user_id.to_string())
}

/// Builds a new user's initial preference record from scheduling.json,
/// falling back field by field to the built-in defaults.
pub fn preference_template(config_dir: &Path, user_id: &str) -> Result<UserPreference, InfraError> {
    let mut preference = UserPreference::default_for(user_id);
    let scheduling = read_config(&config_dir.join(SCHEDULING_JSON))?;

    if let Some(working_hours) = scheduling.get("workingHours") {
        if let Some(start) = working_hours.get("start").and_then(serde_json::Value::as_str) {
            preference.working_hours.start = start.trim().to_string();
        }
        if let Some(end) = working_hours.get("end").and_then(serde_json::Value::as_str) {
            preference.working_hours.end = end.trim().to_string();
        }
    }
    if let Some(value) = scheduling
        .get("breakDurationMinutes")
        .and_then(serde_json::Value::as_i64)
    {
        preference.break_duration = value;
    }
    if let Some(value) = scheduling
        .get("bufferTimeMinutes")
        .and_then(serde_json::Value::as_i64)
    {
        preference.buffer_time = value;
    }
    if let Some(raw_mode) = scheduling
        .get("schedulingMode")
        .and_then(serde_json::Value::as_str)
    {
        preference.scheduling_mode = SchedulingMode::parse(raw_mode).map_err(InfraError::invalid)?;
    }
    if let Some(days) = scheduling.get("workDays").and_then(serde_json::Value::as_array) {
        let parsed_days = days
            .iter()
            .filter_map(serde_json::Value::as_u64)
            .filter(|day| *day <= 6)
            .map(|day| day as u8)
            .collect::<Vec<_>>();
        if !parsed_days.is_empty() {
            preference.work_days = parsed_days;
        }
    }

    preference
        .validate()
        .map_err(|message| InfraError::InvalidInput(format!("{SCHEDULING_JSON}: {message}")))?;
    Ok(preference)
}
