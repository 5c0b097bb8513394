use crate::error::{AppError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::{Map, Value};
use tracing::warn;

/// Canonical form of a loosely shaped task object
///
/// Every known alias is folded onto one typed field; anything missing stays
/// `None` so downstream code can apply its own defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskRecord {
    pub id: Option<i64>,
    pub name: String,
    pub description: String,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub team_size: Option<String>,
    pub task_type: Option<String>,
    pub estimated_hours: Option<f64>,
    pub word_count: Option<u32>,
    pub dependency_count: Option<u32>,
    pub start_date: Option<DateTime<FixedOffset>>,
    pub end_date: Option<DateTime<FixedOffset>>,
    pub actual_end_date: Option<DateTime<FixedOffset>>,
}

const NAME: &[&str] = &["name", "title"];
const DESCRIPTION: &[&str] = &["description"];
const STATUS: &[&str] = &["status"];
const PRIORITY: &[&str] = &["priority"];
const TEAM_SIZE: &[&str] = &["teamSize", "team_size"];
const TASK_TYPE: &[&str] = &["taskType", "task_type"];
const ESTIMATED_HOURS: &[&str] = &["estimatedHours", "estimated_hours"];
const WORD_COUNT: &[&str] = &["wordCount", "word_count"];
const DEPENDENCY_COUNT: &[&str] = &["dependencyCount", "dependency_count"];
const DEPENDENCIES: &[&str] = &["dependencies"];
const START_DATE: &[&str] = &["startDate", "start_date"];
const END_DATE: &[&str] = &["endDate", "end_date"];
const ACTUAL_END_DATE: &[&str] = &["actual_end_date", "actualEndDate"];

impl TaskRecord {
    /// Normalize a JSON task object.
    ///
    /// Fails when the value is not an object or when a numeric field holds
    /// something that cannot be read as a number. Unparseable dates are
    /// dropped with a warning.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| AppError::Validation("task must be a JSON object".to_string()))?;

        let explicit_deps = number(obj, DEPENDENCY_COUNT)?;
        let dependency_count = match explicit_deps {
            Some(n) => Some(n),
            None => match field(obj, DEPENDENCIES) {
                Some(Value::Array(items)) => Some(items.len() as f64),
                Some(_) => number(obj, DEPENDENCIES)?,
                None => None,
            },
        };

        Ok(Self {
            id: field(obj, &["id"]).and_then(Value::as_i64),
            name: text(obj, NAME),
            description: text(obj, DESCRIPTION),
            status: optional_text(obj, STATUS),
            priority: optional_text(obj, PRIORITY),
            team_size: optional_text(obj, TEAM_SIZE),
            task_type: optional_text(obj, TASK_TYPE),
            estimated_hours: number(obj, ESTIMATED_HOURS)?.map(non_negative),
            word_count: number(obj, WORD_COUNT)?.map(to_count),
            dependency_count: dependency_count.map(to_count),
            start_date: date(obj, START_DATE),
            end_date: date(obj, END_DATE),
            actual_end_date: date(obj, ACTUAL_END_DATE),
        })
    }

    /// Identity, status and dates only; every other field is ignored.
    ///
    /// Unlike [`TaskRecord::from_value`] this never fails on an object, so a
    /// task with one unreadable numeric field keeps its timeline. `None` when
    /// the value is not an object.
    pub fn schedule(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            id: field(obj, &["id"]).and_then(Value::as_i64),
            status: optional_text(obj, STATUS),
            start_date: date(obj, START_DATE),
            end_date: date(obj, END_DATE),
            actual_end_date: date(obj, ACTUAL_END_DATE),
            ..Self::default()
        })
    }

    /// Name and description joined by a space
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.name, self.description)
    }

    /// Observed duration in days, `(end - start).days + 1`; 0 when unknown
    pub fn actual_days(&self) -> f64 {
        let end = self.actual_end_date.or(self.end_date);
        match (self.start_date, end) {
            (Some(start), Some(end)) => ((end - start).num_days() + 1) as f64,
            _ => 0.0,
        }
    }

    /// Planned window in days, when both dates are known
    pub fn planned_days(&self) -> Option<i64> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some((end - start).num_days() + 1),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("completed"))
            .unwrap_or(false)
    }
}

/// First present, non-null value among the aliases
fn field<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| obj.get(*key))
        .find(|v| !v.is_null())
}

fn optional_text(obj: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    match field(obj, aliases)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

fn text(obj: &Map<String, Value>, aliases: &[&str]) -> String {
    optional_text(obj, aliases).unwrap_or_default()
}

fn number(obj: &Map<String, Value>, aliases: &[&str]) -> Result<Option<f64>> {
    let Some(value) = field(obj, aliases) else {
        return Ok(None);
    };

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(AppError::Transform(format!(
            "field {} is not numeric: {}",
            aliases[0], value
        ))),
    }
}

fn date(obj: &Map<String, Value>, aliases: &[&str]) -> Option<DateTime<FixedOffset>> {
    let raw = field(obj, aliases)?.as_str()?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        warn!(field = aliases[0], value = raw, "Ignoring unparseable date");
    }
    parsed
}

fn non_negative(n: f64) -> f64 {
    n.max(0.0)
}

fn to_count(n: f64) -> u32 {
    n.max(0.0).round().min(u32::MAX as f64) as u32
}

/// Parse an RFC 3339 timestamp, a naive date-time or a plain date (UTC assumed)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }

    let utc = FixedOffset::east_opt(0)?;
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return utc.from_local_datetime(&naive).single();
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| utc.from_local_datetime(&naive).single())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aliases_are_folded() {
        let record = TaskRecord::from_value(&json!({
            "id": 12,
            "title": "Build login",
            "teamSize": "Large",
            "task_type": "Development",
            "estimatedHours": "16",
            "dependencies": [1, 2, 3],
            "startDate": "2024-03-04T09:00:00Z",
            "end_date": "2024-03-08"
        }))
        .unwrap();

        assert_eq!(record.id, Some(12));
        assert_eq!(record.name, "Build login");
        assert_eq!(record.team_size.as_deref(), Some("Large"));
        assert_eq!(record.task_type.as_deref(), Some("Development"));
        assert_eq!(record.estimated_hours, Some(16.0));
        assert_eq!(record.dependency_count, Some(3));
        assert!(record.start_date.is_some());
        assert!(record.end_date.is_some());
    }

    #[test]
    fn test_explicit_dependency_count_wins() {
        let record = TaskRecord::from_value(&json!({
            "dependency_count": 7,
            "dependencies": [1]
        }))
        .unwrap();
        assert_eq!(record.dependency_count, Some(7));

        let record = TaskRecord::from_value(&json!({ "dependencies": 4 })).unwrap();
        assert_eq!(record.dependency_count, Some(4));
    }

    #[test]
    fn test_numerics_clamp_to_zero() {
        let record = TaskRecord::from_value(&json!({
            "estimated_hours": -5,
            "word_count": -2
        }))
        .unwrap();

        assert_eq!(record.estimated_hours, Some(0.0));
        assert_eq!(record.word_count, Some(0));
    }

    #[test]
    fn test_non_numeric_field_is_an_error() {
        let result = TaskRecord::from_value(&json!({ "estimatedHours": "a lot" }));
        assert!(matches!(result, Err(AppError::Transform(_))));

        let result = TaskRecord::from_value(&json!({ "word_count": [1] }));
        assert!(result.is_err());
    }

    #[test]
    fn test_non_object_is_an_error() {
        assert!(matches!(
            TaskRecord::from_value(&json!("task")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_actual_days() {
        let record = TaskRecord::from_value(&json!({
            "startDate": "2024-03-04T00:00:00Z",
            "endDate": "2024-03-10T00:00:00Z",
            "actual_end_date": "2024-03-06T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(record.actual_days(), 3.0);
        assert_eq!(record.planned_days(), Some(7));
        assert_eq!(TaskRecord::default().actual_days(), 0.0);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-03-04T09:00:00+07:00").is_some());
        assert!(parse_timestamp("2024-03-04T09:00:00").is_some());
        assert!(parse_timestamp("2024-03-04T09:00:00.123").is_some());
        assert!(parse_timestamp("2024-03-04").is_some());
        assert!(parse_timestamp("next tuesday").is_none());
    }

    #[test]
    fn test_bad_dates_are_dropped() {
        let record = TaskRecord::from_value(&json!({ "startDate": "soon" })).unwrap();
        assert!(record.start_date.is_none());
    }

    #[test]
    fn test_completed_status() {
        let record = TaskRecord::from_value(&json!({ "status": "Completed" })).unwrap();
        assert!(record.is_completed());

        let record = TaskRecord::from_value(&json!({ "status": "In Progress" })).unwrap();
        assert!(!record.is_completed());
    }

    #[test]
    fn test_schedule_ignores_unreadable_numbers() {
        let task = json!({
            "id": 4,
            "status": "Completed",
            "word_count": "n/a",
            "startDate": "2024-03-04",
            "endDate": "2024-03-06"
        });

        assert!(TaskRecord::from_value(&task).is_err());

        let schedule = TaskRecord::schedule(&task).unwrap();
        assert_eq!(schedule.id, Some(4));
        assert!(schedule.is_completed());
        assert_eq!(schedule.actual_days(), 3.0);
        assert!(TaskRecord::schedule(&json!("task")).is_none());
    }
}
