//! Validation of generated plans.
//!
//! Walks the untrusted JSON value field by field and builds a [`PlanBody`].
//! Every rejection names the offending path (for example
//! `daily_breakdown[1].tasks[0].priority`). Anomalies that do not make the
//! plan unusable are returned as warnings.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use dayplan_db::models::{DayEntry, PlanBody, PlanTask, Priority};

use crate::error::PlanError;

/// A plan that passed validation, plus non-fatal findings.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlan {
    pub body: PlanBody,
    pub warnings: Vec<String>,
}

type Fields<'a> = &'a Map<String, Value>;

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn required<'a>(obj: Fields<'a>, path: &str, key: &str) -> Result<&'a Value, PlanError> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(PlanError::invalid_plan(join(path, key), "is required")),
        Some(v) => Ok(v),
    }
}

fn required_string(obj: Fields<'_>, path: &str, key: &str) -> Result<String, PlanError> {
    let field = join(path, key);
    match required(obj, path, key)? {
        Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        Value::String(_) => Err(PlanError::invalid_plan(field, "must not be empty")),
        other => Err(PlanError::invalid_plan(
            field,
            format!("expected a string, found {}", type_name(other)),
        )),
    }
}

fn required_array<'a>(obj: Fields<'a>, path: &str, key: &str) -> Result<&'a Vec<Value>, PlanError> {
    match required(obj, path, key)? {
        Value::Array(items) => Ok(items),
        other => Err(PlanError::invalid_plan(
            join(path, key),
            format!("expected an array, found {}", type_name(other)),
        )),
    }
}

fn string_list(items: &[Value], field: &str) -> Result<Vec<String>, PlanError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(PlanError::invalid_plan(
                format!("{field}[{i}]"),
                format!("expected a string, found {}", type_name(other)),
            )),
        })
        .collect()
}

fn optional_string_list(obj: Fields<'_>, path: &str, key: &str) -> Result<Vec<String>, PlanError> {
    let field = join(path, key);
    match obj.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => string_list(items, &field),
        Some(other) => Err(PlanError::invalid_plan(
            field,
            format!("expected an array, found {}", type_name(other)),
        )),
    }
}

fn as_object<'a>(value: &'a Value, field: &str) -> Result<Fields<'a>, PlanError> {
    value.as_object().ok_or_else(|| {
        PlanError::invalid_plan(field, format!("expected an object, found {}", type_name(value)))
    })
}

fn parse_day_number(obj: Fields<'_>, path: &str) -> Result<u32, PlanError> {
    let field = join(path, "day");
    let value = required(obj, path, "day")?;
    value
        .as_u64()
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| PlanError::invalid_plan(field, format!("expected a positive integer, found {value}")))
}

fn parse_date(obj: Fields<'_>, path: &str) -> Result<Option<NaiveDate>, PlanError> {
    let field = join(path, "date");
    match obj.get("date") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| PlanError::invalid_plan(field, format!("expected a YYYY-MM-DD date, found {s:?}"))),
        Some(other) => Err(PlanError::invalid_plan(
            field,
            format!("expected a YYYY-MM-DD date, found {}", type_name(other)),
        )),
    }
}

fn parse_dependencies(obj: Fields<'_>, path: &str) -> Result<Vec<String>, PlanError> {
    let field = join(path, "dependencies");
    let items = match obj.get("dependencies") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(PlanError::invalid_plan(
                field,
                format!("expected an array, found {}", type_name(other)),
            ));
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) if n.is_u64() => Ok(n.to_string()),
            other => Err(PlanError::invalid_plan(
                format!("{field}[{i}]"),
                format!("expected a task description or index, found {other}"),
            )),
        })
        .collect()
}

fn parse_task(value: &Value, path: &str) -> Result<PlanTask, PlanError> {
    let obj = as_object(value, path)?;
    let task = required_string(obj, path, "task")?;
    let estimated_time = required_string(obj, path, "estimated_time")?;

    let priority_field = join(path, "priority");
    let priority = match required(obj, path, "priority")? {
        Value::String(s) => s.parse::<Priority>().map_err(|_| {
            PlanError::invalid_plan(&priority_field, format!("expected low, medium, or high, found {s:?}"))
        })?,
        other => {
            return Err(PlanError::invalid_plan(
                priority_field,
                format!("expected low, medium, or high, found {}", type_name(other)),
            ));
        }
    };

    Ok(PlanTask {
        task,
        estimated_time,
        priority,
        dependencies: parse_dependencies(obj, path)?,
    })
}

fn parse_day(value: &Value, path: &str) -> Result<DayEntry, PlanError> {
    let obj = as_object(value, path)?;
    let day = parse_day_number(obj, path)?;
    let date = parse_date(obj, path)?;
    let focus = required_string(obj, path, "focus")?;

    let tasks = required_array(obj, path, "tasks")?
        .iter()
        .enumerate()
        .map(|(j, t)| parse_task(t, &format!("{path}.tasks[{j}]")))
        .collect::<Result<Vec<_>, _>>()?;

    let research_topics = optional_string_list(obj, path, "research_topics")?;

    let weather_relevant = match obj.get("weather_relevant") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            return Err(PlanError::invalid_plan(
                join(path, "weather_relevant"),
                format!("expected a boolean, found {}", type_name(other)),
            ));
        }
    };

    Ok(DayEntry {
        day,
        date,
        focus,
        tasks,
        research_topics,
        weather_relevant,
    })
}

/// Day numbering anomalies. Order is never changed.
fn day_order_warnings(days: &[DayEntry]) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut previous: Option<u32> = None;

    for (i, entry) in days.iter().enumerate() {
        match previous {
            None if entry.day != 1 => warnings.push(format!(
                "daily_breakdown[{i}].day: plan starts at day {} instead of day 1",
                entry.day
            )),
            Some(prev) if entry.day == prev => warnings.push(format!(
                "daily_breakdown[{i}].day: day {} is repeated",
                entry.day
            )),
            Some(prev) if entry.day < prev => warnings.push(format!(
                "daily_breakdown[{i}].day: day {} follows day {prev}",
                entry.day
            )),
            Some(prev) if entry.day > prev.saturating_add(1) => warnings.push(format!(
                "daily_breakdown[{i}].day: gap between day {prev} and day {}",
                entry.day
            )),
            _ => {}
        }
        if entry.tasks.is_empty() {
            warnings.push(format!("daily_breakdown[{i}].tasks: day {} has no tasks", entry.day));
        }
        previous = Some(entry.day);
    }
    warnings
}

/// Dependencies must name a task in the plan or a 1-based task index.
fn dependency_warnings(body: &PlanBody) -> Vec<String> {
    let total = body.task_count();
    let descriptions: HashSet<String> = body.tasks().map(|t| t.task.trim().to_lowercase()).collect();

    let mut warnings = Vec::new();
    for (i, entry) in body.daily_breakdown.iter().enumerate() {
        for (j, task) in entry.tasks.iter().enumerate() {
            for (k, dep) in task.dependencies.iter().enumerate() {
                let by_index = dep.trim().parse::<usize>().is_ok_and(|n| (1..=total).contains(&n));
                if !by_index && !descriptions.contains(&dep.trim().to_lowercase()) {
                    warnings.push(format!(
                        "daily_breakdown[{i}].tasks[{j}].dependencies[{k}]: {dep:?} does not match any task"
                    ));
                }
            }
        }
    }
    warnings
}

/// Validate a parsed model response as a plan body.
pub fn validate_plan(value: &Value) -> Result<ValidatedPlan, PlanError> {
    let obj = as_object(value, "response")?;

    let goal = required_string(obj, "", "goal")?;
    let overview = required_string(obj, "", "overview")?;
    let estimated_duration = required_string(obj, "", "estimated_duration")?;

    let days = required_array(obj, "", "daily_breakdown")?;
    if days.is_empty() {
        return Err(PlanError::invalid_plan("daily_breakdown", "must contain at least one day"));
    }
    let daily_breakdown = days
        .iter()
        .enumerate()
        .map(|(i, d)| parse_day(d, &format!("daily_breakdown[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;

    let success_metrics = string_list(required_array(obj, "", "success_metrics")?, "success_metrics")?;
    let potential_challenges = string_list(
        required_array(obj, "", "potential_challenges")?,
        "potential_challenges",
    )?;

    let body = PlanBody {
        goal,
        overview,
        estimated_duration,
        daily_breakdown,
        success_metrics,
        potential_challenges,
    };
    let mut warnings = day_order_warnings(&body.daily_breakdown);
    warnings.extend(dependency_warnings(&body));

    Ok(ValidatedPlan { body, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "goal": "Learn Python",
            "overview": "Two focused days of fundamentals.",
            "estimated_duration": "2 days",
            "daily_breakdown": [
                {
                    "day": 1,
                    "date": "2026-10-17",
                    "focus": "Setup",
                    "tasks": [
                        { "task": "Install Python", "estimated_time": "30 minutes", "priority": "HIGH" }
                    ]
                },
                {
                    "day": 2,
                    "focus": "Syntax",
                    "tasks": [
                        {
                            "task": "Write loops",
                            "estimated_time": "1 hour",
                            "priority": "medium",
                            "dependencies": ["Install Python", 1]
                        }
                    ],
                    "research_topics": ["list comprehensions"],
                    "weather_relevant": false
                }
            ],
            "success_metrics": ["Write a script"],
            "potential_challenges": ["Motivation"]
        })
    }

    fn field_of(result: Result<ValidatedPlan, PlanError>) -> String {
        result.unwrap_err().field().unwrap_or_default().to_string()
    }

    #[test]
    fn accepts_valid_plan_and_fills_defaults() {
        let plan = validate_plan(&valid()).unwrap();
        assert!(plan.warnings.is_empty(), "{:?}", plan.warnings);

        let day1 = &plan.body.daily_breakdown[0];
        assert_eq!(day1.date, NaiveDate::from_ymd_opt(2026, 10, 17));
        assert!(day1.research_topics.is_empty());
        assert!(!day1.weather_relevant);
        assert_eq!(day1.tasks[0].priority, Priority::High);
        assert!(day1.tasks[0].dependencies.is_empty());

        let day2 = &plan.body.daily_breakdown[1];
        assert_eq!(day2.date, None);
        assert_eq!(day2.tasks[0].dependencies, vec!["Install Python".to_string(), "1".to_string()]);
    }

    #[test]
    fn priority_is_normalized_on_serialize() {
        let plan = validate_plan(&valid()).unwrap();
        let out = serde_json::to_value(&plan.body).unwrap();
        assert_eq!(out["daily_breakdown"][0]["tasks"][0]["priority"], "high");
    }

    #[test]
    fn rejects_bad_priority_with_path() {
        let mut v = valid();
        v["daily_breakdown"][1]["tasks"][0]["priority"] = json!("urgent");
        assert_eq!(field_of(validate_plan(&v)), "daily_breakdown[1].tasks[0].priority");
    }

    #[test]
    fn rejects_missing_required_fields() {
        let mut v = valid();
        v.as_object_mut().unwrap().remove("overview");
        assert_eq!(field_of(validate_plan(&v)), "overview");

        let mut v = valid();
        v["daily_breakdown"][0]["tasks"][0]["estimated_time"] = Value::Null;
        assert_eq!(field_of(validate_plan(&v)), "daily_breakdown[0].tasks[0].estimated_time");

        let mut v = valid();
        v["daily_breakdown"][0]["focus"] = json!("   ");
        assert_eq!(field_of(validate_plan(&v)), "daily_breakdown[0].focus");
    }

    #[test]
    fn rejects_wrong_shapes() {
        let mut v = valid();
        v["daily_breakdown"] = json!([]);
        assert_eq!(field_of(validate_plan(&v)), "daily_breakdown");

        let mut v = valid();
        v["daily_breakdown"][0]["tasks"] = json!("none");
        assert_eq!(field_of(validate_plan(&v)), "daily_breakdown[0].tasks");

        let mut v = valid();
        v["success_metrics"] = json!(["ok", 3]);
        assert_eq!(field_of(validate_plan(&v)), "success_metrics[1]");

        assert_eq!(field_of(validate_plan(&json!([1, 2]))), "response");
    }

    #[test]
    fn rejects_bad_day_and_date() {
        for bad in [json!(0), json!(-1), json!(1.5), json!("1")] {
            let mut v = valid();
            v["daily_breakdown"][0]["day"] = bad;
            assert_eq!(field_of(validate_plan(&v)), "daily_breakdown[0].day");
        }

        let mut v = valid();
        v["daily_breakdown"][0]["date"] = json!("17/10/2026");
        assert_eq!(field_of(validate_plan(&v)), "daily_breakdown[0].date");
    }

    #[test]
    fn day_anomalies_warn_and_preserve_order() {
        let mut v = valid();
        v["daily_breakdown"][0]["day"] = json!(3);
        v["daily_breakdown"][1]["day"] = json!(1);

        let plan = validate_plan(&v).unwrap();
        let days: Vec<u32> = plan.body.daily_breakdown.iter().map(|d| d.day).collect();
        assert_eq!(days, vec![3, 1]);
        assert_eq!(plan.warnings.len(), 2, "{:?}", plan.warnings);
        assert!(plan.warnings[0].contains("starts at day 3"));
        assert!(plan.warnings[1].contains("day 1 follows day 3"));
    }

    #[test]
    fn repeated_and_gapped_days_warn() {
        let mut v = valid();
        v["daily_breakdown"][1]["day"] = json!(1);
        let plan = validate_plan(&v).unwrap();
        assert!(plan.warnings.iter().any(|w| w.contains("repeated")));

        let mut v = valid();
        v["daily_breakdown"][1]["day"] = json!(4);
        let plan = validate_plan(&v).unwrap();
        assert!(plan.warnings.iter().any(|w| w.contains("gap between day 1 and day 4")));
    }

    #[test]
    fn unresolved_dependencies_warn() {
        let mut v = valid();
        v["daily_breakdown"][1]["tasks"][0]["dependencies"] = json!(["Buy a laptop", 9, "install python"]);
        let plan = validate_plan(&v).unwrap();
        assert_eq!(plan.warnings.len(), 2, "{:?}", plan.warnings);
        assert!(plan.warnings[0].starts_with("daily_breakdown[1].tasks[0].dependencies[0]"));
        assert!(plan.warnings[1].contains("\"9\""));
    }

    #[test]
    fn dependencies_resolve_across_days() {
        let mut v = valid();
        v["daily_breakdown"][0]["tasks"][0]["dependencies"] = json!(["  WRITE LOOPS ", 2]);
        let plan = validate_plan(&v).unwrap();
        assert!(plan.warnings.is_empty(), "{:?}", plan.warnings);
    }
}
