//! Input validation for goals, start dates, and listing parameters.
//!
//! Everything here runs before any external call is made.

use std::sync::LazyLock;

use chrono::{Months, NaiveDate};
use regex::Regex;

use crate::error::PlanError;

pub const MIN_GOAL_LENGTH: usize = 3;
pub const MAX_GOAL_LENGTH: usize = 1000;
pub const MAX_SEARCH_LENGTH: usize = 100;
pub const MAX_LIST_LIMIT: i64 = 1000;
pub const MAX_PLAN_ID: i64 = i32::MAX as i64;

/// Share of characters (0..1) above which text is treated as an injection attempt.
const SPECIAL_CHAR_RATIO: f64 = 0.3;

/// Punctuation that does not count toward the special-character ratio.
const ALLOWED_PUNCTUATION: &str = ".,!?-()[]{}";

static SUSPICIOUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)<script[^>]*>.*?</script>",
        r"(?i)javascript:",
        r"(?i)data:text/html",
        r"(?i)vbscript:",
        r"(?i)\bon\w+\s*=",
        r"(?i)<iframe[^>]*>",
        r"(?i)<object[^>]*>",
        r"(?i)<embed[^>]*>",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("suspicious-content pattern must compile"))
    .collect()
});

/// True when `text` matches a disallowed pattern or is mostly symbols.
pub fn contains_suspicious_content(text: &str) -> bool {
    if SUSPICIOUS_PATTERNS.iter().any(|re| re.is_match(text)) {
        return true;
    }

    let total = text.chars().count();
    if total == 0 {
        return false;
    }
    let special = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace() && !ALLOWED_PUNCTUATION.contains(*c))
        .count();
    special as f64 > total as f64 * SPECIAL_CHAR_RATIO
}

/// Validate and trim a goal.
pub fn validate_goal(goal: &str) -> Result<String, PlanError> {
    let goal = goal.trim();

    if goal.is_empty() {
        return Err(PlanError::invalid_input("goal", "goal cannot be empty"));
    }

    let len = goal.chars().count();
    if len < MIN_GOAL_LENGTH {
        return Err(PlanError::invalid_input(
            "goal",
            format!("goal must be at least {MIN_GOAL_LENGTH} characters long"),
        ));
    }
    if len > MAX_GOAL_LENGTH {
        return Err(PlanError::invalid_input(
            "goal",
            format!("goal must be no more than {MAX_GOAL_LENGTH} characters long"),
        ));
    }

    if contains_suspicious_content(goal) {
        return Err(PlanError::invalid_input(
            "goal",
            "goal contains potentially inappropriate content",
        ));
    }

    Ok(goal.to_string())
}

/// Resolve the effective start date.
///
/// `None` or a blank string means tomorrow. A supplied date must be
/// `YYYY-MM-DD`, not before `today`, and at most one year after it.
pub fn resolve_start_date(start_date: Option<&str>, today: NaiveDate) -> Result<NaiveDate, PlanError> {
    let raw = match start_date.map(str::trim) {
        None | Some("") => return Ok(today.succ_opt().unwrap_or(today)),
        Some(raw) => raw,
    };

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        PlanError::invalid_input("start_date", format!("invalid date {raw:?}; use YYYY-MM-DD"))
    })?;

    if date < today {
        return Err(PlanError::invalid_input(
            "start_date",
            "start date cannot be in the past",
        ));
    }

    let max = today.checked_add_months(Months::new(12)).unwrap_or(NaiveDate::MAX);
    if date > max {
        return Err(PlanError::invalid_input(
            "start_date",
            "start date cannot be more than 1 year in the future",
        ));
    }

    Ok(date)
}

pub fn validate_plan_id(id: i64) -> Result<i64, PlanError> {
    if id < 1 {
        return Err(PlanError::invalid_input("plan_id", "plan ID must be a positive integer"));
    }
    if id > MAX_PLAN_ID {
        return Err(PlanError::invalid_input("plan_id", "plan ID is too large"));
    }
    Ok(id)
}

pub fn validate_limit(limit: Option<i64>) -> Result<Option<i64>, PlanError> {
    match limit {
        None => Ok(None),
        Some(n) if n < 1 => Err(PlanError::invalid_input("limit", "limit must be at least 1")),
        Some(n) if n > MAX_LIST_LIMIT => Err(PlanError::invalid_input(
            "limit",
            format!("limit cannot exceed {MAX_LIST_LIMIT}"),
        )),
        Some(n) => Ok(Some(n)),
    }
}

/// Validate a search term. Blank terms mean "no filter".
pub fn validate_search_term(search: Option<&str>) -> Result<Option<String>, PlanError> {
    let term = match search.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(term) => term,
    };

    if term.chars().count() > MAX_SEARCH_LENGTH {
        return Err(PlanError::invalid_input(
            "search",
            format!("search term must be no more than {MAX_SEARCH_LENGTH} characters long"),
        ));
    }
    if contains_suspicious_content(term) {
        return Err(PlanError::invalid_input(
            "search",
            "search term contains potentially inappropriate content",
        ));
    }

    Ok(Some(term.to_string()))
}
