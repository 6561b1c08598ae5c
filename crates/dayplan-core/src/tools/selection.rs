//! Pass 1: deciding which tools to call.
//!
//! The model's answer is untrusted. Each tool entry is checked on its own,
//! so a bad weather entry does not discard a good search entry.

use chrono::NaiveDate;
use serde_json::Value;

use crate::plan::extract::extract_json_object;

const MAX_QUERY_CHARS: usize = 200;
const MAX_LOCATION_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherQuery {
    pub location: String,
    pub date: NaiveDate,
}

/// Tools the model asked for, restricted to those that are configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSelection {
    pub search: Option<SearchQuery>,
    pub weather: Option<WeatherQuery>,
}

/// Which tool services are configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvailableTools {
    pub search: bool,
    pub weather: bool,
}

impl AvailableTools {
    pub fn any(&self) -> bool {
        self.search || self.weather
    }
}

impl ToolSelection {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.weather.is_none()
    }

    /// Parse a pass-1 response.
    ///
    /// Returns `None` when the text holds no JSON object at all; the caller
    /// then proceeds with no tools. A weather date that is missing or not
    /// `YYYY-MM-DD` becomes `default_date`.
    pub fn parse(text: &str, available: AvailableTools, default_date: NaiveDate) -> Option<Self> {
        let value = extract_json_object(text)?;

        let search = if available.search {
            value.get("search").and_then(parse_search)
        } else {
            None
        };
        let weather = if available.weather {
            value.get("weather").and_then(|w| parse_weather(w, default_date))
        } else {
            None
        };

        Some(Self { search, weather })
    }
}

fn non_blank(value: Option<&Value>, max_chars: usize) -> Option<String> {
    let s = value?.as_str()?.trim();
    if s.is_empty() || s.chars().count() > max_chars {
        return None;
    }
    Some(s.to_string())
}

fn parse_search(value: &Value) -> Option<SearchQuery> {
    let query = non_blank(value.get("query"), MAX_QUERY_CHARS)?;
    Some(SearchQuery { query })
}

fn parse_weather(value: &Value, default_date: NaiveDate) -> Option<WeatherQuery> {
    let location = non_blank(value.get("location"), MAX_LOCATION_CHARS)?;
    let date = value
        .get("date")
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        .unwrap_or(default_date);
    Some(WeatherQuery { location, date })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: AvailableTools = AvailableTools {
        search: true,
        weather: true,
    };

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[test]
    fn parses_both_tools() {
        let text = r#"{"search": {"query": "python roadmap"}, "weather": {"location": "Vizag", "date": "2026-10-18"}}"#;
        let sel = ToolSelection::parse(text, ALL, start()).unwrap();
        assert_eq!(sel.search.unwrap().query, "python roadmap");
        let weather = sel.weather.unwrap();
        assert_eq!(weather.location, "Vizag");
        assert_eq!(weather.date, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
    }

    #[test]
    fn nulls_mean_no_tools() {
        let sel = ToolSelection::parse(r#"{"search": null, "weather": null}"#, ALL, start()).unwrap();
        assert!(sel.is_empty());
    }

    #[test]
    fn unparseable_text_is_none() {
        assert_eq!(ToolSelection::parse("I think you should search.", ALL, start()), None);
    }

    #[test]
    fn bad_weather_date_defaults_to_start() {
        let text = r#"{"weather": {"location": "Vizag", "date": "next Friday"}}"#;
        let sel = ToolSelection::parse(text, ALL, start()).unwrap();
        assert_eq!(sel.weather.unwrap().date, start());

        let text = r#"{"weather": {"location": "Vizag"}}"#;
        let sel = ToolSelection::parse(text, ALL, start()).unwrap();
        assert_eq!(sel.weather.unwrap().date, start());
    }

    #[test]
    fn invalid_entries_dropped_independently() {
        let text = r#"{"search": {"query": "  "}, "weather": {"location": "Vizag"}}"#;
        let sel = ToolSelection::parse(text, ALL, start()).unwrap();
        assert!(sel.search.is_none());
        assert!(sel.weather.is_some());

        let text = r#"{"search": "python", "weather": {"date": "2026-10-18"}}"#;
        assert!(ToolSelection::parse(text, ALL, start()).unwrap().is_empty());
    }

    #[test]
    fn unconfigured_tools_never_selected() {
        let text = r#"{"search": {"query": "python"}, "weather": {"location": "Vizag"}}"#;
        let only_search = AvailableTools {
            search: true,
            weather: false,
        };
        let sel = ToolSelection::parse(text, only_search, start()).unwrap();
        assert!(sel.search.is_some());
        assert!(sel.weather.is_none());

        let sel = ToolSelection::parse(text, AvailableTools::default(), start()).unwrap();
        assert!(sel.is_empty());
    }
}
