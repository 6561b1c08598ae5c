//! Plain-text rendering of a plan body.

use std::fmt::Write as _;

use dayplan_db::models::PlanBody;

pub fn format_plan(body: &PlanBody) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Goal: {}", body.goal);
    let _ = writeln!(out, "Overview: {}", body.overview);
    let _ = writeln!(out, "Estimated duration: {}", body.estimated_duration);

    for day in &body.daily_breakdown {
        out.push('\n');
        match day.date {
            Some(date) => {
                let _ = writeln!(out, "Day {} ({date}): {}", day.day, day.focus);
            }
            None => {
                let _ = writeln!(out, "Day {}: {}", day.day, day.focus);
            }
        }
        if day.weather_relevant {
            out.push_str("  (weather dependent)\n");
        }
        for task in &day.tasks {
            let _ = writeln!(out, "  - [{}] {} ({})", task.priority, task.task, task.estimated_time);
            if !task.dependencies.is_empty() {
                let _ = writeln!(out, "      after: {}", task.dependencies.join(", "));
            }
        }
        if !day.research_topics.is_empty() {
            let _ = writeln!(out, "  Research: {}", day.research_topics.join(", "));
        }
    }

    write_list(&mut out, "Success metrics", &body.success_metrics);
    write_list(&mut out, "Potential challenges", &body.potential_challenges);
    out
}

fn write_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{heading}:");
    for item in items {
        let _ = writeln!(out, "  - {item}");
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use dayplan_db::models::{DayEntry, PlanTask, Priority};

    use super::*;

    #[test]
    fn renders_days_tasks_and_lists() {
        let body = PlanBody {
            goal: "Weekend in Vizag".to_string(),
            overview: "Beaches and food.".to_string(),
            estimated_duration: "2 days".to_string(),
            daily_breakdown: vec![DayEntry {
                day: 1,
                date: NaiveDate::from_ymd_opt(2026, 10, 17),
                focus: "Beach".to_string(),
                tasks: vec![PlanTask {
                    task: "Walk RK Beach".to_string(),
                    estimated_time: "2 hours".to_string(),
                    priority: Priority::High,
                    dependencies: vec![],
                }],
                research_topics: vec!["tide times".to_string()],
                weather_relevant: true,
            }],
            success_metrics: vec!["Relaxed".to_string()],
            potential_challenges: vec![],
        };

        let text = format_plan(&body);
        assert!(text.contains("Day 1 (2026-10-17): Beach"));
        assert!(text.contains("(weather dependent)"));
        assert!(text.contains("  - [high] Walk RK Beach (2 hours)"));
        assert!(text.contains("Research: tide times"));
        assert!(text.contains("Success metrics:\n  - Relaxed"));
        assert!(!text.contains("Potential challenges"));
    }
}
