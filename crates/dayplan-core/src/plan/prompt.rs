//! Prompt construction for both model passes.

use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::tools::{AvailableTools, ToolResults};

const PLANNER_INSTRUCTIONS: &str = "\
You are an expert learning advisor and project manager. Turn the user's goal \
into a direct, actionable, day-by-day plan. Do not write a plan about making a \
plan; write the plan itself, using concrete resources and tasks.

Return the plan as a single JSON object and nothing else. No prose, no \
markdown fences.";

const PLAN_SCHEMA: &str = r#"{
  "goal": "The user's goal, restated",
  "overview": "One-sentence summary of the plan",
  "estimated_duration": "Total time, e.g. '2 weeks'",
  "daily_breakdown": [
    {
      "day": 1,
      "date": "YYYY-MM-DD",
      "focus": "Theme of the day",
      "tasks": [
        {
          "task": "A specific, actionable task",
          "estimated_time": "e.g. '45 minutes'",
          "priority": "high | medium | low",
          "dependencies": ["Description of an earlier task this one needs"]
        }
      ],
      "research_topics": ["Topics worth reading up on that day"],
      "weather_relevant": false
    }
  ],
  "success_metrics": ["Two or three measurable outcomes"],
  "potential_challenges": ["Likely obstacles"]
}"#;

/// Pass 1: ask which tools would help.
pub fn selection_prompt(goal: &str, today: NaiveDate, start_date: NaiveDate, available: AvailableTools) -> String {
    let mut prompt = String::from(
        "You decide which external lookups would improve a plan for the goal below. \
         Only request a lookup when it would change the plan.\n\nAvailable tools:\n",
    );
    if available.search {
        prompt.push_str("- search: a web search. Provide {\"query\": \"...\"}.\n");
    }
    if available.weather {
        prompt.push_str(
            "- weather: a forecast for one place and day. Provide \
             {\"location\": \"city name\", \"date\": \"YYYY-MM-DD\"}. Use it only for \
             outdoor or travel goals.\n",
        );
    }
    let _ = write!(
        prompt,
        "\nReply with a single JSON object of the form \
         {{\"search\": {{...}} or null, \"weather\": {{...}} or null}} and nothing else.\n\n\
         Today: {today}\nPlan start date: {start_date}\nGoal: {goal}\n"
    );
    prompt
}

/// Pass 2: generate the plan with whatever tool output is available.
pub fn generation_prompt(goal: &str, start_date: NaiveDate, results: &ToolResults) -> String {
    let mut prompt = format!(
        "{PLANNER_INSTRUCTIONS}\n\nThe JSON object must have exactly this structure:\n{PLAN_SCHEMA}\n\n\
         Number days from 1 and date day 1 as {start_date}.\n"
    );

    if let Some(search) = &results.search {
        let _ = write!(prompt, "\nWeb search results:\n{search}\n");
    }
    if let Some(weather) = &results.weather {
        let _ = write!(
            prompt,
            "\nWeather forecast:\n{weather}\nMark days affected by the weather with \"weather_relevant\": true.\n"
        );
    }

    let _ = write!(prompt, "\nHere is the user's goal:\nGoal: {goal}\nStart Date: {start_date}\n");
    prompt
}
