// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for tool-call inputs and step drafts.

use serde_json::{Value, json};
use syllabind_core::types::{StepDraft, StepType};

/// A `plan_curriculum` input from `(week_index, title, description)` rows.
pub fn plan_input(weeks: &[(u32, &str, &str)]) -> Value {
    let weeks: Vec<Value> = weeks
        .iter()
        .map(|(index, title, description)| {
            json!({ "weekIndex": index, "title": title, "description": description })
        })
        .collect();
    json!({ "weeks": weeks })
}

/// A reading step as the model would send it.
pub fn reading(title: &str, url: Option<&str>) -> Value {
    let mut step = json!({
        "type": "reading",
        "title": title,
        "author": "Test Author",
        "mediaType": "Article",
        "estimatedMinutes": 15
    });
    if let Some(url) = url {
        step["url"] = json!(url);
    }
    step
}

/// An exercise step as the model would send it.
pub fn exercise(title: &str, prompt: &str) -> Value {
    json!({
        "type": "exercise",
        "title": title,
        "promptText": prompt,
        "estimatedMinutes": 30
    })
}

/// Three readings with urls followed by one exercise.
pub fn week_steps(week_index: u32) -> Vec<Value> {
    vec![
        reading(
            &format!("Week {week_index} primary text"),
            Some(&format!("https://example.org/w{week_index}/primary")),
        ),
        reading(
            &format!("Week {week_index} commentary"),
            Some(&format!("https://example.org/w{week_index}/commentary")),
        ),
        reading(
            &format!("Week {week_index} modern essay"),
            Some(&format!("https://example.org/w{week_index}/essay")),
        ),
        exercise(
            &format!("Week {week_index} reflection"),
            "Write a one-page reflection.",
        ),
    ]
}

/// A `finalize_week` input.
pub fn finalize_input(title: &str, description: &str, steps: Vec<Value>) -> Value {
    json!({ "title": title, "description": description, "steps": steps })
}

/// A `finalize_week` input with no title or description.
pub fn finalize_steps_only(steps: Vec<Value>) -> Value {
    json!({ "steps": steps })
}

/// A `provide_urls` input from `(step_id, url)` pairs.
pub fn provide_urls_input(pairs: &[(i64, &str)]) -> Value {
    let urls: Vec<Value> = pairs
        .iter()
        .map(|(step_id, url)| json!({ "stepId": step_id, "url": url }))
        .collect();
    json!({ "urls": urls })
}

/// A reading draft for seeding storage directly.
pub fn reading_draft(title: &str, url: Option<&str>) -> StepDraft {
    StepDraft {
        step_type: StepType::Reading,
        title: title.to_string(),
        url: url.map(str::to_string),
        note: None,
        author: None,
        creation_date: None,
        media_type: None,
        prompt_text: None,
        estimated_minutes: None,
    }
}

/// An exercise draft for seeding storage directly.
pub fn exercise_draft(title: &str) -> StepDraft {
    StepDraft {
        step_type: StepType::Exercise,
        prompt_text: Some("Reflect.".into()),
        ..reading_draft(title, None)
    }
}
