// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System and user prompts for each generation phase.

use std::fmt::Write as _;

use syllabind_core::types::{Step, Syllabind, Week, WeekPlan};

/// Sent when a turn only ran server-side searches and did not finalize.
pub const FINALIZE_NUDGE: &str =
    "You have the search results you need. Call finalize_week now with the complete week.";

fn course_header(syllabind: &Syllabind) -> String {
    format!(
        "Course: {title}\nDescription: {description}\nAudience level: {level}\nDuration: {weeks} week(s)",
        title = syllabind.title,
        description = syllabind.description,
        level = syllabind.audience_level,
        weeks = syllabind.duration_weeks,
    )
}

pub fn planning_system() -> String {
    "You are a curriculum designer building a multi-week self-study course (a syllabind). \
     Lay out the arc of the whole course before any reading is chosen: each week builds on \
     the previous one and has a clear, specific focus. \
     Respond only by calling the plan_curriculum tool."
        .to_string()
}

pub fn planning_user(syllabind: &Syllabind) -> String {
    format!(
        "{header}\n\nPlan exactly {weeks} week(s), numbered 1 to {weeks}. For each week give a short \
         title and a one-to-two sentence description of what the learner will understand by the end of it.",
        header = course_header(syllabind),
        weeks = syllabind.duration_weeks,
    )
}

pub fn week_system() -> String {
    "You are a curriculum designer filling in one week of a self-study course. \
     Use web_search to find real, reputable readings (books, articles, papers, talks) and \
     verify their links. Then call finalize_week exactly once with exactly four steps: \
     three readings followed by one exercise. Readings carry a title, author, url, media type, \
     a note on why it matters this week, and an estimated reading time in minutes. \
     The exercise carries a title, promptText with clear instructions, and an estimated time. \
     Leave a url out rather than guessing one."
        .to_string()
}

/// User prompt for filling `week_index`, given the plan and any week that
/// already exists at that index.
pub fn week_user(
    syllabind: &Syllabind,
    plan: &[WeekPlan],
    week_index: u32,
    existing: Option<&Week>,
) -> String {
    let mut prompt = course_header(syllabind);
    prompt.push_str("\n\nCourse outline:\n");
    for week in plan {
        let marker = if week.week_index == week_index { " <- this week" } else { "" };
        let title = if week.title.is_empty() { "(untitled)" } else { &week.title };
        let _ = writeln!(prompt, "Week {}: {title}{marker}", week.week_index);
    }

    let planned = plan.iter().find(|w| w.week_index == week_index);
    match (existing, planned) {
        (Some(week), _) => {
            let _ = write!(
                prompt,
                "\nRegenerate week {week_index}, \"{}\": {}\nKeep its theme. Choose fresh readings and a new exercise.",
                week.title, week.description
            );
            if !week.steps.is_empty() {
                prompt.push_str("\nCurrent steps, to be replaced:\n");
                list_steps(&mut prompt, &week.steps);
            }
        }
        (None, Some(plan)) if !plan.title.is_empty() => {
            let _ = write!(
                prompt,
                "\nBuild week {week_index}, \"{}\": {}",
                plan.title, plan.description
            );
        }
        _ => {
            let _ = write!(
                prompt,
                "\nBuild week {week_index}. Choose a title and description that fit the outline and include them in finalize_week."
            );
        }
    }
    prompt
}

fn list_steps(prompt: &mut String, steps: &[Step]) {
    for step in steps {
        let _ = writeln!(
            prompt,
            "- [{}] {}",
            step.draft.step_type, step.draft.title
        );
    }
}

pub fn repair_system() -> String {
    "You are checking the reading list of a self-study course. Some readings were saved \
     without a link. Use web_search to find a direct, working url for each one, then call \
     provide_urls once with every url you found. Skip readings you cannot find with confidence."
        .to_string()
}

/// User prompt listing the readings that need a url.
pub fn repair_user(syllabind: &Syllabind, candidates: &[(u32, &Step)]) -> String {
    let mut prompt = course_header(syllabind);
    prompt.push_str("\n\nReadings missing a url:\n");
    for (week_index, step) in candidates {
        let author = step.draft.author.as_deref().unwrap_or("unknown author");
        let _ = writeln!(
            prompt,
            "- stepId {}: \"{}\" by {author} (week {week_index})",
            step.id, step.draft.title
        );
    }
    prompt
}
