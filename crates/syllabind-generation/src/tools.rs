// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool definitions per phase and typed parsing of tool-call inputs.
//!
//! Each phase exposes a fixed [`ToolSet`]. Whatever the model sends back is
//! parsed once, at the boundary, into a [`ToolInvocation`]; the phases never
//! look at raw JSON.

use serde::Deserialize;
use serde_json::{Value, json};
use syllabind_core::SyllabindError;
use syllabind_core::types::{StepDraft, StepType};

use crate::GenerationSettings;

pub const PLAN_CURRICULUM: &str = "plan_curriculum";
pub const FINALIZE_WEEK: &str = "finalize_week";
pub const WEB_SEARCH: &str = "web_search";
pub const PROVIDE_URLS: &str = "provide_urls";

/// Provider tool type of the server-executed web search.
const WEB_SEARCH_TOOL_TYPE: &str = "web_search_20250305";

/// Number of steps in a finalized week.
pub const STEPS_PER_WEEK: usize = 4;

/// Required step types of a finalized week, in order.
pub const WEEK_SHAPE: [StepType; STEPS_PER_WEEK] = [
    StepType::Reading,
    StepType::Reading,
    StepType::Reading,
    StepType::Exercise,
];

/// The tools offered to the model in each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSet {
    Planning,
    Generation,
    Repair,
}

impl ToolSet {
    /// Tool definitions in provider wire format.
    pub fn definitions(&self, settings: &GenerationSettings) -> Vec<Value> {
        match self {
            ToolSet::Planning => vec![plan_curriculum_definition()],
            ToolSet::Generation => vec![
                web_search_definition(settings.web_search_max_uses),
                finalize_week_definition(),
            ],
            ToolSet::Repair => vec![
                web_search_definition(settings.repair_search_max_uses),
                provide_urls_definition(),
            ],
        }
    }

    /// Forced tool choice, if the phase requires one.
    pub fn tool_choice(&self) -> Option<Value> {
        match self {
            ToolSet::Planning => Some(json!({ "type": "tool", "name": PLAN_CURRICULUM })),
            ToolSet::Generation | ToolSet::Repair => None,
        }
    }
}

fn web_search_definition(max_uses: u32) -> Value {
    json!({
        "type": WEB_SEARCH_TOOL_TYPE,
        "name": WEB_SEARCH,
        "max_uses": max_uses
    })
}

fn plan_curriculum_definition() -> Value {
    json!({
        "name": PLAN_CURRICULUM,
        "description": "Lay out the whole course: one title and a one-to-two sentence description for every week, in order.",
        "input_schema": {
            "type": "object",
            "properties": {
                "weeks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "weekIndex": { "type": "integer", "minimum": 1 },
                            "title": { "type": "string" },
                            "description": { "type": "string" }
                        },
                        "required": ["weekIndex", "title", "description"]
                    }
                }
            },
            "required": ["weeks"]
        }
    })
}

fn step_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "type": { "type": "string", "enum": ["reading", "exercise"] },
            "title": { "type": "string" },
            "url": { "type": "string", "description": "Direct link to the reading. Omit if no reliable link was found." },
            "note": { "type": "string", "description": "Why this reading matters this week." },
            "author": { "type": "string" },
            "creationDate": { "type": "string" },
            "mediaType": { "type": "string", "enum": ["Book", "Article", "Podcast", "Video", "Paper", "Website"] },
            "promptText": { "type": "string", "description": "Exercise instructions. Exercises only." },
            "estimatedMinutes": { "type": "integer", "minimum": 1 }
        },
        "required": ["type", "title"]
    })
}

fn finalize_week_definition() -> Value {
    json!({
        "name": FINALIZE_WEEK,
        "description": "Save the finished week. Call exactly once, with three readings followed by one exercise.",
        "input_schema": {
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "description": { "type": "string" },
                "steps": {
                    "type": "array",
                    "items": step_schema(),
                    "minItems": STEPS_PER_WEEK,
                    "maxItems": STEPS_PER_WEEK
                }
            },
            "required": ["steps"]
        }
    })
}

fn provide_urls_definition() -> Value {
    json!({
        "name": PROVIDE_URLS,
        "description": "Report a working url for each listed reading you could find.",
        "input_schema": {
            "type": "object",
            "properties": {
                "urls": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "stepId": { "type": "integer" },
                            "url": { "type": "string" }
                        },
                        "required": ["stepId", "url"]
                    }
                }
            },
            "required": ["urls"]
        }
    })
}

// --- Inputs ---

/// One week as proposed by `plan_curriculum`. Indices are untrusted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedWeek {
    pub week_index: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanCurriculumInput {
    #[serde(default)]
    pub weeks: Vec<PlannedWeek>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FinalizeWeekInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepDraft>,
}

impl FinalizeWeekInput {
    /// Checks the fixed week shape and that every step has a title.
    pub fn validate(&self) -> Result<(), SyllabindError> {
        let invalid = |message: String| SyllabindError::ToolInput {
            tool: FINALIZE_WEEK.into(),
            message,
        };

        if self.steps.len() != STEPS_PER_WEEK {
            return Err(invalid(format!(
                "expected exactly {STEPS_PER_WEEK} steps (3 readings then 1 exercise), got {}",
                self.steps.len()
            )));
        }

        let types: Vec<StepType> = self.steps.iter().map(|s| s.step_type).collect();
        if types != WEEK_SHAPE {
            let got: Vec<String> = types.iter().map(ToString::to_string).collect();
            return Err(invalid(format!(
                "steps must be [reading, reading, reading, exercise], got [{}]",
                got.join(", ")
            )));
        }

        if let Some(position) = self.steps.iter().position(|s| s.title.trim().is_empty()) {
            return Err(invalid(format!("step {} has an empty title", position + 1)));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebSearchInput {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlAssignment {
    pub step_id: i64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProvideUrlsInput {
    #[serde(default)]
    pub urls: Vec<UrlAssignment>,
}

/// A parsed tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    PlanCurriculum(PlanCurriculumInput),
    FinalizeWeek(FinalizeWeekInput),
    WebSearch(WebSearchInput),
    ProvideUrls(ProvideUrlsInput),
    Unknown { name: String },
}

impl ToolInvocation {
    /// Parses a tool call by name. Unknown names are not an error; malformed
    /// input for a known tool is.
    pub fn parse(name: &str, input: &Value) -> Result<Self, SyllabindError> {
        fn decode<T: serde::de::DeserializeOwned>(
            name: &str,
            input: &Value,
        ) -> Result<T, SyllabindError> {
            T::deserialize(input).map_err(|e| SyllabindError::ToolInput {
                tool: name.to_string(),
                message: e.to_string(),
            })
        }

        Ok(match name {
            PLAN_CURRICULUM => ToolInvocation::PlanCurriculum(decode(name, input)?),
            FINALIZE_WEEK => ToolInvocation::FinalizeWeek(decode(name, input)?),
            WEB_SEARCH => ToolInvocation::WebSearch(decode(name, input)?),
            PROVIDE_URLS => ToolInvocation::ProvideUrls(decode(name, input)?),
            other => ToolInvocation::Unknown {
                name: other.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(kind: &str, title: &str) -> Value {
        json!({ "type": kind, "title": title })
    }

    fn finalize(steps: Vec<Value>) -> FinalizeWeekInput {
        match ToolInvocation::parse(FINALIZE_WEEK, &json!({ "steps": steps })).unwrap() {
            ToolInvocation::FinalizeWeek(input) => input,
            other => panic!("expected FinalizeWeek, got {other:?}"),
        }
    }

    #[test]
    fn planning_forces_its_only_tool() {
        let settings = GenerationSettings::default();
        let defs = ToolSet::Planning.definitions(&settings);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0]["name"], PLAN_CURRICULUM);
        assert_eq!(
            ToolSet::Planning.tool_choice().unwrap()["name"],
            PLAN_CURRICULUM
        );
        assert!(ToolSet::Generation.tool_choice().is_none());
    }

    #[test]
    fn web_search_is_a_server_tool_with_phase_limits() {
        let settings = GenerationSettings::default();
        let generation = ToolSet::Generation.definitions(&settings);
        let repair = ToolSet::Repair.definitions(&settings);

        assert_eq!(generation[0]["type"], WEB_SEARCH_TOOL_TYPE);
        assert_eq!(generation[0]["max_uses"], 5);
        assert_eq!(generation[1]["name"], FINALIZE_WEEK);
        assert_eq!(repair[0]["max_uses"], 10);
        assert_eq!(repair[1]["name"], PROVIDE_URLS);
    }

    #[test]
    fn valid_week_passes() {
        let input = finalize(vec![
            step("reading", "Meditations, Book II"),
            step("Reading", "Letters from a Stoic"),
            step("reading", "The Inner Citadel"),
            step("exercise", "Evening review"),
        ]);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn wrong_count_is_rejected() {
        let input = finalize(vec![
            step("reading", "a"),
            step("reading", "b"),
            step("exercise", "c"),
        ]);
        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("got 3"), "got: {err}");
    }

    #[test]
    fn wrong_order_is_rejected() {
        let input = finalize(vec![
            step("exercise", "a"),
            step("reading", "b"),
            step("reading", "c"),
            step("reading", "d"),
        ]);
        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("[exercise, reading, reading, reading]"));
    }

    #[test]
    fn blank_title_is_rejected() {
        let input = finalize(vec![
            step("reading", "a"),
            step("reading", "  "),
            step("reading", "c"),
            step("exercise", "d"),
        ]);
        assert!(input.validate().unwrap_err().to_string().contains("step 2"));
    }

    #[test]
    fn unknown_step_type_is_a_parse_error() {
        let err = ToolInvocation::parse(
            FINALIZE_WEEK,
            &json!({ "steps": [{ "type": "quiz", "title": "x" }] }),
        )
        .unwrap_err();
        assert!(matches!(err, SyllabindError::ToolInput { ref tool, .. } if tool == FINALIZE_WEEK));
    }

    #[test]
    fn parses_other_tools() {
        assert_eq!(
            ToolInvocation::parse(WEB_SEARCH, &json!({ "query": "stoicism" })).unwrap(),
            ToolInvocation::WebSearch(WebSearchInput {
                query: "stoicism".into()
            })
        );
        assert_eq!(
            ToolInvocation::parse(PROVIDE_URLS, &json!({ "urls": [{ "stepId": 7, "url": "https://a.org" }] }))
                .unwrap(),
            ToolInvocation::ProvideUrls(ProvideUrlsInput {
                urls: vec![UrlAssignment {
                    step_id: 7,
                    url: "https://a.org".into()
                }]
            })
        );
        assert_eq!(
            ToolInvocation::parse("summon_oracle", &json!({})).unwrap(),
            ToolInvocation::Unknown {
                name: "summon_oracle".into()
            }
        );
    }

    #[test]
    fn empty_object_parses_to_empty_inputs() {
        match ToolInvocation::parse(PLAN_CURRICULUM, &json!({})).unwrap() {
            ToolInvocation::PlanCurriculum(input) => assert!(input.weeks.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
