//! Query planning and clarifying questions
//!
//! Both calls degrade to an empty list when the generator fails or returns
//! something that does not parse; the caller treats that as "nothing more to
//! research here".

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::json::{parse_model_json, value_to_string};
use crate::llm::{GenerationOptions, Prompt, TextGenerator};
use crate::prompts::ResearchPrompts;
use crate::state::ResearchQuery;

#[derive(Debug, Deserialize)]
struct QueriesResponse {
    #[serde(default)]
    queries: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct QuestionsResponse {
    #[serde(default)]
    questions: Vec<Value>,
}

/// Plan up to `max_queries` SERP queries for `topic`.
///
/// Prior learnings, when present, are appended to the prompt to steer the
/// planner toward more specific queries.
pub async fn plan_queries(
    generator: &dyn TextGenerator,
    options: &GenerationOptions,
    topic: &str,
    max_queries: usize,
    prior_learnings: &[String],
) -> Vec<ResearchQuery> {
    let prompt = Prompt::system_and_user(
        ResearchPrompts::system(),
        ResearchPrompts::serp_queries(topic, max_queries, prior_learnings),
    );

    let raw = match generator.generate(prompt, options).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, provider = generator.name(), "Query planning failed");
            return Vec::new();
        }
    };

    match parse_queries(&raw, max_queries) {
        Some(queries) => {
            debug!(count = queries.len(), "Planned queries");
            queries
        }
        None => {
            warn!(raw = %raw, "Could not parse planned queries");
            Vec::new()
        }
    }
}

/// Entries may be `{query, research_goal}` objects or bare strings.
/// Entries without query text are skipped.
fn parse_queries(raw: &str, max_queries: usize) -> Option<Vec<ResearchQuery>> {
    let response: QueriesResponse = parse_model_json(raw).ok()?;

    let queries = response
        .queries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(text) => Some(ResearchQuery::new(text, "")),
            other => serde_json::from_value::<ResearchQuery>(other).ok(),
        })
        .filter(|q| !q.query_text.trim().is_empty())
        .take(max_queries)
        .collect();

    Some(queries)
}

/// Ask for clarifying questions about the user's research need.
pub async fn generate_feedback(
    generator: &dyn TextGenerator,
    options: &GenerationOptions,
    topic: &str,
    max_questions: usize,
) -> Vec<String> {
    let prompt = Prompt::system_and_user(
        ResearchPrompts::system(),
        ResearchPrompts::feedback(topic, max_questions),
    );

    let raw = match generator.generate(prompt, options).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, provider = generator.name(), "Feedback generation failed");
            return Vec::new();
        }
    };

    match parse_questions(&raw, max_questions) {
        Some(questions) => questions,
        None => {
            warn!(raw = %raw, "Could not parse feedback questions");
            Vec::new()
        }
    }
}

/// Fold the user's answers to the clarifying questions into one research
/// topic.
pub fn combine_feedback(initial: &str, answered: &[(String, String)]) -> String {
    let pairs: Vec<String> = answered
        .iter()
        .map(|(q, a)| format!("Q: {q} A: {a}"))
        .collect();
    format!(
        "Initial Query: {initial}\nFollow-up Questions and Answers:\n{}",
        pairs.join("\n")
    )
    .trim()
    .to_string()
}

/// Questions may be plain strings or `{"question": ...}` objects.
fn parse_questions(raw: &str, max_questions: usize) -> Option<Vec<String>> {
    let response: QuestionsResponse = parse_model_json(raw).ok()?;

    let questions = response
        .questions
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Object(mut map) => map.remove("question").map(value_to_string),
            Value::Null => None,
            other => Some(value_to_string(other)),
        })
        .filter(|q| !q.trim().is_empty())
        .take(max_questions)
        .collect();

    Some(questions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_queries() {
        let raw = r#"{"queries": [
            {"query": "rust async runtimes 2024", "research_goal": "compare runtimes"},
            "tokio vs async-std",
            {"query": "  "},
            {"research_goal": "no query text"}
        ]}"#;

        let queries = parse_queries(raw, 5).unwrap();

        assert_eq!(
            queries,
            vec![
                ResearchQuery::new("rust async runtimes 2024", "compare runtimes"),
                ResearchQuery::new("tokio vs async-std", ""),
            ]
        );
    }

    #[test]
    fn test_parse_queries_caps_at_max() {
        let raw = r#"{"queries": ["a", "b", "c"]}"#;
        assert_eq!(parse_queries(raw, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_queries_rejects_garbage() {
        assert!(parse_queries("I'd be happy to help!", 3).is_none());
        assert!(parse_queries("{}", 3).unwrap().is_empty());
    }

    #[test]
    fn test_combine_feedback() {
        let combined = combine_feedback(
            "EV batteries",
            &[
                ("Which chemistry?".into(), "LFP".into()),
                ("Time frame?".into(), "2020 onward".into()),
            ],
        );
        assert_eq!(
            combined,
            "Initial Query: EV batteries\nFollow-up Questions and Answers:\n\
             Q: Which chemistry? A: LFP\nQ: Time frame? A: 2020 onward"
        );
    }

    #[test]
    fn test_parse_questions_accepts_objects_and_strings() {
        let raw = r#"```json
{"questions": [{"question": "Which region?"}, "What time frame?", null]}
```"#;
        assert_eq!(
            parse_questions(raw, 5).unwrap(),
            vec!["Which region?", "What time frame?"]
        );
    }
}
