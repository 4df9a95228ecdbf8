//! Result distillation: search documents in, learnings and follow-up
//! questions out.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::json::{parse_model_json, value_to_string};
use crate::llm::{GenerationOptions, Prompt, TextGenerator};
use crate::prompts::ResearchPrompts;
use crate::search::SearchDocument;
use crate::slicer::ContextSlicer;
use crate::state::DistillationResult;

/// Token budget applied to each document before it enters the prompt.
pub const DEFAULT_DOCUMENT_TOKEN_BUDGET: usize = 25_000;

#[derive(Debug, Deserialize)]
struct DistillResponse {
    #[serde(default)]
    learnings: Vec<Value>,
    #[serde(default, rename = "followUpQuestions", alias = "follow_up_questions")]
    follow_up_questions: Vec<Value>,
}

/// Turns one query's search documents into a bounded [`DistillationResult`].
#[derive(Clone)]
pub struct ResultDistiller {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
    slicer: ContextSlicer,
    document_token_budget: usize,
}

impl ResultDistiller {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        options: GenerationOptions,
        slicer: ContextSlicer,
    ) -> Self {
        Self {
            generator,
            options,
            slicer,
            document_token_budget: DEFAULT_DOCUMENT_TOKEN_BUDGET,
        }
    }

    pub fn with_document_token_budget(mut self, budget: usize) -> Self {
        self.document_token_budget = budget;
        self
    }

    /// Never fails: generator errors and unparsable output both yield an
    /// empty result.
    pub async fn distill(
        &self,
        query: &str,
        documents: &[SearchDocument],
        max_learnings: usize,
        max_follow_ups: usize,
    ) -> DistillationResult {
        let contents: Vec<String> = documents
            .iter()
            .filter(|doc| !doc.content.trim().is_empty())
            .map(|doc| self.slicer.slice(&doc.content, self.document_token_budget))
            .collect();

        debug!(
            query = %query,
            documents = contents.len(),
            max_learnings,
            max_follow_ups,
            "Distilling search results"
        );

        let prompt = Prompt::system_and_user(
            ResearchPrompts::system(),
            ResearchPrompts::distill(query, &contents, max_learnings, max_follow_ups),
        );

        let raw = match self.generator.generate(prompt, &self.options).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(query = %query, error = %e, "Distillation failed");
                return DistillationResult::default();
            }
        };

        parse_distillation(&raw, max_learnings, max_follow_ups).unwrap_or_else(|| {
            warn!(query = %query, raw = %raw, "Could not parse distillation");
            DistillationResult::default()
        })
    }
}

/// Non-string learnings are kept in their JSON text form.
fn parse_distillation(
    raw: &str,
    max_learnings: usize,
    max_follow_ups: usize,
) -> Option<DistillationResult> {
    let response: DistillResponse = parse_model_json(raw).ok()?;

    let to_strings = |values: Vec<Value>, max: usize| -> Vec<String> {
        values
            .into_iter()
            .filter(|v| !v.is_null())
            .map(value_to_string)
            .filter(|s| !s.trim().is_empty())
            .take(max)
            .collect()
    };

    Some(DistillationResult {
        learnings: to_strings(response.learnings, max_learnings),
        follow_up_questions: to_strings(response.follow_up_questions, max_follow_ups),
    })
}
