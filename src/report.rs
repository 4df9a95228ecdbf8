//! Final report composition.

use serde::Deserialize;
use tracing::{info, warn};

use crate::json::parse_model_json;
use crate::llm::{GenerationOptions, Prompt, TextGenerator};
use crate::prompts::ResearchPrompts;
use crate::slicer::ContextSlicer;

/// Token budget for the combined learnings block in the report prompt.
pub const DEFAULT_REPORT_TOKEN_BUDGET: usize = 150_000;

#[derive(Debug, Deserialize)]
struct ReportResponse {
    #[serde(rename = "reportMarkdown", alias = "report_markdown")]
    report_markdown: String,
}

/// Writes the markdown report for a finished research run.
pub struct ReportComposer<'a> {
    generator: &'a dyn TextGenerator,
    options: &'a GenerationOptions,
    slicer: &'a ContextSlicer,
    token_budget: usize,
}

impl<'a> ReportComposer<'a> {
    pub fn new(
        generator: &'a dyn TextGenerator,
        options: &'a GenerationOptions,
        slicer: &'a ContextSlicer,
    ) -> Self {
        Self {
            generator,
            options,
            slicer,
            token_budget: DEFAULT_REPORT_TOKEN_BUDGET,
        }
    }

    pub fn with_token_budget(mut self, token_budget: usize) -> Self {
        self.token_budget = token_budget;
        self
    }

    /// The body comes from the generator; the `## Sources` section is built
    /// here from `visited_urls` and always present, one entry per URL.
    ///
    /// If the output has no parsable `reportMarkdown` the raw text is used as
    /// the body. A failed generation leaves the body empty.
    pub async fn compose(&self, topic: &str, learnings: &[String], visited_urls: &[String]) -> String {
        let block = learnings_block(learnings);
        let block = self.slicer.slice(&block, self.token_budget);

        info!(learnings = learnings.len(), sources = visited_urls.len(), "Writing final report");

        let prompt = Prompt::system_and_user(
            ResearchPrompts::system(),
            ResearchPrompts::final_report(topic, &block),
        );

        let body = match self.generator.generate(prompt, self.options).await {
            Ok(raw) => match parse_model_json::<ReportResponse>(&raw) {
                Ok(report) => report.report_markdown,
                Err(e) => {
                    warn!(error = %e, "Report was not valid JSON; using raw output");
                    raw
                }
            },
            Err(e) => {
                warn!(error = %e, "Report generation failed");
                String::new()
            }
        };

        format!("{body}{}", sources_section(visited_urls))
    }
}

fn learnings_block(learnings: &[String]) -> String {
    learnings
        .iter()
        .map(|l| format!("<learning>\n{l}\n</learning>"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn sources_section(urls: &[String]) -> String {
    let mut section = String::from("\n\n## Sources\n\n");
    let lines: Vec<String> = urls.iter().map(|u| format!("- {u}")).collect();
    section.push_str(&lines.join("\n"));
    section
}

/// Shorthand for [`ReportComposer::compose`] with the default budget.
pub async fn compose_report(
    generator: &dyn TextGenerator,
    options: &GenerationOptions,
    slicer: &ContextSlicer,
    topic: &str,
    learnings: &[String],
    visited_urls: &[String],
) -> String {
    ReportComposer::new(generator, options, slicer)
        .compose(topic, learnings, visited_urls)
        .await
}
