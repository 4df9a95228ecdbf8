//! # Deep Research CLI
//!
//! Interactive front end for the recursive research pipeline.
//!
//! ## Quick Start
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! export FIRECRAWL_KEY=fc-...
//! cargo run -- --breadth 4 --depth 2 "State of solid-state batteries"
//! ```

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use deep_research::{
    combine_feedback, compose_report, generate_feedback, Config, ContextSlicer, DeepResearcher,
    FirecrawlSearch, GeneratorRegistry,
};

/// Clarifying questions asked before research starts.
const FEEDBACK_QUESTIONS: usize = 3;

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
/// Flags override the matching environment variables loaded by
/// [`Config::from_env`].
#[derive(Parser, Debug)]
#[command(
    name = "deep-research",
    version,
    about = "Recursive web research: plans queries, searches, distills learnings, and writes a report",
    long_about = r#"
Deep Research - recursive breadth/depth-bounded web research.

For a topic it will:
  1. Ask a few clarifying questions (skip with --skip-questions)
  2. Plan search queries, search the web, and distill learnings
  3. Follow up on what it learned, narrowing at each level
  4. Write a markdown report with a Sources section

ENVIRONMENT:
  LLM_PROVIDER        openai | deepseek | gemini | ollama (default: openai)
  OPENAI_API_KEY      (or DEEPSEEK_API_KEY / GEMINI_API_KEY) key or key file path
  FIRECRAWL_KEY       Firecrawl key or key file path
  RESEARCH_CONCURRENCY  units running at once (default: 1)

EXAMPLES:
  deep-research "Rust async runtimes in production"
  deep-research --breadth 6 --depth 3 --provider deepseek "Sodium-ion batteries"
"#
)]
struct Args {
    /// The research topic; asked for interactively when omitted
    #[arg(value_name = "TOPIC")]
    topic: Option<String>,

    /// Queries planned at the top level (halved at each deeper level)
    #[arg(short = 'b', long, value_parser = clap::value_parser!(u32).range(1..))]
    breadth: Option<u32>,

    /// Levels of recursion
    #[arg(short = 'd', long, value_parser = clap::value_parser!(u32).range(1..))]
    depth: Option<u32>,

    /// Research units running at once
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u32).range(1..))]
    concurrency: Option<u32>,

    /// Text generation backend (overrides LLM_PROVIDER)
    #[arg(short = 'p', long)]
    provider: Option<String>,

    /// Model name (overrides LLM_MODEL)
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Report file (overrides REPORT_PATH)
    #[arg(short = 'o', long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Skip the clarifying questions
    #[arg(long, default_value = "false")]
    skip_questions: bool,

    /// Enable verbose/debug logging
    #[arg(short = 'v', long, default_value = "false")]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(breadth) = self.breadth {
            config.breadth = breadth as usize;
        }
        if let Some(depth) = self.depth {
            config.depth = depth as usize;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency as usize;
        }
        if let Some(provider) = &self.provider {
            config.provider = provider.trim().to_ascii_lowercase();
        }
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(output) = &self.output {
            config.report_path = output.clone();
        }
    }
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let mut config = Config::from_env()?;
    args.apply(&mut config);
    config.validate()?;

    let registry = GeneratorRegistry::with_defaults();
    let generator = registry
        .create(&config.provider, &config.provider_settings())
        .with_context(|| format!("available providers: {}", registry.names().join(", ")))?;

    let mut search = FirecrawlSearch::new(config.require_firecrawl_key()?);
    if let Some(base_url) = &config.firecrawl_base_url {
        search = search.with_base_url(base_url.clone());
    }

    let slicer = ContextSlicer::cl100k().context("Failed to load cl100k_base tokenizer")?;
    let options = config.generation_options();

    info!(
        provider = generator.name(),
        model = options.model.as_deref().unwrap_or(generator.default_model()),
        breadth = config.breadth,
        depth = config.depth,
        concurrency = config.concurrency,
        "Configuration loaded"
    );

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let initial = match &args.topic {
        Some(topic) if !topic.trim().is_empty() => topic.trim().to_string(),
        _ => ask(&mut stdin, "What would you like to research? ").await?,
    };
    if initial.is_empty() {
        anyhow::bail!("A research topic is required");
    }

    let topic = if args.skip_questions {
        initial
    } else {
        let questions =
            generate_feedback(generator.as_ref(), &options, &initial, FEEDBACK_QUESTIONS).await;
        if questions.is_empty() {
            initial
        } else {
            println!("\nTo better understand your research needs, please answer these follow-up questions:");
            let mut answered = Vec::with_capacity(questions.len());
            for question in questions {
                let answer = ask(&mut stdin, &format!("\n{question}\nYour answer: ")).await?;
                answered.push((question, answer));
            }
            combine_feedback(&initial, &answered)
        }
    };

    let researcher = DeepResearcher::new(
        Arc::clone(&generator),
        Arc::new(search),
        slicer.clone(),
        config.research_config(),
    )
    .with_generation_options(options.clone());

    println!("\nResearching...\n");
    let state = researcher
        .research(&topic, config.breadth, config.depth, None)
        .await;

    if state.is_empty() {
        error!("Research produced no learnings or sources");
    }

    println!("\n{}", "=".repeat(60));
    println!("LEARNINGS");
    println!("{}\n", "=".repeat(60));
    for learning in state.learnings() {
        println!("- {learning}");
    }
    println!("\nVisited URLs ({}):", state.visited_urls().len());
    for url in state.visited_urls() {
        println!("- {url}");
    }

    println!("\nWriting final report...");
    let report = compose_report(
        generator.as_ref(),
        &options,
        &slicer,
        &topic,
        state.learnings(),
        state.visited_urls(),
    )
    .await;

    tokio::fs::write(&config.report_path, &report)
        .await
        .with_context(|| format!("Failed to write report to {}", config.report_path.display()))?;

    println!("\n{}", "=".repeat(60));
    println!("FINAL REPORT");
    println!("{}\n", "=".repeat(60));
    println!("{report}");
    println!("\nReport saved to {}", config.report_path.display());

    info!("Research completed successfully");
    Ok(())
}

/// Print `prompt` and read one trimmed line. End of input reads as empty.
async fn ask(lines: &mut Lines<BufReader<Stdin>>, prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let line = lines.next_line().await.context("Failed to read from stdin")?;
    Ok(line.unwrap_or_default().trim().to_string())
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// `RUST_LOG`, when set, wins over the `--verbose` flag.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,deep_research={level}")));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
