//! End-to-end research runs against scripted generator and search backends.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use deep_research::{
    compose_report, ConcurrencyScope, ContextSlicer, DeepResearcher, GenerationError,
    GenerationOptions, Prompt, ResearchConfig, ResearchState, SearchDocument, SearchError,
    SearchOptions, SearchProvider, TextGenerator, WordTokenizer,
};

// =============================================================================
// SCRIPTED GENERATOR
// =============================================================================
/// Answers planning, distillation and report prompts with deterministic JSON.
///
/// Planned queries are named `q{call}-{i}`; each distillation yields one
/// learning and one follow-up naming the query it came from.
#[derive(Default)]
struct ScriptedGenerator {
    plan_calls: AtomicUsize,
    /// (topic, requested breadth) per planning call
    plans: Mutex<Vec<(String, usize)>>,
    /// Every distillation returns this learning instead of a per-query one
    shared_learning: Option<String>,
    /// Additional distinct learnings per distillation
    extra_learnings: usize,
    fail_planning: bool,
}

fn capture(pattern: &str, text: &str) -> Option<String> {
    Regex::new(pattern)
        .unwrap()
        .captures(text)
        .map(|c| c[1].to_string())
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: Prompt,
        _options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let text = prompt
            .into_messages()
            .into_iter()
            .map(|m| m.content)
            .collect::<Vec<_>>()
            .join("\n");

        if text.contains("generate a list of SERP queries") {
            if self.fail_planning {
                return Err(GenerationError::EmptyResponse);
            }
            let call = self.plan_calls.fetch_add(1, Ordering::SeqCst);
            let breadth: usize = capture(r"containing (\d+) queries", &text).unwrap().parse().unwrap();
            let topic = capture(r"(?s)<prompt>(.*?)</prompt>", &text).unwrap();
            self.plans.lock().unwrap().push((topic, breadth));

            let queries: Vec<_> = (0..breadth)
                .map(|i| serde_json::json!({"query": format!("q{call}-{i}"), "research_goal": format!("goal {call}-{i}")}))
                .collect();
            return Ok(serde_json::json!({ "queries": queries }).to_string());
        }

        if text.contains("generate a list of learnings") {
            let query = capture(r"<query>(.*?)</query>", &text).unwrap();
            let learning = self
                .shared_learning
                .clone()
                .unwrap_or_else(|| format!("Learned from {query}."));
            let mut learnings = vec![learning];
            learnings.extend((1..=self.extra_learnings).map(|n| format!("Fact {n} about {query}.")));
            return Ok(serde_json::json!({
                "learnings": learnings,
                "followUpQuestions": [format!("more about {query}?")]
            })
            .to_string());
        }

        if text.contains("write a final report") {
            return Ok(r##"{"reportMarkdown": "# Report"}"##.to_string());
        }

        Err(GenerationError::EmptyResponse)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-1"
    }
}

// =============================================================================
// SCRIPTED SEARCH
// =============================================================================
type Script = Box<dyn Fn(&str, usize) -> Result<Vec<SearchDocument>, SearchError> + Send + Sync>;

/// Search backend driven by a `(query, attempt) -> result` script. Attempts
/// are counted per query, starting at 1.
struct ScriptedSearch {
    script: Script,
    attempts: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSearch {
    fn new(
        script: impl Fn(&str, usize) -> Result<Vec<SearchDocument>, SearchError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            attempts: Mutex::new(HashMap::new()),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// One document per query, at a URL derived from the query.
    fn per_query() -> Self {
        Self::new(|query, _| {
            Ok(vec![SearchDocument::new(
                format!("https://example.com/{query}"),
                format!("Content about {query}. More detail follows."),
            )])
        })
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn attempts_for(&self, query: &str) -> usize {
        self.attempts.lock().unwrap().get(query).copied().unwrap_or(0)
    }

    fn total_attempts(&self) -> usize {
        self.attempts.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search(
        &self,
        query: &str,
        _options: &SearchOptions,
    ) -> Result<Vec<SearchDocument>, SearchError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let entry = attempts.entry(query.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.script)(query, attempt)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn researcher(
    generator: Arc<ScriptedGenerator>,
    search: Arc<ScriptedSearch>,
    config: ResearchConfig,
) -> DeepResearcher {
    DeepResearcher::new(
        generator,
        search,
        ContextSlicer::new(Arc::new(WordTokenizer)),
        config,
    )
}

// =============================================================================
// DEPTH AND BREADTH
// =============================================================================
#[tokio::test]
async fn test_depth_one_does_not_recurse() {
    let generator = Arc::new(ScriptedGenerator::default());
    let search = Arc::new(ScriptedSearch::per_query());

    let state = researcher(generator.clone(), search.clone(), ResearchConfig::default())
        .research("solid-state batteries", 2, 1, None)
        .await;

    assert_eq!(generator.plan_calls.load(Ordering::SeqCst), 1);
    assert_eq!(search.total_attempts(), 2);
    assert_eq!(state.learnings(), ["Learned from q0-0.", "Learned from q0-1."]);
    assert_eq!(
        state.visited_urls(),
        ["https://example.com/q0-0", "https://example.com/q0-1"]
    );
}

#[tokio::test]
async fn test_breadth_halves_at_each_level() {
    let generator = Arc::new(ScriptedGenerator::default());
    let search = Arc::new(ScriptedSearch::per_query());

    let state = researcher(generator.clone(), search.clone(), ResearchConfig::default())
        .research("topic", 4, 3, None)
        .await;

    // 1 plan at breadth 4, then 4 at breadth 2, then 4 * 2 at breadth 1
    let plans = generator.plans.lock().unwrap();
    assert_eq!(plans.len(), 13);
    assert_eq!(plans.iter().filter(|(_, b)| *b == 4).count(), 1);
    assert_eq!(plans.iter().filter(|(_, b)| *b == 2).count(), 4);
    assert_eq!(plans.iter().filter(|(_, b)| *b == 1).count(), 8);

    // 4 + 8 + 8 searches, each with a distinct learning and URL
    assert_eq!(search.total_attempts(), 20);
    assert_eq!(state.learnings().len(), 20);
    assert_eq!(state.visited_urls().len(), 20);
}

#[tokio::test]
async fn test_recursive_topic_carries_goal_and_follow_ups() {
    let generator = Arc::new(ScriptedGenerator::default());
    let search = Arc::new(ScriptedSearch::per_query());

    researcher(generator.clone(), search, ResearchConfig::default())
        .research("topic", 1, 2, None)
        .await;

    let plans = generator.plans.lock().unwrap();
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].0, "topic");
    assert_eq!(
        plans[1].0,
        "Previous research goal: goal 0-0\nFollow-up research directions: more about q0-0?"
    );
}

#[tokio::test]
async fn test_depth_zero_returns_seed_untouched() {
    let generator = Arc::new(ScriptedGenerator::default());
    let search = Arc::new(ScriptedSearch::per_query());
    let seed = ResearchState::from_parts(["Known fact."], ["https://seed.io"]);

    let state = researcher(generator.clone(), search.clone(), ResearchConfig::default())
        .research("topic", 4, 0, Some(seed.clone()))
        .await;

    assert_eq!(state, seed);
    assert_eq!(generator.plan_calls.load(Ordering::SeqCst), 0);
    assert_eq!(search.total_attempts(), 0);
}

// =============================================================================
// SEEDING AND DEDUPLICATION
// =============================================================================
#[tokio::test]
async fn test_seed_is_kept_in_result() {
    let generator = Arc::new(ScriptedGenerator::default());
    let search = Arc::new(ScriptedSearch::per_query());
    let seed = ResearchState::from_parts(["Known fact."], ["https://seed.io"]);

    let state = researcher(generator.clone(), search, ResearchConfig::default())
        .research("topic", 1, 1, Some(seed))
        .await;

    assert_eq!(state.learnings(), ["Known fact.", "Learned from q0-0."]);
    assert_eq!(state.visited_urls(), ["https://seed.io", "https://example.com/q0-0"]);
}

#[tokio::test]
async fn test_duplicate_learnings_and_urls_collapse() {
    let generator = Arc::new(ScriptedGenerator {
        shared_learning: Some("Everyone agrees.".to_string()),
        ..Default::default()
    });
    let search = Arc::new(ScriptedSearch::new(|_, _| {
        Ok(vec![SearchDocument::new("https://same.io", "Same page.")])
    }));

    let state = researcher(generator, search, ResearchConfig::default())
        .research("topic", 3, 2, None)
        .await;

    assert_eq!(state.learnings(), ["Everyone agrees."]);
    assert_eq!(state.visited_urls(), ["https://same.io"]);
}

#[tokio::test]
async fn test_planner_failure_returns_seed() {
    let generator = Arc::new(ScriptedGenerator {
        fail_planning: true,
        ..Default::default()
    });
    let search = Arc::new(ScriptedSearch::per_query());
    let seed = ResearchState::from_parts(["Known fact."], Vec::<String>::new());

    let state = researcher(generator, search.clone(), ResearchConfig::default())
        .research("topic", 4, 2, Some(seed.clone()))
        .await;

    assert_eq!(state, seed);
    assert_eq!(search.total_attempts(), 0);
}

// =============================================================================
// FAILURE ISOLATION AND RETRY
// =============================================================================
#[tokio::test]
async fn test_failed_branch_does_not_affect_siblings() {
    let generator = Arc::new(ScriptedGenerator::default());
    let search = Arc::new(ScriptedSearch::new(|query, _| {
        if query == "q0-1" {
            return Err(SearchError::ServerError(500, "boom".to_string()));
        }
        Ok(vec![SearchDocument::new(format!("https://example.com/{query}"), "Body.")])
    }));

    let state = researcher(generator, search.clone(), ResearchConfig::default())
        .research("topic", 3, 1, None)
        .await;

    assert_eq!(state.learnings(), ["Learned from q0-0.", "Learned from q0-2."]);
    assert!(!state.has_url("https://example.com/q0-1"));
    // Non-rate-limit errors are not retried
    assert_eq!(search.attempts_for("q0-1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_query_gives_up_after_five_attempts() {
    let generator = Arc::new(ScriptedGenerator::default());
    let search = Arc::new(ScriptedSearch::new(|_, _| Err(SearchError::RateLimited)));

    let started = tokio::time::Instant::now();
    let state = researcher(generator, search.clone(), ResearchConfig::default())
        .research("topic", 1, 1, None)
        .await;

    assert!(state.is_empty());
    assert_eq!(search.attempts_for("q0-0"), 5);
    // Four 3s waits between five attempts
    assert_eq!(started.elapsed(), Duration::from_secs(12));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_query_recovers() {
    let generator = Arc::new(ScriptedGenerator::default());
    let search = Arc::new(ScriptedSearch::new(|query, attempt| {
        if attempt < 3 {
            return Err(SearchError::RateLimited);
        }
        Ok(vec![SearchDocument::new(format!("https://example.com/{query}"), "Body.")])
    }));

    let state = researcher(generator, search.clone(), ResearchConfig::default())
        .research("topic", 1, 1, None)
        .await;

    assert_eq!(search.attempts_for("q0-0"), 3);
    assert_eq!(state.learnings(), ["Learned from q0-0."]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_search_is_abandoned_at_timeout() {
    let generator = Arc::new(ScriptedGenerator::default());
    let search = Arc::new(ScriptedSearch::per_query().with_delay(Duration::from_secs(60)));
    let config = ResearchConfig::default().with_search_options(SearchOptions {
        timeout: Duration::from_secs(15),
        limit: 5,
    });

    let state = researcher(generator, search.clone(), config)
        .research("topic", 1, 1, None)
        .await;

    assert!(state.is_empty());
    assert_eq!(search.attempts_for("q0-0"), 1);
}

// =============================================================================
// CONCURRENCY
// =============================================================================
#[tokio::test(start_paused = true)]
async fn test_per_level_concurrency_limit() {
    let generator = Arc::new(ScriptedGenerator::default());
    let search = Arc::new(ScriptedSearch::per_query().with_delay(Duration::from_secs(1)));
    let config = ResearchConfig::default().with_concurrency_limit(2);

    let state = researcher(generator, search.clone(), config)
        .research("topic", 4, 1, None)
        .await;

    assert_eq!(state.learnings().len(), 4);
    assert_eq!(search.max_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_global_scope_caps_whole_tree_without_deadlock() {
    let generator = Arc::new(ScriptedGenerator::default());
    let search = Arc::new(ScriptedSearch::per_query().with_delay(Duration::from_secs(1)));
    let config = ResearchConfig::default()
        .with_concurrency_limit(1)
        .with_concurrency_scope(ConcurrencyScope::Global);

    let state = tokio::time::timeout(
        Duration::from_secs(600),
        researcher(generator, search.clone(), config).research("topic", 4, 3, None),
    )
    .await
    .expect("global limiter must not deadlock on recursion");

    assert_eq!(state.learnings().len(), 20);
    assert_eq!(search.max_in_flight.load(Ordering::SeqCst), 1);
}

// =============================================================================
// REPORT
// =============================================================================
#[tokio::test]
async fn test_research_then_report() {
    let generator = Arc::new(ScriptedGenerator {
        extra_learnings: 1,
        ..Default::default()
    });
    let search = Arc::new(ScriptedSearch::per_query());
    let slicer = ContextSlicer::new(Arc::new(WordTokenizer));

    let state = researcher(generator.clone(), search, ResearchConfig::default())
        .research("X", 2, 1, None)
        .await;

    // Two queries, two learnings each, no recursion
    assert_eq!(generator.plan_calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.learnings().len(), 4);

    let report = compose_report(
        generator.as_ref(),
        &GenerationOptions::default(),
        &slicer,
        "X",
        state.learnings(),
        state.visited_urls(),
    )
    .await;

    assert_eq!(
        report,
        "# Report\n\n## Sources\n\n- https://example.com/q0-0\n- https://example.com/q0-1"
    );
}
