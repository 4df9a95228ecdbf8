//! # Research Orchestrator
//!
//! Drives plan → search → distill across a breadth/depth-bounded tree:
//!
//! ```text
//! research(topic, breadth=4, depth=3)
//!   ├─ plan ≤4 queries
//!   ├─ unit(q1): search (retry on 429) → distill → research(follow-ups, 2, 2)
//!   │                                                ├─ unit: … → research(…, 1, 1)
//!   │                                                └─ unit: …
//!   ├─ unit(q2): …
//!   └─ merge every unit's state with the seed (set union)
//! ```
//!
//! Units at one level run concurrently, at most `concurrency_limit` at a time.
//! A unit that fails contributes an empty state; nothing propagates upward as
//! an error.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::distiller::{ResultDistiller, DEFAULT_DOCUMENT_TOKEN_BUDGET};
use crate::llm::{GenerationOptions, TextGenerator};
use crate::planner::plan_queries;
use crate::search::{SearchDocument, SearchOptions, SearchProvider};
use crate::slicer::ContextSlicer;
use crate::state::{ResearchQuery, ResearchState};

/// Learnings requested from the distiller per query.
pub const DEFAULT_MAX_LEARNINGS: usize = 3;

/// How the concurrency limit applies across the research tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConcurrencyScope {
    /// Every recursive call gets its own limiter; a unit holds its permit
    /// until its whole subtree is done.
    #[default]
    PerLevel,
    /// One limiter for the whole tree; a unit holds its permit only for its
    /// own search and distillation and releases it before recursing.
    Global,
}

impl std::str::FromStr for ConcurrencyScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-level" | "per_level" | "level" => Ok(ConcurrencyScope::PerLevel),
            "global" => Ok(ConcurrencyScope::Global),
            other => Err(format!("unknown concurrency scope '{other}' (expected per-level or global)")),
        }
    }
}

/// Retry policy for rate-limited searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(3),
        }
    }
}

/// Orchestrator tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchConfig {
    pub concurrency_limit: usize,
    pub concurrency_scope: ConcurrencyScope,
    pub retry: RetryPolicy,
    pub search: SearchOptions,
    pub max_learnings: usize,
    /// Tokens kept from each search document before distillation
    pub document_token_budget: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 1,
            concurrency_scope: ConcurrencyScope::default(),
            retry: RetryPolicy::default(),
            search: SearchOptions::default(),
            max_learnings: DEFAULT_MAX_LEARNINGS,
            document_token_budget: DEFAULT_DOCUMENT_TOKEN_BUDGET,
        }
    }
}

impl ResearchConfig {
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    pub fn with_concurrency_scope(mut self, scope: ConcurrencyScope) -> Self {
        self.concurrency_scope = scope;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_search_options(mut self, search: SearchOptions) -> Self {
        self.search = search;
        self
    }

    pub fn with_max_learnings(mut self, max_learnings: usize) -> Self {
        self.max_learnings = max_learnings;
        self
    }

    pub fn with_document_token_budget(mut self, budget: usize) -> Self {
        self.document_token_budget = budget;
        self
    }
}

/// Breadth for the next level down: halved with integer division, never
/// below one.
pub fn next_breadth(breadth: usize) -> usize {
    (breadth / 2).max(1)
}

/// Recursive research driver.
pub struct DeepResearcher {
    generator: Arc<dyn TextGenerator>,
    search: Arc<dyn SearchProvider>,
    slicer: ContextSlicer,
    distiller: ResultDistiller,
    options: GenerationOptions,
    config: ResearchConfig,
}

impl DeepResearcher {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        search: Arc<dyn SearchProvider>,
        slicer: ContextSlicer,
        config: ResearchConfig,
    ) -> Self {
        let options = GenerationOptions::default();
        let distiller = Self::build_distiller(&generator, &options, &slicer, &config);
        Self {
            generator,
            search,
            slicer,
            distiller,
            options,
            config,
        }
    }

    /// Generation options for planning and distillation calls.
    pub fn with_generation_options(mut self, options: GenerationOptions) -> Self {
        self.distiller = Self::build_distiller(&self.generator, &options, &self.slicer, &self.config);
        self.options = options;
        self
    }

    fn build_distiller(
        generator: &Arc<dyn TextGenerator>,
        options: &GenerationOptions,
        slicer: &ContextSlicer,
        config: &ResearchConfig,
    ) -> ResultDistiller {
        ResultDistiller::new(Arc::clone(generator), options.clone(), slicer.clone())
            .with_document_token_budget(config.document_token_budget)
    }

    /// Research `topic` to the given breadth and depth.
    ///
    /// The result is the union of `seed` with every learning and URL found
    /// anywhere in the tree. With `depth == 0` there is nothing left to
    /// explore and the seed is returned as-is; the planner is not called,
    /// so no generation request is made.
    pub async fn research(
        &self,
        topic: &str,
        breadth: usize,
        depth: usize,
        seed: Option<ResearchState>,
    ) -> ResearchState {
        let seed = seed.unwrap_or_default();
        if depth == 0 {
            debug!("Depth exhausted before start; returning seed");
            return seed;
        }

        let shared = match self.config.concurrency_scope {
            ConcurrencyScope::Global => Some(Arc::new(Semaphore::new(self.config.concurrency_limit))),
            ConcurrencyScope::PerLevel => None,
        };

        info!(breadth, depth, scope = ?self.config.concurrency_scope, "Starting research");
        self.research_level(topic.to_string(), breadth, depth, seed, shared)
            .await
    }

    fn research_level(
        &self,
        topic: String,
        breadth: usize,
        depth: usize,
        seed: ResearchState,
        shared: Option<Arc<Semaphore>>,
    ) -> BoxFuture<'_, ResearchState> {
        async move {
            let queries = plan_queries(
                self.generator.as_ref(),
                &self.options,
                &topic,
                breadth,
                seed.learnings(),
            )
            .await;

            if queries.is_empty() {
                info!(depth, "Planner returned no queries; branch complete");
                return seed;
            }
            debug!(count = queries.len(), breadth, depth, "Planned queries for level");

            let limiter = match &shared {
                Some(semaphore) => Arc::clone(semaphore),
                None => Arc::new(Semaphore::new(self.config.concurrency_limit)),
            };

            let units = queries.into_iter().map(|query| {
                self.run_unit(query, breadth, depth, &seed, Arc::clone(&limiter), shared.clone())
            });
            let results = join_all(units).await;

            let mut merged = seed;
            for result in results {
                merged.merge(result);
            }
            merged
        }
        .boxed()
    }

    /// One planned query: search, distill, then recurse if depth remains.
    async fn run_unit(
        &self,
        query: ResearchQuery,
        breadth: usize,
        depth: usize,
        seed: &ResearchState,
        limiter: Arc<Semaphore>,
        shared: Option<Arc<Semaphore>>,
    ) -> ResearchState {
        let mut permit = match limiter.acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(e) => {
                error!(query = %query.query_text, error = %e, "Concurrency limiter closed");
                return ResearchState::new();
            }
        };

        let Some(documents) = self.search_with_retry(&query.query_text).await else {
            return ResearchState::new();
        };

        let new_breadth = next_breadth(breadth);
        let new_depth = depth - 1;

        let distilled = self
            .distiller
            .distill(
                &query.query_text,
                &documents,
                self.config.max_learnings,
                new_breadth,
            )
            .await;
        if distilled.is_empty() {
            debug!(query = %query.query_text, "Nothing distilled from results");
        }

        let mut accumulated = seed.clone();
        accumulated.extend_learnings(distilled.learnings);
        accumulated.extend_urls(urls_of(documents));

        if new_depth == 0 {
            return accumulated;
        }

        if shared.is_some() {
            permit.take();
        }

        info!(breadth = new_breadth, depth = new_depth, "Researching deeper");
        let next_topic = format!(
            "Previous research goal: {}\nFollow-up research directions: {}",
            query.research_goal,
            distilled.follow_up_questions.join(" ")
        )
        .trim()
        .to_string();

        let result = self
            .research_level(next_topic, new_breadth, new_depth, accumulated, shared)
            .await;
        drop(permit);
        result
    }

    /// `None` means the query is abandoned.
    async fn search_with_retry(&self, query: &str) -> Option<Vec<SearchDocument>> {
        let retry = self.config.retry;
        let options = &self.config.search;

        for attempt in 1..=retry.max_attempts {
            let outcome = tokio::time::timeout(options.timeout, self.search.search(query, options)).await;

            match outcome {
                Ok(Ok(documents)) => return Some(documents),
                Ok(Err(e)) if e.is_rate_limited() => {
                    warn!(query = %query, attempt, max_attempts = retry.max_attempts, "Search rate limited");
                    if attempt < retry.max_attempts {
                        tokio::time::sleep(retry.backoff).await;
                    }
                }
                Ok(Err(e)) => {
                    error!(query = %query, error = %e, "Error running query");
                    return None;
                }
                Err(_) => {
                    error!(query = %query, timeout = ?options.timeout, "Search timed out");
                    return None;
                }
            }
        }

        warn!(query = %query, "Max retries exceeded for query");
        None
    }
}

fn urls_of(documents: Vec<SearchDocument>) -> impl Iterator<Item = String> {
    documents
        .into_iter()
        .map(|doc| doc.url)
        .filter(|url| !url.is_empty())
}
