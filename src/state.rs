//! Research data model
//!
//! - [`ResearchQuery`] - one planned sub-query with its research goal
//! - [`DistillationResult`] - learnings and follow-up questions for one query
//! - [`ResearchState`] - the mergeable accumulator of learnings and visited URLs

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A planned search query. Consumed exactly once by one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchQuery {
    /// The SERP query text
    #[serde(rename = "query")]
    pub query_text: String,

    /// What this query is meant to find out, and how to push further
    #[serde(default, alias = "researchGoal")]
    pub research_goal: String,
}

impl ResearchQuery {
    pub fn new(query_text: impl Into<String>, research_goal: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            research_goal: research_goal.into(),
        }
    }
}

/// Learnings and follow-up questions distilled from one query's results.
///
/// Order is the generator's order; both lists are already capped to the
/// maxima the caller asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistillationResult {
    pub learnings: Vec<String>,
    pub follow_up_questions: Vec<String>,
}

impl DistillationResult {
    pub fn is_empty(&self) -> bool {
        self.learnings.is_empty() && self.follow_up_questions.is_empty()
    }
}

/// Insertion-ordered set of strings, unique by exact equality.
#[derive(Debug, Clone, Default)]
struct OrderedSet {
    items: Vec<String>,
    seen: HashSet<String>,
}

impl OrderedSet {
    fn insert(&mut self, item: String) -> bool {
        if self.seen.contains(&item) {
            return false;
        }
        self.seen.insert(item.clone());
        self.items.push(item);
        true
    }

    fn contains(&self, item: &str) -> bool {
        self.seen.contains(item)
    }
}

impl PartialEq for OrderedSet {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Eq for OrderedSet {}

/// The accumulating work product of a research subtree.
///
/// Learnings and URLs are sets keyed by exact string equality; near-duplicate
/// learnings are kept as distinct entries. The state only grows: there is no
/// way to remove an entry. Iteration order is first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResearchState {
    learnings: OrderedSet,
    visited_urls: OrderedSet,
}

impl ResearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from raw lists, dropping duplicates.
    pub fn from_parts<L, U>(learnings: L, visited_urls: U) -> Self
    where
        L: IntoIterator,
        L::Item: Into<String>,
        U: IntoIterator,
        U::Item: Into<String>,
    {
        let mut state = Self::new();
        state.extend_learnings(learnings);
        state.extend_urls(visited_urls);
        state
    }

    /// Returns `true` if the learning was not already present.
    pub fn add_learning(&mut self, learning: impl Into<String>) -> bool {
        self.learnings.insert(learning.into())
    }

    /// Returns `true` if the URL was not already present.
    pub fn add_url(&mut self, url: impl Into<String>) -> bool {
        self.visited_urls.insert(url.into())
    }

    pub fn extend_learnings<I>(&mut self, learnings: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for learning in learnings {
            self.add_learning(learning);
        }
    }

    pub fn extend_urls<I>(&mut self, urls: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for url in urls {
            self.add_url(url);
        }
    }

    /// Set-union `other` into `self`. Entries already present keep their
    /// original position.
    pub fn merge(&mut self, other: ResearchState) {
        self.extend_learnings(other.learnings.items);
        self.extend_urls(other.visited_urls.items);
    }

    /// Consuming variant of [`merge`](Self::merge).
    pub fn merged(mut self, other: ResearchState) -> Self {
        self.merge(other);
        self
    }

    pub fn learnings(&self) -> &[String] {
        &self.learnings.items
    }

    pub fn visited_urls(&self) -> &[String] {
        &self.visited_urls.items
    }

    pub fn has_url(&self, url: &str) -> bool {
        self.visited_urls.contains(url)
    }

    pub fn is_empty(&self) -> bool {
        self.learnings.items.is_empty() && self.visited_urls.items.is_empty()
    }
}
