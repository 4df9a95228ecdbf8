//! # Deep Research
//!
//! Recursive web research over a breadth/depth-bounded query tree.
//!
//! ```text
//! topic ──► plan queries ──► search ──► distill ──► follow-ups ──► (recurse)
//!                                                        │
//!                      accumulated learnings + URLs ◄────┘
//!                                   │
//!                                   ▼
//!                        markdown report + sources
//! ```
//!
//! The model backend and the search backend are both trait objects
//! ([`TextGenerator`], [`SearchProvider`]), so the whole pipeline runs
//! against stubs in tests.

pub mod config;
pub mod distiller;
pub mod error;
pub mod json;
pub mod llm;
pub mod orchestrator;
pub mod planner;
pub mod prompts;
pub mod report;
pub mod search;
pub mod slicer;
pub mod state;

pub use config::Config;
pub use distiller::ResultDistiller;
pub use error::{ConfigError, GenerationError, SearchError};
pub use llm::{GenerationOptions, GeneratorRegistry, Prompt, TextGenerator};
pub use orchestrator::{ConcurrencyScope, DeepResearcher, ResearchConfig, RetryPolicy};
pub use planner::{combine_feedback, generate_feedback, plan_queries};
pub use report::{compose_report, ReportComposer};
pub use search::{FirecrawlSearch, SearchDocument, SearchOptions, SearchProvider};
pub use slicer::{ContextSlicer, TiktokenTokenizer, Tokenizer, WordTokenizer};
pub use state::{DistillationResult, ResearchQuery, ResearchState};
