//! Context-bounded text slicing
//!
//! Trims text to a token budget, cutting at sentence boundaries where it can
//! and falling back to a hard token cut when the first sentence alone is over
//! budget.

use regex::Regex;
use std::sync::{Arc, LazyLock};

/// `.`, `!` or `?` followed by whitespace.
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("valid regex"));

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("valid regex"));

/// Counts and truncates text in model tokens.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;

    /// The text made of the first `max_tokens` tokens of `text`.
    fn truncate_tokens(&self, text: &str, max_tokens: usize) -> String;
}

/// OpenAI BPE tokenizer (cl100k_base).
pub struct TiktokenTokenizer {
    encoder: tiktoken_rs::CoreBPE,
}

impl TiktokenTokenizer {
    pub fn new(encoder: tiktoken_rs::CoreBPE) -> Self {
        Self { encoder }
    }

    pub fn cl100k_base() -> anyhow::Result<Self> {
        Ok(Self {
            encoder: tiktoken_rs::cl100k_base()?,
        })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.encoder.encode_with_special_tokens(text).len()
    }

    fn truncate_tokens(&self, text: &str, max_tokens: usize) -> String {
        let mut tokens = self.encoder.encode_with_special_tokens(text);
        tokens.truncate(max_tokens);

        // A cut can land inside a multi-byte character; drop tokens until
        // the prefix decodes.
        while !tokens.is_empty() {
            if let Ok(decoded) = self.encoder.decode(tokens.clone()) {
                return decoded;
            }
            tokens.pop();
        }
        String::new()
    }
}

/// Whitespace-delimited word tokenizer. Deterministic and dependency-free,
/// used where exact counts matter more than fidelity to a model vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn truncate_tokens(&self, text: &str, max_tokens: usize) -> String {
        if max_tokens == 0 {
            return String::new();
        }
        match WORD.find_iter(text).nth(max_tokens - 1) {
            Some(last) => text[..last.end()].to_string(),
            None => text.to_string(),
        }
    }
}

/// Byte offsets just past each sentence-ending punctuation mark that is
/// followed by whitespace. `&text[..end]` is always a whole-sentence prefix.
pub fn sentence_ends(text: &str) -> impl Iterator<Item = usize> + '_ {
    // the punctuation is a single ASCII byte
    SENTENCE_BREAK.find_iter(text).map(|m| m.start() + 1)
}

/// Slices text to fit a token budget.
#[derive(Clone)]
pub struct ContextSlicer {
    tokenizer: Arc<dyn Tokenizer>,
}

impl std::fmt::Debug for ContextSlicer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextSlicer").finish_non_exhaustive()
    }
}

impl ContextSlicer {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { tokenizer }
    }

    /// Slicer backed by the cl100k_base encoding.
    pub fn cl100k() -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(TiktokenTokenizer::cl100k_base()?)))
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer.count_tokens(text)
    }

    /// Return the longest prefix of `text` that ends on a sentence boundary
    /// and fits in `max_tokens`. Whitespace inside the prefix is untouched.
    ///
    /// - Text that already fits is returned unchanged.
    /// - If the first sentence alone is over budget, the first `max_tokens`
    ///   tokens are returned even if that cuts a word.
    pub fn slice(&self, text: &str, max_tokens: usize) -> String {
        if self.tokenizer.count_tokens(text) <= max_tokens {
            return text.to_string();
        }

        let mut end = 0;
        for boundary in sentence_ends(text) {
            if self.tokenizer.count_tokens(&text[..boundary]) > max_tokens {
                break;
            }
            end = boundary;
        }

        let prefix = &text[..end];
        if prefix.trim().is_empty() {
            return self.tokenizer.truncate_tokens(text, max_tokens);
        }
        prefix.to_string()
    }
}
