//! # Word Tokenizer
//!
//! Normalizes free text and splits it into lowercase words. The same
//! tokenizer is used for the training batches and for single inference
//! inputs, so both sides see identical tokens.

use std::sync::LazyLock;

use regex::Regex;

/// HTML line breaks that show up in scraped reviews (`<br>`, `<br/>`, `<br />`).
static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("static regex"));

/// Tokenizer for free text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer;

impl Tokenizer {
    /// Create a new tokenizer instance.
    pub fn new() -> Self {
        Self
    }

    /// Split `input` into normalized words.
    ///
    /// # Examples
    /// ```
    /// use sentiforge_core::text::Tokenizer;
    ///
    /// let tokenizer = Tokenizer::new();
    /// assert_eq!(
    ///     tokenizer.tokenize("Great movie!! 10/10"),
    ///     vec!["great", "movie", "1010"]
    /// );
    /// ```
    pub fn tokenize(&self, input: &str) -> Vec<String> {
        self.normalize(input)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Tokenize every text of a batch.
    pub fn tokenize_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Vec<String>> {
        texts.iter().map(|t| self.tokenize(t.as_ref())).collect()
    }

    /// Normalize text by:
    /// - Replacing HTML line breaks with spaces
    /// - Converting to lowercase
    /// - Deleting every character that is neither alphanumeric nor whitespace
    ///
    /// Punctuation is deleted, not replaced, so `"10/10"` becomes `"1010"`
    /// and `"don't"` becomes `"dont"`.
    pub fn normalize(&self, text: &str) -> String {
        LINE_BREAK
            .replace_all(text, " ")
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect()
    }

    /// Join tokens back into a single space-separated string.
    pub fn join(tokens: &[String]) -> String {
        tokens.join(" ")
    }
}
