use std::collections::HashSet;
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

const ENGLISH: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for",
    "if", "in", "into", "is", "it", "no", "not", "of", "on", "or",
    "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Drops listed terms. Survivors keep their positions, so phrase gaps remain visible.
pub struct StopWordFilter {
    words: HashSet<String>,
}

impl StopWordFilter {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StopWordFilter { words: words.into_iter().map(Into::into).collect() }
    }

    pub fn english() -> Self {
        Self::from_words(ENGLISH.iter().copied())
    }

    pub fn contains(&self, term: &str) -> bool {
        self.words.contains(term)
    }
}

impl TokenFilter for StopWordFilter {
    fn filter(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        tokens.retain(|token| !self.contains(&token.text));
        tokens
    }

    fn name(&self) -> &str {
        "stop_words"
    }
}
