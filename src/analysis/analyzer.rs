use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use rust_stemmers::Algorithm;
use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::filters::stopword::StopWordFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{KeywordTokenizer, StandardTokenizer, Tokenizer};
use crate::core::error::{Error, ErrorKind, Result};

/// Text analysis pipeline
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: String, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name,
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        tokens
    }

    /// Unicode words, lowercased
    pub fn simple() -> Self {
        Analyzer::new("simple".to_string(),
                      Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
    }

    /// Create standard analyzer for English
    pub fn standard_english() -> Self {
        Analyzer::new("standard".to_string(),
                      Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(StopWordFilter::english()))
            .add_filter(Box::new(StemmerFilter::new(Algorithm::English)))
    }

    /// Entire value as a single term
    pub fn keyword() -> Self {
        Analyzer::new("keyword".to_string(), Box::new(KeywordTokenizer))
    }
}

/// Registry for managing analyzers
pub struct AnalyzerRegistry {
    analyzers: RwLock<HashMap<String, Arc<Analyzer>>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        let registry = AnalyzerRegistry {
            analyzers: RwLock::new(HashMap::new()),
        };

        // Register default analyzers
        registry.register_defaults();
        registry
    }

    fn register_defaults(&self) {
        self.register("simple", Analyzer::simple());
        self.register("standard", Analyzer::standard_english());
        self.register("keyword", Analyzer::keyword());
    }

    pub fn register(&self, name: &str, analyzer: Analyzer) {
        let mut analyzers = self.analyzers.write();
        analyzers.insert(name.to_string(), Arc::new(analyzer));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Analyzer>> {
        let analyzers = self.analyzers.read();
        analyzers.get(name).cloned()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<Analyzer>> {
        self.get(name).ok_or_else(|| {
            Error::new(ErrorKind::NotFound, format!("Analyzer '{}' not found", name))
        })
    }

    pub fn analyze(&self, analyzer_name: &str, text: &str) -> Result<Vec<Token>> {
        Ok(self.resolve(analyzer_name)?.analyze(text))
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn simple_keeps_stop_words() {
        let registry = AnalyzerRegistry::new();
        let tokens = registry.analyze("simple", "The Cat sat").unwrap();
        assert_eq!(texts(&tokens), vec!["the", "cat", "sat"]);
    }

    #[test]
    fn standard_drops_stop_words_and_stems() {
        let registry = AnalyzerRegistry::new();
        let tokens = registry.analyze("standard", "The cats were running").unwrap();
        assert_eq!(texts(&tokens), vec!["cat", "were", "run"]);
        assert_eq!(tokens[0].position, 2);
    }

    #[test]
    fn unknown_analyzer() {
        let registry = AnalyzerRegistry::new();
        let err = registry.analyze("klingon", "qapla").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn custom_analyzers_can_be_registered() {
        let registry = AnalyzerRegistry::new();
        registry.register("raw", Analyzer::new("raw".to_string(), Box::new(StandardTokenizer::default())));
        let tokens = registry.analyze("raw", "Keep Case").unwrap();
        assert_eq!(texts(&tokens), vec!["Keep", "Case"]);
    }
}
