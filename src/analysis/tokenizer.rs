use crate::analysis::token::Token;
use unicode_segmentation::UnicodeSegmentation;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> &str;
}

/// Unicode word-boundary tokenizer (UAX #29)
#[derive(Clone)]
pub struct StandardTokenizer {
    pub max_token_length: usize,
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        StandardTokenizer {
            max_token_length: 255,
        }
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;

        for (offset, word) in text.unicode_word_indices() {
            // Over-long words still occupy a position
            position += 1;
            if word.len() <= self.max_token_length {
                tokens.push(Token::new(word.to_string(), position, offset));
            }
        }

        tokens
    }

    fn name(&self) -> &str {
        "standard"
    }
}

/// Whole input as one token; empty input yields nothing
pub struct KeywordTokenizer;

impl Tokenizer for KeywordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        if text.is_empty() {
            return Vec::new();
        }
        vec![Token::new(text.to_string(), 1, 0)]
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::TokenType;

    #[test]
    fn offsets_point_into_the_original_text() {
        let text = "The  cat, sat!";
        let tokens = StandardTokenizer::default().tokenize(text);
        let words: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["The", "cat", "sat"]);
        for token in &tokens {
            assert_eq!(&text[token.start..token.end], token.text);
        }
        assert_eq!(tokens.iter().map(|t| t.position).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn long_words_are_skipped_but_counted() {
        let tokenizer = StandardTokenizer { max_token_length: 3 };
        let tokens = tokenizer.tokenize("cat elephant dog");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].text, "dog");
        assert_eq!(tokens[1].position, 3);
    }

    #[test]
    fn numbers_are_typed() {
        let tokens = StandardTokenizer::default().tokenize("route 66");
        assert_eq!(tokens[1].token_type, TokenType::Number);
    }

    #[test]
    fn keyword_keeps_input_whole() {
        let tokens = KeywordTokenizer.tokenize("New York");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].end, 8);
        assert!(KeywordTokenizer.tokenize("").is_empty());
    }
}
