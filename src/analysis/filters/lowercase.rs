use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Lowercases term text. Offsets still point into the original field text.
pub struct LowercaseFilter;

impl TokenFilter for LowercaseFilter {
    fn filter(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        for token in tokens.iter_mut() {
            if token.text.chars().any(char::is_uppercase) {
                token.text = token.text.to_lowercase();
            }
        }
        tokens
    }

    fn name(&self) -> &str {
        "lowercase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_text_changes() {
        let tokens = vec![Token::new("Über", 1, 0), Token::new("cat", 2, 6)];
        let out = LowercaseFilter.filter(tokens);
        assert_eq!(out[0].text, "über");
        assert_eq!((out[0].start, out[0].end), (0, 5));
        assert_eq!(out[1].text, "cat");
    }
}
