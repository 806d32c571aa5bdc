use serde::{Serialize, Deserialize};

/// Token representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,      // The token text
    pub position: u32,     // 1-based position in the field
    pub start: usize,      // Byte offset of the first byte in the original text
    pub end: usize,        // Byte offset one past the last byte
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    Word,
    Number,
}

impl Token {
    pub fn new(text: impl Into<String>, position: u32, start: usize) -> Self {
        let text = text.into();
        let end = start + text.len();
        let token_type = if !text.is_empty() && text.chars().all(|c| c.is_numeric()) {
            TokenType::Number
        } else {
            TokenType::Word
        };
        Token {
            text,
            position,
            start,
            end,
            token_type,
        }
    }
}
