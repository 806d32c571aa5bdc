pub mod analyzer;
pub mod tokenizer;
pub mod token;
pub mod filter;
pub mod filters;
pub mod queue;
