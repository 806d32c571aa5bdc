use std::fmt;
use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use crate::core::error::{Error, ErrorKind, Result};

/// Longest document ID accepted by the engine, in bytes.
pub const MAX_DOC_ID_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        DocId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(Error::new(ErrorKind::InvalidArgument, "document id cannot be empty".to_string()));
        }
        if self.0.len() > MAX_DOC_ID_LEN {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("document id is {} bytes, limit is {}", self.0.len(), MAX_DOC_ID_LEN),
            ));
        }
        Ok(())
    }
}

impl From<&str> for DocId {
    fn from(id: &str) -> Self {
        DocId(id.to_string())
    }
}

impl From<String> for DocId {
    fn from(id: String) -> Self {
        DocId(id)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOptions {
    pub index: bool,
    pub store: bool,
    pub term_vectors: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        FieldOptions {
            index: true,
            store: true,
            term_vectors: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    pub array_positions: Vec<u64>,   // Position path inside nested arrays
    pub options: FieldOptions,
    pub analyzer: Option<String>,    // None -> config default analyzer
}

impl Field {
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Field {
            name: name.into(),
            value,
            array_positions: Vec::new(),
            options: FieldOptions::default(),
            analyzer: None,
        }
    }

    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Field::new(name, FieldValue::Text(text.into()))
    }

    pub fn with_options(mut self, options: FieldOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_array_positions(mut self, positions: Vec<u64>) -> Self {
        self.array_positions = positions;
        self
    }

    pub fn with_analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub fields: Vec<Field>,
}

impl Document {
    pub fn new(id: impl Into<DocId>) -> Self {
        Document {
            id: id.into(),
            fields: Vec::new(),
        }
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_text(self, name: &str, text: &str) -> Self {
        self.with_field(Field::text(name, text))
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
