use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::analysis::queue::DocumentAnalysis;
use crate::analysis::token::Token;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Document, Field, FieldValue};
use crate::index::field_catalog::FieldCatalog;
use crate::index::rows::{Row, StoredRow, TermFrequencyRow, TermVector};

/// Per-field accumulation across every same-named field instance
#[derive(Default)]
struct FieldTerms {
    length: u64,
    last_position: u64,
    term_vectors: bool,
    terms: HashMap<String, (u64, Vec<TermVector>)>,
}

/// Turns documents into TermFrequency and Stored rows, allocating field IDs
/// in the catalog as new field names appear.
pub struct DocumentAnalyzer {
    fields: Arc<FieldCatalog>,
    analyzers: Arc<AnalyzerRegistry>,
    default_analyzer: String,
}

impl DocumentAnalyzer {
    pub fn new(fields: Arc<FieldCatalog>, analyzers: Arc<AnalyzerRegistry>, default_analyzer: impl Into<String>) -> Self {
        DocumentAnalyzer {
            fields,
            analyzers,
            default_analyzer: default_analyzer.into(),
        }
    }

    fn tokens(&self, field: &Field) -> Result<Vec<Token>> {
        match &field.value {
            FieldValue::Text(text) => {
                let name = field.analyzer.as_deref().unwrap_or(&self.default_analyzer);
                Ok(self.analyzers.resolve(name)?.analyze(text))
            }
            // Non-text values index as one canonical term
            other => {
                let term = Self::canonical_term(other);
                Ok(vec![Token::new(term, 1, 0)])
            }
        }
    }

    fn canonical_term(value: &FieldValue) -> String {
        match value {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Date(date) => date.to_rfc3339(),
            FieldValue::Boolean(true) => "T".to_string(),
            FieldValue::Boolean(false) => "F".to_string(),
        }
    }
}

impl DocumentAnalysis for DocumentAnalyzer {
    fn analyze(&self, doc: &Document) -> Result<Vec<Row>> {
        doc.id.validate()?;
        let doc_id = doc.id.as_str();

        let mut indexed: BTreeMap<u16, FieldTerms> = BTreeMap::new();
        let mut stored = Vec::new();

        for field in &doc.fields {
            let (field_id, _) = self.fields.field_id(&field.name, true)?.ok_or_else(|| {
                Error::new(ErrorKind::Internal, format!("field '{}' was not allocated", field.name))
            })?;

            if field.options.index {
                let tokens = self.tokens(field)?;
                let acc = indexed.entry(field_id).or_default();
                acc.term_vectors |= field.options.term_vectors;

                // Repeated fields continue the position sequence
                let base = acc.last_position;
                for token in tokens {
                    let pos = base + token.position as u64;
                    acc.last_position = acc.last_position.max(pos);
                    acc.length += 1;

                    let (freq, vectors) = acc.terms.entry(token.text).or_default();
                    *freq += 1;
                    if field.options.term_vectors {
                        vectors.push(TermVector {
                            field: field_id,
                            pos,
                            start: token.start as u64,
                            end: token.end as u64,
                            array_positions: field.array_positions.clone(),
                        });
                    }
                }
            }

            if field.options.store {
                stored.push(Row::Stored(StoredRow::from_field_value(
                    doc_id,
                    field_id,
                    field.array_positions.clone(),
                    &field.value,
                )));
            }
        }

        let mut rows = Vec::new();
        for (field_id, acc) in indexed {
            if acc.length == 0 {
                continue;
            }
            let norm = 1.0 / (acc.length as f32).sqrt();

            let mut terms: Vec<_> = acc.terms.into_iter().collect();
            terms.sort_by(|a, b| a.0.cmp(&b.0));
            for (term, (freq, vectors)) in terms {
                let vectors = if acc.term_vectors { vectors } else { Vec::new() };
                rows.push(Row::TermFrequency(TermFrequencyRow::new(term, field_id, doc_id, freq, norm, vectors)));
            }
        }
        rows.extend(stored);

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FieldOptions;

    fn analyzer() -> (Arc<FieldCatalog>, DocumentAnalyzer) {
        let fields = Arc::new(FieldCatalog::new());
        let analyzer = DocumentAnalyzer::new(fields.clone(), Arc::new(AnalyzerRegistry::new()), "simple");
        (fields, analyzer)
    }

    fn postings(rows: &[Row]) -> Vec<&TermFrequencyRow> {
        rows.iter()
            .filter_map(|r| match r {
                Row::TermFrequency(tf) => Some(tf),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn text_field_produces_postings_and_stored_value() {
        let (fields, analyzer) = analyzer();
        let doc = Document::new("d1").with_text("body", "the cat sat on the mat");
        let rows = analyzer.analyze(&doc).unwrap();

        let tfs = postings(&rows);
        let terms: Vec<_> = tfs.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["cat", "mat", "on", "sat", "the"]);
        let the = tfs.iter().find(|t| t.term == "the").unwrap();
        assert_eq!(the.freq, 2);
        assert_eq!(the.vectors.iter().map(|v| v.pos).collect::<Vec<_>>(), vec![1, 5]);
        assert!((the.norm - 1.0 / 6f32.sqrt()).abs() < 1e-6);

        assert!(matches!(rows.last(), Some(Row::Stored(_))));
        assert_eq!(fields.field_id("body", false).unwrap(), Some((0, true)));
    }

    #[test]
    fn repeated_fields_share_one_posting_set() {
        let (_, analyzer) = analyzer();
        let doc = Document::new("d1")
            .with_field(Field::text("tag", "red").with_array_positions(vec![0]))
            .with_field(Field::text("tag", "red").with_array_positions(vec![1]));
        let rows = analyzer.analyze(&doc).unwrap();

        let tfs = postings(&rows);
        assert_eq!(tfs.len(), 1);
        assert_eq!(tfs[0].freq, 2);
        assert_eq!(tfs[0].vectors[1].pos, 2);
        assert_eq!(tfs[0].vectors[1].array_positions, vec![1]);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn options_control_output() {
        let (_, analyzer) = analyzer();
        let no_store = FieldOptions { index: true, store: false, term_vectors: false };
        let no_index = FieldOptions { index: false, store: true, term_vectors: false };
        let doc = Document::new("d1")
            .with_field(Field::text("a", "x y").with_options(no_store))
            .with_field(Field::text("b", "z").with_options(no_index));
        let rows = analyzer.analyze(&doc).unwrap();

        let tfs = postings(&rows);
        assert_eq!(tfs.len(), 2);
        assert!(tfs.iter().all(|t| t.vectors.is_empty()));
        let stored: Vec<_> = rows.iter().filter(|r| matches!(r, Row::Stored(_))).collect();
        assert_eq!(stored.len(), 1);
    }

    #[test]
    fn non_text_values_index_as_single_term() {
        let (_, analyzer) = analyzer();
        let doc = Document::new("d1")
            .with_field(Field::new("price", FieldValue::Number(3.5)))
            .with_field(Field::new("active", FieldValue::Boolean(true)));
        let rows = analyzer.analyze(&doc).unwrap();
        let terms: Vec<_> = postings(&rows).iter().map(|t| t.term.clone()).collect();
        assert_eq!(terms, vec!["3.5".to_string(), "T".to_string()]);
    }

    #[test]
    fn bad_input_is_rejected() {
        let (_, analyzer) = analyzer();
        assert_eq!(analyzer.analyze(&Document::new("")).unwrap_err().kind(), ErrorKind::InvalidArgument);

        let doc = Document::new("d1").with_field(Field::text("a", "x").with_analyzer("missing"));
        assert_eq!(analyzer.analyze(&doc).unwrap_err().kind(), ErrorKind::NotFound);
    }
}
