use bytes::BufMut;
use crate::compression::vbyte::VByteEncoder;
use crate::core::error::{Error, Result};
use crate::index::rows::{
    check_count, decode_field_id, decode_field_varint, decode_utf8, DictionaryRow, RowCodec,
    SEPARATOR, TERM_FREQUENCY_PREFIX,
};

/// One occurrence of a term, kept when the field asks for term vectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermVector {
    pub field: u16,
    pub pos: u64,
    pub start: u64,
    pub end: u64,
    pub array_positions: Vec<u64>,
}

impl TermVector {
    fn encoded_len(&self) -> usize {
        VByteEncoder::encoded_len(self.field as u64)
            + VByteEncoder::encoded_len(self.pos)
            + VByteEncoder::encoded_len(self.start)
            + VByteEncoder::encoded_len(self.end)
            + VByteEncoder::encoded_len(self.array_positions.len() as u64)
            + self.array_positions.iter().map(|&p| VByteEncoder::encoded_len(p)).sum::<usize>()
    }

    fn write<B: BufMut>(&self, buf: &mut B) {
        VByteEncoder::encode_u64(buf, self.field as u64);
        VByteEncoder::encode_u64(buf, self.pos);
        VByteEncoder::encode_u64(buf, self.start);
        VByteEncoder::encode_u64(buf, self.end);
        VByteEncoder::encode_u64(buf, self.array_positions.len() as u64);
        for &p in &self.array_positions {
            VByteEncoder::encode_u64(buf, p);
        }
    }

    fn read(input: &mut &[u8]) -> Result<Self> {
        let field = decode_field_varint(input)?;
        let pos = VByteEncoder::read_u64(input)?;
        let start = VByteEncoder::read_u64(input)?;
        let end = VByteEncoder::read_u64(input)?;
        let count = VByteEncoder::read_u64(input)?;
        let count = check_count(count, input.len(), "array position")?;
        let mut array_positions = Vec::with_capacity(count);
        for _ in 0..count {
            array_positions.push(VByteEncoder::read_u64(input)?);
        }
        Ok(TermVector { field, pos, start, end, array_positions })
    }
}

/// Posting: `term` occurs `freq` times in field `field` of `doc_id`
#[derive(Debug, Clone, PartialEq)]
pub struct TermFrequencyRow {
    pub term: String,
    pub field: u16,
    pub doc_id: String,
    pub freq: u64,
    pub norm: f32,
    pub vectors: Vec<TermVector>,
}

impl TermFrequencyRow {
    pub fn new(
        term: impl Into<String>,
        field: u16,
        doc_id: impl Into<String>,
        freq: u64,
        norm: f32,
        vectors: Vec<TermVector>,
    ) -> Self {
        TermFrequencyRow {
            term: term.into(),
            field,
            doc_id: doc_id.into(),
            freq,
            norm,
            vectors,
        }
    }

    /// Row carrying only the key, used for deletions
    pub fn key_only(term: impl Into<String>, field: u16, doc_id: impl Into<String>) -> Self {
        Self::new(term, field, doc_id, 0, 0.0, Vec::new())
    }

    /// Key of the dictionary counter this posting contributes to
    pub fn dictionary_key(&self) -> Vec<u8> {
        DictionaryRow::new(self.term.as_str(), self.field, 0).key()
    }

    /// Key prefix shared by every posting of (term, field)
    pub fn posting_prefix(term: &str, field: u16) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(term.len() + 5);
        prefix.put_u8(TERM_FREQUENCY_PREFIX);
        prefix.put_slice(term.as_bytes());
        prefix.put_u8(SEPARATOR);
        prefix.put_u16(field);
        prefix.put_u8(SEPARATOR);
        prefix
    }

    pub fn from_kv(key: &[u8], value: &[u8]) -> Result<Self> {
        let mut row = Self::parse_key(key)?;
        row.parse_value(value)?;
        Ok(row)
    }

    pub fn parse_key(key: &[u8]) -> Result<Self> {
        let body = match key.split_first() {
            Some((&TERM_FREQUENCY_PREFIX, body)) => body,
            _ => return Err(Error::corrupt("term frequency key must start with 't'")),
        };
        let sep = body
            .iter()
            .position(|&b| b == SEPARATOR)
            .ok_or_else(|| Error::corrupt("term frequency key missing term separator"))?;
        let term = decode_utf8(&body[..sep], "term")?;

        let rest = &body[sep + 1..];
        if rest.len() < 3 || rest[2] != SEPARATOR {
            return Err(Error::corrupt("term frequency key missing field/doc separator"));
        }
        let field = decode_field_id(&rest[..2])?;
        let doc_id = decode_utf8(&rest[3..], "document id")?;

        Ok(Self::key_only(term, field, doc_id))
    }

    fn parse_value(&mut self, value: &[u8]) -> Result<()> {
        let mut input = value;
        self.freq = VByteEncoder::read_u64(&mut input)?;
        if input.len() < 4 {
            return Err(Error::corrupt("term frequency value missing norm"));
        }
        self.norm = f32::from_bits(u32::from_be_bytes([input[0], input[1], input[2], input[3]]));
        input = &input[4..];

        self.vectors.clear();
        while !input.is_empty() {
            self.vectors.push(TermVector::read(&mut input)?);
        }
        Ok(())
    }
}

impl RowCodec for TermFrequencyRow {
    fn key_size(&self) -> usize {
        1 + self.term.len() + 1 + 2 + 1 + self.doc_id.len()
    }

    fn value_size(&self) -> usize {
        VByteEncoder::encoded_len(self.freq)
            + 4
            + self.vectors.iter().map(TermVector::encoded_len).sum::<usize>()
    }

    fn write_key<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(TERM_FREQUENCY_PREFIX);
        buf.put_slice(self.term.as_bytes());
        buf.put_u8(SEPARATOR);
        buf.put_u16(self.field);
        buf.put_u8(SEPARATOR);
        buf.put_slice(self.doc_id.as_bytes());
    }

    fn write_value<B: BufMut>(&self, buf: &mut B) {
        VByteEncoder::encode_u64(buf, self.freq);
        buf.put_u32(self.norm.to_bits());
        for vector in &self.vectors {
            vector.write(buf);
        }
    }
}
