use bytes::BufMut;
use crate::core::error::{Error, Result};

/// Variable byte encoding for unsigned integers (7 bits per byte, low group first)
pub struct VByteEncoder;

impl VByteEncoder {
    /// Number of bytes `encode_u64` will write for `value`
    pub fn encoded_len(mut value: u64) -> usize {
        let mut len = 1;
        while value >= 128 {
            value >>= 7;
            len += 1;
        }
        len
    }

    /// Values < 128 use 1 byte, < 16384 use 2 bytes, etc.
    pub fn encode_u64<B: BufMut>(output: &mut B, mut value: u64) {
        while value >= 128 {
            output.put_u8((value & 127) as u8 | 128);  // Set continuation bit
            value >>= 7;
        }
        output.put_u8(value as u8);  // Last byte without continuation bit
    }

    /// Decode single u64 value, returns (value, bytes_consumed)
    pub fn decode_u64(input: &[u8]) -> Result<(u64, usize)> {
        let mut value = 0u64;
        let mut shift = 0;
        let mut consumed = 0;

        for &byte in input {
            consumed += 1;
            if shift == 63 && byte > 1 {
                return Err(Error::corrupt("varint overflows u64"));
            }
            value |= ((byte & 127) as u64) << shift;

            if byte & 128 == 0 {  // No continuation bit
                return Ok((value, consumed));
            }

            shift += 7;
            if shift > 63 {  // Max 10 bytes for u64
                return Err(Error::corrupt("varint overflows u64"));
            }
        }

        Err(Error::corrupt("truncated varint"))
    }

    /// Decode a value and advance `input` past it
    pub fn read_u64(input: &mut &[u8]) -> Result<u64> {
        let (value, consumed) = Self::decode_u64(input)?;
        *input = &input[consumed..];
        Ok(value)
    }
}
