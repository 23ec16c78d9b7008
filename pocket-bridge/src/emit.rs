//! Cross-runtime decoder emission
//!
//! The Pocket cart runtime cannot run host code, so for every packed
//! structure we emit a Lua decode function that reconstructs the fields
//! from a base RAM address. The emitted logic must agree with
//! [`crate::packing`] on every bit offset; both sides derive their offsets
//! from the same schema walk ([`field_spans`]), never independently.
//!
//! This module owns the layout arithmetic and a Rust execution of it
//! ([`reference_decode`] / [`reference_decode_at`]) that mirrors the emitted
//! Lua expression-for-expression. Tests pack known values and run the
//! reference against the packed bytes to prove the emitted decoders recover
//! them exactly. The Lua text itself lives in [`lua`].

pub mod lua;

use thiserror::Error;

use crate::packing::Record;
use crate::schema::{Codec, StructDef};

/// Decoder emission error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    /// Formatting into the output buffer failed
    #[error("failed to format generated source")]
    Fmt,
}

impl From<std::fmt::Error> for EmitError {
    fn from(_: std::fmt::Error) -> Self {
        EmitError::Fmt
    }
}

/// Emission configuration for one decode function
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Name of the emitted Lua function
    pub function_name: String,
    /// Name of the base-address argument
    pub base_arg: String,
    /// Document each field's byte/bit range in a comment (cosmetic only;
    /// never changes decode behavior)
    pub layout_comments: bool,
}

impl EmitOptions {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            base_arg: "base".to_string(),
            layout_comments: true,
        }
    }
}

// =============================================================================
// Field spans
// =============================================================================

/// Resolved location of one field inside a packed structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpan {
    pub name: String,
    pub codec: Codec,
    /// Offset of the field's first bit from the structure start
    pub bit_offset: u32,
    /// Field width in bits
    pub bits: u8,
}

impl FieldSpan {
    /// Index of the first byte the field touches
    pub fn first_byte(&self) -> u32 {
        self.bit_offset / 8
    }

    /// Index of the last byte the field touches
    pub fn last_byte(&self) -> u32 {
        (self.bit_offset + u32::from(self.bits) - 1) / 8
    }

    /// Bits to shift the byte window right by to align the field's LSB
    pub fn shift(&self) -> u32 {
        let window_bits = (self.last_byte() - self.first_byte() + 1) * 8;
        window_bits - (self.bit_offset - self.first_byte() * 8) - u32::from(self.bits)
    }

    /// Mask for the field's value bits
    pub fn mask(&self) -> u64 {
        (1u64 << self.bits) - 1
    }
}

/// Compute the span of every (flattened) field, in schema order
///
/// This is the running MSB-first bit cursor the packer uses, made explicit.
pub fn field_spans(def: &StructDef) -> Vec<FieldSpan> {
    let mut spans = Vec::new();
    let mut cursor = 0u32;
    for (name, codec) in def.flat_fields() {
        let bits = codec.bit_size() as u8;
        spans.push(FieldSpan {
            name,
            codec,
            bit_offset: cursor,
            bits,
        });
        cursor += u32::from(bits);
    }
    spans
}

// =============================================================================
// Reference execution of the emitted arithmetic
// =============================================================================

/// Decode a structure from packed bytes using the emitted decoders' exact
/// arithmetic: big-endian byte window, shift right, mask, sign-extend.
///
/// This is the host-side twin of [`lua::emit_struct_decoder`]'s output and
/// is what the cart simulation uses to consume staged blobs.
pub fn reference_decode(def: &StructDef, bytes: &[u8]) -> Record {
    let mut record = Record::new();
    for span in field_spans(def) {
        // Accumulate the byte window exactly as the unrolled Lua does
        let mut acc = 0u64;
        for byte in span.first_byte()..=span.last_byte() {
            acc = (acc << 8) | u64::from(*bytes.get(byte as usize).unwrap_or(&0));
        }
        let raw = (acc >> span.shift()) & span.mask();
        record.set(&span.name, finish_field(&span.codec, span.bits, raw));
    }
    record
}

/// Decode element `index` of a bit-strided sequence
///
/// Mirrors the emitted indexed decoders, which call the generated `rd`
/// bit-reader helper with `index * stride + field_offset`.
pub fn reference_decode_at(def: &StructDef, bytes: &[u8], index: u32) -> Record {
    let stride = def.bit_size();
    let mut record = Record::new();
    for span in field_spans(def) {
        let raw = read_bits(bytes, index * stride + span.bit_offset, span.bits);
        record.set(&span.name, finish_field(&span.codec, span.bits, raw));
    }
    record
}

/// Read `bits` bits starting at absolute bit offset `offset`, MSB-first
///
/// Chunk-at-a-time loop, the same shape as the emitted Lua `rd` helper.
pub fn read_bits(bytes: &[u8], offset: u32, bits: u8) -> u64 {
    let mut value = 0u64;
    let mut byte = (offset / 8) as usize;
    let mut head = offset % 8;
    let mut done = 0u32;
    while done < u32::from(bits) {
        let take = (8 - head).min(u32::from(bits) - done);
        let current = u64::from(*bytes.get(byte).unwrap_or(&0));
        let chunk = (current >> (8 - head - take)) & ((1u64 << take) - 1);
        value = (value << take) | chunk;
        done += take;
        head = 0;
        byte += 1;
    }
    value
}

/// Sign-extend and finish one raw field value
fn finish_field(codec: &Codec, bits: u8, raw: u64) -> i64 {
    match codec {
        Codec::SInt(_) => {
            let half = 1i64 << (bits - 1);
            let raw = raw as i64;
            if raw >= half { raw - (half << 1) } else { raw }
        }
        _ => raw as i64,
    }
}
