//! Lua decoder generator
//!
//! Emits the decode functions, memory-map constants, and protocol constants
//! that get spliced into the hand-written runtime template (see
//! `runtime/player.lua`). Everything here is text generation over the
//! [`FieldSpan`] tables; the arithmetic it prints is the arithmetic
//! [`super::reference_decode`] executes in Rust.

use std::fmt::Write as FmtWrite;

use super::{EmitError, EmitOptions, FieldSpan, field_spans};
use crate::mailbox;
use crate::memmap::MemoryMap;
use crate::schema::{Codec, StructDef};

/// Short type label for layout comments (`u4`, `i6`, `bool`, `enum fx(3)`)
fn type_label(codec: &Codec) -> String {
    match codec {
        Codec::UInt(n) => format!("u{n}"),
        Codec::SInt(n) => format!("i{n}"),
        Codec::Bool => "bool".to_string(),
        Codec::Enum(e) => format!("enum {}({})", e.name, e.bits),
        Codec::Struct(s) => format!("struct {}", s.name),
    }
}

fn layout_comment(span: &FieldSpan) -> String {
    format!(
        "  -- {}: {}, bits {}-{} (bytes {}-{})",
        span.name,
        type_label(&span.codec),
        span.bit_offset,
        span.bit_offset + u32::from(span.bits) - 1,
        span.first_byte(),
        span.last_byte(),
    )
}

/// Byte-window expression for a span: `peek(base + 0) << 8 | peek(base + 1)`
fn window_expr(span: &FieldSpan, base_arg: &str) -> String {
    let mut expr = String::new();
    for byte in span.first_byte()..=span.last_byte() {
        if !expr.is_empty() {
            expr.push_str(" | ");
        }
        let shift = (span.last_byte() - byte) * 8;
        if shift == 0 {
            let _ = write!(expr, "peek({base_arg} + {byte})");
        } else {
            let _ = write!(expr, "peek({base_arg} + {byte}) << {shift}");
        }
    }
    expr
}

/// Full extraction expression: shifted and masked window
fn field_expr(span: &FieldSpan, base_arg: &str) -> String {
    let window = window_expr(span, base_arg);
    if span.shift() == 0 {
        format!("({window}) & 0x{:X}", span.mask())
    } else {
        format!("(({window}) >> {}) & 0x{:X}", span.shift(), span.mask())
    }
}

/// Append the assignment for one decoded field, sign-extending if needed
fn write_field_assign(
    out: &mut String,
    span: &FieldSpan,
    value_expr: &str,
) -> Result<(), EmitError> {
    if let Codec::SInt(_) = span.codec {
        let half = 1u64 << (span.bits - 1);
        let full = 1u64 << span.bits;
        writeln!(out, "  local v = {value_expr}")?;
        writeln!(out, "  if v >= {half} then v = v - {full} end")?;
        writeln!(out, "  t.{} = v", span.name)?;
    } else {
        writeln!(out, "  t.{} = {value_expr}", span.name)?;
    }
    Ok(())
}

// =============================================================================
// Decoder emission
// =============================================================================

/// Emit a decode function for a structure at a fixed byte address
///
/// The function takes a base RAM address and returns a table keyed by field
/// name. Bit offsets are unrolled into constant shift/mask expressions.
pub fn emit_struct_decoder(def: &StructDef, opts: &EmitOptions) -> Result<String, EmitError> {
    let mut out = String::new();
    let base = &opts.base_arg;

    writeln!(out, "-- Decode one '{}' ({} bytes)", def.name, def.byte_size())?;
    writeln!(out, "function {}({base})", opts.function_name)?;
    writeln!(out, "  local t = {{}}")?;
    for span in field_spans(def) {
        if opts.layout_comments {
            writeln!(out, "{}", layout_comment(&span))?;
        }
        write_field_assign(&mut out, &span, &field_expr(&span, base))?;
    }
    writeln!(out, "  return t")?;
    writeln!(out, "end")?;
    Ok(out)
}

/// Emit a decode function for element `i` of a bit-strided sequence
///
/// The element stride is the structure's bit size, which is generally not
/// byte-aligned, so the emitted function reads through the `rd` bit-reader
/// helper (see [`emit_bit_reader`]) at `i * stride + field_offset`.
pub fn emit_indexed_decoder(def: &StructDef, opts: &EmitOptions) -> Result<String, EmitError> {
    let mut out = String::new();
    let base = &opts.base_arg;
    let stride = def.bit_size();

    writeln!(
        out,
        "-- Decode element i of a '{}' sequence ({} bits per element)",
        def.name, stride
    )?;
    writeln!(out, "function {}({base}, i)", opts.function_name)?;
    writeln!(out, "  local bit0 = i * {stride}")?;
    writeln!(out, "  local t = {{}}")?;
    for span in field_spans(def) {
        if opts.layout_comments {
            writeln!(
                out,
                "  -- {}: {}, element bits {}-{}",
                span.name,
                type_label(&span.codec),
                span.bit_offset,
                span.bit_offset + u32::from(span.bits) - 1,
            )?;
        }
        let expr = format!("rd({base}, bit0 + {}, {})", span.bit_offset, span.bits);
        write_field_assign(&mut out, &span, &expr)?;
    }
    writeln!(out, "  return t")?;
    writeln!(out, "end")?;
    Ok(out)
}

/// Emit the shared MSB-first bit-reader helper used by indexed decoders
pub fn emit_bit_reader() -> String {
    // Same chunk loop as super::read_bits
    concat!(
        "-- Read w bits at absolute bit offset off (from base), MSB-first\n",
        "local function rd(base, off, w)\n",
        "  local v = 0\n",
        "  local b = base + (off >> 3)\n",
        "  local head = off & 7\n",
        "  local done = 0\n",
        "  while done < w do\n",
        "    local take = 8 - head\n",
        "    if take > w - done then take = w - done end\n",
        "    local bits = (peek(b) >> (8 - head - take)) & ((1 << take) - 1)\n",
        "    v = (v << take) | bits\n",
        "    done = done + take\n",
        "    head = 0\n",
        "    b = b + 1\n",
        "  end\n",
        "  return v\n",
        "end\n",
    )
    .to_string()
}

// =============================================================================
// Constant emission
// =============================================================================

/// Emit the memory map as a Lua table
///
/// The numbers here are the same ones the host encoder reads from
/// [`MemoryMap`]; both sides are generated from one allocation pass.
pub fn emit_constants(map: &MemoryMap) -> Result<String, EmitError> {
    let mut out = String::new();
    writeln!(out, "-- Memory map (computed at build time)")?;
    writeln!(out, "BRIDGE = {{")?;
    for region in map.regions() {
        writeln!(
            out,
            "  {} = {{ addr = 0x{:04X}, size = {} }},",
            region.name, region.begin, region.size
        )?;
    }
    writeln!(out, "}}")?;
    Ok(out)
}

/// Emit the mailbox protocol constants (command ids, event ids, blob kinds,
/// marker token, outbox geometry)
pub fn emit_commands() -> Result<String, EmitError> {
    let mut out = String::new();

    writeln!(out, "-- Mailbox protocol (wire contract, never renumber)")?;
    writeln!(
        out,
        "MARKER_TOKEN = \"{}\"",
        String::from_utf8_lossy(mailbox::MARKER_TOKEN)
    )?;

    writeln!(out, "CMD = {{")?;
    for cmd in mailbox::HostCommand::ALL {
        writeln!(out, "  {} = {},", cmd.const_name(), cmd.id())?;
    }
    writeln!(out, "}}")?;

    writeln!(out, "EVT = {{")?;
    writeln!(out, "  LOG = {},", mailbox::EVENT_LOG)?;
    writeln!(out, "}}")?;

    writeln!(out, "BLOB = {{")?;
    for kind in mailbox::BlobKind::ALL {
        writeln!(out, "  {} = {},", kind.const_name(), kind.id())?;
    }
    writeln!(out, "}}")?;

    writeln!(out, "OUTBOX_SLOTS = {}", mailbox::OUTBOX_SLOTS)?;
    writeln!(out, "OUTBOX_ENTRY_SIZE = {}", mailbox::OUTBOX_ENTRY_SIZE)?;
    Ok(out)
}

/// Emit the complete generated section spliced into the runtime template
pub fn generated_section(map: &MemoryMap) -> Result<String, EmitError> {
    use crate::formats;

    let mut out = String::new();
    writeln!(out, "-- GENERATED - DO NOT EDIT")?;
    writeln!(out, "-- Regenerate with: cargo run -p xtask -- gen")?;
    writeln!(out)?;

    out.push_str(&emit_constants(map)?);
    writeln!(out)?;
    out.push_str(&emit_commands()?);
    writeln!(out)?;
    out.push_str(&emit_bit_reader());
    writeln!(out)?;

    out.push_str(&emit_struct_decoder(
        formats::song_header_schema(),
        &EmitOptions::new("read_song_header"),
    )?);
    writeln!(out)?;
    out.push_str(&emit_indexed_decoder(
        formats::order_schema(),
        &EmitOptions::new("read_order"),
    )?);
    writeln!(out)?;
    out.push_str(&emit_indexed_decoder(
        formats::morph_schema(),
        &EmitOptions::new("read_morph"),
    )?);
    writeln!(out)?;
    out.push_str(&emit_indexed_decoder(
        formats::gradient_schema(),
        &EmitOptions::new("read_gradient"),
    )?);
    writeln!(out)?;
    out.push_str(&emit_indexed_decoder(
        formats::cell_schema(),
        &EmitOptions::new("read_cell"),
    )?);

    Ok(out)
}
