//! Song, order-table, and pattern structures

use std::sync::LazyLock;

use super::{MAX_ORDERS, PATTERN_CHANNELS, PATTERN_ROWS};
use crate::packing::{PackError, Record, pack_record, pack_seq};
use crate::schema::{Codec, EnumDef, StructDef, normalize};

/// Pattern cell effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Effect {
    /// No effect
    #[default]
    None = 0,
    /// Pitch slide up, arg = rate
    SlideUp = 1,
    /// Pitch slide down, arg = rate
    SlideDown = 2,
    /// Vibrato, arg = speed/depth nibbles
    Vibrato = 3,
    /// Arpeggio, arg = two offset nibbles
    Arpeggio = 4,
    /// Volume slide, arg = up/down nibbles
    VolSlide = 5,
    /// Retrigger every arg ticks
    Retrig = 6,
    /// Cut the note after arg ticks
    Cut = 7,
}

impl Effect {
    pub const ALL: [Effect; 8] = [
        Effect::None,
        Effect::SlideUp,
        Effect::SlideDown,
        Effect::Vibrato,
        Effect::Arpeggio,
        Effect::VolSlide,
        Effect::Retrig,
        Effect::Cut,
    ];

    pub fn id(&self) -> i64 {
        *self as i64
    }
}

static CELL_SCHEMA: LazyLock<StructDef> = LazyLock::new(|| {
    let effect = EnumDef::new(
        "effect",
        3,
        &[
            ("none", 0),
            ("slide_up", 1),
            ("slide_down", 2),
            ("vibrato", 3),
            ("arpeggio", 4),
            ("vol_slide", 5),
            ("retrig", 6),
            ("cut", 7),
        ],
    )
    .expect("effect enum is well-formed");

    StructDef::new(
        "cell",
        vec![
            ("note", Codec::uint(7)),
            ("instrument", Codec::uint(5)),
            ("volume", Codec::uint(6)),
            ("effect", Codec::Enum(effect)),
            ("effect_arg", Codec::uint(8)),
        ],
    )
    .expect("cell schema is well-formed")
});

static SONG_HEADER_SCHEMA: LazyLock<StructDef> = LazyLock::new(|| {
    StructDef::new(
        "song_header",
        vec![
            ("tempo", Codec::uint(8)),
            ("speed", Codec::uint(5)),
            ("num_orders", Codec::uint(7)),
            ("loop_order", Codec::uint(7)),
            ("num_morphs", Codec::uint(6)),
            ("num_gradients", Codec::uint(5)),
            ("stereo", Codec::boolean()),
        ],
    )
    .expect("song header schema is well-formed")
});

static ORDER_SCHEMA: LazyLock<StructDef> = LazyLock::new(|| {
    StructDef::new("order", vec![("pattern", Codec::uint(7))])
        .expect("order schema is well-formed")
});

pub(super) fn cell_schema() -> &'static StructDef {
    &CELL_SCHEMA
}

pub(super) fn song_header_schema() -> &'static StructDef {
    &SONG_HEADER_SCHEMA
}

pub(super) fn order_schema() -> &'static StructDef {
    &ORDER_SCHEMA
}

// =============================================================================
// Pattern data
// =============================================================================

/// Single cell in a pattern (29 bits packed)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternCell {
    /// Note value (0 = none, 1-120 = C-0 to B-9, 126 = cut, 127 = off)
    pub note: u8,
    /// Instrument number (1-based, 0 = none)
    pub instrument: u8,
    /// Volume (0-63)
    pub volume: u8,
    /// Effect
    pub effect: Effect,
    /// Effect argument
    pub effect_arg: u8,
}

impl PatternCell {
    pub const NOTE_NONE: u8 = 0;
    pub const NOTE_CUT: u8 = 126;
    pub const NOTE_OFF: u8 = 127;
    pub const NOTE_MAX: u8 = 120;

    /// Check if this has a playable note
    pub fn has_note(&self) -> bool {
        self.note > 0 && self.note <= Self::NOTE_MAX
    }

    /// Check if this is a note-cut
    pub fn is_note_cut(&self) -> bool {
        self.note == Self::NOTE_CUT
    }

    /// Check if this is a note-off
    pub fn is_note_off(&self) -> bool {
        self.note == Self::NOTE_OFF
    }

    /// Check if there's an effect
    pub fn has_effect(&self) -> bool {
        !matches!(self.effect, Effect::None)
    }

    /// Convert to a schema record
    pub fn to_record(&self) -> Record {
        Record::from_pairs(&[
            ("note", i64::from(self.note)),
            ("instrument", i64::from(self.instrument)),
            ("volume", i64::from(self.volume)),
            ("effect", self.effect.id()),
            ("effect_arg", i64::from(self.effect_arg)),
        ])
    }
}

/// One pattern: 64 rows x 4 channels, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    cells: Vec<PatternCell>,
}

impl Default for Pattern {
    fn default() -> Self {
        Self::empty()
    }
}

impl Pattern {
    /// Create an empty pattern
    pub fn empty() -> Self {
        Self {
            cells: vec![PatternCell::default(); (PATTERN_ROWS * PATTERN_CHANNELS) as usize],
        }
    }

    /// Cell at `(row, channel)`
    pub fn get(&self, row: u32, channel: u32) -> Option<&PatternCell> {
        if row >= PATTERN_ROWS || channel >= PATTERN_CHANNELS {
            return None;
        }
        self.cells.get((row * PATTERN_CHANNELS + channel) as usize)
    }

    /// Mutable cell at `(row, channel)`
    pub fn get_mut(&mut self, row: u32, channel: u32) -> Option<&mut PatternCell> {
        if row >= PATTERN_ROWS || channel >= PATTERN_CHANNELS {
            return None;
        }
        self.cells
            .get_mut((row * PATTERN_CHANNELS + channel) as usize)
    }

    /// Cells in row-major order (the packing order)
    pub fn cells(&self) -> &[PatternCell] {
        &self.cells
    }

    /// Pack the pattern into one slot-sized buffer
    pub fn encode(&self) -> Result<Vec<u8>, PackError> {
        let def = cell_schema();
        let records: Vec<Record> = self
            .cells
            .iter()
            .map(|c| normalize(def, &c.to_record()))
            .collect();
        pack_seq(def, &records)
    }
}

// =============================================================================
// Song header
// =============================================================================

/// Song-level playback parameters (39 bits packed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongHeader {
    /// Tempo in BPM (32-255)
    pub tempo: u8,
    /// Ticks per row (1-31)
    pub speed: u8,
    /// Entries used in the order table (0-127)
    pub num_orders: u8,
    /// Order index to loop back to at song end (0-127)
    pub loop_order: u8,
    /// Morph entries in the instrument bank (0-32)
    pub num_morphs: u8,
    /// Gradients in the gradient bank (0-16)
    pub num_gradients: u8,
    /// Stereo output (false = mono)
    pub stereo: bool,
    /// Pattern index per order position
    pub orders: Vec<u8>,
}

impl Default for SongHeader {
    fn default() -> Self {
        Self {
            tempo: 120,
            speed: 6,
            num_orders: 0,
            loop_order: 0,
            num_morphs: 0,
            num_gradients: 0,
            stereo: false,
            orders: Vec::new(),
        }
    }
}

impl SongHeader {
    /// Convert the header fields to a schema record (orders excluded)
    pub fn to_record(&self) -> Record {
        Record::from_pairs(&[
            ("tempo", i64::from(self.tempo)),
            ("speed", i64::from(self.speed)),
            ("num_orders", i64::from(self.num_orders)),
            ("loop_order", i64::from(self.loop_order)),
            ("num_morphs", i64::from(self.num_morphs)),
            ("num_gradients", i64::from(self.num_gradients)),
            ("stereo", i64::from(self.stereo)),
        ])
    }

    /// Pack the header blob: header bytes, then the full order table as a
    /// bit-strided sequence starting at the next byte boundary.
    ///
    /// The order table is always packed at its maximum length so the blob
    /// size (and with it the scratch region size) never depends on song
    /// content; unused entries are zero.
    pub fn encode(&self) -> Result<Vec<u8>, PackError> {
        let def = song_header_schema();
        let mut bytes = pack_record(def, &normalize(def, &self.to_record()))?;

        let order_def = order_schema();
        let mut records = Vec::with_capacity(MAX_ORDERS as usize);
        for i in 0..MAX_ORDERS as usize {
            let pattern = i64::from(self.orders.get(i).copied().unwrap_or(0));
            records.push(normalize(
                order_def,
                &Record::from_pairs(&[("pattern", pattern)]),
            ));
        }
        bytes.extend(pack_seq(order_def, &records)?);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::{reference_decode, reference_decode_at};
    use crate::formats::header_blob_bytes;

    #[test]
    fn test_cell_helpers() {
        let cell = PatternCell {
            note: 49, // C-4
            instrument: 1,
            volume: 32,
            effect: Effect::None,
            effect_arg: 0,
        };
        assert!(cell.has_note());
        assert!(!cell.is_note_off());
        assert!(!cell.has_effect());

        let off = PatternCell {
            note: PatternCell::NOTE_OFF,
            ..Default::default()
        };
        assert!(off.is_note_off());
        assert!(!off.has_note());
    }

    #[test]
    fn test_pattern_indexing() {
        let mut pattern = Pattern::empty();
        pattern.get_mut(10, 2).unwrap().note = 61;
        assert_eq!(pattern.get(10, 2).unwrap().note, 61);
        assert!(pattern.get(64, 0).is_none());
        assert!(pattern.get(0, 4).is_none());
    }

    #[test]
    fn test_pattern_encodes_to_slot_size() {
        let pattern = Pattern::empty();
        let bytes = pattern.encode().unwrap();
        assert_eq!(bytes.len() as u32, crate::formats::pattern_bytes());
    }

    #[test]
    fn test_pattern_cell_roundtrip() {
        let mut pattern = Pattern::empty();
        *pattern.get_mut(63, 3).unwrap() = PatternCell {
            note: 120,
            instrument: 31,
            volume: 63,
            effect: Effect::Cut,
            effect_arg: 0xAB,
        };
        let bytes = pattern.encode().unwrap();

        let index = 63 * PATTERN_CHANNELS + 3;
        let decoded = reference_decode_at(cell_schema(), &bytes, index);
        assert_eq!(decoded.get("note"), Some(120));
        assert_eq!(decoded.get("instrument"), Some(31));
        assert_eq!(decoded.get("effect"), Some(7));
        assert_eq!(decoded.get("effect_arg"), Some(0xAB));

        // An untouched cell decodes as all zeros
        let decoded = reference_decode_at(cell_schema(), &bytes, 0);
        assert_eq!(decoded.get("note"), Some(0));
        assert_eq!(decoded.get("effect"), Some(0));
    }

    #[test]
    fn test_header_blob_layout() {
        let header = SongHeader {
            tempo: 140,
            speed: 4,
            num_orders: 3,
            loop_order: 1,
            num_morphs: 8,
            num_gradients: 2,
            stereo: true,
            orders: vec![5, 0, 9],
        };
        let bytes = header.encode().unwrap();
        assert_eq!(bytes.len() as u32, header_blob_bytes());

        let decoded = reference_decode(song_header_schema(), &bytes);
        assert_eq!(decoded, header.to_record());

        // Orders start at the byte boundary after the 5-byte header
        let orders = &bytes[song_header_schema().byte_size() as usize..];
        assert_eq!(
            reference_decode_at(order_schema(), orders, 0).get("pattern"),
            Some(5)
        );
        assert_eq!(
            reference_decode_at(order_schema(), orders, 2).get("pattern"),
            Some(9)
        );
        // Unused entries are zero
        assert_eq!(
            reference_decode_at(order_schema(), orders, 100).get("pattern"),
            Some(0)
        );
    }
}
