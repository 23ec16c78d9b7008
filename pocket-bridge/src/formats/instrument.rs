//! Instrument and waveform-gradient structures
//!
//! A Pocket instrument is a wavetable morph: the channel sweeps between two
//! waveform slots at a configurable rate, shaped by an ADSR envelope.
//! Gradients describe standalone wavetable interpolations used by the
//! sound-effect layer.

use std::sync::LazyLock;

use crate::packing::{PackError, Record, pack_seq};
use crate::schema::{Codec, EnumDef, StructDef, normalize};

/// Arpeggio mode for a morph instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ArpMode {
    /// No arpeggio
    #[default]
    Off = 0,
    /// Cycle chord notes upward
    Up = 1,
    /// Cycle chord notes downward
    Down = 2,
    /// Random chord note per tick
    Random = 3,
}

impl ArpMode {
    pub const ALL: [ArpMode; 4] = [ArpMode::Off, ArpMode::Up, ArpMode::Down, ArpMode::Random];

    pub fn id(&self) -> i64 {
        *self as i64
    }
}

/// Interpolation curve for a waveform gradient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Curve {
    #[default]
    Linear = 0,
    EaseIn = 1,
    EaseOut = 2,
    Smooth = 3,
}

impl Curve {
    pub const ALL: [Curve; 4] = [Curve::Linear, Curve::EaseIn, Curve::EaseOut, Curve::Smooth];

    pub fn id(&self) -> i64 {
        *self as i64
    }
}

static MORPH_SCHEMA: LazyLock<StructDef> = LazyLock::new(|| {
    let arp = EnumDef::new(
        "arp_mode",
        2,
        &[("off", 0), ("up", 1), ("down", 2), ("random", 3)],
    )
    .expect("arp_mode enum is well-formed");

    StructDef::new(
        "morph",
        vec![
            ("wave_lo", Codec::uint(4)),
            ("wave_hi", Codec::uint(4)),
            ("morph_rate", Codec::uint(6)),
            ("attack", Codec::uint(4)),
            ("decay", Codec::uint(4)),
            ("sustain", Codec::uint(4)),
            ("release", Codec::uint(4)),
            ("volume", Codec::uint(6)),
            ("detune", Codec::sint(6)),
            ("arp_mode", Codec::Enum(arp)),
            ("glide", Codec::boolean()),
        ],
    )
    .expect("morph schema is well-formed")
});

static GRADIENT_SCHEMA: LazyLock<StructDef> = LazyLock::new(|| {
    let curve = EnumDef::new(
        "curve",
        2,
        &[("linear", 0), ("ease_in", 1), ("ease_out", 2), ("smooth", 3)],
    )
    .expect("curve enum is well-formed");

    StructDef::new(
        "gradient",
        vec![
            ("wave_from", Codec::uint(4)),
            ("wave_to", Codec::uint(4)),
            ("steps", Codec::uint(6)),
            ("curve", Codec::Enum(curve)),
            ("loop_back", Codec::boolean()),
            ("bias", Codec::sint(5)),
        ],
    )
    .expect("gradient schema is well-formed")
});

pub(super) fn morph_schema() -> &'static StructDef {
    &MORPH_SCHEMA
}

pub(super) fn gradient_schema() -> &'static StructDef {
    &GRADIENT_SCHEMA
}

// =============================================================================
// Morph entries
// =============================================================================

/// One instrument: a wavetable morph voice (45 bits packed)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MorphEntry {
    /// Source waveform slot (0-15)
    pub wave_lo: u8,
    /// Target waveform slot (0-15)
    pub wave_hi: u8,
    /// Morph sweep rate (0-63, 0 = hold wave_lo)
    pub morph_rate: u8,
    /// Envelope attack (0-15)
    pub attack: u8,
    /// Envelope decay (0-15)
    pub decay: u8,
    /// Envelope sustain level (0-15)
    pub sustain: u8,
    /// Envelope release (0-15)
    pub release: u8,
    /// Instrument volume (0-63)
    pub volume: u8,
    /// Detune in 1/8 semitones (-32 to +31)
    pub detune: i8,
    /// Arpeggio mode
    pub arp_mode: ArpMode,
    /// Glide from the previous note instead of retriggering
    pub glide: bool,
}

impl Default for MorphEntry {
    fn default() -> Self {
        Self {
            wave_lo: 0,
            wave_hi: 0,
            morph_rate: 0,
            attack: 0,
            decay: 0,
            sustain: 15,
            release: 0,
            volume: 63,
            detune: 0,
            arp_mode: ArpMode::Off,
            glide: false,
        }
    }
}

impl MorphEntry {
    /// Convert to a schema record (field values as plain integers)
    pub fn to_record(&self) -> Record {
        Record::from_pairs(&[
            ("wave_lo", i64::from(self.wave_lo)),
            ("wave_hi", i64::from(self.wave_hi)),
            ("morph_rate", i64::from(self.morph_rate)),
            ("attack", i64::from(self.attack)),
            ("decay", i64::from(self.decay)),
            ("sustain", i64::from(self.sustain)),
            ("release", i64::from(self.release)),
            ("volume", i64::from(self.volume)),
            ("detune", i64::from(self.detune)),
            ("arp_mode", self.arp_mode.id()),
            ("glide", i64::from(self.glide)),
        ])
    }
}

/// Pack a morph bank: bit-strided entries, normalized first
pub fn encode_morph_bank(entries: &[MorphEntry]) -> Result<Vec<u8>, PackError> {
    let def = morph_schema();
    let records: Vec<Record> = entries
        .iter()
        .map(|e| normalize(def, &e.to_record()))
        .collect();
    pack_seq(def, &records)
}

// =============================================================================
// Waveform gradients
// =============================================================================

/// One wavetable interpolation (22 bits packed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaveGradient {
    /// Starting waveform slot (0-15)
    pub wave_from: u8,
    /// Ending waveform slot (0-15)
    pub wave_to: u8,
    /// Interpolation steps (0-63)
    pub steps: u8,
    /// Interpolation curve
    pub curve: Curve,
    /// Sweep back to `wave_from` after reaching `wave_to`
    pub loop_back: bool,
    /// Amplitude bias applied across the sweep (-16 to +15)
    pub bias: i8,
}

impl WaveGradient {
    /// Convert to a schema record
    pub fn to_record(&self) -> Record {
        Record::from_pairs(&[
            ("wave_from", i64::from(self.wave_from)),
            ("wave_to", i64::from(self.wave_to)),
            ("steps", i64::from(self.steps)),
            ("curve", self.curve.id()),
            ("loop_back", i64::from(self.loop_back)),
            ("bias", i64::from(self.bias)),
        ])
    }
}

/// Pack a gradient bank: bit-strided entries, normalized first
pub fn encode_gradient_bank(gradients: &[WaveGradient]) -> Result<Vec<u8>, PackError> {
    let def = gradient_schema();
    let records: Vec<Record> = gradients
        .iter()
        .map(|g| normalize(def, &g.to_record()))
        .collect();
    pack_seq(def, &records)
}
