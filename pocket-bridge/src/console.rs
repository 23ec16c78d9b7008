//! Emberware Pocket console specifications
//!
//! Hardware facts about the Pocket: the 96KB shared RAM window, the regions
//! the console itself owns, and the audio capabilities the tracker targets.
//! The bridge never touches the hardware regions; it packs its own regions
//! into the window immediately after them (see [`crate::memmap`]).

/// Specifications for the Emberware Pocket.
#[derive(Debug, Clone)]
pub struct PocketSpecs {
    /// Console name
    pub name: &'static str,
    /// Total addressable shared RAM in bytes
    pub ram_size: u32,
    /// Cart execution rate in Hz (one inbox poll per frame)
    pub tick_rate: u32,
    /// Audio channels
    pub channels: u8,
    /// Wavetable slots (16 user waveforms)
    pub wave_slots: u8,
}

/// Total addressable shared RAM (96 KB)
pub const POCKET_RAM_SIZE: u32 = 0x18000;

/// Get Emberware Pocket console specifications.
///
/// Handheld sibling of the Emberware line: 4-channel wavetable audio,
/// a Lua cart runtime, and a single 96KB RAM window shared between the
/// host and the running cart. There is no other channel between them.
pub const fn pocket_specs() -> &'static PocketSpecs {
    &PocketSpecs {
        name: "Emberware Pocket",
        ram_size: POCKET_RAM_SIZE,
        tick_rate: 60,
        channels: 4,
        wave_slots: 16,
    }
}

// === Hardware memory regions ===

/// Regions owned by the console itself: `(name, begin, size)`.
///
/// These are fixed by the platform and are listed here only so the
/// allocator can refuse to place bridge regions on top of them. The bridge
/// reads and writes none of them.
pub const HW_REGIONS: &[(&str, u32, u32)] = &[
    ("VRAM", 0x0000, 0x4000),      // framebuffer, 16KB
    ("TILES", 0x4000, 0x2000),     // tile graphics, 8KB
    ("SPRITES", 0x6000, 0x2000),   // sprite sheets, 8KB
    ("MAP", 0x8000, 0x4000),       // tile map, 16KB
    ("GAMEPADS", 0xC000, 0x10),    // input state
    ("AUDIO", 0xC010, 0x70),       // channel registers
    ("WAVETABLE", 0xC080, 0x200),  // 16 waveforms x 32 bytes
];

/// First byte past the hardware regions: where bridge regions may begin.
pub const BRIDGE_BASE: u32 = 0xC280;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hw_regions_are_ordered_and_disjoint() {
        for pair in HW_REGIONS.windows(2) {
            let (_, begin_a, size_a) = pair[0];
            let (_, begin_b, _) = pair[1];
            assert!(begin_a + size_a <= begin_b);
        }
    }

    #[test]
    fn test_bridge_base_follows_hardware() {
        let (_, begin, size) = *HW_REGIONS.last().unwrap();
        assert_eq!(BRIDGE_BASE, begin + size);
        assert!(BRIDGE_BASE < POCKET_RAM_SIZE);
    }
}
