//! End-to-end bridge tests
//!
//! Drives the full pipeline the way the tracker host does: build the
//! memory map, encode song data, attach over the shared RAM window, stage
//! and transmit blobs, run cart frames, and read back status and logs.
//! Also cross-checks the two decode arithmetic paths (unrolled spans and
//! the bit-reader loop) against the packer for every declared structure.

use pocket_bridge::emit::{field_spans, reference_decode, reference_decode_at};
use pocket_bridge::formats::{
    self, ArpMode, Curve, Effect, MorphEntry, Pattern, PatternCell, SongHeader, WaveGradient,
};
use pocket_bridge::mailbox::target::CartSim;
use pocket_bridge::schema::normalize;
use pocket_bridge::{
    BlobKind, Bridge, HostCommand, Record, StageSlot, StructDef, bridge_map, pack_record,
};

/// Every structure the bridge declares
fn all_schemas() -> Vec<&'static StructDef> {
    vec![
        formats::morph_schema(),
        formats::gradient_schema(),
        formats::cell_schema(),
        formats::song_header_schema(),
        formats::order_schema(),
    ]
}

/// A ramp record: a distinct in-range value per field
fn ramp_record(def: &StructDef) -> Record {
    let mut record = Record::new();
    for (i, meta) in def.field_meta().iter().enumerate() {
        let value = if meta.is_enum {
            // Every declared enum maps 0
            i64::from(i as u8 % 2)
        } else {
            (meta.min + i as i64 + 1).clamp(meta.min, meta.max)
        };
        record.set(&meta.name, value);
    }
    record
}

#[test]
fn packer_and_both_decode_paths_agree_for_every_schema() {
    for def in all_schemas() {
        let record = normalize(def, &ramp_record(def));
        let bytes = pack_record(def, &record).unwrap();
        assert_eq!(bytes.len() as u32, def.byte_size());

        // Unrolled shift/mask arithmetic (fixed-address decoders)
        assert_eq!(reference_decode(def, &bytes), record, "{}", def.name);
        // Bit-reader loop arithmetic (indexed decoders), element 0
        assert_eq!(reference_decode_at(def, &bytes, 0), record, "{}", def.name);
    }
}

#[test]
fn field_offsets_are_the_running_sum_of_widths() {
    for def in all_schemas() {
        let mut expected = 0u32;
        for span in field_spans(def) {
            assert_eq!(span.bit_offset, expected, "{}.{}", def.name, span.name);
            expected += u32::from(span.bits);
        }
        assert_eq!(expected, def.bit_size());
    }
}

#[test]
fn boundary_values_roundtrip_after_normalization() {
    for def in all_schemas() {
        for meta in def.field_meta() {
            if meta.is_enum {
                continue;
            }
            // One below min and one above max must clamp, then roundtrip
            for raw in [meta.min - 1, meta.min, meta.max, meta.max + 1] {
                let mut record = ramp_record(def);
                record.set(&meta.name, raw);
                let normal = normalize(def, &record);
                let bytes = pack_record(def, &normal).unwrap();
                let decoded = reference_decode(def, &bytes);
                assert_eq!(
                    decoded, normal,
                    "{}.{} with raw value {}",
                    def.name, meta.name, raw
                );
                assert_eq!(
                    decoded.get(&meta.name),
                    Some(raw.clamp(meta.min, meta.max))
                );
            }
        }
    }
}

#[test]
fn full_song_transmission() {
    let map = bridge_map().unwrap();
    let mut sim = CartSim::new(&map);

    // Song: one morph, one gradient, one pattern with a note on row 0
    let morphs = [MorphEntry {
        wave_lo: 2,
        wave_hi: 9,
        morph_rate: 12,
        volume: 48,
        arp_mode: ArpMode::Up,
        ..Default::default()
    }];
    let gradients = [WaveGradient {
        wave_from: 1,
        wave_to: 14,
        steps: 20,
        curve: Curve::EaseOut,
        ..Default::default()
    }];
    let mut pattern = Pattern::empty();
    *pattern.get_mut(0, 0).unwrap() = PatternCell {
        note: 49,
        instrument: 1,
        volume: 63,
        effect: Effect::Arpeggio,
        effect_arg: 0x47,
    };
    let header = SongHeader {
        tempo: 128,
        speed: 3,
        num_orders: 1,
        num_morphs: 1,
        num_gradients: 1,
        orders: vec![0],
        ..Default::default()
    };

    // Stage everything, playing only after the last blob
    {
        let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        bridge
            .stage_blob(
                BlobKind::Morphs,
                StageSlot::A,
                &formats::encode_morph_bank(&morphs).unwrap(),
            )
            .unwrap();
        bridge
            .transmit(BlobKind::Morphs, StageSlot::A, 0, false)
            .unwrap();
    }
    sim.frame();
    {
        let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        bridge
            .stage_blob(
                BlobKind::Gradients,
                StageSlot::B,
                &formats::encode_gradient_bank(&gradients).unwrap(),
            )
            .unwrap();
        bridge
            .transmit(BlobKind::Gradients, StageSlot::B, 0, false)
            .unwrap();
    }
    sim.frame();
    {
        let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        bridge
            .stage_blob(BlobKind::Pattern, StageSlot::A, &pattern.encode().unwrap())
            .unwrap();
        bridge
            .transmit(BlobKind::Pattern, StageSlot::A, 0, false)
            .unwrap();
    }
    sim.frame();
    {
        let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        bridge
            .stage_blob(BlobKind::Header, StageSlot::A, &header.encode().unwrap())
            .unwrap();
        bridge
            .transmit(BlobKind::Header, StageSlot::A, 0, true)
            .unwrap();
    }
    sim.frame();

    // The cart acknowledged every blob through the log ring and is playing
    let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
    let texts: Vec<String> = bridge.drain_log().into_iter().map(|e| e.text).collect();
    assert_eq!(
        texts,
        vec!["morphs ok", "gradients ok", "pattern ok", "header ok"]
    );
    assert!(bridge.status().playing);
    drop(bridge);

    // The staged pattern cell is recoverable from the cart's own RAM via
    // the same arithmetic the generated Lua uses
    let slot = map.region("PATTERN_A");
    let slot_bytes = &sim.ram()[slot.begin as usize..slot.end() as usize];
    let cell = reference_decode_at(formats::cell_schema(), slot_bytes, 0);
    assert_eq!(cell.get("note"), Some(49));
    assert_eq!(cell.get("effect"), Some(Effect::Arpeggio.id()));
    assert_eq!(cell.get("effect_arg"), Some(0x47));

    // Stop ends playback
    let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
    bridge.post(HostCommand::Stop, &[]).unwrap();
    drop(bridge);
    sim.frame();
    let bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
    assert!(!bridge.status().playing);
}
