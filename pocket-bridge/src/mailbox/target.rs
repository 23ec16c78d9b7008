//! Cart-side mailbox simulation
//!
//! A pure-Rust stand-in for the Lua runtime's frame loop, used to test the
//! protocol end to end without a console. It follows the same contract the
//! runtime template implements: poll the inbox once per frame, read the id
//! before trusting the payload, consume the payload fully before resetting
//! the id to idle, and answer through the register block and the log ring.

use super::{
    BlobKind, EVENT_LOG, HostCommand, INBOX_PAYLOAD, MARKER_TOKEN, OUTBOX_ENTRY_SIZE,
    OUTBOX_SLOTS, REG_FRAME, REG_ORDER, REG_PLAYING, REG_ROW, REG_SFX_MASK, REG_TICK,
};
use crate::console::POCKET_RAM_SIZE;
use crate::emit::reference_decode;
use crate::formats::song_header_schema;
use crate::memmap::{
    MemoryMap, REGION_INBOX, REGION_MARKER, REGION_OUTBOX, REGION_REGS, REGION_SCRATCH_A,
    REGION_SCRATCH_B,
};

/// Simulated cart: RAM window plus the playback state the runtime keeps
#[derive(Debug)]
pub struct CartSim {
    ram: Vec<u8>,
    map: MemoryMap,
    playing: bool,
    tempo: u8,
    speed: u8,
    num_orders: u8,
    order: u8,
    row: u8,
    tick: u8,
    sfx_mask: u8,
    frame: u8,
}

impl CartSim {
    /// Boot a cart: zeroed RAM with the marker token written
    pub fn new(map: &MemoryMap) -> Self {
        let mut sim = Self {
            ram: vec![0u8; POCKET_RAM_SIZE as usize],
            map: map.clone(),
            playing: false,
            tempo: 120,
            speed: 6,
            num_orders: 0,
            order: 0,
            row: 0,
            tick: 0,
            sfx_mask: 0,
            frame: 0,
        };
        let marker = sim.map.region(REGION_MARKER);
        let begin = marker.begin as usize;
        sim.ram[begin..begin + MARKER_TOKEN.len()].copy_from_slice(MARKER_TOKEN);
        sim
    }

    /// The RAM window, for the host to attach to
    pub fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// Run one execution frame: poll the inbox, advance playback, publish
    /// the registers
    pub fn frame(&mut self) {
        self.poll_inbox();
        if self.playing {
            self.advance_playback();
        }
        self.frame = self.frame.wrapping_add(1);
        self.publish_regs();
    }

    fn poll_inbox(&mut self) {
        let inbox = *self.map.region(REGION_INBOX);
        let begin = inbox.begin as usize;

        // Read the id first; only a non-idle id makes the payload trustworthy
        let id = self.ram[begin];
        if id == HostCommand::Nop.id() {
            return;
        }
        let mut payload = [0u8; INBOX_PAYLOAD];
        payload.copy_from_slice(&self.ram[begin + 1..begin + 1 + INBOX_PAYLOAD]);

        match HostCommand::from_id(id) {
            Some(HostCommand::Nop) => {}
            Some(HostCommand::TransmitAndPlay) => {
                self.adopt_blob(&payload);
                self.playing = true;
                self.order = 0;
                self.row = 0;
                self.tick = 0;
            }
            Some(HostCommand::Transmit) => self.adopt_blob(&payload),
            Some(HostCommand::Stop) => self.playing = false,
            Some(HostCommand::Ping) => self.push_log("pong"),
            Some(HostCommand::PlaySfxOn) => {
                let voice = payload[2] % 4;
                self.sfx_mask |= 1 << voice;
            }
            Some(HostCommand::PlaySfxOff) => {
                let voice = payload[0] % 4;
                self.sfx_mask &= !(1 << voice);
            }
            None => self.push_log("bad cmd"),
        }

        // Payload fully consumed above; only now hand the inbox back
        self.ram[begin] = HostCommand::Nop.id();
    }

    fn adopt_blob(&mut self, payload: &[u8; INBOX_PAYLOAD]) {
        let Some(kind) = BlobKind::from_id(payload[0]) else {
            self.push_log("bad blob");
            return;
        };
        match kind {
            BlobKind::Header => {
                let scratch = if payload[1] == 0 {
                    REGION_SCRATCH_A
                } else {
                    REGION_SCRATCH_B
                };
                let region = *self.map.region(scratch);
                let bytes = &self.ram[region.begin as usize..region.end() as usize];
                let header = reference_decode(song_header_schema(), bytes);
                self.tempo = header.get("tempo").unwrap_or(120) as u8;
                self.speed = (header.get("speed").unwrap_or(6).max(1)) as u8;
                self.num_orders = header.get("num_orders").unwrap_or(0) as u8;
                self.push_log("header ok");
            }
            // The runtime decodes banks out of scratch on adoption and
            // reads pattern slots in place; the sim only acknowledges
            BlobKind::Morphs => self.push_log("morphs ok"),
            BlobKind::Gradients => self.push_log("gradients ok"),
            BlobKind::Pattern => self.push_log("pattern ok"),
        }
    }

    fn advance_playback(&mut self) {
        self.tick += 1;
        if self.tick >= self.speed {
            self.tick = 0;
            self.row += 1;
            if self.row >= crate::formats::PATTERN_ROWS as u8 {
                self.row = 0;
                self.order += 1;
                if self.order >= self.num_orders.max(1) {
                    self.order = 0;
                }
            }
        }
    }

    fn publish_regs(&mut self) {
        let regs = *self.map.region(REGION_REGS);
        let begin = regs.begin as usize;
        self.ram[begin + REG_PLAYING] = u8::from(self.playing);
        self.ram[begin + REG_ORDER] = self.order;
        self.ram[begin + REG_ROW] = self.row;
        self.ram[begin + REG_TICK] = self.tick;
        self.ram[begin + REG_SFX_MASK] = self.sfx_mask;
        self.ram[begin + REG_FRAME] = self.frame;
    }

    /// Append a log entry; drops the entry when the ring is full
    pub fn push_log(&mut self, text: &str) {
        let outbox = *self.map.region(REGION_OUTBOX);
        let begin = outbox.begin as usize;
        let write_seq = self.ram[begin];
        let read_seq = self.ram[begin + 1];

        if write_seq.wrapping_sub(read_seq) >= OUTBOX_SLOTS {
            // Ring full: drop the new entry (see module doc)
            return;
        }

        let slot = (write_seq % OUTBOX_SLOTS) as usize;
        let entry = begin + 2 + slot * OUTBOX_ENTRY_SIZE as usize;
        let max_text = OUTBOX_ENTRY_SIZE as usize - 2;
        let bytes = text.as_bytes();
        let len = bytes.len().min(max_text);

        self.ram[entry] = EVENT_LOG;
        self.ram[entry + 1] = len as u8;
        self.ram[entry + 2..entry + 2 + len].copy_from_slice(&bytes[..len]);
        self.ram[entry + 2 + len..entry + 2 + max_text].fill(0);
        // Entry is complete; only now advance the cursor the host reads
        self.ram[begin] = write_seq.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::Bridge;
    use crate::memmap::bridge_map;

    #[test]
    fn test_ping_pong() {
        let map = bridge_map().unwrap();
        let mut sim = CartSim::new(&map);

        let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        bridge.post(HostCommand::Ping, &[]).unwrap();
        drop(bridge);

        sim.frame();

        let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        let entries = bridge.drain_log();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, EVENT_LOG);
        assert_eq!(entries[0].text, "pong");
    }

    #[test]
    fn test_consumed_command_is_not_reexecuted() {
        let map = bridge_map().unwrap();
        let mut sim = CartSim::new(&map);

        let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        bridge.post(HostCommand::Ping, &[]).unwrap();
        drop(bridge);

        // Several frames pass; the command must execute exactly once
        sim.frame();
        sim.frame();
        sim.frame();

        let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        assert!(bridge.inbox_idle());
        assert_eq!(bridge.drain_log().len(), 1);
    }

    #[test]
    fn test_log_ring_drops_newest_when_full() {
        let map = bridge_map().unwrap();
        let mut sim = CartSim::new(&map);

        for i in 0..20 {
            sim.push_log(&format!("entry {i}"));
        }

        let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        let entries = bridge.drain_log();
        // 15 slots: the first 15 survive, entries 15-19 were dropped
        assert_eq!(entries.len(), usize::from(OUTBOX_SLOTS));
        assert_eq!(entries[0].text, "entry 0");
        assert_eq!(entries[14].text, "entry 14");

        // Drained ring accepts new entries again, and a second drain is empty
        assert!(bridge.drain_log().is_empty());
        drop(bridge);
        sim.push_log("after drain");
        let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        assert_eq!(bridge.drain_log()[0].text, "after drain");
    }

    #[test]
    fn test_long_log_text_is_truncated() {
        let map = bridge_map().unwrap();
        let mut sim = CartSim::new(&map);
        sim.push_log("a very long log line that cannot fit in one slot");

        let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        let entries = bridge.drain_log();
        assert_eq!(entries[0].text.len(), OUTBOX_ENTRY_SIZE as usize - 2);
        assert!(entries[0].text.starts_with("a very long"));
    }

    #[test]
    fn test_sfx_commands_update_voice_mask() {
        let map = bridge_map().unwrap();
        let mut sim = CartSim::new(&map);

        let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        bridge
            .post(HostCommand::PlaySfxOn, &[2, 60, 1])
            .unwrap();
        drop(bridge);
        sim.frame();

        let bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        assert_eq!(bridge.status().sfx_mask, 0b0010);
        drop(bridge);

        let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        bridge.post(HostCommand::PlaySfxOff, &[1]).unwrap();
        drop(bridge);
        sim.frame();

        let bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        assert_eq!(bridge.status().sfx_mask, 0);
    }

    #[test]
    fn test_playback_advances_rows() {
        let map = bridge_map().unwrap();
        let mut sim = CartSim::new(&map);

        // Stage a header with speed 2 and start playback
        let header = crate::formats::SongHeader {
            speed: 2,
            num_orders: 2,
            orders: vec![0, 1],
            ..Default::default()
        };
        let blob = header.encode().unwrap();

        let mut bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        bridge
            .stage_blob(BlobKind::Header, crate::mailbox::StageSlot::A, &blob)
            .unwrap();
        bridge
            .transmit(BlobKind::Header, crate::mailbox::StageSlot::A, 0, true)
            .unwrap();
        drop(bridge);

        sim.frame(); // consumes the command, starts playing
        sim.frame();
        sim.frame(); // two played frames at speed 2 -> row 1

        let bridge = Bridge::attach(sim.ram_mut(), &map).unwrap();
        let status = bridge.status();
        assert!(status.playing);
        assert_eq!(status.row, 1);
    }
}
