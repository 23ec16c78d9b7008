//! Shared-memory mailbox protocol
//!
//! The host and the running cart communicate exclusively through the
//! bridge regions of the Pocket's RAM window: a polling, shared-memory
//! channel with no delivery guarantees. There is no preemption on either
//! side, so correctness is about ordering, not locking:
//!
//! - The host writes a command's payload bytes **before** the command id;
//!   the id byte is the readiness flag the cart polls.
//! - The cart consumes the payload fully **before** resetting the id to
//!   idle, so the host can never overwrite bytes still being read.
//! - Commands are fire-and-forget: no acks, no retries. The host observes
//!   effects by polling the register block and draining the log ring.
//!
//! # Handshake
//!
//! The cart writes the 8-byte [`MARKER_TOKEN`] at boot. [`Bridge::attach`]
//! verifies it and only hands out a write-capable handle on success; if
//! the marker is absent or wrong the memory layout on the other side is
//! unknown and nothing may be written. Attach can be retried later (the
//! cart may simply not have finished loading).
//!
//! # Log ring
//!
//! The outbox is a bounded ring of fixed-size entries. When the ring is
//! full the writer **drops the new entry**: each cursor then has exactly
//! one writer (cart owns the write cursor, host owns the read cursor),
//! which a drop-oldest policy would break.

pub mod target;

use thiserror::Error;

use crate::memmap::{
    self, MemoryMap, REGION_INBOX, REGION_MARKER, REGION_OUTBOX, REGION_PATTERN_A,
    REGION_PATTERN_B, REGION_REGS, REGION_SCRATCH_A, REGION_SCRATCH_B,
};

/// Mailbox error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailboxError {
    /// Marker token absent or unexpected: incompatible or not-yet-loaded
    /// target; no region may be written
    #[error("marker mismatch: found {found:02X?}, target incompatible or not loaded")]
    MarkerMismatch { found: Vec<u8> },
    /// RAM slice shorter than the allocated window
    #[error("RAM window too small: {got} bytes, need {need}")]
    RamTooSmall { need: usize, got: usize },
    /// A previously posted command has not been consumed yet
    #[error("inbox busy: command {pending} not yet consumed")]
    InboxBusy { pending: u8 },
    /// Command payload exceeds the inbox payload area
    #[error("payload of {got} bytes exceeds the {max}-byte inbox payload")]
    PayloadTooLarge { got: usize, max: usize },
    /// Blob larger than its staging region
    #[error("blob of {got} bytes exceeds region '{region}' ({max} bytes)")]
    BlobTooLarge {
        region: &'static str,
        got: usize,
        max: usize,
    },
}

// =============================================================================
// Wire contract
// =============================================================================

/// Marker token the cart writes at boot (ASCII, version-suffixed)
pub const MARKER_TOKEN: &[u8; 8] = b"EWPKT001";

/// Register block size in bytes
pub const REGS_SIZE: u32 = 16;
/// Inbox size: 1 command id byte + payload
pub const INBOX_SIZE: u32 = 8;
/// Inbox payload bytes following the command id
pub const INBOX_PAYLOAD: usize = (INBOX_SIZE - 1) as usize;

/// Log ring entry slots
pub const OUTBOX_SLOTS: u8 = 15;
/// Bytes per log entry: event id, text length, text
pub const OUTBOX_ENTRY_SIZE: u32 = 16;
/// Outbox size: write cursor, read cursor, entry slots
pub const OUTBOX_SIZE: u32 = 2 + OUTBOX_SLOTS as u32 * OUTBOX_ENTRY_SIZE;

/// Target→host event id: log entry
pub const EVENT_LOG: u8 = 1;

/// Register block offsets
pub const REG_PLAYING: usize = 0;
pub const REG_ORDER: usize = 1;
pub const REG_ROW: usize = 2;
pub const REG_TICK: usize = 3;
pub const REG_SFX_MASK: usize = 4;
pub const REG_FRAME: usize = 5;

/// Host→target command ids.
///
/// These values are the wire contract and must never be renumbered; id 5
/// is reserved and intentionally has no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HostCommand {
    /// No command pending (doubles as the inbox idle state)
    Nop = 0,
    /// Stage is complete: adopt the transmitted data and start playback
    TransmitAndPlay = 1,
    /// Stop playback
    Stop = 2,
    /// Liveness probe; the cart answers with a log entry
    Ping = 3,
    /// Adopt transmitted data without starting playback
    Transmit = 4,
    /// Start a one-shot sound effect (payload: gradient, note, voice)
    PlaySfxOn = 6,
    /// Stop a one-shot sound effect (payload: voice)
    PlaySfxOff = 7,
}

impl HostCommand {
    pub const ALL: [HostCommand; 7] = [
        HostCommand::Nop,
        HostCommand::TransmitAndPlay,
        HostCommand::Stop,
        HostCommand::Ping,
        HostCommand::Transmit,
        HostCommand::PlaySfxOn,
        HostCommand::PlaySfxOff,
    ];

    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// Parse a command id; `None` for unknown or reserved ids (5)
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }

    /// SCREAMING_CASE name for emitted constants
    pub fn const_name(&self) -> &'static str {
        match self {
            HostCommand::Nop => "NOP",
            HostCommand::TransmitAndPlay => "TRANSMIT_AND_PLAY",
            HostCommand::Stop => "STOP",
            HostCommand::Ping => "PING",
            HostCommand::Transmit => "TRANSMIT",
            HostCommand::PlaySfxOn => "PLAY_SFX_ON",
            HostCommand::PlaySfxOff => "PLAY_SFX_OFF",
        }
    }
}

/// Kind of blob staged in a transmit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlobKind {
    /// Song header + order table (scratch slot)
    Header = 0,
    /// Morph instrument bank (scratch slot)
    Morphs = 1,
    /// Waveform gradient bank (scratch slot)
    Gradients = 2,
    /// One pattern (pattern slot)
    Pattern = 3,
}

impl BlobKind {
    pub const ALL: [BlobKind; 4] = [
        BlobKind::Header,
        BlobKind::Morphs,
        BlobKind::Gradients,
        BlobKind::Pattern,
    ];

    pub fn id(&self) -> u8 {
        *self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    pub fn const_name(&self) -> &'static str {
        match self {
            BlobKind::Header => "HEADER",
            BlobKind::Morphs => "MORPHS",
            BlobKind::Gradients => "GRADIENTS",
            BlobKind::Pattern => "PATTERN",
        }
    }
}

/// Staging slot of a double-buffered region pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StageSlot {
    A = 0,
    B = 1,
}

impl StageSlot {
    pub fn id(&self) -> u8 {
        *self as u8
    }
}

/// One drained log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Event id (currently always [`EVENT_LOG`])
    pub event: u8,
    /// Entry text (truncated by the writer to fit the slot)
    pub text: String,
}

/// Playback status read from the register block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStatus {
    pub playing: bool,
    pub order: u8,
    pub row: u8,
    pub tick: u8,
    pub sfx_mask: u8,
    pub frame: u8,
}

// =============================================================================
// Host-side bridge handle
// =============================================================================

/// Write-capable view of a verified target's RAM window.
///
/// Constructed only by [`Bridge::attach`], which checks the marker first;
/// holding a `Bridge` is proof the handshake succeeded, so no code path
/// can write into an unverified window.
#[derive(Debug)]
pub struct Bridge<'a> {
    ram: &'a mut [u8],
    map: &'a MemoryMap,
}

impl<'a> Bridge<'a> {
    /// Verify the marker and attach to a target RAM window
    pub fn attach(ram: &'a mut [u8], map: &'a MemoryMap) -> Result<Self, MailboxError> {
        let window = map
            .regions()
            .iter()
            .map(memmap::Region::end)
            .max()
            .unwrap_or(0) as usize;
        if ram.len() < window {
            return Err(MailboxError::RamTooSmall {
                need: window,
                got: ram.len(),
            });
        }

        let marker = map.region(REGION_MARKER);
        let found = &ram[marker.begin as usize..marker.end() as usize];
        if found != MARKER_TOKEN {
            log::warn!("marker mismatch, target incompatible or not loaded");
            return Err(MailboxError::MarkerMismatch {
                found: found.to_vec(),
            });
        }

        log::debug!("attached to target (marker ok)");
        Ok(Self { ram, map })
    }

    fn region(&self, name: &'static str) -> (usize, usize) {
        let region = self.map.region(name);
        (region.begin as usize, region.end() as usize)
    }

    /// Check whether the previous command has been consumed
    pub fn inbox_idle(&self) -> bool {
        let (begin, _) = self.region(REGION_INBOX);
        self.ram[begin] == HostCommand::Nop.id()
    }

    /// Post a command: payload bytes first, id byte last.
    ///
    /// The write order is the protocol: the id is the readiness flag, so
    /// the cart can never observe a partially-written payload. Fails if
    /// the previous command is still pending, since overwriting it would race
    /// the cart's payload read.
    pub fn post(&mut self, cmd: HostCommand, payload: &[u8]) -> Result<(), MailboxError> {
        if payload.len() > INBOX_PAYLOAD {
            return Err(MailboxError::PayloadTooLarge {
                got: payload.len(),
                max: INBOX_PAYLOAD,
            });
        }
        let (begin, end) = self.region(REGION_INBOX);
        if self.ram[begin] != HostCommand::Nop.id() {
            return Err(MailboxError::InboxBusy {
                pending: self.ram[begin],
            });
        }

        let payload_area = &mut self.ram[begin + 1..end];
        payload_area.fill(0);
        payload_area[..payload.len()].copy_from_slice(payload);
        // Payload is fully in place; only now raise the flag
        self.ram[begin] = cmd.id();
        log::debug!("posted {:?} ({} payload bytes)", cmd, payload.len());
        Ok(())
    }

    /// Copy a packed blob into its staging region
    pub fn stage_blob(
        &mut self,
        kind: BlobKind,
        slot: StageSlot,
        bytes: &[u8],
    ) -> Result<(), MailboxError> {
        let name = match (kind, slot) {
            (BlobKind::Pattern, StageSlot::A) => REGION_PATTERN_A,
            (BlobKind::Pattern, StageSlot::B) => REGION_PATTERN_B,
            (_, StageSlot::A) => REGION_SCRATCH_A,
            (_, StageSlot::B) => REGION_SCRATCH_B,
        };
        let (begin, end) = self.region(name);
        if bytes.len() > end - begin {
            return Err(MailboxError::BlobTooLarge {
                region: name,
                got: bytes.len(),
                max: end - begin,
            });
        }
        self.ram[begin..begin + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Post a transmit for a previously staged blob
    ///
    /// `dest` is the blob's destination index on the cart side (pattern
    /// slot number for patterns, ignored for banks).
    pub fn transmit(
        &mut self,
        kind: BlobKind,
        slot: StageSlot,
        dest: u8,
        play: bool,
    ) -> Result<(), MailboxError> {
        let cmd = if play {
            HostCommand::TransmitAndPlay
        } else {
            HostCommand::Transmit
        };
        self.post(cmd, &[kind.id(), slot.id(), dest])
    }

    /// Drain the log ring, advancing the read cursor
    pub fn drain_log(&mut self) -> Vec<LogEntry> {
        let (begin, _) = self.region(REGION_OUTBOX);
        let write_seq = self.ram[begin];
        let mut read_seq = self.ram[begin + 1];

        let mut entries = Vec::new();
        while read_seq != write_seq {
            let slot = (read_seq % OUTBOX_SLOTS) as usize;
            let entry = begin + 2 + slot * OUTBOX_ENTRY_SIZE as usize;
            let event = self.ram[entry];
            let len = (self.ram[entry + 1] as usize).min(OUTBOX_ENTRY_SIZE as usize - 2);
            let text = String::from_utf8_lossy(&self.ram[entry + 2..entry + 2 + len]).into_owned();
            entries.push(LogEntry { event, text });
            read_seq = read_seq.wrapping_add(1);
        }

        self.ram[begin + 1] = read_seq;
        if !entries.is_empty() {
            log::debug!("drained {} log entries", entries.len());
        }
        entries
    }

    /// Read the playback status registers
    pub fn status(&self) -> PlaybackStatus {
        let (begin, _) = self.region(REGION_REGS);
        let regs = &self.ram[begin..];
        PlaybackStatus {
            playing: regs[REG_PLAYING] != 0,
            order: regs[REG_ORDER],
            row: regs[REG_ROW],
            tick: regs[REG_TICK],
            sfx_mask: regs[REG_SFX_MASK],
            frame: regs[REG_FRAME],
        }
    }
}
