//! Pocket-Bridge: schema-driven memory bridge for the Emberware Pocket tracker
//!
//! The tracker runs in a browser; the music plays on an Emberware Pocket
//! cart. The two share nothing but the Pocket's 96KB RAM window, so every
//! song structure is packed to the bit on the host and decoded by Lua the
//! host generated. This crate is that bridge: one schema definition drives
//! the packer, the decoder emitter, the input normalizer, and the static
//! memory layout, so the two sides can never disagree about where a bit
//! lives.
//!
//! # Architecture
//!
//! ```text
//!            ┌───────────────────────┐
//!            │   schema (StructDef)  │  single source of truth
//!            └──────────┬────────────┘
//!        ┌──────────┬───┴──────┬────────────┐
//!        ▼          ▼          ▼            ▼
//!    packing    normalize    emit        memmap
//!   (encode)    (clamp)    (Lua text)  (addresses)
//!        │                     │            │
//!        └────────┬────────────┴────────────┘
//!                 ▼
//!          mailbox (runtime protocol over the shared window)
//!                 │
//!                 ▼
//!          cart (.ewp chunk container, assembled by xtask)
//! ```
//!
//! # Modules
//!
//! - [`schema`] - Bit-field codec model, field metadata, normalization
//! - [`packing`] - MSB-first bit packer for records and sequences
//! - [`emit`] - Lua decoder emitter for the cart runtime
//! - [`memmap`] - Static region allocation inside the RAM window
//! - [`mailbox`] - Polling command/event protocol, marker handshake
//! - [`formats`] - The packed song structures (morphs, patterns, gradients)
//! - [`console`] - Emberware Pocket hardware facts
//! - [`cart`] - Chunked cartridge container

pub mod cart;
pub mod console;
pub mod emit;
pub mod formats;
pub mod mailbox;
pub mod memmap;
pub mod packing;
pub mod schema;

// Re-export the codec vocabulary
pub use schema::{Codec, EnumDef, FieldMeta, SchemaError, StructDef, normalize};

// Re-export packing essentials
pub use packing::{PackError, Record, pack_record, pack_seq};

// Re-export the canonical map and its regions
pub use memmap::{LayoutError, MemoryMap, Region, RegionRequest, bridge_map};

// Re-export the host-side protocol surface
pub use mailbox::{Bridge, BlobKind, HostCommand, MailboxError, StageSlot};
