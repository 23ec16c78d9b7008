//! Static memory layout allocation
//!
//! The bridge's regions are allocated once, at build time, into the
//! Pocket's 96KB RAM window: hardware regions first (fixed by the
//! platform), then the bridge's own regions packed contiguously after them
//! in declaration order, plus explicitly-addressed regions (the
//! double-buffered pattern slots at the top of the window). Nothing is
//! ever reallocated at runtime.
//!
//! The computed addresses are the contract between three consumers: the
//! host encoder (where to place packed structures), the emitted Lua
//! decoders (matching base addresses), and the mailbox (where the command
//! regions live). All three read the same [`MemoryMap`], produced by one
//! [`bridge_map`] pass, so identical configuration always yields identical
//! addresses.

use thiserror::Error;

use crate::console;

/// Layout allocation error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A region extends past the end of the usable window
    #[error("region '{name}' ends at 0x{end:05X}, past the 0x{limit:05X} window")]
    Overflow {
        name: &'static str,
        end: u32,
        limit: u32,
    },
    /// Two regions intersect
    #[error("regions '{0}' and '{1}' overlap")]
    Overlap(&'static str, &'static str),
    /// Two regions share a name
    #[error("duplicate region name '{0}'")]
    DuplicateRegion(&'static str),
}

// =============================================================================
// Regions
// =============================================================================

/// One named span of the RAM window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub name: &'static str,
    pub begin: u32,
    pub size: u32,
}

impl Region {
    /// First byte past the region
    pub fn end(&self) -> u32 {
        self.begin + self.size
    }

    fn overlaps(&self, other: &Region) -> bool {
        self.begin < other.end() && other.begin < self.end()
    }
}

/// A request for space in the window
#[derive(Debug, Clone, Copy)]
pub struct RegionRequest {
    pub name: &'static str,
    pub size: u32,
    /// `Some` pins the region to an exact address; `None` lets the
    /// allocator pack it after the previous region
    pub fixed: Option<u32>,
}

impl RegionRequest {
    /// Region packed contiguously in declaration order
    pub fn auto(name: &'static str, size: u32) -> Self {
        Self {
            name,
            size,
            fixed: None,
        }
    }

    /// Region pinned to an exact address (overlap-checked like any other)
    pub fn fixed(name: &'static str, begin: u32, size: u32) -> Self {
        Self {
            name,
            size,
            fixed: Some(begin),
        }
    }
}

// =============================================================================
// Memory map
// =============================================================================

/// Ordered, non-overlapping set of allocated regions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    regions: Vec<Region>,
}

impl MemoryMap {
    /// Compute a map: hardware regions first, then requests.
    ///
    /// Auto requests are packed contiguously in declaration order starting
    /// immediately after the last hardware region; fixed requests go
    /// exactly where they say. Fails if anything overlaps, repeats a name,
    /// or extends past `window_size`.
    pub fn allocate(
        window_size: u32,
        hardware: &[(&'static str, u32, u32)],
        requests: &[RegionRequest],
    ) -> Result<Self, LayoutError> {
        let mut regions: Vec<Region> = hardware
            .iter()
            .map(|&(name, begin, size)| Region { name, begin, size })
            .collect();

        let mut cursor = regions.iter().map(Region::end).max().unwrap_or(0);
        for request in requests {
            let begin = match request.fixed {
                Some(begin) => begin,
                None => {
                    let begin = cursor;
                    cursor += request.size;
                    begin
                }
            };
            regions.push(Region {
                name: request.name,
                begin,
                size: request.size,
            });
        }

        for (i, region) in regions.iter().enumerate() {
            if region.end() > window_size {
                return Err(LayoutError::Overflow {
                    name: region.name,
                    end: region.end(),
                    limit: window_size,
                });
            }
            for other in &regions[i + 1..] {
                if region.name == other.name {
                    return Err(LayoutError::DuplicateRegion(region.name));
                }
                if region.overlaps(other) {
                    return Err(LayoutError::Overlap(region.name, other.name));
                }
            }
        }

        regions.sort_by_key(|r| r.begin);
        log::debug!(
            "allocated {} regions, {} of {} bytes used",
            regions.len(),
            regions.iter().map(|r| r.size).sum::<u32>(),
            window_size,
        );
        Ok(Self { regions })
    }

    /// All regions, ordered by address
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Look up a region by name
    pub fn get(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Region lookup that panics with the region name on a miss.
    ///
    /// Only for the canonical region names below, which [`bridge_map`]
    /// always allocates.
    pub fn region(&self, name: &'static str) -> &Region {
        self.get(name)
            .unwrap_or_else(|| panic!("region '{name}' not allocated"))
    }
}

// =============================================================================
// Canonical bridge map
// =============================================================================

/// Marker region: the 8-byte identification token
pub const REGION_MARKER: &str = "MARKER";
/// Register block: playback status bytes the host polls
pub const REGION_REGS: &str = "REGS";
/// Host-to-target command mailbox
pub const REGION_INBOX: &str = "INBOX";
/// Target-to-host log ring
pub const REGION_OUTBOX: &str = "OUTBOX";
/// Staging scratch, slot A
pub const REGION_SCRATCH_A: &str = "SCRATCH_A";
/// Staging scratch, slot B
pub const REGION_SCRATCH_B: &str = "SCRATCH_B";
/// Double-buffered pattern slot A
pub const REGION_PATTERN_A: &str = "PATTERN_A";
/// Double-buffered pattern slot B
pub const REGION_PATTERN_B: &str = "PATTERN_B";

/// Build the canonical Pocket bridge map.
///
/// Somatic regions are packed after the hardware regions in a fixed
/// declaration order; the two pattern slots are pinned to the top of the
/// window so pattern data never moves when the somatic block grows. The
/// scratch slots are each sized for the single largest staged blob (they
/// are reused serially, never concurrently), not for the sum of all blobs.
pub fn bridge_map() -> Result<MemoryMap, LayoutError> {
    use crate::{formats, mailbox};

    let scratch = formats::max_staged_bytes();
    let pattern = formats::pattern_bytes();
    let top = console::POCKET_RAM_SIZE;

    MemoryMap::allocate(
        console::POCKET_RAM_SIZE,
        console::HW_REGIONS,
        &[
            RegionRequest::auto(REGION_MARKER, mailbox::MARKER_TOKEN.len() as u32),
            RegionRequest::auto(REGION_REGS, mailbox::REGS_SIZE),
            RegionRequest::auto(REGION_INBOX, mailbox::INBOX_SIZE),
            RegionRequest::auto(REGION_OUTBOX, mailbox::OUTBOX_SIZE),
            RegionRequest::auto(REGION_SCRATCH_A, scratch),
            RegionRequest::auto(REGION_SCRATCH_B, scratch),
            RegionRequest::fixed(REGION_PATTERN_A, top - 2 * pattern, pattern),
            RegionRequest::fixed(REGION_PATTERN_B, top - pattern, pattern),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_map_is_valid_and_deterministic() {
        let first = bridge_map().unwrap();
        let second = bridge_map().unwrap();
        assert_eq!(first, second);

        // Somatic block starts right after the hardware regions
        assert_eq!(first.region(REGION_MARKER).begin, console::BRIDGE_BASE);
    }

    #[test]
    fn test_bridge_map_has_no_overlaps() {
        let map = bridge_map().unwrap();
        let regions = map.regions();
        for (i, a) in regions.iter().enumerate() {
            assert!(a.end() <= console::POCKET_RAM_SIZE);
            for b in &regions[i + 1..] {
                assert!(
                    a.end() <= b.begin || b.end() <= a.begin,
                    "{} overlaps {}",
                    a.name,
                    b.name
                );
            }
        }
    }

    #[test]
    fn test_pattern_slots_fill_the_top() {
        let map = bridge_map().unwrap();
        let a = map.region(REGION_PATTERN_A);
        let b = map.region(REGION_PATTERN_B);
        assert_eq!(a.end(), b.begin);
        assert_eq!(b.end(), console::POCKET_RAM_SIZE);
    }

    #[test]
    fn test_overflow_is_rejected() {
        // The documented failure scenario: two 480-byte regions in a
        // 900-byte window
        let result = MemoryMap::allocate(
            900,
            &[],
            &[
                RegionRequest::auto("A", 480),
                RegionRequest::auto("B", 480),
            ],
        );
        assert_eq!(
            result.unwrap_err(),
            LayoutError::Overflow {
                name: "B",
                end: 960,
                limit: 900
            }
        );
    }

    #[test]
    fn test_fixed_overlap_is_rejected() {
        let result = MemoryMap::allocate(
            0x1000,
            &[("HW", 0x0, 0x100)],
            &[
                RegionRequest::auto("A", 0x100),
                RegionRequest::fixed("B", 0x180, 0x100),
            ],
        );
        assert_eq!(result.unwrap_err(), LayoutError::Overlap("A", "B"));
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let result = MemoryMap::allocate(
            0x1000,
            &[],
            &[
                RegionRequest::auto("A", 0x10),
                RegionRequest::auto("A", 0x10),
            ],
        );
        assert_eq!(result.unwrap_err(), LayoutError::DuplicateRegion("A"));
    }

    #[test]
    fn test_exact_fit_is_allowed() {
        let map = MemoryMap::allocate(
            64,
            &[],
            &[
                RegionRequest::auto("A", 32),
                RegionRequest::auto("B", 32),
            ],
        )
        .unwrap();
        assert_eq!(map.region("B").end(), 64);
    }
}
