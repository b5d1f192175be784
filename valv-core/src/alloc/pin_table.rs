//! ## valv-core::alloc::pin_table
//! **Bounded registry of slots under outstanding hardware access**
//!
//! Pinning a slot tells the release path to defer reclamation: instead of
//! waiting for the in-flight transfer, release degrades to a flag update
//! and the matching unpin completes the free later. The table is a small
//! fixed array with linear search; concurrent in-flight operations per
//! superblock are bounded by design.

/// Maximum number of simultaneously pinned slots per superblock.
pub const MAX_PINNED: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PinEntry {
    slot: u32,
    in_use: bool,
}

/// Fixed-capacity pin registry keyed by slot index.
#[derive(Debug)]
pub struct PinTable {
    entries: [Option<PinEntry>; MAX_PINNED],
}

impl PinTable {
    pub fn new() -> Self {
        Self {
            entries: [None; MAX_PINNED],
        }
    }

    /// Registers `slot` with its in-use flag set.
    ///
    /// # Panics
    /// Panics if the table is full, or if `slot` already has an entry.
    pub fn pin(&mut self, slot: u32) {
        assert!(self.find(slot).is_none(), "slot {slot} is already pinned");
        match self.entries.iter_mut().find(|entry| entry.is_none()) {
            Some(entry) => *entry = Some(PinEntry { slot, in_use: true }),
            None => panic!("pin table overflow: {MAX_PINNED} slots already pinned"),
        }
    }

    /// Records a release of `slot` if it is pinned.
    ///
    /// Returns `true` if the slot was pinned: the release is now deferred
    /// and the slot must not be reclaimed until the matching unpin.
    ///
    /// # Panics
    /// Panics if a release was already recorded for `slot`.
    pub fn release(&mut self, slot: u32) -> bool {
        match self.find_mut(slot) {
            Some(entry) => {
                assert!(entry.in_use, "slot {slot} released twice while pinned");
                entry.in_use = false;
                true
            }
            None => false,
        }
    }

    /// Removes the entry for `slot`, freeing its table position.
    ///
    /// Returns `true` if a release was recorded while the slot was pinned,
    /// in which case the caller must reclaim the slot now.
    ///
    /// # Panics
    /// Panics if `slot` has no entry (unpin without a matching pin).
    pub fn unpin(&mut self, slot: u32) -> bool {
        let position = self
            .entries
            .iter()
            .position(|entry| matches!(entry, Some(e) if e.slot == slot));
        match position {
            Some(position) => {
                let deferred = self.entries[position].map(|e| !e.in_use).unwrap_or(false);
                self.entries[position] = None;
                deferred
            }
            None => panic!("unpin of slot {slot} without a matching pin"),
        }
    }

    /// Number of occupied entries.
    pub fn pinned_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    fn find(&self, slot: u32) -> Option<&PinEntry> {
        self.entries
            .iter()
            .filter_map(|entry| entry.as_ref())
            .find(|entry| entry.slot == slot)
    }

    fn find_mut(&mut self, slot: u32) -> Option<&mut PinEntry> {
        self.entries
            .iter_mut()
            .filter_map(|entry| entry.as_mut())
            .find(|entry| entry.slot == slot)
    }
}

impl Default for PinTable {
    fn default() -> Self {
        Self::new()
    }
}
