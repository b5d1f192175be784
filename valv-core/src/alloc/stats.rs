//! ## valv-core::alloc::stats
//! **Allocation statistics**
//!
//! Atomic counters fed by superblock operations. Monitors and completion
//! handlers read these without holding the superblock guard.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-superblock allocation counters.
#[derive(Debug, Default)]
pub struct AllocStats {
    reap_allocations: AtomicU64,
    free_list_allocations: AtomicU64,
    releases: AtomicU64,
    deferred_frees: AtomicU64,
    pins: AtomicU64,
    resets: AtomicU64,
}

impl AllocStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn increment_reap_allocations(&self) {
        self.reap_allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_free_list_allocations(&self) {
        self.free_list_allocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_releases(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_deferred_frees(&self) {
        self.deferred_frees.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_pins(&self) {
        self.pins.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_resets(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Allocations served by the reap cursor.
    pub fn reap_allocations(&self) -> u64 {
        self.reap_allocations.load(Ordering::Relaxed)
    }

    /// Allocations served by the free list.
    pub fn free_list_allocations(&self) -> u64 {
        self.free_list_allocations.load(Ordering::Relaxed)
    }

    /// Completed releases, including deferred ones finished by unpin.
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    /// Releases recorded against a pinned slot.
    pub fn deferred_frees(&self) -> u64 {
        self.deferred_frees.load(Ordering::Relaxed)
    }

    /// Pins registered.
    pub fn pins(&self) -> u64 {
        self.pins.load(Ordering::Relaxed)
    }

    /// Full resets back to the reap-ready state.
    pub fn resets(&self) -> u64 {
        self.resets.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = AllocStats::new();
        assert_eq!(stats.reap_allocations(), 0);
        assert_eq!(stats.free_list_allocations(), 0);
        assert_eq!(stats.releases(), 0);
        assert_eq!(stats.deferred_frees(), 0);
        assert_eq!(stats.pins(), 0);
        assert_eq!(stats.resets(), 0);
    }

    #[test]
    fn counters_accumulate() {
        let stats = AllocStats::new();
        for _ in 0..3 {
            stats.increment_reap_allocations();
            stats.increment_releases();
        }
        stats.increment_deferred_frees();

        assert_eq!(stats.reap_allocations(), 3);
        assert_eq!(stats.releases(), 3);
        assert_eq!(stats.deferred_frees(), 1);
    }
}
