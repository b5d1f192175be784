//! ## valv-core::alloc::superblock
//! **Superblock control block with reap cursor and deferred-free protocol**
//!
//! One superblock is a contiguous buffer split into a bookkeeping header
//! and a run of fixed-size slots. Allocation bumps a cursor over
//! never-touched slots first and falls back to the free list; release
//! consults the pin table so slots referenced by in-flight hardware
//! transfers are reclaimed later, by the matching unpin, instead of
//! blocking the caller.
//!
//! ### Expectations (Production):
//! - Fast paths never touch the hardware registration subsystem
//! - A fully drained superblock is indistinguishable from a fresh one
//! - Misuse (double release, unmatched unpin, corrupted header) is fatal

use std::mem;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use parking_lot::lock_api::RawMutex as _;
use parking_lot::RawMutex;
use tracing::{debug, trace, warn};

use valv_hardware::{RegionHandle, RegionProvider};

use super::free_list::FreeList;
use super::pin_table::PinTable;
use super::stats::AllocStats;

/// Minimum slot alignment; the header is padded so the slot region starts
/// on this boundary.
pub const ALIGNMENT: usize = 16;

const MAGIC: usize = 0xcafe_d00d;

/// Index of an owning heap in the caller's arena. Never dereferenced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapId(pub u32);

/// Index of a superblock in the owning heap's arena. Never dereferenced
/// here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperblockId(pub u32);

/// Bookkeeping header occupying the head of a superblock buffer.
///
/// The owning heap links superblocks into per-size-class lists through the
/// `owner`/`prev`/`next` fields; this block only stores them. The embedded
/// raw guard serializes the two execution contexts that race on one
/// superblock: application code calling allocate/release and the hardware
/// completion handler calling unpin.
#[repr(C)]
pub struct Superblock {
    /// Validity stamp, derived from the header's own address.
    magic: usize,
    /// Slot size in bytes.
    object_size: usize,
    /// True iff `object_size` is a power of two.
    object_size_is_pow2: bool,
    /// Total slots in the buffer.
    total_objects: u32,
    /// Slots never yet handed out.
    reapable_objects: u32,
    /// Slots currently available through either path.
    objects_free: u32,
    /// Base of the slot region.
    start: NonNull<u8>,
    /// Reap cursor into the slot region.
    position: NonNull<u8>,
    owner: Option<HeapId>,
    prev: Option<SuperblockId>,
    next: Option<SuperblockId>,
    /// Hardware registration of the slot region, if one was obtained.
    region: Option<RegionHandle>,
    pin_table: PinTable,
    free_list: FreeList,
    stats: AllocStats,
    guard: RawMutex,
}

const _: () = assert!(mem::align_of::<Superblock>() <= ALIGNMENT);

impl Superblock {
    /// Bytes occupied by the control block at the head of the buffer,
    /// padded so the slot region begins aligned.
    pub fn header_size() -> usize {
        (mem::size_of::<Self>() + ALIGNMENT - 1) & !(ALIGNMENT - 1)
    }

    /// Total buffer bytes a caller must supply for a superblock with
    /// `buffer_size` bytes of slot capacity.
    pub fn footprint(buffer_size: usize) -> usize {
        Self::header_size() + buffer_size
    }

    /// Constructs a control block in place at the head of `buffer` and
    /// attempts to register the slot region with the given provider.
    ///
    /// The slot region begins at the first aligned address past the header
    /// and holds `buffer_size / object_size` slots. When `provider` is
    /// absent or registration fails, the superblock operates in
    /// software-only mode.
    ///
    /// # Safety
    /// `buffer` must be valid for reads and writes for
    /// [`Self::footprint`]`(buffer_size)` bytes and must not be accessed
    /// through any other path until [`Self::destroy`].
    ///
    /// # Panics
    /// Panics if `buffer` is not [`ALIGNMENT`]-aligned, `object_size` is
    /// below [`ALIGNMENT`], no slot fits the buffer, or `object_size` is
    /// not a multiple of [`ALIGNMENT`] while more than one slot fits.
    pub unsafe fn initialize(
        buffer: NonNull<u8>,
        buffer_size: usize,
        object_size: usize,
        provider: Option<Arc<dyn RegionProvider>>,
    ) -> NonNull<Self> {
        assert_eq!(
            buffer.as_ptr() as usize % ALIGNMENT,
            0,
            "superblock buffer must be {ALIGNMENT}-byte aligned"
        );
        assert!(
            object_size >= ALIGNMENT,
            "object size {object_size} is below the minimum alignment {ALIGNMENT}"
        );
        let total = buffer_size / object_size;
        assert!(
            total >= 1,
            "buffer of {buffer_size} bytes fits no {object_size}-byte slot"
        );
        assert!(
            total == 1 || object_size % ALIGNMENT == 0,
            "object size {object_size} must be a multiple of {ALIGNMENT}"
        );
        assert!(total <= u32::MAX as usize, "slot count exceeds counter width");
        let total = total as u32;

        let header = buffer.cast::<Self>();
        // SAFETY: the caller supplies footprint(buffer_size) bytes, which
        // covers the padded header, so start stays inside the buffer.
        let start = unsafe { buffer.add(Self::header_size()) };

        let region = provider.and_then(|p| match RegionHandle::register(p, start, buffer_size) {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(%err, "hardware registration unavailable, superblock is software-only");
                None
            }
        });
        let registered = region.is_some();

        // SAFETY: header is aligned for Self (ALIGNMENT covers it, checked
        // at compile time above) and the buffer is writable per the
        // caller's contract.
        unsafe {
            header.as_ptr().write(Self {
                magic: MAGIC ^ (header.as_ptr() as usize),
                object_size,
                object_size_is_pow2: object_size.is_power_of_two(),
                total_objects: total,
                reapable_objects: total,
                objects_free: total,
                start,
                position: start,
                owner: None,
                prev: None,
                next: None,
                region,
                pin_table: PinTable::new(),
                free_list: FreeList::with_capacity(total as usize),
                stats: AllocStats::new(),
                guard: RawMutex::INIT,
            });
        }

        debug!(object_size, total_objects = total, registered, "superblock initialized");
        header
    }

    /// Destroys a control block previously returned by
    /// [`Self::initialize`], releasing the free list and the hardware
    /// region handle if one was obtained. The buffer itself belongs to the
    /// caller and is left untouched.
    ///
    /// # Safety
    /// `ptr` must come from [`Self::initialize`] and must not be used
    /// again afterwards.
    pub unsafe fn destroy(ptr: NonNull<Self>) {
        // SAFETY: per the contract above, ptr refers to a live control
        // block that nothing else is using.
        unsafe { ptr::drop_in_place(ptr.as_ptr()) }
    }

    /// Hands out one slot, drawing from the reap cursor first and the
    /// free list second. Returns `None` when both sources are drained and
    /// the caller must obtain another superblock.
    pub fn allocate(&mut self) -> Option<NonNull<u8>> {
        self.check_valid();
        let ptr = self.reap_alloc().or_else(|| self.free_list_alloc())?;
        debug_assert_eq!(ptr.as_ptr() as usize % ALIGNMENT, 0);
        debug_assert_eq!(self.usable_size(ptr), self.object_size);
        Some(ptr)
    }

    /// Releases a previously allocated pointer back to this superblock.
    ///
    /// Interior pointers are normalized to their slot base first. If the
    /// slot is pinned the release is recorded and reclamation is deferred
    /// to the matching [`Self::unpin`]; otherwise the slot returns to the
    /// free list immediately, and a fully drained superblock resets
    /// itself.
    ///
    /// # Panics
    /// Panics if `ptr` lies outside this superblock or the slot is
    /// already free (double release).
    pub fn release(&mut self, ptr: NonNull<u8>) {
        self.check_valid();
        let index = self.slot_index(self.normalize(ptr));
        if self.pin_table.release(index) {
            self.stats.increment_deferred_frees();
            return;
        }
        self.reclaim(index);
    }

    /// Returns the superblock to its pristine reap-ready state: free list
    /// empty, every slot reapable, cursor back at the slot-region start.
    /// Idempotent.
    pub fn clear(&mut self) {
        self.check_valid();
        self.free_list.clear();
        self.objects_free = self.total_objects;
        self.reapable_objects = self.total_objects;
        self.position = self.start;
        self.stats.increment_resets();
        trace!("superblock reset to reap-ready state");
    }

    /// Base address of the slot containing `ptr`.
    ///
    /// # Panics
    /// Panics if `ptr` does not lie inside this superblock's slot region.
    pub fn normalize(&self, ptr: NonNull<u8>) -> NonNull<u8> {
        self.check_valid();
        let remainder = self.slot_remainder(self.offset_of(ptr));
        // SAFETY: remainder is at most the offset, so the result stays
        // inside the slot region.
        unsafe { NonNull::new_unchecked(ptr.as_ptr().sub(remainder)) }
    }

    /// Bytes remaining in `ptr`'s slot, from `ptr` to the slot's end.
    pub fn usable_size(&self, ptr: NonNull<u8>) -> usize {
        self.check_valid();
        self.object_size - self.slot_remainder(self.offset_of(ptr))
    }

    /// Marks the slot containing `ptr` as referenced by an in-flight
    /// hardware transfer, deferring any release until the matching
    /// [`Self::unpin`].
    ///
    /// # Panics
    /// Panics if the pin table is full or the slot is already pinned.
    pub fn pin(&mut self, ptr: NonNull<u8>) {
        self.check_valid();
        let index = self.slot_index(self.normalize(ptr));
        self.pin_table.pin(index);
        self.stats.increment_pins();
    }

    /// Drops the pin for the slot containing `ptr`, completing a deferred
    /// release if one was recorded while the slot was pinned.
    ///
    /// # Panics
    /// Panics if no matching pin exists.
    pub fn unpin(&mut self, ptr: NonNull<u8>) {
        self.check_valid();
        let index = self.slot_index(self.normalize(ptr));
        if self.pin_table.unpin(index) {
            self.reclaim(index);
        }
    }

    /// Acquires this superblock's guard.
    ///
    /// Callers hold the guard across allocate/release/pin/unpin sequences
    /// that must appear atomic, including compound operations that span
    /// this block and its owner's bookkeeping.
    pub fn lock(&self) {
        self.check_valid();
        self.guard.lock();
    }

    /// Releases this superblock's guard.
    ///
    /// # Safety
    /// The guard must be held by the current execution context.
    pub unsafe fn unlock(&self) {
        self.check_valid();
        // SAFETY: forwarded to the caller.
        unsafe { self.guard.unlock() }
    }

    /// Recomputes the validity stamp from this header's address and
    /// compares it against the stored one.
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC ^ (self as *const Self as usize)
    }

    /// Hardware registration of the slot region, if one was obtained at
    /// construction. The transport layer reads the handle's keys to build
    /// zero-copy transfer descriptors.
    pub fn region(&self) -> Option<&RegionHandle> {
        self.check_valid();
        self.region.as_ref()
    }

    pub fn object_size(&self) -> usize {
        self.check_valid();
        self.object_size
    }

    pub fn total_objects(&self) -> u32 {
        self.check_valid();
        self.total_objects
    }

    pub fn objects_free(&self) -> u32 {
        self.check_valid();
        self.objects_free
    }

    pub fn owner(&self) -> Option<HeapId> {
        self.check_valid();
        self.owner
    }

    pub fn set_owner(&mut self, owner: Option<HeapId>) {
        self.check_valid();
        self.owner = owner;
    }

    pub fn next(&self) -> Option<SuperblockId> {
        self.check_valid();
        self.next
    }

    pub fn set_next(&mut self, next: Option<SuperblockId>) {
        self.check_valid();
        self.next = next;
    }

    pub fn prev(&self) -> Option<SuperblockId> {
        self.check_valid();
        self.prev
    }

    pub fn set_prev(&mut self, prev: Option<SuperblockId>) {
        self.check_valid();
        self.prev = prev;
    }

    /// Counters fed by this superblock's operations.
    pub fn stats(&self) -> &AllocStats {
        self.check_valid();
        &self.stats
    }

    fn check_valid(&self) {
        assert!(
            self.is_valid(),
            "superblock control block failed its validity check"
        );
    }

    fn reap_alloc(&mut self) -> Option<NonNull<u8>> {
        if self.reapable_objects == 0 {
            return None;
        }
        let ptr = self.position;
        // SAFETY: reapable_objects > 0, so advancing by one slot stays
        // inside the slot region or lands one past its end.
        self.position = unsafe { ptr.add(self.object_size) };
        self.reapable_objects -= 1;
        self.objects_free -= 1;
        self.stats.increment_reap_allocations();
        Some(ptr)
    }

    fn free_list_alloc(&mut self) -> Option<NonNull<u8>> {
        let index = self.free_list.pop()?;
        self.objects_free -= 1;
        self.stats.increment_free_list_allocations();
        Some(self.slot_ptr(index))
    }

    /// Completes a release: the slot joins the free list, and a fully
    /// drained superblock resets itself.
    fn reclaim(&mut self, index: u32) {
        assert!(
            self.slot_ptr(index).as_ptr() < self.position.as_ptr(),
            "release of slot {index} that was never allocated"
        );
        self.free_list.push(index);
        self.objects_free += 1;
        self.stats.increment_releases();
        if self.objects_free == self.total_objects {
            self.clear();
        }
    }

    fn offset_of(&self, ptr: NonNull<u8>) -> usize {
        let addr = ptr.as_ptr() as usize;
        let start = self.start.as_ptr() as usize;
        assert!(
            addr >= start && addr < start + self.extent(),
            "pointer {ptr:p} does not belong to this superblock"
        );
        addr - start
    }

    // `%` is expensive on the common targets; mask when the size allows it.
    fn slot_remainder(&self, offset: usize) -> usize {
        if self.object_size_is_pow2 {
            offset & (self.object_size - 1)
        } else {
            offset % self.object_size
        }
    }

    fn slot_index(&self, base: NonNull<u8>) -> u32 {
        let offset = base.as_ptr() as usize - self.start.as_ptr() as usize;
        (offset / self.object_size) as u32
    }

    fn slot_ptr(&self, index: u32) -> NonNull<u8> {
        debug_assert!(index < self.total_objects);
        // SAFETY: index is within the slot region.
        unsafe { self.start.add(index as usize * self.object_size) }
    }

    fn extent(&self) -> usize {
        self.total_objects as usize * self.object_size
    }
}

impl Drop for Superblock {
    fn drop(&mut self) {
        self.free_list.clear();
        // A destroyed block must fail any later validity check.
        self.magic = 0;
        debug!(had_region = self.region.is_some(), "superblock destroyed");
    }
}
