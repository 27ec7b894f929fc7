//! This module provides [`GuestMemory`], the flat 4 GiB byte-addressable guest address space, and
//! the big-endian load/store primitives every emitted function uses to access it.
//!
//! The host is little-endian and the guest is big-endian, so every multi-byte access swaps byte
//! order on transfer. Loads go through a volatile read so the compiler cannot coalesce them across
//! a synchronisation point; there is no bounds checking on this path; the code emitter is
//! responsible for guaranteeing that guest addresses are confined to 32 bits before calling these.
//!
//! MMIO store semantics are currently identical to the plain stores below and rely on `eieio`
//! always preceding them in the guest instruction stream. Likewise, self-modifying guest code is
//! not handled: if encountered, control-flow recovery would need to be rerun or a fallback
//! interpreter introduced, neither of which this crate implements.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// The size of the flat guest address space (4 GiB).
pub const MEMORY_SIZE: u64 = 0x1_0000_0000;

/// The reservation granule PPC's `lwarx`/`stwcx.` operate over. A guest write within another
/// CPU's reservation granule clears that reservation.
pub const RESERVATION_GRANULE: u32 = 128;

/// `PPC_LOAD_U8`, as a free function over a raw `base` pointer — the form every emitted function
/// actually calls, since the trampoline convention (§4.7) hands emitted code `base: *mut u8`
/// rather than a [`GuestMemory`] reference. [`GuestMemory`]'s methods are thin wrappers over these
/// for use from the driver and tests, where an owned region is more convenient than a raw pointer.
///
/// # Safety
/// `base` must point to a live guest address space at least `addr + 1` bytes long, per
/// `PPC_FUNC_PROLOGUE`'s documented invariant that the emitter guarantees guest addresses stay
/// within `[0, 2^32)`.
#[inline]
pub unsafe fn load_u8(base: *const u8, addr: u32) -> u8 {
    std::ptr::read_volatile(base.add(addr as usize))
}

/// `PPC_STORE_U8`.
///
/// # Safety
/// See [`load_u8`].
#[inline]
pub unsafe fn store_u8(base: *mut u8, addr: u32, value: u8) {
    std::ptr::write_volatile(base.add(addr as usize), value)
}

/// `PPC_LOAD_U16`.
///
/// # Safety
/// See [`load_u8`].
#[inline]
pub unsafe fn load_u16(base: *const u8, addr: u32) -> u16 {
    std::ptr::read_volatile(base.add(addr as usize) as *const u16).swap_bytes()
}

/// `PPC_STORE_U16`.
///
/// # Safety
/// See [`load_u8`].
#[inline]
pub unsafe fn store_u16(base: *mut u8, addr: u32, value: u16) {
    std::ptr::write_volatile(base.add(addr as usize) as *mut u16, value.swap_bytes())
}

/// `PPC_LOAD_U32`.
///
/// # Safety
/// See [`load_u8`].
#[inline]
pub unsafe fn load_u32(base: *const u8, addr: u32) -> u32 {
    std::ptr::read_volatile(base.add(addr as usize) as *const u32).swap_bytes()
}

/// `PPC_STORE_U32`.
///
/// # Safety
/// See [`load_u8`].
#[inline]
pub unsafe fn store_u32(base: *mut u8, addr: u32, value: u32) {
    std::ptr::write_volatile(base.add(addr as usize) as *mut u32, value.swap_bytes())
}

/// `PPC_LOAD_U64`.
///
/// # Safety
/// See [`load_u8`].
#[inline]
pub unsafe fn load_u64(base: *const u8, addr: u32) -> u64 {
    std::ptr::read_volatile(base.add(addr as usize) as *const u64).swap_bytes()
}

/// `PPC_STORE_U64`.
///
/// # Safety
/// See [`load_u8`].
#[inline]
pub unsafe fn store_u64(base: *mut u8, addr: u32, value: u64) {
    std::ptr::write_volatile(base.add(addr as usize) as *mut u64, value.swap_bytes())
}

/// The `lwarx` half of a reservation pair, as a free function over a raw `base` pointer — see
/// [`load_u8`] for why emitted code needs the raw-pointer form.
///
/// # Safety
/// See [`load_u8`].
#[inline]
pub unsafe fn reservation_load_u32(base: *const u8, addr: u32) -> u32 {
    load_u32(base, addr)
}

/// The `stwcx.` half of a reservation pair: atomically compares the raw (big-endian-encoded) bytes
/// at `addr` against `expected` and, on match, stores `new`. Returns whether the store took
/// effect.
///
/// # Safety
/// See [`load_u8`]. `base` must additionally be aligned to 4 bytes at `addr`.
#[inline]
pub unsafe fn reservation_store_u32(base: *mut u8, addr: u32, expected: u32, new: u32) -> bool {
    let ptr = base.add(addr as usize) as *mut u32;
    let atomic = AtomicU32::from_ptr(ptr);
    atomic
        .compare_exchange(expected.swap_bytes(), new.swap_bytes(), Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
}

/// The 64-bit reservation load (`ldarx`).
///
/// # Safety
/// See [`load_u8`].
#[inline]
pub unsafe fn reservation_load_u64(base: *const u8, addr: u32) -> u64 {
    load_u64(base, addr)
}

/// The 64-bit reservation store (`stdcx.`).
///
/// # Safety
/// See [`load_u8`]. `base` must additionally be aligned to 8 bytes at `addr`.
#[inline]
pub unsafe fn reservation_store_u64(base: *mut u8, addr: u32, expected: u64, new: u64) -> bool {
    let ptr = base.add(addr as usize) as *mut u64;
    let atomic = AtomicU64::from_ptr(ptr);
    atomic
        .compare_exchange(expected.swap_bytes(), new.swap_bytes(), Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
}

/// A full sequential-consistency fence, corresponding to PPC's `sync`/`lwsync`. Free function
/// since emitted code has no `GuestMemory` handle to call [`GuestMemory::fence`] through.
#[inline]
pub fn fence() {
    std::sync::atomic::fence(Ordering::SeqCst);
}

/// `eieio`: currently a plain compiler barrier.
#[inline]
pub fn eieio() {
    std::sync::atomic::compiler_fence(Ordering::SeqCst);
}

/// The flat, byte-addressable guest memory region. A guest pointer is a 32-bit unsigned offset
/// from this region's base.
///
/// §3 notes that a real translation run's `base` has its low 32 bits zero, which lets the emitter
/// fold `base | addr` instead of `base + addr`. This implementation always computes `base.add(addr)`
/// (see [`load_u8`] and friends) rather than relying on that bit trick, since a plain heap
/// allocation gives no such guarantee without a platform-specific reservation (the large aligned
/// `mmap` the original performs); folding is an optimization the real emitted code can apply on top
/// of this module's primitives, not a correctness requirement of them.
pub struct GuestMemory {
    base: Box<[u8]>,
}

impl GuestMemory {
    /// Allocates a fresh, zeroed guest address space of the full 4 GiB size.
    pub fn new() -> Self {
        Self::with_size(MEMORY_SIZE as usize)
    }

    /// Allocates a guest address space of the given size. Intended for tests and for hosts that
    /// cannot or need not reserve the full 4 GiB range.
    pub fn with_size(size: usize) -> Self {
        Self {
            base: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Returns a pointer to the base of the guest address space.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.base.as_ptr()
    }

    /// Returns a mutable pointer to the base of the guest address space.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.base.as_mut_ptr()
    }

    /// The size in bytes of this region.
    #[inline]
    pub fn len(&self) -> usize {
        self.base.len()
    }

    /// `PPC_LOAD_U8`. Single bytes are never byte-swapped.
    #[inline]
    pub fn load_u8(&self, addr: u32) -> u8 {
        unsafe { load_u8(self.base.as_ptr(), addr) }
    }

    /// `PPC_STORE_U8`.
    #[inline]
    pub fn store_u8(&self, addr: u32, value: u8) {
        unsafe { store_u8(self.base.as_ptr() as *mut u8, addr, value) }
    }

    /// `PPC_LOAD_U16`: a volatile native-endian read followed by a byte swap.
    #[inline]
    pub fn load_u16(&self, addr: u32) -> u16 {
        unsafe { load_u16(self.base.as_ptr(), addr) }
    }

    /// `PPC_STORE_U16`.
    #[inline]
    pub fn store_u16(&self, addr: u32, value: u16) {
        unsafe { store_u16(self.base.as_ptr() as *mut u8, addr, value) }
    }

    /// `PPC_LOAD_U32`.
    #[inline]
    pub fn load_u32(&self, addr: u32) -> u32 {
        unsafe { load_u32(self.base.as_ptr(), addr) }
    }

    /// `PPC_STORE_U32`.
    #[inline]
    pub fn store_u32(&self, addr: u32, value: u32) {
        unsafe { store_u32(self.base.as_ptr() as *mut u8, addr, value) }
    }

    /// `PPC_LOAD_U64`.
    #[inline]
    pub fn load_u64(&self, addr: u32) -> u64 {
        unsafe { load_u64(self.base.as_ptr(), addr) }
    }

    /// `PPC_STORE_U64`.
    #[inline]
    pub fn store_u64(&self, addr: u32, value: u64) {
        unsafe { store_u64(self.base.as_ptr() as *mut u8, addr, value) }
    }

    /// `PPC_MM_LOAD_U8`. Identical to [`Self::load_u8`] today; kept distinct so a future
    /// profile-guided MMIO substitution has a seam to hook into without touching call sites.
    #[inline]
    pub fn mmio_load_u8(&self, addr: u32) -> u8 {
        self.load_u8(addr)
    }

    /// `PPC_MM_LOAD_U16`.
    #[inline]
    pub fn mmio_load_u16(&self, addr: u32) -> u16 {
        self.load_u16(addr)
    }

    /// `PPC_MM_LOAD_U32`.
    #[inline]
    pub fn mmio_load_u32(&self, addr: u32) -> u32 {
        self.load_u32(addr)
    }

    /// `PPC_MM_LOAD_U64`.
    #[inline]
    pub fn mmio_load_u64(&self, addr: u32) -> u64 {
        self.load_u64(addr)
    }

    /// `PPC_MM_STORE_U8`. Reliant on the guest code sequence placing `eieio` before this call.
    #[inline]
    pub fn mmio_store_u8(&self, addr: u32, value: u8) {
        self.store_u8(addr, value)
    }

    /// `PPC_MM_STORE_U16`.
    #[inline]
    pub fn mmio_store_u16(&self, addr: u32, value: u16) {
        self.store_u16(addr, value)
    }

    /// `PPC_MM_STORE_U32`.
    #[inline]
    pub fn mmio_store_u32(&self, addr: u32, value: u32) {
        self.store_u32(addr, value)
    }

    /// `PPC_MM_STORE_U64`.
    #[inline]
    pub fn mmio_store_u64(&self, addr: u32, value: u64) {
        self.store_u64(addr, value)
    }

    /// The `lwarx` half of the reservation pair: loads the big-endian word at `addr` exactly like
    /// [`Self::load_u32`]. The emitted function is responsible for recording the returned value in
    /// the guest's reservation cell (`Context::reserved` or its local-promoted equivalent).
    #[inline]
    pub fn reservation_load_u32(&self, addr: u32) -> u32 {
        self.load_u32(addr)
    }

    /// The `stwcx.` half of the reservation pair: atomically compares the raw (big-endian-encoded)
    /// bytes at `addr` against `expected` and, on match, stores `new`. Returns whether the store
    /// took effect, which the emitter uses to set CR0's `EQ` bit.
    #[inline]
    pub fn reservation_store_u32(&self, addr: u32, expected: u32, new: u32) -> bool {
        unsafe { reservation_store_u32(self.base.as_ptr() as *mut u8, addr, expected, new) }
    }

    /// The 64-bit reservation load (`ldarx`).
    #[inline]
    pub fn reservation_load_u64(&self, addr: u32) -> u64 {
        self.load_u64(addr)
    }

    /// The 64-bit reservation store (`stdcx.`).
    #[inline]
    pub fn reservation_store_u64(&self, addr: u32, expected: u64, new: u64) -> bool {
        unsafe { reservation_store_u64(self.base.as_ptr() as *mut u8, addr, expected, new) }
    }

    /// Emits a full sequential-consistency fence, corresponding to PPC's `sync`/`lwsync`.
    #[inline]
    pub fn fence(&self) {
        fence()
    }

    /// `eieio`: currently a plain compiler barrier.
    #[inline]
    pub fn eieio(&self) {
        eieio()
    }
}
