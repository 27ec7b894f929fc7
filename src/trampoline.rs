//! The function trampoline (C8): the dense guest-address -> host-function table that backs
//! `PPC_LOOKUP_FUNC`, and the single calling convention every emitted function and host shim
//! shares.
//!
//! Ported from `ppc_context.h`'s `PPCFuncMapping`/`PPCFuncMappings`/`PPC_LOOKUP_FUNC`: the table
//! is a dense array of `{guest, host}` pairs indexed by `(guest - PPC_CODE_BASE) * 2` qword slots,
//! stored starting at `base + PPC_IMAGE_BASE + PPC_IMAGE_SIZE`. Host shims that implement guest
//! syscalls register in the same table by guest address and are indistinguishable from translated
//! code at the call site (§4.7).

use crate::context::Context;
use crate::error::Error;

/// The calling convention every emitted function and host shim implements:
/// `fn(&mut Context, *mut u8)`. `base` is the guest memory region's host pointer, re-derived at
/// every call rather than captured, since nothing in this convention owns the region.
pub type PpcFunc = unsafe extern "C" fn(&mut Context, *mut u8);

/// One `{guest, host}` pair in the function table, terminated in the emitted artifact's array by
/// a `{0, nullptr}` sentinel (see [`crate::driver`] for how that file is written out).
#[derive(Clone, Copy)]
pub struct FuncMapping {
    pub guest: u32,
    pub host: Option<PpcFunc>,
}

/// Compile-time parameters of the emitted program (§6 "Environment"). A real translation run
/// derives `PPC_IMAGE_BASE`/`PPC_IMAGE_SIZE`/`PPC_CODE_BASE` from the loaded image; the driver
/// bakes the resolved values into the emitted artifact as `const`s with these names.
#[derive(Debug, Clone, Copy)]
pub struct TrampolineLayout {
    pub image_base: u32,
    pub image_size: u32,
    pub code_base: u32,
}

/// The dense, read-only-after-translation function table (C7/C8's output). A guest code address
/// that is never the target of a reachable branch or indirect call has a `None` slot.
pub struct FunctionTable {
    layout: TrampolineLayout,
    slots: Vec<Option<PpcFunc>>,
}

impl FunctionTable {
    /// Builds an all-nil table sized to cover `[code_base, code_base + code_size)`.
    pub fn new(layout: TrampolineLayout, code_size: u32) -> Self {
        Self {
            layout,
            slots: vec![None; code_size as usize],
        }
    }

    /// Populates the slot for `guest`. Invariant (§3): every guest address that is the target of
    /// any reachable branch or indirect call must have a populated slot by the time translation
    /// finishes; this is `flow`'s and `driver`'s responsibility to uphold, not this type's.
    pub fn insert(&mut self, guest: u32, host: PpcFunc) {
        let index = self.slot_index(guest);
        self.slots[index] = Some(host);
    }

    fn slot_index(&self, guest: u32) -> usize {
        (guest.wrapping_sub(self.layout.code_base)) as usize
    }

    /// `PPC_LOOKUP_FUNC`: resolves a guest address to its host function pointer, or `None` if the
    /// address is outside the code region or its slot was never populated.
    pub fn lookup(&self, guest: u32) -> Option<PpcFunc> {
        if guest < self.layout.code_base {
            return None;
        }
        self.slots.get(self.slot_index(guest)).copied().flatten()
    }

    /// The indirect-call path (`bctrl`/`bctr`/`blr` to a dynamic target): resolves `guest` and
    /// reports [`Error::UnresolvedIndirect`] on a nil slot rather than panicking, matching §7's
    /// run-time error taxonomy.
    pub fn lookup_indirect(&self, guest: u32) -> Result<PpcFunc, Error> {
        self.lookup(guest).ok_or(Error::UnresolvedIndirect(guest))
    }

    /// Flattens the table into the nil-terminated `{guest, host}` pair sequence the emitted
    /// artifact's `PPCFuncMappings` array holds.
    pub fn mappings(&self) -> Vec<FuncMapping> {
        let mut out: Vec<FuncMapping> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, host)| {
                host.map(|host| FuncMapping {
                    guest: self.layout.code_base + i as u32,
                    host: Some(host),
                })
            })
            .collect();
        out.push(FuncMapping { guest: 0, host: None });
        out
    }
}
