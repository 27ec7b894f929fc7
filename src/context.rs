//! This module provides the [`Context`] struct, the single piece of state that is threaded
//! through every emitted host function. It holds all architectural PowerPC register state that
//! the active [register-elision profile](crate::config::ElisionProfile) did not promote to a
//! stack-local of the emitted function body.
//!
//! A register cell is a single 64-bit value reinterpreted per opcode rather than a tagged union,
//! so that reads and writes stay zero-cost.

use crate::fpscr::Fpscr;

/// The machine-state register's value on thread creation (`0x0200_A000`).
pub const MSR_INITIAL: u32 = 0x0200_A000;

/// A single 64-bit general-purpose or floating-point register cell, reinterpretable as any of
/// the signed/unsigned 8/16/32/64-bit integer or 32/64-bit float views a PowerPC opcode may use.
///
/// This mirrors `PPCRegister`'s C union: rather than a Rust `union` (which would require `unsafe`
/// at every access site), the cell stores a plain `u64` and exposes typed accessors that reinterpret
/// the bit pattern, which the compiler folds down to the same bit operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct Register(u64);

impl Register {
    /// Constructs a register cell from a raw 64-bit pattern.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw 64-bit pattern.
    #[inline]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn s8(self) -> i8 {
        self.0 as i8
    }

    #[inline]
    pub fn set_s8(&mut self, value: i8) {
        self.0 = value as u8 as u64;
    }

    #[inline]
    pub fn u8(self) -> u8 {
        self.0 as u8
    }

    #[inline]
    pub fn set_u8(&mut self, value: u8) {
        self.0 = value as u64;
    }

    #[inline]
    pub fn s16(self) -> i16 {
        self.0 as i16
    }

    #[inline]
    pub fn set_s16(&mut self, value: i16) {
        self.0 = value as u16 as u64;
    }

    #[inline]
    pub fn u16(self) -> u16 {
        self.0 as u16
    }

    #[inline]
    pub fn set_u16(&mut self, value: u16) {
        self.0 = value as u64;
    }

    #[inline]
    pub fn s32(self) -> i32 {
        self.0 as i32
    }

    #[inline]
    pub fn set_s32(&mut self, value: i32) {
        self.0 = value as u32 as u64;
    }

    #[inline]
    pub fn u32(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub fn set_u32(&mut self, value: u32) {
        self.0 = value as u64;
    }

    #[inline]
    pub fn s64(self) -> i64 {
        self.0 as i64
    }

    #[inline]
    pub fn set_s64(&mut self, value: i64) {
        self.0 = value as u64;
    }

    #[inline]
    pub fn u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn set_u64(&mut self, value: u64) {
        self.0 = value;
    }

    #[inline]
    pub fn f32(self) -> f32 {
        f32::from_bits(self.0 as u32)
    }

    #[inline]
    pub fn set_f32(&mut self, value: f32) {
        self.0 = value.to_bits() as u64;
    }

    #[inline]
    pub fn f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    #[inline]
    pub fn set_f64(&mut self, value: f64) {
        self.0 = value.to_bits();
    }
}

/// A 128-bit AltiVec vector register cell, 16-byte aligned so it can be loaded directly into a
/// host SSE register with an aligned load.
///
/// Mirrors `PPCVRegister`'s union of 16x{i,u}8 / 8x{i,u}16 / 4x{i,u}32 / 2x{i,u}64 / 4xf32 / 2xf64
/// lanes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C, align(16))]
pub struct VRegister {
    bytes: [u8; 16],
}

impl VRegister {
    /// Constructs a vector register from its raw bytes (host/native lane order).
    #[inline]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    /// Returns the raw bytes of this register (host/native lane order).
    #[inline]
    pub const fn to_bytes(self) -> [u8; 16] {
        self.bytes
    }

    /// Overwrites the raw bytes of this register in place.
    #[inline]
    pub fn set_bytes(&mut self, bytes: [u8; 16]) {
        self.bytes = bytes;
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.bytes.as_mut_ptr()
    }

    #[inline]
    pub fn s8(&self) -> [i8; 16] {
        let mut out = [0i8; 16];
        for (o, b) in out.iter_mut().zip(self.bytes.iter()) {
            *o = *b as i8;
        }
        out
    }

    #[inline]
    pub fn u8(&self) -> [u8; 16] {
        self.bytes
    }

    #[inline]
    pub fn u32(&self) -> [u32; 4] {
        let mut out = [0u32; 4];
        for i in 0..4 {
            out[i] = u32::from_ne_bytes(self.bytes[i * 4..i * 4 + 4].try_into().unwrap());
        }
        out
    }

    #[inline]
    pub fn f32(&self) -> [f32; 4] {
        let raw = self.u32();
        [
            f32::from_bits(raw[0]),
            f32::from_bits(raw[1]),
            f32::from_bits(raw[2]),
            f32::from_bits(raw[3]),
        ]
    }
}

/// The Fixed-Point Exception Register: SO (summary overflow), OV (overflow), CA (carry).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct XerRegister {
    pub so: bool,
    pub ov: bool,
    pub ca: bool,
}

/// A single 4-bit Condition Register field (`LT`, `GT`, `EQ`, and a slot shared between `SO`
/// (integer compares) and `UN` (AltiVec "unordered"/mask compares) — these never co-occur on real
/// hardware, so one field covers both without ambiguity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CrField {
    pub lt: bool,
    pub gt: bool,
    pub eq: bool,
    pub so_or_un: bool,
}

/// The architectural PowerPC register file threaded through every emitted host function.
///
/// Fields gated behind an elision Cargo feature are omitted entirely when that feature is
/// enabled; the emitter is responsible for promoting the corresponding value to a stack-local of
/// the host function body in that configuration instead. Eliding a field here without the emitter
/// doing so for every call boundary that crosses it is a correctness bug, not just a performance
/// one.
#[derive(Clone, Debug)]
pub struct Context {
    #[cfg(not(feature = "non_argument_as_local"))]
    pub r0: Register,
    #[cfg(not(feature = "non_argument_as_local"))]
    pub r1: Register,
    #[cfg(not(feature = "non_argument_as_local"))]
    pub r2: Register,
    pub r3: Register,
    pub r4: Register,
    pub r5: Register,
    pub r6: Register,
    pub r7: Register,
    pub r8: Register,
    pub r9: Register,
    pub r10: Register,
    #[cfg(not(feature = "non_argument_as_local"))]
    pub r11: Register,
    #[cfg(not(feature = "non_argument_as_local"))]
    pub r12: Register,
    pub r13: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r14: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r15: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r16: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r17: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r18: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r19: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r20: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r21: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r22: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r23: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r24: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r25: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r26: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r27: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r28: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r29: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r30: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub r31: Register,

    #[cfg(not(feature = "skip_lr"))]
    pub lr: u64,
    #[cfg(not(feature = "ctr_as_local"))]
    pub ctr: Register,
    #[cfg(not(feature = "xer_as_local"))]
    pub xer: XerRegister,
    #[cfg(not(feature = "reserved_as_local"))]
    pub reserved: Register,
    #[cfg(not(feature = "skip_msr"))]
    pub msr: u32,

    #[cfg(not(feature = "cr_as_local"))]
    pub cr0: CrField,
    #[cfg(not(feature = "cr_as_local"))]
    pub cr1: CrField,
    #[cfg(not(feature = "cr_as_local"))]
    pub cr2: CrField,
    #[cfg(not(feature = "cr_as_local"))]
    pub cr3: CrField,
    #[cfg(not(feature = "cr_as_local"))]
    pub cr4: CrField,
    #[cfg(not(feature = "cr_as_local"))]
    pub cr5: CrField,
    #[cfg(not(feature = "cr_as_local"))]
    pub cr6: CrField,
    #[cfg(not(feature = "cr_as_local"))]
    pub cr7: CrField,

    pub fpscr: Fpscr,

    #[cfg(not(feature = "non_argument_as_local"))]
    pub f0: Register,
    pub f1: Register,
    pub f2: Register,
    pub f3: Register,
    pub f4: Register,
    pub f5: Register,
    pub f6: Register,
    pub f7: Register,
    pub f8: Register,
    pub f9: Register,
    pub f10: Register,
    pub f11: Register,
    pub f12: Register,
    pub f13: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f14: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f15: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f16: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f17: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f18: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f19: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f20: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f21: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f22: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f23: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f24: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f25: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f26: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f27: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f28: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f29: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f30: Register,
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub f31: Register,

    /// `v0`..`v13`: volatile AltiVec scratch and parameter-passing registers. Never elided; a
    /// function's own vector arguments live here for the duration of its body regardless of
    /// profile.
    pub v_low: [VRegister; 14],
    /// `v14`..`v31`: the classic AltiVec non-volatile range, saved by a caller across a call in
    /// the guest ABI. Promotable to locals under the same profile flag as the non-volatile GPRs
    /// and FPRs, since the same cross-call liveness argument applies.
    #[cfg(not(feature = "non_volatile_as_local"))]
    pub v_saved: [VRegister; 18],
    /// `v32`..`v127`: Xenon's VMX128 extension beyond the standard AltiVec file. The guest ABI
    /// defines no volatility convention for this range, so it is never elided.
    pub v_extended: [VRegister; 96],
}

impl Context {
    /// Total number of architectural vector registers (`v0`..`v127`), including the VMX128
    /// extension.
    pub const VECTOR_REGISTER_COUNT: usize = 128;

    /// Reads vector register `index` (`0..128`). Panics if `index` is out of range, or — under
    /// `non_volatile_as_local` — if `index` falls in the `v14..=v31` range that build promoted to
    /// a stack-local the caller is expected to track itself.
    #[inline]
    pub fn v(&self, index: usize) -> &VRegister {
        match index {
            0..=13 => &self.v_low[index],
            #[cfg(not(feature = "non_volatile_as_local"))]
            14..=31 => &self.v_saved[index - 14],
            32..=127 => &self.v_extended[index - 32],
            _ => panic!("vector register index {index} out of range"),
        }
    }

    /// Mutable counterpart to [`Self::v`].
    #[inline]
    pub fn v_mut(&mut self, index: usize) -> &mut VRegister {
        match index {
            0..=13 => &mut self.v_low[index],
            #[cfg(not(feature = "non_volatile_as_local"))]
            14..=31 => &mut self.v_saved[index - 14],
            32..=127 => &mut self.v_extended[index - 32],
            _ => panic!("vector register index {index} out of range"),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self {
            #[cfg(not(feature = "non_argument_as_local"))]
            r0: Register::default(),
            #[cfg(not(feature = "non_argument_as_local"))]
            r1: Register::default(),
            #[cfg(not(feature = "non_argument_as_local"))]
            r2: Register::default(),
            r3: Register::default(),
            r4: Register::default(),
            r5: Register::default(),
            r6: Register::default(),
            r7: Register::default(),
            r8: Register::default(),
            r9: Register::default(),
            r10: Register::default(),
            #[cfg(not(feature = "non_argument_as_local"))]
            r11: Register::default(),
            #[cfg(not(feature = "non_argument_as_local"))]
            r12: Register::default(),
            r13: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r14: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r15: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r16: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r17: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r18: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r19: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r20: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r21: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r22: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r23: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r24: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r25: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r26: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r27: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r28: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r29: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r30: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            r31: Register::default(),

            #[cfg(not(feature = "skip_lr"))]
            lr: 0,
            #[cfg(not(feature = "ctr_as_local"))]
            ctr: Register::default(),
            #[cfg(not(feature = "xer_as_local"))]
            xer: XerRegister::default(),
            #[cfg(not(feature = "reserved_as_local"))]
            reserved: Register::default(),
            #[cfg(not(feature = "skip_msr"))]
            msr: MSR_INITIAL,

            #[cfg(not(feature = "cr_as_local"))]
            cr0: CrField::default(),
            #[cfg(not(feature = "cr_as_local"))]
            cr1: CrField::default(),
            #[cfg(not(feature = "cr_as_local"))]
            cr2: CrField::default(),
            #[cfg(not(feature = "cr_as_local"))]
            cr3: CrField::default(),
            #[cfg(not(feature = "cr_as_local"))]
            cr4: CrField::default(),
            #[cfg(not(feature = "cr_as_local"))]
            cr5: CrField::default(),
            #[cfg(not(feature = "cr_as_local"))]
            cr6: CrField::default(),
            #[cfg(not(feature = "cr_as_local"))]
            cr7: CrField::default(),

            fpscr: Fpscr::default(),

            #[cfg(not(feature = "non_argument_as_local"))]
            f0: Register::default(),
            f1: Register::default(),
            f2: Register::default(),
            f3: Register::default(),
            f4: Register::default(),
            f5: Register::default(),
            f6: Register::default(),
            f7: Register::default(),
            f8: Register::default(),
            f9: Register::default(),
            f10: Register::default(),
            f11: Register::default(),
            f12: Register::default(),
            f13: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f14: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f15: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f16: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f17: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f18: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f19: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f20: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f21: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f22: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f23: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f24: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f25: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f26: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f27: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f28: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f29: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f30: Register::default(),
            #[cfg(not(feature = "non_volatile_as_local"))]
            f31: Register::default(),

            v_low: [VRegister::default(); 14],
            #[cfg(not(feature = "non_volatile_as_local"))]
            v_saved: [VRegister::default(); 18],
            v_extended: [VRegister::default(); 96],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_reinterprets_bit_pattern_per_view() {
        let mut r = Register::default();
        r.set_f32(1.5);
        assert_eq!(r.f32(), 1.5);
        assert_eq!(r.u32(), 0x3FC0_0000);

        r.set_s64(-1);
        assert_eq!(r.u64(), u64::MAX);
        assert_eq!(r.s32(), -1);
    }

    #[test]
    fn msr_initializes_to_the_documented_value() {
        let ctx = Context::default();
        #[cfg(not(feature = "skip_msr"))]
        assert_eq!(ctx.msr, 0x0200_A000);
    }

    #[test]
    fn vector_accessor_spans_the_full_register_file() {
        let mut ctx = Context::default();
        ctx.v_mut(0).set_bytes([1u8; 16]);
        ctx.v_mut(32).set_bytes([2u8; 16]);
        ctx.v_mut(127).set_bytes([3u8; 16]);
        assert_eq!(ctx.v(0).to_bytes(), [1u8; 16]);
        assert_eq!(ctx.v(32).to_bytes(), [2u8; 16]);
        assert_eq!(ctx.v(127).to_bytes(), [3u8; 16]);

        #[cfg(not(feature = "non_volatile_as_local"))]
        {
            ctx.v_mut(20).set_bytes([4u8; 16]);
            assert_eq!(ctx.v(20).to_bytes(), [4u8; 16]);
        }
    }
}
