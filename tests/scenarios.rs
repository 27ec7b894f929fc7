//! End-to-end checks for §8's testable properties: the six concrete scenarios (S1-S6) and the two
//! quantified invariants (function-table lookup, VPERM identity) that don't have a natural home
//! next to a single module's `#[cfg(test)]` block because they cross module boundaries.

use ppc_xenon_recomp::context::{Context, CrField};
use ppc_xenon_recomp::fpscr::{self, Fpscr};
use ppc_xenon_recomp::memory::GuestMemory;
use ppc_xenon_recomp::trampoline::{FunctionTable, TrampolineLayout};

/// S1: `STORE_U32(0x1000, 0x11223344)` then the raw bytes at `base+0x1000..+0x1003` read
/// `11 22 33 44`.
#[test]
fn s1_store_u32_writes_big_endian_bytes_at_the_given_address() {
    let mem = GuestMemory::with_size(0x2000);
    mem.store_u32(0x1000, 0x1122_3344);
    assert_eq!(mem.load_u8(0x1000), 0x11);
    assert_eq!(mem.load_u8(0x1001), 0x22);
    assert_eq!(mem.load_u8(0x1002), 0x33);
    assert_eq!(mem.load_u8(0x1003), 0x44);
}

/// S2: `storeFromGuest(2)` (PPC `ROUND_UP`) sets the host MXCSR rounding field to the host's
/// round-up mode.
#[test]
fn s2_store_from_guest_round_up_selects_host_round_up() {
    let mut fp = Fpscr::default();
    fp.store_from_guest(fpscr::ROUND_UP);
    assert_eq!(fp.load_from_host(), fpscr::ROUND_UP);
}

/// S4: CR FP compare of `NaN, 1.0` sets `UN` and clears `LT`/`GT`/`EQ`.
#[test]
fn s4_fp_compare_of_nan_sets_unordered_only() {
    let mut cr = CrField::default();
    cr.compare_fp(f64::NAN, 1.0);
    assert!(cr.so_or_un);
    assert!(!cr.lt && !cr.gt && !cr.eq);
}

/// S6: `VectorShiftTableL`'s second row (byte offset `0x10` in the original's flat 256-byte
/// layout, since each row is 16 bytes) is the tabulated `0x10, 0x0F, .., 0x01` descending
/// sequence.
#[test]
fn s6_vector_shift_table_l_row_one_matches_the_tabulated_bytes() {
    use ppc_xenon_recomp::vector::VECTOR_SHIFT_TABLE_L;
    assert_eq!(
        VECTOR_SHIFT_TABLE_L[1],
        [0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
    );
}

/// Invariant 1: for every guest address in the code region, `lookup` returns either the correct
/// host function or `None`, and `None` is only ever returned for an address that was never
/// populated (never for one control-flow recovery claimed was reachable — enforced by the driver
/// and `flow`, not by `FunctionTable` itself, which this test treats as a closed-box contract).
#[test]
fn invariant_1_lookup_resolves_every_populated_slot_and_nothing_else() {
    unsafe extern "C" fn stub(_ctx: &mut Context, _base: *mut u8) {}

    let layout = TrampolineLayout {
        image_base: 0x8200_0000,
        image_size: 0x1000,
        code_base: 0x8200_0000,
    };
    let mut table = FunctionTable::new(layout, 0x1000);
    table.insert(0x8200_0100, stub);

    assert!(table.lookup(0x8200_0100).is_some());
    assert!(table.lookup(0x8200_0104).is_none());
    assert!(table.lookup(0x1234).is_none());
}

#[cfg(target_arch = "x86_64")]
mod vector_scenarios {
    use std::arch::x86_64::*;

    use ppc_xenon_recomp::vector::{adds_epu32, perm_epi8, vctsxs};

    fn lanes_u32(v: __m128i) -> [u32; 4] {
        let mut out = [0u32; 4];
        unsafe { _mm_storeu_si128(out.as_mut_ptr() as *mut __m128i, v) };
        out
    }

    fn bytes(v: __m128i) -> [u8; 16] {
        let mut out = [0u8; 16];
        unsafe { _mm_storeu_si128(out.as_mut_ptr() as *mut __m128i, v) };
        out
    }

    /// S3: `_mm_adds_epu32({0xFFFFFFFE, 1, 0, 7}, {3, 1, 0, 0xFFFFFFFF})` saturates lanes 0 and 3
    /// at `u32::MAX` and adds normally elsewhere.
    #[test]
    fn s3_saturating_u32_add_matches_the_tabulated_lanes() {
        if !is_x86_feature_detected!("sse4.1") {
            return;
        }
        unsafe {
            let a = _mm_setr_epi32(0xFFFFFFFEu32 as i32, 1, 0, 7);
            let b = _mm_setr_epi32(3, 1, 0, 0xFFFFFFFFu32 as i32);
            let result = adds_epu32(a, b);
            assert_eq!(lanes_u32(result), [0xFFFF_FFFF, 2, 0, 0xFFFF_FFFF]);
        }
    }

    /// S5: `_mm_vctsxs({NaN, -3.5e9, 2.5, 3.2e9})` forces the NaN lane to zero, leaves the
    /// already-saturated large-negative lane at `i32::MIN`, truncates the in-range lane, and
    /// saturates the large-positive lane at `i32::MAX`.
    #[test]
    fn s5_vctsxs_matches_the_tabulated_lanes() {
        if !is_x86_feature_detected!("sse4.1") {
            return;
        }
        unsafe {
            let src = _mm_setr_ps(f32::NAN, -3.5e9, 2.5, 3.2e9);
            let result = vctsxs(src);
            assert_eq!(
                lanes_u32(result),
                [0, i32::MIN as u32, 2, i32::MAX as u32]
            );
        }
    }

    /// Invariant 5: VPERM under the identity permute reproduces each source unchanged. The
    /// PPC-to-host byte reflection `perm_epi8` applies (§4.4: "the bit-3 shift to the sign bit is
    /// the PPC convention") means the identity control vector is the descending byte sequence
    /// `VECTOR_MASK_L[0]` (`0x0F..0x00`) for source `a`, and the same sequence with the
    /// source-select bit set (`0x1F..0x10`) for source `b` — not an all-zero/all-`0x10` constant,
    /// which would instead broadcast a single lane.
    #[test]
    fn invariant_5_vperm_identity_permute_reproduces_each_source() {
        if !is_x86_feature_detected!("ssse3") || !is_x86_feature_detected!("sse4.1") {
            return;
        }
        unsafe {
            let a = _mm_setr_epi8(0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15);
            let b = _mm_setr_epi8(
                16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31,
            );

            let select_a = _mm_setr_epi8(
                0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02,
                0x01, 0x00,
            );
            assert_eq!(bytes(perm_epi8(a, b, select_a)), bytes(a));

            let select_b = _mm_setr_epi8(
                0x1Fu8 as i8, 0x1E as i8, 0x1D as i8, 0x1C as i8, 0x1B as i8, 0x1A as i8,
                0x19 as i8, 0x18 as i8, 0x17 as i8, 0x16 as i8, 0x15 as i8, 0x14 as i8,
                0x13 as i8, 0x12 as i8, 0x11 as i8, 0x10 as i8,
            );
            assert_eq!(bytes(perm_epi8(a, b, select_b)), bytes(b));
        }
    }
}
