//! AltiVec-to-host intrinsic bridge: the handful of vector operations PowerPC's instruction set
//! exposes that have no single matching SSE/AVX instruction, each built here from a short sequence
//! of `std::arch::x86_64` intrinsics. The sequences themselves are ported rather than redesigned —
//! correctness here means bit-for-bit agreement with the studied core's SIMDe-based originals, not
//! a cleaner derivation.
//!
//! Every function in this module requires `target_feature = "sse4.1"` at minimum; a handful need
//! `ssse3` for byte shuffles. The emitter is expected to gate functions that call into here behind
//! the matching `#[target_feature]` or a runtime `is_x86_feature_detected!` check, and to report
//! [`crate::error::Error::HostIntrinsicMiss`] when the target host cannot satisfy it.

#![allow(clippy::missing_safety_doc)]

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Left-rotate byte-shuffle control table used by unaligned vector loads (`lvx`/`lvsl`-style
/// realignment): row `n` (16 bytes) describes the shuffle for a 0..15 byte rotation.
pub const VECTOR_MASK_L: [[u8; 16]; 16] = [
    [0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00],
    [0xFF, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01],
    [0xFF, 0xFF, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02],
    [0xFF, 0xFF, 0xFF, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03],
    [0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04],
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05],
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06],
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07],
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08],
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09],
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A],
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B],
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x0E, 0x0D, 0x0C],
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x0E, 0x0D],
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x0E],
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F],
];

/// Right-rotate counterpart to [`VECTOR_MASK_L`].
pub const VECTOR_MASK_R: [[u8; 16]; 16] = [
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0x02, 0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0x03, 0x02, 0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0x04, 0x03, 0x02, 0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0x05, 0x04, 0x03, 0x02, 0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
    [0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF],
    [0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00, 0xFF, 0xFF, 0xFF],
    [0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00, 0xFF, 0xFF],
    [0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00, 0xFF],
];

/// Byte-rotate shuffle table for `vsldoi`/`vsl`-family left element shifts, one row per shift
/// amount 0..15, using sentinel `0x10` for "zero this lane" rather than `0xFF`.
pub const VECTOR_SHIFT_TABLE_L: [[u8; 16]; 16] = [
    [0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00],
    [0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01],
    [0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02],
    [0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03],
    [0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04],
    [0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05],
    [0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06],
    [0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07],
    [0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08],
    [0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09],
    [0x19, 0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A],
    [0x1A, 0x19, 0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B],
    [0x1B, 0x1A, 0x19, 0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C],
    [0x1C, 0x1B, 0x1A, 0x19, 0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D],
    [0x1D, 0x1C, 0x1B, 0x1A, 0x19, 0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E],
    [0x1E, 0x1D, 0x1C, 0x1B, 0x1A, 0x19, 0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F],
];

/// Right-shift counterpart to [`VECTOR_SHIFT_TABLE_L`].
pub const VECTOR_SHIFT_TABLE_R: [[u8; 16]; 16] = [
    [0x1F, 0x1E, 0x1D, 0x1C, 0x1B, 0x1A, 0x19, 0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10],
    [0x1E, 0x1D, 0x1C, 0x1B, 0x1A, 0x19, 0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F],
    [0x1D, 0x1C, 0x1B, 0x1A, 0x19, 0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E],
    [0x1C, 0x1B, 0x1A, 0x19, 0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D],
    [0x1B, 0x1A, 0x19, 0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C],
    [0x1A, 0x19, 0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B],
    [0x19, 0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A],
    [0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09],
    [0x17, 0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08],
    [0x16, 0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07],
    [0x15, 0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06],
    [0x14, 0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05],
    [0x13, 0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04],
    [0x12, 0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03],
    [0x11, 0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02],
    [0x10, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01],
];

/// Saturating lane-wise unsigned 32-bit add (`vadduwm`'s saturating sibling, `vadduws`).
///
/// SSE has no unsigned 32-bit saturating add; this clamps `b` to the remaining headroom
/// (`!a`, computed as `a XOR cmpeq(a, a)`, i.e. all-ones) before the add, so the add itself can
/// never wrap.
///
/// # Safety
/// Requires the `sse4.1` target feature (for [`_mm_min_epu32`]).
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse4.1")]
#[inline]
pub unsafe fn adds_epu32(a: __m128i, b: __m128i) -> __m128i {
    let headroom = _mm_xor_si128(a, _mm_cmpeq_epi32(a, a));
    _mm_add_epi32(a, _mm_min_epu32(headroom, b))
}

/// Signed 8-bit lane average, rounding each lane half up: `(a + b + 1) >> 1`.
///
/// Built from [`_mm_avg_epu8`] (which already rounds this way for unsigned lanes) by flipping the
/// sign bit of both operands and the result, the standard signed-via-unsigned bias trick.
///
/// # Safety
/// Requires only `sse2`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
#[inline]
pub unsafe fn avg_epi8(a: __m128i, b: __m128i) -> __m128i {
    let bias = _mm_set1_epi8(-128i8);
    _mm_xor_si128(bias, _mm_avg_epu8(_mm_xor_si128(bias, a), _mm_xor_si128(bias, b)))
}

/// Signed 16-bit lane average, rounding each lane half up, via the same bias trick as
/// [`avg_epi8`] over [`_mm_avg_epu16`].
///
/// # Safety
/// Requires only `sse2`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
#[inline]
pub unsafe fn avg_epi16(a: __m128i, b: __m128i) -> __m128i {
    let bias = _mm_set1_epi16(-32768i16);
    _mm_xor_si128(bias, _mm_avg_epu16(_mm_xor_si128(bias, a), _mm_xor_si128(bias, b)))
}

/// Unsigned 32-bit integer to `f32` conversion (`vcfux` without a prior right-shift). SSE only
/// provides a *signed* `i32 -> f32` conversion, so values with the top bit set are routed through
/// a fixup path that pre-adds a bias, extracts the correctly-rounded mantissa via the shift/or
/// trick below, and splices in `2^31` (as the float bit pattern `0x4F80_0000`) to correct the
/// exponent. The two paths are blended by the input's sign bit.
///
/// # Safety
/// Requires the `sse4.1` target feature (for [`_mm_blendv_ps`]).
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse4.1")]
#[inline]
pub unsafe fn cvtepu32_ps(src: __m128i) -> __m128 {
    let biased = _mm_add_epi32(src, _mm_set1_epi32(127));
    let mut fixup = _mm_slli_epi32(src, 31 - 8);
    fixup = _mm_srli_epi32(fixup, 31);
    fixup = _mm_add_epi32(fixup, biased);
    fixup = _mm_srai_epi32(fixup, 8);
    fixup = _mm_add_epi32(fixup, _mm_set1_epi32(0x4F80_0000u32 as i32));
    let signed_path = _mm_cvtepi32_ps(src);
    _mm_blendv_ps(signed_path, _mm_castsi128_ps(fixup), _mm_castsi128_ps(src))
}

/// AltiVec `vperm`: for each output byte, selects one of 32 source bytes (16 from `a`, 16 from
/// `b`) named by the low 5 bits of the matching control byte in `c`.
///
/// Ported as two [`_mm_shuffle_epi8`] passes (one per source register) blended by the control
/// byte's "which half" bit. `vperm`'s index numbering runs the opposite direction from
/// `pshufb`'s, hence the `0xF - (c & 0xF)` reflection.
///
/// # Safety
/// Requires `ssse3` (for [`_mm_shuffle_epi8`]) and `sse4.1` (for [`_mm_blendv_epi8`]).
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "ssse3")]
#[target_feature(enable = "sse4.1")]
#[inline]
pub unsafe fn perm_epi8(a: __m128i, b: __m128i, c: __m128i) -> __m128i {
    let low_nibble_mask = _mm_set1_epi8(0xF);
    let reflected = _mm_sub_epi8(low_nibble_mask, _mm_and_si128(c, low_nibble_mask));
    _mm_blendv_epi8(
        _mm_shuffle_epi8(a, reflected),
        _mm_shuffle_epi8(b, reflected),
        _mm_slli_epi32(c, 3),
    )
}

/// Unsigned 8-bit lane greater-than, via the sign-bit bias trick over [`_mm_cmpgt_epi8`].
///
/// # Safety
/// Requires only `sse2`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
#[inline]
pub unsafe fn cmpgt_epu8(a: __m128i, b: __m128i) -> __m128i {
    let bias = _mm_set1_epi8(-128i8);
    _mm_cmpgt_epi8(_mm_xor_si128(a, bias), _mm_xor_si128(b, bias))
}

/// Unsigned 16-bit lane greater-than, via the sign-bit bias trick over [`_mm_cmpgt_epi16`].
///
/// # Safety
/// Requires only `sse2`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
#[inline]
pub unsafe fn cmpgt_epu16(a: __m128i, b: __m128i) -> __m128i {
    let bias = _mm_set1_epi16(-32768i16);
    _mm_cmpgt_epi16(_mm_xor_si128(a, bias), _mm_xor_si128(b, bias))
}

/// AltiVec `vctsxs`: `f32 -> i32` conversion with saturation and NaN lanes forced to zero (rather
/// than the `i32::MIN` that a plain truncating SSE conversion produces for an out-of-range or NaN
/// input).
///
/// # Safety
/// Requires the `sse4.1` target feature (for [`_mm_blendv_ps`]).
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse4.1")]
#[inline]
pub unsafe fn vctsxs(src: __m128) -> __m128i {
    let unordered = _mm_cmpunord_ps(src, src);
    let truncated = _mm_cvttps_epi32(src);
    let mut overflowed = _mm_cmpeq_epi32(truncated, _mm_set1_epi32(i32::MIN));
    overflowed = _mm_andnot_si128(_mm_castps_si128(src), overflowed);
    let saturated = _mm_blendv_ps(
        _mm_castsi128_ps(truncated),
        _mm_castsi128_ps(_mm_set1_epi32(i32::MAX)),
        _mm_castsi128_ps(overflowed),
    );
    _mm_andnot_si128(_mm_castps_si128(unordered), _mm_castps_si128(saturated))
}

/// AltiVec `vsr`: shifts the 128-bit value `a` right by a single bit count taken from the low 3
/// bits of `b`'s first byte, shared across the whole register (not a per-lane variable shift).
///
/// Computed as two 64-bit-lane shifts (the low qword, and the high qword pre-shifted down by 4
/// bytes so it lines up in the low lane) recombined with [`_mm_insert_ps`] so the result's high
/// lane receives the bits that crossed from the low qword's top byte.
///
/// # Safety
/// Requires the `sse4.1` target feature (for [`_mm_insert_ps`]).
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse4.1")]
#[inline]
pub unsafe fn vsr(a: __m128i, b: __m128i) -> __m128i {
    let count = _mm_srli_epi64(_mm_slli_epi64(b, 61), 61);
    let low = _mm_srl_epi64(a, count);
    let high = _mm_srl_epi64(_mm_srli_si128(a, 4), count);
    _mm_castps_si128(_mm_insert_ps(
        _mm_castsi128_ps(low),
        _mm_castsi128_ps(high),
        0x10,
    ))
}

#[cfg(all(test, target_arch = "x86_64"))]
mod tests {
    use super::*;

    fn lanes_u32(v: __m128i) -> [u32; 4] {
        let mut out = [0u32; 4];
        unsafe { _mm_storeu_si128(out.as_mut_ptr() as *mut __m128i, v) };
        out
    }

    fn lanes_u8(v: __m128i) -> [u8; 16] {
        let mut out = [0u8; 16];
        unsafe { _mm_storeu_si128(out.as_mut_ptr() as *mut __m128i, v) };
        out
    }

    #[test]
    fn adds_epu32_saturates_at_the_unsigned_max() {
        if !is_x86_feature_detected!("sse4.1") {
            return;
        }
        unsafe {
            let a = _mm_set1_epi32(-1i32); // u32::MAX in every lane
            let b = _mm_set1_epi32(5);
            let result = adds_epu32(a, b);
            assert_eq!(lanes_u32(result), [u32::MAX; 4]);
        }
    }

    #[test]
    fn adds_epu32_does_not_saturate_when_not_needed() {
        if !is_x86_feature_detected!("sse4.1") {
            return;
        }
        unsafe {
            let a = _mm_set1_epi32(10);
            let b = _mm_set1_epi32(20);
            let result = adds_epu32(a, b);
            assert_eq!(lanes_u32(result), [30u32; 4]);
        }
    }

    #[test]
    fn avg_epi8_rounds_half_up() {
        unsafe {
            let a = _mm_set1_epi8(1);
            let b = _mm_set1_epi8(2);
            let result = avg_epi8(a, b);
            assert_eq!(lanes_u8(result)[0], 2);
        }
    }

    #[test]
    fn cmpgt_epu8_treats_operands_as_unsigned() {
        unsafe {
            let a = _mm_set1_epi8(-1i8); // 0xFF as unsigned
            let b = _mm_set1_epi8(1);
            let result = cmpgt_epu8(a, b);
            assert_eq!(lanes_u8(result)[0], 0xFF);
        }
    }

    #[test]
    fn vctsxs_forces_nan_lanes_to_zero() {
        if !is_x86_feature_detected!("sse4.1") {
            return;
        }
        unsafe {
            let src = _mm_set1_ps(f32::NAN);
            let result = vctsxs(src);
            assert_eq!(lanes_u32(result), [0u32; 4]);
        }
    }

    #[test]
    fn vctsxs_saturates_overflowing_positive_values() {
        if !is_x86_feature_detected!("sse4.1") {
            return;
        }
        unsafe {
            let src = _mm_set1_ps(1.0e20);
            let result = vctsxs(src);
            assert_eq!(lanes_u32(result)[0], i32::MAX as u32);
        }
    }
}
