//! Bit-granular install helpers
//!
//! Updates may be narrower than a block (a single inode field, a single
//! bitmap bit). These helpers move bits between buffers without touching
//! any bit outside the addressed range.
//!
//! Packed payloads store bit `i` of an object at byte `i / 8`, bit `i % 8`
//! (least significant bit first).

use super::Addr;

/// Installs bit `bit` (0..=7) of `src` into `dst`.
///
/// Returns `dst` with that bit replaced; all other bits are unchanged.
#[inline]
pub fn install_one_bit(src: u8, dst: u8, bit: u8) -> u8 {
    debug_assert!(bit < 8);
    let mask = 1u8 << bit;
    (dst & !mask) | (src & mask)
}

/// Installs the bit range `[off, off + sz)` of `src` into the same range of
/// `dst`.
///
/// Both buffers use block-relative bit positions. Whole aligned bytes are
/// copied directly; the ragged edges go through `install_one_bit`.
pub fn install_range(src: &[u8], dst: &mut [u8], off: u64, sz: u64) {
    let end = off + sz;
    let mut bit = off;
    while bit < end {
        if bit % 8 == 0 && end - bit >= 8 {
            let first = (bit / 8) as usize;
            let last = (end / 8) as usize;
            dst[first..last].copy_from_slice(&src[first..last]);
            bit = last as u64 * 8;
            continue;
        }
        let byte = (bit / 8) as usize;
        dst[byte] = install_one_bit(src[byte], dst[byte], (bit % 8) as u8);
        bit += 1;
    }
}

/// Extracts the bits at `addr` from `blk` into a packed payload.
pub fn extract_bits(blk: &[u8], addr: &Addr) -> Vec<u8> {
    let mut out = vec![0u8; addr.payload_len()];
    if addr.off % 8 == 0 {
        let first = (addr.off / 8) as usize;
        let n = out.len();
        out.copy_from_slice(&blk[first..first + n]);
        let tail = (addr.sz % 8) as u8;
        if tail != 0 {
            if let Some(last) = out.last_mut() {
                *last &= (1u8 << tail) - 1;
            }
        }
        return out;
    }
    for i in 0..addr.sz {
        let pos = addr.off + i;
        let v = (blk[(pos / 8) as usize] >> (pos % 8)) & 1;
        out[(i / 8) as usize] |= v << (i % 8);
    }
    out
}

/// Writes the packed `payload` into `blk` at `addr`.
///
/// `payload` must hold at least `addr.payload_len()` bytes.
pub fn place_bits(payload: &[u8], addr: &Addr, blk: &mut [u8]) {
    debug_assert!(payload.len() >= addr.payload_len());
    let mut i = 0u64;
    if addr.off % 8 == 0 {
        let first = (addr.off / 8) as usize;
        let whole = (addr.sz / 8) as usize;
        blk[first..first + whole].copy_from_slice(&payload[..whole]);
        i = whole as u64 * 8;
    }
    while i < addr.sz {
        let pos = addr.off + i;
        let v = (payload[(i / 8) as usize] >> (i % 8)) & 1;
        let byte = (pos / 8) as usize;
        let bit = (pos % 8) as u8;
        blk[byte] = install_one_bit(v << bit, blk[byte], bit);
        i += 1;
    }
}
