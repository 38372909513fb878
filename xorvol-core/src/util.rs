// vim: tw=80
//! Common utility functions used throughout xorvol

use crate::types::SectorT;

/// Size of one sector in bytes, the unit of all I/O
pub const BYTES_PER_SECTOR: usize = 512;

/// Number of whole sectors covered by a byte buffer
///
/// The caller must already have checked alignment; this is just the
/// division.
pub fn buf_sectors(buf_len: usize) -> SectorT {
    debug_assert_eq!(buf_len % BYTES_PER_SECTOR, 0);
    (buf_len / BYTES_PER_SECTOR) as SectorT
}

// LCOV_EXCL_STOP
