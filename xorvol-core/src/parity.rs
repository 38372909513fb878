// vim: tw=80

//! XOR parity arithmetic over stripe rows
//!
//! With single parity the encode and decode operations are the same fold:
//! XOR together every column of a row except one.  Reconstructing a dead
//! column and recomputing a row's parity differ only in which column is
//! left out.

use crate::{
    blkdev::SectorIo,
    types::SectorT,
};

/// Fold one column into an accumulator, byte-wise.
pub(crate) fn xor_into(acc: &mut [u8], col: &[u8]) {
    debug_assert_eq!(acc.len(), col.len());
    for (a, c) in acc.iter_mut().zip(col.iter()) {
        *a ^= c;
    }
}

/// XOR of every device's sector at `offset`, except `skip`'s.
///
/// With `skip` set to a dead device this reconstructs that device's column;
/// with `skip` set to the row's parity device it recomputes the parity.
/// `out` receives the result.  On failure, returns the first device whose
/// read failed.
pub(crate) fn xor_row_excluding<D: SectorIo>(
    io: &D,
    skip: usize,
    offset: SectorT,
    out: &mut [u8],
    scratch: &mut [u8],
) -> std::result::Result<(), usize>
{
    out.fill(0);
    for disk in 0..io.disks() {
        if disk == skip {
            continue;
        }
        io.read_sector(disk, offset, scratch).map_err(|_| disk)?;
        xor_into(out, scratch);
    }
    Ok(())
}

/// Recompute a row's parity with one column supplied by the caller.
///
/// Like [`xor_row_excluding`] with `skip = parity_disk`, except that when
/// the fold reaches `substitute` it takes `sub_buf` instead of issuing a
/// read.  Used when `substitute` is dead (its new logical contents exist
/// only in `sub_buf`) or about to be overwritten.
pub(crate) fn parity_with_substitute<D: SectorIo>(
    io: &D,
    parity_disk: usize,
    substitute: usize,
    sub_buf: &[u8],
    offset: SectorT,
    out: &mut [u8],
    scratch: &mut [u8],
) -> std::result::Result<(), usize>
{
    debug_assert_ne!(parity_disk, substitute);
    out.fill(0);
    for disk in 0..io.disks() {
        if disk == parity_disk {
            continue;
        }
        if disk == substitute {
            xor_into(out, sub_buf);
            continue;
        }
        io.read_sector(disk, offset, scratch).map_err(|_| disk)?;
        xor_into(out, scratch);
    }
    Ok(())
}

// LCOV_EXCL_STOP
