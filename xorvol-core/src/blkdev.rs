// vim: tw=80
//! The block device boundary
//!
//! The host hands the volume a pair of plain function pointers per the
//! driver contract; everything above this module talks to the devices
//! through the [`SectorIo`] seam instead.

use crate::{
    types::*,
    util::*,
};

/// Maximum number of devices in a volume
pub const MAX_DISKS: usize = 16;
/// Minimum number of devices in a volume
pub const MIN_DISKS: usize = 3;
/// Maximum number of sectors on one device
pub const MAX_SECTORS_PER_DISK: SectorT = 1024 * 1024 * 2;
/// Minimum number of sectors on one device: one data row plus the metadata
/// row
pub const MIN_SECTORS_PER_DISK: SectorT = 2;

/// Read function supplied by the host.
///
/// Arguments are device index, first sector, destination buffer, and sector
/// count.  Returns the number of sectors actually read.
pub type ReadFn = fn(usize, SectorT, &mut [u8], usize) -> usize;

/// Write function supplied by the host.  Same convention as [`ReadFn`].
pub type WriteFn = fn(usize, SectorT, &[u8], usize) -> usize;

/// Descriptor for the device set backing one volume
///
/// Owned by the volume from `start` until `stop`.
#[derive(Clone, Copy)]
pub struct BlkDev {
    /// Number of devices
    pub disks: usize,
    /// Number of sectors per device
    pub sectors: SectorT,
    pub read: ReadFn,
    pub write: WriteFn,
}

impl BlkDev {
    /// Check the descriptor against the supported geometry bounds.
    ///
    /// The function pointers need no checking; Rust has no null ones.
    pub fn validate(&self) -> Result {
        if self.disks < MIN_DISKS || self.disks > MAX_DISKS {
            return Err(Error::EINVAL);
        }
        if self.sectors < MIN_SECTORS_PER_DISK ||
            self.sectors > MAX_SECTORS_PER_DISK
        {
            return Err(Error::EINVAL);
        }
        Ok(())
    }
}

/// Single-sector device access, as the I/O engine sees it
///
/// A transfer of anything other than exactly one sector is a device fault.
#[cfg_attr(test, mockall::automock)]
pub trait SectorIo {
    /// Number of devices in the set
    fn disks(&self) -> usize;

    /// Number of sectors per device
    fn sectors(&self) -> SectorT;

    /// Read one sector.  `buf` must be exactly one sector long.
    fn read_sector(&self, disk: usize, sector: SectorT, buf: &mut [u8])
        -> Result;

    /// Write one sector.  `buf` must be exactly one sector long.
    fn write_sector(&self, disk: usize, sector: SectorT, buf: &[u8])
        -> Result;
}

/// Adapter over the host's function-pointer interface
///
/// Adds no retries; a short transfer is propagated immediately as `EIO`.
pub struct Disks(BlkDev);

impl Disks {
    pub fn new(dev: BlkDev) -> Self {
        Disks(dev)
    }
}

impl SectorIo for Disks {
    fn disks(&self) -> usize {
        self.0.disks
    }

    fn sectors(&self) -> SectorT {
        self.0.sectors
    }

    fn read_sector(&self, disk: usize, sector: SectorT, buf: &mut [u8])
        -> Result
    {
        debug_assert_eq!(buf.len(), BYTES_PER_SECTOR);
        debug_assert!(disk < self.0.disks);
        debug_assert!(sector < self.0.sectors);
        if (self.0.read)(disk, sector, buf, 1) == 1 {
            Ok(())
        } else {
            Err(Error::EIO)
        }
    }

    fn write_sector(&self, disk: usize, sector: SectorT, buf: &[u8])
        -> Result
    {
        debug_assert_eq!(buf.len(), BYTES_PER_SECTOR);
        debug_assert!(disk < self.0.disks);
        debug_assert!(sector < self.0.sectors);
        if (self.0.write)(disk, sector, buf, 1) == 1 {
            Ok(())
        } else {
            Err(Error::EIO)
        }
    }
}

// LCOV_EXCL_STOP
