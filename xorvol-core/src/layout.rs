// vim: tw=80

//! The left-symmetric rotating-parity layout
//!
//! Logical sectors are laid out in row-major stripes across the `D` devices.
//! Each row holds `D-1` data sectors plus one parity sector, and the parity
//! device rotates by one position per row.  The last row of every device is
//! reserved for the metadata label and is never produced by the locator.

use crate::types::SectorT;

/// Physical location of one logical sector
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Chunkloc {
    /// Device holding the data
    pub disk: usize,
    /// Sector index on that device (the stripe row)
    pub offset: SectorT,
    /// Device holding the row's parity
    pub parity_disk: usize,
}

/// Maps logical sectors to physical `(disk, sector)` pairs
///
/// A pure function of the device geometry, so the mapping is identical on
/// every assembly of the same device set.
#[derive(Clone, Copy, Debug)]
pub struct Layout {
    disks: usize,
    sectors: SectorT,
}

impl Layout {
    pub fn new(disks: usize, sectors: SectorT) -> Self {
        debug_assert!(disks >= 2);
        debug_assert!(sectors >= 2);
        Layout { disks, sectors }
    }

    /// Rows available for data and parity; the final row is metadata.
    pub fn datarows(&self) -> SectorT {
        self.sectors - 1
    }

    /// The reserved per-device metadata sector
    pub fn metadata_sector(&self) -> SectorT {
        self.sectors - 1
    }

    /// Number of addressable logical sectors
    pub fn size(&self) -> SectorT {
        (self.disks as SectorT - 1) * (self.sectors - 1)
    }

    /// Resolve a logical sector.  Total on `[0, size())`, undefined
    /// outside; callers must bounds-check first.
    pub fn locate(&self, lsec: SectorT) -> Chunkloc {
        debug_assert!(lsec < self.size());
        let n = self.disks as SectorT;
        let row = lsec / (n - 1);
        let col = lsec % (n - 1);
        let parity = (n - 1) - (row % n);
        let disk = (parity + 1 + col) % n;
        Chunkloc {
            disk: disk as usize,
            offset: row,
            parity_disk: parity as usize,
        }
    }
}

// LCOV_EXCL_STOP
