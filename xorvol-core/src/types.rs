// vim: tw=80
//! Common type definitions used throughout xorvol

use std::fmt;

/// Indexes a sector on a device, or counts sectors.
pub type SectorT = u64;

/// xorvol's error type.  Basically just an errno
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// Bad argument: descriptor out of bounds, misaligned buffer, or a
    /// sector span outside the volume.
    EINVAL = libc::EINVAL as isize,
    /// A device fault made the operation fail, or the volume has already
    /// lost two devices.
    EIO    = libc::EIO as isize,
    /// The volume is not started.
    ENXIO  = libc::ENXIO as isize,
}

pub type Result<T = ()> = std::result::Result<T, Error>;

/// Represents the health of the volume
///
/// The ordering reflects which Health is "sicker".  A degraded volume is
/// sicker than an online one, and a faulted volume is beyond help.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Health {
    /// Perfectly healthy
    Online,
    /// Operating with no redundancy; one device is known dead
    Degraded,
    /// Two or more devices lost.  No I/O is possible
    Faulted,
    /// Not assembled
    Stopped,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Online => "Online".fmt(f),
            Self::Degraded => "Degraded".fmt(f),
            Self::Faulted => "Faulted".fmt(f),
            Self::Stopped => "Stopped".fmt(f),
        }
    }
}

// LCOV_EXCL_STOP
