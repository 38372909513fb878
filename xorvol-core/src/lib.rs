// vim: tw=80

//! xorvol: a single-parity XOR volume manager
//!
//! Presents a linear array of fixed-size sectors on top of N block devices,
//! tolerating the loss of any one device.  Parity rotates across stripes;
//! per-device metadata in the last sector lets the volume be reassembled
//! after a clean or not-so-clean shutdown.

pub mod blkdev;
pub mod label;
pub mod layout;
pub mod parity;
pub mod types;
pub mod util;
pub mod volume;

pub use crate::types::*;
pub use crate::util::*;
