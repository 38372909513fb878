// vim: tw=80

use serde_derive::{Deserialize, Serialize};

use crate::{
    blkdev::SectorIo,
    types::*,
    util::*,
};

/*
 * On-disk Label Format (the last sector of every device):
 *
 * failed_disk:  4 bytes    i32 LE; -1 when no device is known failed
 * timestamp:    4 bytes    u32 LE; bumped on every clean stop
 * Pad:          variable   0-padding fills the remainder of the sector
 *
 * All devices of a cleanly stopped volume carry identical labels.  After a
 * device failure the surviving devices agree on (failed_disk, timestamp)
 * while the dead device holds either nothing readable or a stale timestamp;
 * assembly exploits exactly that asymmetry.
 */
/// Serialized size of [`Label`]
pub const LABEL_SIZE: usize = 8;

/// Number of devices polled when assembling.  Three witnesses suffice for a
/// model that tolerates one failure: any scenario needing more than one
/// disagreement implies a second failure and must assemble as Faulted.
pub const QUORUM: usize = 3;

// The label must fit in a sector, and sectors must be word-aligned.
const _: () = assert!(BYTES_PER_SECTOR >= LABEL_SIZE);
const _: () = assert!(BYTES_PER_SECTOR % 4 == 0);

/// Per-device metadata record
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Label {
    /// Index of the known-failed device, or -1 when all are healthy
    pub failed_disk: i32,
    /// Generation number, strictly increasing across clean stops
    pub timestamp:   u32,
}

impl Label {
    /// A label naming no failed device
    pub fn clean(timestamp: u32) -> Self {
        Label { failed_disk: -1, timestamp }
    }

    /// The failed device, if the label names one
    pub fn failed(&self) -> Option<usize> {
        if self.failed_disk < 0 {
            None
        } else {
            Some(self.failed_disk as usize)
        }
    }

    pub fn mark_failed(&mut self, disk: usize) {
        self.failed_disk = disk as i32;
    }
}

impl Default for Label {
    fn default() -> Self {
        Label::clean(0)
    }
}

/// Read the label from one device's metadata sector.
pub(crate) fn read_label<D: SectorIo>(io: &D, disk: usize) -> Result<Label> {
    let mut buf = [0u8; BYTES_PER_SECTOR];
    io.read_sector(disk, io.sectors() - 1, &mut buf)?;
    bincode::deserialize(&buf[..LABEL_SIZE]).map_err(|_| Error::EIO)
}

/// Write `label` to one device's metadata sector, zero-padded.
pub(crate) fn write_label<D: SectorIo>(io: &D, disk: usize, label: &Label)
    -> Result
{
    let mut buf = [0u8; BYTES_PER_SECTOR];
    bincode::serialize_into(&mut buf[..LABEL_SIZE], label)
        .expect("label serialization is infallible");
    io.write_sector(disk, io.sectors() - 1, &buf)
}

/// Collect one assembly vote.
///
/// A failed read is an absent vote.  So is a record naming an impossible
/// failed device; that can only be a torn or foreign metadata sector.
pub(crate) fn read_vote<D: SectorIo>(io: &D, disk: usize) -> Option<Label> {
    match read_label(io, disk) {
        Ok(l) if l.failed_disk >= -1 &&
                 l.failed_disk < io.disks() as i32 => Some(l),
        _ => None,
    }
}

/// Outcome of the assembly decision
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Assembly {
    pub health: Health,
    pub label:  Label,
}

/// If exactly two timestamps agree, the index of the third.
fn odd_one_out(ts: &[u32; QUORUM]) -> Option<usize> {
    if ts[0] == ts[1] && ts[0] != ts[2] {
        Some(2)
    } else if ts[0] == ts[2] && ts[0] != ts[1] {
        Some(1)
    } else if ts[1] == ts[2] && ts[0] != ts[1] {
        Some(0)
    } else {
        None
    }
}

/// The quorum decision: derive the volume's health and believed label from
/// the first three devices' votes.
///
/// Rules, applied in order:
/// - Three identical labels: Online, or Degraded at the device they name.
/// - One stale timestamp at device `k`, the other two naming `k` failed:
///   Degraded at `k`.  `k` died after its last clean stop.
/// - One absent vote at device `k`, the other two agreeing and naming
///   nobody (or `k`) failed: Degraded at `k`.  `k` died since.
/// - Anything else requires two devices to be wrong at once: Faulted.
pub(crate) fn assemble(votes: [Option<Label>; QUORUM]) -> Assembly {
    const FAULTED: Assembly = Assembly {
        health: Health::Faulted,
        label:  Label { failed_disk: -1, timestamp: 0 },
    };

    match votes {
        [Some(a), Some(b), Some(c)] => {
            let ts = [a.timestamp, b.timestamp, c.timestamp];
            if ts[0] == ts[1] && ts[1] == ts[2] {
                if a.failed_disk == b.failed_disk &&
                    b.failed_disk == c.failed_disk
                {
                    let health = if a.failed_disk == -1 {
                        Health::Online
                    } else {
                        Health::Degraded
                    };
                    Assembly { health, label: a }
                } else {
                    // Synchronized clocks but disagreeing failure records
                    FAULTED
                }
            } else if let Some(k) = odd_one_out(&ts) {
                let survivors = [a, b, c];
                let x = survivors[(k + 1) % QUORUM];
                let y = survivors[(k + 2) % QUORUM];
                if x.failed_disk == k as i32 && y.failed_disk == k as i32 {
                    Assembly { health: Health::Degraded, label: x }
                } else {
                    FAULTED
                }
            } else {
                // All three timestamps differ
                FAULTED
            }
        }
        _ => {
            let mut present = votes.into_iter()
                .enumerate()
                .filter_map(|(i, v)| v.map(|l| (i, l)));
            match (present.next(), present.next()) {
                (Some((i, x)), Some((j, y))) => {
                    let k = QUORUM - i - j;
                    if x.timestamp == y.timestamp &&
                        x.failed_disk == y.failed_disk &&
                        (x.failed_disk == -1 || x.failed_disk == k as i32)
                    {
                        let label = Label {
                            failed_disk: k as i32,
                            timestamp:   x.timestamp,
                        };
                        Assembly { health: Health::Degraded, label }
                    } else {
                        FAULTED
                    }
                }
                _ => FAULTED,
            }
        }
    }
}

// LCOV_EXCL_STOP
