// vim: tw=80

//! The volume: lifecycle state machine plus the degraded-capable I/O engine
//!
//! A `Volume` presents `(D-1) * (S-1)` logical sectors over `D` devices of
//! `S` sectors each.  While Online, every stripe row's parity column equals
//! the XOR of its data columns.  While Degraded, the same invariant holds
//! as if the dead device still contained its last-written values, which is
//! what makes reconstruction work.  A second fault is terminal.

use tracing::{error, instrument, warn};

use crate::{
    blkdev::{BlkDev, Disks, SectorIo},
    label::{self, Assembly, Label, QUORUM},
    layout::{Chunkloc, Layout},
    parity::{parity_with_substitute, xor_row_excluding},
    types::*,
    util::*,
};

/// Everything the volume owns between `start` and `stop`
struct Assembled {
    disks:   Disks,
    layout:  Layout,
    /// The currently believed `(failed_disk, timestamp)` record
    label:   Label,
    health:  Health,
    /// Member scratch sector, reused by the parity folds
    scratch: [u8; BYTES_PER_SECTOR],
}

/// A single-parity volume over N block devices
///
/// The volume is single-threaded; all operations are synchronous and block
/// on the underlying device calls.  Callers sharing a volume must serialize
/// externally.
#[derive(Default)]
pub struct Volume {
    /// `Some` between `start` and `stop`, even when Faulted, so that `stop`
    /// can always release the descriptor.
    state: Option<Assembled>,
}

impl Volume {
    /// One-time initialization of a fresh device set.
    ///
    /// Writes an identical clean label to every device.  If one device's
    /// write fails, the sweep restarts once with that device recorded as
    /// failed (and skipped); a second failing device makes the device set
    /// unusable.
    pub fn create(dev: &BlkDev) -> Result {
        dev.validate()?;
        let disks = Disks::new(*dev);
        let mut initial = Label::default();
        let mut retried = false;
        let mut disk = 0;
        while disk < dev.disks {
            if initial.failed() == Some(disk) {
                disk += 1;
                continue;
            }
            if label::write_label(&disks, disk, &initial).is_err() {
                if retried {
                    return Err(Error::EIO);
                }
                retried = true;
                initial.mark_failed(disk);
                // Restart so the devices already written observe the
                // failure record.
                disk = 0;
                continue;
            }
            disk += 1;
        }
        Ok(())
    }

    /// Assemble the volume from a previously `create`d device set and
    /// return the post-assembly health.
    ///
    /// Starting an already started volume is a protocol violation; it
    /// returns Faulted and leaves the running assembly untouched.
    #[instrument(skip_all)]
    pub fn start(&mut self, dev: BlkDev) -> Health {
        if self.state.is_some() {
            return Health::Faulted;
        }
        if dev.validate().is_err() {
            return Health::Faulted;
        }
        let disks = Disks::new(dev);
        let layout = Layout::new(dev.disks, dev.sectors);
        let mut votes = [None; QUORUM];
        for (disk, vote) in votes.iter_mut().enumerate() {
            *vote = label::read_vote(&disks, disk);
        }
        let Assembly { health, label } = label::assemble(votes);
        if health == Health::Faulted {
            error!("metadata quorum disagrees; volume is faulted");
        }
        self.state = Some(Assembled {
            disks,
            layout,
            label,
            health,
            scratch: [0; BYTES_PER_SECTOR],
        });
        health
    }

    /// Persist metadata (unless Faulted), release the device descriptor,
    /// and return to Stopped.
    #[instrument(skip_all)]
    pub fn stop(&mut self) -> Health {
        if let Some(mut a) = self.state.take() {
            if a.health != Health::Faulted {
                a.persist();
            }
        }
        Health::Stopped
    }

    /// Rebuild a replaced device from parity.  No-op unless Degraded.
    #[instrument(skip_all)]
    pub fn resync(&mut self) -> Health {
        match self.state.as_mut() {
            None => Health::Stopped,
            Some(a) => a.resync(),
        }
    }

    pub fn status(&self) -> Health {
        self.state.as_ref().map_or(Health::Stopped, |a| a.health)
    }

    /// Number of addressable logical sectors
    pub fn size(&self) -> SectorT {
        self.state.as_ref().map_or(0, |a| a.layout.size())
    }

    /// Read `dst.len() / BYTES_PER_SECTOR` logical sectors starting at
    /// `from`.
    ///
    /// On failure nothing can be assumed about the contents of `dst`, and
    /// the failing sector is not reported; callers that need it should
    /// issue single-sector reads.
    pub fn read(&mut self, from: SectorT, dst: &mut [u8]) -> Result {
        let a = self.state.as_mut().ok_or(Error::ENXIO)?;
        a.check_span(from, dst.len())?;
        for (i, sector) in
            dst.chunks_exact_mut(BYTES_PER_SECTOR).enumerate()
        {
            a.read_sector(from + i as SectorT, sector)?;
        }
        Ok(())
    }

    /// Write `src.len() / BYTES_PER_SECTOR` logical sectors starting at
    /// `from`.
    pub fn write(&mut self, from: SectorT, src: &[u8]) -> Result {
        let a = self.state.as_mut().ok_or(Error::ENXIO)?;
        a.check_span(from, src.len())?;
        for (i, sector) in src.chunks_exact(BYTES_PER_SECTOR).enumerate() {
            a.write_sector(from + i as SectorT, sector)?;
        }
        Ok(())
    }
}

impl Assembled {
    fn check_span(&self, from: SectorT, len: usize) -> Result {
        if self.health == Health::Faulted {
            return Err(Error::EIO);
        }
        if len % BYTES_PER_SECTOR != 0 {
            return Err(Error::EINVAL);
        }
        match from.checked_add(buf_sectors(len)) {
            Some(end) if end <= self.layout.size() => Ok(()),
            _ => Err(Error::EINVAL),
        }
    }

    /// Record the first observed device fault.
    fn degrade(&mut self, disk: usize) {
        debug_assert_eq!(self.health, Health::Online);
        warn!(disk, "device fault; volume is degraded");
        self.health = Health::Degraded;
        self.label.mark_failed(disk);
    }

    /// Record a fault beyond the first.  Terminal until `stop`.
    fn fault(&mut self) -> Error {
        error!("device fault on a degraded volume; volume is faulted");
        self.health = Health::Faulted;
        Error::EIO
    }

    fn read_sector(&mut self, lsec: SectorT, buf: &mut [u8]) -> Result {
        let loc = self.layout.locate(lsec);
        loop {
            match self.health {
                Health::Degraded
                    if self.label.failed() == Some(loc.disk) =>
                {
                    // Dead data device: rebuild its column from the rest
                    // of the row.
                    return xor_row_excluding(&self.disks, loc.disk,
                                             loc.offset, buf,
                                             &mut self.scratch)
                        .map_err(|_| self.fault());
                }
                Health::Degraded => {
                    return self.disks
                        .read_sector(loc.disk, loc.offset, buf)
                        .map_err(|_| self.fault());
                }
                Health::Online => {
                    if self.disks
                        .read_sector(loc.disk, loc.offset, buf)
                        .is_ok()
                    {
                        return Ok(());
                    }
                    self.degrade(loc.disk);
                    // Go around again for the same logical sector
                }
                _ => return Err(Error::EIO),
            }
        }
    }

    fn write_sector(&mut self, lsec: SectorT, buf: &[u8]) -> Result {
        let loc = self.layout.locate(lsec);
        loop {
            match self.health {
                Health::Online => {
                    if self.disks
                        .write_sector(loc.disk, loc.offset, buf)
                        .is_err()
                    {
                        self.degrade(loc.disk);
                        continue;
                    }
                    // Recompute the row's parity from its data columns,
                    // the just-written one included.
                    let mut pbuf = [0u8; BYTES_PER_SECTOR];
                    match xor_row_excluding(&self.disks, loc.parity_disk,
                                            loc.offset, &mut pbuf,
                                            &mut self.scratch)
                    {
                        Ok(()) => {}
                        Err(culprit) => {
                            self.degrade(culprit);
                            continue;
                        }
                    }
                    if self.disks
                        .write_sector(loc.parity_disk, loc.offset, &pbuf)
                        .is_err()
                    {
                        self.degrade(loc.parity_disk);
                        continue;
                    }
                    return Ok(());
                }
                Health::Degraded => {
                    let failed = self.label.failed().unwrap();
                    return self.write_sector_degraded(loc, failed, buf);
                }
                _ => return Err(Error::EIO),
            }
        }
    }

    fn write_sector_degraded(&mut self, loc: Chunkloc, failed: usize,
                             buf: &[u8]) -> Result
    {
        let mut pbuf = [0u8; BYTES_PER_SECTOR];
        if loc.disk == failed {
            // The data device is dead.  Fold the new contents into the
            // row's parity instead; reads will rebuild them from there.
            parity_with_substitute(&self.disks, loc.parity_disk, failed,
                                   buf, loc.offset, &mut pbuf,
                                   &mut self.scratch)
                .map_err(|_| self.fault())?;
            self.disks.write_sector(loc.parity_disk, loc.offset, &pbuf)
                .map_err(|_| self.fault())?;
            Ok(())
        } else if loc.parity_disk == failed {
            // This row has no parity to maintain
            self.disks.write_sector(loc.disk, loc.offset, buf)
                .map_err(|_| self.fault())
        } else {
            // Both devices of interest are live, but the parity must keep
            // covering the dead column.  Capture that column before the
            // data write destroys the information needed to derive it.
            let mut dead = [0u8; BYTES_PER_SECTOR];
            xor_row_excluding(&self.disks, failed, loc.offset, &mut dead,
                              &mut self.scratch)
                .map_err(|_| self.fault())?;
            self.disks.write_sector(loc.disk, loc.offset, buf)
                .map_err(|_| self.fault())?;
            parity_with_substitute(&self.disks, loc.parity_disk, failed,
                                   &dead, loc.offset, &mut pbuf,
                                   &mut self.scratch)
                .map_err(|_| self.fault())?;
            self.disks.write_sector(loc.parity_disk, loc.offset, &pbuf)
                .map_err(|_| self.fault())
        }
    }

    /// Bump the generation and write the label to every live device.
    fn persist(&mut self) {
        self.label.timestamp += 1;
        'sweep: loop {
            for disk in 0..self.disks.disks() {
                if self.label.failed() == Some(disk) {
                    continue;
                }
                if label::write_label(&self.disks, disk, &self.label)
                    .is_ok()
                {
                    continue;
                }
                if self.health == Health::Online {
                    // First fault: restart so the devices already written
                    // observe the updated record.
                    self.degrade(disk);
                    continue 'sweep;
                }
                // Second fault.  One last best-effort pass so any
                // reachable device records the loss, then give up.
                self.fault();
                self.label.mark_failed(disk);
                for d in 0..self.disks.disks() {
                    let _ = label::write_label(&self.disks, d, &self.label);
                }
                return;
            }
            return;
        }
    }

    fn resync(&mut self) -> Health {
        if self.health != Health::Degraded {
            return self.health;
        }
        let failed = self.label.failed().unwrap();
        let mut buf = [0u8; BYTES_PER_SECTOR];
        for row in 0..self.layout.datarows() {
            if xor_row_excluding(&self.disks, failed, row, &mut buf,
                                 &mut self.scratch).is_err()
            {
                self.fault();
                return self.health;
            }
            if self.disks.write_sector(failed, row, &buf).is_err() {
                // The replacement is still unhealthy; stay degraded
                warn!(disk = failed, "replacement faulted during rebuild");
                return self.health;
            }
        }
        // All rows rebuilt.  Refresh the metadata, replaced device first,
        // so a crash mid-sweep can't make the quorum believe the rebuild
        // finished when the replacement never got its label.
        let fresh = Label::clean(self.label.timestamp);
        if label::write_label(&self.disks, failed, &fresh).is_err() {
            return self.health;
        }
        for disk in 0..self.disks.disks() {
            if disk == failed {
                continue;
            }
            if label::write_label(&self.disks, disk, &fresh).is_err() {
                warn!(disk, "device fault during resync metadata sweep");
                self.label.mark_failed(disk);
                return self.health;
            }
        }
        self.label = fresh;
        self.health = Health::Online;
        self.health
    }
}

// LCOV_EXCL_STOP
