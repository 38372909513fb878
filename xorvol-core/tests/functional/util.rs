// vim: tw=80
//! A RAM-backed simulated device set with per-device kill switches
//!
//! The volume consumes plain function pointers, which cannot capture state,
//! so the simulated array lives in thread-local storage.  The test harness
//! runs every test on its own thread, which keeps the arrays isolated.

use std::cell::RefCell;

use xorvol_core::{
    blkdev::BlkDev,
    types::SectorT,
    util::BYTES_PER_SECTOR,
};

#[derive(Default)]
struct SimDisk {
    data:        Vec<u8>,
    dead_reads:  bool,
    dead_writes: bool,
}

struct Sim {
    disks:   Vec<SimDisk>,
    sectors: SectorT,
}

thread_local! {
    static SIM: RefCell<Option<Sim>> = const { RefCell::new(None) };
}

fn with<T>(f: impl FnOnce(&mut Sim) -> T) -> T {
    SIM.with(|s| {
        f(s.borrow_mut().as_mut().expect("no simulated array installed"))
    })
}

fn sim_read(disk: usize, sector: SectorT, buf: &mut [u8], cnt: usize)
    -> usize
{
    with(|sim| {
        assert!(sector + cnt as SectorT <= sim.sectors,
                "read past the end of disk {disk}");
        let d = &sim.disks[disk];
        if d.dead_reads {
            return 0;
        }
        let start = sector as usize * BYTES_PER_SECTOR;
        let len = cnt * BYTES_PER_SECTOR;
        buf[..len].copy_from_slice(&d.data[start..start + len]);
        cnt
    })
}

fn sim_write(disk: usize, sector: SectorT, buf: &[u8], cnt: usize) -> usize {
    with(|sim| {
        assert!(sector + cnt as SectorT <= sim.sectors,
                "write past the end of disk {disk}");
        let d = &mut sim.disks[disk];
        if d.dead_writes {
            return 0;
        }
        let start = sector as usize * BYTES_PER_SECTOR;
        let len = cnt * BYTES_PER_SECTOR;
        d.data[start..start + len].copy_from_slice(&buf[..len]);
        cnt
    })
}

/// Install a fresh zero-filled array and return its descriptor.
pub fn setup(disks: usize, sectors: SectorT) -> BlkDev {
    let sim = Sim {
        disks:   (0..disks)
            .map(|_| SimDisk {
                data: vec![0u8; sectors as usize * BYTES_PER_SECTOR],
                ..SimDisk::default()
            })
            .collect(),
        sectors,
    };
    SIM.with(|s| *s.borrow_mut() = Some(sim));
    BlkDev { disks, sectors, read: sim_read, write: sim_write }
}

/// Make every read and write of `disk` fail
pub fn fail_disk(disk: usize) {
    with(|sim| {
        sim.disks[disk].dead_reads = true;
        sim.disks[disk].dead_writes = true;
    })
}

/// Make only reads of `disk` fail
pub fn fail_reads(disk: usize) {
    with(|sim| sim.disks[disk].dead_reads = true)
}

/// Make only writes of `disk` fail
pub fn fail_writes(disk: usize) {
    with(|sim| sim.disks[disk].dead_writes = true)
}

/// Restore service without touching the (stale) contents
pub fn heal_disk(disk: usize) {
    with(|sim| {
        sim.disks[disk].dead_reads = false;
        sim.disks[disk].dead_writes = false;
    })
}

/// Swap in a blank, working replacement device
pub fn replace_disk(disk: usize) {
    with(|sim| {
        sim.disks[disk].data.fill(0);
        sim.disks[disk].dead_reads = false;
        sim.disks[disk].dead_writes = false;
    })
}

/// Snapshot one device's raw contents
pub fn raw(disk: usize) -> Vec<u8> {
    with(|sim| sim.disks[disk].data.clone())
}

/// The `(failed_disk, timestamp)` record a device currently holds
pub fn raw_label(disk: usize) -> (i32, u32) {
    with(|sim| {
        let d = &sim.disks[disk];
        let start = d.data.len() - BYTES_PER_SECTOR;
        let rec = &d.data[start..];
        let failed = i32::from_le_bytes(rec[0..4].try_into().unwrap());
        let timestamp = u32::from_le_bytes(rec[4..8].try_into().unwrap());
        (failed, timestamp)
    })
}
