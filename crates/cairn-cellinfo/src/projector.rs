//! # Cell Object Projector
//!
//! Maps the tracker's canonical list onto stable externally-addressable
//! cell objects. Identity is location-equality: a cell that merely
//! changes signal readings keeps its object, its id, and its path. Only
//! the fields that actually changed are announced, via a per-field diff
//! mask built from the shared property tables.
//!
//! Stable ids are the smallest free non-negative integers: released ids
//! go into a min-heap free-list and are reused before the arena cursor
//! advances.
//!
//! Signal dispatch is batched: a sync pass queues everything it wants to
//! say and only talks to the bus once the entry table is fully
//! consistent, so a subscriber reacting to one signal can never observe
//! (or tear down) a half-applied update.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use thiserror::Error;
use tracing::{debug, warn};

use cairn_ril::cell::{Cell, REGISTERED_BIT};

use crate::bus::{BusSignal, CellSnapshot, ObjectBus, RegisterError, INTERFACE_VERSION};

/// Construction failed because an initial cell object could not be
/// registered with the bus.
#[derive(Debug, Error)]
#[error("cell projector construction failed: {0}")]
pub struct ProjectorError(#[from] RegisterError);

// ─── Entries ────────────────────────────────────────────────────────────────

/// One projected cell object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellEntry {
    stable_id: u32,
    path: String,
    cell: Cell,
}

impl CellEntry {
    pub fn stable_id(&self) -> u32 {
        self.stable_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    /// `GetRegistered`.
    pub fn registered(&self) -> bool {
        self.cell.registered
    }

    /// `GetType`.
    pub fn type_name(&self) -> &'static str {
        self.cell.identity.type_name()
    }

    /// `GetProperties` — every reported scalar field, not-reported
    /// fields omitted.
    pub fn properties(&self) -> BTreeMap<&'static str, i32> {
        let identity = &self.cell.identity;
        identity
            .properties()
            .iter()
            .map(|prop| (prop.name, (prop.get)(identity)))
            .filter(|&(_, value)| value != cairn_ril::cell::INVALID)
            .collect()
    }

    /// `GetAll`.
    pub fn snapshot(&self) -> CellSnapshot {
        CellSnapshot {
            version: INTERFACE_VERSION,
            type_name: self.type_name(),
            registered: self.registered(),
            properties: self.properties(),
        }
    }
}

/// Smallest-free-id arena: a monotonically advancing cursor plus a
/// min-heap of released ids.
#[derive(Debug, Default)]
struct IdPool {
    next: u32,
    free: BinaryHeap<Reverse<u32>>,
}

impl IdPool {
    fn allocate(&mut self) -> u32 {
        match self.free.pop() {
            Some(Reverse(id)) => id,
            None => {
                let id = self.next;
                self.next += 1;
                id
            }
        }
    }

    fn release(&mut self, id: u32) {
        self.free.push(Reverse(id));
    }
}

// ─── Projector ──────────────────────────────────────────────────────────────

/// Keeps the projected entry table synchronized with a canonical list.
pub struct CellProjector {
    modem_path: String,
    entries: Vec<CellEntry>,
    ids: IdPool,
}

impl CellProjector {
    /// Project `initial` silently: the entries exist before any
    /// subscriber could have observed their absence, so nothing is
    /// emitted. A registration failure here is fatal.
    pub fn new(
        modem_path: &str,
        initial: &[Cell],
        bus: &mut dyn ObjectBus,
    ) -> Result<Self, ProjectorError> {
        let mut projector = CellProjector {
            modem_path: modem_path.to_string(),
            entries: Vec::new(),
            ids: IdPool::default(),
        };
        for cell in initial {
            projector.create_entry(*cell, bus)?;
        }
        Ok(projector)
    }

    // ─── Read side ──────────────────────────────────────────────────────

    /// `GetCells` — the live path list, valid at any time.
    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    pub fn entries(&self) -> &[CellEntry] {
        &self.entries
    }

    pub fn entry(&self, path: &str) -> Option<&CellEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ─── Synchronization ────────────────────────────────────────────────

    /// Bring the entry table in line with `cells` and announce the
    /// difference.
    pub fn sync(&mut self, cells: &[Cell], bus: &mut dyn ObjectBus) {
        let mut batch: Vec<BusSignal> = Vec::new();
        let mut added: Vec<String> = Vec::new();
        let mut removed: Vec<String> = Vec::new();

        // Removal pass: entries whose location is gone.
        let mut index = 0;
        while index < self.entries.len() {
            let still_present = cells
                .iter()
                .any(|cell| cell.location_eq(&self.entries[index].cell));
            if still_present {
                index += 1;
                continue;
            }
            let entry = self.entries.remove(index);
            debug!(path = %entry.path, "cell disappeared");
            bus.unregister_cell(&entry.path);
            batch.push(BusSignal::Removed {
                path: entry.path.clone(),
            });
            self.ids.release(entry.stable_id);
            removed.push(entry.path);
        }

        // Upsert pass: correlate by location, diff or create.
        for cell in cells {
            if let Some(entry) = self
                .entries
                .iter_mut()
                .find(|entry| entry.cell.location_eq(cell))
            {
                let mask = diff_mask(&entry.cell, cell);
                if mask == 0 {
                    continue;
                }
                entry.cell = *cell;
                if mask & REGISTERED_BIT != 0 {
                    batch.push(BusSignal::RegisteredChanged {
                        path: entry.path.clone(),
                        registered: cell.registered,
                    });
                }
                for prop in cell.identity.properties() {
                    if mask & prop.bit != 0 {
                        batch.push(BusSignal::PropertyChanged {
                            path: entry.path.clone(),
                            name: prop.name,
                            value: (prop.get)(&cell.identity),
                        });
                    }
                }
            } else {
                match self.create_entry(*cell, bus) {
                    Ok(path) => added.push(path),
                    Err(err) => {
                        warn!(%err, "cell object registration failed, entry dropped");
                    }
                }
            }
        }

        if !added.is_empty() {
            batch.push(BusSignal::CellsAdded { paths: added });
        }
        if !removed.is_empty() {
            batch.push(BusSignal::CellsRemoved { paths: removed });
        }

        // Deferred dispatch: the entry table is consistent from here on.
        for signal in batch {
            bus.emit(signal);
        }
    }

    // ─── Internal ───────────────────────────────────────────────────────

    fn create_entry(&mut self, cell: Cell, bus: &mut dyn ObjectBus) -> Result<String, RegisterError> {
        let stable_id = self.ids.allocate();
        let path = format!("{}/cell_{}", self.modem_path, stable_id);
        if let Err(err) = bus.register_cell(&path) {
            self.ids.release(stable_id);
            return Err(err);
        }
        debug!(path = %path, "cell object registered");
        self.entries.push(CellEntry {
            stable_id,
            path: path.clone(),
            cell,
        });
        Ok(path)
    }
}

/// Bit 0 covers the registration flag, field bits come from the
/// variant's property table.
fn diff_mask(old: &Cell, new: &Cell) -> u32 {
    let mut mask = 0;
    if old.registered != new.registered {
        mask |= REGISTERED_BIT;
    }
    for prop in new.identity.properties() {
        if (prop.get)(&old.identity) != (prop.get)(&new.identity) {
            mask |= prop.bit;
        }
    }
    mask
}
