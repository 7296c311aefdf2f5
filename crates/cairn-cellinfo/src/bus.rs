//! # Object-Bus Boundary
//!
//! The projector exposes cells as externally addressable objects, but the
//! bus transport itself (framing, method dispatch) lives outside this
//! crate. [`ObjectBus`] is the seam: object lifecycle plus signal
//! emission, nothing more. A D-Bus binding, a test recorder, and the
//! replay tool all implement the same trait.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

/// Version reported by every cell object's `GetInterfaceVersion`.
pub const INTERFACE_VERSION: i32 = 1;

/// Failure to register an object path with the bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("object registration failed at {path}: {reason}")]
pub struct RegisterError {
    pub path: String,
    pub reason: String,
}

/// Signals emitted toward bus subscribers.
///
/// Per-entry signals (`Removed`, `RegisteredChanged`, `PropertyChanged`)
/// are addressed to one cell object; the aggregate pair is emitted by the
/// container after a sync pass that added or removed entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum BusSignal {
    CellsAdded {
        paths: Vec<String>,
    },
    CellsRemoved {
        paths: Vec<String>,
    },
    RegisteredChanged {
        path: String,
        registered: bool,
    },
    PropertyChanged {
        path: String,
        name: &'static str,
        value: i32,
    },
    Removed {
        path: String,
    },
}

/// The external object tree, seen from the projector.
pub trait ObjectBus {
    /// Make a cell object addressable at `path`.
    fn register_cell(&mut self, path: &str) -> Result<(), RegisterError>;

    /// Remove the object at `path`. Unknown paths are ignored.
    fn unregister_cell(&mut self, path: &str);

    /// Deliver one signal to subscribers.
    fn emit(&mut self, signal: BusSignal);
}

/// The `GetAll` reply shape of one cell object.
///
/// The property dictionary never contains a field holding the
/// not-reported sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellSnapshot {
    pub version: i32,
    #[serde(rename = "type")]
    pub type_name: &'static str,
    pub registered: bool,
    pub properties: BTreeMap<&'static str, i32>,
}

// ─── Recording implementation ───────────────────────────────────────────────

/// In-memory [`ObjectBus`] keeping the registered object set and the full
/// signal log. Backs the test suites and the replay tool.
#[derive(Debug, Default)]
pub struct RecordingBus {
    pub objects: BTreeSet<String>,
    pub signals: Vec<BusSignal>,
    /// When set, the next registrations fail — for construction-failure
    /// and mid-sync failure tests.
    pub fail_register: bool,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the recorded signals, keeping the object set.
    pub fn clear_signals(&mut self) {
        self.signals.clear();
    }
}

impl ObjectBus for RecordingBus {
    fn register_cell(&mut self, path: &str) -> Result<(), RegisterError> {
        if self.fail_register {
            return Err(RegisterError {
                path: path.to_string(),
                reason: "rejected by recording bus".to_string(),
            });
        }
        self.objects.insert(path.to_string());
        Ok(())
    }

    fn unregister_cell(&mut self, path: &str) {
        self.objects.remove(path);
    }

    fn emit(&mut self, signal: BusSignal) {
        self.signals.push(signal);
    }
}
