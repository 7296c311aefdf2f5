//! # Typed Cell Records
//!
//! One [`Cell`] is a single reported cell-tower observation: a radio-type
//! tagged identity block plus a registration flag. All scalar fields are
//! signed 32-bit, with [`INVALID`] marking "not reported by the modem".
//!
//! Two notions of equality matter here:
//!
//! - **structural equality** (`==`) — every field identical; used for
//!   whole-list no-op suppression,
//! - **location equality** ([`Cell::location_eq`]) — same radio type and
//!   the same physical-cell identifiers; used to correlate updates to an
//!   already-known tower across signal-strength changes.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::wire::RadioType;

/// Sentinel for "field not reported". Never a real field value.
pub const INVALID: i32 = i32::MAX;

/// Diff-mask bit for the registration flag (field bits start above it).
pub const REGISTERED_BIT: u32 = 1 << 0;

// ─── Per-variant field blocks ───────────────────────────────────────────────

/// GSM cell fields, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GsmCell {
    /// Mobile country code, 0–999.
    pub mcc: i32,
    /// Mobile network code, 0–999.
    pub mnc: i32,
    /// Location area code, 0–65535.
    pub lac: i32,
    /// Cell identity, 0–65535.
    pub cid: i32,
    /// Signal strength, 0–31 (TS 27.007).
    pub signal_strength: i32,
    /// Bit error rate, 0–7 (TS 27.007), 99 when unknown.
    pub bit_error_rate: i32,
}

/// WCDMA cell fields, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WcdmaCell {
    pub mcc: i32,
    pub mnc: i32,
    pub lac: i32,
    /// UMTS cell identity, 0–268435455.
    pub cid: i32,
    /// Primary scrambling code, 0–511.
    pub psc: i32,
    pub signal_strength: i32,
    pub bit_error_rate: i32,
}

/// LTE cell fields, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LteCell {
    pub mcc: i32,
    pub mnc: i32,
    /// Cell identity, 0–268435455.
    pub ci: i32,
    /// Physical cell id, 0–503.
    pub pci: i32,
    /// Tracking area code, 0–65535.
    pub tac: i32,
    pub signal_strength: i32,
    /// Reference signal received power, dBm as reported.
    pub rsrp: i32,
    /// Reference signal received quality, dB as reported.
    pub rsrq: i32,
    /// Reference signal signal-to-noise ratio.
    pub rssnr: i32,
    /// Channel quality indicator, 0–15.
    pub cqi: i32,
    /// Timing advance in µs.
    pub timing_advance: i32,
}

impl Default for GsmCell {
    fn default() -> Self {
        GsmCell {
            mcc: INVALID,
            mnc: INVALID,
            lac: INVALID,
            cid: INVALID,
            signal_strength: INVALID,
            bit_error_rate: INVALID,
        }
    }
}

impl Default for WcdmaCell {
    fn default() -> Self {
        WcdmaCell {
            mcc: INVALID,
            mnc: INVALID,
            lac: INVALID,
            cid: INVALID,
            psc: INVALID,
            signal_strength: INVALID,
            bit_error_rate: INVALID,
        }
    }
}

impl Default for LteCell {
    fn default() -> Self {
        LteCell {
            mcc: INVALID,
            mnc: INVALID,
            ci: INVALID,
            pci: INVALID,
            tac: INVALID,
            signal_strength: INVALID,
            rsrp: INVALID,
            rsrq: INVALID,
            rssnr: INVALID,
            cqi: INVALID,
            timing_advance: INVALID,
        }
    }
}

// ─── Cell identity ──────────────────────────────────────────────────────────

/// Radio-type tagged cell identity.
///
/// CDMA and TD-SCDMA records are recognized on the wire but carry no
/// representation here — the decoder skips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CellIdentity {
    Gsm(GsmCell),
    Wcdma(WcdmaCell),
    Lte(LteCell),
}

impl CellIdentity {
    pub fn radio_type(&self) -> RadioType {
        match self {
            CellIdentity::Gsm(_) => RadioType::Gsm,
            CellIdentity::Wcdma(_) => RadioType::Wcdma,
            CellIdentity::Lte(_) => RadioType::Lte,
        }
    }

    /// Canonical lower-case type name, as exposed on the object bus.
    pub fn type_name(&self) -> &'static str {
        self.radio_type().name()
    }

    /// The property table for this variant, in wire order.
    pub fn properties(&self) -> &'static [PropertyDesc] {
        match self {
            CellIdentity::Gsm(_) => GSM_PROPERTIES,
            CellIdentity::Wcdma(_) => WCDMA_PROPERTIES,
            CellIdentity::Lte(_) => LTE_PROPERTIES,
        }
    }

    /// Order by radio type code, then by the location tuple.
    ///
    /// Location tuples: GSM `(lac, cid)`, WCDMA `(lac, cid, psc)`,
    /// LTE `(ci, pci, tac)`. Signal fields never participate.
    pub fn location_cmp(&self, other: &Self) -> Ordering {
        use CellIdentity::*;
        match (self, other) {
            (Gsm(a), Gsm(b)) => (a.lac, a.cid).cmp(&(b.lac, b.cid)),
            (Wcdma(a), Wcdma(b)) => (a.lac, a.cid, a.psc).cmp(&(b.lac, b.cid, b.psc)),
            (Lte(a), Lte(b)) => (a.ci, a.pci, a.tac).cmp(&(b.ci, b.pci, b.tac)),
            _ => self
                .radio_type()
                .code()
                .cmp(&other.radio_type().code()),
        }
    }

    /// Same radio type and same physical-cell identifiers.
    pub fn location_eq(&self, other: &Self) -> bool {
        self.location_cmp(other) == Ordering::Equal
    }
}

// ─── Cell ───────────────────────────────────────────────────────────────────

/// A single reported cell-tower observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Whether the modem is currently registered on this cell.
    pub registered: bool,
    #[serde(flatten)]
    pub identity: CellIdentity,
}

impl Cell {
    pub fn new(registered: bool, identity: CellIdentity) -> Self {
        Cell {
            registered,
            identity,
        }
    }

    /// Location equality — the registration flag does not participate.
    pub fn location_eq(&self, other: &Cell) -> bool {
        self.identity.location_eq(&other.identity)
    }

    /// Canonical-list ordering — the registration flag does not participate.
    pub fn location_cmp(&self, other: &Cell) -> Ordering {
        self.identity.location_cmp(&other.identity)
    }
}

// ─── Property tables ────────────────────────────────────────────────────────

/// One named scalar field of a cell variant.
///
/// The tables below drive three things with one definition: the wire
/// field order of the encoder, the projector's per-field diff mask, and
/// the property dictionary exposed on the object bus.
pub struct PropertyDesc {
    /// Bus-facing property name.
    pub name: &'static str,
    /// Diff-mask bit. Bit 0 is [`REGISTERED_BIT`]; field bits follow.
    pub bit: u32,
    /// Field accessor. Returns [`INVALID`] on a variant mismatch.
    pub get: fn(&CellIdentity) -> i32,
}

pub static GSM_PROPERTIES: &[PropertyDesc] = &[
    PropertyDesc {
        name: "mcc",
        bit: 1 << 1,
        get: |c| match c {
            CellIdentity::Gsm(g) => g.mcc,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "mnc",
        bit: 1 << 2,
        get: |c| match c {
            CellIdentity::Gsm(g) => g.mnc,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "lac",
        bit: 1 << 3,
        get: |c| match c {
            CellIdentity::Gsm(g) => g.lac,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "cid",
        bit: 1 << 4,
        get: |c| match c {
            CellIdentity::Gsm(g) => g.cid,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "signalStrength",
        bit: 1 << 5,
        get: |c| match c {
            CellIdentity::Gsm(g) => g.signal_strength,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "bitErrorRate",
        bit: 1 << 6,
        get: |c| match c {
            CellIdentity::Gsm(g) => g.bit_error_rate,
            _ => INVALID,
        },
    },
];

pub static WCDMA_PROPERTIES: &[PropertyDesc] = &[
    PropertyDesc {
        name: "mcc",
        bit: 1 << 1,
        get: |c| match c {
            CellIdentity::Wcdma(w) => w.mcc,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "mnc",
        bit: 1 << 2,
        get: |c| match c {
            CellIdentity::Wcdma(w) => w.mnc,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "lac",
        bit: 1 << 3,
        get: |c| match c {
            CellIdentity::Wcdma(w) => w.lac,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "cid",
        bit: 1 << 4,
        get: |c| match c {
            CellIdentity::Wcdma(w) => w.cid,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "psc",
        bit: 1 << 5,
        get: |c| match c {
            CellIdentity::Wcdma(w) => w.psc,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "signalStrength",
        bit: 1 << 6,
        get: |c| match c {
            CellIdentity::Wcdma(w) => w.signal_strength,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "bitErrorRate",
        bit: 1 << 7,
        get: |c| match c {
            CellIdentity::Wcdma(w) => w.bit_error_rate,
            _ => INVALID,
        },
    },
];

pub static LTE_PROPERTIES: &[PropertyDesc] = &[
    PropertyDesc {
        name: "mcc",
        bit: 1 << 1,
        get: |c| match c {
            CellIdentity::Lte(l) => l.mcc,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "mnc",
        bit: 1 << 2,
        get: |c| match c {
            CellIdentity::Lte(l) => l.mnc,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "ci",
        bit: 1 << 3,
        get: |c| match c {
            CellIdentity::Lte(l) => l.ci,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "pci",
        bit: 1 << 4,
        get: |c| match c {
            CellIdentity::Lte(l) => l.pci,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "tac",
        bit: 1 << 5,
        get: |c| match c {
            CellIdentity::Lte(l) => l.tac,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "signalStrength",
        bit: 1 << 6,
        get: |c| match c {
            CellIdentity::Lte(l) => l.signal_strength,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "rsrp",
        bit: 1 << 7,
        get: |c| match c {
            CellIdentity::Lte(l) => l.rsrp,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "rsrq",
        bit: 1 << 8,
        get: |c| match c {
            CellIdentity::Lte(l) => l.rsrq,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "rssnr",
        bit: 1 << 9,
        get: |c| match c {
            CellIdentity::Lte(l) => l.rssnr,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "cqi",
        bit: 1 << 10,
        get: |c| match c {
            CellIdentity::Lte(l) => l.cqi,
            _ => INVALID,
        },
    },
    PropertyDesc {
        name: "timingAdvance",
        bit: 1 << 11,
        get: |c| match c {
            CellIdentity::Lte(l) => l.timing_advance,
            _ => INVALID,
        },
    },
];
