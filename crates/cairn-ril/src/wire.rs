//! # Parcel Wire Primitives
//!
//! The vendor radio interface speaks in parcels: flat streams of 32-bit
//! little-endian words. There is no framing inside a parcel — every field
//! is one word, and record boundaries are implied by the type code read
//! at the head of each record.
//!
//! ```text
//! +----------+----------+------------+---------------+-----------------+
//! | count n  | type     | registered | reserved[3]   | type fields ... |
//! +----------+----------+------------+---------------+-----------------+
//!              `-------- repeated n times --------------------------'
//! ```

use bytes::{Buf, BufMut};

// ─── Message ids ────────────────────────────────────────────────────────────

/// Solicited request: query the full visible cell list.
pub const REQUEST_GET_CELL_INFO_LIST: u32 = 109;

/// Solicited request: set the minimum interval between unsolicited
/// cell-info updates, in milliseconds. `i32::MAX` turns them off.
pub const REQUEST_SET_CELL_INFO_LIST_RATE: u32 = 110;

/// Unsolicited notification carrying a full cell-info parcel.
pub const UNSOL_CELL_INFO_LIST: u32 = 1036;

// ─── Radio type codes ───────────────────────────────────────────────────────

/// Record type codes as they appear on the wire.
///
/// The numeric values match the deployed modem protocol revision and must
/// be treated as opaque at this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum RadioType {
    Gsm = 1,
    Cdma = 2,
    Lte = 3,
    Wcdma = 4,
    Tdscdma = 5,
}

impl RadioType {
    /// Map a wire type code onto a known radio type.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(RadioType::Gsm),
            2 => Some(RadioType::Cdma),
            3 => Some(RadioType::Lte),
            4 => Some(RadioType::Wcdma),
            5 => Some(RadioType::Tdscdma),
            _ => None,
        }
    }

    /// Wire code for this radio type.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Canonical lower-case name, as exposed on the object bus.
    pub fn name(self) -> &'static str {
        match self {
            RadioType::Gsm => "gsm",
            RadioType::Cdma => "cdma",
            RadioType::Lte => "lte",
            RadioType::Wcdma => "wcdma",
            RadioType::Tdscdma => "tdscdma",
        }
    }

    /// Name for an arbitrary wire code, `"unknown"` for unmapped values.
    pub fn name_for_code(code: i32) -> &'static str {
        Self::from_code(code).map_or("unknown", Self::name)
    }
}

// ─── Word primitives ────────────────────────────────────────────────────────

/// Read one parcel word. Returns `None` on a short buffer.
#[inline]
pub fn read_i32(buf: &mut impl Buf) -> Option<i32> {
    if buf.remaining() < 4 {
        return None;
    }
    Some(buf.get_i32_le())
}

/// Write one parcel word.
#[inline]
pub fn put_i32(buf: &mut impl BufMut, value: i32) {
    buf.put_i32_le(value);
}

/// Skip `n` parcel words. Returns `None` if the buffer runs short.
pub fn skip_i32s(buf: &mut impl Buf, n: usize) -> Option<()> {
    let want = n.checked_mul(4)?;
    if buf.remaining() < want {
        return None;
    }
    buf.advance(want);
    Some(())
}
