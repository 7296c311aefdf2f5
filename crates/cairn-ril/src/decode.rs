//! # Cell-List Parcel Codec
//!
//! Decodes one cell-info parcel into typed [`Cell`] records, and encodes
//! the symmetric form for fixtures and replay captures.
//!
//! Decoding is fail-fast: the first short read abandons the rest of the
//! parcel and returns the records accumulated so far. This matches the
//! deployed radio firmware contract — a malformed tail is never worth a
//! partial re-sync, because the next poll replaces the whole list anyway.
//!
//! Skip rules for recognized-but-unrepresented types: CDMA records carry
//! 10 payload words, TD-SCDMA 6. An unrecognized type code skips zero
//! payload words, so the remainder of the parcel is read misaligned and
//! in practice truncated. Known quirk, kept bug-for-bug.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tracing::{trace, warn};

use crate::cell::{Cell, CellIdentity, GsmCell, LteCell, WcdmaCell};
use crate::wire::{put_i32, read_i32, skip_i32s, RadioType};

/// Number of reserved header words after `(type, registered)`.
const RESERVED_WORDS: usize = 3;

/// Payload words of a CDMA record (skipped whole).
const CDMA_PAYLOAD_WORDS: usize = 10;

/// Payload words of a TD-SCDMA record (skipped whole).
const TDSCDMA_PAYLOAD_WORDS: usize = 6;

#[derive(Debug, Error)]
#[error("cell-info parcel truncated")]
struct Truncated;

// ─── Decode ─────────────────────────────────────────────────────────────────

/// Decode a cell-info parcel into typed records.
///
/// Records come back in wire order; a record fully equal to one already
/// decoded is dropped. Location-level dedup and canonical ordering are
/// list-level concerns and happen where the list is adopted, not here.
pub fn decode_cell_list(buf: &mut impl Buf) -> Vec<Cell> {
    let Some(count) = read_i32(buf) else {
        warn!("cell-info parcel shorter than its count word");
        return Vec::new();
    };

    let mut cells: Vec<Cell> = Vec::new();
    for index in 0..count.max(0) {
        match decode_record(buf) {
            Ok(Some(cell)) => {
                trace!(index, ty = cell.identity.type_name(), "decoded cell record");
                if !cells.contains(&cell) {
                    cells.push(cell);
                }
            }
            Ok(None) => {}
            Err(Truncated) => {
                warn!(
                    index,
                    count, "cell-info parcel truncated, keeping records decoded so far"
                );
                break;
            }
        }
    }
    cells
}

fn decode_record(buf: &mut impl Buf) -> Result<Option<Cell>, Truncated> {
    let ty = word(buf)?;
    let registered = word(buf)? != 0;
    skip_i32s(buf, RESERVED_WORDS).ok_or(Truncated)?;

    let identity = match RadioType::from_code(ty) {
        Some(RadioType::Gsm) => {
            let mcc = word(buf)?;
            let mnc = word(buf)?;
            let lac = word(buf)?;
            let cid = word(buf)?;
            let signal_strength = word(buf)?;
            let bit_error_rate = word(buf)?;
            CellIdentity::Gsm(GsmCell {
                mcc,
                mnc,
                lac,
                cid,
                signal_strength,
                bit_error_rate,
            })
        }
        Some(RadioType::Wcdma) => {
            let mcc = word(buf)?;
            let mnc = word(buf)?;
            let lac = word(buf)?;
            let cid = word(buf)?;
            let psc = word(buf)?;
            let signal_strength = word(buf)?;
            let bit_error_rate = word(buf)?;
            CellIdentity::Wcdma(WcdmaCell {
                mcc,
                mnc,
                lac,
                cid,
                psc,
                signal_strength,
                bit_error_rate,
            })
        }
        Some(RadioType::Lte) => {
            let mcc = word(buf)?;
            let mnc = word(buf)?;
            let ci = word(buf)?;
            let pci = word(buf)?;
            let tac = word(buf)?;
            let signal_strength = word(buf)?;
            let rsrp = word(buf)?;
            let rsrq = word(buf)?;
            let rssnr = word(buf)?;
            let cqi = word(buf)?;
            let timing_advance = word(buf)?;
            CellIdentity::Lte(LteCell {
                mcc,
                mnc,
                ci,
                pci,
                tac,
                signal_strength,
                rsrp,
                rsrq,
                rssnr,
                cqi,
                timing_advance,
            })
        }
        Some(RadioType::Cdma) => {
            skip_i32s(buf, CDMA_PAYLOAD_WORDS).ok_or(Truncated)?;
            return Ok(None);
        }
        Some(RadioType::Tdscdma) => {
            skip_i32s(buf, TDSCDMA_PAYLOAD_WORDS).ok_or(Truncated)?;
            return Ok(None);
        }
        None => {
            // Zero-word skip: the payload of this record will be read as
            // the next record's header.
            trace!(ty, "unrecognized cell record type");
            return Ok(None);
        }
    };

    Ok(Some(Cell {
        registered,
        identity,
    }))
}

#[inline]
fn word(buf: &mut impl Buf) -> Result<i32, Truncated> {
    read_i32(buf).ok_or(Truncated)
}

// ─── Encode ─────────────────────────────────────────────────────────────────

/// Encode a cell list into parcel form.
///
/// Reserved header words are written as zero. The property tables supply
/// the payload in wire order, so encoder and decoder cannot drift apart.
pub fn encode_cell_list(cells: &[Cell]) -> Bytes {
    let mut buf = BytesMut::new();
    put_i32(&mut buf, cells.len() as i32);
    for cell in cells {
        put_i32(&mut buf, cell.identity.radio_type().code());
        put_i32(&mut buf, cell.registered as i32);
        for _ in 0..RESERVED_WORDS {
            put_i32(&mut buf, 0);
        }
        for prop in cell.identity.properties() {
            put_i32(&mut buf, (prop.get)(&cell.identity));
        }
    }
    buf.freeze()
}
