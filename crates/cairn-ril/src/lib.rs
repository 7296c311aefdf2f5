//! # cairn-ril
//!
//! The vendor radio-interface protocol, cell-info slice. Pure protocol
//! crate — no I/O, no timers, no platform code.
//!
//! The radio reports visible cell towers as a parcel: a stream of 32-bit
//! words carrying a record count followed by per-record headers and
//! type-specific field blocks. This crate turns those bytes into typed
//! [`cell::Cell`] records and back.
//!
//! ## Crate structure
//!
//! - [`wire`] — parcel word primitives, radio type codes, message ids
//! - [`cell`] — typed cell records, location identity, property tables
//! - [`decode`] — cell-list parcel decoding/encoding with skip rules

pub mod cell;
pub mod decode;
pub mod wire;
