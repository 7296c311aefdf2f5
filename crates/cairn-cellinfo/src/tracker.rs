//! # Canonical Cell-List Tracker
//!
//! Owns the canonical cell list for one modem and drives its refresh.
//! The tracker is a sans-I/O state machine: inputs arrive as plain method
//! calls (radio/SIM state, poll completions, unsolicited pushes, policy
//! setters), transport commands come back out of [`CellTracker::drain_actions`]
//! and change notifications out of [`CellTracker::drain_events`].
//!
//! ```text
//!   Unavailable ──radio on + SIM ready──▶ Polling
//!        ▲                                  │
//!        └────────radio off / SIM lost──────┘
//! ```
//!
//! In `Polling` there is at most one poll request in flight; a new refresh
//! cancels and replaces the outstanding one, and a completion for a
//! superseded handle is ignored. Losing the radio or the SIM clears the
//! canonical list without touching the transport — the underlying query is
//! documented to fail without a SIM.

use std::collections::VecDeque;

use bytes::Buf;
use thiserror::Error;
use tracing::{debug, trace};

use cairn_ril::cell::Cell;
use cairn_ril::decode::decode_cell_list;

/// Identifies one transport request issued by a tracker.
pub type RequestHandle = u64;

/// Rejection of the fire-and-forget update-rate request.
///
/// Observing one permanently disables future rate requests from the same
/// tracker; it is never surfaced to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cell-info rate request rejected by the modem")]
pub struct RateRejected;

// ─── Outputs ────────────────────────────────────────────────────────────────

/// Transport commands emitted by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerAction {
    /// Issue a cell-list query. The transport retries until it completes
    /// or the handle is cancelled.
    QueryCells { handle: RequestHandle },
    /// Cancel an outstanding query. Always safe, idempotent.
    CancelQuery { handle: RequestHandle },
    /// Fire-and-forget: ask the modem for unsolicited updates at most
    /// every `interval_ms` milliseconds. `i32::MAX` turns them off.
    SetRate {
        handle: RequestHandle,
        interval_ms: i32,
    },
}

/// Change notifications emitted by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEvent {
    /// The canonical list was replaced with structurally different content.
    ListChanged,
}

/// Tracker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// No radio, or SIM not ready. The canonical list is empty.
    Unavailable,
    /// Steady state: a query outstanding, or idle between triggers.
    Polling,
}

// ─── Tracker ────────────────────────────────────────────────────────────────

/// Canonical cell-list owner for one modem.
pub struct CellTracker {
    state: TrackerState,
    radio_on: bool,
    sim_ready: bool,
    enabled: bool,
    interval_ms: i32,
    rate_supported: bool,
    cells: Vec<Cell>,
    pending_query: Option<RequestHandle>,
    next_handle: RequestHandle,
    actions: VecDeque<TrackerAction>,
    events: VecDeque<TrackerEvent>,
}

impl CellTracker {
    /// A fresh tracker: unavailable, enabled, unbounded interval.
    ///
    /// A tracker driven by a polling arbiter receives the arbiter's
    /// aggregate (disabled by default) on bind.
    pub fn new() -> Self {
        CellTracker {
            state: TrackerState::Unavailable,
            radio_on: false,
            sim_ready: false,
            enabled: true,
            interval_ms: i32::MAX,
            rate_supported: true,
            cells: Vec::new(),
            pending_query: None,
            next_handle: 0,
            actions: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    // ─── Read side ──────────────────────────────────────────────────────

    /// The canonical list: sorted, no two location-equal entries.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn update_interval(&self) -> i32 {
        self.interval_ms
    }

    /// Whether a poll request is currently outstanding.
    pub fn query_pending(&self) -> bool {
        self.pending_query.is_some()
    }

    // ─── Inputs: radio state ────────────────────────────────────────────

    pub fn set_radio_on(&mut self, on: bool) {
        if self.radio_on != on {
            self.radio_on = on;
            self.availability_changed();
        }
    }

    pub fn set_sim_ready(&mut self, ready: bool) {
        if self.sim_ready != ready {
            self.sim_ready = ready;
            self.availability_changed();
        }
    }

    // ─── Inputs: transport completions ──────────────────────────────────

    /// Completion of a [`TrackerAction::QueryCells`] request.
    ///
    /// A completion for anything but the current outstanding handle is a
    /// superseded poll and is dropped.
    pub fn poll_complete(&mut self, handle: RequestHandle, parcel: &mut impl Buf) {
        if self.pending_query != Some(handle) {
            debug!(handle, "ignoring superseded poll completion");
            return;
        }
        self.pending_query = None;
        let list = decode_cell_list(parcel);
        self.adopt(list);
    }

    /// Unsolicited cell-info parcel pushed by the radio.
    pub fn push(&mut self, parcel: &mut impl Buf) {
        if !self.available() {
            trace!("dropping unsolicited cell info while unavailable");
            return;
        }
        let list = decode_cell_list(parcel);
        self.adopt(list);
    }

    /// Completion of a [`TrackerAction::SetRate`] request.
    pub fn rate_complete(&mut self, handle: RequestHandle, result: Result<(), RateRejected>) {
        if result.is_err() && self.rate_supported {
            debug!(handle, "modem rejected rate request, disabling future attempts");
            self.rate_supported = false;
        }
    }

    // ─── Inputs: policy ─────────────────────────────────────────────────

    /// Forwarded from the polling arbiter.
    pub fn set_update_interval(&mut self, interval_ms: i32) {
        if self.interval_ms == interval_ms {
            return;
        }
        self.interval_ms = interval_ms;
        self.request_rate();
    }

    /// Forwarded from the polling arbiter. Disabling cancels any
    /// outstanding poll and turns unsolicited updates off; the last
    /// canonical list is retained.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        debug!(enabled, "cell-info polling toggled");
        if enabled {
            self.request_rate();
            self.refresh();
        } else {
            self.cancel_pending();
            self.request_rate();
        }
    }

    // ─── Refresh ────────────────────────────────────────────────────────

    /// Re-query the modem, replacing any outstanding poll. Without radio
    /// and SIM the query would fail, so the list is cleared instead.
    pub fn refresh(&mut self) {
        if !self.available() {
            self.adopt(Vec::new());
            return;
        }
        if !self.enabled {
            return;
        }
        self.cancel_pending();
        let handle = self.allocate_handle();
        self.pending_query = Some(handle);
        self.actions.push_back(TrackerAction::QueryCells { handle });
        trace!(handle, "cell-list query issued");
    }

    // ─── Outputs ────────────────────────────────────────────────────────

    pub fn drain_actions(&mut self) -> impl Iterator<Item = TrackerAction> + '_ {
        self.actions.drain(..)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = TrackerEvent> + '_ {
        self.events.drain(..)
    }

    // ─── Internal ───────────────────────────────────────────────────────

    fn available(&self) -> bool {
        self.radio_on && self.sim_ready
    }

    fn availability_changed(&mut self) {
        if self.available() {
            self.state = TrackerState::Polling;
            debug!("radio and SIM ready, entering polling state");
            self.request_rate();
            self.refresh();
        } else {
            // Cancellation must precede leaving the polling state.
            self.cancel_pending();
            self.state = TrackerState::Unavailable;
            debug!("radio or SIM lost, clearing cell list");
            self.adopt(Vec::new());
        }
    }

    /// Adopt a freshly decoded list as canonical: establish the sorted /
    /// location-deduplicated invariant, then suppress no-op replacements
    /// by whole-list structural equality.
    fn adopt(&mut self, mut list: Vec<Cell>) {
        list.sort_by(Cell::location_cmp);
        // Stable sort: the first reported of two location-equal cells wins.
        list.dedup_by(|a, b| a.location_eq(b));

        if list == self.cells {
            trace!(len = list.len(), "cell list unchanged");
            return;
        }
        debug!(len = list.len(), "cell list replaced");
        self.cells = list;
        self.events.push_back(TrackerEvent::ListChanged);
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending_query.take() {
            self.actions.push_back(TrackerAction::CancelQuery { handle });
        }
    }

    fn request_rate(&mut self) {
        if !self.rate_supported || !self.available() {
            return;
        }
        let interval_ms = if self.enabled {
            self.interval_ms
        } else {
            i32::MAX
        };
        let handle = self.allocate_handle();
        self.actions
            .push_back(TrackerAction::SetRate {
                handle,
                interval_ms,
            });
    }

    fn allocate_handle(&mut self) -> RequestHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl Default for CellTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_ril::cell::{CellIdentity, GsmCell};
    use cairn_ril::decode::encode_cell_list;

    fn gsm(cid: i32, signal: i32) -> Cell {
        Cell::new(
            false,
            CellIdentity::Gsm(GsmCell {
                mcc: 244,
                mnc: 5,
                lac: 9007,
                cid,
                signal_strength: signal,
                bit_error_rate: 99,
            }),
        )
    }

    /// Tracker brought up to `Polling` with its startup actions drained.
    fn ready_tracker() -> CellTracker {
        let mut tracker = CellTracker::new();
        tracker.set_radio_on(true);
        tracker.set_sim_ready(true);
        tracker.drain_actions().for_each(drop);
        tracker
    }

    fn pending_handle(tracker: &mut CellTracker) -> RequestHandle {
        tracker.refresh();
        tracker
            .drain_actions()
            .find_map(|a| match a {
                TrackerAction::QueryCells { handle } => Some(handle),
                _ => None,
            })
            .expect("no query issued")
    }

    fn complete_with(tracker: &mut CellTracker, handle: RequestHandle, cells: &[Cell]) {
        let mut parcel = encode_cell_list(cells);
        tracker.poll_complete(handle, &mut parcel);
    }

    // ─── Availability ───────────────────────────────────────────────────

    #[test]
    fn starts_unavailable_and_silent() {
        let mut tracker = CellTracker::new();
        assert_eq!(tracker.state(), TrackerState::Unavailable);
        assert!(tracker.cells().is_empty());
        assert_eq!(tracker.drain_actions().count(), 0);
        assert_eq!(tracker.drain_events().count(), 0);
    }

    #[test]
    fn radio_alone_is_not_enough() {
        let mut tracker = CellTracker::new();
        tracker.set_radio_on(true);
        assert_eq!(tracker.state(), TrackerState::Unavailable);
        assert_eq!(tracker.drain_actions().count(), 0);
    }

    #[test]
    fn radio_and_sim_enter_polling_and_query() {
        let mut tracker = CellTracker::new();
        tracker.set_radio_on(true);
        tracker.set_sim_ready(true);
        assert_eq!(tracker.state(), TrackerState::Polling);
        let actions: Vec<_> = tracker.drain_actions().collect();
        assert!(
            actions
                .iter()
                .any(|a| matches!(a, TrackerAction::QueryCells { .. })),
            "expected a cell-list query, got {actions:?}"
        );
        assert!(
            actions
                .iter()
                .any(|a| matches!(a, TrackerAction::SetRate { .. })),
            "expected a rate request on becoming available, got {actions:?}"
        );
    }

    // ─── Ingestion ──────────────────────────────────────────────────────

    #[test]
    fn poll_completion_updates_list_once() {
        let mut tracker = ready_tracker();
        let handle = pending_handle(&mut tracker);
        complete_with(&mut tracker, handle, &[gsm(42335, 26)]);
        assert_eq!(tracker.cells(), &[gsm(42335, 26)]);
        assert_eq!(
            tracker.drain_events().collect::<Vec<_>>(),
            vec![TrackerEvent::ListChanged]
        );
        assert!(!tracker.query_pending());
    }

    #[test]
    fn identical_list_is_suppressed() {
        let mut tracker = ready_tracker();
        let handle = pending_handle(&mut tracker);
        complete_with(&mut tracker, handle, &[gsm(42335, 26)]);
        assert_eq!(tracker.drain_events().count(), 1);

        let mut parcel = encode_cell_list(&[gsm(42335, 26)]);
        tracker.push(&mut parcel);
        assert_eq!(tracker.drain_events().count(), 0, "no-op must be silent");
    }

    #[test]
    fn superseded_poll_completion_is_dropped() {
        let mut tracker = ready_tracker();
        let stale = pending_handle(&mut tracker);
        let fresh = pending_handle(&mut tracker);
        assert_ne!(stale, fresh);

        complete_with(&mut tracker, stale, &[gsm(1, 1)]);
        assert!(tracker.cells().is_empty());
        assert_eq!(tracker.drain_events().count(), 0);

        complete_with(&mut tracker, fresh, &[gsm(42335, 26)]);
        assert_eq!(tracker.cells().len(), 1);
    }

    #[test]
    fn refresh_cancels_the_outstanding_query() {
        let mut tracker = ready_tracker();
        let first = pending_handle(&mut tracker);
        tracker.refresh();
        let actions: Vec<_> = tracker.drain_actions().collect();
        assert!(
            actions
                .iter()
                .any(|a| *a == TrackerAction::CancelQuery { handle: first }),
            "expected cancellation of {first}, got {actions:?}"
        );
    }

    #[test]
    fn adopted_list_is_sorted_and_location_deduped() {
        let mut tracker = ready_tracker();
        let handle = pending_handle(&mut tracker);
        // Wire order: out of order, with a location-equal repeat.
        complete_with(
            &mut tracker,
            handle,
            &[gsm(42336, 10), gsm(42335, 26), gsm(42335, 4)],
        );
        assert_eq!(tracker.cells(), &[gsm(42335, 26), gsm(42336, 10)]);
    }

    #[test]
    fn unsolicited_push_applies_when_available() {
        let mut tracker = ready_tracker();
        let mut parcel = encode_cell_list(&[gsm(42335, 26)]);
        tracker.push(&mut parcel);
        assert_eq!(tracker.cells().len(), 1);
        assert_eq!(tracker.drain_events().count(), 1);
    }

    #[test]
    fn unsolicited_push_ignored_when_unavailable() {
        let mut tracker = CellTracker::new();
        let mut parcel = encode_cell_list(&[gsm(42335, 26)]);
        tracker.push(&mut parcel);
        assert!(tracker.cells().is_empty());
        assert_eq!(tracker.drain_events().count(), 0);
    }

    // ─── Availability loss ──────────────────────────────────────────────

    #[test]
    fn sim_loss_cancels_and_clears() {
        let mut tracker = ready_tracker();
        let handle = pending_handle(&mut tracker);
        complete_with(&mut tracker, handle, &[gsm(42335, 26)]);
        tracker.drain_events().for_each(drop);

        let pending = pending_handle(&mut tracker);
        tracker.set_sim_ready(false);
        assert_eq!(tracker.state(), TrackerState::Unavailable);
        assert!(tracker.cells().is_empty());
        assert_eq!(
            tracker.drain_events().collect::<Vec<_>>(),
            vec![TrackerEvent::ListChanged]
        );
        let actions: Vec<_> = tracker.drain_actions().collect();
        assert!(actions.contains(&TrackerAction::CancelQuery { handle: pending }));
    }

    #[test]
    fn losing_radio_with_empty_list_is_silent() {
        let mut tracker = ready_tracker();
        tracker.set_radio_on(false);
        assert_eq!(tracker.drain_events().count(), 0);
    }

    // ─── Policy ─────────────────────────────────────────────────────────

    #[test]
    fn interval_change_requests_new_rate() {
        let mut tracker = ready_tracker();
        tracker.set_update_interval(5000);
        let actions: Vec<_> = tracker.drain_actions().collect();
        assert!(
            actions
                .iter()
                .any(|a| matches!(a, TrackerAction::SetRate { interval_ms: 5000, .. })),
            "expected a 5000 ms rate request, got {actions:?}"
        );

        // Same value again: no request.
        tracker.set_update_interval(5000);
        assert_eq!(tracker.drain_actions().count(), 0);
    }

    #[test]
    fn disable_cancels_and_requests_unbounded_rate() {
        let mut tracker = ready_tracker();
        let pending = pending_handle(&mut tracker);
        tracker.set_enabled(false);
        let actions: Vec<_> = tracker.drain_actions().collect();
        assert!(actions.contains(&TrackerAction::CancelQuery { handle: pending }));
        assert!(
            actions.iter().any(|a| matches!(
                a,
                TrackerAction::SetRate {
                    interval_ms: i32::MAX,
                    ..
                }
            )),
            "disabling must turn unsolicited updates off, got {actions:?}"
        );
    }

    #[test]
    fn disable_retains_the_canonical_list() {
        let mut tracker = ready_tracker();
        let handle = pending_handle(&mut tracker);
        complete_with(&mut tracker, handle, &[gsm(42335, 26)]);
        tracker.set_enabled(false);
        assert_eq!(tracker.cells().len(), 1);
    }

    #[test]
    fn enable_triggers_refresh() {
        let mut tracker = ready_tracker();
        tracker.set_enabled(false);
        tracker.drain_actions().for_each(drop);

        tracker.set_enabled(true);
        let actions: Vec<_> = tracker.drain_actions().collect();
        assert!(
            actions
                .iter()
                .any(|a| matches!(a, TrackerAction::QueryCells { .. })),
            "re-enabling must poll, got {actions:?}"
        );
    }

    #[test]
    fn refresh_while_disabled_does_nothing() {
        let mut tracker = ready_tracker();
        tracker.set_enabled(false);
        tracker.drain_actions().for_each(drop);
        tracker.refresh();
        assert_eq!(tracker.drain_actions().count(), 0);
    }

    #[test]
    fn rate_rejection_disables_future_requests() {
        let mut tracker = ready_tracker();
        tracker.set_update_interval(5000);
        let handle = tracker
            .drain_actions()
            .find_map(|a| match a {
                TrackerAction::SetRate { handle, .. } => Some(handle),
                _ => None,
            })
            .unwrap();
        tracker.rate_complete(handle, Err(RateRejected));

        tracker.set_update_interval(100);
        assert_eq!(
            tracker.drain_actions().count(),
            0,
            "no rate requests after a rejection"
        );
        // The interval itself still tracks the policy.
        assert_eq!(tracker.update_interval(), 100);
    }
}
