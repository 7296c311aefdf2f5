//! # Polling Arbiter
//!
//! Unrelated consumers — connection managers, location agents, diagnostic
//! tools — all have opinions about whether cell info should be polled and
//! how often. [`CellPollControl`] collapses those opinions into one
//! effective policy per modem and pushes it to the bound tracker:
//!
//! - effective `enabled` is the OR of every tag's last-set value,
//! - effective `interval` is the minimum over tags with a finite request,
//!   `i32::MAX` (unbounded) when nobody asked.
//!
//! Consumers are keyed by [`PollTag`] identity. A tag that never asked for
//! anything contributes nothing; revoking a request removes exactly that
//! tag's contribution.
//!
//! One control exists per modem path, handed out by [`ControlRegistry`].
//! The registry keeps weak handles only — when the last [`ControlHandle`]
//! drops, the entry disappears and a later caller starts fresh.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::tracker::CellTracker;

/// Opaque consumer identity. Two tags created separately never compare
/// equal, whatever the consumers behind them do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollTag(u64);

impl PollTag {
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        PollTag(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for PollTag {
    fn default() -> Self {
        Self::new()
    }
}

/// One tag's recorded requests.
#[derive(Debug, Clone, Copy, Default)]
struct TagRequest {
    enabled: bool,
    interval: Option<i32>,
}

// ─── Arbiter ────────────────────────────────────────────────────────────────

/// Per-modem polling arbiter.
pub struct CellPollControl {
    modem_path: String,
    requests: HashMap<PollTag, TagRequest>,
    enabled: bool,
    interval: i32,
    tracker: Option<Rc<RefCell<CellTracker>>>,
}

impl CellPollControl {
    pub fn new(modem_path: &str) -> Self {
        CellPollControl {
            modem_path: modem_path.to_string(),
            requests: HashMap::new(),
            enabled: false,
            interval: i32::MAX,
            tracker: None,
        }
    }

    pub fn modem_path(&self) -> &str {
        &self.modem_path
    }

    /// Effective aggregate: should the tracker poll at all.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Effective aggregate interval in ms, `i32::MAX` when unbounded.
    pub fn interval(&self) -> i32 {
        self.interval
    }

    /// Record a tag's enable request.
    pub fn set_enabled(&mut self, tag: PollTag, enabled: bool) {
        self.requests.entry(tag).or_default().enabled = enabled;
        self.apply();
    }

    /// Record a tag's interval request. A non-finite value (negative or
    /// `i32::MAX`) removes the tag's interval contribution rather than
    /// contributing "unbounded".
    pub fn set_interval(&mut self, tag: PollTag, interval_ms: i32) {
        let request = self.requests.entry(tag).or_default();
        request.interval = if (0..i32::MAX).contains(&interval_ms) {
            Some(interval_ms)
        } else {
            None
        };
        self.apply();
    }

    /// Remove every request this tag has made.
    pub fn drop_requests(&mut self, tag: PollTag) {
        if self.requests.remove(&tag).is_some() {
            self.apply();
        }
    }

    /// Remove all requests from all tags, reverting to the default policy.
    pub fn drop_all_requests(&mut self) {
        self.requests.clear();
        self.apply();
    }

    /// Point the arbiter at a tracker (or at nothing). Binding re-applies
    /// the full current aggregate, so a replacement tracker starts from
    /// the effective policy, not from its own defaults.
    pub fn bind(&mut self, tracker: Option<Rc<RefCell<CellTracker>>>) {
        self.tracker = tracker;
        if let Some(tracker) = &self.tracker {
            let mut tracker = tracker.borrow_mut();
            tracker.set_update_interval(self.interval);
            tracker.set_enabled(self.enabled);
        }
    }

    fn apply(&mut self) {
        let enabled = self.requests.values().any(|r| r.enabled);
        let interval = self
            .requests
            .values()
            .filter_map(|r| r.interval)
            .min()
            .unwrap_or(i32::MAX);

        let enabled_changed = enabled != self.enabled;
        let interval_changed = interval != self.interval;
        if !enabled_changed && !interval_changed {
            return;
        }
        self.enabled = enabled;
        self.interval = interval;
        debug!(
            modem = %self.modem_path,
            enabled,
            interval,
            "polling policy recomputed"
        );

        if let Some(tracker) = &self.tracker {
            let mut tracker = tracker.borrow_mut();
            // Interval first, so enabling polls at the effective rate.
            if interval_changed {
                tracker.set_update_interval(interval);
            }
            if enabled_changed {
                tracker.set_enabled(enabled);
            }
        }
    }
}

// ─── Registry ───────────────────────────────────────────────────────────────

/// Hands out the per-modem-path [`CellPollControl`] singletons.
#[derive(Default)]
pub struct ControlRegistry {
    inner: Rc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    controls: RefCell<HashMap<String, Weak<RefCell<CellPollControl>>>>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The control for `modem_path`, creating it on first request. All
    /// live handles for the same path share one control.
    pub fn get_or_create(&self, modem_path: &str) -> ControlHandle {
        let mut controls = self.inner.controls.borrow_mut();
        let control = match controls.get(modem_path).and_then(Weak::upgrade) {
            Some(control) => control,
            None => {
                debug!(modem = modem_path, "creating cell-poll control");
                let control = Rc::new(RefCell::new(CellPollControl::new(modem_path)));
                controls.insert(modem_path.to_string(), Rc::downgrade(&control));
                control
            }
        };
        ControlHandle {
            control,
            registry: Rc::downgrade(&self.inner),
            path: modem_path.to_string(),
        }
    }

    /// Number of live controls.
    pub fn len(&self) -> usize {
        self.inner
            .controls
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A counted reference to a shared [`CellPollControl`]. Dropping the last
/// handle for a path removes the registry entry.
pub struct ControlHandle {
    control: Rc<RefCell<CellPollControl>>,
    registry: Weak<RegistryInner>,
    path: String,
}

impl ControlHandle {
    pub fn borrow(&self) -> Ref<'_, CellPollControl> {
        self.control.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, CellPollControl> {
        self.control.borrow_mut()
    }
}

impl Clone for ControlHandle {
    fn clone(&self) -> Self {
        ControlHandle {
            control: Rc::clone(&self.control),
            registry: self.registry.clone(),
            path: self.path.clone(),
        }
    }
}

impl Drop for ControlHandle {
    fn drop(&mut self) {
        // Last handle out tears the registry entry down.
        if Rc::strong_count(&self.control) == 1 {
            if let Some(inner) = self.registry.upgrade() {
                inner.controls.borrow_mut().remove(&self.path);
                debug!(modem = %self.path, "cell-poll control released");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TrackerAction;

    fn ready_tracker() -> Rc<RefCell<CellTracker>> {
        let tracker = Rc::new(RefCell::new(CellTracker::new()));
        {
            let mut t = tracker.borrow_mut();
            t.set_radio_on(true);
            t.set_sim_ready(true);
            t.drain_actions().for_each(drop);
        }
        tracker
    }

    // ─── Aggregation ────────────────────────────────────────────────────

    #[test]
    fn default_policy_is_disabled_and_unbounded() {
        let control = CellPollControl::new("/ril_0");
        assert!(!control.enabled());
        assert_eq!(control.interval(), i32::MAX);
    }

    #[test]
    fn enabled_is_or_across_tags() {
        let mut control = CellPollControl::new("/ril_0");
        let (t1, t2) = (PollTag::new(), PollTag::new());

        control.set_enabled(t1, false);
        assert!(!control.enabled());

        control.set_enabled(t2, true);
        assert!(control.enabled());

        control.set_enabled(t2, false);
        assert!(!control.enabled());
    }

    #[test]
    fn interval_is_min_across_finite_requests() {
        let mut control = CellPollControl::new("/ril_0");
        let (t1, t2) = (PollTag::new(), PollTag::new());

        control.set_interval(t1, 10);
        assert_eq!(control.interval(), 10);

        control.set_interval(t2, 5);
        assert_eq!(control.interval(), 5);

        // Drop the lower bidder, revert; drop both, unbounded.
        control.drop_requests(t2);
        assert_eq!(control.interval(), 10);

        control.drop_requests(t1);
        assert_eq!(control.interval(), i32::MAX);
        assert!(!control.enabled());
    }

    #[test]
    fn non_finite_interval_removes_contribution() {
        let mut control = CellPollControl::new("/ril_0");
        let (t1, t2) = (PollTag::new(), PollTag::new());

        control.set_interval(t1, 10);
        control.set_interval(t2, 5);
        control.set_interval(t2, -1);
        assert_eq!(control.interval(), 10);

        control.set_interval(t1, i32::MAX);
        assert_eq!(control.interval(), i32::MAX);
    }

    #[test]
    fn drop_all_reverts_to_default() {
        let mut control = CellPollControl::new("/ril_0");
        let tag = PollTag::new();
        control.set_enabled(tag, true);
        control.set_interval(tag, 30);

        control.drop_all_requests();
        assert!(!control.enabled());
        assert_eq!(control.interval(), i32::MAX);
    }

    #[test]
    fn dropping_an_unknown_tag_is_a_noop() {
        let mut control = CellPollControl::new("/ril_0");
        control.drop_requests(PollTag::new());
        assert!(!control.enabled());
    }

    // ─── Tracker binding ────────────────────────────────────────────────

    #[test]
    fn mutations_without_a_tracker_are_noops() {
        let mut control = CellPollControl::new("/ril_0");
        control.set_enabled(PollTag::new(), true);
        control.set_interval(PollTag::new(), 100);
        assert!(control.enabled());
    }

    #[test]
    fn policy_changes_reach_the_bound_tracker() {
        let tracker = ready_tracker();
        let mut control = CellPollControl::new("/ril_0");
        control.bind(Some(tracker.clone()));
        tracker.borrow_mut().drain_actions().for_each(drop);

        let tag = PollTag::new();
        control.set_interval(tag, 5000);
        control.set_enabled(tag, true);

        let mut t = tracker.borrow_mut();
        assert!(t.enabled());
        assert_eq!(t.update_interval(), 5000);
        let actions: Vec<_> = t.drain_actions().collect();
        assert!(
            actions
                .iter()
                .any(|a| matches!(a, TrackerAction::QueryCells { .. })),
            "enabling through the arbiter must poll, got {actions:?}"
        );
    }

    #[test]
    fn unchanged_aggregate_is_not_forwarded() {
        let tracker = ready_tracker();
        let mut control = CellPollControl::new("/ril_0");
        control.bind(Some(tracker.clone()));
        tracker.borrow_mut().drain_actions().for_each(drop);

        let (t1, t2) = (PollTag::new(), PollTag::new());
        control.set_interval(t1, 10);
        tracker.borrow_mut().drain_actions().for_each(drop);

        // A weaker bid changes nothing effective.
        control.set_interval(t2, 20);
        assert_eq!(tracker.borrow_mut().drain_actions().count(), 0);
    }

    #[test]
    fn bind_applies_the_aggregate_to_a_replacement() {
        let mut control = CellPollControl::new("/ril_0");
        let tag = PollTag::new();
        control.set_enabled(tag, true);
        control.set_interval(tag, 750);

        let replacement = ready_tracker();
        control.bind(Some(replacement.clone()));

        let t = replacement.borrow();
        assert!(t.enabled());
        assert_eq!(t.update_interval(), 750);
    }

    #[test]
    fn bind_none_detaches() {
        let tracker = ready_tracker();
        let mut control = CellPollControl::new("/ril_0");
        control.bind(Some(tracker.clone()));
        control.bind(None);

        control.set_enabled(PollTag::new(), true);
        // Tracker saw the bind-time aggregate only.
        assert!(!tracker.borrow().enabled());
    }

    // ─── Registry ───────────────────────────────────────────────────────

    #[test]
    fn same_path_shares_one_control() {
        let registry = ControlRegistry::new();
        let a = registry.get_or_create("/ril_0");
        let b = registry.get_or_create("/ril_0");

        let tag = PollTag::new();
        a.borrow_mut().set_enabled(tag, true);
        assert!(b.borrow().enabled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn different_paths_are_independent() {
        let registry = ControlRegistry::new();
        let a = registry.get_or_create("/ril_0");
        let b = registry.get_or_create("/ril_1");

        a.borrow_mut().set_enabled(PollTag::new(), true);
        assert!(!b.borrow().enabled());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn last_handle_out_clears_the_entry() {
        let registry = ControlRegistry::new();
        let a = registry.get_or_create("/ril_0");
        let b = a.clone();
        a.borrow_mut().set_enabled(PollTag::new(), true);

        drop(a);
        assert_eq!(registry.len(), 1, "entry must survive while a handle lives");
        drop(b);
        assert_eq!(registry.len(), 0);

        // A later caller starts from the default policy.
        let fresh = registry.get_or_create("/ril_0");
        assert!(!fresh.borrow().enabled());
    }
}
