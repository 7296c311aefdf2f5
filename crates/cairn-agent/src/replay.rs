//! Scenario replay — drives the full pipeline without a modem.
//!
//! A scenario is a JSON array of steps. Cell lists are given in typed
//! form and round-tripped through the parcel codec on the way in, so a
//! replay exercises the same decode path a live radio would:
//!
//! ```json
//! [
//!   { "event": "radio", "on": true },
//!   { "event": "sim", "ready": true },
//!   { "event": "cells", "cells": [
//!       { "type": "gsm", "registered": true, "mcc": 244, "mnc": 5,
//!         "lac": 9007, "cid": 42335, "signal_strength": 26,
//!         "bit_error_rate": 99 } ] },
//!   { "event": "policy", "enabled": false }
//! ]
//! ```
//!
//! Every bus signal produced along the way is printed as one JSON line.

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info};

use cairn_cellinfo::bus::RecordingBus;
use cairn_cellinfo::config::CellInfoConfig;
use cairn_cellinfo::control::{ControlHandle, ControlRegistry, PollTag};
use cairn_cellinfo::projector::CellProjector;
use cairn_cellinfo::tracker::{CellTracker, RequestHandle, TrackerAction, TrackerEvent};
use cairn_ril::cell::Cell;
use cairn_ril::decode::encode_cell_list;

/// One scenario step.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Step {
    /// Radio power state change.
    Radio { on: bool },
    /// SIM readiness change.
    Sim { ready: bool },
    /// A cell list from the radio: completes the outstanding poll if one
    /// exists, otherwise arrives as an unsolicited push.
    Cells { cells: Vec<Cell> },
    /// The replay consumer's polling policy change.
    Policy {
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        interval_ms: Option<i32>,
    },
    /// Explicit re-query.
    Refresh,
}

pub fn run(file: &Path, config: &CellInfoConfig) -> anyhow::Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("reading scenario {}", file.display()))?;
    let steps: Vec<Step> =
        serde_json::from_str(&text).with_context(|| format!("parsing scenario {}", file.display()))?;

    let mut driver = Driver::new(config)?;
    for step in steps {
        driver.apply(step);
        driver.pump()?;
    }
    info!(signals = driver.printed, "scenario finished");
    Ok(())
}

/// The single-threaded driver loop, one turn per scenario step.
struct Driver {
    tracker: Rc<RefCell<CellTracker>>,
    control: ControlHandle,
    consumer: PollTag,
    projector: CellProjector,
    bus: RecordingBus,
    pending: Option<RequestHandle>,
    printed: usize,
}

impl Driver {
    fn new(config: &CellInfoConfig) -> anyhow::Result<Self> {
        let registry = ControlRegistry::new();
        let tracker = Rc::new(RefCell::new(CellTracker::new()));
        let control = registry.get_or_create(&config.modem_path);
        control.borrow_mut().bind(Some(tracker.clone()));

        let consumer = PollTag::new();
        {
            let mut control = control.borrow_mut();
            control.set_interval(consumer, config.default_interval_ms);
            control.set_enabled(consumer, config.enabled);
        }

        let mut bus = RecordingBus::new();
        let projector = CellProjector::new(&config.modem_path, tracker.borrow().cells(), &mut bus)
            .context("projecting initial cell list")?;

        Ok(Driver {
            tracker,
            control,
            consumer,
            projector,
            bus,
            pending: None,
            printed: 0,
        })
    }

    fn apply(&mut self, step: Step) {
        match step {
            Step::Radio { on } => self.tracker.borrow_mut().set_radio_on(on),
            Step::Sim { ready } => self.tracker.borrow_mut().set_sim_ready(ready),
            Step::Cells { cells } => {
                let mut parcel = encode_cell_list(&cells);
                let mut tracker = self.tracker.borrow_mut();
                match self.pending.take() {
                    Some(handle) => tracker.poll_complete(handle, &mut parcel),
                    None => tracker.push(&mut parcel),
                }
            }
            Step::Policy {
                enabled,
                interval_ms,
            } => {
                let mut control = self.control.borrow_mut();
                if let Some(interval_ms) = interval_ms {
                    control.set_interval(self.consumer, interval_ms);
                }
                if let Some(enabled) = enabled {
                    control.set_enabled(self.consumer, enabled);
                }
            }
            Step::Refresh => self.tracker.borrow_mut().refresh(),
        }
    }

    /// Drain tracker outputs: remember the outstanding query, log
    /// transport commands, project list changes, print new signals.
    fn pump(&mut self) -> anyhow::Result<()> {
        let actions: Vec<TrackerAction> = self.tracker.borrow_mut().drain_actions().collect();
        for action in actions {
            match action {
                TrackerAction::QueryCells { handle } => {
                    debug!(handle, "cell-list query issued");
                    self.pending = Some(handle);
                }
                TrackerAction::CancelQuery { handle } => {
                    debug!(handle, "query cancelled");
                    if self.pending == Some(handle) {
                        self.pending = None;
                    }
                }
                TrackerAction::SetRate {
                    handle,
                    interval_ms,
                } => {
                    debug!(handle, interval_ms, "update rate requested");
                }
            }
        }

        let events: Vec<TrackerEvent> = self.tracker.borrow_mut().drain_events().collect();
        for TrackerEvent::ListChanged in events {
            let tracker = self.tracker.borrow();
            self.projector.sync(tracker.cells(), &mut self.bus);
        }

        for signal in &self.bus.signals[self.printed..] {
            println!("{}", serde_json::to_string(signal)?);
        }
        self.printed = self.bus.signals.len();
        Ok(())
    }
}
