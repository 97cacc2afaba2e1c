// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-connection device registry.
//!
//! Holds at most one state machine per `(category, id)`. The registry lock
//! only guards lookup and creation; device locks are always taken after it
//! has been released.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::connection::Outbox;
use crate::device::{Component, Dimmer, EventTarget, Keypad, LevelChange};
use crate::protocol::Category;

pub(crate) struct Registry {
    outbox: Outbox,
    runtime: Handle,
    devices: Mutex<Devices>,
}

#[derive(Default)]
struct Devices {
    dimmers: HashMap<u32, Dimmer>,
    keypads: HashMap<u32, Keypad>,
    /// Sinks attached to every dimmer, including future ones.
    dimmer_monitors: Vec<mpsc::UnboundedSender<LevelChange>>,
}

impl Registry {
    pub(crate) fn new(outbox: Outbox, runtime: Handle) -> Self {
        Self {
            outbox,
            runtime,
            devices: Mutex::new(Devices::default()),
        }
    }

    pub(crate) fn dimmer(&self, id: u32) -> Dimmer {
        let (dimmer, observed) = {
            let mut devices = self.devices.lock();
            if let Some(dimmer) = devices.dimmers.get(&id) {
                return dimmer.clone();
            }
            devices.dimmer_monitors.retain(|sink| !sink.is_closed());
            let dimmer = Dimmer::new(
                Component::new(Category::Output, id, self.outbox.clone()),
                devices.dimmer_monitors.clone(),
            );
            devices.dimmers.insert(id, dimmer.clone());
            (dimmer, !devices.dimmer_monitors.is_empty())
        };

        tracing::debug!(id, "Registered dimmer");
        if observed {
            // Monitors expect a first report for every dimmer.
            let dimmer = dimmer.clone();
            self.runtime.spawn(async move { dimmer.observe().await });
        }
        dimmer
    }

    pub(crate) fn keypad(&self, id: u32) -> Keypad {
        let mut devices = self.devices.lock();
        devices
            .keypads
            .entry(id)
            .or_insert_with(|| {
                tracing::debug!(id, "Registered keypad");
                Keypad::new(Component::new(Category::Device, id, self.outbox.clone()))
            })
            .clone()
    }

    /// Attaches `sink` to every dimmer, present and future.
    ///
    /// Existing dimmers are attached from a spawned task so a slow queue
    /// never blocks the caller.
    pub(crate) fn add_dimmer_monitor(&self, sink: mpsc::UnboundedSender<LevelChange>) {
        let existing: Vec<Dimmer> = {
            let mut devices = self.devices.lock();
            if self.outbox.is_closed() {
                return;
            }
            devices.dimmer_monitors.push(sink.clone());
            devices.dimmers.values().cloned().collect()
        };

        if !existing.is_empty() {
            self.runtime.spawn(async move {
                for dimmer in existing {
                    dimmer.add_monitor(sink.clone()).await;
                }
            });
        }
    }

    /// Returns the state machine an event is addressed to, creating it if
    /// the application has not asked for it yet.
    pub(crate) fn target(&self, category: Category, id: u32) -> Option<Box<dyn EventTarget>> {
        match category {
            Category::Output => Some(Box::new(self.dimmer(id))),
            Category::Device => Some(Box::new(self.keypad(id))),
            Category::Monitoring => None,
        }
    }

    /// Snapshot of every registered state machine.
    pub(crate) fn targets(&self) -> Vec<Box<dyn EventTarget>> {
        let devices = self.devices.lock();
        let dimmers = devices
            .dimmers
            .values()
            .map(|d| Box::new(d.clone()) as Box<dyn EventTarget>);
        let keypads = devices
            .keypads
            .values()
            .map(|k| Box::new(k.clone()) as Box<dyn EventTarget>);
        dimmers.chain(keypads).collect()
    }

    /// Releases every waiter and drops every monitor. The outbound queue
    /// must already be closed.
    pub(crate) fn shutdown(&self) {
        let targets = {
            self.devices.lock().dimmer_monitors.clear();
            self.targets()
        };
        for target in targets {
            target.shutdown();
        }
    }
}
