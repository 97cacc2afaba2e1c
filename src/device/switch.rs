// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On/off loads.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::device::{Completion, Dimmer, LevelChange};
use crate::types::Level;

/// Handle to a switched output.
///
/// The repeater treats switches as outputs that only ever report 0 or 100,
/// so a switch is a [`Dimmer`] driven without fades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switch {
    dimmer: Dimmer,
}

impl Switch {
    pub(crate) fn new(dimmer: Dimmer) -> Self {
        Self { dimmer }
    }

    /// Returns the integration id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.dimmer.id()
    }

    /// Returns the underlying output handle.
    #[must_use]
    pub fn dimmer(&self) -> &Dimmer {
        &self.dimmer
    }

    /// Turns the load on.
    pub async fn on(&self) -> Completion<Level> {
        self.dimmer.fade(Level::FULL, Duration::ZERO).await
    }

    /// Turns the load off.
    pub async fn off(&self) -> Completion<Level> {
        self.dimmer.fade(Level::OFF, Duration::ZERO).await
    }

    /// Streams every reported change; see [`Dimmer::monitor`].
    pub async fn monitor(&self) -> mpsc::UnboundedReceiver<LevelChange> {
        self.dimmer.monitor().await
    }

    /// Delivers changes into an existing channel; see
    /// [`Dimmer::add_monitor`].
    pub async fn add_monitor(&self, sink: mpsc::UnboundedSender<LevelChange>) {
        self.dimmer.add_monitor(sink).await;
    }

    /// Returns whether the load is on, using the last reported level when
    /// there is one.
    pub async fn status(&self) -> Option<bool> {
        self.dimmer.level().await.map(|level| level.is_on())
    }

    /// Queries the repeater and returns whether the load is on.
    pub async fn read_status(&self) -> Option<bool> {
        self.dimmer.read_level().await.map(|level| level.is_on())
    }
}
