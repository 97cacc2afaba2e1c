// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hybrid keypads: a dimmer and a keypad behind one integration id.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::device::{Completion, Dimmer, Keypad, KeypadButton, LevelChange};
use crate::types::Level;

/// Handle to a hybrid keypad.
///
/// The load is reported as an `OUTPUT` and the buttons as a `DEVICE`, both
/// under the same id, so this handle simply pairs the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridKeypad {
    dimmer: Dimmer,
    keypad: Keypad,
}

impl HybridKeypad {
    pub(crate) fn new(dimmer: Dimmer, keypad: Keypad) -> Self {
        Self { dimmer, keypad }
    }

    /// Returns the integration id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.dimmer.id()
    }

    /// Returns the load half.
    #[must_use]
    pub fn dimmer(&self) -> &Dimmer {
        &self.dimmer
    }

    /// Returns the button half.
    #[must_use]
    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    /// Returns one of the keypad's buttons.
    #[must_use]
    pub fn button(&self, id: u8) -> KeypadButton {
        self.keypad.button(id)
    }

    /// See [`Dimmer::on`].
    pub async fn on(&self) -> Completion<Level> {
        self.dimmer.on().await
    }

    /// See [`Dimmer::off`].
    pub async fn off(&self) -> Completion<Level> {
        self.dimmer.off().await
    }

    /// See [`Dimmer::set_level`].
    pub async fn set_level(&self, level: Level) -> Completion<Level> {
        self.dimmer.set_level(level).await
    }

    /// See [`Dimmer::fade`].
    pub async fn fade(&self, level: Level, fade: Duration) -> Completion<Level> {
        self.dimmer.fade(level, fade).await
    }

    /// See [`Dimmer::default_fade`].
    #[must_use]
    pub fn default_fade(&self) -> Duration {
        self.dimmer.default_fade()
    }

    /// See [`Dimmer::set_default_fade`].
    pub fn set_default_fade(&self, fade: Duration) {
        self.dimmer.set_default_fade(fade);
    }

    /// See [`Dimmer::monitor`].
    pub async fn monitor(&self) -> mpsc::UnboundedReceiver<LevelChange> {
        self.dimmer.monitor().await
    }

    /// See [`Dimmer::add_monitor`].
    pub async fn add_monitor(&self, sink: mpsc::UnboundedSender<LevelChange>) {
        self.dimmer.add_monitor(sink).await;
    }

    /// See [`Dimmer::level`].
    pub async fn level(&self) -> Option<Level> {
        self.dimmer.level().await
    }

    /// See [`Dimmer::read_level`].
    pub async fn read_level(&self) -> Option<Level> {
        self.dimmer.read_level().await
    }
}
