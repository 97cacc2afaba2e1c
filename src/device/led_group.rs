// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Radio-button style LED groups.

use crate::device::{Completion, KeypadButton};
use crate::types::LedState;

/// A set of button LEDs of which at most one is lit.
///
/// Buttons may come from different keypads.
///
/// # Examples
///
/// ```no_run
/// use radiora_lib::{Connection, LedGroup};
///
/// # async fn example() -> radiora_lib::Result<()> {
/// let conn = Connection::connect("192.168.1.20", "lutron", "integration").await?;
/// let scenes = conn.keypad(4);
/// let group = LedGroup::new((1..=4).map(|id| scenes.button(id)));
///
/// let all_confirmed = group.select(Some(&scenes.button(2))).await.wait().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LedGroup {
    buttons: Vec<KeypadButton>,
}

impl LedGroup {
    /// Creates a group from its member buttons, in order.
    #[must_use]
    pub fn new(buttons: impl IntoIterator<Item = KeypadButton>) -> Self {
        Self {
            buttons: buttons.into_iter().collect(),
        }
    }

    /// Returns the member buttons.
    #[must_use]
    pub fn buttons(&self) -> &[KeypadButton] {
        &self.buttons
    }

    /// Lights `selected` and turns every other member off. `None` turns
    /// them all off.
    ///
    /// `selected` does not have to be a member; it is lit all the same.
    pub async fn select(&self, selected: Option<&KeypadButton>) -> PendingLedUpdates {
        let mut updates = Vec::with_capacity(self.buttons.len() + 1);
        if let Some(selected) = selected {
            updates.push(selected.set_led(LedState::On).await);
        }
        for button in self.buttons.iter().filter(|b| selected != Some(*b)) {
            updates.push(button.set_led(LedState::Off).await);
        }
        PendingLedUpdates { updates }
    }
}

/// The LED updates issued by [`LedGroup::select`].
#[derive(Debug)]
#[must_use = "LED updates are only confirmed by awaiting them"]
pub struct PendingLedUpdates {
    updates: Vec<Completion<LedState>>,
}

impl PendingLedUpdates {
    /// Waits for every update and returns whether the repeater confirmed
    /// all of them.
    pub async fn wait(self) -> bool {
        let mut confirmed = true;
        for update in self.updates {
            confirmed &= update.await.is_some();
        }
        confirmed
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::connection::Outbox;
    use crate::device::{Component, EventTarget, Keypad};
    use crate::protocol::Category;

    #[tokio::test]
    async fn select_lights_one_member() {
        let (outbox, mut rx) = Outbox::new(8);
        let keypad = Keypad::new(Component::new(Category::Device, 4, outbox));
        let group = LedGroup::new((1..=3).map(|id| keypad.button(id)));

        let pending = group.select(Some(&keypad.button(2))).await;
        let sent: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            sent,
            ["#DEVICE,4,82,9,1", "#DEVICE,4,81,9,0", "#DEVICE,4,83,9,0"]
        );

        let mut out: Vec<String> = Vec::new();
        for args in ["81,9,0", "82,9,1", "83,9,0"] {
            keypad.handle_event(args, &mut out).unwrap();
        }
        assert!(pending.wait().await);
    }

    #[tokio::test]
    async fn select_lights_a_button_outside_the_group() {
        let (outbox, mut rx) = Outbox::new(8);
        let keypad = Keypad::new(Component::new(Category::Device, 4, outbox));
        let group = LedGroup::new([keypad.button(1), keypad.button(2)]);

        let pending = group.select(Some(&keypad.button(3))).await;
        let sent: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            sent,
            ["#DEVICE,4,83,9,1", "#DEVICE,4,81,9,0", "#DEVICE,4,82,9,0"]
        );

        let mut out: Vec<String> = Vec::new();
        for args in ["81,9,0", "82,9,0"] {
            keypad.handle_event(args, &mut out).unwrap();
        }
        let mut pending = Box::pin(pending.wait());
        let early = tokio::time::timeout(Duration::from_millis(10), &mut pending).await;
        assert!(early.is_err());

        keypad.handle_event("83,9,1", &mut out).unwrap();
        assert!(pending.await);
    }

    #[tokio::test]
    async fn lost_update_is_reported() {
        let (outbox, mut rx) = Outbox::new(8);
        let keypad = Keypad::new(Component::new(Category::Device, 4, outbox));
        let group = LedGroup::new([keypad.button(1), keypad.button(2)]);

        let pending = group.select(None).await;
        let mut out: Vec<String> = Vec::new();
        keypad.handle_event("81,9,0", &mut out).unwrap();

        rx.close();
        keypad.shutdown();
        assert!(!pending.wait().await);
    }
}
