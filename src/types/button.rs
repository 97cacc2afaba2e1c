// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Keypad button actions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Button numbers of a Pico remote "keypad".
pub mod pico {
    /// Top button.
    pub const ON: u8 = 2;
    /// Middle (favorite) button.
    pub const PRESET: u8 = 3;
    /// Bottom button.
    pub const OFF: u8 = 4;
    /// Raise arrow.
    pub const RAISE: u8 = 5;
    /// Lower arrow.
    pub const LOWER: u8 = 6;
}

/// Action reported for (or sent to) a keypad button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonAction {
    /// The button went down.
    Press,
    /// The button came back up.
    Release,
}

impl ButtonAction {
    /// Returns the numeric code used on the wire.
    #[must_use]
    pub const fn as_num(&self) -> u8 {
        match self {
            Self::Press => 3,
            Self::Release => 4,
        }
    }

    /// Decodes a wire action code.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidButtonAction` for any code other than
    /// press (3) or release (4); hold and multi-tap reports are not modeled.
    pub const fn from_num(code: u8) -> Result<Self, ValueError> {
        match code {
            3 => Ok(Self::Press),
            4 => Ok(Self::Release),
            _ => Err(ValueError::InvalidButtonAction(code)),
        }
    }

    /// Returns the single-action mask for this action.
    #[must_use]
    pub const fn flag(&self) -> ButtonEvents {
        match self {
            Self::Press => ButtonEvents::PRESS,
            Self::Release => ButtonEvents::RELEASE,
        }
    }
}

impl fmt::Display for ButtonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Press => f.write_str("press"),
            Self::Release => f.write_str("release"),
        }
    }
}

bitflags::bitflags! {
    /// Set of button actions a button monitor wants to hear about.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ButtonEvents: u8 {
        /// [`ButtonAction::Press`].
        const PRESS = 1 << 0;
        /// [`ButtonAction::Release`].
        const RELEASE = 1 << 1;
    }
}
