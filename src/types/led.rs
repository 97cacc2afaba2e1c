// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Keypad LED states.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Offset between a button number and the component number of its LED.
///
/// The LED of button 1 is component 81, button 2 is component 82, ...
pub const LED_COMPONENT_OFFSET: u8 = 80;

/// Valid states for an LED on a keypad.
///
/// # Examples
///
/// ```
/// use radiora_lib::types::LedState;
///
/// assert_eq!(LedState::On.as_num(), 1);
/// assert_eq!(LedState::from_num(3).unwrap(), LedState::RapidFlash);
/// assert!(LedState::from_num(7).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedState {
    /// LED is dark.
    Off,
    /// LED is lit.
    On,
    /// One flash every second.
    NormalFlash,
    /// Ten flashes every second.
    RapidFlash,
    /// The repeater does not know the state.
    Undefined,
}

impl LedState {
    /// Returns the numeric code used on the wire.
    #[must_use]
    pub const fn as_num(&self) -> u8 {
        match self {
            Self::Off => 0,
            Self::On => 1,
            Self::NormalFlash => 2,
            Self::RapidFlash => 3,
            Self::Undefined => 255,
        }
    }

    /// Decodes a wire state code.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidLedState` for codes the protocol does
    /// not define.
    pub const fn from_num(code: u8) -> Result<Self, ValueError> {
        match code {
            0 => Ok(Self::Off),
            1 => Ok(Self::On),
            2 => Ok(Self::NormalFlash),
            3 => Ok(Self::RapidFlash),
            255 => Ok(Self::Undefined),
            _ => Err(ValueError::InvalidLedState(code)),
        }
    }

    /// Returns the single-state mask for this state.
    #[must_use]
    pub const fn flag(&self) -> LedStates {
        match self {
            Self::Off => LedStates::OFF,
            Self::On => LedStates::ON,
            Self::NormalFlash => LedStates::NORMAL_FLASH,
            Self::RapidFlash => LedStates::RAPID_FLASH,
            Self::Undefined => LedStates::UNDEFINED,
        }
    }
}

impl fmt::Display for LedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::On => "on",
            Self::NormalFlash => "normal flash",
            Self::RapidFlash => "rapid flash",
            Self::Undefined => "undefined",
        };
        f.write_str(name)
    }
}

bitflags::bitflags! {
    /// Set of LED states an LED monitor wants to hear about.
    ///
    /// The default selects only [`LedState::Off`] and [`LedState::On`];
    /// flashing states are rarer signals most callers do not want.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct LedStates: u8 {
        /// [`LedState::Off`].
        const OFF = 1 << 0;
        /// [`LedState::On`].
        const ON = 1 << 1;
        /// [`LedState::NormalFlash`].
        const NORMAL_FLASH = 1 << 2;
        /// [`LedState::RapidFlash`].
        const RAPID_FLASH = 1 << 3;
        /// [`LedState::Undefined`].
        const UNDEFINED = 1 << 4;
    }
}

impl LedStates {
    /// Returns true if `state` is selected.
    #[must_use]
    pub const fn selects(&self, state: LedState) -> bool {
        self.contains(state.flag())
    }
}

impl Default for LedStates {
    fn default() -> Self {
        Self::OFF | Self::ON
    }
}

impl FromIterator<LedState> for LedStates {
    fn from_iter<I: IntoIterator<Item = LedState>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |mask, state| mask | state.flag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for state in [
            LedState::Off,
            LedState::On,
            LedState::NormalFlash,
            LedState::RapidFlash,
            LedState::Undefined,
        ] {
            assert_eq!(LedState::from_num(state.as_num()).unwrap(), state);
        }
    }

    #[test]
    fn unknown_code_rejected() {
        assert_eq!(LedState::from_num(4), Err(ValueError::InvalidLedState(4)));
    }

    #[test]
    fn default_mask_is_off_and_on() {
        let mask = LedStates::default();
        assert!(mask.selects(LedState::Off));
        assert!(mask.selects(LedState::On));
        assert!(!mask.selects(LedState::NormalFlash));
        assert!(!mask.selects(LedState::Undefined));
    }

    #[test]
    fn mask_from_states() {
        let mask: LedStates = [LedState::NormalFlash, LedState::RapidFlash]
            .into_iter()
            .collect();
        assert_eq!(mask, LedStates::NORMAL_FLASH | LedStates::RAPID_FLASH);
        assert!(!mask.selects(LedState::On));
    }
}
