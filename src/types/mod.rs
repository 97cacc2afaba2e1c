// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for repeater integration.
//!
//! Each type ensures values are within their valid ranges at construction
//! time, preventing runtime errors.
//!
//! # Types
//!
//! - [`Level`] - Output level (0-100%)
//! - [`LedState`] / [`LedStates`] - Keypad LED state and sets of states
//! - [`ButtonAction`] / [`ButtonEvents`] - Button actions and sets of actions
//! - [`format_fade`] - Fade time encoding

mod button;
mod fade;
mod led;
mod level;

pub use button::{ButtonAction, ButtonEvents, pico};
pub use fade::{DEFAULT_FADE, format_fade};
pub use led::{LED_COMPONENT_OFFSET, LedState, LedStates};
pub use level::Level;
