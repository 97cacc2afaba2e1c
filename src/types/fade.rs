// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fade time encoding for `#OUTPUT` level commands.

use std::time::Duration;

/// Fade used by [`Dimmer::set_level`](crate::Dimmer::set_level) unless the
/// dimmer has its own default.
pub const DEFAULT_FADE: Duration = Duration::from_secs(2);

/// Formats a fade duration for the wire.
///
/// Durations under one minute are sent as `SS.HH` (seconds and
/// hundredths), longer ones as `MM:SS`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use radiora_lib::types::format_fade;
///
/// assert_eq!(format_fade(Duration::from_secs(2)), "02.00");
/// assert_eq!(format_fade(Duration::from_millis(1250)), "01.25");
/// assert_eq!(format_fade(Duration::from_secs(90)), "01:30");
/// ```
#[must_use]
pub fn format_fade(fade: Duration) -> String {
    let secs = fade.as_secs();
    if secs >= 60 {
        format!("{:02}:{:02}", secs / 60, secs % 60)
    } else {
        let hundredths = fade.subsec_millis() / 10;
        format!("{secs:02}.{hundredths:02}")
    }
}
