// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lighting level type for dimmable loads.
//!
//! This module provides a type-safe representation of output levels,
//! ensuring values are always within the valid range of 0-100%.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ValueError};

/// Lighting level of a zone as a percentage (0-100).
///
/// The repeater reports levels with two decimals (`"50.31"`); the
/// fractional part is truncated, never rounded.
///
/// # Examples
///
/// ```
/// use radiora_lib::types::Level;
///
/// let level = Level::new(75).unwrap();
/// assert_eq!(level.value(), 75);
///
/// assert_eq!(Level::OFF.value(), 0);
/// assert_eq!(Level::FULL.value(), 100);
///
/// // Invalid values return error
/// assert!(Level::new(101).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Level(u8);

impl Level {
    /// Load off (0%).
    pub const OFF: Self = Self(0);

    /// Load fully on (100%).
    pub const FULL: Self = Self(100);

    /// Creates a new level.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if value exceeds 100.
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if value > 100 {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                actual: u16::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Creates a level, clamping to the valid range.
    ///
    /// # Examples
    ///
    /// ```
    /// use radiora_lib::types::Level;
    ///
    /// assert_eq!(Level::clamped(150).value(), 100);
    /// ```
    #[must_use]
    pub const fn clamped(value: u8) -> Self {
        if value > 100 { Self(100) } else { Self(value) }
    }

    /// Returns the percentage value.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Returns true for any non-zero level.
    ///
    /// Switches only ever report 0 or 100, but dimmers viewed as switches
    /// may sit anywhere in between.
    #[must_use]
    pub const fn is_on(&self) -> bool {
        self.0 != 0
    }

    /// Parses a level as reported by the repeater (`"50.31"`, `"0.00"`,
    /// `"100"`), truncating any fractional part.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidValue` if the integer part is not a
    /// number or is greater than 100.
    ///
    /// # Examples
    ///
    /// ```
    /// use radiora_lib::types::Level;
    ///
    /// assert_eq!(Level::from_wire("50.31").unwrap().value(), 50);
    /// assert_eq!(Level::from_wire("99.99").unwrap().value(), 99);
    /// ```
    pub fn from_wire(s: &str) -> Result<Self, ParseError> {
        let whole = s.split_once('.').map_or(s, |(whole, _)| whole);
        let value: u8 = whole
            .trim()
            .parse()
            .map_err(|e| ParseError::invalid("level", format!("{s:?}: {e}")))?;
        Self::new(value).map_err(|e| ParseError::invalid("level", e))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl TryFrom<u8> for Level {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.0
    }
}
