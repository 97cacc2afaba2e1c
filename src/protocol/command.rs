// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound command encoding.

use std::fmt;

/// Monitoring setup written at the start of every session, before any
/// application traffic.
pub const SESSION_SETUP: [&str; 4] = [
    "#MONITORING,1,2", // diagnostic monitoring off
    "#MONITORING,3,1", // button (device) monitoring on
    "#MONITORING,4,1", // LED (device) monitoring on
    "#MONITORING,5,1", // zone (output) monitoring on
];

/// Whether a line changes state or asks for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `#` prefix.
    Execute,
    /// `?` prefix. The repeater answers with a `~` event.
    Query,
}

impl Operation {
    /// Returns the line prefix for this operation.
    #[must_use]
    pub const fn prefix(&self) -> char {
        match self {
            Self::Execute => '#',
            Self::Query => '?',
        }
    }
}

/// Integration command categories understood by this library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Dimmable loads and switches.
    Output,
    /// Keypad buttons and LEDs.
    Device,
    /// Session monitoring switches.
    Monitoring,
}

impl Category {
    /// Returns the wire token.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Output => "OUTPUT",
            Self::Device => "DEVICE",
            Self::Monitoring => "MONITORING",
        }
    }

    /// Looks up a wire token; `None` for categories this library ignores.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "OUTPUT" => Some(Self::Output),
            "DEVICE" => Some(Self::Device),
            "MONITORING" => Some(Self::Monitoring),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single command or query line addressed to one integration id.
///
/// # Examples
///
/// ```
/// use radiora_lib::protocol::{Category, Command, Operation};
///
/// let cmd = Command::new(Operation::Execute, Category::Output, 8, "1,25,02.00");
/// assert_eq!(cmd.to_string(), "#OUTPUT,8,1,25,02.00");
///
/// let query = Command::new(Operation::Query, Category::Device, 4, "81,9");
/// assert_eq!(query.to_string(), "?DEVICE,4,81,9");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    operation: Operation,
    category: Category,
    id: u32,
    args: String,
}

impl Command {
    /// Creates a command line.
    #[must_use]
    pub fn new(operation: Operation, category: Category, id: u32, args: impl Into<String>) -> Self {
        Self {
            operation,
            category,
            id,
            args: args.into(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{},{},{}",
            self.operation.prefix(),
            self.category,
            self.id,
            self.args
        )
    }
}
