// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `RadioRA` library.
//!
//! A [`Connection`](crate::Connection) only fails while it is being
//! established. Once a session is running, malformed repeater output is
//! logged and dropped inside the event loop, and a request whose outcome is
//! lost to a disconnect resolves its [`Completion`](crate::Completion) with
//! `None`. The value and parse variants come from the public constructors
//! and decoders such as [`Level::new`](crate::Level::new) and
//! [`parse_event`](crate::protocol::parse_event).

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Error occurred while talking to the main repeater.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while decoding repeater output with
    /// [`parse_event`](crate::protocol::parse_event) or
    /// [`Level::from_wire`](crate::Level::from_wire).
    ///
    /// The connection itself never returns it.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u16,
        /// Maximum allowed value.
        max: u16,
        /// The actual value that was provided.
        actual: u16,
    },

    /// An LED state code not defined by the integration protocol.
    #[error("invalid LED state: {0}")]
    InvalidLedState(u8),

    /// A button action code not defined by the integration protocol.
    #[error("invalid button action: {0}")]
    InvalidButtonAction(u8),
}

/// Errors related to the transport carrying the integration protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Underlying socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection to the repeater failed or was lost.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A read or write did not complete in time.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// Invalid host or port.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The repeater rejected the login credentials.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors related to decoding lines received from the repeater.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line does not start with the `~` event marker.
    #[error("expected ~EVENT, received {0:?}")]
    MissingMarker(String),

    /// The line has fewer fields than the event grammar requires.
    #[error("expected {expected} fields, found {actual}")]
    FieldCount {
        /// Number of fields required.
        expected: usize,
        /// Number of fields present.
        actual: usize,
    },

    /// Failed to parse a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

impl ParseError {
    pub(crate) fn invalid(field: &str, message: impl std::fmt::Display) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
