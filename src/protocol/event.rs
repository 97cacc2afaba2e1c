// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound event decoding.

use crate::error::ParseError;

/// Marker that starts every event line.
const EVENT_MARKER: char = '~';

/// An inbound event split into its routing fields.
///
/// The remainder is left as-is; each device kind decodes its own
/// arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event<'a> {
    /// Category token without the marker (`OUTPUT`, `DEVICE`, ...).
    pub category: &'a str,
    /// Integration id of the device the event is about.
    pub id: u32,
    /// Comma-separated arguments following the id.
    pub rest: &'a str,
}

/// Decodes one trimmed line received from the repeater.
///
/// # Errors
///
/// Returns `ParseError` if the line lacks the `~` marker, has fewer than
/// three comma-separated fields, or the id is not an integer.
///
/// # Examples
///
/// ```
/// use radiora_lib::protocol::parse_event;
///
/// let event = parse_event("~OUTPUT,8,1,50.31").unwrap();
/// assert_eq!(event.category, "OUTPUT");
/// assert_eq!(event.id, 8);
/// assert_eq!(event.rest, "1,50.31");
///
/// assert!(parse_event("#OUTPUT,8,1,50").is_err());
/// ```
pub fn parse_event(line: &str) -> Result<Event<'_>, ParseError> {
    let Some(body) = line.strip_prefix(EVENT_MARKER) else {
        return Err(ParseError::MissingMarker(line.to_string()));
    };

    let mut fields = body.splitn(3, ',');
    let (Some(category), Some(id), Some(rest)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(ParseError::FieldCount {
            expected: 3,
            actual: body.split(',').count(),
        });
    };

    let id = id
        .parse()
        .map_err(|e| ParseError::invalid("integration id", format!("{id:?}: {e}")))?;

    Ok(Event { category, id, rest })
}
