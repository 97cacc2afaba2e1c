// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `RadioRA` Lib - A Rust driver for `RadioRA` 2 main repeaters.
//!
//! This library speaks the repeater's integration protocol and keeps a
//! local picture of dimmers and keypads that only ever reflects what the
//! repeater has reported.
//!
//! # Supported Features
//!
//! - **Dimmers and switches**: levels, fades, cached and forced reads
//! - **Keypads**: button presses and monitoring, LED control and monitoring
//! - **LED groups**: radio-button style LEDs across keypads
//! - **Recovery**: waiters are released and state is re-queried when the
//!   session breaks, with optional automatic redial
//!
//! Every state-changing operation returns a [`Completion`] that resolves to
//! the state the repeater confirmed, or to `None` if the outcome is unknown
//! because the connection was lost first.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use radiora_lib::{Connection, LedState, Level};
//!
//! #[tokio::main]
//! async fn main() -> radiora_lib::Result<()> {
//!     let conn = Connection::connect("192.168.1.20", "lutron", "integration").await?;
//!
//!     // Fade the kitchen to 40% over five seconds
//!     let kitchen = conn.dimmer(8);
//!     let confirmed = kitchen.fade(Level::new(40)?, Duration::from_secs(5)).await;
//!     println!("kitchen: {:?}", confirmed.await);
//!
//!     // Watch a keypad button and light its LED when pressed
//!     let scene = conn.keypad(4).button(1);
//!     let mut presses = scene.monitor();
//!     while presses.recv().await.is_some() {
//!         let _ = scene.set_led(LedState::On).await;
//!     }
//!
//!     conn.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Transports
//!
//! The `tcp` feature (on by default) provides the telnet transport used by
//! [`Connection::connect`]. Any other link can be plugged in through the
//! [`protocol::Connector`] trait and [`Connection::with_connector`].

mod connection;
mod device;
pub mod error;
pub mod protocol;
pub mod types;

#[cfg(feature = "tcp")]
pub use connection::ConnectionBuilder;
pub use connection::{Connection, ConnectionConfig, ConnectionState, ReconnectionPolicy};
pub use device::{
    Completion, Dimmer, HybridKeypad, Keypad, KeypadButton, LedGroup, LevelChange,
    PendingLedUpdates, Switch,
};
pub use error::{Error, ParseError, ProtocolError, Result, ValueError};
pub use types::{ButtonAction, ButtonEvents, LedState, LedStates, Level};
