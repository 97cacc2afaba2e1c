// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device handles and their state machines.
//!
//! Every handle is a cheap clone of a shared, lock-protected state machine
//! owned by the [`Connection`](crate::Connection) that created it. Handles
//! compare equal when they refer to the same device on the same connection.
//!
//! Operations that ask the repeater to change something return a
//! [`Completion`], which resolves once the repeater reports the requested
//! state:
//!
//! ```no_run
//! use radiora_lib::{Connection, Level};
//!
//! # async fn example() -> radiora_lib::Result<()> {
//! let conn = Connection::connect("192.168.1.20", "lutron", "integration").await?;
//! let kitchen = conn.dimmer(8);
//!
//! match kitchen.set_level(Level::new(40)?).await.await {
//!     Some(level) => println!("kitchen is at {level}"),
//!     None => println!("connection lost before the repeater confirmed"),
//! }
//! # Ok(())
//! # }
//! ```

mod dimmer;
mod hybrid;
mod keypad;
mod led_group;
mod switch;

pub use dimmer::{Dimmer, LevelChange};
pub use hybrid::HybridKeypad;
pub use keypad::{Keypad, KeypadButton};
pub use led_group::{LedGroup, PendingLedUpdates};
pub use switch::Switch;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::connection::{LineQueue, Outbox};
use crate::error::ParseError;
use crate::protocol::{Category, Command, Operation};

/// Outcome of a state-changing operation.
///
/// Resolves to `Some(value)` once the repeater has reported the requested
/// state, or to `None` when the outcome cannot be known (the connection
/// was lost or closed first). It resolves exactly once.
#[must_use = "a completion does nothing unless awaited or inspected"]
pub struct Completion<T> {
    rx: oneshot::Receiver<Option<T>>,
}

impl<T> Completion<T> {
    pub(crate) fn pending() -> (Resolver<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (Resolver { tx }, Self { rx })
    }

    pub(crate) fn ready(value: T) -> Self {
        let (resolver, completion) = Self::pending();
        resolver.confirm(value);
        completion
    }

    pub(crate) fn unknown() -> Self {
        let (resolver, completion) = Self::pending();
        resolver.unknown();
        completion
    }

    /// Takes the outcome if it is already known.
    ///
    /// Returns `None` while the operation is still in flight. Once the
    /// outcome has been taken, later calls report `Some(None)`.
    pub fn try_take(&mut self) -> Option<Option<T>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(None),
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped resolver means the device went away: unknown outcome.
        Pin::new(&mut self.rx).poll(cx).map(Result::unwrap_or_default)
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// The resolving half of a [`Completion`].
pub(crate) struct Resolver<T> {
    tx: oneshot::Sender<Option<T>>,
}

impl<T> Resolver<T> {
    pub(crate) fn confirm(self, value: T) {
        let _ = self.tx.send(Some(value));
    }

    pub(crate) fn unknown(self) {
        let _ = self.tx.send(None);
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

/// A device state machine as seen by the connection controller.
pub(crate) trait EventTarget: Send + Sync {
    /// Applies the arguments of one `~` event addressed to this device.
    /// Lines the state machine wants written next go to `out`.
    fn handle_event(&self, args: &str, out: &mut dyn LineQueue) -> Result<(), ParseError>;

    /// The session broke: resolve in-flight waiters as unknown and queue
    /// whatever queries rebuild the device's state on the next session.
    fn connection_lost(&self, out: &mut dyn LineQueue);

    /// The connection is gone for good.
    fn shutdown(&self);
}

/// Addressing shared by every device state machine.
#[derive(Debug)]
pub(crate) struct Component {
    category: Category,
    id: u32,
    outbox: Outbox,
}

impl Component {
    pub(crate) fn new(category: Category, id: u32, outbox: Outbox) -> Self {
        Self {
            category,
            id,
            outbox,
        }
    }

    pub(crate) fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub(crate) fn execute(&self, out: &mut dyn LineQueue, args: impl fmt::Display) {
        out.push(self.line(Operation::Execute, args));
    }

    pub(crate) fn query(&self, out: &mut dyn LineQueue, args: impl fmt::Display) {
        out.push(self.line(Operation::Query, args));
    }

    fn line(&self, operation: Operation, args: impl fmt::Display) -> String {
        Command::new(operation, self.category, self.id, args.to_string()).to_string()
    }
}
