// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound line queue shared by every device handle.
//!
//! Device operations reserve queue slots before taking their device lock,
//! then push lines while holding it. Waiting for capacity therefore never
//! happens under a lock, and the lines one device produces reach the wire
//! in the order its state machine produced them.

use tokio::sync::mpsc::{self, PermitIterator};

/// Destination for lines produced by a device state machine.
pub(crate) trait LineQueue {
    fn push(&mut self, line: String);
}

/// Lines produced while the controller handles an event; it writes them
/// itself right after the handler returns.
impl LineQueue for Vec<String> {
    fn push(&mut self, line: String) {
        Vec::push(self, line);
    }
}

/// Sending side of the controller's bounded request queue.
#[derive(Debug, Clone)]
pub(crate) struct Outbox {
    tx: mpsc::Sender<String>,
}

impl Outbox {
    pub(crate) fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Waits until `lines` slots are free and reserves them.
    ///
    /// Returns `None` once the controller has shut down.
    pub(crate) async fn reserve(&self, lines: usize) -> Option<Slots<'_>> {
        match self.tx.reserve_many(lines).await {
            Ok(permits) => Some(Slots { permits }),
            Err(_) => None,
        }
    }

    /// True once the controller has stopped accepting requests.
    ///
    /// Checked under the device lock so that a waiter is either resolved by
    /// the shutdown sweep or never registered.
    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Reserved queue capacity. Unused slots are released on drop.
pub(crate) struct Slots<'a> {
    permits: PermitIterator<'a, String>,
}

impl LineQueue for Slots<'_> {
    fn push(&mut self, line: String) {
        match self.permits.next() {
            Some(permit) => permit.send(line),
            None => tracing::warn!(line = %line, "No queue slot reserved, dropping line"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserved_lines_are_queued_in_order() {
        let (outbox, mut rx) = Outbox::new(4);

        let mut slots = outbox.reserve(2).await.unwrap();
        slots.push("#DEVICE,4,5,3".to_string());
        slots.push("#DEVICE,4,5,4".to_string());
        drop(slots);

        assert_eq!(rx.recv().await.as_deref(), Some("#DEVICE,4,5,3"));
        assert_eq!(rx.recv().await.as_deref(), Some("#DEVICE,4,5,4"));
    }

    #[tokio::test]
    async fn unused_slots_are_released() {
        let (outbox, _rx) = Outbox::new(2);

        let slots = outbox.reserve(2).await.unwrap();
        drop(slots);

        assert!(outbox.reserve(2).await.is_some());
    }

    #[tokio::test]
    async fn overflow_beyond_reservation_is_dropped() {
        let (outbox, mut rx) = Outbox::new(4);

        let mut slots = outbox.reserve(1).await.unwrap();
        slots.push("?OUTPUT,8,1".to_string());
        slots.push("?OUTPUT,9,1".to_string());
        drop(slots);

        assert_eq!(rx.recv().await.as_deref(), Some("?OUTPUT,8,1"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_queue_refuses_reservations() {
        let (outbox, mut rx) = Outbox::new(4);
        rx.close();

        assert!(outbox.is_closed());
        assert!(outbox.reserve(1).await.is_none());
    }
}
