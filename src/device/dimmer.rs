// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dimmer state machine.
//!
//! A dimmer only ever trusts levels reported by the repeater. Requested
//! transitions queue up in order and only the head is sent; the next one
//! is written when the repeater reports the head's level.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::connection::LineQueue;
use crate::device::{Completion, Component, EventTarget, Resolver};
use crate::error::ParseError;
use crate::types::{DEFAULT_FADE, Level, format_fade};

/// Output action carrying the current level.
const ACTION_LEVEL: u8 = 1;
/// Output action sent when a fade reaches its target; the level report
/// carries everything we need.
const ACTION_TARGET_REACHED: u8 = 29;

/// A level reported by the repeater for one dimmer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelChange {
    /// The dimmer whose level changed.
    pub dimmer: Dimmer,
    /// The newly reported level.
    pub level: Level,
}

/// Handle to a dimmable output.
///
/// Obtained from [`Connection::dimmer`](crate::Connection::dimmer). Clones
/// share state.
#[derive(Clone)]
pub struct Dimmer {
    inner: Arc<DimmerInner>,
}

struct DimmerInner {
    component: Component,
    state: Mutex<DimmerState>,
}

#[derive(Default)]
struct DimmerState {
    /// Last level reported by the repeater; `None` until the first report.
    level: Option<Level>,
    /// A level query is on the wire.
    querying: bool,
    fade: Option<Duration>,
    readers: Vec<Resolver<Level>>,
    monitors: Vec<mpsc::UnboundedSender<LevelChange>>,
    /// Head is in flight once the level is known.
    pending: VecDeque<Transition>,
}

struct Transition {
    level: Level,
    fade: Duration,
    reply: Resolver<Level>,
}

impl Transition {
    fn args(&self) -> String {
        format!(
            "{ACTION_LEVEL},{},{}",
            self.level.value(),
            format_fade(self.fade)
        )
    }
}

impl DimmerState {
    fn query(&mut self, component: &Component, out: &mut dyn LineQueue) {
        if !self.querying {
            self.querying = true;
            component.query(out, ACTION_LEVEL);
        }
    }
}

impl Dimmer {
    pub(crate) fn new(
        component: Component,
        monitors: Vec<mpsc::UnboundedSender<LevelChange>>,
    ) -> Self {
        Self {
            inner: Arc::new(DimmerInner {
                component,
                state: Mutex::new(DimmerState {
                    monitors,
                    ..DimmerState::default()
                }),
            }),
        }
    }

    /// Returns the integration id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.inner.component.id()
    }

    /// Fades to full brightness using the default fade.
    pub async fn on(&self) -> Completion<Level> {
        self.set_level(Level::FULL).await
    }

    /// Fades to off using the default fade.
    pub async fn off(&self) -> Completion<Level> {
        self.set_level(Level::OFF).await
    }

    /// Fades to `level` using the default fade.
    pub async fn set_level(&self, level: Level) -> Completion<Level> {
        self.fade(level, self.default_fade()).await
    }

    /// Fades to `level` over `fade`.
    ///
    /// The completion resolves once the repeater reports `level`. Asking
    /// for the level the dimmer already reports, with nothing else queued,
    /// resolves immediately without touching the wire.
    ///
    /// Waits for queue space when the outbound queue is full.
    pub async fn fade(&self, level: Level, fade: Duration) -> Completion<Level> {
        let component = &self.inner.component;
        let Some(mut out) = component.outbox().reserve(1).await else {
            return Completion::unknown();
        };

        let mut state = self.inner.state.lock();
        if component.outbox().is_closed() {
            return Completion::unknown();
        }
        // The repeater never reports a change to the level it is already at.
        if state.pending.is_empty() && state.level == Some(level) {
            return Completion::ready(level);
        }

        let (reply, completion) = Completion::pending();
        let transition = Transition { level, fade, reply };
        if state.level.is_none() {
            // Sent once the query answer tells us where we start from.
            state.query(component, &mut out);
        } else if state.pending.is_empty() {
            component.execute(&mut out, transition.args());
        }
        state.pending.push_back(transition);
        tracing::debug!(
            id = self.id(),
            %level,
            ?fade,
            queued = state.pending.len(),
            "Dimmer transition requested"
        );
        completion
    }

    /// Returns the fade used by [`on`](Self::on), [`off`](Self::off) and
    /// [`set_level`](Self::set_level).
    #[must_use]
    pub fn default_fade(&self) -> Duration {
        self.inner.state.lock().fade.unwrap_or(DEFAULT_FADE)
    }

    /// Overrides the default fade for this dimmer.
    pub fn set_default_fade(&self, fade: Duration) {
        self.inner.state.lock().fade = Some(fade);
    }

    /// Streams every level change of this dimmer.
    ///
    /// The current level is delivered first if it is known; otherwise it is
    /// queried. Dropping the receiver ends the subscription.
    pub async fn monitor(&self) -> mpsc::UnboundedReceiver<LevelChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.add_monitor(tx).await;
        rx
    }

    /// Like [`monitor`](Self::monitor), delivering into an existing channel
    /// so several dimmers can share one stream.
    pub async fn add_monitor(&self, sink: mpsc::UnboundedSender<LevelChange>) {
        let component = &self.inner.component;
        let Some(mut out) = component.outbox().reserve(1).await else {
            return;
        };

        let mut state = self.inner.state.lock();
        if component.outbox().is_closed() {
            return;
        }
        match state.level {
            Some(level) => {
                let _ = sink.send(LevelChange {
                    dimmer: self.clone(),
                    level,
                });
            }
            None => state.query(component, &mut out),
        }
        state.monitors.push(sink);
    }

    /// Returns the last reported level, querying the repeater only if no
    /// level has been reported yet.
    pub async fn level(&self) -> Option<Level> {
        self.read(true).await
    }

    /// Queries the repeater and returns the level it reports.
    pub async fn read_level(&self) -> Option<Level> {
        self.read(false).await
    }

    async fn read(&self, cached: bool) -> Option<Level> {
        if cached && let Some(level) = self.known_level() {
            return Some(level);
        }
        let component = &self.inner.component;
        let out = component.outbox().reserve(1).await;

        let completion = {
            let mut state = self.inner.state.lock();
            if cached && let Some(level) = state.level {
                return Some(level);
            }
            let Some(mut out) = out else {
                return None;
            };
            if component.outbox().is_closed() {
                return None;
            }
            let (reply, completion) = Completion::pending();
            state.readers.push(reply);
            state.query(component, &mut out);
            completion
        };
        completion.await
    }

    fn known_level(&self) -> Option<Level> {
        self.inner.state.lock().level
    }

    /// Makes sure a level query is under way when nothing is known yet.
    pub(crate) async fn observe(&self) {
        let component = &self.inner.component;
        let Some(mut out) = component.outbox().reserve(1).await else {
            return;
        };

        let mut state = self.inner.state.lock();
        if state.level.is_none() && !component.outbox().is_closed() {
            state.query(component, &mut out);
        }
    }

    fn level_reported(&self, level: Level, out: &mut dyn LineQueue) {
        let component = &self.inner.component;
        let mut state = self.inner.state.lock();

        for reader in state.readers.drain(..) {
            reader.confirm(level);
        }
        state.querying = false;

        if state.level != Some(level) {
            state.level = Some(level);
            let change = LevelChange {
                dimmer: self.clone(),
                level,
            };
            state.monitors.retain(|sink| sink.send(change.clone()).is_ok());
        }

        while let Some(head) = state.pending.front() {
            if head.level != level {
                break;
            }
            if let Some(done) = state.pending.pop_front() {
                done.reply.confirm(level);
            }
        }
        if let Some(next) = state.pending.front() {
            component.execute(out, next.args());
        }
    }
}

impl EventTarget for Dimmer {
    fn handle_event(&self, args: &str, out: &mut dyn LineQueue) -> Result<(), ParseError> {
        let (action, value) = args.split_once(',').unwrap_or((args, ""));
        let action: u8 = action
            .parse()
            .map_err(|e| ParseError::invalid("output action", format!("{action:?}: {e}")))?;

        match action {
            ACTION_LEVEL => {
                let level = Level::from_wire(value)?;
                tracing::trace!(id = self.id(), %level, "Dimmer level reported");
                self.level_reported(level, out);
            }
            ACTION_TARGET_REACHED => {}
            _ => tracing::debug!(id = self.id(), args, "Ignoring output event"),
        }
        Ok(())
    }

    fn connection_lost(&self, out: &mut dyn LineQueue) {
        let component = &self.inner.component;
        let mut state = self.inner.state.lock();

        for transition in state.pending.drain(..) {
            transition.reply.unknown();
        }
        state.monitors.retain(|sink| !sink.is_closed());
        // The answer to a query sent on the dead session will never come.
        state.querying = false;
        if !state.readers.is_empty() || !state.monitors.is_empty() {
            state.query(component, out);
        }
    }

    fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        for transition in state.pending.drain(..) {
            transition.reply.unknown();
        }
        for reader in state.readers.drain(..) {
            reader.unknown();
        }
        state.monitors.clear();
        state.querying = false;
    }
}

impl PartialEq for Dimmer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Dimmer {}

impl fmt::Debug for Dimmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dimmer").field("id", &self.id()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Outbox;
    use crate::protocol::Category;

    fn dimmer(id: u32) -> (Dimmer, mpsc::Receiver<String>) {
        let (outbox, rx) = Outbox::new(16);
        let dimmer = Dimmer::new(Component::new(Category::Output, id, outbox), Vec::new());
        (dimmer, rx)
    }

    fn queued(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn report(dimmer: &Dimmer, args: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        dimmer.handle_event(args, &mut out).unwrap();
        out
    }

    fn level(value: u8) -> Level {
        Level::new(value).unwrap()
    }

    #[tokio::test]
    async fn fade_on_unknown_dimmer_queries_first() {
        let (dimmer, mut rx) = dimmer(8);

        let mut first = dimmer.fade(level(25), Duration::from_secs(2)).await;
        let mut second = dimmer.fade(level(50), Duration::from_secs(2)).await;
        assert_eq!(queued(&mut rx), ["?OUTPUT,8,1"]);

        assert_eq!(report(&dimmer, "1,0.00"), ["#OUTPUT,8,1,25,02.00"]);
        assert_eq!(first.try_take(), None);

        assert_eq!(report(&dimmer, "1,25.00"), ["#OUTPUT,8,1,50,02.00"]);
        assert_eq!(first.try_take(), Some(Some(level(25))));
        assert_eq!(second.try_take(), None);

        assert!(report(&dimmer, "1,50.00").is_empty());
        assert_eq!(second.try_take(), Some(Some(level(50))));
    }

    #[tokio::test]
    async fn fade_to_current_level_needs_no_command() {
        let (dimmer, mut rx) = dimmer(8);
        report(&dimmer, "1,40.00");

        let completion = dimmer.fade(level(40), Duration::from_secs(2)).await;
        assert_eq!(completion.await, Some(level(40)));
        assert!(queued(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn matching_transitions_resolve_together() {
        let (dimmer, mut rx) = dimmer(8);
        report(&dimmer, "1,0.00");

        let mut a = dimmer.fade(level(30), Duration::ZERO).await;
        let mut b = dimmer.fade(level(30), Duration::ZERO).await;
        let mut c = dimmer.fade(level(60), Duration::ZERO).await;
        assert_eq!(queued(&mut rx), ["#OUTPUT,8,1,30,00.00"]);

        assert_eq!(report(&dimmer, "1,30.00"), ["#OUTPUT,8,1,60,00.00"]);
        assert_eq!(a.try_take(), Some(Some(level(30))));
        assert_eq!(b.try_take(), Some(Some(level(30))));
        assert_eq!(c.try_take(), None);
    }

    #[tokio::test]
    async fn queued_transition_to_current_level_still_waits() {
        let (dimmer, mut rx) = dimmer(8);
        report(&dimmer, "1,0.00");

        let _up = dimmer.fade(level(80), Duration::ZERO).await;
        let mut back = dimmer.fade(level(0), Duration::ZERO).await;
        assert_eq!(queued(&mut rx), ["#OUTPUT,8,1,80,00.00"]);
        assert_eq!(back.try_take(), None);
    }

    #[tokio::test]
    async fn monitors_see_each_change_once() {
        let (dimmer, mut rx) = dimmer(8);
        let mut first = dimmer.monitor().await;
        let mut second = dimmer.monitor().await;
        // Only one query while the first is unanswered.
        assert_eq!(queued(&mut rx), ["?OUTPUT,8,1"]);

        report(&dimmer, "1,50.31");
        report(&dimmer, "1,50.00");

        for monitor in [&mut first, &mut second] {
            let change = monitor.try_recv().unwrap();
            assert_eq!(change.dimmer, dimmer);
            assert_eq!(change.level, level(50));
            assert!(monitor.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn monitor_on_known_level_delivers_immediately() {
        let (dimmer, mut rx) = dimmer(8);
        report(&dimmer, "1,75.00");

        let mut monitor = dimmer.monitor().await;
        assert_eq!(monitor.try_recv().unwrap().level, level(75));
        assert!(queued(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn cached_and_forced_reads() {
        let (dimmer, mut rx) = dimmer(8);
        report(&dimmer, "1,20.00");
        assert_eq!(dimmer.level().await, Some(level(20)));
        assert!(queued(&mut rx).is_empty());

        let reader = {
            let dimmer = dimmer.clone();
            tokio::spawn(async move { dimmer.read_level().await })
        };
        assert_eq!(rx.recv().await.as_deref(), Some("?OUTPUT,8,1"));
        report(&dimmer, "1,20.00");
        assert_eq!(reader.await.unwrap(), Some(level(20)));
    }

    #[tokio::test]
    async fn lost_connection_releases_transitions_and_requeries() {
        let (dimmer, mut rx) = dimmer(8);
        let _monitor = dimmer.monitor().await;
        let pending = dimmer.fade(level(10), Duration::ZERO).await;
        assert_eq!(queued(&mut rx), ["?OUTPUT,8,1"]);

        let mut out: Vec<String> = Vec::new();
        dimmer.connection_lost(&mut out);
        assert_eq!(out, ["?OUTPUT,8,1"]);
        assert_eq!(pending.await, None);
    }

    #[tokio::test]
    async fn idle_dimmer_is_not_requeried() {
        let (dimmer, _rx) = dimmer(8);
        report(&dimmer, "1,20.00");

        let mut out: Vec<String> = Vec::new();
        dimmer.connection_lost(&mut out);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn shutdown_releases_everything() {
        let (dimmer, mut rx) = dimmer(8);
        let mut monitor = dimmer.monitor().await;
        let pending = dimmer.fade(level(10), Duration::ZERO).await;
        let reader = {
            let dimmer = dimmer.clone();
            tokio::spawn(async move { dimmer.read_level().await })
        };
        tokio::task::yield_now().await;

        rx.close();
        dimmer.shutdown();
        assert_eq!(pending.await, None);
        assert_eq!(reader.await.unwrap(), None);
        assert!(monitor.recv().await.is_none());
    }

    #[tokio::test]
    async fn closed_queue_means_unknown_outcome() {
        let (dimmer, rx) = dimmer(8);
        drop(rx);

        assert_eq!(dimmer.on().await.await, None);
        assert_eq!(dimmer.level().await, None);
    }

    #[test]
    fn malformed_and_ignored_events() {
        let (dimmer, _rx) = dimmer(8);
        let mut out: Vec<String> = Vec::new();

        assert!(dimmer.handle_event("1,abc", &mut out).is_err());
        assert!(dimmer.handle_event("1,150.00", &mut out).is_err());
        assert!(dimmer.handle_event("x,50", &mut out).is_err());
        assert!(dimmer.handle_event("29,6", &mut out).is_ok());
        assert!(dimmer.handle_event("7,1", &mut out).is_ok());
        assert!(out.is_empty());
    }

    #[test]
    fn default_fade_override() {
        let (dimmer, _rx) = dimmer(8);
        assert_eq!(dimmer.default_fade(), DEFAULT_FADE);

        dimmer.set_default_fade(Duration::from_secs(90));
        assert_eq!(dimmer.default_fade(), Duration::from_secs(90));
    }
}
