// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The connection's event loop.
//!
//! One task owns the writer and serialises everything that reaches the
//! wire: queued device requests, and the follow-up lines device state
//! machines produce while handling events. Follow-ups are written after
//! every request queued before the event was handled. A second task owns
//! the reader and forwards lines through a small buffer.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::connection::{ConnectionState, ReconnectionPolicy, Registry};
use crate::error::ProtocolError;
use crate::protocol::{
    Category, Connector, LineReader, LineWriter, SESSION_SETUP, parse_event,
};

/// Lines the reader may get ahead of the event loop.
const EVENT_BUFFER: usize = 5;

const ERROR_PREFIX: &str = "~ERROR";

/// A logged-in session with monitoring enabled.
pub(crate) struct Session<C: Connector> {
    reader: C::Reader,
    writer: C::Writer,
}

/// Connects, enables monitoring, then writes `replay`.
pub(crate) async fn establish<C: Connector>(
    connector: &C,
    replay: &[String],
) -> Result<Session<C>, ProtocolError> {
    let (reader, mut writer) = connector.connect().await?;
    for line in SESSION_SETUP.iter().copied().chain(replay.iter().map(String::as_str)) {
        tracing::trace!(line, "Sending");
        writer.write_line(line).await?;
    }
    Ok(Session { reader, writer })
}

enum Ended {
    /// Closed by the application.
    Closed,
    Failed(ProtocolError),
}

pub(crate) struct Controller<C: Connector> {
    connector: C,
    policy: ReconnectionPolicy,
    registry: Arc<Registry>,
    requests: mpsc::Receiver<String>,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl<C: Connector> Controller<C> {
    pub(crate) fn new(
        connector: C,
        policy: ReconnectionPolicy,
        registry: Arc<Registry>,
        requests: mpsc::Receiver<String>,
        state: watch::Sender<ConnectionState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connector,
            policy,
            registry,
            requests,
            state,
            cancel,
        }
    }

    pub(crate) async fn run(mut self, mut session: Session<C>) {
        loop {
            match self.serve(session).await {
                Ended::Closed => break,
                Ended::Failed(error) => {
                    tracing::warn!(%error, "Repeater session lost");
                    let mut replay = Vec::new();
                    for target in self.registry.targets() {
                        target.connection_lost(&mut replay);
                    }
                    match self.redial(&replay).await {
                        Some(next) => session = next,
                        None => break,
                    }
                }
            }
        }
        self.shutdown();
    }

    async fn serve(&mut self, session: Session<C>) -> Ended {
        let Session { reader, mut writer } = session;
        let (events_tx, mut events) = mpsc::channel(EVENT_BUFFER);
        let (failed_tx, mut failed) = oneshot::channel();
        let stop = self.cancel.child_token();
        tokio::spawn(read_lines(reader, events_tx, failed_tx, stop.clone()));
        let _stop_reader = stop.drop_guard();

        let mut follow_up = Vec::new();
        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => return Ended::Closed,

                Some(line) = events.recv() => {
                    self.dispatch(&line, &mut follow_up);
                    // Follow-ups come after everything queued before them.
                    let queued = if follow_up.is_empty() { 0 } else { self.requests.len() };
                    for _ in 0..queued {
                        let Ok(line) = self.requests.try_recv() else {
                            break;
                        };
                        if let Err(error) = send(&mut writer, &line).await {
                            return Ended::Failed(error);
                        }
                    }
                    for line in follow_up.drain(..) {
                        if let Err(error) = send(&mut writer, &line).await {
                            return Ended::Failed(error);
                        }
                    }
                }

                result = &mut failed => {
                    return Ended::Failed(result.unwrap_or_else(|_| {
                        ProtocolError::ChannelClosed("reader stopped".to_string())
                    }));
                }

                request = self.requests.recv() => {
                    let Some(line) = request else {
                        return Ended::Closed;
                    };
                    if let Err(error) = send(&mut writer, &line).await {
                        return Ended::Failed(error);
                    }
                }
            }
        }
    }

    fn dispatch(&self, line: &str, follow_up: &mut Vec<String>) {
        if line.starts_with(ERROR_PREFIX) {
            tracing::warn!(line, "Repeater reported an error");
            return;
        }
        let event = match parse_event(line) {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(%error, line, "Dropping undecodable line");
                return;
            }
        };

        let Some(category) = Category::from_token(event.category) else {
            tracing::debug!(category = event.category, "Ignoring event category");
            return;
        };
        match self.registry.target(category, event.id) {
            Some(target) => {
                if let Err(error) = target.handle_event(event.rest, follow_up) {
                    tracing::warn!(%error, line, "Dropping malformed event");
                }
            }
            None => tracing::trace!(line, "Monitoring acknowledged"),
        }
    }

    async fn redial(&mut self, replay: &[String]) -> Option<Session<C>> {
        let mut attempt = 0;
        while self.policy.should_retry(attempt) {
            let _ = self
                .state
                .send(ConnectionState::Reconnecting { attempt: attempt + 1 });
            let delay = self.policy.delay_for_attempt(attempt);
            tracing::info!(attempt = attempt + 1, ?delay, "Redialing repeater");

            let result = tokio::select! {
                () = self.cancel.cancelled() => return None,
                result = async {
                    tokio::time::sleep(delay).await;
                    establish(&self.connector, replay).await
                } => result,
            };
            match result {
                Ok(session) => {
                    tracing::info!(attempt = attempt + 1, "Reconnected to repeater");
                    let _ = self.state.send(ConnectionState::Connected);
                    return Some(session);
                }
                Err(error) => tracing::warn!(%error, attempt = attempt + 1, "Redial failed"),
            }
            attempt += 1;
        }
        None
    }

    fn shutdown(mut self) {
        // Refuse new requests first so every waiter registered from here on
        // sees a closed queue.
        self.requests.close();
        self.registry.shutdown();
        let _ = self.state.send(ConnectionState::Disconnected);
        tracing::info!("Connection closed");
    }
}

async fn send<W: LineWriter>(writer: &mut W, line: &str) -> Result<(), ProtocolError> {
    tracing::trace!(line, "Sending");
    writer.write_line(line).await
}

async fn read_lines<R: LineReader>(
    mut reader: R,
    events: mpsc::Sender<String>,
    failed: oneshot::Sender<ProtocolError>,
    stop: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            () = stop.cancelled() => return,
            result = reader.read_line() => result,
        };
        match result {
            Ok(line) => {
                tracing::trace!(line = %line, "Received");
                if events.send(line).await.is_err() {
                    return;
                }
            }
            Err(error) => {
                let _ = failed.send(error);
                return;
            }
        }
    }
}
