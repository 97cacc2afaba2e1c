// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests driving a full connection through a scripted repeater.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use radiora_lib::protocol::{
    ChannelConnector, ChannelReader, ChannelRepeater, ChannelWriter, Connector, LineWriter,
    RemoteSession, SESSION_SETUP,
};
use radiora_lib::{
    ButtonAction, Connection, ConnectionConfig, ConnectionState, LedGroup, LedState, LedStates,
    Level, ProtocolError, ReconnectionPolicy,
};

async fn connect_with(config: ConnectionConfig) -> (Connection, RemoteSession, ChannelRepeater) {
    let (connector, repeater) = ChannelConnector::new();
    let mut remote = repeater.accept();
    let conn = Connection::with_connector(connector, config).await.unwrap();
    expect_setup(&mut remote).await;
    (conn, remote, repeater)
}

async fn connect() -> (Connection, RemoteSession, ChannelRepeater) {
    connect_with(ConnectionConfig::default()).await
}

async fn expect_setup(remote: &mut RemoteSession) {
    for expected in SESSION_SETUP {
        assert_eq!(remote.recv().await.as_deref(), Some(expected));
    }
}

async fn expect(remote: &mut RemoteSession, line: &str) {
    assert_eq!(remote.recv().await.as_deref(), Some(line));
}

fn level(value: u8) -> Level {
    Level::new(value).unwrap()
}

/// Channel transport whose writer takes one gate permit per line, so a
/// test decides when lines reach the repeater.
struct GatedConnector {
    inner: ChannelConnector,
    gate: Arc<Semaphore>,
}

struct GatedWriter {
    inner: ChannelWriter,
    gate: Arc<Semaphore>,
}

impl Connector for GatedConnector {
    type Reader = ChannelReader;
    type Writer = GatedWriter;

    async fn connect(&self) -> Result<(ChannelReader, GatedWriter), ProtocolError> {
        let (reader, inner) = self.inner.connect().await?;
        let gate = Arc::clone(&self.gate);
        Ok((reader, GatedWriter { inner, gate }))
    }
}

impl LineWriter for GatedWriter {
    async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        self.gate.acquire().await.unwrap().forget();
        self.inner.write_line(line).await
    }
}

/// Connects through a [`GatedConnector`] whose gate is closed once the
/// session setup has been written.
async fn connect_gated(config: ConnectionConfig) -> (Connection, RemoteSession, Arc<Semaphore>) {
    let (inner, repeater) = ChannelConnector::new();
    let mut remote = repeater.accept();
    let gate = Arc::new(Semaphore::new(SESSION_SETUP.len()));
    let connector = GatedConnector {
        inner,
        gate: Arc::clone(&gate),
    };
    let conn = Connection::with_connector(connector, config).await.unwrap();
    expect_setup(&mut remote).await;
    (conn, remote, gate)
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Dimmers
// ============================================================================

mod dimmers {
    use super::*;

    #[tokio::test]
    async fn fade_on_unknown_dimmer() {
        let (conn, mut remote, _repeater) = connect().await;
        let dimmer = conn.dimmer(8);

        let done = dimmer.fade(level(25), Duration::from_secs(2)).await;
        expect(&mut remote, "?OUTPUT,8,1").await;

        remote.send("~OUTPUT,8,1,0.00");
        expect(&mut remote, "#OUTPUT,8,1,25,02.00").await;

        remote.send("~OUTPUT,8,1,25.00");
        assert_eq!(done.await, Some(level(25)));
    }

    #[tokio::test]
    async fn first_report_answers_reader_before_queued_fade() {
        let (conn, mut remote, _repeater) = connect().await;
        let dimmer = conn.dimmer(8);
        let reader = {
            let dimmer = dimmer.clone();
            tokio::spawn(async move { dimmer.read_level().await })
        };
        expect(&mut remote, "?OUTPUT,8,1").await;

        let mut done = dimmer.fade(level(25), Duration::from_secs(2)).await;
        remote.send("~OUTPUT,8,1,0.00");
        expect(&mut remote, "#OUTPUT,8,1,25,02.00").await;
        assert_eq!(reader.await.unwrap(), Some(level(0)));
        assert_eq!(done.try_take(), None);

        remote.send("~OUTPUT,8,1,25.00");
        assert_eq!(done.await, Some(level(25)));
    }

    #[tokio::test]
    async fn fade_to_reported_level_sends_nothing() {
        let (conn, mut remote, _repeater) = connect().await;
        let dimmer = conn.dimmer(8);
        let mut changes = dimmer.monitor().await;
        expect(&mut remote, "?OUTPUT,8,1").await;
        remote.send("~OUTPUT,8,1,40.00");
        assert_eq!(changes.recv().await.unwrap().level, level(40));

        let done = dimmer.fade(level(40), Duration::from_secs(2)).await;
        assert_eq!(done.await, Some(level(40)));

        // The next line on the wire is the forced read, not a fade.
        let reader = {
            let dimmer = dimmer.clone();
            tokio::spawn(async move { dimmer.read_level().await })
        };
        expect(&mut remote, "?OUTPUT,8,1").await;
        remote.send("~OUTPUT,8,1,40.00");
        assert_eq!(reader.await.unwrap(), Some(level(40)));
    }

    #[tokio::test]
    async fn queued_transitions_run_in_order() {
        let (conn, mut remote, _repeater) = connect().await;
        let dimmer = conn.dimmer(3);
        let mut changes = dimmer.monitor().await;
        expect(&mut remote, "?OUTPUT,3,1").await;
        remote.send("~OUTPUT,3,1,0.00");
        changes.recv().await.unwrap();

        let first = dimmer.fade(level(30), Duration::ZERO).await;
        let again = dimmer.fade(level(30), Duration::ZERO).await;
        let last = dimmer.fade(level(60), Duration::from_secs(75)).await;
        expect(&mut remote, "#OUTPUT,3,1,30,00.00").await;

        remote.send("~OUTPUT,3,1,30.00");
        expect(&mut remote, "#OUTPUT,3,1,60,01:15").await;
        assert_eq!(first.await, Some(level(30)));
        assert_eq!(again.await, Some(level(30)));

        remote.send("~OUTPUT,3,1,60.00");
        assert_eq!(last.await, Some(level(60)));
    }

    #[tokio::test]
    async fn every_subscriber_sees_a_report_once() {
        let (conn, mut remote, _repeater) = connect().await;
        let mut all = conn.monitor_dimmers();
        let dimmer = conn.dimmer(8);
        expect(&mut remote, "?OUTPUT,8,1").await;

        let mut first = dimmer.monitor().await;
        let mut second = dimmer.monitor().await;

        remote.send("~OUTPUT,8,1,55.00");
        remote.send("~OUTPUT,8,1,55.00");
        remote.send("~OUTPUT,8,1,20.00");

        for changes in [&mut all, &mut first, &mut second] {
            let change = changes.recv().await.unwrap();
            assert_eq!(change.dimmer, dimmer);
            assert_eq!(change.level, level(55));
            assert_eq!(changes.recv().await.unwrap().level, level(20));
        }
    }

    #[tokio::test]
    async fn all_dimmer_monitor_hears_unrequested_dimmers() {
        let (conn, mut remote, _repeater) = connect().await;
        let mut all = conn.monitor_dimmers();

        remote.send("~OUTPUT,12,1,40.00");
        let change = tokio::time::timeout(Duration::from_secs(1), all.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.dimmer, conn.dimmer(12));
        assert_eq!(change.level, level(40));
        assert_eq!(conn.dimmer(12).level().await, Some(level(40)));
        assert!(remote.try_recv().is_none());
    }

    #[tokio::test]
    async fn next_transition_waits_for_earlier_queued_lines() {
        let (conn, mut remote, gate) = connect_gated(ConnectionConfig::default()).await;
        let dimmer = conn.dimmer(8);
        let mut changes = dimmer.monitor().await;
        gate.add_permits(1);
        expect(&mut remote, "?OUTPUT,8,1").await;
        remote.send("~OUTPUT,8,1,0.00");
        assert_eq!(changes.recv().await.unwrap().level, level(0));

        // The writer is held on the LED line while the fade is still queued.
        let _led = conn.keypad(4).button(1).set_led(LedState::On).await;
        let first = dimmer.fade(level(30), Duration::ZERO).await;
        let second = dimmer.fade(level(60), Duration::ZERO).await;
        remote.send("~OUTPUT,8,1,30.00");
        settle().await;

        gate.add_permits(3);
        expect(&mut remote, "#DEVICE,4,81,9,1").await;
        expect(&mut remote, "#OUTPUT,8,1,30,00.00").await;
        expect(&mut remote, "#OUTPUT,8,1,60,00.00").await;
        assert_eq!(first.await, Some(level(30)));

        remote.send("~OUTPUT,8,1,60.00");
        assert_eq!(second.await, Some(level(60)));
    }

    #[tokio::test]
    async fn full_queue_holds_callers_back() {
        let config = ConnectionConfig::default().with_queue_capacity(2);
        let (conn, mut remote, gate) = connect_gated(config).await;
        let dimmers: Vec<_> = (1..=4).map(|id| conn.dimmer(id)).collect();

        // One line blocks in the writer and two fill the queue.
        let mut waiting = Vec::new();
        for dimmer in &dimmers[..3] {
            waiting.push(dimmer.fade(level(50), Duration::ZERO).await);
        }
        let fourth = {
            let dimmer = dimmers[3].clone();
            tokio::spawn(async move { dimmer.fade(level(50), Duration::ZERO).await })
        };
        settle().await;
        assert!(!fourth.is_finished());

        gate.add_permits(4);
        for id in 1..=4 {
            expect(&mut remote, &format!("?OUTPUT,{id},1")).await;
        }
        let _fourth = fourth.await.unwrap();
    }

    #[tokio::test]
    async fn switch_and_hybrid_keypad_share_routing() {
        let (conn, mut remote, _repeater) = connect().await;
        let switch = conn.switch(12);
        let hybrid = conn.hybrid_keypad(10);
        assert_eq!(hybrid.dimmer(), &conn.dimmer(10));
        assert_eq!(hybrid.keypad(), &conn.keypad(10));

        let on = switch.on().await;
        expect(&mut remote, "?OUTPUT,12,1").await;
        remote.send("~OUTPUT,12,1,0.00");
        expect(&mut remote, "#OUTPUT,12,1,100,00.00").await;
        remote.send("~OUTPUT,12,1,100.00");
        assert_eq!(on.await, Some(Level::FULL));
        assert_eq!(switch.status().await, Some(true));

        let mut presses = hybrid.button(2).monitor();
        remote.send("~DEVICE,10,2,3");
        assert_eq!(presses.recv().await, Some(ButtonAction::Press));
    }
}

// ============================================================================
// Keypads
// ============================================================================

mod keypads {
    use super::*;

    #[tokio::test]
    async fn press_resolves_on_release() {
        let (conn, mut remote, _repeater) = connect().await;
        let button = conn.keypad(4).button(5);

        let pressed = button.press().await;
        expect(&mut remote, "#DEVICE,4,5,3").await;
        expect(&mut remote, "#DEVICE,4,5,4").await;

        remote.send("~DEVICE,4,5,3");
        remote.send("~DEVICE,4,5,4");
        assert_eq!(pressed.await, Some(ButtonAction::Release));
    }

    #[tokio::test]
    async fn led_events_only_reach_their_keypad() {
        let (conn, mut remote, _repeater) = connect().await;
        let mut ours = conn.keypad(4).button(1).monitor_led(LedStates::empty()).await;
        let mut theirs = conn.keypad(5).button(1).monitor_led(LedStates::empty()).await;
        expect(&mut remote, "?DEVICE,4,81,9").await;
        expect(&mut remote, "?DEVICE,5,81,9").await;

        remote.send("~DEVICE,4,81,9,1");
        remote.send("~DEVICE,4,81,9,1,7");
        remote.send("~ERROR,6");
        remote.send("garbage");
        remote.send("~DEVICE,4,81,9,0");

        assert_eq!(ours.recv().await, Some(LedState::On));
        assert_eq!(ours.recv().await, Some(LedState::Off));
        assert!(theirs.try_recv().is_err());
    }

    #[tokio::test]
    async fn led_group_selects_one() {
        let (conn, mut remote, _repeater) = connect().await;
        let (scenes, extra) = (conn.keypad(4), conn.keypad(6));
        let group = LedGroup::new([scenes.button(1), scenes.button(2), extra.button(1)]);

        let pending = group.select(Some(&extra.button(1))).await;
        expect(&mut remote, "#DEVICE,6,81,9,1").await;
        expect(&mut remote, "#DEVICE,4,81,9,0").await;
        expect(&mut remote, "#DEVICE,4,82,9,0").await;

        remote.send("~DEVICE,6,81,9,1");
        remote.send("~DEVICE,4,82,9,0");
        remote.send("~DEVICE,4,81,9,0");
        assert!(pending.wait().await);
    }
}

// ============================================================================
// Connection lifecycle
// ============================================================================

mod lifecycle {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn redial_replays_state_queries() {
        let config = ConnectionConfig::default()
            .with_reconnection(ReconnectionPolicy::new().with_initial_delay(Duration::from_secs(1)));
        let (conn, mut remote, repeater) = connect_with(config).await;

        let dimmer = conn.dimmer(8);
        let mut changes = dimmer.monitor().await;
        expect(&mut remote, "?OUTPUT,8,1").await;
        remote.send("~OUTPUT,8,1,10.00");
        assert_eq!(changes.recv().await.unwrap().level, level(10));

        let led = conn.keypad(4).button(2);
        let mut leds = led.monitor_led(LedStates::all()).await;
        expect(&mut remote, "?DEVICE,4,82,9").await;

        let pending = dimmer.fade(level(50), Duration::ZERO).await;
        expect(&mut remote, "#OUTPUT,8,1,50,00.00").await;

        let mut next = repeater.accept();
        remote.fail("cable pulled");
        assert_eq!(pending.await, None);

        expect_setup(&mut next).await;
        let mut replay = vec![next.recv().await.unwrap(), next.recv().await.unwrap()];
        replay.sort();
        assert_eq!(replay, ["?DEVICE,4,82,9", "?OUTPUT,8,1"]);

        let mut state = conn.subscribe_state();
        state.wait_for(ConnectionState::is_connected).await.unwrap();

        next.send("~OUTPUT,8,1,50.00");
        next.send("~DEVICE,4,82,9,2");
        assert_eq!(changes.recv().await.unwrap().level, level(50));
        assert_eq!(leds.recv().await, Some(LedState::NormalFlash));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_redial_shuts_down() {
        let config = ConnectionConfig::default()
            .with_reconnection(ReconnectionPolicy::new().with_max_retries(2));
        let (conn, remote, _repeater) = connect_with(config).await;
        let mut state = conn.subscribe_state();

        remote.fail("repeater rebooted");
        state
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await
            .unwrap();
        assert_eq!(conn.dimmer(8).on().await.await, None);
    }

    #[tokio::test]
    async fn lost_session_releases_everything() {
        let (conn, mut remote, _repeater) = connect().await;
        let dimmer = conn.dimmer(8);
        let pending = dimmer.fade(level(70), Duration::ZERO).await;
        let mut changes = dimmer.monitor().await;
        let mut presses = conn.keypad(4).button(1).monitor();
        let set = conn.keypad(4).button(1).set_led(LedState::On).await;
        expect(&mut remote, "?OUTPUT,8,1").await;
        expect(&mut remote, "#DEVICE,4,81,9,1").await;

        remote.fail("cable pulled");

        assert_eq!(pending.await, None);
        assert_eq!(set.await, None);
        assert!(changes.recv().await.is_none());
        assert!(presses.recv().await.is_none());
        conn.subscribe_state()
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await
            .unwrap();

        assert_eq!(dimmer.on().await.await, None);
        assert_eq!(dimmer.level().await, None);
        assert_eq!(conn.keypad(4).button(1).press().await.await, None);
    }

    #[tokio::test]
    async fn close_resolves_waiters_and_ends_session() {
        let (conn, mut remote, _repeater) = connect().await;
        let reader = {
            let dimmer = conn.dimmer(8);
            tokio::spawn(async move { dimmer.read_level().await })
        };
        expect(&mut remote, "?OUTPUT,8,1").await;

        conn.close().await;
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(reader.await.unwrap(), None);
        assert!(remote.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropping_the_connection_closes_it() {
        let (conn, mut remote, _repeater) = connect().await;
        let dimmer = conn.dimmer(8);

        drop(conn);
        assert!(remote.recv().await.is_none());
        assert_eq!(dimmer.off().await.await, None);
    }

    #[tokio::test]
    async fn failed_connect_is_reported() {
        let (connector, _repeater) = ChannelConnector::new();
        let result = Connection::with_connector(connector, ConnectionConfig::default()).await;
        assert!(result.is_err());
    }
}

// ============================================================================
// Telnet transport
// ============================================================================

#[cfg(feature = "tcp")]
mod telnet {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn login_and_monitoring_setup_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let repeater = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();

            write.write_all(b"login: ").await.unwrap();
            lines.next_line().await.unwrap();
            write.write_all(b"password: ").await.unwrap();
            lines.next_line().await.unwrap();
            write.write_all(b"\r\nGNET> ").await.unwrap();

            let mut received = Vec::new();
            for _ in 0..6 {
                received.push(lines.next_line().await.unwrap().unwrap());
            }
            write.write_all(b"~OUTPUT,8,1,33.00\r\n").await.unwrap();
            // Keep the session open until the client hangs up.
            let _ = lines.next_line().await;
            received
        });

        let conn = Connection::builder("127.0.0.1")
            .with_port(port)
            .with_timeout(Duration::from_secs(5))
            .connect()
            .await
            .unwrap();
        assert_eq!(conn.dimmer(8).level().await, Some(level(33)));
        conn.close().await;

        let received = repeater.await.unwrap();
        assert_eq!(received[0], "#MONITORING,12,2");
        assert_eq!(&received[1..5], SESSION_SETUP);
        assert_eq!(received[5], "?OUTPUT,8,1");
    }
}
