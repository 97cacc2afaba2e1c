// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Keypad state machine: button events and LED states.
//!
//! Buttons are components 1 to 25 of a keypad device and report
//! `~DEVICE,<keypad>,<button>,<action>`. The LED of button `n` is component
//! `n + 80` and reports `~DEVICE,<keypad>,<n + 80>,9,<state>`.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::connection::LineQueue;
use crate::device::{Completion, Component, EventTarget, Resolver};
use crate::error::ParseError;
use crate::types::{ButtonAction, ButtonEvents, LED_COMPONENT_OFFSET, LedState, LedStates};

/// Component action addressing an LED's state.
const ACTION_LED_STATE: &str = "9";

const BUTTON_COMPONENTS: std::ops::RangeInclusive<u32> = 1..=25;
const LED_COMPONENTS: std::ops::RangeInclusive<u32> = 81..=95;

/// Handle to a keypad (seeTouch, Pico, hybrid keypad buttons).
///
/// Obtained from [`Connection::keypad`](crate::Connection::keypad). Clones
/// share state.
#[derive(Clone)]
pub struct Keypad {
    inner: Arc<KeypadInner>,
}

struct KeypadInner {
    component: Component,
    state: Mutex<KeypadState>,
}

#[derive(Default)]
struct KeypadState {
    buttons: Vec<ButtonMonitor>,
    presses: Vec<Waiter<ButtonAction>>,
    leds: Vec<LedMonitor>,
    led_sets: Vec<LedWaiter>,
}

struct ButtonMonitor {
    button: u8,
    events: ButtonEvents,
    sink: mpsc::UnboundedSender<ButtonAction>,
}

struct Waiter<T> {
    button: u8,
    reply: Resolver<T>,
}

struct LedMonitor {
    button: u8,
    states: LedStates,
    sink: mpsc::UnboundedSender<LedState>,
    last: Option<LedState>,
}

struct LedWaiter {
    button: u8,
    target: LedState,
    reply: Resolver<LedState>,
}

/// One button of a keypad, with its LED.
#[derive(Clone, PartialEq, Eq)]
pub struct KeypadButton {
    keypad: Keypad,
    id: u8,
}

impl Keypad {
    pub(crate) fn new(component: Component) -> Self {
        Self {
            inner: Arc::new(KeypadInner {
                component,
                state: Mutex::new(KeypadState::default()),
            }),
        }
    }

    /// Returns the integration id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.inner.component.id()
    }

    /// Returns a handle to one of this keypad's buttons.
    ///
    /// See [`pico`](crate::types::pico) for the button numbers of Pico
    /// remotes.
    #[must_use]
    pub fn button(&self, id: u8) -> KeypadButton {
        KeypadButton {
            keypad: self.clone(),
            id,
        }
    }

    fn component(&self) -> &Component {
        &self.inner.component
    }

    fn button_event(&self, button: u8, action: ButtonAction) {
        tracing::trace!(keypad = self.id(), button, %action, "Button event");
        let mut state = self.inner.state.lock();

        state.buttons.retain(|monitor| {
            monitor.button != button
                || !monitor.events.contains(action.flag())
                || monitor.sink.send(action).is_ok()
        });

        if action == ButtonAction::Release {
            for waiter in state.presses.extract_if(.., |w| w.button == button) {
                waiter.reply.confirm(action);
            }
        }
    }

    fn led_event(&self, button: u8, led: LedState) {
        tracing::trace!(keypad = self.id(), button, %led, "LED event");
        let mut state = self.inner.state.lock();

        for monitor in state.leds.iter_mut().filter(|m| m.button == button) {
            if monitor.last != Some(led) && monitor.states.selects(led) {
                let _ = monitor.sink.send(led);
            }
            monitor.last = Some(led);
        }
        state.leds.retain(|monitor| !monitor.sink.is_closed());

        for waiter in state
            .led_sets
            .extract_if(.., |w| w.button == button && w.target == led)
        {
            waiter.reply.confirm(led);
        }
    }
}

impl EventTarget for Keypad {
    fn handle_event(&self, args: &str, _out: &mut dyn LineQueue) -> Result<(), ParseError> {
        let fields: Vec<&str> = args.split(',').collect();
        let component: u32 = fields[0].parse().map_err(|e| {
            ParseError::invalid("keypad component", format!("{:?}: {e}", fields[0]))
        })?;

        match fields.as_slice() {
            [_, action] if BUTTON_COMPONENTS.contains(&component) => {
                let code: u8 = action.parse().map_err(|e| {
                    ParseError::invalid("button action", format!("{action:?}: {e}"))
                })?;
                // Hold and double-tap reports are not tracked.
                if let (Ok(button), Ok(action)) =
                    (u8::try_from(component), ButtonAction::from_num(code))
                {
                    self.button_event(button, action);
                }
            }
            [_, ACTION_LED_STATE, value] if LED_COMPONENTS.contains(&component) => {
                let code: u8 = value
                    .parse()
                    .map_err(|e| ParseError::invalid("LED state", format!("{value:?}: {e}")))?;
                let led =
                    LedState::from_num(code).map_err(|e| ParseError::invalid("LED state", e))?;
                if let Ok(button) = u8::try_from(component - u32::from(LED_COMPONENT_OFFSET)) {
                    self.led_event(button, led);
                }
            }
            _ => tracing::debug!(keypad = self.id(), args, "Ignoring device event"),
        }
        Ok(())
    }

    fn connection_lost(&self, out: &mut dyn LineQueue) {
        let mut state = self.inner.state.lock();

        for waiter in state.presses.drain(..) {
            waiter.reply.unknown();
        }
        state.leds.retain(|monitor| !monitor.sink.is_closed());

        let mut queried = [0u128; 2];
        for monitor in &state.leds {
            let word = &mut queried[usize::from(monitor.button / 128)];
            let bit = 1u128 << (monitor.button % 128);
            if *word & bit == 0 {
                *word |= bit;
                self.component().query(out, led_query(monitor.button));
            }
        }
    }

    fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        for waiter in state.presses.drain(..) {
            waiter.reply.unknown();
        }
        for waiter in state.led_sets.drain(..) {
            waiter.reply.unknown();
        }
        state.buttons.clear();
        state.leds.clear();
    }
}

impl PartialEq for Keypad {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Keypad {}

impl fmt::Debug for Keypad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypad").field("id", &self.id()).finish()
    }
}

fn led_component(button: u8) -> u16 {
    u16::from(button) + u16::from(LED_COMPONENT_OFFSET)
}

fn led_query(button: u8) -> String {
    format!("{},{ACTION_LED_STATE}", led_component(button))
}

impl KeypadButton {
    /// Returns the keypad this button belongs to.
    #[must_use]
    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    /// Returns the button number on its keypad.
    #[must_use]
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Presses and releases the button.
    ///
    /// Resolves with [`ButtonAction::Release`] once the repeater reports
    /// the release.
    pub async fn press(&self) -> Completion<ButtonAction> {
        let component = self.keypad.component();
        let Some(mut out) = component.outbox().reserve(2).await else {
            return Completion::unknown();
        };

        let mut state = self.keypad.inner.state.lock();
        if component.outbox().is_closed() {
            return Completion::unknown();
        }
        let (reply, completion) = Completion::pending();
        state.presses.push(Waiter {
            button: self.id,
            reply,
        });
        for action in [ButtonAction::Press, ButtonAction::Release] {
            component.execute(&mut out, format_args!("{},{}", self.id, action.as_num()));
        }
        completion
    }

    /// Streams presses of this button.
    #[must_use]
    pub fn monitor(&self) -> mpsc::UnboundedReceiver<ButtonAction> {
        self.subscribe(ButtonEvents::PRESS)
    }

    /// Streams presses and releases of this button.
    #[must_use]
    pub fn monitor_both(&self) -> mpsc::UnboundedReceiver<ButtonAction> {
        self.subscribe(ButtonEvents::PRESS | ButtonEvents::RELEASE)
    }

    fn subscribe(&self, events: ButtonEvents) -> mpsc::UnboundedReceiver<ButtonAction> {
        let (sink, rx) = mpsc::unbounded_channel();
        let mut state = self.keypad.inner.state.lock();
        if !self.keypad.component().outbox().is_closed() {
            state.buttons.push(ButtonMonitor {
                button: self.id,
                events,
                sink,
            });
        }
        rx
    }

    /// Sets the button's LED.
    ///
    /// Resolves once the repeater reports exactly `led` for this LED.
    pub async fn set_led(&self, led: LedState) -> Completion<LedState> {
        let component = self.keypad.component();
        let Some(mut out) = component.outbox().reserve(1).await else {
            return Completion::unknown();
        };

        let mut state = self.keypad.inner.state.lock();
        if component.outbox().is_closed() {
            return Completion::unknown();
        }
        let (reply, completion) = Completion::pending();
        state.led_sets.push(LedWaiter {
            button: self.id,
            target: led,
            reply,
        });
        component.execute(
            &mut out,
            format_args!("{},{ACTION_LED_STATE},{}", led_component(self.id), led.as_num()),
        );
        completion
    }

    /// Streams state changes of the button's LED that fall in `states`.
    ///
    /// An empty set selects [`LedState::Off`] and [`LedState::On`]. The
    /// current state is delivered first when known; otherwise it is
    /// queried.
    pub async fn monitor_led(&self, states: LedStates) -> mpsc::UnboundedReceiver<LedState> {
        let states = if states.is_empty() {
            LedStates::default()
        } else {
            states
        };

        let (sink, rx) = mpsc::unbounded_channel();
        let component = self.keypad.component();
        let Some(mut out) = component.outbox().reserve(1).await else {
            return rx;
        };

        let mut state = self.keypad.inner.state.lock();
        if component.outbox().is_closed() {
            return rx;
        }
        let last = state
            .leds
            .iter()
            .filter(|m| m.button == self.id)
            .find_map(|m| m.last);
        match last {
            Some(led) => {
                let _ = sink.send(led);
            }
            None => component.query(&mut out, led_query(self.id)),
        }
        state.leds.push(LedMonitor {
            button: self.id,
            states,
            sink,
            last,
        });
        rx
    }
}

impl fmt::Debug for KeypadButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeypadButton")
            .field("keypad", &self.keypad.id())
            .field("id", &self.id)
            .finish()
    }
}
