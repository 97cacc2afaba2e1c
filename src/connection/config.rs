// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Smallest outbound queue that still fits a button press (two lines).
const MIN_QUEUE_CAPACITY: usize = 2;

/// Settings shared by every transport.
///
/// # Examples
///
/// ```
/// use radiora_lib::{ConnectionConfig, ReconnectionPolicy};
///
/// let config = ConnectionConfig::default()
///     .with_queue_capacity(32)
///     .with_reconnection(ReconnectionPolicy::new().with_max_retries(5));
///
/// assert_eq!(config.queue_capacity, 32);
/// assert!(config.reconnection.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Outbound lines that may wait for the writer before callers block.
    pub queue_capacity: usize,
    /// What to do when the session breaks.
    pub reconnection: ReconnectionPolicy,
}

impl ConnectionConfig {
    /// Sets the outbound queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the reconnection policy.
    #[must_use]
    pub fn with_reconnection(mut self, policy: ReconnectionPolicy) -> Self {
        self.reconnection = policy;
        self
    }

    pub(crate) fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.max(MIN_QUEUE_CAPACITY)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            reconnection: ReconnectionPolicy::default(),
        }
    }
}

/// When and how often to redial the repeater after the session breaks.
///
/// While redialing, the connection reports
/// [`ConnectionState::Reconnecting`](crate::ConnectionState::Reconnecting)
/// and keeps every device handle; the queries needed to resynchronise them
/// are sent right after the next login. A connection whose policy is
/// disabled or exhausted shuts down instead.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use radiora_lib::ReconnectionPolicy;
///
/// assert!(!ReconnectionPolicy::default().enabled);
///
/// let policy = ReconnectionPolicy::new()
///     .with_max_retries(5)
///     .with_initial_delay(Duration::from_millis(500));
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
/// assert!(!policy.should_retry(5));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectionPolicy {
    /// Redial at all.
    pub enabled: bool,
    /// Redials before giving up; `None` keeps trying.
    pub max_retries: Option<u32>,
    /// Wait before the first redial.
    pub initial_delay: Duration,
    /// Upper bound for the wait between redials.
    pub max_delay: Duration,
    /// Growth of the wait after each failed redial. Expected to be at
    /// least 1.
    pub backoff_multiplier: f64,
}

impl ReconnectionPolicy {
    /// Creates a policy that redials with the default backoff.
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Limits the number of redials.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the wait before the first redial.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Returns the wait before redial number `attempt`, counted from 0.
    ///
    /// Waits that cannot be represented are capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Returns true if redial number `attempt`, counted from 0, may run.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.enabled && self.max_retries.is_none_or(|max| attempt < max)
    }
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: Some(10),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}
