//! Reconnect policy and connection-state notifications.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

// ---------------------------------------------------------------------------
// ReconnectPolicy
// ---------------------------------------------------------------------------

/// How long to wait between reconnect attempts.
///
/// The delay grows exponentially from `min_delay` and is capped at
/// `max_delay`. With `jitter` enabled each delay is multiplied by a random
/// factor in `[1, 2)` so that many clients dropped by the same server
/// restart don't all come back at the same instant.
///
/// ```text
/// delay(n) = min(min_delay * r * 2^n, max_delay)     r ∈ [1, 2)
/// ```
///
/// `n` is the number of consecutive failed attempts and resets to 0 every
/// time a connection opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt. Default: 5 seconds.
    pub min_delay: Duration,
    /// Upper bound for any delay. Default: 60 seconds.
    pub max_delay: Duration,
    /// Randomize each delay. Default: `true`.
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl ReconnectPolicy {
    /// Smallest accepted `min_delay`. A zero delay would spin.
    pub const FLOOR: Duration = Duration::from_millis(1);

    /// Exponent cap; `2^16` already exceeds any sane `max_delay / min_delay`.
    const MAX_EXPONENT: u32 = 16;

    /// Creates a policy with fixed bounds and jitter enabled.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            jitter: true,
        }
        .validated()
    }

    /// Disables jitter, making delays deterministic.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Clamps out-of-range values so the policy is safe to use.
    ///
    /// - `min_delay` is raised to [`Self::FLOOR`].
    /// - `max_delay` is raised to `min_delay`.
    pub fn validated(mut self) -> Self {
        if self.min_delay < Self::FLOOR {
            warn!(
                min_delay_ms = self.min_delay.as_millis() as u64,
                "reconnect min_delay too small, clamping"
            );
            self.min_delay = Self::FLOOR;
        }
        if self.max_delay < self.min_delay {
            warn!(
                min_delay_ms = self.min_delay.as_millis() as u64,
                max_delay_ms = self.max_delay.as_millis() as u64,
                "reconnect max_delay below min_delay, raising"
            );
            self.max_delay = self.min_delay;
        }
        self
    }

    /// Returns the delay before reconnect attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = if self.jitter {
            rand::rng().random_range(1.0..2.0)
        } else {
            1.0
        };
        let exp = 2f64.powi(attempt.min(Self::MAX_EXPONENT) as i32);
        let secs = self.min_delay.as_secs_f64() * factor * exp;
        // Out of `Duration` range means far past any cap.
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay);
        delay.max(self.min_delay).min(self.max_delay)
    }
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Lifecycle of a channel, published out-of-band through
/// [`WebSocketChannel::status`](crate::WebSocketChannel::status).
///
/// ```text
/// Idle → Connecting → Open ──(failure)──→ Reconnecting → Connecting → ...
///                       │
///                       └──(graceful close / close())──→ Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Created but `connect` not called yet.
    #[default]
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// The connection is open; `send` delivers.
    Open,
    /// Waiting `delay` before attempt number `attempt`.
    Reconnecting { attempt: u32, delay: Duration },
    /// Terminal. No further reconnects.
    Closed,
}

impl ConnectionState {
    /// Returns `true` while messages can be sent.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` once the channel will never reconnect again.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Reconnecting { attempt, delay } => {
                write!(f, "Reconnecting(#{attempt} in {}ms)", delay.as_millis())
            }
            Self::Closed => write!(f, "Closed"),
        }
    }
}
