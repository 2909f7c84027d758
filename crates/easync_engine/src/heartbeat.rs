//! Heartbeat negotiation for long-poll.

use crate::config::HeartbeatConfig;

/// Picks the heartbeat of the next ping.
///
/// Starts at the configured initial value and grows after every ping that
/// expires cleanly. When a connection drops mid-ping the interval shrinks
/// one step and stops growing: something between client and server cuts
/// idle connections at about that length. A server bound narrows the range
/// for the rest of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeartbeatNegotiator {
    min: u32,
    max: u32,
    increment: u32,
    current: u32,
    settled: bool,
}

impl HeartbeatNegotiator {
    /// Creates a negotiator from configured bounds.
    pub fn new(config: &HeartbeatConfig) -> Self {
        let min = config.min_secs.min(config.max_secs);
        let max = config.max_secs.max(min);
        Self {
            min,
            max,
            increment: config.increment_secs,
            current: config.initial_secs.clamp(min, max),
            settled: false,
        }
    }

    /// Heartbeat to send with the next ping, in seconds.
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Returns true once the interval stopped growing.
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Applies a bound the server sent with an out-of-range status and
    /// returns the heartbeat to retry with.
    ///
    /// A bound below the current value is a new maximum, one above it a new
    /// minimum. Bounds outside the configured range are clamped into it.
    pub fn renegotiate(&mut self, bound: u32) -> u32 {
        let bound = bound.clamp(self.min, self.max);
        if bound < self.current {
            self.max = bound;
        } else {
            self.min = bound;
        }
        self.current = bound;
        self.current
    }

    /// The last ping ran its full heartbeat without changes.
    pub fn expired_without_changes(&mut self) -> u32 {
        if !self.settled {
            self.current = self.current.saturating_add(self.increment).min(self.max);
        }
        self.current
    }

    /// The connection dropped before the heartbeat elapsed.
    pub fn connection_dropped(&mut self) -> u32 {
        self.current = self.current.saturating_sub(self.increment).max(self.min);
        self.settled = true;
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HeartbeatConfig {
        HeartbeatConfig {
            min_secs: 60,
            max_secs: 1680,
            initial_secs: 1500,
            increment_secs: 180,
        }
    }

    #[test]
    fn server_bound_below_becomes_the_maximum() {
        let mut hb = HeartbeatNegotiator::new(&config());
        assert_eq!(hb.current(), 1500);
        assert_eq!(hb.renegotiate(900), 900);
        assert_eq!(hb.expired_without_changes(), 900);
    }

    #[test]
    fn server_bound_above_becomes_the_minimum() {
        let mut hb = HeartbeatNegotiator::new(&HeartbeatConfig {
            initial_secs: 60,
            ..config()
        });
        assert_eq!(hb.renegotiate(120), 120);
        assert_eq!(hb.connection_dropped(), 120);
    }

    #[test]
    fn grows_until_a_drop_then_settles() {
        let mut hb = HeartbeatNegotiator::new(&HeartbeatConfig {
            initial_secs: 480,
            ..config()
        });
        assert_eq!(hb.expired_without_changes(), 660);
        assert_eq!(hb.expired_without_changes(), 840);
        assert_eq!(hb.connection_dropped(), 660);
        assert!(hb.is_settled());
        assert_eq!(hb.expired_without_changes(), 660);
    }

    #[test]
    fn stays_within_bounds() {
        let mut hb = HeartbeatNegotiator::new(&config());
        for _ in 0..10 {
            hb.expired_without_changes();
        }
        assert_eq!(hb.current(), 1680);
        assert_eq!(hb.renegotiate(5), 60);
        for _ in 0..10 {
            hb.connection_dropped();
        }
        assert_eq!(hb.current(), 60);
    }
}
