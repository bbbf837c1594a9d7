//! Public types for the signaling channel.

use std::time::Duration;

use voffice_protocol::SignalingMessage;

/// Connection state of the signaling channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelState {
    /// Not connected and not trying to be.
    Disconnected,
    /// WebSocket handshake in progress.
    Connecting,
    /// Connected; messages flow in both directions.
    Connected,
    /// Connection lost, attempting to reconnect.
    Reconnecting { attempt: u32 },
    /// Reconnection attempts exhausted. Requires an explicit `connect`.
    Failed,
}

impl ChannelState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ChannelState::Connected)
    }
}

/// Events pushed by the signaling channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Connection state changed.
    StateChanged(ChannelState),
    /// A message arrived from the signaling server.
    Message(SignalingMessage),
    /// A reconnection attempt is scheduled.
    Reconnecting { attempt: u32, next_retry_secs: f64 },
    /// Reconnection stopped after `attempts` failures.
    GaveUp { attempts: u32 },
}

/// Configuration for automatic reconnection with exponential backoff.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
    /// Attempts before giving up. `0` disables reconnection.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(15),
            backoff_factor: 2.0,
            max_attempts: 8,
        }
    }
}

impl ReconnectConfig {
    /// Calculates the delay for a given attempt number (1-based),
    /// with ±25% jitter to avoid thundering herd.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        let jitter = capped * 0.25;
        let offset = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / u32::MAX as f64)
            * 2.0
            - 1.0; // [-1.0, 1.0)
        let with_jitter = (capped + jitter * offset).max(0.05);
        Duration::from_secs_f64(with_jitter)
    }

    /// Whether another attempt is allowed after `attempts` failures.
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_state_equality() {
        assert_eq!(ChannelState::Connected, ChannelState::Connected);
        assert_ne!(ChannelState::Connected, ChannelState::Connecting);
        assert_eq!(
            ChannelState::Reconnecting { attempt: 1 },
            ChannelState::Reconnecting { attempt: 1 },
        );
        assert_ne!(
            ChannelState::Reconnecting { attempt: 1 },
            ChannelState::Reconnecting { attempt: 2 },
        );
        assert!(ChannelState::Connected.is_connected());
        assert!(!ChannelState::Failed.is_connected());
    }

    #[test]
    fn reconnect_config_defaults() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(15));
        assert!((config.backoff_factor - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.max_attempts, 8);
    }

    #[test]
    fn reconnect_config_delay_backoff() {
        let config = ReconnectConfig::default();
        // Base delays: 250ms, 500ms, 1s, 2s, 4s, 8s, 15s (capped), 15s...
        let expected_base = [0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 15.0, 15.0];
        for (i, &base) in expected_base.iter().enumerate() {
            let delay = config.delay_for_attempt((i + 1) as u32);
            let secs = delay.as_secs_f64();
            let lo = base * 0.74;
            let hi = base * 1.26;
            assert!(
                secs >= lo && secs <= hi,
                "attempt {}: {secs:.3}s not in [{lo:.3}, {hi:.3}]",
                i + 1
            );
        }
    }

    #[test]
    fn max_attempts_ceiling() {
        let config = ReconnectConfig {
            max_attempts: 3,
            ..ReconnectConfig::default()
        };
        assert!(config.allows_attempt(1));
        assert!(config.allows_attempt(3));
        assert!(!config.allows_attempt(4));

        let disabled = ReconnectConfig {
            max_attempts: 0,
            ..ReconnectConfig::default()
        };
        assert!(!disabled.allows_attempt(1));
    }
}
