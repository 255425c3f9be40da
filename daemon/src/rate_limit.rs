use crate::config::RateLimitConfig;
use governor::{clock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("{0} must be non-zero")]
    ZeroQuota(&'static str),
}

/// Token bucket in front of the IPC socket, so a runaway client cannot
/// flood the engine with transcripts.
pub struct CommandRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, clock::DefaultClock>,
    enabled: bool,
}

impl CommandRateLimiter {
    /// Fails when either quota value is 0.
    pub fn new(
        commands_per_second: u32,
        burst_capacity: u32,
        enabled: bool,
    ) -> Result<Self, RateLimitError> {
        let per_second = NonZeroU32::new(commands_per_second)
            .ok_or(RateLimitError::ZeroQuota("commands_per_second"))?;
        let burst =
            NonZeroU32::new(burst_capacity).ok_or(RateLimitError::ZeroQuota("burst_capacity"))?;

        Ok(Self {
            limiter: RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst)),
            enabled,
        })
    }

    pub fn from_config(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        Self::new(
            config.commands_per_second,
            config.burst_capacity,
            config.enabled,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Immediate check; never waits for a token.
    pub fn check(&self) -> bool {
        if !self.enabled {
            return true;
        }

        self.limiter.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_rate_limiter_new() {
        let limiter = CommandRateLimiter::new(10, 20, true).unwrap();
        assert!(limiter.is_enabled());
    }

    #[test]
    fn test_command_rate_limiter_disabled() {
        let limiter = CommandRateLimiter::new(10, 20, false).unwrap();
        assert!(!limiter.is_enabled());
        for _ in 0..100 {
            assert!(limiter.check());
        }
    }

    #[test]
    fn test_command_rate_limiter_burst() {
        let limiter = CommandRateLimiter::new(10, 20, true).unwrap();

        for _ in 0..20 {
            assert!(limiter.check(), "Burst capacity should allow 20 requests");
        }

        assert!(!limiter.check(), "Should be rate limited after burst exhausted");
    }

    #[test]
    fn test_command_rate_limiter_rejects_zero_quota() {
        assert_eq!(
            CommandRateLimiter::new(0, 20, true).err(),
            Some(RateLimitError::ZeroQuota("commands_per_second"))
        );
        assert_eq!(
            CommandRateLimiter::new(10, 0, true).err(),
            Some(RateLimitError::ZeroQuota("burst_capacity"))
        );
    }

    #[test]
    fn test_command_rate_limiter_from_config() {
        let config = RateLimitConfig {
            commands_per_second: 1,
            burst_capacity: 2,
            enabled: true,
        };
        let limiter = CommandRateLimiter::from_config(&config).unwrap();
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(!limiter.check());
    }
}
