//! Typed configuration surface (§6 EXTERNAL INTERFACES, §4.7).

use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub probe_interval: Duration,
    pub ping_timeout: Duration,
    pub indirect_probe_count: usize,
    pub max_number_of_messages: usize,
    pub max_gossip_count_per_message: u32,
    pub max_local_health_multiplier: u32,
    pub max_independent_suspicions: usize,
    pub suspicion_timeout_min: Duration,
    pub suspicion_timeout_max: Duration,
    /// Deployment switch from §9's open question: whether suspicion timeout
    /// expiry lands on `Unreachable` before `Dead`, or skips straight to
    /// `Dead`.
    pub unreachable_phase_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            probe_interval: Duration::from_millis(200),
            ping_timeout: Duration::from_millis(500),
            indirect_probe_count: 3,
            max_number_of_messages: 8,
            max_gossip_count_per_message: 6,
            max_local_health_multiplier: 8,
            max_independent_suspicions: 3,
            suspicion_timeout_min: Duration::from_secs(1),
            suspicion_timeout_max: Duration::from_secs(5),
            unreachable_phase_enabled: true,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("probe_interval"));
        }
        if self.ping_timeout.is_zero() {
            return Err(ConfigError::ZeroInterval("ping_timeout"));
        }
        if self.suspicion_timeout_min > self.suspicion_timeout_max {
            return Err(ConfigError::InvalidSuspicionBounds {
                min_nanos: self.suspicion_timeout_min.as_nanos(),
                max_nanos: self.suspicion_timeout_max.as_nanos(),
            });
        }
        if self.max_independent_suspicions == 0 {
            return Err(ConfigError::ZeroIndependentSuspicions);
        }
        if self.max_gossip_count_per_message == 0 {
            return Err(ConfigError::ZeroGossipCount);
        }
        Ok(())
    }
}

/// Builder mirroring the teacher's positional `Server::new` constructor,
/// generalized so the ambient Lifeguard/gossip knobs don't each need a
/// positional slot.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder(Config);

impl ConfigBuilder {
    pub fn probe_interval(mut self, d: Duration) -> Self {
        self.0.probe_interval = d;
        self
    }

    pub fn ping_timeout(mut self, d: Duration) -> Self {
        self.0.ping_timeout = d;
        self
    }

    pub fn indirect_probe_count(mut self, n: usize) -> Self {
        self.0.indirect_probe_count = n;
        self
    }

    pub fn max_number_of_messages(mut self, n: usize) -> Self {
        self.0.max_number_of_messages = n;
        self
    }

    pub fn max_gossip_count_per_message(mut self, n: u32) -> Self {
        self.0.max_gossip_count_per_message = n;
        self
    }

    pub fn max_local_health_multiplier(mut self, n: u32) -> Self {
        self.0.max_local_health_multiplier = n;
        self
    }

    pub fn max_independent_suspicions(mut self, n: usize) -> Self {
        self.0.max_independent_suspicions = n;
        self
    }

    pub fn suspicion_timeout_min(mut self, d: Duration) -> Self {
        self.0.suspicion_timeout_min = d;
        self
    }

    pub fn suspicion_timeout_max(mut self, d: Duration) -> Self {
        self.0.suspicion_timeout_max = d;
        self
    }

    pub fn unreachable_phase_enabled(mut self, enabled: bool) -> Self {
        self.0.unreachable_phase_enabled = enabled;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        self.0.validate()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_probe_interval() {
        let mut c = Config::default();
        c.probe_interval = Duration::ZERO;
        assert_eq!(c.validate(), Err(ConfigError::ZeroInterval("probe_interval")));
    }

    #[test]
    fn rejects_inverted_suspicion_bounds() {
        let mut c = Config::default();
        c.suspicion_timeout_min = Duration::from_secs(10);
        c.suspicion_timeout_max = Duration::from_secs(1);
        assert!(matches!(
            c.validate(),
            Err(ConfigError::InvalidSuspicionBounds { .. })
        ));
    }

    #[test]
    fn rejects_zero_independent_suspicions() {
        let mut c = Config::default();
        c.max_independent_suspicions = 0;
        assert_eq!(c.validate(), Err(ConfigError::ZeroIndependentSuspicions));
    }

    #[test]
    fn rejects_zero_gossip_count() {
        let mut c = Config::default();
        c.max_gossip_count_per_message = 0;
        assert_eq!(c.validate(), Err(ConfigError::ZeroGossipCount));
    }

    #[test]
    fn builder_roundtrips() {
        let config = Config::builder()
            .indirect_probe_count(5)
            .max_local_health_multiplier(4)
            .build()
            .unwrap();
        assert_eq!(config.indirect_probe_count, 5);
        assert_eq!(config.max_local_health_multiplier, 4);
    }
}
