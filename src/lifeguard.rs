//! Local Health Multiplier and Lifeguard-adjusted suspicion timeout (§4.2).

use std::time::Duration;

use crate::config::Config;

/// Events that adjust the Local Health Multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LhmEvent {
    SuccessfulProbe,
    FailedProbe,
    ProbeWithMissedNack,
    RefutingSuspectMessageAboutSelf,
}

/// Saturating `[0, max_lhm]` counter plus the Lifeguard suspicion-timeout
/// formula (Lifeguard §IV-B).
#[derive(Debug, Clone)]
pub struct LifeguardController {
    lhm: u32,
    max_lhm: u32,
    max_independent_suspicions: usize,
    suspicion_timeout_min: Duration,
    suspicion_timeout_max: Duration,
}

impl LifeguardController {
    pub fn new(config: &Config) -> Self {
        LifeguardController {
            lhm: 0,
            max_lhm: config.max_local_health_multiplier,
            max_independent_suspicions: config.max_independent_suspicions,
            suspicion_timeout_min: config.suspicion_timeout_min,
            suspicion_timeout_max: config.suspicion_timeout_max,
        }
    }

    pub fn lhm(&self) -> u32 {
        self.lhm
    }

    pub fn record(&mut self, event: LhmEvent) {
        match event {
            LhmEvent::SuccessfulProbe => self.lhm = self.lhm.saturating_sub(1),
            LhmEvent::FailedProbe
            | LhmEvent::ProbeWithMissedNack
            | LhmEvent::RefutingSuspectMessageAboutSelf => {
                self.lhm = (self.lhm + 1).min(self.max_lhm)
            }
        }
    }

    pub fn dynamic_probe_interval(&self, base: Duration) -> Duration {
        base * (1 + self.lhm)
    }

    pub fn dynamic_ping_timeout(&self, base: Duration) -> Duration {
        base * (1 + self.lhm)
    }

    /// `timeout = max(min_t, max_t - (max_t - min_t) * log2(C+1) / log2(K+1))`.
    pub fn suspicion_timeout(&self, independent_suspicions: u32) -> Duration {
        let min = self.suspicion_timeout_min.as_secs_f64();
        let max = self.suspicion_timeout_max.as_secs_f64();
        let k = self.max_independent_suspicions as f64;
        let c = independent_suspicions as f64;
        let decayed = max - (max - min) * (c + 1.0).log2() / (k + 1.0).log2();
        Duration::from_secs_f64(decayed.max(min))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> LifeguardController {
        LifeguardController {
            lhm: 0,
            max_lhm: 8,
            max_independent_suspicions: 3,
            suspicion_timeout_min: Duration::from_secs(1),
            suspicion_timeout_max: Duration::from_secs(5),
        }
    }

    #[test]
    fn lhm_saturates_at_bounds() {
        let mut c = controller();
        for _ in 0..20 {
            c.record(LhmEvent::FailedProbe);
        }
        assert_eq!(c.lhm(), 8);
        for _ in 0..20 {
            c.record(LhmEvent::SuccessfulProbe);
        }
        assert_eq!(c.lhm(), 0);
    }

    #[test]
    fn suspicion_timeout_matches_scenario_e() {
        let c = controller();
        // C = 1 independent suspicion, K = 3: timeout = max(1, 5 - 4*log2(2)/log2(4)) = 3s
        let timeout = c.suspicion_timeout(1);
        assert!((timeout.as_secs_f64() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn suspicion_timeout_floors_at_min() {
        let c = controller();
        let timeout = c.suspicion_timeout(1_000_000);
        assert_eq!(timeout, Duration::from_secs(1));
    }

    #[test]
    fn dynamic_timeout_scales_with_lhm() {
        let mut c = controller();
        c.record(LhmEvent::FailedProbe);
        c.record(LhmEvent::FailedProbe);
        let base = Duration::from_millis(100);
        assert_eq!(c.dynamic_ping_timeout(base), Duration::from_millis(300));
    }
}
