use std::time::Duration;

/// Global rate limiter for audio cues.
///
/// One cue per window regardless of zone. A fresh gate (new session) is
/// always open.
#[derive(Clone, Debug)]
pub struct CooldownGate {
    cooldown: Duration,
    last_emission: Option<Duration>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_emission: None,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn last_emission(&self) -> Option<Duration> {
        self.last_emission
    }

    /// True when strictly more than the cooldown has elapsed since the last
    /// recorded emission. Does not change state; call `record` after emitting.
    pub fn try_acquire(&self, now: Duration) -> bool {
        match self.last_emission {
            None => true,
            Some(last) => now.saturating_sub(last) > self.cooldown,
        }
    }

    pub fn record(&mut self, now: Duration) {
        self.last_emission = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn one_acquire_per_window() {
        let mut gate = CooldownGate::new(secs(1.0));
        assert!(gate.try_acquire(secs(0.0)));
        gate.record(secs(0.0));
        assert!(!gate.try_acquire(secs(0.5)));
        assert!(gate.try_acquire(secs(1.1)));
    }

    #[test]
    fn exactly_one_window_is_still_closed() {
        let mut gate = CooldownGate::new(secs(1.0));
        gate.record(secs(2.0));
        assert!(!gate.try_acquire(secs(3.0)));
        assert!(gate.try_acquire(secs(3.001)));
    }

    #[test]
    fn try_acquire_alone_does_not_close_the_gate() {
        let gate = CooldownGate::new(secs(1.0));
        assert!(gate.try_acquire(secs(0.0)));
        assert!(gate.try_acquire(secs(0.1)));
        assert_eq!(gate.last_emission(), None);
    }

    #[test]
    fn clock_going_backwards_keeps_gate_closed() {
        let mut gate = CooldownGate::new(secs(1.0));
        gate.record(secs(5.0));
        assert!(!gate.try_acquire(secs(1.0)));
    }
}
