//! Throttle and debounce as explicit timer state.
//!
//! Neither type owns a timer. Callers pass the current time on every call
//! and poll from the frame loop so pending trailing calls can fire.

/// Runs at most once per `delay` ms, with a trailing call for the last
/// suppressed request
#[derive(Debug, Clone, PartialEq)]
pub struct Throttle {
    delay: f64,
    last_fire: Option<f64>,
    pending: bool,
}

impl Throttle {
    pub fn new(delay: f64) -> Self {
        Self {
            delay,
            last_fire: None,
            pending: false,
        }
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn set_delay(&mut self, delay: f64) {
        self.delay = delay;
    }

    /// Request a call at `now`. Returns `true` when it should run
    /// immediately; otherwise a trailing call is left pending.
    pub fn call(&mut self, now: f64) -> bool {
        let ready = match self.last_fire {
            _ if self.delay <= 0.0 => true,
            None => true,
            Some(last) => now - last >= self.delay || now < last,
        };
        if ready {
            self.last_fire = Some(now);
            self.pending = false;
        } else {
            self.pending = true;
        }
        ready
    }

    /// Returns `true` once when the pending trailing call is due
    pub fn poll(&mut self, now: f64) -> bool {
        if !self.pending {
            return false;
        }
        let due = self.last_fire.map_or(true, |last| now - last >= self.delay);
        if due {
            self.pending = false;
            self.last_fire = Some(now);
        }
        due
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Time at which the pending call fires
    pub fn deadline(&self) -> Option<f64> {
        if self.pending {
            self.last_fire.map(|last| last + self.delay)
        } else {
            None
        }
    }

    /// Drop the pending trailing call
    pub fn cancel(&mut self) {
        self.pending = false;
    }

    /// Forget the last fire time as well
    pub fn reset(&mut self) {
        self.pending = false;
        self.last_fire = None;
    }
}

/// Fires once `delay` ms after the last request
#[derive(Debug, Clone, PartialEq)]
pub struct Debounce {
    delay: f64,
    deadline: Option<f64>,
}

impl Debounce {
    pub fn new(delay: f64) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn set_delay(&mut self, delay: f64) {
        self.delay = delay;
    }

    /// Restart the wait at `now`
    pub fn call(&mut self, now: f64) {
        self.deadline = Some(now + self.delay);
    }

    /// Returns `true` once when the quiet period has elapsed
    pub fn poll(&mut self, now: f64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_leading_and_trailing() {
        let mut throttle = Throttle::new(30.0);
        assert!(throttle.call(0.0));
        assert!(!throttle.call(10.0));
        assert!(!throttle.call(20.0));
        assert!(throttle.is_pending());
        assert_eq!(throttle.deadline(), Some(30.0));
        assert!(!throttle.poll(25.0));
        assert!(throttle.poll(30.0));
        assert!(!throttle.poll(31.0));
        assert!(throttle.call(60.0));
    }

    #[test]
    fn test_throttle_disabled() {
        let mut throttle = Throttle::new(0.0);
        assert!(throttle.call(0.0));
        assert!(throttle.call(0.0));
        assert!(!throttle.is_pending());
    }

    #[test]
    fn test_throttle_cancel() {
        let mut throttle = Throttle::new(30.0);
        throttle.call(0.0);
        throttle.call(5.0);
        throttle.cancel();
        assert!(!throttle.poll(100.0));
    }

    #[test]
    fn test_debounce_waits_for_quiet() {
        let mut debounce = Debounce::new(400.0);
        debounce.call(0.0);
        debounce.call(300.0);
        assert!(!debounce.poll(500.0));
        assert!(debounce.poll(700.0));
        assert!(!debounce.poll(800.0));
        assert!(!debounce.is_pending());
    }
}
