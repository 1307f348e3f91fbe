/// Second-granularity countdown for one timed session. Pure state: ticks are
/// applied by the session driver, which re-arms the next tick only after the
/// previous one has been applied, so two ticks can never be in flight for the
/// same instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownTimer {
    total_seconds: u32,
    remaining: u32,
    running: bool,
}

impl CountdownTimer {
    pub fn new(total_seconds: u32) -> Self {
        Self {
            total_seconds,
            remaining: total_seconds,
            running: false,
        }
    }

    /// Marks the timer running. Reaching zero is terminal until `reset`, so
    /// starting an expired timer does nothing.
    pub fn start(&mut self) {
        if self.remaining > 0 {
            self.running = true;
        }
    }

    /// Halts ticking without touching `remaining`.
    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn reset(&mut self) {
        self.remaining = self.total_seconds;
        self.running = false;
    }

    /// Applies one elapsed second. Returns true on the tick that reaches zero,
    /// which also stops the timer.
    pub fn tick(&mut self) -> bool {
        if !self.running || self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            self.running = false;
            return true;
        }
        false
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Fraction of the session already elapsed, clamped to [0, 1].
    pub fn progress(&self) -> f64 {
        if self.total_seconds == 0 {
            return 1.0;
        }
        let fraction = 1.0 - f64::from(self.remaining) / f64::from(self.total_seconds);
        fraction.clamp(0.0, 1.0)
    }
}
