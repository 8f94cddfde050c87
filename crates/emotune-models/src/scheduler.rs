//! Learning-rate schedule: linear warmup, then linear decay to zero.

#[derive(Debug, Clone)]
pub struct LinearSchedule {
    base_lr: f64,
    warmup_steps: usize,
    total_steps: usize,
    current_step: usize,
}

impl LinearSchedule {
    #[must_use]
    pub fn new(base_lr: f64, warmup_steps: usize, total_steps: usize) -> Self {
        Self { base_lr, warmup_steps, total_steps, current_step: 0 }
    }

    #[must_use]
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Rate for the current step.
    #[must_use]
    pub fn lr(&self) -> f64 {
        let step = self.current_step as f64;
        if self.current_step < self.warmup_steps {
            return self.base_lr * step / self.warmup_steps as f64;
        }
        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps);
        if decay_steps == 0 {
            return 0.0;
        }
        let progress = (self.current_step - self.warmup_steps) as f64 / decay_steps as f64;
        self.base_lr * (1.0 - progress).max(0.0)
    }

    /// Advance one optimizer step and return the new rate.
    pub fn step(&mut self) -> f64 {
        self.current_step += 1;
        self.lr()
    }
}
