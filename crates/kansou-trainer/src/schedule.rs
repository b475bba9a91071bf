/// Linear decay from the initial learning rate to zero, no warmup.
///
/// Advanced once per optimizer step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSchedule {
    initial_lr: f64,
    total_steps: usize,
    step: usize,
}

impl LinearSchedule {
    pub fn new(initial_lr: f64, total_steps: usize) -> Self {
        Self {
            initial_lr,
            total_steps,
            step: 0,
        }
    }

    /// Rate for the next optimizer step.
    pub fn learning_rate(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        let remaining = self.total_steps.saturating_sub(self.step);
        self.initial_lr * remaining as f64 / self.total_steps as f64
    }

    /// Record one optimizer step and return the new rate.
    pub fn step(&mut self) -> f64 {
        self.step += 1;
        self.learning_rate()
    }

    pub fn steps_taken(&self) -> usize {
        self.step
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_initial_rate() {
        let schedule = LinearSchedule::new(2e-5, 100);
        assert_eq!(schedule.learning_rate(), 2e-5);
    }

    #[test]
    fn decays_linearly_to_zero() {
        let mut schedule = LinearSchedule::new(1.0, 4);
        let rates: Vec<f64> = (0..4).map(|_| schedule.step()).collect();
        assert_eq!(rates, vec![0.75, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn never_goes_negative() {
        let mut schedule = LinearSchedule::new(1.0, 2);
        for _ in 0..5 {
            schedule.step();
        }
        assert_eq!(schedule.learning_rate(), 0.0);
        assert_eq!(schedule.steps_taken(), 5);
    }

    #[test]
    fn zero_steps_means_zero_rate() {
        assert_eq!(LinearSchedule::new(1.0, 0).learning_rate(), 0.0);
    }
}
