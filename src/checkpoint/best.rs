/// Starting value for best-so-far trackers. F1 lives in [0, 1], so the first
/// observation always beats it.
pub const BEST_SENTINEL: f64 = -1.0;

/// Best value of a scalar seen so far in this process (mode max).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningBest {
    best: f64,
}

impl RunningBest {
    pub fn new() -> Self {
        RunningBest { best: BEST_SENTINEL }
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    /// Records `value`; returns true when it strictly beats the previous best.
    pub fn observe(&mut self, value: f64) -> bool {
        if value > self.best {
            self.best = value;
            true
        } else {
            false
        }
    }
}

impl Default for RunningBest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_maxima_fire_exactly_once_each() {
        let mut best = RunningBest::new();
        let fired: Vec<usize> = [0.1, 0.5, 0.3, 0.7]
            .iter()
            .enumerate()
            .filter_map(|(epoch, &f1)| best.observe(f1).then_some(epoch))
            .collect();
        assert_eq!(fired, vec![0, 1, 3]);
        assert_eq!(best.best(), 0.7);
    }

    #[test]
    fn ties_do_not_count_as_improvement() {
        let mut best = RunningBest::new();
        assert!(best.observe(0.0));
        assert!(!best.observe(0.0));
    }
}
