//! Progress monitoring: cycling detection and bound perturbation.

use std::collections::VecDeque;

/// What the driver should do after a progress checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressAction {
    Continue,
    /// Apply a bound perturbation and refactorize.
    Perturb,
    /// Perturbation retries are exhausted.
    Abort,
}

/// Sliding-window cycle detector.
///
/// At every checkpoint (one per `DISPLAYFREQ` iterations) the objective
/// value and a basis signature are recorded. A signature reappearing
/// inside the window without strict objective improvement counts as a
/// cycle and triggers a perturbation round; a bounded number of rounds
/// later the run is declared cycling.
#[derive(Debug, Clone)]
pub struct ProgressMonitor {
    window: VecDeque<(u64, f64)>,
    capacity: usize,
    perturb_rounds: usize,
    max_perturb_rounds: usize,
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::new(16, 3)
    }
}

impl ProgressMonitor {
    pub fn new(window: usize, max_perturb_rounds: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(window),
            capacity: window,
            perturb_rounds: 0,
            max_perturb_rounds,
        }
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.perturb_rounds = 0;
    }

    /// Record a checkpoint and classify progress.
    pub fn checkpoint(&mut self, signature: u64, objective: f64) -> ProgressAction {
        let scale = objective.abs().max(1.0);
        let repeat = self
            .window
            .iter()
            .any(|&(sig, obj)| sig == signature && (objective - obj).abs() <= 1e-12 * scale);

        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back((signature, objective));

        if !repeat {
            return ProgressAction::Continue;
        }
        if self.perturb_rounds >= self.max_perturb_rounds {
            return ProgressAction::Abort;
        }
        self.perturb_rounds += 1;
        ProgressAction::Perturb
    }
}

/// Small deterministic generator for reproducible perturbations.
#[derive(Debug, Clone)]
pub struct PerturbSequence {
    state: u64,
}

impl PerturbSequence {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed | 1,
        }
    }

    /// Next value in `[0.5, 1.5)`.
    pub fn next(&mut self) -> f64 {
        // xorshift64
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        0.5 + (x >> 11) as f64 / (1u64 << 53) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_cycle_on_fresh_signatures() {
        let mut pm = ProgressMonitor::default();
        for i in 0..20 {
            assert_eq!(pm.checkpoint(i as u64, -(i as f64)), ProgressAction::Continue);
        }
    }

    #[test]
    fn test_cycle_then_abort() {
        let mut pm = ProgressMonitor::new(8, 2);
        assert_eq!(pm.checkpoint(42, 1.0), ProgressAction::Continue);
        assert_eq!(pm.checkpoint(42, 1.0), ProgressAction::Perturb);
        assert_eq!(pm.checkpoint(42, 1.0), ProgressAction::Perturb);
        assert_eq!(pm.checkpoint(42, 1.0), ProgressAction::Abort);
    }

    #[test]
    fn test_improvement_clears_cycle() {
        let mut pm = ProgressMonitor::default();
        assert_eq!(pm.checkpoint(42, 1.0), ProgressAction::Continue);
        // same basis signature, strictly better objective: not a cycle
        assert_eq!(pm.checkpoint(42, 0.5), ProgressAction::Continue);
    }

    #[test]
    fn test_perturb_sequence_is_deterministic() {
        let mut a = PerturbSequence::new(7);
        let mut b = PerturbSequence::new(7);
        for _ in 0..10 {
            let (x, y) = (a.next(), b.next());
            assert_eq!(x, y);
            assert!((0.5..1.5).contains(&x));
        }
    }
}
