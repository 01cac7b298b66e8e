//! One-hidden-layer Q-value network trained with plain SGD.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// `q = W2 · tanh(W1 · x + b1) + b2`, weights stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QNetwork {
    inputs: usize,
    hidden: usize,
    actions: usize,
    w1: Vec<f64>,
    b1: Vec<f64>,
    w2: Vec<f64>,
    b2: Vec<f64>,
}

/// Activations kept from a forward pass for the backward step.
pub struct Forward {
    pub hidden: Vec<f64>,
    pub q: Vec<f64>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("network shape {found:?} does not match expected {expected:?} (inputs, hidden, actions)")]
pub struct ShapeMismatch {
    pub expected: (usize, usize, usize),
    pub found: (usize, usize, usize),
}

impl QNetwork {
    const INIT_STD: f64 = 0.01;

    /// Random weights drawn from N(0, 0.01); biases start at zero.
    pub fn new<R: Rng + ?Sized>(inputs: usize, hidden: usize, actions: usize, rng: &mut R) -> Self {
        let normal = Normal::new(0.0, Self::INIT_STD).expect("INIT_STD is finite and positive");
        let mut sample = |n: usize| -> Vec<f64> { (0..n).map(|_| normal.sample(rng)).collect() };
        QNetwork {
            inputs,
            hidden,
            actions,
            w1: sample(hidden * inputs),
            b1: vec![0.0; hidden],
            w2: sample(actions * hidden),
            b2: vec![0.0; actions],
        }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) { (self.inputs, self.hidden, self.actions) }

    /// Check declared dimensions against the stored weight buffers and an expected shape.
    pub fn validate(&self, expected: (usize, usize, usize)) -> Result<(), ShapeMismatch> {
        // Dimensions may come off the wire, so products must not overflow.
        let w1_len = self.hidden.checked_mul(self.inputs);
        let w2_len = self.actions.checked_mul(self.hidden);
        let consistent = w1_len == Some(self.w1.len())
            && self.b1.len() == self.hidden
            && w2_len == Some(self.w2.len())
            && self.b2.len() == self.actions;
        if !consistent || self.shape() != expected {
            return Err(ShapeMismatch { expected, found: self.shape() });
        }
        Ok(())
    }

    pub fn forward(&self, x: &[f64]) -> Forward {
        debug_assert_eq!(x.len(), self.inputs);
        let hidden: Vec<f64> = (0..self.hidden)
            .map(|j| {
                let row = &self.w1[j * self.inputs..(j + 1) * self.inputs];
                let pre: f64 = row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + self.b1[j];
                pre.tanh()
            })
            .collect();
        let q = (0..self.actions)
            .map(|a| {
                let row = &self.w2[a * self.hidden..(a + 1) * self.hidden];
                row.iter().zip(&hidden).map(|(w, h)| w * h).sum::<f64>() + self.b2[a]
            })
            .collect();
        Forward { hidden, q }
    }

    /// Index of the largest Q-value; the lowest index wins ties.
    pub fn argmax(&self, x: &[f64]) -> usize {
        let q = self.forward(x).q;
        let mut best = 0;
        for (a, &v) in q.iter().enumerate().skip(1) {
            if v > q[best] {
                best = a;
            }
        }
        best
    }

    #[inline]
    pub fn max_q(&self, x: &[f64]) -> f64 {
        self.forward(x).q.into_iter().fold(f64::NEG_INFINITY, f64::max)
    }

    /// One SGD step on the output for `action`, given the (already clamped) TD error.
    pub fn backprop(&mut self, x: &[f64], fwd: &Forward, action: usize, td_error: f64, alpha: f64) {
        let w2_row = action * self.hidden;
        for j in 0..self.hidden {
            let h = fwd.hidden[j];
            let dh = self.w2[w2_row + j] * td_error;
            let dpre = dh * (1.0 - h * h);
            self.w2[w2_row + j] -= alpha * td_error * h;
            let w1_row = j * self.inputs;
            for (i, &xi) in x.iter().enumerate() {
                self.w1[w1_row + i] -= alpha * dpre * xi;
            }
            self.b1[j] -= alpha * dpre;
        }
        self.b2[action] -= alpha * td_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn seeded_construction_is_reproducible() {
        let a = QNetwork::new(16, 8, 4, &mut StdRng::seed_from_u64(1));
        let b = QNetwork::new(16, 8, 4, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
        assert!(a.validate((16, 8, 4)).is_ok());
        assert!(a.validate((16, 9, 4)).is_err());
    }

    #[test]
    fn oversized_dimensions_are_a_mismatch() {
        let mut net = QNetwork::new(16, 8, 4, &mut StdRng::seed_from_u64(3));
        net.hidden = 1usize << 60;
        let err = net.validate(net.shape()).unwrap_err();
        assert_eq!(err.found, (16, 1usize << 60, 4));
    }

    #[test]
    fn backprop_moves_q_towards_target() {
        let mut net = QNetwork::new(4, 6, 4, &mut StdRng::seed_from_u64(7));
        let x = [0.5, -0.25, 0.1, 0.9];
        let target = 1.0;
        let before = net.forward(&x).q[2];
        for _ in 0..200 {
            let fwd = net.forward(&x);
            let td = (fwd.q[2] - target).clamp(-1.0, 1.0);
            net.backprop(&x, &fwd, 2, td, 0.05);
        }
        let after = net.forward(&x).q[2];
        assert!((after - target).abs() < (before - target).abs());
        assert!((after - target).abs() < 0.05);
    }
}
