use rand::Rng;

/// One stored transition `(s0, a0, r0, s1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    pub s0: Vec<f64>,
    pub a0: usize,
    pub r0: f64,
    pub s1: Vec<f64>,
}

/// Fixed-capacity ring buffer of past transitions.
///
/// Once full, new entries overwrite the oldest slot.
#[derive(Debug, Clone)]
pub struct ReplayMemory {
    capacity: usize,
    entries: Vec<Experience>,
    next: usize,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        ReplayMemory { capacity: capacity.max(1), entries: Vec::new(), next: 0 }
    }

    pub fn push(&mut self, exp: Experience) {
        if self.entries.len() < self.capacity {
            self.entries.push(exp);
        } else {
            self.entries[self.next] = exp;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    /// A uniformly chosen stored transition, or `None` when empty.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Experience> {
        if self.entries.is_empty() {
            return None;
        }
        self.entries.get(rng.gen_range(0..self.entries.len()))
    }

    #[inline]
    pub fn len(&self) -> usize { self.entries.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn exp(r0: f64) -> Experience { Experience { s0: vec![], a0: 0, r0, s1: vec![] } }

    #[test]
    fn overwrites_oldest_when_full() {
        let mut mem = ReplayMemory::new(2);
        mem.push(exp(1.0));
        mem.push(exp(2.0));
        mem.push(exp(3.0));
        assert_eq!(mem.len(), 2);
        let mut rewards: Vec<f64> = mem.entries.iter().map(|e| e.r0).collect();
        rewards.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(rewards, vec![2.0, 3.0]);
    }

    #[test]
    fn sample_from_empty_is_none() {
        let mem = ReplayMemory::new(4);
        assert!(mem.sample(&mut StdRng::seed_from_u64(0)).is_none());
    }
}
