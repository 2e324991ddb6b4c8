//! Bounded FIFO replay buffer: a ring of self-play samples capped at
//! `replaySize`, oldest evicted first. Not a persistent store -- it lives
//! only for the duration of the training run.

use std::collections::VecDeque;

use crate::evaluator::Sample;

pub struct ReplayBuffer {
    capacity: usize,
    samples: VecDeque<Sample>,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> ReplayBuffer {
        ReplayBuffer { capacity, samples: VecDeque::with_capacity(capacity.min(1 << 16)) }
    }

    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn extend(&mut self, samples: Vec<Sample>) {
        for s in samples {
            self.push(s);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice_shuffled(&self, rng: &mut impl rand::Rng) -> Vec<&Sample> {
        let mut refs: Vec<&Sample> = self.samples.iter().collect();
        use rand::seq::SliceRandom;
        refs.shuffle(rng);
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tag: f64) -> Sample {
        Sample { features: vec![tag], target_policy: vec![1.0], target_value: tag }
    }

    #[test]
    fn evicts_oldest_once_over_capacity() {
        let mut buffer = ReplayBuffer::new(2);
        buffer.push(sample(1.0));
        buffer.push(sample(2.0));
        buffer.push(sample(3.0));
        assert_eq!(buffer.len(), 2);
        let remaining: Vec<f64> = buffer.samples.iter().map(|s| s.target_value).collect();
        assert_eq!(remaining, vec![2.0, 3.0]);
    }

    #[test]
    fn extend_appends_in_order_respecting_capacity() {
        let mut buffer = ReplayBuffer::new(3);
        buffer.extend(vec![sample(1.0), sample(2.0), sample(3.0), sample(4.0)]);
        let remaining: Vec<f64> = buffer.samples.iter().map(|s| s.target_value).collect();
        assert_eq!(remaining, vec![2.0, 3.0, 4.0]);
    }
}
