//! Example buffer and the class-balanced batch sampler.
//!
//! The buffer grows with every observed pending set and is drained only by
//! [`ExampleBuffer::sample_balanced`], which pops from the end and either
//! admits or discards each popped example. Nothing popped is ever put back.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Original strings behind an example, kept only in debug mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugPayload {
    pub left: String,
    pub right: String,
    /// Ground-truth record the label was parsed from.
    pub record: String,
}

/// One labeled observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub features: Vec<f32>,
    /// True when the pair unifies.
    pub unifies: bool,
    pub debug: Option<DebugPayload>,
}

impl Example {
    pub fn new(features: Vec<f32>, unifies: bool) -> Self {
        Self {
            features,
            unifies,
            debug: None,
        }
    }

    pub fn target(&self) -> f32 {
        if self.unifies {
            1.0
        } else {
            0.0
        }
    }
}

/// Output of one balanced sampling pass.
#[derive(Debug, Clone, Default)]
pub struct BalancedBatch {
    /// Admitted examples, in the order they were popped.
    pub examples: Vec<Example>,
    /// Examples popped but rejected by the admission rule.
    pub discarded: usize,
}

impl BalancedBatch {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.examples.iter().filter(|e| e.unifies).count()
    }

    pub fn negatives(&self) -> usize {
        self.len() - self.positives()
    }

    pub fn features(&self) -> Vec<Vec<f32>> {
        self.examples.iter().map(|e| e.features.clone()).collect()
    }

    pub fn targets(&self) -> Vec<f32> {
        self.examples.iter().map(Example::target).collect()
    }
}

/// Ordered example store with running per-class counters.
///
/// `pos_count`/`neg_count` always equal the number of positive/negative
/// examples currently held; the sampler decrements them as it pops.
#[derive(Debug, Clone, Default)]
pub struct ExampleBuffer {
    examples: Vec<Example>,
    pos_count: usize,
    neg_count: usize,
    debug: bool,
}

impl ExampleBuffer {
    /// Create an empty buffer. Debug payloads are retained only when `debug` is set.
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn pos_count(&self) -> usize {
        self.pos_count
    }

    pub fn neg_count(&self) -> usize {
        self.neg_count
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn append(&mut self, mut example: Example) {
        if !self.debug {
            example.debug = None;
        }
        if example.unifies {
            self.pos_count += 1;
        } else {
            self.neg_count += 1;
        }
        self.examples.push(example);
    }

    /// Apply one random permutation to the whole buffer.
    pub fn shuffle_all<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.examples.shuffle(rng);
    }

    /// Destructively draw up to `total` examples, aiming for `target_pos`
    /// positives and `total - target_pos` negatives.
    ///
    /// Pops from the end of the buffer. A popped negative is admitted only
    /// if `accepted + still_needed_positives < total`; a popped positive
    /// only if `accepted + still_needed_negatives < total`. Rejected examples
    /// are dropped. Sampling stops when `total` examples are admitted or
    /// when nothing left in the buffer could still be admitted, so a short
    /// batch is a normal outcome.
    pub fn sample_balanced(&mut self, total: usize, target_pos: usize) -> BalancedBatch {
        let target_pos = target_pos.min(total);
        let target_neg = total - target_pos;

        let mut batch = BalancedBatch::default();
        let mut pos = 0usize;
        let mut neg = 0usize;

        while pos + neg < total {
            let pos_open = pos < target_pos && self.pos_count > 0;
            let neg_open = neg < target_neg && self.neg_count > 0;
            if !pos_open && !neg_open {
                break;
            }
            let Some(example) = self.examples.pop() else {
                break;
            };

            let accepted = pos + neg;
            let admit = if example.unifies {
                self.pos_count = self.pos_count.saturating_sub(1);
                let needed_neg = target_neg - neg;
                accepted + needed_neg < total
            } else {
                self.neg_count = self.neg_count.saturating_sub(1);
                let needed_pos = target_pos - pos;
                accepted + needed_pos < total
            };

            if admit {
                if example.unifies {
                    pos += 1;
                } else {
                    neg += 1;
                }
                batch.examples.push(example);
            } else {
                batch.discarded += 1;
            }
        }

        if batch.len() < total {
            tracing::debug!(
                requested = total,
                target_pos,
                got = batch.len(),
                positives = pos,
                remaining = self.examples.len(),
                "Short balanced batch"
            );
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Buffer whose examples carry their insertion index as the only feature.
    fn buffer_with(labels: &[bool]) -> ExampleBuffer {
        let mut buf = ExampleBuffer::new(false);
        for (i, &unifies) in labels.iter().enumerate() {
            buf.append(Example::new(vec![i as f32], unifies));
        }
        buf
    }

    fn labels(pos: usize, neg: usize) -> Vec<bool> {
        let mut v = vec![true; pos];
        v.extend(std::iter::repeat(false).take(neg));
        v
    }

    fn assert_counters_match(buf: &ExampleBuffer) {
        let pos = buf.examples().iter().filter(|e| e.unifies).count();
        assert_eq!(buf.pos_count(), pos);
        assert_eq!(buf.neg_count(), buf.len() - pos);
    }

    #[test]
    fn test_append_updates_counters() {
        let buf = buffer_with(&[true, false, false, true, false]);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.pos_count(), 2);
        assert_eq!(buf.neg_count(), 3);
    }

    #[test]
    fn test_debug_payload_only_in_debug_mode() {
        let payload = DebugPayload {
            left: "p(a)".into(),
            right: "p(X)".into(),
            record: "p(a)\tp(X)\t1".into(),
        };
        let mut example = Example::new(vec![1.0], true);
        example.debug = Some(payload.clone());

        let mut plain = ExampleBuffer::new(false);
        plain.append(example.clone());
        assert!(plain.examples()[0].debug.is_none());

        let mut debug = ExampleBuffer::new(true);
        debug.append(example);
        assert_eq!(debug.examples()[0].debug.as_ref(), Some(&payload));
    }

    #[test]
    fn test_shuffle_keeps_labels_with_features() {
        let mut buf = buffer_with(&labels(10, 10));
        let mut rng = StdRng::seed_from_u64(3);
        buf.shuffle_all(&mut rng);

        assert_eq!(buf.len(), 20);
        for e in buf.examples() {
            // first 10 inserted were positive
            assert_eq!(e.unifies, e.features[0] < 10.0);
        }
        assert_counters_match(&buf);
    }

    #[test]
    fn test_enough_of_both_classes() {
        // 6 positives + 2 negatives, total=4, target_pos=2
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let mut buf = buffer_with(&labels(6, 2));
            buf.shuffle_all(&mut rng);
            let batch = buf.sample_balanced(4, 2);

            assert_eq!(batch.len(), 4);
            assert_eq!(batch.positives(), 2);
            assert_eq!(batch.negatives(), 2);
            assert!(buf.len() <= 4);
            assert_eq!(buf.neg_count(), 0);
            assert_counters_match(&buf);
        }
    }

    #[test]
    fn test_single_positive_gives_short_batch() {
        // 1 positive + 5 negatives, total=4, target_pos=2
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..20 {
            let mut buf = buffer_with(&labels(1, 5));
            buf.shuffle_all(&mut rng);
            let batch = buf.sample_balanced(4, 2);

            assert_eq!(batch.positives(), 1);
            assert!(batch.negatives() <= 3);
            assert!(batch.len() < 4);
            assert_eq!(buf.pos_count(), 0);
            assert_counters_match(&buf);
        }
    }

    #[test]
    fn test_pop_order_is_reverse_of_buffer() {
        let mut buf = buffer_with(&[false, true, false, true]);
        let batch = buf.sample_balanced(4, 2);
        let order: Vec<f32> = batch.examples.iter().map(|e| e.features[0]).collect();
        assert_eq!(order, vec![3.0, 2.0, 1.0, 0.0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_rejected_examples_are_dropped() {
        // Positives on top of the stack; only 1 positive admitted for target_pos=1.
        let mut buf = buffer_with(&[false, false, true, true, true]);
        let batch = buf.sample_balanced(3, 1);

        assert_eq!(batch.positives(), 1);
        assert_eq!(batch.negatives(), 2);
        assert_eq!(batch.discarded, 2);
        assert!(buf.is_empty());
        assert_counters_match(&buf);
    }

    #[test]
    fn test_empty_and_zero_requests() {
        let mut empty = ExampleBuffer::new(false);
        assert!(empty.sample_balanced(32, 16).is_empty());

        let mut buf = buffer_with(&labels(3, 3));
        assert!(buf.sample_balanced(0, 0).is_empty());
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn test_target_pos_clamped_to_total() {
        let mut buf = buffer_with(&labels(5, 5));
        let batch = buf.sample_balanced(3, 10);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.negatives(), 0);
    }

    #[test]
    fn test_sampling_bounds_hold_for_random_buffers() {
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..500 {
            let n_pos = rng.gen_range(0..20);
            let n_neg = rng.gen_range(0..20);
            let total = rng.gen_range(0..16);
            let target_pos = rng.gen_range(0..=total);

            let mut buf = buffer_with(&labels(n_pos, n_neg));
            buf.shuffle_all(&mut rng);
            let before: Vec<f32> = buf.examples().iter().map(|e| e.features[0]).collect();
            let batch = buf.sample_balanced(total, target_pos);

            assert!(batch.len() <= total);
            assert!(batch.positives() <= target_pos);
            assert!(batch.negatives() <= total - target_pos);
            if n_pos >= target_pos && n_neg >= total - target_pos {
                assert_eq!(batch.len(), total);
                assert_eq!(batch.positives(), target_pos);
            }

            // Emitted and discarded examples are gone; the rest is an untouched prefix.
            let consumed = batch.len() + batch.discarded;
            assert_eq!(buf.len(), before.len() - consumed);
            let remaining: Vec<f32> = buf.examples().iter().map(|e| e.features[0]).collect();
            assert_eq!(remaining, before[..buf.len()]);
            for e in &batch.examples {
                assert!(!remaining.contains(&e.features[0]));
            }
            assert_counters_match(&buf);
        }
    }
}
