//! Weighted binary cross-entropy on predicted probabilities.

use burn::prelude::*;

/// Probabilities are clamped to `[EPSILON, 1 - EPSILON]` before the log.
pub const EPSILON: f64 = 1e-7;

/// Mean of `w_i * -(y_i ln p_i + (1 - y_i) ln(1 - p_i))` over the batch.
///
/// # Arguments
/// - `probs`: shape `(batch,)`, predicted unify probabilities
/// - `targets`: shape `(batch,)`, 0/1 labels
/// - `weights`: shape `(batch,)`, per-example weights (all ones when unweighted)
///
/// # Returns
/// Scalar loss tensor of shape `(1,)`.
pub fn weighted_bce_loss<B: Backend>(
    probs: Tensor<B, 1>,
    targets: Tensor<B, 1>,
    weights: Tensor<B, 1>,
) -> Tensor<B, 1> {
    let p = probs.clamp(EPSILON, 1.0 - EPSILON);
    let one_minus_p = p.clone().neg().add_scalar(1.0);
    let one_minus_y = targets.clone().neg().add_scalar(1.0);

    let per_example = (targets * p.log() + one_minus_y * one_minus_p.log()).neg();
    (per_example * weights).mean()
}
