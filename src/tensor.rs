//! Weight validation and normalization of conditional probability tensors.
//!
//! Weight tensors put the conditioning (parent) axis last. Normalizing turns
//! every parent slice into a distribution over the remaining axes. A slice
//! whose weights are all zero stays all zero: that parent value generates
//! nothing, which is a legitimate state of the model.

use crate::error::{RbnError, RbnResult};
use ndarray::{Array, Array1, ArrayBase, Axis, Data, Dimension, RemoveAxis};

/// Check that every weight is finite and non-negative.
pub fn validate_weights<S, D>(weights: &ArrayBase<S, D>, what: &str) -> RbnResult<()>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    match weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        Some(bad) => Err(RbnError::malformed(format!(
            "{} contains invalid weight {}",
            what, bad
        ))),
        None => Ok(()),
    }
}

/// Normalize a weight vector to sum to one. An all-zero vector stays zero.
pub fn normalize(weights: &Array1<f64>) -> Array1<f64> {
    let total = weights.sum();
    if total > 0.0 {
        weights / total
    } else {
        Array1::zeros(weights.len())
    }
}

/// Normalize over all leading axes, separately for each index of the last axis.
///
/// For a `(terminal, parent)` matrix this yields `P(terminal | parent)`; for a
/// `(left, right, parent)` tensor it yields `P(left, right | parent)`.
pub fn normalize_conditional<D>(weights: &Array<f64, D>) -> Array<f64, D>
where
    D: Dimension + RemoveAxis,
{
    let mut probs = weights.clone();
    let parent_axis = Axis(probs.ndim() - 1);
    for mut slice in probs.axis_iter_mut(parent_axis) {
        let total = slice.sum();
        if total > 0.0 {
            slice /= total;
        } else {
            slice.fill(0.0);
        }
    }
    probs
}
