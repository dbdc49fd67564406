//! Prior over the root variable and its value.

use crate::error::{RbnError, RbnResult};
use crate::tensor::{normalize, validate_weights};
use ndarray::{Array1, ArrayView1};

/// Distribution over `(root cell, root value)` pairs.
#[derive(Clone, Debug)]
pub struct Prior {
    structural_distributions: Array1<f64>,
    prior_distributions: Vec<Array1<f64>>,
}

impl Prior {
    /// `struc_weights` has one entry per cell; `prior_weights[i]` one entry
    /// per value of cell `i`.
    pub fn new(struc_weights: Array1<f64>, prior_weights: Vec<Array1<f64>>) -> RbnResult<Self> {
        validate_weights(&struc_weights, "structural prior weights")?;
        if struc_weights.len() != prior_weights.len() {
            return Err(RbnError::malformed(format!(
                "{} structural weights for {} value distributions",
                struc_weights.len(),
                prior_weights.len()
            )));
        }
        for weights in &prior_weights {
            validate_weights(weights, "prior value weights")?;
            if weights.is_empty() {
                return Err(RbnError::malformed("prior value weights are empty"));
            }
        }
        Ok(Prior {
            structural_distributions: normalize(&struc_weights),
            prior_distributions: prior_weights.iter().map(normalize).collect(),
        })
    }

    /// Probability of each cell being the root.
    pub fn structural_distributions(&self) -> &Array1<f64> {
        &self.structural_distributions
    }

    /// Distribution over root values, given that cell `i` is the root.
    pub fn prior_distributions(&self) -> &[Array1<f64>] {
        &self.prior_distributions
    }

    pub fn num_cells(&self) -> usize {
        self.prior_distributions.len()
    }

    /// Combine the root inside vectors of every cell into the marginal likelihood.
    pub fn marginal(&self, root_vectors: &[ArrayView1<f64>]) -> RbnResult<f64> {
        if root_vectors.len() != self.num_cells() {
            return Err(RbnError::malformed(format!(
                "prior covers {} cells, got {} root vectors",
                self.num_cells(),
                root_vectors.len()
            )));
        }
        let mut total = 0.0;
        for ((structural, values), root) in self
            .structural_distributions
            .iter()
            .zip(&self.prior_distributions)
            .zip(root_vectors)
        {
            if values.len() != root.len() {
                return Err(RbnError::malformed(format!(
                    "prior over {} values, root vector has {}",
                    values.len(),
                    root.len()
                )));
            }
            total += structural * values.dot(root);
        }
        Ok(total)
    }
}
