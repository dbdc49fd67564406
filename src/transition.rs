//! Production rules of a cell: terminal emission and binary split.
//!
//! Both variants keep the raw weights and the derived conditional
//! probabilities. The parent (conditioning) axis is always the last one:
//!
//! ```text
//! terminal:  weights[terminal, parent]       P(terminal | parent)
//! binary:    weights[left, right, parent]    P(left, right | parent)
//! ```

use crate::error::{RbnError, RbnResult};
use crate::tensor::{normalize_conditional, validate_weights};
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayViewD, Axis};

/// Emission of one observed symbol, ending the recursion.
#[derive(Clone, Debug)]
pub struct TerminalTransition {
    weights: Array2<f64>,
    probabilities: Array2<f64>,
}

impl TerminalTransition {
    /// Build from a `(terminal_cardinality, parent_cardinality)` weight matrix.
    pub fn new(weights: Array2<f64>) -> RbnResult<Self> {
        validate_weights(&weights, "terminal transition")?;
        if weights.is_empty() {
            return Err(RbnError::malformed("terminal transition has an empty axis"));
        }
        let probabilities = normalize_conditional(&weights);
        Ok(TerminalTransition {
            weights,
            probabilities,
        })
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    /// `P(terminal | parent)`, indexed `[terminal, parent]`.
    pub fn transition_probabilities(&self) -> &Array2<f64> {
        &self.probabilities
    }

    pub fn terminal_cardinality(&self) -> usize {
        self.probabilities.nrows()
    }

    pub fn parent_cardinality(&self) -> usize {
        self.probabilities.ncols()
    }

    /// Probability of emitting `symbol` from `parent`. Unknown symbols get zero.
    pub fn probability(&self, parent: usize, symbol: usize) -> f64 {
        self.probabilities
            .get((symbol, parent))
            .copied()
            .unwrap_or(0.0)
    }

    /// Emission probability of `symbol` for every parent value.
    ///
    /// `None` and codes outside the terminal axis are out of vocabulary.
    pub fn emission(&self, symbol: Option<usize>) -> Array1<f64> {
        match symbol {
            Some(s) if s < self.terminal_cardinality() => self.probabilities.row(s).to_owned(),
            _ => Array1::zeros(self.parent_cardinality()),
        }
    }
}

/// Split of a span into a left and a right part.
///
/// The children are explained by the cells at `left_idx` and `right_idx`.
/// Without explicit indices both children refer to the owning cell.
#[derive(Clone, Debug)]
pub struct BinaryNonTerminalTransition {
    weights: Array3<f64>,
    probabilities: Array3<f64>,
    left_idx: Option<usize>,
    right_idx: Option<usize>,
}

impl BinaryNonTerminalTransition {
    /// Build from a `(left_cardinality, right_cardinality, parent_cardinality)` tensor.
    pub fn new(weights: Array3<f64>) -> RbnResult<Self> {
        validate_weights(&weights, "binary transition")?;
        if weights.is_empty() {
            return Err(RbnError::malformed("binary transition has an empty axis"));
        }
        let probabilities = normalize_conditional(&weights);
        Ok(BinaryNonTerminalTransition {
            weights,
            probabilities,
            left_idx: None,
            right_idx: None,
        })
    }

    /// Point the children at the given cells.
    pub fn with_children(mut self, left_idx: usize, right_idx: usize) -> Self {
        self.left_idx = Some(left_idx);
        self.right_idx = Some(right_idx);
        self
    }

    pub fn weights(&self) -> &Array3<f64> {
        &self.weights
    }

    /// `P(left, right | parent)`, indexed `[left, right, parent]`.
    pub fn transition_probabilities(&self) -> &Array3<f64> {
        &self.probabilities
    }

    /// Cell explaining the left child, given the index of the owning cell.
    pub fn left_index(&self, owner: usize) -> usize {
        self.left_idx.unwrap_or(owner)
    }

    /// Cell explaining the right child, given the index of the owning cell.
    pub fn right_index(&self, owner: usize) -> usize {
        self.right_idx.unwrap_or(owner)
    }

    pub fn left_cardinality(&self) -> usize {
        self.probabilities.dim().0
    }

    pub fn right_cardinality(&self) -> usize {
        self.probabilities.dim().1
    }

    pub fn parent_cardinality(&self) -> usize {
        self.probabilities.dim().2
    }

    /// `Σ_{l,r} P(l, r | parent) · left[l] · right[r]` for a single parent value.
    pub fn joint_probability(
        &self,
        parent: usize,
        left: ArrayView1<f64>,
        right: ArrayView1<f64>,
    ) -> f64 {
        let slice = self.probabilities.index_axis(Axis(2), parent);
        left.dot(&slice.dot(&right))
    }

    /// [`joint_probability`](Self::joint_probability) for every parent value at once.
    pub fn expectation(&self, left: ArrayView1<f64>, right: ArrayView1<f64>) -> Array1<f64> {
        let mut out = Array1::zeros(self.parent_cardinality());
        for (r, slice) in self.probabilities.axis_iter(Axis(1)).enumerate() {
            let weight = right[r];
            if weight == 0.0 {
                continue;
            }
            // slice is [left, parent]
            out.scaled_add(weight, &left.dot(&slice));
        }
        out
    }
}

/// A production rule of a cell.
#[derive(Clone, Debug)]
pub enum Transition {
    Terminal(TerminalTransition),
    Binary(BinaryNonTerminalTransition),
}

impl Transition {
    pub fn parent_cardinality(&self) -> usize {
        match self {
            Transition::Terminal(t) => t.parent_cardinality(),
            Transition::Binary(t) => t.parent_cardinality(),
        }
    }

    /// The normalized conditional probability tensor, parent axis last.
    pub fn transition_probabilities(&self) -> ArrayViewD<'_, f64> {
        match self {
            Transition::Terminal(t) => t.transition_probabilities().view().into_dyn(),
            Transition::Binary(t) => t.transition_probabilities().view().into_dyn(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Transition::Terminal(_))
    }
}

impl From<TerminalTransition> for Transition {
    fn from(t: TerminalTransition) -> Self {
        Transition::Terminal(t)
    }
}

impl From<BinaryNonTerminalTransition> for Transition {
    fn from(t: BinaryNonTerminalTransition) -> Self {
        Transition::Binary(t)
    }
}
