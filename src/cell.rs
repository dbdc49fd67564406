//! Cells: one variable, its transitions and the choice among them.
//!
//! The action distribution is static: it is shared by every value of the
//! variable instead of being conditioned on it.

use crate::chart::{InsideChart, Span, TerminalChart};
use crate::error::{RbnError, RbnResult};
use crate::tensor::{normalize, validate_weights};
use crate::transition::Transition;
use crate::variable::Variable;
use ndarray::{Array1, ArrayViewD};

/// A variable together with the transitions that can explain its spans.
#[derive(Clone, Debug)]
pub struct Cell {
    variable: Variable,
    transitions: Vec<Transition>,
    weights: Array1<f64>,
    action_probabilities: Array1<f64>,
}

impl Cell {
    /// Create a cell. `weights` holds one action weight per transition.
    pub fn new(
        variable: Variable,
        weights: Array1<f64>,
        transitions: Vec<Transition>,
    ) -> RbnResult<Self> {
        validate_weights(&weights, "cell action weights")?;
        if weights.len() != transitions.len() {
            return Err(RbnError::malformed(format!(
                "{} action weights for {} transitions",
                weights.len(),
                transitions.len()
            )));
        }
        for (i, transition) in transitions.iter().enumerate() {
            if transition.parent_cardinality() != variable.cardinality() {
                return Err(RbnError::malformed(format!(
                    "transition {} has parent axis of size {}, variable has cardinality {}",
                    i,
                    transition.parent_cardinality(),
                    variable.cardinality()
                )));
            }
        }
        let action_probabilities = normalize(&weights);
        Ok(Cell {
            variable,
            transitions,
            weights,
            action_probabilities,
        })
    }

    pub fn variable(&self) -> Variable {
        self.variable
    }

    pub fn cardinality(&self) -> usize {
        self.variable.cardinality()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    /// Probability of choosing each transition, in transition order.
    pub fn transition_probabilities(&self) -> &Array1<f64> {
        &self.action_probabilities
    }

    /// The conditional probability tensor of every transition.
    pub fn transition_tensors(&self) -> Vec<ArrayViewD<'_, f64>> {
        self.transitions
            .iter()
            .map(Transition::transition_probabilities)
            .collect()
    }

    /// Inside vector of this cell for `span`, over the variable's values.
    ///
    /// Length-one spans are explained by terminal transitions, longer spans
    /// by binary transitions summed over every split point. `owner` is the
    /// index of this cell, used to resolve self-referencing children.
    pub fn inside(
        &self,
        owner: usize,
        span: Span,
        terminals: &TerminalChart,
        chart: &InsideChart,
    ) -> RbnResult<Array1<f64>> {
        let mut values = Array1::zeros(self.cardinality());
        for (transition, &action) in self
            .transitions
            .iter()
            .zip(self.action_probabilities.iter())
        {
            if action == 0.0 {
                continue;
            }
            match transition {
                Transition::Terminal(t) if span.len() == 1 => {
                    let symbol = terminals.symbol(span.start)?;
                    values.scaled_add(action, &t.emission(symbol));
                }
                Transition::Binary(t) if span.len() > 1 => {
                    let left_idx = t.left_index(owner);
                    let right_idx = t.right_index(owner);
                    let mut acc = Array1::zeros(self.cardinality());
                    for (left, right) in span.splits() {
                        let l = chart.require(left_idx, left)?;
                        let r = chart.require(right_idx, right)?;
                        acc += &t.expectation(l, r);
                    }
                    values.scaled_add(action, &acc);
                }
                _ => {}
            }
        }
        Ok(values)
    }
}
