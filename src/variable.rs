//! Discrete random variables.

use crate::error::{RbnError, RbnResult};

/// A discrete variable taking values `0..cardinality`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Variable {
    cardinality: usize,
}

impl Variable {
    /// Create a variable; the cardinality must be positive.
    pub fn new(cardinality: usize) -> RbnResult<Self> {
        if cardinality == 0 {
            return Err(RbnError::malformed("variable cardinality must be positive"));
        }
        Ok(Variable { cardinality })
    }

    pub fn cardinality(&self) -> usize {
        self.cardinality
    }
}
