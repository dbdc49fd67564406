//! Error type shared by the model, the inside engine and the grammar compiler.

use crate::parser::ParseError;
use thiserror::Error;

/// Errors raised while building a network or running the inside pass.
///
/// Zero-probability observations are not errors: they show up as exact
/// zeros in the chart and a marginal likelihood of `0.0`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RbnError {
    /// A protocol operation was called on a network that does not provide it.
    #[error("operation not implemented: {0}")]
    NotImplemented(&'static str),

    /// Shapes, weights or indices of the model do not fit together.
    #[error("malformed model: {0}")]
    MalformedModel(String),

    /// A chart entry was read before the schedule populated it.
    #[error("chart entry for variable {var_idx} at ({start}, {end}) read before it was computed")]
    Unscheduled {
        var_idx: usize,
        start: usize,
        end: usize,
    },

    /// A location outside the chart was addressed.
    #[error("invalid location ({start}, {end}) for a sequence of length {len}")]
    InvalidLocation { start: usize, end: usize, len: usize },

    /// The sequence exceeds the configured maximum length.
    #[error("sequence of length {len} exceeds the configured maximum of {max}")]
    SequenceTooLong { len: usize, max: usize },

    /// A grammar rule could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A grammar rule names a symbol that was not declared.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
}

/// Result type used throughout the crate.
pub type RbnResult<T> = Result<T, RbnError>;

impl RbnError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        RbnError::MalformedModel(msg.into())
    }
}
