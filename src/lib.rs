//! RBN-Rust: inside probabilities for recursive Bayesian networks.
//!
//! This crate provides:
//! - Variables, terminal and binary transitions, cells and priors
//! - The network protocol and a generic inside pass
//! - A sequential network that fills a span chart bottom-up
//! - A compiler from weighted string rules to a sequential network
//!
//! # Example
//!
//! ```rust
//! use ndarray::array;
//! use rbn_rust::{Cell, Prior, SequentialRbn, TerminalTransition, Variable};
//!
//! let cell = Cell::new(
//!     Variable::new(1).unwrap(),
//!     array![1.0],
//!     vec![TerminalTransition::new(array![[1.0]]).unwrap().into()],
//! )
//! .unwrap();
//! let prior = Prior::new(array![1.0], vec![array![1.0]]).unwrap();
//! let mut rbn = SequentialRbn::new(vec![cell], prior).unwrap();
//! assert_eq!(rbn.inside(&[0]).unwrap(), 1.0);
//! ```

pub mod cell;
pub mod chart;
pub mod error;
pub mod parser;
pub mod pcfg;
pub mod prior;
pub mod rbn;
pub mod schedule;
pub mod sequential;
pub mod tensor;
pub mod transition;
pub mod variable;

// Re-exports for convenience
pub use cell::Cell;
pub use chart::{ChartLookup, InsideChart, Span, TerminalChart};
pub use error::{RbnError, RbnResult};
pub use parser::{parse_production, ParseError, Production};
pub use pcfg::{AbstractedPcfg, NamedChart};
pub use prior::Prior;
pub use rbn::RecursiveBayesianNetwork;
pub use schedule::{SpanSchedule, WorkItem};
pub use sequential::{InsideStats, RbnConfig, SequentialRbn, SequentialRbnBuilder};
pub use transition::{BinaryNonTerminalTransition, TerminalTransition, Transition};
pub use variable::Variable;
