//! Compiling weighted string rules into a sequential network.
//!
//! The compiled network has a single cell whose variable ranges over the
//! non-terminals, the classical PCFG encoding:
//!
//! - all `A --> x` rules fill one terminal transition, `weights[x, A]`,
//! - all `A --> B C` rules fill one binary transition, `weights[B, C, A]`,
//! - the action weights are the total unary and total binary rule weight,
//! - the prior puts all mass on the start symbol.
//!
//! A non-terminal without unary (or binary) rules has an all-zero slice in
//! that transition, so it never emits (or never splits).

use crate::cell::Cell;
use crate::chart::{InsideChart, Span, TerminalChart};
use crate::error::{RbnError, RbnResult};
use crate::parser::{parse_production, Production};
use crate::prior::Prior;
use crate::rbn::RecursiveBayesianNetwork;
use crate::schedule::SpanSchedule;
use crate::sequential::SequentialRbn;
use crate::transition::{BinaryNonTerminalTransition, TerminalTransition, Transition};
use crate::variable::Variable;
use ndarray::{Array1, Array2, Array3};
use rustc_hash::FxHashMap;
use std::fmt;

/// Symbol table mapping names to dense indices.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    index: FxHashMap<Box<str>, usize>,
    names: Vec<Box<str>>,
}

impl Vocabulary {
    /// Build from distinct names; duplicates are rejected.
    pub fn new<I, S>(names: I, what: &str) -> RbnResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Vocabulary::default();
        for name in names {
            let name = name.as_ref();
            if vocab.index.contains_key(name) {
                return Err(RbnError::malformed(format!(
                    "duplicate {} symbol: {}",
                    what, name
                )));
            }
            let boxed: Box<str> = name.into();
            vocab.index.insert(boxed.clone(), vocab.names.len());
            vocab.names.push(boxed);
        }
        Ok(vocab)
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Like [`get`](Self::get), but unknown names are an error.
    pub fn lookup(&self, name: &str) -> RbnResult<usize> {
        self.get(name)
            .ok_or_else(|| RbnError::UnknownSymbol(name.to_string()))
    }

    pub fn resolve(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Parse `(rule string, weight)` pairs.
pub fn parse_rules<S: AsRef<str>>(rules: &[(S, f64)]) -> RbnResult<Vec<(Production, f64)>> {
    rules
        .iter()
        .map(|(rule, weight)| Ok((parse_production(rule.as_ref())?, *weight)))
        .collect()
}

/// A PCFG over named symbols, evaluated through a [`SequentialRbn`].
#[derive(Debug, Clone)]
pub struct AbstractedPcfg {
    non_terminals: Vocabulary,
    terminals: Vocabulary,
    rbn: SequentialRbn,
    words: Vec<String>,
}

impl AbstractedPcfg {
    /// Compile weighted productions over the declared symbols.
    pub fn new<N, T>(
        non_terminals: N,
        terminals: T,
        rules: impl IntoIterator<Item = (Production, f64)>,
        start: &str,
    ) -> RbnResult<Self>
    where
        N: IntoIterator,
        N::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        let non_terminals = Vocabulary::new(non_terminals, "non-terminal")?;
        let terminals = Vocabulary::new(terminals, "terminal")?;
        let (v, t) = (non_terminals.len(), terminals.len());
        if v == 0 {
            return Err(RbnError::malformed("grammar has no non-terminals"));
        }

        let mut unary = Array2::zeros((t, v));
        let mut binary = Array3::zeros((v, v, v));
        let (mut has_unary, mut has_binary) = (false, false);
        for (production, weight) in rules {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RbnError::malformed(format!(
                    "rule '{}' has invalid weight {}",
                    production, weight
                )));
            }
            let lhs = non_terminals.lookup(production.lhs())?;
            match &production {
                Production::Unary { symbol, .. } => {
                    unary[[terminals.lookup(symbol)?, lhs]] += weight;
                    has_unary = true;
                }
                Production::Binary { left, right, .. } => {
                    let l = non_terminals.lookup(left)?;
                    let r = non_terminals.lookup(right)?;
                    binary[[l, r, lhs]] += weight;
                    has_binary = true;
                }
            }
        }

        let mut transitions: Vec<Transition> = Vec::new();
        let mut actions = Vec::new();
        if has_unary {
            actions.push(unary.sum());
            transitions.push(TerminalTransition::new(unary)?.into());
        }
        if has_binary {
            actions.push(binary.sum());
            transitions.push(BinaryNonTerminalTransition::new(binary)?.into());
        }
        if transitions.is_empty() {
            return Err(RbnError::malformed("grammar has no rules"));
        }
        let cell = Cell::new(Variable::new(v)?, Array1::from(actions), transitions)?;

        let mut start_weights = Array1::zeros(v);
        start_weights[non_terminals.lookup(start)?] = 1.0;
        let prior = Prior::new(Array1::ones(1), vec![start_weights])?;

        Ok(AbstractedPcfg {
            non_terminals,
            terminals,
            rbn: SequentialRbn::new(vec![cell], prior)?,
            words: Vec::new(),
        })
    }

    /// Compile rules given as strings such as `"S --> NP VP"`.
    pub fn from_rule_strings<N, T, S>(
        non_terminals: N,
        terminals: T,
        rules: &[(S, f64)],
        start: &str,
    ) -> RbnResult<Self>
    where
        N: IntoIterator,
        N::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
        S: AsRef<str>,
    {
        Self::new(non_terminals, terminals, parse_rules(rules)?, start)
    }

    pub fn non_terminals(&self) -> &Vocabulary {
        &self.non_terminals
    }

    pub fn terminals(&self) -> &Vocabulary {
        &self.terminals
    }

    pub fn cells(&self) -> &[Cell] {
        self.rbn.cells()
    }

    pub fn rbn(&self) -> &SequentialRbn {
        &self.rbn
    }

    /// Marginal likelihood of a sequence of terminal names.
    ///
    /// Words that are not terminals of the grammar have probability zero.
    pub fn inside<S: AsRef<str>>(&mut self, sequence: &[S]) -> RbnResult<f64> {
        self.words = sequence.iter().map(|w| w.as_ref().to_string()).collect();
        let observations = sequence
            .iter()
            .map(|w| self.terminals.get(w.as_ref()))
            .collect();
        self.rbn
            .inside_observed(TerminalChart::new(observations))
    }

    /// The chart of the last `inside` call.
    pub fn inside_chart(&self) -> RbnResult<&InsideChart> {
        self.rbn.get_inside_chart()
    }

    /// The last chart with values keyed by non-terminal name.
    pub fn map_inside_chart(&self) -> RbnResult<NamedChart> {
        let chart = self.inside_chart()?;
        let n = chart.sequence_len();
        let mut entries = Vec::new();
        for length in (1..=n).rev() {
            for span in SpanSchedule::spans_of_length(n, length) {
                let Some(values) = chart.get(0, span) else {
                    continue;
                };
                let named: Vec<(String, f64)> = values
                    .iter()
                    .enumerate()
                    .filter(|&(_, &p)| p != 0.0)
                    .filter_map(|(id, &p)| {
                        self.non_terminals.resolve(id).map(|name| (name.to_string(), p))
                    })
                    .collect();
                if !named.is_empty() {
                    entries.push((span, named));
                }
            }
        }
        Ok(NamedChart {
            words: self.words.clone(),
            entries,
        })
    }
}

/// Non-zero chart entries keyed by span and non-terminal name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedChart {
    words: Vec<String>,
    entries: Vec<(Span, Vec<(String, f64)>)>,
}

impl NamedChart {
    /// Inside probability of `non_terminal` over `span`; zero if absent.
    pub fn get(&self, span: Span, non_terminal: &str) -> f64 {
        self.entries
            .iter()
            .find(|(s, _)| *s == span)
            .and_then(|(_, values)| values.iter().find(|(name, _)| name == non_terminal))
            .map_or(0.0, |(_, p)| *p)
    }

    pub fn entries(&self) -> &[(Span, Vec<(String, f64)>)] {
        &self.entries
    }

    /// Multi-line rendering, longest spans first.
    pub fn pretty(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for NamedChart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (span, values) in &self.entries {
            let covered = self
                .words
                .get(span.start..span.end)
                .map(|w| w.join(" "))
                .unwrap_or_default();
            write!(f, "{} \"{}\":", span, covered)?;
            for (name, p) in values {
                write!(f, " {}={:.3e}", name, p)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
