//! Charts for the inside pass over a sequence.
//!
//! The terminal chart holds the observed symbol at each position. The inside
//! chart holds, per variable, one probability vector per span `[start, end)`.
//! Storage is dense and array-indexed: every span of a length-`n` sequence
//! has a slot, zero-initialised, plus a flag recording whether the slot has
//! been written. A computed zero vector is therefore distinguishable from an
//! entry that was never computed.

use crate::error::{RbnError, RbnResult};
use ndarray::{Array1, ArrayView1};
use std::fmt;
use std::ops::Index;

/// A half-open span `[start, end)` of sequence positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[inline(always)]
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// All `(left, right)` pairs for split points strictly inside the span.
    pub fn splits(&self) -> impl Iterator<Item = (Span, Span)> {
        let (start, end) = (self.start, self.end);
        ((start + 1)..end).map(move |k| (Span::new(start, k), Span::new(k, end)))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.start, self.end)
    }
}

/// Read access to chart vectors by variable and location.
pub trait ChartLookup<L> {
    /// The vector for `var_idx` at `location`, or `None` if not computed.
    fn lookup(&self, var_idx: usize, location: L) -> Option<ArrayView1<'_, f64>>;
}

/// Observed symbols, one per position. `None` is out of vocabulary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TerminalChart {
    symbols: Vec<Option<usize>>,
}

impl TerminalChart {
    pub fn new(symbols: Vec<Option<usize>>) -> Self {
        TerminalChart { symbols }
    }

    pub fn from_symbols(symbols: &[usize]) -> Self {
        TerminalChart {
            symbols: symbols.iter().copied().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The symbol observed at `position`.
    pub fn symbol(&self, position: usize) -> RbnResult<Option<usize>> {
        self.symbols
            .get(position)
            .copied()
            .ok_or(RbnError::InvalidLocation {
                start: position,
                end: position + 1,
                len: self.symbols.len(),
            })
    }

    pub fn symbols(&self) -> &[Option<usize>] {
        &self.symbols
    }
}

/// Inside vectors of a single variable, for every span of the sequence.
#[derive(Clone, Debug)]
pub struct VariableTable {
    cardinality: usize,
    n: usize,
    /// values[slot * cardinality .. (slot + 1) * cardinality]
    values: Vec<f64>,
    populated: Vec<bool>,
}

impl VariableTable {
    fn new(cardinality: usize, n: usize) -> Self {
        let slots = (n + 1) * (n + 1);
        VariableTable {
            cardinality,
            n,
            values: vec![0.0; slots * cardinality],
            populated: vec![false; slots],
        }
    }

    #[inline(always)]
    fn slot(&self, span: Span) -> Option<usize> {
        if span.start < span.end && span.end <= self.n {
            Some(span.start * (self.n + 1) + span.end)
        } else {
            None
        }
    }

    #[inline(always)]
    fn range(&self, slot: usize) -> std::ops::Range<usize> {
        slot * self.cardinality..(slot + 1) * self.cardinality
    }

    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// The vector at `span`, or `None` if it has not been computed.
    pub fn get(&self, span: Span) -> Option<ArrayView1<'_, f64>> {
        let slot = self.slot(span)?;
        if !self.populated[slot] {
            return None;
        }
        Some(ArrayView1::from(&self.values[self.range(slot)]))
    }

    pub fn is_populated(&self, span: Span) -> bool {
        self.slot(span).map_or(false, |slot| self.populated[slot])
    }

    fn set(&mut self, span: Span, values: &Array1<f64>) -> RbnResult<()> {
        let slot = self.slot(span).ok_or(RbnError::InvalidLocation {
            start: span.start,
            end: span.end,
            len: self.n,
        })?;
        if values.len() != self.cardinality {
            return Err(RbnError::malformed(format!(
                "vector of length {} for a variable of cardinality {}",
                values.len(),
                self.cardinality
            )));
        }
        let range = self.range(slot);
        for (dst, src) in self.values[range].iter_mut().zip(values.iter()) {
            *dst = *src;
        }
        self.populated[slot] = true;
        Ok(())
    }
}

/// `table[(start, end)]` yields the vector of that span.
///
/// Panics for spans outside the sequence. Entries that were never computed
/// read as zeros; use [`VariableTable::get`] to tell them apart.
impl Index<(usize, usize)> for VariableTable {
    type Output = [f64];

    fn index(&self, (start, end): (usize, usize)) -> &[f64] {
        match self.slot(Span::new(start, end)) {
            Some(slot) => &self.values[self.range(slot)],
            None => panic!(
                "span ({}, {}) outside a sequence of length {}",
                start, end, self.n
            ),
        }
    }
}

/// Inside probabilities of every variable over every span.
#[derive(Clone, Debug, Default)]
pub struct InsideChart {
    n: usize,
    tables: Vec<VariableTable>,
}

impl InsideChart {
    /// Allocate a zeroed chart for variables of the given cardinalities.
    pub fn new(cardinalities: &[usize], n: usize) -> Self {
        InsideChart {
            n,
            tables: cardinalities
                .iter()
                .map(|&card| VariableTable::new(card, n))
                .collect(),
        }
    }

    /// Length of the sequence the chart was allocated for.
    pub fn sequence_len(&self) -> usize {
        self.n
    }

    pub fn num_variables(&self) -> usize {
        self.tables.len()
    }

    pub fn table(&self, var_idx: usize) -> Option<&VariableTable> {
        self.tables.get(var_idx)
    }

    pub fn get(&self, var_idx: usize, span: Span) -> Option<ArrayView1<'_, f64>> {
        self.tables.get(var_idx)?.get(span)
    }

    /// Like [`get`](Self::get), but a missing entry is an error.
    pub fn require(&self, var_idx: usize, span: Span) -> RbnResult<ArrayView1<'_, f64>> {
        self.get(var_idx, span).ok_or(RbnError::Unscheduled {
            var_idx,
            start: span.start,
            end: span.end,
        })
    }

    /// Write the vector of `var_idx` at `span`.
    pub fn set(&mut self, var_idx: usize, span: Span, values: &Array1<f64>) -> RbnResult<()> {
        let num_variables = self.tables.len();
        self.tables
            .get_mut(var_idx)
            .ok_or_else(|| {
                RbnError::malformed(format!(
                    "variable index {} out of range ({} variables)",
                    var_idx, num_variables
                ))
            })?
            .set(span, values)
    }

    /// Number of populated entries over all variables.
    pub fn len(&self) -> usize {
        self.tables
            .iter()
            .map(|t| t.populated.iter().filter(|&&p| p).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Index<usize> for InsideChart {
    type Output = VariableTable;

    fn index(&self, var_idx: usize) -> &VariableTable {
        &self.tables[var_idx]
    }
}

impl ChartLookup<Span> for InsideChart {
    fn lookup(&self, var_idx: usize, location: Span) -> Option<ArrayView1<'_, f64>> {
        self.get(var_idx, location)
    }
}
