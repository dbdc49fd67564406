//! Inside pass of a recursive Bayesian network over sequences.
//!
//! Generalizes CKY-style bottom-up chart filling to several co-indexed
//! variables whose binary transitions may point at each other:
//!
//! 1. allocate a zeroed chart for every (variable, span),
//! 2. seed all length-one spans from the observed symbols,
//! 3. fill spans of increasing length, summing over every split point,
//! 4. combine the full-span vectors with the prior.

use crate::cell::Cell;
use crate::chart::{InsideChart, Span, TerminalChart};
use crate::error::{RbnError, RbnResult};
use crate::prior::Prior;
use crate::rbn::{RecursiveBayesianNetwork, Schedule};
use crate::schedule::SpanSchedule;
use crate::transition::Transition;
use ndarray::Array1;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Configuration of the inside pass.
#[derive(Debug, Clone)]
pub struct RbnConfig {
    /// Longest sequence accepted by `inside` (0 = unlimited).
    pub max_sequence_length: usize,
    /// Minimum number of spans in a work item before it is split across
    /// threads. Only used with the `parallel` feature.
    pub parallel_threshold: usize,
}

impl Default for RbnConfig {
    fn default() -> Self {
        RbnConfig {
            max_sequence_length: 0,
            parallel_threshold: 64,
        }
    }
}

/// Statistics about the last inside pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsideStats {
    pub sequence_length: usize,
    pub work_items: usize,
    pub cell_updates: usize,
    pub split_points: usize,
}

/// A recursive Bayesian network whose locations are spans of a sequence.
#[derive(Debug, Clone)]
pub struct SequentialRbn {
    cells: Vec<Cell>,
    prior: Prior,
    config: RbnConfig,
    terminal_chart: TerminalChart,
    inside_chart: InsideChart,
    stats: InsideStats,
}

impl SequentialRbn {
    /// Create a network from its cells and prior.
    ///
    /// Child references of binary transitions are resolved here and their
    /// axes checked against the referenced cells.
    pub fn new(cells: Vec<Cell>, prior: Prior) -> RbnResult<Self> {
        Self::with_config(cells, prior, RbnConfig::default())
    }

    /// Create a network with custom configuration.
    pub fn with_config(cells: Vec<Cell>, prior: Prior, config: RbnConfig) -> RbnResult<Self> {
        validate_model(&cells, &prior)?;
        Ok(SequentialRbn {
            cells,
            prior,
            config,
            terminal_chart: TerminalChart::default(),
            inside_chart: InsideChart::default(),
            stats: InsideStats::default(),
        })
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn config(&self) -> &RbnConfig {
        &self.config
    }

    /// Statistics of the last `inside` call.
    pub fn stats(&self) -> &InsideStats {
        &self.stats
    }

    /// Marginal likelihood of a sequence of symbol codes.
    pub fn inside(&mut self, sequence: &[usize]) -> RbnResult<f64> {
        self.inside_observed(TerminalChart::from_symbols(sequence))
    }

    /// Marginal likelihood of observations that may be out of vocabulary.
    ///
    /// The chart is rebuilt from scratch; it stays readable afterwards
    /// through [`get_inside_chart`](RecursiveBayesianNetwork::get_inside_chart).
    pub fn inside_observed(&mut self, terminals: TerminalChart) -> RbnResult<f64> {
        let n = terminals.len();
        if self.config.max_sequence_length > 0 && n > self.config.max_sequence_length {
            return Err(RbnError::SequenceTooLong {
                len: n,
                max: self.config.max_sequence_length,
            });
        }

        self.terminal_chart = terminals;
        let cardinalities: Vec<usize> = self.cells.iter().map(Cell::cardinality).collect();
        self.inside_chart = InsideChart::new(&cardinalities, n);
        self.stats = InsideStats {
            sequence_length: n,
            ..InsideStats::default()
        };

        // Every transition consumes at least one symbol.
        if n == 0 {
            return Ok(0.0);
        }

        let marginal = self.run_inside()?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            sequence_length = n,
            cell_updates = self.stats.cell_updates,
            marginal,
            "inside pass finished"
        );

        Ok(marginal)
    }

    fn compute_span(&self, var_idx: usize, span: Span) -> RbnResult<Array1<f64>> {
        self.cells[var_idx].inside(var_idx, span, &self.terminal_chart, &self.inside_chart)
    }
}

impl RecursiveBayesianNetwork for SequentialRbn {
    type Location = Span;
    type Chart = InsideChart;
    type TerminalChart = TerminalChart;

    fn non_terminals(&self, locations: &[Span]) -> RbnResult<Vec<usize>> {
        Ok(vec![self.cells.len(); locations.len()])
    }

    fn get_terminal_chart(&self) -> RbnResult<&TerminalChart> {
        Ok(&self.terminal_chart)
    }

    fn get_inside_chart(&self) -> RbnResult<&InsideChart> {
        Ok(&self.inside_chart)
    }

    fn update_inside_chart(
        &mut self,
        var_idx: usize,
        locations: &[Span],
        values: Vec<Array1<f64>>,
    ) -> RbnResult<()> {
        if locations.len() != values.len() {
            return Err(RbnError::malformed(format!(
                "{} values for {} locations",
                values.len(),
                locations.len()
            )));
        }
        for (&span, vector) in locations.iter().zip(&values) {
            self.inside_chart.set(var_idx, span, vector)?;
        }
        self.stats.work_items += 1;
        self.stats.cell_updates += locations.len();
        self.stats.split_points += locations
            .iter()
            .map(|span| span.len().saturating_sub(1))
            .sum::<usize>();
        Ok(())
    }

    fn inside_schedule(&self) -> RbnResult<Schedule<Span>> {
        Ok(Box::new(SpanSchedule::new(
            self.terminal_chart.len(),
            self.cells.len(),
        )))
    }

    fn root_location(&self) -> RbnResult<Span> {
        let n = self.terminal_chart.len();
        if n == 0 {
            return Err(RbnError::InvalidLocation {
                start: 0,
                end: 0,
                len: 0,
            });
        }
        Ok(Span::new(0, n))
    }

    fn prior(&self) -> RbnResult<&Prior> {
        Ok(&self.prior)
    }

    fn compute_inside(&self, var_idx: usize, locations: &[Span]) -> RbnResult<Vec<Array1<f64>>> {
        if var_idx >= self.cells.len() {
            return Err(RbnError::malformed(format!(
                "variable index {} out of range ({} cells)",
                var_idx,
                self.cells.len()
            )));
        }

        #[cfg(feature = "tracing")]
        if var_idx == 0 {
            if let Some(span) = locations.first() {
                tracing::debug!(span_length = span.len(), spans = locations.len(), "filling chart");
            }
        }

        #[cfg(feature = "parallel")]
        if locations.len() >= self.config.parallel_threshold {
            return locations
                .par_iter()
                .map(|&span| self.compute_span(var_idx, span))
                .collect();
        }

        locations
            .iter()
            .map(|&span| self.compute_span(var_idx, span))
            .collect()
    }
}

/// Check child references, axis sizes and the prior against the cells.
fn validate_model(cells: &[Cell], prior: &Prior) -> RbnResult<()> {
    if prior.num_cells() != cells.len() {
        return Err(RbnError::malformed(format!(
            "prior covers {} cells, network has {}",
            prior.num_cells(),
            cells.len()
        )));
    }
    for (i, (cell, values)) in cells.iter().zip(prior.prior_distributions()).enumerate() {
        if values.len() != cell.cardinality() {
            return Err(RbnError::malformed(format!(
                "prior for cell {} has {} values, cardinality is {}",
                i,
                values.len(),
                cell.cardinality()
            )));
        }
        for (j, transition) in cell.transitions().iter().enumerate() {
            let Transition::Binary(t) = transition else {
                continue;
            };
            let children = [
                ("left", t.left_index(i), t.left_cardinality()),
                ("right", t.right_index(i), t.right_cardinality()),
            ];
            for (side, child, card) in children {
                let child_cell = cells.get(child).ok_or_else(|| {
                    RbnError::malformed(format!(
                        "cell {} transition {}: {} child refers to missing cell {}",
                        i, j, side, child
                    ))
                })?;
                if child_cell.cardinality() != card {
                    return Err(RbnError::malformed(format!(
                        "cell {} transition {}: {} axis has size {}, cell {} has cardinality {}",
                        i,
                        j,
                        side,
                        card,
                        child,
                        child_cell.cardinality()
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Builder for networks.
#[derive(Debug, Default)]
pub struct SequentialRbnBuilder {
    cells: Vec<Cell>,
    prior: Option<Prior>,
    config: RbnConfig,
}

impl SequentialRbnBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(mut self, cell: Cell) -> Self {
        self.cells.push(cell);
        self
    }

    pub fn cells(mut self, cells: impl IntoIterator<Item = Cell>) -> Self {
        self.cells.extend(cells);
        self
    }

    pub fn prior(mut self, prior: Prior) -> Self {
        self.prior = Some(prior);
        self
    }

    pub fn config(mut self, config: RbnConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_sequence_length(mut self, n: usize) -> Self {
        self.config.max_sequence_length = n;
        self
    }

    pub fn parallel_threshold(mut self, n: usize) -> Self {
        self.config.parallel_threshold = n;
        self
    }

    pub fn build(self) -> RbnResult<SequentialRbn> {
        let prior = self
            .prior
            .ok_or_else(|| RbnError::malformed("network has no prior"))?;
        SequentialRbn::with_config(self.cells, prior, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::{BinaryNonTerminalTransition, TerminalTransition};
    use crate::variable::Variable;
    use ndarray::{array, Array2, Array3};
    use proptest::prelude::*;

    fn assert_close(actual: f64, expected: f64) {
        let scale = expected.abs().max(1e-300);
        assert!(
            ((actual - expected) / scale).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    /// One variable of cardinality `card` with uniform transitions.
    fn minimal_grammar(card: usize, terminals: usize) -> SequentialRbn {
        let cell = Cell::new(
            Variable::new(card).unwrap(),
            Array1::ones(2),
            vec![
                TerminalTransition::new(Array2::ones((terminals, card)))
                    .unwrap()
                    .into(),
                BinaryNonTerminalTransition::new(Array3::ones((card, card, card)))
                    .unwrap()
                    .into(),
            ],
        )
        .unwrap();
        let prior = Prior::new(array![1.0], vec![Array1::ones(card)]).unwrap();
        SequentialRbn::new(vec![cell], prior).unwrap()
    }

    /// Two variables (cardinality 3 and 4) over five terminals, each able
    /// to split into itself or into the other variable.
    fn multivar_grammar() -> SequentialRbn {
        let cell0 = Cell::new(
            Variable::new(3).unwrap(),
            Array1::ones(3),
            vec![
                TerminalTransition::new(Array2::ones((5, 3))).unwrap().into(),
                BinaryNonTerminalTransition::new(Array3::ones((3, 3, 3)))
                    .unwrap()
                    .with_children(0, 0)
                    .into(),
                BinaryNonTerminalTransition::new(Array3::ones((4, 4, 3)))
                    .unwrap()
                    .with_children(1, 1)
                    .into(),
            ],
        )
        .unwrap();
        let cell1 = Cell::new(
            Variable::new(4).unwrap(),
            Array1::ones(3),
            vec![
                TerminalTransition::new(Array2::ones((5, 4))).unwrap().into(),
                BinaryNonTerminalTransition::new(Array3::ones((4, 4, 4)))
                    .unwrap()
                    .with_children(1, 1)
                    .into(),
                BinaryNonTerminalTransition::new(Array3::ones((3, 3, 4)))
                    .unwrap()
                    .with_children(0, 0)
                    .into(),
            ],
        )
        .unwrap();
        let prior = Prior::new(
            Array1::ones(2),
            vec![Array1::ones(3), Array1::ones(4)],
        )
        .unwrap();
        SequentialRbn::new(vec![cell0, cell1], prior).unwrap()
    }

    /// Counter over `k` values: the prior starts at 0, each split keeps the
    /// value on the left and moves it one step up or down on the right.
    fn counting_grammar(k: usize, action: Array1<f64>) -> SequentialRbn {
        let mut weights = Array3::zeros((k, k, k));
        for v in 0..k {
            weights[[v, (v + 1).min(k - 1), v]] = 1.0;
            weights[[v, v.saturating_sub(1), v]] = 1.0;
        }
        let cell = Cell::new(
            Variable::new(k).unwrap(),
            action,
            vec![
                TerminalTransition::new(Array2::eye(k)).unwrap().into(),
                BinaryNonTerminalTransition::new(weights).unwrap().into(),
            ],
        )
        .unwrap();
        let mut start = Array1::zeros(k);
        start[0] = 1.0;
        let prior = Prior::new(array![1.0], vec![start]).unwrap();
        SequentialRbn::new(vec![cell], prior).unwrap()
    }

    /// `I(0) = leaf`, `I(n) = branch · Σ_j I(j) · I(n-1-j)`.
    fn catalan_levels(n: usize, leaf: f64, branch: f64) -> Vec<f64> {
        let mut levels = vec![0.0; n];
        for idx in 0..n {
            levels[idx] = if idx == 0 {
                leaf
            } else {
                branch * (0..idx).map(|j| levels[j] * levels[idx - 1 - j]).sum::<f64>()
            };
        }
        levels
    }

    #[test]
    fn test_minimal_grammar() {
        let mut rbn = minimal_grammar(2, 2);
        let sequence = [1, 0, 0, 1, 1];
        let n = sequence.len();
        let marginal = rbn.inside(&sequence).unwrap();
        assert!(marginal > 0.0);

        // terminate (1/2) * symbol (1/2); then all splits times 1/2
        let levels = catalan_levels(n, 0.25, 0.5);
        let chart = rbn.get_inside_chart().unwrap();
        for idx in 0..n {
            for start in 0..n - idx {
                let end = start + idx + 1;
                for &x in &chart[0][(start, end)] {
                    assert_close(x, levels[idx]);
                }
            }
        }
        assert_close(marginal, levels[n - 1]);
    }

    #[test]
    fn test_minimal_grammar_wider_terminals() {
        let mut rbn = minimal_grammar(2, 5);
        let sequence = [4, 0, 2];
        let marginal = rbn.inside(&sequence).unwrap();
        let levels = catalan_levels(3, 0.5 / 5.0, 0.5);
        for start in 0..3 {
            assert_close(rbn.get_inside_chart().unwrap()[0][(start, start + 1)][1], levels[0]);
        }
        assert_close(marginal, levels[2]);
    }

    #[test]
    fn test_minimal_multivar_grammar() {
        let mut rbn = multivar_grammar();
        let sequence = [3, 1, 4, 0, 2];
        let n = sequence.len();
        let marginal = rbn.inside(&sequence).unwrap();
        assert!(marginal > 0.0);

        // both variables share a level value; each split mixes both of them
        let mut levels = vec![0.0; n];
        for idx in 0..n {
            levels[idx] = if idx == 0 {
                1.0 / 3.0 / 5.0
            } else {
                2.0 * (0..idx).map(|j| levels[j] * levels[idx - 1 - j]).sum::<f64>() / 3.0
            };
        }
        let chart = rbn.get_inside_chart().unwrap();
        for idx in 0..n {
            for start in 0..n - idx {
                let end = start + idx + 1;
                for (var_idx, card) in [(0, 3), (1, 4)] {
                    let v = &chart[var_idx][(start, end)];
                    assert_eq!(v.len(), card);
                    for &x in v {
                        assert_close(x, levels[idx]);
                    }
                }
            }
        }
        // prior: both cells equally likely, uniform values
        assert_close(marginal, levels[n - 1]);
    }

    #[test]
    fn test_counting_grammar() {
        let k = 10;
        let mut rbn = counting_grammar(k, array![0.4, 0.6]);
        let term_prob = rbn.cells()[0].transition_probabilities()[0];
        let non_term_prob = rbn.cells()[0].transition_probabilities()[1];

        let terminals = [0, 1, 2, 3];
        let n = terminals.len();
        let marginal = rbn.inside(&terminals).unwrap();
        assert!(marginal > 0.0);

        // one left-branching derivation per span
        let mut levels = vec![term_prob; n];
        for idx in 1..n {
            levels[idx] = levels[idx - 1] * levels[0] * 0.5 * non_term_prob;
        }

        let chart = rbn.get_inside_chart().unwrap();
        for idx in 0..n {
            for start in 0..n - idx {
                let end = start + idx + 1;
                let insides = &chart[0][(start, end)];
                let nonzero: Vec<_> = insides.iter().filter(|&&x| x != 0.0).collect();
                assert_eq!(nonzero.len(), 1, "span ({}, {}): {:?}", start, end, insides);
                assert_close(*nonzero[0], levels[idx]);
                // the non-zero value is the counter at the span start
                assert!(insides[start] != 0.0);
            }
        }
        assert_close(marginal, levels[n - 1]);
    }

    #[test]
    fn test_counting_grammar_clipped_at_top() {
        // counting 2, 3, 3: the top value can only "step up" into itself
        let k = 4;
        let mut rbn = counting_grammar(k, array![0.5, 0.5]);
        let sequence = [2, 3, 3];
        rbn.inside(&sequence).unwrap();
        let chart = rbn.get_inside_chart().unwrap();

        let leaf = 0.5;
        let span_23 = &chart[0][(1, 3)];
        // value 3 -> (3, clip(3 + 1) = 3)
        assert_close(span_23[3], leaf * leaf * 0.5 * 0.5);
        assert!(span_23.iter().take(3).all(|&x| x == 0.0));

        // start value 0 can not produce a 2, so the marginal is exactly zero
        assert_eq!(rbn.prior().unwrap().prior_distributions()[0][0], 1.0);
        assert_eq!(chart[0][(0, 3)][0], 0.0);
    }

    #[test]
    fn test_out_of_vocabulary_is_exact_zero() {
        let k = 5;
        let mut rbn = counting_grammar(k, array![0.4, 0.6]);
        let marginal = rbn.inside(&[0, 1, 42]).unwrap();
        assert_eq!(marginal, 0.0);

        let chart = rbn.get_inside_chart().unwrap();
        let oov = chart.get(0, Span::new(2, 3)).unwrap();
        assert!(oov.iter().all(|&x| x == 0.0));
        assert!(chart.get(0, Span::new(0, 3)).unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_unreachable_sequence_is_exact_zero() {
        // 0 then 2: the counter can not jump by two
        let mut rbn = counting_grammar(5, array![0.4, 0.6]);
        assert_eq!(rbn.inside(&[0, 2]).unwrap(), 0.0);
    }

    #[test]
    fn test_inside_is_idempotent() {
        let mut rbn = multivar_grammar();
        let sequence = [0, 4, 4, 1, 3, 2];
        let first = rbn.inside(&sequence).unwrap();
        let first_chart = rbn.get_inside_chart().unwrap().clone();
        let second = rbn.inside(&sequence).unwrap();
        assert_eq!(first, second);
        let second_chart = rbn.get_inside_chart().unwrap();
        for var_idx in 0..2 {
            for span in SpanSchedule::spans_of_length(6, 3) {
                assert_eq!(first_chart.get(var_idx, span), second_chart.get(var_idx, span));
            }
        }
    }

    #[test]
    fn test_chart_reallocated_per_call() {
        let mut rbn = minimal_grammar(2, 2);
        rbn.inside(&[0, 1, 0, 1]).unwrap();
        rbn.inside(&[1, 1]).unwrap();
        let chart = rbn.get_inside_chart().unwrap();
        assert_eq!(chart.sequence_len(), 2);
        assert_eq!(chart.len(), 3);
    }

    #[test]
    fn test_empty_sequence() {
        let mut rbn = minimal_grammar(2, 2);
        assert_eq!(rbn.inside(&[]).unwrap(), 0.0);
        assert!(rbn.get_inside_chart().unwrap().is_empty());
        assert!(rbn.root_location().is_err());
    }

    #[test]
    fn test_stats() {
        let mut rbn = multivar_grammar();
        rbn.inside(&[0, 1, 2, 3]).unwrap();
        let stats = rbn.stats();
        assert_eq!(stats.sequence_length, 4);
        // 4 lengths x 2 variables
        assert_eq!(stats.work_items, 8);
        // 10 spans x 2 variables
        assert_eq!(stats.cell_updates, 20);
        // (3*1 + 2*2 + 1*3) splits x 2 variables
        assert_eq!(stats.split_points, 20);
    }

    #[test]
    fn test_max_sequence_length() {
        let cell = minimal_grammar(2, 2).cells()[0].clone();
        let mut rbn = SequentialRbnBuilder::new()
            .cell(cell)
            .prior(Prior::new(array![1.0], vec![Array1::ones(2)]).unwrap())
            .max_sequence_length(3)
            .build()
            .unwrap();
        assert!(rbn.inside(&[0, 1, 0]).is_ok());
        assert_eq!(
            rbn.inside(&[0, 1, 0, 1]),
            Err(RbnError::SequenceTooLong { len: 4, max: 3 })
        );
    }

    #[test]
    fn test_builder_requires_prior() {
        let result = SequentialRbnBuilder::new().build();
        assert!(matches!(result, Err(RbnError::MalformedModel(_))));
    }

    #[test]
    fn test_child_cardinality_mismatch() {
        let cell = Cell::new(
            Variable::new(3).unwrap(),
            array![1.0],
            vec![BinaryNonTerminalTransition::new(Array3::ones((4, 4, 3)))
                .unwrap()
                .into()],
        )
        .unwrap();
        let prior = Prior::new(array![1.0], vec![Array1::ones(3)]).unwrap();
        assert!(matches!(
            SequentialRbn::new(vec![cell], prior),
            Err(RbnError::MalformedModel(_))
        ));
    }

    #[test]
    fn test_missing_child_cell() {
        let cell = Cell::new(
            Variable::new(2).unwrap(),
            array![1.0],
            vec![BinaryNonTerminalTransition::new(Array3::ones((2, 2, 2)))
                .unwrap()
                .with_children(0, 3)
                .into()],
        )
        .unwrap();
        let prior = Prior::new(array![1.0], vec![Array1::ones(2)]).unwrap();
        assert!(SequentialRbn::new(vec![cell], prior).is_err());
    }

    #[test]
    fn test_prior_shape_mismatch() {
        let cell = minimal_grammar(2, 2).cells()[0].clone();
        let prior = Prior::new(array![1.0], vec![Array1::ones(3)]).unwrap();
        assert!(SequentialRbn::new(vec![cell], prior).is_err());
    }

    #[test]
    fn test_parallel_threshold_gives_same_result() {
        let sequence = [1, 0, 3, 2, 4, 4, 0];
        let mut serial = multivar_grammar();
        let mut eager = SequentialRbn::with_config(
            serial.cells().to_vec(),
            serial.prior().unwrap().clone(),
            RbnConfig {
                parallel_threshold: 1,
                ..RbnConfig::default()
            },
        )
        .unwrap();
        assert_close(eager.inside(&sequence).unwrap(), serial.inside(&sequence).unwrap());
    }

    proptest! {
        #[test]
        fn prop_uniform_grammar_follows_recurrence(
            sequence in proptest::collection::vec(0usize..2, 1..8),
        ) {
            let mut rbn = minimal_grammar(2, 2);
            let marginal = rbn.inside(&sequence).unwrap();
            let n = sequence.len();
            let levels = catalan_levels(n, 0.25, 0.5);
            prop_assert!(((marginal - levels[n - 1]) / levels[n - 1]).abs() < 1e-9);
        }
    }
}
