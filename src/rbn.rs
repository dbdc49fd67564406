//! The recursive Bayesian network protocol and the generic inside pass.
//!
//! A concrete network supplies charts, a schedule, a root location and a
//! prior. Every operation has a default that fails with
//! [`RbnError::NotImplemented`], so a network that forgets one fails loudly
//! the first time the operation is used. `init_inside` is the only optional
//! hook and defaults to doing nothing.

use crate::chart::ChartLookup;
use crate::error::{RbnError, RbnResult};
use crate::prior::Prior;
use crate::schedule::WorkItem;
use ndarray::{Array1, ArrayView1};
use std::fmt::Debug;

/// Boxed schedule of work items.
pub type Schedule<L> = Box<dyn Iterator<Item = WorkItem<L>>>;

/// Capabilities a network must provide for [`run_inside`](RecursiveBayesianNetwork::run_inside).
pub trait RecursiveBayesianNetwork {
    /// Index into whatever structure the network explains.
    type Location: Copy + Debug;
    /// Chart of inside vectors.
    type Chart: ChartLookup<Self::Location>;
    /// Observation data the chart is seeded from.
    type TerminalChart;

    /// Number of variables applicable at each of `locations`.
    fn non_terminals(&self, _locations: &[Self::Location]) -> RbnResult<Vec<usize>> {
        Err(RbnError::NotImplemented("non_terminals"))
    }

    fn get_terminal_chart(&self) -> RbnResult<&Self::TerminalChart> {
        Err(RbnError::NotImplemented("get_terminal_chart"))
    }

    fn get_inside_chart(&self) -> RbnResult<&Self::Chart> {
        Err(RbnError::NotImplemented("get_inside_chart"))
    }

    /// Write `values[i]` as the inside vector of `var_idx` at `locations[i]`.
    fn update_inside_chart(
        &mut self,
        _var_idx: usize,
        _locations: &[Self::Location],
        _values: Vec<Array1<f64>>,
    ) -> RbnResult<()> {
        Err(RbnError::NotImplemented("update_inside_chart"))
    }

    /// A fresh schedule in which every item's dependencies come first.
    fn inside_schedule(&self) -> RbnResult<Schedule<Self::Location>> {
        Err(RbnError::NotImplemented("inside_schedule"))
    }

    fn root_location(&self) -> RbnResult<Self::Location> {
        Err(RbnError::NotImplemented("root_location"))
    }

    fn prior(&self) -> RbnResult<&Prior> {
        Err(RbnError::NotImplemented("prior"))
    }

    /// Compute the inside vectors of `var_idx` at `locations`.
    fn compute_inside(
        &self,
        _var_idx: usize,
        _locations: &[Self::Location],
    ) -> RbnResult<Vec<Array1<f64>>> {
        Err(RbnError::NotImplemented("compute_inside"))
    }

    /// Called once before the schedule runs.
    fn init_inside(&mut self) -> RbnResult<()> {
        Ok(())
    }

    /// Run the schedule and combine the root vectors with the prior.
    fn run_inside(&mut self) -> RbnResult<f64> {
        self.init_inside()?;
        for item in self.inside_schedule()? {
            let values = self.compute_inside(item.var_idx, &item.locations)?;
            self.update_inside_chart(item.var_idx, &item.locations, values)?;
        }

        let root = self.root_location()?;
        let num_roots = self
            .non_terminals(&[root])?
            .first()
            .copied()
            .unwrap_or(0);
        let chart = self.get_inside_chart()?;
        let roots = (0..num_roots)
            .map(|var_idx| {
                chart.lookup(var_idx, root).ok_or_else(|| {
                    RbnError::malformed(format!(
                        "root vector of variable {} at {:?} was never computed",
                        var_idx, root
                    ))
                })
            })
            .collect::<RbnResult<Vec<ArrayView1<f64>>>>()?;
        self.prior()?.marginal(&roots)
    }
}
