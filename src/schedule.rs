//! Evaluation order of the inside pass.
//!
//! A schedule is a finite sequence of work items. Every item may only read
//! chart entries written by earlier items.

use crate::chart::Span;

/// One unit of work: update variable `var_idx` at all `locations`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem<L> {
    pub var_idx: usize,
    pub locations: Vec<L>,
}

impl<L> WorkItem<L> {
    pub fn new(var_idx: usize, locations: Vec<L>) -> Self {
        WorkItem { var_idx, locations }
    }
}

/// Bottom-up schedule over spans of a sequence.
///
/// Span lengths strictly increase, `1..=n`. For each length one item per
/// variable covers every span of that length; the items of one length only
/// depend on shorter spans and can run in any order.
#[derive(Clone, Debug)]
pub struct SpanSchedule {
    n: usize,
    num_variables: usize,
    length: usize,
    var_idx: usize,
}

impl SpanSchedule {
    pub fn new(n: usize, num_variables: usize) -> Self {
        SpanSchedule {
            n,
            num_variables,
            length: 1,
            var_idx: 0,
        }
    }

    /// Spans of the given length, in order of their start.
    pub fn spans_of_length(n: usize, length: usize) -> Vec<Span> {
        if length == 0 || length > n {
            return Vec::new();
        }
        (0..=n - length)
            .map(|start| Span::new(start, start + length))
            .collect()
    }
}

impl Iterator for SpanSchedule {
    type Item = WorkItem<Span>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_variables == 0 || self.length > self.n {
            return None;
        }
        let item = WorkItem::new(
            self.var_idx,
            Self::spans_of_length(self.n, self.length),
        );
        self.var_idx += 1;
        if self.var_idx == self.num_variables {
            self.var_idx = 0;
            self.length += 1;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.num_variables == 0 || self.length > self.n {
            0
        } else {
            (self.n - self.length + 1) * self.num_variables - self.var_idx
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SpanSchedule {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_order() {
        let items: Vec<_> = SpanSchedule::new(3, 2).collect();
        assert_eq!(items.len(), 6);
        let order: Vec<_> = items
            .iter()
            .map(|w| (w.locations[0].len(), w.var_idx, w.locations.len()))
            .collect();
        assert_eq!(
            order,
            vec![(1, 0, 3), (1, 1, 3), (2, 0, 2), (2, 1, 2), (3, 0, 1), (3, 1, 1)]
        );
    }

    #[test]
    fn test_schedule_is_restartable() {
        let first: Vec<_> = SpanSchedule::new(4, 1).collect();
        let second: Vec<_> = SpanSchedule::new(4, 1).collect();
        assert_eq!(first, second);
        assert_eq!(SpanSchedule::new(4, 1).len(), 4);
    }

    #[test]
    fn test_empty_schedule() {
        assert_eq!(SpanSchedule::new(0, 3).count(), 0);
        assert_eq!(SpanSchedule::new(3, 0).count(), 0);
    }

    #[test]
    fn test_dependencies_precede_items() {
        let mut done = std::collections::HashSet::new();
        for item in SpanSchedule::new(5, 2) {
            for span in &item.locations {
                for (left, right) in span.splits() {
                    for var in 0..2 {
                        assert!(done.contains(&(var, left)));
                        assert!(done.contains(&(var, right)));
                    }
                }
            }
            // items of the same length never read each other
            for span in item.locations {
                done.insert((item.var_idx, span));
            }
        }
    }
}
