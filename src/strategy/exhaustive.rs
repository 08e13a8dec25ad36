//! # Strategy: Exhaustive
//!
//! Enumerates the full Cartesian product of all parameter domains in a fixed
//! deterministic order — lexicographic by declaration order of parameters,
//! then by candidate order within each domain. Combinations whose cost is
//! already in the history (the initial configuration, typically) are not
//! proposed again. Converged once every combination has been observed; the
//! final choice is the minimum-cost combination.

use std::collections::HashSet;

use super::{best_observed, decode_combination, Observation, SearchStrategy};
use crate::space::{Configuration, ParameterSpace};

pub struct Exhaustive {
    /// Next combination number to consider in the lexicographic sweep.
    cursor: usize,
    issued: HashSet<Vec<usize>>,
    /// Product size, learned on the first `propose` call.
    total: Option<usize>,
    converged: bool,
}

impl Exhaustive {
    pub fn new() -> Self {
        Self {
            cursor: 0,
            issued: HashSet::new(),
            total: None,
            converged: false,
        }
    }

    fn distinct_observed(history: &[Observation]) -> usize {
        history
            .iter()
            .map(|o| &o.config)
            .collect::<HashSet<_>>()
            .len()
    }
}

impl Default for Exhaustive {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchStrategy for Exhaustive {
    fn propose(&mut self, history: &[Observation], space: &ParameterSpace) -> Configuration {
        let total = *self.total.get_or_insert_with(|| space.total_combinations());

        if self.converged {
            if let Some(best) = best_observed(history) {
                return best.config.clone();
            }
            return space.current();
        }

        let observed: HashSet<Vec<usize>> = history
            .iter()
            .filter_map(|obs| space.indices_of(&obs.config))
            .collect();

        while self.cursor < total {
            let indices = decode_combination(space, self.cursor);
            self.cursor += 1;
            if observed.contains(&indices) || self.issued.contains(&indices) {
                continue;
            }
            self.issued.insert(indices.clone());
            return space.config_at(&indices);
        }

        // Sweep exhausted but convergence not yet latched: exploit.
        best_observed(history)
            .map(|obs| obs.config.clone())
            .unwrap_or_else(|| space.current())
    }

    fn has_converged(&mut self, history: &[Observation]) -> bool {
        if self.converged {
            return true;
        }
        // Every configuration the session records is in-domain, so distinct
        // observed configurations count directly against the product size.
        if let Some(total) = self.total {
            if Self::distinct_observed(history) >= total {
                self.converged = true;
            }
        }
        self.converged
    }

    fn name(&self) -> &'static str {
        "exhaustive"
    }
}
