//! # Strategy: Random
//!
//! Samples the Cartesian product uniformly at random without replacement
//! until a fixed sample budget (or the whole product) is exhausted, then
//! converges on the best-observed configuration — a cheap baseline for
//! spaces too large to sweep exhaustively.

use std::collections::HashSet;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::{best_observed, decode_combination, Observation, SearchStrategy};
use crate::space::{Configuration, ParameterSpace};

pub struct RandomSearch {
    budget: usize,
    rng: StdRng,
    /// Shuffled combination numbers, drawn front to back. Built lazily on
    /// the first `propose` call, when the space is known.
    order: Vec<usize>,
    pos: usize,
    total: Option<usize>,
    converged: bool,
}

impl RandomSearch {
    /// Default sample budget when none is configured.
    pub const DEFAULT_BUDGET: usize = 20;

    pub fn new(budget: usize) -> Self {
        Self::seeded(budget, rand::random())
    }

    /// Deterministic variant for tests and reproducible runs.
    pub fn seeded(budget: usize, seed: u64) -> Self {
        Self {
            budget: budget.max(1),
            rng: StdRng::seed_from_u64(seed),
            order: Vec::new(),
            pos: 0,
            total: None,
            converged: false,
        }
    }

    /// Samples this search will take: the configured budget capped by the
    /// product size.
    fn effective_budget(&self) -> usize {
        match self.total {
            Some(total) => self.budget.min(total),
            None => self.budget,
        }
    }
}

impl SearchStrategy for RandomSearch {
    fn propose(&mut self, history: &[Observation], space: &ParameterSpace) -> Configuration {
        let total = *self.total.get_or_insert_with(|| space.total_combinations());
        if self.order.is_empty() {
            self.order = (0..total).collect();
            self.order.shuffle(&mut self.rng);
        }

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

        while self.pos < self.order.len() {
            let indices = decode_combination(space, self.order[self.pos]);
            self.pos += 1;
            if !observed.contains(&indices) {
                return space.config_at(&indices);
            }
        }

        best_observed(history)
            .map(|obs| obs.config.clone())
            .unwrap_or_else(|| space.current())
    }

    fn has_converged(&mut self, history: &[Observation]) -> bool {
        if self.converged {
            return true;
        }
        if self.total.is_some() {
            let distinct: HashSet<&Configuration> = history.iter().map(|o| &o.config).collect();
            if distinct.len() >= self.effective_budget() {
                self.converged = true;
            }
        }
        self.converged
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
