//! # Module: strategy
//!
//! Search strategies for the tuning loop. A strategy consumes the growing
//! history of (configuration, cost) observations for one region and proposes
//! the next configuration to try, until it judges the search converged —
//! after which it only ever returns the best configuration seen.
//!
//! ## Sub-modules
//! - [`exhaustive`] — deterministic sweep of the full Cartesian product
//! - [`random`] — uniform sampling without replacement under a budget
//! - [`simplex`] — Nelder–Mead on the domain-index lattice
//! - [`rank_order`] — rank-ordered candidate list with repeated evaluation

pub mod exhaustive;
pub mod random;
pub mod rank_order;
pub mod simplex;

use std::str::FromStr;

use crate::{
    error::TuneError,
    space::{Configuration, ParameterSpace},
};

pub use exhaustive::Exhaustive;
pub use random::RandomSearch;
pub use rank_order::ParallelRankOrder;
pub use simplex::NelderMeadSimplex;

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// One measured data point: a configuration and its mean time per
/// invocation. Lower cost is better.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub config: Configuration,
    pub cost: f64,
}

impl Observation {
    pub fn new(config: Configuration, cost: f64) -> Self {
        Self { config, cost }
    }
}

/// Decode combination number `k` into one index per dimension, last
/// dimension varying fastest — the lexicographic sweep order.
pub(crate) fn decode_combination(space: &ParameterSpace, mut k: usize) -> Vec<usize> {
    let dims = space.dims();
    let mut indices = vec![0usize; dims];
    for dim in (0..dims).rev() {
        let len = space.len_of(dim);
        indices[dim] = k % len;
        k /= len;
    }
    indices
}

/// The minimum-cost configuration in `history`, if any.
///
/// Ties keep the earliest observation, so repeated costs cannot flip the
/// final choice between runs.
pub fn best_observed(history: &[Observation]) -> Option<&Observation> {
    history.iter().reduce(|best, obs| {
        if obs.cost < best.cost {
            obs
        } else {
            best
        }
    })
}

// ---------------------------------------------------------------------------
// SearchStrategy
// ---------------------------------------------------------------------------

/// The search-algorithm contract.
///
/// The session serializes all calls for one region, so implementations keep
/// plain mutable state. Convergence is a monotonic latch: once
/// [`has_converged`](SearchStrategy::has_converged) returns true,
/// [`propose`](SearchStrategy::propose) must return the best-observed
/// configuration unchanged for the rest of the run.
pub trait SearchStrategy: Send {
    /// The next configuration to try, given everything observed so far.
    /// Always a point within the declared domains.
    fn propose(&mut self, history: &[Observation], space: &ParameterSpace) -> Configuration;

    /// Monotonic convergence predicate.
    fn has_converged(&mut self, history: &[Observation]) -> bool;

    /// Short identifier for diagnostics.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// StrategyKind — selection
// ---------------------------------------------------------------------------

/// Selector for the available strategies. Chosen once at session creation
/// and fixed for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    Exhaustive,
    Random,
    #[default]
    NelderMeadSimplex,
    ParallelRankOrder,
}

impl StrategyKind {
    /// Instantiate a fresh strategy with its default tunables.
    pub fn instantiate(self) -> Box<dyn SearchStrategy> {
        match self {
            StrategyKind::Exhaustive => Box::new(Exhaustive::new()),
            StrategyKind::Random => Box::new(RandomSearch::new(RandomSearch::DEFAULT_BUDGET)),
            StrategyKind::NelderMeadSimplex => Box::new(NelderMeadSimplex::new()),
            StrategyKind::ParallelRankOrder => Box::new(ParallelRankOrder::new()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Exhaustive => "exhaustive",
            StrategyKind::Random => "random",
            StrategyKind::NelderMeadSimplex => "nelder-mead",
            StrategyKind::ParallelRankOrder => "parallel-rank-order",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exhaustive" => Ok(StrategyKind::Exhaustive),
            "random" => Ok(StrategyKind::Random),
            "simplex" | "nelder-mead" | "neldermeadsimplex" => Ok(StrategyKind::NelderMeadSimplex),
            "rank-order" | "parallel-rank-order" | "parallelrankorder" => {
                Ok(StrategyKind::ParallelRankOrder)
            }
            other => Err(TuneError::UnknownStrategy { name: other.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::ParamValue;

    fn cfg(threads: i64) -> Configuration {
        Configuration::from_pairs([("worker_threads".to_string(), ParamValue::Int(threads))])
    }

    // ===== best_observed =====

    #[test]
    fn test_best_observed_empty_history() {
        assert!(best_observed(&[]).is_none());
    }

    #[test]
    fn test_best_observed_picks_minimum() {
        let history = vec![
            Observation::new(cfg(2), 5.0),
            Observation::new(cfg(4), 1.5),
            Observation::new(cfg(8), 3.0),
        ];
        assert_eq!(best_observed(&history).unwrap().config, cfg(4));
    }

    #[test]
    fn test_best_observed_tie_keeps_earliest() {
        let history = vec![
            Observation::new(cfg(2), 2.0),
            Observation::new(cfg(4), 2.0),
        ];
        assert_eq!(best_observed(&history).unwrap().config, cfg(2));
    }

    // ===== StrategyKind parsing =====

    #[test]
    fn test_kind_parses_all_canonical_names() {
        for kind in [
            StrategyKind::Exhaustive,
            StrategyKind::Random,
            StrategyKind::NelderMeadSimplex,
            StrategyKind::ParallelRankOrder,
        ] {
            assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_kind_parse_is_case_insensitive() {
        assert_eq!("Exhaustive".parse::<StrategyKind>().unwrap(), StrategyKind::Exhaustive);
        assert_eq!(
            "NelderMeadSimplex".parse::<StrategyKind>().unwrap(),
            StrategyKind::NelderMeadSimplex
        );
        assert_eq!(
            "ParallelRankOrder".parse::<StrategyKind>().unwrap(),
            StrategyKind::ParallelRankOrder
        );
    }

    #[test]
    fn test_kind_unknown_name_is_error() {
        let err = "simulated-annealing".parse::<StrategyKind>().unwrap_err();
        assert!(matches!(err, TuneError::UnknownStrategy { .. }));
    }

    #[test]
    fn test_kind_default_is_simplex() {
        assert_eq!(StrategyKind::default(), StrategyKind::NelderMeadSimplex);
    }

    #[test]
    fn test_instantiate_names_match_kind() {
        assert_eq!(StrategyKind::Exhaustive.instantiate().name(), "exhaustive");
        assert_eq!(StrategyKind::Random.instantiate().name(), "random");
        assert_eq!(StrategyKind::NelderMeadSimplex.instantiate().name(), "nelder-mead");
        assert_eq!(
            StrategyKind::ParallelRankOrder.instantiate().name(),
            "parallel-rank-order"
        );
    }
}
