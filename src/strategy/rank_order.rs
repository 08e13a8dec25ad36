//! # Strategy: Parallel Rank Order
//!
//! Built for settings where several evaluations are in flight at once (one
//! configuration per worker thread or node). The full candidate list starts
//! in enumeration order; each `propose` issues the next-ranked candidate
//! with no cost on record yet — calling `propose` repeatedly before any
//! observation arrives hands out distinct candidates. As observations land,
//! candidates are re-ranked by mean observed cost.
//!
//! Convergence: the top-ranked candidate leads the runner-up by the relative
//! significance margin, with both evaluated at least `min_evals` times.
//! Equal-mean ties rank the earlier-enumerated candidate first.

use std::collections::HashMap;

use super::{decode_combination, Observation, SearchStrategy};
use crate::space::{Configuration, ParameterSpace};

struct Candidate {
    config: Configuration,
    costs: Vec<f64>,
    /// Proposals issued for this candidate with no observation yet.
    outstanding: usize,
}

impl Candidate {
    fn mean(&self) -> Option<f64> {
        if self.costs.is_empty() {
            None
        } else {
            Some(self.costs.iter().sum::<f64>() / self.costs.len() as f64)
        }
    }
}

pub struct ParallelRankOrder {
    margin: f64,
    min_evals: usize,
    candidates: Vec<Candidate>,
    by_config: HashMap<Configuration, usize>,
    consumed: usize,
    converged: bool,
    /// Winner frozen at the moment of convergence.
    final_choice: Option<Configuration>,
}

impl ParallelRankOrder {
    /// Relative cost advantage the leader needs over the runner-up.
    pub const DEFAULT_MARGIN: f64 = 0.05;
    /// Evaluations required of both leader and runner-up.
    pub const DEFAULT_MIN_EVALS: usize = 3;

    pub fn new() -> Self {
        Self::with_significance(Self::DEFAULT_MARGIN, Self::DEFAULT_MIN_EVALS)
    }

    pub fn with_significance(margin: f64, min_evals: usize) -> Self {
        Self {
            margin: margin.max(0.0),
            min_evals: min_evals.max(1),
            candidates: Vec::new(),
            by_config: HashMap::new(),
            consumed: 0,
            converged: false,
            final_choice: None,
        }
    }

    fn build_candidates(&mut self, space: &ParameterSpace) {
        if !self.candidates.is_empty() {
            return;
        }
        for k in 0..space.total_combinations() {
            let indices = decode_combination(space, k);
            let config = space.config_at(&indices);
            self.by_config.insert(config.clone(), k);
            self.candidates.push(Candidate {
                config,
                costs: Vec::new(),
                outstanding: 0,
            });
        }
    }

    fn ingest(&mut self, history: &[Observation]) {
        while self.consumed < history.len() {
            let obs = &history[self.consumed];
            self.consumed += 1;
            if let Some(&i) = self.by_config.get(&obs.config) {
                let c = &mut self.candidates[i];
                c.costs.push(obs.cost);
                c.outstanding = c.outstanding.saturating_sub(1);
            }
        }
    }

    /// Evaluated candidates ordered by mean cost; stable sort keeps the
    /// earlier-enumerated candidate first on equal means.
    fn ranking(&self) -> Vec<usize> {
        let mut ranked: Vec<usize> = (0..self.candidates.len())
            .filter(|&i| !self.candidates[i].costs.is_empty())
            .collect();
        ranked.sort_by(|&a, &b| {
            let ma = self.candidates[a].mean().unwrap_or(f64::INFINITY);
            let mb = self.candidates[b].mean().unwrap_or(f64::INFINITY);
            ma.partial_cmp(&mb).unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    fn leader_is_significant(&self) -> bool {
        let ranked = self.ranking();
        if self.candidates.len() == 1 {
            return self.candidates[0].costs.len() >= self.min_evals;
        }
        // Every candidate must have been tried before a winner is declared.
        if ranked.len() < self.candidates.len() || ranked.len() < 2 {
            return false;
        }
        let top = &self.candidates[ranked[0]];
        let runner = &self.candidates[ranked[1]];
        if top.costs.len() < self.min_evals || runner.costs.len() < self.min_evals {
            return false;
        }
        let (Some(top_mean), Some(runner_mean)) = (top.mean(), runner.mean()) else {
            return false;
        };
        runner_mean - top_mean > self.margin * top_mean.abs()
    }
}

impl Default for ParallelRankOrder {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchStrategy for ParallelRankOrder {
    fn propose(&mut self, history: &[Observation], space: &ParameterSpace) -> Configuration {
        self.build_candidates(space);
        self.ingest(history);

        if self.converged {
            if let Some(winner) = &self.final_choice {
                return winner.clone();
            }
            return space.current();
        }

        // Exploration: issue the next candidate nobody has touched.
        if let Some(c) = self
            .candidates
            .iter_mut()
            .find(|c| c.costs.is_empty() && c.outstanding == 0)
        {
            c.outstanding += 1;
            return c.config.clone();
        }

        // Exploitation: feed the significance test by re-evaluating
        // whichever of the two front-runners has fewer samples.
        let ranked = self.ranking();
        let pick = match ranked.as_slice() {
            [] => return space.current(),
            [only] => *only,
            [top, runner, ..] => {
                let t = &self.candidates[*top];
                let r = &self.candidates[*runner];
                if t.costs.len() + t.outstanding <= r.costs.len() + r.outstanding {
                    *top
                } else {
                    *runner
                }
            }
        };
        let c = &mut self.candidates[pick];
        c.outstanding += 1;
        c.config.clone()
    }

    fn has_converged(&mut self, history: &[Observation]) -> bool {
        if self.converged {
            return true;
        }
        if self.candidates.is_empty() {
            return false;
        }
        self.ingest(history);
        if self.leader_is_significant() {
            self.converged = true;
            self.final_choice = self
                .ranking()
                .first()
                .map(|&top| self.candidates[top].config.clone());
        }
        self.converged
    }

    fn name(&self) -> &'static str {
        "parallel-rank-order"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::ParamValue;

    fn small_space() -> ParameterSpace {
        let mut space = ParameterSpace::new();
        space
            .add_parameter(
                "worker_threads",
                ParamValue::Int(2),
                vec![ParamValue::Int(2), ParamValue::Int(4), ParamValue::Int(8)],
            )
            .unwrap();
        space
    }

    /// 4 threads clearly fastest, others well apart.
    fn cost_of(cfg: &Configuration) -> f64 {
        match cfg.get("worker_threads").and_then(|v| v.as_int()).unwrap() {
            4 => 1.0,
            2 => 5.0,
            _ => 3.0,
        }
    }

    fn drive_to_convergence(
        strat: &mut ParallelRankOrder,
        space: &ParameterSpace,
    ) -> Vec<Observation> {
        let mut history = Vec::new();
        let mut steps = 0;
        while !strat.has_converged(&history) {
            let cfg = strat.propose(&history, space);
            let cost = cost_of(&cfg);
            history.push(Observation::new(cfg, cost));
            steps += 1;
            assert!(steps <= 100, "rank-order search failed to converge");
        }
        history
    }

    #[test]
    fn test_explores_candidates_in_enumeration_order() {
        let space = small_space();
        let mut strat = ParallelRankOrder::new();
        let history = Vec::new();
        let first = strat.propose(&history, &space);
        let second = strat.propose(&history, &space);
        let third = strat.propose(&history, &space);
        assert_eq!(first.get("worker_threads"), Some(&ParamValue::Int(2)));
        assert_eq!(second.get("worker_threads"), Some(&ParamValue::Int(4)));
        assert_eq!(third.get("worker_threads"), Some(&ParamValue::Int(8)));
    }

    #[test]
    fn test_supports_outstanding_proposals_without_feedback() {
        let space = small_space();
        let mut strat = ParallelRankOrder::new();
        let history = Vec::new();
        // Three proposals in flight at once must be three distinct configs.
        let mut seen = std::collections::HashSet::new();
        for _ in 0..3 {
            assert!(seen.insert(strat.propose(&history, &space)));
        }
    }

    #[test]
    fn test_converges_to_clear_winner() {
        let space = small_space();
        let mut strat = ParallelRankOrder::new();
        let history = drive_to_convergence(&mut strat, &space);
        let winner = strat.propose(&history, &space);
        assert_eq!(winner.get("worker_threads"), Some(&ParamValue::Int(4)));
    }

    #[test]
    fn test_no_convergence_before_min_evals() {
        let space = small_space();
        let mut strat = ParallelRankOrder::with_significance(0.05, 3);
        let mut history = Vec::new();
        // One evaluation per candidate is not enough evidence.
        for _ in 0..3 {
            let cfg = strat.propose(&history, &space);
            let cost = cost_of(&cfg);
            history.push(Observation::new(cfg, cost));
        }
        assert!(!strat.has_converged(&history));
    }

    #[test]
    fn test_reevaluates_front_runners_for_significance() {
        let space = small_space();
        let mut strat = ParallelRankOrder::with_significance(0.05, 2);
        let mut history = Vec::new();
        for _ in 0..3 {
            let cfg = strat.propose(&history, &space);
            let cost = cost_of(&cfg);
            history.push(Observation::new(cfg, cost));
        }
        // Next proposals must target the two leaders (4 and 8 threads).
        for _ in 0..2 {
            let cfg = strat.propose(&history, &space);
            let t = cfg.get("worker_threads").and_then(|v| v.as_int()).unwrap();
            assert!(t == 4 || t == 8, "expected a front-runner, got {t}");
            let cost = cost_of(&cfg);
            history.push(Observation::new(cfg, cost));
        }
    }

    #[test]
    fn test_equal_means_rank_earlier_candidate_first() {
        let space = small_space();
        let mut strat = ParallelRankOrder::with_significance(0.05, 1);
        let mut history = Vec::new();
        for _ in 0..3 {
            let cfg = strat.propose(&history, &space);
            history.push(Observation::new(cfg, 2.0)); // all tie
        }
        strat.ingest(&history);
        let ranked = strat.ranking();
        assert_eq!(ranked, vec![0, 1, 2]);
    }

    #[test]
    fn test_single_candidate_space_converges() {
        let mut space = ParameterSpace::new();
        space
            .add_parameter("worker_threads", ParamValue::Int(8), vec![ParamValue::Int(8)])
            .unwrap();
        let mut strat = ParallelRankOrder::with_significance(0.05, 2);
        let mut history = Vec::new();
        for _ in 0..2 {
            let cfg = strat.propose(&history, &space);
            history.push(Observation::new(cfg, 1.0));
        }
        assert!(strat.has_converged(&history));
    }

    #[test]
    fn test_convergence_is_terminal() {
        let space = small_space();
        let mut strat = ParallelRankOrder::new();
        let mut history = drive_to_convergence(&mut strat, &space);
        let winner = strat.propose(&history, &space);
        // Even a contradictory late observation cannot un-converge.
        history.push(Observation::new(winner.clone(), 1_000.0));
        assert!(strat.has_converged(&history));
        assert_eq!(strat.propose(&history, &space), winner);
    }
}
