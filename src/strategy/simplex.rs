//! # Strategy: Nelder–Mead Simplex
//!
//! Treats each parameter's domain index as a real-valued coordinate and runs
//! the classic reflection/expansion/contraction/shrink moves over a simplex
//! of `d+1` points. Every proposed real point is rounded to the nearest
//! domain index and clamped into range before being returned, so proposals
//! are always valid lattice configurations.
//!
//! The search is driven one evaluation at a time: `propose` hands out the
//! point whose cost is needed next and consumes the matching observation
//! from the history on a later call; with no new matching observation the
//! same point is re-issued. Convergence: the relative cost spread of the
//! simplex falls below `tolerance`, or `max_iters` completed iterations.

use super::{best_observed, Observation, SearchStrategy};
use crate::space::{Configuration, ParameterSpace};

const ALPHA: f64 = 1.0; // reflection
const GAMMA: f64 = 2.0; // expansion
const RHO: f64 = 0.5; // contraction
const SIGMA: f64 = 0.5; // shrink

/// What the outstanding evaluation will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    /// (Re-)costing simplex vertex `i` — initial build or post-shrink.
    Vertex(usize),
    Reflection,
    Expansion,
    Contraction { outside: bool },
}

#[derive(Debug, Clone)]
struct Vertex {
    point: Vec<f64>,
    cost: Option<f64>,
}

#[derive(Debug)]
struct SimplexState {
    vertices: Vec<Vertex>,
    /// Outstanding evaluation: purpose and the real-valued point.
    pending: Option<(Purpose, Vec<f64>)>,
    /// Reflected point and its cost, alive across the reflect→expand and
    /// reflect→contract arcs.
    reflected: Option<(Vec<f64>, f64)>,
    /// Centroid of all vertices but the worst, frozen when the reflection
    /// was issued.
    centroid: Vec<f64>,
    /// Index of the worst vertex when the reflection was issued.
    worst: usize,
    /// History entries already processed.
    consumed: usize,
    iters: usize,
}

pub struct NelderMeadSimplex {
    tolerance: f64,
    max_iters: usize,
    state: Option<SimplexState>,
    converged: bool,
}

impl NelderMeadSimplex {
    pub const DEFAULT_TOLERANCE: f64 = 1e-2;
    pub const DEFAULT_MAX_ITERS: usize = 50;

    pub fn new() -> Self {
        Self::with_limits(Self::DEFAULT_TOLERANCE, Self::DEFAULT_MAX_ITERS)
    }

    pub fn with_limits(tolerance: f64, max_iters: usize) -> Self {
        Self {
            tolerance: tolerance.max(0.0),
            max_iters: max_iters.max(1),
            state: None,
            converged: false,
        }
    }

    /// Round a real point to the nearest valid index vector.
    fn round_to_lattice(space: &ParameterSpace, point: &[f64]) -> Vec<usize> {
        point
            .iter()
            .enumerate()
            .map(|(dim, &x)| {
                let max = (space.len_of(dim) - 1) as f64;
                x.round().clamp(0.0, max) as usize
            })
            .collect()
    }

    /// Unit-step simplex anchored at the initial configuration. A dimension
    /// already at its upper bound steps down instead.
    fn initial_simplex(space: &ParameterSpace) -> Vec<Vertex> {
        let start: Vec<f64> = space.initial_indices().iter().map(|&i| i as f64).collect();
        let dims = space.dims();
        let mut vertices = Vec::with_capacity(dims + 1);
        vertices.push(Vertex { point: start.clone(), cost: None });
        for dim in 0..dims {
            let mut p = start.clone();
            let top = (space.len_of(dim) - 1) as f64;
            if p[dim] + 1.0 <= top {
                p[dim] += 1.0;
            } else if p[dim] >= 1.0 {
                p[dim] -= 1.0;
            }
            vertices.push(Vertex { point: p, cost: None });
        }
        vertices
    }

    fn vertex_cost(vertices: &[Vertex], i: usize) -> f64 {
        vertices[i].cost.unwrap_or(f64::INFINITY)
    }

    /// Vertex indices ordered best → worst.
    fn order(vertices: &[Vertex]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..vertices.len()).collect();
        order.sort_by(|&a, &b| {
            Self::vertex_cost(vertices, a)
                .partial_cmp(&Self::vertex_cost(vertices, b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order
    }

    fn centroid_excluding(vertices: &[Vertex], excluded: usize) -> Vec<f64> {
        let dims = vertices[0].point.len();
        let mut c = vec![0.0; dims];
        let mut n = 0.0;
        for (i, v) in vertices.iter().enumerate() {
            if i == excluded {
                continue;
            }
            for (acc, x) in c.iter_mut().zip(&v.point) {
                *acc += x;
            }
            n += 1.0;
        }
        if n > 0.0 {
            for acc in &mut c {
                *acc /= n;
            }
        }
        c
    }

    fn spread(vertices: &[Vertex]) -> f64 {
        let mut best = f64::INFINITY;
        let mut worst = f64::NEG_INFINITY;
        for v in vertices {
            if let Some(c) = v.cost {
                best = best.min(c);
                worst = worst.max(c);
            }
        }
        if !best.is_finite() || !worst.is_finite() {
            return f64::INFINITY;
        }
        (worst - best) / (best.abs() + 1e-12)
    }
}

impl Default for NelderMeadSimplex {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchStrategy for NelderMeadSimplex {
    fn propose(&mut self, history: &[Observation], space: &ParameterSpace) -> Configuration {
        if space.dims() == 0 {
            self.converged = true;
            return space.current();
        }

        let dims = space.dims();
        let state = self.state.get_or_insert_with(|| SimplexState {
            vertices: Self::initial_simplex(space),
            pending: None,
            reflected: None,
            centroid: vec![0.0; dims],
            worst: 0,
            consumed: 0,
            iters: 0,
        });

        // Drain observations that answer the outstanding evaluation; seed
        // uncosted vertices from observations we never asked for (the
        // initial configuration, typically).
        while state.consumed < history.len() {
            let obs = &history[state.consumed];
            state.consumed += 1;

            let answers_pending = state.pending.as_ref().is_some_and(|(_, point)| {
                let indices = Self::round_to_lattice(space, point);
                space.config_at(&indices) == obs.config
            });

            if answers_pending {
                if let Some((purpose, point)) = state.pending.take() {
                    Self::step(state, purpose, point, obs.cost);
                }
            } else if let Some(idx) = space.indices_of(&obs.config) {
                let as_real: Vec<f64> = idx.iter().map(|&i| i as f64).collect();
                if let Some(v) = state
                    .vertices
                    .iter_mut()
                    .find(|v| v.cost.is_none() && v.point == as_real)
                {
                    v.cost = Some(obs.cost);
                }
            }
        }

        // Convergence is judged whenever the simplex is fully costed and no
        // evaluation is outstanding.
        if state.pending.is_none() && state.vertices.iter().all(|v| v.cost.is_some()) {
            let flat = Self::spread(&state.vertices) < self.tolerance;
            if flat || state.iters >= self.max_iters {
                self.converged = true;
            }
        }

        if self.converged {
            if let Some(best) = best_observed(history) {
                return best.config.clone();
            }
            return space.current();
        }

        // Evaluation still outstanding: re-issue the same lattice point.
        if let Some((_, point)) = &state.pending {
            let indices = Self::round_to_lattice(space, point);
            return space.config_at(&indices);
        }

        // Next uncosted vertex, if the simplex is being (re)built.
        if let Some(vertex) = state.vertices.iter().position(|v| v.cost.is_none()) {
            let point = state.vertices[vertex].point.clone();
            state.pending = Some((Purpose::Vertex(vertex), point.clone()));
            let indices = Self::round_to_lattice(space, &point);
            return space.config_at(&indices);
        }

        // Fresh iteration: reflect the worst vertex through the centroid of
        // the rest.
        let order = Self::order(&state.vertices);
        let worst = order[order.len() - 1];
        let centroid = Self::centroid_excluding(&state.vertices, worst);
        let xr: Vec<f64> = centroid
            .iter()
            .zip(&state.vertices[worst].point)
            .map(|(ci, wi)| ci + ALPHA * (ci - wi))
            .collect();
        state.centroid = centroid;
        state.worst = worst;
        state.pending = Some((Purpose::Reflection, xr.clone()));
        let indices = Self::round_to_lattice(space, &xr);
        space.config_at(&indices)
    }

    fn has_converged(&mut self, _history: &[Observation]) -> bool {
        self.converged
    }

    fn name(&self) -> &'static str {
        "nelder-mead"
    }
}

impl NelderMeadSimplex {
    /// Advance the move arc with the cost of the point just evaluated.
    /// Expansion and contraction follow-ups are issued as new pending
    /// evaluations immediately; accepted moves bump the iteration counter.
    fn step(state: &mut SimplexState, purpose: Purpose, point: Vec<f64>, cost: f64) {
        match purpose {
            Purpose::Vertex(i) => {
                state.vertices[i].cost = Some(cost);
            }
            Purpose::Reflection => {
                let order = Self::order(&state.vertices);
                let f_best = Self::vertex_cost(&state.vertices, order[0]);
                let f_second = Self::vertex_cost(&state.vertices, order[order.len() - 2]);
                let f_worst = Self::vertex_cost(&state.vertices, state.worst);

                if cost < f_best {
                    // Try to expand past the reflected point.
                    let xe: Vec<f64> = state
                        .centroid
                        .iter()
                        .zip(&point)
                        .map(|(ci, ri)| ci + GAMMA * (ri - ci))
                        .collect();
                    state.reflected = Some((point, cost));
                    state.pending = Some((Purpose::Expansion, xe));
                } else if cost < f_second {
                    state.vertices[state.worst] = Vertex { point, cost: Some(cost) };
                    state.iters += 1;
                } else {
                    let outside = cost < f_worst;
                    let xc: Vec<f64> = if outside {
                        state
                            .centroid
                            .iter()
                            .zip(&point)
                            .map(|(ci, ri)| ci + RHO * (ri - ci))
                            .collect()
                    } else {
                        state
                            .centroid
                            .iter()
                            .zip(&state.vertices[state.worst].point)
                            .map(|(ci, wi)| ci - RHO * (ci - wi))
                            .collect()
                    };
                    state.reflected = Some((point, cost));
                    state.pending = Some((Purpose::Contraction { outside }, xc));
                }
            }
            Purpose::Expansion => {
                let (r_point, r_cost) = state
                    .reflected
                    .take()
                    .unwrap_or((point.clone(), f64::INFINITY));
                if cost < r_cost {
                    state.vertices[state.worst] = Vertex { point, cost: Some(cost) };
                } else {
                    state.vertices[state.worst] = Vertex { point: r_point, cost: Some(r_cost) };
                }
                state.iters += 1;
            }
            Purpose::Contraction { outside } => {
                let f_worst = Self::vertex_cost(&state.vertices, state.worst);
                let accept = match (outside, state.reflected.as_ref()) {
                    (true, Some((_, r_cost))) => cost <= *r_cost,
                    _ => cost < f_worst,
                };
                state.reflected = None;
                if accept {
                    state.vertices[state.worst] = Vertex { point, cost: Some(cost) };
                } else {
                    // Shrink every vertex toward the best; their costs are
                    // cleared and re-evaluated one at a time.
                    let order = Self::order(&state.vertices);
                    let best = order[0];
                    let anchor = state.vertices[best].point.clone();
                    for (i, v) in state.vertices.iter_mut().enumerate() {
                        if i == best {
                            continue;
                        }
                        for (x, a) in v.point.iter_mut().zip(&anchor) {
                            *x = a + SIGMA * (*x - a);
                        }
                        v.cost = None;
                    }
                }
                state.iters += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::ParamValue;

    fn thread_space(initial: i64) -> ParameterSpace {
        let mut space = ParameterSpace::new();
        space
            .add_parameter(
                "worker_threads",
                ParamValue::Int(initial),
                vec![
                    ParamValue::Int(2),
                    ParamValue::Int(4),
                    ParamValue::Int(8),
                    ParamValue::Int(16),
                    ParamValue::Int(24),
                    ParamValue::Int(32),
                ],
            )
            .unwrap();
        space
    }

    /// Convex landscape, unique minimum at 8 threads.
    fn vee_cost(cfg: &Configuration) -> f64 {
        let threads = cfg.get("worker_threads").and_then(|v| v.as_int()).unwrap();
        ((threads - 8).abs() as f64).mul_add(2.0, 1.0)
    }

    fn drive<F: Fn(&Configuration) -> f64>(
        strat: &mut NelderMeadSimplex,
        space: &ParameterSpace,
        cost: F,
        max_steps: usize,
    ) -> Vec<Observation> {
        let mut history = Vec::new();
        for _ in 0..max_steps {
            if strat.has_converged(&history) {
                break;
            }
            let cfg = strat.propose(&history, space);
            let c = cost(&cfg);
            history.push(Observation::new(cfg, c));
        }
        history
    }

    #[test]
    fn test_proposals_always_on_lattice() {
        let space = thread_space(16);
        let mut strat = NelderMeadSimplex::new();
        let mut history = Vec::new();
        for _ in 0..30 {
            let cfg = strat.propose(&history, &space);
            assert!(space.indices_of(&cfg).is_some(), "off-lattice proposal: {cfg}");
            let c = vee_cost(&cfg);
            history.push(Observation::new(cfg, c));
        }
    }

    #[test]
    fn test_finds_minimum_of_convex_landscape() {
        let space = thread_space(32);
        let mut strat = NelderMeadSimplex::new();
        let history = drive(&mut strat, &space, vee_cost, 200);
        assert!(strat.has_converged(&history), "simplex failed to converge");
        let final_cfg = strat.propose(&history, &space);
        assert_eq!(final_cfg.get("worker_threads"), Some(&ParamValue::Int(8)));
    }

    #[test]
    fn test_converges_on_flat_landscape_quickly() {
        let space = thread_space(16);
        let mut strat = NelderMeadSimplex::new();
        let history = drive(&mut strat, &space, |_| 3.0, 10);
        assert!(strat.has_converged(&history));
        // d+1 = 2 vertex evaluations are enough to see zero spread.
        assert!(history.len() <= 3, "took {} evaluations", history.len());
    }

    #[test]
    fn test_max_iters_bounds_the_search() {
        let space = thread_space(16);
        let mut strat = NelderMeadSimplex::with_limits(0.0, 4);
        // Noisy-looking deterministic landscape that never flattens.
        let mut toggle = 0u32;
        let mut history = Vec::new();
        for _ in 0..200 {
            if strat.has_converged(&history) {
                break;
            }
            let cfg = strat.propose(&history, &space);
            toggle = toggle.wrapping_add(1);
            let c = 1.0 + f64::from(toggle % 7);
            history.push(Observation::new(cfg, c));
        }
        assert!(strat.has_converged(&history), "iteration cap must force convergence");
    }

    #[test]
    fn test_converged_returns_best_observed() {
        let space = thread_space(32);
        let mut strat = NelderMeadSimplex::new();
        let history = drive(&mut strat, &space, vee_cost, 200);
        let best = best_observed(&history).unwrap().config.clone();
        assert_eq!(strat.propose(&history, &space), best);
        assert_eq!(strat.propose(&history, &space), best);
    }

    #[test]
    fn test_initial_observation_seeds_first_vertex() {
        let space = thread_space(16);
        let mut strat = NelderMeadSimplex::new();
        // Session measured the initial configuration before the first
        // proposal; the strategy must not re-request that vertex.
        let initial = space.current();
        let history = vec![Observation::new(initial.clone(), 9.0)];
        let first = strat.propose(&history, &space);
        assert_ne!(first, initial);
    }

    #[test]
    fn test_two_dimensional_landscape() {
        let mut space = ParameterSpace::new();
        space
            .add_parameter(
                "worker_threads",
                ParamValue::Int(2),
                vec![ParamValue::Int(2), ParamValue::Int(4), ParamValue::Int(8), ParamValue::Int(16)],
            )
            .unwrap();
        space
            .add_parameter(
                "chunk_size",
                ParamValue::Int(256),
                vec![
                    ParamValue::Int(1),
                    ParamValue::Int(8),
                    ParamValue::Int(32),
                    ParamValue::Int(64),
                    ParamValue::Int(256),
                ],
            )
            .unwrap();

        let cost = |cfg: &Configuration| {
            let t = cfg.get("worker_threads").and_then(|v| v.as_int()).unwrap();
            let c = cfg.get("chunk_size").and_then(|v| v.as_int()).unwrap();
            (t - 8).abs() as f64 + ((c - 32).abs() as f64) / 32.0 + 0.5
        };

        let mut strat = NelderMeadSimplex::new();
        let history = drive(&mut strat, &space, cost, 400);
        assert!(strat.has_converged(&history));
        let final_cfg = strat.propose(&history, &space);
        let t = final_cfg.get("worker_threads").and_then(|v| v.as_int()).unwrap();
        // Local search: must land in the good half of the thread domain.
        assert!(t >= 4, "landed on a poor thread count: {t}");
    }
}
