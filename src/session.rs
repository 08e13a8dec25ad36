//! # Stage: Tuning Session
//!
//! ## Responsibility
//! The per-region state machine. Binds the parameter space, the search
//! strategy, the measurement window and the observation history for one
//! named region, and walks `Active → Converged` as Exit-driven search steps
//! accumulate evidence. Convergence is terminal for the life of the process.
//!
//! ## Guarantees
//! - Search steps are serialized per session (one in flight at a time)
//! - Enter-path configuration reads never block on a step in progress and
//!   never observe a torn configuration
//! - The converged flag is monotonic: false → true, never back
//! - A missing or zero-call profile skips the step without recording a
//!   bogus observation
//!
//! ## NOT Responsible For
//! - Session creation and lookup (the registry)
//! - Measuring regions or applying configurations (the collaborators)

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};

use tracing::{debug, warn};

use crate::{
    error::TuneError,
    profile::{ConfigSink, ProfileSource, TriggerHandle},
    space::{Configuration, ParameterSpace},
    strategy::{Observation, SearchStrategy},
    window::SampleWindow,
};

// ---------------------------------------------------------------------------
// ExitOutcome
// ---------------------------------------------------------------------------

/// What one Exit event did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The measurement window is not full yet; nothing evaluated.
    Buffering,
    /// The window was full but the profile was missing or empty; the step
    /// was skipped and no observation recorded.
    SkippedNoProfile,
    /// A search step ran; the session is still exploring.
    Stepped,
    /// A search step ran and latched convergence.
    JustConverged,
    /// The session was already terminal; bookkeeping only.
    Terminal,
}

// ---------------------------------------------------------------------------
// TuningSession
// ---------------------------------------------------------------------------

struct SessionInner {
    strategy: Box<dyn SearchStrategy>,
    history: Vec<Observation>,
    window: SampleWindow,
}

/// Per-region tuning state. Shared via `Arc`; all mutation goes through the
/// internal lock, configuration reads through the space's own lock.
pub struct TuningSession {
    region: String,
    space: ParameterSpace,
    trigger: TriggerHandle,
    /// Pre-seeded from history with a degenerate domain; never searches.
    pinned: bool,
    converged: AtomicBool,
    exits_seen: AtomicU64,
    steps_taken: AtomicU64,
    inner: Mutex<SessionInner>,
}

impl TuningSession {
    pub fn new(
        region: impl Into<String>,
        space: ParameterSpace,
        strategy: Box<dyn SearchStrategy>,
        window: SampleWindow,
        trigger: TriggerHandle,
    ) -> Arc<Self> {
        Arc::new(Self {
            region: region.into(),
            space,
            trigger,
            pinned: false,
            converged: AtomicBool::new(false),
            exits_seen: AtomicU64::new(0),
            steps_taken: AtomicU64::new(0),
            inner: Mutex::new(SessionInner {
                strategy,
                history: Vec::new(),
                window,
            }),
        })
    }

    /// A session pinned to historical values: its degenerate space only
    /// ever holds the loaded configuration and search is disabled.
    pub fn pinned(
        region: impl Into<String>,
        space: ParameterSpace,
        strategy: Box<dyn SearchStrategy>,
        trigger: TriggerHandle,
        converged: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            region: region.into(),
            space,
            trigger,
            pinned: true,
            converged: AtomicBool::new(converged),
            exits_seen: AtomicU64::new(0),
            steps_taken: AtomicU64::new(0),
            inner: Mutex::new(SessionInner {
                strategy,
                history: Vec::new(),
                window: SampleWindow::default(),
            }),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// The live configuration this region executes under.
    pub fn current(&self) -> Configuration {
        self.space.current()
    }

    pub fn is_converged(&self) -> bool {
        self.converged.load(Ordering::Acquire)
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn trigger(&self) -> TriggerHandle {
        self.trigger
    }

    /// Exit events seen, whether or not they evaluated anything.
    pub fn exits_seen(&self) -> u64 {
        self.exits_seen.load(Ordering::Relaxed)
    }

    /// Completed search steps.
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken.load(Ordering::Relaxed)
    }

    /// Declared parameter names in declaration order, for persistence.
    pub fn parameter_names(&self) -> Vec<String> {
        self.space
            .domains()
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }

    /// Handle an Enter event: the region must run under the session's
    /// current choice, so the configuration is pushed on every Enter even
    /// when unchanged.
    pub fn on_enter(&self, sink: &dyn ConfigSink) {
        sink.apply_configuration(&self.region, &self.space.current());
    }

    /// Handle an Exit event: window gate, cost extraction, one serialized
    /// search step.
    pub fn on_exit(&self, profiles: &dyn ProfileSource) -> ExitOutcome {
        self.exits_seen.fetch_add(1, Ordering::Relaxed);

        if self.pinned || self.is_converged() {
            return ExitOutcome::Terminal;
        }

        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Re-check under the lock: a racing step may have latched.
        if self.is_converged() {
            return ExitOutcome::Terminal;
        }

        let profile = profiles.get_profile(&self.region);
        let calls = profile.map(|p| p.calls).unwrap_or(0);
        if !inner.window.should_evaluate(calls) {
            return ExitOutcome::Buffering;
        }

        // Positive window decision: the next window starts clean no matter
        // what the measurement turns out to be.
        profiles.reset_profile(&self.region);

        let Some(cost) = profile.and_then(|p| p.mean_cost()) else {
            let e = TuneError::MissingProfile {
                region: self.region.clone(),
                detail: if profile.is_none() {
                    "profile absent".into()
                } else {
                    "zero calls in window".into()
                },
            };
            warn!(target: "region_tuner::session", "{e}; step skipped");
            return ExitOutcome::SkippedNoProfile;
        };

        let measured = self.space.current();
        inner.history.push(Observation::new(measured, cost));

        let SessionInner { strategy, history, .. } = &mut *inner;
        let next = strategy.propose(history, &self.space);
        if let Err(e) = self.space.apply(&next) {
            // A strategy proposing outside the space is a bug in the
            // strategy; keep the previous configuration and keep tuning.
            warn!(
                target: "region_tuner::session",
                region = %self.region,
                error = %e,
                "strategy proposed an invalid configuration"
            );
        }
        profiles.fire_trigger(self.trigger);
        self.steps_taken.fetch_add(1, Ordering::Relaxed);

        let converged = strategy.has_converged(history);
        if converged {
            // Post-latch proposals are exploitation only: swap in the
            // strategy's final choice before freezing the session.
            let best = strategy.propose(history, &self.space);
            if let Err(e) = self.space.apply(&best) {
                warn!(
                    target: "region_tuner::session",
                    region = %self.region,
                    error = %e,
                    "strategy's final choice is invalid"
                );
            }
        }
        debug!(
            target: "region_tuner::session",
            region = %self.region,
            cost,
            next = %self.space.current(),
            converged,
            "search step"
        );

        if converged {
            self.converged.store(true, Ordering::Release);
            ExitOutcome::JustConverged
        } else {
            ExitOutcome::Stepped
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
