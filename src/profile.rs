//! # External collaborators
//!
//! ## Responsibility
//! The two seams between the tuning core and its host: the profiling/event
//! system that measures regions, and the runtime sink that configurations
//! are pushed into. Both are object-safe traits so embedders (and tests)
//! supply their own implementations; the core never measures or applies
//! anything itself.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        PoisonError, RwLock,
    },
};

use crate::space::Configuration;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Which edge of a region the event source observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enter,
    Exit,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Enter => write!(f, "enter"),
            Phase::Exit => write!(f, "exit"),
        }
    }
}

// ---------------------------------------------------------------------------
// Profile source
// ---------------------------------------------------------------------------

/// Accumulated timing statistics for one region since the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RegionProfile {
    /// Invocations measured in the current window.
    pub calls: u64,
    /// Total measured time across those invocations, in seconds.
    pub accumulated: f64,
}

impl RegionProfile {
    /// Mean time per invocation, if any calls were measured.
    pub fn mean_cost(&self) -> Option<f64> {
        if self.calls == 0 {
            None
        } else {
            Some(self.accumulated / self.calls as f64)
        }
    }
}

/// Opaque handle bound to the external event system's per-region trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerHandle(pub u64);

/// The profiling/event collaborator the core consumes.
///
/// Implementations must be safe to call from any of the host's worker
/// threads.
pub trait ProfileSource: Send + Sync {
    /// Timing statistics for `region`, or `None` if the profiler has
    /// nothing for that name.
    fn get_profile(&self, region: &str) -> Option<RegionProfile>;

    /// Start the next measurement window clean. Called immediately after a
    /// qualifying evaluation.
    fn reset_profile(&self, region: &str);

    /// Bind a per-region trigger; the returned handle is kept for the life
    /// of the session.
    fn register_trigger(&self, region: &str) -> TriggerHandle;

    /// Signal "evaluate now" back into the event system after a search step.
    fn fire_trigger(&self, handle: TriggerHandle);
}

// ---------------------------------------------------------------------------
// Configuration sink
// ---------------------------------------------------------------------------

/// The runtime-application side: receives the configuration a region must
/// execute under. Called on every Enter, even when unchanged.
pub trait ConfigSink: Send + Sync {
    fn apply_configuration(&self, region: &str, config: &Configuration);
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

/// A [`ProfileSource`] backed by a plain map. Used by the demo workload and
/// by tests; embedders with a real profiler implement the trait themselves.
#[derive(Debug, Default)]
pub struct InMemoryProfiler {
    profiles: RwLock<HashMap<String, RegionProfile>>,
    next_trigger: AtomicU64,
    fired: AtomicU64,
}

impl InMemoryProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one invocation of `region` taking `seconds`.
    pub fn record(&self, region: &str, seconds: f64) {
        let mut map = self
            .profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let p = map.entry(region.to_string()).or_default();
        p.calls += 1;
        p.accumulated += seconds;
    }

    /// How many times a search step fired the trigger.
    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }
}

impl ProfileSource for InMemoryProfiler {
    fn get_profile(&self, region: &str) -> Option<RegionProfile> {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(region)
            .copied()
    }

    fn reset_profile(&self, region: &str) {
        let mut map = self
            .profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(p) = map.get_mut(region) {
            *p = RegionProfile::default();
        }
    }

    fn register_trigger(&self, _region: &str) -> TriggerHandle {
        TriggerHandle(self.next_trigger.fetch_add(1, Ordering::Relaxed))
    }

    fn fire_trigger(&self, _handle: TriggerHandle) {
        self.fired.fetch_add(1, Ordering::Relaxed);
    }
}

/// A [`ConfigSink`] that remembers the last configuration applied per
/// region and counts applications.
#[derive(Debug, Default)]
pub struct RecordingSink {
    applied: RwLock<HashMap<String, Configuration>>,
    count: AtomicU64,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently applied configuration for `region`.
    pub fn last(&self, region: &str) -> Option<Configuration> {
        self.applied
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(region)
            .cloned()
    }

    /// Total `apply_configuration` calls across all regions.
    pub fn apply_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl ConfigSink for RecordingSink {
    fn apply_configuration(&self, region: &str, config: &Configuration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let mut map = self
            .applied
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.insert(region.to_string(), config.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_cost_of_empty_profile_is_none() {
        assert_eq!(RegionProfile::default().mean_cost(), None);
    }

    #[test]
    fn test_mean_cost_divides_by_calls() {
        let p = RegionProfile { calls: 4, accumulated: 2.0 };
        assert_eq!(p.mean_cost(), Some(0.5));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Enter.to_string(), "enter");
        assert_eq!(Phase::Exit.to_string(), "exit");
    }

    #[test]
    fn test_in_memory_profiler_accumulates_and_resets() {
        let prof = InMemoryProfiler::new();
        prof.record("loop", 0.5);
        prof.record("loop", 1.5);
        let p = prof.get_profile("loop").unwrap();
        assert_eq!(p.calls, 2);
        assert_eq!(p.mean_cost(), Some(1.0));

        prof.reset_profile("loop");
        assert_eq!(prof.get_profile("loop").unwrap().calls, 0);
    }

    #[test]
    fn test_in_memory_profiler_unknown_region_absent() {
        assert!(InMemoryProfiler::new().get_profile("nope").is_none());
    }

    #[test]
    fn test_trigger_handles_are_distinct() {
        let prof = InMemoryProfiler::new();
        let a = prof.register_trigger("a");
        let b = prof.register_trigger("b");
        assert_ne!(a, b);
        prof.fire_trigger(a);
        assert_eq!(prof.fired_count(), 1);
    }

    #[test]
    fn test_recording_sink_remembers_last() {
        let sink = RecordingSink::new();
        let cfg = Configuration::from_pairs([(
            "worker_threads".to_string(),
            crate::space::ParamValue::Int(8),
        )]);
        sink.apply_configuration("loop", &cfg);
        assert_eq!(sink.last("loop"), Some(cfg));
        assert_eq!(sink.apply_count(), 1);
        assert_eq!(sink.last("other"), None);
    }
}
