//! # Stage: Session Registry
//!
//! ## Responsibility
//! The process-wide map from region name to its [`TuningSession`]. The
//! single creation point: concurrent first-sight Enter events for the same
//! name yield exactly one session, shared by every caller.
//!
//! ## Guarantees
//! - At-most-one creation per region name (double-checked under the write
//!   lock; losers of the race receive the winner's session)
//! - Lookups never contend with each other (read lock)
//! - The map only grows; sessions live until process shutdown
//!
//! ## NOT Responsible For
//! - Deciding what a new session looks like (the caller's constructor)
//! - Persistence (the history store iterates at shutdown)

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use crate::session::TuningSession;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<TuningSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `region` without creating it.
    pub fn get(&self, region: &str) -> Option<Arc<TuningSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(region)
            .cloned()
    }

    /// Look up `region`, creating the session with `init` on first sight.
    ///
    /// `init` runs at most once per region name process-wide, under the
    /// write lock; racing callers block until creation completes and then
    /// share the same `Arc`.
    pub fn get_or_create<F>(&self, region: &str, init: F) -> Arc<TuningSession>
    where
        F: FnOnce() -> Arc<TuningSession>,
    {
        if let Some(session) = self.get(region) {
            return session;
        }

        let mut map = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Re-check: another thread may have won the race between our read
        // and this write lock.
        if let Some(session) = map.get(region) {
            return Arc::clone(session);
        }
        let session = init();
        map.insert(region.to_string(), Arc::clone(&session));
        session
    }

    /// Insert a pre-built session (history pre-seeding at startup). An
    /// existing entry wins; returns whether the insert happened.
    pub fn insert_if_absent(&self, session: Arc<TuningSession>) -> bool {
        let mut map = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(session.region()) {
            return false;
        }
        map.insert(session.region().to_string(), session);
        true
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every session once. Shutdown-time reporting and persistence
    /// only; not meant to run concurrently with tuning activity.
    pub fn for_each_session<F>(&self, mut visitor: F)
    where
        F: FnMut(&Arc<TuningSession>),
    {
        let map = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&String> = map.keys().collect();
        names.sort();
        for name in names {
            if let Some(session) = map.get(name) {
                visitor(session);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        profile::TriggerHandle,
        space::{ParamValue, ParameterSpace},
        strategy::StrategyKind,
        window::SampleWindow,
    };

    fn make_session(region: &str) -> Arc<TuningSession> {
        let mut space = ParameterSpace::new();
        space
            .add_parameter(
                "worker_threads",
                ParamValue::Int(4),
                vec![ParamValue::Int(2), ParamValue::Int(4), ParamValue::Int(8)],
            )
            .unwrap();
        TuningSession::new(
            region,
            space,
            StrategyKind::default().instantiate(),
            SampleWindow::default(),
            TriggerHandle(0),
        )
    }

    #[test]
    fn test_get_unknown_region_is_none() {
        let reg = SessionRegistry::new();
        assert!(reg.get("ghost").is_none());
    }

    #[test]
    fn test_get_or_create_creates_once() {
        let reg = SessionRegistry::new();
        let a = reg.get_or_create("loop", || make_session("loop"));
        let b = reg.get_or_create("loop", || make_session("loop"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_distinct_regions_get_distinct_sessions() {
        let reg = SessionRegistry::new();
        let a = reg.get_or_create("a", || make_session("a"));
        let b = reg.get_or_create("b", || make_session("b"));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_concurrent_first_sight_yields_one_session() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let reg = Arc::new(SessionRegistry::new());
        let creations = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let reg = Arc::clone(&reg);
                let creations = Arc::clone(&creations);
                std::thread::spawn(move || {
                    reg.get_or_create("hot", move || {
                        creations.fetch_add(1, Ordering::SeqCst);
                        make_session("hot")
                    })
                })
            })
            .collect();

        let sessions: Vec<Arc<TuningSession>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(creations.load(Ordering::SeqCst), 1, "init ran more than once");
        for s in &sessions[1..] {
            assert!(Arc::ptr_eq(&sessions[0], s), "callers got different sessions");
        }
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_insert_if_absent_respects_existing() {
        let reg = SessionRegistry::new();
        let first = reg.get_or_create("loop", || make_session("loop"));
        assert!(!reg.insert_if_absent(make_session("loop")));
        assert!(Arc::ptr_eq(&first, &reg.get("loop").unwrap()));
    }

    #[test]
    fn test_insert_if_absent_inserts_new() {
        let reg = SessionRegistry::new();
        assert!(reg.insert_if_absent(make_session("fresh")));
        assert!(reg.get("fresh").is_some());
    }

    #[test]
    fn test_for_each_session_visits_all_sorted() {
        let reg = SessionRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            reg.get_or_create(name, || make_session(name));
        }
        let mut visited = Vec::new();
        reg.for_each_session(|s| visited.push(s.region().to_string()));
        assert_eq!(visited, vec!["alpha", "mid", "zeta"]);
    }
}
