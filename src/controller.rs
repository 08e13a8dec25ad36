//! # Tuning Controller
//!
//! The entry point the external event source drives:
//!
//! ```text
//! Enter ──► registry lookup/create ──► session.on_enter ──► ConfigSink
//! Exit  ──► registry lookup ──► session.on_exit:
//!               window gate ──► cost from ProfileSource ──► strategy step
//! ```
//!
//! At startup the controller optionally pre-seeds the registry from the
//! history file, pinning those regions to their recorded configurations. At
//! shutdown it writes one record per session, converged or not.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::TunerConfig,
    error::TuneError,
    history::{self, HistoryRecord},
    profile::{ConfigSink, Phase, ProfileSource},
    registry::SessionRegistry,
    session::{ExitOutcome, TuningSession},
    space::{ParamValue, ParameterSpace},
    window::SampleWindow,
};

pub struct Controller {
    cfg: TunerConfig,
    registry: SessionRegistry,
    profiles: Arc<dyn ProfileSource>,
    sink: Arc<dyn ConfigSink>,
}

impl Controller {
    /// Build the controller and, when a history file is configured,
    /// pre-seed the registry from it. An unreadable file disables the
    /// feature with a warning; it is never fatal.
    pub fn new(
        cfg: TunerConfig,
        profiles: Arc<dyn ProfileSource>,
        sink: Arc<dyn ConfigSink>,
    ) -> Self {
        let controller = Self {
            cfg,
            registry: SessionRegistry::new(),
            profiles,
            sink,
        };

        if let Some(path) = controller.cfg.history_file.clone() {
            match history::load_file(&path) {
                Ok(records) => {
                    for record in &records {
                        controller.preseed(record);
                    }
                    info!(
                        target: "region_tuner::controller",
                        regions = records.len(),
                        path = %path.display(),
                        "pre-seeded sessions from history"
                    );
                }
                Err(e) => {
                    warn!(
                        target: "region_tuner::controller",
                        "{e}; continuing without history"
                    );
                }
            }
        }

        controller
    }

    /// The event-source callback: one region edge.
    pub fn on_event(&self, region: &str, phase: Phase) {
        match phase {
            Phase::Enter => {
                let session = self
                    .registry
                    .get_or_create(region, || self.create_session(region));
                session.on_enter(self.sink.as_ref());
            }
            Phase::Exit => {
                let Some(session) = self.registry.get(region) else {
                    let e = TuneError::OrphanExit { region: region.to_string() };
                    warn!(target: "region_tuner::controller", "{e}");
                    return;
                };
                match session.on_exit(self.profiles.as_ref()) {
                    ExitOutcome::JustConverged => {
                        info!(
                            target: "region_tuner::controller",
                            region,
                            config = %session.current(),
                            steps = session.steps_taken(),
                            "region converged"
                        );
                    }
                    ExitOutcome::SkippedNoProfile | ExitOutcome::Buffering
                    | ExitOutcome::Stepped | ExitOutcome::Terminal => {}
                }
            }
        }
    }

    /// Sessions created so far (for reporting).
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &TunerConfig {
        &self.cfg
    }

    /// One record per session, registry order.
    pub fn records(&self) -> Vec<HistoryRecord> {
        let mut records = Vec::new();
        self.registry.for_each_session(|session| {
            records.push(Self::record_of(session));
        });
        records
    }

    /// Persist every session. Called once at shutdown; IO failures are
    /// reported to the caller but leave the process alone.
    pub fn save_history(&self) -> Result<usize, TuneError> {
        let Some(path) = &self.cfg.history_file else {
            return Ok(0);
        };
        let records = self.records();
        history::save_file(path, &records)?;
        info!(
            target: "region_tuner::controller",
            regions = records.len(),
            path = %path.display(),
            "saved tuning history"
        );
        Ok(records.len())
    }

    // --- private ---

    fn create_session(&self, region: &str) -> Arc<TuningSession> {
        let space = self.cfg.template.build_space().unwrap_or_else(|e| {
            warn!(
                target: "region_tuner::controller",
                region,
                "parameter template is invalid ({e}); session gets an empty space"
            );
            ParameterSpace::new()
        });
        let trigger = self.profiles.register_trigger(region);
        info!(
            target: "region_tuner::controller",
            region,
            strategy = %self.cfg.strategy,
            window = self.cfg.window,
            "new tuning session"
        );
        TuningSession::new(
            region,
            space,
            self.cfg.strategy.instantiate(),
            SampleWindow::new(self.cfg.window),
            trigger,
        )
    }

    /// Build a pinned session for one loaded record: every parameter gets a
    /// degenerate single-candidate domain holding the recorded value.
    fn preseed(&self, record: &HistoryRecord) {
        let mut space = ParameterSpace::new();
        for (name, value) in &record.values {
            if let Err(e) = space.add_parameter(name.clone(), value.clone(), vec![value.clone()])
            {
                warn!(
                    target: "region_tuner::controller",
                    region = %record.region,
                    "history record unusable ({e}); region will be tuned fresh"
                );
                return;
            }
        }
        let trigger = self.profiles.register_trigger(&record.region);
        let session = TuningSession::pinned(
            record.region.clone(),
            space,
            self.cfg.strategy.instantiate(),
            trigger,
            record.converged,
        );
        if !self.registry.insert_if_absent(session) {
            warn!(
                target: "region_tuner::controller",
                region = %record.region,
                "duplicate history record ignored"
            );
        }
    }

    fn record_of(session: &Arc<TuningSession>) -> HistoryRecord {
        let config = session.current();
        let values = session
            .parameter_names()
            .into_iter()
            .map(|name| {
                let value = config
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| ParamValue::from(""));
                (name, value)
            })
            .collect();
        HistoryRecord {
            region: session.region().to_string(),
            values,
            converged: session.is_converged(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
