//! # Stage: Tuner Configuration
//!
//! ## Responsibility
//! The environment-style configuration surface and the per-region parameter
//! blueprint. [`TunerConfig::from_env`] reads the `REGION_TUNER_*`
//! variables; every malformed value falls back to its default with a
//! warning, never an abort. [`SpaceTemplate`] is the blueprint every new
//! session's [`ParameterSpace`] is built from.

use std::{env, path::PathBuf};

use tracing::warn;

use crate::{
    error::TuneError,
    space::{ParamValue, ParameterSpace},
    strategy::StrategyKind,
};

/// Calls batched before a measurement is trusted. Default 1: every call.
pub const ENV_WINDOW: &str = "REGION_TUNER_WINDOW";
/// Search strategy selector. Default `nelder-mead`.
pub const ENV_STRATEGY: &str = "REGION_TUNER_STRATEGY";
/// Verbose diagnostics toggle.
pub const ENV_VERBOSE: &str = "REGION_TUNER_VERBOSE";
/// History file path; enables load-at-start and save-at-end.
pub const ENV_HISTORY: &str = "REGION_TUNER_HISTORY";

// ---------------------------------------------------------------------------
// SpaceTemplate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct TemplateParam {
    name: String,
    initial: ParamValue,
    candidates: Vec<ParamValue>,
}

/// Blueprint for the parameter space given to every new session.
#[derive(Debug, Clone)]
pub struct SpaceTemplate {
    params: Vec<TemplateParam>,
}

impl SpaceTemplate {
    pub fn empty() -> Self {
        Self { params: Vec::new() }
    }

    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        initial: ParamValue,
        candidates: Vec<ParamValue>,
    ) -> Self {
        self.params.push(TemplateParam {
            name: name.into(),
            initial,
            candidates,
        });
        self
    }

    /// Declared parameter names, declaration order.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Materialize a fresh space from the blueprint.
    pub fn build_space(&self) -> Result<ParameterSpace, TuneError> {
        let mut space = ParameterSpace::new();
        for p in &self.params {
            space.add_parameter(p.name.clone(), p.initial.clone(), p.candidates.clone())?;
        }
        Ok(space)
    }
}

impl Default for SpaceTemplate {
    /// The classic runtime-parallelism triple: worker-thread count,
    /// scheduling policy, work-chunk size.
    fn default() -> Self {
        Self::empty()
            .with_parameter(
                "worker_threads",
                ParamValue::Int(16),
                vec![
                    ParamValue::Int(2),
                    ParamValue::Int(4),
                    ParamValue::Int(8),
                    ParamValue::Int(16),
                    ParamValue::Int(24),
                    ParamValue::Int(32),
                ],
            )
            .with_parameter(
                "schedule",
                ParamValue::from("static"),
                vec![
                    ParamValue::from("static"),
                    ParamValue::from("dynamic"),
                    ParamValue::from("guided"),
                ],
            )
            .with_parameter(
                "chunk_size",
                ParamValue::Int(64),
                vec![
                    ParamValue::Int(1),
                    ParamValue::Int(8),
                    ParamValue::Int(32),
                    ParamValue::Int(64),
                    ParamValue::Int(128),
                    ParamValue::Int(256),
                ],
            )
    }
}

// ---------------------------------------------------------------------------
// TunerConfig
// ---------------------------------------------------------------------------

/// Everything the controller needs to know at startup.
#[derive(Debug, Clone)]
pub struct TunerConfig {
    /// Calls batched before a cost reading is trusted.
    pub window: u32,
    /// Search strategy for every new session.
    pub strategy: StrategyKind,
    /// Raise diagnostic verbosity.
    pub verbose: bool,
    /// History file, if persistence is enabled.
    pub history_file: Option<PathBuf>,
    /// Parameter blueprint for new sessions.
    pub template: SpaceTemplate,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            window: 1,
            strategy: StrategyKind::default(),
            verbose: false,
            history_file: None,
            template: SpaceTemplate::default(),
        }
    }
}

impl TunerConfig {
    /// Read the `REGION_TUNER_*` environment variables, falling back to the
    /// default on anything malformed. An unknown strategy name is reported
    /// and replaced by the documented default rather than aborting.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(raw) = env::var(ENV_WINDOW) {
            match raw.trim().parse::<u32>() {
                Ok(n) => cfg.window = n.max(1),
                Err(_) => warn!(
                    target: "region_tuner::config",
                    "{ENV_WINDOW}='{raw}' is not a number; using {}",
                    cfg.window
                ),
            }
        }

        if let Ok(raw) = env::var(ENV_STRATEGY) {
            match raw.parse::<StrategyKind>() {
                Ok(kind) => cfg.strategy = kind,
                Err(e) => warn!(
                    target: "region_tuner::config",
                    "{e}; falling back to {}",
                    cfg.strategy
                ),
            }
        }

        if let Ok(raw) = env::var(ENV_VERBOSE) {
            cfg.verbose = parse_switch(&raw);
        }

        if let Ok(raw) = env::var(ENV_HISTORY) {
            if !raw.trim().is_empty() {
                cfg.history_file = Some(PathBuf::from(raw));
            }
        }

        cfg
    }
}

fn parse_switch(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = TunerConfig::default();
        assert_eq!(cfg.window, 1);
        assert_eq!(cfg.strategy, StrategyKind::NelderMeadSimplex);
        assert!(!cfg.verbose);
        assert!(cfg.history_file.is_none());
    }

    #[test]
    fn test_default_template_declares_the_triple() {
        let template = SpaceTemplate::default();
        let names = template.parameter_names();
        assert_eq!(names, vec!["worker_threads", "schedule", "chunk_size"]);
    }

    #[test]
    fn test_template_builds_valid_space() {
        let space = SpaceTemplate::default().build_space().unwrap();
        assert_eq!(space.dims(), 3);
        assert_eq!(space.total_combinations(), 6 * 3 * 6);
        let cfg = space.current();
        assert_eq!(cfg.get("worker_threads"), Some(&ParamValue::Int(16)));
        assert_eq!(cfg.get("schedule"), Some(&ParamValue::from("static")));
        assert_eq!(cfg.get("chunk_size"), Some(&ParamValue::Int(64)));
    }

    #[test]
    fn test_template_with_bad_parameter_fails_at_build() {
        let template = SpaceTemplate::empty().with_parameter(
            "broken",
            ParamValue::Int(5),
            vec![ParamValue::Int(1)],
        );
        assert!(template.build_space().is_err());
    }

    #[test]
    fn test_parse_switch_variants() {
        for on in ["1", "true", "ON", "Yes"] {
            assert!(parse_switch(on), "{on} should enable");
        }
        for off in ["0", "false", "off", "", "junk"] {
            assert!(!parse_switch(off), "{off} should disable");
        }
    }
}
