//! # region-tuner
//!
//! An online, feedback-directed controller that tunes discrete runtime
//! parameters (worker-thread count, scheduling policy, work-chunk size) for
//! recurring named execution regions of a parallel program, using measured
//! mean time per invocation instead of static heuristics.
//!
//! The host's profiling/event system delivers `(region, Enter|Exit)` edges
//! to the [`Controller`]; each region gets its own [`session::TuningSession`]
//! that walks a discrete parameter space with a pluggable
//! [`strategy::SearchStrategy`] until the search converges, then exploits
//! the best configuration for the rest of the run. Outcomes persist across
//! runs through the [`history`] store.
//!
//! ```no_run
//! use std::sync::Arc;
//! use region_tuner::{
//!     Controller, Phase, TunerConfig,
//!     profile::{InMemoryProfiler, RecordingSink},
//! };
//!
//! let profiles = Arc::new(InMemoryProfiler::new());
//! let sink = Arc::new(RecordingSink::new());
//! let tuner = Controller::new(TunerConfig::from_env(), profiles.clone(), sink);
//!
//! // The event source calls this on every region edge:
//! tuner.on_event("hot loop", Phase::Enter);
//! profiles.record("hot loop", 0.003);
//! tuner.on_event("hot loop", Phase::Exit);
//! ```

pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod profile;
pub mod registry;
pub mod session;
pub mod space;
pub mod strategy;
pub mod window;

pub use config::{SpaceTemplate, TunerConfig};
pub use controller::Controller;
pub use error::TuneError;
pub use history::HistoryRecord;
pub use profile::{ConfigSink, Phase, ProfileSource, RegionProfile, TriggerHandle};
pub use registry::SessionRegistry;
pub use session::{ExitOutcome, TuningSession};
pub use space::{Configuration, ParamValue, ParameterDomain, ParameterSpace};
pub use strategy::{Observation, SearchStrategy, StrategyKind};
pub use window::SampleWindow;
