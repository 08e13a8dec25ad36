//! # Crate errors
//!
//! ## Responsibility
//! The single error taxonomy for the tuning core. Every variant is
//! local-recoverable: a failure degrades tuning quality for one region but
//! never aborts the hosting process.
//!
//! ## Guarantees
//! - Rejected calls leave existing state untouched (validation happens
//!   before any mutation)
//! - Each variant carries enough context to diagnose the failure without
//!   inspecting the call site

use thiserror::Error;

/// Errors raised by the tuning core.
#[derive(Debug, Error)]
pub enum TuneError {
    /// A parameter name was declared twice in the same space.
    #[error("parameter '{name}' already declared in this space")]
    DuplicateParameter { name: String },

    /// A parameter domain was empty or did not contain its initial value.
    #[error("invalid domain for parameter '{name}': {detail}")]
    InvalidDomain { name: String, detail: String },

    /// An applied configuration contained a value outside its domain.
    #[error("value '{value}' is not in the domain of parameter '{param}'")]
    DomainViolation { param: String, value: String },

    /// A search-strategy selector did not name a known strategy.
    #[error("unknown search strategy '{name}'")]
    UnknownStrategy { name: String },

    /// An Exit event arrived for a region that was never entered.
    #[error("exit event for unknown region '{region}' dropped")]
    OrphanExit { region: String },

    /// The profile for a region was absent or had zero calls at
    /// evaluation time, so no cost could be computed.
    #[error("no usable profile for region '{region}': {detail}")]
    MissingProfile { region: String, detail: String },

    /// A history row had the wrong field count and was skipped.
    #[error("malformed history record at line {line}: {detail}")]
    MalformedHistoryRecord { line: usize, detail: String },

    /// The history file could not be read or written.
    #[error("history file '{path}': {source}")]
    HistoryIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
