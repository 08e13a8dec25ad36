//! # Stage: Parameter Space
//!
//! ## Responsibility
//! Declares the tunable dimensions of one region and holds the live
//! [`Configuration`]. Each dimension is an ordered, finite candidate list —
//! integer ranges are pre-enumerated by the embedder, so every domain is
//! discrete. [`ParameterSpace::apply`] swaps the live configuration
//! atomically so concurrent readers never observe a torn value.
//!
//! ## Guarantees
//! - Non-empty domains; the current value is always a domain member
//! - `apply` is all-or-nothing: validation completes before any mutation
//! - Declaration order is stable and drives enumeration / column order
//!
//! ## NOT Responsible For
//! - Choosing values (search strategies, `strategy::*`)
//! - Pushing configurations into the runtime (the `ConfigSink` collaborator)

use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};

use crate::error::TuneError;

// ---------------------------------------------------------------------------
// ParamValue
// ---------------------------------------------------------------------------

/// One candidate value of a tunable dimension.
///
/// Domains mix freely: thread counts are `Int`, scheduling policies are `Str`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Str(String),
}

impl ParamValue {
    /// Parse a textual field back into a value: integers stay integers,
    /// everything else is a string.
    pub fn parse(field: &str) -> ParamValue {
        match field.parse::<i64>() {
            Ok(n) => ParamValue::Int(n),
            Err(_) => ParamValue::Str(field.to_string()),
        }
    }

    /// Integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            ParamValue::Str(_) => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(n) => write!(f, "{n}"),
            ParamValue::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Int(n)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

// ---------------------------------------------------------------------------
// ParameterDomain
// ---------------------------------------------------------------------------

/// A named tunable dimension with its ordered candidate list.
#[derive(Debug, Clone)]
pub struct ParameterDomain {
    name: String,
    candidates: Vec<ParamValue>,
    initial: usize,
}

impl ParameterDomain {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn candidates(&self) -> &[ParamValue] {
        &self.candidates
    }

    /// Number of candidates. Always >= 1.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Index of the initial value within the candidate list.
    pub fn initial_index(&self) -> usize {
        self.initial
    }

    pub fn contains(&self, value: &ParamValue) -> bool {
        self.candidates.contains(value)
    }

    /// Position of `value` in the candidate list, if declared.
    pub fn index_of(&self, value: &ParamValue) -> Option<usize> {
        self.candidates.iter().position(|c| c == value)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// An immutable assignment of one value to every declared parameter.
///
/// Two configurations are equal iff all entries are equal; map ordering makes
/// equality independent of declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Configuration(BTreeMap<String, ParamValue>);

impl Configuration {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, ParamValue)>,
    {
        Configuration(pairs.into_iter().collect())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in parameter-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }
}

impl std::fmt::Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (name, value) in &self.0 {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ParameterSpace
// ---------------------------------------------------------------------------

/// The declared dimensions of one region plus its live configuration.
///
/// Dimensions are added during construction (`&mut self`); once the space is
/// shared, only [`apply`](ParameterSpace::apply) mutates it, behind a write
/// lock, so [`current`](ParameterSpace::current) readers are never torn.
#[derive(Debug, Default)]
pub struct ParameterSpace {
    domains: Vec<ParameterDomain>,
    current: RwLock<Configuration>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a dimension. Declaration order is preserved.
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        initial: ParamValue,
        candidates: Vec<ParamValue>,
    ) -> Result<(), TuneError> {
        let name = name.into();
        if self.domains.iter().any(|d| d.name == name) {
            return Err(TuneError::DuplicateParameter { name });
        }
        if candidates.is_empty() {
            return Err(TuneError::InvalidDomain {
                name,
                detail: "candidate list is empty".into(),
            });
        }
        let initial_index = match candidates.iter().position(|c| *c == initial) {
            Some(i) => i,
            None => {
                return Err(TuneError::InvalidDomain {
                    name,
                    detail: format!("initial value '{initial}' not among candidates"),
                })
            }
        };

        let mut live = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        live.0.insert(name.clone(), initial.clone());
        drop(live);

        self.domains.push(ParameterDomain {
            name,
            candidates,
            initial: initial_index,
        });
        Ok(())
    }

    /// The live configuration (cloned under the read lock).
    pub fn current(&self) -> Configuration {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the live configuration. All-or-nothing: every entry is
    /// validated against its domain before the swap; on any violation the
    /// live configuration is untouched.
    pub fn apply(&self, config: &Configuration) -> Result<(), TuneError> {
        for domain in &self.domains {
            match config.get(&domain.name) {
                Some(value) if domain.contains(value) => {}
                Some(value) => {
                    return Err(TuneError::DomainViolation {
                        param: domain.name.clone(),
                        value: value.to_string(),
                    })
                }
                None => {
                    return Err(TuneError::DomainViolation {
                        param: domain.name.clone(),
                        value: "<missing>".into(),
                    })
                }
            }
        }
        for (name, value) in config.iter() {
            if !self.domains.iter().any(|d| &d.name == name) {
                return Err(TuneError::DomainViolation {
                    param: name.clone(),
                    value: value.to_string(),
                });
            }
        }

        let mut live = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *live = config.clone();
        Ok(())
    }

    /// Declared dimensions in declaration order.
    pub fn domains(&self) -> &[ParameterDomain] {
        &self.domains
    }

    /// Number of dimensions.
    pub fn dims(&self) -> usize {
        self.domains.len()
    }

    /// Candidate count of dimension `dim`.
    pub fn len_of(&self, dim: usize) -> usize {
        self.domains[dim].len()
    }

    /// Size of the Cartesian product of all domains.
    pub fn total_combinations(&self) -> usize {
        self.domains
            .iter()
            .fold(1usize, |acc, d| acc.saturating_mul(d.len()))
    }

    /// Index vector of the declared initial values.
    pub fn initial_indices(&self) -> Vec<usize> {
        self.domains.iter().map(|d| d.initial).collect()
    }

    /// Build the configuration at an index vector (one index per dimension,
    /// declaration order). Indices are clamped into range.
    pub fn config_at(&self, indices: &[usize]) -> Configuration {
        let pairs = self.domains.iter().zip(indices).map(|(d, &i)| {
            let i = i.min(d.len() - 1);
            (d.name.clone(), d.candidates[i].clone())
        });
        Configuration::from_pairs(pairs)
    }

    /// Recover the index vector of a configuration. `None` if any entry is
    /// absent or not a domain member.
    pub fn indices_of(&self, config: &Configuration) -> Option<Vec<usize>> {
        self.domains
            .iter()
            .map(|d| config.get(&d.name).and_then(|v| d.index_of(v)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
