//! Parameter values, parameter assignments and the constraint specification.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{HbError, HbResult};

/// A concrete parameter value proposed for evaluation.
///
/// Serialized untagged so a parameter record reads as plain JSON
/// (`{"x": 0.5, "y": 1}`). Variant order matters for decoding: integer
/// literals decode as `Int`, anything with a fraction or exponent as `Float`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl ParameterValue {
    /// Numeric view of the value; `None` for categorical values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }

    /// JSON has no representation for NaN or infinities.
    pub fn is_encodable(&self) -> bool {
        match self {
            Self::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A named parameter assignment. Ordered by name so records are stable.
pub type ParameterSet = BTreeMap<String, ParameterValue>;

/// Build a [`ParameterSet`] from `(name, value)` pairs.
pub fn parameter_set<K, V, I>(pairs: I) -> ParameterSet
where
    K: Into<String>,
    V: Into<ParameterValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Constraint on a single parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterKind {
    /// Continuous range [low, high].
    #[serde(rename = "cont")]
    Continuous { low: f64, high: f64 },
    /// Integer range [low, high] inclusive.
    Int { low: i64, high: i64 },
    /// Finite set of categorical choices.
    Choice { values: Vec<ParameterValue> },
}

impl ParameterKind {
    /// Whether `value` satisfies this constraint.
    pub fn admits(&self, value: &ParameterValue) -> bool {
        match (self, value) {
            (Self::Continuous { low, high }, ParameterValue::Float(v)) => *v >= *low && *v <= *high,
            (Self::Continuous { low, high }, ParameterValue::Int(v)) => {
                let v = *v as f64;
                v >= *low && v <= *high
            }
            (Self::Int { low, high }, ParameterValue::Int(v)) => *v >= *low && *v <= *high,
            (Self::Choice { values }, v) => values.contains(v),
            _ => false,
        }
    }

    fn validate(&self, name: &str) -> HbResult<()> {
        match self {
            Self::Continuous { low, high } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(HbError::Validation(format!(
                        "parameter '{name}': bounds must be finite"
                    )));
                }
                if low > high {
                    return Err(HbError::Validation(format!(
                        "parameter '{name}': low {low} exceeds high {high}"
                    )));
                }
            }
            Self::Int { low, high } => {
                if low > high {
                    return Err(HbError::Validation(format!(
                        "parameter '{name}': low {low} exceeds high {high}"
                    )));
                }
            }
            Self::Choice { values } => {
                if values.is_empty() {
                    return Err(HbError::Validation(format!(
                        "parameter '{name}': choice set is empty"
                    )));
                }
                if let Some(bad) = values.iter().find(|v| !v.is_encodable()) {
                    return Err(HbError::Validation(format!(
                        "parameter '{name}': choice {bad} cannot be recorded"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The constraint specification: parameter name to constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSpace {
    pub parameters: BTreeMap<String, ParameterKind>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters
            .insert(name.into(), ParameterKind::Continuous { low, high });
        self
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.parameters
            .insert(name.into(), ParameterKind::Int { low, high });
        self
    }

    pub fn add_choice(mut self, name: impl Into<String>, values: Vec<ParameterValue>) -> Self {
        self.parameters
            .insert(name.into(), ParameterKind::Choice { values });
        self
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Total number of grid points (returns `None` if any parameter is
    /// continuous without a natural grid).
    pub fn grid_size(&self) -> Option<usize> {
        let mut total: usize = 1;
        for kind in self.parameters.values() {
            let dim_size = match kind {
                ParameterKind::Int { low, high } => {
                    usize::try_from(high.checked_sub(*low)?).ok()?.checked_add(1)?
                }
                ParameterKind::Choice { values } => values.len(),
                ParameterKind::Continuous { .. } => return None,
            };
            total = total.checked_mul(dim_size)?;
        }
        Some(total)
    }

    /// Reject empty spaces and malformed constraints.
    pub fn validate(&self) -> HbResult<()> {
        if self.parameters.is_empty() {
            return Err(HbError::Validation("search space has no parameters".into()));
        }
        for (name, kind) in &self.parameters {
            kind.validate(name)?;
        }
        Ok(())
    }

    /// Check that `params` names exactly the parameters of this space and
    /// that each value lies within its constraint.
    pub fn check(&self, params: &ParameterSet) -> HbResult<()> {
        for (name, kind) in &self.parameters {
            match params.get(name) {
                None => {
                    return Err(HbError::Validation(format!("missing parameter '{name}'")));
                }
                Some(value) if !kind.admits(value) => {
                    return Err(HbError::Validation(format!(
                        "parameter '{name}' = {value} violates its constraint"
                    )));
                }
                Some(_) => {}
            }
        }
        if let Some(extra) = params.keys().find(|k| !self.parameters.contains_key(*k)) {
            return Err(HbError::Validation(format!("unknown parameter '{extra}'")));
        }
        Ok(())
    }
}
