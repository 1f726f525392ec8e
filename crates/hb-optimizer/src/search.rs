//! Parameter sweep strategies.
//!
//! A [`SearchStrategy`] is the seam where a surrogate-model library plugs
//! in; the strategies shipped here are model-free.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use hb_types::{HbResult, ParameterKind, ParameterSet, ParameterValue, SearchSpace};

/// Which built-in strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Grid,
    #[default]
    Random,
}

/// Common trait for all search strategies.
pub trait SearchStrategy: Send {
    /// Generate the next batch of parameter assignments to evaluate. May
    /// return fewer than `count` (or none) once the strategy is exhausted.
    fn suggest(&mut self, count: usize) -> Vec<ParameterSet>;

    /// Report a completed evaluation so adaptive strategies can learn.
    fn report(&mut self, _params: &ParameterSet, _objective: f64) {}

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

// ---- Grid search ----

/// One dimension of the grid, enumerated by index rather than stored.
#[derive(Debug, Clone)]
enum Axis {
    Linear { low: f64, high: f64, steps: u128 },
    Ints { low: i64, len: u128 },
    Choices(Vec<ParameterValue>),
}

impl Axis {
    fn len(&self) -> u128 {
        match self {
            Self::Linear { steps, .. } => *steps,
            Self::Ints { len, .. } => *len,
            Self::Choices(values) => values.len() as u128,
        }
    }

    fn value(&self, index: u128) -> ParameterValue {
        match self {
            Self::Linear { low, high, steps } => {
                let t = index as f64 / (*steps - 1) as f64;
                ParameterValue::Float(low + t * (high - low))
            }
            // index < len, so the sum stays within [low, high].
            Self::Ints { low, .. } => ParameterValue::Int((*low as i128 + index as i128) as i64),
            Self::Choices(values) => values[index as usize].clone(),
        }
    }
}

/// Exhaustive grid search over parameter combinations.
///
/// Points are decoded from a running index, so spaces whose full product
/// would not fit in memory are fine as long as only `max_iters` of them
/// are requested.
#[derive(Debug, Clone)]
pub struct GridSearch {
    axes: Vec<(String, Axis)>,
    total: u128,
    cursor: u128,
}

impl GridSearch {
    /// `float_steps` evenly spaced points are taken on each continuous
    /// dimension (at least the two bounds).
    pub fn new(space: &SearchSpace, float_steps: usize) -> Self {
        let axes: Vec<(String, Axis)> = space
            .parameters
            .iter()
            .map(|(name, kind)| {
                let axis = match kind {
                    ParameterKind::Continuous { low, high } => Axis::Linear {
                        low: *low,
                        high: *high,
                        steps: float_steps.max(2) as u128,
                    },
                    ParameterKind::Int { low, high } => Axis::Ints {
                        low: *low,
                        len: (*high as i128 - *low as i128 + 1).max(0) as u128,
                    },
                    ParameterKind::Choice { values } => Axis::Choices(values.clone()),
                };
                (name.clone(), axis)
            })
            .collect();

        // Saturates for products beyond u128; such a grid is never exhausted.
        let total = axes
            .iter()
            .try_fold(1u128, |acc, (_, axis)| acc.checked_mul(axis.len()))
            .unwrap_or(u128::MAX);

        Self {
            axes,
            total,
            cursor: 0,
        }
    }

    pub fn len(&self) -> u128 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn remaining(&self) -> u128 {
        self.total - self.cursor
    }

    /// The grid point at `index`; the last dimension varies fastest.
    fn point(&self, mut index: u128) -> ParameterSet {
        let mut params = ParameterSet::new();
        for (name, axis) in self.axes.iter().rev() {
            let len = axis.len();
            params.insert(name.clone(), axis.value(index % len));
            index /= len;
        }
        params
    }
}

impl SearchStrategy for GridSearch {
    fn suggest(&mut self, count: usize) -> Vec<ParameterSet> {
        let end = self.cursor.saturating_add(count as u128).min(self.total);
        let batch = (self.cursor..end).map(|i| self.point(i)).collect();
        self.cursor = end;
        batch
    }

    fn name(&self) -> &str {
        "grid"
    }
}

// ---- Random search ----

/// Independent uniform sampling, reproducible for a given seed.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: SearchSpace,
    rng: StdRng,
}

impl RandomSearch {
    /// Fails if the space does not validate, since sampling needs every
    /// range and choice set to be non-empty.
    pub fn new(space: SearchSpace, seed: u64) -> HbResult<Self> {
        space.validate()?;
        Ok(Self {
            space,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    fn sample_one(&mut self) -> ParameterSet {
        let mut params = ParameterSet::new();

        for (name, kind) in &self.space.parameters {
            let value = match kind {
                ParameterKind::Continuous { low, high } => {
                    ParameterValue::Float(self.rng.random_range(*low..=*high))
                }
                ParameterKind::Int { low, high } => {
                    ParameterValue::Int(self.rng.random_range(*low..=*high))
                }
                ParameterKind::Choice { values } => {
                    values[self.rng.random_range(0..values.len())].clone()
                }
            };
            params.insert(name.clone(), value);
        }

        params
    }
}

impl SearchStrategy for RandomSearch {
    fn suggest(&mut self, count: usize) -> Vec<ParameterSet> {
        (0..count).map(|_| self.sample_one()).collect()
    }

    fn name(&self) -> &str {
        "random"
    }
}
