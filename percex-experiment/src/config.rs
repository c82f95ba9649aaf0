use std::collections::HashSet;

use percex_core::{Condition, ExperimentError};
use serde::{Deserialize, Serialize};

/// Closed range values are drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueRange {
    pub lower: u32,
    pub upper: u32,
}

impl ValueRange {
    pub fn len(&self) -> usize {
        if self.upper < self.lower {
            0
        } else {
            (self.upper - self.lower) as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, value: u32) -> bool {
        (self.lower..=self.upper).contains(&value)
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self { lower: 2, upper: 99 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default = "ExperimentConfig::default_points_per_trial")]
    pub points_per_trial: usize,
    #[serde(default = "ExperimentConfig::default_trials_per_condition")]
    pub trials_per_condition: usize,
    #[serde(default)]
    pub value_range: ValueRange,
    /// Minimum distance between the two marked values; off when unset
    #[serde(default)]
    pub min_marked_gap: Option<u32>,
    #[serde(default = "ExperimentConfig::default_max_draws")]
    pub max_draws: usize,
    #[serde(default = "Condition::standard_set")]
    pub conditions: Vec<Condition>,
}

impl ExperimentConfig {
    fn default_points_per_trial() -> usize {
        5
    }
    fn default_trials_per_condition() -> usize {
        20
    }
    fn default_max_draws() -> usize {
        10_000
    }

    pub fn total_trials(&self) -> usize {
        self.conditions.len() * self.trials_per_condition
    }

    pub fn condition(&self, id: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.id == id)
    }

    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.conditions.is_empty() {
            return Err(ExperimentError::Config("no conditions configured".into()));
        }
        let mut seen = HashSet::new();
        for condition in &self.conditions {
            if !seen.insert(condition.id.as_str()) {
                return Err(ExperimentError::Config(format!(
                    "duplicate condition id {:?}",
                    condition.id
                )));
            }
        }
        if self.trials_per_condition == 0 {
            return Err(ExperimentError::Config(
                "trials_per_condition must be at least 1".into(),
            ));
        }
        if self.points_per_trial < 3 {
            return Err(ExperimentError::Config(format!(
                "points_per_trial must be at least 3, got {}",
                self.points_per_trial
            )));
        }
        if self.value_range.lower >= self.value_range.upper {
            return Err(ExperimentError::Config(format!(
                "value range [{}, {}] is empty",
                self.value_range.lower, self.value_range.upper
            )));
        }
        if self.value_range.lower == 0 {
            return Err(ExperimentError::Config(
                "value range must exclude 0, the percentage divides by the larger value".into(),
            ));
        }
        if self.points_per_trial > self.value_range.len() {
            return Err(ExperimentError::Config(format!(
                "cannot draw {} distinct values from [{}, {}]",
                self.points_per_trial, self.value_range.lower, self.value_range.upper
            )));
        }
        if self.max_draws == 0 {
            return Err(ExperimentError::Config("max_draws must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            points_per_trial: Self::default_points_per_trial(),
            trials_per_condition: Self::default_trials_per_condition(),
            value_range: ValueRange::default(),
            min_marked_gap: None,
            max_draws: Self::default_max_draws(),
            conditions: Condition::standard_set(),
        }
    }
}
