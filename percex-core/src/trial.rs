use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::error::GenerationError;

/// Positions of the two bars the participant compares
pub const MARKED: [usize; 2] = [1, 2];

/// Values shown in one trial and the ground truth for the marked pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawTrialData")]
pub struct TrialData {
    values: Vec<u32>,
    marked: [usize; 2],
    true_percentage: u32,
}

/// Wire form of [`TrialData`]; decoding goes through `from_values` so the
/// derived fields can't disagree with the values.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrialData {
    values: Vec<u32>,
    marked: Option<[usize; 2]>,
    true_percentage: Option<u32>,
}

impl TryFrom<RawTrialData> for TrialData {
    type Error = GenerationError;

    fn try_from(raw: RawTrialData) -> Result<Self, Self::Error> {
        let trial = Self::from_values(raw.values)?;
        if let Some(found) = raw.marked.filter(|m| *m != trial.marked) {
            return Err(GenerationError::MarkedPositions {
                found,
                expected: trial.marked,
            });
        }
        if let Some(stated) = raw.true_percentage.filter(|p| *p != trial.true_percentage) {
            return Err(GenerationError::PercentageMismatch {
                stated,
                actual: trial.true_percentage,
            });
        }
        Ok(trial)
    }
}

impl TrialData {
    /// Builds trial data from already drawn values, marking positions 1 and 2.
    pub fn from_values(values: Vec<u32>) -> Result<Self, GenerationError> {
        if values.len() <= MARKED[1] {
            return Err(GenerationError::InvalidPointCount(values.len()));
        }
        for (i, v) in values.iter().enumerate() {
            if values[..i].contains(v) {
                return Err(GenerationError::DuplicateValue(*v));
            }
        }
        let true_percentage = true_percentage(values[MARKED[0]], values[MARKED[1]]);
        Ok(Self {
            values,
            marked: MARKED,
            true_percentage,
        })
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    pub fn marked(&self) -> [usize; 2] {
        self.marked
    }

    pub fn marked_values(&self) -> (u32, u32) {
        (self.values[self.marked[0]], self.values[self.marked[1]])
    }

    pub fn true_percentage(&self) -> u32 {
        self.true_percentage
    }

    pub fn is_marked(&self, index: usize) -> bool {
        self.marked.contains(&index)
    }
}

/// round(100 * smaller / larger), with halves rounded up.
///
/// Integer arithmetic keeps exact halves such as 3/8 = 37.5% stable.
pub fn true_percentage(a: u32, b: u32) -> u32 {
    let (smaller, larger) = (a.min(b) as u64, a.max(b) as u64);
    if larger == 0 {
        return 100;
    }
    ((200 * smaller + larger) / (2 * larger)) as u32
}

/// Error metrics for one response
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub raw_error: f64,
    pub log2_error: f64,
}

/// One slot in the shuffled session queue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialQueueEntry {
    pub condition_id: String,
    pub trial_index: usize,
}

/// Flattened result row, one per submitted response.
///
/// Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    pub participant_id: String,
    pub trial_number: usize,
    pub condition_id: String,
    pub condition_label: String,
    pub values: String,
    pub marked_a: usize,
    pub marked_b: usize,
    pub true_value_a: u32,
    pub true_value_b: u32,
    pub true_percentage: u32,
    pub response: f64,
    pub raw_error: f64,
    pub log2_error: f64,
    pub reaction_time_ms: u64,
    pub timestamp: String,
}

impl TrialRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        participant_id: &str,
        trial_number: usize,
        condition: &Condition,
        trial: &TrialData,
        response: f64,
        grade: Grade,
        reaction_time_ms: u64,
        timestamp: String,
    ) -> Self {
        let [marked_a, marked_b] = trial.marked();
        let (true_value_a, true_value_b) = trial.marked_values();
        Self {
            participant_id: participant_id.to_string(),
            trial_number,
            condition_id: condition.id.clone(),
            condition_label: condition.label.clone(),
            values: trial
                .values()
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(";"),
            marked_a,
            marked_b,
            true_value_a,
            true_value_b,
            true_percentage: trial.true_percentage(),
            response,
            raw_error: grade.raw_error,
            log2_error: grade.log2_error,
            reaction_time_ms,
            timestamp,
        }
    }

    /// Identity used for de-duplication in the store
    pub fn same_slot(&self, other: &TrialRecord) -> bool {
        self.participant_id == other.participant_id && self.trial_number == other.trial_number
    }
}
