use std::fmt;

use percex_core::{Condition, TrialRecord};
use serde::Serialize;

/// Per-condition error and timing averages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionSummary {
    pub condition_id: String,
    pub condition_label: String,
    pub trials: usize,
    pub mean_raw_error: f64,
    pub mean_log2_error: f64,
    pub mean_reaction_time_ms: f64,
}

impl fmt::Display for ConditionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} trials, raw error {:.2}, log2 error {:.3}, RT {:.0} ms",
            self.condition_label,
            self.trials,
            self.mean_raw_error,
            self.mean_log2_error,
            self.mean_reaction_time_ms
        )
    }
}

/// Summaries in configured condition order; conditions without results are left out.
pub fn summarize(conditions: &[Condition], results: &[TrialRecord]) -> Vec<ConditionSummary> {
    conditions
        .iter()
        .filter_map(|condition| {
            let rows: Vec<&TrialRecord> = results
                .iter()
                .filter(|r| r.condition_id == condition.id)
                .collect();
            if rows.is_empty() {
                return None;
            }
            let n = rows.len() as f64;
            Some(ConditionSummary {
                condition_id: condition.id.clone(),
                condition_label: condition.label.clone(),
                trials: rows.len(),
                mean_raw_error: rows.iter().map(|r| r.raw_error).sum::<f64>() / n,
                mean_log2_error: rows.iter().map(|r| r.log2_error).sum::<f64>() / n,
                mean_reaction_time_ms: rows.iter().map(|r| r.reaction_time_ms as f64).sum::<f64>()
                    / n,
            })
        })
        .collect()
}
