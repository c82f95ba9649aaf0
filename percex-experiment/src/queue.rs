use percex_core::{Condition, TrialQueueEntry};
use rand::Rng;
use rand::seq::SliceRandom;

/// Every condition `trials_per_condition` times, in one shuffled order.
pub fn build_trial_queue<R: Rng + ?Sized>(
    conditions: &[Condition],
    trials_per_condition: usize,
    rng: &mut R,
) -> Vec<TrialQueueEntry> {
    let mut queue: Vec<TrialQueueEntry> = conditions
        .iter()
        .flat_map(|condition| {
            (0..trials_per_condition).map(|trial_index| TrialQueueEntry {
                condition_id: condition.id.clone(),
                trial_index,
            })
        })
        .collect();
    queue.shuffle(rng);
    queue
}
