use crate::condition::Condition;
use crate::error::{GenerationError, RenderError, StoreError};
use crate::screen::Screen;
use crate::trial::{Grade, TrialData, TrialRecord};

/// Produces fresh trial data
pub trait TrialGenerator {
    fn generate(&mut self, points: usize) -> Result<TrialData, GenerationError>;
}

/// Scores a response against a trial's ground truth
pub trait Grader {
    fn score(&self, trial: &TrialData, response: f64) -> Grade;
}

/// Durable, de-duplicating record log
pub trait RecordStore {
    /// Inserts the record, replacing any record for the same participant and trial number.
    fn save(&mut self, record: &TrialRecord) -> Result<(), StoreError>;
    /// Everything persisted so far; unreadable data counts as empty.
    fn get_all(&self) -> Vec<TrialRecord>;
    fn export_csv(&self, participant_id: Option<&str>) -> Result<String, StoreError>;
    fn clear_all(&mut self) -> Result<(), StoreError>;
}

/// Draws a trial under a condition's encoding
pub trait Visualization {
    fn render(&mut self, condition: &Condition, trial: &TrialData) -> Result<(), RenderError>;
    fn clear(&mut self);
}

/// The named UI regions the controller writes to
pub trait Presenter {
    fn show_screen(&mut self, screen: Screen);
    fn write_error(&mut self, text: &str);
    fn write_label(&mut self, text: &str);
    fn write_counter(&mut self, text: &str);
    fn clear_response(&mut self);
    fn write_export(&mut self, csv: &str);
}

/// Everything a front end provides to a running session
pub trait Frontend: Presenter + Visualization {}

impl<T: Presenter + Visualization> Frontend for T {}
