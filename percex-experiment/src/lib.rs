pub mod config;
pub mod generator;
pub mod grading;
pub mod queue;
pub mod state;
pub mod summary;

pub use config::{ExperimentConfig, ValueRange};
pub use generator::{RandomTrialGenerator, RngSource, ValueSource};
pub use grading::{CmErrorGrader, score};
pub use queue::build_trial_queue;
pub use state::{Command, ExperimentBuilder, ExperimentController, ExperimentState};
pub use summary::{ConditionSummary, summarize};
