pub mod collaborators;
pub mod condition;
pub mod error;
pub mod screen;
pub mod trial;

pub use collaborators::{Frontend, Grader, Presenter, RecordStore, TrialGenerator, Visualization};
pub use condition::{Condition, Encoding};
pub use error::{ExperimentError, GenerationError, RenderError, StoreError, ValidationError};
pub use screen::Screen;
pub use trial::{Grade, MARKED, TrialData, TrialQueueEntry, TrialRecord, true_percentage};
