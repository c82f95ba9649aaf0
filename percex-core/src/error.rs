use thiserror::Error;

use crate::screen::Screen;

/// Input rejected before any state changes
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Please enter a participant ID before starting.")]
    EmptyParticipantId,
    #[error("Please enter a number between 0 and 100.")]
    NotANumber(String),
    #[error("Please enter a number between 0 and 100.")]
    OutOfRange(f64),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("a trial needs at least 3 values to mark positions 1 and 2, got {0}")]
    InvalidPointCount(usize),
    #[error("value {0} appears more than once")]
    DuplicateValue(u32),
    #[error("value range [{lower}, {upper}] is empty")]
    EmptyRange { lower: u32, upper: u32 },
    #[error("cannot draw {requested} distinct values from a range of {available}")]
    RangeTooSmall { requested: usize, available: usize },
    #[error("no value in range is at least {gap} away from {anchor}")]
    UnsatisfiableGap { anchor: u32, gap: u32 },
    #[error("gave up after {draws} draws")]
    Exhausted { draws: usize },
    #[error("marked positions {found:?} differ from {expected:?}")]
    MarkedPositions { found: [usize; 2], expected: [usize; 2] },
    #[error("stated true percentage {stated} does not match the values ({actual})")]
    PercentageMismatch { stated: u32, actual: u32 },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode records: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("no records to export")]
    NoData,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("invalid canvas size {width}x{height}")]
    Canvas { width: u32, height: u32 },
    #[error("invalid geometry: {0}")]
    Geometry(String),
}

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("command not valid on {0:?} screen")]
    InvalidState(Screen),
    #[error("unknown condition id {0:?}")]
    UnknownCondition(String),
    #[error("trial generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExperimentError {
    /// Errors the participant can fix by correcting their input
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ExperimentError::Validation(_))
    }
}
