pub mod clock;
pub mod timer;

pub use clock::{file_stamp, iso_timestamp};
pub use timer::{FrameStats, HighPrecisionTimer, ManualTimer, Timer};
