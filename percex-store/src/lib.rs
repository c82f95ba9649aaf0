pub mod backend;
pub mod csv;
pub mod export;
pub mod records;

pub use backend::{FileBackend, KeyValueBackend, MemoryBackend};
pub use export::{csv_file_name, write_csv_file};
pub use records::{STORAGE_KEY, TrialStore};
