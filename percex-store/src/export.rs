use std::fs;
use std::path::{Path, PathBuf};

use percex_core::{RecordStore, StoreError};
use percex_timing::file_stamp;
use time::OffsetDateTime;
use tracing::{info, warn};

/// `experiment_<participant|all>_<stamp>.csv`
pub fn csv_file_name(participant_id: Option<&str>, at: OffsetDateTime) -> String {
    let who = match participant_id {
        Some(pid) => pid
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect(),
        None => "all".to_string(),
    };
    format!("experiment_{}_{}.csv", who, file_stamp(at))
}

/// Writes the export for one participant (or everyone) into `dir`.
pub fn write_csv_file(
    store: &dyn RecordStore,
    participant_id: Option<&str>,
    dir: &Path,
    at: OffsetDateTime,
) -> Result<PathBuf, StoreError> {
    let csv = store.export_csv(participant_id)?;
    if csv.is_empty() {
        warn!(participant = participant_id.unwrap_or("all"), "no data to export");
        return Err(StoreError::NoData);
    }
    fs::create_dir_all(dir)?;
    let path = dir.join(csv_file_name(participant_id, at));
    fs::write(&path, csv)?;
    info!(path = %path.display(), "exported CSV");
    Ok(path)
}
