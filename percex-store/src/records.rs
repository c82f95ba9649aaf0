use percex_core::{RecordStore, StoreError, TrialRecord};
use tracing::{debug, warn};

use crate::backend::KeyValueBackend;
use crate::csv::to_csv;

/// Key the record array is stored under
pub const STORAGE_KEY: &str = "cm_experiment_records_v1";

/// Trial records kept as one JSON array in a key-value backend
#[derive(Debug)]
pub struct TrialStore<B: KeyValueBackend> {
    backend: B,
    key: String,
}

impl<B: KeyValueBackend> TrialStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_key(backend, STORAGE_KEY)
    }

    pub fn with_key(backend: B, key: &str) -> Self {
        Self {
            backend,
            key: key.to_string(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Reads the stored array. Unparseable data is dropped and reads as empty;
    /// backend failures are returned.
    fn load(&self) -> Result<Vec<TrialRecord>, StoreError> {
        let Some(text) = self.backend.get(&self.key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Option<Vec<TrialRecord>>>(&text) {
            Ok(records) => Ok(records.unwrap_or_default()),
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to parse stored records; resetting");
                if let Err(e) = self.backend.remove(&self.key) {
                    warn!(key = %self.key, error = %e, "failed to remove corrupt records");
                }
                Ok(Vec::new())
            }
        }
    }

    fn write(&self, records: &[TrialRecord]) -> Result<(), StoreError> {
        let text = serde_json::to_string(records)?;
        self.backend.set(&self.key, &text)
    }
}

impl<B: KeyValueBackend> RecordStore for TrialStore<B> {
    fn save(&mut self, record: &TrialRecord) -> Result<(), StoreError> {
        let mut records = self.load()?;
        match records.iter_mut().find(|r| r.same_slot(record)) {
            Some(existing) => {
                warn!(
                    participant = %record.participant_id,
                    trial = record.trial_number,
                    "duplicate record detected; overwriting"
                );
                *existing = record.clone();
            }
            None => records.push(record.clone()),
        }
        self.write(&records)?;
        debug!(total = records.len(), "records saved");
        Ok(())
    }

    fn get_all(&self) -> Vec<TrialRecord> {
        self.load().unwrap_or_else(|e| {
            warn!(key = %self.key, error = %e, "failed to read stored records");
            Vec::new()
        })
    }

    fn export_csv(&self, participant_id: Option<&str>) -> Result<String, StoreError> {
        let mut records = self.load()?;
        if let Some(pid) = participant_id {
            records.retain(|r| r.participant_id == pid);
        }
        Ok(to_csv(&records)?)
    }

    fn clear_all(&mut self) -> Result<(), StoreError> {
        self.backend.remove(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::unique_dir;
    use crate::backend::{FileBackend, MemoryBackend};
    use crate::csv::tests::parse;
    use percex_core::{Condition, Encoding, Grade, TrialData};
    use proptest::prelude::*;

    fn record(pid: &str, trial_number: usize, response: f64, label: &str) -> TrialRecord {
        let condition = Condition::new("bw", label, "", Encoding::Bw);
        let trial = TrialData::from_values(vec![10, 50, 60, 5, 80]).unwrap();
        let raw_error = (83.0 - response).abs();
        TrialRecord::assemble(
            pid,
            trial_number,
            &condition,
            &trial,
            response,
            Grade {
                raw_error,
                log2_error: if raw_error == 0.0 { 0.0 } else { (raw_error + 0.125).log2() },
            },
            900,
            "2026-10-16T09:30:05.123Z".to_string(),
        )
    }

    #[test]
    fn save_upserts_on_participant_and_trial_number() {
        let mut store = TrialStore::new(MemoryBackend::new());
        store.save(&record("P001", 1, 50.0, "B&W")).unwrap();
        store.save(&record("P001", 2, 60.0, "B&W")).unwrap();
        store.save(&record("P002", 1, 70.0, "B&W")).unwrap();
        store.save(&record("P001", 1, 83.0, "B&W")).unwrap();

        let all = store.get_all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].participant_id, "P001");
        assert_eq!(all[0].trial_number, 1);
        assert_eq!(all[0].response, 83.0);
        assert_eq!(all[0].raw_error, 0.0);
    }

    #[test]
    fn corrupt_data_reads_as_empty_and_is_discarded() {
        let backend = MemoryBackend::new();
        backend.set(STORAGE_KEY, "{not json").unwrap();
        let mut store = TrialStore::new(backend);
        assert!(store.get_all().is_empty());
        assert_eq!(store.backend().get(STORAGE_KEY).unwrap(), None);

        store.save(&record("P001", 1, 50.0, "B&W")).unwrap();
        assert_eq!(store.get_all().len(), 1);
    }

    #[test]
    fn stored_null_reads_as_empty() {
        let backend = MemoryBackend::new();
        backend.set(STORAGE_KEY, "null").unwrap();
        let store = TrialStore::new(backend);
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn export_of_empty_store_is_empty() {
        let store = TrialStore::new(MemoryBackend::new());
        assert_eq!(store.export_csv(None).unwrap(), "");
        assert_eq!(store.export_csv(Some("P001")).unwrap(), "");
    }

    #[test]
    fn export_has_header_plus_one_line_per_record() {
        let mut store = TrialStore::new(MemoryBackend::new());
        for n in 1..=4 {
            store.save(&record("P001", n, 70.0, "B&W")).unwrap();
        }
        store.save(&record("P002", 1, 70.0, "B&W")).unwrap();

        let csv = store.export_csv(None).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(
            lines[0],
            "participantId,trialNumber,conditionId,conditionLabel,values,markedA,markedB,\
             trueValueA,trueValueB,truePercentage,response,rawError,log2Error,reactionTimeMs,timestamp"
        );
        assert_eq!(
            lines[1],
            format!(
                "P001,1,bw,B&W,10;50;60;5;80,1,2,50,60,83,70,13,{},900,2026-10-16T09:30:05.123Z",
                13.125f64.log2()
            )
        );

        let only_p2 = store.export_csv(Some("P002")).unwrap();
        assert_eq!(only_p2.lines().count(), 2);
    }

    #[test]
    fn clear_all_removes_everything() {
        let mut store = TrialStore::new(MemoryBackend::new());
        store.save(&record("P001", 1, 70.0, "B&W")).unwrap();
        store.clear_all().unwrap();
        assert!(store.get_all().is_empty());
        assert_eq!(store.export_csv(None).unwrap(), "");
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = unique_dir("records");
        {
            let mut store = TrialStore::new(FileBackend::open(&dir).unwrap());
            store.save(&record("P001", 1, 70.0, "B&W")).unwrap();
            store.save(&record("P001", 2, 40.0, "B&W")).unwrap();
        }
        let store = TrialStore::new(FileBackend::open(&dir).unwrap());
        let all = store.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].response, 40.0);
        assert!(dir.join(format!("{STORAGE_KEY}.json")).exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    proptest! {
        #[test]
        fn exported_fields_parse_back(label in "[a-zA-Z ,\"\n;]{0,12}", pid in "[A-Za-z0-9,\"]{1,6}") {
            let mut store = TrialStore::new(MemoryBackend::new());
            store.save(&record(&pid, 1, 70.0, &label)).unwrap();
            store.save(&record(&pid, 2, 83.0, &label)).unwrap();

            let rows = parse(&store.export_csv(None).unwrap());
            prop_assert_eq!(rows.len(), 3);
            prop_assert_eq!(rows[0].len(), 15);
            for row in &rows[1..] {
                prop_assert_eq!(row.len(), 15);
                prop_assert_eq!(&row[0], &pid);
                prop_assert_eq!(&row[3], &label);
                prop_assert_eq!(&row[4], "10;50;60;5;80");
            }
            prop_assert_eq!(&rows[1][1], "1");
            prop_assert_eq!(&rows[2][12], "0");
        }

        #[test]
        fn repeated_saves_keep_one_record_per_slot(responses in prop::collection::vec(0.0f64..=100.0, 1..8)) {
            let mut store = TrialStore::new(MemoryBackend::new());
            for r in &responses {
                store.save(&record("P001", 7, *r, "B&W")).unwrap();
            }
            let all = store.get_all();
            prop_assert_eq!(all.len(), 1);
            prop_assert_eq!(all[0].response, *responses.last().unwrap());
        }
    }
}
