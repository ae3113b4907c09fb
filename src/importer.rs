use tracing::{debug, info};

use crate::model::{ImportCandidate, ImportKind, ImportResult, StudentCandidate, TeacherCandidate};
use crate::store::{BulkWriteStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("No {} to import", .0.plural())]
    NoRecordsToImport(ImportKind),

    #[error("cannot import {found} records in a {expected} import")]
    MixedBatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub result: ImportResult,
    pub message: String,
}

/// "Successfully imported N student(s)!" when nothing failed, otherwise
/// "Imported S student(s). F failed."
pub fn summary_message(kind: ImportKind, result: &ImportResult) -> String {
    let noun = kind.noun();
    if result.failure_count == 0 {
        format!("Successfully imported {} {}(s)!", result.success_count, noun)
    } else {
        format!(
            "Imported {} {}(s). {} failed.",
            result.success_count, noun, result.failure_count
        )
    }
}

/// Persist a reviewed candidate list in one bulk write.
///
/// An empty list fails before the store is touched. Store failures are
/// returned as-is; nothing is retried.
pub fn import_batch(
    store: &dyn BulkWriteStore,
    kind: ImportKind,
    candidates: &[ImportCandidate],
    batch_size: usize,
) -> Result<ImportSummary, ImportError> {
    if candidates.is_empty() {
        return Err(ImportError::NoRecordsToImport(kind));
    }
    let mixed = |c: &ImportCandidate| ImportError::MixedBatch {
        expected: kind.plural(),
        found: c.kind().plural(),
    };

    let result = match kind {
        ImportKind::Students => {
            let students = candidates
                .iter()
                .map(|c| c.as_student().cloned().ok_or_else(|| mixed(c)))
                .collect::<Result<Vec<StudentCandidate>, _>>()?;
            store.write_students(&students, batch_size)?
        }
        ImportKind::Teachers => {
            let teachers = candidates
                .iter()
                .map(|c| c.as_teacher().cloned().ok_or_else(|| mixed(c)))
                .collect::<Result<Vec<TeacherCandidate>, _>>()?;
            store.write_teachers(&teachers, batch_size)?
        }
    };

    let message = summary_message(kind, &result);
    info!(
        kind = kind.plural(),
        total = result.total_processed(),
        success = result.success_count,
        failed = result.failure_count,
        "import finished"
    );
    if result.has_errors() {
        debug!(errors = ?result.errors, "per-record import failures");
    }
    Ok(ImportSummary { result, message })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store;
    use crate::store::tests::{student, teacher};
    use crate::store::SqliteStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records calls and returns a canned result.
    #[derive(Default)]
    pub(crate) struct CountingStore {
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl BulkWriteStore for CountingStore {
        fn write_students(
            &self,
            students: &[StudentCandidate],
            _batch_size: usize,
        ) -> store::Result<ImportResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoreError::LockPoisoned);
            }
            Ok(ImportResult {
                success_count: students.len(),
                ..ImportResult::default()
            })
        }

        fn write_teachers(
            &self,
            teachers: &[TeacherCandidate],
            _batch_size: usize,
        ) -> store::Result<ImportResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ImportResult {
                success_count: teachers.len(),
                ..ImportResult::default()
            })
        }
    }

    fn result(success: usize, failure: usize) -> ImportResult {
        ImportResult {
            success_count: success,
            failure_count: failure,
            errors: Vec::new(),
        }
    }

    #[test]
    fn summary_reflects_counts() {
        assert_eq!(
            summary_message(ImportKind::Students, &result(5, 0)),
            "Successfully imported 5 student(s)!"
        );
        assert_eq!(
            summary_message(ImportKind::Students, &result(3, 2)),
            "Imported 3 student(s). 2 failed."
        );
        assert_eq!(
            summary_message(ImportKind::Teachers, &result(0, 1)),
            "Imported 0 teacher(s). 1 failed."
        );
    }

    #[test]
    fn empty_batch_never_reaches_store() {
        let store = CountingStore::default();
        let err = import_batch(&store, ImportKind::Students, &[], 500).unwrap_err();
        assert_eq!(err.to_string(), "No students to import");
        let err = import_batch(&store, ImportKind::Teachers, &[], 500).unwrap_err();
        assert_eq!(err.to_string(), "No teachers to import");
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn store_errors_surface_verbatim() {
        let store = CountingStore {
            fail: true,
            ..CountingStore::default()
        };
        let batch = [ImportCandidate::Student(student("S-1"))];
        let err = import_batch(&store, ImportKind::Students, &batch, 500).unwrap_err();
        assert_eq!(err.to_string(), "store lock poisoned");
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn mixed_batches_are_rejected() {
        let store = CountingStore::default();
        let batch = [
            ImportCandidate::Student(student("S-1")),
            ImportCandidate::Teacher(teacher("T-1")),
        ];
        let err = import_batch(&store, ImportKind::Students, &batch, 500).unwrap_err();
        assert!(matches!(err, ImportError::MixedBatch { .. }));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn duplicates_within_file_count_as_failures() {
        let store = SqliteStore::in_memory().expect("store");
        let batch = ["S-1", "S-2", "S-1", "S-3", "S-4"]
            .into_iter()
            .map(|id| ImportCandidate::Student(student(id)))
            .collect::<Vec<_>>();
        let summary = import_batch(&store, ImportKind::Students, &batch, 2).expect("import");
        assert_eq!(summary.result.success_count, 4);
        assert_eq!(summary.result.failure_count, 1);
        assert_eq!(summary.result.errors, vec!["Duplicate student ID: S-1"]);
        assert_eq!(summary.message, "Imported 4 student(s). 1 failed.");
    }
}
