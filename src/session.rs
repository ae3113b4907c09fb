//! The observable two-phase import session: parse a file for review, then
//! import the reviewed candidates on confirmation.
//!
//! State sits behind a mutex that is only held to read or swap fields. Decode,
//! reference lookups and the bulk write all run unlocked, so observers see the
//! in-flight phase and a competing caller gets [`SessionError::Busy`].

use std::fmt;
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ImportSettings;
use crate::importer::{self, ImportError};
use crate::model::{ImportCandidate, ImportKind, ImportResult, RowIssue};
use crate::normalize::{self, ReferenceSources};
use crate::store::BulkWriteStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    Parsing,
    Reviewing,
    Importing,
    Completed,
}

impl Phase {
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Parsing | Self::Importing)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Parsing => "parsing",
            Self::Reviewing => "reviewing",
            Self::Importing => "importing",
            Self::Completed => "completed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session is busy ({0})")]
    Busy(Phase),

    #[error("cannot {action} while {phase}")]
    InvalidTransition { phase: Phase, action: &'static str },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub phase: Phase,
    pub error: Option<String>,
    pub success_message: Option<String>,
    pub file_name: Option<String>,
    pub rows_total: usize,
    pub parsed_candidates: Vec<ImportCandidate>,
    pub skipped_rows: Vec<RowIssue>,
    pub import_result: Option<ImportResult>,
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Parsing
    }

    pub fn is_importing(&self) -> bool {
        self.phase == Phase::Importing
    }
}

#[derive(Debug, Clone)]
pub struct ImportSession {
    kind: ImportKind,
    inner: Arc<Mutex<SessionState>>,
}

impl ImportSession {
    pub fn new(kind: ImportKind) -> Self {
        Self {
            kind,
            inner: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    pub fn kind(&self) -> ImportKind {
        self.kind
    }

    // Every mutation leaves the state whole, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        self.lock().clone()
    }

    /// Decode and normalize a file, replacing whatever was under review.
    ///
    /// Rejected with `Busy` while a parse or import is running; the reader is
    /// dropped unread in that case.
    pub fn start_parse<R: Read>(
        &self,
        reader: R,
        file_name: &str,
        sources: ReferenceSources<'_>,
        settings: &ImportSettings,
    ) -> Result<SessionState, SessionError> {
        {
            let mut state = self.lock();
            if state.phase.is_busy() {
                return Err(SessionError::Busy(state.phase));
            }
            *state = SessionState {
                phase: Phase::Parsing,
                file_name: Some(file_name.to_string()),
                ..SessionState::default()
            };
        }
        info!(kind = self.kind.plural(), file_name, "parse started");

        let outcome = normalize::parse_file(reader, file_name, self.kind, sources, settings);

        let mut state = self.lock();
        state.phase = Phase::Reviewing;
        match outcome {
            Ok(outcome) => {
                state.error = outcome.extraction_error(self.kind, settings.max_reported_errors);
                state.rows_total = outcome.rows_total;
                state.parsed_candidates = outcome.candidates;
                state.skipped_rows = outcome.skipped;
            }
            Err(e) => {
                warn!(kind = self.kind.plural(), file_name, error = %e, "parse failed");
                state.error = Some(e.to_string());
            }
        }
        Ok(state.clone())
    }

    /// Write the reviewed candidates through `store`.
    pub fn confirm_import(
        &self,
        store: &dyn BulkWriteStore,
        settings: &ImportSettings,
    ) -> Result<SessionState, SessionError> {
        let candidates = {
            let mut state = self.lock();
            if state.phase.is_busy() {
                return Err(SessionError::Busy(state.phase));
            }
            if state.parsed_candidates.is_empty() {
                state.error = Some(ImportError::NoRecordsToImport(self.kind).to_string());
                return Ok(state.clone());
            }
            if state.phase != Phase::Reviewing {
                return Err(SessionError::InvalidTransition {
                    phase: state.phase,
                    action: "import",
                });
            }
            state.phase = Phase::Importing;
            state.error = None;
            state.import_result = None;
            state.success_message = None;
            state.parsed_candidates.clone()
        };

        let outcome =
            importer::import_batch(store, self.kind, &candidates, settings.batch_size);

        let mut state = self.lock();
        state.phase = Phase::Completed;
        match outcome {
            Ok(summary) => {
                state.success_message = Some(summary.message);
                state.import_result = Some(summary.result);
            }
            Err(e) => {
                warn!(kind = self.kind.plural(), error = %e, "import failed");
                state.error = Some(e.to_string());
            }
        }
        Ok(state.clone())
    }

    /// Completed back to Idle. A no-op when already Idle.
    pub fn acknowledge(&self) -> Result<SessionState, SessionError> {
        let mut state = self.lock();
        let phase = state.phase;
        match phase {
            Phase::Completed => *state = SessionState::default(),
            Phase::Idle => {}
            phase if phase.is_busy() => return Err(SessionError::Busy(phase)),
            phase => {
                return Err(SessionError::InvalidTransition {
                    phase,
                    action: "acknowledge",
                })
            }
        }
        Ok(state.clone())
    }

    pub fn set_error(&self, message: impl Into<String>) -> SessionState {
        let mut state = self.lock();
        state.error = Some(message.into());
        state.clone()
    }

    pub fn clear_error(&self) -> SessionState {
        let mut state = self.lock();
        state.error = None;
        state.clone()
    }
}
