use std::path::PathBuf;

use serde::Deserialize;

use crate::model::ImportKind;
use crate::session::ImportSession;
use crate::store::SqliteStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<SqliteStore>,
    pub students: ImportSession,
    pub teachers: ImportSession,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            store: None,
            students: ImportSession::new(ImportKind::Students),
            teachers: ImportSession::new(ImportKind::Teachers),
        }
    }

    pub fn session(&self, kind: ImportKind) -> &ImportSession {
        match kind {
            ImportKind::Students => &self.students,
            ImportKind::Teachers => &self.teachers,
        }
    }

    /// Sessions hold candidates resolved against one workspace's catalog;
    /// switching workspaces starts them over.
    pub fn reset_sessions(&mut self) {
        self.students = ImportSession::new(ImportKind::Students);
        self.teachers = ImportSession::new(ImportKind::Teachers);
    }
}
