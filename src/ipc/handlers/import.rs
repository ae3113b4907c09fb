use crate::ipc::error::{err, ok, session_err, store_err};
use crate::ipc::types::{AppState, Request};
use crate::model::ImportKind;
use crate::normalize::ReferenceSources;
use crate::session::{ImportSession, SessionState};
use serde_json::{json, Value};
use std::fs::File;
use std::path::Path;
use tracing::warn;

#[derive(Clone, Copy)]
enum Action {
    Parse,
    State,
    Confirm,
    Acknowledge,
    ClearError,
    SetError,
}

impl Action {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "parse" => Some(Self::Parse),
            "state" => Some(Self::State),
            "confirm" => Some(Self::Confirm),
            "acknowledge" => Some(Self::Acknowledge),
            "clearError" => Some(Self::ClearError),
            "setError" => Some(Self::SetError),
            _ => None,
        }
    }
}

/// `import.<kind>.<action>`
fn route(method: &str) -> Option<(ImportKind, Action)> {
    let rest = method.strip_prefix("import.")?;
    let (kind, action) = rest.split_once('.')?;
    Some((ImportKind::parse(kind)?, Action::parse(action)?))
}

fn state_json(kind: ImportKind, state: &SessionState) -> Value {
    let mut v = serde_json::to_value(state).unwrap_or_else(|_| json!({}));
    v["kind"] = json!(kind);
    v["isLoading"] = json!(state.is_loading());
    v["isImporting"] = json!(state.is_importing());
    v
}

fn handle_parse(state: &AppState, session: &ImportSession, req: &Request) -> Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(in_path) = req.params.get("inPath").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };
    let file_name = req
        .params
        .get("fileName")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| {
            Path::new(in_path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
        })
        .unwrap_or_default();

    let settings = match store.import_settings() {
        Ok(s) => s,
        Err(e) => return store_err(&req.id, "db_query_failed", &e),
    };
    let file = match File::open(in_path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = in_path, error = %e, "cannot open import file");
            return err(
                &req.id,
                "io_failed",
                format!("Error reading file: {e}"),
                Some(json!({ "path": in_path })),
            );
        }
    };
    let sources = ReferenceSources {
        courses: store,
        year_levels: store,
        users: store,
    };

    match session.start_parse(file, &file_name, sources, &settings) {
        Ok(s) => ok(&req.id, state_json(session.kind(), &s)),
        Err(e) => session_err(&req.id, &e),
    }
}

fn handle_confirm(state: &AppState, session: &ImportSession, req: &Request) -> Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let settings = match store.import_settings() {
        Ok(s) => s,
        Err(e) => return store_err(&req.id, "db_query_failed", &e),
    };
    match session.confirm_import(store, &settings) {
        Ok(s) => ok(&req.id, state_json(session.kind(), &s)),
        Err(e) => session_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (kind, action) = route(&req.method)?;
    let session = state.session(kind);
    let resp = match action {
        Action::Parse => handle_parse(state, session, req),
        Action::Confirm => handle_confirm(state, session, req),
        Action::State => ok(&req.id, state_json(kind, &session.state())),
        Action::Acknowledge => match session.acknowledge() {
            Ok(s) => ok(&req.id, state_json(kind, &s)),
            Err(e) => session_err(&req.id, &e),
        },
        Action::ClearError => ok(&req.id, state_json(kind, &session.clear_error())),
        Action::SetError => match req.params.get("message").and_then(|v| v.as_str()) {
            Some(message) => ok(&req.id, state_json(kind, &session.set_error(message))),
            None => err(&req.id, "bad_params", "missing message", None),
        },
    };
    Some(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_route_by_kind_and_action() {
        assert!(matches!(
            route("import.students.parse"),
            Some((ImportKind::Students, Action::Parse))
        ));
        assert!(matches!(
            route("import.teachers.clearError"),
            Some((ImportKind::Teachers, Action::ClearError))
        ));
        assert!(route("import.parents.parse").is_none());
        assert!(route("import.students.delete").is_none());
        assert!(route("students.import").is_none());
    }
}
