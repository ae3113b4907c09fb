use crate::config::{self, IMPORT_SECTION_KEY};
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

#[derive(Clone, Copy)]
enum SetupSection {
    Import,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "import" => Some(Self::Import),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Import => IMPORT_SECTION_KEY,
        }
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) {
        if SetupSection::parse(section_raw).is_none() {
            return err(&req.id, "bad_params", "unknown section", None);
        }
    }
    let import = match store.settings_section(SetupSection::Import.key()) {
        Ok(saved) => config::merged_section(saved.as_ref()),
        Err(e) => return store_err(&req.id, "db_query_failed", &e),
    };

    ok(&req.id, json!({ "import": import }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match store.settings_section(section.key()) {
        Ok(saved) => config::merged_section(saved.as_ref()),
        Err(e) => return store_err(&req.id, "db_query_failed", &e),
    };
    if let Err(msg) = config::merge_import_patch(&mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = store.save_settings_section(section.key(), &current) {
        return store_err(&req.id, "db_update_failed", &e);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
