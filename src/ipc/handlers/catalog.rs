use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{CourseStore, YearLevelStore};
use serde_json::json;

fn required_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{} must not be empty", key),
            None,
        )),
        None => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let code = match required_str(req, "code") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let description = req
        .params
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    match store.create_course(code, name, description) {
        Ok(course) => ok(&req.id, json!({ "course": course })),
        Err(e) => store_err(&req.id, "db_insert_failed", &e),
    }
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match store.list_all() {
        Ok(courses) => ok(&req.id, json!({ "courses": courses })),
        Err(e) => store_err(&req.id, "db_query_failed", &e),
    }
}

fn handle_year_levels_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(level) = req.params.get("level").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "level must be integer", None);
    };

    match store.create_year_level(course_id, name, level) {
        Ok(Some(year_level)) => ok(&req.id, json!({ "yearLevel": year_level })),
        Ok(None) => err(
            &req.id,
            "not_found",
            "course not found",
            Some(json!({ "courseId": course_id })),
        ),
        Err(e) => store_err(&req.id, "db_insert_failed", &e),
    }
}

fn handle_year_levels_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store.list_by_course(course_id) {
        Ok(levels) => ok(&req.id, json!({ "yearLevels": levels })),
        Err(e) => store_err(&req.id, "db_query_failed", &e),
    }
}

fn handle_users_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let first_name = match required_str(req, "firstName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let last_name = match required_str(req, "lastName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let email = req.params.get("email").and_then(|v| v.as_str());
    let role = req
        .params
        .get("role")
        .and_then(|v| v.as_str())
        .unwrap_or("admin");

    match store.create_user(first_name, last_name, email, role) {
        Ok(user) => ok(&req.id, json!({ "user": user })),
        Err(e) => store_err(&req.id, "db_insert_failed", &e),
    }
}

fn handle_session_set_current_user(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store.set_current_user(user_id) {
        Ok(true) => ok(&req.id, json!({ "userId": user_id })),
        Ok(false) => err(
            &req.id,
            "not_found",
            "user not found",
            Some(json!({ "userId": user_id })),
        ),
        Err(e) => store_err(&req.id, "db_update_failed", &e),
    }
}

fn handle_pre_registered_students(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match store.list_students() {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => store_err(&req.id, "db_query_failed", &e),
    }
}

fn handle_pre_registered_teachers(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match store.list_teachers() {
        Ok(teachers) => ok(&req.id, json!({ "teachers": teachers })),
        Err(e) => store_err(&req.id, "db_query_failed", &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.list" => Some(handle_courses_list(state, req)),
        "yearLevels.create" => Some(handle_year_levels_create(state, req)),
        "yearLevels.list" => Some(handle_year_levels_list(state, req)),
        "users.create" => Some(handle_users_create(state, req)),
        "session.setCurrentUser" => Some(handle_session_set_current_user(state, req)),
        "preRegistered.students.list" => Some(handle_pre_registered_students(state, req)),
        "preRegistered.teachers.list" => Some(handle_pre_registered_teachers(state, req)),
        _ => None,
    }
}
