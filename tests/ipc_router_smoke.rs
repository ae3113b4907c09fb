use serde_json::json;

mod test_support;

use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("rosterd-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    let missing = request(&mut stdin, &mut reader, "2", "workspace.select", json!({}));
    assert_eq!(error_code(&missing), Some("bad_params"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let health = request_ok(&mut stdin, &mut reader, "4", "health", json!({}));
    assert!(health.get("workspacePath").and_then(|v| v.as_str()).is_some());

    let _ = request_ok(&mut stdin, &mut reader, "5", "setup.get", json!({}));
    let course = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "courses.create",
        json!({ "code": "IT", "name": "Information Technology" }),
    );
    let course_id = course
        .pointer("/course/id")
        .and_then(|v| v.as_str())
        .expect("course id")
        .to_string();
    let courses = request_ok(&mut stdin, &mut reader, "7", "courses.list", json!({}));
    assert_eq!(
        courses
            .get("courses")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "yearLevels.create",
        json!({ "courseId": course_id, "name": "2nd Year", "level": 2 }),
    );
    let levels = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "yearLevels.list",
        json!({ "courseId": course_id }),
    );
    assert_eq!(
        levels.pointer("/yearLevels/0/level").and_then(|v| v.as_i64()),
        Some(2)
    );
    let orphan = request(
        &mut stdin,
        &mut reader,
        "10",
        "yearLevels.create",
        json!({ "courseId": "missing", "name": "1st Year", "level": 1 }),
    );
    assert_eq!(error_code(&orphan), Some("not_found"));

    let no_user = request(
        &mut stdin,
        &mut reader,
        "11",
        "session.setCurrentUser",
        json!({ "userId": "ghost" }),
    );
    assert_eq!(error_code(&no_user), Some("not_found"));

    let blank = request(
        &mut stdin,
        &mut reader,
        "12",
        "courses.create",
        json!({ "code": " ", "name": "Nothing" }),
    );
    assert_eq!(error_code(&blank), Some("bad_params"));

    for (i, method) in [
        "import.students.state",
        "import.teachers.state",
        "preRegistered.students.list",
        "preRegistered.teachers.list",
    ]
    .iter()
    .enumerate()
    {
        let _ = request_ok(&mut stdin, &mut reader, &format!("s{i}"), method, json!({}));
    }

    let unknown = request(&mut stdin, &mut reader, "13", "classes.list", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));
    let unknown_action = request(&mut stdin, &mut reader, "14", "import.students.delete", json!({}));
    assert_eq!(error_code(&unknown_action), Some("not_implemented"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
