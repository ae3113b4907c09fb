use serde_json::json;

mod test_support;

use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn import_settings_defaults_update_and_validation() {
    let workspace = temp_dir("rosterd-setup-import");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let before = request(&mut stdin, &mut reader, "0", "setup.get", json!({}));
    assert_eq!(error_code(&before), Some("no_workspace"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let initial = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "setup.get",
        json!({ "section": "import" }),
    );
    assert_eq!(
        initial
            .pointer("/import/defaultEnrollmentYear")
            .and_then(|v| v.as_str()),
        Some("2024-2025")
    );
    assert_eq!(
        initial
            .pointer("/import/defaultEmploymentType")
            .and_then(|v| v.as_str()),
        Some("full_time")
    );
    assert_eq!(
        initial.pointer("/import/batchSize").and_then(|v| v.as_i64()),
        Some(500)
    );
    assert_eq!(
        initial
            .pointer("/import/requireTeacherEmail")
            .and_then(|v| v.as_bool()),
        Some(true)
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({
            "section": "import",
            "patch": { "defaultEnrollmentYear": "2025-2026", "batchSize": 50 }
        }),
    );
    let updated = request_ok(&mut stdin, &mut reader, "4", "setup.get", json!({}));
    assert_eq!(
        updated
            .pointer("/import/defaultEnrollmentYear")
            .and_then(|v| v.as_str()),
        Some("2025-2026")
    );
    assert_eq!(
        updated.pointer("/import/batchSize").and_then(|v| v.as_i64()),
        Some(50)
    );

    let too_big = request(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "import", "patch": { "batchSize": 501, "maxReportedErrors": 5 } }),
    );
    assert_eq!(error_code(&too_big), Some("bad_params"));
    let unknown_field = request(
        &mut stdin,
        &mut reader,
        "6",
        "setup.update",
        json!({ "section": "import", "patch": { "colour": "blue" } }),
    );
    assert_eq!(error_code(&unknown_field), Some("bad_params"));
    let unknown_section = request(
        &mut stdin,
        &mut reader,
        "7",
        "setup.update",
        json!({ "section": "printer", "patch": {} }),
    );
    assert_eq!(error_code(&unknown_section), Some("bad_params"));

    let after = request_ok(&mut stdin, &mut reader, "8", "setup.get", json!({}));
    assert_eq!(
        after.pointer("/import/maxReportedErrors").and_then(|v| v.as_i64()),
        Some(10)
    );
    assert_eq!(
        after.pointer("/import/batchSize").and_then(|v| v.as_i64()),
        Some(50)
    );

    drop(stdin);
    let _ = child.wait();

    // Settings persist with the workspace.
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let reopened = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(
        reopened
            .pointer("/import/defaultEnrollmentYear")
            .and_then(|v| v.as_str()),
        Some("2025-2026")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
