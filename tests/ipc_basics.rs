mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn health_reports_version_and_no_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));
}

#[test]
fn unknown_method_and_missing_params_are_errors() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(&mut stdin, &mut reader, "1", "nope.nothing", json!({}));
    assert_eq!(error_code(&resp), Some("not_implemented"));

    let resp = request(&mut stdin, &mut reader, "2", "workspace.select", json!({}));
    assert_eq!(error_code(&resp), Some("bad_params"));
}

#[test]
fn mutations_need_a_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "classes.create",
        json!({ "name": "7A", "students": [{ "firstName": "Ada", "lastName": "Lovelace" }] }),
    );
    assert_eq!(error_code(&resp), Some("no_workspace"));

    let listed = request_ok(&mut stdin, &mut reader, "2", "classes.list", json!({}));
    assert_eq!(listed["classes"].as_array().map(|a| a.len()), Some(0));
}

#[test]
fn validation_failures_use_stable_codes() {
    let workspace = temp_dir();
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({ "name": "   ", "students": [{ "firstName": "Ada", "lastName": "Lovelace" }] }),
    );
    assert_eq!(error_code(&resp), Some("validation_failed"));

    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "classes.create",
        json!({ "name": "7A" }),
    );
    assert_eq!(error_code(&resp), Some("validation_failed"));

    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "classes.open",
        json!({ "classId": "missing" }),
    );
    assert_eq!(error_code(&resp), Some("not_found"));

    let resp = request(
        &mut stdin,
        &mut reader,
        "5",
        "writer.save",
        json!({}),
    );
    assert_eq!(error_code(&resp), Some("no_session"));
}
