#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub fn temp_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("reportwriter-test-")
        .tempdir()
        .expect("create temp dir")
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_reportwriterd");
    let mut child = Command::new(exe)
        .env_remove("REPORTWRITER_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn reportwriterd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

pub fn error_code(value: &serde_json::Value) -> Option<&str> {
    value.pointer("/error/code").and_then(|v| v.as_str())
}

pub fn str_at<'a>(value: &'a serde_json::Value, pointer: &str) -> &'a str {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing string at {} in {}", pointer, value))
}

pub fn rated_effort() -> serde_json::Value {
    json!({
        "kind": "rated",
        "comment": {
            "name": "Effort",
            "comments": {
                "excellent": ["[Name] always gives full effort."],
                "good": ["[Name] works hard."],
                "satisfactory": ["[Name] usually tries."],
                "needsImprovement": ["[Name] needs to focus."]
            }
        }
    })
}

/// Selects `workspace`, then creates a two-student class and a template with
/// one rated section. Returns (class id, template id, section id, student ids).
pub fn seed_class_and_template(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
) -> (String, String, String, Vec<String>) {
    request_ok(
        stdin,
        reader,
        "seed-1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let created = request_ok(
        stdin,
        reader,
        "seed-2",
        "classes.create",
        json!({
            "name": "7A",
            "students": [
                { "firstName": "Ada", "lastName": "Lovelace" },
                { "firstName": "Grace", "lastName": "Hopper" }
            ]
        }),
    );
    let class_id = str_at(&created, "/classId").to_string();
    request_ok(
        stdin,
        reader,
        "seed-3",
        "comments.save",
        json!({ "entry": rated_effort() }),
    );
    let template = request_ok(
        stdin,
        reader,
        "seed-4",
        "templates.create",
        json!({
            "name": "Term 1",
            "sections": [{ "type": "rated-comment", "commentName": "Effort" }]
        }),
    );
    let template_id = str_at(&template, "/templateId").to_string();
    let opened = request_ok(
        stdin,
        reader,
        "seed-5",
        "templates.open",
        json!({ "templateId": template_id }),
    );
    let section_id = str_at(&opened, "/template/sections/0/id").to_string();
    let class = request_ok(
        stdin,
        reader,
        "seed-6",
        "classes.open",
        json!({ "classId": class_id }),
    );
    let student_ids = class
        .pointer("/class/students")
        .and_then(|v| v.as_array())
        .expect("students")
        .iter()
        .map(|s| s["id"].as_str().expect("student id").to_string())
        .collect();
    (class_id, template_id, section_id, student_ids)
}
