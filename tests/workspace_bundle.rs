mod test_support;

use serde_json::json;
use std::io::{Read, Write};
use test_support::{
    error_code, request, request_ok, seed_class_and_template, spawn_sidecar, str_at, temp_dir,
};

#[test]
fn data_survives_a_restart() {
    let workspace = temp_dir();
    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar();
        seed_class_and_template(&mut stdin, &mut reader, workspace.path());
        drop(stdin);
        let _ = child.wait();
    }

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    assert_eq!(selected.pointer("/counts/classes"), Some(&json!(1)));
    assert_eq!(selected.pointer("/counts/templates"), Some(&json!(1)));

    let rated = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "comments.list",
        json!({ "kind": "rated" }),
    );
    assert_eq!(str_at(&rated, "/comments/0/name"), "Effort");
}

#[test]
fn bundle_round_trips_into_a_fresh_workspace() {
    let source = temp_dir();
    let target = temp_dir();
    let out = temp_dir();
    let bundle = out.path().join("backup.zip");

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, template_id, _section_id, students) =
        seed_class_and_template(&mut stdin, &mut reader, source.path());
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.save",
        json!({
            "classId": class_id,
            "templateId": template_id,
            "studentId": students[0],
            "content": "kept"
        }),
    );
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.exportBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(str_at(&exported, "/bundleFormat"), "reportwriter-workspace-v1");
    assert_eq!(exported["entryCount"], 2);

    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": target.path().to_string_lossy() }),
    );
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "workspace.importBundle",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(
        str_at(&imported, "/bundleFormatDetected"),
        "reportwriter-workspace-v1"
    );
    assert_eq!(imported.pointer("/counts/reports"), Some(&json!(1)));
    assert_eq!(imported["degradedFields"], json!([]));

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "reports.get",
        json!({ "classId": class_id, "templateId": template_id, "studentId": students[0] }),
    );
    assert_eq!(str_at(&report, "/report/content"), "kept");
}

#[test]
fn tampered_bundle_is_rejected() {
    let workspace = temp_dir();
    let out = temp_dir();
    let bundle = out.path().join("backup.zip");
    let tampered = out.path().join("tampered.zip");

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    seed_class_and_template(&mut stdin, &mut reader, workspace.path());
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.exportBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );

    // Copy the bundle, swapping the document for different text.
    let mut archive =
        zip::ZipArchive::new(std::fs::File::open(&bundle).expect("open bundle")).expect("zip");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    let mut writer = zip::ZipWriter::new(std::fs::File::create(&tampered).expect("create"));
    let options = zip::write::FileOptions::default();
    writer.start_file("manifest.json", options).expect("start");
    writer.write_all(manifest.as_bytes()).expect("write");
    writer
        .start_file("data/document.json", options)
        .expect("start");
    writer
        .write_all(br#"{"templates":[],"classes":[],"reports":[]}"#)
        .expect("write");
    writer.finish().expect("finish");

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.importBundle",
        json!({ "inPath": tampered.to_string_lossy() }),
    );
    assert_eq!(error_code(&resp), Some("import_failed"));

    let listed = request_ok(&mut stdin, &mut reader, "3", "classes.list", json!({}));
    assert_eq!(listed["classes"].as_array().map(|a| a.len()), Some(1));
}

#[test]
fn legacy_json_export_is_accepted() {
    let workspace = temp_dir();
    let legacy = workspace.path().join("legacy.json");
    std::fs::write(
        &legacy,
        r#"{
            "templates": [],
            "classes": [{
                "id": "c1",
                "name": "Old class",
                "students": [{ "id": "s1", "firstName": "Ada", "lastName": "Lovelace" }],
                "createdAt": "2024-01-01T00:00:00Z"
            }],
            "reports": "not a list"
        }"#,
    )
    .expect("write legacy json");

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.importBundle",
        json!({ "inPath": legacy.to_string_lossy() }),
    );
    assert_eq!(str_at(&imported, "/bundleFormatDetected"), "legacy-json");
    assert_eq!(imported.pointer("/counts/classes"), Some(&json!(1)));
    assert_eq!(imported["degradedFields"], json!(["reports"]));
}

#[test]
fn unreadable_stored_document_opens_as_empty_workspace() {
    let workspace = temp_dir();
    {
        let conn = rusqlite::Connection::open(workspace.path().join("reportwriter.sqlite3"))
            .expect("open sqlite");
        conn.execute(
            "CREATE TABLE documents(key TEXT PRIMARY KEY, json TEXT NOT NULL, updated_at TEXT)",
            [],
        )
        .expect("create table");
        conn.execute(
            "INSERT INTO documents(key, json) VALUES('reportGeneratorData', ?)",
            [r#"{"classes": [tru"#],
        )
        .expect("insert corrupt row");
    }

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    assert_eq!(selected.pointer("/counts/classes"), Some(&json!(0)));

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({ "name": "7A", "students": [{ "firstName": "Ada", "lastName": "Lovelace" }] }),
    );
    assert_eq!(created["applied"], true);
}

#[test]
fn infrastructure_errors_are_one_line_chains() {
    let workspace = temp_dir();
    let missing = workspace.path().join("missing.zip");
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
        "workspace.importBundle",
        json!({ "inPath": missing.to_string_lossy() }),
    );
    assert_eq!(error_code(&resp), Some("import_failed"));
    let message = str_at(&resp, "/error/message");
    assert!(message.starts_with("failed to open input file"), "{message}");
    assert!(message.contains(": "), "cause missing from {message}");
    assert!(!message.contains('\n'), "multi-line message: {message}");
}
