use crate::model::{Report, Student};
use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DOCUMENT_ENTRY: &str = "data/document.json";
pub const BUNDLE_FORMAT_V1: &str = "reportwriter-workspace-v1";
/// Detected when the imported file is the bare JSON document.
pub const LEGACY_JSON_FORMAT: &str = "legacy-json";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportedBundle {
    pub bundle_format_detected: String,
    pub document_json: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn create_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    Ok(())
}

/// Writes the serialized document and a manifest carrying its checksum.
pub fn export_workspace_bundle(
    document_json: &str,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    create_parent(out_path)?;
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let sha256 = sha256_hex(document_json.as_bytes());
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "documentSha256": sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DOCUMENT_ENTRY, opts)
        .context("failed to start document entry")?;
    zip.write_all(document_json.as_bytes())
        .context("failed to write document entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 2,
        sha256,
    })
}

/// Reads a bundle back to document text. Nothing is applied here; the
/// caller parses and installs the document.
pub fn import_workspace_bundle(in_path: &Path) -> anyhow::Result<ImportedBundle> {
    if !is_zip_file(in_path)? {
        let document_json = std::fs::read_to_string(in_path).with_context(|| {
            format!(
                "failed to read legacy JSON backup {}",
                in_path.to_string_lossy()
            )
        })?;
        return Ok(ImportedBundle {
            bundle_format_detected: LEGACY_JSON_FORMAT.to_string(),
            document_json,
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut document_json = String::new();
    archive
        .by_name(DOCUMENT_ENTRY)
        .context("bundle missing data/document.json")?
        .read_to_string(&mut document_json)
        .context("failed to read document entry")?;

    let expected = manifest
        .get("documentSha256")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest has no documentSha256"))?;
    let actual = sha256_hex(document_json.as_bytes());
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(anyhow!(
            "document checksum mismatch: expected {}, got {}",
            expected,
            actual
        ));
    }

    Ok(ImportedBundle {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        document_json,
    })
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}

pub fn report_file_name(student: &Student) -> String {
    format!("{}_{}_Report.txt", student.first_name, student.last_name)
}

/// Writes one report's content verbatim into `out_dir`.
pub fn export_report_text(
    report: &Report,
    student: &Student,
    out_dir: &Path,
) -> anyhow::Result<std::path::PathBuf> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create directory {}", out_dir.to_string_lossy()))?;
    let path = out_dir.join(report_file_name(student));
    std::fs::write(&path, report.content.as_bytes())
        .with_context(|| format!("failed to write report {}", path.to_string_lossy()))?;
    Ok(path)
}

/// Zips one text file per report. Repeated file names get a numeric suffix
/// so no report is dropped.
pub fn export_class_reports(
    reports: &[(&Report, &Student)],
    out_path: &Path,
) -> anyhow::Result<usize> {
    create_parent(out_path)?;
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut used = std::collections::HashSet::new();
    for (report, student) in reports {
        let base = report_file_name(student);
        let mut name = base.clone();
        let mut n = 2;
        while !used.insert(name.clone()) {
            name = format!("{} ({n}).txt", base.trim_end_matches(".txt"));
            n += 1;
        }
        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start entry {name}"))?;
        zip.write_all(report.content.as_bytes())
            .with_context(|| format!("failed to write entry {name}"))?;
    }

    zip.finish().context("failed to finalize zip")?;
    Ok(reports.len())
}
