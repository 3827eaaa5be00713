use crate::model::AppData;
use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DATA_ENTRY: &str = "data/classbook.json";
pub const BUNDLE_FORMAT_V1: &str = "classbook-backup-v1";
pub const PLAIN_JSON_FORMAT: &str = "plain-json";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub data: AppData,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn export_bundle(data: &AppData, out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let snapshot = serde_json::to_vec_pretty(data).context("failed to serialize snapshot")?;
    let checksum = sha256_hex(&snapshot);

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "sha256": checksum,
        "counts": {
            "students": data.students.len(),
            "activities": data.activities.len(),
            "evaluations": data.evaluations.len(),
            "weeklyComments": data.weekly_comments.len(),
            "aiReports": data.ai_reports.len(),
            "notes": data.notes.len(),
        },
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DATA_ENTRY, opts)
        .context("failed to start data entry")?;
    zip.write_all(&snapshot)
        .context("failed to write data entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 2,
        sha256: checksum,
    })
}

/// Reads a backup bundle, or a bare JSON snapshot of the whole state.
pub fn import_bundle(in_path: &Path) -> anyhow::Result<ImportSummary> {
    if !is_zip_file(in_path)? {
        let text = std::fs::read_to_string(in_path)
            .with_context(|| format!("failed to read {}", in_path.to_string_lossy()))?;
        let data: AppData =
            serde_json::from_str(&text).context("snapshot is not a valid classbook export")?;
        return checked_summary(PLAIN_JSON_FORMAT, data);
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

    let mut snapshot = Vec::new();
    archive
        .by_name(DATA_ENTRY)
        .context("bundle missing data/classbook.json")?
        .read_to_end(&mut snapshot)
        .context("failed to read data entry")?;

    let expected = manifest
        .get("sha256")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest.json has no sha256 checksum"))?;
    let actual = sha256_hex(&snapshot);
    if actual != expected {
        return Err(anyhow!(
            "checksum mismatch: manifest {} but data hashes to {}",
            expected,
            actual
        ));
    }

    let data: AppData =
        serde_json::from_slice(&snapshot).context("data/classbook.json is invalid")?;
    checked_summary(BUNDLE_FORMAT_V1, data)
}

/// Refuses snapshots with duplicate keys or records pointing at missing
/// students or activities.
fn checked_summary(format: &str, data: AppData) -> anyhow::Result<ImportSummary> {
    data.check_integrity()
        .map_err(|e| anyhow!("inconsistent snapshot: {e}"))?;
    Ok(ImportSummary {
        bundle_format_detected: format.to_string(),
        data,
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
