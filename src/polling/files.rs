//! Building the "generated files" list from diagnostics.
//!
//! Uploaded files come straight from each diagnostic. Generated reports are
//! dug out of the report payload, whose shape varies: a `files` array, a
//! single `file` object, the file fields inline, or just a download URL.

use crate::models::{Diagnostic, DiagnosticStatus, FileMeta};
use serde_json::Value;
use std::collections::HashSet;

/// Tag applied to files produced by a diagnostic run.
pub const GENERATED_REPORT_TAG: &str = "generated-report";

/// Files generated by a completed diagnostic, extracted from its report.
pub fn generated_report_files(diagnostic: &Diagnostic) -> Vec<FileMeta> {
    if diagnostic.status != DiagnosticStatus::Completed {
        return Vec::new();
    }
    let Some(report) = diagnostic.report.as_ref() else {
        return Vec::new();
    };

    let mut files: Vec<FileMeta> = match report {
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("files") {
                items.iter().filter_map(parse_file).collect()
            } else if let Some(file) = map.get("file").and_then(parse_file) {
                vec![file]
            } else if let Some(file) = parse_file(report) {
                vec![file]
            } else {
                url_only_file(diagnostic, report).into_iter().collect()
            }
        }
        Value::Array(items) => items.iter().filter_map(parse_file).collect(),
        _ => Vec::new(),
    };

    for file in &mut files {
        if file.tag.is_none() {
            file.tag = Some(GENERATED_REPORT_TAG.to_string());
        }
    }

    files
}

fn parse_file(value: &Value) -> Option<FileMeta> {
    serde_json::from_value(value.clone()).ok()
}

fn url_only_file(diagnostic: &Diagnostic, report: &Value) -> Option<FileMeta> {
    let url = ["url", "download_url", "downloadUrl", "file_url", "fileUrl"]
        .iter()
        .find_map(|key| report.get(*key).and_then(Value::as_str))?;

    let title = diagnostic.title.as_deref().unwrap_or("Diagnostic");
    Some(FileMeta {
        id: Some(format!("{}-report", diagnostic.id)),
        name: format!("{} report", title),
        size: 0,
        uploaded_by: None,
        tag: None,
        url: Some(url.to_string()),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FileOrigin {
    Upload,
    Generated,
}

/// Full file list across diagnostics: uploads first, then generated
/// reports, each file exactly once.
///
/// Identity is scoped to the owning diagnostic and the file's origin, so
/// reports of different diagnostics never collapse into one entry even
/// when they share a name or id.
pub fn collect_file_list(diagnostics: &[Diagnostic]) -> Vec<FileMeta> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for diagnostic in diagnostics {
        let uploads = diagnostic
            .files
            .iter()
            .cloned()
            .map(|file| (FileOrigin::Upload, file));
        let generated = generated_report_files(diagnostic)
            .into_iter()
            .map(|file| (FileOrigin::Generated, file));

        for (origin, file) in uploads.chain(generated) {
            if seen.insert((diagnostic.id.clone(), origin, file.key())) {
                files.push(file);
            }
        }
    }

    files
}
