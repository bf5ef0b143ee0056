//! Table output for projects, candidates, ledger entries and run history.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::{Document, Project, RunRecord, RunStatus, SyncLedger};

use super::change_detector::classify;

/// Formats configured projects.
pub fn format_projects_table(projects: &[Project]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Name", "Filters"]);

    for (i, project) in projects.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            project.name.clone(),
            project.filter_summary(),
        ]);
    }

    table.to_string()
}

/// Formats candidates, marking what would be uploaded to `destination_id`.
pub fn format_candidates_table(
    documents: &[Document],
    ledger: &SyncLedger,
    destination_id: Option<&str>,
) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Title", "File", "Type", "Modified", "State"]);

    for doc in documents {
        let state = destination_id.map_or_else(
            || "-".to_string(),
            |dest| {
                classify(doc, ledger.get(dest, &doc.id))
                    .map_or_else(|| "synced".to_string(), |reason| reason.to_string())
            },
        );

        table.add_row(vec![
            doc.id.clone(),
            truncate(doc.display_name(), 35),
            truncate(&doc.filename, 30),
            short_mime(doc),
            doc.modified_at.clone(),
            state,
        ]);
    }

    table.to_string()
}

/// Formats ledger entries, optionally for a single destination.
pub fn format_ledger_table(ledger: &SyncLedger, destination_id: Option<&str>) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Destination", "Document", "Fingerprint", "Modified", "Synced"]);

    let destinations: Vec<&str> = match destination_id {
        Some(dest) => vec![dest],
        None => ledger.destinations().collect(),
    };

    for dest in destinations {
        for (doc_id, entry) in ledger.entries_for(dest) {
            let fingerprint = if entry.fingerprint.is_empty() {
                "-".to_string()
            } else {
                truncate(&entry.fingerprint, 12)
            };

            table.add_row(vec![
                dest.to_string(),
                doc_id.to_string(),
                fingerprint,
                entry.modified_at.clone(),
                entry.synced_at.format("%Y-%m-%d %H:%M").to_string(),
            ]);
        }
    }

    table.to_string()
}

/// Formats run history.
pub fn format_runs_table(runs: &[RunRecord]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Finished", "Project", "Destination", "Status", "Uploaded", "Message"]);

    for run in runs {
        let status = match run.status {
            RunStatus::Succeeded => run.status.as_str().green().to_string(),
            RunStatus::Failed => run.status.as_str().red().to_string(),
        };

        table.add_row(vec![
            run.finished_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            run.project.clone(),
            run.destination_id.clone().unwrap_or_else(|| "-".to_string()),
            status,
            run.delivered.to_string(),
            truncate(&run.message, 50),
        ]);
    }

    table.to_string()
}

/// Short label for a document's content type.
fn short_mime(doc: &Document) -> String {
    use crate::domain::MimeType;

    match doc.mime_type {
        MimeType::Pdf => "pdf",
        MimeType::PlainText => "txt",
        MimeType::Markdown => "md",
        MimeType::WordDocument => "docx",
    }
    .to_string()
}

/// Truncates a string to max length (in chars) with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
