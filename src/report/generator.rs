//! Markdown and JSON report generation.
//!
//! Renders the client listing, the diagnostic file list and the
//! navigation menu for the terminal or for a file.

use crate::models::{ClientsReport, DashboardStats, ListingSummary, User};
use crate::navigation::Section;
use crate::polling::DiagnosticSnapshot;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Generate the complete Markdown clients report.
pub fn generate_clients_markdown(report: &ClientsReport) -> String {
    let mut output = String::new();

    output.push_str("# Clients\n\n");

    if let Some(ref error) = report.error {
        output.push_str(&format!(
            "> **Warning:** the client list could not be loaded ({}). \
             The listing below is empty.\n\n",
            error
        ));
    }

    output.push_str(&generate_metadata_section(report));
    output.push_str(&generate_summary_section(&report.summary));

    if let Some(ref stats) = report.stats {
        output.push_str(&generate_stats_section(stats));
    }

    output.push_str(&generate_clients_table(report));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(report: &ClientsReport) -> String {
    let metadata = &report.metadata;
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **API:** {}\n", metadata.api_url));
    section.push_str(&format!(
        "- **Signed in as:** {} ({})\n",
        metadata.user_name, metadata.role
    ));
    section.push_str(&format!("- **Strategy:** `{}`\n", metadata.strategy));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &ListingSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Clients | Active | Pending | Engagements |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| **{}** | {} | {} | {} |\n\n",
        summary.total, summary.active, summary.pending, summary.engagements
    ));

    if !summary.by_industry.is_empty() {
        section.push_str("### Clients by Industry\n\n");
        section.push_str("| Industry | Clients |\n");
        section.push_str("|:---|:---:|\n");

        let mut industries: Vec<_> = summary.by_industry.iter().collect();
        industries.sort_by(|(a_name, a_count), (b_name, b_count)| {
            b_count.cmp(a_count).then_with(|| a_name.cmp(b_name))
        });

        for (industry, count) in industries {
            section.push_str(&format!("| {} | {} |\n", escape_cell(industry), count));
        }
        section.push('\n');
    }

    section
}

fn generate_stats_section(stats: &DashboardStats) -> String {
    let mut section = String::new();

    section.push_str("## Dashboard\n\n");
    section.push_str(&format!("- **Total clients:** {}\n", stats.total_clients));
    section.push_str(&format!(
        "- **Active engagements:** {}\n",
        stats.active_engagements
    ));
    section.push_str(&format!("- **Pending tasks:** {}\n", stats.pending_tasks));
    section.push_str(&format!(
        "- **Diagnostics:** {}\n\n",
        stats.total_diagnostics
    ));

    section
}

/// Generate the client table.
fn generate_clients_table(report: &ClientsReport) -> String {
    let mut section = String::new();

    section.push_str("## Client List\n\n");

    if report.clients.is_empty() {
        section.push_str("No clients found.\n\n");
        return section;
    }

    section.push_str("| Name | Email | Industry | Status | Engagements | Verified |\n");
    section.push_str("|:---|:---|:---|:---:|:---:|:---:|\n");

    for client in &report.clients {
        let industry = if client.industry.is_empty() {
            "-"
        } else {
            client.industry.as_str()
        };
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            escape_cell(&client.name),
            escape_cell(&client.email),
            escape_cell(industry),
            client.status,
            client.engagements,
            if client.is_verified { "yes" } else { "no" }
        ));
    }
    section.push('\n');

    section
}

/// Generate the Markdown view of an engagement's diagnostics and files.
pub fn generate_diagnostics_markdown(engagement_id: &str, snapshot: &DiagnosticSnapshot) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Diagnostics for engagement {}\n\n", engagement_id));

    if snapshot.diagnostics.is_empty() {
        output.push_str("No diagnostics found.\n\n");
    } else {
        output.push_str("| ID | Title | Status | Updated |\n");
        output.push_str("|:---|:---|:---:|:---|\n");
        for diagnostic in &snapshot.diagnostics {
            output.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                escape_cell(&diagnostic.id),
                escape_cell(diagnostic.title.as_deref().unwrap_or("-")),
                diagnostic.status,
                diagnostic
                    .updated_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string())
            ));
        }
        output.push('\n');
    }

    if snapshot.processing > 0 {
        output.push_str(&format!(
            "*{} diagnostic(s) still processing.*\n\n",
            snapshot.processing
        ));
    }

    output.push_str("## Files\n\n");

    if snapshot.files.is_empty() {
        output.push_str("No files.\n\n");
        return output;
    }

    output.push_str("| ID | Name | Size | Tag | Uploaded by |\n");
    output.push_str("|:---|:---|:---:|:---|:---|\n");
    for file in &snapshot.files {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            escape_cell(file.id.as_deref().unwrap_or("-")),
            escape_cell(&file.name),
            file.size_label(),
            escape_cell(file.tag.as_deref().unwrap_or("-")),
            escape_cell(file.uploaded_by.as_deref().unwrap_or("-"))
        ));
    }
    output.push('\n');

    output
}

/// Generate the Markdown navigation menu for a user.
pub fn generate_navigation_markdown(user: &User, sections: &[Section]) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Navigation for {} ({})\n\n", user.name, user.role));
    for section in sections {
        output.push_str(&format!("- {} `{}`\n", section, section.path()));
    }

    output
}

/// JSON shape of the navigation menu.
#[derive(Debug, Serialize)]
pub struct NavigationEntry {
    pub section: Section,
    pub label: String,
    pub path: &'static str,
}

impl From<Section> for NavigationEntry {
    fn from(section: Section) -> Self {
        Self {
            section,
            label: section.to_string(),
            path: section.path(),
        }
    }
}

/// Generate a JSON report for any serializable value.
pub fn generate_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

/// Write a rendered report to `path`, or to stdout when no path is given.
pub fn write_output(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write report to {}", path.display())),
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}

/// Generate the report footer.
fn generate_footer() -> String {
    format!("---\n\n*Generated by firmdesk v{}*\n", env!("CARGO_PKG_VERSION"))
}

/// Pipes and newlines would break a Markdown table row.
fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\n', '\r'], " ")
}
