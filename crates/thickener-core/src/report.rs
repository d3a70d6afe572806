//! Report snapshots.
//!
//! Each comparison the user keeps is frozen into a [`ReportItem`] holding the
//! title, context line and summary text it had at the time. Turning the
//! collection into a document is left to the presentation layer; here it is
//! only serialized to JSON.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::formatting::{format_before_after, format_compliance};
use crate::models::{BeforeAfter, TargetCompliance};
use crate::time_utils::format_timestamp;

/// Project name used when the user left the field blank.
pub const DEFAULT_PROJECT_NAME: &str = "Thickener DataWeb";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    BeforeAfter,
    Target,
}

/// One snapshot in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportItem {
    pub kind: ReportKind,
    pub title: String,
    /// Context line shown under the title.
    pub meta: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
}

/// An ordered collection of snapshots for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub project_name: String,
    pub generated_at: NaiveDateTime,
    pub items: Vec<ReportItem>,
}

impl Report {
    /// Start an empty report. A blank `project_name` falls back to
    /// [`DEFAULT_PROJECT_NAME`].
    pub fn new(project_name: &str) -> Self {
        let name = project_name.trim();
        Self {
            project_name: if name.is_empty() {
                DEFAULT_PROJECT_NAME.to_string()
            } else {
                name.to_string()
            },
            generated_at: Local::now().naive_local(),
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Snapshot a before/after comparison.
    pub fn add_before_after(&mut self, result: &BeforeAfter) -> &ReportItem {
        self.push(ReportItem {
            kind: ReportKind::BeforeAfter,
            title: format!("Before vs After — {}", result.column),
            meta: format!("Cut-off: {}", format_timestamp(result.cutoff)),
            summary: format_before_after(result),
        })
    }

    /// Snapshot a target compliance report.
    pub fn add_compliance(&mut self, report: &TargetCompliance) -> &ReportItem {
        self.push(ReportItem {
            kind: ReportKind::Target,
            title: format!("Target compliance — {}", report.column),
            meta: format_compliance(report),
            summary: String::new(),
        })
    }

    fn push(&mut self, item: ReportItem) -> &ReportItem {
        self.items.push(item);
        &self.items[self.items.len() - 1]
    }

    /// File name the report is offered under, e.g.
    /// `Thickener DataWeb_report_2024-03-01_06-15-00.json`. Path separators
    /// and other characters invalid in file names become `_`.
    pub fn file_name(&self) -> String {
        let project: String = self
            .project_name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        format!(
            "{}_report_{}.json",
            project,
            self.generated_at.format("%Y-%m-%d_%H-%M-%S")
        )
    }

    /// Write the report as pretty JSON, via a temp file and rename.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
