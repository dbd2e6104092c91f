//! Read-only projections of the Lakes table used by the presentation layer.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{KbError, Result};
use crate::model::columns::{self, TableKind};
use crate::model::{LakeEntry, LakeLayout, Table, unique_in_order};

/// One distinct lake with its lake-level description (first row wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LakeSummary {
    pub name: String,
    pub description: Option<String>,
}

/// Distinct lakes in first-seen order.
pub fn lake_summaries(table: &Table) -> Vec<LakeSummary> {
    let mut summaries: Vec<LakeSummary> = Vec::new();
    for entry in table.lake_entries() {
        match summaries.iter_mut().find(|summary| summary.name == entry.lake_name) {
            Some(summary) => {
                // A blank description on the first row does not claim the slot.
                if summary.description.is_none() {
                    summary.description = entry.description;
                }
            }
            None => summaries.push(LakeSummary {
                name: entry.lake_name,
                description: entry.description,
            }),
        }
    }
    summaries
}

/// Rows belonging to `lake`.
///
/// Every name candidate column is searched in order, then the resolved name
/// column. When nothing matches but the table holds exactly one lake, all
/// rows are returned.
pub fn lake_rows(table: &Table, lake: &str) -> Vec<LakeEntry> {
    for candidate in TableKind::Lakes.name_candidates() {
        let Some(col) = table.column_index(candidate) else {
            continue;
        };
        let hits = table.lake_entries_matching(|row| row.get(col).is_some_and(|cell| cell.trim() == lake));
        if !hits.is_empty() {
            return hits;
        }
    }

    let entries = table.lake_entries();
    let by_name: Vec<LakeEntry> = entries
        .iter()
        .filter(|entry| entry.lake_name == lake)
        .cloned()
        .collect();
    if !by_name.is_empty() {
        return by_name;
    }
    if table.entity_names(TableKind::Lakes).len() == 1 {
        entries
    } else {
        Vec::new()
    }
}

/// Rows of `lake`, or [`KbError::LakeNotFound`] when it has none.
pub fn find_lake(table: &Table, lake: &str) -> Result<Vec<LakeEntry>> {
    let rows = lake_rows(table, lake);
    if rows.is_empty() {
        return Err(KbError::LakeNotFound(lake.to_string()));
    }
    Ok(rows)
}

/// An element of a folder, optionally linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementLink {
    pub name: String,
    pub url: Option<String>,
}

/// A folder inside a lake with its folder-level change notes (first row wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderView {
    pub name: String,
    pub change_notes: Option<String>,
    pub elements: Vec<ElementLink>,
}

impl FolderView {
    /// Number of elements that carry a link.
    pub fn link_count(&self) -> usize {
        self.elements.iter().filter(|element| element.url.is_some()).count()
    }
}

/// Folders of a lake's rows in first-seen order.
pub fn folders(rows: &[LakeEntry]) -> Vec<FolderView> {
    let names = unique_in_order(rows.iter().filter_map(|row| row.folder.as_deref()));
    names
        .into_iter()
        .map(|name| {
            let in_folder: Vec<&LakeEntry> = rows
                .iter()
                .filter(|row| row.folder.as_deref() == Some(name.as_str()))
                .collect();
            FolderView {
                change_notes: in_folder.first().and_then(|row| row.change_notes.clone()),
                elements: in_folder
                    .iter()
                    .filter_map(|row| {
                        row.element.as_ref().map(|element| ElementLink {
                            name: element.clone(),
                            url: row.url.clone(),
                        })
                    })
                    .collect(),
                name,
            }
        })
        .collect()
}

/// Part of a change-note text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NoteSegment {
    Text(String),
    /// Image location: a URL or a local path.
    Image(String),
}

const IMAGE_OPEN: &str = "[IMAGE:";

/// Splits text on `[IMAGE:<path-or-url>]` markers.
///
/// Blank text between markers is dropped. GitHub `blob` URLs are rewritten
/// to their raw-content form. An unterminated marker is kept as text.
pub fn note_segments(text: &str) -> Vec<NoteSegment> {
    let mut segments = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(IMAGE_OPEN) {
        let after = &rest[start + IMAGE_OPEN.len()..];
        let Some(end) = after.find(']') else {
            break;
        };
        push_text(&mut segments, &rest[..start]);
        segments.push(NoteSegment::Image(image_location(after[..end].trim())));
        rest = &after[end + 1..];
    }
    push_text(&mut segments, rest);
    segments
}

fn push_text(segments: &mut Vec<NoteSegment>, text: &str) {
    if !text.trim().is_empty() {
        segments.push(NoteSegment::Text(text.to_string()));
    }
}

/// Maps an image reference to something fetchable.
pub fn image_location(raw: &str) -> String {
    if raw.contains("github.com") && raw.contains("/blob/") {
        return raw
            .replacen("github.com", "raw.githubusercontent.com", 1)
            .replacen("/blob/", "/", 1);
    }
    raw.to_string()
}

/// Column-level statistics of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableAnalysis {
    pub row_count: usize,
    pub columns: Vec<String>,
    /// Blank cells per column.
    pub missing: BTreeMap<String, usize>,
    /// Frequency of each non-blank value per column.
    pub value_counts: BTreeMap<String, BTreeMap<String, usize>>,
}

impl TableAnalysis {
    pub fn total_missing(&self) -> usize {
        self.missing.values().sum()
    }

    /// Columns with at least one blank cell.
    pub fn columns_with_gaps(&self) -> Vec<(&str, usize)> {
        self.columns
            .iter()
            .filter_map(|column| {
                let count = self.missing.get(column).copied().unwrap_or(0);
                (count > 0).then_some((column.as_str(), count))
            })
            .collect()
    }
}

pub fn analyze(table: &Table) -> TableAnalysis {
    let mut analysis = TableAnalysis {
        row_count: table.rows.len(),
        columns: table.columns.clone(),
        ..TableAnalysis::default()
    };
    for (col, header) in table.columns.iter().enumerate() {
        let mut missing = 0;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for row in 0..table.rows.len() {
            let cell = table.cell(row, col).trim();
            if cell.is_empty() {
                missing += 1;
            } else {
                *counts.entry(cell.to_string()).or_default() += 1;
            }
        }
        analysis.missing.insert(header.clone(), missing);
        analysis.value_counts.insert(header.clone(), counts);
    }
    analysis
}

/// Appends `entry` to the Lakes table.
///
/// Lake, folder and element are required. Missing canonical columns are
/// added to the header so no field is silently dropped.
pub fn append_lake_entry(table: &Table, entry: &LakeEntry) -> Result<Table> {
    require("LakeHouse", Some(&entry.lake_name))?;
    require("Folder", entry.folder.as_ref())?;
    require("Element", entry.element.as_ref())?;

    let mut updated = table.clone();
    if updated.columns.is_empty() {
        updated.columns = columns::LAKE_HEADERS.iter().map(|h| h.to_string()).collect();
    }
    let layout = LakeLayout::resolve(&updated.columns);
    let wanted = [
        (layout.name, columns::LAKE_NAME, true),
        (layout.folder, columns::FOLDER, true),
        (layout.element, columns::ELEMENT, true),
        (layout.url, columns::URL, entry.url.is_some()),
        (layout.description, columns::LAKE_INFO, entry.description.is_some()),
        (layout.change_notes, columns::CHANGE_NOTES, entry.change_notes.is_some()),
    ];
    for (resolved, header, needed) in wanted {
        if needed && resolved.is_none() {
            updated.columns.push(header.to_string());
            let width = updated.columns.len();
            for row in &mut updated.rows {
                row.resize(width, String::new());
            }
        }
    }
    let row = entry.to_row(&updated.columns);
    updated.push_row(row);
    Ok(updated)
}

fn require(field: &str, value: Option<&String>) -> Result<()> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(()),
        _ => Err(KbError::MissingField(field.to_string())),
    }
}
