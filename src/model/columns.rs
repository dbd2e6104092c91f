//! Header and sheet-name conventions used by the knowledge-base workbook.

/// Canonical header of the lake-name column.
pub const LAKE_NAME: &str = "LakeHouse";
pub const FOLDER: &str = "Folder";
pub const ELEMENT: &str = "Element";
pub const URL: &str = "URL";
/// Lake-level description ("general information about the lake").
pub const LAKE_INFO: &str = "Загальна інформація про лейк";
/// Folder-level change notes ("making changes").
pub const CHANGE_NOTES: &str = "Внесення змін";

/// Headers written to a freshly synthesised Lakes sheet.
pub const LAKE_HEADERS: [&str; 6] = [LAKE_NAME, FOLDER, ELEMENT, URL, LAKE_INFO, CHANGE_NOTES];

/// Headers written to a freshly synthesised Reports sheet.
pub const REPORT_HEADERS: [&str; 6] = [
    "Name",
    "Workspace",
    "Owner",
    "Update_Frequency",
    LAKE_NAME,
    "Status",
];

pub const LAKE_NAME_CANDIDATES: &[&str] = &[
    LAKE_NAME,
    "name",
    "Name",
    "назва",
    "Назва",
    "lake_name",
    "Lake Name",
    "Lakehouse",
];

pub const REPORT_NAME_CANDIDATES: &[&str] = &[
    "Report",
    "Report Name",
    "report_name",
    "name",
    "Name",
    "назва",
    "Назва",
    "Звіт",
];

pub const FOLDER_CANDIDATES: &[&str] = &[FOLDER, "folder", "Папка"];
pub const ELEMENT_CANDIDATES: &[&str] = &[ELEMENT, "element", "Елемент"];
pub const URL_CANDIDATES: &[&str] = &[URL, "Url", "url", "Link"];
pub const DESCRIPTION_CANDIDATES: &[&str] = &[LAKE_INFO, "Description", "description", "Опис"];
pub const CHANGE_NOTES_CANDIDATES: &[&str] = &[CHANGE_NOTES, "Change Notes", "change_notes", "Changes"];

pub const WORKSPACE_CANDIDATES: &[&str] = &["Workspace", "workspace", "Робочий простір"];
pub const OWNER_CANDIDATES: &[&str] = &["Owner", "owner", "Власник"];
pub const UPDATE_FREQ_CANDIDATES: &[&str] = &[
    "Update_Frequency",
    "Update Frequency",
    "update_freq",
    "Оновлення",
];
pub const REPORT_LAKE_CANDIDATES: &[&str] = &[LAKE_NAME, "Lake", "lake", "Lakehouse", "Лейк"];
pub const STATUS_CANDIDATES: &[&str] = &["Status", "status", "Статус"];

pub const LAKES_SHEET_NAMES: &[&str] = &[
    "Lakes",
    "lakes",
    "LAKES",
    "LakeHouses",
    "Lakehouses",
    "Лейки",
    "лейки",
];

pub const REPORTS_SHEET_NAMES: &[&str] = &["Reports", "reports", "REPORTS", "Звіти", "звіти"];

/// Which of the two knowledge-base tables a sheet holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Lakes,
    Reports,
}

impl TableKind {
    /// Headers that may hold the entity name, most specific first.
    pub fn name_candidates(self) -> &'static [&'static str] {
        match self {
            TableKind::Lakes => LAKE_NAME_CANDIDATES,
            TableKind::Reports => REPORT_NAME_CANDIDATES,
        }
    }

    pub fn sheet_candidates(self) -> &'static [&'static str] {
        match self {
            TableKind::Lakes => LAKES_SHEET_NAMES,
            TableKind::Reports => REPORTS_SHEET_NAMES,
        }
    }

    /// Picks the sheet holding this table from the workbook's sheet names.
    ///
    /// Name variants are tried first. Without a match the legacy positional
    /// rule applies: Lakes takes the second sheet (or the first when there is
    /// only one), Reports takes the first.
    pub fn select_sheet(self, sheet_names: &[String]) -> Option<usize> {
        if let Some(idx) = resolve_column(sheet_names, self.sheet_candidates()) {
            return Some(idx);
        }
        match (self, sheet_names.len()) {
            (_, 0) => None,
            (TableKind::Lakes, 1) => Some(0),
            (TableKind::Lakes, _) => Some(1),
            (TableKind::Reports, _) => Some(0),
        }
    }
}

/// Returns the position of the first candidate present in `headers`.
///
/// Candidates are consulted in order, so the earliest candidate wins even
/// when a later one appears further left in the header row.
pub fn resolve_column<S: AsRef<str>>(headers: &[S], candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        headers
            .iter()
            .position(|header| header.as_ref().trim() == *candidate)
    })
}
