//! Locale text lookup.
//!
//! Keys resolve either to plain text or to a formatter taking interpolation arguments; callers
//! must check which shape they got before using it.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub enum LocaleArg {
    Count(usize),
    Text(String),
}

impl fmt::Display for LocaleArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocaleArg::Count(n) => write!(f, "{n}"),
            LocaleArg::Text(s) => f.write_str(s),
        }
    }
}

impl LocaleArg {
    fn count(&self) -> usize {
        match self {
            LocaleArg::Count(n) => *n,
            LocaleArg::Text(s) => s.parse().unwrap_or(0),
        }
    }
}

pub type LocaleFormatter = Rc<dyn Fn(&[LocaleArg]) -> String>;

#[derive(Clone)]
pub enum LocaleEntry {
    Text(String),
    Format(LocaleFormatter),
}

impl fmt::Debug for LocaleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocaleEntry::Text(s) => f.debug_tuple("Text").field(s).finish(),
            LocaleEntry::Format(_) => f.write_str("Format(..)"),
        }
    }
}

impl LocaleEntry {
    /// Text entries ignore `args`; formatter entries receive them.
    pub fn resolve(&self, args: &[LocaleArg]) -> String {
        match self {
            LocaleEntry::Text(s) => s.clone(),
            LocaleEntry::Format(f) => f(args),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            LocaleEntry::Text(s) => Some(s),
            LocaleEntry::Format(_) => None,
        }
    }
}

pub mod keys {
    pub const NO_ROWS_LABEL: &str = "noRowsLabel";
    pub const NO_RESULTS_OVERLAY_LABEL: &str = "noResultsOverlayLabel";
    pub const LOADING_LABEL: &str = "loadingLabel";
    pub const FOOTER_ROW_SELECTED: &str = "footerRowSelected";
    pub const FOOTER_TOTAL_ROWS: &str = "footerTotalRows";
    pub const FOOTER_TOTAL_VISIBLE_ROWS: &str = "footerTotalVisibleRows";
    pub const PAGINATION_DISPLAYED_ROWS: &str = "paginationDisplayedRows";
    pub const COLUMN_MENU_SORT_ASC: &str = "columnMenuSortAsc";
    pub const COLUMN_MENU_SORT_DESC: &str = "columnMenuSortDesc";
    pub const COLUMN_MENU_UNSORT: &str = "columnMenuUnsort";
    pub const COLUMN_MENU_FILTER: &str = "columnMenuFilter";
    pub const COLUMN_MENU_HIDE_COLUMN: &str = "columnMenuHideColumn";
    pub const COLUMN_MENU_MANAGE_COLUMNS: &str = "columnMenuManageColumns";
    pub const PIN_TO_LEFT: &str = "pinToLeft";
    pub const PIN_TO_RIGHT: &str = "pinToRight";
    pub const UNPIN: &str = "unpin";
    pub const GROUP_COLUMN: &str = "groupColumn";
    pub const UNGROUP_COLUMN: &str = "unGroupColumn";
    pub const GROUPING_COLUMN_HEADER_NAME: &str = "groupingColumnHeaderName";
    pub const CHECKBOX_SELECTION_HEADER_NAME: &str = "checkboxSelectionHeaderName";
    pub const ROW_REORDERING_HEADER_NAME: &str = "rowReorderingHeaderName";
    pub const TOOLBAR_EXPORT_CSV: &str = "toolbarExportCSV";
    pub const TOOLBAR_EXPORT_PRINT: &str = "toolbarExportPrint";
    pub const TOOLBAR_EXPORT_EXCEL: &str = "toolbarExportExcel";
    pub const AGGREGATION_MENU_ITEM_HEADER: &str = "aggregationMenuItemHeader";
    pub const AGGREGATION_FUNCTION_LABEL_SUM: &str = "aggregationFunctionLabelSum";
    pub const AGGREGATION_FUNCTION_LABEL_AVG: &str = "aggregationFunctionLabelAvg";
    pub const AGGREGATION_FUNCTION_LABEL_MIN: &str = "aggregationFunctionLabelMin";
    pub const AGGREGATION_FUNCTION_LABEL_MAX: &str = "aggregationFunctionLabelMax";
    pub const AGGREGATION_FUNCTION_LABEL_SIZE: &str = "aggregationFunctionLabelSize";
}

/// A keyed locale table. [`Default`] is English.
#[derive(Clone, Debug)]
pub struct LocaleText {
    entries: HashMap<String, LocaleEntry>,
}

impl Default for LocaleText {
    fn default() -> Self {
        use keys::*;

        let mut t = Self {
            entries: HashMap::new(),
        };
        t.set_text(NO_ROWS_LABEL, "No rows");
        t.set_text(NO_RESULTS_OVERLAY_LABEL, "No results found.");
        t.set_text(LOADING_LABEL, "Loading...");
        t.set_format(FOOTER_ROW_SELECTED, |args| {
            let n = args.first().map(LocaleArg::count).unwrap_or(0);
            if n == 1 {
                "1 row selected".to_string()
            } else {
                format!("{n} rows selected")
            }
        });
        t.set_text(FOOTER_TOTAL_ROWS, "Total Rows:");
        t.set_format(FOOTER_TOTAL_VISIBLE_ROWS, |args| {
            let visible = args.first().map(LocaleArg::count).unwrap_or(0);
            let total = args.get(1).map(LocaleArg::count).unwrap_or(0);
            format!("{visible} of {total}")
        });
        t.set_format(PAGINATION_DISPLAYED_ROWS, |args| {
            let from = args.first().map(LocaleArg::count).unwrap_or(0);
            let to = args.get(1).map(LocaleArg::count).unwrap_or(0);
            let count = args.get(2).map(LocaleArg::count).unwrap_or(0);
            format!("{from}–{to} of {count}")
        });
        t.set_text(COLUMN_MENU_SORT_ASC, "Sort by ASC");
        t.set_text(COLUMN_MENU_SORT_DESC, "Sort by DESC");
        t.set_text(COLUMN_MENU_UNSORT, "Unsort");
        t.set_text(COLUMN_MENU_FILTER, "Filter");
        t.set_text(COLUMN_MENU_HIDE_COLUMN, "Hide column");
        t.set_text(COLUMN_MENU_MANAGE_COLUMNS, "Manage columns");
        t.set_text(PIN_TO_LEFT, "Pin to left");
        t.set_text(PIN_TO_RIGHT, "Pin to right");
        t.set_text(UNPIN, "Unpin");
        t.set_format(GROUP_COLUMN, |args| {
            format!("Group by {}", args.first().map(|a| a.to_string()).unwrap_or_default())
        });
        t.set_format(UNGROUP_COLUMN, |args| {
            format!("Stop grouping by {}", args.first().map(|a| a.to_string()).unwrap_or_default())
        });
        t.set_text(GROUPING_COLUMN_HEADER_NAME, "Group");
        t.set_text(CHECKBOX_SELECTION_HEADER_NAME, "Checkbox selection");
        t.set_text(ROW_REORDERING_HEADER_NAME, "Row reordering");
        t.set_text(TOOLBAR_EXPORT_CSV, "Download as CSV");
        t.set_text(TOOLBAR_EXPORT_PRINT, "Print");
        t.set_text(TOOLBAR_EXPORT_EXCEL, "Download as Excel");
        t.set_text(AGGREGATION_MENU_ITEM_HEADER, "Aggregation");
        t.set_text(AGGREGATION_FUNCTION_LABEL_SUM, "sum");
        t.set_text(AGGREGATION_FUNCTION_LABEL_AVG, "avg");
        t.set_text(AGGREGATION_FUNCTION_LABEL_MIN, "min");
        t.set_text(AGGREGATION_FUNCTION_LABEL_MAX, "max");
        t.set_text(AGGREGATION_FUNCTION_LABEL_SIZE, "size");
        t
    }
}

impl LocaleText {
    pub fn get(&self, key: &str) -> Option<&LocaleEntry> {
        self.entries.get(key)
    }

    pub fn set_text(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.entries.insert(key.into(), LocaleEntry::Text(text.into()));
    }

    pub fn set_format(
        &mut self,
        key: impl Into<String>,
        f: impl Fn(&[LocaleArg]) -> String + 'static,
    ) {
        self.entries.insert(key.into(), LocaleEntry::Format(Rc::new(f)));
    }

    /// Resolves `key`, falling back to the key itself when it is missing.
    pub fn resolve(&self, key: &str, args: &[LocaleArg]) -> String {
        match self.entries.get(key) {
            Some(entry) => entry.resolve(args),
            None => {
                tracing::debug!(key, "missing locale text");
                key.to_string()
            }
        }
    }

    /// Overlays every entry of `overrides` on top of this table.
    pub fn merge(&mut self, overrides: LocaleText) {
        self.entries.extend(overrides.entries);
    }

    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_resolve_to_text_or_formatter() {
        let t = LocaleText::default();
        assert_eq!(t.get(keys::NO_ROWS_LABEL).and_then(LocaleEntry::as_text), Some("No rows"));

        let entry = t.get(keys::FOOTER_TOTAL_VISIBLE_ROWS).unwrap();
        assert!(entry.as_text().is_none());
        assert_eq!(
            entry.resolve(&[LocaleArg::Count(5), LocaleArg::Count(20)]),
            "5 of 20"
        );
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut t = LocaleText::default();
        let mut fr = LocaleText::empty();
        fr.set_text(keys::NO_ROWS_LABEL, "Pas de résultats");
        t.merge(fr);
        assert_eq!(t.resolve(keys::NO_ROWS_LABEL, &[]), "Pas de résultats");
        assert_eq!(t.resolve("unknownKey", &[]), "unknownKey");
    }
}
