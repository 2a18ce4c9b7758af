use ratatui::text::Line;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::features::filtering::FilterOperator;
use crate::value::CellValue;
use crate::value::GridRowModel;
use crate::value::RowId;

pub const DEFAULT_COLUMN_WIDTH: u32 = 100;
pub const DEFAULT_MIN_COLUMN_WIDTH: u32 = 50;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColumnType {
    #[default]
    String,
    Number,
    Date,
    Boolean,
    /// Synthetic columns (checkbox, reorder handle, grouping).
    Actions,
}

pub type ValueGetter = Rc<dyn Fn(&GridRowModel) -> CellValue>;
pub type ValueFormatter = Rc<dyn Fn(&CellValue) -> String>;
pub type ValueParser = Rc<dyn Fn(&str) -> CellValue>;
pub type SortComparator = Rc<dyn Fn(&CellValue, &CellValue) -> Ordering>;
pub type CellRenderer = Rc<dyn Fn(&CellParams) -> Line<'static>>;
pub type HeaderRenderer = Rc<dyn Fn(&HeaderParams) -> Line<'static>>;

/// What a cell renderer receives.
#[derive(Clone, Debug)]
pub struct CellParams {
    pub id: RowId,
    pub field: String,
    pub value: CellValue,
    pub formatted: String,
    pub depth: i32,
    pub is_group: bool,
    pub is_selected: bool,
    pub is_focused: bool,
    pub is_editing: bool,
    pub width: u32,
}

#[derive(Clone, Debug)]
pub struct HeaderParams {
    pub field: String,
    pub label: String,
    pub sort_direction: Option<crate::features::sorting::SortDirection>,
    pub sort_index: Option<usize>,
    pub width: u32,
}

/// A column definition as supplied by the user (or injected by a feature module).
#[derive(Clone)]
pub struct ColumnDef {
    pub field: String,
    pub header_name: Option<String>,
    pub column_type: ColumnType,
    pub width: Option<u32>,
    pub min_width: u32,
    pub max_width: Option<u32>,
    pub flex: Option<f32>,
    pub sortable: bool,
    pub filterable: bool,
    pub hideable: bool,
    pub groupable: bool,
    pub editable: bool,
    pub pinnable: bool,
    pub aggregable: bool,
    pub value_getter: Option<ValueGetter>,
    pub value_formatter: Option<ValueFormatter>,
    pub value_parser: Option<ValueParser>,
    pub sort_comparator: Option<SortComparator>,
    pub filter_operators: Option<Vec<FilterOperator>>,
    pub render_cell: Option<CellRenderer>,
    pub render_edit_cell: Option<CellRenderer>,
    pub render_header: Option<HeaderRenderer>,
    /// Set on columns injected through `hydrateColumns`; they never export or aggregate.
    pub synthetic: bool,
}

impl Default for ColumnDef {
    fn default() -> Self {
        Self {
            field: String::new(),
            header_name: None,
            column_type: ColumnType::String,
            width: None,
            min_width: DEFAULT_MIN_COLUMN_WIDTH,
            max_width: None,
            flex: None,
            sortable: true,
            filterable: true,
            hideable: true,
            groupable: true,
            editable: false,
            pinnable: true,
            aggregable: true,
            value_getter: None,
            value_formatter: None,
            value_parser: None,
            sort_comparator: None,
            filter_operators: None,
            render_cell: None,
            render_edit_cell: None,
            render_header: None,
            synthetic: false,
        }
    }
}

impl fmt::Debug for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDef")
            .field("field", &self.field)
            .field("header_name", &self.header_name)
            .field("column_type", &self.column_type)
            .field("width", &self.width)
            .field("flex", &self.flex)
            .field("synthetic", &self.synthetic)
            .finish_non_exhaustive()
    }
}

impl ColumnDef {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header_name = Some(header.into());
        self
    }

    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_min_width(mut self, min_width: u32) -> Self {
        self.min_width = min_width;
        self
    }

    pub fn with_flex(mut self, flex: f32) -> Self {
        self.flex = Some(flex);
        self
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn with_value_getter(mut self, f: impl Fn(&GridRowModel) -> CellValue + 'static) -> Self {
        self.value_getter = Some(Rc::new(f));
        self
    }

    pub fn with_value_formatter(mut self, f: impl Fn(&CellValue) -> String + 'static) -> Self {
        self.value_formatter = Some(Rc::new(f));
        self
    }

    pub fn with_value_parser(mut self, f: impl Fn(&str) -> CellValue + 'static) -> Self {
        self.value_parser = Some(Rc::new(f));
        self
    }

    pub fn with_sort_comparator(
        mut self,
        f: impl Fn(&CellValue, &CellValue) -> Ordering + 'static,
    ) -> Self {
        self.sort_comparator = Some(Rc::new(f));
        self
    }

    pub fn with_render_cell(mut self, f: impl Fn(&CellParams) -> Line<'static> + 'static) -> Self {
        self.render_cell = Some(Rc::new(f));
        self
    }

    pub fn header_label(&self) -> &str {
        self.header_name.as_deref().unwrap_or(&self.field)
    }

    /// Reads this column's value from a row, honoring `value_getter`.
    pub fn value(&self, row: &GridRowModel) -> CellValue {
        match &self.value_getter {
            Some(getter) => getter(row),
            None => row.get(&self.field).cloned().unwrap_or_default(),
        }
    }

    pub fn format(&self, value: &CellValue) -> String {
        match &self.value_formatter {
            Some(fmt) => fmt(value),
            None => value.to_string(),
        }
    }

    /// Parses edited text. Without a parser, number and boolean columns coerce the text and
    /// everything else keeps it verbatim.
    pub fn parse(&self, input: &str) -> CellValue {
        if let Some(parser) = &self.value_parser {
            return parser(input);
        }
        if input.trim().is_empty() {
            return CellValue::Null;
        }
        match self.column_type {
            ColumnType::Number => input
                .trim()
                .parse::<f64>()
                .map(CellValue::Number)
                .unwrap_or_else(|_| CellValue::Text(input.to_string())),
            ColumnType::Boolean => CellValue::text(input)
                .as_bool()
                .map(CellValue::Bool)
                .unwrap_or_else(|| CellValue::Text(input.to_string())),
            _ => CellValue::Text(input.to_string()),
        }
    }

    pub fn compare(&self, a: &CellValue, b: &CellValue) -> Ordering {
        match &self.sort_comparator {
            Some(cmp) => cmp(a, b),
            None => a.compare(b),
        }
    }

    /// Resolved width before flex distribution.
    pub fn base_width(&self) -> u32 {
        let w = self.width.unwrap_or(DEFAULT_COLUMN_WIDTH).max(self.min_width);
        match self.max_width {
            Some(max) => w.min(max.max(self.min_width)),
            None => w,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::row;

    #[test]
    fn value_getter_overrides_field_lookup() {
        let col = ColumnDef::new("full").with_value_getter(|r| {
            let first = r.get("first").map(|v| v.to_string()).unwrap_or_default();
            let last = r.get("last").map(|v| v.to_string()).unwrap_or_default();
            CellValue::Text(format!("{first} {last}"))
        });
        let r = row([("first", "Ada"), ("last", "Lovelace")]);
        assert_eq!(col.value(&r), CellValue::text("Ada Lovelace"));
    }

    #[test]
    fn number_columns_parse_numeric_text() {
        let col = ColumnDef::new("n").with_type(ColumnType::Number);
        assert_eq!(col.parse("42"), CellValue::Number(42.0));
        assert_eq!(col.parse(""), CellValue::Null);
        assert_eq!(col.parse("abc"), CellValue::text("abc"));
    }

    #[test]
    fn base_width_respects_min_and_max() {
        let col = ColumnDef {
            width: Some(10),
            min_width: 20,
            ..ColumnDef::new("a")
        };
        assert_eq!(col.base_width(), 20);
        let col = ColumnDef {
            width: Some(500),
            max_width: Some(300),
            ..ColumnDef::new("a")
        };
        assert_eq!(col.base_width(), 300);
    }
}
