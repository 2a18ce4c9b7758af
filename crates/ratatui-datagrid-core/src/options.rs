use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::features::density::Density;
use crate::features::row_pinning::PinnedRowsState;
use crate::features::sorting::SortDirection;
use crate::locale::LocaleText;
use crate::state_export::GridInitialState;
use crate::value::GridRowModel;
use crate::value::RowId;

/// Feature tier. Pro and Premium features are only wired up when the tier allows them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[default]
    Community,
    Pro,
    Premium,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowSelectionMode {
    Single,
    #[default]
    Multiple,
}

/// Which leaves feed aggregation functions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregationRowsScope {
    #[default]
    Filtered,
    All,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowGroupingColumnMode {
    /// One grouping column for every criterion.
    #[default]
    Single,
    /// One grouping column per criterion.
    Multiple,
}

/// Height hint returned by [`GridOptions::get_row_height`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowHeight {
    Default,
    Fixed(u32),
    /// Content-sized; the row uses its measured height, or the estimate until measured.
    Auto,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetailPanelHeight {
    Fixed(u32),
    Auto,
}

pub struct RowHeightParams<'a> {
    pub id: &'a RowId,
    pub row: &'a GridRowModel,
    pub density: Density,
    pub base_height: u32,
}

pub type GetRowId = Rc<dyn Fn(&GridRowModel) -> Option<RowId>>;
pub type GetRowHeight = Rc<dyn Fn(&RowHeightParams<'_>) -> RowHeight>;
pub type GetDetailPanelHeight = Rc<dyn Fn(&RowId, &GridRowModel) -> DetailPanelHeight>;
pub type IsRowSelectable = Rc<dyn Fn(&RowId, &GridRowModel) -> bool>;
pub type IsCellEditable = Rc<dyn Fn(&RowId, &str) -> bool>;
pub type ProcessRowUpdate =
    Rc<dyn Fn(&GridRowModel, &GridRowModel) -> std::result::Result<GridRowModel, String>>;

/// Grid configuration.
///
/// Options that feed selectors (heights, pagination, tier) live in the state store, so replacing
/// them through [`crate::DataGrid::set_options`] invalidates exactly the derived views that read
/// them.
#[derive(Clone)]
pub struct GridOptions {
    pub tier: Tier,
    pub checkbox_selection: bool,
    pub row_selection_mode: RowSelectionMode,
    pub is_row_selectable: Option<IsRowSelectable>,
    pub keep_non_existent_rows_selected: bool,
    pub disable_multiple_column_sorting: bool,
    pub sorting_order: Vec<Option<SortDirection>>,
    pub pagination: bool,
    pub page_size_options: Vec<usize>,
    pub density: Density,
    pub row_height: u32,
    pub column_header_height: u32,
    pub get_row_height: Option<GetRowHeight>,
    pub estimated_row_height: Option<u32>,
    pub get_detail_panel_height: Option<GetDetailPanelHeight>,
    pub row_overscan: usize,
    pub column_overscan: usize,
    /// Size the grid to its content instead of a fixed viewport.
    pub auto_height: bool,
    /// Rows kept above and below the body (Pro).
    pub pinned_rows: PinnedRowsState,
    pub row_reordering: bool,
    pub aggregation_rows_scope: AggregationRowsScope,
    pub row_grouping_column_mode: RowGroupingColumnMode,
    /// Groups at a depth lower than this start expanded. `-1` expands everything.
    pub default_group_expansion_depth: i32,
    pub quick_filter_debounce: Duration,
    pub edit_debounce: Option<Duration>,
    pub is_cell_editable: Option<IsCellEditable>,
    pub process_row_update: Option<ProcessRowUpdate>,
    pub get_row_id: Option<GetRowId>,
    pub locale_text: LocaleText,
    pub initial_state: Option<GridInitialState>,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            tier: Tier::Community,
            checkbox_selection: false,
            row_selection_mode: RowSelectionMode::Multiple,
            is_row_selectable: None,
            keep_non_existent_rows_selected: false,
            disable_multiple_column_sorting: false,
            sorting_order: vec![Some(SortDirection::Asc), Some(SortDirection::Desc), None],
            pagination: false,
            page_size_options: vec![25, 50, 100],
            density: Density::Standard,
            row_height: 52,
            column_header_height: 56,
            get_row_height: None,
            estimated_row_height: None,
            get_detail_panel_height: None,
            row_overscan: 3,
            column_overscan: 2,
            auto_height: false,
            pinned_rows: PinnedRowsState::default(),
            row_reordering: false,
            aggregation_rows_scope: AggregationRowsScope::Filtered,
            row_grouping_column_mode: RowGroupingColumnMode::Single,
            default_group_expansion_depth: 0,
            quick_filter_debounce: Duration::from_millis(500),
            edit_debounce: None,
            is_cell_editable: None,
            process_row_update: None,
            get_row_id: None,
            locale_text: LocaleText::default(),
            initial_state: None,
        }
    }
}

impl fmt::Debug for GridOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridOptions")
            .field("tier", &self.tier)
            .field("checkbox_selection", &self.checkbox_selection)
            .field("row_selection_mode", &self.row_selection_mode)
            .field("pagination", &self.pagination)
            .field("density", &self.density)
            .field("row_height", &self.row_height)
            .field("row_overscan", &self.row_overscan)
            .field("column_overscan", &self.column_overscan)
            .field("auto_height", &self.auto_height)
            .field("row_reordering", &self.row_reordering)
            .finish_non_exhaustive()
    }
}

impl GridOptions {
    pub fn allows(&self, tier: Tier) -> bool {
        self.tier >= tier
    }

    /// The base row height after applying the density factor.
    pub fn density_row_height(&self, density: Density) -> u32 {
        scale(self.row_height, density.factor())
    }

    pub fn density_header_height(&self, density: Density) -> u32 {
        scale(self.column_header_height, density.factor())
    }
}

fn scale(base: u32, factor: f32) -> u32 {
    ((base as f32) * factor).floor().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density_scales_heights_and_never_reaches_zero() {
        let opts = GridOptions::default();
        assert_eq!(opts.density_row_height(Density::Compact), 36);
        assert_eq!(opts.density_row_height(Density::Standard), 52);
        assert_eq!(opts.density_row_height(Density::Comfortable), 67);

        let tui = GridOptions {
            row_height: 1,
            ..Default::default()
        };
        assert_eq!(tui.density_row_height(Density::Compact), 1);
    }

    #[test]
    fn tiers_are_ordered() {
        let opts = GridOptions {
            tier: Tier::Pro,
            ..Default::default()
        };
        assert!(opts.allows(Tier::Community));
        assert!(opts.allows(Tier::Pro));
        assert!(!opts.allows(Tier::Premium));
    }
}
