use std::ops::Range;
use std::rc::Rc;

use virtualizer::VirtualItem;

use super::AxisPositions;
use super::RenderContext;
use super::RowHeightsState;
use super::ScrollParams;
use super::ViewportState;
use crate::features::columns::VISIBLE_COLUMNS;
use crate::features::columns::VisibleColumns;
use crate::features::density::Density;
use crate::features::detail_panel::DetailPanelState;
use crate::features::pagination::PAGE_ROWS;
use crate::features::pagination::PageRows;
use crate::features::rows::RowEntry;
use crate::features::rows::RowsState;
use crate::options::GridOptions;
use crate::options::RowHeight;
use crate::options::RowHeightParams;
use crate::selector::ByValue;
use crate::selector::MemoizedSelector;
use crate::store::GridState;
use crate::store::GridStore;
use crate::value::RowId;

type VariableRowInputs = (
    Rc<PageRows>,
    Rc<RowsState>,
    Rc<RowHeightsState>,
    Rc<DetailPanelState>,
    Rc<GridOptions>,
    Rc<Density>,
);

type RowSizeInputs = (usize, u32, Option<VariableRowInputs>);

/// Heights of the body rows on the current page, detail panels included.
#[derive(Debug, PartialEq, Eq)]
pub enum RowSizes {
    Uniform { height: u32, count: usize },
    /// Estimated heights by page index, plus the heights measured for content-sized rows.
    Variable {
        estimates: Vec<u32>,
        measured: Vec<(usize, u32)>,
    },
}

/// Without a row height callback or expanded detail panels the sizes are uniform and only depend
/// on the row count and base height.
pub static ROW_SIZES: MemoizedSelector<RowSizeInputs, RowSizes> =
    MemoizedSelector::new("virtualization.rowSizes", row_size_inputs, row_sizes);

/// Row layout of the current page.
///
/// Keyed on the resolved sizes by value: a row edit that leaves every height as it was keeps the
/// existing table.
pub static ROW_POSITIONS: MemoizedSelector<(ByValue<RowSizes>,), AxisPositions> =
    MemoizedSelector::new(
        "virtualization.rowPositions",
        |store| (ByValue(store.select(&ROW_SIZES)),),
        |(sizes,)| row_positions(&sizes.0),
    );

fn row_size_inputs(store: &GridStore) -> RowSizeInputs {
    let page = store.select(&PAGE_ROWS);
    store.read(|s| {
        let base = s.options.density_row_height(*s.density);
        let variable = s.options.get_row_height.is_some() || !s.detail_panel.expanded.is_empty();
        let extra = variable.then(|| {
            (
                page.clone(),
                s.rows.clone(),
                s.row_heights.clone(),
                s.detail_panel.clone(),
                s.options.clone(),
                s.density.clone(),
            )
        });
        (page.rows.len(), base, extra)
    })
}

fn row_sizes((count, base, variable): &RowSizeInputs) -> RowSizes {
    let Some((page, rows, heights, detail, options, density)) = variable else {
        return RowSizes::Uniform {
            height: *base,
            count: *count,
        };
    };
    let density = **density;
    let mut estimates = Vec::with_capacity(page.rows.len());
    let mut measured = Vec::new();
    for (index, entry) in page.rows.iter().enumerate() {
        let panel = detail.height_of(&entry.id);
        let (estimate, known) = if entry.is_group {
            (*base, None)
        } else {
            row_height_parts(options, density, *base, heights, rows, &entry.id)
        };
        estimates.push(estimate + panel);
        if let Some(h) = known {
            measured.push((index, h + panel));
        }
    }
    RowSizes::Variable {
        estimates,
        measured,
    }
}

fn row_positions(sizes: &RowSizes) -> AxisPositions {
    match sizes {
        RowSizes::Uniform { height, count } => AxisPositions::uniform(*height, *count),
        RowSizes::Variable {
            estimates,
            measured,
        } => {
            tracing::trace!(rows = estimates.len(), "rebuilding variable row positions");
            AxisPositions::measured(estimates.iter().copied(), measured.iter().copied())
        }
    }
}

/// Resolved width of every visible column, split into pinned and scrollable regions.
#[derive(Debug, Default)]
pub struct ColumnLayout {
    pub fields: Vec<String>,
    pub widths: Vec<u32>,
    pub left: usize,
    pub right: usize,
    /// Positions of the unpinned columns, relative to the start of the scrollable region.
    pub middle: AxisPositions,
    pub left_width: u64,
    pub right_width: u64,
}

impl ColumnLayout {
    pub fn total_width(&self) -> u64 {
        self.left_width + self.middle.total() + self.right_width
    }

    pub fn middle_range(&self) -> Range<usize> {
        self.left..self.fields.len() - self.right
    }

    pub fn width_of(&self, field: &str) -> Option<u32> {
        self.fields
            .iter()
            .position(|f| f == field)
            .map(|i| self.widths[i])
    }
}

/// Column widths with flex distribution applied against the viewport width. Changes to column
/// order, visibility, width or pinning produce a new visible-column list and thereby a new table.
pub static COLUMN_POSITIONS: MemoizedSelector<(Rc<VisibleColumns>, u32), ColumnLayout> =
    MemoizedSelector::new(
        "virtualization.columnPositions",
        |store| {
            (
                store.select(&VISIBLE_COLUMNS),
                store.read(|s| s.viewport.width),
            )
        },
        |(visible, viewport_width)| column_layout(visible, *viewport_width),
    );

fn column_layout(visible: &VisibleColumns, viewport_width: u32) -> ColumnLayout {
    let columns = &visible.columns;
    let fixed: u64 = columns
        .iter()
        .filter(|c| c.flex.is_none())
        .map(|c| c.base_width() as u64)
        .sum();
    let total_flex: f32 = columns.iter().filter_map(|c| c.flex).filter(|f| *f > 0.0).sum();
    let available = (viewport_width as u64).saturating_sub(fixed) as f32;

    let widths: Vec<u32> = columns
        .iter()
        .map(|c| match c.flex {
            Some(flex) if flex > 0.0 && total_flex > 0.0 && viewport_width > 0 => {
                let share = (available * flex / total_flex).floor() as u32;
                let w = share.max(c.min_width);
                c.max_width.map_or(w, |max| w.min(max.max(c.min_width)))
            }
            _ => c.base_width(),
        })
        .collect();

    let left = visible.left.min(columns.len());
    let right = visible.right.min(columns.len() - left);
    let middle_end = columns.len() - right;
    ColumnLayout {
        fields: columns.iter().map(|c| c.field.clone()).collect(),
        left,
        right,
        middle: AxisPositions::from_sizes(widths[left..middle_end].iter().copied()),
        left_width: widths[..left].iter().map(|w| *w as u64).sum(),
        right_width: widths[middle_end..].iter().map(|w| *w as u64).sum(),
        widths,
    }
}

pub(crate) fn row_height(
    options: &GridOptions,
    density: Density,
    base: u32,
    heights: &RowHeightsState,
    rows: &RowsState,
    id: &RowId,
) -> u32 {
    let (estimate, measured) = row_height_parts(options, density, base, heights, rows, id);
    measured.unwrap_or(estimate)
}

/// Estimated height of a body row and, for content-sized rows, the height measured so far.
fn row_height_parts(
    options: &GridOptions,
    density: Density,
    base: u32,
    heights: &RowHeightsState,
    rows: &RowsState,
    id: &RowId,
) -> (u32, Option<u32>) {
    let (Some(get), Some(row)) = (&options.get_row_height, rows.lookup.get(id)) else {
        return (base, None);
    };
    let params = RowHeightParams {
        id,
        row,
        density,
        base_height: base,
    };
    match get(&params) {
        RowHeight::Default => (base, None),
        RowHeight::Fixed(h) => (h.max(1), None),
        RowHeight::Auto => (
            options.estimated_row_height.unwrap_or(base).max(1),
            heights.measured.get(id).map(|h| (*h).max(1)),
        ),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayKind {
    Loading,
    NoRows,
    NoResults,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedRow {
    pub id: RowId,
    /// Index within the current page; `None` for pinned rows.
    pub index: Option<usize>,
    pub depth: i32,
    pub is_group: bool,
    /// Content offset of the row's top edge, pinned top rows included.
    pub offset: u64,
    pub height: u32,
    pub detail_height: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedColumn {
    pub field: String,
    pub index: usize,
    /// Offset within the column's region (left pinned, scrollable, or right pinned).
    pub offset: u64,
    pub width: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderWindow {
    pub context: RenderContext,
    /// Whether the context differs from the previous computation.
    pub changed: bool,
    pub rows: Vec<RenderedRow>,
    pub pinned_top: Vec<RenderedRow>,
    pub pinned_bottom: Vec<RenderedRow>,
    pub columns: Vec<RenderedColumn>,
    pub pinned_left: Vec<RenderedColumn>,
    pub pinned_right: Vec<RenderedColumn>,
    pub scroll_top: u64,
    pub scroll_left: u64,
    /// Height available to body rows once pinned rows are laid out.
    pub body_height: u32,
    pub body_width: u32,
    pub total_height: u64,
    pub total_width: u64,
    pub overlay: Option<OverlayKind>,
}

/// Computes render windows and remembers the last context to flag no-op recomputation.
#[derive(Debug, Default)]
pub struct RenderWindowEngine {
    last: Option<RenderContext>,
}

struct Frame {
    page: Rc<PageRows>,
    positions: Rc<AxisPositions>,
    layout: Rc<ColumnLayout>,
    pinned_top: Vec<RenderedRow>,
    pinned_bottom: Vec<RenderedRow>,
    pinned_top_height: u64,
    pinned_bottom_height: u64,
    body_height: u32,
    body_width: u32,
    max_top: u64,
    max_left: u64,
}

fn frame(store: &GridStore) -> Frame {
    let page = store.select(&PAGE_ROWS);
    let positions = store.select(&ROW_POSITIONS);
    let layout = store.select(&COLUMN_POSITIONS);
    let state = store.state();

    let pinned_top = pinned_rows(&state, &state.pinned_rows.top, 0);
    let pinned_top_height: u64 = pinned_top.iter().map(|r| r.height as u64).sum();
    let bottom_start = pinned_top_height + positions.total();
    let pinned_bottom = pinned_rows(&state, &state.pinned_rows.bottom, bottom_start);
    let pinned_bottom_height: u64 = pinned_bottom.iter().map(|r| r.height as u64).sum();

    let body_height = if state.options.auto_height {
        positions.total().min(u32::MAX as u64) as u32
    } else {
        (state.viewport.height as u64)
            .saturating_sub(pinned_top_height + pinned_bottom_height)
            .min(u32::MAX as u64) as u32
    };
    let body_width = (state.viewport.width as u64)
        .saturating_sub(layout.left_width + layout.right_width)
        .min(u32::MAX as u64) as u32;
    let max_top = if state.options.auto_height {
        0
    } else {
        positions.total().saturating_sub(body_height as u64)
    };
    let max_left = layout.middle.total().saturating_sub(body_width as u64);

    Frame {
        page,
        positions,
        layout,
        pinned_top,
        pinned_bottom,
        pinned_top_height,
        pinned_bottom_height,
        body_height,
        body_width,
        max_top,
        max_left,
    }
}

fn pinned_rows(state: &GridState, ids: &[RowId], start: u64) -> Vec<RenderedRow> {
    if !state.options.allows(crate::options::Tier::Pro) {
        return Vec::new();
    }
    let base = state.options.density_row_height(*state.density);
    let mut offset = start;
    ids.iter()
        .filter(|id| state.rows.lookup.contains_key(*id))
        .map(|id| {
            let height = row_height(
                &state.options,
                *state.density,
                base,
                &state.row_heights,
                &state.rows,
                id,
            );
            let row = RenderedRow {
                id: id.clone(),
                index: None,
                depth: 0,
                is_group: false,
                offset,
                height,
                detail_height: 0,
            };
            offset += height as u64;
            row
        })
        .collect()
}

pub(crate) fn scroll_limits(store: &GridStore) -> (u64, u64) {
    let f = frame(store);
    (f.max_left, f.max_top)
}

pub(crate) fn row_offset(store: &GridStore, index: usize) -> u64 {
    let positions = store.select(&ROW_POSITIONS);
    let top: u64 = store.read(|s| {
        pinned_rows(s, &s.pinned_rows.top, 0)
            .iter()
            .map(|r| r.height as u64)
            .sum()
    });
    top + positions.offset_of(index)
}

pub(crate) fn scroll_target(
    store: &GridStore,
    viewport: ViewportState,
    row_index: Option<usize>,
    column_index: Option<usize>,
) -> Option<ScrollParams> {
    let f = frame(store);
    let mut target = ScrollParams::default();

    if let Some(index) = row_index.filter(|i| *i < f.positions.len()) {
        let current = viewport.scroll_top.min(f.max_top);
        let top = f.positions.scroll_into_view(index, current, f.body_height);
        if top != viewport.scroll_top {
            target.top = Some(top);
        }
    }

    if let Some(index) = column_index {
        let middle = f.layout.middle_range();
        if middle.contains(&index) {
            let current = viewport.scroll_left.min(f.max_left);
            let left = f
                .layout
                .middle
                .scroll_into_view(index - middle.start, current, f.body_width);
            if left != viewport.scroll_left {
                target.left = Some(left);
            }
        }
    }

    (target.top.is_some() || target.left.is_some()).then_some(target)
}

fn span(items: &[VirtualItem]) -> Range<usize> {
    match (items.first(), items.last()) {
        (Some(first), Some(last)) => first.index..last.index + 1,
        _ => 0..0,
    }
}

fn overlay(state: &GridState, page: &PageRows, pinned: usize) -> Option<OverlayKind> {
    if state.rows.loading {
        Some(OverlayKind::Loading)
    } else if state.rows.ids.is_empty() {
        Some(OverlayKind::NoRows)
    } else if page.rows.is_empty() && pinned == 0 {
        Some(OverlayKind::NoResults)
    } else {
        None
    }
}

impl RenderWindowEngine {
    pub fn last_context(&self) -> Option<RenderContext> {
        self.last
    }

    pub fn compute(&mut self, store: &GridStore) -> RenderWindow {
        let f = frame(store);
        let state = store.state();
        let viewport = *state.viewport;
        let scroll_top = viewport.scroll_top.min(f.max_top);
        let scroll_left = viewport.scroll_left.min(f.max_left);

        // Auto-height lays out every row: the body is as tall as the content and never scrolls.
        let row_items = f
            .positions
            .items(scroll_top, f.body_height, state.options.row_overscan);
        let row_range = span(&row_items);
        let base = state.options.density_row_height(*state.density);
        let rows: Vec<RenderedRow> = row_items
            .iter()
            .filter_map(|item| f.page.rows.get(item.index).map(|entry| (item, entry)))
            .map(|(item, entry)| self.body_row(&f, &state, base, item, entry))
            .collect();

        let middle = f.layout.middle_range();
        let column_items =
            f.layout
                .middle
                .items(scroll_left, f.body_width, state.options.column_overscan);
        let column_range = span(&column_items);
        let columns: Vec<RenderedColumn> = column_items
            .iter()
            .map(|item| RenderedColumn {
                field: f.layout.fields[middle.start + item.index].clone(),
                index: middle.start + item.index,
                offset: item.start,
                width: item.size,
            })
            .collect();
        let pinned_left = region(&f.layout, 0..f.layout.left);
        let pinned_right = region(&f.layout, middle.end..f.layout.fields.len());

        let context = RenderContext {
            first_row_index: row_range.start,
            last_row_index: row_range.end,
            first_column_index: middle.start + column_range.start,
            last_column_index: middle.start + column_range.end,
        };
        let changed = self.last != Some(context);
        if changed {
            tracing::trace!(?context, "render context changed");
        }
        self.last = Some(context);

        let pinned_count = f.pinned_top.len() + f.pinned_bottom.len();
        RenderWindow {
            context,
            changed,
            overlay: overlay(&state, &f.page, pinned_count),
            total_height: f.pinned_top_height + f.positions.total() + f.pinned_bottom_height,
            total_width: f.layout.total_width(),
            body_height: f.body_height,
            body_width: f.body_width,
            scroll_top,
            scroll_left,
            rows,
            columns,
            pinned_left,
            pinned_right,
            pinned_top: f.pinned_top,
            pinned_bottom: f.pinned_bottom,
        }
    }

    fn body_row(
        &self,
        f: &Frame,
        state: &GridState,
        base: u32,
        item: &VirtualItem,
        entry: &RowEntry,
    ) -> RenderedRow {
        let size = item.size;
        let height = if entry.is_group || f.positions.is_uniform() {
            base.min(size)
        } else {
            row_height(
                &state.options,
                *state.density,
                base,
                &state.row_heights,
                &state.rows,
                &entry.id,
            )
            .min(size)
        };
        RenderedRow {
            id: entry.id.clone(),
            index: Some(item.index),
            depth: entry.depth,
            is_group: entry.is_group,
            offset: f.pinned_top_height + item.start,
            height,
            detail_height: size - height,
        }
    }
}

fn region(layout: &ColumnLayout, range: Range<usize>) -> Vec<RenderedColumn> {
    let mut offset = 0u64;
    range
        .map(|i| {
            let col = RenderedColumn {
                field: layout.fields[i].clone(),
                index: i,
                offset,
                width: layout.widths[i],
            };
            offset += layout.widths[i] as u64;
            col
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDef;

    fn visible(widths: &[(u32, Option<f32>)], left: usize, right: usize) -> VisibleColumns {
        VisibleColumns {
            columns: widths
                .iter()
                .enumerate()
                .map(|(i, (w, flex))| ColumnDef {
                    width: Some(*w),
                    min_width: 1,
                    flex: *flex,
                    ..ColumnDef::new(format!("c{i}"))
                })
                .collect(),
            left,
            right,
        }
    }

    #[test]
    fn flex_columns_share_the_remaining_width() {
        let layout = column_layout(&visible(&[(10, None), (0, Some(1.0)), (0, Some(3.0))], 0, 0), 90);
        assert_eq!(layout.widths, vec![10, 20, 60]);
        assert_eq!(layout.total_width(), 90);
    }

    #[test]
    fn pinned_columns_are_excluded_from_the_scrollable_table() {
        let layout = column_layout(&visible(&[(5, None), (10, None), (10, None), (7, None)], 1, 1), 0);
        assert_eq!(layout.left_width, 5);
        assert_eq!(layout.right_width, 7);
        assert_eq!(layout.middle.len(), 2);
        assert_eq!(layout.middle_range(), 1..3);
    }
}
