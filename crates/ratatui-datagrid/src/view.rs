use crate::input::InputEvent;
use crate::input::KeyCode;
use crate::input::KeyEvent;
use crate::input::MouseEvent;
use crate::input::MouseEventKind;
use crate::keymap::GridCommand;
use crate::keymap::GridKeymap;
use crate::render;
use crate::slots::CellSlotProps;
use crate::slots::ColumnHeaderSlotProps;
use crate::slots::DataGridSlots;
use crate::slots::DetailPanelSlotProps;
use crate::slots::FooterSlotProps;
use crate::slots::GroupCellSlotProps;
use crate::slots::OverlaySlotProps;
use crate::theme::Theme;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::text::Span;
use ratatui_datagrid_core::ColumnDef;
use ratatui_datagrid_core::ColumnType;
use ratatui_datagrid_core::DataGrid;
use ratatui_datagrid_core::GridError;
use ratatui_datagrid_core::GridOptions;
use ratatui_datagrid_core::RowId;
use ratatui_datagrid_core::Tier;
use ratatui_datagrid_core::column::CellParams;
use ratatui_datagrid_core::column::HeaderParams;
use ratatui_datagrid_core::features::aggregation::AggregationResult;
use ratatui_datagrid_core::features::columns::VisibleColumns;
use ratatui_datagrid_core::features::density::Density;
use ratatui_datagrid_core::features::editing::CellEditStopReason;
use ratatui_datagrid_core::features::editing::EditCell;
use ratatui_datagrid_core::features::focus::FocusMove;
use ratatui_datagrid_core::features::focus::FocusedCell;
use ratatui_datagrid_core::features::reorder::REORDER_FIELD;
use ratatui_datagrid_core::features::row_grouping::group_cell_value;
use ratatui_datagrid_core::features::selection::CHECKBOX_FIELD;
use ratatui_datagrid_core::features::selection::SelectAllScope;
use ratatui_datagrid_core::locale::LocaleArg;
use ratatui_datagrid_core::locale::keys;
use ratatui_datagrid_core::store::GridState;
use ratatui_datagrid_core::virtualization::OverlayKind;
use ratatui_datagrid_core::virtualization::RenderWindow;
use ratatui_datagrid_core::virtualization::RenderedColumn;
use ratatui_datagrid_core::virtualization::RenderedRow;
use std::rc::Rc;
use std::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataGridAction {
    None,
    Redraw,
    /// Enter on a cell that cannot be edited.
    Activated(FocusedCell),
    SelectionChanged,
}

/// Options for [`DataGridView`].
///
/// Styles left at `Style::default()` fall back to the view's [`Theme`].
#[derive(Clone, Debug)]
pub struct DataGridViewOptions {
    pub show_header: bool,
    pub show_footer: bool,
    pub show_scrollbar_y: bool,
    /// Blank cells kept at the right edge of every column.
    pub col_gap: u16,
    /// Rows scrolled per mouse wheel notch.
    pub wheel_rows: u32,
    pub style: Style,
    pub header_style: Style,
    pub scrollbar_style: Style,
    pub cursor_style: Style,
    pub selected_style: Style,
}

impl Default for DataGridViewOptions {
    fn default() -> Self {
        Self {
            show_header: true,
            show_footer: true,
            show_scrollbar_y: true,
            col_gap: 1,
            wheel_rows: 3,
            style: Style::default(),
            header_style: Style::default(),
            scrollbar_style: Style::default(),
            cursor_style: Style::default(),
            selected_style: Style::default(),
        }
    }
}

/// Grid options sized for terminal cells: every row and the header are one line tall.
pub fn tui_options() -> GridOptions {
    GridOptions {
        row_height: 1,
        column_header_height: 1,
        row_overscan: 2,
        column_overscan: 1,
        ..Default::default()
    }
}

/// A column `width` cells wide that may shrink down to a single cell.
pub fn tui_column(field: impl Into<String>, width: u16) -> ColumnDef {
    ColumnDef::new(field)
        .with_width(width as u32)
        .with_min_width(1)
}

/// Terminal frontend of a [`DataGrid`].
///
/// The view keeps no grid state of its own: every frame it sizes the grid's viewport to the body
/// area, asks for the render window and paints it. Input is translated into calls on the grid's
/// feature modules.
///
/// Drive it from your app loop by calling `handle_event` and `render`, and `DataGrid::tick` once
/// per loop iteration so debounced edits and quick filter input settle.
pub struct DataGridView {
    options: DataGridViewOptions,
    theme: Theme,
    pub slots: DataGridSlots,
    pub keymap: GridKeymap,
    hits: HitMap,
    page_rows: usize,
}

impl Default for DataGridView {
    fn default() -> Self {
        Self {
            options: DataGridViewOptions::default(),
            theme: Theme::default(),
            slots: DataGridSlots::default(),
            keymap: GridKeymap::default(),
            hits: HitMap::default(),
            page_rows: 1,
        }
    }
}

/// Screen geometry of the last frame, for mouse hit testing.
#[derive(Clone, Debug, Default)]
struct HitMap {
    header_y: Option<u16>,
    columns: Vec<(u16, u16, String)>,
    rows: Vec<(u16, u16, RowId)>,
}

impl HitMap {
    fn field_at(&self, x: u16) -> Option<&str> {
        self.columns
            .iter()
            .find(|(x0, w, _)| x >= *x0 && x < x0 + w)
            .map(|(_, _, f)| f.as_str())
    }

    fn row_at(&self, y: u16) -> Option<&RowId> {
        self.rows
            .iter()
            .find(|(y0, h, _)| y >= *y0 && y < y0 + h)
            .map(|(_, _, id)| id)
    }
}

#[derive(Clone, Copy)]
struct GridStyles {
    base: Style,
    header: Style,
    cursor: Style,
    selected: Style,
    editing: Style,
    group: Style,
    pinned: Style,
    muted: Style,
    overlay: Style,
    footer: Style,
}

/// Visible part of one column on screen.
#[derive(Clone, Copy, Debug)]
struct ColumnSlice {
    index: usize,
    x: u16,
    width: u16,
    clip_left: u32,
    full_width: u32,
    pinned: bool,
}

/// Visible part of one row, detail panel included.
#[derive(Clone, Copy, Debug)]
struct RowSlice<'a> {
    row: &'a RenderedRow,
    y: u16,
    height: u16,
    clip_top: u32,
    pinned: bool,
}

/// Everything a frame reads from the grid, captured once.
struct Frame<'a> {
    grid: &'a DataGrid,
    state: GridState,
    visible: Rc<VisibleColumns>,
    aggregates: Rc<AggregationResult>,
    styles: GridStyles,
}

impl Frame<'_> {
    fn column(&self, index: usize) -> Option<&ColumnDef> {
        self.visible.columns.get(index)
    }
}

impl DataGridView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DataGridViewOptions) -> Self {
        let mut v = Self::default();
        v.set_options(options);
        v
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_slots(mut self, slots: DataGridSlots) -> Self {
        self.slots = slots;
        self
    }

    pub fn options(&self) -> &DataGridViewOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: DataGridViewOptions) {
        self.options = options;
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn render(&mut self, grid: &DataGrid, area: Rect, buf: &mut Buffer) {
        self.hits = HitMap::default();
        if area.width == 0 || area.height == 0 {
            return;
        }

        let header_h = u16::from(self.options.show_header).min(area.height);
        let footer_values = grid.aggregation().footer_values();
        let footer_lines = if self.options.show_footer {
            1 + u16::from(!footer_values.is_empty())
        } else {
            0
        };
        let footer_h = if area.height > header_h + footer_lines {
            footer_lines
        } else {
            0
        };

        let (content_area, scrollbar_x) = if self.options.show_scrollbar_y && area.width >= 2 {
            (
                Rect::new(area.x, area.y, area.width - 1, area.height),
                Some(area.x + area.width - 1),
            )
        } else {
            (area, None)
        };
        let header_area = Rect::new(content_area.x, content_area.y, content_area.width, header_h);
        let body_area = Rect::new(
            content_area.x,
            content_area.y + header_h,
            content_area.width,
            content_area.height - header_h - footer_h,
        );

        let styles = self.styles();
        buf.set_style(area, styles.base);

        grid.virtualization()
            .set_viewport_size(body_area.width as u32, body_area.height as u32);
        self.measure_detail_panels(grid, body_area.width);
        let window = grid.render_window();
        let frame = Frame {
            grid,
            state: grid.store().state(),
            visible: grid.columns().visible_columns(),
            aggregates: grid.aggregation().aggregation_result(),
            styles,
        };
        let columns = column_slices(&window, body_area);
        let rows = row_slices(&window, body_area);
        let row_height = frame
            .state
            .options
            .density_row_height(*frame.state.density)
            .max(1);
        self.page_rows = ((window.body_height / row_height) as usize).max(1);

        if header_area.height > 0 {
            self.render_header(&frame, &columns, header_area, buf);
            self.hits.header_y = Some(header_area.y);
        }
        for slice in &rows {
            self.render_row(&frame, &columns, slice, body_area, buf);
        }
        if let Some(kind) = window.overlay {
            self.render_overlay(&frame, kind, body_area, buf);
        }

        if let Some(sb_x) = scrollbar_x {
            let pinned_h: u64 = window
                .pinned_top
                .iter()
                .chain(&window.pinned_bottom)
                .map(|r| r.height as u64)
                .sum();
            render::render_scrollbar(
                Rect::new(sb_x, body_area.y, 1, body_area.height),
                buf,
                window.scroll_top,
                window.body_height as u64,
                window.total_height.saturating_sub(pinned_h),
                self.options.scrollbar_style.patch(styles.muted),
            );
        }

        if footer_h > 0 {
            let footer_area = Rect::new(area.x, area.y + area.height - footer_h, area.width, footer_h);
            if footer_h > 1 {
                let agg_y = footer_area.y;
                for slice in &columns {
                    let Some(column) = frame.column(slice.index) else {
                        continue;
                    };
                    let Some(agg) = footer_values.get(&column.field) else {
                        continue;
                    };
                    let line = Line::from(column.format(&agg.value));
                    self.draw_cell(buf, agg_y, slice, line, styles.footer, true);
                }
            }
            self.render_footer(
                &frame,
                Rect::new(footer_area.x, footer_area.y + footer_h - 1, footer_area.width, 1),
                buf,
            );
        }

        self.hits.columns = columns
            .iter()
            .filter_map(|s| frame.column(s.index).map(|c| (s.x, s.width, c.field.clone())))
            .collect();
        self.hits.rows = rows
            .iter()
            .map(|s| (s.y, s.height, s.row.id.clone()))
            .collect();
    }

    pub fn handle_event(&mut self, grid: &DataGrid, event: InputEvent, now: Instant) -> DataGridAction {
        if let Some(edit) = grid.editing().edit_cell() {
            return self.handle_edit_event(grid, edit, event, now);
        }
        match event {
            InputEvent::Paste(_) => DataGridAction::None,
            InputEvent::Key(key) => self.handle_key(grid, key),
            InputEvent::Mouse(mouse) => self.handle_mouse(grid, mouse),
        }
    }

    /// Scrolls so the focused cell is fully visible.
    pub fn ensure_focus_visible(&self, grid: &DataGrid) {
        let Some(cell) = grid.focus().focused_cell() else {
            return;
        };
        let page = grid.pagination().page_rows();
        let row = page.rows.iter().position(|r| r.id == cell.id);
        let column = grid.columns().visible_columns().position(&cell.field);
        grid.virtualization().scroll_to_indexes(row, column);
    }

    fn handle_key(&mut self, grid: &DataGrid, key: KeyEvent) -> DataGridAction {
        let Some(command) = self.keymap.command_for(&key) else {
            return DataGridAction::None;
        };
        match command {
            GridCommand::MoveUp => self.move_focus(grid, FocusMove::Up),
            GridCommand::MoveDown => self.move_focus(grid, FocusMove::Down),
            GridCommand::MoveLeft => self.move_focus(grid, FocusMove::Left),
            GridCommand::MoveRight => self.move_focus(grid, FocusMove::Right),
            GridCommand::PageUp => self.move_focus(grid, FocusMove::PageUp(self.page_rows)),
            GridCommand::PageDown => self.move_focus(grid, FocusMove::PageDown(self.page_rows)),
            GridCommand::RowStart => self.move_focus(grid, FocusMove::RowStart),
            GridCommand::RowEnd => self.move_focus(grid, FocusMove::RowEnd),
            GridCommand::First => self.move_focus(grid, FocusMove::First),
            GridCommand::Last => self.move_focus(grid, FocusMove::Last),
            GridCommand::NextPage | GridCommand::PrevPage => {
                if !grid.options().pagination {
                    return DataGridAction::None;
                }
                let page = grid.pagination().pagination_model().page;
                let next = if command == GridCommand::NextPage {
                    page + 1
                } else {
                    page.saturating_sub(1)
                };
                grid.pagination().set_page(next);
                grid.focus().clear_focus();
                DataGridAction::Redraw
            }
            GridCommand::ToggleSort => {
                let Some(cell) = grid.focus().focused_cell() else {
                    return DataGridAction::None;
                };
                redraw_or_log(grid.sorting().toggle_column_sort(&cell.field, false))
            }
            GridCommand::ToggleSelection => {
                let Some(cell) = grid.focus().focused_cell() else {
                    return DataGridAction::None;
                };
                selection_or_log(grid.selection().toggle_row(&cell.id))
            }
            GridCommand::SelectAll => self.toggle_select_all(grid),
            GridCommand::StartEdit => {
                let Some(cell) = grid.focus().focused_cell() else {
                    return DataGridAction::None;
                };
                if grid.rows().row_node(&cell.id).is_some_and(|n| n.is_group()) {
                    return self.toggle_expansion(grid, &cell.id);
                }
                if grid.editing().is_cell_editable(&cell.id, &cell.field) {
                    redraw_or_log(grid.editing().start_cell_edit(&cell.id, &cell.field))
                } else {
                    DataGridAction::Activated(cell)
                }
            }
            GridCommand::ToggleExpansion => {
                let Some(cell) = grid.focus().focused_cell() else {
                    return DataGridAction::None;
                };
                self.toggle_expansion(grid, &cell.id)
            }
            GridCommand::CycleDensity => {
                let next = match grid.density().density() {
                    Density::Compact => Density::Standard,
                    Density::Standard => Density::Comfortable,
                    Density::Comfortable => Density::Compact,
                };
                grid.density().set_density(next);
                DataGridAction::Redraw
            }
        }
    }

    fn handle_edit_event(
        &mut self,
        grid: &DataGrid,
        edit: EditCell,
        event: InputEvent,
        now: Instant,
    ) -> DataGridAction {
        let editing = grid.editing();
        let key = match event {
            InputEvent::Paste(text) => {
                let input = format!("{}{}", edit.input, text.replace(['\r', '\n'], " "));
                return redraw_or_log(editing.set_edit_cell_value(input, now));
            }
            InputEvent::Mouse(mouse) => return self.handle_mouse(grid, mouse),
            InputEvent::Key(key) => key,
        };
        match key.code {
            KeyCode::Esc => redraw_or_log(editing.stop_cell_edit(CellEditStopReason::Escape)),
            KeyCode::Enter => {
                if let Err(err) = editing.stop_cell_edit(CellEditStopReason::Enter) {
                    return log_error(err);
                }
                if editing.edit_cell().is_none() {
                    self.move_focus(grid, FocusMove::Down);
                }
                DataGridAction::Redraw
            }
            KeyCode::Tab | KeyCode::BackTab => {
                let (reason, movement) = if key.code == KeyCode::Tab && !key.modifiers.shift {
                    (CellEditStopReason::TabKeyDown, FocusMove::Right)
                } else {
                    (CellEditStopReason::ShiftTabKeyDown, FocusMove::Left)
                };
                if let Err(err) = editing.stop_cell_edit(reason) {
                    return log_error(err);
                }
                if editing.edit_cell().is_none() {
                    self.move_focus(grid, movement);
                }
                DataGridAction::Redraw
            }
            KeyCode::Backspace => {
                let mut input = edit.input;
                input.pop();
                redraw_or_log(editing.set_edit_cell_value(input, now))
            }
            KeyCode::Char(c) if !key.modifiers.ctrl && !key.modifiers.alt => {
                let mut input = edit.input;
                input.push(c);
                redraw_or_log(editing.set_edit_cell_value(input, now))
            }
            _ => DataGridAction::None,
        }
    }

    fn handle_mouse(&mut self, grid: &DataGrid, mouse: MouseEvent) -> DataGridAction {
        let row_height = grid
            .options()
            .density_row_height(grid.density().density())
            .max(1) as i64;
        let step = self.options.wheel_rows as i64 * row_height;
        match mouse.kind {
            MouseEventKind::ScrollUp => grid.virtualization().scroll_by(0, -step),
            MouseEventKind::ScrollDown => grid.virtualization().scroll_by(0, step),
            MouseEventKind::ScrollLeft => grid.virtualization().scroll_by(-4, 0),
            MouseEventKind::ScrollRight => grid.virtualization().scroll_by(4, 0),
            MouseEventKind::Down => return self.handle_click(grid, mouse),
        }
        DataGridAction::Redraw
    }

    fn handle_click(&mut self, grid: &DataGrid, mouse: MouseEvent) -> DataGridAction {
        let Some(field) = self.hits.field_at(mouse.x).map(str::to_string) else {
            return DataGridAction::None;
        };
        if self.hits.header_y == Some(mouse.y) {
            if field == CHECKBOX_FIELD {
                return self.toggle_select_all(grid);
            }
            return redraw_or_log(grid.sorting().toggle_column_sort(&field, mouse.modifiers.shift));
        }
        let Some(id) = self.hits.row_at(mouse.y).cloned() else {
            return DataGridAction::None;
        };
        if let Some(edit) = grid.editing().edit_cell() {
            if edit.id != id || edit.field != field {
                if let Err(err) = grid.editing().stop_cell_edit(CellEditStopReason::CellFocusOut) {
                    return log_error(err);
                }
            }
        }
        if let Err(err) = grid.focus().set_cell_focus(&id, &field) {
            return log_error(err);
        }
        if field == CHECKBOX_FIELD {
            return selection_or_log(grid.selection().toggle_row(&id));
        }
        DataGridAction::Redraw
    }

    fn move_focus(&self, grid: &DataGrid, movement: FocusMove) -> DataGridAction {
        if grid.focus().move_focus(movement).is_none() {
            return DataGridAction::None;
        }
        self.ensure_focus_visible(grid);
        DataGridAction::Redraw
    }

    /// Clears a non-empty selection, otherwise selects every filtered row.
    fn toggle_select_all(&self, grid: &DataGrid) -> DataGridAction {
        if grid.selection().selected_count() > 0 {
            grid.selection().deselect_all();
        } else {
            grid.selection().select_all(SelectAllScope::Filtered);
        }
        DataGridAction::SelectionChanged
    }

    fn toggle_expansion(&self, grid: &DataGrid, id: &RowId) -> DataGridAction {
        let state = grid.store().state();
        if let Some(node) = state.rows.tree.node(id).filter(|n| n.is_group()) {
            let expanded = state
                .rows
                .is_expanded(node, state.options.default_group_expansion_depth);
            return redraw_or_log(grid.rows().set_row_children_expansion(id, !expanded));
        }
        if !state.options.allows(Tier::Pro) {
            return DataGridAction::None;
        }
        redraw_or_log(grid.detail_panel().toggle_detail_panel(id))
    }

    /// Renders content-sized detail panels once so their height is known before layout.
    fn measure_detail_panels(&self, grid: &DataGrid, width: u16) {
        for id in grid.detail_panel().expanded_row_ids() {
            let Some(observer) = grid.detail_panel().observer(&id) else {
                continue;
            };
            let Some(row) = grid.rows().row(&id) else {
                continue;
            };
            let lines = self.slots.detail_panel.render(&DetailPanelSlotProps {
                id: id.clone(),
                row,
                width,
            });
            observer.report_height(lines.len().max(1) as u32);
        }
    }

    fn styles(&self) -> GridStyles {
        let theme = &self.theme;
        let base = if self.options.style == Style::default() {
            theme.text_primary
        } else {
            self.options.style
        };
        GridStyles {
            base,
            header: theme.header.patch(self.options.header_style),
            cursor: theme.focused_cell.patch(self.options.cursor_style),
            selected: theme.selected_row.patch(self.options.selected_style),
            editing: theme.editing_cell,
            group: theme.group_row,
            pinned: theme.pinned,
            muted: theme.text_muted,
            overlay: theme.overlay,
            footer: theme.footer,
        }
    }

    fn render_header(&self, frame: &Frame<'_>, columns: &[ColumnSlice], area: Rect, buf: &mut Buffer) {
        let styles = frame.styles;
        buf.set_style(area, styles.header);
        let sorting = &frame.state.sorting;
        let multi_sort = sorting.len() > 1;
        for slice in columns {
            let Some(column) = frame.column(slice.index) else {
                continue;
            };
            let line = match column.field.as_str() {
                CHECKBOX_FIELD => Line::from(checkbox(!frame.state.selection.selected.is_empty())),
                REORDER_FIELD => Line::default(),
                _ => {
                    let sort_index = sorting.iter().position(|s| s.field == column.field);
                    let params = HeaderParams {
                        field: column.field.clone(),
                        label: column.header_label().to_string(),
                        sort_direction: sort_index.map(|i| sorting[i].sort),
                        sort_index,
                        width: slice.full_width,
                    };
                    match &column.render_header {
                        Some(render_header) => render_header(&params),
                        None => self
                            .slots
                            .column_header
                            .render(&ColumnHeaderSlotProps { params, multi_sort }),
                    }
                }
            };
            let style = if slice.pinned {
                styles.header.patch(styles.pinned)
            } else {
                styles.header
            };
            self.draw_cell(buf, area.y, slice, line, style, false);
        }
    }

    fn render_row(
        &self,
        frame: &Frame<'_>,
        columns: &[ColumnSlice],
        slice: &RowSlice<'_>,
        area: Rect,
        buf: &mut Buffer,
    ) {
        let styles = frame.styles;
        let row = slice.row;
        let state = &frame.state;
        let selected = state.selection.selected.contains(&row.id);

        let mut row_style = styles.base;
        if slice.pinned {
            row_style = row_style.patch(styles.pinned);
        }
        if row.is_group {
            row_style = row_style.patch(styles.group);
        }
        if selected {
            row_style = row_style.patch(styles.selected);
        }

        let row_lines = row
            .height
            .saturating_sub(slice.clip_top)
            .min(slice.height as u32) as u16;
        if row_lines > 0 {
            buf.set_style(Rect::new(area.x, slice.y, area.width, row_lines), row_style);
        }
        if slice.clip_top == 0 && row_lines > 0 {
            for col in columns {
                let Some(column) = frame.column(col.index) else {
                    continue;
                };
                let focused = state
                    .focus
                    .cell
                    .as_ref()
                    .is_some_and(|f| f.id == row.id && f.field == column.field);
                let editing = state
                    .editing
                    .cell
                    .as_ref()
                    .filter(|c| c.id == row.id && c.field == column.field);

                let mut style = row_style;
                if col.pinned {
                    style = style.patch(styles.pinned);
                }
                if focused {
                    style = style.patch(styles.cursor);
                }
                if editing.is_some() {
                    style = style.patch(styles.editing);
                }
                let line = self.cell_line(frame, column, row, col.full_width, selected, focused, editing);
                let right_align = column.column_type == ColumnType::Number && editing.is_none();
                self.draw_cell(buf, slice.y, col, line, style, right_align);
            }
        }

        if slice.height > row_lines {
            let skip = slice.clip_top.saturating_sub(row.height);
            let detail_area = Rect::new(
                area.x,
                slice.y + row_lines,
                area.width,
                slice.height - row_lines,
            );
            self.render_detail_panel(frame, row, skip, detail_area, buf);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn cell_line(
        &self,
        frame: &Frame<'_>,
        column: &ColumnDef,
        row: &RenderedRow,
        width: u32,
        selected: bool,
        focused: bool,
        editing: Option<&EditCell>,
    ) -> Line<'static> {
        let state = &frame.state;
        if row.is_group {
            let Some(node) = state.rows.tree.node(&row.id) else {
                return Line::default();
            };
            if let Some(key) = group_cell_value(&column.field, node) {
                return self.slots.group_cell.render(&GroupCellSlotProps {
                    label: key.to_string(),
                    depth: row.depth,
                    child_count: node.children.len(),
                    expanded: state
                        .rows
                        .is_expanded(node, state.options.default_group_expansion_depth),
                });
            }
            return match frame.aggregates.get(&row.id, &column.field) {
                Some(agg) => Line::from(column.format(&agg.value)),
                None => Line::default(),
            };
        }

        let Some(model) = state.rows.lookup.get(&row.id) else {
            return Line::default();
        };
        match column.field.as_str() {
            CHECKBOX_FIELD => return Line::from(checkbox(selected)),
            REORDER_FIELD => return Line::from("≡"),
            _ => {}
        }

        let mut params = CellParams {
            id: row.id.clone(),
            field: column.field.clone(),
            value: column.value(model),
            formatted: String::new(),
            depth: row.depth,
            is_group: false,
            is_selected: selected,
            is_focused: focused,
            is_editing: editing.is_some(),
            width,
        };
        if let Some(edit) = editing {
            params.formatted = edit.input.clone();
            return match &column.render_edit_cell {
                Some(render_edit) => render_edit(&params),
                None => Line::from(vec![Span::raw(edit.input.clone()), Span::raw("▏")]),
            };
        }
        params.formatted = column.format(&params.value);
        match &column.render_cell {
            Some(render_cell) => render_cell(&params),
            None => self.slots.cell.render(&CellSlotProps { params }),
        }
    }

    fn render_detail_panel(
        &self,
        frame: &Frame<'_>,
        row: &RenderedRow,
        skip: u32,
        area: Rect,
        buf: &mut Buffer,
    ) {
        let Some(model) = frame.state.rows.lookup.get(&row.id) else {
            return;
        };
        let lines = self.slots.detail_panel.render(&DetailPanelSlotProps {
            id: row.id.clone(),
            row: model.clone(),
            width: area.width,
        });
        let indent = 2.min(area.width);
        for (dy, line) in lines
            .iter()
            .skip(skip as usize)
            .take(area.height as usize)
            .enumerate()
        {
            render::render_spans_clipped(
                area.x + indent,
                area.y + dy as u16,
                0,
                area.width - indent,
                buf,
                &line.spans,
                frame.styles.base.patch(line.style),
            );
        }
    }

    fn render_overlay(&self, frame: &Frame<'_>, kind: OverlayKind, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }
        let key = match kind {
            OverlayKind::Loading => keys::LOADING_LABEL,
            OverlayKind::NoRows => keys::NO_ROWS_LABEL,
            OverlayKind::NoResults => keys::NO_RESULTS_OVERLAY_LABEL,
        };
        let label = frame.grid.locale_text(key, &[]);
        let line = self.slots.overlay.render(&OverlaySlotProps { kind, label });
        let line = render::fit_line(line, area.width as usize, false);
        let x = area.x + (area.width.saturating_sub(line.width() as u16)) / 2;
        let y = area.y + (area.height - 1) / 2;
        render::render_spans_clipped(x, y, 0, area.width, buf, &line.spans, frame.styles.overlay);
    }

    fn render_footer(&self, frame: &Frame<'_>, area: Rect, buf: &mut Buffer) {
        let grid = frame.grid;
        let state = &frame.state;
        let selected_count = state.selection.selected.len();
        let total = state.rows.ids.len();
        let visible = grid.filtering().filtered_row_count();

        let total_text = if visible == total {
            format!("{} {total}", grid.locale_text(keys::FOOTER_TOTAL_ROWS, &[]))
        } else {
            format!(
                "{} {}",
                grid.locale_text(keys::FOOTER_TOTAL_ROWS, &[]),
                grid.locale_text(
                    keys::FOOTER_TOTAL_VISIBLE_ROWS,
                    &[LocaleArg::Count(visible), LocaleArg::Count(total)],
                )
            )
        };
        let pagination_text = state.options.pagination.then(|| {
            let page = grid.pagination().page_rows();
            let from = if page.rows.is_empty() {
                0
            } else {
                page.first_row_index + 1
            };
            grid.locale_text(
                keys::PAGINATION_DISPLAYED_ROWS,
                &[
                    LocaleArg::Count(from),
                    LocaleArg::Count(page.first_row_index + page.rows.len()),
                    LocaleArg::Count(page.row_count),
                ],
            )
        });
        let props = FooterSlotProps {
            selected_count,
            selected_text: (selected_count > 0).then(|| {
                grid.locale_text(keys::FOOTER_ROW_SELECTED, &[LocaleArg::Count(selected_count)])
            }),
            total_text,
            pagination_text,
        };
        let line = self.slots.footer.render(&props);
        let line = render::fit_line(line, area.width.saturating_sub(1) as usize, false);
        buf.set_style(area, frame.styles.footer);
        render::render_spans_clipped(area.x + 1, area.y, 0, area.width.saturating_sub(1), buf, &line.spans, frame.styles.footer);
    }

    fn draw_cell(
        &self,
        buf: &mut Buffer,
        y: u16,
        slice: &ColumnSlice,
        line: Line<'static>,
        style: Style,
        right_align: bool,
    ) {
        buf.set_style(Rect::new(slice.x, y, slice.width, 1), style);
        let content_width = if slice.full_width > self.options.col_gap as u32 {
            slice.full_width - self.options.col_gap as u32
        } else {
            slice.full_width
        };
        let line_style = line.style;
        let line = render::fit_line(line, content_width as usize, right_align);
        let visible = (content_width.saturating_sub(slice.clip_left)).min(slice.width as u32) as u16;
        render::render_spans_clipped(
            slice.x,
            y,
            slice.clip_left,
            visible,
            buf,
            &line.spans,
            style.patch(line_style),
        );
    }
}

fn checkbox(checked: bool) -> &'static str {
    if checked { "[x]" } else { "[ ]" }
}

fn log_error(err: GridError) -> DataGridAction {
    tracing::debug!(%err, "grid input rejected");
    DataGridAction::Redraw
}

fn redraw_or_log(result: ratatui_datagrid_core::Result<()>) -> DataGridAction {
    match result {
        Ok(()) => DataGridAction::Redraw,
        Err(err) => log_error(err),
    }
}

fn selection_or_log(result: ratatui_datagrid_core::Result<()>) -> DataGridAction {
    match result {
        Ok(()) => DataGridAction::SelectionChanged,
        Err(err) => log_error(err),
    }
}

/// Visible part of an item `size` long starting at `rel` within a region `len` long:
/// `(start, visible length, clipped lead)`.
fn clip_span(rel: i64, size: u32, len: u16) -> Option<(u16, u16, u32)> {
    let clip = (-rel).max(0) as u64;
    let start = rel.max(0) as u64;
    if start >= len as u64 || clip >= size as u64 {
        return None;
    }
    let visible = (size as u64 - clip).min(len as u64 - start);
    Some((start as u16, visible as u16, clip as u32))
}

fn place_columns(
    out: &mut Vec<ColumnSlice>,
    columns: &[RenderedColumn],
    x0: u16,
    len: u16,
    scroll: u64,
    pinned: bool,
) {
    for c in columns {
        let rel = c.offset as i64 - scroll as i64;
        if let Some((start, width, clip_left)) = clip_span(rel, c.width, len) {
            out.push(ColumnSlice {
                index: c.index,
                x: x0 + start,
                width,
                clip_left,
                full_width: c.width,
                pinned,
            });
        }
    }
}

/// Left pinned columns hug the left edge, right pinned ones the right edge, and the scrollable
/// columns fill what is left between them.
fn column_slices(window: &RenderWindow, area: Rect) -> Vec<ColumnSlice> {
    let left_w: u64 = window.pinned_left.iter().map(|c| c.width as u64).sum();
    let right_w: u64 = window.pinned_right.iter().map(|c| c.width as u64).sum();
    let left_len = left_w.min(area.width as u64) as u16;
    let right_start = (area.width as u64)
        .saturating_sub(right_w)
        .max(left_len as u64) as u16;

    let mut out = Vec::new();
    place_columns(&mut out, &window.pinned_left, area.x, left_len, 0, true);
    place_columns(
        &mut out,
        &window.columns,
        area.x + left_len,
        right_start - left_len,
        window.scroll_left,
        false,
    );
    place_columns(
        &mut out,
        &window.pinned_right,
        area.x + right_start,
        area.width - right_start,
        0,
        true,
    );
    out
}

fn place_rows<'a>(
    out: &mut Vec<RowSlice<'a>>,
    rows: &'a [RenderedRow],
    y0: u16,
    len: u16,
    origin: u64,
    pinned: bool,
) {
    for row in rows {
        let rel = row.offset as i64 - origin as i64;
        if let Some((start, height, clip_top)) = clip_span(rel, row.height + row.detail_height, len) {
            out.push(RowSlice {
                row,
                y: y0 + start,
                height,
                clip_top,
                pinned,
            });
        }
    }
}

/// Pinned top rows, then the scrolled body, then pinned bottom rows directly below it.
fn row_slices(window: &RenderWindow, area: Rect) -> Vec<RowSlice<'_>> {
    let top_h: u64 = window.pinned_top.iter().map(|r| r.height as u64).sum();
    let top_len = top_h.min(area.height as u64) as u16;
    let body_len = (window.body_height as u64).min((area.height - top_len) as u64) as u16;
    let bottom_y = top_len + body_len;

    let mut out = Vec::new();
    place_rows(&mut out, &window.pinned_top, area.y, top_len, 0, true);
    place_rows(
        &mut out,
        &window.rows,
        area.y + top_len,
        body_len,
        top_h + window.scroll_top,
        false,
    );
    let bottom_origin = window.pinned_bottom.first().map_or(0, |r| r.offset);
    place_rows(
        &mut out,
        &window.pinned_bottom,
        area.y + bottom_y,
        area.height - bottom_y,
        bottom_origin,
        true,
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_span_cuts_both_edges() {
        assert_eq!(clip_span(-2, 5, 10), Some((0, 3, 2)));
        assert_eq!(clip_span(8, 5, 10), Some((8, 2, 0)));
        assert_eq!(clip_span(10, 5, 10), None);
        assert_eq!(clip_span(-5, 5, 10), None);
    }

    #[test]
    fn pinned_right_columns_stick_to_the_right_edge() {
        let window = RenderWindow {
            pinned_left: vec![RenderedColumn {
                field: "a".into(),
                index: 0,
                offset: 0,
                width: 4,
            }],
            columns: vec![RenderedColumn {
                field: "b".into(),
                index: 1,
                offset: 0,
                width: 30,
            }],
            pinned_right: vec![RenderedColumn {
                field: "c".into(),
                index: 2,
                offset: 0,
                width: 5,
            }],
            scroll_left: 3,
            ..Default::default()
        };
        let slices = column_slices(&window, Rect::new(0, 0, 20, 5));
        let by_index: Vec<(usize, u16, u16, u32)> =
            slices.iter().map(|s| (s.index, s.x, s.width, s.clip_left)).collect();
        assert_eq!(by_index, vec![(0, 0, 4, 0), (1, 4, 11, 3), (2, 15, 5, 0)]);
    }
}
