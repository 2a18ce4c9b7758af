//! Default renderers for the widget's extension points.
//!
//! Each field of [`DataGridSlots`] is a core [`Slot`]: a default plus an optional replacement
//! and props override. The view only builds props and calls `render`.

use ratatui::style::Modifier;
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::text::Span;
use ratatui_datagrid_core::GridRowModel;
use ratatui_datagrid_core::RowId;
use ratatui_datagrid_core::column::CellParams;
use ratatui_datagrid_core::column::HeaderParams;
use ratatui_datagrid_core::features::sorting::SortDirection;
use ratatui_datagrid_core::slots::Slot;
use ratatui_datagrid_core::virtualization::OverlayKind;

#[derive(Clone, Debug)]
pub struct CellSlotProps {
    pub params: CellParams,
}

#[derive(Clone, Debug)]
pub struct ColumnHeaderSlotProps {
    pub params: HeaderParams,
    /// Whether more than one column is sorted, so the sort index is worth showing.
    pub multi_sort: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupCellSlotProps {
    pub label: String,
    pub depth: i32,
    pub child_count: usize,
    pub expanded: bool,
}

/// Footer content, already resolved through the locale text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FooterSlotProps {
    pub selected_count: usize,
    pub selected_text: Option<String>,
    pub total_text: String,
    pub pagination_text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlaySlotProps {
    pub kind: OverlayKind,
    pub label: String,
}

#[derive(Clone, Debug)]
pub struct DetailPanelSlotProps {
    pub id: RowId,
    pub row: GridRowModel,
    pub width: u16,
}

pub type CellSlot = Slot<CellSlotProps, Line<'static>>;
pub type ColumnHeaderSlot = Slot<ColumnHeaderSlotProps, Line<'static>>;
pub type GroupCellSlot = Slot<GroupCellSlotProps, Line<'static>>;
pub type FooterSlot = Slot<FooterSlotProps, Line<'static>>;
pub type OverlaySlot = Slot<OverlaySlotProps, Line<'static>>;
pub type DetailPanelSlot = Slot<DetailPanelSlotProps, Vec<Line<'static>>>;

#[derive(Clone, Debug)]
pub struct DataGridSlots {
    pub cell: CellSlot,
    pub column_header: ColumnHeaderSlot,
    pub group_cell: GroupCellSlot,
    pub footer: FooterSlot,
    pub overlay: OverlaySlot,
    /// Content below an expanded row. The default draws nothing.
    pub detail_panel: DetailPanelSlot,
}

impl Default for DataGridSlots {
    fn default() -> Self {
        Self {
            cell: Slot::new("cell", default_cell),
            column_header: Slot::new("columnHeader", default_column_header),
            group_cell: Slot::new("groupCell", default_group_cell),
            footer: Slot::new("footer", default_footer),
            overlay: Slot::new("overlay", default_overlay),
            detail_panel: Slot::new("detailPanel", |_: &DetailPanelSlotProps| Vec::new()),
        }
    }
}

fn default_cell(props: &CellSlotProps) -> Line<'static> {
    Line::from(props.params.formatted.clone())
}

fn default_column_header(props: &ColumnHeaderSlotProps) -> Line<'static> {
    let p = &props.params;
    let mut spans = vec![Span::raw(p.label.clone())];
    if let Some(direction) = p.sort_direction {
        let arrow = match direction {
            SortDirection::Asc => " ▲",
            SortDirection::Desc => " ▼",
        };
        spans.push(Span::raw(arrow));
        if props.multi_sort {
            if let Some(index) = p.sort_index {
                spans.push(Span::raw(format!("{}", index + 1)));
            }
        }
    }
    Line::from(spans)
}

fn default_group_cell(props: &GroupCellSlotProps) -> Line<'static> {
    let indent = "  ".repeat(props.depth.max(0) as usize);
    let marker = if props.expanded { "▾" } else { "▸" };
    Line::from(vec![
        Span::raw(format!("{indent}{marker} ")),
        Span::styled(props.label.clone(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(" ({})", props.child_count)),
    ])
}

fn default_footer(props: &FooterSlotProps) -> Line<'static> {
    let mut parts = Vec::new();
    if let Some(selected) = &props.selected_text {
        parts.push(selected.clone());
    }
    parts.push(props.total_text.clone());
    if let Some(pagination) = &props.pagination_text {
        parts.push(pagination.clone());
    }
    Line::from(parts.join("  ·  "))
}

fn default_overlay(props: &OverlaySlotProps) -> Line<'static> {
    Line::from(props.label.clone()).centered()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footer_parts_are_joined_in_order() {
        let line = default_footer(&FooterSlotProps {
            selected_count: 2,
            selected_text: Some("2 rows selected".into()),
            total_text: "Total Rows: 10".into(),
            pagination_text: None,
        });
        assert_eq!(line.to_string(), "2 rows selected  ·  Total Rows: 10");
    }

    #[test]
    fn overridden_group_cell_receives_patched_props() {
        let slot = Slot::new("groupCell", default_group_cell)
            .with_props(|p: &mut GroupCellSlotProps| p.label = p.label.to_uppercase())
            .with_component(|p: &GroupCellSlotProps| Line::from(p.label.clone()));
        let props = GroupCellSlotProps {
            label: "paris".into(),
            depth: 0,
            child_count: 3,
            expanded: true,
        };
        assert_eq!(slot.render(&props).to_string(), "PARIS");
        assert_eq!(slot.render_default(&props).to_string(), "▾ paris (3)");
    }
}
