//! Column menu items, assembled through the `columnMenu` stage.
//!
//! The grid registers the base items first; pinning, grouping and aggregation append theirs
//! when their tier is enabled. Items only describe an action; [`crate::DataGrid`] performs it.

use crate::column::ColumnDef;
use crate::context::GridContext;
use crate::error::GridError;
use crate::error::Result;
use crate::features::pinning::PinnedSide;
use crate::features::sorting::SortDirection;
use crate::locale::keys;
use crate::pipe::PipeProcessorHandle;
use crate::pipe::PipeStage;
use crate::store::GridState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnMenuAction {
    Sort(Option<SortDirection>),
    Filter,
    Hide,
    ManageColumns,
    Pin(PinnedSide),
    Unpin,
    GroupBy,
    /// Removes the given criterion from the grouping model.
    Ungroup(String),
    /// Sets (or clears) the column's aggregation function.
    Aggregate(Option<String>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMenuItem {
    pub key: String,
    pub label: String,
    pub action: ColumnMenuAction,
    pub disabled: bool,
}

impl ColumnMenuItem {
    pub fn new(key: impl Into<String>, label: impl Into<String>, action: ColumnMenuAction) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            action,
            disabled: false,
        }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// What `columnMenu` processors see.
pub struct ColumnMenuContext {
    pub column: ColumnDef,
    pub state: GridState,
}

impl ColumnMenuContext {
    pub fn text(&self, key: &str) -> String {
        self.state.options.locale_text.resolve(key, &[])
    }
}

pub const COLUMN_MENU: PipeStage<Vec<ColumnMenuItem>, ColumnMenuContext> = PipeStage::new("columnMenu");

fn base_items(mut items: Vec<ColumnMenuItem>, ctx: &ColumnMenuContext) -> Vec<ColumnMenuItem> {
    let column = &ctx.column;
    if column.sortable {
        let current = ctx
            .state
            .sorting
            .iter()
            .find(|s| s.field == column.field)
            .map(|s| s.sort);
        items.push(
            ColumnMenuItem::new(
                "sortAsc",
                ctx.text(keys::COLUMN_MENU_SORT_ASC),
                ColumnMenuAction::Sort(Some(SortDirection::Asc)),
            )
            .disabled(current == Some(SortDirection::Asc)),
        );
        items.push(
            ColumnMenuItem::new(
                "sortDesc",
                ctx.text(keys::COLUMN_MENU_SORT_DESC),
                ColumnMenuAction::Sort(Some(SortDirection::Desc)),
            )
            .disabled(current == Some(SortDirection::Desc)),
        );
        if current.is_some() {
            items.push(ColumnMenuItem::new(
                "unsort",
                ctx.text(keys::COLUMN_MENU_UNSORT),
                ColumnMenuAction::Sort(None),
            ));
        }
    }
    if column.filterable {
        items.push(ColumnMenuItem::new(
            "filter",
            ctx.text(keys::COLUMN_MENU_FILTER),
            ColumnMenuAction::Filter,
        ));
    }
    if column.hideable {
        items.push(ColumnMenuItem::new(
            "hide",
            ctx.text(keys::COLUMN_MENU_HIDE_COLUMN),
            ColumnMenuAction::Hide,
        ));
    }
    items.push(ColumnMenuItem::new(
        "manageColumns",
        ctx.text(keys::COLUMN_MENU_MANAGE_COLUMNS),
        ColumnMenuAction::ManageColumns,
    ));
    items
}

#[derive(Clone)]
pub struct ColumnMenuModule {
    ctx: GridContext,
}

impl ColumnMenuModule {
    pub fn new(ctx: GridContext) -> Self {
        Self { ctx }
    }

    pub fn register_pipes(&self) -> Vec<PipeProcessorHandle> {
        vec![self.ctx.pipes.register(COLUMN_MENU, "columnMenu.base", base_items)]
    }

    pub fn items(&self, field: &str) -> Result<Vec<ColumnMenuItem>> {
        let state = self.ctx.store.state();
        let column = state
            .columns
            .column(field)
            .cloned()
            .ok_or_else(|| GridError::ColumnNotFound(field.to_string()))?;
        let context = ColumnMenuContext { column, state };
        Ok(self.ctx.pipes.apply(COLUMN_MENU, Vec::new(), &context))
    }
}

impl std::fmt::Debug for ColumnMenuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnMenuContext")
            .field("column", &self.column.field)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use crate::features::columns::ColumnsModule;
    use crate::features::sorting::SortItem;
    use crate::options::GridOptions;

    #[test]
    fn base_items_follow_column_flags_and_sort_state() {
        let ctx = GridContext::new(GridOptions::default());
        ColumnsModule::new(ctx.clone()).set_columns(vec![
            ColumnDef::new("a"),
            ColumnDef {
                sortable: false,
                hideable: false,
                ..ColumnDef::new("b")
            },
        ]);
        let menu = ColumnMenuModule::new(ctx.clone());
        let _pipes = menu.register_pipes();

        let keys: Vec<String> = menu.items("a").unwrap().into_iter().map(|i| i.key).collect();
        assert_eq!(keys, vec!["sortAsc", "sortDesc", "filter", "hide", "manageColumns"]);

        ctx.store.update(|s| s.sorting = Rc::new(vec![SortItem::asc("a")]));
        let items = menu.items("a").unwrap();
        assert!(items[0].disabled);
        assert!(items.iter().any(|i| i.action == ColumnMenuAction::Sort(None)));

        let keys: Vec<String> = menu.items("b").unwrap().into_iter().map(|i| i.key).collect();
        assert_eq!(keys, vec!["filter", "manageColumns"]);
        assert!(menu.items("zz").is_err());
    }
}
