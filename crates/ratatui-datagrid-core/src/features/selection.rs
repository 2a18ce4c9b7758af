//! Row selection and the checkbox selection column.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::api::opt_arg;
use crate::column::ColumnDef;
use crate::column::ColumnType;
use crate::context::GridContext;
use crate::error::GridError;
use crate::error::Result;
use crate::events::GridEvent;
use crate::events::GridEventName;
use crate::events::Subscription;
use crate::features::columns::HYDRATE_COLUMNS;
use crate::features::columns::HydratedColumns;
use crate::features::filtering::FILTERED_SORTED_LEAF_IDS;
use crate::features::pagination::PAGE_ROWS;
use crate::locale::keys;
use crate::options::RowSelectionMode;
use crate::pipe::PipeProcessorHandle;
use crate::store::GridState;
use crate::value::RowId;

pub const CHECKBOX_FIELD: &str = "__check__";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub selected: BTreeSet<RowId>,
}

/// Which rows "select all" covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectAllScope {
    /// Every row passing the filter, across pages.
    #[default]
    Filtered,
    CurrentPage,
}

fn hydrate_checkbox_column(columns: HydratedColumns, state: &GridState) -> HydratedColumns {
    if !state.options.checkbox_selection || columns.contains(CHECKBOX_FIELD) {
        return columns;
    }
    let header = state
        .options
        .locale_text
        .resolve(keys::CHECKBOX_SELECTION_HEADER_NAME, &[]);
    columns.prepend(ColumnDef {
        header_name: Some(header),
        column_type: ColumnType::Actions,
        width: Some(4),
        min_width: 4,
        sortable: false,
        filterable: false,
        hideable: false,
        groupable: false,
        pinnable: false,
        aggregable: false,
        synthetic: true,
        ..ColumnDef::new(CHECKBOX_FIELD)
    })
}

#[derive(Clone)]
pub struct SelectionModule {
    ctx: GridContext,
}

impl SelectionModule {
    pub fn new(ctx: GridContext) -> Self {
        Self { ctx }
    }

    pub fn register_pipes(&self) -> Vec<PipeProcessorHandle> {
        vec![self.ctx.pipes.register(HYDRATE_COLUMNS, "selection", hydrate_checkbox_column)]
    }

    /// Drops selected ids whose rows disappeared.
    pub fn subscribe(&self) -> Vec<Subscription> {
        [GridEventName::RowsSet, GridEventName::RowsUpdated]
            .into_iter()
            .map(|name| {
                let weak = self.ctx.downgrade();
                self.ctx.events.subscribe(name, move |_| {
                    if let Some(ctx) = weak.upgrade() {
                        SelectionModule::new(ctx).prune();
                    }
                })
            })
            .collect()
    }

    pub fn selected_ids(&self) -> Vec<RowId> {
        self.ctx.store.read(|s| s.selection.selected.iter().cloned().collect())
    }

    pub fn selected_count(&self) -> usize {
        self.ctx.store.read(|s| s.selection.selected.len())
    }

    pub fn is_row_selected(&self, id: &RowId) -> bool {
        self.ctx.store.read(|s| s.selection.selected.contains(id))
    }

    /// Group rows and rows rejected by `is_row_selectable` cannot be selected.
    pub fn is_row_selectable(&self, id: &RowId) -> bool {
        self.ctx.store.read(|s| {
            let Some(row) = s.rows.lookup.get(id) else {
                return false;
            };
            match &s.options.is_row_selectable {
                Some(check) => check(id, row),
                None => true,
            }
        })
    }

    pub fn select_row(&self, id: &RowId, selected: bool, reset_others: bool) -> Result<()> {
        if self.ctx.store.read(|s| !s.rows.lookup.contains_key(id)) {
            return Err(GridError::RowNotFound(id.clone()));
        }
        self.select_rows(std::slice::from_ref(id), selected, reset_others);
        Ok(())
    }

    pub fn select_rows(&self, ids: &[RowId], selected: bool, reset_others: bool) {
        let mut next = if reset_others {
            BTreeSet::new()
        } else {
            self.ctx.store.read(|s| s.selection.selected.clone())
        };
        for id in ids {
            if selected {
                if self.is_row_selectable(id) {
                    next.insert(id.clone());
                }
            } else {
                next.remove(id);
            }
        }
        if selected && self.ctx.options().row_selection_mode == RowSelectionMode::Single {
            // The last requested row wins.
            if let Some(last) = ids.iter().rev().find(|id| next.contains(*id)).cloned() {
                next = BTreeSet::from([last]);
            }
        }
        self.write(next);
    }

    pub fn toggle_row(&self, id: &RowId) -> Result<()> {
        let selected = self.is_row_selected(id);
        let single = self.ctx.options().row_selection_mode == RowSelectionMode::Single;
        self.select_row(id, !selected, single)
    }

    /// Replaces the selection. Unselectable rows are dropped, and so are unknown ids unless
    /// `keep_non_existent_rows_selected` is set.
    pub fn set_row_selection_model(&self, ids: Vec<RowId>) {
        let options = self.ctx.options();
        let mut next = BTreeSet::new();
        for id in ids {
            let exists = self.ctx.store.read(|s| s.rows.lookup.contains_key(&id));
            if (exists && self.is_row_selectable(&id)) || (!exists && options.keep_non_existent_rows_selected) {
                next.insert(id);
            }
        }
        if options.row_selection_mode == RowSelectionMode::Single && next.len() > 1 {
            tracing::warn!(count = next.len(), "single selection mode keeps one row");
            next = next.into_iter().take(1).collect();
        }
        self.write(next);
    }

    pub fn select_all(&self, scope: SelectAllScope) {
        if self.ctx.options().row_selection_mode == RowSelectionMode::Single {
            return;
        }
        let ids: Vec<RowId> = match scope {
            SelectAllScope::Filtered => (*self.ctx.store.select(&FILTERED_SORTED_LEAF_IDS)).clone(),
            SelectAllScope::CurrentPage => self
                .ctx
                .store
                .select(&PAGE_ROWS)
                .rows
                .iter()
                .filter(|e| !e.is_group)
                .map(|e| e.id.clone())
                .collect(),
        };
        self.select_rows(&ids, true, false);
    }

    pub fn deselect_all(&self) {
        self.write(BTreeSet::new());
    }

    fn prune(&self) {
        if self.ctx.options().keep_non_existent_rows_selected {
            return;
        }
        let next: BTreeSet<RowId> = self.ctx.store.read(|s| {
            s.selection
                .selected
                .iter()
                .filter(|id| s.rows.lookup.contains_key(*id))
                .cloned()
                .collect()
        });
        self.write(next);
    }

    fn write(&self, selected: BTreeSet<RowId>) {
        if self.ctx.store.read(|s| s.selection.selected == selected) {
            return;
        }
        let ids: Vec<RowId> = selected.iter().cloned().collect();
        self.ctx
            .store
            .update(|s| s.selection = Rc::new(SelectionState { selected }));
        self.ctx.publish(GridEvent::RowSelectionChange(ids));
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let select = self.clone();
        let select_many = self.clone();
        let set_model = self.clone();
        let get = self.clone();
        let is_selected = self.clone();
        let all = self.clone();
        api.register(
            "selection",
            ApiVisibility::Public,
            [
                method("selectRow", move |args| {
                    let id: RowId = arg("selectRow", args, 0)?;
                    let selected = opt_arg("selectRow", args, 1)?.unwrap_or(true);
                    let reset = opt_arg("selectRow", args, 2)?.unwrap_or(false);
                    select.select_row(&id, selected, reset)?;
                    Ok(Value::Null)
                }),
                method("selectRows", move |args| {
                    let ids: Vec<RowId> = arg("selectRows", args, 0)?;
                    let selected = opt_arg("selectRows", args, 1)?.unwrap_or(true);
                    let reset = opt_arg("selectRows", args, 2)?.unwrap_or(false);
                    select_many.select_rows(&ids, selected, reset);
                    Ok(Value::Null)
                }),
                method("setRowSelectionModel", move |args| {
                    set_model.set_row_selection_model(arg("setRowSelectionModel", args, 0)?);
                    Ok(Value::Null)
                }),
                method("getSelectedRows", move |_| Ok(serde_json::to_value(get.selected_ids())?)),
                method("isRowSelected", move |args| {
                    let id: RowId = arg("isRowSelected", args, 0)?;
                    Ok(Value::Bool(is_selected.is_row_selected(&id)))
                }),
                method("selectAll", move |args| {
                    all.select_all(opt_arg("selectAll", args, 0)?.unwrap_or_default());
                    Ok(Value::Null)
                }),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::columns::ColumnsModule;
    use crate::features::filtering::FilterItem;
    use crate::features::filtering::FilterModel;
    use crate::features::filtering::FilterOperator;
    use crate::features::filtering::FilteringModule;
    use crate::features::rows::RowUpdate;
    use crate::features::rows::RowsModule;
    use crate::options::GridOptions;
    use crate::value::CellValue;
    use crate::value::row;

    struct Fixture {
        ctx: GridContext,
        rows: RowsModule,
        columns: ColumnsModule,
        selection: SelectionModule,
        _pipes: Vec<PipeProcessorHandle>,
        _subs: Vec<Subscription>,
    }

    fn fixture(options: GridOptions) -> Fixture {
        let ctx = GridContext::new(options);
        let selection = SelectionModule::new(ctx.clone());
        let _pipes = selection.register_pipes();
        let _subs = selection.subscribe();
        let columns = ColumnsModule::new(ctx.clone());
        columns.set_columns(vec![ColumnDef::new("n").with_type(ColumnType::Number)]);
        let rows = RowsModule::new(ctx.clone());
        rows.set_rows((1..=5).map(|i| row([("id", CellValue::from(i)), ("n", i.into())])).collect());
        Fixture {
            ctx,
            rows,
            columns,
            selection,
            _pipes,
            _subs,
        }
    }

    #[test]
    fn checkbox_column_is_added_once_and_removed_when_disabled() {
        let f = fixture(GridOptions {
            checkbox_selection: true,
            ..Default::default()
        });
        f.columns.hydrate();
        f.columns.hydrate();
        let fields = f.columns.state().ordered_fields.clone();
        assert_eq!(fields.iter().filter(|c| *c == CHECKBOX_FIELD).count(), 1);
        assert_eq!(fields[0], CHECKBOX_FIELD);

        let options = GridOptions {
            checkbox_selection: false,
            ..Default::default()
        };
        f.ctx.store.update(|s| s.options = Rc::new(options));
        f.columns.hydrate();
        assert_eq!(f.columns.state().ordered_fields, vec!["n"]);
    }

    #[test]
    fn single_mode_keeps_one_row() {
        let f = fixture(GridOptions {
            row_selection_mode: RowSelectionMode::Single,
            ..Default::default()
        });
        f.selection.select_rows(&[RowId::Int(1), RowId::Int(2)], true, false);
        assert_eq!(f.selection.selected_ids(), vec![RowId::Int(2)]);
        f.selection.toggle_row(&RowId::Int(3)).unwrap();
        assert_eq!(f.selection.selected_ids(), vec![RowId::Int(3)]);
    }

    #[test]
    fn unselectable_rows_are_skipped() {
        let f = fixture(GridOptions {
            is_row_selectable: Some(Rc::new(|id: &RowId, _: &crate::value::GridRowModel| *id != RowId::Int(2))),
            ..Default::default()
        });
        f.selection.set_row_selection_model(vec![RowId::Int(1), RowId::Int(2), RowId::Int(99)]);
        assert_eq!(f.selection.selected_ids(), vec![RowId::Int(1)]);
        assert!(f.selection.select_row(&RowId::Int(42), true, false).is_err());
    }

    #[test]
    fn select_all_covers_filtered_rows() {
        let f = fixture(GridOptions::default());
        FilteringModule::new(f.ctx.clone()).set_filter_model(FilterModel {
            items: vec![FilterItem::new("n", FilterOperator::Gt, 3)],
            ..Default::default()
        });
        f.selection.select_all(SelectAllScope::Filtered);
        assert_eq!(f.selection.selected_ids(), vec![RowId::Int(4), RowId::Int(5)]);
    }

    #[test]
    fn removed_rows_leave_the_selection() {
        let f = fixture(GridOptions::default());
        f.selection.select_rows(&[RowId::Int(1), RowId::Int(2)], true, false);
        f.rows.update_rows(vec![RowUpdate::Delete(RowId::Int(1))]);
        assert_eq!(f.selection.selected_ids(), vec![RowId::Int(2)]);
        f.rows.set_rows(vec![]);
        assert_eq!(f.selection.selected_count(), 0);
    }
}
