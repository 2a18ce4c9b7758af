use serde_json::Value;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::column::ColumnDef;
use crate::column::ColumnType;
use crate::context::GridContext;
use crate::error::GridError;
use crate::error::Result;
use crate::features::columns::HYDRATE_COLUMNS;
use crate::features::columns::HydratedColumns;
use crate::features::require_tier;
use crate::features::rows::RowsModule;
use crate::locale::keys;
use crate::options::Tier;
use crate::pipe::PipeProcessorHandle;
use crate::store::GridState;
use crate::value::RowId;

pub const REORDER_FIELD: &str = "__reorder__";

fn hydrate_reorder_column(columns: HydratedColumns, state: &GridState) -> HydratedColumns {
    let enabled = state.options.row_reordering && state.options.allows(Tier::Pro);
    if !enabled || columns.contains(REORDER_FIELD) {
        return columns;
    }
    let header = state
        .options
        .locale_text
        .resolve(keys::ROW_REORDERING_HEADER_NAME, &[]);
    columns.prepend(ColumnDef {
        header_name: Some(header),
        column_type: ColumnType::Actions,
        width: Some(3),
        min_width: 3,
        sortable: false,
        filterable: false,
        hideable: false,
        groupable: false,
        aggregable: false,
        synthetic: true,
        ..ColumnDef::new(REORDER_FIELD)
    })
}

#[derive(Clone)]
pub struct RowReorderModule {
    ctx: GridContext,
    rows: RowsModule,
}

impl RowReorderModule {
    pub fn new(ctx: GridContext, rows: RowsModule) -> Self {
        Self { ctx, rows }
    }

    pub fn register_pipes(&self) -> Vec<PipeProcessorHandle> {
        vec![self.ctx.pipes.register(HYDRATE_COLUMNS, "rowReorder", hydrate_reorder_column)]
    }

    pub fn row_index(&self, id: &RowId) -> Option<usize> {
        self.ctx.store.read(|s| s.rows.ids.iter().position(|r| r == id))
    }

    /// Moves a row to `target` in the row order. Grouped rows cannot be reordered.
    pub fn set_row_index(&self, id: &RowId, target: usize) -> Result<()> {
        require_tier(&self.ctx.options(), "row reordering", Tier::Pro)?;
        if self.ctx.store.read(|s| s.rows.tree.is_grouped()) {
            return Err(GridError::InvalidArguments {
                method: "setRowIndex".to_string(),
                reason: "rows cannot be reordered while grouped".to_string(),
            });
        }
        self.rows.move_row(id, target)?;
        Ok(())
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let set = self.clone();
        let get = self.clone();
        api.register(
            "rowReorder",
            ApiVisibility::Public,
            [
                method("setRowIndex", move |args| {
                    let id: RowId = arg("setRowIndex", args, 0)?;
                    set.set_row_index(&id, arg("setRowIndex", args, 1)?)?;
                    Ok(Value::Null)
                }),
                method("getRowIndex", move |args| {
                    let id: RowId = arg("getRowIndex", args, 0)?;
                    Ok(serde_json::to_value(get.row_index(&id))?)
                }),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::columns::ColumnsModule;
    use crate::features::selection::CHECKBOX_FIELD;
    use crate::features::selection::SelectionModule;
    use crate::options::GridOptions;
    use crate::value::row;

    #[test]
    fn synthetic_columns_follow_registration_order() {
        let ctx = GridContext::new(GridOptions {
            tier: Tier::Pro,
            checkbox_selection: true,
            row_reordering: true,
            ..Default::default()
        });
        let rows = RowsModule::new(ctx.clone());
        let _selection = SelectionModule::new(ctx.clone()).register_pipes();
        let _reorder = RowReorderModule::new(ctx.clone(), rows).register_pipes();
        let columns = ColumnsModule::new(ctx);
        columns.set_columns(vec![ColumnDef::new("name")]);
        assert_eq!(columns.state().ordered_fields, vec![REORDER_FIELD, CHECKBOX_FIELD, "name"]);
    }

    #[test]
    fn reorder_column_needs_pro() {
        let ctx = GridContext::new(GridOptions {
            row_reordering: true,
            ..Default::default()
        });
        let reorder = RowReorderModule::new(ctx.clone(), RowsModule::new(ctx.clone()));
        let _pipes = reorder.register_pipes();
        let columns = ColumnsModule::new(ctx);
        columns.set_columns(vec![ColumnDef::new("name")]);
        assert_eq!(columns.state().ordered_fields, vec!["name"]);
        assert!(reorder.set_row_index(&RowId::Int(1), 0).is_err());
    }

    #[test]
    fn set_row_index_moves_the_row() {
        let ctx = GridContext::new(GridOptions {
            tier: Tier::Pro,
            ..Default::default()
        });
        let rows = RowsModule::new(ctx.clone());
        rows.set_rows((1..=3).map(|i| row([("id", i)])).collect());
        let reorder = RowReorderModule::new(ctx, rows.clone());
        reorder.set_row_index(&RowId::Int(3), 0).unwrap();
        assert_eq!(rows.row_ids(), vec![RowId::Int(3), RowId::Int(1), RowId::Int(2)]);
        assert_eq!(reorder.row_index(&RowId::Int(1)), Some(1));
    }
}
