//! Row grouping by column values.
//!
//! Grouping rebuilds the row tree through `hydrateRows` and injects the grouping column(s)
//! through `hydrateColumns`. In single mode one column shows every level; in multiple mode each
//! criterion gets its own column.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::api::opt_arg;
use crate::column::ColumnDef;
use crate::column::ColumnType;
use crate::context::GridContext;
use crate::error::Result;
use crate::events::GridEvent;
use crate::features::column_menu::COLUMN_MENU;
use crate::features::column_menu::ColumnMenuAction;
use crate::features::column_menu::ColumnMenuContext;
use crate::features::column_menu::ColumnMenuItem;
use crate::features::columns::ColumnsModule;
use crate::features::columns::HYDRATE_COLUMNS;
use crate::features::columns::HydratedColumns;
use crate::features::require_tier;
use crate::features::rows::HYDRATE_ROWS;
use crate::features::rows::RowNode;
use crate::features::rows::RowNodeKind;
use crate::features::rows::RowTree;
use crate::features::rows::RowsModule;
use crate::locale::LocaleArg;
use crate::locale::keys;
use crate::options::RowGroupingColumnMode;
use crate::options::Tier;
use crate::pipe::PipeProcessorHandle;
use crate::store::GridState;
use crate::value::CellValue;
use crate::value::RowId;

pub const GROUPING_FIELD: &str = "__row_group_by_columns_group__";
const GROUPING_FIELD_PREFIX: &str = "__row_group_by_columns_group_";
const GROUP_ID_PREFIX: &str = "auto-generated-row-";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowGroupingState {
    pub model: Vec<String>,
}

/// Field of the grouping column for `criterion` in multiple-column mode.
/// Escapes the separators used in group paths so distinct keys never share an id.
fn escape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if matches!(c, '\\' | '-' | '/') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn grouping_field_for(criterion: &str) -> String {
    format!("{GROUPING_FIELD_PREFIX}{criterion}__")
}

pub fn is_grouping_field(field: &str) -> bool {
    field.starts_with(GROUPING_FIELD_PREFIX) && field.ends_with("__")
}

/// The criterion a multiple-mode grouping column stands for.
fn criterion_of(grouping_field: &str) -> Option<&str> {
    if grouping_field == GROUPING_FIELD {
        return None;
    }
    grouping_field
        .strip_prefix(GROUPING_FIELD_PREFIX)
        .and_then(|rest| rest.strip_suffix("__"))
}

/// Whether the grouping column `grouping_field` displays groups built from `criterion`.
pub fn grouping_column_applies(grouping_field: &str, criterion: &str) -> bool {
    grouping_field == GROUPING_FIELD || criterion_of(grouping_field) == Some(criterion)
}

/// Value a grouping column shows for `node`, if it is a group the column applies to.
pub fn group_cell_value(column_field: &str, node: &RowNode) -> Option<CellValue> {
    match &node.kind {
        RowNodeKind::Group { field, key } if grouping_column_applies(column_field, field) => {
            Some(key.clone())
        }
        _ => None,
    }
}

fn grouping_active(state: &GridState) -> bool {
    state.options.allows(Tier::Premium) && !state.row_grouping.model.is_empty()
}

fn grouping_column(field: String, header: String) -> ColumnDef {
    ColumnDef {
        header_name: Some(header),
        column_type: ColumnType::Actions,
        width: Some(24),
        min_width: 8,
        filterable: false,
        hideable: false,
        groupable: false,
        pinnable: true,
        aggregable: false,
        synthetic: true,
        ..ColumnDef::new(field)
    }
}

fn hydrate_grouping_columns(columns: HydratedColumns, state: &GridState) -> HydratedColumns {
    if !grouping_active(state) {
        return columns;
    }
    let header = state
        .options
        .locale_text
        .resolve(keys::GROUPING_COLUMN_HEADER_NAME, &[]);
    match state.options.row_grouping_column_mode {
        RowGroupingColumnMode::Single => columns.prepend(grouping_column(GROUPING_FIELD.to_string(), header)),
        RowGroupingColumnMode::Multiple => {
            // Prepend in reverse so the columns end up in model order.
            state.row_grouping.model.iter().rev().fold(columns, |acc, criterion| {
                let label = acc
                    .lookup
                    .get(criterion)
                    .map(|c| c.header_label().to_string())
                    .unwrap_or_else(|| criterion.clone());
                acc.prepend(grouping_column(grouping_field_for(criterion), label))
            })
        }
    }
}

fn hydrate_grouped_rows(tree: RowTree, state: &GridState) -> RowTree {
    if !grouping_active(state) {
        return tree;
    }
    let model = &state.row_grouping.model;
    let mut grouped = RowTree::empty();
    let root = grouped.root().id.clone();
    for id in &state.rows.ids {
        let Some(row) = state.rows.lookup.get(id) else {
            continue;
        };
        let mut parent = root.clone();
        let mut path = String::new();
        for field in model {
            let key = match state.columns.column(field) {
                Some(column) => column.value(row),
                None => row.get(field).cloned().unwrap_or_default(),
            };
            if !path.is_empty() {
                path.push('-');
            }
            path.push_str(&escape_segment(field));
            path.push('/');
            path.push_str(&escape_segment(&key.to_string()));
            let group_id = RowId::Str(format!("{GROUP_ID_PREFIX}{path}"));
            if grouped.node(&group_id).is_none() {
                grouped.insert(
                    &parent,
                    group_id.clone(),
                    RowNodeKind::Group {
                        field: field.clone(),
                        key,
                    },
                );
            }
            parent = group_id;
        }
        grouped.insert(&parent, id.clone(), RowNodeKind::Leaf);
    }
    grouped
}

fn grouping_items(mut items: Vec<ColumnMenuItem>, ctx: &ColumnMenuContext) -> Vec<ColumnMenuItem> {
    let state = &ctx.state;
    if !state.options.allows(Tier::Premium) {
        return items;
    }
    let model = &state.row_grouping.model;
    let label_of = |field: &str| {
        state
            .columns
            .column(field)
            .map(|c| c.header_label().to_string())
            .unwrap_or_else(|| field.to_string())
    };
    let ungroup = |field: &str| {
        ColumnMenuItem::new(
            format!("ungroup:{field}"),
            state
                .options
                .locale_text
                .resolve(keys::UNGROUP_COLUMN, &[LocaleArg::Text(label_of(field))]),
            ColumnMenuAction::Ungroup(field.to_string()),
        )
    };
    let field = ctx.column.field.as_str();
    if field == GROUPING_FIELD {
        // The shared column stands for every criterion.
        items.extend(model.iter().map(|f| ungroup(f.as_str())));
    } else if let Some(criterion) = criterion_of(field) {
        items.push(ungroup(criterion));
    } else if model.iter().any(|f| f == field) {
        items.push(ungroup(field));
    } else if ctx.column.groupable && !ctx.column.synthetic {
        items.push(ColumnMenuItem::new(
            "groupBy",
            state
                .options
                .locale_text
                .resolve(keys::GROUP_COLUMN, &[LocaleArg::Text(label_of(field))]),
            ColumnMenuAction::GroupBy,
        ));
    }
    items
}

#[derive(Clone)]
pub struct RowGroupingModule {
    ctx: GridContext,
    columns: ColumnsModule,
    rows: RowsModule,
}

impl RowGroupingModule {
    pub fn new(ctx: GridContext, columns: ColumnsModule, rows: RowsModule) -> Self {
        Self { ctx, columns, rows }
    }

    pub fn register_pipes(&self) -> Vec<PipeProcessorHandle> {
        vec![
            self.ctx.pipes.register(HYDRATE_COLUMNS, "rowGrouping", hydrate_grouping_columns),
            self.ctx.pipes.register(HYDRATE_ROWS, "rowGrouping", hydrate_grouped_rows),
            self.ctx.pipes.register(COLUMN_MENU, "columnMenu.rowGrouping", grouping_items),
        ]
    }

    pub fn row_grouping_model(&self) -> Vec<String> {
        self.ctx.store.read(|s| s.row_grouping.model.clone())
    }

    pub fn set_row_grouping_model(&self, model: Vec<String>) -> Result<()> {
        require_tier(&self.ctx.options(), "row grouping", Tier::Premium)?;
        let mut deduped: Vec<String> = Vec::with_capacity(model.len());
        for field in model {
            if !deduped.contains(&field) {
                deduped.push(field);
            }
        }
        for field in &deduped {
            if self.columns.column(field).is_none() {
                tracing::warn!(field = %field, "grouping by a field without a column");
            }
        }
        if deduped == self.row_grouping_model() {
            return Ok(());
        }
        self.ctx.store.update(|s| {
            s.row_grouping = Rc::new(RowGroupingState {
                model: deduped.clone(),
            })
        });
        self.columns.hydrate();
        self.rows.hydrate();
        self.ctx.publish(GridEvent::RowGroupingModelChange(deduped));
        Ok(())
    }

    /// Adds `field` at `index` (appends by default). Already-grouped fields move.
    pub fn add_row_grouping_criteria(&self, field: &str, index: Option<usize>) -> Result<()> {
        let mut model = self.row_grouping_model();
        model.retain(|f| f != field);
        let index = index.unwrap_or(model.len()).min(model.len());
        model.insert(index, field.to_string());
        self.set_row_grouping_model(model)
    }

    pub fn remove_row_grouping_criteria(&self, field: &str) -> Result<()> {
        let mut model = self.row_grouping_model();
        model.retain(|f| f != field);
        self.set_row_grouping_model(model)
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let get = self.clone();
        let set = self.clone();
        let add = self.clone();
        let remove = self.clone();
        api.register(
            "rowGrouping",
            ApiVisibility::Public,
            [
                method("getRowGroupingModel", move |_| {
                    Ok(serde_json::to_value(get.row_grouping_model())?)
                }),
                method("setRowGroupingModel", move |args| {
                    set.set_row_grouping_model(arg("setRowGroupingModel", args, 0)?)?;
                    Ok(Value::Null)
                }),
                method("addRowGroupingCriteria", move |args| {
                    let field: String = arg("addRowGroupingCriteria", args, 0)?;
                    add.add_row_grouping_criteria(&field, opt_arg("addRowGroupingCriteria", args, 1)?)?;
                    Ok(Value::Null)
                }),
                method("removeRowGroupingCriteria", move |args| {
                    let field: String = arg("removeRowGroupingCriteria", args, 0)?;
                    remove.remove_row_grouping_criteria(&field)?;
                    Ok(Value::Null)
                }),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridError;
    use crate::features::column_menu::ColumnMenuModule;
    use crate::features::rows::root_id;
    use crate::options::GridOptions;
    use crate::pipe::PipeProcessorHandle;
    use crate::value::row;

    fn grid(mode: RowGroupingColumnMode) -> (RowGroupingModule, Vec<PipeProcessorHandle>) {
        let ctx = GridContext::new(GridOptions {
            tier: Tier::Premium,
            row_grouping_column_mode: mode,
            ..Default::default()
        });
        let columns = ColumnsModule::new(ctx.clone());
        let rows = RowsModule::new(ctx.clone());
        let grouping = RowGroupingModule::new(ctx, columns.clone(), rows.clone());
        let pipes = grouping.register_pipes();
        columns.set_columns(vec![
            ColumnDef::new("country"),
            ColumnDef::new("city"),
            ColumnDef::new("name"),
        ]);
        rows.set_rows(vec![
            row([("id", CellValue::from(1)), ("country", "FR".into()), ("city", "Paris".into())]),
            row([("id", CellValue::from(2)), ("country", "UK".into()), ("city", "London".into())]),
            row([("id", CellValue::from(3)), ("country", "FR".into()), ("city", "Lyon".into())]),
            row([("id", CellValue::from(4)), ("country", "FR".into()), ("city", "Paris".into())]),
        ]);
        (grouping, pipes)
    }

    #[test]
    fn nested_groups_follow_the_model_order() {
        let (grouping, _pipes) = grid(RowGroupingColumnMode::Single);
        grouping.add_row_grouping_criteria("country", None).unwrap();
        grouping.add_row_grouping_criteria("city", None).unwrap();

        let tree = grouping.rows.state().tree.clone();
        let top = tree.children(&root_id()).to_vec();
        assert_eq!(top.len(), 2);
        let fr = tree.node(&top[0]).unwrap();
        assert_eq!(fr.depth, 0);
        assert_eq!(
            fr.kind,
            RowNodeKind::Group {
                field: "country".into(),
                key: "FR".into()
            }
        );
        assert_eq!(fr.children.len(), 2);
        let paris = tree.node(&fr.children[0]).unwrap();
        assert_eq!(paris.children, vec![RowId::Int(1), RowId::Int(4)]);
        assert_eq!(tree.node(&RowId::Int(4)).unwrap().depth, 2);
    }

    #[test]
    fn group_keys_containing_separators_stay_distinct() {
        let ctx = GridContext::new(GridOptions {
            tier: Tier::Premium,
            ..Default::default()
        });
        let columns = ColumnsModule::new(ctx.clone());
        let rows = RowsModule::new(ctx.clone());
        let grouping = RowGroupingModule::new(ctx, columns.clone(), rows.clone());
        let _pipes = grouping.register_pipes();
        columns.set_columns(vec![ColumnDef::new("x"), ColumnDef::new("y")]);
        rows.set_rows(vec![
            row([("id", CellValue::from(1)), ("x", "a-y/b".into()), ("y", "c".into())]),
            row([("id", CellValue::from(2)), ("x", "a".into()), ("y", "b".into())]),
        ]);
        grouping.set_row_grouping_model(vec!["x".into(), "y".into()]).unwrap();

        let tree = rows.state().tree.clone();
        let top = tree.children(&root_id()).to_vec();
        assert_eq!(top.len(), 2);
        let inner: Vec<RowId> = top.iter().flat_map(|g| tree.children(g).to_vec()).collect();
        assert_eq!(inner.len(), 2);
        assert!(inner.iter().all(|id| !top.contains(id)));
        assert_eq!(tree.node(&RowId::Int(2)).unwrap().depth, 2);
    }

    #[test]
    fn single_mode_injects_one_grouping_column() {
        let (grouping, _pipes) = grid(RowGroupingColumnMode::Single);
        grouping.set_row_grouping_model(vec!["country".into(), "city".into()]).unwrap();
        let fields = grouping.columns.state().ordered_fields.clone();
        assert_eq!(fields, vec![GROUPING_FIELD, "country", "city", "name"]);

        grouping.set_row_grouping_model(vec![]).unwrap();
        assert_eq!(grouping.columns.state().ordered_fields, vec!["country", "city", "name"]);
        assert!(!grouping.rows.state().tree.is_grouped());
    }

    #[test]
    fn multiple_mode_injects_a_column_per_criterion() {
        let (grouping, _pipes) = grid(RowGroupingColumnMode::Multiple);
        grouping.set_row_grouping_model(vec!["country".into(), "city".into()]).unwrap();
        let fields = grouping.columns.state().ordered_fields.clone();
        assert_eq!(
            &fields[..2],
            &[grouping_field_for("country"), grouping_field_for("city")]
        );
        assert!(grouping_column_applies(&grouping_field_for("city"), "city"));
        assert!(!grouping_column_applies(&grouping_field_for("city"), "country"));
        assert!(grouping_column_applies(GROUPING_FIELD, "country"));
    }

    #[test]
    fn menu_offers_group_and_ungroup() {
        let (grouping, _pipes) = grid(RowGroupingColumnMode::Single);
        grouping.set_row_grouping_model(vec!["country".into(), "city".into()]).unwrap();
        let menu = ColumnMenuModule::new(grouping.ctx.clone());

        let actions = |field: &str| -> Vec<ColumnMenuAction> {
            menu.items(field).unwrap().into_iter().map(|i| i.action).collect()
        };
        assert_eq!(
            actions(GROUPING_FIELD),
            vec![
                ColumnMenuAction::Ungroup("country".into()),
                ColumnMenuAction::Ungroup("city".into())
            ]
        );
        assert_eq!(actions("city"), vec![ColumnMenuAction::Ungroup("city".into())]);
        assert_eq!(actions("name"), vec![ColumnMenuAction::GroupBy]);
    }

    #[test]
    fn grouping_requires_premium() {
        let ctx = GridContext::new(GridOptions {
            tier: Tier::Pro,
            ..Default::default()
        });
        let grouping = RowGroupingModule::new(
            ctx.clone(),
            ColumnsModule::new(ctx.clone()),
            RowsModule::new(ctx),
        );
        assert!(matches!(
            grouping.add_row_grouping_criteria("a", None),
            Err(GridError::FeatureUnavailable { .. })
        ));
    }
}
