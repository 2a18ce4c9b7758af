//! Column aggregation over row groups.
//!
//! Every group gets its aggregated values inline in the group row; the root, at depth `-1`,
//! holds the grid-wide values shown in the footer.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::column::ColumnDef;
use crate::column::ColumnType;
use crate::context::GridContext;
use crate::error::GridError;
use crate::error::Result;
use crate::events::GridEvent;
use crate::features::column_menu::COLUMN_MENU;
use crate::features::column_menu::ColumnMenuAction;
use crate::features::column_menu::ColumnMenuContext;
use crate::features::column_menu::ColumnMenuItem;
use crate::features::columns::ColumnsState;
use crate::features::filtering::FILTER_RESULT;
use crate::features::filtering::FilterResult;
use crate::features::require_tier;
use crate::features::rows::RowNode;
use crate::features::rows::RowsState;
use crate::locale::keys;
use crate::options::AggregationRowsScope;
use crate::options::GridOptions;
use crate::options::Tier;
use crate::pipe::PipeProcessorHandle;
use crate::selector::MemoizedSelector;
use crate::value::CellValue;
use crate::value::RowId;

/// Field → aggregation function name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationState {
    pub model: HashMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregationFunction {
    Sum,
    Avg,
    Min,
    Max,
    Size,
}

impl AggregationFunction {
    pub const ALL: [AggregationFunction; 5] = [
        AggregationFunction::Sum,
        AggregationFunction::Avg,
        AggregationFunction::Min,
        AggregationFunction::Max,
        AggregationFunction::Size,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(AggregationFunction::Sum),
            "avg" => Some(AggregationFunction::Avg),
            "min" => Some(AggregationFunction::Min),
            "max" => Some(AggregationFunction::Max),
            "size" => Some(AggregationFunction::Size),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AggregationFunction::Sum => "sum",
            AggregationFunction::Avg => "avg",
            AggregationFunction::Min => "min",
            AggregationFunction::Max => "max",
            AggregationFunction::Size => "size",
        }
    }

    fn label_key(self) -> &'static str {
        match self {
            AggregationFunction::Sum => keys::AGGREGATION_FUNCTION_LABEL_SUM,
            AggregationFunction::Avg => keys::AGGREGATION_FUNCTION_LABEL_AVG,
            AggregationFunction::Min => keys::AGGREGATION_FUNCTION_LABEL_MIN,
            AggregationFunction::Max => keys::AGGREGATION_FUNCTION_LABEL_MAX,
            AggregationFunction::Size => keys::AGGREGATION_FUNCTION_LABEL_SIZE,
        }
    }

    pub fn applies_to(self, column_type: ColumnType) -> bool {
        match self {
            AggregationFunction::Sum | AggregationFunction::Avg => column_type == ColumnType::Number,
            AggregationFunction::Min | AggregationFunction::Max => {
                matches!(column_type, ColumnType::Number | ColumnType::Date)
            }
            AggregationFunction::Size => column_type != ColumnType::Actions,
        }
    }

    pub fn apply(self, values: &[CellValue]) -> CellValue {
        match self {
            AggregationFunction::Size => CellValue::Number(values.len() as f64),
            AggregationFunction::Sum => CellValue::Number(values.iter().filter_map(CellValue::as_f64).sum()),
            AggregationFunction::Avg => {
                let numbers: Vec<f64> = values.iter().filter_map(CellValue::as_f64).collect();
                if numbers.is_empty() {
                    CellValue::Null
                } else {
                    CellValue::Number(numbers.iter().sum::<f64>() / numbers.len() as f64)
                }
            }
            AggregationFunction::Min => values
                .iter()
                .filter(|v| !v.is_null())
                .min_by(|a, b| a.compare(b))
                .cloned()
                .unwrap_or_default(),
            AggregationFunction::Max => values
                .iter()
                .filter(|v| !v.is_null())
                .max_by(|a, b| a.compare(b))
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregationPosition {
    /// Grid-wide value, rendered in the footer.
    Footer,
    /// Rendered in the group row itself.
    Inline,
}

impl AggregationPosition {
    pub fn for_node(node: &RowNode) -> Self {
        if node.depth == -1 {
            AggregationPosition::Footer
        } else {
            AggregationPosition::Inline
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AggregatedValue {
    pub value: CellValue,
    pub function: AggregationFunction,
    pub position: AggregationPosition,
}

/// Aggregated values per group id (root included) and field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregationResult {
    pub values: HashMap<RowId, HashMap<String, AggregatedValue>>,
}

impl AggregationResult {
    pub fn get(&self, id: &RowId, field: &str) -> Option<&AggregatedValue> {
        self.values.get(id)?.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

type AggregationInputs = (
    Rc<RowsState>,
    Rc<AggregationState>,
    Rc<ColumnsState>,
    Rc<FilterResult>,
    Rc<GridOptions>,
);

pub static AGGREGATION_RESULT: MemoizedSelector<AggregationInputs, AggregationResult> = MemoizedSelector::new(
    "aggregation.result",
    |store| {
        let filter = store.select(&FILTER_RESULT);
        store.read(|s| {
            (
                s.rows.clone(),
                s.aggregation.clone(),
                s.columns.clone(),
                filter,
                s.options.clone(),
            )
        })
    },
    |(rows, aggregation, columns, filter, options)| aggregate(rows, aggregation, columns, filter, options),
);

fn aggregate(
    rows: &RowsState,
    aggregation: &AggregationState,
    columns: &ColumnsState,
    filter: &FilterResult,
    options: &GridOptions,
) -> AggregationResult {
    if !options.allows(Tier::Premium) || aggregation.model.is_empty() {
        return AggregationResult::default();
    }
    let rules: Vec<(&ColumnDef, AggregationFunction)> = aggregation
        .model
        .iter()
        .filter_map(|(field, name)| {
            let column = columns.column(field).filter(|c| c.aggregable && !c.synthetic)?;
            let function = AggregationFunction::from_name(name)?;
            function.applies_to(column.column_type).then_some((column, function))
        })
        .collect();
    if rules.is_empty() {
        return AggregationResult::default();
    }

    let root = rows.tree.root();
    let mut values = HashMap::new();
    for node in std::iter::once(root).chain(rows.tree.groups()) {
        let leaves: Vec<RowId> = rows
            .tree
            .leaves_under(&node.id)
            .into_iter()
            .filter(|id| match options.aggregation_rows_scope {
                AggregationRowsScope::Filtered => filter.passes(id),
                AggregationRowsScope::All => true,
            })
            .collect();
        let position = AggregationPosition::for_node(node);
        let per_field: HashMap<String, AggregatedValue> = rules
            .iter()
            .map(|(column, function)| {
                let cells: Vec<CellValue> = leaves
                    .iter()
                    .filter_map(|id| rows.lookup.get(id))
                    .map(|row| column.value(row))
                    .collect();
                let value = AggregatedValue {
                    value: function.apply(&cells),
                    function: *function,
                    position,
                };
                (column.field.clone(), value)
            })
            .collect();
        values.insert(node.id.clone(), per_field);
    }
    tracing::debug!(groups = values.len(), "aggregation recomputed");
    AggregationResult { values }
}

fn aggregation_items(mut items: Vec<ColumnMenuItem>, ctx: &ColumnMenuContext) -> Vec<ColumnMenuItem> {
    let column = &ctx.column;
    if !ctx.state.options.allows(Tier::Premium) || !column.aggregable || column.synthetic {
        return items;
    }
    let current = ctx.state.aggregation.model.get(&column.field).cloned();
    for function in AggregationFunction::ALL {
        if !function.applies_to(column.column_type) {
            continue;
        }
        let active = current.as_deref() == Some(function.name());
        items.push(
            ColumnMenuItem::new(
                format!("aggregate:{}", function.name()),
                ctx.text(function.label_key()),
                ColumnMenuAction::Aggregate(Some(function.name().to_string())),
            )
            .disabled(active),
        );
    }
    if current.is_some() {
        items.push(ColumnMenuItem::new(
            "aggregate:none",
            format!("{} (none)", ctx.text(keys::AGGREGATION_MENU_ITEM_HEADER)),
            ColumnMenuAction::Aggregate(None),
        ));
    }
    items
}

#[derive(Clone)]
pub struct AggregationModule {
    ctx: GridContext,
}

impl AggregationModule {
    pub fn new(ctx: GridContext) -> Self {
        Self { ctx }
    }

    pub fn register_pipes(&self) -> Vec<PipeProcessorHandle> {
        vec![self.ctx.pipes.register(COLUMN_MENU, "columnMenu.aggregation", aggregation_items)]
    }

    pub fn aggregation_model(&self) -> HashMap<String, String> {
        self.ctx.store.read(|s| s.aggregation.model.clone())
    }

    pub fn set_aggregation_model(&self, model: HashMap<String, String>) -> Result<()> {
        require_tier(&self.ctx.options(), "aggregation", Tier::Premium)?;
        if let Some((field, name)) = model.iter().find(|(_, name)| AggregationFunction::from_name(name).is_none()) {
            return Err(GridError::InvalidArguments {
                method: "setAggregationModel".to_string(),
                reason: format!("unknown aggregation function `{name}` for `{field}`"),
            });
        }
        if model == self.aggregation_model() {
            return Ok(());
        }
        self.ctx
            .store
            .update(|s| s.aggregation = Rc::new(AggregationState { model: model.clone() }));
        self.ctx.publish(GridEvent::AggregationModelChange(model));
        Ok(())
    }

    pub fn set_column_aggregation(&self, field: &str, function: Option<&str>) -> Result<()> {
        let mut model = self.aggregation_model();
        match function {
            Some(name) => model.insert(field.to_string(), name.to_string()),
            None => model.remove(field),
        };
        self.set_aggregation_model(model)
    }

    pub fn aggregation_result(&self) -> Rc<AggregationResult> {
        self.ctx.store.select(&AGGREGATION_RESULT)
    }

    /// Grid-wide aggregated values, rendered in the footer.
    pub fn footer_values(&self) -> HashMap<String, AggregatedValue> {
        let root = crate::features::rows::root_id();
        self.aggregation_result()
            .values
            .get(&root)
            .cloned()
            .unwrap_or_default()
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let get = self.clone();
        let set = self.clone();
        let cell = self.clone();
        api.register(
            "aggregation",
            ApiVisibility::Public,
            [
                method("getAggregationModel", move |_| Ok(serde_json::to_value(get.aggregation_model())?)),
                method("setAggregationModel", move |args| {
                    set.set_aggregation_model(arg("setAggregationModel", args, 0)?)?;
                    Ok(Value::Null)
                }),
                method("getAggregatedValue", move |args| {
                    let id: RowId = arg("getAggregatedValue", args, 0)?;
                    let field: String = arg("getAggregatedValue", args, 1)?;
                    let result = cell.aggregation_result();
                    Ok(serde_json::to_value(result.get(&id, &field).map(|v| v.value.clone()))?)
                }),
            ],
        );
    }
}
