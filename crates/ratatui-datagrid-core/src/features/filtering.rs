//! Filter model, operator tables and the filtered-row selector.
//!
//! Items that cannot be applied (unknown column, operator not offered for the column, missing or
//! unparseable value) are reported as invalid and skipped; they never fail the render path.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;
use std::time::Instant;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::column::ColumnDef;
use crate::column::ColumnType;
use crate::context::GridContext;
use crate::events::GridEvent;
use crate::features::columns::ColumnsState;
use crate::features::rows::RowEntry;
use crate::features::rows::RowsState;
use crate::features::sorting::SORTED_ROWS;
use crate::selector::MemoizedSelector;
use crate::timing::Debouncer;
use crate::value::CellValue;
use crate::value::GridRowModel;
use crate::value::RowId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "equals")]
    Equals,
    #[serde(rename = "startsWith")]
    StartsWith,
    #[serde(rename = "endsWith")]
    EndsWith,
    #[serde(rename = "isEmpty")]
    IsEmpty,
    #[serde(rename = "isNotEmpty")]
    IsNotEmpty,
    #[serde(rename = "isAnyOf")]
    IsAnyOf,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "is")]
    Is,
    #[serde(rename = "not")]
    Not,
    #[serde(rename = "after")]
    After,
    #[serde(rename = "onOrAfter")]
    OnOrAfter,
    #[serde(rename = "before")]
    Before,
    #[serde(rename = "onOrBefore")]
    OnOrBefore,
}

impl FilterOperator {
    /// `false` for operators that test for absence themselves.
    pub fn requires_value(self) -> bool {
        !matches!(self, FilterOperator::IsEmpty | FilterOperator::IsNotEmpty)
    }

    /// Operators offered for a column type when the column does not list its own.
    pub fn defaults_for(column_type: ColumnType) -> &'static [FilterOperator] {
        use FilterOperator::*;
        match column_type {
            ColumnType::String => &[Contains, Equals, StartsWith, EndsWith, IsEmpty, IsNotEmpty, IsAnyOf],
            ColumnType::Number => &[Eq, Ne, Gt, Gte, Lt, Lte, IsEmpty, IsNotEmpty, IsAnyOf],
            ColumnType::Date => &[Is, Not, After, OnOrAfter, Before, OnOrBefore, IsEmpty, IsNotEmpty],
            ColumnType::Boolean => &[Is],
            ColumnType::Actions => &[],
        }
    }

    pub fn available_for(column: &ColumnDef) -> Vec<FilterOperator> {
        match &column.filter_operators {
            Some(ops) => ops.clone(),
            None => Self::defaults_for(column.column_type).to_vec(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(CellValue),
    Many(Vec<CellValue>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FilterValue>,
}

impl FilterItem {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<CellValue>) -> Self {
        Self {
            id: None,
            field: field.into(),
            operator,
            value: Some(FilterValue::One(value.into())),
        }
    }

    pub fn without_value(field: impl Into<String>, operator: FilterOperator) -> Self {
        Self {
            id: None,
            field: field.into(),
            operator,
            value: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicOperator {
    #[default]
    And,
    Or,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterModel {
    pub items: Vec<FilterItem>,
    pub logic_operator: LogicOperator,
    pub quick_filter_values: Vec<String>,
    pub quick_filter_logic_operator: LogicOperator,
}

impl FilterModel {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.quick_filter_values.iter().all(|v| v.trim().is_empty())
    }
}

enum Operand {
    None,
    Text(String),
    Number(f64),
    Bool(bool),
    Texts(Vec<String>),
    Numbers(Vec<f64>),
}

struct PreparedItem<'a> {
    column: &'a ColumnDef,
    operator: FilterOperator,
    operand: Operand,
}

fn prepare<'a>(item: &FilterItem, columns: &'a ColumnsState) -> Option<PreparedItem<'a>> {
    let column = columns.lookup.get(&item.field).filter(|c| c.filterable)?;
    if !FilterOperator::available_for(column).contains(&item.operator) {
        return None;
    }
    let operand = if !item.operator.requires_value() {
        Operand::None
    } else {
        operand(item.operator, column.column_type, item.value.as_ref()?)?
    };
    Some(PreparedItem {
        column,
        operator: item.operator,
        operand,
    })
}

fn operand(operator: FilterOperator, column_type: ColumnType, value: &FilterValue) -> Option<Operand> {
    let is_number = column_type == ColumnType::Number;
    match (operator, value) {
        (FilterOperator::IsAnyOf, FilterValue::Many(values)) => {
            let values: Vec<&CellValue> = values.iter().filter(|v| !v.is_empty()).collect();
            if values.is_empty() {
                return None;
            }
            if is_number {
                values
                    .iter()
                    .map(|v| v.as_f64())
                    .collect::<Option<Vec<_>>>()
                    .map(Operand::Numbers)
            } else {
                Some(Operand::Texts(values.iter().map(|v| v.to_string().to_lowercase()).collect()))
            }
        }
        (FilterOperator::IsAnyOf, FilterValue::One(_)) => None,
        (_, FilterValue::Many(_)) => None,
        (_, FilterValue::One(v)) if v.is_empty() => None,
        (_, FilterValue::One(v)) => match column_type {
            ColumnType::Number => v.as_f64().map(Operand::Number),
            ColumnType::Boolean => v.as_bool().map(Operand::Bool),
            ColumnType::Date => Some(Operand::Text(v.to_string())),
            _ => Some(Operand::Text(v.to_string().to_lowercase())),
        },
    }
}

fn item_matches(item: &PreparedItem<'_>, row: &GridRowModel) -> bool {
    use FilterOperator::*;

    let value = item.column.value(row);
    match item.operator {
        IsEmpty => return value.is_empty(),
        IsNotEmpty => return !value.is_empty(),
        _ => {}
    }
    if value.is_empty() {
        return false;
    }
    match (&item.operand, item.operator) {
        (Operand::Text(needle), Is | Not | After | OnOrAfter | Before | OnOrBefore) => {
            let text = value.to_string();
            let text = text.as_str();
            let needle = needle.as_str();
            match item.operator {
                Is => text == needle,
                Not => text != needle,
                After => text > needle,
                OnOrAfter => text >= needle,
                Before => text < needle,
                _ => text <= needle,
            }
        }
        (Operand::Text(needle), op) => {
            let text = value.to_string().to_lowercase();
            match op {
                Contains => text.contains(needle.as_str()),
                Equals => text == *needle,
                StartsWith => text.starts_with(needle.as_str()),
                EndsWith => text.ends_with(needle.as_str()),
                _ => false,
            }
        }
        (Operand::Number(n), op) => {
            let Some(v) = value.as_f64() else {
                return false;
            };
            match op {
                Eq => v == *n,
                Ne => v != *n,
                Gt => v > *n,
                Gte => v >= *n,
                Lt => v < *n,
                Lte => v <= *n,
                _ => false,
            }
        }
        (Operand::Bool(b), _) => value.as_bool() == Some(*b),
        (Operand::Texts(options), _) => {
            let text = value.to_string().to_lowercase();
            options.iter().any(|o| *o == text)
        }
        (Operand::Numbers(options), _) => value.as_f64().is_some_and(|v| options.contains(&v)),
        (Operand::None, _) => true,
    }
}

/// Outcome of applying the filter model to the row tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterResult {
    /// `false` when no valid item or quick filter applies; every row then passes.
    pub active: bool,
    /// Passing leaves, plus every group with at least one passing leaf below it.
    pub passing: HashSet<RowId>,
    pub passing_leaf_count: usize,
    /// Indexes into `FilterModel::items` of the items that were skipped.
    pub invalid_items: Vec<usize>,
}

impl FilterResult {
    pub fn passes(&self, id: &RowId) -> bool {
        !self.active || self.passing.contains(id)
    }
}

pub static FILTER_RESULT: MemoizedSelector<(Rc<RowsState>, Rc<FilterModel>, Rc<ColumnsState>), FilterResult> =
    MemoizedSelector::new(
        "filtering.result",
        |store| store.read(|s| (s.rows.clone(), s.filter.clone(), s.columns.clone())),
        |(rows, model, columns)| filter_rows(rows, model, columns),
    );

/// Leaf ids that pass the filter, in sorted order, regardless of group expansion.
pub static FILTERED_SORTED_LEAF_IDS: MemoizedSelector<(Rc<Vec<RowEntry>>, Rc<FilterResult>), Vec<RowId>> =
    MemoizedSelector::new(
        "filtering.sortedLeafIds",
        |store| (store.select(&SORTED_ROWS), store.select(&FILTER_RESULT)),
        |(sorted, filter)| {
            sorted
                .iter()
                .filter(|e| !e.is_group && filter.passes(&e.id))
                .map(|e| e.id.clone())
                .collect()
        },
    );

fn filter_rows(rows: &RowsState, model: &FilterModel, columns: &ColumnsState) -> FilterResult {
    let mut invalid_items = Vec::new();
    let prepared: Vec<PreparedItem<'_>> = model
        .items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let p = prepare(item, columns);
            if p.is_none() {
                invalid_items.push(i);
            }
            p
        })
        .collect();
    let tokens: Vec<String> = model
        .quick_filter_values
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if !invalid_items.is_empty() {
        tracing::debug!(?invalid_items, "skipping invalid filter items");
    }

    if prepared.is_empty() && tokens.is_empty() {
        return FilterResult {
            active: false,
            passing: HashSet::new(),
            passing_leaf_count: rows.ids.len(),
            invalid_items,
        };
    }

    let quick_columns: Vec<&ColumnDef> = columns
        .ordered_fields
        .iter()
        .filter(|f| columns.is_visible(f))
        .filter_map(|f| columns.lookup.get(f))
        .filter(|c| c.filterable && !c.synthetic)
        .collect();

    let mut passing = HashSet::new();
    let mut passing_leaf_count = 0;
    for id in &rows.ids {
        let Some(row) = rows.lookup.get(id) else {
            continue;
        };
        let items_pass = prepared.is_empty()
            || match model.logic_operator {
                LogicOperator::And => prepared.iter().all(|p| item_matches(p, row)),
                LogicOperator::Or => prepared.iter().any(|p| item_matches(p, row)),
            };
        let quick_pass = tokens.is_empty() || {
            let cells: Vec<String> = quick_columns
                .iter()
                .map(|c| c.format(&c.value(row)).to_lowercase())
                .collect();
            let token_matches = |t: &String| cells.iter().any(|cell| cell.contains(t.as_str()));
            match model.quick_filter_logic_operator {
                LogicOperator::And => tokens.iter().all(token_matches),
                LogicOperator::Or => tokens.iter().any(token_matches),
            }
        };
        if items_pass && quick_pass {
            passing_leaf_count += 1;
            let mut parent = rows.tree.node(id).and_then(|n| n.parent.clone());
            passing.insert(id.clone());
            while let Some(p) = parent {
                if !passing.insert(p.clone()) {
                    break;
                }
                parent = rows.tree.node(&p).and_then(|n| n.parent.clone());
            }
        }
    }
    FilterResult {
        active: true,
        passing,
        passing_leaf_count,
        invalid_items,
    }
}

#[derive(Clone)]
pub struct FilteringModule {
    ctx: GridContext,
    quick_filter: Rc<RefCell<Debouncer<String>>>,
}

impl FilteringModule {
    pub fn new(ctx: GridContext) -> Self {
        let delay = ctx.options().quick_filter_debounce;
        Self {
            ctx,
            quick_filter: Rc::new(RefCell::new(Debouncer::new(delay))),
        }
    }

    pub fn filter_model(&self) -> FilterModel {
        self.ctx.store.read(|s| (*s.filter).clone())
    }

    pub fn set_filter_model(&self, model: FilterModel) {
        if self.ctx.store.read(|s| *s.filter == model) {
            return;
        }
        tracing::debug!(items = model.items.len(), "filter model changed");
        self.ctx.store.update(|s| s.filter = Rc::new(model.clone()));
        self.ctx.publish(GridEvent::FilterModelChange(model));
    }

    /// Inserts or replaces the item with the same id. Items without an id get the next free one.
    pub fn upsert_filter_item(&self, item: FilterItem) -> i64 {
        let mut model = self.filter_model();
        let id = item.id.unwrap_or_else(|| {
            model.items.iter().filter_map(|i| i.id).max().map_or(1, |m| m + 1)
        });
        let item = FilterItem { id: Some(id), ..item };
        match model.items.iter_mut().find(|i| i.id == Some(id)) {
            Some(existing) => *existing = item,
            None => model.items.push(item),
        }
        self.set_filter_model(model);
        id
    }

    pub fn delete_filter_item(&self, id: i64) {
        let mut model = self.filter_model();
        model.items.retain(|i| i.id != Some(id));
        self.set_filter_model(model);
    }

    pub fn set_logic_operator(&self, logic: LogicOperator) {
        let model = FilterModel {
            logic_operator: logic,
            ..self.filter_model()
        };
        self.set_filter_model(model);
    }

    pub fn set_quick_filter_values(&self, values: Vec<String>) {
        self.quick_filter.borrow_mut().cancel();
        let model = FilterModel {
            quick_filter_values: values,
            ..self.filter_model()
        };
        self.set_filter_model(model);
    }

    /// Records quick filter input; the values apply once the input settles.
    pub fn set_quick_filter_input(&self, text: impl Into<String>, now: Instant) {
        self.quick_filter.borrow_mut().push(text.into(), now);
    }

    pub fn set_quick_filter_debounce(&self, delay: Duration) {
        self.quick_filter.borrow_mut().set_delay(delay);
    }

    /// Applies settled quick filter input. Returns whether the model changed.
    pub fn tick(&self, now: Instant) -> bool {
        let text = self.quick_filter.borrow_mut().poll(now);
        self.apply_quick_input(text)
    }

    pub fn flush_quick_filter(&self) -> bool {
        let text = self.quick_filter.borrow_mut().flush();
        self.apply_quick_input(text)
    }

    pub fn has_pending_quick_filter(&self) -> bool {
        self.quick_filter.borrow().is_pending()
    }

    fn apply_quick_input(&self, text: Option<String>) -> bool {
        let Some(text) = text else {
            return false;
        };
        let values: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        let before = self.filter_model();
        self.set_quick_filter_values(values);
        before != self.filter_model()
    }

    pub fn filter_result(&self) -> Rc<FilterResult> {
        self.ctx.store.select(&FILTER_RESULT)
    }

    pub fn filtered_row_count(&self) -> usize {
        self.filter_result().passing_leaf_count
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let get = self.clone();
        let set = self.clone();
        let upsert = self.clone();
        let delete = self.clone();
        let quick = self.clone();
        let count = self.clone();
        api.register(
            "filtering",
            ApiVisibility::Public,
            [
                method("getFilterModel", move |_| Ok(serde_json::to_value(get.filter_model())?)),
                method("setFilterModel", move |args| {
                    set.set_filter_model(arg("setFilterModel", args, 0)?);
                    Ok(Value::Null)
                }),
                method("upsertFilterItem", move |args| {
                    Ok(Value::from(upsert.upsert_filter_item(arg("upsertFilterItem", args, 0)?)))
                }),
                method("deleteFilterItem", move |args| {
                    delete.delete_filter_item(arg("deleteFilterItem", args, 0)?);
                    Ok(Value::Null)
                }),
                method("setQuickFilterValues", move |args| {
                    quick.set_quick_filter_values(arg("setQuickFilterValues", args, 0)?);
                    Ok(Value::Null)
                }),
                method("getFilteredRowsCount", move |_| Ok(Value::from(count.filtered_row_count()))),
            ],
        );
    }
}
