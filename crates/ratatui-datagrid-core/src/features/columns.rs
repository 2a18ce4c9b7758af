//! Column definitions, order and visibility.
//!
//! The user's columns are the initial value of the `hydrateColumns` stage; feature modules then
//! inject their synthetic columns. Hydration starts again from the non-synthetic columns every
//! time, so toggling a flag twice never duplicates a synthetic column.

use serde_json::Value;
use std::collections::HashMap;
use std::collections::HashSet;
use std::rc::Rc;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::column::ColumnDef;
use crate::context::GridContext;
use crate::error::GridError;
use crate::error::Result;
use crate::events::GridEvent;
use crate::features::pinning::PinnedColumns;
use crate::options::GridOptions;
use crate::options::Tier;
use crate::pipe::PipeStage;
use crate::selector::MemoizedSelector;
use crate::store::GridState;

#[derive(Clone, Debug, Default)]
pub struct ColumnsState {
    pub lookup: HashMap<String, ColumnDef>,
    /// Display order. Pinned columns are moved to the edges when rendered.
    pub ordered_fields: Vec<String>,
    /// Absence means visible.
    pub column_visibility_model: HashMap<String, bool>,
}

impl ColumnsState {
    pub fn column(&self, field: &str) -> Option<&ColumnDef> {
        self.lookup.get(field)
    }

    pub fn is_visible(&self, field: &str) -> bool {
        self.column_visibility_model.get(field).copied().unwrap_or(true)
    }

    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.ordered_fields.iter().position(|f| f == field)
    }

    /// Columns in display order, skipping fields that have no definition.
    pub fn ordered(&self) -> impl Iterator<Item = &ColumnDef> {
        self.ordered_fields.iter().filter_map(|f| self.lookup.get(f))
    }
}

/// The value folded through `hydrateColumns`.
#[derive(Clone, Debug, Default)]
pub struct HydratedColumns {
    pub lookup: HashMap<String, ColumnDef>,
    pub ordered_fields: Vec<String>,
}

impl HydratedColumns {
    pub fn from_columns(columns: impl IntoIterator<Item = ColumnDef>) -> Self {
        let mut out = Self::default();
        for column in columns {
            out.ordered_fields.push(column.field.clone());
            out.lookup.insert(column.field.clone(), column);
        }
        out
    }

    pub fn contains(&self, field: &str) -> bool {
        self.lookup.contains_key(field)
    }

    /// Puts `column` first, replacing an existing column with the same field.
    pub fn prepend(mut self, column: ColumnDef) -> Self {
        self.ordered_fields.retain(|f| *f != column.field);
        self.ordered_fields.insert(0, column.field.clone());
        self.lookup.insert(column.field.clone(), column);
        self
    }

    pub fn remove(mut self, field: &str) -> Self {
        if self.lookup.remove(field).is_some() {
            self.ordered_fields.retain(|f| f != field);
        }
        self
    }
}

pub const HYDRATE_COLUMNS: PipeStage<HydratedColumns, GridState> = PipeStage::new("hydrateColumns");

/// Visible columns in render order: left pinned, unpinned, right pinned.
#[derive(Clone, Debug, Default)]
pub struct VisibleColumns {
    pub columns: Vec<ColumnDef>,
    /// Number of leading columns pinned left.
    pub left: usize,
    /// Number of trailing columns pinned right.
    pub right: usize,
}

impl VisibleColumns {
    pub fn fields(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.field.clone()).collect()
    }

    pub fn position(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.field == field)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

pub static VISIBLE_COLUMNS: MemoizedSelector<
    (Rc<ColumnsState>, Rc<PinnedColumns>, Rc<GridOptions>),
    VisibleColumns,
> = MemoizedSelector::new(
    "columns.visible",
    |store| store.read(|s| (s.columns.clone(), s.pinned_columns.clone(), s.options.clone())),
    |(columns, pinned, options)| visible_columns(columns, pinned, options),
);

fn visible_columns(columns: &ColumnsState, pinned: &PinnedColumns, options: &GridOptions) -> VisibleColumns {
    let visible = |f: &String| columns.is_visible(f) && columns.lookup.contains_key(f);
    if !options.allows(Tier::Pro) {
        let columns: Vec<ColumnDef> = columns
            .ordered_fields
            .iter()
            .filter(|f| visible(f))
            .filter_map(|f| columns.lookup.get(f).cloned())
            .collect();
        return VisibleColumns {
            columns,
            left: 0,
            right: 0,
        };
    }
    let left: Vec<&String> = pinned.left.iter().filter(|f| visible(f)).collect();
    let right: Vec<&String> = pinned
        .right
        .iter()
        .filter(|f| visible(f) && !pinned.left.contains(f))
        .collect();
    let pinned_fields: HashSet<&String> = left.iter().chain(right.iter()).copied().collect();
    let middle = columns
        .ordered_fields
        .iter()
        .filter(|f| visible(f) && !pinned_fields.contains(f));
    let out: Vec<ColumnDef> = left
        .iter()
        .copied()
        .chain(middle)
        .chain(right.iter().copied())
        .filter_map(|f| columns.lookup.get(f).cloned())
        .collect();
    VisibleColumns {
        columns: out,
        left: left.len(),
        right: right.len(),
    }
}

#[derive(Clone)]
pub struct ColumnsModule {
    ctx: GridContext,
}

impl ColumnsModule {
    pub fn new(ctx: GridContext) -> Self {
        Self { ctx }
    }

    pub fn state(&self) -> Rc<ColumnsState> {
        self.ctx.store.read(|s| s.columns.clone())
    }

    /// Replaces the user columns. Columns without a field are dropped and duplicate fields keep
    /// their first definition; both are reported as warnings.
    pub fn set_columns(&self, columns: Vec<ColumnDef>) {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(columns.len());
        for (index, column) in columns.into_iter().enumerate() {
            if column.field.is_empty() {
                let err = GridError::MissingColumnField;
                tracing::warn!(%err, index, "column ignored");
                continue;
            }
            if !seen.insert(column.field.clone()) {
                tracing::warn!(field = %column.field, "duplicate column field; keeping the first definition");
                continue;
            }
            kept.push(column);
        }
        let mut state = (*self.state()).clone();
        state.lookup = kept.iter().map(|c| (c.field.clone(), c.clone())).collect();
        state.ordered_fields = kept.into_iter().map(|c| c.field).collect();
        self.write(state);
        self.hydrate();
    }

    /// Re-runs `hydrateColumns` over the non-synthetic columns.
    pub fn hydrate(&self) {
        let snapshot = self.ctx.store.state();
        let initial = HydratedColumns::from_columns(
            snapshot
                .columns
                .ordered()
                .filter(|c| !c.synthetic)
                .cloned(),
        );
        let hydrated = self.ctx.pipes.apply(HYDRATE_COLUMNS, initial, &snapshot);
        // Processors may leave dangling fields behind; only keep what resolves.
        let ordered_fields: Vec<String> = hydrated
            .ordered_fields
            .into_iter()
            .filter(|f| hydrated.lookup.contains_key(f))
            .collect();
        let mut state = (*snapshot.columns).clone();
        state.lookup = hydrated.lookup;
        state.ordered_fields = ordered_fields.clone();
        tracing::debug!(columns = ordered_fields.len(), "columns hydrated");
        self.write(state);
        self.ctx.publish(GridEvent::ColumnsChange {
            fields: ordered_fields,
        });
    }

    pub fn column(&self, field: &str) -> Option<ColumnDef> {
        self.ctx.store.read(|s| s.columns.lookup.get(field).cloned())
    }

    /// Every column, synthetic ones included, in display order.
    pub fn columns(&self) -> Vec<ColumnDef> {
        self.state().ordered().cloned().collect()
    }

    pub fn visible_columns(&self) -> Rc<VisibleColumns> {
        self.ctx.store.select(&VISIBLE_COLUMNS)
    }

    pub fn column_visibility_model(&self) -> HashMap<String, bool> {
        self.state().column_visibility_model.clone()
    }

    pub fn set_column_visibility(&self, field: &str, visible: bool) -> Result<()> {
        let state = self.state();
        let column = state
            .column(field)
            .ok_or_else(|| GridError::ColumnNotFound(field.to_string()))?;
        if !visible && !column.hideable {
            return Err(GridError::InvalidArguments {
                method: "setColumnVisibility".to_string(),
                reason: format!("column `{field}` cannot be hidden"),
            });
        }
        if state.is_visible(field) == visible {
            return Ok(());
        }
        let mut model = state.column_visibility_model.clone();
        model.insert(field.to_string(), visible);
        self.set_column_visibility_model(model);
        Ok(())
    }

    /// Replaces the visibility model. Entries for unknown fields are kept so a model can be
    /// restored before the columns arrive.
    pub fn set_column_visibility_model(&self, model: HashMap<String, bool>) {
        let state = self.state();
        if state.column_visibility_model == model {
            return;
        }
        let mut next = (*state).clone();
        next.column_visibility_model = model.clone();
        self.write(next);
        self.ctx.publish(GridEvent::ColumnVisibilityModelChange(model));
    }

    pub fn column_index(&self, field: &str) -> Option<usize> {
        self.state().index_of(field)
    }

    pub fn set_column_index(&self, field: &str, target: usize) -> Result<()> {
        let state = self.state();
        let old_index = state
            .index_of(field)
            .ok_or_else(|| GridError::ColumnNotFound(field.to_string()))?;
        let target_index = target.min(state.ordered_fields.len().saturating_sub(1));
        if old_index == target_index {
            return Ok(());
        }
        let mut next = (*state).clone();
        let moved = next.ordered_fields.remove(old_index);
        next.ordered_fields.insert(target_index, moved);
        self.write(next);
        self.ctx.publish(GridEvent::ColumnOrderChange {
            field: field.to_string(),
            old_index,
            target_index,
        });
        Ok(())
    }

    /// Reorders the user columns: listed fields first, in the given order, then the rest as they
    /// were. Synthetic columns keep their slots and unknown fields are ignored.
    pub fn set_column_order(&self, fields: &[String]) {
        let state = self.state();
        let is_user = |f: &String| state.column(f).is_some_and(|c| !c.synthetic);
        let mut user: Vec<String> = fields
            .iter()
            .filter(|f| is_user(f))
            .fold(Vec::new(), |mut acc, f| {
                if !acc.contains(f) {
                    acc.push(f.clone());
                }
                acc
            });
        user.extend(
            state
                .ordered_fields
                .iter()
                .filter(|f| is_user(f) && !fields.contains(*f))
                .cloned(),
        );
        let mut user = user.into_iter();
        let ordered: Vec<String> = state
            .ordered_fields
            .iter()
            .map(|f| if is_user(f) { user.next().unwrap_or_else(|| f.clone()) } else { f.clone() })
            .collect();
        if ordered == state.ordered_fields {
            return;
        }
        let mut next = (*state).clone();
        next.ordered_fields = ordered.clone();
        self.write(next);
        self.ctx.publish(GridEvent::ColumnsChange { fields: ordered });
    }

    /// Sets a fixed width, clamped to the column's bounds. A resized column stops flexing.
    pub fn set_column_width(&self, field: &str, width: u32) -> Result<()> {
        let state = self.state();
        let column = state
            .column(field)
            .ok_or_else(|| GridError::ColumnNotFound(field.to_string()))?;
        let mut column = column.clone();
        column.width = Some(width);
        column.flex = None;
        let width = column.base_width();
        let mut next = (*state).clone();
        next.lookup.insert(field.to_string(), column);
        self.write(next);
        self.ctx.publish(GridEvent::ColumnWidthChange {
            field: field.to_string(),
            width,
        });
        Ok(())
    }

    fn write(&self, state: ColumnsState) {
        self.ctx.store.update(|s| s.columns = Rc::new(state));
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let all = self.clone();
        let visible = self.clone();
        let get_model = self.clone();
        let set_one = self.clone();
        let set_model = self.clone();
        let index = self.clone();
        let set_index = self.clone();
        let width = self.clone();
        api.register(
            "columns",
            ApiVisibility::Public,
            [
                method("getAllColumns", move |_| {
                    let fields: Vec<String> = all.columns().into_iter().map(|c| c.field).collect();
                    Ok(serde_json::to_value(fields)?)
                }),
                method("getVisibleColumns", move |_| {
                    Ok(serde_json::to_value(visible.visible_columns().fields())?)
                }),
                method("getColumnVisibilityModel", move |_| {
                    Ok(serde_json::to_value(get_model.column_visibility_model())?)
                }),
                method("setColumnVisibility", move |args| {
                    let field: String = arg("setColumnVisibility", args, 0)?;
                    set_one.set_column_visibility(&field, arg("setColumnVisibility", args, 1)?)?;
                    Ok(Value::Null)
                }),
                method("setColumnVisibilityModel", move |args| {
                    set_model.set_column_visibility_model(arg("setColumnVisibilityModel", args, 0)?);
                    Ok(Value::Null)
                }),
                method("getColumnIndex", move |args| {
                    let field: String = arg("getColumnIndex", args, 0)?;
                    Ok(serde_json::to_value(index.column_index(&field))?)
                }),
                method("setColumnIndex", move |args| {
                    let field: String = arg("setColumnIndex", args, 0)?;
                    set_index.set_column_index(&field, arg("setColumnIndex", args, 1)?)?;
                    Ok(Value::Null)
                }),
                method("setColumnWidth", move |args| {
                    let field: String = arg("setColumnWidth", args, 0)?;
                    width.set_column_width(&field, arg("setColumnWidth", args, 1)?)?;
                    Ok(Value::Null)
                }),
            ],
        );
    }
}
