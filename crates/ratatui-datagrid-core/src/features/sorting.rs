use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::rc::Rc;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::api::opt_arg;
use crate::column::ColumnDef;
use crate::context::GridContext;
use crate::error::GridError;
use crate::error::Result;
use crate::events::GridEvent;
use crate::features::columns::ColumnsState;
use crate::features::row_grouping::grouping_column_applies;
use crate::features::rows::RowEntry;
use crate::features::rows::RowNode;
use crate::features::rows::RowNodeKind;
use crate::features::rows::RowsState;
use crate::options::Tier;
use crate::selector::MemoizedSelector;
use crate::value::CellValue;
use crate::value::RowId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortItem {
    pub field: String,
    pub sort: SortDirection,
}

impl SortItem {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            sort: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            sort: SortDirection::Desc,
        }
    }
}

/// Sort items in priority order, at most one per field.
pub type SortModel = Vec<SortItem>;

/// Every row of the tree in display order: depth first, siblings sorted by the sort model.
pub static SORTED_ROWS: MemoizedSelector<(Rc<RowsState>, Rc<SortModel>, Rc<ColumnsState>), Vec<RowEntry>> =
    MemoizedSelector::new(
        "sorting.sortedRows",
        |store| store.read(|s| (s.rows.clone(), s.sorting.clone(), s.columns.clone())),
        |(rows, model, columns)| sorted_rows(rows, model, columns),
    );

type Criterion<'a> = (&'a ColumnDef, SortDirection);

fn sorted_rows(rows: &RowsState, model: &SortModel, columns: &ColumnsState) -> Vec<RowEntry> {
    let criteria: Vec<Criterion<'_>> = model
        .iter()
        .filter_map(|item| {
            columns
                .lookup
                .get(&item.field)
                .filter(|c| c.sortable)
                .map(|c| (c, item.sort))
        })
        .collect();

    let tree = &rows.tree;
    let mut out = Vec::with_capacity(tree.len());
    let mut stack: Vec<RowId> = sorted_children(tree.root(), &criteria, rows);
    stack.reverse();
    while let Some(id) = stack.pop() {
        let Some(node) = tree.node(&id) else {
            continue;
        };
        out.push(RowEntry {
            id: node.id.clone(),
            depth: node.depth,
            is_group: node.is_group(),
        });
        if !node.children.is_empty() {
            let mut children = sorted_children(node, &criteria, rows);
            children.reverse();
            stack.extend(children);
        }
    }
    out
}

fn sorted_children(
    node: &RowNode,
    criteria: &[Criterion<'_>],
    rows: &RowsState,
) -> Vec<RowId> {
    if criteria.is_empty() || node.children.len() < 2 {
        return node.children.clone();
    }
    let keyed: Vec<(&RowId, Vec<Option<CellValue>>)> = node
        .children
        .iter()
        .map(|id| (id, sort_keys(id, criteria, rows)))
        .collect();
    let mut order: Vec<usize> = (0..keyed.len()).collect();
    // `sort_by` is stable: ties keep their original relative order.
    order.sort_by(|&a, &b| compare_keys(&keyed[a].1, &keyed[b].1, criteria));
    order.into_iter().map(|i| keyed[i].0.clone()).collect()
}

fn sort_keys(id: &RowId, criteria: &[Criterion<'_>], rows: &RowsState) -> Vec<Option<CellValue>> {
    let node = rows.tree.node(id);
    criteria
        .iter()
        .map(|(column, _)| match node.map(|n| &n.kind) {
            Some(RowNodeKind::Group { field, key })
                if column.field == *field || grouping_column_applies(&column.field, field) =>
            {
                Some(key.clone())
            }
            Some(RowNodeKind::Leaf) if !column.synthetic => {
                rows.lookup.get(id).map(|row| column.value(row))
            }
            _ => None,
        })
        .collect()
}

fn compare_keys(
    a: &[Option<CellValue>],
    b: &[Option<CellValue>],
    criteria: &[Criterion<'_>],
) -> Ordering {
    for ((column, direction), (ka, kb)) in criteria.iter().zip(a.iter().zip(b.iter())) {
        let (Some(ka), Some(kb)) = (ka, kb) else {
            continue;
        };
        let ord = column.compare(ka, kb);
        let ord = match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[derive(Clone)]
pub struct SortingModule {
    ctx: GridContext,
}

impl SortingModule {
    pub fn new(ctx: GridContext) -> Self {
        Self { ctx }
    }

    pub fn sort_model(&self) -> SortModel {
        self.ctx.store.read(|s| (*s.sorting).clone())
    }

    /// Replaces the sort model. Later items for an already-present field are dropped; multi-field
    /// models are truncated when multi-sorting is disabled or unavailable.
    pub fn set_sort_model(&self, model: SortModel) {
        let model = self.normalize(model);
        if self.ctx.store.read(|s| *s.sorting == model) {
            return;
        }
        tracing::debug!(items = model.len(), "sort model changed");
        self.ctx
            .store
            .update(|s| s.sorting = Rc::new(model.clone()));
        self.ctx.publish(GridEvent::SortModelChange(model));
    }

    fn normalize(&self, model: SortModel) -> SortModel {
        let options = self.ctx.options();
        let mut seen = HashSet::new();
        let mut model: SortModel = model
            .into_iter()
            .filter(|item| seen.insert(item.field.clone()))
            .collect();
        if options.disable_multiple_column_sorting || !options.allows(Tier::Pro) {
            model.truncate(1);
        }
        model
    }

    /// Sorts by `field`. With `multi`, the field is added to (or updated within, or removed from)
    /// the existing model instead of replacing it.
    pub fn sort_column(&self, field: &str, direction: Option<SortDirection>, multi: bool) -> Result<()> {
        let column = self
            .ctx
            .store
            .read(|s| s.columns.lookup.get(field).cloned())
            .ok_or_else(|| GridError::ColumnNotFound(field.to_string()))?;
        if !column.sortable {
            return Ok(());
        }
        let current = self.sort_model();
        let model = if multi {
            let mut model: SortModel = current.into_iter().filter(|i| i.field != field).collect();
            if let Some(sort) = direction {
                match self.sort_model().iter().position(|i| i.field == field) {
                    Some(pos) => model.insert(pos.min(model.len()), SortItem {
                        field: field.to_string(),
                        sort,
                    }),
                    None => model.push(SortItem {
                        field: field.to_string(),
                        sort,
                    }),
                }
            }
            model
        } else {
            direction
                .map(|sort| SortItem {
                    field: field.to_string(),
                    sort,
                })
                .into_iter()
                .collect()
        };
        self.set_sort_model(model);
        Ok(())
    }

    /// The direction that follows the current one for `field` in the configured sorting order.
    pub fn next_sort_direction(&self, field: &str) -> Option<SortDirection> {
        let order = self.ctx.options().sorting_order.clone();
        if order.is_empty() {
            return None;
        }
        let current = self
            .sort_model()
            .into_iter()
            .find(|i| i.field == field)
            .map(|i| i.sort);
        let next = order
            .iter()
            .position(|d| *d == current)
            .map_or(0, |i| (i + 1) % order.len());
        order[next]
    }

    pub fn toggle_column_sort(&self, field: &str, multi: bool) -> Result<()> {
        self.sort_column(field, self.next_sort_direction(field), multi)
    }

    /// Leaf ids in sorted order, ignoring filters and expansion.
    pub fn sorted_row_ids(&self) -> Vec<RowId> {
        self.ctx
            .store
            .select(&SORTED_ROWS)
            .iter()
            .filter(|e| !e.is_group)
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let get = self.clone();
        let set = self.clone();
        let sort = self.clone();
        let ids = self.clone();
        api.register(
            "sorting",
            ApiVisibility::Public,
            [
                method("getSortModel", move |_| Ok(serde_json::to_value(get.sort_model())?)),
                method("setSortModel", move |args| {
                    set.set_sort_model(arg("setSortModel", args, 0)?);
                    Ok(Value::Null)
                }),
                method("sortColumn", move |args| {
                    let field: String = arg("sortColumn", args, 0)?;
                    let direction: Option<SortDirection> = opt_arg("sortColumn", args, 1)?;
                    let multi = opt_arg("sortColumn", args, 2)?.unwrap_or(false);
                    sort.sort_column(&field, direction, multi)?;
                    Ok(Value::Null)
                }),
                method("getSortedRowIds", move |_| Ok(serde_json::to_value(ids.sorted_row_ids())?)),
            ],
        );
    }
}
