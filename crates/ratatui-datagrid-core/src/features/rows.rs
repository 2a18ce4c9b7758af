//! Row storage and the row tree.
//!
//! Rows are stored by id in insertion order. The tree is regenerated through the `hydrateRows`
//! stage whenever rows or grouping change; without grouping it is a flat list under the root,
//! which sits at depth `-1`.

use serde_json::Value;
use std::collections::HashMap;
use std::collections::HashSet;
use std::rc::Rc;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::context::GridContext;
use crate::error::GridError;
use crate::error::Result;
use crate::events::GridEvent;
use crate::features::filtering::FILTER_RESULT;
use crate::features::filtering::FilterResult;
use crate::features::row_pinning::PinnedRowsState;
use crate::features::sorting::SORTED_ROWS;
use crate::options::GridOptions;
use crate::options::Tier;
use crate::pipe::PipeStage;
use crate::selector::MemoizedSelector;
use crate::store::GridState;
use crate::value::CellValue;
use crate::value::GridRowModel;
use crate::value::RowId;
use crate::value::default_row_id;

/// Prefix of the ids minted for the tree root and group rows. Row ids may not start with it.
pub const RESERVED_ID_PREFIX: &str = "auto-generated-";

pub const GRID_ROOT_GROUP_ID: &str = "auto-generated-group-node-root";

pub fn root_id() -> RowId {
    RowId::Str(GRID_ROOT_GROUP_ID.to_string())
}

#[derive(Clone, Debug, PartialEq)]
pub enum RowNodeKind {
    Root,
    Leaf,
    Group { field: String, key: CellValue },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowNode {
    pub id: RowId,
    pub parent: Option<RowId>,
    pub depth: i32,
    pub children: Vec<RowId>,
    pub kind: RowNodeKind,
}

impl RowNode {
    pub fn is_group(&self) -> bool {
        matches!(self.kind, RowNodeKind::Group { .. })
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, RowNodeKind::Root)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowTree {
    root: RowNode,
    nodes: HashMap<RowId, RowNode>,
}

impl Default for RowTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl RowTree {
    pub fn empty() -> Self {
        Self {
            root: RowNode {
                id: root_id(),
                parent: None,
                depth: -1,
                children: Vec::new(),
                kind: RowNodeKind::Root,
            },
            nodes: HashMap::new(),
        }
    }

    /// Every id as a direct leaf child of the root, in order.
    pub fn flat(ids: &[RowId]) -> Self {
        let mut tree = Self::empty();
        let root = tree.root.id.clone();
        for id in ids {
            tree.insert(&root, id.clone(), RowNodeKind::Leaf);
        }
        tree
    }

    /// Adds a node under `parent`. Unknown parents attach to the root.
    pub fn insert(&mut self, parent: &RowId, id: RowId, kind: RowNodeKind) {
        let parent = if self.node(parent).is_some() {
            parent.clone()
        } else {
            self.root.id.clone()
        };
        let Some(parent_node) = self.node_mut(&parent) else {
            return;
        };
        parent_node.children.push(id.clone());
        let node = RowNode {
            parent: Some(parent_node.id.clone()),
            depth: parent_node.depth + 1,
            id: id.clone(),
            children: Vec::new(),
            kind,
        };
        self.nodes.insert(id, node);
    }

    pub fn root(&self) -> &RowNode {
        &self.root
    }

    pub fn node(&self, id: &RowId) -> Option<&RowNode> {
        if *id == self.root.id {
            Some(&self.root)
        } else {
            self.nodes.get(id)
        }
    }

    fn node_mut(&mut self, id: &RowId) -> Option<&mut RowNode> {
        if *id == self.root.id {
            Some(&mut self.root)
        } else {
            self.nodes.get_mut(id)
        }
    }

    pub fn children(&self, id: &RowId) -> &[RowId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Number of nodes below the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_grouped(&self) -> bool {
        self.nodes.values().any(RowNode::is_group)
    }

    pub fn groups(&self) -> impl Iterator<Item = &RowNode> {
        self.nodes.values().filter(|n| n.is_group())
    }

    /// Leaf ids below `id`, in tree order.
    pub fn leaves_under(&self, id: &RowId) -> Vec<RowId> {
        let mut out = Vec::new();
        let mut stack: Vec<&RowId> = self.children(id).iter().rev().collect();
        while let Some(next) = stack.pop() {
            match self.node(next) {
                Some(node) if node.children.is_empty() && !node.is_group() => out.push(next.clone()),
                Some(node) => stack.extend(node.children.iter().rev()),
                None => {}
            }
        }
        out
    }
}

#[derive(Clone, Debug, Default)]
pub struct RowsState {
    pub lookup: HashMap<RowId, GridRowModel>,
    /// Insertion order; reordering rewrites it.
    pub ids: Vec<RowId>,
    pub loading: bool,
    pub tree: RowTree,
    /// Explicit group expansion; groups without an entry follow the default expansion depth.
    pub expansion: HashMap<RowId, bool>,
}

impl RowsState {
    pub fn is_expanded(&self, node: &RowNode, default_depth: i32) -> bool {
        if let Some(expanded) = self.expansion.get(&node.id) {
            return *expanded;
        }
        default_depth == -1 || node.depth < default_depth
    }
}

/// One row as it appears in a derived row list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowEntry {
    pub id: RowId,
    pub depth: i32,
    pub is_group: bool,
}

/// Regenerates the row tree. The initial value is the flat tree over `ids`.
pub const HYDRATE_ROWS: PipeStage<RowTree, GridState> = PipeStage::new("hydrateRows");

type VisibleRowsInputs = (
    Rc<Vec<RowEntry>>,
    Rc<FilterResult>,
    Rc<RowsState>,
    Rc<PinnedRowsState>,
    Rc<GridOptions>,
);

/// Sorted rows with filtered-out rows, collapsed descendants and pinned rows removed. This is
/// the sequence pagination slices.
pub static VISIBLE_ROWS: MemoizedSelector<VisibleRowsInputs, Vec<RowEntry>> = MemoizedSelector::new(
    "rows.visible",
    |store| {
        let sorted = store.select(&SORTED_ROWS);
        let filter = store.select(&FILTER_RESULT);
        store.read(|s| {
            (
                sorted,
                filter,
                s.rows.clone(),
                s.pinned_rows.clone(),
                s.options.clone(),
            )
        })
    },
    |(sorted, filter, rows, pinned, options)| visible_rows(sorted, filter, rows, pinned, options),
);

fn visible_rows(
    sorted: &[RowEntry],
    filter: &FilterResult,
    rows: &RowsState,
    pinned: &PinnedRowsState,
    options: &GridOptions,
) -> Vec<RowEntry> {
    let pinned: HashSet<&RowId> = if options.allows(Tier::Pro) {
        pinned.top.iter().chain(pinned.bottom.iter()).collect()
    } else {
        HashSet::new()
    };
    let mut out = Vec::with_capacity(sorted.len());
    let mut hidden_below: Option<i32> = None;
    for entry in sorted {
        if let Some(depth) = hidden_below {
            if entry.depth > depth {
                continue;
            }
            hidden_below = None;
        }
        if !filter.passes(&entry.id) {
            if entry.is_group {
                hidden_below = Some(entry.depth);
            }
            continue;
        }
        if pinned.contains(&entry.id) {
            continue;
        }
        out.push(entry.clone());
        if entry.is_group {
            let expanded = rows
                .tree
                .node(&entry.id)
                .is_some_and(|node| rows.is_expanded(node, options.default_group_expansion_depth));
            if !expanded {
                hidden_below = Some(entry.depth);
            }
        }
    }
    out
}

/// An incremental row change.
#[derive(Clone, Debug, PartialEq)]
pub enum RowUpdate {
    /// Merges the given fields into an existing row, or inserts a new one.
    Upsert(GridRowModel),
    Delete(RowId),
}

impl RowUpdate {
    /// Reads an update from JSON; `{"_action": "delete"}` marks a deletion.
    pub fn from_json(value: Value, options: &GridOptions) -> Result<Self> {
        let mut value = value;
        let delete = value
            .as_object_mut()
            .and_then(|obj| obj.remove("_action"))
            .is_some_and(|action| action == "delete");
        let row: GridRowModel = serde_json::from_value(value)?;
        if delete {
            let id = resolve_row_id(options, &row).ok_or_else(|| GridError::InvalidArguments {
                method: "updateRows".to_string(),
                reason: "deleted row has no id".to_string(),
            })?;
            Ok(RowUpdate::Delete(id))
        } else {
            Ok(RowUpdate::Upsert(row))
        }
    }
}

pub(crate) fn resolve_row_id(options: &GridOptions, row: &GridRowModel) -> Option<RowId> {
    let id = match &options.get_row_id {
        Some(get) => get(row),
        None => default_row_id(row),
    }?;
    if matches!(&id, RowId::Str(s) if s.starts_with(RESERVED_ID_PREFIX)) {
        let err = GridError::ReservedRowId(id);
        tracing::warn!(%err, "row id rejected");
        return None;
    }
    Some(id)
}

#[derive(Clone)]
pub struct RowsModule {
    ctx: GridContext,
}

impl RowsModule {
    pub fn new(ctx: GridContext) -> Self {
        Self { ctx }
    }

    pub fn state(&self) -> Rc<RowsState> {
        self.ctx.store.read(|s| s.rows.clone())
    }

    /// Replaces every row. Rows without an id are dropped and duplicate ids keep their first
    /// occurrence; both are reported as warnings.
    pub fn set_rows(&self, rows: Vec<GridRowModel>) {
        let options = self.ctx.options();
        let mut lookup = HashMap::with_capacity(rows.len());
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(id) = resolve_row_id(&options, &row) else {
                tracing::warn!("row without an id ignored");
                continue;
            };
            if lookup.contains_key(&id) {
                let err = GridError::DuplicateRowId(id);
                tracing::warn!(%err, "keeping the first row with this id");
                continue;
            }
            ids.push(id.clone());
            lookup.insert(id, row);
        }
        let count = ids.len();
        let previous = self.state();
        let expansion = previous.expansion.clone();
        self.write(RowsState {
            lookup,
            ids,
            loading: previous.loading,
            tree: RowTree::empty(),
            expansion,
        });
        self.hydrate();
        self.ctx.publish(GridEvent::RowsSet { count });
    }

    pub fn update_rows(&self, updates: Vec<RowUpdate>) {
        if updates.is_empty() {
            return;
        }
        let options = self.ctx.options();
        let mut state = (*self.state()).clone();
        let mut touched = Vec::new();
        let mut deleted = HashSet::new();
        for update in updates {
            match update {
                RowUpdate::Upsert(row) => {
                    let Some(id) = resolve_row_id(&options, &row) else {
                        tracing::warn!("row update without an id ignored");
                        continue;
                    };
                    match state.lookup.get_mut(&id) {
                        Some(existing) => existing.extend(row),
                        None => {
                            state.ids.push(id.clone());
                            state.lookup.insert(id.clone(), row);
                        }
                    }
                    deleted.remove(&id);
                    touched.push(id);
                }
                RowUpdate::Delete(id) => {
                    if state.lookup.remove(&id).is_some() {
                        deleted.insert(id.clone());
                        touched.push(id);
                    }
                }
            }
        }
        if !deleted.is_empty() {
            state.ids.retain(|id| !deleted.contains(id));
        }
        self.write(state);
        self.hydrate();
        self.ctx.publish(GridEvent::RowsUpdated { ids: touched });
    }

    pub fn set_loading(&self, loading: bool) {
        if self.state().loading == loading {
            return;
        }
        let mut state = (*self.state()).clone();
        state.loading = loading;
        self.write(state);
    }

    pub fn row(&self, id: &RowId) -> Option<GridRowModel> {
        self.ctx.store.read(|s| s.rows.lookup.get(id).cloned())
    }

    pub fn row_ids(&self) -> Vec<RowId> {
        self.ctx.store.read(|s| s.rows.ids.clone())
    }

    pub fn row_count(&self) -> usize {
        self.ctx.store.read(|s| s.rows.ids.len())
    }

    pub fn row_node(&self, id: &RowId) -> Option<RowNode> {
        self.ctx.store.read(|s| s.rows.tree.node(id).cloned())
    }

    /// Rows on every page after filtering, sorting and expansion.
    pub fn visible_rows(&self) -> Rc<Vec<RowEntry>> {
        self.ctx.store.select(&VISIBLE_ROWS)
    }

    pub fn set_row_children_expansion(&self, id: &RowId, expanded: bool) -> Result<()> {
        let state = self.state();
        let node = state
            .tree
            .node(id)
            .filter(|n| n.is_group())
            .ok_or_else(|| GridError::RowNotFound(id.clone()))?;
        let default_depth = self.ctx.options().default_group_expansion_depth;
        if state.is_expanded(node, default_depth) == expanded {
            return Ok(());
        }
        let mut next = (*state).clone();
        next.expansion.insert(id.clone(), expanded);
        self.write(next);
        self.ctx.publish(GridEvent::RowExpansionChange {
            id: id.clone(),
            expanded,
        });
        Ok(())
    }

    /// Moves a row within the insertion order. Returns its previous index.
    pub(crate) fn move_row(&self, id: &RowId, target: usize) -> Result<usize> {
        let state = self.state();
        let old_index = state
            .ids
            .iter()
            .position(|r| r == id)
            .ok_or_else(|| GridError::RowNotFound(id.clone()))?;
        let target_index = target.min(state.ids.len().saturating_sub(1));
        if old_index == target_index {
            return Ok(old_index);
        }
        let mut next = (*state).clone();
        let moved = next.ids.remove(old_index);
        next.ids.insert(target_index, moved);
        self.write(next);
        self.hydrate();
        self.ctx.publish(GridEvent::RowOrderChange {
            id: id.clone(),
            old_index,
            target_index,
        });
        Ok(old_index)
    }

    /// Rebuilds the row tree through `hydrateRows`.
    pub fn hydrate(&self) {
        let snapshot = self.ctx.store.state();
        let initial = RowTree::flat(&snapshot.rows.ids);
        let tree = self.ctx.pipes.apply(HYDRATE_ROWS, initial, &snapshot);
        tracing::debug!(nodes = tree.len(), grouped = tree.is_grouped(), "row tree hydrated");
        let mut state = (*snapshot.rows).clone();
        state.tree = tree;
        self.write(state);
    }

    fn write(&self, state: RowsState) {
        self.ctx.store.update(|s| s.rows = Rc::new(state));
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let set = self.clone();
        let update = self.clone();
        let get = self.clone();
        let count = self.clone();
        let all = self.clone();
        let loading = self.clone();
        let expand = self.clone();
        api.register(
            "rows",
            ApiVisibility::Public,
            [
                method("setRows", move |args| {
                    set.set_rows(arg("setRows", args, 0)?);
                    Ok(Value::Null)
                }),
                method("updateRows", move |args| {
                    let raw: Vec<Value> = arg("updateRows", args, 0)?;
                    let options = update.ctx.options();
                    let updates = raw
                        .into_iter()
                        .map(|v| RowUpdate::from_json(v, &options))
                        .collect::<Result<Vec<_>>>()?;
                    update.update_rows(updates);
                    Ok(Value::Null)
                }),
                method("getRow", move |args| {
                    let id: RowId = arg("getRow", args, 0)?;
                    Ok(serde_json::to_value(get.row(&id))?)
                }),
                method("getRowsCount", move |_| Ok(Value::from(count.row_count()))),
                method("getAllRowIds", move |_| Ok(serde_json::to_value(all.row_ids())?)),
                method("setLoading", move |args| {
                    loading.set_loading(arg("setLoading", args, 0)?);
                    Ok(Value::Null)
                }),
                method("setRowChildrenExpansion", move |args| {
                    let id: RowId = arg("setRowChildrenExpansion", args, 0)?;
                    expand.set_row_children_expansion(&id, arg("setRowChildrenExpansion", args, 1)?)?;
                    Ok(Value::Null)
                }),
            ],
        );
    }
}
