use std::any::Any;
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::features::aggregation::AggregationState;
use crate::features::columns::ColumnsState;
use crate::features::density::Density;
use crate::features::detail_panel::DetailPanelState;
use crate::features::editing::EditingState;
use crate::features::filtering::FilterModel;
use crate::features::focus::FocusState;
use crate::features::pagination::PaginationModel;
use crate::features::pinning::PinnedColumns;
use crate::features::preferences::PreferencePanelState;
use crate::features::row_grouping::RowGroupingState;
use crate::features::row_pinning::PinnedRowsState;
use crate::features::rows::RowsState;
use crate::features::selection::SelectionState;
use crate::features::sorting::SortModel;
use crate::options::GridOptions;
use crate::selector::CacheEntry;
use crate::selector::MemoizedSelector;
use crate::selector::SelectorInput;
use crate::virtualization::RowHeightsState;
use crate::virtualization::ViewportState;

/// The root grid state.
///
/// Every slice is shared behind an `Rc` and replaced wholesale on write, so memoized selectors can
/// detect changes by identity. Each slice is written by exactly one feature module.
#[derive(Clone, Default)]
pub struct GridState {
    pub options: Rc<GridOptions>,
    pub columns: Rc<ColumnsState>,
    pub rows: Rc<RowsState>,
    pub sorting: Rc<SortModel>,
    pub filter: Rc<FilterModel>,
    pub pagination: Rc<PaginationModel>,
    pub density: Rc<Density>,
    pub selection: Rc<SelectionState>,
    pub pinned_columns: Rc<PinnedColumns>,
    pub pinned_rows: Rc<PinnedRowsState>,
    pub row_grouping: Rc<RowGroupingState>,
    pub aggregation: Rc<AggregationState>,
    pub editing: Rc<EditingState>,
    pub focus: Rc<FocusState>,
    pub preference_panel: Rc<PreferencePanelState>,
    pub detail_panel: Rc<DetailPanelState>,
    pub row_heights: Rc<RowHeightsState>,
    pub viewport: Rc<ViewportState>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StoreId(u64);

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Counters for selector cache behavior; handy when asserting that a recompute was skipped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelectorStats {
    pub hits: u64,
    pub misses: u64,
}

/// Single-writer state container for one grid instance.
pub struct GridStore {
    id: StoreId,
    state: RefCell<GridState>,
    version: Cell<u64>,
    cache: RefCell<HashMap<&'static str, Box<dyn Any>>>,
    stats: Cell<SelectorStats>,
}

impl GridStore {
    pub fn new(state: GridState) -> Self {
        Self {
            id: StoreId(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed)),
            state: RefCell::new(state),
            version: Cell::new(0),
            cache: RefCell::new(HashMap::new()),
            stats: Cell::new(SelectorStats::default()),
        }
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    /// Incremented on every write.
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// A cheap snapshot (slice handles only).
    pub fn state(&self) -> GridState {
        self.state.borrow().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&GridState) -> R) -> R {
        f(&self.state.borrow())
    }

    pub fn options(&self) -> Rc<GridOptions> {
        self.state.borrow().options.clone()
    }

    /// Replaces slices. Only feature modules write, each to the slice it owns.
    pub(crate) fn update(&self, f: impl FnOnce(&mut GridState)) {
        f(&mut self.state.borrow_mut());
        self.version.set(self.version.get().wrapping_add(1));
    }

    pub fn select<In, V>(&self, selector: &MemoizedSelector<In, V>) -> Rc<V>
    where
        In: SelectorInput,
        V: 'static,
    {
        let inputs = selector.inputs(self);
        let cached = {
            let cache = self.cache.borrow();
            cache
                .get(selector.name())
                .and_then(|entry| entry.downcast_ref::<CacheEntry<In, V>>())
                .filter(|entry| entry.inputs.same(&inputs))
                .map(|entry| entry.output.clone())
        };
        let mut stats = self.stats.get();
        if let Some(output) = cached {
            stats.hits += 1;
            self.stats.set(stats);
            return output;
        }
        stats.misses += 1;
        self.stats.set(stats);

        tracing::trace!(selector = selector.name(), "recomputing selector");
        let output = Rc::new(selector.compute(&inputs));
        self.cache.borrow_mut().insert(
            selector.name(),
            Box::new(CacheEntry {
                inputs,
                output: output.clone(),
            }),
        );
        output
    }

    pub fn selector_stats(&self) -> SelectorStats {
        self.stats.get()
    }
}

impl std::fmt::Debug for GridStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridStore")
            .field("id", &self.id)
            .field("version", &self.version.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_get_distinct_ids_and_versions_advance() {
        let a = GridStore::new(GridState::default());
        let b = GridStore::new(GridState::default());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.version(), 0);
        a.update(|s| s.density = Rc::new(Density::Compact));
        assert_eq!(a.version(), 1);
        assert_eq!(*a.state().density, Density::Compact);
        assert_eq!(*b.state().density, Density::Standard);
    }
}
