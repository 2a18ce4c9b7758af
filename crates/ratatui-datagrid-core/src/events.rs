//! Publish/subscribe bus for grid events.
//!
//! Handlers run synchronously in subscription order. A handler that panics is isolated: the
//! failure is logged and the remaining handlers still run.

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::rc::Weak;

use crate::features::density::Density;
use crate::features::editing::CellEditStopReason;
use crate::features::filtering::FilterModel;
use crate::features::pagination::PaginationModel;
use crate::features::pinning::PinnedColumns;
use crate::features::preferences::PreferencePanelKind;
use crate::features::sorting::SortModel;
use crate::value::RowId;
use crate::virtualization::RenderContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridEventName {
    RowsSet,
    RowsUpdated,
    ColumnsChange,
    ColumnVisibilityModelChange,
    ColumnOrderChange,
    ColumnWidthChange,
    SortModelChange,
    FilterModelChange,
    PaginationModelChange,
    DensityChange,
    PinnedColumnsChange,
    RowSelectionChange,
    RowGroupingModelChange,
    AggregationModelChange,
    RowExpansionChange,
    RowOrderChange,
    DetailPanelsExpandedRowIdsChange,
    CellEditStart,
    CellEditStop,
    ProcessRowUpdateError,
    CellFocusChange,
    PreferencePanelOpen,
    PreferencePanelClose,
    ScrollPositionChange,
    RenderedRowsIntervalChange,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GridEvent {
    RowsSet { count: usize },
    RowsUpdated { ids: Vec<RowId> },
    ColumnsChange { fields: Vec<String> },
    ColumnVisibilityModelChange(HashMap<String, bool>),
    ColumnOrderChange { field: String, old_index: usize, target_index: usize },
    ColumnWidthChange { field: String, width: u32 },
    SortModelChange(SortModel),
    FilterModelChange(FilterModel),
    PaginationModelChange(PaginationModel),
    DensityChange(Density),
    PinnedColumnsChange(PinnedColumns),
    RowSelectionChange(Vec<RowId>),
    RowGroupingModelChange(Vec<String>),
    AggregationModelChange(HashMap<String, String>),
    RowExpansionChange { id: RowId, expanded: bool },
    RowOrderChange { id: RowId, old_index: usize, target_index: usize },
    DetailPanelsExpandedRowIdsChange(Vec<RowId>),
    CellEditStart { id: RowId, field: String },
    CellEditStop { id: RowId, field: String, reason: CellEditStopReason },
    ProcessRowUpdateError { id: RowId, message: String },
    CellFocusChange { id: RowId, field: String },
    PreferencePanelOpen(PreferencePanelKind),
    PreferencePanelClose,
    ScrollPositionChange { left: u64, top: u64 },
    RenderedRowsIntervalChange(RenderContext),
}

impl GridEvent {
    pub fn name(&self) -> GridEventName {
        match self {
            GridEvent::RowsSet { .. } => GridEventName::RowsSet,
            GridEvent::RowsUpdated { .. } => GridEventName::RowsUpdated,
            GridEvent::ColumnsChange { .. } => GridEventName::ColumnsChange,
            GridEvent::ColumnVisibilityModelChange(_) => GridEventName::ColumnVisibilityModelChange,
            GridEvent::ColumnOrderChange { .. } => GridEventName::ColumnOrderChange,
            GridEvent::ColumnWidthChange { .. } => GridEventName::ColumnWidthChange,
            GridEvent::SortModelChange(_) => GridEventName::SortModelChange,
            GridEvent::FilterModelChange(_) => GridEventName::FilterModelChange,
            GridEvent::PaginationModelChange(_) => GridEventName::PaginationModelChange,
            GridEvent::DensityChange(_) => GridEventName::DensityChange,
            GridEvent::PinnedColumnsChange(_) => GridEventName::PinnedColumnsChange,
            GridEvent::RowSelectionChange(_) => GridEventName::RowSelectionChange,
            GridEvent::RowGroupingModelChange(_) => GridEventName::RowGroupingModelChange,
            GridEvent::AggregationModelChange(_) => GridEventName::AggregationModelChange,
            GridEvent::RowExpansionChange { .. } => GridEventName::RowExpansionChange,
            GridEvent::RowOrderChange { .. } => GridEventName::RowOrderChange,
            GridEvent::DetailPanelsExpandedRowIdsChange(_) => {
                GridEventName::DetailPanelsExpandedRowIdsChange
            }
            GridEvent::CellEditStart { .. } => GridEventName::CellEditStart,
            GridEvent::CellEditStop { .. } => GridEventName::CellEditStop,
            GridEvent::ProcessRowUpdateError { .. } => GridEventName::ProcessRowUpdateError,
            GridEvent::CellFocusChange { .. } => GridEventName::CellFocusChange,
            GridEvent::PreferencePanelOpen(_) => GridEventName::PreferencePanelOpen,
            GridEvent::PreferencePanelClose => GridEventName::PreferencePanelClose,
            GridEvent::ScrollPositionChange { .. } => GridEventName::ScrollPositionChange,
            GridEvent::RenderedRowsIntervalChange(_) => GridEventName::RenderedRowsIntervalChange,
        }
    }
}

type Handler = Rc<dyn Fn(&GridEvent)>;

#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<HashMap<GridEventName, Vec<(u64, Handler)>>>,
    next_id: Cell<u64>,
}

impl EventBus {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    #[must_use = "dropping the subscription unsubscribes the handler"]
    pub fn subscribe(
        self: &Rc<Self>,
        name: GridEventName,
        handler: impl Fn(&GridEvent) + 'static,
    ) -> Subscription {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.listeners
            .borrow_mut()
            .entry(name)
            .or_default()
            .push((id, Rc::new(handler)));
        Subscription {
            bus: Rc::downgrade(self),
            name,
            id,
            active: Cell::new(true),
        }
    }

    /// Invokes the handlers subscribed when publishing started. Subscribing or unsubscribing from
    /// inside a handler takes effect for the next publish.
    pub fn publish(&self, event: GridEvent) {
        let name = event.name();
        let handlers: Vec<Handler> = self
            .listeners
            .borrow()
            .get(&name)
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        if handlers.is_empty() {
            return;
        }
        tracing::trace!(event = ?name, listeners = handlers.len(), "publishing grid event");
        for handler in handlers {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
            if outcome.is_err() {
                tracing::error!(event = ?name, "grid event handler panicked; continuing");
            }
        }
    }

    pub fn listener_count(&self, name: GridEventName) -> usize {
        self.listeners.borrow().get(&name).map(Vec::len).unwrap_or(0)
    }

    fn remove(&self, name: GridEventName, id: u64) {
        let mut listeners = self.listeners.borrow_mut();
        if let Some(list) = listeners.get_mut(&name) {
            list.retain(|(hid, _)| *hid != id);
            if list.is_empty() {
                listeners.remove(&name);
            }
        }
    }
}

/// Handle for one event subscription; unsubscribes on drop.
pub struct Subscription {
    bus: Weak<EventBus>,
    name: GridEventName,
    id: u64,
    active: Cell<bool>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.name, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = log.clone();
        let _a = bus.subscribe(GridEventName::DensityChange, move |_| l1.borrow_mut().push("a"));
        let l2 = log.clone();
        let _b = bus.subscribe(GridEventName::DensityChange, move |_| l2.borrow_mut().push("b"));
        bus.publish(GridEvent::DensityChange(Density::Compact));
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn panicking_handler_does_not_stop_the_rest() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let _bad = bus.subscribe(GridEventName::PreferencePanelClose, |_| panic!("boom"));
        let h = hits.clone();
        let _good = bus.subscribe(GridEventName::PreferencePanelClose, move |_| h.set(h.get() + 1));
        bus.publish(GridEvent::PreferencePanelClose);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn unsubscribe_is_exactly_once() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let sub = bus.subscribe(GridEventName::PreferencePanelClose, move |_| h.set(h.get() + 1));
        let _other = bus.subscribe(GridEventName::PreferencePanelClose, |_| {});
        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);
        assert_eq!(bus.listener_count(GridEventName::PreferencePanelClose), 1);
        bus.publish(GridEvent::PreferencePanelClose);
        assert_eq!(hits.get(), 0);
    }
}
