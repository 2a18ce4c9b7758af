use std::rc::Rc;
use std::rc::Weak;

use crate::events::EventBus;
use crate::events::GridEvent;
use crate::options::GridOptions;
use crate::pipe::PipeRegistry;
use crate::store::GridState;
use crate::store::GridStore;

/// The shared collaborators every feature module is constructed with.
///
/// Cloning is cheap; every clone refers to the same store, bus and pipeline registry.
#[derive(Clone)]
pub struct GridContext {
    pub store: Rc<GridStore>,
    pub events: Rc<EventBus>,
    pub pipes: Rc<PipeRegistry>,
}

impl GridContext {
    pub fn new(options: GridOptions) -> Self {
        let state = GridState {
            density: Rc::new(options.density),
            options: Rc::new(options),
            ..Default::default()
        };
        Self {
            store: Rc::new(GridStore::new(state)),
            events: EventBus::new(),
            pipes: PipeRegistry::new(),
        }
    }

    pub fn options(&self) -> Rc<GridOptions> {
        self.store.options()
    }

    pub fn publish(&self, event: GridEvent) {
        self.events.publish(event);
    }

    /// A non-owning handle for event handlers, which would otherwise keep the bus alive through
    /// the context they capture.
    pub fn downgrade(&self) -> WeakGridContext {
        WeakGridContext {
            store: Rc::downgrade(&self.store),
            events: Rc::downgrade(&self.events),
            pipes: Rc::downgrade(&self.pipes),
        }
    }
}

#[derive(Clone)]
pub struct WeakGridContext {
    store: Weak<GridStore>,
    events: Weak<EventBus>,
    pipes: Weak<PipeRegistry>,
}

impl WeakGridContext {
    pub fn upgrade(&self) -> Option<GridContext> {
        Some(GridContext {
            store: self.store.upgrade()?,
            events: self.events.upgrade()?,
            pipes: self.pipes.upgrade()?,
        })
    }
}

impl std::fmt::Debug for GridContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridContext")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
