//! Per-row detail panels (Pro).
//!
//! A panel's height is either fixed by `get_detail_panel_height` or measured: content-sized
//! panels get a [`DetailPanelObserver`] the first time one is requested for an expanded row.
//! The observer reports heights until the row collapses or disappears, at which point it is
//! disposed and its reports are ignored.

use serde_json::Value;
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::context::GridContext;
use crate::context::WeakGridContext;
use crate::error::GridError;
use crate::error::Result;
use crate::events::GridEvent;
use crate::events::GridEventName;
use crate::events::Subscription;
use crate::features::require_tier;
use crate::options::DetailPanelHeight;
use crate::options::Tier;
use crate::store::GridState;
use crate::value::RowId;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetailPanelState {
    /// Expanded rows, in expansion order.
    pub expanded: Vec<RowId>,
    /// Known panel heights of expanded rows; measured panels are absent until reported.
    pub heights: HashMap<RowId, u32>,
}

impl DetailPanelState {
    pub fn is_expanded(&self, id: &RowId) -> bool {
        self.expanded.contains(id)
    }

    /// Height added below the row; zero when collapsed or not yet measured.
    pub fn height_of(&self, id: &RowId) -> u32 {
        if !self.is_expanded(id) {
            return 0;
        }
        self.heights.get(id).copied().unwrap_or(0)
    }
}

fn panel_height(state: &GridState, id: &RowId) -> DetailPanelHeight {
    let get = state.options.get_detail_panel_height.as_ref();
    match (get, state.rows.lookup.get(id)) {
        (Some(get), Some(row)) => get(id, row),
        _ => DetailPanelHeight::Auto,
    }
}

#[derive(Debug)]
struct ObserverSlot {
    id: RowId,
    disposed: Cell<bool>,
}

/// Height reporter for one content-sized detail panel.
#[derive(Clone)]
pub struct DetailPanelObserver {
    slot: Rc<ObserverSlot>,
    ctx: WeakGridContext,
}

impl DetailPanelObserver {
    pub fn row_id(&self) -> &RowId {
        &self.slot.id
    }

    pub fn is_disposed(&self) -> bool {
        self.slot.disposed.get()
    }

    /// Records the panel's content height. Returns `false` once disposed.
    pub fn report_height(&self, height: u32) -> bool {
        if self.is_disposed() {
            return false;
        }
        let Some(ctx) = self.ctx.upgrade() else {
            return false;
        };
        let id = &self.slot.id;
        if ctx.store.read(|s| s.detail_panel.heights.get(id) == Some(&height)) {
            return true;
        }
        ctx.store.update(|s| {
            let mut next = (*s.detail_panel).clone();
            next.heights.insert(id.clone(), height);
            s.detail_panel = Rc::new(next);
        });
        true
    }
}

impl std::fmt::Debug for DetailPanelObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetailPanelObserver")
            .field("id", &self.slot.id)
            .field("disposed", &self.slot.disposed.get())
            .finish()
    }
}

#[derive(Clone)]
pub struct DetailPanelModule {
    ctx: GridContext,
    observers: Rc<RefCell<HashMap<RowId, Rc<ObserverSlot>>>>,
}

impl DetailPanelModule {
    pub fn new(ctx: GridContext) -> Self {
        Self {
            ctx,
            observers: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Collapses panels whose rows were removed.
    pub fn subscribe(&self) -> Vec<Subscription> {
        [GridEventName::RowsSet, GridEventName::RowsUpdated]
            .into_iter()
            .map(|name| {
                let weak = self.ctx.downgrade();
                let observers = self.observers.clone();
                self.ctx.events.subscribe(name, move |_| {
                    let Some(ctx) = weak.upgrade() else {
                        return;
                    };
                    let module = DetailPanelModule {
                        ctx,
                        observers: observers.clone(),
                    };
                    module.prune();
                })
            })
            .collect()
    }

    pub fn expanded_row_ids(&self) -> Vec<RowId> {
        self.ctx.store.read(|s| s.detail_panel.expanded.clone())
    }

    pub fn is_expanded(&self, id: &RowId) -> bool {
        self.ctx.store.read(|s| s.detail_panel.is_expanded(id))
    }

    pub fn panel_height(&self, id: &RowId) -> u32 {
        self.ctx.store.read(|s| s.detail_panel.height_of(id))
    }

    pub fn toggle_detail_panel(&self, id: &RowId) -> Result<()> {
        require_tier(&self.ctx.options(), "detail panels", Tier::Pro)?;
        if self.ctx.store.read(|s| !s.rows.lookup.contains_key(id)) {
            return Err(GridError::RowNotFound(id.clone()));
        }
        let mut ids = self.expanded_row_ids();
        match ids.iter().position(|r| r == id) {
            Some(i) => {
                ids.remove(i);
            }
            None => ids.push(id.clone()),
        }
        self.write(ids);
        Ok(())
    }

    /// Replaces the expanded set. Ids without a row are dropped.
    pub fn set_expanded_row_ids(&self, ids: Vec<RowId>) -> Result<()> {
        require_tier(&self.ctx.options(), "detail panels", Tier::Pro)?;
        let mut unique: Vec<RowId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        let known: Vec<RowId> = self
            .ctx
            .store
            .read(|s| unique.into_iter().filter(|id| s.rows.lookup.contains_key(id)).collect());
        self.write(known);
        Ok(())
    }

    /// The height observer of an expanded, content-sized panel, created on first request.
    pub fn observer(&self, id: &RowId) -> Option<DetailPanelObserver> {
        let measured = self.ctx.store.read(|s| {
            s.detail_panel.is_expanded(id) && panel_height(s, id) == DetailPanelHeight::Auto
        });
        if !measured {
            return None;
        }
        let slot = self
            .observers
            .borrow_mut()
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::trace!(%id, "detail panel observer created");
                Rc::new(ObserverSlot {
                    id: id.clone(),
                    disposed: Cell::new(false),
                })
            })
            .clone();
        Some(DetailPanelObserver {
            slot,
            ctx: self.ctx.downgrade(),
        })
    }

    pub fn active_observers(&self) -> usize {
        self.observers.borrow().len()
    }

    fn prune(&self) {
        let ids = self.expanded_row_ids();
        let kept: Vec<RowId> = self
            .ctx
            .store
            .read(|s| ids.iter().filter(|id| s.rows.lookup.contains_key(*id)).cloned().collect());
        if kept.len() != ids.len() {
            self.write(kept);
        }
    }

    fn write(&self, expanded: Vec<RowId>) {
        let previous = self.ctx.store.read(|s| s.detail_panel.clone());
        if previous.expanded == expanded {
            return;
        }
        {
            let mut observers = self.observers.borrow_mut();
            observers.retain(|id, slot| {
                let keep = expanded.contains(id);
                if !keep {
                    slot.disposed.set(true);
                    tracing::trace!(%id, "detail panel observer disposed");
                }
                keep
            });
        }
        let heights = self.ctx.store.read(|s| {
            expanded
                .iter()
                .filter_map(|id| match panel_height(s, id) {
                    DetailPanelHeight::Fixed(h) => Some((id.clone(), h)),
                    DetailPanelHeight::Auto => previous.heights.get(id).map(|h| (id.clone(), *h)),
                })
                .collect()
        });
        self.ctx.store.update(|s| {
            s.detail_panel = Rc::new(DetailPanelState {
                expanded: expanded.clone(),
                heights,
            })
        });
        self.ctx
            .publish(GridEvent::DetailPanelsExpandedRowIdsChange(expanded));
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let toggle = self.clone();
        let set = self.clone();
        let get = self.clone();
        api.register(
            "detailPanel",
            ApiVisibility::Public,
            [
                method("toggleDetailPanel", move |args| {
                    let id: RowId = arg("toggleDetailPanel", args, 0)?;
                    toggle.toggle_detail_panel(&id)?;
                    Ok(Value::Null)
                }),
                method("setExpandedDetailPanels", move |args| {
                    set.set_expanded_row_ids(arg("setExpandedDetailPanels", args, 0)?)?;
                    Ok(Value::Null)
                }),
                method("getExpandedDetailPanels", move |_| {
                    Ok(serde_json::to_value(get.expanded_row_ids())?)
                }),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::rows::RowUpdate;
    use crate::features::rows::RowsModule;
    use crate::options::GridOptions;
    use crate::value::GridRowModel;
    use crate::value::row;

    fn grid(options: GridOptions) -> (RowsModule, DetailPanelModule, Vec<Subscription>) {
        let ctx = GridContext::new(GridOptions {
            tier: Tier::Pro,
            ..options
        });
        let rows = RowsModule::new(ctx.clone());
        rows.set_rows((1..=3).map(|i| row([("id", i)])).collect());
        let panels = DetailPanelModule::new(ctx);
        let subs = panels.subscribe();
        (rows, panels, subs)
    }

    #[test]
    fn observers_are_lazy_and_disposed_on_collapse() {
        let (_, panels, _subs) = grid(GridOptions::default());
        let id = RowId::Int(1);
        assert!(panels.observer(&id).is_none());
        panels.toggle_detail_panel(&id).unwrap();
        assert_eq!(panels.active_observers(), 0);
        assert_eq!(panels.panel_height(&id), 0);

        let observer = panels.observer(&id).unwrap();
        assert_eq!(panels.active_observers(), 1);
        assert!(observer.report_height(7));
        assert_eq!(panels.panel_height(&id), 7);

        panels.toggle_detail_panel(&id).unwrap();
        assert!(observer.is_disposed());
        assert!(!observer.report_height(9));
        assert_eq!(panels.active_observers(), 0);
        assert_eq!(panels.panel_height(&id), 0);
    }

    #[test]
    fn removed_rows_collapse_their_panels() {
        let (rows, panels, _subs) = grid(GridOptions::default());
        panels.set_expanded_row_ids(vec![RowId::Int(1), RowId::Int(2)]).unwrap();
        let observer = panels.observer(&RowId::Int(2)).unwrap();
        rows.update_rows(vec![RowUpdate::Delete(RowId::Int(2))]);
        assert_eq!(panels.expanded_row_ids(), vec![RowId::Int(1)]);
        assert!(observer.is_disposed());
    }

    #[test]
    fn fixed_heights_need_no_observer() {
        let (_, panels, _subs) = grid(GridOptions {
            get_detail_panel_height: Some(Rc::new(|_: &RowId, _: &GridRowModel| DetailPanelHeight::Fixed(5))),
            ..Default::default()
        });
        let id = RowId::Int(3);
        panels.toggle_detail_panel(&id).unwrap();
        assert_eq!(panels.panel_height(&id), 5);
        assert!(panels.observer(&id).is_none());
    }

    #[test]
    fn community_tier_has_no_detail_panels() {
        let ctx = GridContext::new(GridOptions::default());
        let panels = DetailPanelModule::new(ctx);
        assert!(matches!(
            panels.toggle_detail_panel(&RowId::Int(1)),
            Err(GridError::FeatureUnavailable { .. })
        ));
    }
}
