use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::context::GridContext;
use crate::error::Result;
use crate::features::require_tier;
use crate::options::Tier;
use crate::value::RowId;

/// Rows rendered above and below the scrollable body.
///
/// Ids refer to rows in the row lookup; pinned rows are taken out of the body and pagination.
/// Ids without a row are ignored when rendering.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinnedRowsState {
    pub top: Vec<RowId>,
    pub bottom: Vec<RowId>,
}

impl PinnedRowsState {
    pub fn is_pinned(&self, id: &RowId) -> bool {
        self.top.contains(id) || self.bottom.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_empty() && self.bottom.is_empty()
    }

    fn normalized(self) -> Self {
        let mut out = PinnedRowsState::default();
        for id in self.top {
            if !out.top.contains(&id) {
                out.top.push(id);
            }
        }
        for id in self.bottom {
            if !out.is_pinned(&id) {
                out.bottom.push(id);
            }
        }
        out
    }
}

#[derive(Clone)]
pub struct RowPinningModule {
    ctx: GridContext,
}

impl RowPinningModule {
    pub fn new(ctx: GridContext) -> Self {
        Self { ctx }
    }

    pub fn pinned_rows(&self) -> PinnedRowsState {
        self.ctx.store.read(|s| (*s.pinned_rows).clone())
    }

    pub fn set_pinned_rows(&self, pinned: PinnedRowsState) -> Result<()> {
        require_tier(&self.ctx.options(), "row pinning", Tier::Pro)?;
        let pinned = pinned.normalized();
        if self.ctx.store.read(|s| *s.pinned_rows == pinned) {
            return Ok(());
        }
        tracing::debug!(top = pinned.top.len(), bottom = pinned.bottom.len(), "pinned rows changed");
        self.ctx.store.update(|s| s.pinned_rows = Rc::new(pinned));
        Ok(())
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let get = self.clone();
        let set = self.clone();
        api.register(
            "rowPinning",
            ApiVisibility::Public,
            [
                method("getPinnedRows", move |_| Ok(serde_json::to_value(get.pinned_rows())?)),
                method("setPinnedRows", move |args| {
                    set.set_pinned_rows(arg("setPinnedRows", args, 0)?)?;
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
    use crate::features::rows::RowsModule;
    use crate::options::GridOptions;
    use crate::value::row;

    #[test]
    fn pinned_rows_leave_the_body_on_pro_only() {
        for (tier, expected) in [(Tier::Pro, 3), (Tier::Community, 4)] {
            let ctx = GridContext::new(GridOptions {
                tier,
                ..Default::default()
            });
            let rows = RowsModule::new(ctx.clone());
            rows.set_rows((1..=4).map(|i| row([("id", i)])).collect());
            ctx.store.update(|s| {
                s.pinned_rows = Rc::new(PinnedRowsState {
                    top: vec![RowId::Int(2)],
                    bottom: vec![],
                })
            });
            assert_eq!(rows.visible_rows().len(), expected);
        }
    }

    #[test]
    fn a_row_is_pinned_once() {
        let ctx = GridContext::new(GridOptions {
            tier: Tier::Pro,
            ..Default::default()
        });
        let pinning = RowPinningModule::new(ctx);
        pinning
            .set_pinned_rows(PinnedRowsState {
                top: vec![RowId::Int(1), RowId::Int(1)],
                bottom: vec![RowId::Int(1), RowId::Int(2)],
            })
            .unwrap();
        assert_eq!(
            pinning.pinned_rows(),
            PinnedRowsState {
                top: vec![RowId::Int(1)],
                bottom: vec![RowId::Int(2)],
            }
        );
    }

    #[test]
    fn community_tier_rejects_row_pinning() {
        let pinning = RowPinningModule::new(GridContext::new(GridOptions::default()));
        assert!(matches!(
            pinning.set_pinned_rows(PinnedRowsState::default()),
            Err(GridError::FeatureUnavailable { .. })
        ));
    }
}
