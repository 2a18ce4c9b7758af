use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::context::GridContext;
use crate::error::GridError;
use crate::error::Result;
use crate::events::GridEvent;
use crate::features::column_menu::COLUMN_MENU;
use crate::features::column_menu::ColumnMenuAction;
use crate::features::column_menu::ColumnMenuContext;
use crate::features::column_menu::ColumnMenuItem;
use crate::features::require_tier;
use crate::locale::keys;
use crate::options::Tier;
use crate::pipe::PipeProcessorHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinnedSide {
    Left,
    Right,
}

/// Column pinning model. A field is in at most one of the two lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinnedColumns {
    pub left: Vec<String>,
    pub right: Vec<String>,
}

impl PinnedColumns {
    pub fn side_of(&self, field: &str) -> Option<PinnedSide> {
        if self.left.iter().any(|f| f == field) {
            Some(PinnedSide::Left)
        } else if self.right.iter().any(|f| f == field) {
            Some(PinnedSide::Right)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }

    /// Pins `field` to `side`, removing it from the other side first.
    pub fn pin(mut self, field: &str, side: PinnedSide) -> Self {
        self = self.unpin(field);
        match side {
            PinnedSide::Left => self.left.push(field.to_string()),
            PinnedSide::Right => self.right.push(field.to_string()),
        }
        self
    }

    pub fn unpin(mut self, field: &str) -> Self {
        self.left.retain(|f| f != field);
        self.right.retain(|f| f != field);
        self
    }

    /// Drops duplicates; a field listed on both sides stays on the left.
    pub fn normalized(self) -> Self {
        let mut out = PinnedColumns::default();
        for field in self.left {
            if !out.left.contains(&field) {
                out.left.push(field);
            }
        }
        for field in self.right {
            if !out.left.contains(&field) && !out.right.contains(&field) {
                out.right.push(field);
            }
        }
        out
    }
}

#[derive(Clone)]
pub struct PinningModule {
    ctx: GridContext,
}

impl PinningModule {
    pub fn new(ctx: GridContext) -> Self {
        Self { ctx }
    }

    pub fn pinned_columns(&self) -> PinnedColumns {
        self.ctx.store.read(|s| (*s.pinned_columns).clone())
    }

    pub fn is_column_pinned(&self, field: &str) -> Option<PinnedSide> {
        self.ctx.store.read(|s| s.pinned_columns.side_of(field))
    }

    pub fn pin_column(&self, field: &str, side: PinnedSide) -> Result<()> {
        require_tier(&self.ctx.options(), "column pinning", Tier::Pro)?;
        let pinnable = self
            .ctx
            .store
            .read(|s| s.columns.column(field).map(|c| c.pinnable))
            .ok_or_else(|| GridError::ColumnNotFound(field.to_string()))?;
        if !pinnable {
            return Err(GridError::InvalidArguments {
                method: "pinColumn".to_string(),
                reason: format!("column `{field}` cannot be pinned"),
            });
        }
        self.write(self.pinned_columns().pin(field, side));
        Ok(())
    }

    pub fn unpin_column(&self, field: &str) -> Result<()> {
        require_tier(&self.ctx.options(), "column pinning", Tier::Pro)?;
        self.write(self.pinned_columns().unpin(field));
        Ok(())
    }

    pub fn set_pinned_columns(&self, model: PinnedColumns) -> Result<()> {
        require_tier(&self.ctx.options(), "column pinning", Tier::Pro)?;
        self.write(model.normalized());
        Ok(())
    }

    fn write(&self, model: PinnedColumns) {
        if self.ctx.store.read(|s| *s.pinned_columns == model) {
            return;
        }
        self.ctx.store.update(|s| s.pinned_columns = Rc::new(model.clone()));
        self.ctx.publish(GridEvent::PinnedColumnsChange(model));
    }

    pub fn register_pipes(&self) -> Vec<PipeProcessorHandle> {
        vec![self.ctx.pipes.register(COLUMN_MENU, "columnMenu.pinning", pin_items)]
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let pin = self.clone();
        let unpin = self.clone();
        let set = self.clone();
        let get = self.clone();
        let side = self.clone();
        api.register(
            "pinning",
            ApiVisibility::Public,
            [
                method("pinColumn", move |args| {
                    let field: String = arg("pinColumn", args, 0)?;
                    pin.pin_column(&field, arg("pinColumn", args, 1)?)?;
                    Ok(Value::Null)
                }),
                method("unpinColumn", move |args| {
                    let field: String = arg("unpinColumn", args, 0)?;
                    unpin.unpin_column(&field)?;
                    Ok(Value::Null)
                }),
                method("setPinnedColumns", move |args| {
                    set.set_pinned_columns(arg("setPinnedColumns", args, 0)?)?;
                    Ok(Value::Null)
                }),
                method("getPinnedColumns", move |_| Ok(serde_json::to_value(get.pinned_columns())?)),
                method("isColumnPinned", move |args| {
                    let field: String = arg("isColumnPinned", args, 0)?;
                    Ok(serde_json::to_value(side.is_column_pinned(&field))?)
                }),
            ],
        );
    }
}

fn pin_items(mut items: Vec<ColumnMenuItem>, ctx: &ColumnMenuContext) -> Vec<ColumnMenuItem> {
    if !ctx.column.pinnable || !ctx.state.options.allows(Tier::Pro) {
        return items;
    }
    let side = ctx.state.pinned_columns.side_of(&ctx.column.field);
    if side != Some(PinnedSide::Left) {
        items.push(ColumnMenuItem::new(
            "pinLeft",
            ctx.text(keys::PIN_TO_LEFT),
            ColumnMenuAction::Pin(PinnedSide::Left),
        ));
    }
    if side != Some(PinnedSide::Right) {
        items.push(ColumnMenuItem::new(
            "pinRight",
            ctx.text(keys::PIN_TO_RIGHT),
            ColumnMenuAction::Pin(PinnedSide::Right),
        ));
    }
    if side.is_some() {
        items.push(ColumnMenuItem::new("unpin", ctx.text(keys::UNPIN), ColumnMenuAction::Unpin));
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDef;
    use crate::features::column_menu::ColumnMenuModule;
    use crate::features::columns::ColumnsModule;
    use crate::options::GridOptions;
    use proptest::prelude::*;

    fn module(tier: Tier) -> PinningModule {
        let ctx = GridContext::new(GridOptions {
            tier,
            ..Default::default()
        });
        ColumnsModule::new(ctx.clone()).set_columns(
            ["a", "b", "c", "d"].into_iter().map(ColumnDef::new).collect(),
        );
        PinningModule::new(ctx)
    }

    #[test]
    fn community_tier_cannot_pin() {
        let pinning = module(Tier::Community);
        assert!(matches!(
            pinning.pin_column("a", PinnedSide::Left),
            Err(GridError::FeatureUnavailable { .. })
        ));
    }

    #[test]
    fn pinning_to_the_other_side_moves_the_field() {
        let pinning = module(Tier::Pro);
        pinning.pin_column("a", PinnedSide::Left).unwrap();
        pinning.pin_column("a", PinnedSide::Right).unwrap();
        assert_eq!(
            pinning.pinned_columns(),
            PinnedColumns {
                left: vec![],
                right: vec!["a".into()],
            }
        );
        assert!(pinning.pin_column("zz", PinnedSide::Left).is_err());
    }

    #[test]
    fn menu_offers_the_opposite_side_and_unpin() {
        let pinning = module(Tier::Pro);
        let _pipes = pinning.register_pipes();
        pinning.pin_column("b", PinnedSide::Left).unwrap();
        let menu = ColumnMenuModule::new(pinning.ctx.clone());
        let keys: Vec<String> = menu.items("b").unwrap().into_iter().map(|i| i.key).collect();
        assert_eq!(keys, vec!["pinRight", "unpin"]);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Pin(usize, bool),
        Unpin(usize),
        Set(Vec<usize>, Vec<usize>),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..4, any::<bool>()).prop_map(|(i, left)| Op::Pin(i, left)),
            (0usize..4).prop_map(Op::Unpin),
            (
                proptest::collection::vec(0usize..4, 0..4),
                proptest::collection::vec(0usize..4, 0..4)
            )
                .prop_map(|(l, r)| Op::Set(l, r)),
        ]
    }

    proptest! {
        #[test]
        fn a_field_is_never_pinned_on_both_sides(ops in proptest::collection::vec(op(), 0..24)) {
            const FIELDS: [&str; 4] = ["a", "b", "c", "d"];
            let pinning = module(Tier::Pro);
            for op in ops {
                match op {
                    Op::Pin(i, left) => {
                        let side = if left { PinnedSide::Left } else { PinnedSide::Right };
                        pinning.pin_column(FIELDS[i], side).unwrap();
                    }
                    Op::Unpin(i) => pinning.unpin_column(FIELDS[i]).unwrap(),
                    Op::Set(l, r) => pinning
                        .set_pinned_columns(PinnedColumns {
                            left: l.into_iter().map(|i| FIELDS[i].to_string()).collect(),
                            right: r.into_iter().map(|i| FIELDS[i].to_string()).collect(),
                        })
                        .unwrap(),
                }
                let model = pinning.pinned_columns();
                for field in &model.left {
                    prop_assert!(!model.right.contains(field));
                }
            }
        }
    }
}
