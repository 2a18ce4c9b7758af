use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::context::GridContext;
use crate::events::GridEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreferencePanelKind {
    Columns,
    Filters,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreferencePanelState {
    pub open: bool,
    pub kind: Option<PreferencePanelKind>,
}

#[derive(Clone)]
pub struct PreferencesModule {
    ctx: GridContext,
}

impl PreferencesModule {
    pub fn new(ctx: GridContext) -> Self {
        Self { ctx }
    }

    pub fn state(&self) -> PreferencePanelState {
        self.ctx.store.read(|s| (*s.preference_panel).clone())
    }

    /// Opens the panel on `kind`, switching panels if another one is open.
    pub fn show_preferences(&self, kind: PreferencePanelKind) {
        let next = PreferencePanelState {
            open: true,
            kind: Some(kind),
        };
        if self.state() == next {
            return;
        }
        self.ctx.store.update(|s| s.preference_panel = Rc::new(next));
        self.ctx.publish(GridEvent::PreferencePanelOpen(kind));
    }

    /// Closes the panel; the last kind is kept so it can be reopened where it was.
    pub fn hide_preferences(&self) {
        let state = self.state();
        if !state.open {
            return;
        }
        self.ctx.store.update(|s| {
            s.preference_panel = Rc::new(PreferencePanelState {
                open: false,
                kind: state.kind,
            })
        });
        self.ctx.publish(GridEvent::PreferencePanelClose);
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let show = self.clone();
        let hide = self.clone();
        api.register(
            "preferences",
            ApiVisibility::Public,
            [
                method("showPreferences", move |args| {
                    show.show_preferences(arg("showPreferences", args, 0)?);
                    Ok(Value::Null)
                }),
                method("hidePreferences", move |_| {
                    hide.hide_preferences();
                    Ok(Value::Null)
                }),
            ],
        );
    }
}
