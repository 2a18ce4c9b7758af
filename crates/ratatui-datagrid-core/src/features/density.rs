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

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Density {
    Compact,
    #[default]
    Standard,
    Comfortable,
}

impl Density {
    /// Multiplier applied to the base row and header heights.
    pub fn factor(self) -> f32 {
        match self {
            Density::Compact => 0.7,
            Density::Standard => 1.0,
            Density::Comfortable => 1.3,
        }
    }
}

#[derive(Clone)]
pub struct DensityModule {
    ctx: GridContext,
}

impl DensityModule {
    pub fn new(ctx: GridContext) -> Self {
        Self { ctx }
    }

    pub fn density(&self) -> Density {
        self.ctx.store.read(|s| *s.density)
    }

    pub fn set_density(&self, density: Density) {
        if self.density() == density {
            return;
        }
        self.ctx.store.update(|s| s.density = Rc::new(density));
        self.ctx.publish(GridEvent::DensityChange(density));
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let get = self.clone();
        let set = self.clone();
        api.register(
            "density",
            ApiVisibility::Public,
            [
                method("getDensity", move |_| Ok(serde_json::to_value(get.density())?)),
                method("setDensity", move |args| {
                    set.set_density(arg("setDensity", args, 0)?);
                    Ok(Value::Null)
                }),
            ],
        );
    }
}
