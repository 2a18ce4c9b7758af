//! Name-addressable API registry.
//!
//! Feature modules contribute method fragments with [`ApiRegistry::register`]. Callers that only
//! know a method by name (key maps, scripting, tests) go through [`ApiRegistry::call`]; typed
//! callers use [`crate::DataGrid`] directly.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::GridError;
use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiVisibility {
    Public,
    Private,
}

pub type ApiMethod = Rc<dyn Fn(&[Value]) -> Result<Value>>;

struct RegisteredMethod {
    owner: &'static str,
    visibility: ApiVisibility,
    method: ApiMethod,
}

#[derive(Default)]
pub struct ApiRegistry {
    methods: RefCell<BTreeMap<&'static str, RegisteredMethod>>,
    initialized: Cell<bool>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `methods` owned by `owner`.
    ///
    /// A name already registered by another module is a programming error: it is reported and
    /// the later registration wins.
    pub fn register(
        &self,
        owner: &'static str,
        visibility: ApiVisibility,
        methods: impl IntoIterator<Item = (&'static str, ApiMethod)>,
    ) {
        let mut registry = self.methods.borrow_mut();
        for (name, method) in methods {
            if let Some(previous) = registry.get(name) {
                if previous.owner != owner {
                    tracing::warn!(
                        method = name,
                        previous = previous.owner,
                        owner,
                        "grid api method registered twice; the later registration wins"
                    );
                }
            }
            registry.insert(
                name,
                RegisteredMethod {
                    owner,
                    visibility,
                    method,
                },
            );
        }
    }

    pub(crate) fn mark_initialized(&self) {
        self.initialized.set(true);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    /// Calls a public method by name.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        self.call_with(name, args, false)
    }

    /// Calls any method, including private ones.
    pub fn call_private(&self, name: &str, args: &[Value]) -> Result<Value> {
        self.call_with(name, args, true)
    }

    fn call_with(&self, name: &str, args: &[Value], allow_private: bool) -> Result<Value> {
        if !self.initialized.get() {
            return Err(GridError::NotInitialized(name.to_string()));
        }
        let method = {
            let registry = self.methods.borrow();
            let Some(entry) = registry.get(name) else {
                return Err(GridError::UnknownMethod(name.to_string()));
            };
            if entry.visibility == ApiVisibility::Private && !allow_private {
                return Err(GridError::UnknownMethod(name.to_string()));
            }
            entry.method.clone()
        };
        method(args)
    }

    pub fn has(&self, name: &str) -> bool {
        self.methods.borrow().contains_key(name)
    }

    pub fn owner_of(&self, name: &str) -> Option<&'static str> {
        self.methods.borrow().get(name).map(|m| m.owner)
    }

    pub fn public_methods(&self) -> Vec<&'static str> {
        self.methods
            .borrow()
            .iter()
            .filter(|(_, m)| m.visibility == ApiVisibility::Public)
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Wraps a typed closure as an [`ApiMethod`]. Arguments are decoded positionally.
pub fn method<F>(name: &'static str, f: F) -> (&'static str, ApiMethod)
where
    F: Fn(&[Value]) -> Result<Value> + 'static,
{
    (name, Rc::new(f))
}

/// Decodes the argument at `index`.
pub fn arg<T: DeserializeOwned>(method: &str, args: &[Value], index: usize) -> Result<T> {
    let value = args.get(index).ok_or_else(|| GridError::InvalidArguments {
        method: method.to_string(),
        reason: format!("missing argument {index}"),
    })?;
    serde_json::from_value(value.clone()).map_err(|e| GridError::InvalidArguments {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

/// Decodes an optional trailing argument.
pub fn opt_arg<T: DeserializeOwned>(method: &str, args: &[Value], index: usize) -> Result<Option<T>> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => arg(method, args, index).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn calls_before_initialization_fail() {
        let api = ApiRegistry::new();
        api.register("test", ApiVisibility::Public, [method("ping", |_| Ok(json!("pong")))]);
        assert!(matches!(api.call("ping", &[]), Err(GridError::NotInitialized(_))));
        api.mark_initialized();
        assert_eq!(api.call("ping", &[]).unwrap(), json!("pong"));
    }

    #[test]
    fn collisions_resolve_to_last_registration() {
        let api = ApiRegistry::new();
        api.register("a", ApiVisibility::Public, [method("get", |_| Ok(json!(1)))]);
        api.register("b", ApiVisibility::Public, [method("get", |_| Ok(json!(2)))]);
        api.mark_initialized();
        assert_eq!(api.call("get", &[]).unwrap(), json!(2));
        assert_eq!(api.owner_of("get"), Some("b"));
    }

    #[test]
    fn private_methods_are_hidden_from_public_calls() {
        let api = ApiRegistry::new();
        api.register("a", ApiVisibility::Private, [method("secret", |_| Ok(Value::Null))]);
        api.mark_initialized();
        assert!(matches!(api.call("secret", &[]), Err(GridError::UnknownMethod(_))));
        assert!(api.call_private("secret", &[]).is_ok());
        assert!(api.public_methods().is_empty());
    }

    #[test]
    fn arg_reports_missing_and_malformed_values() {
        let args = [json!("x")];
        assert!(matches!(
            arg::<usize>("setPage", &args, 0),
            Err(GridError::InvalidArguments { .. })
        ));
        assert!(matches!(
            arg::<usize>("setPage", &args, 1),
            Err(GridError::InvalidArguments { .. })
        ));
        assert_eq!(opt_arg::<usize>("setPage", &args, 3).unwrap(), None);
    }
}
