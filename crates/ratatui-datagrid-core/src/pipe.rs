//! Pipe processors: ordered, independently registered transformation steps per named stage.
//!
//! Applying a stage folds every registered processor over an initial value, left to right in
//! registration order. Processors do not commute in general (two modules prepending a synthetic
//! column produce different orders depending on who registered first); callers own that order.

use std::any::Any;
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;
use std::rc::Weak;

/// A typed pipeline stage. `V` is the folded value, `C` the read-only context.
pub struct PipeStage<V, C = ()> {
    name: &'static str,
    _marker: PhantomData<fn(V, &C) -> V>,
}

impl<V, C> PipeStage<V, C> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<V, C> Clone for PipeStage<V, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V, C> Copy for PipeStage<V, C> {}

type Processor<V, C> = Rc<dyn Fn(V, &C) -> V>;

struct Registered {
    id: &'static str,
    token: u64,
    processor: Rc<dyn Any>,
}

#[derive(Default)]
pub struct PipeRegistry {
    stages: RefCell<HashMap<&'static str, Vec<Registered>>>,
    next_token: Cell<u64>,
}

impl PipeRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Registers `processor` under `id` for `stage`.
    ///
    /// Registering an `id` that is already present replaces that processor in place, keeping its
    /// position. The returned handle unregisters on drop, and only removes the entry it added.
    #[must_use = "dropping the handle unregisters the processor"]
    pub fn register<V, C>(
        self: &Rc<Self>,
        stage: PipeStage<V, C>,
        id: &'static str,
        processor: impl Fn(V, &C) -> V + 'static,
    ) -> PipeProcessorHandle
    where
        V: 'static,
        C: 'static,
    {
        let token = self.next_token.get() + 1;
        self.next_token.set(token);
        let boxed: Processor<V, C> = Rc::new(processor);
        let entry = Registered {
            id,
            token,
            processor: Rc::new(boxed),
        };

        let mut stages = self.stages.borrow_mut();
        let list = stages.entry(stage.name()).or_default();
        match list.iter_mut().find(|r| r.id == id) {
            Some(existing) => {
                tracing::debug!(stage = stage.name(), id, "replacing pipe processor");
                *existing = entry;
            }
            None => list.push(entry),
        }

        PipeProcessorHandle {
            registry: Rc::downgrade(self),
            stage: stage.name(),
            id,
            token,
            active: Cell::new(true),
        }
    }

    /// Folds every processor registered for `stage` over `initial`.
    pub fn apply<V, C>(&self, stage: PipeStage<V, C>, initial: V, context: &C) -> V
    where
        V: 'static,
        C: 'static,
    {
        let processors: Vec<(&'static str, Rc<dyn Any>)> = self
            .stages
            .borrow()
            .get(stage.name())
            .map(|list| list.iter().map(|r| (r.id, r.processor.clone())).collect())
            .unwrap_or_default();

        let mut value = initial;
        for (id, processor) in processors {
            match processor.downcast_ref::<Processor<V, C>>() {
                Some(f) => value = f(value, context),
                None => {
                    tracing::warn!(stage = stage.name(), id, "pipe processor has a mismatched type")
                }
            }
        }
        value
    }

    pub fn processor_ids(&self, stage: &str) -> Vec<&'static str> {
        self.stages
            .borrow()
            .get(stage)
            .map(|list| list.iter().map(|r| r.id).collect())
            .unwrap_or_default()
    }

    pub fn processor_count(&self, stage: &str) -> usize {
        self.stages.borrow().get(stage).map(Vec::len).unwrap_or(0)
    }

    fn remove(&self, stage: &'static str, id: &'static str, token: u64) -> bool {
        let mut stages = self.stages.borrow_mut();
        let Some(list) = stages.get_mut(stage) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| !(r.id == id && r.token == token));
        let removed = list.len() != before;
        if list.is_empty() {
            stages.remove(stage);
        }
        removed
    }
}

/// Owns one pipe processor registration.
pub struct PipeProcessorHandle {
    registry: Weak<PipeRegistry>,
    stage: &'static str,
    id: &'static str,
    token: u64,
    active: Cell<bool>,
}

impl PipeProcessorHandle {
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Removes the processor. Safe to call repeatedly and after the registry is gone.
    pub fn unregister(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.stage, self.id, self.token);
        }
    }
}

impl Drop for PipeProcessorHandle {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NUMBERS: PipeStage<Vec<i32>> = PipeStage::new("numbers");

    #[test]
    fn folds_in_registration_order() {
        let pipes = PipeRegistry::new();
        let p1 = pipes.register(NUMBERS, "p1", |mut v: Vec<i32>, _| {
            v.push(1);
            v
        });
        let _p2 = pipes.register(NUMBERS, "p2", |v: Vec<i32>, _| {
            v.into_iter().map(|x| x * 10).collect()
        });
        assert_eq!(pipes.apply(NUMBERS, vec![0], &()), vec![0, 10]);

        p1.unregister();
        assert_eq!(pipes.apply(NUMBERS, vec![3], &()), vec![30]);
    }

    #[test]
    fn reregistering_an_id_keeps_its_position() {
        let pipes = PipeRegistry::new();
        let _a = pipes.register(NUMBERS, "a", |mut v: Vec<i32>, _| {
            v.push(1);
            v
        });
        let _b = pipes.register(NUMBERS, "b", |mut v: Vec<i32>, _| {
            v.push(2);
            v
        });
        let _a2 = pipes.register(NUMBERS, "a", |mut v: Vec<i32>, _| {
            v.push(9);
            v
        });
        assert_eq!(pipes.processor_ids("numbers"), vec!["a", "b"]);
        assert_eq!(pipes.apply(NUMBERS, vec![], &()), vec![9, 2]);
    }

    #[test]
    fn stale_handle_does_not_remove_its_replacement() {
        let pipes = PipeRegistry::new();
        let old = pipes.register(NUMBERS, "a", |v: Vec<i32>, _| v);
        let _new = pipes.register(NUMBERS, "a", |mut v: Vec<i32>, _| {
            v.push(5);
            v
        });
        drop(old);
        assert_eq!(pipes.apply(NUMBERS, vec![], &()), vec![5]);
    }

    #[test]
    fn unregister_is_idempotent_and_survives_registry_drop() {
        let pipes = PipeRegistry::new();
        let h = pipes.register(NUMBERS, "a", |v: Vec<i32>, _| v);
        h.unregister();
        h.unregister();
        assert_eq!(pipes.processor_count("numbers"), 0);

        let h = pipes.register(NUMBERS, "b", |v: Vec<i32>, _| v);
        drop(pipes);
        h.unregister();
    }

    proptest! {
        #[test]
        fn register_then_teardown_restores_the_pipeline(
            existing in 0usize..4,
            added in 1usize..6,
            input in proptest::collection::vec(-100i32..100, 0..8),
        ) {
            const IDS: [&str; 10] = ["e0", "e1", "e2", "e3", "n0", "n1", "n2", "n3", "n4", "n5"];
            let pipes = PipeRegistry::new();
            let _kept: Vec<_> = (0..existing)
                .map(|i| pipes.register(NUMBERS, IDS[i], move |mut v: Vec<i32>, _| {
                    v.push(i as i32);
                    v
                }))
                .collect();
            let before_ids = pipes.processor_ids("numbers");
            let before = pipes.apply(NUMBERS, input.clone(), &());

            let handles: Vec<_> = (0..added)
                .map(|i| pipes.register(NUMBERS, IDS[4 + i], |v: Vec<i32>, _| {
                    v.into_iter().rev().collect()
                }))
                .collect();
            prop_assert_eq!(pipes.processor_count("numbers"), existing + added);
            drop(handles);

            prop_assert_eq!(pipes.processor_ids("numbers"), before_ids);
            prop_assert_eq!(pipes.apply(NUMBERS, input, &()), before);
        }
    }
}
