//! Memoized selectors.
//!
//! A plain selector is any `fn(&GridState) -> T`. A [`MemoizedSelector`] additionally caches its
//! output per [`GridStore`](crate::store::GridStore): the input function gathers shared slices
//! (or the outputs of other memoized selectors), and the combiner only reruns when at least one
//! of those inputs changed identity since the previous call.
//!
//! The cache lives inside the store, so two grids never observe each other's results.

use std::marker::PhantomData;
use std::rc::Rc;

use crate::store::GridStore;

/// Identity comparison for selector inputs.
///
/// Shared values compare by pointer, scalars by value. The cache holds the previous inputs, so a
/// pointer can never be recycled while it is being compared against.
pub trait SelectorInput: Clone + 'static {
    fn same(&self, other: &Self) -> bool;
}

impl<T: ?Sized + 'static> SelectorInput for Rc<T> {
    fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

/// A shared input that also counts as unchanged when a recomputed value equals the old one.
///
/// Pointer equality is checked first, so the value comparison only runs after the upstream
/// selector actually recomputed.
pub struct ByValue<T>(pub Rc<T>);

impl<T> Clone for ByValue<T> {
    fn clone(&self) -> Self {
        ByValue(self.0.clone())
    }
}

impl<T: PartialEq + 'static> SelectorInput for ByValue<T> {
    fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
    }
}

macro_rules! scalar_input {
    ($($t:ty),*) => {
        $(impl SelectorInput for $t {
            fn same(&self, other: &Self) -> bool {
                self == other
            }
        })*
    };
}

scalar_input!(bool, u32, u64, usize, i32, i64);

impl<T: SelectorInput> SelectorInput for Option<T> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        }
    }
}

macro_rules! tuple_input {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: SelectorInput),+> SelectorInput for ($($name,)+) {
            fn same(&self, other: &Self) -> bool {
                $(self.$idx.same(&other.$idx))&&+
            }
        }
    };
}

tuple_input!(A: 0);
tuple_input!(A: 0, B: 1);
tuple_input!(A: 0, B: 1, C: 2);
tuple_input!(A: 0, B: 1, C: 2, D: 3);
tuple_input!(A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_input!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// A selector whose output is cached per store and recomputed only when its inputs change.
///
/// Declare them as statics; `name` keys the cache and must be unique.
pub struct MemoizedSelector<In, V> {
    name: &'static str,
    input: fn(&GridStore) -> In,
    combine: fn(&In) -> V,
    _marker: PhantomData<fn() -> V>,
}

impl<In, V> MemoizedSelector<In, V> {
    pub const fn new(name: &'static str, input: fn(&GridStore) -> In, combine: fn(&In) -> V) -> Self {
        Self {
            name,
            input,
            combine,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn inputs(&self, store: &GridStore) -> In {
        (self.input)(store)
    }

    pub(crate) fn compute(&self, input: &In) -> V {
        (self.combine)(input)
    }
}

pub(crate) struct CacheEntry<In, V> {
    pub(crate) inputs: In,
    pub(crate) output: Rc<V>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GridState;
    use std::cell::Cell;

    thread_local! {
        static CALLS: Cell<usize> = const { Cell::new(0) };
    }

    fn page_input(store: &GridStore) -> (Rc<crate::features::pagination::PaginationModel>,) {
        (store.read(|s| s.pagination.clone()),)
    }

    fn first_index(input: &(Rc<crate::features::pagination::PaginationModel>,)) -> usize {
        CALLS.with(|c| c.set(c.get() + 1));
        input.0.page * input.0.page_size
    }

    static FIRST_INDEX: MemoizedSelector<(Rc<crate::features::pagination::PaginationModel>,), usize> =
        MemoizedSelector::new("test.firstIndex", page_input, first_index);

    #[test]
    fn returns_same_reference_until_an_input_changes() {
        let store = GridStore::new(GridState::default());
        let a = store.select(&FIRST_INDEX);
        let b = store.select(&FIRST_INDEX);
        assert!(Rc::ptr_eq(&a, &b));

        // An unrelated slice changing does not invalidate.
        store.update(|s| s.density = Rc::new(crate::features::density::Density::Compact));
        let c = store.select(&FIRST_INDEX);
        assert!(Rc::ptr_eq(&a, &c));

        store.update(|s| {
            s.pagination = Rc::new(crate::features::pagination::PaginationModel {
                page: 2,
                page_size: 10,
            })
        });
        let d = store.select(&FIRST_INDEX);
        assert!(!Rc::ptr_eq(&a, &d));
        assert_eq!(*d, 20);
    }

    #[test]
    fn caches_are_per_store() {
        CALLS.with(|c| c.set(0));
        let one = GridStore::new(GridState::default());
        let two = GridStore::new(GridState::default());
        let a = one.select(&FIRST_INDEX);
        let b = two.select(&FIRST_INDEX);
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(CALLS.with(Cell::get), 2);
        one.select(&FIRST_INDEX);
        assert_eq!(CALLS.with(Cell::get), 2);
    }

    #[test]
    fn tuple_identity_requires_every_member() {
        let a = Rc::new(1);
        let b = Rc::new(1);
        assert!((a.clone(), 3usize).same(&(a.clone(), 3usize)));
        assert!(!(a.clone(), 3usize).same(&(b, 3usize)));
        assert!(!(a.clone(), 3usize).same(&(a, 4usize)));
    }

    #[test]
    fn by_value_inputs_accept_equal_recomputations() {
        let a = ByValue(Rc::new(vec![1, 2]));
        assert!(a.same(&ByValue(Rc::new(vec![1, 2]))));
        assert!(!a.same(&ByValue(Rc::new(vec![1, 3]))));
    }
}
