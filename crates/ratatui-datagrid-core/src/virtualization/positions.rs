use std::cell::RefCell;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use virtualizer::Align;
use virtualizer::VirtualItem;
use virtualizer::Virtualizer;
use virtualizer::VirtualizerOptions;

#[derive(Clone, Debug, PartialEq, Eq)]
enum ItemSizes {
    Uniform { size: u32, count: usize },
    Variable(Arc<Vec<u32>>),
}

/// Item sizes along one axis, laid out by a [`Virtualizer`].
///
/// The virtualizer owns offset lookup and overscanned ranges. It is used as a scratch cursor:
/// every query sets the viewport and scroll offset it needs before reading, so queries never
/// depend on each other.
pub struct AxisPositions {
    sizes: ItemSizes,
    total: u64,
    virtualizer: RefCell<Virtualizer>,
}

impl Default for AxisPositions {
    fn default() -> Self {
        AxisPositions::uniform(1, 0)
    }
}

impl fmt::Debug for AxisPositions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxisPositions")
            .field("sizes", &self.sizes)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

impl AxisPositions {
    pub fn uniform(size: u32, count: usize) -> Self {
        let size = size.max(1);
        let virtualizer = Virtualizer::new(VirtualizerOptions::new(count, move |_| size));
        Self::from_virtualizer(ItemSizes::Uniform { size, count }, virtualizer)
    }

    pub fn from_sizes(sizes: impl IntoIterator<Item = u32>) -> Self {
        Self::measured(sizes, std::iter::empty())
    }

    /// Estimated sizes, corrected by the measurements reported for content-sized items.
    pub fn measured(
        estimates: impl IntoIterator<Item = u32>,
        measurements: impl IntoIterator<Item = (usize, u32)>,
    ) -> Self {
        let mut sizes: Vec<u32> = estimates.into_iter().map(|s| s.max(1)).collect();
        let estimates = Arc::new(sizes.clone());
        let mut virtualizer = Virtualizer::new(VirtualizerOptions::new(sizes.len(), move |i| {
            estimates.get(i).copied().unwrap_or(1)
        }));
        for (index, size) in measurements {
            let Some(slot) = sizes.get_mut(index) else {
                continue;
            };
            *slot = size.max(1);
            virtualizer.measure(index, *slot);
        }
        Self::from_virtualizer(ItemSizes::Variable(Arc::new(sizes)), virtualizer)
    }

    fn from_virtualizer(sizes: ItemSizes, virtualizer: Virtualizer) -> Self {
        let total = virtualizer.total_size();
        Self {
            sizes,
            total,
            virtualizer: RefCell::new(virtualizer),
        }
    }

    pub fn len(&self) -> usize {
        match &self.sizes {
            ItemSizes::Uniform { count, .. } => *count,
            ItemSizes::Variable(sizes) => sizes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self.sizes, ItemSizes::Uniform { .. })
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn size_of(&self, index: usize) -> u32 {
        if index >= self.len() {
            return 0;
        }
        match &self.sizes {
            ItemSizes::Uniform { size, .. } => *size,
            ItemSizes::Variable(sizes) => sizes[index],
        }
    }

    /// Start offset of `index`; `len()` and beyond yield the total size.
    pub fn offset_of(&self, index: usize) -> u64 {
        if index >= self.len() {
            return self.total;
        }
        self.with_viewport(0, 1, 0, |v| {
            v.scroll_to_index(index, Align::Start);
            v.scroll_offset()
        })
    }

    /// The item covering `offset`. Offsets past the end resolve to the last item.
    pub fn index_at(&self, offset: u64) -> Option<usize> {
        let last = self.len().checked_sub(1)?;
        if offset >= self.total {
            return Some(last);
        }
        let index = self.virtualizer.borrow().index_at_offset(offset).unwrap_or(0);
        Some(index.min(last))
    }

    /// Items intersecting `[scroll, scroll + viewport)`, widened by `overscan` on both sides.
    pub fn items(&self, scroll: u64, viewport: u32, overscan: usize) -> Vec<VirtualItem> {
        if self.is_empty() || viewport == 0 {
            return Vec::new();
        }
        self.with_viewport(scroll, viewport, overscan, |v| {
            let mut items = Vec::new();
            v.collect_virtual_items(&mut items);
            items
        })
    }

    pub fn range(&self, scroll: u64, viewport: u32, overscan: usize) -> Range<usize> {
        let items = self.items(scroll, viewport, overscan);
        match (items.first(), items.last()) {
            (Some(first), Some(last)) => first.index..last.index + 1,
            _ => 0..0,
        }
    }

    /// The scroll offset that brings `index` fully into a `viewport` currently at `scroll`,
    /// moving as little as possible.
    pub fn scroll_into_view(&self, index: usize, scroll: u64, viewport: u32) -> u64 {
        if index >= self.len() || viewport == 0 {
            return scroll;
        }
        self.with_viewport(scroll, viewport, 0, |v| {
            v.scroll_to_index(index, Align::Auto);
            v.scroll_offset()
        })
    }

    fn with_viewport<R>(
        &self,
        scroll: u64,
        viewport: u32,
        overscan: usize,
        read: impl FnOnce(&mut Virtualizer) -> R,
    ) -> R {
        let mut v = self.virtualizer.borrow_mut();
        v.set_overscan(overscan);
        v.set_viewport_size(viewport);
        v.set_scroll_offset(scroll);
        read(&mut v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_window_covers_viewport_plus_overscan() {
        let p = AxisPositions::uniform(30, 1_000);
        assert_eq!(p.range(0, 300, 0), 0..10);
        assert_eq!(p.range(0, 300, 3), 0..13);
        assert_eq!(p.range(3_000, 300, 2), 98..112);
        assert_eq!(p.total(), 30_000);
        assert_eq!(p.offset_of(7), 210);
    }

    #[test]
    fn variable_sizes_resolve_offsets_and_indexes() {
        let p = AxisPositions::from_sizes([10, 20, 30, 40]);
        assert_eq!(p.total(), 100);
        assert_eq!(p.offset_of(2), 30);
        assert_eq!(p.offset_of(4), 100);
        assert_eq!(p.size_of(3), 40);
        assert_eq!(p.index_at(0), Some(0));
        assert_eq!(p.index_at(29), Some(1));
        assert_eq!(p.index_at(30), Some(2));
        assert_eq!(p.index_at(10_000), Some(3));
        assert_eq!(p.range(25, 10, 0), 1..3);
    }

    #[test]
    fn items_carry_their_offsets() {
        let p = AxisPositions::from_sizes([10, 20, 30, 40]);
        let items: Vec<(usize, u64, u32)> = p
            .items(25, 10, 0)
            .iter()
            .map(|i| (i.index, i.start, i.size))
            .collect();
        assert_eq!(items, vec![(1, 10, 20), (2, 30, 30)]);
    }

    #[test]
    fn measurements_replace_estimates() {
        let p = AxisPositions::measured([5, 5, 5], [(1, 12)]);
        assert_eq!(p.total(), 22);
        assert_eq!(p.size_of(1), 12);
        assert_eq!(p.offset_of(2), 17);
    }

    #[test]
    fn scrolling_into_view_moves_the_least() {
        let p = AxisPositions::uniform(1, 100);
        assert_eq!(p.scroll_into_view(99, 0, 4), 96);
        assert_eq!(p.scroll_into_view(50, 96, 4), 50);
        assert_eq!(p.scroll_into_view(97, 96, 4), 96);
    }

    #[test]
    fn variable_and_uniform_agree_for_equal_sizes() {
        let u = AxisPositions::uniform(7, 50);
        let v = AxisPositions::from_sizes(std::iter::repeat_n(7, 50));
        for offset in [0u64, 6, 7, 100, 349, 500] {
            assert_eq!(u.index_at(offset), v.index_at(offset));
        }
        assert_eq!(u.range(40, 30, 1), v.range(40, 30, 1));
    }

    #[test]
    fn empty_axis_has_empty_window() {
        let p = AxisPositions::from_sizes(Vec::<u32>::new());
        assert!(p.is_empty());
        assert_eq!(p.index_at(0), None);
        assert_eq!(p.range(0, 100, 5), 0..0);
        assert_eq!(p.total(), 0);
    }
}
