//! Render-window computation.
//!
//! The window is a pure function of the page rows, pinned rows, row heights, column layout and
//! viewport. [`VirtualizationModule`] owns the viewport and measured-height slices, batches scroll
//! requests to one per frame, and remembers the last window so callers can skip no-op repaints.

mod positions;
mod window;

pub use positions::AxisPositions;
pub use window::COLUMN_POSITIONS;
pub use window::ColumnLayout;
pub use window::OverlayKind;
pub use window::ROW_POSITIONS;
pub use window::ROW_SIZES;
pub use window::RowSizes;
pub use window::RenderWindow;
pub use window::RenderWindowEngine;
pub use window::RenderedColumn;
pub use window::RenderedRow;

use serde::Deserialize;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::context::GridContext;
use crate::events::GridEvent;
use crate::events::GridEventName;
use crate::events::Subscription;
use crate::timing::FrameThrottle;
use crate::value::RowId;

/// The materialized index window. Row and column ranges are half-open (`last_*` is exclusive);
/// column indices address the full visible column list, pinned columns included.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderContext {
    pub first_row_index: usize,
    pub last_row_index: usize,
    pub first_column_index: usize,
    pub last_column_index: usize,
}

impl RenderContext {
    pub fn row_count(&self) -> usize {
        self.last_row_index.saturating_sub(self.first_row_index)
    }

    pub fn column_count(&self) -> usize {
        self.last_column_index.saturating_sub(self.first_column_index)
    }
}

/// Size and scroll offset of the scrollable rows area (below the column headers).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewportState {
    pub width: u32,
    pub height: u32,
    pub scroll_left: u64,
    pub scroll_top: u64,
}

impl ViewportState {
    /// Clamps the scroll offsets to the given scrollable extents.
    pub fn clamp(&mut self, max_left: u64, max_top: u64) {
        self.scroll_left = self.scroll_left.min(max_left);
        self.scroll_top = self.scroll_top.min(max_top);
    }
}

/// Heights reported for content-sized rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowHeightsState {
    pub measured: HashMap<RowId, u32>,
}

/// A partial scroll request; `None` keeps the current offset on that axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollParams {
    pub left: Option<u64>,
    pub top: Option<u64>,
}

#[derive(Clone)]
pub struct VirtualizationModule {
    ctx: GridContext,
    engine: Rc<RefCell<RenderWindowEngine>>,
    scroll: Rc<RefCell<FrameThrottle<ScrollParams>>>,
}

impl VirtualizationModule {
    pub fn new(ctx: GridContext) -> Self {
        Self {
            ctx,
            engine: Rc::new(RefCell::new(RenderWindowEngine::default())),
            scroll: Rc::new(RefCell::new(FrameThrottle::new())),
        }
    }

    /// Drops measured heights of rows whose data changed, since their content may have resized.
    /// Uniform layouts never measure, so nothing is invalidated for them.
    pub fn subscribe(&self) -> Vec<Subscription> {
        let weak = self.ctx.downgrade();
        let on_update = self.ctx.events.subscribe(GridEventName::RowsUpdated, move |event| {
            let (Some(ctx), GridEvent::RowsUpdated { ids }) = (weak.upgrade(), event) else {
                return;
            };
            let stale = ctx
                .store
                .read(|s| ids.iter().any(|id| s.row_heights.measured.contains_key(id)));
            if stale {
                ctx.store.update(|s| {
                    let mut heights = (*s.row_heights).clone();
                    for id in ids {
                        heights.measured.remove(id);
                    }
                    s.row_heights = Rc::new(heights);
                });
            }
        });
        let weak = self.ctx.downgrade();
        let on_set = self.ctx.events.subscribe(GridEventName::RowsSet, move |_| {
            let Some(ctx) = weak.upgrade() else {
                return;
            };
            if ctx.store.read(|s| !s.row_heights.measured.is_empty()) {
                ctx.store.update(|s| s.row_heights = Rc::new(RowHeightsState::default()));
            }
        });
        vec![on_update, on_set]
    }

    pub fn viewport(&self) -> ViewportState {
        self.ctx.store.read(|s| *s.viewport)
    }

    pub fn set_viewport_size(&self, width: u32, height: u32) {
        let current = self.viewport();
        if current.width == width && current.height == height {
            return;
        }
        self.ctx.store.update(|s| {
            s.viewport = Rc::new(ViewportState {
                width,
                height,
                ..current
            })
        });
        self.clamp_scroll();
    }

    /// Queues a scroll request. Requests made between two frames collapse into the latest one.
    pub fn scroll(&self, params: ScrollParams) {
        self.scroll.borrow_mut().request(params);
    }

    pub fn scroll_by(&self, dx: i64, dy: i64) {
        let base = self.scroll.borrow().peek().copied().unwrap_or_else(|| {
            let v = self.viewport();
            ScrollParams {
                left: Some(v.scroll_left),
                top: Some(v.scroll_top),
            }
        });
        let current = self.viewport();
        let left = base.left.unwrap_or(current.scroll_left);
        let top = base.top.unwrap_or(current.scroll_top);
        self.scroll(ScrollParams {
            left: Some(left.saturating_add_signed(dx)),
            top: Some(top.saturating_add_signed(dy)),
        });
    }

    /// Applies the pending scroll request, if any. Returns whether the offset changed.
    pub fn flush_frame(&self) -> bool {
        let Some(params) = self.scroll.borrow_mut().on_frame() else {
            return false;
        };
        let current = self.viewport();
        let mut next = ViewportState {
            scroll_left: params.left.unwrap_or(current.scroll_left),
            scroll_top: params.top.unwrap_or(current.scroll_top),
            ..current
        };
        let (max_left, max_top) = window::scroll_limits(&self.ctx.store);
        next.clamp(max_left, max_top);
        if next == current {
            return false;
        }
        self.ctx.store.update(|s| s.viewport = Rc::new(next));
        self.ctx.publish(GridEvent::ScrollPositionChange {
            left: next.scroll_left,
            top: next.scroll_top,
        });
        true
    }

    pub fn has_pending_scroll(&self) -> bool {
        self.scroll.borrow().is_pending()
    }

    /// Re-clamps the current offset after the content or viewport shrank.
    pub fn clamp_scroll(&self) {
        let current = self.viewport();
        let (max_left, max_top) = window::scroll_limits(&self.ctx.store);
        let mut next = current;
        next.clamp(max_left, max_top);
        if next != current {
            self.ctx.store.update(|s| s.viewport = Rc::new(next));
        }
    }

    /// Scrolls just enough to bring the given body row and column fully into view.
    pub fn scroll_to_indexes(&self, row_index: Option<usize>, column_index: Option<usize>) {
        let target = window::scroll_target(&self.ctx.store, self.viewport(), row_index, column_index);
        if let Some(target) = target {
            self.scroll(target);
            self.flush_frame();
        }
    }

    /// Records the content height of an auto-height row.
    pub fn measure_row_height(&self, id: &RowId, height: u32) {
        let height = height.max(1);
        let known = self
            .ctx
            .store
            .read(|s| s.row_heights.measured.get(id).copied());
        if known == Some(height) {
            return;
        }
        self.ctx.store.update(|s| {
            let mut heights = (*s.row_heights).clone();
            heights.measured.insert(id.clone(), height);
            s.row_heights = Rc::new(heights);
        });
    }

    /// Pixel offset of a body row, pinned top rows and detail panels above it included.
    pub fn row_offset(&self, index: usize) -> u64 {
        window::row_offset(&self.ctx.store, index)
    }

    /// Flushes pending scroll and computes the window for this frame.
    pub fn render_window(&self) -> RenderWindow {
        self.flush_frame();
        let window = self.engine.borrow_mut().compute(&self.ctx.store);
        if window.changed {
            self.ctx
                .publish(GridEvent::RenderedRowsIntervalChange(window.context));
        }
        window
    }

    pub fn last_render_context(&self) -> Option<RenderContext> {
        self.engine.borrow().last_context()
    }
}
