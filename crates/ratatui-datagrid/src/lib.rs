//! `ratatui-datagrid` draws a [`ratatui_datagrid_core::DataGrid`] into a ratatui buffer.
//!
//! The engine lives in `ratatui-datagrid-core` and is re-exported here. This crate adds the
//! terminal side: [`view::DataGridView`] renders the grid's render window and turns key and
//! mouse input into grid calls, [`slots::DataGridSlots`] lets apps replace individual renderers,
//! and [`keymap::GridKeymap`] holds the key bindings.
//!
//! Enable the `crossterm` feature for conversions from crossterm events.

pub use ratatui_datagrid_core;

pub mod theme;

pub mod render;

pub mod input;
pub mod keymap;

#[cfg(feature = "crossterm")]
pub mod crossterm_input;

pub mod slots;
pub mod view;

pub use ratatui_datagrid_core::ColumnDef;
pub use ratatui_datagrid_core::DataGrid;
pub use ratatui_datagrid_core::GridOptions;
pub use view::DataGridAction;
pub use view::DataGridView;
pub use view::DataGridViewOptions;
pub use view::tui_column;
pub use view::tui_options;
