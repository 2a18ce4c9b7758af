//! `ratatui-datagrid-core` is the headless engine behind the `ratatui-datagrid` widget.
//!
//! It owns grid state and everything derived from it, but draws nothing. A frontend reads a
//! [`virtualization::RenderWindow`] and paints it however it likes.
//!
//! ## Architecture
//!
//! - [`store::GridStore`] holds one [`store::GridState`] of shared slices. Every write bumps the
//!   store version and replaces only the slices it touched.
//! - [`selector::MemoizedSelector`]s derive views (filtered rows, the current page, column
//!   positions) and recompute only when an input slice changed identity.
//! - [`pipe::PipeRegistry`] folds registered processors over a value per named stage. Features
//!   inject synthetic columns, group rows and extend the column menu this way.
//! - [`events::EventBus`] publishes a [`events::GridEvent`] after every model change.
//! - [`api::ApiRegistry`] exposes the feature methods by name, for scripting and tests.
//!
//! ## Getting started
//!
//! Most users should depend on the facade crate `ratatui-datagrid`. Use this crate directly for a
//! custom frontend or for driving a grid without a terminal.
//!
//! Useful entry points:
//! - [`DataGrid`]: the assembled grid and its feature modules.
//! - [`GridOptions`]: configuration, including the feature [`Tier`].
//! - [`GridInitialState`]: a serializable snapshot of the user-facing models.
//!
//! ## Tiers
//!
//! Column pinning, row pinning, row reordering and detail panels need [`Tier::Pro`]. Row
//! grouping, aggregation and Excel export need [`Tier::Premium`]. Calling a locked feature
//! returns [`GridError::FeatureUnavailable`].
pub mod api;
pub mod column;
pub mod context;
pub mod error;
pub mod events;
pub mod features;
pub mod grid;
pub mod locale;
pub mod options;
pub mod pipe;
pub mod selector;
pub mod slots;
pub mod state_export;
pub mod store;
pub mod timing;
pub mod value;
pub mod virtualization;

pub use column::ColumnDef;
pub use column::ColumnType;
pub use error::GridError;
pub use error::Result;
pub use events::GridEvent;
pub use events::GridEventName;
pub use grid::DataGrid;
pub use options::GridOptions;
pub use options::Tier;
pub use state_export::GridInitialState;
pub use value::CellValue;
pub use value::GridRowModel;
pub use value::RowId;
pub use value::row;
