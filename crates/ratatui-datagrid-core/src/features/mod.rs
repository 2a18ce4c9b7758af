//! Feature modules.
//!
//! Each module owns one slice of [`crate::store::GridState`], exposes selectors to read it and
//! methods to replace it, and contributes its pipe processors and API methods when the grid is
//! assembled.

pub mod aggregation;
pub mod column_menu;
pub mod columns;
pub mod density;
pub mod detail_panel;
pub mod editing;
pub mod export;
pub mod filtering;
pub mod focus;
pub mod pagination;
pub mod pinning;
pub mod preferences;
pub mod reorder;
pub mod row_grouping;
pub mod row_pinning;
pub mod rows;
pub mod selection;
pub mod sorting;

use crate::error::GridError;
use crate::error::Result;
use crate::options::GridOptions;
use crate::options::Tier;

/// Fails when `options` does not unlock `feature`.
pub(crate) fn require_tier(options: &GridOptions, feature: &'static str, required: Tier) -> Result<()> {
    if options.allows(required) {
        Ok(())
    } else {
        Err(GridError::FeatureUnavailable { feature, required })
    }
}
