//! Serializable snapshot of the user-facing models.
//!
//! [`GridInitialState`] is both what `GridOptions::initial_state` seeds a grid with and what
//! [`crate::DataGrid::export_state`] returns. Every section is optional; restoring a snapshot only
//! touches the sections it carries.

use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;

use crate::features::aggregation::AggregationState;
use crate::features::density::Density;
use crate::features::filtering::FilterModel;
use crate::features::pagination::PaginationModel;
use crate::features::pinning::PinnedColumns;
use crate::features::row_grouping::RowGroupingState;
use crate::features::sorting::SortModel;
use crate::options::Tier;
use crate::store::GridState;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SortingInitialState {
    pub sort_model: SortModel,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterInitialState {
    pub filter_model: FilterModel,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaginationInitialState {
    pub pagination_model: PaginationModel,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnsInitialState {
    pub column_visibility_model: HashMap<String, bool>,
    /// User column order; synthetic columns are not listed.
    pub ordered_fields: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridInitialState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sorting: Option<SortingInitialState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterInitialState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationInitialState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<ColumnsInitialState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_columns: Option<PinnedColumns>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<Density>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_grouping: Option<RowGroupingState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<AggregationState>,
}

impl GridInitialState {
    /// Captures the current models. Tier-gated sections are only captured when unlocked.
    pub fn capture(state: &GridState) -> Self {
        let options = &state.options;
        Self {
            sorting: Some(SortingInitialState {
                sort_model: (*state.sorting).clone(),
            }),
            filter: Some(FilterInitialState {
                filter_model: (*state.filter).clone(),
            }),
            pagination: Some(PaginationInitialState {
                pagination_model: *state.pagination,
            }),
            columns: Some(ColumnsInitialState {
                column_visibility_model: state.columns.column_visibility_model.clone(),
                ordered_fields: state
                    .columns
                    .ordered()
                    .filter(|c| !c.synthetic)
                    .map(|c| c.field.clone())
                    .collect(),
            }),
            pinned_columns: options
                .allows(Tier::Pro)
                .then(|| (*state.pinned_columns).clone()),
            density: Some(*state.density),
            row_grouping: options
                .allows(Tier::Premium)
                .then(|| (*state.row_grouping).clone()),
            aggregation: options
                .allows(Tier::Premium)
                .then(|| (*state.aggregation).clone()),
        }
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::filtering::FilterItem;
    use crate::features::filtering::FilterOperator;
    use crate::features::sorting::SortItem;

    #[test]
    fn json_uses_nested_camel_case_sections() {
        let state = GridInitialState {
            sorting: Some(SortingInitialState {
                sort_model: vec![SortItem::asc("name")],
            }),
            pagination: Some(PaginationInitialState {
                pagination_model: PaginationModel {
                    page: 2,
                    page_size: 10,
                },
            }),
            ..Default::default()
        };
        let json: serde_json::Value = serde_json::from_str(&state.to_json().unwrap()).unwrap();
        assert_eq!(json["sorting"]["sortModel"][0]["field"], "name");
        assert_eq!(json["pagination"]["paginationModel"]["pageSize"], 10);
        assert!(json.get("filter").is_none());
    }

    #[test]
    fn models_survive_a_json_trip() {
        let state = GridInitialState {
            sorting: Some(SortingInitialState {
                sort_model: vec![SortItem::desc("b"), SortItem::asc("a")],
            }),
            filter: Some(FilterInitialState {
                filter_model: FilterModel {
                    items: vec![FilterItem::new("a", FilterOperator::Contains, "x")],
                    quick_filter_values: vec!["q".into()],
                    ..Default::default()
                },
            }),
            density: Some(Density::Compact),
            ..Default::default()
        };
        let back = GridInitialState::from_json(&state.to_json().unwrap()).unwrap();
        assert_eq!(back, state);
    }
}
