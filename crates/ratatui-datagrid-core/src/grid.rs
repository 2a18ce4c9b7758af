//! The assembled grid.
//!
//! [`DataGrid`] builds one [`GridContext`], wires every feature module into it (pipe processors
//! first, then event subscriptions, then the API registry) and seeds the models from
//! [`GridOptions::initial_state`]. Feature modules stay reachable through typed accessors; the
//! string-keyed [`ApiRegistry`] is the dynamic surface over the same methods.

use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::api::opt_arg;
use crate::column::ColumnDef;
use crate::context::GridContext;
use crate::error::Result;
use crate::events::GridEvent;
use crate::events::GridEventName;
use crate::events::Subscription;
use crate::features::aggregation::AggregationModule;
use crate::features::column_menu::ColumnMenuAction;
use crate::features::column_menu::ColumnMenuItem;
use crate::features::column_menu::ColumnMenuModule;
use crate::features::columns::ColumnsModule;
use crate::features::density::DensityModule;
use crate::features::detail_panel::DetailPanelModule;
use crate::features::editing::EditingModule;
use crate::features::export::ExportMenuItem;
use crate::features::export::ExportModule;
use crate::features::filtering::FilterItem;
use crate::features::filtering::FilterOperator;
use crate::features::filtering::FilteringModule;
use crate::features::focus::FocusModule;
use crate::features::pagination::PaginationModule;
use crate::features::pinning::PinningModule;
use crate::features::preferences::PreferencePanelKind;
use crate::features::preferences::PreferencesModule;
use crate::features::reorder::RowReorderModule;
use crate::features::row_grouping::RowGroupingModule;
use crate::features::row_pinning::RowPinningModule;
use crate::features::rows::RowsModule;
use crate::features::selection::SelectionModule;
use crate::features::sorting::SortingModule;
use crate::locale::LocaleArg;
use crate::options::GridOptions;
use crate::options::Tier;
use crate::pipe::PipeProcessorHandle;
use crate::state_export::GridInitialState;
use crate::store::GridStore;
use crate::value::GridRowModel;
use crate::virtualization::RenderWindow;
use crate::virtualization::ScrollParams;
use crate::virtualization::VirtualizationModule;

#[derive(Clone)]
struct Features {
    rows: RowsModule,
    columns: ColumnsModule,
    sorting: SortingModule,
    filtering: FilteringModule,
    pagination: PaginationModule,
    density: DensityModule,
    selection: SelectionModule,
    pinning: PinningModule,
    row_pinning: RowPinningModule,
    row_grouping: RowGroupingModule,
    aggregation: AggregationModule,
    reorder: RowReorderModule,
    editing: EditingModule,
    focus: FocusModule,
    preferences: PreferencesModule,
    detail_panel: DetailPanelModule,
    column_menu: ColumnMenuModule,
    export: ExportModule,
    virtualization: VirtualizationModule,
}

impl Features {
    fn new(ctx: &GridContext) -> Self {
        let rows = RowsModule::new(ctx.clone());
        let columns = ColumnsModule::new(ctx.clone());
        Self {
            sorting: SortingModule::new(ctx.clone()),
            filtering: FilteringModule::new(ctx.clone()),
            pagination: PaginationModule::new(ctx.clone()),
            density: DensityModule::new(ctx.clone()),
            selection: SelectionModule::new(ctx.clone()),
            pinning: PinningModule::new(ctx.clone()),
            row_pinning: RowPinningModule::new(ctx.clone()),
            row_grouping: RowGroupingModule::new(ctx.clone(), columns.clone(), rows.clone()),
            aggregation: AggregationModule::new(ctx.clone()),
            reorder: RowReorderModule::new(ctx.clone(), rows.clone()),
            editing: EditingModule::new(ctx.clone(), rows.clone()),
            focus: FocusModule::new(ctx.clone()),
            preferences: PreferencesModule::new(ctx.clone()),
            detail_panel: DetailPanelModule::new(ctx.clone()),
            column_menu: ColumnMenuModule::new(ctx.clone()),
            export: ExportModule::new(ctx.clone()),
            virtualization: VirtualizationModule::new(ctx.clone()),
            rows,
            columns,
        }
    }

    /// Menu items are appended in registration order, so the base items come first.
    fn register_pipes(&self) -> Vec<PipeProcessorHandle> {
        let mut handles = self.column_menu.register_pipes();
        handles.extend(self.row_grouping.register_pipes());
        handles.extend(self.selection.register_pipes());
        handles.extend(self.reorder.register_pipes());
        handles.extend(self.pinning.register_pipes());
        handles.extend(self.aggregation.register_pipes());
        handles.extend(self.export.register_pipes());
        handles
    }

    fn subscribe(&self, ctx: &GridContext) -> Vec<Subscription> {
        let mut subscriptions = self.selection.subscribe();
        subscriptions.extend(self.editing.subscribe());
        subscriptions.extend(self.detail_panel.subscribe());
        subscriptions.extend(self.virtualization.subscribe());
        for name in [
            GridEventName::RowsSet,
            GridEventName::RowsUpdated,
            GridEventName::FilterModelChange,
            GridEventName::RowGroupingModelChange,
            GridEventName::RowExpansionChange,
        ] {
            let weak = ctx.downgrade();
            subscriptions.push(ctx.events.subscribe(name, move |_| {
                let Some(ctx) = weak.upgrade() else {
                    return;
                };
                PaginationModule::new(ctx.clone()).clamp_to_row_count();
                VirtualizationModule::new(ctx).clamp_scroll();
            }));
        }
        subscriptions
    }

    fn register_api(&self, api: &ApiRegistry) {
        self.rows.register_api(api);
        self.columns.register_api(api);
        self.sorting.register_api(api);
        self.filtering.register_api(api);
        self.pagination.register_api(api);
        self.density.register_api(api);
        self.selection.register_api(api);
        self.pinning.register_api(api);
        self.row_pinning.register_api(api);
        self.row_grouping.register_api(api);
        self.aggregation.register_api(api);
        self.reorder.register_api(api);
        self.editing.register_api(api);
        self.focus.register_api(api);
        self.preferences.register_api(api);
        self.detail_panel.register_api(api);
        self.export.register_api(api);
    }

    /// Applies the sections `state` carries. Sections the tier does not unlock are skipped.
    fn restore_state(&self, ctx: &GridContext, state: &GridInitialState) {
        let options = ctx.options();
        if let Some(columns) = &state.columns {
            if !columns.ordered_fields.is_empty() {
                self.columns.set_column_order(&columns.ordered_fields);
            }
            self.columns
                .set_column_visibility_model(columns.column_visibility_model.clone());
        }
        if let Some(density) = state.density {
            self.density.set_density(density);
        }
        if let Some(sorting) = &state.sorting {
            self.sorting.set_sort_model(sorting.sort_model.clone());
        }
        if let Some(filter) = &state.filter {
            self.filtering.set_filter_model(filter.filter_model.clone());
        }
        if let Some(pinned) = &state.pinned_columns {
            if let Err(err) = self.pinning.set_pinned_columns(pinned.clone()) {
                tracing::debug!(%err, "pinned columns not restored");
            }
        }
        if options.allows(Tier::Premium) {
            if let Some(grouping) = &state.row_grouping {
                if let Err(err) = self.row_grouping.set_row_grouping_model(grouping.model.clone()) {
                    tracing::warn!(%err, "row grouping not restored");
                }
            }
            if let Some(aggregation) = &state.aggregation {
                if let Err(err) = self.aggregation.set_aggregation_model(aggregation.model.clone()) {
                    tracing::warn!(%err, "aggregation not restored");
                }
            }
        } else if state.row_grouping.is_some() || state.aggregation.is_some() {
            tracing::debug!(tier = ?options.tier, "premium sections skipped");
        }
        // Last, so the page clamps against the restored filter and grouping.
        if let Some(pagination) = &state.pagination {
            self.pagination
                .set_pagination_model(pagination.pagination_model);
        }
    }
}

/// A headless data grid.
///
/// ```
/// use ratatui_datagrid_core::{CellValue, ColumnDef, DataGrid, GridOptions, row};
///
/// let grid = DataGrid::new(
///     vec![ColumnDef::new("name"), ColumnDef::new("age")],
///     vec![row([
///         ("id", CellValue::from(1)),
///         ("name", CellValue::from("Ada")),
///         ("age", CellValue::from(36)),
///     ])],
///     GridOptions::default(),
/// );
/// assert_eq!(grid.rows().row_count(), 1);
/// ```
pub struct DataGrid {
    ctx: GridContext,
    api: ApiRegistry,
    features: Features,
    _pipes: Vec<PipeProcessorHandle>,
    _subscriptions: Vec<Subscription>,
}

impl DataGrid {
    pub fn new(columns: Vec<ColumnDef>, rows: Vec<GridRowModel>, options: GridOptions) -> Self {
        let initial_state = options.initial_state.clone();
        let pinned_rows = options.pinned_rows.clone();
        let ctx = GridContext::new(options);
        let features = Features::new(&ctx);
        let pipes = features.register_pipes();
        let subscriptions = features.subscribe(&ctx);

        features.columns.set_columns(columns);
        features.rows.set_rows(rows);
        if let Some(state) = &initial_state {
            features.restore_state(&ctx, state);
        }
        if !pinned_rows.is_empty() {
            if let Err(err) = features.row_pinning.set_pinned_rows(pinned_rows) {
                tracing::warn!(%err, "pinned rows ignored");
            }
        }

        let api = ApiRegistry::new();
        features.register_api(&api);
        register_grid_api(&api, &ctx, &features);
        api.mark_initialized();
        tracing::debug!(
            grid = ?ctx.store.id(),
            columns = features.columns.columns().len(),
            rows = features.rows.row_count(),
            methods = api.public_methods().len(),
            "grid ready"
        );

        Self {
            ctx,
            api,
            features,
            _pipes: pipes,
            _subscriptions: subscriptions,
        }
    }

    pub fn api(&self) -> &ApiRegistry {
        &self.api
    }

    /// Calls a public API method by name.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        self.api.call(name, args)
    }

    pub fn store(&self) -> &GridStore {
        &self.ctx.store
    }

    pub fn context(&self) -> &GridContext {
        &self.ctx
    }

    pub fn options(&self) -> std::rc::Rc<GridOptions> {
        self.ctx.options()
    }

    /// Replaces the options.
    ///
    /// Columns and rows are re-hydrated so tier, checkbox and reordering changes take effect;
    /// density and pinned rows only change when their option value changed.
    pub fn set_options(&self, options: GridOptions) {
        let previous = self.ctx.options();
        let density_changed = previous.density != options.density;
        let pinned_rows_changed = previous.pinned_rows != options.pinned_rows;
        let quick_filter_debounce = options.quick_filter_debounce;
        let edit_debounce = options.edit_debounce;
        let density = options.density;
        let pinned_rows = options.pinned_rows.clone();

        self.ctx
            .store
            .update(|s| s.options = std::rc::Rc::new(options));
        self.features
            .filtering
            .set_quick_filter_debounce(quick_filter_debounce);
        self.features.editing.set_debounce(edit_debounce);
        self.features.columns.hydrate();
        self.features.rows.hydrate();
        if density_changed {
            self.features.density.set_density(density);
        }
        if pinned_rows_changed {
            if let Err(err) = self.features.row_pinning.set_pinned_rows(pinned_rows) {
                tracing::warn!(%err, "pinned rows ignored");
            }
        }
        self.features.pagination.clamp_to_row_count();
        self.features.virtualization.clamp_scroll();
        tracing::debug!(version = self.ctx.store.version(), "options replaced");
    }

    pub fn subscribe_event(
        &self,
        name: GridEventName,
        handler: impl Fn(&GridEvent) + 'static,
    ) -> Subscription {
        self.ctx.events.subscribe(name, handler)
    }

    /// Advances debounced inputs. Returns `true` when a pending value was applied.
    pub fn tick(&self, now: Instant) -> bool {
        let filtered = self.features.filtering.tick(now);
        let edited = self.features.editing.tick(now);
        filtered || edited
    }

    /// Applies the scroll request batched since the last frame.
    pub fn flush_frame(&self) -> bool {
        self.features.virtualization.flush_frame()
    }

    pub fn render_window(&self) -> RenderWindow {
        self.features.virtualization.render_window()
    }

    pub fn export_state(&self) -> GridInitialState {
        self.ctx.store.read(GridInitialState::capture)
    }

    pub fn restore_state(&self, state: &GridInitialState) {
        self.features.restore_state(&self.ctx, state);
    }

    pub fn column_menu(&self, field: &str) -> Result<Vec<ColumnMenuItem>> {
        self.features.column_menu.items(field)
    }

    pub fn export_menu(&self) -> Vec<ExportMenuItem> {
        self.features.export.export_menu()
    }

    /// Performs what a column menu item describes.
    pub fn apply_column_menu_action(&self, field: &str, action: &ColumnMenuAction) -> Result<()> {
        tracing::debug!(field, ?action, "column menu action");
        let f = &self.features;
        match action {
            ColumnMenuAction::Sort(direction) => f.sorting.sort_column(field, *direction, false),
            ColumnMenuAction::Filter => {
                let column = f
                    .columns
                    .column(field)
                    .ok_or_else(|| crate::GridError::ColumnNotFound(field.to_string()))?;
                if let Some(operator) = FilterOperator::available_for(&column).first() {
                    f.filtering
                        .upsert_filter_item(FilterItem::without_value(field, *operator));
                }
                f.preferences.show_preferences(PreferencePanelKind::Filters);
                Ok(())
            }
            ColumnMenuAction::Hide => f.columns.set_column_visibility(field, false),
            ColumnMenuAction::ManageColumns => {
                f.preferences.show_preferences(PreferencePanelKind::Columns);
                Ok(())
            }
            ColumnMenuAction::Pin(side) => f.pinning.pin_column(field, *side),
            ColumnMenuAction::Unpin => f.pinning.unpin_column(field),
            ColumnMenuAction::GroupBy => f.row_grouping.add_row_grouping_criteria(field, None),
            ColumnMenuAction::Ungroup(criterion) => {
                f.row_grouping.remove_row_grouping_criteria(criterion)
            }
            ColumnMenuAction::Aggregate(function) => {
                f.aggregation.set_column_aggregation(field, function.as_deref())
            }
        }
    }

    /// Resolves a locale key with the grid's locale text.
    pub fn locale_text(&self, key: &str, args: &[LocaleArg]) -> String {
        self.ctx.options().locale_text.resolve(key, args)
    }

    pub fn rows(&self) -> &RowsModule {
        &self.features.rows
    }

    pub fn columns(&self) -> &ColumnsModule {
        &self.features.columns
    }

    pub fn sorting(&self) -> &SortingModule {
        &self.features.sorting
    }

    pub fn filtering(&self) -> &FilteringModule {
        &self.features.filtering
    }

    pub fn pagination(&self) -> &PaginationModule {
        &self.features.pagination
    }

    pub fn density(&self) -> &DensityModule {
        &self.features.density
    }

    pub fn selection(&self) -> &SelectionModule {
        &self.features.selection
    }

    pub fn pinning(&self) -> &PinningModule {
        &self.features.pinning
    }

    pub fn row_pinning(&self) -> &RowPinningModule {
        &self.features.row_pinning
    }

    pub fn row_grouping(&self) -> &RowGroupingModule {
        &self.features.row_grouping
    }

    pub fn aggregation(&self) -> &AggregationModule {
        &self.features.aggregation
    }

    pub fn reorder(&self) -> &RowReorderModule {
        &self.features.reorder
    }

    pub fn editing(&self) -> &EditingModule {
        &self.features.editing
    }

    pub fn focus(&self) -> &FocusModule {
        &self.features.focus
    }

    pub fn preferences(&self) -> &PreferencesModule {
        &self.features.preferences
    }

    pub fn detail_panel(&self) -> &DetailPanelModule {
        &self.features.detail_panel
    }

    pub fn export(&self) -> &ExportModule {
        &self.features.export
    }

    pub fn virtualization(&self) -> &VirtualizationModule {
        &self.features.virtualization
    }
}

impl std::fmt::Debug for DataGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataGrid")
            .field("id", &self.ctx.store.id())
            .field("version", &self.ctx.store.version())
            .finish_non_exhaustive()
    }
}

fn locale_args(values: Option<Vec<Value>>) -> Vec<LocaleArg> {
    values
        .unwrap_or_default()
        .into_iter()
        .map(|v| match v {
            Value::Number(n) => n
                .as_u64()
                .map(|n| LocaleArg::Count(n as usize))
                .unwrap_or_else(|| LocaleArg::Text(n.to_string())),
            Value::String(s) => LocaleArg::Text(s),
            other => LocaleArg::Text(other.to_string()),
        })
        .collect()
}

fn register_grid_api(api: &ApiRegistry, ctx: &GridContext, features: &Features) {
    let scroll = features.virtualization.clone();
    let render = features.virtualization.clone();
    let locale = ctx.downgrade();
    let export = ctx.downgrade();
    let restore = (ctx.downgrade(), features.clone());
    let menu = features.column_menu.clone();
    api.register(
        "grid",
        ApiVisibility::Public,
        [
            method("scroll", move |args| {
                let params: ScrollParams = arg("scroll", args, 0)?;
                scroll.scroll(params);
                Ok(Value::Null)
            }),
            method("getRenderContext", move |_| {
                Ok(serde_json::to_value(render.last_render_context())?)
            }),
            method("getLocaleText", move |args| {
                let key: String = arg("getLocaleText", args, 0)?;
                let values: Option<Vec<Value>> = opt_arg("getLocaleText", args, 1)?;
                let Some(ctx) = locale.upgrade() else {
                    return Ok(Value::Null);
                };
                let text = ctx.options().locale_text.resolve(&key, &locale_args(values));
                Ok(Value::String(text))
            }),
            method("exportState", move |_| {
                let Some(ctx) = export.upgrade() else {
                    return Ok(Value::Null);
                };
                Ok(serde_json::to_value(ctx.store.read(GridInitialState::capture))?)
            }),
            method("restoreState", move |args| {
                let state: GridInitialState = arg("restoreState", args, 0)?;
                let (weak, features) = &restore;
                if let Some(ctx) = weak.upgrade() {
                    features.restore_state(&ctx, &state);
                }
                Ok(Value::Null)
            }),
            method("getColumnMenuItems", move |args| {
                let field: String = arg("getColumnMenuItems", args, 0)?;
                let keys: Vec<String> = menu.items(&field)?.into_iter().map(|i| i.key).collect();
                Ok(serde_json::to_value(keys)?)
            }),
        ],
    );
    // Read-only view of which optional features are unlocked.
    let tiers = ctx.downgrade();
    api.register(
        "grid",
        ApiVisibility::Private,
        [method("getFeatureTiers", move |_| {
            let Some(ctx) = tiers.upgrade() else {
                return Ok(Value::Null);
            };
            let options = ctx.options();
            let tiers: HashMap<&str, bool> = [
                ("pro", options.allows(Tier::Pro)),
                ("premium", options.allows(Tier::Premium)),
            ]
            .into_iter()
            .collect();
            Ok(serde_json::to_value(tiers)?)
        })],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::pinning::PinnedSide;
    use crate::features::sorting::SortDirection;
    use crate::features::sorting::SortItem;
    use crate::value::CellValue;
    use crate::value::RowId;
    use crate::value::row;
    use serde_json::json;

    fn person(id: i64, name: &str, age: i64) -> GridRowModel {
        row([
            ("id", CellValue::from(id)),
            ("name", CellValue::from(name)),
            ("age", CellValue::from(age)),
        ])
    }

    fn people() -> Vec<GridRowModel> {
        vec![person(1, "Ada", 36), person(2, "Grace", 85), person(3, "Linus", 54)]
    }

    fn columns() -> Vec<ColumnDef> {
        vec![ColumnDef::new("name"), ColumnDef::new("age")]
    }

    #[test]
    fn api_is_initialized_after_construction() {
        let grid = DataGrid::new(columns(), people(), GridOptions::default());
        assert!(grid.api().is_initialized());
        assert!(grid.api().has("setSortModel"));
        assert_eq!(grid.api().owner_of("scroll"), Some("grid"));
        assert_eq!(grid.call("getRowsCount", &[]).ok(), Some(json!(3)));
    }

    #[test]
    fn initial_state_seeds_models() {
        let options = GridOptions {
            initial_state: Some(GridInitialState {
                sorting: Some(crate::state_export::SortingInitialState {
                    sort_model: vec![SortItem::desc("age")],
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let grid = DataGrid::new(columns(), people(), options);
        assert_eq!(
            grid.sorting().sorted_row_ids(),
            vec![RowId::Int(2), RowId::Int(3), RowId::Int(1)]
        );
    }

    #[test]
    fn column_menu_actions_reach_their_modules() {
        let grid = DataGrid::new(
            columns(),
            people(),
            GridOptions {
                tier: Tier::Pro,
                ..Default::default()
            },
        );
        grid.apply_column_menu_action("age", &ColumnMenuAction::Sort(Some(SortDirection::Asc)))
            .unwrap();
        assert_eq!(grid.sorting().sort_model(), vec![SortItem::asc("age")]);

        grid.apply_column_menu_action("name", &ColumnMenuAction::Pin(PinnedSide::Left))
            .unwrap();
        assert_eq!(grid.pinning().is_column_pinned("name"), Some(PinnedSide::Left));

        grid.apply_column_menu_action("age", &ColumnMenuAction::Filter).unwrap();
        assert_eq!(grid.filtering().filter_model().items.len(), 1);
        assert_eq!(
            grid.preferences().state().kind,
            Some(PreferencePanelKind::Filters)
        );

        grid.apply_column_menu_action("age", &ColumnMenuAction::Hide).unwrap();
        assert!(!grid.columns().visible_columns().fields().contains(&"age".to_string()));
    }

    #[test]
    fn set_options_rehydrates_the_checkbox_column() {
        let grid = DataGrid::new(columns(), people(), GridOptions::default());
        assert!(grid.columns().column(crate::features::selection::CHECKBOX_FIELD).is_none());
        grid.set_options(GridOptions {
            checkbox_selection: true,
            ..Default::default()
        });
        assert!(grid.columns().column(crate::features::selection::CHECKBOX_FIELD).is_some());
    }

    #[test]
    fn removing_rows_clamps_the_page() {
        let rows: Vec<GridRowModel> = (1..=25).map(|i| row([("id", i)])).collect();
        let grid = DataGrid::new(
            vec![ColumnDef::new("id")],
            rows,
            GridOptions {
                pagination: true,
                ..Default::default()
            },
        );
        grid.pagination().set_page_size(10).unwrap();
        grid.pagination().set_page(2);
        grid.rows().set_rows((1..=5).map(|i| row([("id", i)])).collect());
        assert_eq!(grid.pagination().pagination_model().page, 0);
    }
}
