use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::context::GridContext;
use crate::error::GridError;
use crate::error::Result;
use crate::events::GridEvent;
use crate::features::rows::RowEntry;
use crate::features::rows::VISIBLE_ROWS;
use crate::options::GridOptions;
use crate::selector::MemoizedSelector;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationModel {
    pub page: usize,
    pub page_size: usize,
}

impl Default for PaginationModel {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: 100,
        }
    }
}

/// Number of pages needed for `row_count` rows; zero rows still have one (empty) page.
pub fn page_count(row_count: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    row_count.div_ceil(page_size).max(1)
}

/// The last page index that holds rows. Out-of-range pages clamp to it.
pub fn clamp_page(page: usize, row_count: usize, page_size: usize) -> usize {
    page.min(page_count(row_count, page_size) - 1)
}

/// The body rows of the current page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageRows {
    pub rows: Vec<RowEntry>,
    /// Effective page after clamping.
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    /// Rows across every page.
    pub row_count: usize,
    /// Index of `rows[0]` within the visible row sequence.
    pub first_row_index: usize,
}

pub static PAGE_ROWS: MemoizedSelector<(Rc<Vec<RowEntry>>, Rc<PaginationModel>, Rc<GridOptions>), PageRows> =
    MemoizedSelector::new(
        "pagination.pageRows",
        |store| {
            let visible = store.select(&VISIBLE_ROWS);
            store.read(|s| (visible, s.pagination.clone(), s.options.clone()))
        },
        |(visible, model, options)| page_rows(visible, model, options),
    );

fn page_rows(visible: &[RowEntry], model: &PaginationModel, options: &GridOptions) -> PageRows {
    let row_count = visible.len();
    if !options.pagination || model.page_size == 0 {
        return PageRows {
            rows: visible.to_vec(),
            page: 0,
            page_size: row_count,
            page_count: 1,
            row_count,
            first_row_index: 0,
        };
    }
    let page = clamp_page(model.page, row_count, model.page_size);
    let start = (page * model.page_size).min(row_count);
    let end = (start + model.page_size).min(row_count);
    PageRows {
        rows: visible[start..end].to_vec(),
        page,
        page_size: model.page_size,
        page_count: page_count(row_count, model.page_size),
        row_count,
        first_row_index: start,
    }
}

#[derive(Clone)]
pub struct PaginationModule {
    ctx: GridContext,
}

impl PaginationModule {
    pub fn new(ctx: GridContext) -> Self {
        Self { ctx }
    }

    pub fn pagination_model(&self) -> PaginationModel {
        self.ctx.store.read(|s| *s.pagination)
    }

    pub fn page_rows(&self) -> Rc<PageRows> {
        self.ctx.store.select(&PAGE_ROWS)
    }

    pub fn page_count(&self) -> usize {
        self.page_rows().page_count
    }

    /// Requests `page`; pages past the end clamp to the last page.
    pub fn set_page(&self, page: usize) {
        let model = self.pagination_model();
        self.set_pagination_model(PaginationModel { page, ..model });
    }

    pub fn set_page_size(&self, page_size: usize) -> Result<()> {
        if page_size == 0 {
            return Err(GridError::InvalidArguments {
                method: "setPageSize".to_string(),
                reason: "page size must be positive".to_string(),
            });
        }
        let model = self.pagination_model();
        if !self.ctx.options().page_size_options.contains(&page_size) {
            tracing::debug!(page_size, "page size is not one of the offered options");
        }
        self.set_pagination_model(PaginationModel { page_size, ..model });
        Ok(())
    }

    pub fn set_pagination_model(&self, model: PaginationModel) {
        let model = self.clamped(model);
        if model == self.pagination_model() {
            return;
        }
        self.ctx.store.update(|s| s.pagination = Rc::new(model));
        self.ctx.publish(GridEvent::PaginationModelChange(model));
    }

    /// Re-applies the clamp after the row count shrank.
    pub fn clamp_to_row_count(&self) {
        self.set_pagination_model(self.pagination_model());
    }

    fn clamped(&self, model: PaginationModel) -> PaginationModel {
        if model.page_size == 0 {
            return PaginationModel {
                page: 0,
                ..self.pagination_model()
            };
        }
        let row_count = self.ctx.store.select(&VISIBLE_ROWS).len();
        let page = clamp_page(model.page, row_count, model.page_size);
        if page != model.page {
            tracing::debug!(requested = model.page, page, "page clamped");
        }
        PaginationModel { page, ..model }
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let page = self.clone();
        let size = self.clone();
        let set_model = self.clone();
        let get_model = self.clone();
        let count = self.clone();
        api.register(
            "pagination",
            ApiVisibility::Public,
            [
                method("setPage", move |args| {
                    page.set_page(arg("setPage", args, 0)?);
                    Ok(Value::Null)
                }),
                method("setPageSize", move |args| {
                    size.set_page_size(arg("setPageSize", args, 0)?)?;
                    Ok(Value::Null)
                }),
                method("setPaginationModel", move |args| {
                    set_model.set_pagination_model(arg("setPaginationModel", args, 0)?);
                    Ok(Value::Null)
                }),
                method("getPaginationModel", move |_| {
                    Ok(serde_json::to_value(get_model.pagination_model())?)
                }),
                method("getPageCount", move |_| Ok(Value::from(count.page_count()))),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::rows::RowsModule;
    use crate::value::row;

    fn module(rows: i64) -> PaginationModule {
        let ctx = GridContext::new(GridOptions {
            pagination: true,
            ..Default::default()
        });
        RowsModule::new(ctx.clone()).set_rows((1..=rows).map(|i| row([("id", i)])).collect());
        let pagination = PaginationModule::new(ctx);
        pagination.set_page_size(10).unwrap();
        pagination
    }

    #[test]
    fn out_of_range_pages_clamp_to_the_last_page() {
        let p = module(25);
        p.set_page(5);
        assert_eq!(p.pagination_model().page, 2);
        let rows = p.page_rows();
        assert_eq!(rows.rows.len(), 5);
        assert_eq!(rows.first_row_index, 20);
        assert_eq!(rows.page_count, 3);
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_page() {
        let p = module(20);
        p.set_page(7);
        assert_eq!(p.pagination_model().page, 1);
        assert_eq!(p.page_rows().rows.len(), 10);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let p = module(5);
        assert!(matches!(p.set_page_size(0), Err(GridError::InvalidArguments { .. })));
        assert_eq!(p.pagination_model().page_size, 10);
    }

    #[test]
    fn empty_grid_stays_on_page_zero() {
        let p = module(0);
        p.set_page(3);
        assert_eq!(p.pagination_model().page, 0);
        assert!(p.page_rows().rows.is_empty());
    }

    #[test]
    fn disabled_pagination_returns_every_row() {
        let ctx = GridContext::new(GridOptions::default());
        RowsModule::new(ctx.clone()).set_rows((1..=150).map(|i| row([("id", i)])).collect());
        let p = PaginationModule::new(ctx);
        assert_eq!(p.page_rows().rows.len(), 150);
    }

    #[test]
    fn model_json_is_camel_case() {
        let json = serde_json::to_value(PaginationModel { page: 1, page_size: 25 }).unwrap();
        assert_eq!(json, serde_json::json!({"page": 1, "pageSize": 25}));
    }
}
