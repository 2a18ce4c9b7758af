use proptest::prelude::*;
use ratatui_datagrid_core::features::pagination::PAGE_ROWS;
use ratatui_datagrid_core::features::pinning::PinnedSide;
use ratatui_datagrid_core::features::row_pinning::PinnedRowsState;
use ratatui_datagrid_core::features::rows::RowUpdate;
use ratatui_datagrid_core::features::filtering::FilterItem;
use ratatui_datagrid_core::features::filtering::FilterModel;
use ratatui_datagrid_core::features::filtering::FilterOperator;
use ratatui_datagrid_core::features::density::Density;
use ratatui_datagrid_core::features::selection::CHECKBOX_FIELD;
use ratatui_datagrid_core::features::sorting::SortItem;
use ratatui_datagrid_core::pipe::PipeRegistry;
use ratatui_datagrid_core::pipe::PipeStage;
use ratatui_datagrid_core::options::RowHeight;
use ratatui_datagrid_core::options::RowHeightParams;
use ratatui_datagrid_core::virtualization::ROW_POSITIONS;
use ratatui_datagrid_core::{CellValue, ColumnDef, DataGrid, GridInitialState, GridOptions, RowId, Tier, row};
use std::rc::Rc;

const TRACE: PipeStage<Vec<usize>> = PipeStage::new("test.trace");
const IDS: [&str; 6] = ["p0", "p1", "p2", "p3", "p4", "p5"];

fn numbered(count: i64) -> Vec<ratatui_datagrid_core::GridRowModel> {
    (1..=count)
        .map(|i| row([("id", CellValue::from(i)), ("name", CellValue::from(format!("row {i}")))]))
        .collect()
}

fn grid_with(count: i64, options: GridOptions) -> DataGrid {
    DataGrid::new(vec![ColumnDef::new("id"), ColumnDef::new("name")], numbered(count), options)
}

#[test]
fn selectors_return_the_same_value_until_an_input_changes() {
    let grid = grid_with(20, GridOptions::default());
    let first = grid.store().select(&PAGE_ROWS);
    let second = grid.store().select(&PAGE_ROWS);
    assert!(Rc::ptr_eq(&first, &second));

    grid.density().set_density(Density::Compact);
    assert!(Rc::ptr_eq(&first, &grid.store().select(&PAGE_ROWS)));

    grid.sorting().set_sort_model(vec![SortItem::desc("id")]);
    let sorted = grid.store().select(&PAGE_ROWS);
    assert!(!Rc::ptr_eq(&first, &sorted));
    assert_eq!(sorted.rows[0].id, RowId::Int(20));
}

#[test]
fn pipeline_folds_in_registration_order() {
    let pipes = PipeRegistry::new();
    let p1 = pipes.register(TRACE, "p1", |mut v: Vec<usize>, _: &()| {
        v.push(1);
        v
    });
    let _p2 = pipes.register(TRACE, "p2", |mut v: Vec<usize>, _: &()| {
        v.push(2);
        v
    });
    assert_eq!(pipes.apply(TRACE, Vec::new(), &()), vec![1, 2]);
    drop(p1);
    assert_eq!(pipes.apply(TRACE, Vec::new(), &()), vec![2]);
}

proptest! {
    #[test]
    fn teardown_restores_the_pipeline(count in 1usize..=6, dropped in proptest::collection::vec(any::<bool>(), 6)) {
        let pipes = PipeRegistry::new();
        let mut handles: Vec<_> = (0..count)
            .map(|i| {
                let handle = pipes.register(TRACE, IDS[i], move |mut v: Vec<usize>, _: &()| {
                    v.push(i);
                    v
                });
                Some(handle)
            })
            .collect();
        let mut expected = Vec::new();
        for (i, handle) in handles.iter_mut().enumerate() {
            if dropped[i] {
                handle.take();
            } else {
                expected.push(i);
            }
        }
        prop_assert_eq!(pipes.apply(TRACE, Vec::new(), &()), expected);
        handles.clear();
        prop_assert_eq!(pipes.processor_count(TRACE.name()), 0);
        prop_assert_eq!(pipes.apply(TRACE, Vec::new(), &()), Vec::<usize>::new());
    }

    #[test]
    fn a_field_is_never_pinned_to_both_sides(ops in proptest::collection::vec((0usize..3, 0u8..3), 0..24)) {
        let grid = DataGrid::new(
            vec![ColumnDef::new("a"), ColumnDef::new("b"), ColumnDef::new("c")],
            Vec::new(),
            GridOptions { tier: Tier::Pro, ..Default::default() },
        );
        for (column, op) in ops {
            let field = ["a", "b", "c"][column];
            let result = match op {
                0 => grid.pinning().pin_column(field, PinnedSide::Left),
                1 => grid.pinning().pin_column(field, PinnedSide::Right),
                _ => grid.pinning().unpin_column(field),
            };
            prop_assert!(result.is_ok());
            let pinned = grid.pinning().pinned_columns();
            prop_assert!(pinned.left.iter().all(|f| !pinned.right.contains(f)));
        }
    }
}

#[test]
fn sorting_is_stable_for_equal_keys() {
    let rows = vec![
        row([("id", CellValue::from(1)), ("a", CellValue::from(5))]),
        row([("id", CellValue::from(2)), ("a", CellValue::from(5))]),
        row([("id", CellValue::from(3)), ("a", CellValue::from(3))]),
    ];
    let grid = DataGrid::new(vec![ColumnDef::new("a")], rows, GridOptions::default());
    grid.sorting().set_sort_model(vec![SortItem::asc("a")]);
    assert_eq!(
        grid.sorting().sorted_row_ids(),
        vec![RowId::Int(3), RowId::Int(1), RowId::Int(2)]
    );
}

#[test]
fn out_of_range_pages_clamp_to_the_last_page() {
    let grid = grid_with(
        25,
        GridOptions {
            pagination: true,
            ..Default::default()
        },
    );
    grid.pagination().set_page_size(10).unwrap();
    grid.pagination().set_page(5);
    assert_eq!(grid.pagination().pagination_model().page, 2);
    let page = grid.pagination().page_rows();
    assert_eq!(page.rows.len(), 5);
    assert_eq!(page.page_count, 3);
}

#[test]
fn checkbox_column_is_added_once_and_removed_completely() {
    let grid = grid_with(3, GridOptions::default());
    let checkbox = || GridOptions {
        checkbox_selection: true,
        ..Default::default()
    };
    grid.set_options(checkbox());
    grid.set_options(checkbox());
    let fields = grid.columns().state().ordered_fields.clone();
    assert_eq!(fields.iter().filter(|f| *f == CHECKBOX_FIELD).count(), 1);

    grid.set_options(GridOptions::default());
    let state = grid.columns().state();
    assert!(!state.ordered_fields.iter().any(|f| f == CHECKBOX_FIELD));
    assert!(!state.lookup.contains_key(CHECKBOX_FIELD));
}

#[test]
fn render_window_covers_the_viewport_plus_overscan() {
    let grid = grid_with(
        1_000,
        GridOptions {
            row_height: 30,
            row_overscan: 3,
            ..Default::default()
        },
    );
    grid.virtualization().set_viewport_size(400, 300);
    let window = grid.render_window();
    let indexes: Vec<usize> = window.rows.iter().filter_map(|r| r.index).collect();
    for i in 0..10 {
        assert!(indexes.contains(&i), "row {i} missing from {indexes:?}");
    }
    assert!(indexes.iter().all(|i| *i < 10 + 3));
    assert!(!indexes.contains(&500));
    assert_eq!(window.total_height, 30_000);
    assert!(window.overlay.is_none());
}

fn ten_high(tier: Tier) -> GridOptions {
    GridOptions {
        tier,
        row_height: 10,
        row_overscan: 0,
        ..Default::default()
    }
}

#[test]
fn expanded_detail_panels_push_later_rows_down() {
    let grid = grid_with(50, ten_high(Tier::Pro));
    grid.virtualization().set_viewport_size(100, 100);
    assert_eq!(grid.render_window().total_height, 500);

    let id = RowId::Int(2);
    grid.detail_panel().toggle_detail_panel(&id).unwrap();
    let observer = grid.detail_panel().observer(&id).unwrap();
    assert!(observer.report_height(7));

    let window = grid.render_window();
    assert_eq!(window.total_height, 507);
    let expanded = window.rows.iter().find(|r| r.id == id).unwrap();
    assert_eq!((expanded.offset, expanded.height, expanded.detail_height), (10, 10, 7));
    let next = window.rows.iter().find(|r| r.index == Some(2)).unwrap();
    assert_eq!(next.offset, 27);
    assert_eq!(grid.virtualization().row_offset(2), 27);
}

#[test]
fn pinned_rows_frame_the_scrollable_body() {
    let grid = grid_with(50, ten_high(Tier::Pro));
    grid.virtualization().set_viewport_size(100, 100);
    grid.row_pinning()
        .set_pinned_rows(PinnedRowsState {
            top: vec![RowId::Int(1)],
            bottom: vec![RowId::Int(50)],
        })
        .unwrap();

    let window = grid.render_window();
    assert_eq!(window.total_height, 500);
    assert_eq!(window.body_height, 80);
    assert_eq!(window.pinned_top[0].offset, 0);
    assert_eq!(window.pinned_bottom[0].offset, 490);
    let first = &window.rows[0];
    assert_eq!((first.id.clone(), first.offset), (RowId::Int(2), 10));
    assert_eq!(grid.virtualization().row_offset(3), 40);
}

#[test]
fn auto_height_lays_out_every_row_and_never_scrolls() {
    let grid = grid_with(
        20,
        GridOptions {
            auto_height: true,
            ..ten_high(Tier::Community)
        },
    );
    grid.virtualization().set_viewport_size(100, 50);

    let window = grid.render_window();
    assert_eq!(window.body_height as u64, window.total_height);
    assert_eq!(window.total_height, 200);
    assert_eq!(window.rows.len(), 20);

    grid.virtualization().scroll_by(0, 30);
    assert!(!grid.virtualization().flush_frame());
    assert_eq!(grid.virtualization().viewport().scroll_top, 0);
    assert_eq!(grid.render_window().scroll_top, 0);
}

#[test]
fn row_edits_that_keep_heights_keep_the_row_layout() {
    let grid = grid_with(
        30,
        GridOptions {
            get_row_height: Some(Rc::new(|params: &RowHeightParams<'_>| {
                match params.row.get("name").and_then(CellValue::as_str) {
                    Some("tall") => RowHeight::Fixed(25),
                    _ => RowHeight::Default,
                }
            })),
            ..ten_high(Tier::Community)
        },
    );
    grid.virtualization().set_viewport_size(100, 100);
    let before = grid.store().select(&ROW_POSITIONS);
    assert_eq!(before.total(), 300);

    grid.rows().update_rows(vec![RowUpdate::Upsert(row([
        ("id", CellValue::from(4i64)),
        ("name", CellValue::from("renamed")),
    ]))]);
    assert_eq!(grid.rows().row(&RowId::Int(4)).unwrap()["name"], CellValue::from("renamed"));
    assert!(Rc::ptr_eq(&before, &grid.store().select(&ROW_POSITIONS)));

    grid.rows().update_rows(vec![RowUpdate::Upsert(row([
        ("id", CellValue::from(4i64)),
        ("name", CellValue::from("tall")),
    ]))]);
    let after = grid.store().select(&ROW_POSITIONS);
    assert!(!Rc::ptr_eq(&before, &after));
    assert_eq!(after.total(), 315);
}

#[test]
fn exported_models_restore_field_for_field() {
    let grid = grid_with(
        40,
        GridOptions {
            pagination: true,
            ..Default::default()
        },
    );
    grid.sorting()
        .set_sort_model(vec![SortItem::desc("name"), SortItem::asc("id")]);
    grid.filtering().set_filter_model(FilterModel {
        items: vec![FilterItem::new("name", FilterOperator::Contains, "1")],
        ..Default::default()
    });
    grid.pagination().set_page_size(25).unwrap();

    let json = grid.export_state().to_json().unwrap();
    let state = GridInitialState::from_json(&json).unwrap();
    let restored = grid_with(40, GridOptions {
        pagination: true,
        ..Default::default()
    });
    restored.restore_state(&state);

    assert_eq!(restored.sorting().sort_model(), grid.sorting().sort_model());
    assert_eq!(restored.filtering().filter_model(), grid.filtering().filter_model());
    assert_eq!(
        restored.pagination().pagination_model(),
        grid.pagination().pagination_model()
    );
    assert_eq!(restored.export_state(), grid.export_state());
}
