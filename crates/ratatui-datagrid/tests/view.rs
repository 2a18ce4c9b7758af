use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::text::Line;
use ratatui_datagrid::DataGrid;
use ratatui_datagrid::DataGridAction;
use ratatui_datagrid::DataGridView;
use ratatui_datagrid::DataGridViewOptions;
use ratatui_datagrid::GridOptions;
use ratatui_datagrid::input::InputEvent;
use ratatui_datagrid::input::KeyCode;
use ratatui_datagrid::input::KeyEvent;
use ratatui_datagrid::input::KeyModifiers;
use ratatui_datagrid::input::MouseEvent;
use ratatui_datagrid::input::MouseEventKind;
use ratatui_datagrid::slots::DetailPanelSlotProps;
use ratatui_datagrid::tui_column;
use ratatui_datagrid::tui_options;
use ratatui_datagrid_core::CellValue;
use ratatui_datagrid_core::ColumnType;
use ratatui_datagrid_core::GridRowModel;
use ratatui_datagrid_core::RowId;
use ratatui_datagrid_core::Tier;
use ratatui_datagrid_core::features::sorting::SortItem;
use ratatui_datagrid_core::row;
use std::time::Instant;

fn people(names: &[&str]) -> Vec<GridRowModel> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            row([
                ("id", CellValue::from(i as i64 + 1)),
                ("name", CellValue::from(*name)),
            ])
        })
        .collect()
}

fn numbered(count: i64) -> Vec<GridRowModel> {
    (1..=count)
        .map(|i| row([("id", CellValue::from(i)), ("name", CellValue::from(format!("row {i}")))]))
        .collect()
}

fn grid(rows: Vec<GridRowModel>, options: GridOptions) -> DataGrid {
    DataGrid::new(
        vec![
            tui_column("id", 4).with_type(ColumnType::Number),
            tui_column("name", 10).editable(true),
        ],
        rows,
        options,
    )
}

fn view() -> DataGridView {
    DataGridView::with_options(DataGridViewOptions {
        show_scrollbar_y: false,
        ..Default::default()
    })
}

/// Renders into a 30x6 buffer: header, four body lines, footer.
fn screen(grid: &DataGrid, view: &mut DataGridView) -> Vec<String> {
    let area = Rect::new(0, 0, 30, 6);
    let mut buf = Buffer::empty(area);
    view.render(grid, area, &mut buf);
    (0..area.height)
        .map(|y| {
            (0..area.width)
                .map(|x| buf[(x, y)].symbol())
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect()
}

fn press(view: &mut DataGridView, grid: &DataGrid, code: KeyCode) -> DataGridAction {
    view.handle_event(grid, InputEvent::Key(KeyEvent::new(code)), Instant::now())
}

fn click(view: &mut DataGridView, grid: &DataGrid, x: u16, y: u16) -> DataGridAction {
    let mouse = MouseEvent {
        x,
        y,
        kind: MouseEventKind::Down,
        modifiers: KeyModifiers::none(),
    };
    view.handle_event(grid, InputEvent::Mouse(mouse), Instant::now())
}

#[test]
fn renders_header_rows_and_footer() {
    let grid = grid(people(&["Ana", "Bo", "Chen"]), tui_options());
    let mut view = view();
    let lines = screen(&grid, &mut view);

    assert_eq!(lines[0], "id  name");
    assert_eq!(lines[1], "  1 Ana");
    assert_eq!(lines[2], "  2 Bo");
    assert_eq!(lines[3], "  3 Chen");
    assert_eq!(lines[4], "");
    assert_eq!(lines[5].trim(), "Total Rows: 3");
}

#[test]
fn header_shows_the_sort_direction() {
    let grid = grid(people(&["Ana", "Bo", "Chen"]), tui_options());
    grid.sorting().set_sort_model(vec![SortItem::desc("name")]);
    let mut view = view();
    let lines = screen(&grid, &mut view);

    assert_eq!(lines[0], "id  name ▼");
    assert_eq!(lines[1], "  3 Chen");
}

#[test]
fn overlays_follow_the_row_state() {
    let grid = grid(Vec::new(), tui_options());
    let mut view = view();
    assert_eq!(screen(&grid, &mut view)[2].trim(), "No rows");

    grid.rows().set_loading(true);
    assert_eq!(screen(&grid, &mut view)[2].trim(), "Loading...");
}

#[test]
fn keys_move_focus_sort_and_select() {
    let grid = grid(people(&["Chen", "Ana", "Bo"]), tui_options());
    let mut view = view();
    screen(&grid, &mut view);

    assert_eq!(press(&mut view, &grid, KeyCode::Down), DataGridAction::Redraw);
    assert_eq!(press(&mut view, &grid, KeyCode::Down), DataGridAction::Redraw);
    assert_eq!(press(&mut view, &grid, KeyCode::Right), DataGridAction::Redraw);
    let focused = grid.focus().focused_cell().unwrap();
    assert_eq!((focused.id, focused.field.as_str()), (RowId::Int(2), "name"));

    press(&mut view, &grid, KeyCode::Char('s'));
    assert_eq!(grid.sorting().sort_model(), vec![SortItem::asc("name")]);

    assert_eq!(
        press(&mut view, &grid, KeyCode::Char(' ')),
        DataGridAction::SelectionChanged
    );
    assert_eq!(grid.selection().selected_ids(), vec![RowId::Int(2)]);

    let lines = screen(&grid, &mut view);
    assert_eq!(lines[1], "  2 Ana");
    assert!(lines[5].contains("1 row selected"), "{lines:?}");
}

#[test]
fn jumping_to_the_last_row_scrolls_it_into_view() {
    let grid = grid(numbered(100), tui_options());
    let mut view = view();
    screen(&grid, &mut view);

    press(&mut view, &grid, KeyCode::Char('G'));
    let lines = screen(&grid, &mut view);
    assert!(lines[1].ends_with("row 97"), "{lines:?}");
    assert!(lines[4].ends_with("row 100"), "{lines:?}");
}

#[test]
fn mouse_wheel_scrolls_the_body() {
    let grid = grid(numbered(100), tui_options());
    let mut view = view();
    screen(&grid, &mut view);

    let wheel = MouseEvent {
        x: 2,
        y: 2,
        kind: MouseEventKind::ScrollDown,
        modifiers: KeyModifiers::none(),
    };
    view.handle_event(&grid, InputEvent::Mouse(wheel), Instant::now());
    let lines = screen(&grid, &mut view);
    assert_eq!(lines[1], "  4 row 4");
}

#[test]
fn editing_commits_on_enter_and_discards_on_escape() {
    let grid = grid(people(&["Ana", "Bo"]), tui_options());
    let mut view = view();
    screen(&grid, &mut view);
    grid.focus().set_cell_focus(&RowId::Int(1), "name").unwrap();

    press(&mut view, &grid, KeyCode::Enter);
    assert!(grid.editing().edit_cell().is_some());
    press(&mut view, &grid, KeyCode::Char('x'));
    assert_eq!(screen(&grid, &mut view)[1], "  1 Anax▏");

    press(&mut view, &grid, KeyCode::Enter);
    assert!(grid.editing().edit_cell().is_none());
    let name = grid.rows().row(&RowId::Int(1)).unwrap()["name"].clone();
    assert_eq!(name, CellValue::from("Anax"));
    assert_eq!(grid.focus().focused_cell().unwrap().id, RowId::Int(2));

    press(&mut view, &grid, KeyCode::Enter);
    press(&mut view, &grid, KeyCode::Backspace);
    press(&mut view, &grid, KeyCode::Esc);
    let name = grid.rows().row(&RowId::Int(2)).unwrap()["name"].clone();
    assert_eq!(name, CellValue::from("Bo"));
}

#[test]
fn clicking_the_checkbox_toggles_the_row() {
    let grid = grid(
        people(&["Ana", "Bo"]),
        GridOptions {
            checkbox_selection: true,
            ..tui_options()
        },
    );
    let mut view = view();
    let lines = screen(&grid, &mut view);
    assert!(lines[2].starts_with("[ ]"), "{lines:?}");

    assert_eq!(click(&mut view, &grid, 1, 2), DataGridAction::SelectionChanged);
    assert_eq!(grid.selection().selected_ids(), vec![RowId::Int(2)]);
    let lines = screen(&grid, &mut view);
    assert!(lines[2].starts_with("[x]"), "{lines:?}");
    assert!(lines[0].starts_with("[x]"), "{lines:?}");
}

#[test]
fn clicking_a_header_sorts_by_that_column() {
    let grid = grid(people(&["Bo", "Ana"]), tui_options());
    let mut view = view();
    screen(&grid, &mut view);

    click(&mut view, &grid, 5, 0);
    assert_eq!(grid.sorting().sort_model(), vec![SortItem::asc("name")]);
    assert_eq!(screen(&grid, &mut view)[1], "  2 Ana");
}

#[test]
fn group_rows_expand_from_the_keyboard() {
    let rows = vec![
        row([("id", CellValue::from(1)), ("name", CellValue::from("Ana")), ("city", CellValue::from("Oslo"))]),
        row([("id", CellValue::from(2)), ("name", CellValue::from("Bo")), ("city", CellValue::from("Oslo"))]),
        row([("id", CellValue::from(3)), ("name", CellValue::from("Chen")), ("city", CellValue::from("Rome"))]),
    ];
    let grid = DataGrid::new(
        vec![tui_column("name", 8), tui_column("city", 8)],
        rows,
        GridOptions {
            tier: Tier::Premium,
            ..tui_options()
        },
    );
    grid.row_grouping()
        .set_row_grouping_model(vec!["city".to_string()])
        .unwrap();
    let mut view = view();
    let lines = screen(&grid, &mut view);
    assert!(lines[1].starts_with("▸ Oslo (2)"), "{lines:?}");
    assert!(lines[2].starts_with("▸ Rome (1)"), "{lines:?}");

    press(&mut view, &grid, KeyCode::Down);
    assert_eq!(press(&mut view, &grid, KeyCode::Char('o')), DataGridAction::Redraw);
    let lines = screen(&grid, &mut view);
    assert!(lines[1].starts_with("▾ Oslo (2)"), "{lines:?}");
    assert!(lines[2].contains("Ana"), "{lines:?}");
    assert!(lines[4].starts_with("▸ Rome (1)"), "{lines:?}");
}

#[test]
fn detail_panels_are_measured_and_drawn_below_their_row() {
    let grid = grid(
        people(&["Ana", "Bo"]),
        GridOptions {
            tier: Tier::Pro,
            ..tui_options()
        },
    );
    let mut view = view();
    view.slots.detail_panel = view
        .slots
        .detail_panel
        .clone()
        .with_component(|props: &DetailPanelSlotProps| {
            vec![
                Line::from(format!("detail for {}", props.id)),
                Line::from("second line"),
            ]
        });
    screen(&grid, &mut view);

    press(&mut view, &grid, KeyCode::Down);
    press(&mut view, &grid, KeyCode::Char('o'));
    let lines = screen(&grid, &mut view);
    assert_eq!(lines[1], "  1 Ana");
    assert_eq!(lines[2], "  detail for 1");
    assert_eq!(lines[3], "  second line");
    assert_eq!(lines[4], "  2 Bo");
    assert_eq!(grid.detail_panel().panel_height(&RowId::Int(1)), 2);
}
