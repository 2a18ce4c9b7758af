use crossterm::event::DisableBracketedPaste;
use crossterm::event::DisableMouseCapture;
use crossterm::event::EnableBracketedPaste;
use crossterm::event::EnableMouseCapture;
use crossterm::event::Event;
use crossterm::event::KeyCode;
use crossterm::event::KeyEventKind;
use crossterm::terminal::EnterAlternateScreen;
use crossterm::terminal::LeaveAlternateScreen;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::text::Line;
use ratatui::text::Span;
use ratatui::widgets::Block;
use ratatui::widgets::Borders;
use ratatui_datagrid::DataGrid;
use ratatui_datagrid::DataGridAction;
use ratatui_datagrid::DataGridView;
use ratatui_datagrid::crossterm_input::input_event_from_crossterm;
use ratatui_datagrid::slots::DetailPanelSlotProps;
use ratatui_datagrid::theme::Theme;
use ratatui_datagrid::tui_column;
use ratatui_datagrid::tui_options;
use ratatui_datagrid_core::CellValue;
use ratatui_datagrid_core::ColumnType;
use ratatui_datagrid_core::GridRowModel;
use ratatui_datagrid_core::Tier;
use ratatui_datagrid_core::features::export::CsvExportOptions;
use ratatui_datagrid_core::features::pinning::PinnedSide;
use ratatui_datagrid_core::row;
use std::fs::File;
use std::io;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

const CITIES: [&str; 6] = ["Lisbon", "Osaka", "Quito", "Tallinn", "Accra", "Perth"];
const NAMES: [&str; 8] = ["Ana", "Bo", "Chen", "Dara", "Emil", "Farah", "Gus", "Hana"];

fn main() -> io::Result<()> {
    // Logs go to a file so they do not tear the alternate screen.
    if std::env::var_os("RUST_LOG").is_some() {
        let file = File::create("datagrid-demo.log")?;
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    }

    let grid = build_grid();

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableBracketedPaste)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut view = DataGridView::new().with_theme(Theme::default());
    view.slots.detail_panel = view
        .slots
        .detail_panel
        .clone()
        .with_component(|props: &DetailPanelSlotProps| {
            props
                .row
                .iter()
                .map(|(k, v)| Line::from(format!("{k}: {v}")))
                .collect()
        });

    let res = run(&mut terminal, &grid, &mut view);

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;
    res
}

fn build_grid() -> DataGrid {
    let rows: Vec<GridRowModel> = (1..=50_000i64)
        .map(|i| {
            let name = format!("{} {}", NAMES[(i % 8) as usize], i);
            row([
                ("id", CellValue::from(i)),
                ("name", CellValue::from(name)),
                ("city", CellValue::from(CITIES[(i * 7 % 6) as usize])),
                ("age", CellValue::from(18 + i * 13 % 60)),
                ("salary", CellValue::from(30_000.0 + (i * 977 % 90_000) as f64)),
                ("active", CellValue::from(i % 3 != 0)),
            ])
        })
        .collect();
    let columns = vec![
        tui_column("id", 8).with_type(ColumnType::Number),
        tui_column("name", 16).editable(true),
        tui_column("city", 12),
        tui_column("age", 6).with_type(ColumnType::Number).editable(true),
        tui_column("salary", 12)
            .with_type(ColumnType::Number)
            .with_value_formatter(|v| match v.as_f64() {
                Some(n) => format!("{n:.0}"),
                None => v.to_string(),
            }),
        tui_column("active", 8).with_type(ColumnType::Boolean),
    ];
    DataGrid::new(
        columns,
        rows,
        ratatui_datagrid::GridOptions {
            tier: Tier::Premium,
            checkbox_selection: true,
            pagination: true,
            page_size_options: vec![1_000, 5_000],
            ..tui_options()
        },
    )
}

fn run<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    grid: &DataGrid,
    view: &mut DataGridView,
) -> io::Result<()> {
    let _ = grid.pagination().set_page_size(1_000);
    let mut filter: Option<String> = None;
    let mut status = String::from("q quit · / filter · c group by city · p pin name · x export");

    loop {
        grid.tick(Instant::now());
        terminal.draw(|f| {
            let area = f.area();
            let block = Block::default()
                .title("DataGrid (hjkl/←→↑↓, PgUp/PgDn, g/G, s sort, Space select, Enter edit, o expand)")
                .borders(Borders::ALL);
            let inner = block.inner(area);
            f.render_widget(block, area);

            let buf = f.buffer_mut();
            let grid_area = Rect::new(inner.x, inner.y, inner.width, inner.height.saturating_sub(1));
            let status_area = Rect::new(inner.x, inner.y + grid_area.height, inner.width, 1);
            view.render(grid, grid_area, buf);

            let text = match &filter {
                Some(f) => format!("filter: {f}▏"),
                None => status.clone(),
            };
            buf.set_span(
                status_area.x,
                status_area.y,
                &Span::styled(text, view.theme().text_muted),
                status_area.width,
            );
        })?;

        if !crossterm::event::poll(Duration::from_millis(50))? {
            continue;
        }
        let event = crossterm::event::read()?;

        if let Some(text) = filter.as_mut() {
            if let Event::Key(key) = &event {
                if key.kind == KeyEventKind::Release {
                    continue;
                }
                match key.code {
                    KeyCode::Esc | KeyCode::Enter => {}
                    KeyCode::Backspace => {
                        text.pop();
                    }
                    KeyCode::Char(c) => text.push(c),
                    _ => {}
                }
                grid.filtering().set_quick_filter_input(text.clone(), Instant::now());
                if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                    filter = None;
                }
            }
            continue;
        }

        if let Event::Key(key) = &event {
            if key.kind != KeyEventKind::Release && grid.editing().edit_cell().is_none() {
                match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Char('/') => {
                        filter = Some(String::new());
                        continue;
                    }
                    KeyCode::Char('c') => {
                        let grouped = !grid.row_grouping().row_grouping_model().is_empty();
                        let model = if grouped { Vec::new() } else { vec!["city".to_string()] };
                        if let Err(err) = grid.row_grouping().set_row_grouping_model(model) {
                            status = err.to_string();
                        }
                        continue;
                    }
                    KeyCode::Char('p') => {
                        let pinned = grid.pinning().is_column_pinned("name").is_some();
                        let result = if pinned {
                            grid.pinning().unpin_column("name")
                        } else {
                            grid.pinning().pin_column("name", PinnedSide::Left)
                        };
                        if let Err(err) = result {
                            status = err.to_string();
                        }
                        continue;
                    }
                    KeyCode::Char('x') => {
                        status = match grid.export().export_data_as_csv(&CsvExportOptions::default()) {
                            Ok(csv) => format!("exported {} CSV lines", csv.lines().count()),
                            Err(err) => err.to_string(),
                        };
                        continue;
                    }
                    _ => {}
                }
            }
        }

        let Some(input) = input_event_from_crossterm(event) else {
            continue;
        };
        match view.handle_event(grid, input, Instant::now()) {
            DataGridAction::Activated(cell) => {
                status = format!("activated {} / {}", cell.id, cell.field);
            }
            DataGridAction::SelectionChanged => {
                status = format!("{} selected", grid.selection().selected_count());
            }
            DataGridAction::Redraw | DataGridAction::None => {}
        }
    }
}
