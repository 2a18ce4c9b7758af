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
use crate::features::columns::VISIBLE_COLUMNS;
use crate::features::pagination::PAGE_ROWS;
use crate::options::Tier;
use crate::value::RowId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusedCell {
    pub id: RowId,
    pub field: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FocusState {
    pub cell: Option<FocusedCell>,
}

/// A keyboard-style focus move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusMove {
    Up,
    Down,
    Left,
    Right,
    /// Moves by `n` rows.
    PageUp(usize),
    PageDown(usize),
    RowStart,
    RowEnd,
    First,
    Last,
}

#[derive(Clone)]
pub struct FocusModule {
    ctx: GridContext,
}

impl FocusModule {
    pub fn new(ctx: GridContext) -> Self {
        Self { ctx }
    }

    pub fn focused_cell(&self) -> Option<FocusedCell> {
        self.ctx.store.read(|s| s.focus.cell.clone())
    }

    /// Rows focus can reach, top to bottom: pinned top rows, the current page, pinned bottom rows.
    pub fn navigable_rows(&self) -> Vec<RowId> {
        let page = self.ctx.store.select(&PAGE_ROWS);
        self.ctx.store.read(|s| {
            let pinned = if s.options.allows(Tier::Pro) {
                (*s.pinned_rows).clone()
            } else {
                Default::default()
            };
            let exists = |id: &&RowId| s.rows.lookup.contains_key(*id);
            pinned
                .top
                .iter()
                .filter(exists)
                .cloned()
                .chain(page.rows.iter().map(|e| e.id.clone()))
                .chain(pinned.bottom.iter().filter(exists).cloned())
                .collect()
        })
    }

    pub fn set_cell_focus(&self, id: &RowId, field: &str) -> Result<()> {
        let known_row = self
            .ctx
            .store
            .read(|s| s.rows.lookup.contains_key(id) || s.rows.tree.node(id).is_some());
        if !known_row {
            return Err(GridError::RowNotFound(id.clone()));
        }
        if self.ctx.store.select(&VISIBLE_COLUMNS).position(field).is_none() {
            return Err(GridError::ColumnNotFound(field.to_string()));
        }
        self.write(FocusedCell {
            id: id.clone(),
            field: field.to_string(),
        });
        Ok(())
    }

    /// Moves focus, clamping at the edges of the navigable rows and visible columns. Without a
    /// focused cell the first cell takes focus. Returns the newly focused cell.
    pub fn move_focus(&self, movement: FocusMove) -> Option<FocusedCell> {
        let rows = self.navigable_rows();
        let columns = self.ctx.store.select(&VISIBLE_COLUMNS);
        if rows.is_empty() || columns.is_empty() {
            return None;
        }
        let last_row = rows.len() - 1;
        let last_col = columns.len() - 1;
        let (row, col) = match self.focused_cell() {
            Some(cell) => (
                rows.iter().position(|r| *r == cell.id).unwrap_or(0),
                columns.position(&cell.field).unwrap_or(0),
            ),
            None => (0, 0),
        };
        let had_focus = self.focused_cell().is_some();
        let (row, col) = if !had_focus {
            (0, 0)
        } else {
            match movement {
                FocusMove::Up => (row.saturating_sub(1), col),
                FocusMove::Down => ((row + 1).min(last_row), col),
                FocusMove::Left => (row, col.saturating_sub(1)),
                FocusMove::Right => (row, (col + 1).min(last_col)),
                FocusMove::PageUp(n) => (row.saturating_sub(n), col),
                FocusMove::PageDown(n) => (row.saturating_add(n).min(last_row), col),
                FocusMove::RowStart => (row, 0),
                FocusMove::RowEnd => (row, last_col),
                FocusMove::First => (0, 0),
                FocusMove::Last => (last_row, last_col),
            }
        };
        let cell = FocusedCell {
            id: rows[row].clone(),
            field: columns.columns[col].field.clone(),
        };
        self.write(cell.clone());
        Some(cell)
    }

    pub fn clear_focus(&self) {
        if self.focused_cell().is_some() {
            self.ctx.store.update(|s| s.focus = Rc::new(FocusState::default()));
        }
    }

    fn write(&self, cell: FocusedCell) {
        if self.focused_cell().as_ref() == Some(&cell) {
            return;
        }
        self.ctx.store.update(|s| {
            s.focus = Rc::new(FocusState {
                cell: Some(cell.clone()),
            })
        });
        self.ctx.publish(GridEvent::CellFocusChange {
            id: cell.id,
            field: cell.field,
        });
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let set = self.clone();
        let get = self.clone();
        api.register(
            "focus",
            ApiVisibility::Public,
            [
                method("setCellFocus", move |args| {
                    let id: RowId = arg("setCellFocus", args, 0)?;
                    let field: String = arg("setCellFocus", args, 1)?;
                    set.set_cell_focus(&id, &field)?;
                    Ok(Value::Null)
                }),
                method("getCellFocus", move |_| Ok(serde_json::to_value(get.focused_cell())?)),
            ],
        );
    }
}
