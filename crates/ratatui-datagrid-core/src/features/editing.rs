use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use std::time::Instant;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::arg;
use crate::api::method;
use crate::api::opt_arg;
use crate::context::GridContext;
use crate::error::GridError;
use crate::error::Result;
use crate::events::GridEvent;
use crate::events::GridEventName;
use crate::events::Subscription;
use crate::features::rows::RowUpdate;
use crate::features::rows::RowsModule;
use crate::timing::Debouncer;
use crate::value::CellValue;
use crate::value::RowId;

/// The cell currently in edit mode.
#[derive(Clone, Debug, PartialEq)]
pub struct EditCell {
    pub id: RowId,
    pub field: String,
    /// Text as typed; parsed with the column's parser on commit.
    pub input: String,
    pub original: CellValue,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EditingState {
    pub cell: Option<EditCell>,
}

impl EditingState {
    pub fn is_editing(&self, id: &RowId, field: &str) -> bool {
        self.cell
            .as_ref()
            .is_some_and(|c| &c.id == id && c.field == field)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellEditStopReason {
    Enter,
    Escape,
    TabKeyDown,
    ShiftTabKeyDown,
    CellFocusOut,
    Api,
}

impl CellEditStopReason {
    /// Escape discards the edit.
    pub fn ignores_changes(self) -> bool {
        matches!(self, CellEditStopReason::Escape)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CellMode {
    View,
    Edit,
}

#[derive(Clone)]
pub struct EditingModule {
    ctx: GridContext,
    rows: RowsModule,
    pending: Rc<RefCell<Debouncer<String>>>,
}

impl EditingModule {
    pub fn new(ctx: GridContext, rows: RowsModule) -> Self {
        let delay = ctx.options().edit_debounce.unwrap_or(Duration::ZERO);
        Self {
            ctx,
            rows,
            pending: Rc::new(RefCell::new(Debouncer::new(delay))),
        }
    }

    /// Leaves edit mode when the edited row disappears.
    pub fn subscribe(&self) -> Vec<Subscription> {
        [GridEventName::RowsSet, GridEventName::RowsUpdated]
            .into_iter()
            .map(|name| {
                let weak = self.ctx.downgrade();
                let pending = self.pending.clone();
                self.ctx.events.subscribe(name, move |_| {
                    let Some(ctx) = weak.upgrade() else {
                        return;
                    };
                    let orphaned = ctx.store.read(|s| {
                        s.editing
                            .cell
                            .as_ref()
                            .is_some_and(|c| !s.rows.lookup.contains_key(&c.id))
                    });
                    if orphaned {
                        tracing::debug!("edited row removed; leaving edit mode");
                        pending.borrow_mut().cancel();
                        ctx.store.update(|s| s.editing = Rc::new(EditingState::default()));
                    }
                })
            })
            .collect()
    }

    pub fn set_debounce(&self, delay: Option<Duration>) {
        self.pending.borrow_mut().set_delay(delay.unwrap_or(Duration::ZERO));
    }

    pub fn edit_cell(&self) -> Option<EditCell> {
        self.ctx.store.read(|s| s.editing.cell.clone())
    }

    pub fn cell_mode(&self, id: &RowId, field: &str) -> CellMode {
        if self.ctx.store.read(|s| s.editing.is_editing(id, field)) {
            CellMode::Edit
        } else {
            CellMode::View
        }
    }

    /// Editable cells belong to an editable, user-defined column and an existing leaf row, and
    /// pass `is_cell_editable` when set.
    pub fn is_cell_editable(&self, id: &RowId, field: &str) -> bool {
        self.ctx.store.read(|s| {
            let Some(column) = s.columns.column(field) else {
                return false;
            };
            if !column.editable || column.synthetic || !s.rows.lookup.contains_key(id) {
                return false;
            }
            match &s.options.is_cell_editable {
                Some(check) => check(id, field),
                None => true,
            }
        })
    }

    /// Enters edit mode. A cell already being edited is committed first.
    pub fn start_cell_edit(&self, id: &RowId, field: &str) -> Result<()> {
        if !self.is_cell_editable(id, field) {
            return Err(GridError::NotEditable {
                id: id.clone(),
                field: field.to_string(),
            });
        }
        if let Some(current) = self.edit_cell() {
            if current.id == *id && current.field == field {
                return Ok(());
            }
            self.stop_cell_edit(CellEditStopReason::CellFocusOut)?;
        }
        let cell = self.ctx.store.read(|s| {
            let column = s.columns.column(field)?;
            let row = s.rows.lookup.get(id)?;
            let original = column.value(row);
            Some(EditCell {
                id: id.clone(),
                field: field.to_string(),
                input: if original.is_null() {
                    String::new()
                } else {
                    original.to_string()
                },
                original,
            })
        });
        let Some(cell) = cell else {
            return Err(GridError::RowNotFound(id.clone()));
        };
        self.write(Some(cell));
        self.ctx.publish(GridEvent::CellEditStart {
            id: id.clone(),
            field: field.to_string(),
        });
        Ok(())
    }

    /// Records edited text. With an edit debounce configured the text lands once input settles.
    pub fn set_edit_cell_value(&self, input: impl Into<String>, now: Instant) -> Result<()> {
        if self.edit_cell().is_none() {
            return Err(GridError::NotEditing);
        }
        let input = input.into();
        let mut pending = self.pending.borrow_mut();
        if pending.delay().is_zero() {
            drop(pending);
            self.apply_input(input);
        } else {
            pending.push(input, now);
        }
        Ok(())
    }

    /// Applies settled input. Returns whether anything was applied.
    pub fn tick(&self, now: Instant) -> bool {
        let input = self.pending.borrow_mut().poll(now);
        match input {
            Some(input) => {
                self.apply_input(input);
                true
            }
            None => false,
        }
    }

    pub fn has_pending_value(&self) -> bool {
        self.pending.borrow().is_pending()
    }

    fn apply_input(&self, input: String) {
        let Some(mut cell) = self.edit_cell() else {
            return;
        };
        cell.input = input;
        self.write(Some(cell));
    }

    /// Leaves edit mode.
    ///
    /// Unless `reason` discards the edit, the input is parsed and passed through
    /// `process_row_update`. A rejected update keeps the cell in edit mode.
    pub fn stop_cell_edit(&self, reason: CellEditStopReason) -> Result<()> {
        let Some(_) = self.edit_cell() else {
            return Err(GridError::NotEditing);
        };
        if reason.ignores_changes() {
            self.pending.borrow_mut().cancel();
        } else if let Some(input) = self.pending.borrow_mut().flush() {
            self.apply_input(input);
        }
        let Some(cell) = self.edit_cell() else {
            return Err(GridError::NotEditing);
        };

        if !reason.ignores_changes() {
            self.commit(&cell)?;
        }
        self.write(None);
        self.ctx.publish(GridEvent::CellEditStop {
            id: cell.id,
            field: cell.field,
            reason,
        });
        Ok(())
    }

    fn commit(&self, cell: &EditCell) -> Result<()> {
        let column = self
            .ctx
            .store
            .read(|s| s.columns.column(&cell.field).cloned())
            .ok_or_else(|| GridError::ColumnNotFound(cell.field.clone()))?;
        let value = column.parse(&cell.input);
        if value == cell.original {
            return Ok(());
        }
        let old_row = self
            .rows
            .row(&cell.id)
            .ok_or_else(|| GridError::RowNotFound(cell.id.clone()))?;
        let mut new_row = old_row.clone();
        new_row.insert(cell.field.clone(), value);

        let options = self.ctx.options();
        let row = match &options.process_row_update {
            Some(process) => match process(&new_row, &old_row) {
                Ok(row) => row,
                Err(message) => {
                    tracing::warn!(id = %cell.id, %message, "row update rejected");
                    self.ctx.publish(GridEvent::ProcessRowUpdateError {
                        id: cell.id.clone(),
                        message: message.clone(),
                    });
                    return Err(GridError::RowUpdateRejected(message));
                }
            },
            None => new_row,
        };
        self.rows.update_rows(vec![RowUpdate::Upsert(row)]);
        Ok(())
    }

    fn write(&self, cell: Option<EditCell>) {
        self.ctx.store.update(|s| s.editing = Rc::new(EditingState { cell }));
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let start = self.clone();
        let stop = self.clone();
        let value = self.clone();
        let mode = self.clone();
        let editable = self.clone();
        api.register(
            "editing",
            ApiVisibility::Public,
            [
                method("startCellEditMode", move |args| {
                    let id: RowId = arg("startCellEditMode", args, 0)?;
                    let field: String = arg("startCellEditMode", args, 1)?;
                    start.start_cell_edit(&id, &field)?;
                    Ok(Value::Null)
                }),
                method("stopCellEditMode", move |args| {
                    let reason = opt_arg("stopCellEditMode", args, 0)?.unwrap_or(CellEditStopReason::Api);
                    stop.stop_cell_edit(reason)?;
                    Ok(Value::Null)
                }),
                method("setEditCellValue", move |args| {
                    let input: String = arg("setEditCellValue", args, 0)?;
                    value.set_edit_cell_value(input, Instant::now())?;
                    Ok(Value::Null)
                }),
                method("getCellMode", move |args| {
                    let id: RowId = arg("getCellMode", args, 0)?;
                    let field: String = arg("getCellMode", args, 1)?;
                    Ok(serde_json::to_value(mode.cell_mode(&id, &field))?)
                }),
                method("isCellEditable", move |args| {
                    let id: RowId = arg("isCellEditable", args, 0)?;
                    let field: String = arg("isCellEditable", args, 1)?;
                    Ok(Value::Bool(editable.is_cell_editable(&id, &field)))
                }),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDef;
    use crate::column::ColumnType;
    use crate::features::columns::ColumnsModule;
    use crate::options::GridOptions;
    use crate::value::GridRowModel;
    use crate::value::row;

    fn grid(options: GridOptions) -> (GridContext, EditingModule, RowsModule) {
        let ctx = GridContext::new(options);
        ColumnsModule::new(ctx.clone()).set_columns(vec![
            ColumnDef::new("name").editable(true),
            ColumnDef::new("age").with_type(ColumnType::Number).editable(true),
            ColumnDef::new("locked"),
        ]);
        let rows = RowsModule::new(ctx.clone());
        rows.set_rows(vec![row([
            ("id", CellValue::from(1)),
            ("name", "Ada".into()),
            ("age", 36.into()),
        ])]);
        (ctx.clone(), EditingModule::new(ctx, rows.clone()), rows)
    }

    #[test]
    fn commit_parses_and_updates_the_row() {
        let (_, editing, rows) = grid(GridOptions::default());
        let id = RowId::Int(1);
        editing.start_cell_edit(&id, "age").unwrap();
        assert_eq!(editing.edit_cell().unwrap().input, "36");
        editing.set_edit_cell_value("37", Instant::now()).unwrap();
        editing.stop_cell_edit(CellEditStopReason::Enter).unwrap();
        assert_eq!(rows.row(&id).unwrap()["age"], CellValue::Number(37.0));
        assert_eq!(editing.cell_mode(&id, "age"), CellMode::View);
    }

    #[test]
    fn escape_discards_the_edit() {
        let (_, editing, rows) = grid(GridOptions::default());
        let id = RowId::Int(1);
        editing.start_cell_edit(&id, "name").unwrap();
        editing.set_edit_cell_value("Grace", Instant::now()).unwrap();
        editing.stop_cell_edit(CellEditStopReason::Escape).unwrap();
        assert_eq!(rows.row(&id).unwrap()["name"], CellValue::from("Ada"));
    }

    #[test]
    fn non_editable_cells_are_refused() {
        let (_, editing, _) = grid(GridOptions::default());
        assert!(matches!(
            editing.start_cell_edit(&RowId::Int(1), "locked"),
            Err(GridError::NotEditable { .. })
        ));
        assert!(matches!(
            editing.stop_cell_edit(CellEditStopReason::Api),
            Err(GridError::NotEditing)
        ));
    }

    #[test]
    fn rejected_updates_stay_in_edit_mode() {
        let (ctx, editing, rows) = grid(GridOptions {
            process_row_update: Some(Rc::new(|new: &GridRowModel, _old: &GridRowModel| match new.get("age") {
                Some(CellValue::Number(n)) if *n < 0.0 => Err("age must be positive".to_string()),
                _ => Ok(new.clone()),
            })),
            ..Default::default()
        });
        let errors = Rc::new(RefCell::new(0));
        let seen = errors.clone();
        let _sub = ctx
            .events
            .subscribe(GridEventName::ProcessRowUpdateError, move |_| *seen.borrow_mut() += 1);

        let id = RowId::Int(1);
        editing.start_cell_edit(&id, "age").unwrap();
        editing.set_edit_cell_value("-1", Instant::now()).unwrap();
        let err = editing.stop_cell_edit(CellEditStopReason::Enter);
        assert!(matches!(err, Err(GridError::RowUpdateRejected(_))));
        assert_eq!(editing.cell_mode(&id, "age"), CellMode::Edit);
        assert_eq!(*errors.borrow(), 1);
        assert_eq!(rows.row(&id).unwrap()["age"], CellValue::Number(36.0));
    }

    #[test]
    fn debounced_input_lands_after_the_window() {
        let (_, editing, _) = grid(GridOptions {
            edit_debounce: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        let t0 = Instant::now();
        editing.start_cell_edit(&RowId::Int(1), "name").unwrap();
        editing.set_edit_cell_value("G", t0).unwrap();
        editing.set_edit_cell_value("Gr", t0 + Duration::from_millis(100)).unwrap();
        assert!(!editing.tick(t0 + Duration::from_millis(250)));
        assert_eq!(editing.edit_cell().unwrap().input, "Ada");
        assert!(editing.tick(t0 + Duration::from_millis(300)));
        assert_eq!(editing.edit_cell().unwrap().input, "Gr");
    }

    #[test]
    fn removing_the_edited_row_leaves_edit_mode() {
        let (_, editing, rows) = grid(GridOptions::default());
        let _subs = editing.subscribe();
        editing.start_cell_edit(&RowId::Int(1), "name").unwrap();
        rows.update_rows(vec![RowUpdate::Delete(RowId::Int(1))]);
        assert!(editing.edit_cell().is_none());
    }
}
