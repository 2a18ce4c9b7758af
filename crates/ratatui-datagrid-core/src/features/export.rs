//! Output-only serializations of the filtered, sorted rows.
//!
//! Every format exports leaf rows in display order (groups are flattened), restricted to the
//! selected rows when any are selected. Columns default to the visible user columns.

use comfy_table::ContentArrangement;
use comfy_table::Table;
use comfy_table::presets::ASCII_FULL;
use quick_xml::Writer;
use quick_xml::events::BytesDecl;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::api::ApiRegistry;
use crate::api::ApiVisibility;
use crate::api::method;
use crate::api::opt_arg;
use crate::column::ColumnDef;
use crate::column::ColumnType;
use crate::context::GridContext;
use crate::error::GridError;
use crate::error::Result;
use crate::features::columns::VISIBLE_COLUMNS;
use crate::features::filtering::FILTERED_SORTED_LEAF_IDS;
use crate::features::require_tier;
use crate::locale::keys;
use crate::options::Tier;
use crate::pipe::PipeProcessorHandle;
use crate::pipe::PipeStage;
use crate::store::GridState;
use crate::value::CellValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportFormat {
    Csv,
    Print,
    Excel,
}

/// One entry of the toolbar export menu.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportMenuItem {
    /// Sort key of the entry; entries with equal names sort by label.
    pub component_name: String,
    pub label: String,
    pub format: ExportFormat,
}

pub const EXPORT_MENU: PipeStage<Vec<ExportMenuItem>, GridState> = PipeStage::new("exportMenu");

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CsvExportOptions {
    pub delimiter: char,
    pub include_headers: bool,
    /// Exported fields, in order. Defaults to the visible columns.
    pub fields: Option<Vec<String>>,
    /// Export hidden columns too.
    pub all_columns: bool,
    pub utf8_with_bom: bool,
}

impl Default for CsvExportOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            include_headers: true,
            fields: None,
            all_columns: false,
            utf8_with_bom: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrintExportOptions {
    pub fields: Option<Vec<String>>,
    pub all_columns: bool,
    pub include_headers: bool,
    /// Printed above the table.
    pub title: Option<String>,
}

impl Default for PrintExportOptions {
    fn default() -> Self {
        Self {
            fields: None,
            all_columns: false,
            include_headers: true,
            title: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExcelExportOptions {
    pub fields: Option<Vec<String>>,
    pub all_columns: bool,
    pub include_headers: bool,
    pub sheet_name: String,
}

impl Default for ExcelExportOptions {
    fn default() -> Self {
        Self {
            fields: None,
            all_columns: false,
            include_headers: true,
            sheet_name: "Sheet1".to_string(),
        }
    }
}

struct ExportTable {
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<CellValue>>,
}

impl ExportTable {
    fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header_label().to_string()).collect()
    }

    fn formatted_rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.rows.iter().map(|cells| {
            self.columns
                .iter()
                .zip(cells)
                .map(|(column, value)| column.format(value))
                .collect()
        })
    }
}

fn menu_item(component_name: &str, label: String, format: ExportFormat) -> ExportMenuItem {
    ExportMenuItem {
        component_name: component_name.to_string(),
        label,
        format,
    }
}

fn csv_item(mut items: Vec<ExportMenuItem>, state: &GridState) -> Vec<ExportMenuItem> {
    let label = state.options.locale_text.resolve(keys::TOOLBAR_EXPORT_CSV, &[]);
    items.push(menu_item("csvExport", label, ExportFormat::Csv));
    items
}

fn print_item(mut items: Vec<ExportMenuItem>, state: &GridState) -> Vec<ExportMenuItem> {
    let label = state.options.locale_text.resolve(keys::TOOLBAR_EXPORT_PRINT, &[]);
    items.push(menu_item("printExport", label, ExportFormat::Print));
    items
}

fn excel_item(mut items: Vec<ExportMenuItem>, state: &GridState) -> Vec<ExportMenuItem> {
    if state.options.allows(Tier::Premium) {
        let label = state.options.locale_text.resolve(keys::TOOLBAR_EXPORT_EXCEL, &[]);
        items.push(menu_item("excelExport", label, ExportFormat::Excel));
    }
    items
}

fn xml_error(err: std::io::Error) -> GridError {
    GridError::Export(err.to_string())
}

#[derive(Clone)]
pub struct ExportModule {
    ctx: GridContext,
}

impl ExportModule {
    pub fn new(ctx: GridContext) -> Self {
        Self { ctx }
    }

    pub fn register_pipes(&self) -> Vec<PipeProcessorHandle> {
        vec![
            self.ctx.pipes.register(EXPORT_MENU, "exportMenu.print", print_item),
            self.ctx.pipes.register(EXPORT_MENU, "exportMenu.csv", csv_item),
            self.ctx.pipes.register(EXPORT_MENU, "exportMenu.excel", excel_item),
        ]
    }

    /// Export menu entries ordered by component name.
    pub fn export_menu(&self) -> Vec<ExportMenuItem> {
        let state = self.ctx.store.state();
        let mut items = self.ctx.pipes.apply(EXPORT_MENU, Vec::new(), &state);
        items.sort_by(|a, b| {
            a.component_name
                .cmp(&b.component_name)
                .then_with(|| a.label.cmp(&b.label))
        });
        items
    }

    fn table(&self, fields: Option<&[String]>, all_columns: bool) -> Result<ExportTable> {
        let leaf_ids = self.ctx.store.select(&FILTERED_SORTED_LEAF_IDS);
        let visible = self.ctx.store.select(&VISIBLE_COLUMNS);
        self.ctx.store.read(|s| -> Result<ExportTable> {
            let columns: Vec<ColumnDef> = match fields {
                Some(fields) => fields
                    .iter()
                    .map(|f| {
                        s.columns
                            .column(f)
                            .cloned()
                            .ok_or_else(|| GridError::ColumnNotFound(f.clone()))
                    })
                    .collect::<Result<_>>()?,
                None if all_columns => s.columns.ordered().cloned().collect(),
                None => visible.columns.clone(),
            };
            let columns: Vec<ColumnDef> = columns
                .into_iter()
                .filter(|c| !c.synthetic && c.column_type != ColumnType::Actions)
                .collect();

            let selected = &s.selection.selected;
            let rows = leaf_ids
                .iter()
                .filter(|id| selected.is_empty() || selected.contains(*id))
                .filter_map(|id| s.rows.lookup.get(id))
                .map(|row| columns.iter().map(|c| c.value(row)).collect())
                .collect();
            Ok(ExportTable { columns, rows })
        })
    }

    pub fn export_data_as_csv(&self, options: &CsvExportOptions) -> Result<String> {
        if !options.delimiter.is_ascii() {
            return Err(GridError::InvalidArguments {
                method: "exportDataAsCsv".to_string(),
                reason: format!("delimiter `{}` is not ASCII", options.delimiter),
            });
        }
        let table = self.table(options.fields.as_deref(), options.all_columns)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter as u8)
            .from_writer(Vec::new());
        if options.include_headers {
            writer.write_record(table.headers())?;
        }
        for record in table.formatted_rows() {
            writer.write_record(&record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| GridError::Export(e.to_string()))?;
        let text = String::from_utf8(bytes).map_err(|e| GridError::Export(e.to_string()))?;
        tracing::debug!(rows = table.rows.len(), columns = table.columns.len(), "exported csv");
        Ok(if options.utf8_with_bom {
            format!("\u{feff}{text}")
        } else {
            text
        })
    }

    /// A plain-text table ready to print.
    pub fn export_data_as_print(&self, options: &PrintExportOptions) -> Result<String> {
        let export = self.table(options.fields.as_deref(), options.all_columns)?;
        let mut table = Table::new();
        table
            .load_preset(ASCII_FULL)
            .set_content_arrangement(ContentArrangement::Disabled);
        if options.include_headers {
            table.set_header(export.headers());
        }
        for row in export.formatted_rows() {
            table.add_row(row);
        }
        Ok(match &options.title {
            Some(title) => format!("{title}\n{table}"),
            None => table.to_string(),
        })
    }

    /// A SpreadsheetML 2003 workbook with one worksheet (Premium).
    pub fn export_data_as_excel(&self, options: &ExcelExportOptions) -> Result<String> {
        require_tier(&self.ctx.options(), "excel export", Tier::Premium)?;
        let export = self.table(options.fields.as_deref(), options.all_columns)?;
        let mut xml = Writer::new_with_indent(Vec::new(), b' ', 2);
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;

        let mut workbook = BytesStart::new("Workbook");
        workbook.push_attribute(("xmlns", "urn:schemas-microsoft-com:office:spreadsheet"));
        workbook.push_attribute(("xmlns:ss", "urn:schemas-microsoft-com:office:spreadsheet"));
        xml.write_event(Event::Start(workbook)).map_err(xml_error)?;
        let mut sheet = BytesStart::new("Worksheet");
        sheet.push_attribute(("ss:Name", options.sheet_name.as_str()));
        xml.write_event(Event::Start(sheet)).map_err(xml_error)?;
        xml.write_event(Event::Start(BytesStart::new("Table")))
            .map_err(xml_error)?;

        if options.include_headers {
            write_row(&mut xml, export.headers().into_iter().map(|h| ("String", h)))?;
        }
        for cells in &export.rows {
            write_row(
                &mut xml,
                export.columns.iter().zip(cells).map(|(column, value)| match value {
                    // Number cells must hold a finite value; NaN and infinities fall back to text.
                    CellValue::Number(n) if column.value_formatter.is_none() && n.is_finite() => {
                        ("Number", n.to_string())
                    }
                    CellValue::Bool(b) if column.value_formatter.is_none() => {
                        ("Boolean", if *b { "1" } else { "0" }.to_string())
                    }
                    other => ("String", column.format(other)),
                }),
            )?;
        }

        xml.write_event(Event::End(BytesEnd::new("Table")))
            .map_err(xml_error)?;
        xml.write_event(Event::End(BytesEnd::new("Worksheet")))
            .map_err(xml_error)?;
        xml.write_event(Event::End(BytesEnd::new("Workbook")))
            .map_err(xml_error)?;
        String::from_utf8(xml.into_inner()).map_err(|e| GridError::Export(e.to_string()))
    }

    pub fn register_api(&self, api: &ApiRegistry) {
        let csv = self.clone();
        let print = self.clone();
        let excel = self.clone();
        api.register(
            "export",
            ApiVisibility::Public,
            [
                method("exportDataAsCsv", move |args| {
                    let options = opt_arg("exportDataAsCsv", args, 0)?.unwrap_or_default();
                    Ok(Value::String(csv.export_data_as_csv(&options)?))
                }),
                method("exportDataAsPrint", move |args| {
                    let options = opt_arg("exportDataAsPrint", args, 0)?.unwrap_or_default();
                    Ok(Value::String(print.export_data_as_print(&options)?))
                }),
                method("exportDataAsExcel", move |args| {
                    let options = opt_arg("exportDataAsExcel", args, 0)?.unwrap_or_default();
                    Ok(Value::String(excel.export_data_as_excel(&options)?))
                }),
            ],
        );
    }
}

fn write_row(
    xml: &mut Writer<Vec<u8>>,
    cells: impl Iterator<Item = (&'static str, String)>,
) -> Result<()> {
    xml.write_event(Event::Start(BytesStart::new("Row")))
        .map_err(xml_error)?;
    for (kind, text) in cells {
        xml.write_event(Event::Start(BytesStart::new("Cell")))
            .map_err(xml_error)?;
        let mut data = BytesStart::new("Data");
        data.push_attribute(("ss:Type", kind));
        xml.write_event(Event::Start(data)).map_err(xml_error)?;
        xml.write_event(Event::Text(BytesText::new(&text)))
            .map_err(xml_error)?;
        xml.write_event(Event::End(BytesEnd::new("Data")))
            .map_err(xml_error)?;
        xml.write_event(Event::End(BytesEnd::new("Cell")))
            .map_err(xml_error)?;
    }
    xml.write_event(Event::End(BytesEnd::new("Row")))
        .map_err(xml_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::columns::ColumnsModule;
    use crate::features::filtering::FilterItem;
    use crate::features::filtering::FilterModel;
    use crate::features::filtering::FilterOperator;
    use crate::features::filtering::FilteringModule;
    use crate::features::rows::RowUpdate;
    use crate::features::rows::RowsModule;
    use crate::features::selection::SelectionModule;
    use crate::features::sorting::SortItem;
    use crate::features::sorting::SortingModule;
    use crate::options::GridOptions;
    use crate::value::RowId;
    use crate::value::row;

    fn grid(tier: Tier) -> (GridContext, ExportModule, Vec<PipeProcessorHandle>) {
        let ctx = GridContext::new(GridOptions {
            tier,
            checkbox_selection: true,
            ..Default::default()
        });
        let mut pipes = SelectionModule::new(ctx.clone()).register_pipes();
        ColumnsModule::new(ctx.clone()).set_columns(vec![
            ColumnDef::new("name").with_header("Name"),
            ColumnDef::new("age").with_type(ColumnType::Number),
        ]);
        RowsModule::new(ctx.clone()).set_rows(vec![
            row([("id", CellValue::from(1)), ("name", "Ada, Countess".into()), ("age", 36.into())]),
            row([("id", CellValue::from(2)), ("name", "Grace".into()), ("age", 85.into())]),
            row([("id", CellValue::from(3)), ("name", "Linus".into()), ("age", 20.into())]),
        ]);
        let export = ExportModule::new(ctx.clone());
        pipes.extend(export.register_pipes());
        (ctx, export, pipes)
    }

    #[test]
    fn csv_follows_filter_and_sort_and_skips_synthetic_columns() {
        let (ctx, export, _pipes) = grid(Tier::Community);
        SortingModule::new(ctx.clone()).set_sort_model(vec![SortItem::desc("age")]);
        FilteringModule::new(ctx).set_filter_model(FilterModel {
            items: vec![FilterItem::new("age", FilterOperator::Gt, 25)],
            ..Default::default()
        });
        let csv = export.export_data_as_csv(&CsvExportOptions::default()).unwrap();
        assert_eq!(csv, "Name,age\nGrace,85\n\"Ada, Countess\",36\n");
    }

    #[test]
    fn selected_rows_restrict_the_export() {
        let (ctx, export, _pipes) = grid(Tier::Community);
        SelectionModule::new(ctx).select_rows(&[RowId::Int(3)], true, true);
        let csv = export
            .export_data_as_csv(&CsvExportOptions {
                delimiter: ';',
                include_headers: false,
                utf8_with_bom: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(csv, "\u{feff}Linus;20\n");
    }

    #[test]
    fn unknown_export_fields_fail() {
        let (_, export, _pipes) = grid(Tier::Community);
        let options = CsvExportOptions {
            fields: Some(vec!["missing".into()]),
            ..Default::default()
        };
        assert!(matches!(
            export.export_data_as_csv(&options),
            Err(GridError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn print_renders_an_ascii_table() {
        let (_, export, _pipes) = grid(Tier::Community);
        let text = export
            .export_data_as_print(&PrintExportOptions {
                title: Some("People".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(text.starts_with("People\n+"));
        assert!(text.contains("| Grace"));
    }

    #[test]
    fn excel_is_premium_and_types_numbers() {
        let (_, community, _pipes) = grid(Tier::Community);
        assert!(matches!(
            community.export_data_as_excel(&ExcelExportOptions::default()),
            Err(GridError::FeatureUnavailable { .. })
        ));
        let (_, export, _pipes) = grid(Tier::Premium);
        let xml = export.export_data_as_excel(&ExcelExportOptions::default()).unwrap();
        assert!(xml.contains(r#"<Worksheet ss:Name="Sheet1">"#));
        assert!(xml.contains(r#"<Data ss:Type="Number">85</Data>"#));
        assert!(xml.contains("Ada, Countess"));
    }

    #[test]
    fn excel_writes_non_finite_numbers_as_text() {
        let (ctx, export, _pipes) = grid(Tier::Premium);
        RowsModule::new(ctx).update_rows(vec![
            RowUpdate::Upsert(row([
                ("id", CellValue::from(4)),
                ("name", "Unknown".into()),
                ("age", f64::NAN.into()),
            ])),
            RowUpdate::Upsert(row([
                ("id", CellValue::from(5)),
                ("name", "Ageless".into()),
                ("age", f64::INFINITY.into()),
            ])),
        ]);
        let xml = export.export_data_as_excel(&ExcelExportOptions::default()).unwrap();
        assert_eq!(xml.matches(r#"<Data ss:Type="Number">"#).count(), 3);
        assert!(!xml.contains(r#"<Data ss:Type="Number">NaN"#));
        assert!(!xml.contains(r#"<Data ss:Type="Number">inf"#));
        assert!(xml.contains("Ageless"));
    }

    #[test]
    fn menu_is_sorted_by_component_name() {
        let (_, export, _pipes) = grid(Tier::Premium);
        let names: Vec<String> = export.export_menu().into_iter().map(|i| i.component_name).collect();
        assert_eq!(names, vec!["csvExport", "excelExport", "printExport"]);
        let (_, community, _pipes) = grid(Tier::Community);
        assert_eq!(community.export_menu().len(), 2);
    }
}
