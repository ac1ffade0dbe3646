//! Record persistence
//!
//! Per-category and merged record sets are written as UTF-8 CSV (with BOM)
//! and optionally as an .xlsx workbook. Columns are the union of record
//! columns in first-seen order.

#![allow(clippy::uninlined_format_args)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook, XlsxError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::category::CategoryDescriptor;
use crate::domain::product::{Cell, Column, ProductRecord};
use crate::infrastructure::config::OutputSettings;
use crate::infrastructure::sites::SiteProfile;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const SHEET_NAME: &str = "products";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet encoding failed: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("Report encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Records flattened into a header and rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTable {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

impl RecordTable {
    pub fn from_records(records: &[ProductRecord]) -> Self {
        let mut columns: Vec<Column> = Vec::new();
        for record in records {
            for column in record.columns() {
                if !columns.contains(&column) {
                    columns.push(column);
                }
            }
        }
        let rows = records
            .iter()
            .map(|record| columns.iter().map(|&c| record.cell(c)).collect())
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Header text per column key; unlabelled columns fall back to the key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderLabels(BTreeMap<String, String>);

impl HeaderLabels {
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        Self(labels)
    }

    pub fn label(&self, key: &str) -> String {
        self.0.get(key).cloned().unwrap_or_else(|| key.to_string())
    }

    fn header(&self, columns: &[Column]) -> Vec<String> {
        columns.iter().map(|c| self.label(c.key())).collect()
    }
}

/// CSV bytes of `table`, BOM first
pub fn encode_csv(table: &RecordTable, labels: &HeaderLabels) -> ExportResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    writer.write_record(labels.header(table.columns()))?;
    for row in table.rows() {
        writer.write_record(row.iter().map(Cell::render))?;
    }
    writer.into_inner().map_err(|e| ExportError::Csv(e.into_error().into()))
}

/// Plain string rows as CSV bytes, BOM first
fn encode_plain_csv(header: &[String], rows: &[Vec<String>]) -> ExportResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.into_inner().map_err(|e| ExportError::Csv(e.into_error().into()))
}

fn cell_position(row: usize, col: usize) -> (u32, u16) {
    (
        u32::try_from(row).unwrap_or(u32::MAX),
        u16::try_from(col).unwrap_or(u16::MAX),
    )
}

/// .xlsx bytes of `table`; the creation date is pinned so equal input gives equal bytes
pub fn encode_xlsx(table: &RecordTable, labels: &HeaderLabels) -> ExportResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let properties = DocProperties::new().set_creation_datetime(&ExcelDateTime::from_ymd(2000, 1, 1)?);
    workbook.set_properties(&properties);

    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (index, label) in labels.header(table.columns()).iter().enumerate() {
        let (row, col) = cell_position(0, index);
        sheet.write_string_with_format(row, col, label, &bold)?;
    }
    for (r, cells) in table.rows().iter().enumerate() {
        for (c, cell) in cells.iter().enumerate() {
            let (row, col) = cell_position(r + 1, c);
            match cell {
                Cell::Text(text) => {
                    sheet.write_string(row, col, text)?;
                }
                #[allow(clippy::cast_precision_loss)]
                Cell::Count(n) => {
                    sheet.write_number(row, col, *n as f64)?;
                }
                Cell::Flag(b) => {
                    sheet.write_boolean(row, col, *b)?;
                }
                Cell::Empty => {}
            }
        }
    }
    sheet.set_freeze_panes(1, 0)?;
    sheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

/// `stem` plus `.ext`, keeping any dots already in the stem
fn with_suffix(stem: &Path, ext: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn write_file(path: &Path, bytes: &[u8]) -> ExportResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| ExportError::io(path, e))?;
    debug!("💾 Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Writes one site's output files under a single directory
#[derive(Debug, Clone)]
pub struct Exporter {
    dir: PathBuf,
    category_dir: PathBuf,
    prefix: String,
    labels: HeaderLabels,
    spreadsheet: bool,
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        let dir = dir.into();
        Self {
            category_dir: dir.join(crate::infrastructure::config::defaults::CATEGORY_DIR),
            dir,
            prefix: prefix.into(),
            labels: HeaderLabels::default(),
            spreadsheet: true,
        }
    }

    pub fn from_settings(settings: &OutputSettings, site: &SiteProfile) -> Self {
        let labels = if settings.use_site_labels {
            HeaderLabels::new(site.column_labels.clone())
        } else {
            HeaderLabels::default()
        };
        Self {
            dir: settings.dir.clone(),
            category_dir: settings.dir.join(&settings.category_dir),
            prefix: site.name.clone(),
            labels,
            spreadsheet: settings.spreadsheet,
        }
    }

    #[must_use]
    pub fn with_labels(mut self, labels: HeaderLabels) -> Self {
        self.labels = labels;
        self
    }

    #[must_use]
    pub fn with_spreadsheet(mut self, spreadsheet: bool) -> Self {
        self.spreadsheet = spreadsheet;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn merged_stem(&self) -> PathBuf {
        self.dir.join(format!("{}_products_data", self.prefix))
    }

    pub fn partial_path(&self) -> PathBuf {
        self.dir.join(format!("{}_products_partial.csv", self.prefix))
    }

    pub fn categories_path(&self) -> PathBuf {
        self.dir.join(format!("{}_categories.csv", self.prefix))
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(format!("{}_run_report.json", self.prefix))
    }

    pub fn category_stem(&self, category: &CategoryDescriptor) -> PathBuf {
        self.category_dir.join(category.file_stem())
    }

    /// CSV (and .xlsx) for `records` at `stem`; nothing is written for an empty set
    fn write_table(&self, stem: &Path, records: &[ProductRecord]) -> ExportResult<Vec<PathBuf>> {
        let table = RecordTable::from_records(records);
        if table.is_empty() {
            return Ok(Vec::new());
        }

        let mut written = Vec::new();
        let csv_path = with_suffix(stem, "csv");
        write_file(&csv_path, &encode_csv(&table, &self.labels)?)?;
        written.push(csv_path);

        if self.spreadsheet {
            let xlsx_path = with_suffix(stem, "xlsx");
            write_file(&xlsx_path, &encode_xlsx(&table, &self.labels)?)?;
            written.push(xlsx_path);
        }
        Ok(written)
    }

    pub fn write_category(
        &self,
        category: &CategoryDescriptor,
        records: &[ProductRecord],
    ) -> ExportResult<Vec<PathBuf>> {
        let written = self.write_table(&self.category_stem(category), records)?;
        if !written.is_empty() {
            info!("💾 [{}] saved {} records", category.full_name(), records.len());
        }
        Ok(written)
    }

    pub fn write_merged(&self, records: &[ProductRecord]) -> ExportResult<Vec<PathBuf>> {
        let written = self.write_table(&self.merged_stem(), records)?;
        if !written.is_empty() {
            info!("💾 Saved {} merged records to {}", records.len(), self.dir.display());
        }
        Ok(written)
    }

    /// Running snapshot of everything gathered so far, CSV only
    pub fn write_partial(&self, records: &[ProductRecord]) -> ExportResult<Option<PathBuf>> {
        let table = RecordTable::from_records(records);
        if table.is_empty() {
            return Ok(None);
        }
        let path = self.partial_path();
        write_file(&path, &encode_csv(&table, &self.labels)?)?;
        Ok(Some(path))
    }

    /// Category list: split name columns plus the listing URL
    pub fn write_categories(&self, categories: &[CategoryDescriptor]) -> ExportResult<PathBuf> {
        let mut header: Vec<String> = [Column::CategoryMain, Column::CategorySub, Column::CategoryFull]
            .iter()
            .map(|c| self.labels.label(c.key()))
            .collect();
        header.push("url".to_string());

        let rows: Vec<Vec<String>> = categories
            .iter()
            .map(|c| vec![c.main().to_string(), c.sub(), c.full_name(), c.url.clone()])
            .collect();

        let path = self.categories_path();
        write_file(&path, &encode_plain_csv(&header, &rows)?)?;
        Ok(path)
    }

    pub fn write_report<T: Serialize>(&self, report: &T) -> ExportResult<PathBuf> {
        let path = self.report_path();
        write_file(&path, &serde_json::to_vec_pretty(report)?)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{Field, FieldValue};

    fn record(name: &str, url: &str, price: Option<&str>) -> ProductRecord {
        let mut r = ProductRecord::with_fields([Field::ProductName, Field::ProductUrl, Field::SalePrice]);
        r.set(Field::ProductName, FieldValue::Text(name.into()));
        r.set(Field::ProductUrl, FieldValue::Text(url.into()));
        if let Some(p) = price {
            r.set(Field::SalePrice, FieldValue::Text(p.into()));
        }
        r
    }

    fn category() -> CategoryDescriptor {
        CategoryDescriptor::new(["OUTER", "코트/자켓"], "https://shop.test/list?cate=1").unwrap()
    }

    #[test]
    fn test_columns_are_union_in_first_seen_order() {
        let mut first = record("a", "https://x/1", None);
        first.tag_category(category().tag());
        let mut second = ProductRecord::with_fields([Field::ProductName, Field::ReviewCount]);
        second.set(Field::ProductName, FieldValue::Text("b".into()));
        second.set(Field::ReviewCount, FieldValue::Count(3));

        let table = RecordTable::from_records(&[first, second]);
        let keys: Vec<&str> = table.columns().iter().map(|c| c.key()).collect();
        assert_eq!(
            keys,
            vec![
                "product_name",
                "product_url",
                "sale_price",
                "category_main",
                "category_sub",
                "category_full",
                "review_count"
            ]
        );
        assert_eq!(table.rows()[1][1], Cell::Text(String::new()));
        assert_eq!(table.rows()[1][3], Cell::Empty);
        assert_eq!(table.rows()[1][6], Cell::Count(3));
    }

    #[test]
    fn test_csv_has_bom_header_and_rows() {
        let table = RecordTable::from_records(&[record("코트, 블랙", "https://x/1", Some("15000"))]);
        let bytes = encode_csv(&table, &HeaderLabels::default()).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(text, "product_name,product_url,sale_price\n\"코트, 블랙\",https://x/1,15000\n");
    }

    #[test]
    fn test_csv_is_byte_stable() {
        let records = vec![record("a", "https://x/1", None), record("b", "https://x/2", Some("1"))];
        let one = encode_csv(&RecordTable::from_records(&records), &HeaderLabels::default()).unwrap();
        let two = encode_csv(&RecordTable::from_records(&records), &HeaderLabels::default()).unwrap();
        assert_eq!(one, two);
    }

    #[test]
    fn test_labels_replace_keys() {
        let labels = HeaderLabels::new(BTreeMap::from([("product_name".to_string(), "상품명".to_string())]));
        let table = RecordTable::from_records(&[record("a", "u", None)]);
        let bytes = encode_csv(&table, &labels).unwrap();
        let text = String::from_utf8_lossy(&bytes[UTF8_BOM.len()..]).to_string();
        assert!(text.starts_with("상품명,product_url,sale_price\n"));
    }

    #[test]
    fn test_site_labels_follow_settings() {
        let site = SiteProfile::closhoew();
        let mut settings = OutputSettings::default();
        let labelled = Exporter::from_settings(&settings, &site);
        assert_eq!(labelled.labels.label("sale_price"), "가격");
        assert_eq!(labelled.labels.label("category_main"), "카테고리_대분류");

        settings.use_site_labels = false;
        let plain = Exporter::from_settings(&settings, &site);
        assert_eq!(plain.labels.label("sale_price"), "sale_price");
    }

    #[test]
    fn test_xlsx_is_a_zip_archive() {
        let table = RecordTable::from_records(&[record("a", "https://x/1", Some("100"))]);
        let bytes = encode_xlsx(&table, &HeaderLabels::default()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_exporter_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path(), "joamom");
        let records = vec![record("a", "https://x/1", None)];

        let written = exporter.write_category(&category(), &records).unwrap();
        assert_eq!(
            written,
            vec![
                dir.path().join("category_data").join("OUTER  코트자켓.csv"),
                dir.path().join("category_data").join("OUTER  코트자켓.xlsx"),
            ]
        );

        let merged = exporter.write_merged(&records).unwrap();
        assert_eq!(merged[0], dir.path().join("joamom_products_data.csv"));
        assert!(merged[1].exists());

        let partial = exporter.write_partial(&records).unwrap();
        assert_eq!(partial, Some(dir.path().join("joamom_products_partial.csv")));
    }

    #[test]
    fn test_suffix_keeps_dots_in_stem() {
        assert_eq!(with_suffix(Path::new("out/1.5 inch"), "csv"), PathBuf::from("out/1.5 inch.csv"));
    }

    #[test]
    fn test_empty_sets_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path(), "site").with_spreadsheet(false);
        assert!(exporter.write_merged(&[]).unwrap().is_empty());
        assert_eq!(exporter.write_partial(&[]).unwrap(), None);
        assert!(!with_suffix(&exporter.merged_stem(), "csv").exists());
    }

    #[test]
    fn test_categories_file() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path(), "chicfox");
        let path = exporter.write_categories(&[category()]).unwrap();
        let bytes = std::fs::read(path).unwrap();
        let text = String::from_utf8_lossy(&bytes[UTF8_BOM.len()..]).to_string();
        assert_eq!(
            text,
            "category_main,category_sub,category_full,url\nOUTER,코트/자켓,OUTER > 코트/자켓,https://shop.test/list?cate=1\n"
        );
    }

    #[test]
    fn test_report_is_json() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path(), "closhoew");
        let path = exporter.write_report(&serde_json::json!({ "records": 3 })).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(value["records"], 3);
    }
}
