// ==========================================
// 临床风险评分核心 - 文件解析器实现
// ==========================================
// 职责: 表格文件 → 原始行 (列名 → 单元格文本)
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// ==========================================

use crate::importer::error::{DatasetError, DatasetResult};
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// 原始行
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 源文件物理行号（表头为第 1 行）
    pub row_number: usize,
    pub cells: HashMap<String, String>,
}

impl RawRow {
    /// 单元格文本（已去除首尾空白，空串视为缺失）
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }
}

/// 原始表格
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

// ==========================================
// FileParser Trait
// ==========================================
pub trait FileParser {
    fn parse_to_raw_table(&self, file_path: &Path) -> DatasetResult<RawTable>;
}

fn ensure_exists(path: &Path) -> DatasetResult<()> {
    if !path.exists() {
        return Err(DatasetError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn push_row(table: &mut RawTable, row_number: usize, values: impl Iterator<Item = String>) {
    let mut cells = HashMap::new();
    for (col_idx, value) in values.enumerate() {
        if let Some(header) = table.headers.get(col_idx) {
            cells.insert(header.clone(), value.trim().to_string());
        }
    }

    // 跳过完全空白的行
    if cells.values().all(|v| v.is_empty()) {
        return;
    }
    table.rows.push(RawRow { row_number, cells });
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_to_raw_table(&self, file_path: &Path) -> DatasetResult<RawTable> {
        ensure_exists(file_path)?;

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let mut table = RawTable {
            headers: reader
                .headers()?
                .iter()
                .map(|h| h.trim().to_string())
                .collect(),
            rows: Vec::new(),
        };

        for (row_idx, result) in reader.records().enumerate() {
            let record = result?;
            push_row(&mut table, row_idx + 2, record.iter().map(|v| v.to_string()));
        }

        Ok(table)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_to_raw_table(&self, file_path: &Path) -> DatasetResult<RawTable> {
        ensure_exists(file_path)?;

        let mut workbook = open_workbook_auto(file_path)?;

        // 读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| DatasetError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut rows = range.rows();
        let header_row = rows
            .next()
            .ok_or_else(|| DatasetError::ExcelParseError("Excel 文件无表头行".to_string()))?;

        let mut table = RawTable {
            headers: header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect(),
            rows: Vec::new(),
        };

        for (row_idx, data_row) in rows.enumerate() {
            push_row(&mut table, row_idx + 2, data_row.iter().map(|c| c.to_string()));
        }

        Ok(table)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> DatasetResult<RawTable> {
        let path = file_path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => CsvParser.parse_to_raw_table(path),
            "xlsx" | "xls" => ExcelParser.parse_to_raw_table(path),
            _ => Err(DatasetError::UnsupportedFormat(ext)),
        }
    }
}
