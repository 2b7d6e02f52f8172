// ==========================================
// 临床风险评分核心 - 数据集导入错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行号为源文件中的物理行号 (表头为第 1 行)
// ==========================================

use thiserror::Error;

/// 数据集导入错误
#[derive(Error, Debug)]
pub enum DatasetError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 数据映射错误 =====
    #[error("缺少必需列: {0}")]
    MissingColumn(String),

    #[error("单元格无效 (行 {row}, 列 {column}): {message}")]
    BadCell {
        row: usize,
        column: String,
        message: String,
    },

    #[error("标签必须为 0 或 1 (行 {row}): 实际 {value}")]
    LabelNotBinary { row: usize, value: String },

    // ===== 数据量错误 =====
    #[error("数据集没有任何数据行")]
    Empty,

    #[error("数据集只有一个类别: {0}")]
    SingleClass(String),
}

impl From<std::io::Error> for DatasetError {
    fn from(err: std::io::Error) -> Self {
        DatasetError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for DatasetError {
    fn from(err: csv::Error) -> Self {
        DatasetError::CsvParseError(err.to_string())
    }
}

impl From<calamine::Error> for DatasetError {
    fn from(err: calamine::Error) -> Self {
        DatasetError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type DatasetResult<T> = Result<T, DatasetError>;
