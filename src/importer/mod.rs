// ==========================================
// 临床风险评分核心 - 导入层
// ==========================================
// 职责: 训练数据集 (CSV / Excel) → 带标签的患者记录
// ==========================================

pub mod dataset_loader;
pub mod error;
pub mod field_mapper;
pub mod file_parser;

// 重导出核心类型
pub use dataset_loader::{Dataset, DatasetLoader};
pub use error::{DatasetError, DatasetResult};
pub use field_mapper::{FieldMapper, LabeledRecord};
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawRow, RawTable, UniversalFileParser};
