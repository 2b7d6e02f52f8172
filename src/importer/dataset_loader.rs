// ==========================================
// 临床风险评分核心 - 训练数据集加载
// ==========================================
// 流程: 文件解析 → 表头检查 → 逐行映射 → 类别分布检查
// 红线: 任一行映射失败即整体失败,不静默丢弃样本
// ==========================================

use crate::importer::error::{DatasetError, DatasetResult};
use crate::importer::field_mapper::{FieldMapper, LabeledRecord};
use crate::importer::file_parser::{RawTable, UniversalFileParser};
use std::path::Path;

/// 已加载的数据集
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    pub records: Vec<LabeledRecord>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.records.iter().filter(|r| r.label).count()
    }

    pub fn negatives(&self) -> usize {
        self.len() - self.positives()
    }
}

pub struct DatasetLoader {
    parser: UniversalFileParser,
    mapper: FieldMapper,
}

impl DatasetLoader {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            parser: UniversalFileParser,
            mapper: FieldMapper::new(target_column),
        }
    }

    /// 从 CSV / Excel 文件加载
    pub fn load(&self, path: impl AsRef<Path>) -> DatasetResult<Dataset> {
        let path = path.as_ref();
        tracing::info!("加载训练数据集: {}", path.display());
        let table = self.parser.parse(path)?;
        self.from_table(&table)
    }

    /// 从已解析的表格构建数据集
    pub fn from_table(&self, table: &RawTable) -> DatasetResult<Dataset> {
        self.mapper.check_headers(&table.headers)?;

        let records = table
            .rows
            .iter()
            .map(|row| self.mapper.map_row(row))
            .collect::<DatasetResult<Vec<_>>>()?;

        let dataset = Dataset { records };
        if dataset.is_empty() {
            return Err(DatasetError::Empty);
        }
        if dataset.positives() == 0 || dataset.negatives() == 0 {
            let only = if dataset.positives() == 0 { "0" } else { "1" };
            return Err(DatasetError::SingleClass(format!(
                "{} 列全部为 {}",
                self.mapper.target_column(),
                only
            )));
        }

        tracing::info!(
            "数据集加载完成: 共 {} 行, 正类 {} 行, 负类 {} 行",
            dataset.len(),
            dataset.positives(),
            dataset.negatives()
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    const HEADER: &str =
        "gender,age,hypertension,heart_disease,smoking_history,bmi,HbA1c_level,blood_glucose_level,diabetes";

    fn write_csv(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_load_csv() {
        let file = write_csv(&[
            "Female,80.0,0,1,never,25.19,6.6,140,0",
            "Male,28.0,0,0,,27.32,5.7,158,0",
            "Male,67.0,0,1,not current,27.32,6.5,200,1",
        ]);
        let dataset = DatasetLoader::new("diabetes").load(file.path()).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.positives(), 1);
        assert_eq!(dataset.records[1].record.smoking_history, None);
        assert_eq!(dataset.records[2].record.smoking_history.as_deref(), Some("not current"));
    }

    #[test]
    fn test_single_class_rejected() {
        let file = write_csv(&["Female,80.0,0,1,never,25.19,6.6,140,0"]);
        assert!(matches!(
            DatasetLoader::new("diabetes").load(file.path()),
            Err(DatasetError::SingleClass(_))
        ));
    }

    #[test]
    fn test_header_only_is_empty() {
        let file = write_csv(&[]);
        assert!(matches!(
            DatasetLoader::new("diabetes").load(file.path()),
            Err(DatasetError::Empty)
        ));
    }

    #[test]
    fn test_bad_row_reports_line_number() {
        let file = write_csv(&[
            "Female,80.0,0,1,never,25.19,6.6,140,0",
            "Male,28.0,0,0,never,27.32,5.7,high,1",
        ]);
        assert!(matches!(
            DatasetLoader::new("diabetes").load(file.path()),
            Err(DatasetError::BadCell { row: 3, .. })
        ));
    }
}
