// ==========================================
// 临床风险评分核心 - 字段映射器实现
// ==========================================
// 职责: 原始行 → PatientRecord + 标签
// 规则: 空单元格 = 缺失值 (None);标签必须为 0/1
// ==========================================

use crate::domain::patient::PatientRecord;
use crate::domain::types::{FieldKind, PatientField};
use crate::importer::error::{DatasetError, DatasetResult};
use crate::importer::file_parser::RawRow;

/// 带标签的训练样本
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecord {
    /// 源文件物理行号
    pub row_number: usize,
    pub record: PatientRecord,
    pub label: bool,
}

pub struct FieldMapper {
    target_column: String,
}

impl FieldMapper {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
        }
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// 表头必须包含全部临床列与标签列
    pub fn check_headers(&self, headers: &[String]) -> DatasetResult<()> {
        let required = PatientField::ALL
            .iter()
            .map(|f| f.as_str())
            .chain(std::iter::once(self.target_column.as_str()));
        for column in required {
            if !headers.iter().any(|h| h == column) {
                return Err(DatasetError::MissingColumn(column.to_string()));
            }
        }
        Ok(())
    }

    pub fn map_row(&self, row: &RawRow) -> DatasetResult<LabeledRecord> {
        let mut record = PatientRecord::default();
        for field in PatientField::ALL {
            let cell = row.get(field.as_str());
            match field.kind() {
                FieldKind::Numeric => {
                    let value = self.parse_f64(cell, field, row.row_number)?;
                    match field {
                        PatientField::Age => record.age = value,
                        PatientField::Bmi => record.bmi = value,
                        PatientField::HbA1cLevel => record.hba1c_level = value,
                        PatientField::BloodGlucoseLevel => record.blood_glucose_level = value,
                        _ => {}
                    }
                }
                FieldKind::Binary => {
                    let value = self.parse_flag(cell, field, row.row_number)?;
                    match field {
                        PatientField::Hypertension => record.hypertension = value,
                        PatientField::HeartDisease => record.heart_disease = value,
                        _ => {}
                    }
                }
                FieldKind::Categorical => {
                    let value = cell.map(|v| v.to_string());
                    match field {
                        PatientField::Gender => record.gender = value,
                        PatientField::SmokingHistory => record.smoking_history = value,
                        _ => {}
                    }
                }
            }
        }

        let label = self.parse_label(row)?;
        Ok(LabeledRecord {
            row_number: row.row_number,
            record,
            label,
        })
    }

    fn parse_f64(
        &self,
        cell: Option<&str>,
        field: PatientField,
        row_number: usize,
    ) -> DatasetResult<Option<f64>> {
        match cell {
            None => Ok(None),
            Some(value) => value
                .parse::<f64>()
                .map(Some)
                .map_err(|_| DatasetError::BadCell {
                    row: row_number,
                    column: field.as_str().to_string(),
                    message: format!("无法解析为浮点数: {}", value),
                }),
        }
    }

    /// 标志位：0/1（含 0.0/1.0）或 true/false
    fn parse_flag(
        &self,
        cell: Option<&str>,
        field: PatientField,
        row_number: usize,
    ) -> DatasetResult<Option<bool>> {
        match cell {
            None => Ok(None),
            Some(value) => parse_binary(value).map(Some).ok_or_else(|| DatasetError::BadCell {
                row: row_number,
                column: field.as_str().to_string(),
                message: format!("标志位必须为 0 或 1: {}", value),
            }),
        }
    }

    fn parse_label(&self, row: &RawRow) -> DatasetResult<bool> {
        let value = row.get(&self.target_column).unwrap_or("");
        parse_binary(value).ok_or_else(|| DatasetError::LabelNotBinary {
            row: row.row_number,
            value: value.to_string(),
        })
    }
}

fn parse_binary(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => return Some(true),
        "false" => return Some(false),
        _ => {}
    }
    match value.parse::<f64>() {
        Ok(v) if v == 0.0 => Some(false),
        Ok(v) if v == 1.0 => Some(true),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn raw_row(pairs: &[(&str, &str)]) -> RawRow {
        let cells: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RawRow {
            row_number: 7,
            cells,
        }
    }

    fn full_row(label: &str) -> RawRow {
        raw_row(&[
            ("gender", "Female"),
            ("age", "80.0"),
            ("hypertension", "0"),
            ("heart_disease", "1"),
            ("smoking_history", "never"),
            ("bmi", "25.19"),
            ("HbA1c_level", "6.6"),
            ("blood_glucose_level", "140"),
            ("diabetes", label),
        ])
    }

    #[test]
    fn test_map_full_row() {
        let mapper = FieldMapper::new("diabetes");
        let labeled = mapper.map_row(&full_row("1")).unwrap();

        assert_eq!(labeled.row_number, 7);
        assert!(labeled.label);
        assert_eq!(labeled.record.age, Some(80.0));
        assert_eq!(labeled.record.heart_disease, Some(true));
        assert_eq!(labeled.record.hypertension, Some(false));
        assert_eq!(labeled.record.smoking_history.as_deref(), Some("never"));
        assert_eq!(labeled.record.blood_glucose_level, Some(140.0));
    }

    #[test]
    fn test_empty_cells_are_missing() {
        let mapper = FieldMapper::new("diabetes");
        let mut row = full_row("0");
        row.cells.insert("bmi".to_string(), String::new());
        row.cells.insert("smoking_history".to_string(), String::new());

        let labeled = mapper.map_row(&row).unwrap();
        assert_eq!(labeled.record.bmi, None);
        assert_eq!(labeled.record.smoking_history, None);
        assert!(!labeled.label);
    }

    #[test]
    fn test_bad_numeric_cell() {
        let mapper = FieldMapper::new("diabetes");
        let mut row = full_row("0");
        row.cells.insert("age".to_string(), "forty".to_string());

        assert!(matches!(
            mapper.map_row(&row),
            Err(DatasetError::BadCell { row: 7, ref column, .. }) if column == "age"
        ));
    }

    #[test]
    fn test_label_must_be_binary() {
        let mapper = FieldMapper::new("diabetes");
        assert!(matches!(
            mapper.map_row(&full_row("2")),
            Err(DatasetError::LabelNotBinary { row: 7, .. })
        ));
        assert!(mapper.map_row(&full_row("1.0")).unwrap().label);
    }

    #[test]
    fn test_check_headers() {
        let mapper = FieldMapper::new("outcome");
        let mut headers: Vec<String> = PatientField::ALL.iter().map(|f| f.as_str().to_string()).collect();
        assert!(matches!(
            mapper.check_headers(&headers),
            Err(DatasetError::MissingColumn(c)) if c == "outcome"
        ));
        headers.push("outcome".to_string());
        assert!(mapper.check_headers(&headers).is_ok());
    }
}
