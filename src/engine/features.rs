// ==========================================
// 临床风险评分核心 - 特征变换
// ==========================================
// 职责: 患者记录 → 固定顺序数值特征向量
// 输入: PatientRecord
// 输出: FeatureVector
// 红线: 列顺序在训练期确定并写入产物,服务期必须逐列复现
// ==========================================
// 数值列: 中位数填补 → 标准化 (训练期均值/标准差)
// 类别列: "missing" 哨兵填补 → 独热编码 (训练期词表,未见类别全零)
// 交互项: BMI_Age_Interaction = bmi * age,在标准化之前计算
// ==========================================

use crate::domain::error::{FeatureValidationError, ValidationResult};
use crate::domain::patient::PatientRecord;
use crate::domain::types::PatientField;
use crate::engine::error::{ModelNotLoadedError, TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 交互特征列名
pub const INTERACTION_FEATURE: &str = "BMI_Age_Interaction";

/// 类别缺失哨兵
pub const MISSING_CATEGORY: &str = "missing";

/// 数值块的固定顺序
pub const NUMERIC_LAYOUT: [NumericSource; 7] = [
    NumericSource::Field(PatientField::Age),
    NumericSource::Field(PatientField::Hypertension),
    NumericSource::Field(PatientField::HeartDisease),
    NumericSource::Field(PatientField::Bmi),
    NumericSource::Field(PatientField::HbA1cLevel),
    NumericSource::Field(PatientField::BloodGlucoseLevel),
    NumericSource::Interaction,
];

/// 类别块的固定顺序
pub const CATEGORICAL_LAYOUT: [PatientField; 2] =
    [PatientField::Gender, PatientField::SmokingHistory];

// ==========================================
// 列定义
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericSource {
    Field(PatientField),
    Interaction,
}

impl NumericSource {
    pub fn name(&self) -> &'static str {
        match self {
            NumericSource::Field(field) => field.as_str(),
            NumericSource::Interaction => INTERACTION_FEATURE,
        }
    }

    fn raw_value(&self, record: &PatientRecord) -> Option<f64> {
        match self {
            NumericSource::Field(field) => record.numeric_value(*field),
            NumericSource::Interaction => record.bmi_age_interaction(),
        }
    }
}

/// 数值列参数（训练期统计量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub source: NumericSource,
    pub median: f64,
    pub mean: f64,
    pub std: f64,
}

/// 类别列参数（训练期词表，已排序）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub field: PatientField,
    pub categories: Vec<String>,
}

/// 归因分组：一个原始输入字段对应的特征列集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureGroup {
    pub name: String,
    pub columns: Vec<usize>,
}

// ==========================================
// FeatureVector
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

// ==========================================
// FeatureTransform
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTransform {
    pub numeric: Vec<NumericColumn>,
    pub categorical: Vec<CategoricalColumn>,
}

impl FeatureTransform {
    /// 在训练集上拟合变换参数
    ///
    /// # 返回
    /// - Err(EmptyColumn): 某数值列在训练集中没有任何观测值
    pub fn fit(records: &[PatientRecord]) -> TrainingResult<Self> {
        if records.is_empty() {
            return Err(TrainingError::Split("训练集为空".to_string()));
        }

        let mut numeric = Vec::with_capacity(NUMERIC_LAYOUT.len());
        for source in NUMERIC_LAYOUT {
            let observed: Vec<f64> = records.iter().filter_map(|r| source.raw_value(r)).collect();
            let median = median(&observed)
                .ok_or_else(|| TrainingError::EmptyColumn(source.name().to_string()))?;

            // 标准化统计量基于填补后的列
            let imputed: Vec<f64> = records
                .iter()
                .map(|r| source.raw_value(r).unwrap_or(median))
                .collect();
            let (mean, std) = mean_and_std(&imputed);

            numeric.push(NumericColumn {
                source,
                median,
                mean,
                std,
            });
        }

        let categorical = CATEGORICAL_LAYOUT
            .iter()
            .map(|&field| {
                let categories: BTreeSet<String> = records
                    .iter()
                    .map(|r| r.category_value(field).unwrap_or(MISSING_CATEGORY).to_string())
                    .collect();
                CategoricalColumn {
                    field,
                    categories: categories.into_iter().collect(),
                }
            })
            .collect();

        Ok(Self {
            numeric,
            categorical,
        })
    }

    /// 特征向量维度
    pub fn dimension(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|c| c.categories.len()).sum::<usize>()
    }

    /// 列名（与向量顺序一致）
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|c| c.source.name().to_string()).collect();
        for column in &self.categorical {
            for category in &column.categories {
                names.push(format!("{}_{}", column.field.as_str(), category));
            }
        }
        names
    }

    /// 归因分组（每个输入字段一组，交互项单独一组）
    pub fn groups(&self) -> Vec<FeatureGroup> {
        let mut groups: Vec<FeatureGroup> = self
            .numeric
            .iter()
            .enumerate()
            .map(|(idx, c)| FeatureGroup {
                name: c.source.name().to_string(),
                columns: vec![idx],
            })
            .collect();

        let mut offset = self.numeric.len();
        for column in &self.categorical {
            let width = column.categories.len();
            groups.push(FeatureGroup {
                name: column.field.as_str().to_string(),
                columns: (offset..offset + width).collect(),
            });
            offset += width;
        }
        groups
    }

    /// 范围校验（类型校验在 PatientRecord 解析阶段完成）
    pub fn validate_record(&self, record: &PatientRecord) -> ValidationResult<()> {
        for field in [
            PatientField::Age,
            PatientField::Bmi,
            PatientField::HbA1cLevel,
            PatientField::BloodGlucoseLevel,
        ] {
            if let Some(value) = record.numeric_value(field) {
                if !value.is_finite() {
                    return Err(FeatureValidationError::OutOfRange {
                        field: field.as_str().to_string(),
                        value,
                        constraint: "必须为有限数值",
                    });
                }
                if value < 0.0 {
                    return Err(FeatureValidationError::OutOfRange {
                        field: field.as_str().to_string(),
                        value,
                        constraint: "不能为负数",
                    });
                }
            }
        }
        Ok(())
    }

    /// 变换单条记录
    pub fn transform(&self, record: &PatientRecord) -> ValidationResult<FeatureVector> {
        self.validate_record(record)?;

        let mut values = Vec::with_capacity(self.dimension());
        for column in &self.numeric {
            let raw = column.source.raw_value(record).unwrap_or(column.median);
            let scaled = (raw - column.mean) / column.std;
            // 交互项相乘或标准化后可能溢出
            if !scaled.is_finite() {
                return Err(FeatureValidationError::OutOfRange {
                    field: column.source.name().to_string(),
                    value: raw,
                    constraint: "超出可表示的数值范围",
                });
            }
            values.push(scaled);
        }

        for column in &self.categorical {
            let category = record.category_value(column.field).unwrap_or(MISSING_CATEGORY);
            // 未见类别 → 全零
            values.extend(
                column
                    .categories
                    .iter()
                    .map(|c| if c == category { 1.0 } else { 0.0 }),
            );
        }

        Ok(FeatureVector(values))
    }

    /// 加载期结构校验：列布局必须与当前代码的固定顺序完全一致
    pub fn validate(&self) -> Result<(), ModelNotLoadedError> {
        let numeric_layout: Vec<NumericSource> = self.numeric.iter().map(|c| c.source).collect();
        if numeric_layout != NUMERIC_LAYOUT {
            return Err(ModelNotLoadedError::Invalid(format!(
                "数值列顺序与服务端不一致: {:?}",
                numeric_layout.iter().map(|s| s.name()).collect::<Vec<_>>()
            )));
        }

        for column in &self.numeric {
            if !(column.median.is_finite() && column.mean.is_finite() && column.std.is_finite())
                || column.std <= 0.0
            {
                return Err(ModelNotLoadedError::Invalid(format!(
                    "数值列统计量无效: {}",
                    column.source.name()
                )));
            }
        }

        let categorical_layout: Vec<PatientField> = self.categorical.iter().map(|c| c.field).collect();
        if categorical_layout != CATEGORICAL_LAYOUT {
            return Err(ModelNotLoadedError::Invalid(format!(
                "类别列顺序与服务端不一致: {:?}",
                categorical_layout
            )));
        }

        for column in &self.categorical {
            let sorted_unique = column.categories.windows(2).all(|w| w[0] < w[1]);
            if column.categories.is_empty() || !sorted_unique {
                return Err(ModelNotLoadedError::Invalid(format!(
                    "类别词表无效: {}",
                    column.field
                )));
            }
        }
        Ok(())
    }
}

// ==========================================
// 统计工具
// ==========================================

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// 均值与总体标准差（标准差为 0 时取 1，避免除零）
fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if std > f64::EPSILON {
        (mean, std)
    } else {
        (mean, 1.0)
    }
}
