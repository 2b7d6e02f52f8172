// ==========================================
// 临床风险评分核心 - 领域类型定义
// ==========================================
// 职责: 风险等级、患者字段清单、字段类别
// 红线: 风险阈值是固定常量,不参与训练
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 风险阈值 (下游消费方稳定契约)
// ==========================================

/// 低风险上界（不含）：score < 0.20 → Low
pub const LOW_RISK_UPPER_BOUND: f64 = 0.20;

/// 中风险上界（不含）：score < 0.60 → Moderate，否则 High
pub const MODERATE_RISK_UPPER_BOUND: f64 = 0.60;

// ==========================================
// 风险等级 (Risk Level)
// ==========================================
// 顺序: Low < Moderate < High
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,      // 低风险
    Moderate, // 中风险
    High,     // 高风险
}

impl RiskLevel {
    /// 按固定阈值将概率映射为风险等级
    ///
    /// 纯函数: 仅取决于 score 与两个阈值常量
    pub fn from_score(score: f64) -> Self {
        if score < LOW_RISK_UPPER_BOUND {
            RiskLevel::Low
        } else if score < MODERATE_RISK_UPPER_BOUND {
            RiskLevel::Moderate
        } else {
            RiskLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 字段类别 (Field Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldKind {
    Numeric,     // 连续数值 (中位数填补 + 标准化)
    Binary,      // 0/1 标志 (按数值列处理)
    Categorical, // 类别 (缺失哨兵 + 独热编码)
}

// ==========================================
// 患者字段 (Patient Field)
// ==========================================
// 序列化名与原始数据集列名保持一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PatientField {
    #[serde(rename = "age")]
    Age,
    #[serde(rename = "gender")]
    Gender,
    #[serde(rename = "bmi")]
    Bmi,
    #[serde(rename = "hypertension")]
    Hypertension,
    #[serde(rename = "heart_disease")]
    HeartDisease,
    #[serde(rename = "smoking_history")]
    SmokingHistory,
    #[serde(rename = "HbA1c_level")]
    HbA1cLevel,
    #[serde(rename = "blood_glucose_level")]
    BloodGlucoseLevel,
}

impl PatientField {
    /// 全部临床字段（输入文档顺序）
    pub const ALL: [PatientField; 8] = [
        PatientField::Age,
        PatientField::Gender,
        PatientField::Bmi,
        PatientField::Hypertension,
        PatientField::HeartDisease,
        PatientField::SmokingHistory,
        PatientField::HbA1cLevel,
        PatientField::BloodGlucoseLevel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatientField::Age => "age",
            PatientField::Gender => "gender",
            PatientField::Bmi => "bmi",
            PatientField::Hypertension => "hypertension",
            PatientField::HeartDisease => "heart_disease",
            PatientField::SmokingHistory => "smoking_history",
            PatientField::HbA1cLevel => "HbA1c_level",
            PatientField::BloodGlucoseLevel => "blood_glucose_level",
        }
    }

    /// 按列名解析字段（大小写敏感，与数据集列名一致）
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == name)
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            PatientField::Gender | PatientField::SmokingHistory => FieldKind::Categorical,
            PatientField::Hypertension | PatientField::HeartDisease => FieldKind::Binary,
            _ => FieldKind::Numeric,
        }
    }
}

impl fmt::Display for PatientField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.19), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.20), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(0.59), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(0.60), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(1.0), RiskLevel::High);
    }

    #[test]
    fn test_risk_level_display() {
        assert_eq!(RiskLevel::Moderate.to_string(), "Moderate");
        assert_eq!(
            serde_json::to_string(&RiskLevel::High).unwrap(),
            "\"High\""
        );
    }

    #[test]
    fn test_patient_field_parse() {
        assert_eq!(PatientField::parse("HbA1c_level"), Some(PatientField::HbA1cLevel));
        assert_eq!(PatientField::parse("hba1c_level"), None);
        assert_eq!(PatientField::parse("not_a_field"), None);
        for field in PatientField::ALL {
            assert_eq!(PatientField::parse(field.as_str()), Some(field));
        }
    }

    #[test]
    fn test_patient_field_serde_name() {
        assert_eq!(
            serde_json::to_string(&PatientField::BloodGlucoseLevel).unwrap(),
            "\"blood_glucose_level\""
        );
        assert_eq!(PatientField::Hypertension.kind(), FieldKind::Binary);
        assert_eq!(PatientField::Gender.kind(), FieldKind::Categorical);
    }
}
