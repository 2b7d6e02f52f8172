// ==========================================
// 临床风险评分核心 - 患者记录
// ==========================================
// 职责: 患者临床属性 + 随行元数据 (医生身份)
// 红线: 元数据永不进入特征向量
// ==========================================

use crate::domain::error::{FeatureValidationError, ValidationResult};
use crate::domain::types::PatientField;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

// ==========================================
// ClinicianMeta - 随行元数据
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClinicianMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinician_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinician_name: Option<String>,
}

impl ClinicianMeta {
    pub const FIELD_NAMES: [&'static str; 2] = ["clinician_id", "clinician_name"];

    pub fn is_empty(&self) -> bool {
        self.clinician_id.is_none() && self.clinician_name.is_none()
    }
}

// ==========================================
// PatientRecord - 患者记录
// ==========================================
// None 表示"未知"，由特征变换按训练期统计量填补
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatientRecord {
    pub age: Option<f64>,
    pub gender: Option<String>,
    pub bmi: Option<f64>,
    #[serde(serialize_with = "serialize_flag")]
    pub hypertension: Option<bool>,
    #[serde(serialize_with = "serialize_flag")]
    pub heart_disease: Option<bool>,
    pub smoking_history: Option<String>,
    #[serde(rename = "HbA1c_level")]
    pub hba1c_level: Option<f64>,
    pub blood_glucose_level: Option<f64>,

    #[serde(flatten)]
    pub clinician: ClinicianMeta,
}

impl PatientRecord {
    /// 从 JSON 文档解析患者记录
    ///
    /// # 规则
    /// - 8 个临床字段必须全部出现（键缺失 → MissingField）
    /// - 显式 null 表示未知，交给特征变换填补
    /// - 类型不符 → WrongType；标志位只接受 0/1/true/false
    /// - 未识别的键忽略；clinician_id / clinician_name 作为元数据读取
    pub fn from_json(value: &Value) -> ValidationResult<Self> {
        let obj = value
            .as_object()
            .ok_or(FeatureValidationError::NotAnObject)?;

        let mut record = PatientRecord::default();
        for field in PatientField::ALL {
            let raw = obj
                .get(field.as_str())
                .ok_or_else(|| FeatureValidationError::MissingField(field.as_str().to_string()))?;
            record.set_from_json(field, raw)?;
        }

        record.clinician = ClinicianMeta {
            clinician_id: read_meta(obj, "clinician_id")?,
            clinician_name: read_meta(obj, "clinician_name")?,
        };

        Ok(record)
    }

    /// 序列化为 JSON 文档（与 from_json 对称）
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// 以 JSON 值覆写单个字段（干预模拟使用）
    pub fn set_from_json(&mut self, field: PatientField, value: &Value) -> ValidationResult<()> {
        match field {
            PatientField::Age => self.age = parse_number(field, value)?,
            PatientField::Bmi => self.bmi = parse_number(field, value)?,
            PatientField::HbA1cLevel => self.hba1c_level = parse_number(field, value)?,
            PatientField::BloodGlucoseLevel => {
                self.blood_glucose_level = parse_number(field, value)?
            }
            PatientField::Hypertension => self.hypertension = parse_flag(field, value)?,
            PatientField::HeartDisease => self.heart_disease = parse_flag(field, value)?,
            PatientField::Gender => self.gender = parse_category(field, value)?,
            PatientField::SmokingHistory => self.smoking_history = parse_category(field, value)?,
        }
        Ok(())
    }

    /// 数值视图：连续字段原值，标志位映射为 0/1，类别字段返回 None
    pub fn numeric_value(&self, field: PatientField) -> Option<f64> {
        match field {
            PatientField::Age => self.age,
            PatientField::Bmi => self.bmi,
            PatientField::HbA1cLevel => self.hba1c_level,
            PatientField::BloodGlucoseLevel => self.blood_glucose_level,
            PatientField::Hypertension => self.hypertension.map(flag_to_f64),
            PatientField::HeartDisease => self.heart_disease.map(flag_to_f64),
            PatientField::Gender | PatientField::SmokingHistory => None,
        }
    }

    /// 类别视图
    pub fn category_value(&self, field: PatientField) -> Option<&str> {
        match field {
            PatientField::Gender => self.gender.as_deref(),
            PatientField::SmokingHistory => self.smoking_history.as_deref(),
            _ => None,
        }
    }

    /// BMI × 年龄 交互项（原始值，标准化之前）
    pub fn bmi_age_interaction(&self) -> Option<f64> {
        match (self.bmi, self.age) {
            (Some(bmi), Some(age)) => Some(bmi * age),
            _ => None,
        }
    }
}

fn flag_to_f64(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

fn serialize_flag<S: Serializer>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(flag) => serializer.serialize_u8(u8::from(*flag)),
        None => serializer.serialize_none(),
    }
}

/// JSON 值类型名（用于错误信息）
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_number(field: PatientField, value: &Value) -> ValidationResult<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n.as_f64().map(Some).ok_or_else(|| FeatureValidationError::WrongType {
            field: field.as_str().to_string(),
            expected: "number",
            actual: n.to_string(),
        }),
        other => Err(FeatureValidationError::WrongType {
            field: field.as_str().to_string(),
            expected: "number",
            actual: json_type_name(other).to_string(),
        }),
    }
}

fn parse_flag(field: PatientField, value: &Value) -> ValidationResult<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 0.0 => Ok(Some(false)),
            Some(v) if v == 1.0 => Ok(Some(true)),
            Some(v) => Err(FeatureValidationError::OutOfRange {
                field: field.as_str().to_string(),
                value: v,
                constraint: "必须为 0 或 1",
            }),
            None => Err(FeatureValidationError::WrongType {
                field: field.as_str().to_string(),
                expected: "0/1 or boolean",
                actual: n.to_string(),
            }),
        },
        other => Err(FeatureValidationError::WrongType {
            field: field.as_str().to_string(),
            expected: "0/1 or boolean",
            actual: json_type_name(other).to_string(),
        }),
    }
}

fn parse_category(field: PatientField, value: &Value) -> ValidationResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string())),
        other => Err(FeatureValidationError::WrongType {
            field: field.as_str().to_string(),
            expected: "string",
            actual: json_type_name(other).to_string(),
        }),
    }
}

// 医生编号在上游可能是数字
fn read_meta(obj: &Map<String, Value>, key: &str) -> ValidationResult<Option<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(FeatureValidationError::WrongType {
            field: key.to_string(),
            expected: "string",
            actual: json_type_name(other).to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_json() -> Value {
        json!({
            "age": 40.0,
            "gender": "Female",
            "bmi": 27.5,
            "hypertension": 0,
            "heart_disease": true,
            "smoking_history": "never",
            "HbA1c_level": 6.1,
            "blood_glucose_level": 140,
            "clinician_id": 17,
            "clinician_name": "Dr. Osei"
        })
    }

    #[test]
    fn test_from_json_full_record() {
        let record = PatientRecord::from_json(&sample_json()).unwrap();
        assert_eq!(record.age, Some(40.0));
        assert_eq!(record.gender.as_deref(), Some("Female"));
        assert_eq!(record.hypertension, Some(false));
        assert_eq!(record.heart_disease, Some(true));
        assert_eq!(record.blood_glucose_level, Some(140.0));
        assert_eq!(record.clinician.clinician_id.as_deref(), Some("17"));
        assert_eq!(record.bmi_age_interaction(), Some(1100.0));
    }

    #[test]
    fn test_from_json_missing_field() {
        let mut doc = sample_json();
        doc.as_object_mut().unwrap().remove("bmi");
        let err = PatientRecord::from_json(&doc).unwrap_err();
        assert_eq!(err, FeatureValidationError::MissingField("bmi".to_string()));
    }

    #[test]
    fn test_from_json_null_means_unknown() {
        let mut doc = sample_json();
        doc["bmi"] = Value::Null;
        doc["smoking_history"] = Value::Null;
        let record = PatientRecord::from_json(&doc).unwrap();
        assert_eq!(record.bmi, None);
        assert_eq!(record.smoking_history, None);
        assert_eq!(record.bmi_age_interaction(), None);
    }

    #[test]
    fn test_from_json_wrong_type() {
        let mut doc = sample_json();
        doc["age"] = json!("forty");
        assert!(matches!(
            PatientRecord::from_json(&doc),
            Err(FeatureValidationError::WrongType { .. })
        ));

        let mut doc = sample_json();
        doc["hypertension"] = json!(2);
        assert!(matches!(
            PatientRecord::from_json(&doc),
            Err(FeatureValidationError::OutOfRange { .. })
        ));

        assert_eq!(
            PatientRecord::from_json(&json!([1, 2])),
            Err(FeatureValidationError::NotAnObject)
        );
    }

    #[test]
    fn test_to_json_round_trip_keeps_flags_numeric() {
        let record = PatientRecord::from_json(&sample_json()).unwrap();
        let doc = record.to_json();
        assert_eq!(doc["hypertension"], json!(0));
        assert_eq!(doc["heart_disease"], json!(1));
        assert_eq!(doc["HbA1c_level"], json!(6.1));
        assert_eq!(PatientRecord::from_json(&doc).unwrap(), record);
    }

    #[test]
    fn test_numeric_view_excludes_categories() {
        let record = PatientRecord::from_json(&sample_json()).unwrap();
        assert_eq!(record.numeric_value(PatientField::HeartDisease), Some(1.0));
        assert_eq!(record.numeric_value(PatientField::Gender), None);
        assert_eq!(record.category_value(PatientField::SmokingHistory), Some("never"));
    }
}
