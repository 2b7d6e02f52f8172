// ==========================================
// 临床风险评分核心 - 输入校验错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 调用方输入问题,总是上报,不重试
// ==========================================

use thiserror::Error;

/// 特征校验错误 (FeatureValidationError)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureValidationError {
    #[error("患者记录必须是 JSON 对象")]
    NotAnObject,

    #[error("缺少必填字段: {0}")]
    MissingField(String),

    #[error("字段类型错误 (字段 {field}): 期望 {expected}，实际 {actual}")]
    WrongType {
        field: String,
        expected: &'static str,
        actual: String,
    },

    #[error("数值范围错误 (字段 {field}): 值 {value} {constraint}")]
    OutOfRange {
        field: String,
        value: f64,
        constraint: &'static str,
    },

    #[error("评分结果非有限: {0}")]
    NonFiniteScore(f64),
}

/// Result 类型别名
pub type ValidationResult<T> = Result<T, FeatureValidationError>;
