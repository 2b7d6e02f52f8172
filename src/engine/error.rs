// ==========================================
// 临床风险评分核心 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 传播策略:
// - 训练期错误不可恢复,整次训练中止且不写出产物
// - 服务期校验/模拟错误带原因返回调用方
// ==========================================

use crate::domain::error::FeatureValidationError;
use crate::importer::error::DatasetError;
use thiserror::Error;

/// 模型未加载 (ModelNotLoadedError)
///
/// 产物缺失或结构无效，引擎实例不可用
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelNotLoadedError {
    #[error("模型产物不存在: {0}")]
    NotFound(String),

    #[error("模型产物读取失败 ({file}): {message}")]
    Io { file: String, message: String },

    #[error("模型产物解析失败 ({file}): {message}")]
    Parse { file: String, message: String },

    #[error("模型产物版本不匹配: 期望 {expected}，实际 {actual}")]
    SchemaMismatch { expected: u32, actual: u32 },

    #[error("模型产物结构无效: {0}")]
    Invalid(String),
}

/// 干预模拟错误 (SimulationError)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("未识别的干预字段: {0}")]
    UnknownField(String),

    #[error("元数据字段不可干预: {0}")]
    ProtectedField(String),

    #[error("干预值无效 (字段 {field}): {source}")]
    InvalidValue {
        field: String,
        source: FeatureValidationError,
    },

    #[error("评分失败: {0}")]
    Scoring(#[from] FeatureValidationError),
}

/// 训练流水线错误
#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("数据集加载失败: {0}")]
    Dataset(#[from] DatasetError),

    #[error("数据划分失败: {0}")]
    Split(String),

    #[error("训练集列无有效值: {0}")]
    EmptyColumn(String),

    #[error("训练样本无效 (行 {row}): {source}")]
    InvalidRow {
        row: usize,
        source: FeatureValidationError,
    },

    #[error("模型拟合失败: {0}")]
    DegenerateFit(String),

    #[error("配置无效: {0}")]
    Config(String),

    #[error("模型产物写出失败: {0}")]
    ArtifactWrite(String),
}

impl From<std::io::Error> for TrainingError {
    fn from(err: std::io::Error) -> Self {
        TrainingError::ArtifactWrite(err.to_string())
    }
}

impl From<serde_json::Error> for TrainingError {
    fn from(err: serde_json::Error) -> Self {
        TrainingError::ArtifactWrite(err.to_string())
    }
}

/// Result 类型别名
pub type TrainingResult<T> = Result<T, TrainingError>;
