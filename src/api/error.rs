// ==========================================
// 临床风险评分核心 - API层错误类型
// ==========================================
// 职责: 汇总引擎层错误,转换为面向调用方的错误消息
// 红线: 失败时不返回替代得分
// ==========================================

use crate::domain::error::FeatureValidationError;
use crate::engine::error::{ModelNotLoadedError, SimulationError};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 引擎未就绪（调用方应视为服务不可用）
    #[error("风险引擎未就绪: {0}")]
    ModelNotLoaded(#[from] ModelNotLoadedError),

    #[error("无效输入: {0}")]
    InvalidInput(#[from] FeatureValidationError),

    #[error("干预模拟失败: {0}")]
    Simulation(#[from] SimulationError),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// 是否为调用方输入问题（可修正后重试）
    pub fn is_client_error(&self) -> bool {
        match self {
            ApiError::InvalidInput(_) | ApiError::Simulation(_) => true,
            ApiError::ModelNotLoaded(_) | ApiError::Internal(_) => false,
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
