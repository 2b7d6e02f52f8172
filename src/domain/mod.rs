// ==========================================
// 临床风险评分核心 - 领域模型层
// ==========================================
// 职责: 定义患者记录、评估结果、领域类型
// 红线: 不含模型逻辑,不含文件访问
// ==========================================

pub mod assessment;
pub mod error;
pub mod patient;
pub mod types;

// 重导出核心类型
pub use assessment::{
    Explanation, FeatureContribution, OmittedFeature, RiskAssessment, SimulationResult,
};
pub use error::{FeatureValidationError, ValidationResult};
pub use patient::{ClinicianMeta, PatientRecord};
pub use types::{
    FieldKind, PatientField, RiskLevel, LOW_RISK_UPPER_BOUND, MODERATE_RISK_UPPER_BOUND,
};
