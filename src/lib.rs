// ==========================================
// 临床风险评分核心 - 核心库
// ==========================================
// 技术栈: Rust + serde + tokio
// 系统定位: 慢病 (糖尿病) 风险评分、归因与干预模拟
//   离线: 训练校准后的集成概率模型并写出产物
//   在线: 加载产物,提供评分 / 归因 / 干预模拟
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 患者记录与评估结果
pub mod domain;

// 引擎层 - 模型、校准、归因、模拟、训练
pub mod engine;

// 导入层 - 训练数据集
pub mod importer;

// 配置层
pub mod config;

// 日志系统
pub mod logging;

// API 层 - 服务门面
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    ClinicianMeta, Explanation, FeatureContribution, FeatureValidationError, OmittedFeature,
    PatientField, PatientRecord, RiskAssessment, RiskLevel, SimulationResult,
    LOW_RISK_UPPER_BOUND, MODERATE_RISK_UPPER_BOUND,
};

// 引擎
pub use engine::{
    CounterfactualSimulator, ModelArtifact, ModelNotLoadedError, Modifications, RiskEngine,
    SimulationError, TrainingError, TrainingPipeline,
};

// API
pub use api::{ApiError, RiskApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "临床风险评分核心";
