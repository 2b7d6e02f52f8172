// ==========================================
// 临床风险评分核心 - API 层
// ==========================================
// 职责: 面向请求的服务门面,协调引擎与外部协作方
// ==========================================

pub mod collaborators;
pub mod error;
pub mod risk_api;

// 重导出核心类型
pub use collaborators::{
    HistoryEntry, HistorySink, NoOpHistorySink, Report, ReportGenerator, ReportMode,
    RiskReportRequest, SimulationReportRequest,
};
pub use error::{ApiError, ApiResult};
pub use risk_api::{HealthStatus, RiskApi};
