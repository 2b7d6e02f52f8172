// ==========================================
// 临床风险评分核心 - 外部协作方接口
// ==========================================
// 职责: 定义历史记录写入与报告生成的 trait (依赖倒置)
// 说明: 具体实现 (数据库 / 语言模型服务) 位于本 crate 之外
// 红线: 协作方失败只记日志,不影响评分结果
// ==========================================

use crate::domain::assessment::{Explanation, SimulationResult};
use crate::domain::patient::PatientRecord;
use crate::domain::types::RiskLevel;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use uuid::Uuid;

pub type CollaboratorError = Box<dyn Error + Send + Sync>;

// ==========================================
// 历史记录
// ==========================================

/// 写入历史的一条评估
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub assessment_id: Uuid,
    pub assessed_at: DateTime<Utc>,
    pub record: PatientRecord,
    pub score: f64,
    pub level: RiskLevel,
    pub clinician_id: Option<String>,
    pub clinician_name: Option<String>,
}

/// 历史记录写入方（只写）
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, entry: HistoryEntry) -> Result<(), CollaboratorError>;
}

/// 空操作历史写入方
#[derive(Debug, Clone, Default)]
pub struct NoOpHistorySink;

#[async_trait]
impl HistorySink for NoOpHistorySink {
    async fn record(&self, entry: HistoryEntry) -> Result<(), CollaboratorError> {
        tracing::debug!(
            "NoOpHistorySink: 跳过历史写入 - assessment_id={}",
            entry.assessment_id
        );
        Ok(())
    }
}

// ==========================================
// 报告生成
// ==========================================

/// 风险报告请求
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReportRequest {
    pub record: PatientRecord,
    pub score: f64,
    pub level: RiskLevel,
    pub explanation: Explanation,
}

/// 干预报告请求
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReportRequest {
    pub record: PatientRecord,
    pub simulation: SimulationResult,
}

/// 报告生成方（仅文本）
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn risk_report(&self, request: &RiskReportRequest) -> Result<String, CollaboratorError>;

    async fn simulation_report(
        &self,
        request: &SimulationReportRequest,
    ) -> Result<String, CollaboratorError>;
}

/// 报告来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    /// 报告生成方产出
    Generated,
    /// 生成方不可用或失败，使用内置模板
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub text: String,
    pub mode: ReportMode,
}

impl Report {
    pub fn generated(text: String) -> Self {
        Self {
            text,
            mode: ReportMode::Generated,
        }
    }

    pub fn degraded(text: String) -> Self {
        Self {
            text,
            mode: ReportMode::Degraded,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.mode == ReportMode::Degraded
    }
}

// ==========================================
// 内置模板 (降级模式)
// ==========================================

pub fn template_risk_report(request: &RiskReportRequest) -> String {
    let driver = request
        .explanation
        .top_feature()
        .map(|c| c.feature.as_str())
        .unwrap_or("未知");

    format!(
        "评估结果: {} 风险 (得分 {:.2})\n\
         主要影响因素: {} 及代谢指标\n\
         建议:\n\
         1. 开始标准生活方式干预\n\
         2. 3-6 个月内复查 HbA1c 与血脂\n\
         3. 风险因素持续存在时考虑药物评估\n\
         注: 报告生成服务当前不可用，此为模板报告",
        request.level, request.score, driver
    )
}

pub fn template_simulation_report(request: &SimulationReportRequest) -> String {
    let simulation = &request.simulation;
    let change = if simulation.risk_reduction >= 0.0 {
        format!("预计风险降低 {:.1} 个百分点", simulation.risk_reduction * 100.0)
    } else {
        format!("预计风险升高 {:.1} 个百分点", -simulation.risk_reduction * 100.0)
    };

    format!(
        "干预模拟: 风险由 {:.2} 变为 {:.2}，{}\n\
         持续达成干预目标有望带来长期获益\n\
         注: 报告生成服务当前不可用，此为模板报告",
        simulation.original_risk, simulation.new_risk, change
    )
}
