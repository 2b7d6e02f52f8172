// ==========================================
// 临床风险评分核心 - 评估结果对象
// ==========================================
// 职责: 风险评估 / 特征归因 / 干预模拟 的输出结构
// 生命周期: 按请求创建,响应后丢弃
// ==========================================

use crate::domain::patient::PatientRecord;
use crate::domain::types::RiskLevel;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

// ==========================================
// RiskAssessment - 风险评估
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    /// 评估ID（供历史记录关联，不影响评分）
    pub assessment_id: Uuid,
    /// 校准后概率 [0, 1]
    pub score: f64,
    pub level: RiskLevel,
    pub assessed_at: DateTime<Utc>,
}

impl RiskAssessment {
    pub fn new(score: f64) -> Self {
        Self {
            assessment_id: Uuid::new_v4(),
            score,
            level: RiskLevel::from_score(score),
            assessed_at: Utc::now(),
        }
    }
}

// ==========================================
// Explanation - 特征归因
// ==========================================

/// 单个特征的带符号贡献
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub contribution: f64,
}

/// 未能归因的特征 (ExplanationPartialFailure 信号)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OmittedFeature {
    pub feature: String,
    pub reason: String,
}

/// 归因结果
///
/// `contributions` 按 |contribution| 降序排列，幅度相同按原始特征顺序。
/// 部分特征归因失败时不整体报错，而是记录在 `omitted` 中。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    /// 当前记录的校准后得分
    pub score: f64,
    /// 背景样本的平均得分
    pub base_value: f64,
    pub contributions: Vec<FeatureContribution>,
    pub omitted: Vec<OmittedFeature>,
}

impl Explanation {
    pub fn is_partial(&self) -> bool {
        !self.omitted.is_empty()
    }

    pub fn omitted_count(&self) -> usize {
        self.omitted.len()
    }

    pub fn contribution_sum(&self) -> f64 {
        self.contributions.iter().map(|c| c.contribution).sum()
    }

    pub fn contribution_of(&self, feature: &str) -> Option<f64> {
        self.contributions
            .iter()
            .find(|c| c.feature == feature)
            .map(|c| c.contribution)
    }

    /// 贡献最大的特征
    pub fn top_feature(&self) -> Option<&FeatureContribution> {
        self.contributions.first()
    }
}

// ==========================================
// SimulationResult - 干预模拟
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub original_risk: f64,
    pub new_risk: f64,
    /// original_risk - new_risk，可为负（干预使风险升高）
    pub risk_reduction: f64,
    pub modified_record: PatientRecord,
}

impl SimulationResult {
    pub fn new(original_risk: f64, new_risk: f64, modified_record: PatientRecord) -> Self {
        Self {
            original_risk,
            new_risk,
            risk_reduction: original_risk - new_risk,
            modified_record,
        }
    }
}
