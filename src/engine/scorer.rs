// ==========================================
// 临床风险评分核心 - 基础评分器
// ==========================================
// 职责: 统一的评分能力 (Scorer) 与两种实现的封装
// 说明: 投票组合与校准只依赖 Scorer trait,不依赖具体模型类型
// ==========================================

use crate::engine::gbdt::GradientBoostedTrees;
use crate::engine::logistic::LogisticModel;
use serde::{Deserialize, Serialize};

/// 评分能力：特征向量 → 正类概率
pub trait Scorer: Send + Sync {
    /// 返回 [0, 1] 区间内的概率
    fn score(&self, features: &[f64]) -> f64;

    /// 评分器名称（写入产物用于核对阶段顺序）
    fn name(&self) -> &str;
}

/// 基础评分器（树集成 / 线性）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaseScorer {
    GradientBoosted(GradientBoostedTrees),
    Logistic(LogisticModel),
}

impl BaseScorer {
    /// 加载期结构校验
    pub fn validate(&self, dimension: usize) -> Result<(), String> {
        match self {
            BaseScorer::GradientBoosted(model) => model.validate(dimension),
            BaseScorer::Logistic(model) => model.validate(dimension),
        }
    }
}

impl Scorer for BaseScorer {
    fn score(&self, features: &[f64]) -> f64 {
        match self {
            BaseScorer::GradientBoosted(model) => model.score(features),
            BaseScorer::Logistic(model) => model.score(features),
        }
    }

    fn name(&self) -> &str {
        match self {
            BaseScorer::GradientBoosted(model) => model.name(),
            BaseScorer::Logistic(model) => model.name(),
        }
    }
}

/// 数值稳定的 sigmoid
pub(crate) fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
