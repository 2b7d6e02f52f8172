// ==========================================
// 临床风险评分核心 - 软投票组合器
// ==========================================
// 职责: 对各基础评分器的概率取等权平均
// 红线: 等权,不学习权重;只依赖 Scorer trait
// ==========================================

use crate::engine::scorer::{BaseScorer, Scorer};
use serde::{Deserialize, Serialize};

/// 投票策略（产物中显式记录，便于审阅）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    SoftMean,
}

/// 组合器阶段描述（03_combiner.json）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinerStage {
    pub strategy: VotingStrategy,
    /// 成员名称，顺序与 02_scorers.json 一致
    pub members: Vec<String>,
}

/// 软投票集成
#[derive(Debug, Clone, PartialEq)]
pub struct SoftVotingEnsemble<S = BaseScorer> {
    members: Vec<S>,
}

impl<S: Scorer> SoftVotingEnsemble<S> {
    /// 成员为空时返回 None
    pub fn new(members: Vec<S>) -> Option<Self> {
        if members.is_empty() {
            None
        } else {
            Some(Self { members })
        }
    }

    pub fn members(&self) -> &[S] {
        &self.members
    }

    /// 原始集成概率 = 成员概率平均
    pub fn raw_probability(&self, features: &[f64]) -> f64 {
        let total: f64 = self.members.iter().map(|m| m.score(features)).sum();
        total / self.members.len() as f64
    }

    pub fn stage(&self) -> CombinerStage {
        CombinerStage {
            strategy: VotingStrategy::SoftMean,
            members: self.members.iter().map(|m| m.name().to_string()).collect(),
        }
    }
}

impl<S: Scorer> Scorer for SoftVotingEnsemble<S> {
    fn score(&self, features: &[f64]) -> f64 {
        self.raw_probability(features)
    }

    fn name(&self) -> &str {
        "soft_voting"
    }
}
