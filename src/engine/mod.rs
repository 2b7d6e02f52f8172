// ==========================================
// 临床风险评分核心 - 引擎层
// ==========================================
// 职责: 特征变换、评分模型、校准、归因、干预模拟、训练
// 红线: 服务期评分为纯函数,不做 I/O
// ==========================================
// 服务期数据流:
//   PatientRecord → FeatureTransform → 基础评分器 → 软投票 → 校准 → score
// ==========================================

pub mod artifact;
pub mod calibration;
pub mod counterfactual;
pub mod error;
pub mod explain;
pub mod features;
pub mod gbdt;
pub mod logistic;
pub mod metrics;
pub mod risk_engine;
pub mod scorer;
pub mod training;
pub mod voting;

#[cfg(test)]
pub(crate) mod fixtures;

// 重导出核心引擎
pub use artifact::{ArtifactManifest, BackgroundSample, ModelArtifact, StageKind, ARTIFACT_SCHEMA_VERSION};
pub use calibration::IsotonicCalibrator;
pub use counterfactual::{CounterfactualSimulator, Modifications};
pub use error::{ModelNotLoadedError, SimulationError, TrainingError, TrainingResult};
pub use explain::ShapleyExplainer;
pub use features::{FeatureTransform, FeatureVector};
pub use gbdt::{GbdtParams, GradientBoostedTrees};
pub use logistic::{LogisticModel, LogisticParams};
pub use metrics::EvaluationReport;
pub use risk_engine::RiskEngine;
pub use scorer::{BaseScorer, Scorer};
pub use training::{TrainingOutcome, TrainingPipeline};
pub use voting::SoftVotingEnsemble;
