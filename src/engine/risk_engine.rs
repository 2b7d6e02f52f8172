// ==========================================
// 临床风险评分核心 - 风险引擎
// ==========================================
// 职责: 持有已加载的模型产物,提供评分与归因
// 输入: PatientRecord
// 输出: 校准后概率 / RiskAssessment / Explanation
// 红线: 构造后不可变,评分不做 I/O,相同输入得到逐位相同结果
// 并发: Send + Sync,以 Arc<RiskEngine> 共享,无锁
// ==========================================

use crate::domain::assessment::{Explanation, RiskAssessment};
use crate::domain::error::{FeatureValidationError, ValidationResult};
use crate::domain::patient::PatientRecord;
use crate::engine::artifact::ModelArtifact;
use crate::engine::error::ModelNotLoadedError;
use crate::engine::explain::ShapleyExplainer;
use serde_json::Value;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug)]
pub struct RiskEngine {
    artifact: ModelArtifact,
}

impl RiskEngine {
    /// 从产物目录加载引擎（进程生命周期内只加载一次）
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelNotLoadedError> {
        let path = path.as_ref();
        let artifact = ModelArtifact::load(path).map_err(|e| {
            tracing::error!("模型产物加载失败 {}: {}", path.display(), e);
            e
        })?;

        tracing::info!(
            "风险引擎已加载: model_id={}, 特征维度={}, 评分器={:?}, 背景样本={}",
            artifact.manifest.model_id,
            artifact.transform.dimension(),
            artifact.ensemble.stage().members,
            artifact.background.rows.len()
        );
        Ok(Self { artifact })
    }

    /// 直接由内存中的产物构造（训练后立即服务、测试）
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelNotLoadedError> {
        artifact.validate()?;
        Ok(Self { artifact })
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn model_id(&self) -> Uuid {
        self.artifact.manifest.model_id
    }

    /// 已变换特征向量 → 校准后概率（先投票，后校准）
    pub fn score_vector(&self, features: &[f64]) -> f64 {
        let raw = self.artifact.ensemble.raw_probability(features);
        self.artifact.calibrator.transform(raw)
    }

    /// 风险概率
    pub fn predict_risk(&self, record: &PatientRecord) -> ValidationResult<f64> {
        let features = self.artifact.transform.transform(record)?;
        self.checked_score(features.as_slice())
    }

    /// 非有限得分不作为评分结果返回
    fn checked_score(&self, features: &[f64]) -> ValidationResult<f64> {
        let score = self.score_vector(features);
        if score.is_finite() {
            Ok(score)
        } else {
            tracing::warn!("评分结果非有限: {}", score);
            Err(FeatureValidationError::NonFiniteScore(score))
        }
    }

    /// 从 JSON 文档评分
    pub fn predict_json(&self, document: &Value) -> ValidationResult<f64> {
        let record = PatientRecord::from_json(document)?;
        self.predict_risk(&record)
    }

    /// 风险评估（概率 + 等级）
    pub fn assess(&self, record: &PatientRecord) -> ValidationResult<RiskAssessment> {
        let score = self.predict_risk(record)?;
        Ok(RiskAssessment::new(score))
    }

    /// 特征归因
    pub fn explain_risk(&self, record: &PatientRecord) -> ValidationResult<Explanation> {
        let features = self.artifact.transform.transform(record)?;
        self.checked_score(features.as_slice())?;
        let groups = self.artifact.transform.groups();
        let explainer = ShapleyExplainer::new(&groups, &self.artifact.background.rows);
        Ok(explainer.explain(features.as_slice(), |x| self.score_vector(x)))
    }
}
