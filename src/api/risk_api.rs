// ==========================================
// 临床风险评分核心 - 风险评估 API
// ==========================================
// 职责: 面向请求的服务门面
//   评分 / 归因 / 干预模拟 / 报告 / 批量评分
// 输入: JSON 患者文档 (含可选医生元数据)
// 红线: 引擎加载失败后拒绝所有请求,不返回替代得分
// 红线: 历史写入与报告生成失败不影响评分
// ==========================================

use crate::api::collaborators::{
    template_risk_report, template_simulation_report, HistoryEntry, HistorySink, NoOpHistorySink,
    Report, ReportGenerator, RiskReportRequest, SimulationReportRequest,
};
use crate::api::error::{ApiError, ApiResult};
use crate::domain::assessment::{Explanation, RiskAssessment, SimulationResult};
use crate::domain::patient::PatientRecord;
use crate::engine::counterfactual::{CounterfactualSimulator, Modifications};
use crate::engine::error::ModelNotLoadedError;
use crate::engine::risk_engine::RiskEngine;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// 健康状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub model_loaded: bool,
    pub model_id: Option<Uuid>,
    pub reason: Option<String>,
}

// ==========================================
// RiskApi
// ==========================================
pub struct RiskApi {
    engine: Result<Arc<RiskEngine>, ModelNotLoadedError>,
    history: Arc<dyn HistorySink>,
    reporter: Option<Arc<dyn ReportGenerator>>,
}

impl RiskApi {
    pub fn new(engine: Arc<RiskEngine>) -> Self {
        Self::from_engine_result(Ok(engine))
    }

    /// 从产物目录加载；失败时保留原因，所有请求返回 ModelNotLoaded
    pub fn load(path: impl AsRef<Path>) -> Self {
        Self::from_engine_result(RiskEngine::load(path).map(Arc::new))
    }

    fn from_engine_result(engine: Result<Arc<RiskEngine>, ModelNotLoadedError>) -> Self {
        Self {
            engine,
            history: Arc::new(NoOpHistorySink),
            reporter: None,
        }
    }

    pub fn with_history_sink(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = history;
        self
    }

    pub fn with_report_generator(mut self, reporter: Arc<dyn ReportGenerator>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    fn engine(&self) -> ApiResult<&Arc<RiskEngine>> {
        self.engine.as_ref().map_err(|e| ApiError::ModelNotLoaded(e.clone()))
    }

    pub fn health(&self) -> HealthStatus {
        match &self.engine {
            Ok(engine) => HealthStatus {
                model_loaded: true,
                model_id: Some(engine.model_id()),
                reason: None,
            },
            Err(e) => HealthStatus {
                model_loaded: false,
                model_id: None,
                reason: Some(e.to_string()),
            },
        }
    }

    /// 评分并写入历史
    pub async fn predict(&self, document: &Value) -> ApiResult<RiskAssessment> {
        let engine = self.engine()?;
        let record = PatientRecord::from_json(document)?;
        let assessment = engine.assess(&record)?;
        self.record_history(&record, &assessment).await;
        Ok(assessment)
    }

    pub async fn explain(&self, document: &Value) -> ApiResult<Explanation> {
        let engine = self.engine()?;
        let record = PatientRecord::from_json(document)?;
        explain_blocking(engine, record).await
    }

    pub async fn simulate(
        &self,
        document: &Value,
        modifications: &Modifications,
    ) -> ApiResult<SimulationResult> {
        let engine = self.engine()?;
        let record = PatientRecord::from_json(document)?;
        Ok(CounterfactualSimulator::new(engine).simulate(&record, modifications)?)
    }

    /// 风险报告（生成方不可用或失败时降级为模板）
    pub async fn report(&self, document: &Value) -> ApiResult<Report> {
        let engine = self.engine()?;
        let record = PatientRecord::from_json(document)?;
        let assessment = engine.assess(&record)?;
        let explanation = explain_blocking(engine, record.clone()).await?;

        let request = RiskReportRequest {
            record,
            score: assessment.score,
            level: assessment.level,
            explanation,
        };

        if let Some(reporter) = &self.reporter {
            match reporter.risk_report(&request).await {
                Ok(text) => return Ok(Report::generated(text)),
                Err(e) => tracing::warn!("报告生成失败，降级为模板报告: {}", e),
            }
        }
        Ok(Report::degraded(template_risk_report(&request)))
    }

    /// 干预报告
    pub async fn simulation_report(
        &self,
        document: &Value,
        modifications: &Modifications,
    ) -> ApiResult<Report> {
        let simulation = self.simulate(document, modifications).await?;
        let request = SimulationReportRequest {
            record: PatientRecord::from_json(document)?,
            simulation,
        };

        if let Some(reporter) = &self.reporter {
            match reporter.simulation_report(&request).await {
                Ok(text) => return Ok(Report::generated(text)),
                Err(e) => tracing::warn!("干预报告生成失败，降级为模板报告: {}", e),
            }
        }
        Ok(Report::degraded(template_simulation_report(&request)))
    }

    /// 批量评分（每条记录在阻塞线程池上独立评分，结果与输入顺序一致）
    pub async fn predict_batch(&self, documents: Vec<Value>) -> Vec<ApiResult<RiskAssessment>> {
        let engine = match self.engine() {
            Ok(engine) => Arc::clone(engine),
            Err(e) => return documents.iter().map(|_| Err(e.clone())).collect(),
        };

        let tasks = documents.into_iter().map(|document| {
            let engine = Arc::clone(&engine);
            tokio::task::spawn_blocking(move || -> ApiResult<(PatientRecord, RiskAssessment)> {
                let record = PatientRecord::from_json(&document)?;
                let assessment = engine.assess(&record)?;
                Ok((record, assessment))
            })
        });

        let mut results = Vec::new();
        for joined in join_all(tasks).await {
            let result = match joined {
                Ok(Ok((record, assessment))) => {
                    self.record_history(&record, &assessment).await;
                    Ok(assessment)
                }
                Ok(Err(e)) => Err(e),
                Err(e) => Err(ApiError::Internal(format!("评分任务异常终止: {}", e))),
            };
            results.push(result);
        }

        tracing::info!(
            "批量评分完成: 共 {} 条, 失败 {} 条",
            results.len(),
            results.iter().filter(|r| r.is_err()).count()
        );
        results
    }

    async fn record_history(&self, record: &PatientRecord, assessment: &RiskAssessment) {
        let entry = HistoryEntry {
            assessment_id: assessment.assessment_id,
            assessed_at: assessment.assessed_at,
            record: record.clone(),
            score: assessment.score,
            level: assessment.level,
            clinician_id: record.clinician.clinician_id.clone(),
            clinician_name: record.clinician.clinician_name.clone(),
        };
        if let Err(e) = self.history.record(entry).await {
            tracing::warn!(
                "历史记录写入失败 (assessment_id={}): {}",
                assessment.assessment_id,
                e
            );
        }
    }
}

/// 精确归因计算量大，放到阻塞线程池执行
async fn explain_blocking(engine: &Arc<RiskEngine>, record: PatientRecord) -> ApiResult<Explanation> {
    let engine = Arc::clone(engine);
    tokio::task::spawn_blocking(move || engine.explain_risk(&record))
        .await
        .map_err(|e| ApiError::Internal(format!("归因任务异常终止: {}", e)))?
        .map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::collaborators::{CollaboratorError, ReportMode};
    use crate::engine::fixtures::sample_artifact;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn api() -> RiskApi {
        RiskApi::new(Arc::new(RiskEngine::from_artifact(sample_artifact()).unwrap()))
    }

    fn document() -> Value {
        json!({
            "age": 58, "gender": "Male", "bmi": 31.0, "hypertension": 1,
            "heart_disease": 0, "smoking_history": "current", "HbA1c_level": 7.4,
            "blood_glucose_level": 180, "clinician_id": "D-7", "clinician_name": "Dr. Park"
        })
    }

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<HistoryEntry>>,
    }

    #[async_trait]
    impl HistorySink for RecordingSink {
        async fn record(&self, entry: HistoryEntry) -> Result<(), CollaboratorError> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl HistorySink for FailingSink {
        async fn record(&self, _entry: HistoryEntry) -> Result<(), CollaboratorError> {
            Err("history store offline".into())
        }
    }

    struct EchoReporter;

    #[async_trait]
    impl ReportGenerator for EchoReporter {
        async fn risk_report(&self, request: &RiskReportRequest) -> Result<String, CollaboratorError> {
            Ok(format!("generated {}", request.level))
        }

        async fn simulation_report(
            &self,
            _request: &SimulationReportRequest,
        ) -> Result<String, CollaboratorError> {
            Err("model offline".into())
        }
    }

    #[tokio::test]
    async fn test_predict_records_history_with_metadata() {
        let sink = Arc::new(RecordingSink::default());
        let api = api().with_history_sink(sink.clone());

        let assessment = api.predict(&document()).await.unwrap();
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].assessment_id, assessment.assessment_id);
        assert_eq!(entries[0].clinician_id.as_deref(), Some("D-7"));
        assert_eq!(entries[0].clinician_name.as_deref(), Some("Dr. Park"));
    }

    #[tokio::test]
    async fn test_history_failure_does_not_fail_scoring() {
        let api = api().with_history_sink(Arc::new(FailingSink));
        assert!(api.predict(&document()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unloaded_engine_refuses_everything() {
        let dir = tempfile::TempDir::new().unwrap();
        let api = RiskApi::load(dir.path().join("missing"));

        let health = api.health();
        assert!(!health.model_loaded);
        assert!(health.reason.is_some());

        assert!(matches!(
            api.predict(&document()).await,
            Err(ApiError::ModelNotLoaded(ModelNotLoadedError::NotFound(_)))
        ));
        assert!(matches!(
            api.explain(&document()).await,
            Err(ApiError::ModelNotLoaded(_))
        ));
        let batch = api.predict_batch(vec![document(), document()]).await;
        assert!(batch.iter().all(|r| matches!(r, Err(ApiError::ModelNotLoaded(_)))));
    }

    #[tokio::test]
    async fn test_report_falls_back_to_template() {
        let report = api().report(&document()).await.unwrap();
        assert_eq!(report.mode, ReportMode::Degraded);
        assert!(!report.text.is_empty());

        let api = api().with_report_generator(Arc::new(EchoReporter));
        let report = api.report(&document()).await.unwrap();
        assert_eq!(report.mode, ReportMode::Generated);
        assert!(report.text.starts_with("generated"));

        let mut modifications = Modifications::new();
        modifications.insert("HbA1c_level".to_string(), json!(5.6));
        let report = api.simulation_report(&document(), &modifications).await.unwrap();
        assert!(report.is_degraded());
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_isolates_errors() {
        let api = api();
        let mut bad = document();
        bad.as_object_mut().unwrap().remove("bmi");

        let results = api.predict_batch(vec![document(), bad, document()]).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ApiError::InvalidInput(_))));
        assert_eq!(
            results[0].as_ref().unwrap().score,
            results[2].as_ref().unwrap().score
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_explanations_match_engine() {
        let engine = Arc::new(RiskEngine::from_artifact(sample_artifact()).unwrap());
        let api = RiskApi::new(Arc::clone(&engine));
        let expected = engine
            .explain_risk(&PatientRecord::from_json(&document()).unwrap())
            .unwrap();

        let documents: Vec<Value> = (0..4).map(|_| document()).collect();
        let explanations = join_all(documents.iter().map(|d| api.explain(d))).await;
        for explanation in explanations {
            assert_eq!(explanation.unwrap(), expected);
        }

        let report = api.report(&document()).await.unwrap();
        assert!(report.is_degraded());
    }

    #[tokio::test]
    async fn test_explain_rejects_overflowing_record() {
        let mut doc = document();
        doc["age"] = json!(1e200);
        doc["bmi"] = json!(1e200);
        let err = api().explain(&doc).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
        assert!(matches!(api().predict(&doc).await, Err(ApiError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_simulate_unknown_field() {
        let mut modifications = Modifications::new();
        modifications.insert("weight".to_string(), json!(70));
        let err = api().simulate(&document(), &modifications).await.unwrap_err();
        assert!(err.is_client_error());
    }
}
