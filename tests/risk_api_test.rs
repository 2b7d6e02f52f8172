// ==========================================
// RiskApi 端到端测试
// ==========================================
// 测试目标: 训练产物 → API 门面 → 评分 / 归因 / 模拟 / 报告 / 批量
// ==========================================

mod helpers;

use async_trait::async_trait;
use clinical_risk_core::api::collaborators::CollaboratorError;
use clinical_risk_core::api::{ApiError, HistoryEntry, HistorySink, ReportMode, RiskApi};
use clinical_risk_core::Modifications;
use helpers::{high_risk_json, low_risk_json, trained_artifact};
use serde_json::json;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MemorySink {
    entries: Mutex<Vec<HistoryEntry>>,
}

#[async_trait]
impl HistorySink for MemorySink {
    async fn record(&self, entry: HistoryEntry) -> Result<(), CollaboratorError> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

#[tokio::test]
async fn test_api_full_flow() {
    let (_dir, artifact_dir) = trained_artifact(23);
    let sink = Arc::new(MemorySink::default());
    let api = RiskApi::load(&artifact_dir).with_history_sink(sink.clone());

    let health = api.health();
    assert!(health.model_loaded);
    assert!(health.model_id.is_some());

    let mut document = high_risk_json();
    document["clinician_id"] = json!("C-01");
    let assessment = api.predict(&document).await.unwrap();
    assert!((0.0..=1.0).contains(&assessment.score));

    // 医生元数据不影响得分
    let plain = api.predict(&high_risk_json()).await.unwrap();
    assert_eq!(plain.score.to_bits(), assessment.score.to_bits());

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].clinician_id.as_deref(), Some("C-01"));
        assert_eq!(entries[1].clinician_id, None);
    }

    let explanation = api.explain(&document).await.unwrap();
    assert_eq!(explanation.score.to_bits(), assessment.score.to_bits());

    let mut modifications = Modifications::new();
    modifications.insert("HbA1c_level".to_string(), json!(5.0));
    let simulation = api.simulate(&document, &modifications).await.unwrap();
    assert_eq!(simulation.original_risk.to_bits(), assessment.score.to_bits());

    let report = api.report(&document).await.unwrap();
    assert_eq!(report.mode, ReportMode::Degraded);
    assert!(!report.text.is_empty());
}

#[tokio::test]
async fn test_batch_matches_single_predictions() {
    let (_dir, artifact_dir) = trained_artifact(29);
    let api = RiskApi::load(&artifact_dir);

    let documents = vec![high_risk_json(), json!({ "age": 40 }), low_risk_json()];
    let results = api.predict_batch(documents).await;

    assert_eq!(results.len(), 3);
    assert!(matches!(results[1], Err(ApiError::InvalidInput(_))));

    let high = api.predict(&high_risk_json()).await.unwrap();
    let low = api.predict(&low_risk_json()).await.unwrap();
    assert_eq!(results[0].as_ref().unwrap().score.to_bits(), high.score.to_bits());
    assert_eq!(results[2].as_ref().unwrap().score.to_bits(), low.score.to_bits());
}

#[tokio::test]
async fn test_api_without_model_refuses_requests() {
    let dir = tempfile::TempDir::new().unwrap();
    let api = RiskApi::load(dir.path());

    let health = api.health();
    assert!(!health.model_loaded);

    let err = api.predict(&high_risk_json()).await.unwrap_err();
    assert!(matches!(err, ApiError::ModelNotLoaded(_)));
    assert!(!err.is_client_error());
}
