// 单元测试用的手工模型产物

use crate::domain::patient::PatientRecord;
use crate::engine::artifact::{
    ArtifactManifest, BackgroundSample, ModelArtifact, StageEntry, ARTIFACT_SCHEMA_VERSION,
};
use crate::engine::calibration::IsotonicCalibrator;
use crate::engine::features::FeatureTransform;
use crate::engine::gbdt::{GradientBoostedTrees, RegressionTree, TreeNode};
use crate::engine::logistic::LogisticModel;
use crate::engine::scorer::BaseScorer;
use crate::engine::voting::SoftVotingEnsemble;
use chrono::Utc;
use uuid::Uuid;

pub(crate) fn patient(
    age: f64,
    bmi: f64,
    hba1c: f64,
    glucose: f64,
    gender: &str,
    smoking: &str,
) -> PatientRecord {
    PatientRecord {
        age: Some(age),
        gender: Some(gender.to_string()),
        bmi: Some(bmi),
        hypertension: Some(false),
        heart_disease: Some(false),
        smoking_history: Some(smoking.to_string()),
        hba1c_level: Some(hba1c),
        blood_glucose_level: Some(glucose),
        ..Default::default()
    }
}

pub(crate) fn training_records() -> Vec<PatientRecord> {
    let mut records = vec![
        patient(25.0, 22.0, 5.0, 90.0, "Female", "never"),
        patient(40.0, 26.0, 5.7, 110.0, "Male", "never"),
        patient(55.0, 30.0, 6.5, 140.0, "Female", "current"),
        patient(65.0, 28.0, 7.0, 160.0, "Male", "current"),
        patient(35.0, 24.0, 5.5, 100.0, "Female", "never"),
        patient(70.0, 33.0, 7.5, 200.0, "Male", "never"),
    ];
    records[5].hypertension = Some(true);
    records
}

/// 维度 11：7 个数值列 + gender(2) + smoking_history(2)
pub(crate) fn sample_artifact() -> ModelArtifact {
    let records = training_records();
    let transform = FeatureTransform::fit(&records).expect("fixture transform");
    let dimension = transform.dimension();

    let mut weights = vec![0.0; dimension];
    weights[0] = 0.3; // age
    weights[3] = 0.4; // bmi
    weights[4] = 1.5; // HbA1c_level
    weights[5] = 0.8; // blood_glucose_level
    let logistic = LogisticModel {
        weights,
        intercept: -1.0,
    };

    let trees = GradientBoostedTrees {
        base_margin: -1.0,
        learning_rate: 1.0,
        trees: vec![RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 4,
                    threshold: 0.0,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: -0.5 },
                TreeNode::Leaf { value: 0.5 },
            ],
        }],
    };

    let ensemble = SoftVotingEnsemble::new(vec![
        BaseScorer::GradientBoosted(trees),
        BaseScorer::Logistic(logistic),
    ])
    .expect("fixture ensemble");

    let rows: Vec<Vec<f64>> = records
        .iter()
        .map(|r| transform.transform(r).expect("fixture row").into_inner())
        .collect();
    let columns = transform.column_names();

    ModelArtifact {
        manifest: ArtifactManifest {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            model_id: Uuid::nil(),
            trained_at: Utc::now(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            seed: 42,
            feature_columns: columns.clone(),
            training_rows: records.len(),
            stages: StageEntry::pipeline(),
            evaluation: None,
        },
        transform,
        ensemble,
        calibrator: IsotonicCalibrator::default(),
        background: BackgroundSample { columns, rows },
    }
}
