// ==========================================
// 集成测试辅助工具
// ==========================================
// 职责: 合成训练数据集、写出 CSV、构造小规模训练配置
// ==========================================

#![allow(dead_code)]

use clinical_risk_core::config::TrainingConfig;
use clinical_risk_core::engine::GbdtParams;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const HEADERS: [&str; 9] = [
    "gender",
    "age",
    "hypertension",
    "heart_disease",
    "smoking_history",
    "bmi",
    "HbA1c_level",
    "blood_glucose_level",
    "diabetes",
];

/// 合成数据行
#[derive(Debug, Clone)]
pub struct SyntheticRow {
    pub gender: &'static str,
    pub age: f64,
    pub hypertension: bool,
    pub heart_disease: bool,
    pub smoking_history: &'static str,
    pub bmi: f64,
    pub hba1c: f64,
    pub glucose: f64,
    pub diabetes: bool,
}

impl SyntheticRow {
    fn cells(&self) -> Vec<String> {
        vec![
            self.gender.to_string(),
            format!("{:.1}", self.age),
            (self.hypertension as u8).to_string(),
            (self.heart_disease as u8).to_string(),
            self.smoking_history.to_string(),
            format!("{:.2}", self.bmi),
            format!("{:.1}", self.hba1c),
            format!("{:.0}", self.glucose),
            (self.diabetes as u8).to_string(),
        ]
    }
}

/// 按固定种子生成数据集；HbA1c 与血糖共同决定标签
pub fn synthetic_rows(n: usize, seed: u64) -> Vec<SyntheticRow> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let hba1c = rng.gen_range(4.0..9.0);
            let glucose = rng.gen_range(80.0..260.0);
            let age = rng.gen_range(18.0..80.0);
            SyntheticRow {
                gender: if rng.gen_bool(0.5) { "Female" } else { "Male" },
                age,
                hypertension: rng.gen_bool(0.2),
                heart_disease: rng.gen_bool(0.1),
                smoking_history: ["never", "former", "current", "No Info"][rng.gen_range(0..4)],
                bmi: rng.gen_range(18.0..40.0),
                hba1c,
                glucose,
                diabetes: hba1c + glucose / 60.0 > 9.5,
            }
        })
        .collect()
}

/// 写出 CSV，返回 (临时目录, 文件路径)
pub fn write_csv(rows: &[SyntheticRow]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("patients.csv");
    write_csv_to(&path, rows);
    (dir, path)
}

pub fn write_csv_to(path: &Path, rows: &[SyntheticRow]) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(HEADERS).unwrap();
    for row in rows {
        writer.write_record(row.cells()).unwrap();
    }
    writer.flush().unwrap();
}

/// 小规模训练配置（测试耗时可控）
pub fn small_config(seed: u64) -> TrainingConfig {
    TrainingConfig {
        seed,
        cv_folds: 3,
        background_size: 12,
        gbdt: GbdtParams {
            n_estimators: 15,
            max_depth: 3,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// 患者 JSON 文档
pub fn patient_json(age: f64, bmi: f64, hba1c: f64, glucose: f64) -> Value {
    json!({
        "age": age,
        "gender": "Female",
        "bmi": bmi,
        "hypertension": 0,
        "heart_disease": 0,
        "smoking_history": "never",
        "HbA1c_level": hba1c,
        "blood_glucose_level": glucose
    })
}

pub fn high_risk_json() -> Value {
    patient_json(62.0, 33.0, 8.6, 240.0)
}

pub fn low_risk_json() -> Value {
    patient_json(30.0, 22.0, 4.6, 95.0)
}

/// 训练并写出产物，返回 (临时目录, 产物目录)
pub fn trained_artifact(seed: u64) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("patients.csv");
    write_csv_to(&csv_path, &synthetic_rows(200, seed));
    let artifact_dir = dir.path().join("model");
    clinical_risk_core::engine::TrainingPipeline::new(small_config(seed))
        .unwrap()
        .run(&csv_path, &artifact_dir)
        .unwrap();
    (dir, artifact_dir)
}
