// ==========================================
// 临床风险评分核心 - 模型产物
// ==========================================
// 职责: 训练一次写出、服务启动时读取一次的不可变模型包
// 布局: 目录内一个清单 + 每个流水线阶段一个独立 JSON 文件
//   manifest.json       版本/模型ID/训练时间/种子/阶段清单/评估报告
//   01_transform.json   特征变换参数
//   02_scorers.json     基础评分器参数
//   03_combiner.json    投票组合描述
//   04_calibrator.json  校准映射表
//   background.json     归因用背景样本 (已变换)
// 红线: 结构不符在加载时整体失败,不允许部分加载
// 红线: 写出先落到临时目录再整体改名,失败不留半成品
// ==========================================

use crate::engine::calibration::IsotonicCalibrator;
use crate::engine::error::{ModelNotLoadedError, TrainingError, TrainingResult};
use crate::engine::explain::MAX_EXACT_GROUPS;
use crate::engine::features::FeatureTransform;
use crate::engine::metrics::EvaluationReport;
use crate::engine::scorer::BaseScorer;
use crate::engine::voting::{CombinerStage, SoftVotingEnsemble, VotingStrategy};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// 产物格式版本
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

pub const MANIFEST_FILE: &str = "manifest.json";

// ==========================================
// 阶段清单
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Transform,
    Scorers,
    Combiner,
    Calibrator,
    Background,
}

impl StageKind {
    /// 流水线顺序
    pub const PIPELINE: [StageKind; 5] = [
        StageKind::Transform,
        StageKind::Scorers,
        StageKind::Combiner,
        StageKind::Calibrator,
        StageKind::Background,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            StageKind::Transform => "01_transform.json",
            StageKind::Scorers => "02_scorers.json",
            StageKind::Combiner => "03_combiner.json",
            StageKind::Calibrator => "04_calibrator.json",
            StageKind::Background => "background.json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEntry {
    pub stage: StageKind,
    pub file: String,
}

impl StageEntry {
    pub fn pipeline() -> Vec<StageEntry> {
        StageKind::PIPELINE
            .iter()
            .map(|&stage| StageEntry {
                stage,
                file: stage.file_name().to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub schema_version: u32,
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
    /// 产出该产物的程序版本
    pub producer_version: String,
    pub seed: u64,
    pub feature_columns: Vec<String>,
    pub training_rows: usize,
    pub stages: Vec<StageEntry>,
    #[serde(default)]
    pub evaluation: Option<EvaluationReport>,
}

/// 背景样本（训练集变换后的代表性子集）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundSample {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

// ==========================================
// ModelArtifact
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub manifest: ArtifactManifest,
    pub transform: FeatureTransform,
    pub ensemble: SoftVotingEnsemble<BaseScorer>,
    pub calibrator: IsotonicCalibrator,
    pub background: BackgroundSample,
}

impl ModelArtifact {
    /// 从目录加载
    ///
    /// # 返回
    /// - Err(NotFound): 路径不存在
    /// - Err(Io/Parse): 文件不可读或 JSON 不合法
    /// - Err(SchemaMismatch): 格式版本不一致
    /// - Err(Invalid): 阶段清单、维度或参数不一致
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ModelNotLoadedError> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Err(ModelNotLoadedError::NotFound(dir.display().to_string()));
        }
        if !dir.is_dir() {
            return Err(ModelNotLoadedError::Invalid(format!(
                "模型产物必须是目录: {}",
                dir.display()
            )));
        }

        let manifest: ArtifactManifest = read_stage(dir, MANIFEST_FILE)?;
        if manifest.schema_version != ARTIFACT_SCHEMA_VERSION {
            return Err(ModelNotLoadedError::SchemaMismatch {
                expected: ARTIFACT_SCHEMA_VERSION,
                actual: manifest.schema_version,
            });
        }
        if manifest.stages != StageEntry::pipeline() {
            return Err(ModelNotLoadedError::Invalid(format!(
                "阶段清单与流水线不一致: {:?}",
                manifest.stages
            )));
        }

        let transform: FeatureTransform = read_stage(dir, StageKind::Transform.file_name())?;
        let scorers: Vec<BaseScorer> = read_stage(dir, StageKind::Scorers.file_name())?;
        let combiner: CombinerStage = read_stage(dir, StageKind::Combiner.file_name())?;
        let calibrator: IsotonicCalibrator = read_stage(dir, StageKind::Calibrator.file_name())?;
        let background: BackgroundSample = read_stage(dir, StageKind::Background.file_name())?;

        let ensemble = SoftVotingEnsemble::new(scorers)
            .ok_or_else(|| ModelNotLoadedError::Invalid("评分器列表为空".to_string()))?;
        if combiner.strategy != VotingStrategy::SoftMean || combiner != ensemble.stage() {
            return Err(ModelNotLoadedError::Invalid(format!(
                "组合器描述与评分器不一致: {:?}",
                combiner.members
            )));
        }

        let artifact = Self {
            manifest,
            transform,
            ensemble,
            calibrator,
            background,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    /// 结构一致性校验（加载与写出前都会执行）
    pub fn validate(&self) -> Result<(), ModelNotLoadedError> {
        self.transform.validate()?;

        let dimension = self.transform.dimension();
        let columns = self.transform.column_names();
        if self.manifest.feature_columns != columns {
            return Err(ModelNotLoadedError::Invalid(
                "清单中的特征列与特征变换不一致".to_string(),
            ));
        }
        if self.background.columns != columns {
            return Err(ModelNotLoadedError::Invalid(
                "背景样本列与特征变换不一致".to_string(),
            ));
        }

        for scorer in self.ensemble.members() {
            scorer.validate(dimension).map_err(ModelNotLoadedError::Invalid)?;
        }
        self.calibrator.validate().map_err(ModelNotLoadedError::Invalid)?;

        if self.background.rows.is_empty() {
            return Err(ModelNotLoadedError::Invalid("背景样本为空".to_string()));
        }
        for (idx, row) in self.background.rows.iter().enumerate() {
            if row.len() != dimension || row.iter().any(|v| !v.is_finite()) {
                return Err(ModelNotLoadedError::Invalid(format!(
                    "背景样本第 {} 行无效",
                    idx
                )));
            }
        }

        let groups = self.transform.groups().len();
        if groups > MAX_EXACT_GROUPS {
            return Err(ModelNotLoadedError::Invalid(format!(
                "归因分组过多: {} > {}",
                groups, MAX_EXACT_GROUPS
            )));
        }
        Ok(())
    }

    /// 写出到目录（原子替换）
    pub fn save(&self, dir: impl AsRef<Path>) -> TrainingResult<()> {
        let dir = dir.as_ref();
        self.validate()
            .map_err(|e| TrainingError::ArtifactWrite(e.to_string()))?;

        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TrainingError::ArtifactWrite(format!("无效的产物目录: {}", dir.display())))?
            .to_string();
        let parent = match dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let staging = parent.join(format!(".{}.partial-{}", name, Uuid::new_v4()));
        fs::create_dir(&staging)?;
        if let Err(e) = self.write_stages(&staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if dir.exists() {
            let backup = parent.join(format!(".{}.old-{}", name, Uuid::new_v4()));
            fs::rename(dir, &backup)?;
            if let Err(e) = fs::rename(&staging, dir) {
                let _ = fs::rename(&backup, dir);
                let _ = fs::remove_dir_all(&staging);
                return Err(e.into());
            }
            if let Err(e) = fs::remove_dir_all(&backup) {
                tracing::warn!("旧产物清理失败 {}: {}", backup.display(), e);
            }
        } else if let Err(e) = fs::rename(&staging, dir) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e.into());
        }

        tracing::info!(
            "模型产物已写出: {} (model_id={})",
            dir.display(),
            self.manifest.model_id
        );
        Ok(())
    }

    fn write_stages(&self, staging: &Path) -> TrainingResult<()> {
        write_stage(staging, MANIFEST_FILE, &self.manifest)?;
        write_stage(staging, StageKind::Transform.file_name(), &self.transform)?;
        write_stage(staging, StageKind::Scorers.file_name(), self.ensemble.members())?;
        write_stage(staging, StageKind::Combiner.file_name(), &self.ensemble.stage())?;
        write_stage(staging, StageKind::Calibrator.file_name(), &self.calibrator)?;
        write_stage(staging, StageKind::Background.file_name(), &self.background)?;
        Ok(())
    }
}

fn read_stage<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T, ModelNotLoadedError> {
    let path = dir.join(file);
    let bytes = fs::read(&path).map_err(|e| ModelNotLoadedError::Io {
        file: file.to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| ModelNotLoadedError::Parse {
        file: file.to_string(),
        message: e.to_string(),
    })
}

fn write_stage<T: Serialize + ?Sized>(dir: &Path, file: &str, value: &T) -> TrainingResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(dir.join(file), bytes)?;
    Ok(())
}
