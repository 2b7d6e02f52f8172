// ==========================================
// 临床风险评分核心 - 训练流水线
// ==========================================
// 流程:
//   1. 分层划分 训练/测试 (固定种子)
//   2. 特征变换在训练集上拟合
//   3. 分层 K 折: 各折补集训练候选集成,收集折外原始概率
//   4. 折外 (原始概率, 标签) 上拟合等保序校准
//   5. 全训练集重训最终集成 (先投票,后校准)
//   6. 测试集评估 (校准器从未见过)
//   7. 抽取背景样本,组装产物
// 红线: 单线程、无隐式随机性;相同种子 + 数据得到相同产物
// 红线: 任一阶段失败整体中止,不写出产物
// ==========================================

use crate::config::TrainingConfig;
use crate::domain::patient::PatientRecord;
use crate::engine::artifact::{
    ArtifactManifest, BackgroundSample, ModelArtifact, StageEntry, ARTIFACT_SCHEMA_VERSION,
};
use crate::engine::calibration::IsotonicCalibrator;
use crate::engine::error::{TrainingError, TrainingResult};
use crate::engine::features::FeatureTransform;
use crate::engine::gbdt::GradientBoostedTrees;
use crate::engine::logistic::LogisticModel;
use crate::engine::metrics::EvaluationReport;
use crate::engine::scorer::BaseScorer;
use crate::engine::voting::SoftVotingEnsemble;
use crate::importer::{DatasetLoader, LabeledRecord};
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::Path;

/// 训练产出
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub report: EvaluationReport,
}

/// 训练/测试划分（存放原数据集下标）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> TrainingResult<Self> {
        config.validate().map_err(TrainingError::Config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// 读取数据集 → 训练 → 写出产物
    pub fn run(&self, data_path: &Path, artifact_dir: &Path) -> TrainingResult<TrainingOutcome> {
        let dataset = DatasetLoader::new(self.config.target_column.as_str()).load(data_path)?;
        let outcome = self.fit(&dataset.records)?;
        outcome.artifact.save(artifact_dir)?;
        Ok(outcome)
    }

    /// 在内存数据上训练（不做任何 I/O）
    pub fn fit(&self, dataset: &[LabeledRecord]) -> TrainingResult<TrainingOutcome> {
        let started = std::time::Instant::now();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        // ===== 1. 划分 =====
        let split = stratified_split(dataset, self.config.test_fraction, self.config.cv_folds, &mut rng)?;
        tracing::info!(
            "数据划分完成: 训练 {} 条, 测试 {} 条 (seed={})",
            split.train.len(),
            split.test.len(),
            self.config.seed
        );

        // ===== 2. 特征变换 =====
        let train_records: Vec<PatientRecord> =
            split.train.iter().map(|&i| dataset[i].record.clone()).collect();
        let transform = FeatureTransform::fit(&train_records)?;
        let (train_rows, train_labels) = transform_rows(&transform, dataset, &split.train)?;
        let (test_rows, test_labels) = transform_rows(&transform, dataset, &split.test)?;
        tracing::info!("特征变换拟合完成: 维度 {}", transform.dimension());

        // ===== 3-4. 折外概率 + 校准 =====
        let folds = stratified_folds(&train_labels, self.config.cv_folds);
        let mut out_of_fold = vec![0.0; train_rows.len()];
        for (fold_idx, held_out) in folds.iter().enumerate() {
            let mut in_fold = vec![false; train_rows.len()];
            for &i in held_out {
                in_fold[i] = true;
            }
            let (rows, labels): (Vec<Vec<f64>>, Vec<bool>) = train_rows
                .iter()
                .zip(train_labels.iter())
                .enumerate()
                .filter(|(i, _)| !in_fold[*i])
                .map(|(_, (row, &label))| (row.clone(), label))
                .unzip();

            let candidate = self.fit_ensemble(&rows, &labels)?;
            for &i in held_out {
                out_of_fold[i] = candidate.raw_probability(&train_rows[i]);
            }
            tracing::debug!("校准折 {}/{} 完成: 留出 {} 条", fold_idx + 1, folds.len(), held_out.len());
        }
        let calibrator = IsotonicCalibrator::fit(&out_of_fold, &train_labels);
        tracing::info!(
            "等保序校准拟合完成: {} 个阈值点 ({} 折)",
            calibrator.thresholds.len(),
            folds.len()
        );

        // ===== 5. 最终集成 =====
        let ensemble = self.fit_ensemble(&train_rows, &train_labels)?;

        // ===== 6. 测试集评估 =====
        let test_probabilities: Vec<f64> = test_rows
            .iter()
            .map(|row| calibrator.transform(ensemble.raw_probability(row)))
            .collect();
        let report = EvaluationReport::evaluate(&test_probabilities, &test_labels);
        report.log();

        // ===== 7. 背景样本 + 产物 =====
        let background_rows: Vec<Vec<f64>> = train_rows
            .iter()
            .take(self.config.background_size)
            .cloned()
            .collect();
        let columns = transform.column_names();
        let model_id = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();

        let artifact = ModelArtifact {
            manifest: ArtifactManifest {
                schema_version: ARTIFACT_SCHEMA_VERSION,
                model_id,
                trained_at: Utc::now(),
                producer_version: crate::VERSION.to_string(),
                seed: self.config.seed,
                feature_columns: columns.clone(),
                training_rows: train_rows.len(),
                stages: StageEntry::pipeline(),
                evaluation: Some(report.clone()),
            },
            transform,
            ensemble,
            calibrator,
            background: BackgroundSample {
                columns,
                rows: background_rows,
            },
        };
        artifact
            .validate()
            .map_err(|e| TrainingError::DegenerateFit(e.to_string()))?;

        tracing::info!(
            "训练完成: model_id={}, 耗时 {:.1}s",
            model_id,
            started.elapsed().as_secs_f64()
        );
        Ok(TrainingOutcome { artifact, report })
    }

    fn fit_ensemble(
        &self,
        rows: &[Vec<f64>],
        labels: &[bool],
    ) -> TrainingResult<SoftVotingEnsemble<BaseScorer>> {
        let targets: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let trees = GradientBoostedTrees::fit(rows, &targets, &self.config.gbdt)?;
        let logistic = LogisticModel::fit(rows, &targets, &self.config.logistic)?;

        SoftVotingEnsemble::new(vec![
            BaseScorer::GradientBoosted(trees),
            BaseScorer::Logistic(logistic),
        ])
        .ok_or_else(|| TrainingError::DegenerateFit("集成成员为空".to_string()))
    }
}

fn transform_rows(
    transform: &FeatureTransform,
    dataset: &[LabeledRecord],
    indices: &[usize],
) -> TrainingResult<(Vec<Vec<f64>>, Vec<bool>)> {
    let mut rows = Vec::with_capacity(indices.len());
    let mut labels = Vec::with_capacity(indices.len());
    for &i in indices {
        let sample = &dataset[i];
        let vector = transform
            .transform(&sample.record)
            .map_err(|source| TrainingError::InvalidRow {
                row: sample.row_number,
                source,
            })?;
        rows.push(vector.into_inner());
        labels.push(sample.label);
    }
    Ok((rows, labels))
}

/// 分层划分：各类别按比例抽取测试集，结果再整体打乱
///
/// 每个类别在训练集中至少保留 `min_train_per_class` 条（满足 K 折分层），
/// 在测试集中至少 1 条。
pub fn stratified_split(
    dataset: &[LabeledRecord],
    test_fraction: f64,
    min_train_per_class: usize,
    rng: &mut ChaCha8Rng,
) -> TrainingResult<TrainTestSplit> {
    let mut positives: Vec<usize> = (0..dataset.len()).filter(|&i| dataset[i].label).collect();
    let mut negatives: Vec<usize> = (0..dataset.len()).filter(|&i| !dataset[i].label).collect();

    let mut train = Vec::with_capacity(dataset.len());
    let mut test = Vec::new();
    for (name, class) in [("正类", &mut positives), ("负类", &mut negatives)] {
        let required = min_train_per_class + 1;
        if class.len() < required {
            return Err(TrainingError::Split(format!(
                "{}样本不足: 需要至少 {} 条, 实际 {} 条",
                name,
                required,
                class.len()
            )));
        }
        class.shuffle(rng);
        let n_test = ((class.len() as f64 * test_fraction).round() as usize)
            .clamp(1, class.len() - min_train_per_class);
        test.extend_from_slice(&class[..n_test]);
        train.extend_from_slice(&class[n_test..]);
    }

    train.shuffle(rng);
    test.shuffle(rng);
    Ok(TrainTestSplit { train, test })
}

/// 分层 K 折：按出现顺序将各类别轮流分配到各折
pub fn stratified_folds(labels: &[bool], k: usize) -> Vec<Vec<usize>> {
    let mut folds = vec![Vec::new(); k];
    let mut next = [0usize; 2];
    for (i, &label) in labels.iter().enumerate() {
        let class = usize::from(label);
        folds[next[class] % k].push(i);
        next[class] += 1;
    }
    folds.retain(|f| !f.is_empty());
    folds
}
