// ==========================================
// 临床风险评分核心 - 模型评估指标
// ==========================================
// 职责: 区分度 (ROC-AUC / 准确率 / 精确率 / 召回率 / 特异度 / F1)
//       与校准度 (Brier) 评估
// 说明: 只在校准器从未见过的测试集上计算
// ==========================================

use crate::engine::calibration::expected_calibration_error;
use serde::{Deserialize, Serialize};

/// 二分类判定阈值（与 predict 的 argmax 语义一致：p > 0.5 为正类）
pub const DECISION_THRESHOLD: f64 = 0.5;

/// 期望校准误差分桶数
pub const ECE_BINS: usize = 10;

/// 混淆矩阵计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(probabilities: &[f64], labels: &[bool], threshold: f64) -> Self {
        let mut matrix = Self::default();
        for (&p, &label) in probabilities.iter().zip(labels.iter()) {
            match (p > threshold, label) {
                (true, true) => matrix.true_positive += 1,
                (true, false) => matrix.false_positive += 1,
                (false, true) => matrix.false_negative += 1,
                (false, false) => matrix.true_negative += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    /// 召回率 = 灵敏度
    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn specificity(&self) -> f64 {
        ratio(self.true_negative, self.true_negative + self.false_positive)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

// 分母为 0 时记 0
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// ROC-AUC（Mann-Whitney 统计量，并列分数取平均秩）
///
/// 单一类别时返回 0.5
pub fn roc_auc(probabilities: &[f64], labels: &[bool]) -> f64 {
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut pairs: Vec<(f64, bool)> = probabilities
        .iter()
        .copied()
        .zip(labels.iter().copied())
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut positive_rank_sum = 0.0;
    let mut i = 0;
    while i < pairs.len() {
        let mut j = i;
        while j + 1 < pairs.len() && pairs[j + 1].0 == pairs[i].0 {
            j += 1;
        }
        // 秩从 1 开始
        let average_rank = (i + j) as f64 / 2.0 + 1.0;
        let positives = pairs[i..=j].iter().filter(|(_, l)| *l).count();
        positive_rank_sum += average_rank * positives as f64;
        i = j + 1;
    }

    let n_pos_f = n_pos as f64;
    (positive_rank_sum - n_pos_f * (n_pos_f + 1.0) / 2.0) / (n_pos_f * n_neg as f64)
}

/// Brier 分数（概率与 0/1 结果的均方误差）
pub fn brier_score(probabilities: &[f64], labels: &[bool]) -> f64 {
    if probabilities.is_empty() {
        return 0.0;
    }
    let total: f64 = probabilities
        .iter()
        .zip(labels.iter())
        .map(|(&p, &l)| {
            let y = if l { 1.0 } else { 0.0 };
            (p - y).powi(2)
        })
        .sum();
    total / probabilities.len() as f64
}

// ==========================================
// EvaluationReport - 测试集评估报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub test_samples: usize,
    pub roc_auc: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub specificity: f64,
    pub f1: f64,
    pub brier_score: f64,
    #[serde(default)]
    pub expected_calibration_error: f64,
    pub confusion: ConfusionMatrix,
}

impl EvaluationReport {
    pub fn evaluate(probabilities: &[f64], labels: &[bool]) -> Self {
        let confusion = ConfusionMatrix::from_predictions(probabilities, labels, DECISION_THRESHOLD);
        Self {
            test_samples: labels.len(),
            roc_auc: roc_auc(probabilities, labels),
            accuracy: confusion.accuracy(),
            precision: confusion.precision(),
            recall: confusion.recall(),
            specificity: confusion.specificity(),
            f1: confusion.f1(),
            brier_score: brier_score(probabilities, labels),
            expected_calibration_error: expected_calibration_error(probabilities, labels, ECE_BINS),
            confusion,
        }
    }

    /// 输出到日志
    pub fn log(&self) {
        tracing::info!("==================================================");
        tracing::info!("模型评估 (测试集 {} 条)", self.test_samples);
        tracing::info!("--------------------------------------------------");
        tracing::info!("区分度  ROC AUC: {:.4}  准确率: {:.4}", self.roc_auc, self.accuracy);
        tracing::info!(
            "分类    精确率: {:.4}  召回率: {:.4}  特异度: {:.4}  F1: {:.4}",
            self.precision,
            self.recall,
            self.specificity,
            self.f1
        );
        tracing::info!(
            "校准度  Brier: {:.4}  ECE: {:.4}",
            self.brier_score,
            self.expected_calibration_error
        );
        tracing::info!(
            "混淆矩阵 TN={} FP={} FN={} TP={}",
            self.confusion.true_negative,
            self.confusion.false_positive,
            self.confusion.false_negative,
            self.confusion.true_positive
        );
        tracing::info!("==================================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let labels = vec![false, false, true, true];
        assert_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &labels), 1.0);
        assert_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &labels), 0.0);
    }

    #[test]
    fn test_roc_auc_ties_count_half() {
        let labels = vec![false, true];
        assert_eq!(roc_auc(&[0.4, 0.4], &labels), 0.5);

        let labels = vec![false, false, true, true];
        // 一对并列：(0.5 负, 0.5 正) 记 0.5，其余 3 对正确
        assert!((roc_auc(&[0.1, 0.5, 0.5, 0.9], &labels) - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_single_class() {
        assert_eq!(roc_auc(&[0.1, 0.9], &[true, true]), 0.5);
    }

    #[test]
    fn test_brier_score() {
        assert_eq!(brier_score(&[1.0, 0.0], &[true, false]), 0.0);
        assert!((brier_score(&[0.5, 0.5], &[true, false]) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_confusion_matrix_metrics() {
        let probabilities = vec![0.9, 0.8, 0.3, 0.6, 0.1, 0.5];
        let labels = vec![true, true, true, false, false, false];
        let m = ConfusionMatrix::from_predictions(&probabilities, &labels, DECISION_THRESHOLD);
        assert_eq!(
            m,
            ConfusionMatrix {
                true_negative: 2,
                false_positive: 1,
                false_negative: 1,
                true_positive: 2,
            }
        );
        assert!((m.accuracy() - 4.0 / 6.0).abs() < 1e-12);
        assert!((m.precision() - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall() - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.specificity() - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_is_zero() {
        let m = ConfusionMatrix::from_predictions(&[0.1, 0.2], &[false, false], DECISION_THRESHOLD);
        assert_eq!(m.precision(), 0.0);
        assert_eq!(m.recall(), 0.0);
        assert_eq!(m.specificity(), 1.0);
    }

    #[test]
    fn test_report_collects_everything() {
        let report = EvaluationReport::evaluate(&[0.9, 0.1], &[true, false]);
        assert_eq!(report.test_samples, 2);
        assert_eq!(report.roc_auc, 1.0);
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.confusion.total(), 2);
        assert!((report.expected_calibration_error - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_report_without_ece_still_parses() {
        let report = EvaluationReport::evaluate(&[0.9, 0.1], &[true, false]);
        let mut doc = serde_json::to_value(&report).unwrap();
        doc.as_object_mut().unwrap().remove("expected_calibration_error");
        let back: EvaluationReport = serde_json::from_value(doc).unwrap();
        assert_eq!(back.expected_calibration_error, 0.0);
        assert_eq!(back.roc_auc, report.roc_auc);
    }
}
