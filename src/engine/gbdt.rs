// ==========================================
// 临床风险评分核心 - 梯度提升树
// ==========================================
// 职责: 对数损失下的梯度提升回归树 (二阶/牛顿叶值)
// 分裂搜索: 分位数直方图,每列最多 max_bins 个桶
// 红线: 训练过程无随机性,相同输入得到相同模型
// ==========================================

use crate::engine::error::{TrainingError, TrainingResult};
use crate::engine::scorer::{sigmoid, Scorer};
use serde::{Deserialize, Serialize};

/// 梯度提升树超参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// 叶值 L2 正则
    pub lambda: f64,
    /// 子节点最小 hessian 和
    pub min_child_weight: f64,
    pub max_bins: usize,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 3,
            learning_rate: 0.1,
            lambda: 1.0,
            min_child_weight: 1.0,
            max_bins: 64,
        }
    }
}

impl GbdtParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.n_estimators == 0 {
            return Err("n_estimators 必须大于 0".to_string());
        }
        if self.max_depth == 0 {
            return Err("max_depth 必须大于 0".to_string());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(format!("learning_rate 超出 (0, 1]: {}", self.learning_rate));
        }
        if !(self.lambda >= 0.0) || !(self.min_child_weight >= 0.0) {
            return Err("lambda / min_child_weight 不能为负".to_string());
        }
        if self.max_bins < 2 || self.max_bins > u16::MAX as usize {
            return Err(format!("max_bins 超出 [2, 65535]: {}", self.max_bins));
        }
        Ok(())
    }
}

// ==========================================
// 树结构
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// x[feature] < threshold 走左子树
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// 子节点下标必须严格大于父节点（保证无环、可终止）
    fn validate(&self, dimension: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("空树".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { value } if !value.is_finite() => {
                    return Err(format!("叶节点 {} 值非有限", idx));
                }
                TreeNode::Leaf { .. } => {}
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= dimension {
                        return Err(format!("分裂特征越界: {} >= {}", feature, dimension));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("节点 {} 阈值非有限", idx));
                    }
                    if *left <= idx || *right <= idx || *left >= self.nodes.len() || *right >= self.nodes.len() {
                        return Err(format!("节点 {} 子节点下标无效", idx));
                    }
                }
            }
        }
        Ok(())
    }
}

// ==========================================
// GradientBoostedTrees
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    /// 初始 logit（训练集正类比例的对数几率）
    pub base_margin: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    /// 原始 logit
    pub fn margin(&self, features: &[f64]) -> f64 {
        self.base_margin
            + self.learning_rate * self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
    }

    /// 训练
    ///
    /// # 参数
    /// - `rows`: 已变换的特征行
    /// - `labels`: 0/1 标签
    pub fn fit(rows: &[Vec<f64>], labels: &[f64], params: &GbdtParams) -> TrainingResult<Self> {
        params.validate().map_err(TrainingError::Config)?;
        check_training_input(rows, labels)?;

        let n = rows.len();
        let dimension = rows[0].len();
        let binned = BinnedMatrix::build(rows, params.max_bins);

        let positive_rate = labels.iter().sum::<f64>() / n as f64;
        let clipped = positive_rate.clamp(1e-6, 1.0 - 1e-6);
        let base_margin = (clipped / (1.0 - clipped)).ln();

        let mut margins = vec![base_margin; n];
        let mut gradients = vec![0.0; n];
        let mut hessians = vec![0.0; n];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let all_rows: Vec<usize> = (0..n).collect();

        for _ in 0..params.n_estimators {
            for i in 0..n {
                let p = sigmoid(margins[i]);
                gradients[i] = p - labels[i];
                hessians[i] = (p * (1.0 - p)).max(1e-16);
            }

            let builder = TreeBuilder {
                binned: &binned,
                gradients: &gradients,
                hessians: &hessians,
                params,
            };
            let tree = builder.build(&all_rows);

            for (i, row) in rows.iter().enumerate() {
                margins[i] += params.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        tracing::debug!(
            "梯度提升树训练完成: trees={}, dimension={}, base_margin={:.4}",
            trees.len(),
            dimension,
            base_margin
        );

        Ok(Self {
            base_margin,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    pub fn validate(&self, dimension: usize) -> Result<(), String> {
        if !self.base_margin.is_finite() || !self.learning_rate.is_finite() {
            return Err("梯度提升树参数非有限".to_string());
        }
        if self.trees.is_empty() {
            return Err("梯度提升树没有任何树".to_string());
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(dimension)
                .map_err(|e| format!("第 {} 棵树无效: {}", idx, e))?;
        }
        Ok(())
    }
}

impl Scorer for GradientBoostedTrees {
    fn score(&self, features: &[f64]) -> f64 {
        sigmoid(self.margin(features))
    }

    fn name(&self) -> &str {
        "gradient_boosted"
    }
}

pub(crate) fn check_training_input(rows: &[Vec<f64>], labels: &[f64]) -> TrainingResult<()> {
    if rows.is_empty() || rows.len() != labels.len() {
        return Err(TrainingError::DegenerateFit(format!(
            "样本数与标签数不一致或为空: rows={}, labels={}",
            rows.len(),
            labels.len()
        )));
    }
    let dimension = rows[0].len();
    if dimension == 0 || rows.iter().any(|r| r.len() != dimension) {
        return Err(TrainingError::DegenerateFit("特征行维度不一致".to_string()));
    }
    Ok(())
}

// ==========================================
// 直方图分桶
// ==========================================

/// 列式分桶矩阵
///
/// bin(x) = #{cut : cut <= x}，因此 bin <= k 等价于 x < cuts[k]
struct BinnedMatrix {
    cuts: Vec<Vec<f64>>,
    bins: Vec<Vec<u16>>,
}

impl BinnedMatrix {
    fn build(rows: &[Vec<f64>], max_bins: usize) -> Self {
        let dimension = rows[0].len();
        let mut cuts = Vec::with_capacity(dimension);
        let mut bins = Vec::with_capacity(dimension);

        for f in 0..dimension {
            let mut column: Vec<f64> = rows.iter().map(|r| r[f]).collect();
            column.sort_by(|a, b| a.total_cmp(b));
            let feature_cuts = quantile_cuts(&column, max_bins);

            let feature_bins = rows
                .iter()
                .map(|r| feature_cuts.partition_point(|&c| c <= r[f]) as u16)
                .collect();

            cuts.push(feature_cuts);
            bins.push(feature_bins);
        }

        Self { cuts, bins }
    }
}

/// 切分点：唯一值不超过 max_bins 时取相邻唯一值中点，否则取分位点附近的中点
fn quantile_cuts(sorted: &[f64], max_bins: usize) -> Vec<f64> {
    let mut unique = sorted.to_vec();
    unique.dedup();

    let mut cuts = Vec::new();
    if unique.len() <= max_bins {
        for w in unique.windows(2) {
            cuts.push((w[0] + w[1]) / 2.0);
        }
        return cuts;
    }

    let n = sorted.len();
    for j in 1..max_bins {
        let q = j * n / max_bins;
        if q == 0 || q >= n {
            continue;
        }
        let (lo, hi) = (sorted[q - 1], sorted[q]);
        if lo < hi {
            let cut = (lo + hi) / 2.0;
            if cuts.last().map_or(true, |&last| cut > last) {
                cuts.push(cut);
            }
        }
    }
    cuts
}

// ==========================================
// 单棵树构建
// ==========================================

struct TreeBuilder<'a> {
    binned: &'a BinnedMatrix,
    gradients: &'a [f64],
    hessians: &'a [f64],
    params: &'a GbdtParams,
}

struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

impl TreeBuilder<'_> {
    fn build(&self, rows: &[usize]) -> RegressionTree {
        let mut nodes = Vec::new();
        self.grow(&mut nodes, rows, 0);
        RegressionTree { nodes }
    }

    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.params.lambda)
    }

    fn score_term(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    fn grow(&self, nodes: &mut Vec<TreeNode>, rows: &[usize], depth: usize) -> usize {
        let g: f64 = rows.iter().map(|&i| self.gradients[i]).sum();
        let h: f64 = rows.iter().map(|&i| self.hessians[i]).sum();

        let idx = nodes.len();
        nodes.push(TreeNode::Leaf {
            value: self.leaf_value(g, h),
        });

        if depth >= self.params.max_depth || rows.len() < 2 {
            return idx;
        }

        let Some(best) = self.best_split(rows, g, h) else {
            return idx;
        };

        let feature_bins = &self.binned.bins[best.feature];
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&i| (feature_bins[i] as usize) <= best.bin);

        let left = self.grow(nodes, &left_rows, depth + 1);
        let right = self.grow(nodes, &right_rows, depth + 1);
        nodes[idx] = TreeNode::Split {
            feature: best.feature,
            threshold: self.binned.cuts[best.feature][best.bin],
            left,
            right,
        };
        idx
    }

    /// 增益最大的分裂；增益相同时保留先遇到的（列序、桶序），保证确定性
    fn best_split(&self, rows: &[usize], g: f64, h: f64) -> Option<SplitCandidate> {
        let parent = self.score_term(g, h);
        let mut best: Option<SplitCandidate> = None;

        for (feature, cuts) in self.binned.cuts.iter().enumerate() {
            if cuts.is_empty() {
                continue;
            }
            let n_bins = cuts.len() + 1;
            let mut hist_g = vec![0.0; n_bins];
            let mut hist_h = vec![0.0; n_bins];
            let feature_bins = &self.binned.bins[feature];
            for &i in rows {
                let b = feature_bins[i] as usize;
                hist_g[b] += self.gradients[i];
                hist_h[b] += self.hessians[i];
            }

            let (mut gl, mut hl) = (0.0, 0.0);
            for bin in 0..cuts.len() {
                gl += hist_g[bin];
                hl += hist_h[bin];
                let (gr, hr) = (g - gl, h - hl);
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }
                let gain = self.score_term(gl, hl) + self.score_term(gr, hr) - parent;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, bin, gain });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..200 {
            let x = i as f64 / 10.0;
            rows.push(vec![x, (i % 7) as f64]);
            labels.push(if x >= 10.0 { 1.0 } else { 0.0 });
        }
        (rows, labels)
    }

    #[test]
    fn test_learns_threshold() {
        let (rows, labels) = step_data();
        let params = GbdtParams {
            n_estimators: 30,
            ..Default::default()
        };
        let model = GradientBoostedTrees::fit(&rows, &labels, &params).unwrap();
        assert_eq!(model.trees.len(), 30);
        assert!(model.score(&[2.0, 3.0]) < 0.2);
        assert!(model.score(&[18.0, 3.0]) > 0.8);
        assert!(model.validate(2).is_ok());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (rows, labels) = step_data();
        let params = GbdtParams {
            n_estimators: 10,
            ..Default::default()
        };
        let a = GradientBoostedTrees::fit(&rows, &labels, &params).unwrap();
        let b = GradientBoostedTrees::fit(&rows, &labels, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_depth_is_bounded() {
        let (rows, labels) = step_data();
        let params = GbdtParams {
            n_estimators: 3,
            max_depth: 2,
            ..Default::default()
        };
        let model = GradientBoostedTrees::fit(&rows, &labels, &params).unwrap();
        for tree in &model.trees {
            // 深度 2 的二叉树最多 7 个节点
            assert!(tree.nodes.len() <= 7);
        }
    }

    #[test]
    fn test_quantile_cuts_small_unique_set() {
        let cuts = quantile_cuts(&[0.0, 0.0, 1.0, 1.0, 3.0], 64);
        assert_eq!(cuts, vec![0.5, 2.0]);
    }

    #[test]
    fn test_quantile_cuts_are_bounded_and_sorted() {
        let sorted: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let cuts = quantile_cuts(&sorted, 16);
        assert!(cuts.len() <= 15);
        assert!(cuts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_validate_rejects_out_of_range_feature() {
        let model = GradientBoostedTrees {
            base_margin: 0.0,
            learning_rate: 0.1,
            trees: vec![RegressionTree {
                nodes: vec![
                    TreeNode::Split {
                        feature: 5,
                        threshold: 0.0,
                        left: 1,
                        right: 2,
                    },
                    TreeNode::Leaf { value: -1.0 },
                    TreeNode::Leaf { value: 1.0 },
                ],
            }],
        };
        assert!(model.validate(3).is_err());
        assert!(model.validate(6).is_ok());
    }

    #[test]
    fn test_rejects_bad_params() {
        let (rows, labels) = step_data();
        let params = GbdtParams {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            GradientBoostedTrees::fit(&rows, &labels, &params),
            Err(TrainingError::Config(_))
        ));
    }
}
