// ==========================================
// 临床风险评分核心 - 特征归因 (Shapley)
// ==========================================
// 职责: 对单条记录的校准后得分做精确干预式 Shapley 分解
// 值函数: v(S) = mean_b f(x_S, b_¬S)  (S 为特征组联盟, b 为背景样本行)
// 分组: 每个原始输入字段一组,独热列合为一组,交互项单独一组
// 性质: Σ φ_i = f(x) - mean_b f(b)  (浮点误差内精确)
// ==========================================
// 部分失败: 某些联盟评估出现非有限值时,
//   引入非有限值的特征组从博弈中剔除 (固定取背景值),
//   其余特征组在缩减博弈上归因,剔除项记入 omitted
// ==========================================

use crate::domain::assessment::{Explanation, FeatureContribution, OmittedFeature};
use crate::engine::features::FeatureGroup;

/// 精确枚举支持的最大分组数 (2^16 个联盟)
pub const MAX_EXACT_GROUPS: usize = 16;

const NON_FINITE_REASON: &str = "联盟评估出现非有限得分";
const BASELINE_REASON: &str = "背景基线得分非有限，无法归因";

pub struct ShapleyExplainer<'a> {
    groups: &'a [FeatureGroup],
    background: &'a [Vec<f64>],
}

impl<'a> ShapleyExplainer<'a> {
    pub fn new(groups: &'a [FeatureGroup], background: &'a [Vec<f64>]) -> Self {
        debug_assert!(groups.len() <= MAX_EXACT_GROUPS);
        debug_assert!(!background.is_empty());
        Self { groups, background }
    }

    /// 归因
    ///
    /// `model` 为完整评分函数（集成 + 校准），输入已变换的特征向量
    pub fn explain<F>(&self, features: &[f64], model: F) -> Explanation
    where
        F: Fn(&[f64]) -> f64,
    {
        let n = self.groups.len();
        let score = model(features);
        let values = self.coalition_values(features, &model);
        let base_value = values[0];

        let full: usize = (1 << n) - 1;
        // 引入非有限值的特征组：存在有限的 v(S) 但 v(S ∪ {i}) 非有限
        let mut excluded = 0usize;
        for i in 0..n {
            let bit = 1 << i;
            let introduces_non_finite = (0..=full)
                .filter(|s| s & bit == 0)
                .any(|s| values[s].is_finite() && !values[s | bit].is_finite());
            if introduces_non_finite {
                excluded |= bit;
            }
        }

        let allowed = full & !excluded;
        let reduced_is_finite = (0..=full)
            .filter(|s| s & !allowed == 0)
            .all(|s| values[s].is_finite());

        let mut omitted = Vec::new();
        let mut contributions = Vec::new();

        if !reduced_is_finite {
            tracing::warn!("背景基线得分非有限，全部特征无法归因");
            omitted.extend(self.groups.iter().map(|g| OmittedFeature {
                feature: g.name.clone(),
                reason: BASELINE_REASON.to_string(),
            }));
        } else {
            let players = allowed.count_ones() as usize;
            let weights = shapley_weights(players);

            for (i, group) in self.groups.iter().enumerate() {
                let bit = 1 << i;
                if excluded & bit != 0 {
                    omitted.push(OmittedFeature {
                        feature: group.name.clone(),
                        reason: NON_FINITE_REASON.to_string(),
                    });
                    continue;
                }

                let mut phi = 0.0;
                for s in 0..=full {
                    if s & !allowed != 0 || s & bit != 0 {
                        continue;
                    }
                    let size = s.count_ones() as usize;
                    phi += weights[size] * (values[s | bit] - values[s]);
                }
                contributions.push(FeatureContribution {
                    feature: group.name.clone(),
                    contribution: phi,
                });
            }

            if !omitted.is_empty() {
                tracing::warn!("归因部分失败: {} 个特征被剔除", omitted.len());
            }
        }

        // 稳定排序：幅度相同保持原始分组顺序
        contributions.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));

        Explanation {
            score,
            base_value,
            contributions,
            omitted,
        }
    }

    /// 计算全部 2^n 个联盟的值函数
    fn coalition_values<F>(&self, features: &[f64], model: &F) -> Vec<f64>
    where
        F: Fn(&[f64]) -> f64,
    {
        let n = self.groups.len();
        let mut values = Vec::with_capacity(1 << n);
        let mut hybrid = vec![0.0; features.len()];
        let rows = self.background.len() as f64;

        for coalition in 0..(1usize << n) {
            let mut total = 0.0;
            for row in self.background {
                hybrid.copy_from_slice(row);
                for (i, group) in self.groups.iter().enumerate() {
                    if coalition & (1 << i) != 0 {
                        for &col in &group.columns {
                            hybrid[col] = features[col];
                        }
                    }
                }
                total += model(&hybrid);
            }
            values.push(total / rows);
        }
        values
    }
}

/// w(s) = s! (n-s-1)! / n!，s = 0..n-1
fn shapley_weights(n: usize) -> Vec<f64> {
    if n == 0 {
        return vec![];
    }
    // 1 / (n · C(n-1, s))
    let mut weights = Vec::with_capacity(n);
    let mut binomial = 1.0;
    for s in 0..n {
        weights.push(1.0 / (n as f64 * binomial));
        binomial = binomial * (n - 1 - s) as f64 / (s + 1) as f64;
    }
    weights
}
