//! 等保序回归概率校准
//!
//! 用相邻违例合并 (Pool Adjacent Violators) 在 (原始概率, 标签) 样本上拟合
//! 单调不减的阶梯函数,服务期在阈值之间线性插值,阈值范围外截断。
//!
//! 红线: 校准映射单调不减,绝不反转原始集成给出的排序。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotonicCalibrator {
    /// 严格递增的原始概率阈值
    pub thresholds: Vec<f64>,
    /// 对应的校准概率（单调不减，位于 [0, 1]）
    pub values: Vec<f64>,
}

impl Default for IsotonicCalibrator {
    /// 恒等映射
    fn default() -> Self {
        Self {
            thresholds: vec![0.0, 1.0],
            values: vec![0.0, 1.0],
        }
    }
}

impl IsotonicCalibrator {
    /// 在样本上拟合
    ///
    /// 相同原始概率的样本先合并为一个加权点，再执行 PAV。
    /// 空输入返回恒等映射。
    pub fn fit(predictions: &[f64], labels: &[bool]) -> Self {
        debug_assert_eq!(predictions.len(), labels.len());
        if predictions.is_empty() {
            return Self::default();
        }

        let mut pairs: Vec<(f64, f64)> = predictions
            .iter()
            .zip(labels.iter())
            .map(|(&p, &l)| (p, if l { 1.0 } else { 0.0 }))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        // 合并相同 x
        let mut points: Vec<Block> = Vec::new();
        for (x, y) in pairs {
            match points.last_mut() {
                Some(last) if last.x_last == x => {
                    last.sum += y;
                    last.weight += 1.0;
                }
                _ => points.push(Block {
                    x_first: x,
                    x_last: x,
                    sum: y,
                    weight: 1.0,
                }),
            }
        }

        // PAV：栈顶均值小于前一块均值时合并
        let mut stack: Vec<Block> = Vec::with_capacity(points.len());
        for point in points {
            stack.push(point);
            while stack.len() >= 2 {
                let top = stack[stack.len() - 1];
                let prev = stack[stack.len() - 2];
                if prev.mean() > top.mean() {
                    stack.pop();
                    stack.pop();
                    stack.push(prev.merge(top));
                } else {
                    break;
                }
            }
        }

        let mut thresholds = Vec::with_capacity(stack.len() * 2);
        let mut values = Vec::with_capacity(stack.len() * 2);
        for block in &stack {
            let value = block.mean().clamp(0.0, 1.0);
            thresholds.push(block.x_first);
            values.push(value);
            if block.x_last > block.x_first {
                thresholds.push(block.x_last);
                values.push(value);
            }
        }

        Self { thresholds, values }
    }

    /// 原始概率 → 校准概率
    pub fn transform(&self, raw: f64) -> f64 {
        let n = self.thresholds.len();
        if n == 0 {
            return raw.clamp(0.0, 1.0);
        }
        if raw.is_nan() {
            return f64::NAN;
        }
        if raw <= self.thresholds[0] {
            return self.values[0];
        }
        if raw >= self.thresholds[n - 1] {
            return self.values[n - 1];
        }

        // 第一个大于 raw 的阈值
        let hi = self.thresholds.partition_point(|&t| t <= raw);
        let lo = hi - 1;
        let (t0, t1) = (self.thresholds[lo], self.thresholds[hi]);
        let (v0, v1) = (self.values[lo], self.values[hi]);
        let alpha = (raw - t0) / (t1 - t0);
        (v0 + alpha * (v1 - v0)).clamp(0.0, 1.0)
    }

    /// 加载期结构校验
    pub fn validate(&self) -> Result<(), String> {
        if self.thresholds.is_empty() || self.thresholds.len() != self.values.len() {
            return Err(format!(
                "校准表长度无效: thresholds={}, values={}",
                self.thresholds.len(),
                self.values.len()
            ));
        }
        if self.thresholds.iter().chain(self.values.iter()).any(|v| !v.is_finite()) {
            return Err("校准表包含非有限值".to_string());
        }
        if !self.thresholds.windows(2).all(|w| w[0] < w[1]) {
            return Err("校准阈值未严格递增".to_string());
        }
        if !self.values.windows(2).all(|w| w[0] <= w[1]) {
            return Err("校准值不单调".to_string());
        }
        if self.values.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err("校准值超出 [0, 1]".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Block {
    x_first: f64,
    x_last: f64,
    sum: f64,
    weight: f64,
}

impl Block {
    fn mean(&self) -> f64 {
        self.sum / self.weight
    }

    fn merge(self, next: Block) -> Block {
        Block {
            x_first: self.x_first,
            x_last: next.x_last,
            sum: self.sum + next.sum,
            weight: self.weight + next.weight,
        }
    }
}

/// 期望校准误差 (Expected Calibration Error)
pub fn expected_calibration_error(predictions: &[f64], labels: &[bool], n_bins: usize) -> f64 {
    if predictions.is_empty() || n_bins == 0 {
        return 0.0;
    }

    let mut bin_totals = vec![0.0; n_bins];
    let mut bin_positive = vec![0.0; n_bins];
    let mut bin_counts = vec![0usize; n_bins];

    for (&pred, &label) in predictions.iter().zip(labels.iter()) {
        let bin = ((pred * n_bins as f64) as usize).min(n_bins - 1);
        bin_totals[bin] += pred;
        bin_positive[bin] += if label { 1.0 } else { 0.0 };
        bin_counts[bin] += 1;
    }

    let n = predictions.len() as f64;
    (0..n_bins)
        .filter(|&i| bin_counts[i] > 0)
        .map(|i| {
            let count = bin_counts[i] as f64;
            (count / n) * (bin_totals[i] / count - bin_positive[i] / count).abs()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_pools_violators() {
        let predictions = vec![0.1, 0.2, 0.3, 0.4];
        let labels = vec![false, true, false, true];
        let iso = IsotonicCalibrator::fit(&predictions, &labels);
        // (0.2,1) 与 (0.3,0) 违例 → 合并为 0.5
        assert_eq!(iso.thresholds, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(iso.values, vec![0.0, 0.5, 0.5, 1.0]);
        assert!(iso.validate().is_ok());
    }

    #[test]
    fn test_transform_interpolates_and_clamps() {
        let iso = IsotonicCalibrator {
            thresholds: vec![0.2, 0.6],
            values: vec![0.1, 0.5],
        };
        assert!((iso.transform(0.4) - 0.3).abs() < 1e-12);
        assert_eq!(iso.transform(0.0), 0.1);
        assert_eq!(iso.transform(0.99), 0.5);
        assert!(iso.transform(f64::NAN).is_nan());
    }

    #[test]
    fn test_monotonic_on_grid() {
        let predictions: Vec<f64> = (0..200).map(|i| ((i * 37) % 200) as f64 / 200.0).collect();
        let labels: Vec<bool> = (0..200).map(|i| (i * 37 % 200) > 90 + (i % 13) * 3).collect();
        let iso = IsotonicCalibrator::fit(&predictions, &labels);
        assert!(iso.validate().is_ok());

        let mut previous = f64::NEG_INFINITY;
        for step in 0..=1000 {
            let value = iso.transform(step as f64 / 1000.0);
            assert!(value >= previous);
            previous = value;
        }
    }

    #[test]
    fn test_ties_are_averaged() {
        let iso = IsotonicCalibrator::fit(&[0.5, 0.5, 0.5, 0.9], &[true, false, false, true]);
        assert_eq!(iso.thresholds, vec![0.5, 0.9]);
        assert!((iso.values[0] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(iso.values[1], 1.0);
    }

    #[test]
    fn test_single_block_is_constant() {
        let iso = IsotonicCalibrator::fit(&[0.3, 0.7], &[true, false]);
        assert_eq!(iso.values, vec![0.5, 0.5]);
        assert_eq!(iso.transform(0.1), 0.5);
        assert_eq!(iso.transform(0.9), 0.5);
    }

    #[test]
    fn test_empty_fit_is_identity() {
        let iso = IsotonicCalibrator::fit(&[], &[]);
        assert_eq!(iso, IsotonicCalibrator::default());
        assert!((iso.transform(0.42) - 0.42).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_decreasing_values() {
        let iso = IsotonicCalibrator {
            thresholds: vec![0.1, 0.2],
            values: vec![0.6, 0.4],
        };
        assert!(iso.validate().is_err());
    }

    #[test]
    fn test_expected_calibration_error() {
        let predictions = vec![0.1, 0.3, 0.5, 0.7, 0.9];
        let labels = vec![false, false, true, true, true];
        let ece = expected_calibration_error(&predictions, &labels, 5);
        assert!(ece < 0.5);
    }
}
