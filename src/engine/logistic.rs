// ==========================================
// 临床风险评分核心 - 逻辑回归
// ==========================================
// 职责: L2 正则逻辑回归 (线性评分器)
// 目标: 0.5·‖w‖² + C·Σ logloss,截距不参与正则
// 求解: 阻尼牛顿迭代 + 回溯线搜索
// ==========================================

use crate::engine::error::{TrainingError, TrainingResult};
use crate::engine::gbdt::check_training_input;
use crate::engine::scorer::{sigmoid, Scorer};
use serde::{Deserialize, Serialize};

/// 逻辑回归超参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticParams {
    /// 正则强度的倒数
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-8,
        }
    }
}

impl LogisticParams {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err(format!("C 必须为正有限数: {}", self.c));
        }
        if self.max_iter == 0 {
            return Err("max_iter 必须大于 0".to_string());
        }
        if !(self.tol > 0.0) {
            return Err(format!("tol 必须为正: {}", self.tol));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LogisticModel {
    pub fn decision(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .weights
                .iter()
                .zip(features.iter())
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    /// 训练
    pub fn fit(rows: &[Vec<f64>], labels: &[f64], params: &LogisticParams) -> TrainingResult<Self> {
        params.validate().map_err(TrainingError::Config)?;
        check_training_input(rows, labels)?;

        let d = rows[0].len();
        // theta = [w_0..w_{d-1}, b]
        let mut theta = vec![0.0; d + 1];
        let mut current = objective(rows, labels, &theta, params.c);
        let mut converged = false;

        for iter in 0..params.max_iter {
            let (gradient, hessian) = gradient_and_hessian(rows, labels, &theta, params.c);
            let direction = solve_symmetric(hessian, gradient).ok_or_else(|| {
                TrainingError::DegenerateFit(format!("逻辑回归 Hessian 奇异 (iter={})", iter))
            })?;

            // 回溯线搜索，保证目标函数单调下降
            let Some((candidate, candidate_objective, step)) =
                line_search(rows, labels, &theta, &direction, current, params.c)
            else {
                tracing::debug!("逻辑回归线搜索未找到下降步 (iter={})", iter);
                break;
            };
            theta = candidate;
            current = candidate_objective;

            let max_move = direction.iter().map(|d| (step * d).abs()).fold(0.0, f64::max);
            if max_move < params.tol {
                converged = true;
                break;
            }
        }

        if !converged {
            tracing::warn!("逻辑回归未在 {} 次迭代内收敛", params.max_iter);
        }
        if theta.iter().any(|t| !t.is_finite()) {
            return Err(TrainingError::DegenerateFit("逻辑回归参数非有限".to_string()));
        }

        let intercept = theta[d];
        theta.truncate(d);
        Ok(Self {
            weights: theta,
            intercept,
        })
    }

    pub fn validate(&self, dimension: usize) -> Result<(), String> {
        if self.weights.len() != dimension {
            return Err(format!(
                "逻辑回归权重维度不匹配: 期望 {}，实际 {}",
                dimension,
                self.weights.len()
            ));
        }
        if !self.intercept.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err("逻辑回归参数非有限".to_string());
        }
        Ok(())
    }
}

impl Scorer for LogisticModel {
    fn score(&self, features: &[f64]) -> f64 {
        sigmoid(self.decision(features))
    }

    fn name(&self) -> &str {
        "logistic"
    }
}

fn linear(row: &[f64], theta: &[f64]) -> f64 {
    let d = row.len();
    theta[d] + row.iter().zip(theta.iter()).map(|(x, w)| x * w).sum::<f64>()
}

/// log(1 + e^z)
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// 回溯线搜索：返回 (新参数, 新目标值, 步长)；找不到下降步时返回 None
fn line_search(
    rows: &[Vec<f64>],
    labels: &[f64],
    theta: &[f64],
    direction: &[f64],
    current: f64,
    c: f64,
) -> Option<(Vec<f64>, f64, f64)> {
    let mut step = 1.0;
    for _ in 0..30 {
        let candidate: Vec<f64> = theta
            .iter()
            .zip(direction.iter())
            .map(|(t, d)| t - step * d)
            .collect();
        let candidate_objective = objective(rows, labels, &candidate, c);
        if candidate_objective <= current {
            return Some((candidate, candidate_objective, step));
        }
        step *= 0.5;
    }
    None
}

fn objective(rows: &[Vec<f64>], labels: &[f64], theta: &[f64], c: f64) -> f64 {
    let d = rows[0].len();
    let penalty = 0.5 * theta[..d].iter().map(|w| w * w).sum::<f64>();
    let loss: f64 = rows
        .iter()
        .zip(labels.iter())
        .map(|(row, &y)| {
            let z = linear(row, theta);
            softplus(z) - y * z
        })
        .sum();
    penalty + c * loss
}

fn gradient_and_hessian(
    rows: &[Vec<f64>],
    labels: &[f64],
    theta: &[f64],
    c: f64,
) -> (Vec<f64>, Vec<Vec<f64>>) {
    let d = rows[0].len();
    let m = d + 1;
    let mut gradient = vec![0.0; m];
    let mut hessian = vec![vec![0.0; m]; m];

    for (row, &y) in rows.iter().zip(labels.iter()) {
        let p = sigmoid(linear(row, theta));
        let r = c * (p - y);
        let s = c * p * (1.0 - p);
        for j in 0..m {
            let xj = if j < d { row[j] } else { 1.0 };
            gradient[j] += r * xj;
            for k in 0..=j {
                let xk = if k < d { row[k] } else { 1.0 };
                hessian[j][k] += s * xj * xk;
            }
        }
    }

    for j in 0..m {
        for k in 0..j {
            hessian[k][j] = hessian[j][k];
        }
    }
    for j in 0..d {
        gradient[j] += theta[j];
        hessian[j][j] += 1.0;
    }
    // 截距无正则，加微小抖动保证正定
    hessian[d][d] += 1e-10;

    (gradient, hessian)
}

/// 高斯消元（部分主元）解 A·x = b
fn solve_symmetric(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 || !a[pivot][col].is_finite() {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}
