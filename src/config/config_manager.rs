// ==========================================
// 临床风险评分核心 - 配置管理器
// ==========================================
// 职责: 配置加载、环境变量覆写、取值校验
// 存储: JSON 文件 (全部字段有默认值,可只写需要覆写的项)
// 优先级: 环境变量 > 配置文件 > 内置默认
// ==========================================

use crate::engine::gbdt::GbdtParams;
use crate::engine::logistic::LogisticParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 环境变量名
pub mod env_keys {
    pub const ARTIFACT_DIR: &str = "CLINICAL_RISK_ARTIFACT_DIR";
    pub const DATA_PATH: &str = "CLINICAL_RISK_DATA_PATH";
    pub const SEED: &str = "CLINICAL_RISK_SEED";
}

/// 默认标签列
pub const DEFAULT_TARGET_COLUMN: &str = "diabetes";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读取失败 ({path}): {message}")]
    Read { path: String, message: String },

    #[error("配置文件解析失败 ({path}): {message}")]
    Parse { path: String, message: String },

    #[error("环境变量取值无效 ({key}={value})")]
    InvalidEnv { key: String, value: String },

    #[error("配置取值无效: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// TrainingConfig - 训练配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// 训练数据文件 (CSV / Excel)
    pub data_path: Option<PathBuf>,
    pub target_column: String,
    pub seed: u64,
    /// 测试集比例 (0, 1)
    pub test_fraction: f64,
    /// 校准交叉验证折数 (≥ 2)
    pub cv_folds: usize,
    /// 归因背景样本行数
    pub background_size: usize,
    pub gbdt: GbdtParams,
    pub logistic: LogisticParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            seed: 42,
            test_fraction: 0.2,
            cv_folds: 5,
            background_size: 50,
            gbdt: GbdtParams::default(),
            logistic: LogisticParams::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.target_column.trim().is_empty() {
            return Err("target_column 不能为空".to_string());
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(format!("test_fraction 必须位于 (0, 1): {}", self.test_fraction));
        }
        if self.cv_folds < 2 {
            return Err(format!("cv_folds 至少为 2: {}", self.cv_folds));
        }
        if self.background_size == 0 {
            return Err("background_size 必须大于 0".to_string());
        }
        self.gbdt.validate()?;
        self.logistic.validate()?;
        Ok(())
    }
}

// ==========================================
// ServingConfig - 服务配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    pub artifact_dir: PathBuf,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub training: TrainingConfig,
    pub serving: ServingConfig,
}

impl RiskConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.training.validate().map_err(ConfigError::Invalid)
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// # 参数
    /// - config_path: 配置文件路径；None 表示只用默认值与环境变量
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    /// 加载配置：文件 → 环境变量覆写 → 校验
    pub fn load(&self) -> ConfigResult<RiskConfig> {
        let mut config = match &self.config_path {
            Some(path) => Self::read_file(path)?,
            None => RiskConfig::default(),
        };
        Self::apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        config.validate()?;

        tracing::debug!("配置已加载: {:?}", config);
        Ok(config)
    }

    fn read_file(path: &Path) -> ConfigResult<RiskConfig> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// 以查找函数应用覆写（空白值视为未设置）
    pub fn apply_overrides<F>(config: &mut RiskConfig, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(dir) = read(env_keys::ARTIFACT_DIR) {
            config.serving.artifact_dir = PathBuf::from(dir);
        }
        if let Some(path) = read(env_keys::DATA_PATH) {
            config.training.data_path = Some(PathBuf::from(path));
        }
        if let Some(seed) = read(env_keys::SEED) {
            config.training.seed = seed.parse().map_err(|_| ConfigError::InvalidEnv {
                key: env_keys::SEED.to_string(),
                value: seed.clone(),
            })?;
        }
        Ok(())
    }
}

/// 默认模型产物目录
///
/// - 用户数据目录/clinical-risk-core/model
/// - 无法获取用户数据目录时回退到 ./model
pub fn default_artifact_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(data_dir) => data_dir.join("clinical-risk-core").join("model"),
        None => PathBuf::from("./model"),
    }
}
