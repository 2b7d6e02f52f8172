// ==========================================
// 临床风险评分核心 - 配置层
// ==========================================
// 职责: 训练与服务配置,支持文件 + 环境变量覆写
// ==========================================

pub mod config_manager;

pub use config_manager::{
    default_artifact_dir, env_keys, ConfigError, ConfigManager, ConfigResult, RiskConfig,
    ServingConfig, TrainingConfig, DEFAULT_TARGET_COLUMN,
};
