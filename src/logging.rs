// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 支持环境变量配置日志级别
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 人类可读文本
    #[default]
    Text,
    /// 每行一个 JSON 对象（供日志采集）
    Json,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=debug 或 RUST_LOG=clinical_risk_core=trace
///
/// # 示例
/// ```no_run
/// use clinical_risk_core::logging;
/// logging::init();
/// ```
pub fn init() {
    init_with_format(LogFormat::Text);
}

pub fn init_with_format(format: LogFormat) {
    // 日志写到 stderr，stdout 留给命令输出
    match format {
        LogFormat::Text => fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(true)
            .init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .with_current_span(false)
            .init(),
    }
}

/// 初始化测试环境的日志系统
///
/// 使用更详细的日志级别，便于调试
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
