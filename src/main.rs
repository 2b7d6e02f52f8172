// ==========================================
// 临床风险评分核心 - 命令行入口
// ==========================================
// 子命令: train / predict / explain / simulate / inspect
// 输出: 结果以 JSON 写到 stdout,日志写到 stderr
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use clinical_risk_core::api::RiskApi;
use clinical_risk_core::config::{ConfigManager, RiskConfig};
use clinical_risk_core::engine::{ModelArtifact, Modifications, TrainingPipeline};
use clinical_risk_core::logging::{self, LogFormat};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[clap(name = "clinical-risk-core", version, about = "临床风险评分核心")]
struct Cli {
    /// JSON 配置文件
    #[clap(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// 以 JSON 行输出日志
    #[clap(long, global = true)]
    log_json: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 训练并写出模型产物
    Train {
        /// 训练数据 (CSV / Excel)
        #[clap(long, short = 'd')]
        data: Option<PathBuf>,
        /// 产物输出目录
        #[clap(long, short = 'o')]
        out: Option<PathBuf>,
        #[clap(long)]
        seed: Option<u64>,
    },
    /// 评分（输入为单个患者对象或对象数组）
    Predict {
        #[clap(long, short = 'm')]
        model: Option<PathBuf>,
        /// 患者 JSON 文件，"-" 表示 stdin
        #[clap(long, short = 'i', default_value = "-")]
        input: PathBuf,
    },
    /// 特征归因
    Explain {
        #[clap(long, short = 'm')]
        model: Option<PathBuf>,
        #[clap(long, short = 'i', default_value = "-")]
        input: PathBuf,
    },
    /// 干预模拟
    Simulate {
        #[clap(long, short = 'm')]
        model: Option<PathBuf>,
        #[clap(long, short = 'i', default_value = "-")]
        input: PathBuf,
        /// 干预项 field=value，可重复；value 按 JSON 解析，失败时视为字符串
        #[clap(long = "set", short = 's')]
        modifications: Vec<String>,
        /// 同时输出报告
        #[clap(long)]
        report: bool,
    },
    /// 查看产物清单与评估报告
    Inspect {
        #[clap(long, short = 'm')]
        model: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_format(if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    });

    tracing::info!("{} v{}", clinical_risk_core::APP_NAME, clinical_risk_core::VERSION);
    let config = ConfigManager::new(cli.config.clone())
        .load()
        .context("配置加载失败")?;

    match cli.command {
        Command::Train { data, out, seed } => train(config, data, out, seed),
        Command::Predict { model, input } => {
            let api = open_api(&config, model)?;
            let document = read_json(&input)?;
            match document {
                Value::Array(documents) => {
                    let results: Vec<Value> = api
                        .predict_batch(documents)
                        .await
                        .into_iter()
                        .map(|r| match r {
                            Ok(assessment) => serde_json::to_value(assessment).unwrap_or(Value::Null),
                            Err(e) => serde_json::json!({ "error": e.to_string() }),
                        })
                        .collect();
                    print_json(&results)
                }
                single => print_json(&api.predict(&single).await?),
            }
        }
        Command::Explain { model, input } => {
            let api = open_api(&config, model)?;
            let document = read_json(&input)?;
            print_json(&api.explain(&document).await?)
        }
        Command::Simulate {
            model,
            input,
            modifications,
            report,
        } => {
            let api = open_api(&config, model)?;
            let document = read_json(&input)?;
            let modifications = parse_modifications(&modifications)?;
            if report {
                print_json(&api.simulation_report(&document, &modifications).await?)
            } else {
                print_json(&api.simulate(&document, &modifications).await?)
            }
        }
        Command::Inspect { model } => {
            let dir = model.unwrap_or_else(|| config.serving.artifact_dir.clone());
            let artifact = ModelArtifact::load(&dir)
                .with_context(|| format!("无法加载模型产物: {}", dir.display()))?;
            print_json(&artifact.manifest)
        }
    }
}

fn train(
    mut config: RiskConfig,
    data: Option<PathBuf>,
    out: Option<PathBuf>,
    seed: Option<u64>,
) -> Result<()> {
    if let Some(seed) = seed {
        config.training.seed = seed;
    }
    let data = data
        .or_else(|| config.training.data_path.clone())
        .ok_or_else(|| anyhow!("未指定训练数据 (--data 或 CLINICAL_RISK_DATA_PATH)"))?;
    let out = out.unwrap_or_else(|| config.serving.artifact_dir.clone());

    let pipeline = TrainingPipeline::new(config.training)?;
    let outcome = pipeline.run(&data, &out)?;
    tracing::info!("模型产物已写出: {}", out.display());
    print_json(&outcome.report)
}

fn open_api(config: &RiskConfig, model: Option<PathBuf>) -> Result<RiskApi> {
    let dir = model.unwrap_or_else(|| config.serving.artifact_dir.clone());
    let api = RiskApi::load(&dir);
    let health = api.health();
    if !health.model_loaded {
        bail!(
            "风险引擎未就绪: {}",
            health.reason.unwrap_or_else(|| dir.display().to_string())
        );
    }
    Ok(api)
}

fn read_json(path: &Path) -> Result<Value> {
    let text = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("读取 stdin 失败")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("读取输入文件失败: {}", path.display()))?
    };
    serde_json::from_str(&text).context("输入不是合法 JSON")
}

fn parse_modifications(pairs: &[String]) -> Result<Modifications> {
    let mut modifications = Modifications::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("干预项格式应为 field=value: {}", pair))?;
        let value = serde_json::from_str(raw.trim())
            .unwrap_or_else(|_| Value::String(raw.trim().to_string()));
        modifications.insert(key.trim().to_string(), value);
    }
    Ok(modifications)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
