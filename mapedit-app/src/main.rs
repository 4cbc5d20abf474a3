use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use mapedit_config::{AppConfig, ConfigError, FrontendMode};
use mapedit_frontend::loader::InitialSource;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// 地图配置 JSON 编辑器。
#[derive(Debug, Parser)]
#[command(name = "mapedit", version, about = "Map configuration JSON editor")]
#[command(group(ArgGroup::new("frontend").args(["cli", "bevy"])))]
#[command(group(ArgGroup::new("source").args(["file", "url", "paste_file"])))]
struct Args {
    /// 使用交互式命令行前端
    #[arg(long)]
    cli: bool,
    /// 使用 Bevy 桌面前端（需启用 `bevy_app` 特性）
    #[arg(long)]
    bevy: bool,
    /// 显式指定配置文件
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// 启动时载入的 JSON 文件
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
    /// 启动时获取的远程 JSON
    #[arg(long, value_name = "URL")]
    url: Option<String>,
    /// 按粘贴文本处理的文件
    #[arg(long, value_name = "PATH")]
    paste_file: Option<PathBuf>,
}

impl Args {
    fn frontend_override(&self) -> Option<FrontendMode> {
        if self.bevy {
            Some(FrontendMode::Bevy)
        } else if self.cli {
            Some(FrontendMode::Cli)
        } else {
            None
        }
    }

    fn initial_source(&self) -> Option<InitialSource> {
        if let Some(path) = &self.file {
            Some(InitialSource::File(path.clone()))
        } else if let Some(url) = &self.url {
            Some(InitialSource::Url(url.clone()))
        } else {
            self.paste_file.clone().map(InitialSource::PasteFile)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_configuration(args.config.as_ref())?;
    init_logging(&config);
    info!("启动地图 JSON 编辑器");

    let initial = args.initial_source();
    let mode = args
        .frontend_override()
        .unwrap_or(config.frontend.default_mode);
    match mode {
        FrontendMode::Bevy => {
            info!("以 Bevy 模式启动");
            mapedit_frontend::launch_bevy_desktop(&config, initial.as_ref())
                .context("无法启动 Bevy 前端")?;
        }
        FrontendMode::Cli => {
            info!("以 CLI 模式启动");
            mapedit_frontend::run_cli(&config, initial.as_ref()).context("CLI 运行失败")?;
        }
    }
    Ok(())
}

/// 显式指定的配置必须能读取；自动发现失败时退回默认配置。
fn load_configuration(override_path: Option<&PathBuf>) -> Result<AppConfig> {
    if let Some(path) = override_path {
        return AppConfig::from_file(path)
            .with_context(|| format!("加载配置文件 {} 失败", path.display()));
    }
    Ok(match AppConfig::discover() {
        Ok(cfg) => cfg,
        Err(err) => {
            match &err {
                ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                    eprintln!("加载默认配置 {} 失败，使用内建默认值: {err}", path.display());
                }
                ConfigError::Context { .. } => {
                    eprintln!("加载默认配置失败，使用内建默认值: {err}");
                }
            }
            AppConfig::default()
        }
    })
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        warn!("日志系统已初始化");
    }
}
