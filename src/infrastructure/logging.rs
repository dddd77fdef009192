//! 日志系统配置模块
//! 支持结构化日志、日志级别配置和按天轮转的文件日志

use std::path::Path;

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::LoggingConfig;

/// 文件日志后台线程守卫，drop 时刷新剩余日志；调用方需持有到进程退出
#[must_use]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先于配置中的级别。
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let json = config.format == "json";

    if !config.enable_file_logging {
        if json {
            Registry::default()
                .with(filter)
                .with(fmt::layer().json().with_timer(ChronoUtc::rfc_3339()))
                .try_init()?;
        } else {
            Registry::default()
                .with(filter)
                .with(fmt::layer().with_timer(ChronoUtc::rfc_3339()).with_ansi(true))
                .try_init()?;
        }
        return Ok(LoggingGuard { _file_guard: None });
    }

    let log_path = config
        .log_file_path
        .as_deref()
        .map(Path::new)
        .unwrap_or_else(|| Path::new("./logs/agentwallet.log"));
    let log_dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("agentwallet.log");

    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, file_name);
    let (writer, guard) = non_blocking(file_appender);

    if json {
        Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_timer(ChronoUtc::rfc_3339()),
            )
            .with(fmt::layer().json().with_timer(ChronoUtc::rfc_3339()))
            .try_init()?;
    } else {
        Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false),
            )
            .with(fmt::layer().with_timer(ChronoUtc::rfc_3339()).with_ansi(true))
            .try_init()?;
    }

    Ok(LoggingGuard {
        _file_guard: Some(guard),
    })
}

/// 简化初始化（使用默认配置，仅控制台）
pub fn init_default_logging() {
    let config = LoggingConfig {
        enable_file_logging: false,
        ..LoggingConfig::default()
    };
    if let Err(e) = init_logging(&config) {
        eprintln!("Failed to initialize logging: {}", e);
        // 回退到最基本的日志初始化
        let _ = tracing_subscriber::fmt().try_init();
    }
}
