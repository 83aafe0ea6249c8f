//! 可观测性
//!
//! 控制台日志始终开启（默认 info，可通过 RUST_LOG 覆盖）。配置了 `telemetry.export_path` 时，
//! 额外把事件以 JSON 行写入该文件；文件打不开只记录警告，不影响启动。

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::TelemetrySection;

/// 初始化结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryStatus {
    /// JSON 导出是否生效
    pub export_enabled: bool,
    /// 本次调用是否真正安装了全局 subscriber（重复初始化时为 false）
    pub installed: bool,
}

/// 默认日志级别
pub const DEFAULT_FILTER: &str = "info";

/// RUST_LOG 有效时完全由它决定，否则使用默认级别
fn env_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init(section: &TelemetrySection) -> TelemetryStatus {
    let mut export_error = None;
    let export_layer = section.export_path.as_ref().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(Mutex::new(file)),
            ),
            Err(e) => {
                export_error = Some(format!("{}: {}", path.display(), e));
                None
            }
        }
    });
    let export_enabled = export_layer.is_some();

    let installed = tracing_subscriber::registry()
        .with(env_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref()))
        .with(fmt::layer())
        .with(export_layer)
        .try_init()
        .is_ok();

    if let Some(err) = export_error {
        tracing::warn!("Telemetry export unavailable, console logging only: {}", err);
    }
    if export_enabled {
        tracing::info!("Telemetry export enabled");
    }
    if section.connection_string.is_some() {
        tracing::info!("Telemetry connection string set; remote exporter not built in, using local sinks");
    }

    TelemetryStatus {
        export_enabled,
        installed,
    }
}
