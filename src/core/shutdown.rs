//! 优雅关闭处理
//!
//! 所有入口（控制台 / API / A2A 服务）都经 `run_with_graceful_shutdown` 运行：
//! - Ctrl+C / SIGTERM 触发关闭信号，入口自行决定如何收尾（停止消费事件流 / 停止接收连接）
//! - 无论入口正常结束、出错还是被中断，进程级工具连接都会释放，且只释放一次

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::AppContext;

/// 释放工具连接的最长等待时间
pub const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

/// 关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// 用户发起的退出 (Ctrl+C)
    UserInitiated,
    /// SIGTERM 信号
    Signal,
}

/// 关闭信号管理器
#[derive(Debug, Default)]
pub struct ShutdownManager {
    token: CancellationToken,
    reason: OnceLock<ShutdownReason>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发关闭；只记录第一次的原因
    pub fn shutdown(&self, reason: ShutdownReason) {
        if self.reason.set(reason).is_ok() {
            tracing::info!(reason = ?reason, "Shutdown requested");
        }
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    /// 等待关闭信号
    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, initiating graceful shutdown...");
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

/// 释放应用上下文持有的工具连接，超时只记日志
pub async fn release_context(ctx: &AppContext, timeout: Duration) {
    if tokio::time::timeout(timeout, ctx.shutdown()).await.is_err() {
        tracing::warn!("Releasing tool connections timed out after {}s", timeout.as_secs());
    }
}

/// 运行入口直到结束，然后释放上下文
///
/// `app` 拿到关闭管理器，自行监听关闭信号；它返回的错误在释放之后原样传回。
pub async fn run_with_graceful_shutdown<T, F, Fut>(
    ctx: Arc<AppContext>,
    shutdown_manager: Arc<ShutdownManager>,
    app: F,
) -> anyhow::Result<T>
where
    F: FnOnce(Arc<ShutdownManager>) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    shutdown_manager.install_signal_handlers();

    let result = app(Arc::clone(&shutdown_manager)).await;
    match &result {
        Ok(_) => tracing::info!("Application finished"),
        Err(e) => tracing::error!("Application failed: {:#}", e),
    }

    release_context(&ctx, RELEASE_TIMEOUT).await;
    result
}
