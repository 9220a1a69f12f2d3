//! 优雅关闭处理
//!
//! 统一的关闭信号监听与清理：
//! - Ctrl+C / SIGTERM 触发 CancellationToken，监听循环据此退出
//! - 退出前执行注册的清理任务（如让机器人停止运动），每个任务有超时

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::robot::{ReconnectGuard, SportCommand};

/// 关闭信号管理器
#[derive(Clone, Default)]
pub struct ShutdownManager {
    shutdown_token: CancellationToken,
}

/// 关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// 用户发起的退出（Ctrl+C）
    UserInitiated,
    /// SIGTERM 信号
    Signal,
    /// 输入结束（标准输入 EOF）
    InputClosed,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发关闭；重复调用无副作用
    pub fn shutdown(&self, reason: ShutdownReason) {
        if !self.shutdown_token.is_cancelled() {
            tracing::info!(?reason, "shutdown requested");
        }
        self.shutdown_token.cancel();
    }

    /// 等待关闭信号
    pub async fn wait_for_shutdown(&self) {
        self.shutdown_token.cancelled().await;
    }

    /// 安装系统信号处理器（Ctrl+C, SIGTERM）
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

/// 关闭时需要执行的清理任务
#[async_trait::async_trait]
pub trait ShutdownCleanup: Send + Sync {
    async fn cleanup(&self) -> anyhow::Result<()>;

    /// 清理任务名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 每个清理任务的超时时间（秒）
const CLEANUP_TIMEOUT_SECS: u64 = 5;

/// 关闭协调器：按注册顺序执行清理任务
#[derive(Default)]
pub struct ShutdownCoordinator {
    cleanup_tasks: Vec<Arc<dyn ShutdownCleanup>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: ShutdownCleanup + 'static>(&mut self, task: T) {
        self.cleanup_tasks.push(Arc::new(task));
    }

    pub async fn run_cleanup(&self) {
        tracing::info!("Running {} cleanup tasks...", self.cleanup_tasks.len());

        let timeout = tokio::time::Duration::from_secs(CLEANUP_TIMEOUT_SECS);

        for task in &self.cleanup_tasks {
            let name = task.name();
            match tokio::time::timeout(timeout, task.cleanup()).await {
                Ok(Ok(())) => {
                    tracing::info!("Cleanup task '{}' completed successfully", name);
                }
                Ok(Err(e)) => {
                    tracing::warn!("Cleanup task '{}' failed: {}", name, e);
                }
                Err(_) => {
                    tracing::warn!("Cleanup task '{}' timed out after {}s", name, CLEANUP_TIMEOUT_SECS);
                }
            }
        }

        tracing::info!("All cleanup tasks finished");
    }
}

/// 退出前让机器人停止运动
pub struct RobotStopCleanup {
    guard: Arc<ReconnectGuard>,
}

impl RobotStopCleanup {
    pub fn new(guard: Arc<ReconnectGuard>) -> Self {
        Self { guard }
    }
}

#[async_trait::async_trait]
impl ShutdownCleanup for RobotStopCleanup {
    async fn cleanup(&self) -> anyhow::Result<()> {
        if !self.guard.channel().is_connected() {
            return Ok(());
        }
        self.guard.send_sport(SportCommand::StopMove.into()).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RobotStop"
    }
}
