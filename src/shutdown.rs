use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::{debug, info};

/// 优雅关闭管理器：向所有订阅者广播一次性的关闭信号。
pub struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    is_shutdown: AtomicBool,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            shutdown_tx,
            is_shutdown: AtomicBool::new(false),
        }
    }

    /// 订阅关闭信号
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// 触发关闭；重复调用为无操作
    pub fn shutdown(&self) {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            debug!("关闭管理器已经触发过关闭");
            return;
        }

        info!(
            "发送关闭信号给 {} 个订阅者",
            self.shutdown_tx.receiver_count()
        );
        // 可能没有订阅者，忽略发送错误
        let _ = self.shutdown_tx.send(());
    }

    /// 检查是否已经触发关闭
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
