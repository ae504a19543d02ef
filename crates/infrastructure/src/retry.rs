use std::future::Future;

use tokio::time::sleep;
use tracing::{info, warn};

use datagate_core::config::RetryConfig;
use datagate_core::{DataGateError, Result};

/// 按重试策略执行连接函数，存储与消息队列两个连接器共用。
///
/// 连接函数每轮收到当前尝试序号（从1开始）；失败后睡眠固定间隔再试。
/// 全部尝试耗尽返回 `ConnectionExhausted`，由调用方终止进程，不暴露降级状态。
pub async fn connect_with_retry<T, F, Fut>(
    target: &str,
    policy: &RetryConfig,
    mut connect: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 1..=policy.max_attempts {
        match connect(attempt).await {
            Ok(handle) => {
                info!("连接 {} 成功 (第{}次尝试)", target, attempt);
                return Ok(handle);
            }
            Err(e) => {
                warn!(
                    "连接 {} 失败 (第{}/{}次尝试): {}",
                    target, attempt, policy.max_attempts, e
                );
                if attempt < policy.max_attempts {
                    sleep(policy.delay()).await;
                }
            }
        }
    }

    Err(DataGateError::ConnectionExhausted {
        target: target.to_string(),
        attempts: policy.max_attempts,
    })
}

/// 按优先级顺序尝试候选主机，返回首个成功的连接。
///
/// 命中之后本轮剩余主机一律跳过，也不会回头重试先前失败的主机；
/// 全部失败时返回最后一个主机的错误。
pub async fn first_reachable<T, F, Fut>(hosts: &[String], mut connect: F) -> Result<T>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;
    for host in hosts {
        match connect(host).await {
            Ok(handle) => return Ok(handle),
            Err(e) => {
                last_error = Some(e);
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| DataGateError::Internal("候选主机列表为空".to_string())))
}
