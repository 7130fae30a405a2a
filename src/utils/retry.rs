//! 有上限的重试策略
//!
//! 匹配评分、提示生成等"必须拿到结果"的调用统一通过这里重试，
//! 超过上限时记录日志并返回 [`LlmError::RetriesExhausted`]。

use crate::error::LlmError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// 反复执行 `op`，直到返回 `Some`
    ///
    /// `op` 的参数是从 1 开始的尝试序号。
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, LlmError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        for attempt in 1..=self.max_attempts {
            if let Some(value) = op(attempt).await {
                return Ok(value);
            }
            debug!("{} 第 {}/{} 次尝试未得到可用结果", what, attempt, self.max_attempts);
            if attempt < self.max_attempts && !self.delay.is_zero() {
                sleep(self.delay).await;
            }
        }

        warn!("⚠️ {} 已达到最大重试次数 {}", what, self.max_attempts);
        Err(LlmError::RetriesExhausted {
            what: what.to_string(),
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_returns_first_success() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let result = policy
            .run("测试", |attempt| async move { (attempt == 3).then_some(attempt) })
            .await
            .unwrap();
        assert_eq!(result, 3);
    }

    #[tokio::test]
    async fn test_run_gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let mut calls = 0;
        let result: Result<(), _> = policy
            .run("测试", |_| {
                calls += 1;
                async { None }
            })
            .await;
        assert_eq!(calls, 2);
        assert!(matches!(
            result,
            Err(LlmError::RetriesExhausted { attempts: 2, .. })
        ));
    }
}
