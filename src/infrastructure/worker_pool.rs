//! 并发请求池 - 基础设施层
//!
//! ## 职责
//!
//! - 用 Semaphore 限制同时进行的 LLM 请求数量
//! - 结果按请求下标写回，与完成顺序无关
//! - 空响应按轮次补发，最后仍为空的位置填入 [`EMPTY_SENTINEL`]
//! - 外部取消时放弃尚未开始的请求并向上返回 [`LlmError::Cancelled`]

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::LlmError;
use crate::infrastructure::TextCompletion;

/// 补发之后仍为空的响应
pub const EMPTY_SENTINEL: &str = "None";

/// 并发请求池
///
/// 可以 clone，所有副本共享同一个并发上限。
#[derive(Clone)]
pub struct WorkerPool {
    client: Arc<dyn TextCompletion>,
    semaphore: Arc<Semaphore>,
    retry_rounds: usize,
    retry_delay: Duration,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(
        client: Arc<dyn TextCompletion>,
        max_concurrent: usize,
        retry_rounds: usize,
        retry_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            retry_rounds,
            retry_delay,
            cancel,
        }
    }

    /// 并发发送一批请求，等待全部完成
    ///
    /// 失败或空回复的位置为 `None`。
    pub async fn run_batch(
        &self,
        model: &str,
        prompts: &[String],
    ) -> Result<Vec<Option<String>>, LlmError> {
        if self.cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }

        let mut handles = Vec::with_capacity(prompts.len());

        for (idx, prompt) in prompts.iter().enumerate() {
            let client = self.client.clone();
            let semaphore = self.semaphore.clone();
            let cancel = self.cancel.clone();
            let model = model.to_string();
            let prompt = prompt.clone();

            let handle = tokio::spawn(async move {
                let _permit = tokio::select! {
                    _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                    permit = semaphore.acquire_owned() => permit.map_err(|_| LlmError::Cancelled)?,
                };

                tokio::select! {
                    _ = cancel.cancelled() => Err(LlmError::Cancelled),
                    result = client.complete(&prompt, &model) => match result {
                        Ok(reply) => Ok(reply.filter(|text| !text.trim().is_empty())),
                        Err(e) => {
                            warn!("[请求 {}] LLM 调用失败: {}", idx, e);
                            Ok(None)
                        }
                    },
                }
            });
            handles.push(handle);
        }

        let mut results = vec![None; prompts.len()];
        let mut cancelled = false;

        for (idx, joined) in join_all(handles).await.into_iter().enumerate() {
            match joined {
                Ok(Ok(reply)) => results[idx] = reply,
                Ok(Err(LlmError::Cancelled)) => cancelled = true,
                Ok(Err(e)) => warn!("[请求 {}] 执行失败: {}", idx, e),
                Err(e) => warn!("[请求 {}] 任务执行失败: {}", idx, e),
            }
        }

        if cancelled {
            warn!("⛔ 批次已被取消");
            return Err(LlmError::Cancelled);
        }

        Ok(results)
    }

    /// 发送一批请求，空响应按轮次补发
    ///
    /// 返回值与 `prompts` 一一对应，不会出现空位。
    pub async fn run_until_filled(
        &self,
        model: &str,
        prompts: &[String],
        title: &str,
    ) -> Result<Vec<String>, LlmError> {
        debug!("{}: 发送 {} 个请求，模型: {}", title, prompts.len(), model);
        let mut results = self.run_batch(model, prompts).await?;

        for round in 1..=self.retry_rounds {
            let empty: Vec<usize> = empty_slots(&results);
            if empty.is_empty() {
                break;
            }

            info!("♻️ {} 第 {} 轮补发: {} 个空响应", title, round, empty.len());

            let retry_prompts: Vec<String> = empty.iter().map(|&i| prompts[i].clone()).collect();
            let retry_results = self.run_batch(model, &retry_prompts).await?;
            for (idx, value) in empty.into_iter().zip(retry_results) {
                results[idx] = value;
            }

            if !self.retry_delay.is_zero() {
                sleep(self.retry_delay).await;
            }
        }

        let empty = empty_slots(&results);
        if !empty.is_empty() {
            warn!(
                "⚠️ {} 所有补发完成后仍有 {} 个空响应，替换为 '{}'",
                title,
                empty.len(),
                EMPTY_SENTINEL
            );
        }

        Ok(results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| EMPTY_SENTINEL.to_string()))
            .collect())
    }

    /// 只发送一个请求（带补发）
    pub async fn ask(&self, model: &str, prompt: String, title: &str) -> Result<String, LlmError> {
        let mut results = self.run_until_filled(model, &[prompt], title).await?;
        Ok(results.pop().unwrap_or_else(|| EMPTY_SENTINEL.to_string()))
    }
}

fn empty_slots(results: &[Option<String>]) -> Vec<usize> {
    results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.as_deref().map_or(true, |t| t.trim().is_empty()))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 按 prompt 返回预设回复；每个 prompt 的前 `empty_times` 次返回空
    struct FlakyCompletion {
        empty_times: usize,
        calls: Mutex<HashMap<String, usize>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FlakyCompletion {
        fn new(empty_times: usize) -> Self {
            Self {
                empty_times,
                calls: Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextCompletion for FlakyCompletion {
        async fn complete(&self, prompt: &str, _model: &str) -> Result<Option<String>, LlmError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            // 让后面的请求先完成，验证结果按下标写回
            let delay = prompt.len() as u64 % 3;
            tokio::time::sleep(Duration::from_millis(5 * (3 - delay))).await;

            let count = {
                let mut calls = self.calls.lock().unwrap();
                let count = calls.entry(prompt.to_string()).or_insert(0);
                *count += 1;
                *count
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if count <= self.empty_times {
                Ok(Some("   ".to_string()))
            } else {
                Ok(Some(format!("reply:{}", prompt)))
            }
        }
    }

    fn pool(client: Arc<dyn TextCompletion>, max: usize, rounds: usize) -> WorkerPool {
        WorkerPool::new(client, max, rounds, Duration::ZERO, CancellationToken::new())
    }

    fn prompts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("p{}", "x".repeat(i))).collect()
    }

    #[tokio::test]
    async fn test_results_keep_request_order_and_respect_limit() {
        let client = Arc::new(FlakyCompletion::new(0));
        let pool = pool(client.clone(), 2, 0);
        let prompts = prompts(6);

        let results = pool.run_batch("m", &prompts).await.unwrap();

        for (prompt, result) in prompts.iter().zip(&results) {
            assert_eq!(result.as_deref(), Some(format!("reply:{}", prompt).as_str()));
        }
        assert!(client.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_replies_are_retried() {
        let client = Arc::new(FlakyCompletion::new(1));
        let pool = pool(client, 8, 2);
        let prompts = prompts(3);

        let results = pool.run_until_filled("m", &prompts, "测试").await.unwrap();

        assert_eq!(results[0], format!("reply:{}", prompts[0]));
        assert_eq!(results[2], format!("reply:{}", prompts[2]));
    }

    #[tokio::test]
    async fn test_exhausted_retries_become_sentinel() {
        let client = Arc::new(FlakyCompletion::new(10));
        let pool = pool(client, 8, 2);

        let results = pool.run_until_filled("m", &prompts(2), "测试").await.unwrap();

        assert_eq!(results, vec![EMPTY_SENTINEL.to_string(), EMPTY_SENTINEL.to_string()]);
    }

    #[tokio::test]
    async fn test_cancelled_pool_propagates_cancellation() {
        let client = Arc::new(FlakyCompletion::new(0));
        let token = CancellationToken::new();
        let pool = WorkerPool::new(client, 1, 0, Duration::ZERO, token.clone());
        token.cancel();

        let result = pool.run_until_filled("m", &prompts(3), "测试").await;

        assert!(matches!(result, Err(LlmError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_during_batch_skips_waiting_requests() {
        let client = Arc::new(FlakyCompletion::new(0));
        let token = CancellationToken::new();
        let pool = WorkerPool::new(client.clone(), 1, 0, Duration::ZERO, token.clone());

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                token.cancel();
            })
        };

        let result = pool.run_batch("m", &prompts(20)).await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(LlmError::Cancelled)));
        let started: usize = client.calls.lock().unwrap().values().sum();
        assert!(started < 20);
    }
}
