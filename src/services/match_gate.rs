//! 匹配评分：判断解答是否在解这道题
//!
//! 分数低于阈值时不做错误分析。

use std::slice;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::LlmError;
use crate::infrastructure::WorkerPool;
use crate::services::prompts;
use crate::utils::RetryPolicy;

pub struct MatchGate {
    pool: WorkerPool,
    model: String,
    threshold: u8,
    policy: RetryPolicy,
}

impl MatchGate {
    pub fn new(pool: WorkerPool, config: &Config) -> Self {
        Self {
            pool,
            model: config.assistant_model.clone(),
            threshold: config.match_threshold,
            policy: RetryPolicy::new(config.match_max_attempts, config.retry_delay()),
        }
    }

    /// 0..=100 的匹配分数；回复无法解析时重试
    pub async fn score(&self, task: &str, solution: &str) -> Result<u8, LlmError> {
        let prompt = prompts::match_score(task, solution);

        // 取消时返回 Some(Err) 结束重试
        let score = self
            .policy
            .run("匹配评分", |_| {
                let prompt = &prompt;
                async move {
                    match self.pool.run_batch(&self.model, slice::from_ref(prompt)).await {
                        Ok(mut replies) => {
                            let reply = replies.pop().flatten()?;
                            let score = parse_score(&reply);
                            if score.is_none() {
                                debug!("无法解析匹配分数: {:?}", reply);
                            }
                            score.map(Ok)
                        }
                        Err(LlmError::Cancelled) => Some(Err(LlmError::Cancelled)),
                        Err(_) => None,
                    }
                }
            })
            .await??;

        info!("🎯 匹配分数: {}", score);
        Ok(score)
    }

    pub fn passes(&self, score: u8) -> bool {
        score >= self.threshold
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }
}

/// 解析整数分数，允许结尾的 `%`，超过 100 视为无效
pub fn parse_score(reply: &str) -> Option<u8> {
    let value: u32 = reply.trim().trim_end_matches('%').trim().parse().ok()?;
    u8::try_from(value).ok().filter(|v| *v <= 100)
}

/// 正确率：`(总步数 - 错误数) * 100 / 总步数`，向下取整；没有步骤时为 0
pub fn accuracy(n_total: usize, n_errors: usize) -> u8 {
    if n_total == 0 {
        return 0;
    }
    let correct = n_total.saturating_sub(n_errors);
    (correct * 100 / n_total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("85"), Some(85));
        assert_eq!(parse_score(" 80%\n"), Some(80));
        assert_eq!(parse_score("100"), Some(100));
        assert_eq!(parse_score("101"), None);
        assert_eq!(parse_score("-5"), None);
        assert_eq!(parse_score("about 90"), None);
        assert_eq!(parse_score(""), None);
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(10, 3), 70);
        assert_eq!(accuracy(3, 1), 66);
        assert_eq!(accuracy(0, 0), 0);
        assert_eq!(accuracy(0, 5), 0);
        assert_eq!(accuracy(4, 9), 0);
        assert_eq!(accuracy(7, 0), 100);
    }
}
