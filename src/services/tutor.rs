//! 提示与难度 - 业务能力层
//!
//! - 提示：必须恰好三条，否则重试（次数有上限）
//! - 难度：只请求一次，失败时使用默认难度

use std::slice;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::infrastructure::WorkerPool;
use crate::models::Difficulty;
use crate::services::prompts;
use crate::utils::RetryPolicy;

pub const HINT_COUNT: usize = 3;

fn hint_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:hint|提示|подсказка)\s*\d+\s*[:：.]?").expect("提示标题正则")
    })
}

/// 按 `Hint N:` 标题切分回复，丢弃空段
pub fn parse_hints(reply: &str) -> Vec<String> {
    let headers: Vec<_> = hint_header().find_iter(reply).collect();

    headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let end = headers.get(i + 1).map_or(reply.len(), |next| next.start());
            reply[header.end()..end].trim().to_string()
        })
        .filter(|hint| !hint.is_empty())
        .collect()
}

pub struct Tutor {
    pool: WorkerPool,
    hint_model: String,
    difficulty_model: String,
    policy: RetryPolicy,
}

impl Tutor {
    pub fn new(pool: WorkerPool, config: &Config) -> Self {
        Self {
            pool,
            hint_model: config.assistant_model.clone(),
            difficulty_model: config.decompose_model.clone(),
            policy: RetryPolicy::new(config.hint_max_attempts, config.retry_delay()),
        }
    }

    /// 生成恰好 [`HINT_COUNT`] 条提示
    pub async fn hints(
        &self,
        task: &str,
        wrong_solution: &str,
        correct_solution: &str,
    ) -> Result<Vec<String>, LlmError> {
        let prompt = prompts::hints(task, correct_solution, wrong_solution);

        let hints = self
            .policy
            .run("提示生成", |attempt| {
                let prompt = &prompt;
                async move {
                    match self.pool.run_batch(&self.hint_model, slice::from_ref(prompt)).await {
                        Ok(mut replies) => {
                            let hints = parse_hints(&replies.pop().flatten()?);
                            if hints.len() == HINT_COUNT {
                                Some(Ok(hints))
                            } else {
                                debug!("第 {} 次生成得到 {} 条提示", attempt, hints.len());
                                None
                            }
                        }
                        Err(LlmError::Cancelled) => Some(Err(LlmError::Cancelled)),
                        Err(_) => None,
                    }
                }
            })
            .await??;

        info!("💡 已生成 {} 条提示", hints.len());
        Ok(hints)
    }

    /// 评估题目难度
    ///
    /// 只有任务被取消时返回错误，其他失败都回落到默认难度。
    pub async fn classify_difficulty(&self, task: &str) -> Result<Difficulty, LlmError> {
        let prompt = prompts::difficulty(task);
        let reply = match self
            .pool
            .run_batch(&self.difficulty_model, slice::from_ref(&prompt))
            .await
        {
            Ok(mut replies) => replies.pop().flatten(),
            Err(LlmError::Cancelled) => return Err(LlmError::Cancelled),
            Err(e) => {
                warn!("难度评估失败，使用默认难度: {}", e);
                None
            }
        };

        let difficulty = reply
            .as_deref()
            .map(Difficulty::from_response)
            .unwrap_or_default();
        debug!("题目难度: {}", difficulty);
        Ok(difficulty)
    }
}
