//! 步骤拆分服务 - 业务能力层
//!
//! 把一段解答拆成有序的步骤，并确定每一步在规范化文本中的位置。
//!
//! - 模型输出的每一步都必须能在规范化文本中逐字找到，否则整体重试
//! - 连续失败 `escalate_after` 次后，把模型名中的快速标签换成推理标签
//! - 重试耗尽后丢弃找不到的步骤，只记录警告，不返回错误

use std::slice;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::infrastructure::WorkerPool;
use crate::models::{Decomposition, StepIndex};
use crate::services::prompts;
use crate::utils::text::{find_from, normalize_newlines, parse_numbered_list, strip_quotes};

/// 步骤拆分服务
pub struct StepDecomposer {
    pool: WorkerPool,
    model: String,
    max_attempts: usize,
    escalate_after: usize,
    fast_tag: String,
    deep_tag: String,
}

impl StepDecomposer {
    pub fn new(pool: WorkerPool, config: &Config) -> Self {
        Self {
            pool,
            model: config.assistant_model.clone(),
            max_attempts: config.decompose_max_attempts.max(1),
            escalate_after: config.escalate_after,
            fast_tag: config.fast_model_tag.clone(),
            deep_tag: config.deep_model_tag.clone(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// 起始模型：先降级为快速模型
    fn initial_model(&self) -> String {
        self.model.replace(&self.deep_tag, &self.fast_tag)
    }

    fn escalated_model(&self, model: &str) -> String {
        model.replace(&self.fast_tag, &self.deep_tag)
    }

    /// 拆分解答
    ///
    /// 只有在任务被取消时才返回错误。
    pub async fn decompose(&self, text: &str) -> Result<Decomposition, LlmError> {
        let normalized = normalize_newlines(text);
        if normalized.trim().is_empty() {
            debug!("解答为空，跳过步骤拆分");
            return Ok(Decomposition::Anchored(StepIndex::new()));
        }

        let prompt = prompts::decompose(&normalized);
        let mut model = self.initial_model();
        let mut failures = 0;
        let mut last_steps: Option<Vec<String>> = None;

        for attempt in 1..=self.max_attempts {
            if failures >= self.escalate_after {
                let escalated = self.escalated_model(&model);
                if escalated != model {
                    info!("⬆️ 步骤拆分连续失败 {} 次，切换模型: {}", failures, escalated);
                    model = escalated;
                }
            }

            let reply = self
                .pool
                .run_batch(&model, slice::from_ref(&prompt))
                .await?
                .pop()
                .flatten();

            let steps = reply.as_deref().map(parse_steps).unwrap_or_default();
            if steps.is_empty() {
                debug!("第 {}/{} 次拆分没有得到步骤", attempt, self.max_attempts);
                failures += 1;
                continue;
            }

            let missing = steps
                .iter()
                .filter(|step| find_from(&normalized, step, 0).is_none())
                .count();
            if missing == 0 {
                debug!("第 {} 次拆分成功，共 {} 步", attempt, steps.len());
                return Ok(Decomposition::Anchored(anchor(&normalized, &steps)));
            }

            debug!(
                "第 {}/{} 次拆分有 {} 步无法在原文中找到",
                attempt, self.max_attempts, missing
            );
            failures += 1;
            last_steps = Some(steps);
        }

        match last_steps {
            Some(steps) => {
                let index = anchor(&normalized, &steps);
                let dropped: Vec<String> = steps
                    .into_iter()
                    .filter(|step| index.offset_of(step).is_none())
                    .collect();
                warn!(
                    "⚠️ 无法完整拆分步骤，丢弃 {} 步，保留 {} 步",
                    dropped.len(),
                    index.len()
                );
                Ok(Decomposition::Partial { index, dropped })
            }
            None => {
                warn!("⚠️ 步骤拆分 {} 次均未得到结果", self.max_attempts);
                Ok(Decomposition::Failed {
                    attempts: self.max_attempts,
                })
            }
        }
    }
}

/// 解析模型输出的编号步骤
fn parse_steps(reply: &str) -> Vec<String> {
    parse_numbered_list(reply)
        .into_iter()
        .map(|item| strip_quotes(&item.text).to_string())
        .filter(|step| !step.is_empty())
        .collect()
}

/// 按解析顺序记录每一步第一次出现的位置，找不到的步骤不收录
fn anchor(normalized: &str, steps: &[String]) -> StepIndex {
    let mut index = StepIndex::new();
    for step in steps {
        if let Some(offset) = find_from(normalized, step, 0) {
            index.insert(step.clone(), offset);
        }
    }
    index
}
