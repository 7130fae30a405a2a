//! 文本补全能力
//!
//! 流水线只依赖这个 trait，具体的 LLM 服务由 [`super::OpenAiCompletion`] 提供。

use crate::error::LlmError;
use async_trait::async_trait;

/// 文本补全能力：`complete(prompt, model) -> text`
///
/// 返回 `Ok(None)` 表示服务正常但回复为空，调用方自行决定是否重试。
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str, model: &str) -> Result<Option<String>, LlmError>;
}
