//! LLM 客户端 - 基础设施层
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（OpenRouter、nscale 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::infrastructure::TextCompletion;

const THINK_END_TAG: &str = "</think>";

/// OpenAI 兼容的文本补全客户端
pub struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompletion {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// 发送文本 + 图片（Vision API）
    ///
    /// # 参数
    /// - `prompt`: 用户消息内容
    /// - `model`: 模型名称
    /// - `image_urls`: 图片 URL，可以是 `data:image/png;base64,...`
    pub async fn complete_with_images(
        &self,
        prompt: &str,
        model: &str,
        image_urls: &[String],
    ) -> Result<Option<String>, LlmError> {
        debug!("调用 LLM API，模型: {}", model);
        debug!("用户消息长度: {} 字符", prompt.len());

        let user_msg = if image_urls.is_empty() {
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| LlmError::api_failed(model, e))?
        } else {
            let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> = Vec::new();

            content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: prompt.to_string(),
                },
            ));

            for url in image_urls {
                content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                    ChatCompletionRequestMessageContentPartImage {
                        image_url: ImageUrl {
                            url: url.clone(),
                            detail: Some(ImageDetail::High),
                        },
                    },
                ));
            }

            debug!("使用 Vision API，包含 {} 张图片", image_urls.len());

            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                .build()
                .map_err(|e| LlmError::api_failed(model, e))?
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| LlmError::api_failed(model, e))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            LlmError::api_failed(model, e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone());

        Ok(content.and_then(|text| clean_reply(&text, model)))
    }
}

#[async_trait]
impl TextCompletion for OpenAiCompletion {
    async fn complete(&self, prompt: &str, model: &str) -> Result<Option<String>, LlmError> {
        self.complete_with_images(prompt, model, &[]).await
    }
}

/// 推理模型会先输出 `<think>...</think>`，只保留之后的正文
///
/// 推理模型的回复里没有结束标签时视为空回复。
fn clean_reply(text: &str, model: &str) -> Option<String> {
    let body = if model.to_lowercase().contains("thinking") {
        text.split_once(THINK_END_TAG).map(|(_, rest)| rest)?
    } else {
        text
    };
    let body = body.trim();
    (!body.is_empty()).then(|| body.to_string())
}
