//! 手写解答识别
//!
//! - `.txt`：直接读取
//! - `.png/.jpg/.jpeg/.webp`：转成 base64 data URL，交给视觉模型转写
//! - 其他格式（包括 `.pdf`）：[`FileError::UnsupportedFormat`]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use tracing::{debug, info};

use crate::error::{AppError, FileError};
use crate::infrastructure::OpenAiCompletion;
use crate::utils::RetryPolicy;

/// 把识别出的文本块拼接成完整解答
pub fn join_blocks(blocks: &[String]) -> String {
    blocks.join("\n\n")
}

/// 文件 → 按顺序排列的文本块
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, statement: &str, path: &Path) -> Result<Vec<String>, AppError>;
}

enum SourceKind {
    PlainText,
    Image(&'static str),
}

fn source_kind(path: &Path) -> Option<SourceKind> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "txt" => Some(SourceKind::PlainText),
        "png" => Some(SourceKind::Image("image/png")),
        "jpg" | "jpeg" => Some(SourceKind::Image("image/jpeg")),
        "webp" => Some(SourceKind::Image("image/webp")),
        _ => None,
    }
}

fn transcription_prompt(statement: &str) -> String {
    format!(
        "【手写识别】\n\
         下面的图片是一名学生对这道题的手写解答：\n{}\n\n\
         请逐行转写图片中的全部内容，公式使用 LaTeX。\
         不要改正错误，不要补充步骤，不要输出任何解释。",
        statement
    )
}

/// 基于视觉模型的识别器
pub struct VisionRecognizer {
    client: Arc<OpenAiCompletion>,
    model: String,
    policy: RetryPolicy,
}

impl VisionRecognizer {
    pub fn new(
        client: Arc<OpenAiCompletion>,
        model: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            policy,
        }
    }

    async fn transcribe(&self, statement: &str, data_url: String) -> Result<String, AppError> {
        let prompt = transcription_prompt(statement);
        let images = [data_url];

        let text = self
            .policy
            .run("手写识别", |attempt| {
                let prompt = &prompt;
                let images = &images;
                async move {
                    match self.client.complete_with_images(prompt, &self.model, images).await {
                        Ok(reply) => reply,
                        Err(e) => {
                            debug!("第 {} 次识别失败: {}", attempt, e);
                            None
                        }
                    }
                }
            })
            .await?;

        Ok(text)
    }
}

#[async_trait]
impl TextRecognizer for VisionRecognizer {
    async fn recognize(&self, statement: &str, path: &Path) -> Result<Vec<String>, AppError> {
        let shown = path.display().to_string();
        let kind = source_kind(path).ok_or_else(|| FileError::UnsupportedFormat {
            path: shown.clone(),
        })?;

        match kind {
            SourceKind::PlainText => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| FileError::read_failed(&shown, e))?;
                debug!("读取文本解答: {} ({} 字符)", shown, text.chars().count());
                Ok(vec![text])
            }
            SourceKind::Image(mime) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| FileError::read_failed(&shown, e))?;
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                info!("🖼️ 识别图片: {} ({} 字节)", shown, bytes.len());

                let text = self
                    .transcribe(statement, format!("data:{};base64,{}", mime, encoded))
                    .await?;
                Ok(vec![text])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;

    fn recognizer() -> VisionRecognizer {
        let config = Config::default();
        VisionRecognizer::new(
            Arc::new(OpenAiCompletion::new(&config)),
            config.vision_model,
            RetryPolicy::new(1, Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn test_txt_is_read_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answer.txt");
        std::fs::write(&path, "x + 1 = 2\nx = 1").unwrap();

        let blocks = recognizer().recognize("Solve x + 1 = 2", &path).await.unwrap();

        assert_eq!(join_blocks(&blocks), "x + 1 = 2\nx = 1");
    }

    #[tokio::test]
    async fn test_pdf_is_unsupported() {
        let err = recognizer()
            .recognize("task", Path::new("scan.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::File(FileError::UnsupportedFormat { .. })));
    }

    #[tokio::test]
    async fn test_missing_txt_is_not_found() {
        let err = recognizer()
            .recognize("task", Path::new("/no/such/answer.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::File(FileError::NotFound { .. })));
    }

    #[test]
    fn test_source_kind_is_case_insensitive() {
        assert!(matches!(
            source_kind(Path::new("a.JPG")),
            Some(SourceKind::Image("image/jpeg"))
        ));
        assert!(source_kind(Path::new("noext")).is_none());
    }

    #[test]
    fn test_join_blocks_uses_blank_lines() {
        let blocks = vec!["a".to_string(), "b".to_string()];
        assert_eq!(join_blocks(&blocks), "a\n\nb");
    }
}
