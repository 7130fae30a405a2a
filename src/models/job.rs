use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 一个待批改的提交（来自 TOML 文件）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingJob {
    /// 题目条件
    pub statement: String,
    /// 学生解答文件（图片或 .txt）
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing, skip_deserializing)]
    pub source: Option<PathBuf>,
}
