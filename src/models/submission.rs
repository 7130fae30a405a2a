use crate::models::Difficulty;
use serde::Serialize;
use std::fmt;

/// 提示在数据库中的分隔符
pub const HINT_SEPARATOR: &str = "<SEP>";

/// 提交的处理状态
///
/// `Parsing → CheckSolution → Processing → Ok | ErrorParsing`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmissionStatus {
    Parsing,
    CheckSolution,
    Processing,
    Ok,
    ErrorParsing,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Parsing => "Parsing",
            SubmissionStatus::CheckSolution => "Check solution",
            SubmissionStatus::Processing => "Processing",
            SubmissionStatus::Ok => "OK",
            SubmissionStatus::ErrorParsing => "Error Parsing",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "Parsing" => Some(SubmissionStatus::Parsing),
            "Check solution" => Some(SubmissionStatus::CheckSolution),
            "Processing" => Some(SubmissionStatus::Processing),
            "OK" => Some(SubmissionStatus::Ok),
            "Error Parsing" => Some(SubmissionStatus::ErrorParsing),
            _ => None,
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 数据库中的一条提交记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRecord {
    pub id: i64,
    pub statement: String,
    /// 识别出的文本；批改完成后为高亮结果
    pub solution: String,
    pub status: Option<SubmissionStatus>,
    pub score: f64,
    pub hints: Vec<String>,
    pub created_at: Option<String>,
}

/// 数据库中的一道题目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub id: i64,
    pub title: Option<String>,
    pub statement: String,
    /// 已拆分为步骤的参考解答
    pub solution: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
}

impl TaskRecord {
    /// 缓存中可直接复用的参考解答
    pub fn cached_solution(&self) -> Option<&str> {
        self.solution.as_deref().filter(|s| !s.trim().is_empty())
    }
}

pub fn join_hints(hints: &[String]) -> String {
    hints.join(HINT_SEPARATOR)
}

pub fn split_hints(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(HINT_SEPARATOR).map(str::to_string).collect()
}
