//! 批改上下文
//!
//! 封装"我正在批改哪一份提交"这一信息，只用于日志

use std::fmt::Display;

use crate::utils::logging::truncate_text;

#[derive(Debug, Clone)]
pub struct GradingCtx {
    /// 提交 ID（没有落库时为 None）
    pub submission_id: Option<i64>,

    /// 题目条件
    pub statement: String,
}

impl GradingCtx {
    pub fn new(submission_id: Option<i64>, statement: impl Into<String>) -> Self {
        Self {
            submission_id,
            statement: statement.into(),
        }
    }
}

impl Display for GradingCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.submission_id {
            Some(id) => write!(f, "[提交#{} {}]", id, truncate_text(&self.statement, 20)),
            None => write!(f, "[{}]", truncate_text(&self.statement, 20)),
        }
    }
}
