use serde::Serialize;

/// 原文中的一个错误区间 `[start, end)`（字符下标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ErrorSpan {
    pub start: usize,
    pub end: usize,
}

impl ErrorSpan {
    /// `start >= end` 时返回 None
    pub fn new(start: usize, end: usize) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// 模型对单个步骤的标注回显
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedStepBlock {
    /// 全局步骤下标（从 0 开始）
    pub step: usize,
    pub has_error: bool,
    /// 模型回显的步骤文本（可能带有错误标记）
    pub echo: String,
}
