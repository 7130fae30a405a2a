use serde::Serialize;

/// 解答中的一个推理步骤
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// 规范化后的步骤文本（换行已替换为两个空格）
    pub text: String,
    /// 步骤首次出现在规范化文本中的字符下标
    pub offset: usize,
}

/// 有序的 "步骤文本 → 偏移" 映射
///
/// 同样的步骤文本只保留第一次出现。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepIndex {
    steps: Vec<Step>,
}

impl StepIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加步骤；文本重复时忽略并返回 false
    pub fn insert(&mut self, text: impl Into<String>, offset: usize) -> bool {
        let text = text.into();
        if self.steps.iter().any(|s| s.text == text) {
            return false;
        }
        self.steps.push(Step { text, offset });
        true
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn texts(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.text.clone()).collect()
    }

    pub fn offsets(&self) -> Vec<usize> {
        self.steps.iter().map(|s| s.offset).collect()
    }

    pub fn offset_of(&self, text: &str) -> Option<usize> {
        self.steps.iter().find(|s| s.text == text).map(|s| s.offset)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// 一次步骤拆分的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decomposition {
    /// 所有步骤都在原文中找到
    Anchored(StepIndex),
    /// 重试耗尽，丢弃了找不到的步骤
    Partial { index: StepIndex, dropped: Vec<String> },
    /// 没有拿到任何可解析的拆分
    Failed { attempts: usize },
}

impl Decomposition {
    pub fn index(&self) -> Option<&StepIndex> {
        match self {
            Decomposition::Anchored(index) | Decomposition::Partial { index, .. } => Some(index),
            Decomposition::Failed { .. } => None,
        }
    }

    /// 取出可用的步骤；失败时为空
    pub fn into_index(self) -> StepIndex {
        match self {
            Decomposition::Anchored(index) | Decomposition::Partial { index, .. } => index,
            Decomposition::Failed { .. } => StepIndex::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_first_duplicate() {
        let mut index = StepIndex::new();
        assert!(index.insert("x = 1", 0));
        assert!(!index.insert("x = 1", 10));
        assert!(index.insert("y = 2", 7));
        assert_eq!(index.len(), 2);
        assert_eq!(index.offset_of("x = 1"), Some(0));
        assert_eq!(index.offsets(), vec![0, 7]);
    }

    #[test]
    fn test_failed_decomposition_has_no_steps() {
        let failed = Decomposition::Failed { attempts: 10 };
        assert!(failed.index().is_none());
        assert!(failed.into_index().is_empty());
    }
}
