use crate::models::{Difficulty, ErrorSpan};
use serde::Serialize;

/// 解答与题目不匹配时的标记
pub const NO_MATCH_MARKER: &str = "__NO_MATCH__";

/// 不匹配时写入提交记录的文本
pub const NO_MATCH_MESSAGE: &str = "解答与题目条件不符";

/// 一次批改的结果
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GradeOutcome {
    /// 匹配分数低于阈值，没有进行错误分析
    NoMatch { score: u8 },
    Graded(GradeReport),
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeReport {
    pub match_score: u8,
    pub spans: Vec<ErrorSpan>,
    pub highlighted: String,
    pub hints: Vec<String>,
    pub difficulty: Difficulty,
    pub accuracy: u8,
    pub total_steps: usize,
    /// 本次新生成的参考解答；命中缓存时为空
    pub reference_solution: String,
    /// 拆分为步骤的参考解答
    pub reference_steps: String,
}

impl GradeOutcome {
    /// 高亮文本，不匹配时为 [`NO_MATCH_MARKER`]
    pub fn display_text(&self) -> &str {
        match self {
            GradeOutcome::NoMatch { .. } => NO_MATCH_MARKER,
            GradeOutcome::Graded(report) => &report.highlighted,
        }
    }

    pub fn hints(&self) -> &[String] {
        match self {
            GradeOutcome::NoMatch { .. } => &[],
            GradeOutcome::Graded(report) => &report.hints,
        }
    }

    pub fn accuracy(&self) -> u8 {
        match self {
            GradeOutcome::NoMatch { .. } => 0,
            GradeOutcome::Graded(report) => report.accuracy,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, GradeOutcome::Graded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match_exports_as_tagged_json() {
        let outcome = GradeOutcome::NoMatch { score: 42 };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "no_match", "score": 42 }));
        assert_eq!(outcome.display_text(), NO_MATCH_MARKER);
    }

    #[test]
    fn test_graded_exports_report_fields() {
        let outcome = GradeOutcome::Graded(GradeReport {
            match_score: 90,
            spans: vec![ErrorSpan { start: 1, end: 3 }],
            highlighted: "a<error>bc</error>".to_string(),
            hints: vec!["h1".into(), "h2".into(), "h3".into()],
            difficulty: Difficulty::Hard,
            accuracy: 50,
            total_steps: 2,
            reference_solution: String::new(),
            reference_steps: "1. abc".to_string(),
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "graded");
        assert_eq!(json["difficulty"], "hard");
        assert_eq!(json["spans"][0]["end"], 3);
        assert_eq!(outcome.accuracy(), 50);
    }
}
