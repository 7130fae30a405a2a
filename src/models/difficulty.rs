use serde::{Deserialize, Serialize};
use std::fmt;

/// 题目难度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Medium
    }
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }

    /// 从数据库中的字符串恢复
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            "expert" => Some(Difficulty::Expert),
            _ => None,
        }
    }

    /// 宽松地解析模型回复，识别不了时返回默认难度
    ///
    /// 取第一个命中关键词的词；前面紧跟否定词（`not` / `не`）的词跳过。
    /// 拉丁、西里尔关键词按词首匹配，所以 "несложная" 不会被当成 "сложн"。
    pub fn from_response(response: &str) -> Self {
        let lower = response.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        for (i, word) in words.iter().enumerate() {
            if i > 0 && NEGATIONS.contains(&words[i - 1]) {
                continue;
            }
            for (difficulty, keywords) in KEYWORDS {
                if keywords.iter().any(|kw| mentions(word, kw)) {
                    return difficulty;
                }
            }
        }
        Difficulty::default()
    }
}

const NEGATIONS: [&str; 3] = ["not", "no", "не"];

const KEYWORDS: [(Difficulty, &[&str]); 4] = [
    (
        Difficulty::Easy,
        &["easy", "simple", "легк", "лёгк", "прост", "несложн", "简单", "容易"],
    ),
    (
        Difficulty::Medium,
        &["medium", "moderate", "intermediate", "средн", "中等"],
    ),
    (
        Difficulty::Hard,
        &["hard", "difficult", "сложн", "трудн", "困难"],
    ),
    (
        Difficulty::Expert,
        &["expert", "olympiad", "эксперт", "олимпиад", "专家", "竞赛"],
    ),
];

/// 中文没有空格分词，在词内查找并排除 "不" 开头的否定
fn mentions(word: &str, keyword: &str) -> bool {
    let is_cjk = keyword.chars().any(|c| c >= '\u{2E80}');
    if is_cjk {
        word.contains(keyword) && !word.contains(&format!("不{}", keyword))
    } else {
        word.starts_with(keyword)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response() {
        assert_eq!(Difficulty::from_response("Hard"), Difficulty::Hard);
        assert_eq!(Difficulty::from_response(" easy.\n"), Difficulty::Easy);
        assert_eq!(Difficulty::from_response("средняя"), Difficulty::Medium);
        assert_eq!(Difficulty::from_response("???"), Difficulty::Medium);
    }

    #[test]
    fn test_from_response_respects_negation() {
        assert_eq!(Difficulty::from_response("not easy"), Difficulty::Medium);
        assert_eq!(Difficulty::from_response("несложная"), Difficulty::Easy);
        assert_eq!(Difficulty::from_response("не сложная задача"), Difficulty::Medium);
        assert_eq!(Difficulty::from_response("这道题不简单"), Difficulty::Medium);
        assert_eq!(
            Difficulty::from_response("This is hard, not easy."),
            Difficulty::Hard
        );
    }

    #[test]
    fn test_from_response_localized_levels() {
        assert_eq!(Difficulty::from_response("Лёгкая"), Difficulty::Easy);
        assert_eq!(Difficulty::from_response("Олимпиадная"), Difficulty::Expert);
        assert_eq!(Difficulty::from_response("expert level"), Difficulty::Expert);
        assert_eq!(Difficulty::from_response("难度：困难"), Difficulty::Hard);
        assert_eq!(Difficulty::from_response("uneasy"), Difficulty::Medium);
    }

    #[test]
    fn test_from_str_round_trips_as_str() {
        for d in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard, Difficulty::Expert] {
            assert_eq!(Difficulty::from_str(d.as_str()), Some(d));
        }
        assert_eq!(Difficulty::from_str("unknown"), None);
    }
}
