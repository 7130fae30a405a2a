//! 文本工具
//!
//! 所有位置均为字符（char）下标，而不是字节下标。

use regex::Regex;
use std::sync::OnceLock;

/// 编号列表中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedItem {
    pub number: usize,
    pub text: String,
}

fn item_start() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\.\s").expect("编号起始正则"))
}

fn item_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\d+\.").expect("编号边界正则"))
}

/// 换行替换为两个空格，保证步骤文本能在规范化后的文本中原样找到
pub fn normalize_newlines(text: &str) -> String {
    text.replace('\n', "  ")
}

/// 把规范化文本中的字符下标映射回原文
///
/// 原文的每个 `'\n'` 在规范化文本中占两个位置；落在这两个位置之间的下标
/// 映射到换行之后。
pub fn normalized_to_raw(raw: &str, normalized_idx: usize) -> usize {
    let mut norm = 0;
    for (raw_idx, ch) in raw.chars().enumerate() {
        if norm >= normalized_idx {
            return raw_idx;
        }
        norm += if ch == '\n' { 2 } else { 1 };
    }
    char_len(raw)
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// 按字符下标截取，越界部分自动截断
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let byte_at = |idx: usize| {
        text.char_indices()
            .nth(idx)
            .map(|(b, _)| b)
            .unwrap_or(text.len())
    };
    let start_b = byte_at(start);
    let end_b = byte_at(end.max(start));
    &text[start_b..end_b]
}

/// 从字符下标 `from` 开始查找 `needle`，返回其在 `haystack` 中的绝对字符下标
pub fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let start_b = if from == 0 {
        0
    } else {
        haystack.char_indices().nth(from).map(|(b, _)| b)?
    };
    let rest = &haystack[start_b..];
    rest.find(needle)
        .map(|pos| from + rest[..pos].chars().count())
}

/// 解析 `1. ...\n2. ...` 形式的编号列表
///
/// 每一项从 `\d+\.\s` 开始，可以跨行，直到下一个 `\n\d+\.` 或文本结尾
/// （结尾处的单个换行不计入）。
pub fn parse_numbered_list(text: &str) -> Vec<NumberedItem> {
    let mut items = Vec::new();
    let mut pos = 0;

    while let Some(caps) = item_start().captures_at(text, pos) {
        let (Some(whole), Some(num)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let content_start = whole.end();
        let content_end = match item_boundary().find_at(text, content_start) {
            Some(boundary) => boundary.start(),
            None if text.ends_with('\n') && text.len() > content_start => text.len() - 1,
            None => text.len(),
        };

        items.push(NumberedItem {
            number: num.as_str().parse().unwrap_or(0),
            text: text[content_start..content_end].to_string(),
        });

        if content_end >= text.len() {
            break;
        }
        pos = content_end;
    }

    items
}

/// 去掉首尾空白和一对包裹引号
pub fn strip_quotes(text: &str) -> &str {
    const QUOTES: [(char, char); 5] = [
        ('"', '"'),
        ('\'', '\''),
        ('«', '»'),
        ('“', '”'),
        ('「', '」'),
    ];
    let trimmed = text.trim();
    for (open, close) in QUOTES {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner;
        }
    }
    trimmed
}
