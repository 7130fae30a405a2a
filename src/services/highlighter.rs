//! 在原文中用标记包住错误区间

use crate::models::ErrorSpan;

/// 高亮的开闭标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markers {
    pub open: &'static str,
    pub close: &'static str,
}

impl Markers {
    pub const DEFAULT: Markers = Markers {
        open: "<error>",
        close: "</error>",
    };

    /// 旧版前端使用相同的开闭标记
    pub const LEGACY: Markers = Markers {
        open: "<error>",
        close: "<error>",
    };

    pub fn from_legacy_flag(legacy: bool) -> Self {
        if legacy {
            Self::LEGACY
        } else {
            Self::DEFAULT
        }
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self::DEFAULT
    }
}

pub fn highlight(text: &str, spans: &[ErrorSpan]) -> String {
    highlight_with(text, spans, Markers::DEFAULT)
}

/// 按起点排序后依次包住每个区间（字符下标），其余文本原样保留
///
/// 区间互相重叠属于调用方错误，这里不做处理。
pub fn highlight_with(text: &str, spans: &[ErrorSpan], markers: Markers) -> String {
    if spans.is_empty() {
        return text.to_string();
    }

    let mut sorted = spans.to_vec();
    sorted.sort();

    let chars: Vec<char> = text.chars().collect();
    let clamp = |idx: usize| idx.min(chars.len());

    let mut result = String::with_capacity(text.len() + sorted.len() * 16);
    let mut last = 0;
    for span in sorted {
        let start = clamp(span.start).max(last);
        let end = clamp(span.end).max(start);
        result.extend(&chars[last..start]);
        result.push_str(markers.open);
        result.extend(&chars[start..end]);
        result.push_str(markers.close);
        last = end;
    }
    result.extend(&chars[last..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize) -> ErrorSpan {
        ErrorSpan::new(start, end).unwrap()
    }

    #[test]
    fn test_no_spans_is_identity() {
        assert_eq!(highlight("x = 1\ny = 2", &[]), "x = 1\ny = 2");
    }

    #[test]
    fn test_spans_are_sorted_before_wrapping() {
        let text = "a = 1, b = 3";
        let result = highlight(text, &[span(11, 12), span(4, 5)]);
        assert_eq!(result, "a = <error>1</error>, b = <error>3</error>");
    }

    #[test]
    fn test_legacy_markers() {
        let result = highlight_with("abcdef", &[span(2, 4)], Markers::from_legacy_flag(true));
        assert_eq!(result, "ab<error>cd<error>ef");
    }

    #[test]
    fn test_char_indices_with_multibyte_text() {
        let result = highlight("设 x = 2，则 y = 5", &[span(14, 15)]);
        assert_eq!(result, "设 x = 2，则 y = <error>5</error>");
    }

    #[test]
    fn test_span_past_end_is_clamped() {
        assert_eq!(highlight("abc", &[span(2, 9)]), "ab<error>c</error>");
    }
}
