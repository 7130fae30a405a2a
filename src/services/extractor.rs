//! 错误区间提取
//!
//! 模型把学生的每一步原样回显，并用成对的 `[ERROR]` 标记包住错误片段。
//! 这里把标记还原成学生解答（规范化文本）中的字符区间。
//!
//! 区间计算：候选窗口比错误片段在两侧各多取一个字符，
//! 在原文中找到窗口的位置 `pos` 后，`start = offset + pos + 1`，
//! `end = start + 窗口长度 - 2`。文本边界处缺少的那一侧不扣除。

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::models::{ErrorSpan, MarkedStepBlock};
use crate::services::prompts::ERROR_MARKER;
use crate::utils::text::{find_from, parse_numbered_list};

/// 一对标记对应的候选窗口
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateWindow {
    pub text: String,
    /// 窗口开头是否带了一个边距字符
    pub lead: usize,
    /// 窗口结尾是否带了一个边距字符
    pub trail: usize,
}

/// 拼接各批回复并按步骤对齐
///
/// 回显编号互不相同且都在范围内时按编号对齐，否则按出现顺序对齐。
pub fn parse_marked_steps(responses: &[String], n_steps: usize) -> Vec<MarkedStepBlock> {
    let joined = responses.join("\n");
    let items = parse_numbered_list(&joined);

    let mut seen = HashSet::new();
    let by_number = items
        .iter()
        .all(|item| item.number >= 1 && item.number <= n_steps && seen.insert(item.number));

    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| {
            let step = if by_number { item.number - 1 } else { position };
            MarkedStepBlock {
                step,
                has_error: item.text.contains(ERROR_MARKER),
                echo: item.text,
            }
        })
        .filter(|block| block.step < n_steps)
        .collect()
}

/// 从左到右逐个去掉标记，每两个标记组成一对，返回每对的候选窗口
///
/// 去掉一个标记可能拼出新的标记（如 `[ERROR[ERROR]]`），所以已记录的位置
/// 随每次删除一起平移，最终都落在完全去掉标记的文本上。
pub fn candidate_windows(echo: &str) -> Vec<CandidateWindow> {
    let marker_len = ERROR_MARKER.chars().count();
    let mut positions: Vec<usize> = Vec::new();
    let mut rest = echo.to_string();

    while let Some(byte_pos) = rest.find(ERROR_MARKER) {
        let at = rest[..byte_pos].chars().count();
        for pos in positions.iter_mut().filter(|pos| **pos > at) {
            *pos = pos.saturating_sub(marker_len).max(at);
        }
        positions.push(at);
        rest.replace_range(byte_pos..byte_pos + ERROR_MARKER.len(), "");
    }

    let cleaned: Vec<char> = rest.chars().collect();
    positions
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .filter(|&(open, close)| open <= close && close <= cleaned.len())
        .map(|(open, close)| {
            let lead = usize::from(open > 0);
            let trail = usize::from(close < cleaned.len());
            CandidateWindow {
                text: cleaned[open - lead..close + trail].iter().collect(),
                lead,
                trail,
            }
        })
        .collect()
}

/// 在 `target` 中从 `offset` 开始找 `text`，找不到时交替从末尾、开头各去掉
/// 一个字符，剩余不足 2 个字符时放弃
///
/// 返回（相对 `offset` 的位置, 去掉的字符数）。
fn anchor_trimmed(target: &str, offset: usize, text: &str) -> (Option<usize>, usize) {
    let mut candidate: Vec<char> = text.chars().collect();
    let mut trims = 0;

    loop {
        let needle: String = candidate.iter().collect();
        if let Some(found) = find_from(target, &needle, offset) {
            return (Some(found - offset), trims);
        }

        if trims % 2 == 0 {
            candidate.pop();
        } else {
            candidate.remove(0);
        }
        trims += 1;

        if candidate.len() < 2 {
            return (None, trims);
        }
    }
}

/// 在 `target` 中从 `offset` 开始定位窗口，换算成错误区间
pub fn recover_span(target: &str, offset: usize, window: &CandidateWindow) -> Option<ErrorSpan> {
    let original_len = window.text.chars().count();
    let (pos, _) = anchor_trimmed(target, offset, &window.text);
    let Some(pos) = pos else {
        debug!("无法在原文中定位错误片段: {:?}", window.text);
        return None;
    };

    let start = offset + pos + window.lead;
    let end = (offset + pos + original_len).checked_sub(window.trail)?;
    ErrorSpan::new(start, end)
}

/// 从全部评审回复中提取去重后的错误区间（按发现顺序）
pub fn extract(responses: &[String], offsets: &[usize], target: &str) -> Vec<ErrorSpan> {
    let mut spans = Vec::new();
    let mut seen = HashSet::new();
    let mut per_step: HashMap<usize, usize> = HashMap::new();

    for block in parse_marked_steps(responses, offsets.len()) {
        if !block.has_error {
            continue;
        }
        let offset = offsets[block.step];
        for window in candidate_windows(&block.echo) {
            if let Some(span) = recover_span(target, offset, &window) {
                if seen.insert(span) {
                    spans.push(span);
                    *per_step.entry(block.step).or_default() += 1;
                }
            }
        }
    }

    debug!("提取到 {} 个错误区间，涉及 {} 步", spans.len(), per_step.len());
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(text: &str, lead: usize, trail: usize) -> CandidateWindow {
        CandidateWindow {
            text: text.to_string(),
            lead,
            trail,
        }
    }

    #[test]
    fn test_interior_marker_pair() {
        let windows = candidate_windows("ab[ERROR]cd[ERROR]ef");
        assert_eq!(windows, vec![window("bcde", 1, 1)]);

        let span = recover_span("abcdef", 0, &windows[0]);
        assert_eq!(span, ErrorSpan::new(2, 4));
    }

    #[test]
    fn test_marker_pair_at_text_edges() {
        let windows = candidate_windows("[ERROR]ab[ERROR]cd[ERROR]ef[ERROR]");
        assert_eq!(windows, vec![window("abc", 0, 1), window("def", 1, 0)]);

        assert_eq!(recover_span("abcdef", 0, &windows[0]), ErrorSpan::new(0, 2));
        assert_eq!(recover_span("abcdef", 0, &windows[1]), ErrorSpan::new(4, 6));
    }

    #[test]
    fn test_unpaired_marker_is_ignored() {
        assert!(candidate_windows("x = [ERROR]5").is_empty());
        assert_eq!(candidate_windows("[ERROR]a[ERROR]b[ERROR]").len(), 1);
    }

    #[test]
    fn test_search_starts_at_step_offset() {
        let target = "x = 5, so x = 5";
        let w = &candidate_windows("x = [ERROR]5[ERROR]")[0];
        // 窗口 " 5" 没有右边距
        assert_eq!(recover_span(target, 0, w), ErrorSpan::new(4, 5));
        assert_eq!(recover_span(target, 10, w), ErrorSpan::new(14, 15));
    }

    #[test]
    fn test_fuzzy_recovery_trims_drifted_margin() {
        let target = "total: 3+4=8.";
        let w = &candidate_windows("3+4=[ERROR]8[ERROR]!")[0];
        assert_eq!(w.text, "=8!");
        assert_eq!(recover_span(target, 0, w), ErrorSpan::new(11, 12));
    }

    #[test]
    fn test_unanchorable_window_is_abandoned() {
        let w = window("qwertyuiopasdfghjkl", 1, 1);
        assert_eq!(recover_span("1 + 1 = 2", 0, &w), None);
        // 偏移超出文本
        assert_eq!(recover_span("abc", 10, &window("abc", 1, 1)), None);
    }

    #[test]
    fn test_trimming_stops_before_candidate_runs_out() {
        let (pos, trims) = anchor_trimmed("1 + 1 = 2", 0, "qwerty");
        assert_eq!(pos, None);
        assert!(trims < "qwerty".len());

        let (pos, trims) = anchor_trimmed("total: 3+4=8.", 0, "=8!");
        assert_eq!((pos, trims), (Some(10), 1));

        let (pos, trims) = anchor_trimmed("abc", 0, "abc");
        assert_eq!((pos, trims), (Some(0), 0));
    }

    #[test]
    fn test_marker_rebuilt_by_removal_does_not_panic() {
        // 去掉内层标记后外层又拼成一个标记
        assert_eq!(candidate_windows("x = [ERROR[ERROR]]5"), vec![window(" 5", 1, 1)]);
        assert!(extract(&["1. x = [ERROR[ERROR]]5".to_string()], &[0], "x = 5").is_empty());
    }

    #[test]
    fn test_overlapping_markers_stay_inside_cleaned_echo() {
        let windows = candidate_windows("a[ERROR[ERROR]]b[ERROR]c[ERROR]");
        assert_eq!(windows, vec![window("ab", 1, 1), window("bc", 1, 0)]);

        let spans = extract(&["1. a[ERROR[ERROR]]b[ERROR]c[ERROR]".to_string()], &[0], "abc");
        assert_eq!(spans, vec![ErrorSpan::new(2, 3).unwrap()]);
    }

    #[test]
    fn test_stray_marker_fragments_are_ignored() {
        for echo in ["[ERROR[ERROR[ERROR]]]", "]][ERROR][[ERROR", "[ERROR]]][ERROR[ERROR]"] {
            for w in candidate_windows(echo) {
                assert!(w.text.chars().count() >= w.lead + w.trail);
            }
            let _ = extract(&[format!("1. {}", echo)], &[0], "[ERROR]");
        }
    }

    #[test]
    fn test_duplicate_numbers_fall_back_to_position() {
        let target = "a = 1  b = 3  c = 4";
        let offsets = vec![0, 7, 14];
        let responses = vec![
            "2. b = [ERROR]3[ERROR] \n1. a = 1".to_string(),
            "3. c = 4\n2. b = [ERROR]3[ERROR] ".to_string(),
        ];

        let blocks = parse_marked_steps(&responses, offsets.len());
        assert_eq!(blocks.iter().map(|b| b.step).collect::<Vec<_>>(), vec![0, 1, 2]);

        let spans = extract(&responses, &offsets, target);
        assert_eq!(spans, vec![ErrorSpan::new(11, 12).unwrap()]);
    }

    #[test]
    fn test_same_span_from_two_batches_is_kept_once() {
        let target = "a = 1  b = 3  c = 4";
        let offsets = vec![0, 7, 14];
        let responses = vec![
            "1. b = [ERROR]3[ERROR] \n2. b = [ERROR]3[ERROR] ".to_string(),
            "3. c = 4".to_string(),
        ];

        let spans = extract(&responses, &offsets, target);
        assert_eq!(spans, vec![ErrorSpan::new(11, 12).unwrap()]);
    }

    #[test]
    fn test_extract_by_echoed_number() {
        let target = "x = 2  y = 2  z = 9";
        let offsets = vec![0, 7, 14];
        let responses = vec!["3. z = [ERROR]9[ERROR]\n1. x = 2\n2. y = 2".to_string()];

        let blocks = parse_marked_steps(&responses, offsets.len());
        assert_eq!(blocks[0].step, 2);
        assert!(blocks[0].has_error);

        assert_eq!(
            extract(&responses, &offsets, target),
            vec![ErrorSpan::new(18, 19).unwrap()]
        );
    }

    #[test]
    fn test_sentinel_responses_yield_nothing() {
        let responses = vec!["None".to_string()];
        assert!(extract(&responses, &[0], "x = 1").is_empty());
    }
}
