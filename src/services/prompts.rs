//! Prompt 模板
//!
//! 每个模板以唯一的【标题】开头，测试中的假模型按标题分派回复。

/// 错误标记，成对出现：`[ERROR]错误片段[ERROR]`
pub const ERROR_MARKER: &str = "[ERROR]";

pub fn decompose(solution: &str) -> String {
    format!(
        "【步骤拆分】\n\
         把下面的解答拆分成独立的推理步骤。\n\
         要求：\n\
         1) 每一步都必须是原文中连续的一段，逐字复制，不能改写、增删或合并空格；\n\
         2) 按原文顺序输出，格式为 `1. 步骤`、`2. 步骤`，每步一行；\n\
         3) 不要输出任何其他内容。\n\n\
         解答：\n{}",
        solution
    )
}

pub fn match_score(task: &str, solution: &str) -> String {
    format!(
        "【匹配评分】\n\
         判断下面的解答是否在解这道题。\n\n\
         题目：\n{}\n\n\
         解答：\n{}\n\n\
         只输出一个 0 到 100 的整数，表示解答与题目的相关程度。",
        task, solution
    )
}

pub fn mark_errors(task: &str, steps: &str, reference: &str) -> String {
    format!(
        "【错误标注】\n\
         你是一名数学老师，请对照参考解答检查学生的解题步骤。\n\n\
         题目：\n{task}\n\n\
         参考解答（按步骤）：\n{reference}\n\n\
         学生的步骤：\n{steps}\n\n\
         按原编号逐条原样输出学生的每一步，格式为 `N. 步骤`。\
         如果某一步有错误，用 {marker} 把错误的最小片段包起来，例如 `3. x = {marker}5{marker}`；\
         正确的步骤原样输出。不要修改步骤的其他文字，不要输出解释。",
        task = task,
        reference = reference,
        steps = steps,
        marker = ERROR_MARKER
    )
}

pub fn solve(task: &str) -> String {
    format!(
        "【求解】\n\
         请完整地解出下面的题目，写出每一步推理，最后给出答案。\n\n\
         题目：\n{}",
        task
    )
}

pub fn hints(task: &str, correct_solution: &str, wrong_solution: &str) -> String {
    format!(
        "【提示生成】\n\
         学生的解答中有错误。请给出恰好三条循序渐进的提示，帮助学生自己发现错误，不要直接给出答案。\n\n\
         题目：\n{}\n\n\
         参考解答：\n{}\n\n\
         学生的解答：\n{}\n\n\
         格式：\n\
         Hint 1: ...\n\
         Hint 2: ...\n\
         Hint 3: ...",
        task, correct_solution, wrong_solution
    )
}

pub fn difficulty(task: &str) -> String {
    format!(
        "【难度评估】\n\
         判断下面这道数学题的难度。只回答一个词：easy、medium、hard 或 expert。\n\n\
         题目：{}\n\n\
         答案（一个词）：",
        task
    )
}
