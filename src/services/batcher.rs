//! 把学生步骤切分成评审批次，每批生成一个错误标注 prompt

use crate::services::prompts;

/// 一个评审批次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewBatch {
    /// 本批第一步的全局下标（从 0 开始）
    pub first_step: usize,
    pub steps: Vec<String>,
    pub prompt: String,
}

/// 按 `batch_size` 切分步骤，编号在批次之间连续（从 1 开始）
///
/// `batch_size` 为 0 时按 1 处理。
pub fn make_batches(
    task: &str,
    steps: &[String],
    reference: &str,
    batch_size: usize,
) -> Vec<ReviewBatch> {
    let size = batch_size.max(1);

    steps
        .chunks(size)
        .enumerate()
        .map(|(chunk_idx, chunk)| {
            let first_step = chunk_idx * size;
            let listing = chunk
                .iter()
                .enumerate()
                .map(|(i, step)| format!("{}. {}", first_step + i + 1, step))
                .collect::<Vec<_>>()
                .join("\n");

            ReviewBatch {
                first_step,
                steps: chunk.to_vec(),
                prompt: prompts::mark_errors(task, &listing, reference),
            }
        })
        .collect()
}
