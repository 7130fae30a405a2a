//! 单个提交处理器 - 编排层
//!
//! 在后台完成一份提交的全部处理，并把每个阶段的状态写入数据库：
//!
//! ```text
//! Parsing → Check solution → Processing → OK
//!    └───────────────┴────────────┴──────→ Error Parsing
//! ```
//!
//! 任何错误（包括 panic）都在这里截住并记录，不会向上传播。

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{AppError, FileError, StoreError};
use crate::infrastructure::{join_blocks, Database, TextRecognizer};
use crate::models::{GradeOutcome, SubmissionStatus, NO_MATCH_MESSAGE};
use crate::workflow::{GradingCtx, MarkingFlow};

/// 单个提交处理器
///
/// 可以 clone，所有副本共享数据库、识别器和批改流程。
#[derive(Clone)]
pub struct SubmissionProcessor {
    db: Arc<Database>,
    recognizer: Arc<dyn TextRecognizer>,
    flow: Arc<MarkingFlow>,
}

impl SubmissionProcessor {
    pub fn new(
        db: Arc<Database>,
        recognizer: Arc<dyn TextRecognizer>,
        flow: Arc<MarkingFlow>,
    ) -> Self {
        Self {
            db,
            recognizer,
            flow,
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// 新建 `Parsing` 状态的提交并在后台处理
    ///
    /// 返回提交 ID 和后台任务句柄，句柄的结果是最终状态。
    pub fn submit(
        &self,
        statement: &str,
        path: &Path,
    ) -> Result<(i64, JoinHandle<SubmissionStatus>), StoreError> {
        self.submit_with_category(statement, path, None)
    }

    pub fn submit_with_category(
        &self,
        statement: &str,
        path: &Path,
        category: Option<String>,
    ) -> Result<(i64, JoinHandle<SubmissionStatus>), StoreError> {
        let id = self.db.create_submission(statement)?;
        info!("📥 新提交 #{}: {}", id, path.display());

        let processor = self.clone();
        let statement = statement.to_string();
        let path = path.to_path_buf();
        let handle = tokio::spawn(async move {
            processor.process(id, statement, path, category).await
        });

        Ok((id, handle))
    }

    /// 处理一份提交，返回最终状态
    pub async fn process(
        &self,
        id: i64,
        statement: String,
        path: PathBuf,
        category: Option<String>,
    ) -> SubmissionStatus {
        let ctx = GradingCtx::new(Some(id), statement);

        let outcome = AssertUnwindSafe(self.run(&ctx, &path, category.as_deref()))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                error!("{} ❌ 处理失败: {:#}", ctx, e);
                self.mark_failed(id);
                SubmissionStatus::ErrorParsing
            }
            Err(_) => {
                error!("{} ❌ 处理过程中发生 panic", ctx);
                self.mark_failed(id);
                SubmissionStatus::ErrorParsing
            }
        }
    }

    async fn run(
        &self,
        ctx: &GradingCtx,
        path: &Path,
        category: Option<&str>,
    ) -> Result<SubmissionStatus> {
        let id = ctx.submission_id.unwrap_or_default();
        let statement = ctx.statement.as_str();

        // ========== 1. 识别 ==========
        let blocks = match self.recognizer.recognize(statement, path).await {
            Ok(blocks) => blocks,
            Err(AppError::File(FileError::UnsupportedFormat { path })) => {
                warn!("{} ⚠️ 不支持的文件格式: {}", ctx, path);
                self.mark_failed(id);
                return Ok(SubmissionStatus::ErrorParsing);
            }
            Err(e) => return Err(e).context("识别解答失败"),
        };
        let solution = join_blocks(&blocks);

        self.db
            .update_submission(id, &solution, SubmissionStatus::CheckSolution, &[], 0.0)?;
        self.db
            .update_submission(id, &solution, SubmissionStatus::Processing, &[], 0.0)?;

        // ========== 2. 批改 ==========
        let outcome = self.flow.grade_in(ctx, &solution).await?;

        let (result, hints, score) = match &outcome {
            GradeOutcome::NoMatch { score } => {
                info!("{} 解答与题目不符 (匹配分数 {})", ctx, score);
                (NO_MATCH_MESSAGE.to_string(), Vec::new(), 0.0)
            }
            GradeOutcome::Graded(report) => (
                report.highlighted.clone(),
                report.hints.clone(),
                f64::from(report.accuracy),
            ),
        };

        self.db
            .update_submission(id, &result, SubmissionStatus::Ok, &hints, score)?;
        info!("{} ✅ 状态更新为 OK", ctx);

        // ========== 3. 保存参考解答与难度 ==========
        if let GradeOutcome::Graded(report) = &outcome {
            // 已有难度时数据库会保留原值
            if let Err(e) = self.db.save_task_solution(
                statement,
                &report.reference_steps,
                category,
                Some(report.difficulty),
            ) {
                warn!("{} 保存参考解答失败: {}", ctx, e);
            }
        }

        Ok(SubmissionStatus::Ok)
    }

    fn mark_failed(&self, id: i64) {
        if let Err(e) = self
            .db
            .update_submission(id, "", SubmissionStatus::ErrorParsing, &[], 0.0)
        {
            error!("[提交#{}] 无法写入失败状态: {}", id, e);
        }
    }
}
