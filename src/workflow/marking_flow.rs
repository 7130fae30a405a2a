//! 批改流程 - 流程层
//!
//! 核心职责：定义"一份解答"的完整批改流程
//!
//! 流程顺序：
//! 1. 匹配评分，低于阈值直接返回 `NoMatch`
//! 2. 参考解答（缓存或生成）与学生解答的步骤拆分并行
//! 3. 分批标注错误 → 提取区间 → 正确率 → 高亮
//! 4. 提示生成、难度评估与第 3 步并行

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::infrastructure::{Database, WorkerPool, EMPTY_SENTINEL};
use crate::models::{ErrorSpan, GradeOutcome, GradeReport};
use crate::services::{
    accuracy, extract, highlight_with, make_batches, prompts, Markers, MatchGate, StepDecomposer,
    Tutor,
};
use crate::utils::text::{normalize_newlines, normalized_to_raw};
use crate::workflow::GradingCtx;

/// 参考解答
#[derive(Debug, Clone)]
struct Reference {
    /// 本次新生成的解答；命中缓存时为空
    generated: String,
    /// 拆分为步骤的解答
    steps: String,
}

/// 批改流程
///
/// - 编排完整的批改流程
/// - 决定何时短路、哪些步骤并行
/// - 只依赖业务能力（services）和注入的数据库
pub struct MarkingFlow {
    pool: WorkerPool,
    db: Arc<Database>,
    gate: MatchGate,
    decomposer: StepDecomposer,
    tutor: Tutor,
    solver_model: String,
    reference_model: String,
    batch_size: usize,
    markers: Markers,
}

impl MarkingFlow {
    pub fn new(pool: WorkerPool, db: Arc<Database>, config: &Config) -> Self {
        Self {
            gate: MatchGate::new(pool.clone(), config),
            decomposer: StepDecomposer::new(pool.clone(), config),
            tutor: Tutor::new(pool.clone(), config),
            pool,
            db,
            solver_model: config.solver_model.clone(),
            reference_model: config.decompose_model.clone(),
            batch_size: config.batch_size,
            markers: Markers::from_legacy_flag(config.legacy_highlight_markers),
        }
    }

    /// 批改一份解答
    pub async fn grade(&self, task: &str, submission: &str) -> Result<GradeOutcome> {
        self.grade_in(&GradingCtx::new(None, task), submission).await
    }

    pub async fn grade_in(&self, ctx: &GradingCtx, submission: &str) -> Result<GradeOutcome> {
        let task = ctx.statement.as_str();

        // ========== 1. 匹配评分 ==========
        let match_score = self
            .gate
            .score(task, submission)
            .await
            .with_context(|| format!("{} 匹配评分失败", ctx))?;

        if !self.gate.passes(match_score) {
            info!(
                "{} ⛔ 匹配分数 {} 低于阈值 {}，跳过错误分析",
                ctx,
                match_score,
                self.gate.threshold()
            );
            return Ok(GradeOutcome::NoMatch { score: match_score });
        }

        // ========== 2. 参考解答 + 步骤拆分 ==========
        let (reference, decomposition) = tokio::try_join!(self.reference_for(ctx), async {
            self.decomposer
                .decompose(submission)
                .await
                .with_context(|| format!("{} 拆分学生解答失败", ctx))
        })?;

        let index = decomposition.into_index();
        let steps = index.texts();
        let offsets = index.offsets();
        info!("{} 📝 学生解答共 {} 步", ctx, index.len());

        // ========== 3. 错误标注 + 提示 + 难度 ==========
        let batches = make_batches(task, &steps, &reference.steps, self.batch_size);
        let review_prompts: Vec<String> = batches.into_iter().map(|b| b.prompt).collect();
        let wrong_solution = steps.join("\n");

        let (responses, hints, difficulty) = tokio::try_join!(
            async {
                if review_prompts.is_empty() {
                    return Ok(Vec::new());
                }
                self.pool
                    .run_until_filled(&self.solver_model, &review_prompts, "错误标注")
                    .await
            },
            self.tutor.hints(task, &wrong_solution, &reference.steps),
            self.tutor.classify_difficulty(task),
        )
        .with_context(|| format!("{} 错误分析失败", ctx))?;

        // ========== 4. 提取区间 + 高亮 ==========
        let normalized = normalize_newlines(submission);
        let found = extract(&responses, &offsets, &normalized);
        let accuracy = accuracy(index.len(), found.len());

        // 区间是在规范化文本上计算的，高亮前映射回原文
        let spans: Vec<ErrorSpan> = found
            .iter()
            .filter_map(|span| {
                ErrorSpan::new(
                    normalized_to_raw(submission, span.start),
                    normalized_to_raw(submission, span.end),
                )
            })
            .collect();
        let highlighted = highlight_with(submission, &spans, self.markers);

        info!(
            "{} ✅ 批改完成: {} 处错误，正确率 {}%，难度 {}",
            ctx,
            spans.len(),
            accuracy,
            difficulty
        );

        Ok(GradeOutcome::Graded(GradeReport {
            match_score,
            spans,
            highlighted,
            hints,
            difficulty,
            accuracy,
            total_steps: index.len(),
            reference_solution: reference.generated,
            reference_steps: reference.steps,
        }))
    }

    /// 取缓存的参考解答；没有时生成、拆分并写回缓存
    ///
    /// 读写缓存失败只记录日志。生成没有回复时返回错误；拆分没有回复时
    /// 本次使用未拆分的解答，不写缓存。
    async fn reference_for(&self, ctx: &GradingCtx) -> Result<Reference> {
        let task = ctx.statement.as_str();

        match self.db.get_task_by_statement(task) {
            Ok(Some(record)) => {
                if let Some(cached) = record.cached_solution() {
                    info!("{} 📦 使用缓存的参考解答 (题目 #{})", ctx, record.id);
                    return Ok(Reference {
                        generated: String::new(),
                        steps: cached.to_string(),
                    });
                }
            }
            Ok(None) => {}
            Err(e) => warn!("{} 查询参考解答缓存失败: {}", ctx, e),
        }

        info!("{} 🧮 生成参考解答...", ctx);
        let generated = self
            .pool
            .ask(&self.solver_model, prompts::solve(task), "生成参考解答")
            .await
            .with_context(|| format!("{} 生成参考解答失败", ctx))?;
        if generated == EMPTY_SENTINEL {
            bail!("{} 生成参考解答失败: 补发后仍没有回复", ctx);
        }

        let steps = self
            .pool
            .ask(
                &self.reference_model,
                prompts::decompose(&normalize_newlines(&generated)),
                "拆分参考解答",
            )
            .await
            .with_context(|| format!("{} 拆分参考解答失败", ctx))?;
        if steps == EMPTY_SENTINEL {
            // 本次直接用未拆分的解答，不写缓存
            warn!("{} ⚠️ 参考解答拆分没有回复，本次不缓存", ctx);
            return Ok(Reference {
                steps: generated.clone(),
                generated,
            });
        }
        debug!("{} 参考解答 {} 字符", ctx, steps.chars().count());

        if let Err(e) = self.db.save_task_solution(task, &steps, None, None) {
            warn!("{} 保存参考解答失败: {}", ctx, e);
        }

        Ok(Reference { generated, steps })
    }
}
