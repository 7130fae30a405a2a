//! 批量批改 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：日志文件、数据库、LLM 客户端、请求池
//! 2. **批量加载**：扫描并加载所有 TOML 批改任务（`Vec<GradingJob>`）
//! 3. **并发控制**：使用 Semaphore 限制同时处理的提交数量
//! 4. **分批处理**：每批完成后再开始下一批
//! 5. **全局统计**：最终状态为 OK 的提交计为成功
//!
//! 单个提交的处理委托给 [`SubmissionProcessor`]。

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::infrastructure::{Database, OpenAiCompletion, VisionRecognizer, WorkerPool};
use crate::models::{load_all_toml_files, GradingJob, SubmissionStatus};
use crate::orchestrator::SubmissionProcessor;
use crate::utils::logging;
use crate::utils::RetryPolicy;
use crate::workflow::MarkingFlow;

/// 应用主结构
pub struct App {
    config: Config,
    processor: SubmissionProcessor,
    cancel: CancellationToken,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config, cancel: CancellationToken) -> Result<Self> {
        logging::init_log_file(&config.output_log_file)
            .with_context(|| format!("无法创建日志文件: {}", config.output_log_file))?;
        logging::log_startup(
            config.max_concurrent_submissions,
            config.max_concurrent_requests,
        );

        let db = Arc::new(Database::open(&config.database_path)?);
        let client = Arc::new(OpenAiCompletion::new(&config));

        let pool = WorkerPool::new(
            client.clone(),
            config.max_concurrent_requests,
            config.retry_rounds,
            config.retry_delay(),
            cancel.clone(),
        );

        let recognizer = Arc::new(VisionRecognizer::new(
            client,
            config.vision_model.clone(),
            RetryPolicy::new(config.recognize_max_attempts, config.retry_delay()),
        ));
        let flow = Arc::new(MarkingFlow::new(pool, db.clone(), &config));

        Ok(Self::with_processor(
            config,
            SubmissionProcessor::new(db, recognizer, flow),
            cancel,
        ))
    }

    /// 使用现成的处理器（测试中注入假模型）
    pub fn with_processor(
        config: Config,
        processor: SubmissionProcessor,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            processor,
            cancel,
        }
    }

    /// 运行应用主逻辑，返回 (成功数, 失败数)
    pub async fn run(&self) -> Result<(usize, usize)> {
        info!("\n📁 正在扫描待批改的提交...");
        let jobs = load_all_toml_files(&self.config.jobs_folder).await?;

        if jobs.is_empty() {
            warn!("⚠️ 没有找到待处理的TOML文件，程序结束");
            return Ok((0, 0));
        }

        let total = jobs.len();
        let per_batch = self.config.max_concurrent_submissions.max(1);
        logging::log_jobs_loaded(total, per_batch);

        let semaphore = Arc::new(Semaphore::new(per_batch));
        let total_batches = (total + per_batch - 1) / per_batch;
        let mut success = 0;

        for (batch_idx, batch) in jobs.chunks(per_batch).enumerate() {
            if self.cancel.is_cancelled() {
                warn!("⛔ 已取消，跳过剩余批次");
                break;
            }

            let batch_start = batch_idx * per_batch;
            logging::log_batch_start(
                batch_idx + 1,
                total_batches,
                batch_start + 1,
                batch_start + batch.len(),
                total,
            );

            let batch_success = self.process_batch(batch, semaphore.clone()).await?;
            success += batch_success;

            logging::log_batch_complete(batch_idx + 1, batch_success, batch.len());
        }

        let failed = total - success;
        logging::print_final_stats(success, failed, total, &self.config.output_log_file);
        Ok((success, failed))
    }

    /// 处理单个批次，返回成功数
    async fn process_batch(
        &self,
        batch: &[GradingJob],
        semaphore: Arc<Semaphore>,
    ) -> Result<usize> {
        let mut handles = Vec::new();

        for job in batch {
            let permit = semaphore.clone().acquire_owned().await?;
            match self
                .processor
                .submit_with_category(&job.statement, &job.file, job.category.clone())
            {
                Ok((id, handle)) => handles.push((id, permit, handle)),
                Err(e) => error!("无法创建提交 {}: {}", job.file.display(), e),
            }
        }

        let mut success = 0;
        for (id, permit, handle) in handles {
            let status = match handle.await {
                Ok(status) => status,
                Err(e) => {
                    error!("[提交#{}] 任务执行失败: {}", id, e);
                    SubmissionStatus::ErrorParsing
                }
            };
            drop(permit);

            if status == SubmissionStatus::Ok {
                success += 1;
            }
            self.append_result(id);
        }

        Ok(success)
    }

    /// 把提交的最终记录以 JSON 行追加到日志文件
    fn append_result(&self, id: i64) {
        let record = match self.processor.database().get_submission(id) {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                warn!("[提交#{}] 读取结果失败: {}", id, e);
                return;
            }
        };

        let written = serde_json::to_string(&record)
            .map_err(anyhow::Error::from)
            .and_then(|line| {
                let mut file = OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(&self.config.output_log_file)?;
                writeln!(file, "{}", line)?;
                Ok(())
            });

        if let Err(e) = written {
            warn!("[提交#{}] 写入日志文件失败: {}", id, e);
        }
    }
}
