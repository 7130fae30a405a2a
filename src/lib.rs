//! # Solution Marking
//!
//! 批改手写数学解答并定位其中的错误
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `TextCompletion` / `OpenAiCompletion` - 文本补全
//! - `WorkerPool` - 有并发上限的请求池（补发、取消）
//! - `VisionRecognizer` - 手写解答识别
//! - `Database` - 题目与提交的 SQLite 存储
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单份解答
//! - `StepDecomposer` - 步骤拆分与定位
//! - `MatchGate` - 匹配评分
//! - `make_batches` / `extract` - 分批标注与错误区间提取
//! - `Tutor` - 提示与难度
//! - `highlight` - 高亮
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一份解答"的完整批改流程
//! - `GradingCtx` - 上下文封装（提交 ID + 题目）
//! - `MarkingFlow` - 流程编排（评分 → 拆分 → 标注 → 高亮）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 批量批改，管理资源和并发
//! - `orchestrator/submission_processor` - 单个提交的状态流转
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{Database, OpenAiCompletion, TextCompletion, WorkerPool};
pub use models::{ErrorSpan, GradeOutcome, GradeReport, GradingJob};
pub use orchestrator::{App, SubmissionProcessor};
pub use workflow::{GradingCtx, MarkingFlow};
