//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 批量批改
//! - 管理应用生命周期（初始化、运行）
//! - 批量加载批改任务（Vec<GradingJob>）
//! - 控制并发数量（Semaphore）
//! - 输出全局统计信息
//!
//! ### `submission_processor` - 单个提交处理器
//! - 识别 → 批改 → 落库
//! - 维护提交状态，截住所有错误
//!
//! ## 层次关系
//!
//! ```text
//! app (处理 Vec<GradingJob>)
//!     ↓
//! submission_processor (处理单个提交)
//!     ↓
//! workflow::MarkingFlow (批改一份解答)
//!     ↓
//! services (能力层：拆分 / 评分 / 标注 / 提示)
//!     ↓
//! infrastructure (基础设施：LLM、请求池、识别、数据库)
//! ```

pub mod app;
pub mod submission_processor;

pub use app::App;
pub use submission_processor::SubmissionProcessor;
