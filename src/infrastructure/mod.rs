//! 基础设施层：外部服务和存储

pub mod completion;
pub mod database;
pub mod llm_client;
pub mod recognizer;
pub mod worker_pool;

pub use completion::TextCompletion;
pub use database::Database;
pub use llm_client::OpenAiCompletion;
pub use recognizer::{join_blocks, TextRecognizer, VisionRecognizer};
pub use worker_pool::{WorkerPool, EMPTY_SENTINEL};
