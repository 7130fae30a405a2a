//! 业务能力层：每个服务只负责一种 LLM 判断或一段纯计算，不关心流程

pub mod batcher;
pub mod decomposer;
pub mod extractor;
pub mod highlighter;
pub mod match_gate;
pub mod prompts;
pub mod tutor;

pub use batcher::{make_batches, ReviewBatch};
pub use decomposer::StepDecomposer;
pub use extractor::extract;
pub use highlighter::{highlight, highlight_with, Markers};
pub use match_gate::{accuracy, MatchGate};
pub use tutor::{Tutor, HINT_COUNT};
