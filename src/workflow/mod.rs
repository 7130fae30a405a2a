pub mod grading_ctx;
pub mod marking_flow;

pub use grading_ctx::GradingCtx;
pub use marking_flow::MarkingFlow;
