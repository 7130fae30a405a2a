pub mod difficulty;
pub mod grade;
pub mod job;
pub mod loaders;
pub mod span;
pub mod step;
pub mod submission;

pub use difficulty::Difficulty;
pub use grade::{GradeOutcome, GradeReport, NO_MATCH_MARKER, NO_MATCH_MESSAGE};
pub use job::GradingJob;
pub use loaders::{load_all_toml_files, load_toml_to_grading_job};
pub use span::{ErrorSpan, MarkedStepBlock};
pub use step::{Decomposition, Step, StepIndex};
pub use submission::{SubmissionRecord, SubmissionStatus, TaskRecord};
