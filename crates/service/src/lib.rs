//! Orchestration of exercise delivery, grading and student progression on
//! top of the lexio primitives.
//!
//! - [`ExerciseQueue`]: bounded producer/consumer hand-off of exercises.
//! - [`ExerciseGenerator`]: builds exercises from templates and enqueues them.
//! - [`EvaluationService`]: grades responses on the worker pool.
//! - [`ProgressionService`]: keeps per-student totals under keyed locks.

pub mod evaluation;
pub mod exercise_queue;
pub mod generator;
pub mod progression;
pub mod store;

pub use evaluation::{AnswerCheck, AnswerEvaluator, EvaluationService, ResultFeed};
pub use exercise_queue::{ExerciseQueue, ExerciseStream};
pub use generator::ExerciseGenerator;
pub use progression::ProgressionService;
pub use store::{AggregateStore, InMemoryAggregateStore, InMemoryTemplateStore, TemplateStore};
