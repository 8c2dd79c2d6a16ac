pub mod engine;
pub mod evaluator;

pub use engine::{ExecutionEngine, ExecutionFailure, ExecutionOutput, FailureKind, HttpEngine};
pub use evaluator::{evaluate, normalize_output, Evaluation, EvaluationError, EvaluationMode};
