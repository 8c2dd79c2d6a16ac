// Error taxonomy of the judge API and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use judge_common::types::{AlreadyFinalized, Submission};
use judge_common::StoreError;
use judge_engine::{EvaluationError, ExecutionFailure, FailureKind};
use serde_json::json;
use thiserror::Error;

use crate::metrics;

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("{0}")]
    Validation(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Problem not found")]
    ProblemNotFound,

    #[error("No sample test cases found for this problem.")]
    NoSampleTestCases,

    #[error("No test cases found for this problem.")]
    NoTestCases,

    /// Execution failure outside of graded submission (sample or custom run)
    #[error("{0}")]
    Execution(ExecutionFailure),

    /// Infrastructure failure during grading; the submission is already persisted
    #[error("Submission failed: {}", .0.compile_message)]
    SubmissionFailed(Box<Submission>),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Access denied. You can only view your own submissions.")]
    Forbidden,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Finalized(#[from] AlreadyFinalized),
}

impl From<EvaluationError> for JudgeError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::NoTestCases => JudgeError::NoTestCases,
        }
    }
}

impl JudgeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            JudgeError::Validation(_)
            | JudgeError::UnsupportedLanguage(_)
            | JudgeError::NoSampleTestCases
            | JudgeError::NoTestCases => StatusCode::BAD_REQUEST,
            JudgeError::ProblemNotFound => StatusCode::NOT_FOUND,
            JudgeError::Unauthenticated => StatusCode::UNAUTHORIZED,
            JudgeError::Forbidden => StatusCode::FORBIDDEN,
            JudgeError::Execution(_)
            | JudgeError::SubmissionFailed(_)
            | JudgeError::Store(_)
            | JudgeError::Finalized(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            JudgeError::Validation(_) => "validation",
            JudgeError::UnsupportedLanguage(_) => "unsupported_language",
            JudgeError::ProblemNotFound => "problem_not_found",
            JudgeError::NoSampleTestCases => "no_sample_test_cases",
            JudgeError::NoTestCases => "no_test_cases",
            JudgeError::Execution(_) => "execution_failed",
            JudgeError::SubmissionFailed(_) => "submission_failed",
            JudgeError::Unauthenticated => "unauthenticated",
            JudgeError::Forbidden => "forbidden",
            JudgeError::Store(_) => "store",
            JudgeError::Finalized(_) => "finalized",
        }
    }
}

fn execution_body(failure: &ExecutionFailure) -> serde_json::Value {
    let diagnostic = failure.message.clone();
    match failure.kind {
        FailureKind::TimeLimitExceeded => json!({
            "message": "Time Limit Exceeded",
            "verdict": "Time Limit Exceeded",
            "error": "Your code took too long to execute. Check for infinite loops or inefficient algorithms.",
            "compileMessage": diagnostic.unwrap_or_else(|| "Time Limit Exceeded (TLE)".to_string()),
        }),
        FailureKind::CompilationError => json!({
            "message": "Compilation Error",
            "verdict": "Compilation Error",
            "error": diagnostic.clone().unwrap_or_else(|| "Compilation failed".to_string()),
            "compileMessage": diagnostic.unwrap_or_else(|| "Compilation Error".to_string()),
        }),
        FailureKind::RuntimeError => json!({
            "message": "Runtime Error",
            "verdict": "Runtime Error",
            "error": diagnostic.clone().unwrap_or_else(|| "Runtime error occurred".to_string()),
            "compileMessage": diagnostic.unwrap_or_else(|| "Runtime Error".to_string()),
        }),
        FailureKind::Transport => {
            let detail = diagnostic.unwrap_or_else(|| "Unknown error from execution service.".to_string());
            json!({
                "message": format!("Execution failed: {}", detail),
                "verdict": "Execution Failed",
                "error": detail,
                "compileMessage": "Execution Failed",
            })
        }
    }
}

impl IntoResponse for JudgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            JudgeError::Execution(failure) => {
                tracing::warn!(kind = failure.kind.label(), "Execution failed: {}", failure);
                execution_body(failure)
            }
            JudgeError::SubmissionFailed(submission) => json!({
                "message": self.to_string(),
                "submissionId": submission.id,
                "verdict": submission.verdict,
                "compileMessage": submission.compile_message,
            }),
            JudgeError::Store(e) => {
                tracing::error!("Store failure: {}", e);
                json!({ "message": "Internal server error." })
            }
            JudgeError::Finalized(e) => {
                tracing::error!("{}", e);
                json!({ "message": "Internal server error." })
            }
            other => {
                metrics::record_request_rejected(other.label());
                json!({ "message": other.to_string() })
            }
        };

        (status, Json(body)).into_response()
    }
}
