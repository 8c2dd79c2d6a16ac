/// Submission Orchestrator - Use-Case Controller
///
/// **Responsibility:**
/// Turn a (problem, code, language) request into an evaluation run and shape
/// the outcome for the caller.
///
/// **Entry modes:**
/// 1. `run_sample` - visible cases, every case reported, nothing persisted
/// 2. `run_custom` - one execution against caller input, no comparison
/// 3. `submit`     - all cases, early exit, always leaves a terminal submission
///
/// This module is the glue layer. It knows nothing about:
/// - How code executes (engine's job)
/// - How outputs are compared (evaluator's job)

use async_trait::async_trait;
use judge_common::types::{CaseResult, Finalization, Language, Submission, Verdict};
use judge_common::{Store, TestCaseFilter};
use judge_engine::{
    evaluate, EvaluationMode, ExecutionEngine, ExecutionFailure, ExecutionOutput, FailureKind,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::JudgeError;
use crate::metrics;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleReport {
    pub message: String,
    pub verdict: Verdict,
    pub verdicts: Vec<CaseResult>,
    pub total_test_cases: usize,
    pub passed_test_cases: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRunReport {
    pub message: String,
    pub success: bool,
    pub output: String,
    pub compile_message: String,
    pub custom_input: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub message: String,
    pub submission_id: Uuid,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used: Option<u64>,
    pub compile_message: String,
    pub verdicts: Vec<CaseResult>,
    pub total_test_cases: usize,
    pub passed_test_cases: usize,
}

/// Engine wrapper that re-attempts transport failures
///
/// Graded failures (compilation, runtime, time limit) are returned as-is.
struct Retrying<'a> {
    inner: &'a dyn ExecutionEngine,
    max_attempts: u32,
}

#[async_trait]
impl ExecutionEngine for Retrying<'_> {
    async fn execute(
        &self,
        code: &str,
        language: Language,
        input: &str,
    ) -> Result<ExecutionOutput, ExecutionFailure> {
        let mut attempt = 1;
        loop {
            let result = self.inner.execute(code, language, input).await;
            let outcome = match &result {
                Ok(_) => "ok",
                Err(failure) => failure.kind.label(),
            };
            metrics::record_execution_call(&language.to_string(), outcome);

            match result {
                Err(failure)
                    if failure.kind == FailureKind::Transport && attempt < self.max_attempts =>
                {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "Execution service call failed, retrying: {}",
                        failure
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

pub struct Judge {
    store: Arc<dyn Store>,
    engine: Arc<dyn ExecutionEngine>,
    max_attempts: u32,
}

impl Judge {
    pub fn new(store: Arc<dyn Store>, engine: Arc<dyn ExecutionEngine>, max_attempts: u32) -> Self {
        Self {
            store,
            engine,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn engine(&self) -> Retrying<'_> {
        Retrying {
            inner: self.engine.as_ref(),
            max_attempts: self.max_attempts,
        }
    }

    async fn ensure_problem(&self, problem_id: &Uuid) -> Result<(), JudgeError> {
        match self.store.find_problem(problem_id).await? {
            Some(_) => Ok(()),
            None => Err(JudgeError::ProblemNotFound),
        }
    }

    /// Run the visible test cases without persisting anything
    pub async fn run_sample(
        &self,
        problem_id: Uuid,
        code: &str,
        language: Language,
    ) -> Result<SampleReport, JudgeError> {
        self.ensure_problem(&problem_id).await?;

        let samples = self
            .store
            .find_test_cases(&problem_id, TestCaseFilter::Sample)
            .await?;
        if samples.is_empty() {
            return Err(JudgeError::NoSampleTestCases);
        }

        let evaluation =
            evaluate(&self.engine(), &samples, code, language, EvaluationMode::Sample).await?;

        // compilation and transport failures repeat on every case
        if let Some(failure) = evaluation.halted_by {
            return Err(JudgeError::Execution(failure));
        }

        let passed = evaluation.passed_count();
        tracing::info!(
            problem_id = %problem_id,
            language = %language,
            passed,
            total = samples.len(),
            "Sample run complete"
        );

        Ok(SampleReport {
            message: "Sample test cases executed successfully!".to_string(),
            verdict: evaluation.verdict,
            verdicts: evaluation.cases,
            total_test_cases: samples.len(),
            passed_test_cases: passed,
        })
    }

    /// Execute once against caller-supplied stdin; output is returned verbatim
    pub async fn run_custom(
        &self,
        code: &str,
        language: Language,
        custom_input: &str,
    ) -> Result<CustomRunReport, JudgeError> {
        let output = self
            .engine()
            .execute(code, language, custom_input)
            .await
            .map_err(JudgeError::Execution)?;

        Ok(CustomRunReport {
            message: "Custom test case executed successfully!".to_string(),
            success: output.success,
            output: output.output,
            compile_message: output.compile_message.unwrap_or_default(),
            custom_input: custom_input.to_string(),
        })
    }

    /// Grade against every test case and persist the result
    ///
    /// A pending submission is written before the first execution so that an
    /// inspectable record exists whatever happens next. Infrastructure
    /// failures finalize it as `Internal Error` and surface as
    /// `JudgeError::SubmissionFailed`.
    pub async fn submit(
        &self,
        caller: &Identity,
        problem_id: Uuid,
        code: &str,
        language: Language,
    ) -> Result<SubmissionReport, JudgeError> {
        self.ensure_problem(&problem_id).await?;

        let test_cases = self
            .store
            .find_test_cases(&problem_id, TestCaseFilter::All)
            .await?;
        if test_cases.is_empty() {
            return Err(JudgeError::NoTestCases);
        }

        let mut submission = Submission::pending(&caller.user_id, problem_id, code, language);
        self.store.insert_submission(&submission).await?;

        tracing::info!(
            submission_id = %submission.id,
            problem_id = %problem_id,
            user_id = %caller.user_id,
            language = %language,
            test_count = test_cases.len(),
            "Submission pending"
        );

        let evaluation =
            evaluate(&self.engine(), &test_cases, code, language, EvaluationMode::Graded).await?;

        let compile_message = match &evaluation.halted_by {
            Some(failure) => failure.message.clone().unwrap_or_default(),
            None => String::new(),
        };

        if evaluation.verdict == Verdict::InternalError {
            let message = if compile_message.is_empty() {
                "Unknown error from execution service.".to_string()
            } else {
                compile_message
            };
            submission.finalize(
                Verdict::InternalError,
                Finalization {
                    verdicts: evaluation.cases,
                    compile_message: message,
                    ..Default::default()
                },
            )?;
            self.store.update_submission(&submission).await?;

            tracing::error!(
                submission_id = %submission.id,
                "Submission failed: {}",
                submission.compile_message
            );
            return Err(JudgeError::SubmissionFailed(Box::new(submission)));
        }

        submission.finalize(
            evaluation.verdict,
            Finalization {
                execution_time_ms: evaluation.total_execution_time_ms,
                memory_used_kb: evaluation.max_memory_kb,
                verdicts: evaluation.cases,
                compile_message,
            },
        )?;
        self.store.update_submission(&submission).await?;

        let passed = submission.passed_count();
        tracing::info!(
            submission_id = %submission.id,
            verdict = %submission.verdict,
            passed,
            total = test_cases.len(),
            "Submission evaluated"
        );

        Ok(SubmissionReport {
            message: format!("Submission evaluated! Verdict: {}.", submission.verdict),
            submission_id: submission.id,
            verdict: submission.verdict,
            execution_time: submission.execution_time_ms,
            memory_used: submission.memory_used_kb,
            compile_message: submission.compile_message.clone(),
            verdicts: submission.verdicts.iter().map(CaseResult::redacted).collect(),
            total_test_cases: test_cases.len(),
            passed_test_cases: passed,
        })
    }

    /// Submissions of one user, newest first
    pub async fn user_submissions(
        &self,
        caller: &Identity,
        user_id: &str,
    ) -> Result<Vec<Submission>, JudgeError> {
        if !caller.may_access(user_id) {
            return Err(JudgeError::Forbidden);
        }
        let submissions = self.store.list_user_submissions(user_id).await?;
        Ok(shown_to(caller, submissions))
    }

    /// Every submission, newest first; admin only
    pub async fn all_submissions(&self, caller: &Identity) -> Result<Vec<Submission>, JudgeError> {
        if !caller.is_admin() {
            return Err(JudgeError::Forbidden);
        }
        Ok(self.store.list_submissions().await?)
    }
}

/// Hidden case data stays with admins
fn shown_to(caller: &Identity, mut submissions: Vec<Submission>) -> Vec<Submission> {
    if !caller.is_admin() {
        for submission in &mut submissions {
            submission.verdicts = submission.verdicts.iter().map(CaseResult::redacted).collect();
        }
    }
    submissions
}
