/// Verdict Aggregator - Drives Test Cases Through the Engine
///
/// **Core Responsibility:**
/// Run an ordered set of test cases, compare normalized outputs, and fold the
/// per-case statuses into one verdict.
///
/// **Critical Properties:**
/// - Knows nothing about HTTP, Redis or submissions
/// - Strictly sequential; a later case never starts before an earlier one ends
/// - Graded mode stops at the first non-passing case
/// - Sample mode keeps going so every sample is reported
///
/// **Comparison Rules:**
/// Line endings are unified and the whole blob is trimmed. Internal
/// whitespace must match exactly.

use crate::engine::{ExecutionEngine, ExecutionFailure};
use judge_common::types::{CaseResult, CaseStatus, Language, TestCase, Verdict};
use thiserror::Error;

/// Canonical form of program output used for equality comparison
pub fn normalize_output(raw: Option<&str>) -> String {
    raw.unwrap_or_default()
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Visible cases only, every case reported individually
    Sample,
    /// All cases, early exit on first failure
    Graded,
}

impl EvaluationMode {
    /// Whether a case with this status ends the run
    ///
    /// In sample mode only failures that would repeat on every remaining
    /// input stop the loop.
    pub fn stops_on(&self, status: CaseStatus) -> bool {
        match self {
            EvaluationMode::Graded => status != CaseStatus::Passed,
            EvaluationMode::Sample => matches!(
                status,
                CaseStatus::CompilationError | CaseStatus::ExecutionFailed
            ),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EvaluationMode::Sample => "sample",
            EvaluationMode::Graded => "graded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("no test cases to evaluate")]
    NoTestCases,
}

/// Aggregated outcome of one evaluation run
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub verdict: Verdict,
    /// Only the cases actually run, in evaluation order
    pub cases: Vec<CaseResult>,
    /// Execution failure that ended the run early, if any
    pub halted_by: Option<ExecutionFailure>,
    /// Sum over cases that reported a time, `None` if none did
    pub total_execution_time_ms: Option<u64>,
    /// Max over cases that reported memory, `None` if none did
    pub max_memory_kb: Option<u64>,
}

impl Evaluation {
    pub fn passed_count(&self) -> usize {
        self.cases
            .iter()
            .filter(|c| c.status == CaseStatus::Passed)
            .count()
    }
}

/// Evaluate test cases in the given order
///
/// ## Returns
/// `Err(NoTestCases)` for an empty set; otherwise an `Evaluation` whose
/// verdict is the status of the first non-passing case, or `Accepted`.
pub async fn evaluate<E: ExecutionEngine + ?Sized>(
    engine: &E,
    test_cases: &[TestCase],
    code: &str,
    language: Language,
    mode: EvaluationMode,
) -> Result<Evaluation, EvaluationError> {
    if test_cases.is_empty() {
        return Err(EvaluationError::NoTestCases);
    }

    let mut cases = Vec::with_capacity(test_cases.len());
    let mut first_failure: Option<CaseStatus> = None;
    let mut halted_by = None;
    let mut total_time: Option<u64> = None;
    let mut max_memory: Option<u64> = None;

    tracing::debug!(
        mode = mode.label(),
        language = %language,
        test_count = test_cases.len(),
        "Evaluating test cases"
    );

    for (idx, test_case) in test_cases.iter().enumerate() {
        let (result, failure) = match engine.execute(code, language, &test_case.input).await {
            Ok(output) => {
                let actual = normalize_output(Some(&output.output));
                let expected = normalize_output(Some(&test_case.output));
                let status = if actual == expected {
                    CaseStatus::Passed
                } else {
                    CaseStatus::WrongAnswer
                };

                if let Some(t) = output.execution_time_ms {
                    total_time = Some(total_time.unwrap_or(0) + t);
                }
                if let Some(m) = output.memory_used_kb {
                    max_memory = Some(max_memory.map_or(m, |cur| cur.max(m)));
                }

                let result = CaseResult {
                    test_case_id: test_case.id,
                    is_hidden: test_case.is_hidden,
                    status,
                    input: Some(test_case.input.clone()),
                    expected_output: Some(test_case.output.clone()),
                    actual_output: output.output,
                    message: output.compile_message.unwrap_or_default(),
                    execution_time_ms: output.execution_time_ms,
                    memory_used_kb: output.memory_used_kb,
                };
                (result, None)
            }
            Err(failure) => {
                let result = CaseResult {
                    test_case_id: test_case.id,
                    is_hidden: test_case.is_hidden,
                    status: failure.kind.case_status(),
                    input: Some(test_case.input.clone()),
                    expected_output: Some(test_case.output.clone()),
                    actual_output: String::new(),
                    message: failure.message.clone().unwrap_or_default(),
                    execution_time_ms: None,
                    memory_used_kb: None,
                };
                (result, Some(failure))
            }
        };

        let status = result.status;
        tracing::debug!(case = idx + 1, test_case_id = %test_case.id, status = %status, "Case evaluated");
        cases.push(result);

        if status == CaseStatus::Passed {
            continue;
        }
        first_failure.get_or_insert(status);
        if mode.stops_on(status) {
            halted_by = failure;
            break;
        }
    }

    let verdict = first_failure.map(Verdict::from).unwrap_or(Verdict::Accepted);

    tracing::debug!(
        mode = mode.label(),
        verdict = %verdict,
        run = cases.len(),
        total = test_cases.len(),
        "Evaluation complete"
    );

    Ok(Evaluation {
        verdict,
        cases,
        halted_by,
        total_execution_time_ms: total_time,
        max_memory_kb: max_memory,
    })
}
