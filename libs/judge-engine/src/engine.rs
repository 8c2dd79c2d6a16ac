/// Execution Client - Boundary to the External Execution Service
///
/// **Core Responsibility:**
/// Send (code, language, input) to the execution service and return either
/// the raw program output or a classified failure.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to reach the execution backend
/// - Engine does NOT compare outputs or decide verdicts
/// - Engine does NOT retry; one call per invocation
///
/// Failures come back as a closed `FailureKind`, so callers match on the kind
/// instead of inspecting message text.

use async_trait::async_trait;
use judge_common::types::{CaseStatus, Language};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Raw output of one successful execution
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionOutput {
    pub success: bool,
    pub output: String,
    pub compile_message: Option<String>,
    /// Only present when the execution service reports it
    pub execution_time_ms: Option<u64>,
    pub memory_used_kb: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    CompilationError,
    RuntimeError,
    TimeLimitExceeded,
    /// Unreachable service, malformed body, or unclassified backend error
    Transport,
}

impl FailureKind {
    /// Per-case status a failure of this kind produces
    pub fn case_status(&self) -> CaseStatus {
        match self {
            FailureKind::CompilationError => CaseStatus::CompilationError,
            FailureKind::RuntimeError => CaseStatus::RuntimeError,
            FailureKind::TimeLimitExceeded => CaseStatus::TimeLimitExceeded,
            FailureKind::Transport => CaseStatus::ExecutionFailed,
        }
    }

    /// Parse the `verdict` field of an execution service reply
    pub fn from_service_verdict(verdict: &str) -> Option<FailureKind> {
        match verdict {
            "Compilation Error" => Some(FailureKind::CompilationError),
            "Runtime Error" => Some(FailureKind::RuntimeError),
            "Time Limit Exceeded" => Some(FailureKind::TimeLimitExceeded),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::CompilationError => "compilation_error",
            FailureKind::RuntimeError => "runtime_error",
            FailureKind::TimeLimitExceeded => "time_limit_exceeded",
            FailureKind::Transport => "transport",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.case_status().as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {}", .message.as_deref().unwrap_or("no diagnostic"))]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    pub message: Option<String>,
}

impl ExecutionFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }

    pub fn bare(kind: FailureKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, message)
    }
}

/// Execution engine trait
///
/// Any implementation must guarantee:
/// 1. One execution of `code` with `input` as stdin per call
/// 2. Failures classified into `FailureKind`
/// 3. No internal retry
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn execute(
        &self,
        code: &str,
        language: Language,
        input: &str,
    ) -> Result<ExecutionOutput, ExecutionFailure>;
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    code: &'a str,
    language: Language,
    input: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunReply {
    #[serde(default)]
    success: bool,
    output: Option<String>,
    compile_message: Option<String>,
    verdict: Option<String>,
    message: Option<String>,
    error: Option<String>,
    execution_time: Option<u64>,
    memory_used: Option<u64>,
}

/// Map a decoded reply onto the client contract
fn classify(status_ok: bool, status: u16, reply: RunReply) -> Result<ExecutionOutput, ExecutionFailure> {
    if let Some(kind) = reply.verdict.as_deref().and_then(FailureKind::from_service_verdict) {
        return Err(ExecutionFailure {
            kind,
            message: reply.compile_message.or(reply.message).or(reply.error),
        });
    }

    if !status_ok {
        let message = reply
            .message
            .or(reply.error)
            .or(reply.compile_message)
            .unwrap_or_else(|| format!("execution service responded with status {}", status));
        return Err(ExecutionFailure::transport(message));
    }

    Ok(ExecutionOutput {
        success: reply.success,
        output: reply.output.unwrap_or_default(),
        compile_message: reply.compile_message.filter(|m| !m.is_empty()),
        execution_time_ms: reply.execution_time,
        memory_used_kb: reply.memory_used,
    })
}

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Execution client over HTTP
///
/// Endpoint, client and per-call deadline are fixed at construction.
/// A call that outlives the deadline once connected is reported as
/// `TimeLimitExceeded`; failing to connect at all is a transport failure.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    client: reqwest::Client,
    run_url: String,
    timeout: Duration,
}

impl HttpEngine {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_deadlines(base_url, timeout, DEFAULT_CONNECT_TIMEOUT.min(timeout / 2))
    }

    /// `connect_timeout` should be shorter than `timeout` so that an
    /// unreachable host is reported as a transport failure
    pub fn with_deadlines(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self::with_client(client, base_url, timeout))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            run_url: format!("{}/run", base_url.trim_end_matches('/')),
            timeout,
        }
    }

    pub fn run_url(&self) -> &str {
        &self.run_url
    }

    /// Connection failures come first: a connect timeout also reports `is_timeout`
    fn send_failure(&self, e: reqwest::Error) -> ExecutionFailure {
        if e.is_connect() {
            ExecutionFailure::transport(format!("execution service unreachable: {}", e))
        } else if e.is_timeout() {
            ExecutionFailure::new(
                FailureKind::TimeLimitExceeded,
                format!("no response within {}ms", self.timeout.as_millis()),
            )
        } else {
            ExecutionFailure::transport(format!("execution service request failed: {}", e))
        }
    }
}

#[async_trait]
impl ExecutionEngine for HttpEngine {
    async fn execute(
        &self,
        code: &str,
        language: Language,
        input: &str,
    ) -> Result<ExecutionOutput, ExecutionFailure> {
        let request = RunRequest {
            code,
            language,
            input,
        };

        let response = self
            .client
            .post(&self.run_url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.send_failure(e))?;

        let status = response.status();
        let reply: RunReply = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.send_failure(e)
            } else {
                ExecutionFailure::transport(format!(
                    "malformed reply from execution service ({}): {}",
                    status, e
                ))
            }
        })?;

        let result = classify(status.is_success(), status.as_u16(), reply);
        if let Err(failure) = &result {
            tracing::debug!(
                language = %language,
                kind = failure.kind.label(),
                "Execution service reported failure"
            );
        }
        result
    }
}
