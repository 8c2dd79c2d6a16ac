// HTTP route handlers for the judge API

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use judge_common::types::{Language, Submission};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::auth::Identity;
use crate::autosave::ResolvedCode;
use crate::error::JudgeError;
use crate::metrics;
use crate::orchestrator::{CustomRunReport, SampleReport, SubmissionReport};
use crate::AppState;

/// Body of run-sample and submit
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub problem_id: Option<String>,
    pub code: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRunRequest {
    pub code: Option<String>,
    pub language: Option<String>,
    pub custom_input: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDraftRequest {
    pub problem_id: Option<String>,
    pub code: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub language: Option<String>,
}

/// Present and non-empty
fn required(value: Option<String>, field: &str) -> Result<String, JudgeError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(JudgeError::Validation(format!("{} is required", field))),
    }
}

fn parse_language(raw: &str) -> Result<Language, JudgeError> {
    raw.parse::<Language>()
        .map_err(|e| JudgeError::UnsupportedLanguage(e.0))
}

/// Ids that cannot be parsed name no problem
fn parse_problem_id(raw: &str) -> Result<Uuid, JudgeError> {
    Uuid::parse_str(raw.trim()).map_err(|_| JudgeError::ProblemNotFound)
}

struct Validated {
    problem_id: Uuid,
    code: String,
    language: Language,
}

fn validate(payload: SubmissionRequest) -> Result<Validated, JudgeError> {
    let problem_id = required(payload.problem_id, "problemId")?;
    let code = required(payload.code, "code")?;
    let language = required(payload.language, "language")?;
    Ok(Validated {
        problem_id: parse_problem_id(&problem_id)?,
        code,
        language: parse_language(&language)?,
    })
}

/// POST /api/submissions/run-sample - Run code on the visible test cases
pub async fn run_sample(
    State(state): State<Arc<AppState>>,
    _caller: Identity,
    Json(payload): Json<SubmissionRequest>,
) -> Result<Json<SampleReport>, JudgeError> {
    let request = validate(payload)?;
    let language = request.language.to_string();

    let started = Instant::now();
    let result = state
        .judge
        .run_sample(request.problem_id, &request.code, request.language)
        .await;
    metrics::observe_evaluation("sample", started.elapsed().as_secs_f64() * 1000.0);

    match &result {
        Ok(report) => metrics::record_sample_run(&language, report.verdict.as_str()),
        Err(e) => metrics::record_sample_run(&language, e.label()),
    }
    result.map(Json)
}

/// POST /api/submissions/run-custom - Run code on caller-supplied input
pub async fn run_custom(
    State(state): State<Arc<AppState>>,
    _caller: Identity,
    Json(payload): Json<CustomRunRequest>,
) -> Result<Json<CustomRunReport>, JudgeError> {
    let code = required(payload.code, "code")?;
    let language = parse_language(&required(payload.language, "language")?)?;
    // empty input is valid; only absence is an error
    let custom_input = payload
        .custom_input
        .ok_or_else(|| JudgeError::Validation("customInput is required".to_string()))?;

    let result = state.judge.run_custom(&code, language, &custom_input).await;
    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.label(),
    };
    metrics::record_custom_run(&language.to_string(), outcome);
    result.map(Json)
}

/// POST /api/submissions - Grade code against every test case
pub async fn submit(
    State(state): State<Arc<AppState>>,
    caller: Identity,
    Json(payload): Json<SubmissionRequest>,
) -> Result<Json<SubmissionReport>, JudgeError> {
    let request = validate(payload)?;
    let language = request.language.to_string();

    let started = Instant::now();
    let result = state
        .judge
        .submit(&caller, request.problem_id, &request.code, request.language)
        .await;
    metrics::observe_evaluation("graded", started.elapsed().as_secs_f64() * 1000.0);

    match &result {
        Ok(report) => metrics::record_submission(&language, report.verdict.as_str()),
        Err(JudgeError::SubmissionFailed(submission)) => {
            metrics::record_submission(&language, submission.verdict.as_str())
        }
        Err(_) => {}
    }
    result.map(Json)
}

/// GET /api/submissions/user/:user_id - A user's submissions (self or admin)
pub async fn list_user_submissions(
    State(state): State<Arc<AppState>>,
    caller: Identity,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Submission>>, JudgeError> {
    let submissions = state.judge.user_submissions(&caller, &user_id).await?;
    Ok(Json(submissions))
}

/// GET /api/submissions - Every submission (admin)
pub async fn list_all_submissions(
    State(state): State<Arc<AppState>>,
    caller: Identity,
) -> Result<Json<Vec<Submission>>, JudgeError> {
    let submissions = state.judge.all_submissions(&caller).await?;
    Ok(Json(submissions))
}

/// POST /api/drafts - Queue a debounced draft save
pub async fn save_draft(
    State(state): State<Arc<AppState>>,
    caller: Identity,
    Json(payload): Json<SaveDraftRequest>,
) -> Result<impl IntoResponse, JudgeError> {
    let problem_id = parse_problem_id(&required(payload.problem_id, "problemId")?)?;
    let code = required(payload.code, "code")?;
    let language = parse_language(&required(payload.language, "language")?)?;

    state
        .autosave
        .save(&caller.user_id, problem_id, code, language)
        .await;

    Ok((StatusCode::ACCEPTED, Json(json!({ "message": "Draft queued" }))))
}

/// GET /api/drafts/:problem_id - The caller's draft for a problem, if any
pub async fn load_draft(
    State(state): State<Arc<AppState>>,
    caller: Identity,
    Path(problem_id): Path<String>,
) -> Result<impl IntoResponse, JudgeError> {
    let problem_id = parse_problem_id(&problem_id)?;
    let draft = state.autosave.load(&caller.user_id, &problem_id).await?;
    Ok(Json(json!({ "draft": draft })))
}

/// GET /api/drafts/:problem_id/resolve?language= - Starting code for the editor
pub async fn resolve_draft(
    State(state): State<Arc<AppState>>,
    caller: Identity,
    Path(problem_id): Path<String>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ResolvedCode>, JudgeError> {
    let problem_id = parse_problem_id(&problem_id)?;
    let language = match query.language.as_deref() {
        Some(raw) => parse_language(raw)?,
        None => Language::Cpp,
    };

    state
        .autosave
        .resolve(&caller.user_id, &problem_id, language)
        .await?
        .map(Json)
        .ok_or(JudgeError::ProblemNotFound)
}

/// GET /health - Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "uptime_secs": state.start_time.elapsed().as_secs(),
        })),
    )
}

/// GET /metrics - Prometheus exposition
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render_metrics(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_reports_missing_field() {
        let err = validate(SubmissionRequest {
            problem_id: Some(Uuid::new_v4().to_string()),
            code: Some(String::new()),
            language: Some("cpp".into()),
        })
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "code is required");

        let err = validate(SubmissionRequest {
            problem_id: None,
            code: Some("x".into()),
            language: Some("cpp".into()),
        })
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "problemId is required");
    }

    #[test]
    fn test_validate_rejects_unknown_language_and_bad_id() {
        let err = validate(SubmissionRequest {
            problem_id: Some(Uuid::new_v4().to_string()),
            code: Some("x".into()),
            language: Some("cobol".into()),
        })
        .err()
        .unwrap();
        assert!(matches!(err, JudgeError::UnsupportedLanguage(ref l) if l == "cobol"));

        let err = validate(SubmissionRequest {
            problem_id: Some("not-a-uuid".into()),
            code: Some("x".into()),
            language: Some("cpp".into()),
        })
        .err()
        .unwrap();
        assert!(matches!(err, JudgeError::ProblemNotFound));
    }
}
