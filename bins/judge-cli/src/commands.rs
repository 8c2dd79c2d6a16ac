// CLI commands for seeding and driving the judge
use anyhow::{bail, Context, Result};
use handlebars::{handlebars_helper, Handlebars};
use judge_common::types::{Difficulty, Language, Problem, TestCase};
use judge_common::{RedisStore, Store};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use uuid::Uuid;

/// Per-case listing, shared by sample and submission reports
const CASES_PARTIAL: &str = "\
{{#each verdicts}}
  case {{inc @index}}: {{status}}{{#if message}} - {{message}}{{/if}}
{{#if input}}    input:    {{input}}
{{/if}}{{#if expectedOutput}}    expected: {{expectedOutput}}
{{/if}}    actual:   {{actualOutput}}
{{/each}}";

const SAMPLE_TEMPLATE: &str = "\
Verdict: {{verdict}} ({{passedTestCases}}/{{totalTestCases}} passed)
{{> cases}}";

const SUBMISSION_TEMPLATE: &str = "\
Submission {{submissionId}}
Verdict: {{verdict}} ({{passedTestCases}}/{{totalTestCases}} passed)
{{#if executionTime}}Time: {{executionTime}} ms
{{/if}}{{#if memoryUsed}}Memory: {{memoryUsed}} KB
{{/if}}{{#if compileMessage}}Message: {{compileMessage}}
{{/if}}{{> cases}}";

const CUSTOM_TEMPLATE: &str = "\
{{#if success}}Run succeeded{{else}}Run reported failure{{/if}}
--- output ---
{{output}}
{{#if compileMessage}}--- message ---
{{compileMessage}}
{{/if}}";

const FAILURE_TEMPLATE: &str = "\
Request failed ({{status}}): {{body.message}}
{{#if body.verdict}}Verdict: {{body.verdict}}
{{/if}}{{#if body.submissionId}}Submission: {{body.submissionId}}
{{/if}}{{#if body.compileMessage}}Details: {{body.compileMessage}}
{{/if}}";

const LISTING_TEMPLATE: &str = "\
{{#each this}}{{id}}  {{language}}  {{verdict}}  {{submittedAt}}
{{else}}No submissions.
{{/each}}";

handlebars_helper!(inc: |v: u64| v + 1);

fn renderer() -> Result<Handlebars<'static>> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.register_helper("inc", Box::new(inc));
    handlebars
        .register_partial("cases", CASES_PARTIAL)
        .context("Failed to register case listing")?;
    Ok(handlebars)
}

fn render(template: &str, data: &Value) -> Result<String> {
    renderer()?
        .render_template(template, data)
        .context("Failed to render report")
}

/// Thin client for the judge HTTP API
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    user_id: String,
    role: String,
}

impl ApiClient {
    pub fn new(base_url: &str, user_id: &str, role: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
            role: role.to_string(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-user-id", &self.user_id)
            .header("x-user-role", &self.role)
    }

    /// Send and decode; non-2xx replies are printed and turned into an error
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach judge API at {}", self.base_url))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .context("Judge API returned a non-JSON body")?;

        if !status.is_success() {
            print!(
                "{}",
                render(FAILURE_TEMPLATE, &json!({ "status": status.as_u16(), "body": body }))?
            );
            bail!("judge API responded with {}", status);
        }
        Ok(body)
    }

    async fn post(&self, path: &str, payload: &Value) -> Result<Value> {
        self.send(self.request(reqwest::Method::POST, path).json(payload))
            .await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.send(self.request(reqwest::Method::GET, path)).await
    }
}

fn read_source(path: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read source file {}", path))
}

/// Run a solution against the sample cases
pub async fn run_sample(api: &ApiClient, problem: &str, file: &str, language: &str) -> Result<()> {
    let code = read_source(file)?;
    println!("Running {} against samples of {}...", file, problem);

    let report = api
        .post(
            "/api/submissions/run-sample",
            &json!({ "problemId": problem, "code": code, "language": language }),
        )
        .await?;
    print!("{}", render(SAMPLE_TEMPLATE, &report)?);
    Ok(())
}

/// Run a solution on custom stdin
pub async fn run_custom(
    api: &ApiClient,
    file: &str,
    language: &str,
    input: &str,
    input_file: Option<&str>,
) -> Result<()> {
    let code = read_source(file)?;
    let custom_input = match input_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path))?,
        None => input.to_string(),
    };

    let report = api
        .post(
            "/api/submissions/run-custom",
            &json!({ "code": code, "language": language, "customInput": custom_input }),
        )
        .await?;
    print!("{}", render(CUSTOM_TEMPLATE, &report)?);
    Ok(())
}

/// Submit a solution for grading
pub async fn submit(api: &ApiClient, problem: &str, file: &str, language: &str) -> Result<()> {
    let code = read_source(file)?;
    println!("Submitting {} to {}...", file, problem);

    let report = api
        .post(
            "/api/submissions",
            &json!({ "problemId": problem, "code": code, "language": language }),
        )
        .await?;
    print!("{}", render(SUBMISSION_TEMPLATE, &report)?);
    Ok(())
}

/// List one user's submissions, or every submission when `user` is None
pub async fn list_submissions(api: &ApiClient, user: Option<&str>) -> Result<()> {
    let path = match user {
        Some(user) => format!("/api/submissions/user/{}", user),
        None => "/api/submissions".to_string(),
    };
    let listing = api.get(&path).await?;
    print!("{}", render(LISTING_TEMPLATE, &listing)?);
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedCase {
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default = "default_points")]
    pub points: u32,
}

fn default_points() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedProblem {
    /// Stable id; a fresh one is generated when omitted
    #[serde(default)]
    pub id: Option<Uuid>,
    pub title: String,
    pub statement: String,
    #[serde(default)]
    pub input_format: String,
    #[serde(default)]
    pub output_format: String,
    #[serde(default)]
    pub constraints: String,
    #[serde(default = "default_time_limit")]
    pub time_limit_secs: u32,
    #[serde(default = "default_memory_limit")]
    pub memory_limit_mb: u32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub boilerplate: HashMap<Language, String>,
    #[serde(default)]
    pub test_cases: Vec<SeedCase>,
}

fn default_time_limit() -> u32 {
    1
}

fn default_memory_limit() -> u32 {
    256
}

impl SeedProblem {
    /// Problem record plus its cases in file order
    pub fn into_records(self) -> (Problem, Vec<TestCase>) {
        let problem = Problem {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            title: self.title,
            statement: self.statement,
            input_format: self.input_format,
            output_format: self.output_format,
            constraints: self.constraints,
            time_limit_secs: self.time_limit_secs,
            memory_limit_mb: self.memory_limit_mb,
            difficulty: self.difficulty,
            tags: self.tags,
            boilerplate: self.boilerplate,
            created_at: chrono::Utc::now(),
        };

        let cases = self
            .test_cases
            .into_iter()
            .map(|case| TestCase {
                id: Uuid::new_v4(),
                problem_id: problem.id,
                input: case.input,
                output: case.output,
                is_hidden: case.is_hidden,
                points: case.points,
            })
            .collect();

        (problem, cases)
    }
}

pub fn parse_seed_file(content: &str) -> Result<Vec<SeedProblem>> {
    serde_json::from_str(content).context("Failed to parse problems file")
}

/// Load problems and test cases into Redis
pub async fn seed(file: &str, redis_url: &str) -> Result<()> {
    println!("Seeding problems from {}", file);

    let content =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))?;
    let problems = parse_seed_file(&content)?;

    let store = RedisStore::connect(redis_url)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", redis_url))?;

    for seed in problems {
        let (problem, cases) = seed.into_records();
        if store.find_problem(&problem.id).await?.is_some() {
            println!("  skipped {} ({}): already present", problem.title, problem.id);
            continue;
        }

        store
            .put_problem(&problem)
            .await
            .with_context(|| format!("Failed to store problem {}", problem.title))?;
        for case in &cases {
            store
                .add_test_case(case)
                .await
                .with_context(|| format!("Failed to store test case for {}", problem.title))?;
        }

        let hidden = cases.iter().filter(|c| c.is_hidden).count();
        println!(
            "  added {} ({}): {} cases, {} hidden",
            problem.title,
            problem.id,
            cases.len(),
            hidden
        );
    }

    println!("Done.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_problems_parse() {
        let problems = parse_seed_file(include_str!("../../../demos/problems.json")).unwrap();
        assert!(!problems.is_empty());

        let (problem, cases) = parse_seed_file(include_str!("../../../demos/problems.json"))
            .unwrap()
            .remove(0)
            .into_records();
        assert_eq!(problem.title, "Sum of Two Numbers");
        assert!(cases.iter().all(|c| c.problem_id == problem.id));
        assert!(cases.iter().any(|c| !c.is_hidden));
    }

    #[test]
    fn test_seed_defaults() {
        let problems = parse_seed_file(
            r#"[{"title":"Echo","statement":"Print input","difficulty":"Easy",
                "testCases":[{"input":"1","output":"1"}]}]"#,
        )
        .unwrap();
        let (problem, cases) = problems.into_iter().next().unwrap().into_records();
        assert_eq!(problem.time_limit_secs, 1);
        assert_eq!(problem.memory_limit_mb, 256);
        assert_eq!(cases.len(), 1);
        assert!(!cases[0].is_hidden);
        assert_eq!(cases[0].points, 10);
    }

    #[test]
    fn test_sample_report_renders_cases() {
        let report = json!({
            "verdict": "Wrong Answer",
            "passedTestCases": 1,
            "totalTestCases": 2,
            "verdicts": [
                { "status": "Passed", "message": "", "input": "1", "expectedOutput": "1", "actualOutput": "1" },
                { "status": "Wrong Answer", "message": "Output mismatch", "input": "2 3", "expectedOutput": "5", "actualOutput": "6" }
            ]
        });
        let text = render(SAMPLE_TEMPLATE, &report).unwrap();
        assert!(text.starts_with("Verdict: Wrong Answer (1/2 passed)"));
        assert!(text.contains("case 2: Wrong Answer - Output mismatch"));
        assert!(text.contains("expected: 5"));
    }

    #[test]
    fn test_submission_report_prints_verdict_once() {
        let report = json!({
            "submissionId": "abc",
            "verdict": "Accepted",
            "passedTestCases": 1,
            "totalTestCases": 1,
            "executionTime": 12,
            "compileMessage": "",
            "verdicts": [
                { "status": "Passed", "message": "", "input": "1", "expectedOutput": "1", "actualOutput": "1" }
            ]
        });
        let text = render(SUBMISSION_TEMPLATE, &report).unwrap();
        assert_eq!(text.matches("Verdict:").count(), 1);
        assert!(text.contains("Time: 12 ms"));
        assert!(!text.contains("Message:"));
        assert!(text.contains("case 1: Passed"));
    }

    #[test]
    fn test_failure_report_shows_submission() {
        let text = render(
            FAILURE_TEMPLATE,
            &json!({
                "status": 500,
                "body": {
                    "message": "Submission failed",
                    "verdict": "Internal Error",
                    "submissionId": "abc"
                }
            }),
        )
        .unwrap();
        assert!(text.contains("Request failed (500): Submission failed"));
        assert!(text.contains("Submission: abc"));
    }

    #[test]
    fn test_empty_listing() {
        let text = render(LISTING_TEMPLATE, &json!([])).unwrap();
        assert_eq!(text.trim(), "No submissions.");
    }
}
