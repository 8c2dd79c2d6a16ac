use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Strongly-typed language enum
/// Anything outside this set is rejected before it reaches the execution service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Cpp,
    Java,
    Python,
}

impl Language {
    /// Returns all language variants
    /// This is the single source of truth for available languages
    pub fn all_variants() -> &'static [Language] {
        &[Language::Cpp, Language::Java, Language::Python]
    }

    /// Starter template used when a problem does not define its own
    pub fn default_boilerplate(&self) -> &'static str {
        match self {
            Language::Cpp => {
                "#include <iostream>\nusing namespace std;\n\nint main() {\n    // Your solution here\n    return 0;\n}\n"
            }
            Language::Java => {
                "import java.util.*;\n\npublic class Main {\n    public static void main(String[] args) {\n        Scanner sc = new Scanner(System.in);\n        // Your solution here\n        sc.close();\n    }\n}\n"
            }
            Language::Python => "# Read input\nn = int(input())\n\n# Your solution here\n",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Cpp => write!(f, "cpp"),
            Language::Java => write!(f, "java"),
            Language::Python => write!(f, "python"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported language: {0}")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    /// Case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpp" | "c++" => Ok(Language::Cpp),
            "java" => Ok(Language::Java),
            "python" => Ok(Language::Python),
            _ => Err(UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Caller role as reported by the auth gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Problem definition
///
/// Time and memory limits are advisory; the execution service enforces its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: Uuid,
    pub title: String,
    pub statement: String,
    #[serde(default)]
    pub input_format: String,
    #[serde(default)]
    pub output_format: String,
    #[serde(default)]
    pub constraints: String,
    pub time_limit_secs: u32,
    pub memory_limit_mb: u32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub boilerplate: HashMap<Language, String>,
    pub created_at: DateTime<Utc>,
}

impl Problem {
    /// Problem-specific template, falling back to the language default
    pub fn boilerplate_for(&self, language: Language) -> &str {
        self.boilerplate
            .get(&language)
            .map(String::as_str)
            .unwrap_or_else(|| language.default_boilerplate())
    }
}

/// Test Case Definition (Immutable Input)
/// Belongs to exactly one problem; storage order is evaluation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: Uuid,
    pub problem_id: Uuid,
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub points: u32, // informational only
}

/// Final outcome of a graded submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pending,
    Accepted,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Compilation Error")]
    CompilationError,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Internal Error")]
    InternalError,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pending => "Pending",
            Verdict::Accepted => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::CompilationError => "Compilation Error",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::TimeLimitExceeded => "Time Limit Exceeded",
            Verdict::InternalError => "Internal Error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != Verdict::Pending
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-Test Status
/// Distinguishes different failure modes for individual test cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseStatus {
    Passed,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Compilation Error")]
    CompilationError,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Execution Failed")]
    ExecutionFailed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Passed => "Passed",
            CaseStatus::WrongAnswer => "Wrong Answer",
            CaseStatus::CompilationError => "Compilation Error",
            CaseStatus::RuntimeError => "Runtime Error",
            CaseStatus::TimeLimitExceeded => "Time Limit Exceeded",
            CaseStatus::ExecutionFailed => "Execution Failed",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CaseStatus> for Verdict {
    fn from(status: CaseStatus) -> Self {
        match status {
            CaseStatus::Passed => Verdict::Accepted,
            CaseStatus::WrongAnswer => Verdict::WrongAnswer,
            CaseStatus::CompilationError => Verdict::CompilationError,
            CaseStatus::RuntimeError => Verdict::RuntimeError,
            CaseStatus::TimeLimitExceeded => Verdict::TimeLimitExceeded,
            CaseStatus::ExecutionFailed => Verdict::InternalError,
        }
    }
}

/// Per-Test Result
/// Metrics are present only when the execution service reported them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    pub test_case_id: Uuid,
    pub is_hidden: bool,
    pub status: CaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    pub actual_output: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used_kb: Option<u64>,
}

impl CaseResult {
    /// Copy safe to show the submitter: hidden cases lose their input and expected output
    pub fn redacted(&self) -> CaseResult {
        let mut shown = self.clone();
        if shown.is_hidden {
            shown.input = None;
            shown.expected_output = None;
        }
        shown
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("submission {0} already has a terminal verdict")]
pub struct AlreadyFinalized(pub Uuid);

/// Submission State Machine
/// Created as Pending, finalized exactly once, immutable afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub user_id: String,
    pub problem_id: Uuid,
    pub code: String,
    pub language: Language,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used_kb: Option<u64>,
    #[serde(default)]
    pub verdicts: Vec<CaseResult>,
    #[serde(default)]
    pub compile_message: String,
    pub submitted_at: DateTime<Utc>,
}

/// Terminal data written into a pending submission
#[derive(Debug, Clone, Default)]
pub struct Finalization {
    pub execution_time_ms: Option<u64>,
    pub memory_used_kb: Option<u64>,
    pub verdicts: Vec<CaseResult>,
    pub compile_message: String,
}

impl Submission {
    pub fn pending(user_id: &str, problem_id: Uuid, code: &str, language: Language) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            problem_id,
            code: code.to_string(),
            language,
            verdict: Verdict::Pending,
            execution_time_ms: None,
            memory_used_kb: None,
            verdicts: Vec::new(),
            compile_message: String::new(),
            submitted_at: Utc::now(),
        }
    }

    /// Move a pending submission to its terminal verdict
    pub fn finalize(
        &mut self,
        verdict: Verdict,
        details: Finalization,
    ) -> Result<(), AlreadyFinalized> {
        if self.verdict.is_terminal() {
            return Err(AlreadyFinalized(self.id));
        }
        self.verdict = verdict;
        self.execution_time_ms = details.execution_time_ms;
        self.memory_used_kb = details.memory_used_kb;
        self.verdicts = details.verdicts;
        self.compile_message = details.compile_message;
        Ok(())
    }

    pub fn passed_count(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|v| v.status == CaseStatus::Passed)
            .count()
    }
}

/// In-progress editor code, at most one per (user, problem)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub user_id: String,
    pub problem_id: Uuid,
    pub code: String,
    pub language: Language,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_case(hidden: bool) -> CaseResult {
        CaseResult {
            test_case_id: Uuid::new_v4(),
            is_hidden: hidden,
            status: CaseStatus::Passed,
            input: Some("1 2".to_string()),
            expected_output: Some("3".to_string()),
            actual_output: "3".to_string(),
            message: String::new(),
            execution_time_ms: None,
            memory_used_kb: None,
        }
    }

    #[test]
    fn test_language_serialization() {
        let json = serde_json::to_string(&Language::Cpp).unwrap();
        assert_eq!(json, "\"cpp\"");

        let deserialized: Language = serde_json::from_str("\"python\"").unwrap();
        assert_eq!(deserialized, Language::Python);
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("cpp".parse::<Language>(), Ok(Language::Cpp));
        assert_eq!("C++".parse::<Language>(), Ok(Language::Cpp));
        assert_eq!("Java".parse::<Language>(), Ok(Language::Java));
        assert_eq!("PYTHON".parse::<Language>(), Ok(Language::Python));

        let err = "rust".parse::<Language>().unwrap_err();
        assert_eq!(err, UnsupportedLanguage("rust".to_string()));
        assert_eq!(err.to_string(), "unsupported language: rust");
        assert!("".parse::<Language>().is_err());
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!(" Admin ".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));

        let err = "root".parse::<Role>().unwrap_err();
        assert_eq!(err, UnknownRole("root".to_string()));
        assert_eq!(err.to_string(), "unknown role: root");
    }

    #[test]
    fn test_language_all_variants() {
        let variants = Language::all_variants();
        assert_eq!(variants.len(), 3);
        assert!(variants.contains(&Language::Cpp));
        assert!(variants.contains(&Language::Java));
        assert!(variants.contains(&Language::Python));
    }

    #[test]
    fn test_verdict_wire_names() {
        assert_eq!(
            serde_json::to_string(&Verdict::WrongAnswer).unwrap(),
            "\"Wrong Answer\""
        );
        assert_eq!(
            serde_json::to_string(&Verdict::InternalError).unwrap(),
            "\"Internal Error\""
        );
        assert_eq!(
            serde_json::to_string(&CaseStatus::ExecutionFailed).unwrap(),
            "\"Execution Failed\""
        );
        assert_eq!(Verdict::TimeLimitExceeded.to_string(), "Time Limit Exceeded");
    }

    #[test]
    fn test_case_status_maps_to_verdict() {
        assert_eq!(Verdict::from(CaseStatus::Passed), Verdict::Accepted);
        assert_eq!(Verdict::from(CaseStatus::WrongAnswer), Verdict::WrongAnswer);
        assert_eq!(
            Verdict::from(CaseStatus::ExecutionFailed),
            Verdict::InternalError
        );
    }

    #[test]
    fn test_submission_finalizes_once() {
        let mut submission = Submission::pending("u1", Uuid::new_v4(), "code", Language::Cpp);
        assert_eq!(submission.verdict, Verdict::Pending);

        submission
            .finalize(
                Verdict::Accepted,
                Finalization {
                    verdicts: vec![sample_case(false)],
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(submission.verdict, Verdict::Accepted);
        assert_eq!(submission.passed_count(), 1);

        let again = submission.finalize(Verdict::WrongAnswer, Finalization::default());
        assert_eq!(again, Err(AlreadyFinalized(submission.id)));
        assert_eq!(
            again.unwrap_err().to_string(),
            format!("submission {} already has a terminal verdict", submission.id)
        );
        assert_eq!(submission.verdict, Verdict::Accepted);
    }

    #[test]
    fn test_hidden_case_redaction() {
        let hidden = sample_case(true).redacted();
        assert!(hidden.input.is_none());
        assert!(hidden.expected_output.is_none());

        let visible = sample_case(false).redacted();
        assert_eq!(visible.input.as_deref(), Some("1 2"));

        let json = serde_json::to_value(&hidden).unwrap();
        assert!(json.get("input").is_none());
        assert_eq!(json["status"], "Passed");
    }

    #[test]
    fn test_problem_boilerplate_fallback() {
        let mut boilerplate = HashMap::new();
        boilerplate.insert(Language::Python, "print(42)".to_string());
        let problem = Problem {
            id: Uuid::new_v4(),
            title: "Answer".to_string(),
            statement: "Print 42".to_string(),
            input_format: String::new(),
            output_format: String::new(),
            constraints: String::new(),
            time_limit_secs: 1,
            memory_limit_mb: 256,
            difficulty: Difficulty::Easy,
            tags: vec![],
            boilerplate,
            created_at: Utc::now(),
        };

        assert_eq!(problem.boilerplate_for(Language::Python), "print(42)");
        assert_eq!(
            problem.boilerplate_for(Language::Java),
            Language::Java.default_boilerplate()
        );
    }

    #[test]
    fn test_problem_boilerplate_keys_deserialize() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "title": "Sum",
            "statement": "Add",
            "timeLimitSecs": 1,
            "memoryLimitMb": 256,
            "difficulty": "Easy",
            "boilerplate": { "cpp": "int main() {}" },
            "createdAt": "2024-01-01T00:00:00Z"
        });
        let problem: Problem = serde_json::from_value(json).unwrap();
        assert_eq!(problem.boilerplate_for(Language::Cpp), "int main() {}");
    }
}
