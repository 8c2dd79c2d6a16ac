// Test doubles shared by the API test modules

use async_trait::async_trait;
use chrono::Utc;
use judge_common::types::{Difficulty, Language, Problem, Role, TestCase};
use judge_common::{MemoryStore, Store};
use judge_engine::{ExecutionEngine, ExecutionFailure, ExecutionOutput, FailureKind};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

use crate::auth::Identity;

type Reply = Result<ExecutionOutput, ExecutionFailure>;

/// Engine that replies from a per-input script and echoes stdin otherwise
///
/// Scripted replies for one input are consumed in order; the last one repeats.
pub struct ScriptedEngine {
    script: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn echo() -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn push(self, input: &str, reply: Reply) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(input.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn output(self, input: &str, output: &str) -> Self {
        self.push(
            input,
            Ok(ExecutionOutput {
                success: true,
                output: output.to_string(),
                ..Default::default()
            }),
        )
    }

    pub fn fail(self, input: &str, kind: FailureKind, message: &str) -> Self {
        self.push(input, Err(ExecutionFailure::new(kind, message)))
    }

    /// Inputs seen, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ExecutionEngine for ScriptedEngine {
    async fn execute(
        &self,
        _code: &str,
        _language: Language,
        input: &str,
    ) -> Result<ExecutionOutput, ExecutionFailure> {
        self.calls.lock().unwrap().push(input.to_string());

        let mut script = self.script.lock().unwrap();
        match script.get_mut(input) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Ok(ExecutionOutput {
                success: true,
                output: input.to_string(),
                ..Default::default()
            }),
        }
    }
}

pub fn identity(user_id: &str) -> Identity {
    Identity {
        user_id: user_id.to_string(),
        role: Role::User,
    }
}

/// Store a problem with (input, output, hidden) cases in the given order
pub async fn seed_problem(store: &MemoryStore, cases: &[(&str, &str, bool)]) -> Problem {
    let mut boilerplate = HashMap::new();
    boilerplate.insert(Language::Cpp, "// cpp starter".to_string());

    let problem = Problem {
        id: Uuid::new_v4(),
        title: "Sum of Two Numbers".to_string(),
        statement: "Given two integers a and b, print their sum.".to_string(),
        input_format: String::new(),
        output_format: String::new(),
        constraints: "1 <= a, b <= 1000".to_string(),
        time_limit_secs: 1,
        memory_limit_mb: 256,
        difficulty: Difficulty::Easy,
        tags: vec!["math".to_string()],
        boilerplate,
        created_at: Utc::now(),
    };
    store.put_problem(&problem).await.unwrap();

    for (input, output, hidden) in cases {
        store
            .add_test_case(&TestCase {
                id: Uuid::new_v4(),
                problem_id: problem.id,
                input: input.to_string(),
                output: output.to_string(),
                is_hidden: *hidden,
                points: 10,
            })
            .await
            .unwrap();
    }
    problem
}
