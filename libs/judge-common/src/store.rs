/// Persistence for problems, test cases, submissions and drafts
///
/// Documents are stored as JSON under the keys from `keys`. Test cases live in
/// a per-problem list so that retrieval order equals insertion order, which
/// keeps verdicts reproducible across runs of the same problem.

use crate::keys;
use crate::types::{Draft, Problem, Submission, TestCase};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("corrupt document: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("submission {0} does not exist")]
    MissingSubmission(Uuid),
}

/// Which partition of a problem's test cases to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestCaseFilter {
    All,
    Sample,
    Hidden,
}

impl TestCaseFilter {
    pub fn matches(&self, test_case: &TestCase) -> bool {
        match self {
            TestCaseFilter::All => true,
            TestCaseFilter::Sample => !test_case.is_hidden,
            TestCaseFilter::Hidden => test_case.is_hidden,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_problem(&self, problem_id: &Uuid) -> Result<Option<Problem>, StoreError>;

    async fn put_problem(&self, problem: &Problem) -> Result<(), StoreError>;

    /// Test cases in storage order
    async fn find_test_cases(
        &self,
        problem_id: &Uuid,
        filter: TestCaseFilter,
    ) -> Result<Vec<TestCase>, StoreError>;

    /// Appends to the end of the problem's ordered set
    async fn add_test_case(&self, test_case: &TestCase) -> Result<(), StoreError>;

    async fn insert_submission(&self, submission: &Submission) -> Result<(), StoreError>;

    /// Overwrites an existing submission; never creates one
    async fn update_submission(&self, submission: &Submission) -> Result<(), StoreError>;

    async fn find_submission(&self, submission_id: &Uuid)
        -> Result<Option<Submission>, StoreError>;

    /// Newest first
    async fn list_user_submissions(&self, user_id: &str) -> Result<Vec<Submission>, StoreError>;

    /// Newest first
    async fn list_submissions(&self) -> Result<Vec<Submission>, StoreError>;

    /// Last writer wins
    async fn upsert_draft(&self, draft: &Draft) -> Result<(), StoreError>;

    async fn find_draft(&self, user_id: &str, problem_id: &Uuid)
        -> Result<Option<Draft>, StoreError>;
}

fn decode<T: DeserializeOwned>(raw: Option<String>) -> Result<Option<T>, StoreError> {
    match raw {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Redis-backed store
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }

    async fn load_submissions(&self, index_key: &str) -> Result<Vec<Submission>, StoreError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.lrange(index_key, 0, -1).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let doc_keys: Vec<String> = ids
            .iter()
            .map(|id| format!("{}:{}", keys::SUBMISSION_PREFIX, id))
            .collect();
        let docs: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&doc_keys)
            .query_async(&mut conn)
            .await?;

        docs.into_iter()
            .flatten()
            .map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn find_problem(&self, problem_id: &Uuid) -> Result<Option<Problem>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(keys::problem_key(problem_id)).await?;
        decode(raw)
    }

    async fn put_problem(&self, problem: &Problem) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(problem)?;
        conn.set::<_, _, ()>(keys::problem_key(&problem.id), json).await?;
        Ok(())
    }

    async fn find_test_cases(
        &self,
        problem_id: &Uuid,
        filter: TestCaseFilter,
    ) -> Result<Vec<TestCase>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.lrange(keys::test_cases_key(problem_id), 0, -1).await?;

        let mut cases = Vec::with_capacity(raw.len());
        for json in raw {
            let test_case: TestCase = serde_json::from_str(&json)?;
            if filter.matches(&test_case) {
                cases.push(test_case);
            }
        }
        Ok(cases)
    }

    async fn add_test_case(&self, test_case: &TestCase) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(test_case)?;
        conn.rpush::<_, _, ()>(keys::test_cases_key(&test_case.problem_id), json)
            .await?;
        Ok(())
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(submission)?;
        let id = submission.id.to_string();

        redis::pipe()
            .atomic()
            .set(keys::submission_key(&submission.id), json)
            .ignore()
            .lpush(keys::user_submissions_key(&submission.user_id), &id)
            .ignore()
            .lpush(keys::ALL_SUBMISSIONS, &id)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn update_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(submission)?;

        // SET .. XX replies nil when the key is absent
        let reply: Option<String> = redis::cmd("SET")
            .arg(keys::submission_key(&submission.id))
            .arg(json)
            .arg("XX")
            .query_async(&mut conn)
            .await?;

        match reply {
            Some(_) => Ok(()),
            None => Err(StoreError::MissingSubmission(submission.id)),
        }
    }

    async fn find_submission(
        &self,
        submission_id: &Uuid,
    ) -> Result<Option<Submission>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(keys::submission_key(submission_id)).await?;
        decode(raw)
    }

    async fn list_user_submissions(&self, user_id: &str) -> Result<Vec<Submission>, StoreError> {
        self.load_submissions(&keys::user_submissions_key(user_id)).await
    }

    async fn list_submissions(&self) -> Result<Vec<Submission>, StoreError> {
        self.load_submissions(keys::ALL_SUBMISSIONS).await
    }

    async fn upsert_draft(&self, draft: &Draft) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(draft)?;
        conn.set::<_, _, ()>(keys::draft_key(&draft.user_id, &draft.problem_id), json)
            .await?;
        Ok(())
    }

    async fn find_draft(
        &self,
        user_id: &str,
        problem_id: &Uuid,
    ) -> Result<Option<Draft>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(keys::draft_key(user_id, problem_id)).await?;
        decode(raw)
    }
}

#[derive(Default)]
struct MemoryInner {
    problems: HashMap<Uuid, Problem>,
    test_cases: HashMap<Uuid, Vec<TestCase>>,
    submissions: HashMap<Uuid, Submission>,
    submission_order: Vec<Uuid>,
    drafts: HashMap<(String, Uuid), Draft>,
    draft_writes: usize,
    submission_writes: usize,
}

/// Process-local store for development and tests
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of draft upserts that reached the store
    pub async fn draft_write_count(&self) -> usize {
        self.inner.read().await.draft_writes
    }

    /// Number of submission inserts and updates that reached the store
    pub async fn submission_write_count(&self) -> usize {
        self.inner.read().await.submission_writes
    }

    pub async fn submission_count(&self) -> usize {
        self.inner.read().await.submissions.len()
    }

    fn newest_first(inner: &MemoryInner, keep: impl Fn(&Submission) -> bool) -> Vec<Submission> {
        inner
            .submission_order
            .iter()
            .rev()
            .filter_map(|id| inner.submissions.get(id))
            .filter(|s| keep(s))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_problem(&self, problem_id: &Uuid) -> Result<Option<Problem>, StoreError> {
        Ok(self.inner.read().await.problems.get(problem_id).cloned())
    }

    async fn put_problem(&self, problem: &Problem) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .problems
            .insert(problem.id, problem.clone());
        Ok(())
    }

    async fn find_test_cases(
        &self,
        problem_id: &Uuid,
        filter: TestCaseFilter,
    ) -> Result<Vec<TestCase>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .test_cases
            .get(problem_id)
            .map(|cases| cases.iter().filter(|tc| filter.matches(tc)).cloned().collect())
            .unwrap_or_default())
    }

    async fn add_test_case(&self, test_case: &TestCase) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .test_cases
            .entry(test_case.problem_id)
            .or_default()
            .push(test_case.clone());
        Ok(())
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.submissions.insert(submission.id, submission.clone());
        inner.submission_order.push(submission.id);
        inner.submission_writes += 1;
        Ok(())
    }

    async fn update_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.submissions.get_mut(&submission.id) {
            Some(existing) => {
                *existing = submission.clone();
                inner.submission_writes += 1;
                Ok(())
            }
            None => Err(StoreError::MissingSubmission(submission.id)),
        }
    }

    async fn find_submission(
        &self,
        submission_id: &Uuid,
    ) -> Result<Option<Submission>, StoreError> {
        Ok(self.inner.read().await.submissions.get(submission_id).cloned())
    }

    async fn list_user_submissions(&self, user_id: &str) -> Result<Vec<Submission>, StoreError> {
        let inner = self.inner.read().await;
        Ok(Self::newest_first(&inner, |s| s.user_id == user_id))
    }

    async fn list_submissions(&self) -> Result<Vec<Submission>, StoreError> {
        let inner = self.inner.read().await;
        Ok(Self::newest_first(&inner, |_| true))
    }

    async fn upsert_draft(&self, draft: &Draft) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .drafts
            .insert((draft.user_id.clone(), draft.problem_id), draft.clone());
        inner.draft_writes += 1;
        Ok(())
    }

    async fn find_draft(
        &self,
        user_id: &str,
        problem_id: &Uuid,
    ) -> Result<Option<Draft>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .drafts
            .get(&(user_id.to_string(), *problem_id))
            .cloned())
    }
}
