/// Draft Autosave Coordinator
///
/// Buffers in-progress editor code per (user, problem) and persists it after
/// a quiet period. Each session owns at most one pending timer; a new save
/// replaces the buffered draft and restarts the timer, so a burst of edits
/// collapses into one write carrying the latest code.
///
/// Losing the last sub-second of edits on a crash is acceptable. On graceful
/// shutdown `flush_all` writes whatever is still buffered.

use chrono::Utc;
use judge_common::types::{Draft, Language};
use judge_common::{Store, StoreError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::metrics;

type SessionKey = (String, Uuid);

struct PendingSave {
    draft: Draft,
    generation: u64,
    timer: JoinHandle<()>,
}

struct Inner {
    store: Arc<dyn Store>,
    delay: Duration,
    sessions: Mutex<HashMap<SessionKey, PendingSave>>,
    next_generation: AtomicU64,
}

impl Inner {
    /// Persist the buffered draft if no newer save superseded this timer
    async fn flush_session(&self, key: SessionKey, generation: u64) {
        let draft = {
            let mut sessions = self.sessions.lock().await;
            let current = sessions.get(&key).map(|p| p.generation) == Some(generation);
            if current {
                sessions.remove(&key).map(|p| p.draft)
            } else {
                None
            }
        };

        if let Some(draft) = draft {
            self.write(&draft).await;
        }
    }

    async fn write(&self, draft: &Draft) {
        match self.store.upsert_draft(draft).await {
            Ok(()) => {
                metrics::record_draft_flush("ok");
                tracing::debug!(
                    user_id = %draft.user_id,
                    problem_id = %draft.problem_id,
                    "Draft saved"
                );
            }
            Err(e) => {
                metrics::record_draft_flush("error");
                tracing::warn!(
                    user_id = %draft.user_id,
                    problem_id = %draft.problem_id,
                    "Failed to save draft: {}",
                    e
                );
            }
        }
    }
}

/// Where the editor's starting code came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeOrigin {
    Draft,
    Boilerplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCode {
    pub code: String,
    pub language: Language,
    pub origin: CodeOrigin,
}

#[derive(Clone)]
pub struct AutosaveCoordinator {
    inner: Arc<Inner>,
}

impl AutosaveCoordinator {
    pub fn new(store: Arc<dyn Store>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                delay,
                sessions: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Buffer a draft; it is written once no newer save arrives within the delay
    pub async fn save(&self, user_id: &str, problem_id: Uuid, code: String, language: Language) {
        let key = (user_id.to_string(), problem_id);
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let draft = Draft {
            user_id: user_id.to_string(),
            problem_id,
            code,
            language,
            updated_at: Utc::now(),
        };

        let mut sessions = self.inner.sessions.lock().await;

        let inner = Arc::clone(&self.inner);
        let timer_key = key.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            inner.flush_session(timer_key, generation).await;
        });

        let replaced = sessions.insert(
            key,
            PendingSave {
                draft,
                generation,
                timer,
            },
        );
        if let Some(previous) = replaced {
            previous.timer.abort();
        }
    }

    /// Latest draft, including one still waiting for its write
    pub async fn load(&self, user_id: &str, problem_id: &Uuid) -> Result<Option<Draft>, StoreError> {
        {
            let sessions = self.inner.sessions.lock().await;
            if let Some(pending) = sessions.get(&(user_id.to_string(), *problem_id)) {
                return Ok(Some(pending.draft.clone()));
            }
        }
        self.inner.store.find_draft(user_id, problem_id).await
    }

    /// Code to open the editor with: the draft if one exists, otherwise the
    /// problem's boilerplate for `language`. `None` if the problem is unknown.
    pub async fn resolve(
        &self,
        user_id: &str,
        problem_id: &Uuid,
        language: Language,
    ) -> Result<Option<ResolvedCode>, StoreError> {
        let problem = match self.inner.store.find_problem(problem_id).await? {
            Some(problem) => problem,
            None => return Ok(None),
        };

        let resolved = match self.load(user_id, problem_id).await? {
            Some(draft) => ResolvedCode {
                code: draft.code,
                language: draft.language,
                origin: CodeOrigin::Draft,
            },
            None => ResolvedCode {
                code: problem.boilerplate_for(language).to_string(),
                language,
                origin: CodeOrigin::Boilerplate,
            },
        };
        Ok(Some(resolved))
    }

    /// Write every buffered draft now; returns how many were written
    pub async fn flush_all(&self) -> usize {
        let pending: Vec<PendingSave> = {
            let mut sessions = self.inner.sessions.lock().await;
            sessions.drain().map(|(_, p)| p).collect()
        };

        for save in &pending {
            save.timer.abort();
            self.inner.write(&save.draft).await;
        }
        pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::seed_problem;
    use judge_common::MemoryStore;

    const DELAY: Duration = Duration::from_millis(1000);

    fn coordinator(store: &Arc<MemoryStore>) -> AutosaveCoordinator {
        AutosaveCoordinator::new(store.clone(), DELAY)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_write() {
        let store = Arc::new(MemoryStore::new());
        let autosave = coordinator(&store);
        let problem = Uuid::new_v4();

        for code in ["a", "ab", "abc"] {
            autosave
                .save("alice", problem, code.to_string(), Language::Cpp)
                .await;
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(store.draft_write_count().await, 0);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.draft_write_count().await, 1);
        let draft = store.find_draft("alice", &problem).await.unwrap().unwrap();
        assert_eq!(draft.code, "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_saves_each_write() {
        let store = Arc::new(MemoryStore::new());
        let autosave = coordinator(&store);
        let problem = Uuid::new_v4();

        autosave
            .save("alice", problem, "first".to_string(), Language::Java)
            .await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        autosave
            .save("alice", problem, "second".to_string(), Language::Python)
            .await;
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.draft_write_count().await, 2);
        let draft = store.find_draft("alice", &problem).await.unwrap().unwrap();
        assert_eq!(draft.code, "second");
        assert_eq!(draft.language, Language::Python);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let autosave = coordinator(&store);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        autosave.save("alice", first, "x".to_string(), Language::Cpp).await;
        autosave.save("alice", second, "y".to_string(), Language::Cpp).await;
        autosave.save("bob", first, "z".to_string(), Language::Cpp).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.draft_write_count().await, 3);
        assert_eq!(
            store.find_draft("bob", &first).await.unwrap().unwrap().code,
            "z"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_sees_pending_draft() {
        let store = Arc::new(MemoryStore::new());
        let autosave = coordinator(&store);
        let problem = Uuid::new_v4();

        assert!(autosave.load("alice", &problem).await.unwrap().is_none());

        autosave
            .save("alice", problem, "wip".to_string(), Language::Cpp)
            .await;
        let draft = autosave.load("alice", &problem).await.unwrap().unwrap();
        assert_eq!(draft.code, "wip");
        assert_eq!(store.draft_write_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_all_writes_pending_drafts() {
        let store = Arc::new(MemoryStore::new());
        let autosave = coordinator(&store);
        let problem = Uuid::new_v4();

        autosave
            .save("alice", problem, "unsaved".to_string(), Language::Cpp)
            .await;
        assert_eq!(autosave.flush_all().await, 1);
        assert_eq!(store.draft_write_count().await, 1);

        // the aborted timer must not write a second time
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.draft_write_count().await, 1);
    }

    #[tokio::test]
    async fn test_resolve_prefers_draft_over_boilerplate() {
        let store = Arc::new(MemoryStore::new());
        let autosave = coordinator(&store);
        let problem = seed_problem(&store, &[]).await;

        let fresh = autosave
            .resolve("alice", &problem.id, Language::Cpp)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fresh.origin, CodeOrigin::Boilerplate);
        assert_eq!(fresh.code, "// cpp starter");

        let fallback = autosave
            .resolve("alice", &problem.id, Language::Java)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fallback.code, Language::Java.default_boilerplate());

        autosave
            .save("alice", problem.id, "print(1)".to_string(), Language::Python)
            .await;
        let resumed = autosave
            .resolve("alice", &problem.id, Language::Cpp)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resumed.origin, CodeOrigin::Draft);
        assert_eq!(resumed.code, "print(1)");
        assert_eq!(resumed.language, Language::Python);

        assert!(autosave
            .resolve("alice", &Uuid::new_v4(), Language::Cpp)
            .await
            .unwrap()
            .is_none());
    }
}
