use uuid::Uuid;

/// Redis key layout - defines only naming, not runtime logic
/// Keeps the API and the CLI seeding path on the same keys

pub const PROBLEM_PREFIX: &str = "judge:problem";
pub const SUBMISSION_PREFIX: &str = "judge:submission";
pub const DRAFT_PREFIX: &str = "judge:draft";
pub const USER_PREFIX: &str = "judge:user";

/// Global submission index, newest first
pub const ALL_SUBMISSIONS: &str = "judge:submissions";

/// Problem document
pub fn problem_key(problem_id: &Uuid) -> String {
    format!("{}:{}", PROBLEM_PREFIX, problem_id)
}

/// Ordered list of a problem's test cases (RPUSH, storage order)
pub fn test_cases_key(problem_id: &Uuid) -> String {
    format!("{}:{}:testcases", PROBLEM_PREFIX, problem_id)
}

/// Submission document
pub fn submission_key(submission_id: &Uuid) -> String {
    format!("{}:{}", SUBMISSION_PREFIX, submission_id)
}

/// Per-user submission index, newest first
pub fn user_submissions_key(user_id: &str) -> String {
    format!("{}:{}:submissions", USER_PREFIX, user_id)
}

/// Single live draft per (user, problem)
pub fn draft_key(user_id: &str, problem_id: &Uuid) -> String {
    format!("{}:{}:{}", DRAFT_PREFIX, user_id, problem_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_keys() {
        let id = Uuid::new_v4();
        assert_eq!(problem_key(&id), format!("judge:problem:{}", id));
        assert_eq!(test_cases_key(&id), format!("judge:problem:{}:testcases", id));
    }

    #[test]
    fn test_submission_key_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(submission_key(&id), submission_key(&id));
        assert!(submission_key(&id).starts_with("judge:submission:"));
        assert_eq!(user_submissions_key("alice"), "judge:user:alice:submissions");
    }

    #[test]
    fn test_draft_key_scoped_per_user_and_problem() {
        let problem = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert_ne!(draft_key("alice", &problem), draft_key("bob", &problem));
        assert_ne!(draft_key("alice", &problem), draft_key("alice", &other));
    }
}
