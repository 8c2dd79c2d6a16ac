pub mod types;
pub mod keys;
pub mod config;
pub mod store;

// Re-export commonly used types for convenience
pub use types::{
    CaseResult, CaseStatus, Draft, Language, Problem, Role, Submission, TestCase, Verdict,
};
pub use config::Config;
pub use store::{MemoryStore, RedisStore, Store, StoreError, TestCaseFilter};
