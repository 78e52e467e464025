//! Persistence layer (Firestore, or in-memory for local runs and tests).

pub mod firestore;
pub mod memory;
pub mod store;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;
pub use store::{ProgressStore, SyncCommit, UserSnapshot};

/// Collection names as constants.
pub mod collections {
    pub const TOKENS: &str = "tokens";
    pub const CHALLENGES: &str = "challenges";
    /// Enrollment documents (keyed by `{user_id}_{challenge_id}`)
    pub const ENROLLMENTS: &str = "enrollments";
    /// User aggregates (keyed by user_id)
    pub const USER_AGGREGATES: &str = "user_aggregates";
    /// Grant documents (keyed by `{user_id}_{achievement_id}`)
    pub const GRANTED_ACHIEVEMENTS: &str = "granted_achievements";
}
