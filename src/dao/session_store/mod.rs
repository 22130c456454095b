#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{CounterEntity, QuestionEntity, SessionEntity, SessionPatchEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Counter bumped each time a room is opened.
pub const COUNTER_SESSIONS_CREATED: &str = "sessions_created";
/// Counter bumped each time a round is confirmed.
pub const COUNTER_ROUNDS_COMPLETED: &str = "rounds_completed";
/// Counter bumped for every accepted controller judgment.
pub const COUNTER_JUDGMENTS_RECORDED: &str = "judgments_recorded";

/// Abstraction over the shared session store and the question catalog.
pub trait SessionStore: Send + Sync {
    /// Read the session document of `room_code` once.
    fn read_session(&self, room_code: String)
    -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Merge the fields carried by `patch` into the stored session of `room_code`.
    fn merge_session(
        &self,
        room_code: String,
        patch: SessionPatchEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace the stored session wholesale, creating it if missing.
    fn overwrite_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Atomically add `delta` to the named counter and return the new value.
    fn increment_counter(&self, name: String, delta: i64) -> BoxFuture<'static, StorageResult<i64>>;
    /// Read every counter.
    fn read_counters(&self) -> BoxFuture<'static, StorageResult<Vec<CounterEntity>>>;
    /// Read the whole question catalog.
    fn read_catalog(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    /// Overwrite the whole question catalog.
    fn replace_catalog(&self, questions: Vec<QuestionEntity>) -> BoxFuture<'static, StorageResult<()>>;
    /// Check that the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
