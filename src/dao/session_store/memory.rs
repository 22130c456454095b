//! Process-local store, used when no database is configured and in tests.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::dao::{
    models::{CounterEntity, QuestionEntity, SessionEntity, SessionPatchEntity},
    session_store::SessionStore,
    storage::{StorageError, StorageResult},
};

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    sessions: DashMap<String, SessionEntity>,
    catalog: RwLock<Vec<QuestionEntity>>,
    counters: DashMap<String, i64>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn read_session(
        &self,
        room_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .sessions
                .get(&room_code)
                .map(|entry| entry.value().clone()))
        })
    }

    fn merge_session(
        &self,
        room_code: String,
        patch: SessionPatchEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut entry = store
                .inner
                .sessions
                .get_mut(&room_code)
                .ok_or_else(|| StorageError::Missing {
                    path: format!("session/{room_code}"),
                })?;
            entry.merge(patch);
            Ok(())
        })
    }

    fn overwrite_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .inner
                .sessions
                .insert(session.room_code.clone(), session);
            Ok(())
        })
    }

    fn increment_counter(&self, name: String, delta: i64) -> BoxFuture<'static, StorageResult<i64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut value = store.inner.counters.entry(name).or_insert(0);
            *value += delta;
            Ok(*value)
        })
    }

    fn read_counters(&self) -> BoxFuture<'static, StorageResult<Vec<CounterEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut counters: Vec<CounterEntity> = store
                .inner
                .counters
                .iter()
                .map(|entry| CounterEntity {
                    name: entry.key().clone(),
                    value: *entry.value(),
                })
                .collect();
            counters.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(counters)
        })
    }

    fn read_catalog(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.catalog.read().await.clone()) })
    }

    fn replace_catalog(
        &self,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            *store.inner.catalog.write().await = questions;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::session::{RoundConfig, SessionDocument, SessionPatch};

    #[tokio::test]
    async fn merge_requires_existing_session() {
        let store = MemorySessionStore::new();
        let patch = SessionPatchEntity::new(&SessionPatch::default(), 1, SystemTime::now());
        let err = store.merge_session("0420".into(), patch).await.unwrap_err();
        assert!(matches!(err, StorageError::Missing { .. }));
    }

    #[tokio::test]
    async fn overwrite_then_merge_round_trip() {
        let store = MemorySessionStore::new();
        let doc = SessionDocument::new("0420", RoundConfig::default());
        store
            .overwrite_session(SessionEntity::from(&doc))
            .await
            .unwrap();

        let patch = SessionPatch {
            is_paused: Some(true),
            ..Default::default()
        };
        store
            .merge_session(
                "0420".into(),
                SessionPatchEntity::new(&patch, 1, SystemTime::now()),
            )
            .await
            .unwrap();

        let stored = store.read_session("0420".into()).await.unwrap().unwrap();
        assert!(stored.is_paused);
        assert_eq!(stored.revision, 1);
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = MemorySessionStore::new();
        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment_counter("rounds".into(), 1).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        let counters = store.read_counters().await.unwrap();
        assert_eq!(
            counters,
            vec![CounterEntity {
                name: "rounds".into(),
                value: 32
            }]
        );
    }
}
