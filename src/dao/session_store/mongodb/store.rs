use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::doc,
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        CATALOG_DOC_ID, MongoCatalogDocument, MongoCounterDocument, MongoSessionDocument, doc_id,
        revision_filter,
    },
};
use crate::dao::{
    models::{CounterEntity, QuestionEntity, SessionEntity, SessionPatchEntity},
    session_store::SessionStore,
    storage::{StorageError, StorageResult},
};

const SESSION_COLLECTION_NAME: &str = "sessions";
const COUNTER_COLLECTION_NAME: &str = "counters";
const CATALOG_COLLECTION_NAME: &str = "catalog";

/// Attempts made before a compare-and-swap merge gives up.
const MAX_MERGE_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoSessionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.sessions().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"_id": 1, "revision": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_revision_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "_id,revision",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn sessions(&self) -> Collection<MongoSessionDocument> {
        self.database()
            .await
            .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn counters(&self) -> Collection<MongoCounterDocument> {
        self.database()
            .await
            .collection::<MongoCounterDocument>(COUNTER_COLLECTION_NAME)
    }

    async fn catalog(&self) -> Collection<MongoCatalogDocument> {
        self.database()
            .await
            .collection::<MongoCatalogDocument>(CATALOG_COLLECTION_NAME)
    }

    async fn read_session(&self, room_code: String) -> MongoResult<Option<SessionEntity>> {
        let collection = self.sessions().await;
        let document = collection
            .find_one(doc_id(&room_code))
            .await
            .map_err(|source| MongoDaoError::LoadSession { room_code, source })?;
        Ok(document.map(Into::into))
    }

    /// Read-modify-write guarded by the stored revision, retried when another writer got there first.
    async fn merge_session(&self, room_code: String, patch: SessionPatchEntity) -> StorageResult<()> {
        let collection = self.sessions().await;
        for attempt in 1..=MAX_MERGE_ATTEMPTS {
            let Some(current) = collection
                .find_one(doc_id(&room_code))
                .await
                .map_err(|source| MongoDaoError::LoadSession {
                    room_code: room_code.clone(),
                    source,
                })?
            else {
                return Err(StorageError::Missing {
                    path: format!("{SESSION_COLLECTION_NAME}/{room_code}"),
                });
            };

            let expected_revision = current.revision;
            let mut entity: SessionEntity = current.into();
            entity.merge(patch.clone());
            let document = MongoSessionDocument::from(entity);

            let result = collection
                .replace_one(revision_filter(&room_code, expected_revision), &document)
                .await
                .map_err(|source| MongoDaoError::SaveSession {
                    room_code: room_code.clone(),
                    source,
                })?;

            if result.matched_count > 0 {
                return Ok(());
            }
            debug!(room_code = %room_code, attempt, "session changed underneath merge; retrying");
        }

        Err(MongoDaoError::Contended {
            room_code,
            attempts: MAX_MERGE_ATTEMPTS,
        }
        .into())
    }

    async fn overwrite_session(&self, session: SessionEntity) -> MongoResult<()> {
        let room_code = session.room_code.clone();
        let document = MongoSessionDocument::from(session);
        let collection = self.sessions().await;
        collection
            .replace_one(doc_id(&room_code), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSession { room_code, source })?;
        Ok(())
    }

    async fn increment_counter(&self, name: String, delta: i64) -> MongoResult<i64> {
        let collection = self.counters().await;
        let updated = collection
            .find_one_and_update(doc_id(&name), doc! {"$inc": {"value": delta}})
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateCounter {
                name: name.clone(),
                source,
            })?;
        Ok(updated.map(|counter| counter.value).unwrap_or(delta))
    }

    async fn read_counters(&self) -> MongoResult<Vec<CounterEntity>> {
        let collection = self.counters().await;
        let documents: Vec<MongoCounterDocument> = collection
            .find(doc! {})
            .sort(doc! {"_id": 1})
            .await
            .map_err(|source| MongoDaoError::ListCounters { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListCounters { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn read_catalog(&self) -> MongoResult<Vec<QuestionEntity>> {
        let collection = self.catalog().await;
        let document = collection
            .find_one(doc_id(CATALOG_DOC_ID))
            .await
            .map_err(|source| MongoDaoError::LoadCatalog { source })?;
        Ok(document.map(|doc| doc.questions).unwrap_or_default())
    }

    async fn replace_catalog(&self, questions: Vec<QuestionEntity>) -> MongoResult<()> {
        let collection = self.catalog().await;
        let document = MongoCatalogDocument {
            id: CATALOG_DOC_ID.to_owned(),
            questions,
        };
        collection
            .replace_one(doc_id(CATALOG_DOC_ID), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveCatalog { source })?;
        Ok(())
    }
}

impl SessionStore for MongoSessionStore {
    fn read_session(
        &self,
        room_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.read_session(room_code).await.map_err(Into::into) })
    }

    fn merge_session(
        &self,
        room_code: String,
        patch: SessionPatchEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.merge_session(room_code, patch).await })
    }

    fn overwrite_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.overwrite_session(session).await.map_err(Into::into) })
    }

    fn increment_counter(&self, name: String, delta: i64) -> BoxFuture<'static, StorageResult<i64>> {
        let store = self.clone();
        Box::pin(async move { store.increment_counter(name, delta).await.map_err(Into::into) })
    }

    fn read_counters(&self) -> BoxFuture<'static, StorageResult<Vec<CounterEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.read_counters().await.map_err(Into::into) })
    }

    fn read_catalog(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.read_catalog().await.map_err(Into::into) })
    }

    fn replace_catalog(
        &self,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.replace_catalog(questions).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
