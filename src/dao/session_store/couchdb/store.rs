use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tracing::debug;

use crate::dao::{
    models::{CounterEntity, QuestionEntity, SessionEntity, SessionPatchEntity},
    session_store::SessionStore,
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CATALOG_DOC_ID, COUNTER_PREFIX, CouchCatalogDocument,
        CouchCounterDocument, CouchSessionDocument, END_SUFFIX, counter_doc_id, session_doc_id,
    },
};

/// Attempts made before a read-modify-write gives up on revision conflicts.
const MAX_WRITE_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct CouchSessionStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

/// Result of a conditional document write.
enum PutOutcome {
    Written,
    Conflict,
}

impl CouchSessionStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .credentials
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.authorized(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::Database {
                database: database.clone(),
                action: "look up",
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorized(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::Database {
                        database: database.clone(),
                        action: "create",
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// PUT a document; a stale `_rev` yields [`PutOutcome::Conflict`] instead of an error.
    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<PutOutcome>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(PutOutcome::Conflict),
            status if status.is_success() => Ok(PutOutcome::Written),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    async fn merge_session(&self, room_code: &str, patch: SessionPatchEntity) -> StorageResult<()> {
        let doc_id = session_doc_id(room_code);
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let Some(mut doc) = self.get_document::<CouchSessionDocument>(&doc_id).await? else {
                return Err(StorageError::Missing { path: doc_id });
            };
            doc.session.merge(patch.clone());
            match self.put_document(&doc_id, &doc).await? {
                PutOutcome::Written => return Ok(()),
                PutOutcome::Conflict => {
                    debug!(doc_id = %doc_id, attempt, "session merge hit a revision conflict; retrying");
                }
            }
        }
        Err(CouchDaoError::Contended {
            path: doc_id,
            attempts: MAX_WRITE_ATTEMPTS,
        }
        .into())
    }

    async fn overwrite_session(&self, session: SessionEntity) -> CouchResult<()> {
        let doc_id = session_doc_id(&session.room_code);
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let rev = self
                .get_document::<CouchSessionDocument>(&doc_id)
                .await?
                .and_then(|existing| existing.rev);
            let doc = CouchSessionDocument::from((session.clone(), rev));
            if let PutOutcome::Written = self.put_document(&doc_id, &doc).await? {
                return Ok(());
            }
        }
        Err(CouchDaoError::Contended {
            path: doc_id,
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }

    async fn increment_counter(&self, name: String, delta: i64) -> CouchResult<i64> {
        let doc_id = counter_doc_id(&name);
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut doc = self
                .get_document::<CouchCounterDocument>(&doc_id)
                .await?
                .unwrap_or_else(|| CouchCounterDocument {
                    id: doc_id.clone(),
                    rev: None,
                    counter: CounterEntity {
                        name: name.clone(),
                        value: 0,
                    },
                });
            doc.counter.value += delta;
            match self.put_document(&doc_id, &doc).await? {
                PutOutcome::Written => return Ok(doc.counter.value),
                PutOutcome::Conflict => {
                    debug!(doc_id = %doc_id, attempt, "counter increment hit a revision conflict; retrying");
                }
            }
        }
        Err(CouchDaoError::Contended {
            path: doc_id,
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }

    async fn replace_catalog(&self, questions: Vec<QuestionEntity>) -> CouchResult<()> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let rev = self
                .get_document::<CouchCatalogDocument>(CATALOG_DOC_ID)
                .await?
                .and_then(|existing| existing.rev);
            let doc = CouchCatalogDocument {
                id: CATALOG_DOC_ID.to_owned(),
                rev,
                questions: questions.clone(),
            };
            if let PutOutcome::Written = self.put_document(CATALOG_DOC_ID, &doc).await? {
                return Ok(());
            }
        }
        Err(CouchDaoError::Contended {
            path: CATALOG_DOC_ID.to_owned(),
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }
}

impl SessionStore for CouchSessionStore {
    fn read_session(
        &self,
        room_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = session_doc_id(&room_code);
            let maybe_doc = store.get_document::<CouchSessionDocument>(&doc_id).await?;
            Ok(maybe_doc.map(|doc| doc.session))
        })
    }

    fn merge_session(
        &self,
        room_code: String,
        patch: SessionPatchEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.merge_session(&room_code, patch).await })
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
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchCounterDocument>(COUNTER_PREFIX)
                .await?;
            Ok(docs.into_iter().map(|doc| doc.counter).collect())
        })
    }

    fn read_catalog(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store
                .get_document::<CouchCatalogDocument>(CATALOG_DOC_ID)
                .await?;
            Ok(doc.map(|doc| doc.questions).unwrap_or_default())
        })
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
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorized(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
