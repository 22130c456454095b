//! Error types of the CouchDB session store.

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias of the CouchDB session store.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures talking to the CouchDB database that holds sessions, counters and the catalog.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// Looking up or creating the database failed before any status was read.
    #[error("failed to {action} CouchDB database `{database}`")]
    Database {
        database: String,
        action: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB answered {status} for database `{database}`")]
    DatabaseStatus {
        database: String,
        status: StatusCode,
    },
    /// A session, counter or catalog document request could not be sent.
    #[error("failed to send CouchDB request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("CouchDB answered {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The stored JSON does not match the session, counter or catalog model.
    #[error("document `{path}` does not match the expected model")]
    DeserializeValue {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// Every compare-and-swap attempt lost the revision race.
    #[error("revision conflict on `{path}` persisted after {attempts} attempt(s)")]
    Contended { path: String, attempts: u32 },
}
