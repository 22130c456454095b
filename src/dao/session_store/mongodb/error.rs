use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to load session `{room_code}`")]
    LoadSession {
        room_code: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to save session `{room_code}`")]
    SaveSession {
        room_code: String,
        #[source]
        source: MongoError,
    },
    #[error("session `{room_code}` kept changing after {attempts} merge attempt(s)")]
    Contended { room_code: String, attempts: u32 },
    #[error("failed to update counter `{name}`")]
    UpdateCounter {
        name: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list counters")]
    ListCounters {
        #[source]
        source: MongoError,
    },
    #[error("failed to load the question catalog")]
    LoadCatalog {
        #[source]
        source: MongoError,
    },
    #[error("failed to save the question catalog")]
    SaveCatalog {
        #[source]
        source: MongoError,
    },
}
