mod config;
mod connection;
mod error;
mod models;
mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoSessionStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::Contended { room_code, attempts } => StorageError::Contended {
                path: format!("sessions/{room_code}"),
                attempts,
            },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
