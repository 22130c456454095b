use std::env;

use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "party_quiz";

/// Where the session database lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    pub base_url: String,
    pub database: String,
    /// Basic-auth `(username, password)`; both or neither.
    pub credentials: Option<(String, String)>,
}

impl CouchConfig {
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            credentials: None,
        }
    }

    /// Read `COUCH_BASE_URL` and the optional `COUCH_DB`, `COUCH_USERNAME` and `COUCH_PASSWORD`.
    ///
    /// A username without a password (or the reverse) is ignored.
    pub fn from_env() -> CouchResult<Self> {
        let base_url = env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
            var: "COUCH_BASE_URL",
        })?;
        let database = env::var("COUCH_DB")
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_owned());

        Ok(Self {
            credentials: env::var("COUCH_USERNAME")
                .ok()
                .zip(env::var("COUCH_PASSWORD").ok()),
            ..Self::new(base_url, database)
        })
    }
}
