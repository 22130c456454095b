use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::{CounterEntity, QuestionEntity, SessionEntity};

pub const SESSION_PREFIX: &str = "session::";
pub const COUNTER_PREFIX: &str = "counter::";
pub const CATALOG_DOC_ID: &str = "catalog::question_pool";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Shared session document, keyed by room code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSessionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub session: SessionEntity,
}

impl From<(SessionEntity, Option<String>)> for CouchSessionDocument {
    fn from((session, rev): (SessionEntity, Option<String>)) -> Self {
        Self {
            id: session_doc_id(&session.room_code),
            rev,
            session,
        }
    }
}

/// Single document holding the whole question catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchCatalogDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchCounterDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub counter: CounterEntity,
}

pub fn session_doc_id(room_code: &str) -> String {
    format!("{}{}", SESSION_PREFIX, room_code)
}

pub fn counter_doc_id(name: &str) -> String {
    format!("{}{}", COUNTER_PREFIX, name)
}
