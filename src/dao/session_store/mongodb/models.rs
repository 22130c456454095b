use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{
    CounterEntity, HistoryEntryEntity, QuestionEntity, RoundConfigEntity, RoundScoreEntity,
    SessionEntity,
};
use crate::state::session::SessionPhase;

pub const CATALOG_DOC_ID: &str = "question_pool";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    id: String,
    state: SessionPhase,
    subject: Option<String>,
    category: Option<String>,
    config: RoundConfigEntity,
    current_round: u32,
    queue: Vec<QuestionEntity>,
    current_index: usize,
    time_left: u32,
    is_paused: bool,
    score: u32,
    history: Vec<HistoryEntryEntity>,
    used_ids: Vec<String>,
    round_scores: Vec<RoundScoreEntity>,
    pub revision: i64,
    updated_at: DateTime,
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.room_code,
            state: value.state,
            subject: value.subject,
            category: value.category,
            config: value.config,
            current_round: value.current_round,
            queue: value.queue,
            current_index: value.current_index,
            time_left: value.time_left,
            is_paused: value.is_paused,
            score: value.score,
            history: value.history,
            used_ids: value.used_ids,
            round_scores: value.round_scores,
            revision: value.revision as i64,
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoSessionDocument> for SessionEntity {
    fn from(value: MongoSessionDocument) -> Self {
        Self {
            room_code: value.id,
            state: value.state,
            subject: value.subject,
            category: value.category,
            config: value.config,
            current_round: value.current_round,
            queue: value.queue,
            current_index: value.current_index,
            time_left: value.time_left,
            is_paused: value.is_paused,
            score: value.score,
            history: value.history,
            used_ids: value.used_ids,
            round_scores: value.round_scores,
            revision: value.revision.max(0) as u64,
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCounterDocument {
    #[serde(rename = "_id")]
    pub name: String,
    pub value: i64,
}

impl From<MongoCounterDocument> for CounterEntity {
    fn from(value: MongoCounterDocument) -> Self {
        Self {
            name: value.name,
            value: value.value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCatalogDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub questions: Vec<QuestionEntity>,
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}

/// Filter matching the session only while it is still at `revision`.
pub fn revision_filter(id: &str, revision: i64) -> Document {
    doc! {"_id": id, "revision": revision}
}
