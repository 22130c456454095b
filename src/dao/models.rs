use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, time::SystemTime};

use crate::state::{
    ledger::{HistoryEntry, RoundScore},
    session::{
        Judgment, Question, QuestionId, RoundConfig, SessionDocument, SessionPatch, SessionPhase,
    },
};

/// Question stored in the shared `question_pool` catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEntity {
    /// Identifier, unique inside the catalog.
    pub id: String,
    /// Term to describe.
    pub term: String,
    /// Book the term belongs to.
    #[serde(default)]
    pub book: String,
    /// Chapter-level category; older catalogs store it as `category`.
    #[serde(default, alias = "category")]
    pub chapter_category: String,
    /// Hint keywords.
    #[serde(default)]
    pub keywords: String,
}

/// Persisted judgment of one term.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryEntity {
    pub question_term: String,
    pub judgment: Judgment,
}

/// Persisted score of a confirmed round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundScoreEntity {
    pub round: u32,
    pub score: u32,
}

/// Persisted round settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoundConfigEntity {
    pub total_rounds: u32,
    pub time_per_round: u32,
    pub allow_duplicate: bool,
}

/// Shared session document as written to the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntity {
    /// Room code, also the document key.
    pub room_code: String,
    /// Current phase.
    pub state: SessionPhase,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub config: RoundConfigEntity,
    pub current_round: u32,
    #[serde(default)]
    pub queue: Vec<QuestionEntity>,
    #[serde(default)]
    pub current_index: usize,
    #[serde(default)]
    pub time_left: u32,
    #[serde(default)]
    pub is_paused: bool,
    /// Stored for readers; recomputed from `history` on load.
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub history: Vec<HistoryEntryEntity>,
    #[serde(default)]
    pub used_ids: Vec<String>,
    #[serde(default)]
    pub round_scores: Vec<RoundScoreEntity>,
    /// Monotonic mutation counter.
    #[serde(default)]
    pub revision: u64,
    /// Time of the last accepted mutation.
    pub updated_at: SystemTime,
}

/// Field-level update merged into a stored [`SessionEntity`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPatchEntity {
    pub room_code: Option<String>,
    pub state: Option<SessionPhase>,
    pub subject: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub config: Option<RoundConfigEntity>,
    pub current_round: Option<u32>,
    pub queue: Option<Vec<QuestionEntity>>,
    pub current_index: Option<usize>,
    pub time_left: Option<u32>,
    pub is_paused: Option<bool>,
    pub score: Option<u32>,
    pub history: Option<Vec<HistoryEntryEntity>>,
    pub used_ids: Option<Vec<String>>,
    pub round_scores: Option<Vec<RoundScoreEntity>>,
    /// Revision after the merge.
    pub revision: u64,
    /// Time of the mutation.
    pub updated_at: SystemTime,
}

/// Named monotonic counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CounterEntity {
    pub name: String,
    pub value: i64,
}

impl SessionEntity {
    /// Shallow merge: every field present in `patch` replaces the stored one.
    pub fn merge(&mut self, patch: SessionPatchEntity) {
        if let Some(room_code) = patch.room_code {
            self.room_code = room_code;
        }
        if let Some(state) = patch.state {
            self.state = state;
        }
        if let Some(subject) = patch.subject {
            self.subject = subject;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(config) = patch.config {
            self.config = config;
        }
        if let Some(current_round) = patch.current_round {
            self.current_round = current_round;
        }
        if let Some(queue) = patch.queue {
            self.queue = queue;
        }
        if let Some(current_index) = patch.current_index {
            self.current_index = current_index;
        }
        if let Some(time_left) = patch.time_left {
            self.time_left = time_left;
        }
        if let Some(is_paused) = patch.is_paused {
            self.is_paused = is_paused;
        }
        if let Some(score) = patch.score {
            self.score = score;
        }
        if let Some(history) = patch.history {
            self.history = history;
        }
        if let Some(used_ids) = patch.used_ids {
            self.used_ids = used_ids;
        }
        if let Some(round_scores) = patch.round_scores {
            self.round_scores = round_scores;
        }
        self.revision = patch.revision;
        self.updated_at = patch.updated_at;
    }
}

impl SessionPatchEntity {
    /// Convert a domain patch, stamping the revision it produces.
    pub fn new(patch: &SessionPatch, revision: u64, updated_at: SystemTime) -> Self {
        Self {
            room_code: patch.room_code.clone(),
            state: patch.phase,
            subject: patch.subject.clone(),
            category: patch.category.clone(),
            config: patch.config.map(Into::into),
            current_round: patch.current_round,
            queue: patch
                .queue
                .as_ref()
                .map(|queue| queue.iter().map(QuestionEntity::from).collect()),
            current_index: patch.current_index,
            time_left: patch.time_left,
            is_paused: patch.is_paused,
            score: patch.score,
            history: patch
                .history
                .as_ref()
                .map(|history| history.iter().map(HistoryEntryEntity::from).collect()),
            used_ids: patch.used_ids.as_ref().map(used_ids_to_entity),
            round_scores: patch
                .round_scores
                .as_ref()
                .map(|scores| scores.iter().copied().map(Into::into).collect()),
            revision,
            updated_at,
        }
    }
}

fn used_ids_to_entity(ids: &BTreeSet<QuestionId>) -> Vec<String> {
    ids.iter().map(|id| id.as_str().to_owned()).collect()
}

impl From<&Question> for QuestionEntity {
    fn from(value: &Question) -> Self {
        Self {
            id: value.id.as_str().to_owned(),
            term: value.term.clone(),
            book: value.book.clone(),
            chapter_category: value.chapter_category.clone(),
            keywords: value.keywords.clone(),
        }
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: QuestionId::new(value.id),
            term: value.term,
            book: value.book,
            chapter_category: value.chapter_category,
            keywords: value.keywords,
        }
    }
}

impl From<&HistoryEntry> for HistoryEntryEntity {
    fn from(value: &HistoryEntry) -> Self {
        Self {
            question_term: value.question_term.clone(),
            judgment: value.judgment,
        }
    }
}

impl From<HistoryEntryEntity> for HistoryEntry {
    fn from(value: HistoryEntryEntity) -> Self {
        HistoryEntry::new(value.question_term, value.judgment)
    }
}

impl From<RoundScore> for RoundScoreEntity {
    fn from(value: RoundScore) -> Self {
        Self {
            round: value.round,
            score: value.score,
        }
    }
}

impl From<RoundScoreEntity> for RoundScore {
    fn from(value: RoundScoreEntity) -> Self {
        Self {
            round: value.round,
            score: value.score,
        }
    }
}

impl From<RoundConfig> for RoundConfigEntity {
    fn from(value: RoundConfig) -> Self {
        Self {
            total_rounds: value.total_rounds,
            time_per_round: value.time_per_round,
            allow_duplicate: value.allow_duplicate,
        }
    }
}

impl From<RoundConfigEntity> for RoundConfig {
    fn from(value: RoundConfigEntity) -> Self {
        Self {
            total_rounds: value.total_rounds,
            time_per_round: value.time_per_round,
            allow_duplicate: value.allow_duplicate,
        }
    }
}

impl From<&SessionDocument> for SessionEntity {
    fn from(value: &SessionDocument) -> Self {
        Self {
            room_code: value.room_code.clone(),
            state: value.phase,
            subject: value.subject.clone(),
            category: value.category.clone(),
            config: value.config.into(),
            current_round: value.current_round,
            queue: value.queue.iter().map(QuestionEntity::from).collect(),
            current_index: value.current_index,
            time_left: value.time_left,
            is_paused: value.is_paused,
            score: value.score,
            history: value.history.iter().map(HistoryEntryEntity::from).collect(),
            used_ids: used_ids_to_entity(&value.used_ids),
            round_scores: value.round_scores.iter().copied().map(Into::into).collect(),
            revision: value.revision,
            updated_at: value.updated_at,
        }
    }
}

impl From<SessionEntity> for SessionDocument {
    fn from(value: SessionEntity) -> Self {
        SessionDocument {
            room_code: value.room_code,
            phase: value.state,
            subject: value.subject,
            category: value.category,
            config: value.config.into(),
            current_round: value.current_round,
            queue: value.queue.into_iter().map(Into::into).collect(),
            current_index: value.current_index,
            time_left: value.time_left,
            is_paused: value.is_paused,
            score: value.score,
            history: value.history.into_iter().map(Into::into).collect(),
            used_ids: value.used_ids.into_iter().map(QuestionId::new).collect(),
            round_scores: value.round_scores.into_iter().map(Into::into).collect(),
            revision: value.revision,
            updated_at: value.updated_at,
        }
        .normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_touches_patched_fields() {
        let mut doc = SessionDocument::new("0420", RoundConfig::default());
        doc.category = Some("台灣史".into());
        let mut entity = SessionEntity::from(&doc);

        let patch = SessionPatch {
            time_left: Some(41),
            ..Default::default()
        };
        let now = SystemTime::now();
        entity.merge(SessionPatchEntity::new(&patch, 7, now));

        assert_eq!(entity.time_left, 41);
        assert_eq!(entity.category.as_deref(), Some("台灣史"));
        assert_eq!(entity.revision, 7);
        assert_eq!(entity.updated_at, now);
    }

    #[test]
    fn loading_recomputes_score_from_history() {
        let doc = SessionDocument::new("0420", RoundConfig::default());
        let mut entity = SessionEntity::from(&doc);
        entity.score = 12;
        entity.history = vec![HistoryEntryEntity {
            question_term: "鄭成功".into(),
            judgment: Judgment::Correct,
        }];
        let loaded = SessionDocument::from(entity);
        assert_eq!(loaded.score, 1);
    }

    #[test]
    fn stored_document_uses_camel_case_fields() {
        let doc = SessionDocument::new("0420", RoundConfig::default());
        let value = serde_json::to_value(SessionEntity::from(&doc)).unwrap();
        assert_eq!(value["roomCode"], "0420");
        assert_eq!(value["state"], "SETTINGS");
        assert_eq!(value["config"]["timePerRound"], 180);
        assert!(value.get("usedIds").is_some());
    }

    #[test]
    fn catalog_rows_with_a_category_key_keep_their_chapter() {
        let entity: QuestionEntity = serde_json::from_str(
            r#"{ "id": "7", "term": "馬關條約", "book": "東亞史", "category": "甲午戰爭" }"#,
        )
        .unwrap();
        assert_eq!(entity.chapter_category, "甲午戰爭");
    }
}
