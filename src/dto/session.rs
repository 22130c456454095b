use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{format_system_time, validation::validate_category},
    state::{
        ledger::{HistoryEntry, RoundScore},
        session::{Judgment, Question, RoundConfig, SessionDocument, SessionPhase},
    },
};

/// Question as shown to presenters and controllers.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSummary {
    pub id: String,
    pub term: String,
    pub book: String,
    pub chapter_category: String,
    pub keywords: String,
}

impl From<&Question> for QuestionSummary {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.to_string(),
            term: question.term.clone(),
            book: question.book.clone(),
            chapter_category: question.chapter_category.clone(),
            keywords: question.keywords.clone(),
        }
    }
}

/// One judged term of the running round.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntrySummary {
    pub question_term: String,
    pub judgment: Judgment,
}

impl From<&HistoryEntry> for HistoryEntrySummary {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            question_term: entry.question_term.clone(),
            judgment: entry.judgment,
        }
    }
}

/// Score of a confirmed round.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct RoundScoreSummary {
    pub round: u32,
    pub score: u32,
}

impl From<RoundScore> for RoundScoreSummary {
    fn from(value: RoundScore) -> Self {
        Self {
            round: value.round,
            score: value.score,
        }
    }
}

/// Round settings, used both in snapshots and as the save-config payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RoundConfigPayload {
    /// Number of rounds in the game.
    #[validate(range(min = 1, max = 20))]
    pub total_rounds: u32,
    /// Countdown per round, in seconds.
    #[validate(range(min = 1, max = 3600))]
    pub time_per_round: u32,
    /// Allow questions from earlier rounds to come back.
    #[serde(default)]
    pub allow_duplicate: bool,
}

impl From<RoundConfig> for RoundConfigPayload {
    fn from(config: RoundConfig) -> Self {
        Self {
            total_rounds: config.total_rounds,
            time_per_round: config.time_per_round,
            allow_duplicate: config.allow_duplicate,
        }
    }
}

impl From<RoundConfigPayload> for RoundConfig {
    fn from(payload: RoundConfigPayload) -> Self {
        Self {
            total_rounds: payload.total_rounds,
            time_per_round: payload.time_per_round,
            allow_duplicate: payload.allow_duplicate,
        }
    }
}

/// Full view of the shared session, pushed on every accepted change.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub room_code: String,
    pub state: SessionPhase,
    pub subject: Option<String>,
    pub category: Option<String>,
    pub config: RoundConfigPayload,
    pub current_round: u32,
    pub queue: Vec<QuestionSummary>,
    pub current_index: usize,
    /// Question on screen while playing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<QuestionSummary>,
    pub time_left: u32,
    pub is_paused: bool,
    pub score: u32,
    pub history: Vec<HistoryEntrySummary>,
    pub used_ids: Vec<String>,
    pub round_scores: Vec<RoundScoreSummary>,
    /// Sum of the confirmed round scores.
    pub total_score: u32,
    pub revision: u64,
    /// RFC 3339 timestamp of the last accepted change.
    pub updated_at: String,
}

impl From<&SessionDocument> for SessionSnapshot {
    fn from(doc: &SessionDocument) -> Self {
        let current_question = (doc.phase == SessionPhase::Playing)
            .then(|| doc.current_question().map(QuestionSummary::from))
            .flatten();
        Self {
            room_code: doc.room_code.clone(),
            state: doc.phase,
            subject: doc.subject.clone(),
            category: doc.category.clone(),
            config: doc.config.into(),
            current_round: doc.current_round,
            queue: doc.queue.iter().map(QuestionSummary::from).collect(),
            current_index: doc.current_index,
            current_question,
            time_left: doc.time_left,
            is_paused: doc.is_paused,
            score: doc.score,
            history: doc.history.iter().map(HistoryEntrySummary::from).collect(),
            used_ids: doc.used_ids.iter().map(ToString::to_string).collect(),
            round_scores: doc.round_scores.iter().copied().map(Into::into).collect(),
            total_score: doc.total_score(),
            revision: doc.revision,
            updated_at: format_system_time(doc.updated_at),
        }
    }
}

/// Presenter picks subject and category.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SelectCategoryRequest {
    #[serde(default)]
    #[validate(length(max = 64))]
    pub subject: Option<String>,
    #[validate(custom(function = "validate_category"))]
    pub category: String,
}

/// Review correction of one history entry.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ToggleJudgmentRequest {
    /// Position in the round history.
    pub index: usize,
}

/// Judgment submitted by a controller over REST.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JudgeRequest {
    pub judgment: Judgment,
    /// Item the controller believes is on screen; stale values are refused.
    #[serde(default)]
    pub expected_index: Option<usize>,
}

/// Code of the room that was opened.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    pub room_code: String,
    pub snapshot: SessionSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::QuestionId;

    #[test]
    fn snapshot_exposes_current_question_only_while_playing() {
        let mut doc = SessionDocument::new("0420", RoundConfig::default());
        doc.queue = vec![Question {
            id: QuestionId::new("7"),
            term: "鄭成功".into(),
            book: "台灣史".into(),
            chapter_category: String::new(),
            keywords: "延平郡王".into(),
        }];
        let snapshot = SessionSnapshot::from(&doc);
        assert!(snapshot.current_question.is_none());

        doc.phase = SessionPhase::Playing;
        let value = serde_json::to_value(SessionSnapshot::from(&doc)).unwrap();
        assert_eq!(value["currentQuestion"]["term"], "鄭成功");
        assert_eq!(value["state"], "PLAYING");
        assert_eq!(value["config"]["timePerRound"], 180);
    }

    #[test]
    fn config_payload_rejects_out_of_range_values() {
        let payload: RoundConfigPayload =
            serde_json::from_str(r#"{ "totalRounds": 0, "timePerRound": 60 }"#).unwrap();
        assert!(payload.validate().is_err());

        let payload: RoundConfigPayload =
            serde_json::from_str(r#"{ "totalRounds": 2, "timePerRound": 60 }"#).unwrap();
        assert!(payload.validate().is_ok());
        assert!(!payload.allow_duplicate);
    }

    #[test]
    fn judge_request_accepts_legacy_labels() {
        let request: JudgeRequest = serde_json::from_str(r#"{ "judgment": "跳過" }"#).unwrap();
        assert_eq!(request.judgment, Judgment::Skip);
        assert_eq!(request.expected_index, None);
    }
}
