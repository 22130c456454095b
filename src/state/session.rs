use std::{collections::BTreeSet, fmt, time::SystemTime};

use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::ledger::{self, HistoryEntry, RoundScore};

/// Number of digits in a human-relayable room code.
pub const ROOM_CODE_LENGTH: usize = 4;

/// Phases a quiz session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    /// Presenter is choosing category and round settings.
    Settings,
    /// Configured and waiting for the presenter to start the next round.
    Lobby,
    /// A round is running: the countdown ticks and controllers judge terms.
    Playing,
    /// Countdown finished (or queue exhausted); the presenter may correct judgments.
    Review,
    /// Round confirmed, more rounds remain.
    RoundEnd,
    /// Last round confirmed; terminal until reset.
    TotalEnd,
}

/// Outcome recorded by the controller for a single term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Judgment {
    /// The guesser found the term.
    #[serde(alias = "正確")]
    Correct,
    /// The term was passed.
    #[serde(alias = "跳過")]
    Skip,
}

impl Judgment {
    /// Return the opposite judgment.
    pub fn flipped(self) -> Self {
        match self {
            Judgment::Correct => Judgment::Skip,
            Judgment::Skip => Judgment::Correct,
        }
    }
}

/// Identifier of a catalog question, normalised to a string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuestionId(String);

impl QuestionId {
    /// Wrap an existing identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Allocate an identifier for imported questions that came without one.
    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A catalog entry drawn into a round queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Unique identifier inside the catalog.
    pub id: QuestionId,
    /// Term shown to describers and guessed by the controller holder.
    pub term: String,
    /// Book (volume) the term belongs to, e.g. `台灣史`.
    pub book: String,
    /// Chapter-level category.
    pub chapter_category: String,
    /// Free-form keywords shown as hints.
    pub keywords: String,
}

/// Round settings chosen by the presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundConfig {
    /// Number of rounds in a game (at least 1).
    pub total_rounds: u32,
    /// Countdown length of each round in seconds (at least 1).
    pub time_per_round: u32,
    /// Whether questions used in earlier rounds may be drawn again.
    pub allow_duplicate: bool,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            total_rounds: 3,
            time_per_round: 180,
            allow_duplicate: false,
        }
    }
}

/// The single shared game-state document coordinating presenter and controllers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDocument {
    /// Code controllers use to join the room.
    pub room_code: String,
    /// Current phase.
    pub phase: SessionPhase,
    /// Selected subject (e.g. `歷史`).
    pub subject: Option<String>,
    /// Selected question-bank filter.
    pub category: Option<String>,
    /// Round settings.
    pub config: RoundConfig,
    /// 1-based round counter.
    pub current_round: u32,
    /// Questions of the active round.
    pub queue: Vec<Question>,
    /// Cursor into `queue`.
    pub current_index: usize,
    /// Countdown in seconds.
    pub time_left: u32,
    /// Freezes both countdown and controller input.
    pub is_paused: bool,
    /// Number of correct judgments in `history`; always derived.
    pub score: u32,
    /// Per-item judgments of the current round.
    pub history: Vec<HistoryEntry>,
    /// Questions consumed by confirmed rounds.
    pub used_ids: BTreeSet<QuestionId>,
    /// One entry per confirmed round.
    pub round_scores: Vec<RoundScore>,
    /// Bumped on every accepted mutation.
    pub revision: u64,
    /// Time of the last accepted mutation.
    pub updated_at: SystemTime,
}

impl SessionDocument {
    /// Build a fresh session in the settings phase.
    pub fn new(room_code: impl Into<String>, config: RoundConfig) -> Self {
        Self {
            room_code: room_code.into(),
            phase: SessionPhase::Settings,
            subject: None,
            category: None,
            config,
            current_round: 1,
            queue: Vec::new(),
            current_index: 0,
            time_left: 0,
            is_paused: false,
            score: 0,
            history: Vec::new(),
            used_ids: BTreeSet::new(),
            round_scores: Vec::new(),
            revision: 0,
            updated_at: SystemTime::now(),
        }
    }

    /// Merge a patch into the document, field by field.
    ///
    /// `score` is recomputed from `history` afterwards whatever the patch carried.
    pub fn apply(&mut self, patch: &SessionPatch) {
        if let Some(room_code) = &patch.room_code {
            self.room_code = room_code.clone();
        }
        if let Some(phase) = patch.phase {
            self.phase = phase;
        }
        if let Some(subject) = &patch.subject {
            self.subject = subject.clone();
        }
        if let Some(category) = &patch.category {
            self.category = category.clone();
        }
        if let Some(config) = patch.config {
            self.config = config;
        }
        if let Some(current_round) = patch.current_round {
            self.current_round = current_round;
        }
        if let Some(queue) = &patch.queue {
            self.queue = queue.clone();
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
        if let Some(history) = &patch.history {
            self.history = history.clone();
        }
        if let Some(used_ids) = &patch.used_ids {
            self.used_ids = used_ids.clone();
        }
        if let Some(round_scores) = &patch.round_scores {
            self.round_scores = round_scores.clone();
        }
        self.score = ledger::score(&self.history);
    }

    /// Repair derived fields of a document loaded from storage.
    pub fn normalized(mut self) -> Self {
        self.current_index = self.current_index.min(self.queue.len());
        self.current_round = self.current_round.max(1);
        self.score = ledger::score(&self.history);
        self
    }

    /// Question currently shown, if the cursor is inside the queue.
    pub fn current_question(&self) -> Option<&Question> {
        self.queue.get(self.current_index)
    }

    /// Sum of all confirmed round scores.
    pub fn total_score(&self) -> u32 {
        ledger::total(&self.round_scores)
    }
}

/// Minimal set of field changes produced by one accepted command.
///
/// `None` leaves a field untouched; nested options (`subject`, `category`) use
/// `Some(None)` to clear the field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    /// New room code (only when a room is reopened).
    pub room_code: Option<String>,
    /// New phase.
    pub phase: Option<SessionPhase>,
    /// New subject.
    pub subject: Option<Option<String>>,
    /// New category.
    pub category: Option<Option<String>>,
    /// New round settings.
    pub config: Option<RoundConfig>,
    /// New round counter.
    pub current_round: Option<u32>,
    /// New queue.
    pub queue: Option<Vec<Question>>,
    /// New cursor.
    pub current_index: Option<usize>,
    /// New countdown value.
    pub time_left: Option<u32>,
    /// New pause flag.
    pub is_paused: Option<bool>,
    /// Score derived from the patched history.
    pub score: Option<u32>,
    /// New ledger.
    pub history: Option<Vec<HistoryEntry>>,
    /// New consumed-id set.
    pub used_ids: Option<BTreeSet<QuestionId>>,
    /// New per-round scores.
    pub round_scores: Option<Vec<RoundScore>>,
}

impl SessionPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Draw a random room code, never equal to `avoid`.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R, avoid: Option<&str>) -> String {
    loop {
        let code = format!("{:0width$}", rng.random_range(0..10_000u32), width = ROOM_CODE_LENGTH);
        if avoid != Some(code.as_str()) {
            return code;
        }
    }
}

/// Whether `code` looks like a room code (exactly four ASCII digits).
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LENGTH && code.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn question(id: &str, term: &str) -> Question {
        Question {
            id: QuestionId::new(id),
            term: term.into(),
            book: "台灣史".into(),
            chapter_category: String::new(),
            keywords: String::new(),
        }
    }

    #[test]
    fn new_session_starts_in_settings() {
        let doc = SessionDocument::new("0420", RoundConfig::default());
        assert_eq!(doc.phase, SessionPhase::Settings);
        assert_eq!(doc.current_round, 1);
        assert!(doc.history.is_empty());
        assert_eq!(doc.score, 0);
    }

    #[test]
    fn apply_recomputes_score_even_when_patch_lies() {
        let mut doc = SessionDocument::new("0420", RoundConfig::default());
        doc.apply(&SessionPatch {
            score: Some(99),
            history: Some(vec![
                HistoryEntry::new("鄭成功", Judgment::Correct),
                HistoryEntry::new("牡丹社事件", Judgment::Skip),
            ]),
            ..Default::default()
        });
        assert_eq!(doc.score, 1);
    }

    #[test]
    fn apply_clears_nested_optionals() {
        let mut doc = SessionDocument::new("0420", RoundConfig::default());
        doc.category = Some("台灣史".into());
        doc.apply(&SessionPatch {
            category: Some(None),
            ..Default::default()
        });
        assert_eq!(doc.category, None);
    }

    #[test]
    fn normalized_clamps_cursor() {
        let mut doc = SessionDocument::new("0420", RoundConfig::default());
        doc.queue = vec![question("1", "鄭成功")];
        doc.current_index = 7;
        doc.score = 5;
        let doc = doc.normalized();
        assert_eq!(doc.current_index, 1);
        assert_eq!(doc.score, 0);
    }

    #[test]
    fn judgment_flip_is_an_involution() {
        assert_eq!(Judgment::Correct.flipped(), Judgment::Skip);
        assert_eq!(Judgment::Correct.flipped().flipped(), Judgment::Correct);
    }

    #[test]
    fn legacy_judgment_labels_are_accepted() {
        let correct: Judgment = serde_json::from_str("\"正確\"").unwrap();
        let skip: Judgment = serde_json::from_str("\"SKIP\"").unwrap();
        assert_eq!(correct, Judgment::Correct);
        assert_eq!(skip, Judgment::Skip);
        assert_eq!(serde_json::to_string(&Judgment::Correct).unwrap(), "\"CORRECT\"");
    }

    #[test]
    fn room_codes_are_four_digits_and_avoid_current() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = generate_room_code(&mut rng, Some("0000"));
            assert!(is_valid_room_code(&code), "bad code {code}");
            assert_ne!(code, "0000");
        }
        assert!(!is_valid_room_code("12a4"));
        assert!(!is_valid_room_code("12345"));
    }
}
