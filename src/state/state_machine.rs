use std::{collections::BTreeSet, time::{Instant, SystemTime}};

use thiserror::Error;
use uuid::Uuid;

use crate::state::{
    ledger::{self, RoundScore},
    session::{Judgment, Question, RoundConfig, SessionDocument, SessionPatch, SessionPhase},
};

/// Commands accepted by the session state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Presenter picks subject and question-bank category.
    SelectCategory {
        /// Subject label, e.g. `歷史`.
        subject: Option<String>,
        /// Category used to filter the catalog.
        category: String,
    },
    /// Presenter saves the round settings and enters the lobby.
    SaveConfig(RoundConfig),
    /// Presenter starts a round with a freshly sampled queue.
    StartRound {
        /// Shuffled questions of the round.
        queue: Vec<Question>,
        /// Revision the queue was sampled against; stale samples are refused.
        basis_revision: Option<u64>,
    },
    /// Controller judges the current term.
    Judge {
        /// Room the controller joined.
        room_code: String,
        /// Recorded outcome.
        judgment: Judgment,
        /// Item the controller believes is on screen.
        expected_index: Option<usize>,
    },
    /// One second of countdown elapsed.
    Tick,
    /// Countdown reached zero.
    Expire,
    /// Freeze or unfreeze the round.
    SetPaused(bool),
    /// Presenter corrects a judgment during review.
    ToggleJudgment {
        /// Position in the round history.
        index: usize,
    },
    /// Presenter accepts the reviewed round.
    ConfirmRound,
    /// Presenter moves on to the next round.
    ContinueRound,
    /// Presenter restarts after the final board, keeping category and settings.
    Reset,
    /// Clear everything from any phase.
    ForceReset {
        /// Settings restored on the cleared session.
        defaults: RoundConfig,
    },
    /// Clear everything and reopen under a new room code.
    OpenRoom {
        /// Code of the new room.
        room_code: String,
        /// Settings restored on the cleared session.
        defaults: RoundConfig,
    },
}

/// Payload-free discriminant of a [`SessionCommand`], used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// See [`SessionCommand::SelectCategory`].
    SelectCategory,
    /// See [`SessionCommand::SaveConfig`].
    SaveConfig,
    /// See [`SessionCommand::StartRound`].
    StartRound,
    /// See [`SessionCommand::Judge`].
    Judge,
    /// See [`SessionCommand::Tick`].
    Tick,
    /// See [`SessionCommand::Expire`].
    Expire,
    /// See [`SessionCommand::SetPaused`].
    SetPaused,
    /// See [`SessionCommand::ToggleJudgment`].
    ToggleJudgment,
    /// See [`SessionCommand::ConfirmRound`].
    ConfirmRound,
    /// See [`SessionCommand::ContinueRound`].
    ContinueRound,
    /// See [`SessionCommand::Reset`].
    Reset,
    /// See [`SessionCommand::ForceReset`].
    ForceReset,
    /// See [`SessionCommand::OpenRoom`].
    OpenRoom,
}

impl SessionCommand {
    /// Discriminant of the command.
    pub fn kind(&self) -> CommandKind {
        match self {
            SessionCommand::SelectCategory { .. } => CommandKind::SelectCategory,
            SessionCommand::SaveConfig(_) => CommandKind::SaveConfig,
            SessionCommand::StartRound { .. } => CommandKind::StartRound,
            SessionCommand::Judge { .. } => CommandKind::Judge,
            SessionCommand::Tick => CommandKind::Tick,
            SessionCommand::Expire => CommandKind::Expire,
            SessionCommand::SetPaused(_) => CommandKind::SetPaused,
            SessionCommand::ToggleJudgment { .. } => CommandKind::ToggleJudgment,
            SessionCommand::ConfirmRound => CommandKind::ConfirmRound,
            SessionCommand::ContinueRound => CommandKind::ContinueRound,
            SessionCommand::Reset => CommandKind::Reset,
            SessionCommand::ForceReset { .. } => CommandKind::ForceReset,
            SessionCommand::OpenRoom { .. } => CommandKind::OpenRoom,
        }
    }

    /// Whether the command replaces the whole stored document instead of merging fields.
    pub fn overwrites(&self) -> bool {
        matches!(
            self,
            SessionCommand::Reset | SessionCommand::ForceReset { .. } | SessionCommand::OpenRoom { .. }
        )
    }
}

/// Error returned when a command is not allowed in the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {command:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Phase the session was in.
    pub from: SessionPhase,
    /// Command that was refused.
    pub command: CommandKind,
}

/// Policy refusals for commands that are allowed in the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The controller joined a room that is not the live one.
    #[error("room `{0}` not found")]
    RoomNotFound(String),
    /// The round is paused.
    #[error("the round is paused")]
    Paused,
    /// The controller judged an item that is no longer on screen.
    #[error("stale judgment for item {expected}, the round is at item {actual}")]
    StaleIndex {
        /// Item the controller believed was shown.
        expected: usize,
        /// Item actually shown.
        actual: usize,
    },
    /// Every queued question has been judged.
    #[error("no question left in the queue")]
    QueueExhausted,
    /// A round cannot start without questions.
    #[error("cannot start a round with an empty queue")]
    EmptyQueue,
    /// The queue was sampled against an outdated session.
    #[error("queue was drawn at revision {basis}, session is at revision {current}")]
    StaleSample {
        /// Revision the queue was drawn at.
        basis: u64,
        /// Current revision.
        current: u64,
    },
    /// Round settings out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Category selection was blank.
    #[error("category must not be empty")]
    EmptyCategory,
    /// Review correction points outside the history.
    #[error("no judgment recorded at position {0}")]
    UnknownHistoryItem(usize),
    /// Tick after the countdown already reached zero.
    #[error("countdown already finished")]
    CountdownFinished,
    /// Expire while time remains.
    #[error("countdown still running with {0}s left")]
    CountdownRunning(u32),
}

/// Errors produced when computing the effect of a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Command not allowed from the current phase.
    #[error(transparent)]
    Invalid(#[from] InvalidTransition),
    /// Command allowed but refused by policy.
    #[error(transparent)]
    Rejected(#[from] Rejection),
}

/// Validate round settings.
pub fn validate_config(config: &RoundConfig) -> Result<(), Rejection> {
    if config.total_rounds == 0 {
        return Err(Rejection::InvalidConfig("totalRounds must be at least 1"));
    }
    if config.time_per_round == 0 {
        return Err(Rejection::InvalidConfig("timePerRound must be at least 1"));
    }
    Ok(())
}

/// Compute the patch `command` produces against `doc`, without mutating anything.
pub fn compute_patch(
    doc: &SessionDocument,
    command: &SessionCommand,
) -> Result<SessionPatch, TransitionError> {
    use SessionCommand as C;
    use SessionPhase as P;

    if let C::Judge { room_code, .. } = command
        && *room_code != doc.room_code
    {
        return Err(Rejection::RoomNotFound(room_code.clone()).into());
    }

    let patch = match (doc.phase, command) {
        (P::Settings | P::Lobby, C::SelectCategory { subject, category }) => {
            let category = category.trim();
            if category.is_empty() {
                return Err(Rejection::EmptyCategory.into());
            }
            SessionPatch {
                subject: Some(subject.clone()),
                category: Some(Some(category.to_string())),
                ..Default::default()
            }
        }
        (P::Settings, C::SaveConfig(config)) => {
            validate_config(config)?;
            SessionPatch {
                phase: Some(P::Lobby),
                config: Some(*config),
                current_round: Some(1),
                queue: Some(Vec::new()),
                current_index: Some(0),
                time_left: Some(0),
                is_paused: Some(false),
                score: Some(0),
                history: Some(Vec::new()),
                used_ids: Some(BTreeSet::new()),
                round_scores: Some(Vec::new()),
                ..Default::default()
            }
        }
        (P::Lobby, C::StartRound { queue, basis_revision }) => {
            if queue.is_empty() {
                return Err(Rejection::EmptyQueue.into());
            }
            if let Some(basis) = *basis_revision
                && basis != doc.revision
            {
                return Err(Rejection::StaleSample {
                    basis,
                    current: doc.revision,
                }
                .into());
            }
            SessionPatch {
                phase: Some(P::Playing),
                queue: Some(queue.clone()),
                current_index: Some(0),
                time_left: Some(doc.config.time_per_round),
                is_paused: Some(false),
                score: Some(0),
                history: Some(Vec::new()),
                ..Default::default()
            }
        }
        (
            P::Playing,
            C::Judge {
                judgment,
                expected_index,
                ..
            },
        ) => {
            if doc.is_paused {
                return Err(Rejection::Paused.into());
            }
            if let Some(expected) = *expected_index
                && expected != doc.current_index
            {
                return Err(Rejection::StaleIndex {
                    expected,
                    actual: doc.current_index,
                }
                .into());
            }
            let question = doc.current_question().ok_or(Rejection::QueueExhausted)?;
            let history = ledger::append(&doc.history, &question.term, *judgment);
            let next_index = doc.current_index + 1;
            SessionPatch {
                phase: (next_index >= doc.queue.len()).then_some(P::Review),
                current_index: Some(next_index),
                score: Some(ledger::score(&history)),
                history: Some(history),
                ..Default::default()
            }
        }
        (P::Playing, C::Tick) => {
            if doc.is_paused {
                return Err(Rejection::Paused.into());
            }
            if doc.time_left == 0 {
                return Err(Rejection::CountdownFinished.into());
            }
            SessionPatch {
                time_left: Some(doc.time_left - 1),
                ..Default::default()
            }
        }
        (P::Playing, C::Expire) => {
            if doc.time_left > 0 {
                return Err(Rejection::CountdownRunning(doc.time_left).into());
            }
            SessionPatch {
                phase: Some(P::Review),
                is_paused: Some(false),
                ..Default::default()
            }
        }
        (P::Playing, C::SetPaused(paused)) => SessionPatch {
            is_paused: Some(*paused),
            ..Default::default()
        },
        (P::Review, C::ToggleJudgment { index }) => {
            let history =
                ledger::toggle(&doc.history, *index).ok_or(Rejection::UnknownHistoryItem(*index))?;
            SessionPatch {
                score: Some(ledger::score(&history)),
                history: Some(history),
                ..Default::default()
            }
        }
        (P::Review, C::ConfirmRound) => {
            let mut round_scores = doc.round_scores.clone();
            round_scores.push(RoundScore {
                round: doc.current_round,
                score: ledger::score(&doc.history),
            });
            let next = if doc.current_round >= doc.config.total_rounds {
                P::TotalEnd
            } else {
                P::RoundEnd
            };
            SessionPatch {
                phase: Some(next),
                used_ids: Some(ledger::fold_used_ids(
                    &doc.used_ids,
                    &doc.queue,
                    doc.current_index,
                )),
                round_scores: Some(round_scores),
                queue: Some(Vec::new()),
                current_index: Some(0),
                time_left: Some(0),
                ..Default::default()
            }
        }
        (P::RoundEnd, C::ContinueRound) => SessionPatch {
            phase: Some(P::Lobby),
            current_round: Some(doc.current_round + 1),
            score: Some(0),
            history: Some(Vec::new()),
            ..Default::default()
        },
        (P::TotalEnd, C::Reset) => SessionPatch {
            category: Some(doc.category.clone()),
            subject: Some(doc.subject.clone()),
            config: Some(doc.config),
            ..cleared()
        },
        (_, C::ForceReset { defaults }) => SessionPatch {
            config: Some(*defaults),
            ..cleared()
        },
        (_, C::OpenRoom { room_code, defaults }) => SessionPatch {
            room_code: Some(room_code.clone()),
            config: Some(*defaults),
            ..cleared()
        },
        (from, command) => {
            return Err(InvalidTransition {
                from,
                command: command.kind(),
            }
            .into());
        }
    };

    Ok(patch)
}

/// Patch returning every round field to its initial value.
fn cleared() -> SessionPatch {
    SessionPatch {
        phase: Some(SessionPhase::Settings),
        subject: Some(None),
        category: Some(None),
        current_round: Some(1),
        queue: Some(Vec::new()),
        current_index: Some(0),
        time_left: Some(0),
        is_paused: Some(false),
        score: Some(0),
        history: Some(Vec::new()),
        used_ids: Some(BTreeSet::new()),
        round_scores: Some(Vec::new()),
        ..Default::default()
    }
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The command is not valid or was refused.
    Transition(TransitionError),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// Session phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: SessionPhase,
        /// Current phase.
        actual: SessionPhase,
    },
    /// Session revision changed since the plan was created.
    VersionMismatch {
        /// Revision the plan produces.
        expected: u64,
        /// Revision the session would reach now.
        actual: u64,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A validated command whose effect has been computed but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the session is currently in.
    pub from: SessionPhase,
    /// Phase the session will be in after the transition.
    pub to: SessionPhase,
    /// Command that triggered this transition.
    pub command: CommandKind,
    /// Whether the stored document must be replaced rather than merged.
    pub overwrite: bool,
    /// Minimal field changes.
    pub patch: SessionPatch,
    /// Full document after the transition.
    pub next: SessionDocument,
    /// Revision number after applying this transition.
    pub version_next: u64,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase.
    pub phase: SessionPhase,
    /// Current revision.
    pub version: u64,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<SessionPhase>,
}

/// Plan/apply/abort wrapper around the session document.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    document: SessionDocument,
    pending: Option<Plan>,
}

impl SessionMachine {
    /// Wrap an existing document.
    pub fn new(document: SessionDocument) -> Self {
        Self {
            document,
            pending: None,
        }
    }

    /// Current document.
    pub fn document(&self) -> &SessionDocument {
        &self.document
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.document.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.document.phase,
            version: self.document.revision,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Validate `command` against the current document and compute its effect.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, command: SessionCommand) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let patch = compute_patch(&self.document, &command).map_err(PlanError::Transition)?;

        let version_next = self.document.revision + 1;
        let mut next = self.document.clone();
        next.apply(&patch);
        next.revision = version_next;
        next.updated_at = SystemTime::now();

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.document.phase,
            to: next.phase,
            command: command.kind(),
            overwrite: command.overwrites(),
            patch,
            next,
            version_next,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition and return the new document.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<SessionDocument, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.document.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.document.phase,
            });
        }

        if self.document.revision + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.document.revision + 1,
            });
        }

        self.document = plan.next;
        Ok(self.document.clone())
    }

    /// Abort a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Replace the document wholesale, dropping any pending plan.
    pub fn restore(&mut self, document: SessionDocument) {
        self.document = document;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ledger::HistoryEntry, session::QuestionId};

    const ROOM: &str = "0420";

    fn question(id: &str) -> Question {
        Question {
            id: QuestionId::new(id),
            term: format!("term-{id}"),
            book: "台灣史".into(),
            chapter_category: String::new(),
            keywords: String::new(),
        }
    }

    fn queue(n: usize) -> Vec<Question> {
        (1..=n).map(|i| question(&i.to_string())).collect()
    }

    fn apply(sm: &mut SessionMachine, command: SessionCommand) -> SessionDocument {
        let plan = sm.plan(command).unwrap();
        sm.apply(plan.id).unwrap()
    }

    fn rejection(sm: &mut SessionMachine, command: SessionCommand) -> TransitionError {
        match sm.plan(command).unwrap_err() {
            PlanError::Transition(err) => err,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    fn judge(judgment: Judgment) -> SessionCommand {
        SessionCommand::Judge {
            room_code: ROOM.into(),
            judgment,
            expected_index: None,
        }
    }

    fn config(rounds: u32, time: u32) -> RoundConfig {
        RoundConfig {
            total_rounds: rounds,
            time_per_round: time,
            allow_duplicate: false,
        }
    }

    fn playing(rounds: u32, items: usize) -> SessionMachine {
        let mut sm = SessionMachine::new(SessionDocument::new(ROOM, RoundConfig::default()));
        apply(
            &mut sm,
            SessionCommand::SelectCategory {
                subject: Some("歷史".into()),
                category: "台灣史".into(),
            },
        );
        apply(&mut sm, SessionCommand::SaveConfig(config(rounds, 60)));
        apply(
            &mut sm,
            SessionCommand::StartRound {
                queue: queue(items),
                basis_revision: None,
            },
        );
        sm
    }

    #[test]
    fn initial_state_is_settings() {
        let sm = SessionMachine::new(SessionDocument::new(ROOM, RoundConfig::default()));
        assert_eq!(sm.phase(), SessionPhase::Settings);
        assert_eq!(sm.snapshot().version, 0);
    }

    #[test]
    fn full_happy_path_through_two_rounds() {
        let mut sm = playing(2, 3);
        assert_eq!(sm.phase(), SessionPhase::Playing);
        assert_eq!(sm.document().time_left, 60);

        apply(&mut sm, judge(Judgment::Correct));
        apply(&mut sm, judge(Judgment::Skip));
        apply(&mut sm, judge(Judgment::Correct));
        assert_eq!(sm.phase(), SessionPhase::Review);
        assert_eq!(sm.document().score, 2);

        let doc = apply(&mut sm, SessionCommand::ConfirmRound);
        assert_eq!(doc.phase, SessionPhase::RoundEnd);
        assert_eq!(doc.round_scores, vec![RoundScore { round: 1, score: 2 }]);
        assert_eq!(doc.used_ids.len(), 3);

        let doc = apply(&mut sm, SessionCommand::ContinueRound);
        assert_eq!(doc.phase, SessionPhase::Lobby);
        assert_eq!(doc.current_round, 2);
        assert!(doc.history.is_empty());

        apply(
            &mut sm,
            SessionCommand::StartRound {
                queue: queue(1),
                basis_revision: None,
            },
        );
        apply(&mut sm, judge(Judgment::Skip));
        let doc = apply(&mut sm, SessionCommand::ConfirmRound);
        assert_eq!(doc.phase, SessionPhase::TotalEnd);
        assert_eq!(doc.total_score(), 2);
        assert_eq!(doc.revision, 11);
    }

    #[test]
    fn score_tracks_history_through_judgments_and_toggles() {
        let mut sm = playing(1, 4);
        for judgment in [Judgment::Correct, Judgment::Skip, Judgment::Correct] {
            let doc = apply(&mut sm, judge(judgment));
            assert_eq!(doc.score, ledger::score(&doc.history));
        }
        assert_eq!(sm.document().current_index, 3);
        apply(&mut sm, SessionCommand::SetPaused(false));
        let plan = sm.plan(judge(Judgment::Correct)).unwrap();
        assert_eq!(plan.to, SessionPhase::Review);
        sm.apply(plan.id).unwrap();

        let doc = apply(&mut sm, SessionCommand::ToggleJudgment { index: 1 });
        assert_eq!(doc.score, 4);
        let doc = apply(&mut sm, SessionCommand::ToggleJudgment { index: 1 });
        assert_eq!(doc.score, 3);
    }

    #[test]
    fn judgments_are_refused_while_paused() {
        let mut sm = playing(1, 3);
        apply(&mut sm, SessionCommand::SetPaused(true));
        assert_eq!(
            rejection(&mut sm, judge(Judgment::Correct)),
            TransitionError::Rejected(Rejection::Paused)
        );
        assert_eq!(
            rejection(&mut sm, SessionCommand::Tick),
            TransitionError::Rejected(Rejection::Paused)
        );
        assert_eq!(sm.document().current_index, 0);
        assert!(sm.snapshot().pending.is_none());
    }

    #[test]
    fn duplicate_judgment_of_same_item_is_stale() {
        let mut sm = playing(1, 3);
        let first = SessionCommand::Judge {
            room_code: ROOM.into(),
            judgment: Judgment::Correct,
            expected_index: Some(0),
        };
        apply(&mut sm, first.clone());
        assert_eq!(
            rejection(&mut sm, first),
            TransitionError::Rejected(Rejection::StaleIndex {
                expected: 0,
                actual: 1
            })
        );
        assert_eq!(sm.document().history.len(), 1);
    }

    #[test]
    fn judge_for_another_room_is_not_found() {
        let mut sm = playing(1, 3);
        let err = rejection(
            &mut sm,
            SessionCommand::Judge {
                room_code: "9999".into(),
                judgment: Judgment::Correct,
                expected_index: None,
            },
        );
        assert_eq!(
            err,
            TransitionError::Rejected(Rejection::RoomNotFound("9999".into()))
        );
    }

    #[test]
    fn countdown_ticks_then_expires_into_review() {
        let mut sm = SessionMachine::new(SessionDocument::new(ROOM, RoundConfig::default()));
        apply(&mut sm, SessionCommand::SaveConfig(config(1, 2)));
        apply(
            &mut sm,
            SessionCommand::StartRound {
                queue: queue(5),
                basis_revision: None,
            },
        );
        assert_eq!(
            rejection(&mut sm, SessionCommand::Expire),
            TransitionError::Rejected(Rejection::CountdownRunning(2))
        );
        apply(&mut sm, SessionCommand::Tick);
        let doc = apply(&mut sm, SessionCommand::Tick);
        assert_eq!(doc.time_left, 0);
        assert_eq!(
            rejection(&mut sm, SessionCommand::Tick),
            TransitionError::Rejected(Rejection::CountdownFinished)
        );
        let doc = apply(&mut sm, SessionCommand::Expire);
        assert_eq!(doc.phase, SessionPhase::Review);
    }

    #[test]
    fn empty_queue_and_stale_sample_do_not_start_a_round() {
        let mut sm = SessionMachine::new(SessionDocument::new(ROOM, RoundConfig::default()));
        let lobby = apply(&mut sm, SessionCommand::SaveConfig(config(1, 30)));
        assert_eq!(
            rejection(
                &mut sm,
                SessionCommand::StartRound {
                    queue: Vec::new(),
                    basis_revision: None
                }
            ),
            TransitionError::Rejected(Rejection::EmptyQueue)
        );
        assert_eq!(
            rejection(
                &mut sm,
                SessionCommand::StartRound {
                    queue: queue(2),
                    basis_revision: Some(lobby.revision - 1)
                }
            ),
            TransitionError::Rejected(Rejection::StaleSample {
                basis: lobby.revision - 1,
                current: lobby.revision
            })
        );
        assert_eq!(sm.phase(), SessionPhase::Lobby);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut sm = SessionMachine::new(SessionDocument::new(ROOM, RoundConfig::default()));
        let err = rejection(&mut sm, SessionCommand::SaveConfig(config(0, 30)));
        assert!(matches!(
            err,
            TransitionError::Rejected(Rejection::InvalidConfig(_))
        ));
        assert_eq!(sm.phase(), SessionPhase::Settings);
    }

    #[test]
    fn confirm_is_only_accepted_once() {
        let mut sm = playing(3, 1);
        apply(&mut sm, judge(Judgment::Correct));
        apply(&mut sm, SessionCommand::ConfirmRound);
        let err = rejection(&mut sm, SessionCommand::ConfirmRound);
        assert_eq!(
            err,
            TransitionError::Invalid(InvalidTransition {
                from: SessionPhase::RoundEnd,
                command: CommandKind::ConfirmRound
            })
        );
        assert_eq!(sm.document().round_scores.len(), 1);
    }

    #[test]
    fn confirm_folds_only_shown_questions() {
        let mut sm = SessionMachine::new(SessionDocument::new(ROOM, RoundConfig::default()));
        apply(&mut sm, SessionCommand::SaveConfig(config(2, 1)));
        apply(
            &mut sm,
            SessionCommand::StartRound {
                queue: queue(5),
                basis_revision: None,
            },
        );
        apply(&mut sm, judge(Judgment::Correct));
        apply(&mut sm, SessionCommand::Tick);
        apply(&mut sm, SessionCommand::Expire);
        let doc = apply(&mut sm, SessionCommand::ConfirmRound);
        assert_eq!(doc.used_ids, BTreeSet::from([QuestionId::new("1")]));
        assert!(doc.queue.is_empty());
    }

    #[test]
    fn reset_keeps_category_and_settings() {
        let mut sm = playing(1, 1);
        apply(&mut sm, judge(Judgment::Correct));
        apply(&mut sm, SessionCommand::ConfirmRound);
        let doc = apply(&mut sm, SessionCommand::Reset);
        assert_eq!(doc.phase, SessionPhase::Settings);
        assert_eq!(doc.category.as_deref(), Some("台灣史"));
        assert_eq!(doc.config, config(1, 60));
        assert!(doc.used_ids.is_empty());
        assert!(doc.round_scores.is_empty());
        assert_eq!(doc.current_round, 1);
        assert_eq!(doc.score, 0);

        let doc = apply(&mut sm, SessionCommand::SaveConfig(config(1, 60)));
        assert_eq!(doc.phase, SessionPhase::Lobby);
    }

    #[test]
    fn force_reset_clears_everything_from_any_phase() {
        let mut sm = playing(2, 3);
        apply(&mut sm, judge(Judgment::Correct));
        let doc = apply(
            &mut sm,
            SessionCommand::ForceReset {
                defaults: RoundConfig::default(),
            },
        );
        assert_eq!(doc.phase, SessionPhase::Settings);
        assert_eq!(doc.category, None);
        assert_eq!(doc.subject, None);
        assert_eq!(doc.config, RoundConfig::default());
        assert!(doc.history.is_empty());
        assert_eq!(doc.room_code, ROOM);
    }

    #[test]
    fn open_room_switches_code() {
        let mut sm = playing(2, 3);
        let plan = sm
            .plan(SessionCommand::OpenRoom {
                room_code: "1234".into(),
                defaults: RoundConfig::default(),
            })
            .unwrap();
        assert!(plan.overwrite);
        let doc = sm.apply(plan.id).unwrap();
        assert_eq!(doc.room_code, "1234");
        assert_eq!(doc.phase, SessionPhase::Settings);
    }

    #[test]
    fn review_corrections_outside_history_are_rejected() {
        let mut sm = playing(1, 1);
        apply(&mut sm, judge(Judgment::Skip));
        assert_eq!(
            rejection(&mut sm, SessionCommand::ToggleJudgment { index: 3 }),
            TransitionError::Rejected(Rejection::UnknownHistoryItem(3))
        );
        assert_eq!(
            sm.document().history,
            vec![HistoryEntry::new("term-1", Judgment::Skip)]
        );
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = SessionMachine::new(SessionDocument::new(ROOM, RoundConfig::default()));
        let err = rejection(&mut sm, SessionCommand::Tick);
        assert_eq!(
            err,
            TransitionError::Invalid(InvalidTransition {
                from: SessionPhase::Settings,
                command: CommandKind::Tick
            })
        );
    }

    #[test]
    fn second_plan_while_pending_is_refused() {
        let mut sm = SessionMachine::new(SessionDocument::new(ROOM, RoundConfig::default()));
        let plan = sm.plan(SessionCommand::SaveConfig(config(1, 10))).unwrap();
        assert_eq!(
            sm.plan(SessionCommand::SaveConfig(config(1, 10))).unwrap_err(),
            PlanError::AlreadyPending
        );
        assert_eq!(sm.snapshot().pending, Some(SessionPhase::Lobby));
        sm.apply(plan.id).unwrap();
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = SessionMachine::new(SessionDocument::new(ROOM, RoundConfig::default()));
        let plan = sm.plan(SessionCommand::SaveConfig(config(1, 10))).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase(), SessionPhase::Settings);
        assert_eq!(sm.snapshot().version, 0);
    }
}
