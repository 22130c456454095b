//! Per-round judgment history and score bookkeeping.

use std::collections::BTreeSet;

use crate::state::session::{Judgment, Question, QuestionId};

/// One judged term of the current round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Term that was on screen when the judgment was made.
    pub question_term: String,
    /// Judgment recorded for it.
    pub judgment: Judgment,
}

impl HistoryEntry {
    /// Build an entry for `term`.
    pub fn new(term: impl Into<String>, judgment: Judgment) -> Self {
        Self {
            question_term: term.into(),
            judgment,
        }
    }
}

/// Score of a confirmed round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundScore {
    /// 1-based round number.
    pub round: u32,
    /// Correct judgments in that round.
    pub score: u32,
}

/// Count the correct judgments in `history`.
pub fn score(history: &[HistoryEntry]) -> u32 {
    history
        .iter()
        .filter(|entry| entry.judgment == Judgment::Correct)
        .count() as u32
}

/// Return `history` extended with a new judgment.
pub fn append(history: &[HistoryEntry], term: &str, judgment: Judgment) -> Vec<HistoryEntry> {
    let mut next = Vec::with_capacity(history.len() + 1);
    next.extend_from_slice(history);
    next.push(HistoryEntry::new(term, judgment));
    next
}

/// Return `history` with the entry at `index` flipped, or `None` when out of range.
pub fn toggle(history: &[HistoryEntry], index: usize) -> Option<Vec<HistoryEntry>> {
    let mut next = history.to_vec();
    let entry = next.get_mut(index)?;
    entry.judgment = entry.judgment.flipped();
    Some(next)
}

/// Ids of the questions actually shown this round (`queue[0..current_index)`).
pub fn consumed_ids(queue: &[Question], current_index: usize) -> impl Iterator<Item = &QuestionId> {
    queue
        .iter()
        .take(current_index.min(queue.len()))
        .map(|question| &question.id)
}

/// Union of `used` with the ids consumed this round.
pub fn fold_used_ids(
    used: &BTreeSet<QuestionId>,
    queue: &[Question],
    current_index: usize,
) -> BTreeSet<QuestionId> {
    let mut next = used.clone();
    next.extend(consumed_ids(queue, current_index).cloned());
    next
}

/// Sum of the confirmed round scores.
pub fn total(round_scores: &[RoundScore]) -> u32 {
    round_scores.iter().map(|entry| entry.score).sum()
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    fn question(id: &str) -> Question {
        Question {
            id: QuestionId::new(id),
            term: format!("term-{id}"),
            book: String::new(),
            chapter_category: String::new(),
            keywords: String::new(),
        }
    }

    #[test]
    fn score_matches_correct_count_after_random_edits() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut history = Vec::new();
        for step in 0..200 {
            if !history.is_empty() && rng.random_bool(0.3) {
                let index = rng.random_range(0..history.len());
                history = toggle(&history, index).unwrap();
            } else {
                let judgment = if rng.random_bool(0.5) {
                    Judgment::Correct
                } else {
                    Judgment::Skip
                };
                history = append(&history, &format!("t{step}"), judgment);
            }
            let expected = history
                .iter()
                .filter(|e: &&HistoryEntry| e.judgment == Judgment::Correct)
                .count() as u32;
            assert_eq!(score(&history), expected);
        }
    }

    #[test]
    fn toggling_twice_restores_history() {
        let history = vec![
            HistoryEntry::new("A", Judgment::Correct),
            HistoryEntry::new("B", Judgment::Skip),
        ];
        let once = toggle(&history, 1).unwrap();
        assert_eq!(score(&once), 2);
        let twice = toggle(&once, 1).unwrap();
        assert_eq!(twice, history);
    }

    #[test]
    fn toggle_out_of_range_is_none() {
        assert!(toggle(&[], 0).is_none());
    }

    #[test]
    fn fold_only_takes_shown_questions() {
        let queue = vec![question("1"), question("2"), question("3")];
        let used = BTreeSet::from([QuestionId::new("9")]);
        let folded = fold_used_ids(&used, &queue, 2);
        let ids: Vec<_> = folded.iter().map(QuestionId::as_str).collect();
        assert_eq!(ids, vec!["1", "2", "9"]);
    }

    #[test]
    fn fold_clamps_cursor_past_queue() {
        let queue = vec![question("1")];
        let folded = fold_used_ids(&BTreeSet::new(), &queue, 10);
        assert_eq!(folded.len(), 1);
    }

    #[test]
    fn total_sums_rounds() {
        let rounds = [
            RoundScore { round: 1, score: 4 },
            RoundScore { round: 2, score: 6 },
        ];
        assert_eq!(total(&rounds), 10);
    }
}
