//! Draws the question queue of a round from the catalog.

use std::collections::BTreeSet;

use rand::{Rng, seq::SliceRandom};
use thiserror::Error;

use crate::state::session::{Question, QuestionId};

/// Category label meaning "the whole question bank".
pub const ALL_CATEGORIES: &str = "全範圍";

/// Errors raised while drawing a queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SamplerError {
    /// Nothing eligible is left for the requested category.
    #[error("no unused questions left for category `{category}`")]
    Exhausted {
        /// Category that was requested (empty when none was selected).
        category: String,
    },
}

/// Filters applied before shuffling.
#[derive(Debug, Clone, Copy)]
pub struct SamplingPolicy<'a> {
    /// Selected category, `None` for everything.
    pub category: Option<&'a str>,
    /// Keep questions that were consumed by earlier rounds.
    pub allow_duplicate: bool,
    /// Ids consumed by earlier rounds.
    pub used_ids: &'a BTreeSet<QuestionId>,
}

/// Whether `question` belongs to `category`.
///
/// Matches by substring on the book or the chapter category; the whole-bank
/// label and an empty selection match everything.
pub fn matches_category(question: &Question, category: Option<&str>) -> bool {
    let Some(category) = category.map(str::trim) else {
        return true;
    };
    if category.is_empty() || category == ALL_CATEGORIES {
        return true;
    }
    question.book.contains(category) || question.chapter_category.contains(category)
}

/// Filter `catalog` with `policy` and return the eligible questions in random order.
pub fn sample<R: Rng + ?Sized>(
    catalog: &[Question],
    policy: &SamplingPolicy<'_>,
    rng: &mut R,
) -> Result<Vec<Question>, SamplerError> {
    let mut queue: Vec<Question> = catalog
        .iter()
        .filter(|question| matches_category(question, policy.category))
        .filter(|question| policy.allow_duplicate || !policy.used_ids.contains(&question.id))
        .cloned()
        .collect();

    if queue.is_empty() {
        return Err(SamplerError::Exhausted {
            category: policy.category.unwrap_or_default().to_string(),
        });
    }

    queue.shuffle(rng);
    Ok(queue)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn question(id: &str, book: &str, chapter: &str) -> Question {
        Question {
            id: QuestionId::new(id),
            term: format!("term-{id}"),
            book: book.into(),
            chapter_category: chapter.into(),
            keywords: String::new(),
        }
    }

    fn catalog() -> Vec<Question> {
        vec![
            question("1", "台灣史", "清領時期"),
            question("2", "台灣史", "日治時期"),
            question("3", "東亞史", "明清"),
            question("4", "世界史", "台灣史比較"),
        ]
    }

    fn ids(queue: &[Question]) -> Vec<&str> {
        let mut ids: Vec<_> = queue.iter().map(|q| q.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn category_matches_book_or_chapter() {
        let used = BTreeSet::new();
        let policy = SamplingPolicy {
            category: Some("台灣史"),
            allow_duplicate: false,
            used_ids: &used,
        };
        let queue = sample(&catalog(), &policy, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(ids(&queue), vec!["1", "2", "4"]);
    }

    #[test]
    fn whole_range_and_missing_category_match_everything() {
        let used = BTreeSet::new();
        for category in [Some(ALL_CATEGORIES), None, Some("  ")] {
            let policy = SamplingPolicy {
                category,
                allow_duplicate: false,
                used_ids: &used,
            };
            let queue = sample(&catalog(), &policy, &mut StdRng::seed_from_u64(2)).unwrap();
            assert_eq!(queue.len(), 4);
        }
    }

    #[test]
    fn used_ids_are_excluded_unless_duplicates_allowed() {
        let used = BTreeSet::from([QuestionId::new("1"), QuestionId::new("2")]);
        let strict = SamplingPolicy {
            category: Some("台灣史"),
            allow_duplicate: false,
            used_ids: &used,
        };
        let queue = sample(&catalog(), &strict, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(ids(&queue), vec!["4"]);

        let relaxed = SamplingPolicy {
            allow_duplicate: true,
            ..strict
        };
        let queue = sample(&catalog(), &relaxed, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(ids(&queue), vec!["1", "2", "4"]);
    }

    #[test]
    fn empty_selection_reports_exhausted_category() {
        let used = BTreeSet::new();
        let policy = SamplingPolicy {
            category: Some("選修上"),
            allow_duplicate: false,
            used_ids: &used,
        };
        let err = sample(&catalog(), &policy, &mut StdRng::seed_from_u64(4)).unwrap_err();
        assert_eq!(
            err,
            SamplerError::Exhausted {
                category: "選修上".into()
            }
        );
    }

    #[test]
    fn shuffle_is_a_permutation_of_the_filtered_set() {
        let catalog: Vec<_> = (0..20)
            .map(|i| question(&format!("{i:02}"), "世界史", ""))
            .collect();
        let used = BTreeSet::new();
        let policy = SamplingPolicy {
            category: None,
            allow_duplicate: false,
            used_ids: &used,
        };
        let first = sample(&catalog, &policy, &mut StdRng::seed_from_u64(10)).unwrap();
        let second = sample(&catalog, &policy, &mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(ids(&first), ids(&catalog));
        assert_eq!(ids(&second), ids(&catalog));
        assert_ne!(first, second);
    }
}
